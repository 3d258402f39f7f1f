//! Top-level declarations and the translation unit.

use crate::arena::Arena;
use crate::expr::Expr;
use crate::stmt::{Block, VarDeclList};
use crate::types::{Precision, StructField, Type};

/// Parameter passing direction.
#[derive(Clone, Copy, Debug, Default, Hash, Eq, PartialEq)]
pub enum ParamDirection {
    #[default]
    In,
    Out,
    InOut,
}

/// A formal function parameter.
#[derive(Clone, Debug)]
pub struct Param {
    pub name: Option<String>,
    pub ty: Type,
    pub direction: ParamDirection,
    pub is_const: bool,
}

/// A function head, shared by prototypes and definitions.
#[derive(Clone, Debug)]
pub struct FunctionProto {
    pub name: String,
    pub return_type: Type,
    pub params: Vec<Param>,
    pub line: u32,
}

/// A top-level declaration.
#[derive(Clone, Debug)]
pub enum Decl {
    Variable(VarDeclList),
    /// `struct S { ... };` with an optional immediate instance declarator.
    Struct {
        name: String,
        fields: Vec<StructField>,
        instance: Option<String>,
        line: u32,
    },
    /// `precision <qualifier> <type>;`
    Precision {
        precision: Precision,
        ty: Type,
        line: u32,
    },
    Prototype(FunctionProto),
    Function {
        proto: FunctionProto,
        body: Block,
    },
    /// `invariant <name>, ...;` re-declaration.
    Invariant {
        names: Vec<String>,
        line: u32,
    },
}

impl Decl {
    pub fn line(&self) -> u32 {
        match self {
            Self::Variable(list) => list.line,
            Self::Struct { line, .. }
            | Self::Precision { line, .. }
            | Self::Invariant { line, .. } => *line,
            Self::Prototype(proto) => proto.line,
            Self::Function { proto, .. } => proto.line,
        }
    }
}

/// Behavior keyword of an `#extension` directive.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum ExtensionBehavior {
    Enable,
    Require,
    Warn,
    Disable,
}

/// A `#extension <name> : <behavior>` directive.
#[derive(Clone, Debug)]
pub struct ExtensionDirective {
    pub name: String,
    pub behavior: ExtensionBehavior,
    pub line: u32,
}

/// A parsed shader: the declaration list plus the expression arena that
/// every handle in it points into.
#[derive(Clone, Debug, Default)]
pub struct TranslationUnit {
    pub exprs: Arena<Expr>,
    pub decls: Vec<Decl>,
    pub extensions: Vec<ExtensionDirective>,
    /// `#version` number, when present (the subset expects 100).
    pub version: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_unit() {
        let unit = TranslationUnit::default();
        assert!(unit.decls.is_empty());
        assert!(unit.exprs.is_empty());
        assert!(unit.version.is_none());
    }

    #[test]
    fn decl_lines() {
        let proto = FunctionProto {
            name: "main".into(),
            return_type: Type::void(),
            params: vec![],
            line: 3,
        };
        assert_eq!(Decl::Prototype(proto.clone()).line(), 3);
        assert_eq!(
            Decl::Function {
                proto,
                body: vec![]
            }
            .line(),
            3
        );
    }
}
