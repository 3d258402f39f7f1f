//! GLSL text output.
//!
//! Prints a translation unit back to GLSL-ES source. Used by the
//! pass-through backend and for debugging dumps.

use std::fmt::Write;

use crate::arena::Handle;
use crate::decl::{Decl, ExtensionBehavior, ParamDirection, TranslationUnit};
use crate::expr::{AssignOp, BinaryOp, Expr, Literal, PostOp, UnaryOp};
use crate::stmt::{Stmt, StorageQualifier, VarDecl, VarDeclList};
use crate::types::{
    ArraySize, Precision, SamplerKind, ScalarKind, Type, TypeInner, VectorSize,
};

/// GLSL spelling of a type (without array suffix or precision).
pub fn type_name(ty: &Type) -> String {
    match &ty.inner {
        TypeInner::Void => "void".into(),
        TypeInner::Scalar(kind) => scalar_name(*kind).into(),
        TypeInner::Vector { size, kind } => {
            let prefix = match kind {
                ScalarKind::Float => "vec",
                ScalarKind::Int => "ivec",
                ScalarKind::UInt => "uvec",
                ScalarKind::Bool => "bvec",
            };
            format!("{prefix}{}", size.len())
        }
        TypeInner::Matrix { cols, .. } => format!("mat{}", cols.len()),
        TypeInner::Sampler(SamplerKind::Sampler2D) => "sampler2D".into(),
        TypeInner::Sampler(SamplerKind::SamplerCube) => "samplerCube".into(),
        TypeInner::Array { base, size } => {
            let mut s = type_name(base);
            match size {
                ArraySize::Constant(n) => {
                    let _ = write!(s, "[{n}]");
                }
                ArraySize::Symbolic(key) => {
                    let _ = write!(s, "[{key}]");
                }
                ArraySize::Unsized | ArraySize::Expr(_) => s.push_str("[]"),
            }
            s
        }
        TypeInner::Struct { name, .. } => name.clone(),
        TypeInner::Named(name) => name.clone(),
    }
}

fn scalar_name(kind: ScalarKind) -> &'static str {
    match kind {
        ScalarKind::Bool => "bool",
        ScalarKind::Int => "int",
        ScalarKind::UInt => "uint",
        ScalarKind::Float => "float",
    }
}

fn precision_name(p: Precision) -> Option<&'static str> {
    match p {
        Precision::None => None,
        Precision::Low => Some("lowp"),
        Precision::Medium => Some("mediump"),
        Precision::High => Some("highp"),
    }
}

fn qualifier_name(q: StorageQualifier) -> Option<&'static str> {
    match q {
        StorageQualifier::None => None,
        StorageQualifier::Const => Some("const"),
        StorageQualifier::Attribute => Some("attribute"),
        StorageQualifier::Uniform => Some("uniform"),
        StorageQualifier::Varying => Some("varying"),
    }
}

/// Formats a float so it is still a float literal when read back.
pub fn float_literal(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e16 {
        format!("{v:.1}")
    } else {
        format!("{v}")
    }
}

struct GlslWriter<'a> {
    unit: &'a TranslationUnit,
    out: String,
    indent: usize,
}

const INDENT: &str = "    ";

impl<'a> GlslWriter<'a> {
    fn newline(&mut self) {
        self.out.push('\n');
        for _ in 0..self.indent {
            self.out.push_str(INDENT);
        }
    }

    fn unary_op(op: UnaryOp) -> &'static str {
        match op {
            UnaryOp::Plus => "+",
            UnaryOp::Negate => "-",
            UnaryOp::Not => "!",
            UnaryOp::PreInc => "++",
            UnaryOp::PreDec => "--",
        }
    }

    fn binary_op(op: BinaryOp) -> &'static str {
        match op {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::Less => "<",
            BinaryOp::LessEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEqual => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Xor => "^^",
        }
    }

    fn assign_op(op: AssignOp) -> &'static str {
        match op {
            AssignOp::Assign => "=",
            AssignOp::Add => "+=",
            AssignOp::Sub => "-=",
            AssignOp::Mul => "*=",
            AssignOp::Div => "/=",
        }
    }

    fn binary_prec(op: BinaryOp) -> u8 {
        match op {
            BinaryOp::Or => 3,
            BinaryOp::Xor => 4,
            BinaryOp::And => 5,
            BinaryOp::Equal | BinaryOp::NotEqual => 6,
            BinaryOp::Less
            | BinaryOp::LessEqual
            | BinaryOp::Greater
            | BinaryOp::GreaterEqual => 7,
            BinaryOp::Add | BinaryOp::Sub => 8,
            BinaryOp::Mul | BinaryOp::Div => 9,
        }
    }

    fn expr_prec(&self, handle: Handle<Expr>) -> u8 {
        match &self.unit.exprs[handle] {
            Expr::Seq { .. } => 0,
            Expr::Assign { .. } => 1,
            Expr::Cond { .. } => 2,
            Expr::Binary { op, .. } => Self::binary_prec(*op),
            Expr::Unary { .. } => 10,
            _ => 11,
        }
    }

    /// Writes `handle`, parenthesized if its precedence is below `min_prec`.
    fn expr(&mut self, handle: Handle<Expr>, min_prec: u8) {
        let prec = self.expr_prec(handle);
        let parens = prec < min_prec;
        if parens {
            self.out.push('(');
        }
        let unit = self.unit;
        match &unit.exprs[handle] {
            Expr::Literal(lit) => match lit {
                Literal::Bool(b) => {
                    let _ = write!(self.out, "{b}");
                }
                Literal::Int(i) => {
                    let _ = write!(self.out, "{i}");
                }
                Literal::UInt(u) => {
                    let _ = write!(self.out, "{u}u");
                }
                Literal::Float(v) => self.out.push_str(&float_literal(*v)),
            },
            Expr::Var(name) => self.out.push_str(name),
            Expr::Call { callee, args } => {
                self.out.push_str(callee);
                self.args(args);
            }
            Expr::Construct { ty, args } => {
                self.out.push_str(&type_name(ty));
                self.args(args);
            }
            Expr::Index { base, index } => {
                self.expr(*base, 11);
                self.out.push('[');
                self.expr(*index, 0);
                self.out.push(']');
            }
            Expr::Select { base, field } => {
                self.expr(*base, 11);
                self.out.push('.');
                self.out.push_str(field);
            }
            Expr::Unary { op, expr } => {
                self.out.push_str(Self::unary_op(*op));
                self.expr(*expr, 10);
            }
            Expr::Post { op, expr } => {
                self.expr(*expr, 11);
                self.out.push_str(match op {
                    PostOp::Inc => "++",
                    PostOp::Dec => "--",
                });
            }
            Expr::Binary { op, left, right } => {
                let prec = Self::binary_prec(*op);
                self.expr(*left, prec);
                let _ = write!(self.out, " {} ", Self::binary_op(*op));
                self.expr(*right, prec + 1);
            }
            Expr::Cond {
                cond,
                accept,
                reject,
            } => {
                self.expr(*cond, 3);
                self.out.push_str(" ? ");
                self.expr(*accept, 2);
                self.out.push_str(" : ");
                self.expr(*reject, 2);
            }
            Expr::Assign { op, target, value } => {
                self.expr(*target, 11);
                let _ = write!(self.out, " {} ", Self::assign_op(*op));
                self.expr(*value, 1);
            }
            Expr::Seq { first, second } => {
                self.expr(*first, 1);
                self.out.push_str(", ");
                self.expr(*second, 1);
            }
        }
        if parens {
            self.out.push(')');
        }
    }

    fn args(&mut self, args: &[Handle<Expr>]) {
        self.out.push('(');
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                self.out.push_str(", ");
            }
            self.expr(*arg, 1);
        }
        self.out.push(')');
    }

    fn var_decl(&mut self, decl: &VarDecl) {
        // The array suffix goes after the declarator name.
        if let TypeInner::Array { base, size } = &decl.ty.inner {
            self.typed_prefix(base);
            self.out.push(' ');
            self.out.push_str(&decl.name);
            self.out.push('[');
            match size {
                ArraySize::Constant(n) => {
                    let _ = write!(self.out, "{n}");
                }
                ArraySize::Symbolic(key) => self.out.push_str(key),
                ArraySize::Expr(h) => self.expr(*h, 0),
                ArraySize::Unsized => {}
            }
            self.out.push(']');
        } else {
            self.typed_prefix(&decl.ty);
            self.out.push(' ');
            self.out.push_str(&decl.name);
        }
        if let Some(init) = decl.init {
            self.out.push_str(" = ");
            self.expr(init, 1);
        }
    }

    fn typed_prefix(&mut self, ty: &Type) {
        if let Some(p) = precision_name(ty.precision) {
            self.out.push_str(p);
            self.out.push(' ');
        }
        self.out.push_str(&type_name(ty));
    }

    fn decl_list(&mut self, list: &VarDeclList) {
        if list.invariant {
            self.out.push_str("invariant ");
        }
        if let Some(q) = qualifier_name(list.qualifier) {
            self.out.push_str(q);
            self.out.push(' ');
        }
        for (i, decl) in list.decls.iter().enumerate() {
            if i > 0 {
                self.out.push_str(", ");
            }
            if i == 0 {
                self.var_decl(decl);
            } else {
                // Later declarators repeat only the name.
                self.out.push_str(&decl.name);
                if let Some(init) = decl.init {
                    self.out.push_str(" = ");
                    self.expr(init, 1);
                }
            }
        }
        self.out.push(';');
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Empty => self.out.push(';'),
            Stmt::Expr { expr, .. } => {
                self.expr(*expr, 0);
                self.out.push(';');
            }
            Stmt::Decl(list) => self.decl_list(list),
            Stmt::Compound { body, .. } => self.block(body),
            Stmt::If {
                cond,
                then_branch,
                else_branch,
                ..
            } => {
                self.out.push_str("if (");
                self.expr(*cond, 0);
                self.out.push_str(") ");
                self.stmt(then_branch);
                if let Some(else_branch) = else_branch {
                    self.out.push_str(" else ");
                    self.stmt(else_branch);
                }
            }
            Stmt::While { cond, body, .. } => {
                self.out.push_str("while (");
                self.expr(*cond, 0);
                self.out.push_str(") ");
                self.stmt(body);
            }
            Stmt::DoWhile { body, cond, .. } => {
                self.out.push_str("do ");
                self.stmt(body);
                self.out.push_str(" while (");
                self.expr(*cond, 0);
                self.out.push_str(");");
            }
            Stmt::For {
                init,
                cond,
                update,
                body,
                ..
            } => {
                self.out.push_str("for (");
                self.stmt(init);
                self.out.push(' ');
                if let Some(cond) = cond {
                    self.expr(*cond, 0);
                }
                self.out.push_str("; ");
                if let Some(update) = update {
                    self.expr(*update, 0);
                }
                self.out.push_str(") ");
                self.stmt(body);
            }
            Stmt::Return { value, .. } => {
                self.out.push_str("return");
                if let Some(value) = value {
                    self.out.push(' ');
                    self.expr(*value, 1);
                }
                self.out.push(';');
            }
            Stmt::Break { .. } => self.out.push_str("break;"),
            Stmt::Continue { .. } => self.out.push_str("continue;"),
            Stmt::Discard { .. } => self.out.push_str("discard;"),
        }
    }

    fn block(&mut self, body: &[Stmt]) {
        self.out.push('{');
        self.indent += 1;
        for stmt in body {
            self.newline();
            self.stmt(stmt);
        }
        self.indent -= 1;
        self.newline();
        self.out.push('}');
    }

    fn decl(&mut self, decl: &Decl) {
        match decl {
            Decl::Variable(list) => self.decl_list(list),
            Decl::Struct {
                name,
                fields,
                instance,
                ..
            } => {
                let _ = write!(self.out, "struct {name} {{");
                self.indent += 1;
                for field in fields {
                    self.newline();
                    self.var_decl(&VarDecl {
                        name: field.name.clone(),
                        ty: field.ty.clone(),
                        init: None,
                    });
                    self.out.push(';');
                }
                self.indent -= 1;
                self.newline();
                self.out.push('}');
                if let Some(instance) = instance {
                    self.out.push(' ');
                    self.out.push_str(instance);
                }
                self.out.push(';');
            }
            Decl::Precision { precision, ty, .. } => {
                let _ = write!(
                    self.out,
                    "precision {} {};",
                    precision_name(*precision).unwrap_or("mediump"),
                    type_name(ty)
                );
            }
            Decl::Prototype(proto) => {
                self.proto(proto);
                self.out.push(';');
            }
            Decl::Function { proto, body } => {
                self.proto(proto);
                self.out.push(' ');
                self.block(body);
            }
            Decl::Invariant { names, .. } => {
                let _ = write!(self.out, "invariant {};", names.join(", "));
            }
        }
    }

    fn proto(&mut self, proto: &crate::decl::FunctionProto) {
        self.typed_prefix(&proto.return_type);
        let _ = write!(self.out, " {}(", proto.name);
        for (i, param) in proto.params.iter().enumerate() {
            if i > 0 {
                self.out.push_str(", ");
            }
            match param.direction {
                ParamDirection::In => {}
                ParamDirection::Out => self.out.push_str("out "),
                ParamDirection::InOut => self.out.push_str("inout "),
            }
            self.typed_prefix(&param.ty);
            if let Some(name) = &param.name {
                self.out.push(' ');
                self.out.push_str(name);
            }
        }
        self.out.push(')');
    }
}

/// Prints a translation unit as GLSL-ES source.
pub fn dump_unit(unit: &TranslationUnit) -> String {
    let mut w = GlslWriter {
        unit,
        out: String::new(),
        indent: 0,
    };
    if let Some(version) = unit.version {
        let _ = writeln!(w.out, "#version {version}");
    }
    for ext in &unit.extensions {
        let behavior = match ext.behavior {
            ExtensionBehavior::Enable => "enable",
            ExtensionBehavior::Require => "require",
            ExtensionBehavior::Warn => "warn",
            ExtensionBehavior::Disable => "disable",
        };
        let _ = writeln!(w.out, "#extension {} : {behavior}", ext.name);
    }
    for decl in &unit.decls {
        w.decl(decl);
        w.out.push('\n');
    }
    w.out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Literal;

    #[test]
    fn type_names() {
        assert_eq!(type_name(&Type::vec(VectorSize::Tri)), "vec3");
        assert_eq!(
            type_name(&Type::vector(ScalarKind::Bool, VectorSize::Quad)),
            "bvec4"
        );
        assert_eq!(type_name(&Type::matrix(VectorSize::Bi)), "mat2");
        assert_eq!(type_name(&Type::sampler(SamplerKind::SamplerCube)), "samplerCube");
        assert_eq!(
            type_name(&Type::array(Type::float(), ArraySize::Constant(4))),
            "float[4]"
        );
    }

    #[test]
    fn float_literals_keep_a_point() {
        assert_eq!(float_literal(1.0), "1.0");
        assert_eq!(float_literal(0.5), "0.5");
    }

    #[test]
    fn precedence_parenthesizes() {
        let mut unit = TranslationUnit::default();
        let a = unit.exprs.append(Expr::Literal(Literal::Float(1.0)));
        let b = unit.exprs.append(Expr::Literal(Literal::Float(2.0)));
        let sum = unit.exprs.append(Expr::Binary {
            op: BinaryOp::Add,
            left: a,
            right: b,
        });
        let c = unit.exprs.append(Expr::Literal(Literal::Float(3.0)));
        let prod = unit.exprs.append(Expr::Binary {
            op: BinaryOp::Mul,
            left: sum,
            right: c,
        });
        let mut w = GlslWriter {
            unit: &unit,
            out: String::new(),
            indent: 0,
        };
        w.expr(prod, 0);
        assert_eq!(w.out, "(1.0 + 2.0) * 3.0");
    }

    #[test]
    fn dump_simple_unit() {
        let mut unit = TranslationUnit::default();
        unit.decls.push(Decl::Function {
            proto: crate::decl::FunctionProto {
                name: "main".into(),
                return_type: Type::void(),
                params: vec![],
                line: 1,
            },
            body: vec![],
        });
        let text = dump_unit(&unit);
        assert!(text.contains("void main()"));
    }
}
