//! Shared AST, type model and diagnostics for the ESSL shader compiler.
//!
//! A parsed shader is a [`TranslationUnit`]: a top-level declaration list
//! whose expressions live in a single arena and are referenced by typed
//! handles. The validator and the code generators both operate on this
//! representation; neither depends on how the unit was produced.

pub mod arena;
mod decl;
mod diag;
pub mod display;
mod expr;
mod stmt;
mod types;

pub use arena::{Arena, Handle};
pub use decl::{
    Decl, ExtensionBehavior, ExtensionDirective, FunctionProto, Param, ParamDirection,
    TranslationUnit,
};
pub use diag::{Diagnostic, DiagnosticKind, Severity};
pub use expr::{AssignOp, BinaryOp, Expr, Literal, PostOp, UnaryOp};
pub use stmt::{Block, Stmt, StorageQualifier, VarDecl, VarDeclList};
pub use types::{
    ArraySize, Precision, SamplerKind, ScalarKind, StructField, Type, TypeError, TypeInner,
    VectorSize,
};
