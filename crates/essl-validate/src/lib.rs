//! Validation core for GLSL-ES shaders from untrusted content.
//!
//! One [`validate_unit`] call services one shader stage: it walks the
//! parsed declaration list with a scope-aware [`session::Session`], checks
//! types, identifiers, builtin overloads, loops and the uniform-array
//! indexing policy, and produces diagnostics plus a [`ShaderVariableSet`].
//! [`check_linkage`] then compares two stages' variable sets.

pub mod builtins;
mod config;
mod eval;
mod link;
mod resolve;
pub mod session;
pub mod types;
mod validate;
mod vars;

pub use builtins::{Builtin, BuiltinFun, BuiltinRegistry, Cat, Extension, ExtensionSet};
pub use config::{Config, OutputFormat, ShaderStage};
pub use eval::{eval, eval_to_i32, is_constant, ConstValue};
pub use link::check_linkage;
pub use resolve::{builtin_return_type, resolve_builtin};
pub use validate::{validate_unit, Outcome, Validation, CLAMP_HELPER};
pub use vars::{
    storage_tag, ShaderVariable, ShaderVariableSet, StorageTag, VariableInfo, VariableKind,
};

#[cfg(test)]
mod tests {
    use super::*;
    use essl_ast::TranslationUnit;

    #[test]
    fn empty_unit_is_rejected_for_missing_main() {
        let mut unit = TranslationUnit::default();
        let config = Config::default();
        let result = validate_unit(&mut unit, ShaderStage::Vertex, &config);
        assert_eq!(result.outcome, Outcome::Rejected);
        assert!(result
            .diagnostics
            .iter()
            .any(|d| d.message.contains("main")));
    }
}
