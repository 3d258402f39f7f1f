//! Cross-stage consistency checking of two validated variable sets.
//!
//! Names shared between the vertex and fragment stages must resolve to
//! structurally identical types. The checker runs over whatever sets exist,
//! so a stage that failed validation (and exported nothing) simply
//! contributes no pairs.

use essl_ast::{Diagnostic, DiagnosticKind};

use crate::types;
use crate::validate::Validation;
use crate::vars::{ShaderVariable, ShaderVariableSet};

/// Checks varying/uniform/attribute agreement between two stages and audits
/// generated aliases for accidental overlap.
pub fn check_linkage(vertex: &Validation, fragment: &Validation) -> Vec<Diagnostic> {
    let mut diags = Vec::new();
    check_consistency(
        "uniform",
        vertex.variables.uniforms(),
        fragment.variables.uniforms(),
        &mut diags,
    );
    check_consistency(
        "varying",
        vertex.variables.varyings(),
        fragment.variables.varyings(),
        &mut diags,
    );
    // Attributes are vertex-only in a two-stage link, but comparing keeps
    // the check shape uniform (and catches a malformed fragment set).
    check_consistency(
        "attribute",
        vertex.variables.attributes(),
        fragment.variables.attributes(),
        &mut diags,
    );
    check_alias_overlap(&vertex.variables, &fragment.variables, &mut diags);
    check_alias_overlap(&fragment.variables, &vertex.variables, &mut diags);
    diags
}

fn check_consistency(
    what: &str,
    first: &[ShaderVariable],
    second: &[ShaderVariable],
    diags: &mut Vec<Diagnostic>,
) {
    for a in first {
        let Some(b) = second.iter().find(|v| v.name == a.name) else {
            continue;
        };
        if !types::same_type(&a.ty, &b.ty, true) {
            diags.push(Diagnostic::error(
                DiagnosticKind::TypeMismatch,
                0,
                format!(
                    "{what} '{}' is declared as {} in one stage and {} in the other",
                    a.name,
                    essl_ast::display::type_name(&a.ty),
                    essl_ast::display::type_name(&b.ty),
                ),
            ));
        }
    }
}

/// Content-stable aliases are derived from the source name, so two distinct
/// names sharing an alias is considered impossible; if it ever happens the
/// link must fail rather than silently merging variables.
fn check_alias_overlap(
    first: &ShaderVariableSet,
    second: &ShaderVariableSet,
    diags: &mut Vec<Diagnostic>,
) {
    let all_first = first.uniforms().iter().chain(first.varyings());
    for a in all_first {
        let Some(alias) = &a.alias else {
            continue;
        };
        let clashes = second
            .uniforms()
            .iter()
            .chain(second.varyings())
            .any(|b| b.alias.as_deref() == Some(alias) && b.name != a.name);
        if clashes {
            diags.push(Diagnostic::error(
                DiagnosticKind::InternalError,
                0,
                format!("generated alias '{alias}' collides across distinct variables"),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::ExtensionSet;
    use crate::config::ShaderStage;
    use crate::validate::{Outcome, Validation};
    use crate::vars::{ShaderVariable, VariableKind};
    use essl_ast::{Precision, Type, VectorSize};
    use std::collections::HashMap;

    fn validation(stage: ShaderStage, vars: Vec<ShaderVariable>) -> Validation {
        let mut variables = crate::vars::ShaderVariableSet::default();
        for var in vars {
            variables.push(var);
        }
        Validation {
            outcome: Outcome::Validated,
            stage,
            diagnostics: vec![],
            variables,
            extensions: ExtensionSet::EMPTY,
            uses_clamp_helper: false,
            aliases: HashMap::new(),
            expr_types: vec![],
        }
    }

    fn varying(name: &str, ty: Type) -> ShaderVariable {
        ShaderVariable {
            kind: VariableKind::Varying,
            name: name.into(),
            alias: None,
            ty,
            precision: Precision::None,
        }
    }

    #[test]
    fn matching_varyings_link() {
        let v = validation(
            ShaderStage::Vertex,
            vec![varying("vColor", Type::vec(VectorSize::Tri))],
        );
        let f = validation(
            ShaderStage::Fragment,
            vec![varying("vColor", Type::vec(VectorSize::Tri))],
        );
        assert!(check_linkage(&v, &f).is_empty());
    }

    #[test]
    fn mismatched_varying_types_fail() {
        let v = validation(
            ShaderStage::Vertex,
            vec![varying("vColor", Type::vec(VectorSize::Tri))],
        );
        let f = validation(
            ShaderStage::Fragment,
            vec![varying("vColor", Type::vec(VectorSize::Quad))],
        );
        let diags = check_linkage(&v, &f);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].kind, DiagnosticKind::TypeMismatch);
    }

    #[test]
    fn disjoint_names_are_fine() {
        let v = validation(
            ShaderStage::Vertex,
            vec![varying("a", Type::vec(VectorSize::Tri))],
        );
        let f = validation(
            ShaderStage::Fragment,
            vec![varying("b", Type::vec(VectorSize::Quad))],
        );
        assert!(check_linkage(&v, &f).is_empty());
    }

    #[test]
    fn alias_collision_detected() {
        let mut a = varying("one", Type::float());
        a.alias = Some("essl_h1".into());
        let mut b = varying("two", Type::float());
        b.alias = Some("essl_h1".into());
        let v = validation(ShaderStage::Vertex, vec![a]);
        let f = validation(ShaderStage::Fragment, vec![b]);
        let diags = check_linkage(&v, &f);
        assert!(diags
            .iter()
            .any(|d| d.kind == DiagnosticKind::InternalError));
    }
}
