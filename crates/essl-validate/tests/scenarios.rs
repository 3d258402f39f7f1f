//! End-to-end validation scenarios driven from real shader source.

use essl_ast::{DiagnosticKind, Expr, TypeInner, VectorSize};
use essl_validate::{
    check_linkage, validate_unit, Config, Outcome, ShaderStage, Validation, CLAMP_HELPER,
};

fn validate(source: &str, stage: ShaderStage, config: &Config) -> Validation {
    let parsed = essl_front::parse(source);
    assert!(
        parsed.is_clean(),
        "parse failed for {source:?}: {:?}",
        parsed.diagnostics
    );
    let mut unit = parsed.unit;
    validate_unit(&mut unit, stage, config)
}

fn assert_rejected_with(result: &Validation, kind: DiagnosticKind) {
    assert_eq!(result.outcome, Outcome::Rejected);
    assert!(
        result.diagnostics.iter().any(|d| d.kind == kind),
        "expected {kind:?} in {:?}",
        result.diagnostics
    );
}

#[test]
fn simple_vertex_shader_validates() {
    let config = Config::default();
    let result = validate(
        "attribute vec3 pos;\nvoid main() { gl_Position = vec4(pos, 1.0); }",
        ShaderStage::Vertex,
        &config,
    );
    assert_eq!(result.outcome, Outcome::Validated, "{:?}", result.diagnostics);
    let attributes = result.variables.attributes();
    assert_eq!(attributes.len(), 1);
    assert_eq!(attributes[0].name, "pos");
    assert!(matches!(
        attributes[0].ty.inner,
        TypeInner::Vector {
            size: VectorSize::Tri,
            ..
        }
    ));
}

#[test]
fn texture_lookup_resolves_to_vec4() {
    let config = Config::default();
    let parsed = essl_front::parse(
        "uniform sampler2D s;\nvarying vec2 uv;\nvoid main() { gl_FragColor = texture2D(s, uv); }",
    );
    assert!(parsed.is_clean());
    let mut unit = parsed.unit;
    let result = validate_unit(&mut unit, ShaderStage::Fragment, &config);
    assert_eq!(result.outcome, Outcome::Validated, "{:?}", result.diagnostics);

    // The call expression's computed type is vec4.
    let call = unit
        .exprs
        .iter()
        .find(|(_, e)| matches!(e, Expr::Call { callee, .. } if callee == "texture2D"))
        .map(|(h, _)| h)
        .expect("texture2D call present");
    let call_ty = result.expr_types[call.index()].as_ref().expect("typed");
    assert!(matches!(
        call_ty.inner,
        TypeInner::Vector {
            size: VectorSize::Quad,
            ..
        }
    ));

    assert_eq!(result.variables.uniforms().len(), 1);
    assert_eq!(result.variables.varyings().len(), 1);
}

#[test]
fn non_constant_uniform_array_index_rejected_in_fragment() {
    let config = Config::default();
    let result = validate(
        "uniform float arr[4];\nvarying float idx;\nvoid main() { gl_FragColor = vec4(arr[int(idx)]); }",
        ShaderStage::Fragment,
        &config,
    );
    assert_rejected_with(&result, DiagnosticKind::UniformArrayIndexError);
}

#[test]
fn uniform_array_index_clamped_when_configured() {
    let config = Config {
        clamp_out_of_bound_uniform_array_indexing: true,
        ..Config::default()
    };
    let parsed = essl_front::parse(
        "uniform float arr[4];\nvarying float idx;\nvoid main() { gl_FragColor = vec4(arr[int(idx)]); }",
    );
    assert!(parsed.is_clean());
    let mut unit = parsed.unit;
    let result = validate_unit(&mut unit, ShaderStage::Fragment, &config);
    assert_eq!(result.outcome, Outcome::Validated, "{:?}", result.diagnostics);
    assert!(result.uses_clamp_helper);
    // The index was rewritten into a clamp-helper call.
    assert!(unit
        .exprs
        .iter()
        .any(|(_, e)| matches!(e, Expr::Call { callee, .. } if callee == CLAMP_HELPER)));
}

#[test]
fn vertex_stage_allows_dynamic_uniform_indexing() {
    let config = Config::default();
    let result = validate(
        "uniform float arr[4];\nattribute float idx;\nvoid main() { gl_Position = vec4(arr[int(idx)]); }",
        ShaderStage::Vertex,
        &config,
    );
    assert_eq!(result.outcome, Outcome::Validated, "{:?}", result.diagnostics);
}

#[test]
fn duplicate_function_definition_rejected() {
    let config = Config::default();
    let result = validate(
        "float f(float x) { return x; }\nfloat f(float x) { return x; }\nvoid main() { gl_Position = vec4(f(1.0)); }",
        ShaderStage::Vertex,
        &config,
    );
    assert_rejected_with(&result, DiagnosticKind::DuplicateOverload);
}

#[test]
fn overload_with_different_return_type_rejected() {
    let config = Config::default();
    let result = validate(
        "float f(float x);\nint f(float x) { return 1; }\nvoid main() { gl_Position = vec4(1.0); }",
        ShaderStage::Vertex,
        &config,
    );
    assert_rejected_with(&result, DiagnosticKind::MismatchedOverload);
}

#[test]
fn derivative_requires_extension_enable() {
    let config = Config {
        support_oes_derivatives: true,
        ..Config::default()
    };
    let without = validate(
        "precision mediump float;\nvarying vec2 uv;\nvoid main() { gl_FragColor = vec4(dFdx(uv), 0.0, 1.0); }",
        ShaderStage::Fragment,
        &config,
    );
    assert_rejected_with(&without, DiagnosticKind::ExtensionNotEnabled);

    let with = validate(
        "#extension GL_OES_standard_derivatives : enable\nprecision mediump float;\nvarying vec2 uv;\nvoid main() { gl_FragColor = vec4(dFdx(uv), 0.0, 1.0); }",
        ShaderStage::Fragment,
        &config,
    );
    assert_eq!(with.outcome, Outcome::Validated, "{:?}", with.diagnostics);
    assert!(!with.extensions.is_empty());
}

#[test]
fn derivative_unsupported_even_with_directive() {
    let config = Config::default();
    let result = validate(
        "#extension GL_OES_standard_derivatives : enable\nprecision mediump float;\nvarying vec2 uv;\nvoid main() { gl_FragColor = vec4(dFdx(uv), 0.0, 1.0); }",
        ShaderStage::Fragment,
        &config,
    );
    assert_rejected_with(&result, DiagnosticKind::UndeclaredIdentifier);
}

#[test]
fn cross_stage_varying_mismatch_fails_linkage() {
    let config = Config::default();
    let vertex = validate(
        "varying vec3 vColor;\nvoid main() { vColor = vec3(1.0); gl_Position = vec4(1.0); }",
        ShaderStage::Vertex,
        &config,
    );
    assert_eq!(vertex.outcome, Outcome::Validated, "{:?}", vertex.diagnostics);
    let fragment = validate(
        "precision mediump float;\nvarying vec4 vColor;\nvoid main() { gl_FragColor = vColor; }",
        ShaderStage::Fragment,
        &config,
    );
    assert_eq!(
        fragment.outcome,
        Outcome::Validated,
        "{:?}",
        fragment.diagnostics
    );
    let diags = check_linkage(&vertex, &fragment);
    assert!(diags.iter().any(|d| d.kind == DiagnosticKind::TypeMismatch));
}

#[test]
fn frag_data_bound_follows_configuration() {
    let config = Config {
        max_draw_buffers: 2,
        ..Config::default()
    };
    let at_bound = validate(
        "void main() { gl_FragData[1] = vec4(1.0); }",
        ShaderStage::Fragment,
        &config,
    );
    assert_eq!(
        at_bound.outcome,
        Outcome::Validated,
        "{:?}",
        at_bound.diagnostics
    );

    let past_bound = validate(
        "void main() { gl_FragData[2] = vec4(1.0); }",
        ShaderStage::Fragment,
        &config,
    );
    assert_rejected_with(&past_bound, DiagnosticKind::ArraySizeError);
}

#[test]
fn direct_recursion_rejected() {
    let config = Config::default();
    let result = validate(
        "float f(float x) { return f(x); }\nvoid main() { gl_Position = vec4(f(1.0)); }",
        ShaderStage::Vertex,
        &config,
    );
    assert_rejected_with(&result, DiagnosticKind::RecursionError);
}

#[test]
fn indirect_recursion_rejected() {
    let config = Config::default();
    let result = validate(
        "float g(float x);\nfloat f(float x) { return g(x); }\nfloat g(float x) { return f(x); }\nvoid main() { gl_Position = vec4(f(1.0)); }",
        ShaderStage::Vertex,
        &config,
    );
    assert_rejected_with(&result, DiagnosticKind::RecursionError);
}

#[test]
fn int_float_mixing_is_a_type_mismatch() {
    let config = Config::default();
    let result = validate(
        "void main() { float x = 1.0; int y = 2; x = x + y; gl_Position = vec4(x); }",
        ShaderStage::Vertex,
        &config,
    );
    assert_rejected_with(&result, DiagnosticKind::TypeMismatch);
}

#[test]
fn scalar_vector_promotion_is_allowed() {
    let config = Config::default();
    let result = validate(
        "void main() { vec3 v = vec3(1.0) * 2.0; gl_Position = vec4(v, 1.0); }",
        ShaderStage::Vertex,
        &config,
    );
    assert_eq!(result.outcome, Outcome::Validated, "{:?}", result.diagnostics);
}

#[test]
fn undeclared_identifier_reported() {
    let config = Config::default();
    let result = validate(
        "void main() { gl_Position = vec4(missing); }",
        ShaderStage::Vertex,
        &config,
    );
    assert_rejected_with(&result, DiagnosticKind::UndeclaredIdentifier);
}

#[test]
fn writing_a_uniform_is_illegal() {
    let config = Config::default();
    let result = validate(
        "uniform float u;\nvoid main() { u = 1.0; gl_Position = vec4(u); }",
        ShaderStage::Vertex,
        &config,
    );
    assert_rejected_with(&result, DiagnosticKind::IllegalReferenceArgument);
}

#[test]
fn out_parameter_requires_writable_argument() {
    let config = Config::default();
    let result = validate(
        "uniform float u;\nvoid f(out float x) { x = 1.0; }\nvoid main() { f(u); gl_Position = vec4(u); }",
        ShaderStage::Vertex,
        &config,
    );
    assert_rejected_with(&result, DiagnosticKind::IllegalReferenceArgument);
}

#[test]
fn unbounded_for_loop_rejected() {
    let config = Config::default();
    let result = validate(
        "void main() { for (int i = 0; i < 10; i--) { } gl_Position = vec4(1.0); }",
        ShaderStage::Vertex,
        &config,
    );
    assert_rejected_with(&result, DiagnosticKind::SyntaxError);
}

#[test]
fn well_formed_for_loop_validates() {
    let config = Config::default();
    let result = validate(
        "uniform float arr[4];\nvoid main() { float sum = 0.0; for (int i = 0; i < 4; i++) { sum = sum + arr[i]; } gl_Position = vec4(sum); }",
        ShaderStage::Vertex,
        &config,
    );
    assert_eq!(result.outcome, Outcome::Validated, "{:?}", result.diagnostics);
}

#[test]
fn discard_outside_fragment_rejected() {
    let config = Config::default();
    let result = validate(
        "void main() { discard; gl_Position = vec4(1.0); }",
        ShaderStage::Vertex,
        &config,
    );
    assert_rejected_with(&result, DiagnosticKind::SyntaxError);
}

#[test]
fn struct_field_access_and_linkage_roundtrip() {
    let config = Config::default();
    let result = validate(
        "struct Light { vec3 color; float intensity; };\nuniform Light light;\nvoid main() { gl_Position = vec4(light.color * light.intensity, 1.0); }",
        ShaderStage::Vertex,
        &config,
    );
    assert_eq!(result.outcome, Outcome::Validated, "{:?}", result.diagnostics);
    let info = result.variables.lookup_uniform("light.color").unwrap();
    assert_eq!(info.tag, essl_validate::StorageTag::FloatVec3);
}

#[test]
fn unknown_struct_field_rejected() {
    let config = Config::default();
    let result = validate(
        "struct Light { vec3 color; };\nuniform Light light;\nvoid main() { gl_Position = vec4(light.colour, 1.0); }",
        ShaderStage::Vertex,
        &config,
    );
    assert_rejected_with(&result, DiagnosticKind::UndeclaredIdentifier);
}

#[test]
fn swizzle_family_mixing_rejected() {
    let config = Config::default();
    let result = validate(
        "attribute vec4 pos;\nvoid main() { gl_Position = vec4(pos.xg, 0.0, 1.0); }",
        ShaderStage::Vertex,
        &config,
    );
    assert_rejected_with(&result, DiagnosticKind::TypeMismatch);
}

#[test]
fn swizzle_out_of_range_rejected() {
    let config = Config::default();
    let result = validate(
        "attribute vec2 pos;\nvoid main() { gl_Position = vec4(pos.xyz, 1.0); }",
        ShaderStage::Vertex,
        &config,
    );
    assert_rejected_with(&result, DiagnosticKind::TypeMismatch);
}

#[test]
fn unused_uniforms_are_dropped_from_the_variable_set() {
    let config = Config::default();
    let result = validate(
        "uniform float used;\nuniform float unused;\nvoid main() { gl_Position = vec4(used); }",
        ShaderStage::Vertex,
        &config,
    );
    assert_eq!(result.outcome, Outcome::Validated, "{:?}", result.diagnostics);
    assert!(result.variables.find_uniform("used").is_some());
    assert!(result.variables.find_uniform("unused").is_none());
}

#[test]
fn reserved_prefix_identifiers_rejected() {
    let config = Config::default();
    let result = validate(
        "uniform float gl_bad;\nvoid main() { gl_Position = vec4(gl_bad); }",
        ShaderStage::Vertex,
        &config,
    );
    assert_rejected_with(&result, DiagnosticKind::SyntaxError);
}

#[test]
fn conditional_arms_must_agree() {
    let config = Config::default();
    let result = validate(
        "void main() { gl_Position = vec4(true ? 1.0 : 2); }",
        ShaderStage::Vertex,
        &config,
    );
    assert_rejected_with(&result, DiagnosticKind::TypeMismatch);
}

#[test]
fn session_terminates_on_adversarial_soup() {
    // A grab-bag of malformed constructs; must produce a bounded list of
    // diagnostics, never hang or panic.
    let config = Config::default();
    let parsed = essl_front::parse(
        "struct S { float x; };\nuniform S s;\nfloat f(float a) { return f(a); }\nvoid main() {\n  s.x = 1;\n  for (float q = s.x; q != 3.0; q = q) { }\n  gl_Position = vec4(f(1), missing, s.y, 0);\n}",
    );
    let mut unit = parsed.unit;
    let result = validate_unit(&mut unit, ShaderStage::Vertex, &config);
    assert_eq!(result.outcome, Outcome::Rejected);
    assert!(!result.diagnostics.is_empty());
    assert!(result.diagnostics.len() < 64);
}
