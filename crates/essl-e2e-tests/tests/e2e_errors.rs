//! Hostile-input behavior of the whole pipeline: arbitrary web content
//! must produce a bounded diagnostic list, never a panic.

mod common;

use essl_ast::DiagnosticKind;
use essl_validate::{Config, Outcome, ShaderStage};

#[test]
fn garbage_source_is_rejected_not_a_crash() {
    let config = Config::default();
    let parsed = essl_front::parse("this is not GLSL @@@ {{{ ((( ;;;");
    assert!(!parsed.is_clean());
    // Validation of the partial unit still terminates cleanly.
    let mut unit = parsed.unit;
    let result = essl_validate::validate_unit(&mut unit, ShaderStage::Fragment, &config);
    assert_eq!(result.outcome, Outcome::Rejected);
}

#[test]
fn null_bytes_and_control_characters_survive_lexing() {
    let parsed = essl_front::parse("void main\u{0}() {\u{7} }");
    assert!(!parsed.is_clean());
}

#[test]
fn deeply_nested_expression_is_bounded() {
    let mut source = String::from("void main() { float x = ");
    for _ in 0..10_000 {
        source.push('(');
    }
    source.push_str("1.0");
    for _ in 0..10_000 {
        source.push(')');
    }
    source.push_str("; }");
    let parsed = essl_front::parse(&source);
    assert!(!parsed.is_clean());
}

#[test]
fn mutual_recursion_is_detected_without_overflowing() {
    let config = Config::default();
    let result = common::try_validate(
        "float f(float x);\nfloat g(float x) { return f(x); }\n\
         float f(float x) { return g(x); }\n\
         void main() { gl_Position = vec4(f(1.0)); }",
        ShaderStage::Vertex,
        &config,
    );
    assert_eq!(result.outcome, Outcome::Rejected);
    assert!(result
        .diagnostics
        .iter()
        .any(|d| d.kind == DiagnosticKind::RecursionError));
}

#[test]
fn overlong_identifier_rejected() {
    let config = Config::default();
    let name = "a".repeat(4096);
    let result = common::try_validate(
        &format!("attribute vec4 {name};\nvoid main() {{ gl_Position = {name}; }}"),
        ShaderStage::Vertex,
        &config,
    );
    assert_eq!(result.outcome, Outcome::Rejected);
}

#[test]
fn error_soup_accumulates_ordered_diagnostics() {
    let config = Config::default();
    let result = common::try_validate(
        "uniform float u;\n\
         void main() {\n\
             u = 1.0;\n\
             missing = 2.0;\n\
             gl_Position = vec4(1, 1.0, true, x);\n\
         }",
        ShaderStage::Vertex,
        &config,
    );
    assert_eq!(result.outcome, Outcome::Rejected);
    assert!(result.diagnostics.len() >= 3, "{:?}", result.diagnostics);
    // Diagnostics come out in source order.
    let lines: Vec<u32> = result.diagnostics.iter().map(|d| d.line).collect();
    let mut sorted = lines.clone();
    sorted.sort_unstable();
    assert_eq!(lines, sorted);
}

#[test]
fn rejection_produces_no_variable_set() {
    let config = Config::default();
    let result = common::try_validate(
        "attribute vec4 p;\nvoid main() { gl_Position = p; undefined(); }",
        ShaderStage::Vertex,
        &config,
    );
    assert_eq!(result.outcome, Outcome::Rejected);
    assert!(result.variables.attributes().is_empty());
    assert!(result.variables.uniforms().is_empty());
}

#[test]
fn many_declarations_terminate_promptly() {
    let mut source = String::new();
    for i in 0..2_000 {
        source.push_str(&format!("uniform float u{i};\n"));
    }
    source.push_str("void main() { gl_Position = vec4(u0); }");
    let config = Config::default();
    let result = common::try_validate(&source, ShaderStage::Vertex, &config);
    assert_eq!(result.outcome, Outcome::Validated, "{:?}", result.diagnostics);
    // Only the referenced uniform survives into the variable set.
    assert_eq!(result.variables.uniforms().len(), 1);
}
