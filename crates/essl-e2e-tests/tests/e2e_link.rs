//! Cross-stage linkage checking and variable-set aggregation.

mod common;

use essl_ast::DiagnosticKind;
use essl_validate::{Config, ShaderStage, StorageTag};

#[test]
fn shared_uniform_must_agree_across_stages() {
    let config = Config::default();
    let linked = common::link(
        "uniform vec4 tint;\nvoid main() { gl_Position = tint; }",
        "precision mediump float;\nuniform vec3 tint;\n\
         void main() { gl_FragColor = vec4(tint, 1.0); }",
        &config,
    );
    assert!(linked
        .link_diagnostics
        .iter()
        .any(|d| d.kind == DiagnosticKind::TypeMismatch && d.message.contains("tint")));
}

#[test]
fn identical_uniform_declarations_link() {
    let config = Config::default();
    let linked = common::link(
        "uniform vec4 tint;\nvoid main() { gl_Position = tint; }",
        "precision mediump float;\nuniform vec4 tint;\n\
         void main() { gl_FragColor = tint; }",
        &config,
    );
    assert!(linked.link_diagnostics.is_empty(), "{:?}", linked.link_diagnostics);
}

#[test]
fn precision_differences_alone_do_not_break_linkage() {
    // Precision qualifiers participate in declarations but linkage compares
    // the structural type.
    let config = Config::default();
    let linked = common::link(
        "uniform highp vec4 tint;\nvoid main() { gl_Position = tint; }",
        "precision mediump float;\nuniform mediump vec4 tint;\n\
         void main() { gl_FragColor = tint; }",
        &config,
    );
    assert!(linked.link_diagnostics.is_empty(), "{:?}", linked.link_diagnostics);
}

#[test]
fn merged_set_combines_uniforms_but_not_attributes() {
    let config = Config::default();
    let linked = common::link(
        "attribute vec4 position;\nuniform mat4 mvp;\n\
         void main() { gl_Position = mvp * position; }",
        "precision mediump float;\nuniform sampler2D tex;\nvarying vec2 uv;\n\
         void main() { gl_FragColor = texture2D(tex, uv); }",
        &config,
    );
    let mut merged = linked.vs.variables.clone();
    merged.merge(&linked.ps.variables);
    assert!(merged.find_uniform("mvp").is_some());
    assert!(merged.find_uniform("tex").is_some());
    assert!(merged.find_attribute("position").is_some());
    assert_eq!(merged.attributes().len(), 1);
}

#[test]
fn struct_varyings_compare_field_by_field() {
    let config = Config::default();
    let vs = "struct Fog { vec3 color; float density; };\n\
              varying float fogDensity;\n\
              void main() { fogDensity = 1.0; gl_Position = vec4(1.0); }";
    // Same name, structurally different type on the fragment side.
    let ps = "precision mediump float;\n\
              varying vec2 fogDensity;\n\
              void main() { gl_FragColor = vec4(fogDensity, 0.0, 1.0); }";
    let linked = common::link(vs, ps, &config);
    assert!(linked
        .link_diagnostics
        .iter()
        .any(|d| d.kind == DiagnosticKind::TypeMismatch));
}

#[test]
fn variable_set_lookups_expose_gpu_binding_paths() {
    let config = Config::default();
    let (_, result) = common::validate(
        "struct Light { vec3 color; float intensity; };\n\
         uniform Light lights[2];\n\
         uniform mat4 mvp;\n\
         attribute vec4 position;\n\
         void main() { gl_Position = mvp * position + vec4(lights[0].color, lights[1].intensity); }",
        ShaderStage::Vertex,
        &config,
    );
    assert_eq!(result.outcome, essl_validate::Outcome::Validated, "{:?}", result.diagnostics);

    let info = result.variables.lookup_uniform("lights[0].color").unwrap();
    assert_eq!(info.tag, StorageTag::FloatVec3);
    assert_eq!(info.count, 1);

    let info = result.variables.lookup_uniform("mvp").unwrap();
    assert_eq!(info.tag, StorageTag::FloatMat4);

    assert!(result.variables.lookup_uniform("lights[2].color").is_none());
    assert!(result.variables.lookup_attribute("position").is_some());

    // Aggregate leaf counts expand arrays and structs.
    assert_eq!(result.variables.uniform_count(), 5);
}
