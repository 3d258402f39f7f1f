//! HLSL generation properties checked over full vertex/fragment programs.

mod common;

use essl_validate::{Config, OutputFormat};

const PLAIN_VS: &str = "attribute vec4 position;\nvoid main() { gl_Position = position; }";
const PLAIN_PS: &str =
    "precision mediump float;\nvoid main() { gl_FragColor = vec4(1.0, 0.0, 0.0, 1.0); }";

#[test]
fn mod_lowers_to_a_generated_helper() {
    let output = common::emit_hlsl(
        "attribute vec2 a;\nvoid main() { gl_Position = vec4(mod(a, 2.0), 0.0, 1.0); }",
        PLAIN_PS,
        OutputFormat::Hlsl9,
    );
    let vs = common::file_text(&output, "shader.vs.hlsl");
    assert!(vs.contains("essl_mod_fvec2("), "{vs}");
    // The helper definition precedes the translated main.
    assert!(vs.find("float2 essl_mod_fvec2").unwrap() < vs.find("essl_main_vs").unwrap());
}

#[test]
fn vector_relational_and_not_are_rewritten() {
    let output = common::emit_hlsl(
        PLAIN_VS,
        "precision mediump float;\nvarying vec2 uv;\n\
         void main() {\n\
             bvec2 inside = lessThan(uv, vec2(0.5));\n\
             gl_FragColor = vec4(any(not(inside)) ? 1.0 : 0.0);\n\
         }",
        OutputFormat::Hlsl9,
    );
    let ps = common::file_text(&output, "shader.ps.hlsl");
    assert!(!ps.contains("lessThan"), "{ps}");
    assert!(!ps.contains("not("), "{ps}");
}

#[test]
fn biased_texture_lookup_uses_helper() {
    let output = common::emit_hlsl(
        PLAIN_VS,
        "precision mediump float;\nuniform sampler2D s;\nvarying vec2 uv;\n\
         void main() { gl_FragColor = texture2D(s, uv, 1.5); }",
        OutputFormat::Hlsl9,
    );
    let ps = common::file_text(&output, "shader.ps.hlsl");
    assert!(ps.contains("essl_tex2d_bias"), "{ps}");
}

#[test]
fn reserved_identifier_gets_the_same_alias_in_both_stages() {
    let output = common::emit_hlsl(
        "attribute vec4 position;\nuniform mat4 matrix;\n\
         void main() { gl_Position = matrix * position; }",
        "precision mediump float;\nuniform mat4 matrix;\n\
         void main() { gl_FragColor = matrix[0]; }",
        OutputFormat::Hlsl10,
    );
    let vs = common::file_text(&output, "shader.vs.hlsl");
    let ps = common::file_text(&output, "shader.ps.hlsl");

    let find_alias = |text: &str| {
        let start = text.find("essl_h").unwrap_or_else(|| panic!("no alias in {text}"));
        text[start..]
            .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .next()
            .unwrap()
            .to_string()
    };
    let alias = find_alias(vs);
    assert_eq!(alias, find_alias(ps));
    // The raw reserved word never appears as an identifier declaration.
    assert!(!vs.contains(" matrix;"), "{vs}");
    assert!(!ps.contains(" matrix;"), "{ps}");
}

#[test]
fn clamp_rewrite_reaches_the_emitted_output() {
    let config = Config {
        output_format: OutputFormat::Hlsl9,
        clamp_out_of_bound_uniform_array_indexing: true,
        ..Config::default()
    };
    let output = common::emit_hlsl_with(
        PLAIN_VS,
        "precision mediump float;\nuniform float arr[4];\nvarying float idx;\n\
         void main() { gl_FragColor = vec4(arr[int(idx)]); }",
        &config,
    );
    let ps = common::file_text(&output, "shader.ps.hlsl");
    assert!(ps.contains("essl_clamp_index"), "{ps}");
}

#[test]
fn extension_prologue_reflects_enabled_capabilities() {
    let config = Config {
        output_format: OutputFormat::Hlsl10,
        support_oes_derivatives: true,
        ..Config::default()
    };
    let output = common::emit_hlsl_with(
        PLAIN_VS,
        "#extension GL_OES_standard_derivatives : enable\n\
         precision mediump float;\nvarying vec2 uv;\n\
         void main() { gl_FragColor = vec4(fwidth(uv), 0.0, 1.0); }",
        &config,
    );
    let ps = common::file_text(&output, "shader.ps.hlsl");
    assert!(ps.contains("#define GL_OES_standard_derivatives 1"), "{ps}");
}

#[test]
fn frag_data_expands_to_one_field_per_draw_buffer() {
    let config = Config {
        output_format: OutputFormat::Hlsl10,
        max_draw_buffers: 4,
        ..Config::default()
    };
    let output = common::emit_hlsl_with(
        PLAIN_VS,
        "precision mediump float;\n\
         void main() { gl_FragData[0] = vec4(1.0); gl_FragData[3] = vec4(0.0); }",
        &config,
    );
    let ps = common::file_text(&output, "shader.ps.hlsl");
    for i in 0..4 {
        assert!(
            ps.contains(&format!("essl_frag_data_{i} : SV_Target{i}")),
            "{ps}"
        );
    }
}

#[test]
fn uniforms_live_in_a_cbuffer_only_on_dx10() {
    let vs = "attribute vec4 position;\nuniform mat4 mvp;\n\
              void main() { gl_Position = mvp * position; }";
    let dx9 = common::emit_hlsl(vs, PLAIN_PS, OutputFormat::Hlsl9);
    assert!(!common::file_text(&dx9, "shader.vs.hlsl").contains("cbuffer"));
    let dx10 = common::emit_hlsl(vs, PLAIN_PS, OutputFormat::Hlsl10);
    assert!(common::file_text(&dx10, "shader.vs.hlsl").contains("cbuffer essl_uniforms"));
}

#[test]
fn matrix_products_use_swapped_mul() {
    let output = common::emit_hlsl(
        "attribute vec4 position;\nuniform mat4 mvp;\n\
         void main() { gl_Position = mvp * position; }",
        PLAIN_PS,
        OutputFormat::Hlsl9,
    );
    let vs = common::file_text(&output, "shader.vs.hlsl");
    assert!(vs.contains("mul("), "{vs}");
}
