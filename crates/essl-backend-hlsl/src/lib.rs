//! HLSL/Cg backend: validated GLSL-ES stages in, Direct3D shader source
//! out.
//!
//! Two profiles are supported, selected by the output format: `hlsl9`
//! (loose uniforms, `tex2D`, `COLOR`/`POSITION` semantics and the
//! half-pixel viewport fixup) and `hlsl10` (a single cbuffer, `Texture2D`
//! plus `SamplerState` pairs, `SV_*` semantics). Both stages of a linked
//! program should be emitted from one [`HlslBackend::generate`] call so
//! the interface structs agree field for field.

mod helpers;
mod writer;

use essl_ast::{Expr, TranslationUnit};
use essl_backend_core::{
    Backend, BackendError, BackendOptions, BackendOutput, OutputFile, ShaderProgram, StageInput,
};
use essl_validate::{OutputFormat, ShaderStage};

use writer::{emit_stage, WriterInput};

/// The HLSL/Cg code generator.
#[derive(Debug)]
pub struct HlslBackend;

impl Backend for HlslBackend {
    fn name(&self) -> &str {
        "hlsl"
    }

    fn targets(&self) -> &[&str] {
        &["hlsl9", "hlsl10"]
    }

    fn generate(
        &self,
        program: &ShaderProgram<'_>,
        opts: &BackendOptions,
    ) -> Result<BackendOutput, BackendError> {
        let dx10 = match opts.format {
            OutputFormat::Hlsl9 => false,
            OutputFormat::Hlsl10 => true,
            OutputFormat::Glsl => return Err(BackendError::WrongFormat(opts.format)),
        };

        // gl_PointSize travels in the interface struct; the fragment stage
        // must mirror the field even though it never reads it.
        let include_point_size = program
            .vertex
            .as_ref()
            .is_some_and(|stage| writes_point_size(stage.unit));

        let mut output = BackendOutput::default();
        if let Some(stage) = &program.vertex {
            let text = self.emit(program, stage, ShaderStage::Vertex, dx10, include_point_size, opts)?;
            output.files.push(OutputFile {
                name: "shader.vs.hlsl".into(),
                content: text,
            });
        }
        if let Some(stage) = &program.fragment {
            let text = self.emit(
                program,
                stage,
                ShaderStage::Fragment,
                dx10,
                include_point_size,
                opts,
            )?;
            output.files.push(OutputFile {
                name: "shader.ps.hlsl".into(),
                content: text,
            });
        }
        log::debug!(
            "hlsl backend emitted {} file(s), dx10={dx10}",
            output.files.len()
        );
        Ok(output)
    }
}

impl HlslBackend {
    fn emit(
        &self,
        program: &ShaderProgram<'_>,
        stage: &StageInput<'_>,
        kind: ShaderStage,
        dx10: bool,
        include_point_size: bool,
        opts: &BackendOptions,
    ) -> Result<String, BackendError> {
        emit_stage(&WriterInput {
            stage: kind,
            unit: stage.unit,
            types: stage.types,
            variables: program.variables,
            aliases: program.aliases,
            extensions: program.extensions,
            uses_clamp_helper: program.uses_clamp_helper,
            dx10,
            max_draw_buffers: opts.max_draw_buffers,
            include_point_size,
        })
    }
}

fn writes_point_size(unit: &TranslationUnit) -> bool {
    unit.exprs
        .iter()
        .any(|(_, e)| matches!(e, Expr::Var(name) if name == "gl_PointSize"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use essl_validate::{validate_unit, Config, Outcome, Validation};

    fn validated(source: &str, stage: ShaderStage, config: &Config) -> (TranslationUnit, Validation) {
        let parsed = essl_front::parse(source);
        assert!(parsed.is_clean(), "parse: {:?}", parsed.diagnostics);
        let mut unit = parsed.unit;
        let result = validate_unit(&mut unit, stage, config);
        assert_eq!(result.outcome, Outcome::Validated, "{:?}", result.diagnostics);
        (unit, result)
    }

    fn generate(
        vertex_src: &str,
        fragment_src: &str,
        format: OutputFormat,
    ) -> BackendOutput {
        let config = Config {
            output_format: format,
            ..Config::default()
        };
        let (vs_unit, vs) = validated(vertex_src, ShaderStage::Vertex, &config);
        let (ps_unit, ps) = validated(fragment_src, ShaderStage::Fragment, &config);

        let mut variables = vs.variables.clone();
        variables.merge(&ps.variables);
        let mut aliases: HashMap<String, String> = vs.aliases.clone();
        aliases.extend(ps.aliases.clone());

        let program = ShaderProgram {
            vertex: Some(StageInput::new(&vs_unit, &vs)),
            fragment: Some(StageInput::new(&ps_unit, &ps)),
            variables: &variables,
            extensions: vs.extensions,
            uses_clamp_helper: vs.uses_clamp_helper || ps.uses_clamp_helper,
            aliases: &aliases,
        };
        HlslBackend
            .generate(
                &program,
                &BackendOptions {
                    format,
                    max_draw_buffers: 1,
                },
            )
            .unwrap()
    }

    const VS: &str = "attribute vec3 pos;\nvarying vec2 uv;\nattribute vec2 tex;\n\
                      void main() { uv = tex; gl_Position = vec4(pos, 1.0); }";
    const PS: &str = "precision mediump float;\nuniform sampler2D s;\nvarying vec2 uv;\n\
                      void main() { gl_FragColor = texture2D(s, uv); }";

    #[test]
    fn emits_both_stages() {
        let output = generate(VS, PS, OutputFormat::Hlsl9);
        assert_eq!(output.files.len(), 2);
        assert_eq!(output.files[0].name, "shader.vs.hlsl");
        assert_eq!(output.files[1].name, "shader.ps.hlsl");
    }

    #[test]
    fn dx9_profile_uses_legacy_semantics() {
        let output = generate(VS, PS, OutputFormat::Hlsl9);
        let vs = &output.files[0].content;
        assert!(vs.contains("POSITION0"), "{vs}");
        assert!(vs.contains("essl_half_pixel"), "{vs}");
        let ps = &output.files[1].content;
        assert!(ps.contains("COLOR0"), "{ps}");
        assert!(ps.contains("tex2D"), "{ps}");
        assert!(!ps.contains("cbuffer"), "{ps}");
    }

    #[test]
    fn dx10_profile_uses_sv_semantics_and_cbuffer() {
        let output = generate(VS, PS, OutputFormat::Hlsl10);
        let vs = &output.files[0].content;
        assert!(vs.contains("SV_Position"), "{vs}");
        let ps = &output.files[1].content;
        assert!(ps.contains("SV_Target0"), "{ps}");
        assert!(ps.contains("SamplerState"), "{ps}");
    }

    #[test]
    fn interface_structs_agree_across_stages() {
        let output = generate(VS, PS, OutputFormat::Hlsl9);
        let extract = |text: &str| {
            let start = text.find("struct essl_VSOutput").unwrap();
            let end = text[start..].find("};").unwrap();
            text[start..start + end].to_string()
        };
        assert_eq!(
            extract(&output.files[0].content),
            extract(&output.files[1].content)
        );
    }

    #[test]
    fn only_used_helpers_are_emitted() {
        let output = generate(
            "attribute vec2 a;\nvoid main() { gl_Position = vec4(mod(a, 2.0), 0.0, 1.0); }",
            "precision mediump float;\nvoid main() { gl_FragColor = vec4(1.0); }",
            OutputFormat::Hlsl9,
        );
        let vs = &output.files[0].content;
        assert!(vs.contains("essl_mod_fvec2"), "{vs}");
        assert!(!vs.contains("essl_mod_fvec3"), "{vs}");
        let ps = &output.files[1].content;
        assert!(!ps.contains("essl_mod_fvec2"), "{ps}");
    }

    #[test]
    fn glsl_format_is_the_wrong_backend() {
        let unit = TranslationUnit::default();
        let variables = essl_validate::ShaderVariableSet::default();
        let aliases = HashMap::new();
        let program = ShaderProgram {
            vertex: Some(StageInput { unit: &unit, types: &[] }),
            fragment: None,
            variables: &variables,
            extensions: essl_validate::ExtensionSet::EMPTY,
            uses_clamp_helper: false,
            aliases: &aliases,
        };
        let err = HlslBackend
            .generate(&program, &BackendOptions::default())
            .unwrap_err();
        assert!(matches!(err, BackendError::WrongFormat(OutputFormat::Glsl)));
    }
}
