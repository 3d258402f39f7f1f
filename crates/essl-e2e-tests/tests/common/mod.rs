use std::collections::HashMap;

use essl_ast::TranslationUnit;
use essl_backend_core::{
    Backend, BackendOptions, BackendOutput, ShaderProgram, StageInput,
};
use essl_backend_hlsl::HlslBackend;
use essl_validate::{
    check_linkage, validate_unit, Config, Outcome, OutputFormat, ShaderStage, Validation,
};

/// Parse and validate one stage, panicking on parse errors.
#[allow(dead_code)]
pub fn validate(source: &str, stage: ShaderStage, config: &Config) -> (TranslationUnit, Validation) {
    let parsed = essl_front::parse(source);
    assert!(
        parsed.is_clean(),
        "parse failed for {source:?}: {:?}",
        parsed.diagnostics
    );
    let mut unit = parsed.unit;
    let validation = validate_unit(&mut unit, stage, config);
    (unit, validation)
}

/// Parse and validate without asserting cleanliness; for hostile input.
#[allow(dead_code)]
pub fn try_validate(source: &str, stage: ShaderStage, config: &Config) -> Validation {
    let parsed = essl_front::parse(source);
    let mut unit = parsed.unit;
    validate_unit(&mut unit, stage, config)
}

/// The result of running a vertex/fragment pair through the full pipeline.
#[allow(dead_code)]
pub struct Linked {
    pub vs_unit: TranslationUnit,
    pub vs: Validation,
    pub ps_unit: TranslationUnit,
    pub ps: Validation,
    pub link_diagnostics: Vec<essl_ast::Diagnostic>,
}

/// Validate both stages and run the linkage check over the results.
#[allow(dead_code)]
pub fn link(vertex_src: &str, fragment_src: &str, config: &Config) -> Linked {
    let (vs_unit, vs) = validate(vertex_src, ShaderStage::Vertex, config);
    let (ps_unit, ps) = validate(fragment_src, ShaderStage::Fragment, config);
    let link_diagnostics = check_linkage(&vs, &ps);
    Linked {
        vs_unit,
        vs,
        ps_unit,
        ps,
        link_diagnostics,
    }
}

/// Validate and transpile a program pair to the given HLSL profile,
/// panicking if any step fails.
#[allow(dead_code)]
pub fn emit_hlsl(vertex_src: &str, fragment_src: &str, format: OutputFormat) -> BackendOutput {
    let config = Config {
        output_format: format,
        ..Config::default()
    };
    emit_hlsl_with(vertex_src, fragment_src, &config)
}

/// Like [`emit_hlsl`] but with a caller-supplied configuration (limits,
/// indexing policy, extension support).
#[allow(dead_code)]
pub fn emit_hlsl_with(vertex_src: &str, fragment_src: &str, config: &Config) -> BackendOutput {
    assert!(config.output_format.is_hlsl());
    let linked = link(vertex_src, fragment_src, config);
    assert_eq!(linked.vs.outcome, Outcome::Validated, "{:?}", linked.vs.diagnostics);
    assert_eq!(linked.ps.outcome, Outcome::Validated, "{:?}", linked.ps.diagnostics);
    assert!(
        linked.link_diagnostics.is_empty(),
        "link: {:?}",
        linked.link_diagnostics
    );

    let mut variables = linked.vs.variables.clone();
    variables.merge(&linked.ps.variables);
    let mut aliases: HashMap<String, String> = linked.vs.aliases.clone();
    aliases.extend(linked.ps.aliases.clone());

    let mut extensions = linked.vs.extensions;
    for ext in linked.ps.extensions.iter() {
        extensions.insert(ext);
    }

    let program = ShaderProgram {
        vertex: Some(StageInput::new(&linked.vs_unit, &linked.vs)),
        fragment: Some(StageInput::new(&linked.ps_unit, &linked.ps)),
        variables: &variables,
        extensions,
        uses_clamp_helper: linked.vs.uses_clamp_helper || linked.ps.uses_clamp_helper,
        aliases: &aliases,
    };
    HlslBackend
        .generate(
            &program,
            &BackendOptions {
                format: config.output_format,
                max_draw_buffers: config.max_draw_buffers,
            },
        )
        .expect("code generation failed")
}

/// The named output file's text.
#[allow(dead_code)]
pub fn file_text<'a>(output: &'a BackendOutput, name: &str) -> &'a str {
    &output
        .files
        .iter()
        .find(|f| f.name == name)
        .unwrap_or_else(|| panic!("no output file named {name}"))
        .content
}
