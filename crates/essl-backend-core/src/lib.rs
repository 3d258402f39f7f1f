#![warn(missing_docs)]
//! Backend trait and registry for ESSL code generation.
//!
//! Defines the [`Backend`] trait that all target-language emitters
//! implement, the [`ShaderProgram`] input they consume, and a
//! [`BackendRegistry`] for CLI dispatch. The built-in [`GlslBackend`]
//! echoes the validated program back as GLSL-ES (the pass-through output
//! format).

use std::fmt::{self, Debug};

use essl_ast::{TranslationUnit, Type};
use essl_validate::{ExtensionSet, OutputFormat, ShaderVariableSet, Validation};

/// One validated stage handed to a backend: the AST plus the expression
/// types the validator computed for it.
#[derive(Clone, Copy)]
pub struct StageInput<'a> {
    /// The validated declaration list.
    pub unit: &'a TranslationUnit,
    /// Expression types indexed by expression handle.
    pub types: &'a [Option<Type>],
}

impl<'a> StageInput<'a> {
    /// Pairs a unit with the validation that covered it.
    pub fn new(unit: &'a TranslationUnit, validation: &'a Validation) -> Self {
        Self {
            unit,
            types: &validation.expr_types,
        }
    }
}

/// Everything a backend needs to translate a program.
pub struct ShaderProgram<'a> {
    /// Vertex stage, when present.
    pub vertex: Option<StageInput<'a>>,
    /// Fragment stage, when present.
    pub fragment: Option<StageInput<'a>>,
    /// Merged variable set of the stages being emitted.
    pub variables: &'a ShaderVariableSet,
    /// Extensions enabled during validation (for the capability prologue).
    pub extensions: ExtensionSet,
    /// Whether the index-clamp helper was injected by validation.
    pub uses_clamp_helper: bool,
    /// Source-name → generated-name map from validation.
    pub aliases: &'a std::collections::HashMap<String, String>,
}

/// Options passed to a backend.
#[derive(Clone, Copy, Debug)]
pub struct BackendOptions {
    /// Which target dialect to produce.
    pub format: OutputFormat,
    /// Draw-buffer count, sizing the expanded `gl_FragData` outputs.
    pub max_draw_buffers: u32,
}

impl Default for BackendOptions {
    fn default() -> Self {
        Self {
            format: OutputFormat::Glsl,
            max_draw_buffers: 1,
        }
    }
}

/// A single output file.
#[derive(Clone, Debug)]
pub struct OutputFile {
    /// Suggested filename (e.g. "shader.vs.hlsl").
    pub name: String,
    /// Generated source text.
    pub content: String,
}

impl fmt::Display for OutputFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// The output produced by a backend.
#[derive(Clone, Debug, Default)]
pub struct BackendOutput {
    /// One file per emitted stage.
    pub files: Vec<OutputFile>,
}

/// Errors that can occur during code generation.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The program uses a construct the target cannot express.
    #[error("unsupported: {0}")]
    Unsupported(String),
    /// The requested format is not handled by this backend.
    #[error("format {0:?} is not supported by this backend")]
    WrongFormat(OutputFormat),
}

/// A backend that turns a validated program into target-language source.
pub trait Backend: Debug {
    /// Human-readable name (e.g. "hlsl").
    fn name(&self) -> &str;

    /// Target identifiers this backend handles (for `--target` dispatch).
    fn targets(&self) -> &[&str];

    /// Generates target source for the stages present in `program`.
    fn generate(
        &self,
        program: &ShaderProgram<'_>,
        opts: &BackendOptions,
    ) -> Result<BackendOutput, BackendError>;
}

/// Registry of available backends, used for CLI `--target` dispatch.
pub struct BackendRegistry {
    backends: Vec<Box<dyn Backend>>,
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl BackendRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            backends: Vec::new(),
        }
    }

    /// Creates a registry pre-populated with the built-in GLSL echo
    /// backend.
    pub fn with_builtins() -> Self {
        let mut reg = Self::new();
        reg.register(Box::new(GlslBackend));
        reg
    }

    /// Registers a backend.
    pub fn register(&mut self, backend: Box<dyn Backend>) {
        self.backends.push(backend);
    }

    /// Finds a backend that handles the given target identifier.
    pub fn find(&self, target: &str) -> Option<&dyn Backend> {
        self.backends
            .iter()
            .find(|b| b.targets().contains(&target))
            .map(|b| &**b)
    }

    /// Lists all supported target identifiers.
    pub fn list_targets(&self) -> Vec<&str> {
        self.backends
            .iter()
            .flat_map(|b| b.targets().iter().copied())
            .collect()
    }
}

/// Pass-through backend: emits the validated program back as GLSL-ES.
#[derive(Debug)]
pub struct GlslBackend;

impl Backend for GlslBackend {
    fn name(&self) -> &str {
        "GLSL echo"
    }

    fn targets(&self) -> &[&str] {
        &["glsl"]
    }

    fn generate(
        &self,
        program: &ShaderProgram<'_>,
        opts: &BackendOptions,
    ) -> Result<BackendOutput, BackendError> {
        if opts.format != OutputFormat::Glsl {
            return Err(BackendError::WrongFormat(opts.format));
        }
        let mut output = BackendOutput::default();
        if let Some(stage) = &program.vertex {
            output.files.push(OutputFile {
                name: "shader.vert".into(),
                content: essl_ast::display::dump_unit(stage.unit),
            });
        }
        if let Some(stage) = &program.fragment {
            output.files.push(OutputFile {
                name: "shader.frag".into(),
                content: essl_ast::display::dump_unit(stage.unit),
            });
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn empty_program<'a>(
        unit: &'a TranslationUnit,
        variables: &'a ShaderVariableSet,
        aliases: &'a HashMap<String, String>,
    ) -> ShaderProgram<'a> {
        ShaderProgram {
            vertex: Some(StageInput { unit, types: &[] }),
            fragment: None,
            variables,
            extensions: ExtensionSet::EMPTY,
            uses_clamp_helper: false,
            aliases,
        }
    }

    #[test]
    fn registry_finds_glsl_backend() {
        let reg = BackendRegistry::with_builtins();
        assert!(reg.find("glsl").is_some());
        assert!(reg.find("missing").is_none());
        assert!(reg.list_targets().contains(&"glsl"));
    }

    #[test]
    fn glsl_backend_round_trips_a_unit() {
        let unit = TranslationUnit::default();
        let variables = ShaderVariableSet::default();
        let aliases = HashMap::new();
        let program = empty_program(&unit, &variables, &aliases);
        let output = GlslBackend
            .generate(&program, &BackendOptions::default())
            .unwrap();
        assert_eq!(output.files.len(), 1);
        assert_eq!(output.files[0].name, "shader.vert");
    }

    #[test]
    fn glsl_backend_rejects_hlsl_format() {
        let unit = TranslationUnit::default();
        let variables = ShaderVariableSet::default();
        let aliases = HashMap::new();
        let program = empty_program(&unit, &variables, &aliases);
        let err = GlslBackend
            .generate(
                &program,
                &BackendOptions {
                    format: OutputFormat::Hlsl9,
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, BackendError::WrongFormat(_)));
    }
}
