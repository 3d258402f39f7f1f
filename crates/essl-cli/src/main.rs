use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use miette::{Context, IntoDiagnostic};

use essl_ast::{Diagnostic, TranslationUnit};
use essl_backend_core::{Backend, BackendOptions, BackendRegistry, ShaderProgram, StageInput};
use essl_validate::{
    check_linkage, validate_unit, Config, Outcome, OutputFormat, ShaderStage, Validation,
};

/// ESSL — GLSL-ES shader validator and HLSL transpiler
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Vertex shader source file
    #[arg(long)]
    vertex: Option<PathBuf>,

    /// Fragment shader source file
    #[arg(long)]
    fragment: Option<PathBuf>,

    /// Target language (default: glsl)
    #[arg(short, long, default_value = "glsl", value_parser = parse_target)]
    target: OutputFormat,

    /// Generate target-language source (validate only without this)
    #[arg(long)]
    emit: bool,

    /// Print the resolved attribute/uniform/varying sets
    #[arg(long)]
    show_variables: bool,

    /// Mark GL_OES_standard_derivatives as available for enabling
    #[arg(long)]
    enable_derivatives: bool,

    /// Output directory for generated files (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn parse_target(s: &str) -> Result<OutputFormat, String> {
    match s {
        "glsl" => Ok(OutputFormat::Glsl),
        "hlsl9" => Ok(OutputFormat::Hlsl9),
        "hlsl10" => Ok(OutputFormat::Hlsl10),
        _ => Err(format!(
            "invalid target '{s}', expected glsl, hlsl9, or hlsl10"
        )),
    }
}

fn main() -> ExitCode {
    env_logger::init();
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::FAILURE
        }
    }
}

/// One loaded and checked stage.
struct Stage {
    unit: TranslationUnit,
    validation: Validation,
    clean_parse: bool,
}

fn run() -> miette::Result<()> {
    let cli = Cli::parse();

    if cli.vertex.is_none() && cli.fragment.is_none() {
        return Err(miette::miette!(
            "no input: pass --vertex and/or --fragment source files"
        ));
    }

    let config = Config {
        output_format: cli.target,
        support_oes_derivatives: cli.enable_derivatives,
        ..Config::default()
    };

    let vertex = cli
        .vertex
        .as_ref()
        .map(|path| check_stage(path, ShaderStage::Vertex, &config))
        .transpose()?;
    let fragment = cli
        .fragment
        .as_ref()
        .map(|path| check_stage(path, ShaderStage::Fragment, &config))
        .transpose()?;

    // Link-time checks run over whatever the stages exported, even when
    // one of them was rejected.
    let mut rejected = false;
    for stage in [&vertex, &fragment].into_iter().flatten() {
        rejected |= !stage.clean_parse || stage.validation.outcome != Outcome::Validated;
    }
    if let (Some(vs), Some(ps)) = (&vertex, &fragment) {
        let link_diags = check_linkage(&vs.validation, &ps.validation);
        print_diagnostics("link", &link_diags);
        rejected |= !link_diags.is_empty();
    }

    if cli.show_variables {
        for stage in [&vertex, &fragment].into_iter().flatten() {
            print_variables(stage);
        }
    }

    // A cleanly reported rejection still exits 0; only I/O and internal
    // failures are process errors.
    if rejected {
        println!("rejected");
        return Ok(());
    }
    println!("validated");

    if !cli.emit {
        return Ok(());
    }

    let mut variables = essl_validate::ShaderVariableSet::default();
    let mut aliases: HashMap<String, String> = HashMap::new();
    let mut extensions = essl_validate::ExtensionSet::EMPTY;
    let mut uses_clamp_helper = false;
    if let Some(vs) = &vertex {
        variables = vs.validation.variables.clone();
        aliases.extend(vs.validation.aliases.clone());
        for ext in vs.validation.extensions.iter() {
            extensions.insert(ext);
        }
        uses_clamp_helper |= vs.validation.uses_clamp_helper;
    }
    if let Some(ps) = &fragment {
        variables.merge(&ps.validation.variables);
        aliases.extend(ps.validation.aliases.clone());
        for ext in ps.validation.extensions.iter() {
            extensions.insert(ext);
        }
        uses_clamp_helper |= ps.validation.uses_clamp_helper;
    }

    let program = ShaderProgram {
        vertex: vertex
            .as_ref()
            .map(|s| StageInput::new(&s.unit, &s.validation)),
        fragment: fragment
            .as_ref()
            .map(|s| StageInput::new(&s.unit, &s.validation)),
        variables: &variables,
        extensions,
        uses_clamp_helper,
        aliases: &aliases,
    };

    let mut registry = BackendRegistry::with_builtins();
    registry.register(Box::new(essl_backend_hlsl::HlslBackend));
    let target_name = match cli.target {
        OutputFormat::Glsl => "glsl",
        OutputFormat::Hlsl9 => "hlsl9",
        OutputFormat::Hlsl10 => "hlsl10",
    };
    let backend = registry.find(target_name).ok_or_else(|| {
        let available = registry.list_targets().join(", ");
        miette::miette!("unknown target '{target_name}' (available: {available})")
    })?;

    let opts = BackendOptions {
        format: cli.target,
        max_draw_buffers: config.max_draw_buffers,
    };
    let output = backend
        .generate(&program, &opts)
        .map_err(|e| miette::miette!("{e}"))
        .wrap_err("code generation failed")?;

    for file in &output.files {
        match &cli.output {
            Some(dir) => {
                std::fs::create_dir_all(dir)
                    .into_diagnostic()
                    .wrap_err_with(|| format!("failed to create {}", dir.display()))?;
                let path = dir.join(&file.name);
                std::fs::write(&path, &file.content)
                    .into_diagnostic()
                    .wrap_err_with(|| format!("failed to write {}", path.display()))?;
            }
            None => {
                println!("// --- {} ---", file.name);
                print!("{}", file.content);
            }
        }
    }

    Ok(())
}

fn check_stage(path: &PathBuf, stage: ShaderStage, config: &Config) -> miette::Result<Stage> {
    let source = std::fs::read_to_string(path)
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to read {}", path.display()))?;

    let parsed = essl_front::parse(&source);
    print_diagnostics(&stage.to_string(), &parsed.diagnostics);
    let clean_parse = parsed.is_clean();
    let mut unit = parsed.unit;
    let validation = validate_unit(&mut unit, stage, config);
    print_diagnostics(&stage.to_string(), &validation.diagnostics);
    Ok(Stage {
        unit,
        validation,
        clean_parse,
    })
}

fn print_diagnostics(label: &str, diagnostics: &[Diagnostic]) {
    for diag in diagnostics {
        eprintln!("{label}: {diag}");
    }
}

fn print_variables(stage: &Stage) {
    let vars = &stage.validation.variables;
    println!("{} stage:", stage.validation.stage);
    for var in vars.attributes() {
        println!(
            "  attribute {} {}",
            essl_ast::display::type_name(&var.ty),
            var.name
        );
    }
    for var in vars.uniforms() {
        println!(
            "  uniform {} {}",
            essl_ast::display::type_name(&var.ty),
            var.name
        );
    }
    for var in vars.varyings() {
        println!(
            "  varying {} {}",
            essl_ast::display::type_name(&var.ty),
            var.name
        );
    }
}
