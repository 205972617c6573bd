//! CLI Application logic
//!
//! Contains the command-line interface implementation.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use docfill_ooxml::{write_atomic, LogSink, ReplacementMap, SubstitutionReport, Template};
use docfill_render::RenderFormat;

use crate::config::Settings;

/// Output format for command results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    #[default]
    Text,
    /// JSON output for scripts and other tools
    Json,
}

#[derive(Parser)]
#[command(name = "docfill")]
#[command(author, version, about = "Fill placeholders in DOCX templates", long_about = None)]
struct Cli {
    /// Configuration file path (defaults to ./docfill.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the placeholders used in a template
    Placeholders {
        /// Input DOCX file
        input: PathBuf,

        /// Output format (text or json)
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Fill a template with values
    Fill {
        /// Input DOCX template
        input: PathBuf,

        /// Output DOCX file
        #[arg(short, long)]
        output: PathBuf,

        /// JSON file mapping placeholders to values ("-" reads stdin)
        #[arg(long)]
        values: Option<PathBuf>,

        /// Single value as TOKEN=VALUE; TOKEN may omit the delimiters
        #[arg(long = "set", value_name = "TOKEN=VALUE")]
        set: Vec<String>,

        /// Re-save the template through the rendering engine first
        #[arg(long)]
        normalize: bool,

        /// Strict mode: fail without writing if any value went unused
        #[arg(long)]
        strict: bool,

        /// Output format of the fill report (text or json)
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Report whether a document is portrait or landscape
    Orientation {
        /// Input DOCX file
        input: PathBuf,

        /// Output format (text or json)
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Convert a document with the rendering engine
    Convert {
        /// Input DOCX file
        input: PathBuf,

        /// Target format (pdf, html or docx)
        #[arg(long, default_value = "pdf")]
        to: RenderFormat,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Show which rendering engines are reachable
    Probe {
        /// Output format (text or json)
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

/// Run the CLI application
///
/// This is the main entry point for the command-line interface.
/// It parses arguments and dispatches to the appropriate command.
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Placeholders { input, format } => {
            placeholders_command(&settings, &input, format)?;
        }
        Commands::Fill {
            input,
            output,
            values,
            set,
            normalize,
            strict,
            format,
        } => {
            let replacements = collect_values(&settings, values.as_deref(), &set)?;
            let options = FillOptions {
                normalize,
                strict,
                format,
            };
            fill_command(&settings, &input, &output, &replacements, options)?;
        }
        Commands::Orientation { input, format } => {
            orientation_command(&settings, &input, format)?;
        }
        Commands::Convert { input, to, output } => {
            convert_command(&settings, &input, to, &output)?;
        }
        Commands::Probe { format } => {
            probe_command(&settings, format)?;
        }
    }

    Ok(())
}

/// Install the stderr log subscriber
fn init_logging(verbose: bool) {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    // A second initialization (e.g. from tests) is harmless
    let _ = tracing_subscriber::fmt()
        .with_env_filter(log_filter(verbose, rust_log.as_deref()))
        .with_writer(std::io::stderr)
        .try_init();
}

/// `-v` forces debug; otherwise `RUST_LOG` decides, defaulting to info
fn log_filter(verbose: bool, rust_log: Option<&str>) -> EnvFilter {
    if verbose {
        return EnvFilter::new("debug");
    }
    rust_log
        .filter(|directives| !directives.trim().is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

fn ensure_input(input: &Path) -> Result<()> {
    if !input.exists() {
        anyhow::bail!("Input file not found: {}", input.display());
    }
    Ok(())
}

fn load_template(settings: &Settings, input: &Path) -> Result<Template> {
    ensure_input(input)?;
    Template::load_with(&settings.package_store(), input)
        .with_context(|| format!("Failed to open DOCX file: {}", input.display()))?
        .with_delimiters(settings.delimiters()?)
        .context("Invalid placeholder delimiters")
}

/// Build the replacement map from a JSON file and `--set` pairs; later
/// pairs win
pub fn collect_values(
    settings: &Settings,
    values: Option<&Path>,
    pairs: &[String],
) -> Result<ReplacementMap> {
    let mut map = match values {
        Some(path) => {
            let json = if path == Path::new("-") {
                let mut buffer = String::new();
                std::io::stdin()
                    .read_to_string(&mut buffer)
                    .context("Failed to read values from stdin")?;
                buffer
            } else {
                fs::read_to_string(path)
                    .with_context(|| format!("Failed to read values: {}", path.display()))?
            };
            ReplacementMap::from_json_str(&json)
                .with_context(|| format!("Values must be a JSON object: {}", path.display()))?
        }
        None => ReplacementMap::new(),
    };

    let delimiters = settings.delimiters()?;
    for pair in pairs {
        let (token, value) = pair
            .split_once('=')
            .with_context(|| format!("Expected TOKEN=VALUE, got {:?}", pair))?;
        if token.is_empty() {
            anyhow::bail!("Empty token in {:?}", pair);
        }
        map.insert_identifier(&delimiters, token, value);
    }

    Ok(map)
}

/// Execute the placeholders command
pub fn placeholders_command(settings: &Settings, input: &Path, format: OutputFormat) -> Result<()> {
    let template = load_template(settings, input)?;
    let tokens = template
        .placeholders()
        .with_context(|| format!("Failed to scan document: {}", input.display()))?;

    match format {
        OutputFormat::Text => {
            if tokens.is_empty() {
                println!("No placeholders found in {}", input.display());
            }
            for token in &tokens {
                println!("{}", token);
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&tokens)?);
        }
    }

    Ok(())
}

/// Switches for the fill command
#[derive(Debug, Clone, Copy, Default)]
pub struct FillOptions {
    pub normalize: bool,
    pub strict: bool,
    pub format: OutputFormat,
}

/// Execute the fill command
pub fn fill_command(
    settings: &Settings,
    input: &Path,
    output: &Path,
    replacements: &ReplacementMap,
    options: FillOptions,
) -> Result<SubstitutionReport> {
    ensure_input(input)?;

    // Keeps the normalized copy alive until the fill is done
    let normalized = options.normalize.then(|| {
        tracing::debug!(input = %input.display(), "Normalizing before fill");
        settings.orchestrator().normalize(input)
    });
    let source = normalized.as_ref().map_or(input, |n| n.path());

    let filled = load_template(settings, source)?
        .with_sink(Arc::new(LogSink))
        .fill(replacements)
        .with_context(|| format!("Failed to fill template: {}", input.display()))?;

    if options.strict && !filled.report.is_complete() {
        anyhow::bail!(
            "Unused values (strict mode): {}",
            filled.report.unmatched.join(", ")
        );
    }

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    filled
        .save(output)
        .with_context(|| format!("Failed to write output: {}", output.display()))?;

    tracing::info!(
        output = %output.display(),
        occurrences = filled.report.total_occurrences(),
        unmatched = filled.report.unmatched.len(),
        "Filled template"
    );
    print_report(&filled.report, output, options.format)?;
    Ok(filled.report)
}

fn print_report(report: &SubstitutionReport, output: &Path, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            println!("Filled: {}", output.display());
            for replaced in &report.replaced {
                println!("  {} x{}", replaced.token, replaced.occurrences());
            }
            for token in &report.unmatched {
                println!("  {} not found", token);
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report)?);
        }
    }
    Ok(())
}

/// Execute the orientation command
pub fn orientation_command(settings: &Settings, input: &Path, format: OutputFormat) -> Result<()> {
    let template = load_template(settings, input)?;
    let orientation = template
        .orientation()
        .with_context(|| format!("Failed to read document: {}", input.display()))?;

    match format {
        OutputFormat::Text => println!("{}", orientation),
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({ "orientation": orientation })
            );
        }
    }
    Ok(())
}

/// Execute the convert command
pub fn convert_command(
    settings: &Settings,
    input: &Path,
    to: RenderFormat,
    output: &Path,
) -> Result<()> {
    ensure_input(input)?;
    let orchestrator = settings.orchestrator();

    let bytes = match to {
        RenderFormat::Pdf => orchestrator.render_pdf(input),
        RenderFormat::Html => {
            let scratch = tempfile::tempdir().context("Failed to create temporary directory")?;
            orchestrator
                .render_html(input, scratch.path())
                .and_then(|path| Ok(fs::read(path)?))
        }
        RenderFormat::Docx => {
            let normalized = orchestrator.normalize(input);
            if !normalized.is_normalized() {
                anyhow::bail!("No rendering engine could re-save {}", input.display());
            }
            normalized.read()
        }
    }
    .with_context(|| format!("Failed to convert {} to {}", input.display(), to))?;

    write_atomic(output, &bytes)
        .with_context(|| format!("Failed to write output: {}", output.display()))?;
    println!("Converted: {} ({} bytes)", output.display(), bytes.len());
    Ok(())
}

/// Execute the probe command
pub fn probe_command(settings: &Settings, format: OutputFormat) -> Result<()> {
    let orchestrator = settings.orchestrator();
    let available = orchestrator.available_engines();
    let engines: Vec<(&str, bool)> = orchestrator
        .engine_names()
        .into_iter()
        .map(|name| (name, available.contains(&name)))
        .collect();

    match format {
        OutputFormat::Text => {
            for (name, ok) in &engines {
                let status = if *ok { "available" } else { "unavailable" };
                println!("{:<8} {}", name, status);
            }
        }
        OutputFormat::Json => {
            let map: serde_json::Map<String, serde_json::Value> = engines
                .iter()
                .map(|(name, ok)| (name.to_string(), serde_json::Value::Bool(*ok)))
                .collect();
            println!("{}", serde_json::Value::Object(map));
        }
    }

    if available.is_empty() {
        anyhow::bail!("No rendering engine is reachable");
    }
    Ok(())
}
