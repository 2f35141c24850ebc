//! ngxgen - build nginx configurations from a structured model
//!
//! This is the main entry point for the ngxgen CLI.

mod render;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use ngxgen_config::{apply_fix, generate, lint, parse_bytes, validate, NginxConfig, Severity};
use ngxgen_core::config::{presets, ConfigLoader};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// ngxgen - nginx configuration generator, importer and linter
#[derive(Parser)]
#[command(name = "ngxgen")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import an nginx configuration file into a model
    Import {
        /// nginx configuration file
        file: PathBuf,

        /// Print the model as JSON instead of TOML
        #[arg(long)]
        json: bool,
    },

    /// Render nginx configuration from a model file or a preset
    Generate {
        /// Model file (.json or .toml)
        #[arg(required_unless_present = "preset", conflicts_with = "preset")]
        model: Option<PathBuf>,

        /// Start from a shipped preset instead
        #[arg(long)]
        preset: Option<String>,

        /// Write the configuration here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check a model or nginx file for semantic problems
    Validate {
        /// Model file or nginx configuration
        file: PathBuf,
    },

    /// Score a model or nginx file against the lint rules
    Lint {
        /// Model file or nginx configuration
        file: PathBuf,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Apply one lint rule's automatic fix and print the result
    Fix {
        /// Model file or nginx configuration
        file: PathBuf,

        /// Lint rule id, as shown by `ngxgen lint`
        rule: String,

        /// Print the fixed model as JSON instead of nginx text
        #[arg(long)]
        json: bool,
    },

    /// List the shipped presets
    Presets,

    /// Show version information
    Version,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so generated output can be piped
    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match cli.command {
        Commands::Import { file, json } => {
            let source = std::fs::read(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let output = parse_bytes(&source)
                .with_context(|| format!("failed to import {}", file.display()))?;

            let text = String::from_utf8_lossy(&source);
            render::parse_errors(&file.display().to_string(), &text, &output.parse_errors);
            for warning in &output.warnings {
                eprintln!("⚠️  {}", warning);
            }

            let model = if json {
                ConfigLoader::to_json(&output.config)?
            } else {
                ConfigLoader::to_toml(&output.config)?
            };
            println!("{}", model);

            if !output.parse_errors.is_empty() {
                eprintln!("❌ {} parse error(s); the model above is partial", output.parse_errors.len());
                std::process::exit(1);
            }
        }

        Commands::Generate { model, preset, output } => {
            let config = match (model, preset) {
                (_, Some(id)) => match presets::find(&id) {
                    Some(preset) => preset.config,
                    None => bail!("unknown preset '{}' (see `ngxgen presets`)", id),
                },
                (Some(path), None) => ConfigLoader::load(&path)
                    .with_context(|| format!("failed to load model {}", path.display()))?,
                (None, None) => bail!("a model file or --preset is required"),
            };

            let generated = generate(&config);
            for warning in &generated.warnings {
                eprintln!("⚠️  {}", warning);
            }
            write_output(output.as_deref(), &generated.text)?;
        }

        Commands::Validate { file } => {
            let config = load_config(&file)?;
            let findings = validate(&config);
            render::validation(&findings);
            if findings.iter().any(|f| f.severity == Severity::Error) {
                std::process::exit(1);
            }
        }

        Commands::Lint { file, json } => {
            let config = load_config(&file)?;
            let report = lint(&config);
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                render::lint(&report);
            }
            if !report.valid {
                std::process::exit(1);
            }
        }

        Commands::Fix { file, rule, json } => {
            let config = load_config(&file)?;
            let outcome = apply_fix(&config, &rule)?;
            tracing::info!(rule = %rule, "applied fix");
            for warning in &outcome.output.warnings {
                eprintln!("⚠️  {}", warning);
            }
            if json {
                println!("{}", ConfigLoader::to_json(&outcome.config)?);
            } else {
                print!("{}", outcome.output.text);
            }
        }

        Commands::Presets => {
            for preset in presets::all() {
                println!("{:<15} {}", preset.id, preset.name);
                println!("{:<15} {}", "", preset.description);
            }
        }

        Commands::Version => {
            println!("ngxgen v{}", env!("CARGO_PKG_VERSION"));
            println!("ngxgen-core v{}", ngxgen_core::VERSION);
        }
    }

    Ok(())
}

/// A model file, or nginx text imported on the fly
fn load_config(path: &Path) -> anyhow::Result<NginxConfig> {
    if ConfigLoader::is_model_file(path) {
        return ConfigLoader::load(path)
            .with_context(|| format!("failed to load model {}", path.display()));
    }

    let source = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let output = parse_bytes(&source).with_context(|| format!("failed to import {}", path.display()))?;
    if !output.parse_errors.is_empty() {
        render::parse_errors(
            &path.display().to_string(),
            &String::from_utf8_lossy(&source),
            &output.parse_errors,
        );
        tracing::warn!(
            errors = output.parse_errors.len(),
            "continuing with a partially imported model"
        );
    }
    for warning in &output.warnings {
        tracing::warn!("{}", warning);
    }
    Ok(output.config)
}

fn write_output(path: Option<&Path>, text: &str) -> anyhow::Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))?;
            tracing::info!("wrote {}", path.display());
        }
        None => print!("{}", text),
    }
    Ok(())
}
