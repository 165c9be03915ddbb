//! csvmigrate CLI - Convert CSV files between column vocabularies
//!
//! # Main Commands
//!
//! ```bash
//! csvmigrate generate --name crm      # Generate a schema pair from two samples
//! csvmigrate convert --schemas crm    # Convert a CSV with a stored pair
//! csvmigrate convert --auto           # Pick the stored pair that fits the header
//! csvmigrate serve                    # Start HTTP server (port 3000)
//! ```
//!
//! # Maintenance Commands
//!
//! ```bash
//! csvmigrate check --source-schema s.json --target-schema t.json
//! csvmigrate schemas list
//! csvmigrate schemas show crm
//! csvmigrate schemas delete crm
//! ```
//!
//! Any required value left off the command line is asked for on stdin.

use clap::{Parser, Subcommand};
use csvmigrate::logging::{init_logging, LogConfig, LogFormat};
use csvmigrate::{
    convert_file, generate_and_store, lint, validate_schema_document, AiClient, AiMode,
    AppConfig, ConvertRequest, PipelineError, Schema, SchemaRegistry, SchemaSource, Severity,
};
use serde_json::Value;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "csvmigrate")]
#[command(about = "Convert CSV files between column and value vocabularies", long_about = None)]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty, global = true)]
    log_format: LogFormat,

    /// Output directory (overrides CSVMIGRATE_OUTPUT_DIR)
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a source/target schema pair from two sample CSVs
    Generate {
        /// Sample CSV in the old format
        #[arg(long)]
        source_sample: Option<PathBuf>,

        /// Sample CSV in the new format
        #[arg(long)]
        target_sample: Option<PathBuf>,

        /// Model service: local or cloud
        #[arg(long)]
        mode: Option<String>,

        /// Name to store the pair under
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Convert a CSV file with a schema pair
    Convert {
        /// CSV file to convert
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Source schema file
        #[arg(long, requires = "target_schema", conflicts_with_all = ["schemas", "auto"])]
        source_schema: Option<PathBuf>,

        /// Target schema file
        #[arg(long, requires = "source_schema", conflicts_with_all = ["schemas", "auto"])]
        target_schema: Option<PathBuf>,

        /// Stored schema pair to use
        #[arg(short, long, conflicts_with = "auto")]
        schemas: Option<String>,

        /// Use the stored pair that best fits the data header
        #[arg(long)]
        auto: bool,

        /// Output name (converted_<name>.csv)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Report likely mistakes in a schema pair
    Check {
        /// Source schema file
        #[arg(long)]
        source_schema: PathBuf,

        /// Target schema file
        #[arg(long)]
        target_schema: PathBuf,
    },

    /// Manage stored schema pairs
    Schemas {
        #[command(subcommand)]
        action: SchemasAction,
    },

    /// Start HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },
}

#[derive(Subcommand)]
enum SchemasAction {
    /// List stored pairs
    List,

    /// Print a stored pair
    Show {
        /// Pair name
        name: String,
    },

    /// Delete a stored pair
    Delete {
        /// Pair name
        name: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_config = LogConfig::from_verbosity(cli.verbose).with_format(cli.log_format);
    if let Err(e) = init_logging(&log_config) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let result = match AppConfig::from_env() {
        Ok(config) => {
            let config = match cli.output_dir {
                Some(dir) => config.with_output_dir(dir),
                None => config,
            };
            run(cli.command, config).await
        }
        Err(e) => Err(e.into()),
    };

    if let Err(e) = result {
        print_error_chain(e.as_ref());
        std::process::exit(1);
    }
}

async fn run(command: Commands, config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Generate {
            source_sample,
            target_sample,
            mode,
            name,
        } => cmd_generate(source_sample, target_sample, mode, name, config).await,

        Commands::Convert {
            data,
            source_schema,
            target_schema,
            schemas,
            auto,
            name,
        } => {
            let selection = match (source_schema, target_schema, schemas) {
                (Some(source), Some(target), _) => Some(SchemaSource::Files { source, target }),
                (_, _, Some(name)) => Some(SchemaSource::Stored(name)),
                _ if auto => Some(SchemaSource::Auto),
                _ => None,
            };
            cmd_convert(data, selection, name, config)
        }

        Commands::Check {
            source_schema,
            target_schema,
        } => cmd_check(&source_schema, &target_schema),

        Commands::Schemas { action } => cmd_schemas(action, &config),

        Commands::Serve { port } => cmd_serve(port, config).await,
    }
}

fn print_error_chain(error: &dyn std::error::Error) {
    eprintln!("Error: {}", error);
    let mut source = error.source();
    while let Some(cause) = source {
        eprintln!("  caused by: {}", cause);
        source = cause.source();
    }
}

// =============================================================================
// Interactive prompts
// =============================================================================

/// Ask for a value on stdin. A closed stdin gives an empty answer.
fn prompt(label: &str) -> io::Result<String> {
    let mut stdout = io::stdout();
    write!(stdout, "{}: ", label)?;
    stdout.flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

/// Use the flag value, or ask for it; an empty answer is an error.
fn require_value(value: Option<String>, label: &str, flag: &str) -> Result<String, Box<dyn std::error::Error>> {
    if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
        return Ok(value);
    }
    let answer = prompt(label)?;
    if answer.is_empty() {
        return Err(PipelineError::MissingArgument(flag.to_string()).into());
    }
    Ok(answer)
}

fn require_path(value: Option<PathBuf>, label: &str, flag: &str) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let value = value.map(|p| p.to_string_lossy().into_owned());
    require_value(value, label, flag).map(PathBuf::from)
}

// =============================================================================
// Commands
// =============================================================================

async fn cmd_generate(
    source_sample: Option<PathBuf>,
    target_sample: Option<PathBuf>,
    mode: Option<String>,
    name: Option<String>,
    config: AppConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let source_sample = require_path(source_sample, "Source sample CSV", "--source-sample")?;
    let target_sample = require_path(target_sample, "Target sample CSV", "--target-sample")?;
    let mode = match mode {
        Some(mode) => mode,
        None => prompt(&format!("Mode [local/cloud] (default {})", AiMode::default()))?,
    };
    let mode: AiMode = mode.parse()?;
    let name = require_value(name, "Schema pair name", "--name")?;

    let registry = SchemaRegistry::with_dir(config.schemas_dir());
    let client = AiClient::new(config.ai.with_mode(mode))?;

    let (slug, pair) =
        generate_and_store(&client, &source_sample, &target_sample, &name, &registry).await?;

    println!("Stored schema pair '{}'", slug);
    println!("  Source columns: {}", pair.source.column_names().join(", "));
    println!("  Target columns: {}", pair.target.column_names().join(", "));
    Ok(())
}

fn cmd_convert(
    data: Option<PathBuf>,
    selection: Option<SchemaSource>,
    name: Option<String>,
    config: AppConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = require_path(data, "CSV file to convert", "--data")?;

    let schemas = match selection {
        Some(schemas) => schemas,
        None => {
            let answer = prompt("Stored schema pair name (blank to pick automatically)")?;
            if answer.is_empty() {
                SchemaSource::Auto
            } else {
                SchemaSource::Stored(answer)
            }
        }
    };

    let mut request = ConvertRequest::new(data, schemas).with_output_dir(&config.output_dir);
    if let Some(name) = name {
        request = request.with_name(name);
    }

    let summary = convert_file(&request)?;

    println!("Converted {} rows", summary.rows_converted);
    if let Some(ref schema_name) = summary.schema_name {
        println!("  Schema pair: {}", schema_name);
    }
    println!("  Columns: {}", summary.column_count);
    if !summary.unmapped_targets.is_empty() {
        println!("  Empty columns: {}", summary.unmapped_targets.join(", "));
    }
    println!("  Output: {}", summary.output_path.display());
    Ok(())
}

fn read_json(path: &Path) -> Result<Value, Box<dyn std::error::Error>> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    Ok(serde_json::from_str(&content)
        .map_err(|e| format!("Invalid JSON in {}: {}", path.display(), e))?)
}

fn cmd_check(source_path: &Path, target_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let source_doc = read_json(source_path)?;
    let target_doc = read_json(target_path)?;

    let mut invalid = false;
    for (path, doc) in [(source_path, &source_doc), (target_path, &target_doc)] {
        if let Err(errors) = validate_schema_document(doc) {
            invalid = true;
            println!("{} is not a valid schema:", path.display());
            for err in errors {
                println!("  - {}", err);
            }
        }
    }
    if invalid {
        return Err("schema documents failed validation".into());
    }

    let source = Schema::from_value(&source_doc)?;
    let target = Schema::from_value(&target_doc)?;
    let issues = lint(&source, &target);

    if issues.is_empty() {
        println!("No issues found");
        return Ok(());
    }

    let warnings = issues
        .iter()
        .filter(|i| i.severity == Severity::Warning)
        .count();
    for issue in &issues {
        let tag = match issue.severity {
            Severity::Warning => "warning",
            Severity::Info => "info",
        };
        println!("{:>7}: {}", tag, issue);
    }
    println!(
        "\n{} warning(s), {} note(s)",
        warnings,
        issues.len() - warnings
    );
    Ok(())
}

fn cmd_schemas(action: SchemasAction, config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let registry = SchemaRegistry::with_dir(config.schemas_dir());

    match action {
        SchemasAction::List => {
            let pairs = registry.list()?;
            if pairs.is_empty() {
                println!("No schema pairs stored in {}", registry.dir().display());
                println!("Use 'csvmigrate generate' to create one.");
                return Ok(());
            }

            println!("Stored schema pairs ({}):\n", pairs.len());
            for pair in pairs {
                let state = if pair.is_complete() {
                    "complete"
                } else if pair.has_source {
                    "missing target schema"
                } else {
                    "missing source schema"
                };
                println!("  {} ({})", pair.name, state);
                if let Some(ref modified) = pair.modified {
                    println!("     Modified: {}", modified);
                }
            }
        }

        SchemasAction::Show { name } => {
            let pair = registry.load(&name)?;
            println!("Schema pair: {}\n", name);
            println!("Source schema:");
            println!("{}", pair.source.to_json()?);
            println!("\nTarget schema:");
            println!("{}", pair.target.to_json()?);
        }

        SchemasAction::Delete { name } => {
            registry.delete(&name)?;
            println!("Deleted schema pair: {}", name);
        }
    }

    Ok(())
}

async fn cmd_serve(port: u16, config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    csvmigrate::server::start_server(port, config).await
}
