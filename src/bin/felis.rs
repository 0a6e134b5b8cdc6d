//! Felis CLI
//!
//! Validates schema documents and renders them as a resolved model, SQL
//! metadata, or TAP_SCHEMA rows.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use felis::config::{FelisConfig, OutputFormat};
use felis::diagnostics::{DiagnosticCode, Diagnostics};
use felis::{
    build_metadata, build_tap, validate_document, ColumnSpec, Dialect, FelisType, SchemaGraph,
    TypeMapper,
};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Length used when listing the renders of sized types
const SAMPLE_LENGTH: u32 = 32;

#[derive(Parser)]
#[command(name = "felis")]
#[command(about = "Validate and transform Felis schema documents")]
struct Cli {
    /// Configuration file layered over the default locations
    #[arg(short, long)]
    config: Option<String>,

    /// Treat duplicate @id values as errors
    #[arg(long)]
    strict: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate documents (files or directories of *.json)
    Validate {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Print the resolved schema model
    Dump {
        file: PathBuf,
        /// Assign missing @id values from names
        #[arg(long)]
        generate_ids: bool,
    },

    /// Print TAP_SCHEMA rows
    Tap {
        file: PathBuf,
        /// Catalog prefix for schema and table names
        #[arg(long)]
        catalog: Option<String>,
        /// Schema name override
        #[arg(long)]
        schema_name: Option<String>,
        /// Schema index override
        #[arg(long)]
        schema_index: Option<i64>,
    },

    /// Print SQL metadata with column types for one dialect
    Metadata {
        file: PathBuf,
        #[arg(short, long, default_value = "sqlite")]
        dialect: Dialect,
    },

    /// List the datatypes and their classifications
    Types,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = FelisConfig::load_from(cli.config.as_deref())?;
    if cli.strict {
        config.validation.strict_ids = true;
    }
    let format = config.output.format;

    match cli.command {
        Commands::Validate { paths } => {
            let mut diagnostics = Diagnostics::new();
            let mut checked = 0;

            for file in paths.iter().flat_map(|p| collect_documents(p)) {
                checked += 1;
                let document = match read_document(&file) {
                    Ok(document) => document,
                    Err(e) => {
                        diagnostics.record(
                            file.display().to_string(),
                            DiagnosticCode::ValidationFailed,
                            e.to_string(),
                        );
                        continue;
                    }
                };
                match validate_document(&document, &config.validation) {
                    Ok(found) => {
                        debug!("{}: {} diagnostics", file.display(), found.len());
                        diagnostics.merge(found);
                    }
                    Err(e) => diagnostics.record(
                        file.display().to_string(),
                        DiagnosticCode::ValidationFailed,
                        e.to_string(),
                    ),
                }
            }

            if !diagnostics.is_empty() {
                println!("{}", diagnostics.format_all());
            }
            info!("Validated {} documents", checked);
            if diagnostics.has_errors() {
                println!(
                    "❌ {} of {} documents failed validation",
                    diagnostics.error_count(),
                    checked
                );
                std::process::exit(1);
            }
            println!(
                "✅ {} documents valid ({} warnings)",
                checked,
                diagnostics.warning_count()
            );
            Ok(())
        }

        Commands::Dump { file, generate_ids } => {
            let document = read_document(&file)?;
            let mut options = config.validation.clone();
            options.id_generation |= generate_ids;

            let built = SchemaGraph::build_with(&document, &options)?;
            report(&built.diagnostics);
            print_json(&built.schema, format)
        }

        Commands::Tap {
            file,
            catalog,
            schema_name,
            schema_index,
        } => {
            let document = read_document(&file)?;
            let mut options = config.tap.clone();
            if catalog.is_some() {
                options.catalog_name = catalog;
            }
            if schema_name.is_some() {
                options.schema_name = schema_name;
            }
            if schema_index.is_some() {
                options.schema_index = schema_index;
            }

            let (rows, _, diagnostics) = build_tap(&document, &config.validation, &options)?;
            report(&diagnostics);
            print_json(&rows, format)
        }

        Commands::Metadata { file, dialect } => {
            let document = read_document(&file)?;
            let (metadata, _, mut diagnostics) =
                build_metadata(&document, &config.validation, &config.metadata)?;
            if metadata.has_foreign_key_cycle() {
                diagnostics.record(
                    metadata.schema_name.clone(),
                    DiagnosticCode::ForeignKeyCycle,
                    "Foreign keys form a cycle; tables are listed in document order",
                );
            }
            report(&diagnostics);

            let tables: Vec<Value> = metadata
                .sorted_tables()
                .into_iter()
                .map(|table| {
                    let columns: Vec<Value> = table
                        .columns
                        .iter()
                        .map(|c| {
                            serde_json::json!({
                                "name": c.name,
                                "type": c.sql_type(dialect),
                                "nullable": c.nullable,
                            })
                        })
                        .collect();
                    serde_json::json!({
                        "name": table.qualified_name(),
                        "columns": columns,
                        "primaryKey": table.primary_key,
                    })
                })
                .collect();

            print_json(
                &serde_json::json!({
                    "dialect": dialect.name(),
                    "schema": metadata.schema_name,
                    "tables": tables,
                }),
                format,
            )
        }

        Commands::Types => {
            let mapper = TypeMapper::new();
            print!(
                "{:<10} {:<13} {:>7} {:>5} {:>9}",
                "type", "votable", "numeric", "sized", "timestamp"
            );
            for dialect in Dialect::ALL {
                print!("  {:<24}", dialect.name());
            }
            println!();

            for datatype in FelisType::all() {
                let mut spec = ColumnSpec::new(datatype.name(), datatype);
                if datatype.is_sized() {
                    spec = spec.with_length(SAMPLE_LENGTH);
                }
                let mapped = mapper.map_column(&spec)?;

                print!(
                    "{:<10} {:<13} {:>7} {:>5} {:>9}",
                    datatype.name(),
                    datatype.votable_name(),
                    datatype.is_numeric(),
                    datatype.is_sized(),
                    datatype.is_timestamp()
                );
                for dialect in Dialect::ALL {
                    print!("  {:<24}", mapped.render(dialect));
                }
                println!();
            }
            Ok(())
        }
    }
}

/// A file, or every *.json file under a directory
fn collect_documents(path: &Path) -> Vec<PathBuf> {
    if path.is_file() {
        return vec![path.to_path_buf()];
    }
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().map(|x| x == "json").unwrap_or(false))
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}

fn read_document(path: &Path) -> anyhow::Result<Value> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
    let document = serde_json::from_str(&content)
        .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path.display(), e))?;
    Ok(document)
}

/// Non-fatal diagnostics go to stderr so stdout stays parseable
fn report(diagnostics: &Diagnostics) {
    if !diagnostics.is_empty() {
        eprintln!("{}", diagnostics.format_all());
    }
}

fn print_json<T: Serialize>(
    value: &T,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let json = match format {
        OutputFormat::Pretty => serde_json::to_string_pretty(value)?,
        OutputFormat::Compact => serde_json::to_string(value)?,
    };
    println!("{}", json);
    Ok(())
}
