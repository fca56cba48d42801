//! JSON Schema model CLI
//!
//! Command-line interface for normalizing schema documents, inspecting
//! their references, and generating schemas from type catalogs.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use json_schema_model::{
    generate_schema, is_url, load_value_auto, load_value_str, read_text, AutoLoader, EnumHandling,
    GeneratorSettings, NullHandling, SchemaDocument, SchemaError, TypeCatalog, TypeRegistry,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "json-schema-model")]
#[command(about = "Parse, normalize and generate JSON Schema documents")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a schema, resolve its references and write it in canonical form
    Format {
        /// Schema source: file path or URL (http:// or https://)
        schema: String,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Exit with status 1 if the input is not already canonical
        #[arg(long)]
        check: bool,
    },

    /// List every $ref in a schema and whether it resolves
    Refs {
        /// Schema source: file path or URL (http:// or https://)
        schema: String,

        /// Output results as JSON (for automation)
        #[arg(long)]
        json: bool,
    },

    /// Generate a schema from a JSON type catalog
    Generate {
        /// Catalog file: a JSON array of object types
        catalog: PathBuf,

        /// Identity of the root type
        #[arg(long = "type", short)]
        type_name: String,

        /// Write enums as their constant names instead of values
        #[arg(long)]
        enum_names: bool,

        /// Express nullability as oneOf with a null branch
        #[arg(long)]
        null_union: bool,

        /// Omit member descriptions
        #[arg(long)]
        no_descriptions: bool,

        /// Fail on type shapes that can't be mapped instead of using any
        #[arg(long)]
        strict: bool,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Format {
            schema,
            output,
            check,
        } => run_format(&schema, output, check),

        Commands::Refs { schema, json } => run_refs(&schema, json),

        Commands::Generate {
            catalog,
            type_name,
            enum_names,
            null_union,
            no_descriptions,
            strict,
            output,
        } => {
            let settings = GeneratorSettings::new()
                .enum_handling(if enum_names {
                    EnumHandling::Name
                } else {
                    EnumHandling::Integer
                })
                .null_handling(if null_union {
                    NullHandling::Union
                } else {
                    NullHandling::Flags
                })
                .include_property_descriptions(!no_descriptions)
                .strict(strict);
            run_generate(&catalog, &type_name, settings, output)
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

/// Logs go to stderr; `RUST_LOG` overrides the default `warn` level.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn fail(e: SchemaError) -> u8 {
    eprintln!("Error: {}", e);
    e.exit_code() as u8
}

/// Raw source text plus the parsed document. URLs have no raw text to
/// compare against, so their text is the pretty-printed fetched value.
fn load_source(source: &str) -> Result<(String, SchemaDocument), u8> {
    let (text, value) = if is_url(source) {
        let value = load_value_auto(source).map_err(fail)?;
        let text = serde_json::to_string_pretty(&value)
            .map_err(|e| fail(SchemaError::MalformedDocument { source: e }))?;
        (text, value)
    } else {
        let text = read_text(Path::new(source)).map_err(fail)?;
        let value = load_value_str(&text).map_err(fail)?;
        (text, value)
    };

    let document = SchemaDocument::from_value_with_loader(&value, &AutoLoader::for_source(source))
        .map_err(fail)?;
    Ok((text, document))
}

fn write_output(output: Option<PathBuf>, text: &str) -> Result<(), u8> {
    match output {
        Some(path) => {
            std::fs::write(&path, text).map_err(|e| {
                eprintln!("Error writing to {}: {}", path.display(), e);
                3u8
            })?;
        }
        None => {
            println!("{}", text);
        }
    }
    Ok(())
}

fn run_format(source: &str, output: Option<PathBuf>, check: bool) -> Result<(), u8> {
    let (original, document) = load_source(source)?;
    let formatted = document.to_json().map_err(fail)?;

    if check {
        if original.trim_end() == formatted {
            println!("{} is canonical", source);
            return Ok(());
        }
        eprintln!("{} is not in canonical form", source);
        return Err(1);
    }

    write_output(output, &formatted)
}

fn run_refs(source: &str, json_output: bool) -> Result<(), u8> {
    let (_, document) = load_source(source)?;
    let locations = document.locations();
    let unresolved = document.unresolved_references();

    let rows: Vec<serde_json::Value> = document
        .references()
        .into_iter()
        .map(|info| {
            let target = info.target.and_then(|id| locations.get(&id).cloned());
            let reason = unresolved
                .iter()
                .find(|u| u.location == info.location && u.pointer == info.pointer)
                .map(|u| u.reason.clone());
            serde_json::json!({
                "location": info.location,
                "pointer": info.pointer,
                "resolved": info.target.is_some(),
                "target": target,
                "error": reason,
            })
        })
        .collect();

    if json_output {
        let output = serde_json::json!({
            "references": rows,
            "unresolved": unresolved.len(),
        });
        println!("{}", output);
    } else {
        for row in &rows {
            let status = if row["resolved"] == true {
                format!("-> {}", row["target"].as_str().unwrap_or("(external)"))
            } else {
                format!("UNRESOLVED: {}", row["error"].as_str().unwrap_or("not bound"))
            };
            println!(
                "{}  {}  {}",
                row["location"].as_str().unwrap_or(""),
                row["pointer"].as_str().unwrap_or(""),
                status
            );
        }
        println!();
        println!("{} references, {} unresolved", rows.len(), unresolved.len());
    }

    if unresolved.is_empty() {
        Ok(())
    } else {
        Err(1)
    }
}

fn run_generate(
    catalog_path: &Path,
    type_name: &str,
    settings: GeneratorSettings,
    output: Option<PathBuf>,
) -> Result<(), u8> {
    let text = read_text(catalog_path).map_err(fail)?;
    let catalog = TypeCatalog::from_json(&text).map_err(fail)?;
    if catalog.object(type_name).is_none() {
        eprintln!("Error: type '{}' not found in {}", type_name, catalog_path.display());
        return Err(2);
    }

    let document = generate_schema(&catalog, type_name, settings).map_err(fail)?;
    let json = document.to_json().map_err(fail)?;
    write_output(output, &json)
}
