//! Schema Path CLI
//!
//! Command-line interface for walking, checking, and linting record bundles.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use schema_path::{
    lint_bundle, load_json_auto, validate_record, walk, Connection, MemoryStore, SchemaStatus,
    Severity, ValidateError,
};

#[derive(Parser)]
#[command(name = "schema-path")]
#[command(about = "Walk schema-aware paths over typed record bundles")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a path expression against schema and record bundles
    Walk {
        /// Schema bundle source: file path or URL (http:// or https://)
        schemas: String,

        /// Record bundle source: file path or URL
        records: String,

        /// Path expression, e.g. type/id/attr[key]/leaf?flat
        path: String,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Validate records of a bundle against their schemas
    Check {
        /// Schema bundle source: file path or URL
        schemas: String,

        /// Record bundle source: file path or URL
        records: String,

        /// Only check records of this type
        #[arg(long = "type")]
        record_type: Option<String>,

        /// Output results as JSON (for automation)
        #[arg(long)]
        json: bool,
    },

    /// Lint a schema bundle (dangling refs, bad templates, unknown types)
    Lint {
        /// Schema bundle source: file path or URL
        schemas: String,

        /// Output format: text (default) or json
        #[arg(long, default_value = "text")]
        format: String,

        /// Treat warnings as errors
        #[arg(long)]
        strict: bool,

        /// Suppress progress output, only show problems
        #[arg(long, short)]
        quiet: bool,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Walk {
            schemas,
            records,
            path,
            output,
            pretty,
        } => run_walk(&schemas, &records, &path, output, pretty),

        Commands::Check {
            schemas,
            records,
            record_type,
            json,
        } => run_check(&schemas, &records, record_type.as_deref(), json),

        Commands::Lint {
            schemas,
            format,
            strict,
            quiet,
        } => run_lint(&schemas, &format, strict, quiet),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

fn run_walk(
    schema_source: &str,
    record_source: &str,
    path: &str,
    output: Option<PathBuf>,
    pretty: bool,
) -> Result<(), u8> {
    let store = MemoryStore::from_sources(schema_source, record_source).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    let value = walk(&store, path).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    let json_output = if pretty {
        serde_json::to_string_pretty(&value)
    } else {
        serde_json::to_string(&value)
    }
    .map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })?;

    match output {
        Some(path) => {
            std::fs::write(&path, &json_output).map_err(|e| {
                eprintln!("Error writing to {}: {}", path.display(), e);
                3u8
            })?;
        }
        None => {
            println!("{}", json_output);
        }
    }

    Ok(())
}

fn run_check(
    schema_source: &str,
    record_source: &str,
    record_type: Option<&str>,
    json_output: bool,
) -> Result<(), u8> {
    let store = MemoryStore::from_sources(schema_source, record_source).map_err(|e| {
        report_error(json_output, &e.to_string());
        e.exit_code() as u8
    })?;

    let types: Vec<String> = match record_type {
        Some(t) => vec![t.to_string()],
        None => store.record_types().map(String::from).collect(),
    };

    let mut checked = 0usize;
    let mut failures = serde_json::Map::new();
    for record_type in &types {
        let doc = store.get_schema(record_type).map_err(|e| {
            report_error(json_output, &e.to_string());
            e.exit_code() as u8
        })?;
        let ids: Vec<String> = store.record_ids(record_type).into_iter().map(String::from).collect();
        for id in ids {
            checked += 1;
            let address = format!("{record_type}/{id}");
            let outcome = store
                .get_record(record_type, &id)
                .map_err(ValidateError::Walk)
                .and_then(|record| validate_record(&doc, &record));
            match outcome {
                Ok(()) => {}
                Err(ValidateError::Invalid { errors }) => {
                    failures.insert(
                        address,
                        serde_json::json!(errors),
                    );
                }
                Err(ValidateError::Walk(e)) => {
                    failures.insert(address, serde_json::json!([{ "message": e.to_string() }]));
                }
            }
        }
    }

    if json_output {
        let output = serde_json::json!({
            "checked": checked,
            "valid": failures.is_empty(),
            "failures": failures,
        });
        println!("{}", output);
    } else if failures.is_empty() {
        println!("{} record(s) checked, all valid", checked);
    } else {
        eprintln!("Validation failed for {} of {} record(s):", failures.len(), checked);
        for (address, errors) in &failures {
            eprintln!("  {}", address);
            if let Some(errors) = errors.as_array() {
                for error in errors {
                    let path = error.get("path").and_then(|p| p.as_str()).unwrap_or("/");
                    let message = error.get("message").and_then(|m| m.as_str()).unwrap_or("");
                    eprintln!("    {}: {}", path, message);
                }
            }
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(1)
    }
}

/// Output an error message in plain text or JSON format.
fn report_error(json_output: bool, msg: &str) {
    if json_output {
        println!(r#"{{"valid":false,"error":"{}"}}"#, msg.replace('"', "\\\""));
    } else {
        eprintln!("Error: {}", msg);
    }
}

fn run_lint(schema_source: &str, format: &str, strict: bool, quiet: bool) -> Result<(), u8> {
    let bundle = load_json_auto(schema_source).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    let result = lint_bundle(&bundle, strict);

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&result).unwrap());
    } else {
        if !quiet {
            println!("Linting {} ...\n", schema_source);
        }

        for schema_result in &result.results {
            let status_icon = match schema_result.status {
                SchemaStatus::Ok => "\x1b[32m✓\x1b[0m",
                SchemaStatus::Warning => "\x1b[33m⚠\x1b[0m",
                SchemaStatus::Error => "\x1b[31m✗\x1b[0m",
            };

            if !quiet || schema_result.status != SchemaStatus::Ok {
                println!("  {} {}", status_icon, schema_result.schema);
            }

            for diag in &schema_result.diagnostics {
                let color = match diag.severity {
                    Severity::Error => "\x1b[31m",
                    Severity::Warning => "\x1b[33m",
                };
                if !quiet || diag.severity == Severity::Error {
                    println!(
                        "    {}{}[{}]\x1b[0m: {} - {}",
                        color,
                        match diag.severity {
                            Severity::Error => "error",
                            Severity::Warning => "warning",
                        },
                        diag.code,
                        diag.path,
                        diag.message
                    );
                }
            }
        }

        println!();
        if result.is_ok() && (!strict || result.warnings == 0) {
            println!(
                "\x1b[32m✓ {} schemas checked, all passed\x1b[0m",
                result.schemas_checked
            );
        } else {
            println!(
                "\x1b[31m✗ {} schemas checked: {} passed, {} failed ({} errors, {} warnings)\x1b[0m",
                result.schemas_checked,
                result.passed,
                result.failed,
                result.errors,
                result.warnings
            );
        }
    }

    if result.is_ok() && (!strict || result.warnings == 0) {
        Ok(())
    } else {
        Err(1)
    }
}
