//! osquery-bridge CLI - Query osquery tables as JSON
//!
//! Usage:
//!   osquery-bridge [--config <file>] [--connection <name>] tables
//!   osquery-bridge describe <table>
//!   osquery-bridge select <table> [--where "<field> = <value>"] [--filter <field> <op> <value>]...
//!   osquery-bridge sql "<query>"
//!
//! Examples:
//!   osquery-bridge describe processes
//!   osquery-bridge select users --filter uid ">=" 500 --filter shell LIKE "%zsh"
//!   osquery-bridge -vv sql "SELECT version FROM osquery_info"

use clap::{ArgAction, Parser, Subcommand};
use osquery_bridge::config::Settings;
use osquery_bridge::registry::ConnectionRegistry;
use osquery_bridge::sql::{QualValue, Qualifier, QualifierInput, QualifierSet};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "osquery-bridge")]
#[command(about = "Query osquery through a JSON extension over a pty")]
#[command(version)]
struct Cli {
    /// Config file (defaults to OSQUERY_BRIDGE_CONFIG, ./osquery-bridge.toml, then the user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Connection name (defaults to "default" or the first configured)
    #[arg(long, global = true)]
    connection: Option<String>,

    /// More log output on stderr; repeat for more
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the tables osquery has registered
    Tables,

    /// Show columns, types, and the key column of a table
    Describe {
        table: String,
    },

    /// Select rows from a table
    Select {
        table: String,

        /// Equality qualifier such as "pid = 1"
        #[arg(long = "where")]
        where_clause: Option<String>,

        /// Comparison qualifier; takes FIELD OP VALUE and may repeat
        #[arg(long, num_args = 3, value_names = ["FIELD", "OP", "VALUE"], action = ArgAction::Append)]
        filter: Vec<String>,
    },

    /// Run raw SQL through the extension
    Sql {
        query: String,
    },
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("osquery_bridge={level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn load_settings(path: Option<&PathBuf>) -> Result<Settings, String> {
    let settings = match path {
        Some(path) => Settings::from_file(path),
        None => Settings::load(),
    };
    settings.map_err(|e| format!("Configuration error: {}", e))
}

fn connection_name(settings: &Settings, requested: Option<String>) -> Result<String, String> {
    if let Some(name) = requested {
        return Ok(name);
    }
    settings
        .default_connection()
        .map(|(name, _)| name.to_string())
        .ok_or_else(|| "No connection configured; add a [connections.default] section".to_string())
}

fn filters_to_qualifiers(filter: &[String]) -> QualifierSet {
    filter
        .chunks_exact(3)
        .map(|f| Qualifier::new(&f[0], &f[1], QualValue::infer(&f[2])))
        .collect()
}

fn print_json<T: Serialize>(value: &T) -> Result<(), String> {
    let text = serde_json::to_string_pretty(value).map_err(|e| format!("Output error: {}", e))?;
    println!("{}", text);
    Ok(())
}

async fn run(cli: Cli) -> Result<(), String> {
    let settings = load_settings(cli.config.as_ref())?;
    let name = connection_name(&settings, cli.connection)?;
    let registry = ConnectionRegistry::from_settings(settings).map_err(|e| e.to_string())?;

    let result = match cli.command {
        Commands::Tables => match registry.list_tables(&name).await {
            Ok(tables) => print_json(&tables),
            Err(e) => Err(e.to_string()),
        },
        Commands::Describe { table } => match registry.table_definition(&name, &table).await {
            Ok(definition) => print_json(&definition),
            Err(e) => Err(e.to_string()),
        },
        Commands::Select {
            table,
            where_clause,
            filter,
        } => {
            let input = QualifierInput {
                rich: Some(filters_to_qualifiers(&filter)),
                equality: where_clause,
            };
            match registry.list_rows(&name, &table, &input).await {
                Ok(rows) => print_json(&rows),
                Err(e) => Err(e.to_string()),
            }
        }
        Commands::Sql { query } => match registry.query(&name, &query).await {
            Ok(rows) => print_json(&rows),
            Err(e) => Err(e.to_string()),
        },
    };

    registry.close_all();
    result
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
