//! Datapoint CLI - compile and run query models, inspect stored widgets
//!
//! Usage:
//!   datapoint compile <query.json> [--dialect <dialect>] [--schema <tables.json>] [--database <file.db>]
//!   datapoint query <query.json> --source <id>
//!   datapoint tables --source <id>
//!   datapoint functions --source <id>
//!   datapoint widgets [--id <id>]
//!   datapoint dashboards [--id <id>]
//!
//! Examples:
//!   datapoint compile report.json --dialect postgres --schema tables.json
//!   datapoint --config datapoint.toml query report.json --source sales

use clap::{Parser, Subcommand, ValueEnum};
use datapoint::compile::Compiler;
use datapoint::config::{Settings, SettingsError};
use datapoint::executor::QueryError;
use datapoint::model::Query;
use datapoint::schema::{Catalog, SchemaLookup};
use datapoint::service::QueryService;
use datapoint::source::{RegistryError, Sources};
use datapoint::sql::Dialect;
use datapoint::store::{Store, StoreError};
use datapoint::{compile::CompileError, logging};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "datapoint")]
#[command(about = "Datapoint - compile query models to SQL and run them against data sources")]
#[command(version)]
struct Cli {
    /// Config file (defaults to $DATAPOINT_CONFIG, ./datapoint.toml, then the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a query model to SQL without running it
    Compile {
        /// Path to the query JSON file
        file: PathBuf,

        /// SQL dialect to generate
        #[arg(short, long, default_value = "sqlite")]
        dialect: DialectArg,

        /// Saved table list (JSON) used for primary-key lookups
        #[arg(long, conflicts_with = "database")]
        schema: Option<PathBuf>,

        /// SQLite database used for primary-key lookups
        #[arg(long)]
        database: Option<PathBuf>,
    },

    /// Run a query model against a configured source
    Query {
        /// Path to the query JSON file
        file: PathBuf,

        /// Source id from the config file
        #[arg(short, long)]
        source: String,
    },

    /// List the tables of a source
    Tables {
        #[arg(short, long)]
        source: String,
    },

    /// List the aggregate functions available per column type
    Functions {
        #[arg(short, long)]
        source: String,
    },

    /// Print stored widget trees
    Widgets {
        /// Print only this widget and its children
        #[arg(long)]
        id: Option<String>,
    },

    /// Print stored dashboards
    Dashboards {
        /// Print only this dashboard
        #[arg(long)]
        id: Option<String>,
    },
}

#[derive(Clone, ValueEnum)]
enum DialectArg {
    Sqlite,
    Postgres,
}

impl From<DialectArg> for Dialect {
    fn from(arg: DialectArg) -> Self {
        match arg {
            DialectArg::Sqlite => Dialect::Sqlite,
            DialectArg::Postgres => Dialect::Postgres,
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("Error reading file '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid JSON in '{path}': {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Compilation error: {0}")]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Failed to open database: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("query failed")]
    Failed,
}

type CliResult = Result<(), CliError>;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::from_file(path),
        None => Settings::load(),
    };
    let settings = match settings {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = logging::init(&settings.log, cli.verbose) {
        eprintln!("Warning: logging disabled: {}", e);
    }

    let result = match cli.command {
        Commands::Compile {
            file,
            dialect,
            schema,
            database,
        } => cmd_compile(file, dialect, schema, database),
        Commands::Query { file, source } => cmd_query(&settings, file, &source).await,
        Commands::Tables { source } => cmd_tables(&settings, &source).await,
        Commands::Functions { source } => cmd_functions(&settings, &source).await,
        Commands::Widgets { id } => cmd_widgets(&settings, id),
        Commands::Dashboards { id } => cmd_dashboards(&settings, id),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(CliError::Failed) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: PathBuf) -> Result<T, CliError> {
    let content = fs::read_to_string(&path).map_err(|source| CliError::Read {
        path: path.clone(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| CliError::Json { path, source })
}

fn print_json(value: &impl Serialize) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error encoding output: {}", e),
    }
}

fn cmd_compile(
    file: PathBuf,
    dialect: DialectArg,
    schema: Option<PathBuf>,
    database: Option<PathBuf>,
) -> CliResult {
    let query: Query = read_json(file)?;

    let lookup: Box<dyn SchemaLookup> = match (schema, database) {
        (Some(path), _) => Box::new(read_json::<Catalog>(path)?),
        (None, Some(path)) => Box::new(rusqlite::Connection::open(path)?),
        (None, None) => Box::new(Catalog::default()),
    };

    let compiled = Compiler::new(dialect.into(), lookup.as_ref()).compile(&query)?;
    let (sql, params) = compiled.render();

    println!("{}", sql);
    if !params.is_empty() {
        println!();
        println!("-- Parameters:");
        for (i, value) in params.iter().enumerate() {
            let value = serde_json::to_string(value).unwrap_or_default();
            println!("-- {}: {}", i + 1, value);
        }
    }
    Ok(())
}

fn service(settings: &Settings, source: &str) -> Result<QueryService<Sources>, CliError> {
    // only the requested source is opened
    let config = settings.source(source)?.connection()?;
    let sources = Sources::new();
    sources.open(source, config)?;
    Ok(QueryService::new(Arc::new(sources)))
}

async fn cmd_query(settings: &Settings, file: PathBuf, source: &str) -> CliResult {
    let query: Query = read_json(file)?;
    let response = service(settings, source)?.execute(source, &query).await?;
    print_json(&response);
    if response.is_ok() {
        Ok(())
    } else {
        Err(CliError::Failed)
    }
}

async fn cmd_tables(settings: &Settings, source: &str) -> CliResult {
    let tables = service(settings, source)?.tables(source).await??;
    print_json(&tables);
    Ok(())
}

async fn cmd_functions(settings: &Settings, source: &str) -> CliResult {
    let functions = service(settings, source)?.functions(source).await?;
    print_json(&functions);
    Ok(())
}

fn open_store(settings: &Settings) -> Result<Store, CliError> {
    Ok(Store::open(settings.store.resolved_path()?)?)
}

fn cmd_widgets(settings: &Settings, id: Option<String>) -> CliResult {
    let store = open_store(settings)?;
    match id {
        Some(id) => print_json(&store.widgets().get_one(&id)?),
        None => print_json(&store.widgets().get_all()?),
    }
    Ok(())
}

fn cmd_dashboards(settings: &Settings, id: Option<String>) -> CliResult {
    let store = open_store(settings)?;
    match id {
        Some(id) => print_json(&store.dashboards().get_one(&id)?),
        None => print_json(&store.dashboards().get_all()?),
    }
    Ok(())
}
