//! Argument definitions and command dispatch for `pdm`.
//!
//! Every command opens the SQLite store at `--db`, runs one service call and
//! prints the result as JSON on stdout.

use clap::{Parser, Subcommand};
use log::info;
use pdm_core::db::{open_db, DbError};
use pdm_core::logging::init_logging_from_config;
use pdm_core::{
    ConfigError, DefinitionFilter, DefinitionFilterClause, DefinitionItemInput, DefinitionService,
    ServiceConfig, ServiceError, SqliteDefinitionRepository,
};
use serde_json::json;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use uuid::Uuid;

const DEFAULT_DB_PATH: &str = "./pdm.sqlite3";

/// Versioned definition item manager
#[derive(Parser, Debug)]
#[command(name = "pdm", version, about, long_about = None)]
pub struct Cli {
    /// Path to a JSON service config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Path to the SQLite definition store
    #[arg(long, global = true, default_value = DEFAULT_DB_PATH)]
    db: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print core linkage information
    Ping,

    /// Persist a definition item read from a JSON file
    Persist {
        /// File holding `{"definitionPayload": {...}, "version": ..., ...}`
        file: PathBuf,

        /// Overwrite | OverwriteLatest | Manual | AutoIncrementMajor | AutoIncrementMinor
        #[arg(long)]
        mode: Option<String>,
    },

    /// Print one definition item by id
    Get { id: Uuid },

    /// List definition items, highest version first
    List {
        #[arg(long)]
        definition_id: Option<String>,
        #[arg(long)]
        tenant_id: Option<String>,
        #[arg(long)]
        version: Option<String>,
    },

    /// Delete one item by id, or every item matching the lineage keys
    Delete {
        #[arg(long, conflicts_with_all = ["definition_id", "tenant_id"])]
        id: Option<Uuid>,
        #[arg(long, required_unless_present = "id")]
        definition_id: Option<String>,
        #[arg(long)]
        tenant_id: Option<String>,
    },
}

#[derive(Debug)]
pub enum CliError {
    Config(ConfigError),
    Logging(String),
    Db(DbError),
    Service(ServiceError),
    Input { path: PathBuf, message: String },
}

impl Display for CliError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "{err}"),
            Self::Logging(message) => write!(f, "logging setup failed: {message}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::Service(err) => write!(f, "{err}"),
            Self::Input { path, message } => {
                write!(f, "cannot read `{}`: {message}", path.display())
            }
        }
    }
}

impl Error for CliError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::Service(err) => Some(err),
            Self::Logging(_) | Self::Input { .. } => None,
        }
    }
}

impl From<ServiceError> for CliError {
    fn from(value: ServiceError) -> Self {
        Self::Service(value)
    }
}

impl From<pdm_core::RepoError> for CliError {
    fn from(value: pdm_core::RepoError) -> Self {
        Self::Service(ServiceError::Repo(value))
    }
}

pub fn run() -> Result<(), CliError> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ServiceConfig::from_path(path).map_err(CliError::Config)?,
        None => ServiceConfig::default(),
    };
    if let Some(logging) = &config.logging {
        init_logging_from_config(logging).map_err(CliError::Logging)?;
    }

    if let Command::Ping = cli.command {
        println!("pdm_core ping={}", pdm_core::ping());
        println!("pdm_core version={}", pdm_core::core_version());
        return Ok(());
    }

    let conn = open_db(&cli.db).map_err(CliError::Db)?;
    let repo = SqliteDefinitionRepository::try_new(&conn)?;
    let service = DefinitionService::with_config(repo, config);

    let output = match cli.command {
        Command::Ping => return Ok(()),
        Command::Persist { file, mode } => {
            let input = read_input(&file)?;
            let stored = service.persist_definition_with_mode_name(&input, mode.as_deref())?;
            info!(
                "event=cli_persist module=cli status=ok definition_id={} version={}",
                stored.definition_id, stored.version
            );
            json!(stored)
        }
        Command::Get { id } => json!(service.get_definition(id)?),
        Command::List {
            definition_id,
            tenant_id,
            version,
        } => {
            let filter = DefinitionFilter::single(DefinitionFilterClause {
                id: None,
                definition_id,
                tenant_id,
                version,
            });
            json!(service.get_definitions(&filter)?)
        }
        Command::Delete {
            id: Some(id), ..
        } => json!({ "deleted": service.delete_definition(id)? }),
        Command::Delete {
            id: None,
            definition_id,
            tenant_id,
        } => {
            let filter = DefinitionFilter::single(DefinitionFilterClause {
                definition_id,
                tenant_id,
                ..DefinitionFilterClause::default()
            });
            json!({ "deleted": service.delete_definitions(&filter)? })
        }
    };

    println!("{output:#}");
    Ok(())
}

fn read_input(path: &Path) -> Result<DefinitionItemInput, CliError> {
    let raw = std::fs::read_to_string(path).map_err(|err| CliError::Input {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;
    serde_json::from_str(&raw).map_err(|err| CliError::Input {
        path: path.to_path_buf(),
        message: err.to_string(),
    })
}
