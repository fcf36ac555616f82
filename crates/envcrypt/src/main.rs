//! `envcrypt`: local tool for sealing and opening project variables.
//!
//! Startup sequence:
//! 1. Parse the command line.
//! 2. Load and validate [`Config`] from environment variables.
//! 3. Initialise structured logging.
//! 4. Run the command against a fresh [`EncryptionSession`], then tear it down.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use common::protocol::is_valid_variable_key;
use common::ProjectRecord;
use tracing::info;

use envcrypt::{dotenv, project, telemetry, Config, EncryptionSession, Salt};

#[derive(Debug, Parser)]
#[command(name = "envcrypt", about = "Encrypt project environment variables client-side")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print a new random 32-byte salt (base64).
    Salt,

    #[command(flatten)]
    Project(ProjectCommand),
}

/// Commands that need configuration and an encryption session.
#[derive(Debug, Subcommand)]
enum ProjectCommand {
    /// Encrypt every plain value and print the project record as JSON.
    Seal {
        /// `.env` file or project record JSON.
        input: PathBuf,

        /// Owner of the project. Required for `.env` input.
        #[arg(long, env = "ENVCRYPT_USER_ID")]
        user_id: Option<String>,

        /// Project name for `.env` input. Defaults to the file name.
        #[arg(long)]
        name: Option<String>,
    },

    /// Decrypt a project record JSON and print it as `.env` text.
    Open {
        input: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let command = match cli.command {
        Command::Salt => {
            println!("{}", Salt::generate());
            return Ok(());
        }
        Command::Project(command) => command,
    };

    let cfg = Config::from_env().map_err(|e| {
        // Logging is not yet up; write to stderr directly.
        eprintln!("ERROR: configuration invalid: {e}");
        e
    })?;

    telemetry::init_telemetry(&cfg.log_level)?;
    info!(version = env!("CARGO_PKG_VERSION"), "envcrypt starting");

    let session = EncryptionSession::from_config(&cfg);
    let result = run(command, &session).await;
    session.teardown().await;
    result
}

async fn run(command: ProjectCommand, session: &EncryptionSession) -> Result<()> {
    match command {
        ProjectCommand::Seal {
            input,
            user_id,
            name,
        } => {
            let mut record = load_for_seal(&input, user_id, name)?;
            let invalid: Vec<&str> = record
                .variables
                .iter()
                .map(|v| v.key.as_str())
                .filter(|k| !is_valid_variable_key(k))
                .collect();
            if !invalid.is_empty() {
                anyhow::bail!(
                    "invalid variable keys (expected ^[A-Z_][A-Z0-9_]*$): {}",
                    invalid.join(", ")
                );
            }

            project::bind_project(session, &mut record)
                .await
                .context("failed to initialise project encryption")?;
            let sealed = project::seal_project(session, &mut record)
                .await
                .context("failed to encrypt project variables")?;
            info!(sealed, total = record.variables.len(), "project sealed");

            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        ProjectCommand::Open { input } => {
            let mut record = read_record(&input)?;
            if record.user_salt.is_some() {
                project::bind_project(session, &mut record)
                    .await
                    .context("failed to initialise project encryption")?;
            } else if project::has_encrypted_variables(&record.variables) {
                anyhow::bail!("project has encrypted values but no salt");
            }
            let vars = project::open_project(session, &record)
                .await
                .map_err(|e| anyhow::anyhow!("{}: {e}", e.user_message()))?;
            println!("{}", dotenv::generate(&vars));
        }
    }
    Ok(())
}

fn load_for_seal(
    input: &Path,
    user_id: Option<String>,
    name: Option<String>,
) -> Result<ProjectRecord> {
    if input.extension().is_some_and(|e| e == "json") {
        let mut record = read_record(input)?;
        if let Some(user_id) = user_id.filter(|u| *u != record.user_id) {
            // Existing envelopes are bound to the current owner's key.
            if project::has_encrypted_variables(&record.variables) {
                anyhow::bail!(
                    "cannot change the owner of {}: it already holds encrypted values",
                    input.display()
                );
            }
            record.user_id = user_id;
        }
        return Ok(record);
    }

    let content = std::fs::read_to_string(input)
        .with_context(|| format!("failed to read {}", input.display()))?;
    let user_id = user_id.context("--user-id is required when sealing a .env file")?;
    let name = name.unwrap_or_else(|| {
        input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "project".into())
    });
    Ok(ProjectRecord {
        id: None,
        name,
        description: None,
        user_id,
        variables: dotenv::parse(&content),
        user_salt: None,
    })
}

fn read_record(path: &Path) -> Result<ProjectRecord> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("{} is not a project record", path.display()))
}
