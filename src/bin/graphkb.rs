//! GraphKB server binary.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use graphkb::config::Config;
use graphkb::migrate::{MigrateOptions, MigrationRunner};
use graphkb::server::{self, AppState};
use graphkb::store::{RestBackend, SessionPool};
use graphkb::{logging, schema, GraphKbError};

#[derive(Parser)]
#[command(name = "graphkb", version, about = "GraphKB knowledge base service")]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(long, env = "GRAPHKB_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the startup migration check and serve HTTP (the default).
    Serve,
    /// Migrate the store schema to this build's version.
    Migrate {
        /// Only report whether a migration is required.
        #[arg(long)]
        check: bool,
    },
}

#[tokio::main]
async fn main() {
    logging::install();
    if let Err(err) = run().await {
        error!(error = %err, "fatal");
        std::process::exit(1);
    }
}

async fn run() -> graphkb::Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    let backend = Arc::new(RestBackend::new(&config.store)?);
    let pool = SessionPool::new(backend, config.pool_opts());
    let registry = schema::graphkb()?;
    let runner = MigrationRunner::from_build()?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Migrate { check } => {
            let session = pool.acquire().await?;
            let reached = runner
                .migrate(&session, MigrateOptions { check_only: check })
                .await?;
            info!(version = %reached, "store schema is current");
            Ok(())
        }
        Command::Serve => {
            {
                let session = pool.acquire().await?;
                match runner
                    .migrate(&session, MigrateOptions { check_only: true })
                    .await
                {
                    Ok(version) => info!(%version, "schema check passed"),
                    Err(err @ GraphKbError::MigrationRequired { .. }) => {
                        error!("run `graphkb migrate` before serving");
                        return Err(err);
                    }
                    Err(err) => return Err(err),
                }
            }
            let state = Arc::new(AppState { pool, registry });
            let outcome = server::serve(&config.server, state.clone()).await;
            state.pool.drain();
            outcome
        }
    }
}
