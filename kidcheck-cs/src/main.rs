//! kidcheck-cs - Check-In Security service daemon
//!
//! Runs the photo retention sweeper on a schedule. The check-in and pickup
//! verification services are a library surface invoked by the HTTP layer;
//! this binary owns the background retention work.

use anyhow::Result;
use clap::Parser;
use kidcheck_common::config;
use kidcheck_common::db::init_database;
use kidcheck_cs::{EncryptedPhotoVault, RetentionSweeper, SweeperConfig};
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "kidcheck-cs", version, about = "KidCheck check-in security service")]
struct Cli {
    /// Root data folder (overrides KIDCHECK_ROOT_FOLDER and the config file)
    #[arg(long)]
    root_folder: Option<String>,

    /// Run a single retention sweep and exit (for external cron scheduling)
    #[arg(long)]
    sweep_once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!(
        "Starting KidCheck Check-In Security (kidcheck-cs) v{}",
        env!("CARGO_PKG_VERSION")
    );

    let cli = Cli::parse();

    let root_folder =
        config::resolve_root_folder(cli.root_folder.as_deref(), "KIDCHECK_ROOT_FOLDER")?;
    config::ensure_root_folder(&root_folder)?;
    info!("Root folder: {}", root_folder.display());

    let db_path = config::database_path(&root_folder);
    info!("Database path: {}", db_path.display());
    let pool = init_database(&db_path).await?;

    let vault = Arc::new(EncryptedPhotoVault::new(config::photo_vault_path(&root_folder)));

    let sweeper_config = SweeperConfig::from_database(&pool).await;
    let sweeper = Arc::new(RetentionSweeper::new(pool, vault, sweeper_config));

    if cli.sweep_once {
        let cleaned = sweeper.cleanup_expired_photos().await?;
        info!(cleaned, "Retention sweep complete");
        return Ok(());
    }

    sweeper.run();

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");

    Ok(())
}
