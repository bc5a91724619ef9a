use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use log::info;

mod config;
mod core;
mod instances;
mod web;

use crate::config::{Config, StorageBackend};
use crate::core::persistence::SqliteJournal;
use crate::core::store::RecordStore;
use crate::instances::{HttpDecisionEngine, HttpPredictor};
use crate::web::server::{start_web_server, AppState};

/// Record tracking and aggregation service for multi-unit organizations
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, overrides `server.bind`
    #[arg(short, long)]
    bind: Option<String>,
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));
    info!("Starting unit records service...");

    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(bind) = cli.bind {
        config.server.bind = bind;
    }

    core::metrics::init();

    // Create the record store
    let store = match config.storage.backend {
        StorageBackend::Memory => RecordStore::with_capacity(config.idempotency.capacity),
        StorageBackend::Sqlite => {
            let journal = SqliteJournal::open(&config.storage.path)
                .context("Failed to open record journal")?;
            RecordStore::with_journal(journal, config.idempotency.capacity)
                .context("Failed to load records from journal")?
        }
    };
    info!("Record store initialized ({:?} backend)", config.storage.backend);

    // Wire external capabilities
    let mut app_state = AppState::new(Arc::new(store));
    let timeout = config.capabilities.timeout();
    if let Some(url) = &config.capabilities.predictor_url {
        app_state = app_state.with_predictor(Arc::new(HttpPredictor::new(url, timeout)?));
        info!("Predictor configured at {}", url);
    }
    if let Some(url) = &config.capabilities.decision_url {
        app_state = app_state.with_decision_engine(Arc::new(HttpDecisionEngine::new(url, timeout)?));
        info!("Decision engine configured at {}", url);
    }

    // Runs until Ctrl+C
    start_web_server(app_state, &config.server)
        .await
        .context("Web server failed")?;

    info!("Unit records service shutdown complete");
    Ok(())
}
