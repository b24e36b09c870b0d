//! EntityGraph Ingest Daemon
//!
//! Opens the configured repository, settles interrupted queue items and
//! drains the ingest queue on a fixed interval until Ctrl+C.
//!
//! ## Usage
//!
//! ```bash
//! # Start with defaults (sqlite at ./entitygraph.db)
//! entitygraph-ingestd
//!
//! # Start with a config file
//! entitygraph-ingestd --config /etc/entitygraph/ingestd.yaml
//!
//! # Override the database and poll interval
//! entitygraph-ingestd --database /data/entitygraph.db --poll-interval-ms 500
//! ```

use clap::Parser;
use entitygraph_orchestration::{BackendKind, IngestQueue, IngestWorker, ServiceConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "entitygraph-ingestd")]
#[command(about = "Background ingest worker for the entity repository")]
struct Args {
    /// Path to config file
    #[arg(short, long, env = "ENTITYGRAPH_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite database path
    #[arg(long, env = "ENTITYGRAPH_DATABASE")]
    database: Option<PathBuf>,

    /// Use the in-memory backend (nothing survives a restart)
    #[arg(long)]
    in_memory: bool,

    /// Drain interval in milliseconds
    #[arg(long)]
    poll_interval_ms: Option<u64>,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load config
    let mut config = match &args.config {
        Some(path) => ServiceConfig::load(path)?,
        None => ServiceConfig::default(),
    };

    // Apply CLI overrides
    if let Some(database) = args.database {
        config.storage.backend = BackendKind::Sqlite;
        config.storage.database_path = database;
    }
    if args.in_memory {
        config.storage.backend = BackendKind::Memory;
    }
    if let Some(interval) = args.poll_interval_ms {
        config.ingest.poll_interval_ms = interval;
    }
    config.validate()?;

    if args.print_config {
        print!("{}", config.to_yaml()?);
        return Ok(());
    }

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter)),
        )
        .init();

    info!(
        backend = ?config.storage.backend,
        database = %config.storage.database_path.display(),
        referenced_content = config.storage.referenced_content,
        "Opening entity repository"
    );
    let store = Arc::new(config.open_store()?);
    let queue = Arc::new(IngestQueue::new(store.clone()));
    queue.init().await?;

    let worker = Arc::new(IngestWorker::new(queue, &config.ingest));
    let (handle, shutdown_tx) = worker.spawn();

    info!("Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");

    let _ = shutdown_tx.send(());
    if let Err(e) = handle.await {
        error!(error = %e, "Ingest worker task failed");
    }

    // Print stats before exit
    match store.backend().stats().await {
        Ok(stats) => info!(
            objects = stats.objects,
            datastreams = stats.datastreams,
            "Final repository stats"
        ),
        Err(e) => error!(error = %e, "Unable to read repository stats"),
    }
    Ok(())
}
