use crate::config::Config;
use crate::db::connection::{init_db, Database};
use crate::db::SqliteStore;
use crate::matching::geo::Haversine;
use crate::matching::image::NoImageSimilarity;
use crate::router::{handle, AppState};
use crate::scan::scheduler::spawn_periodic_scan;
use crate::scan::{run_and_record, ScanOrchestrator, ScanTrigger};
use anyhow::{Context, Result};
use astra::Server;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod db;
mod domain;
mod errors;
mod matching;
mod responses;
mod router;
mod scan;

#[cfg(test)]
mod tests;

#[derive(Parser)]
#[command(name = "listing_dedup")]
#[command(about = "Finds listings published by several agencies and groups them")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the HTTP trigger and run the periodic scan (default)
    Serve,
    /// Run one scan, print the summary as JSON and exit
    Scan,
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,listing_dedup=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env().context("Failed to load configuration")?;
    info!(database = %config.database_path, "Configuration loaded");

    // 1️⃣ Create the database handle and apply the schema
    let db = Database::new(config.database_path.clone());
    init_db(&db).context("Database initialization failed")?;

    // 2️⃣ Wire the orchestrator to the SQLite stores
    let store = SqliteStore::new(db.clone());
    let orchestrator = Arc::new(ScanOrchestrator::new(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        Arc::new(Haversine),
        Arc::new(NoImageSimilarity),
        config.scan_settings(),
    ));

    match cli.command.unwrap_or(Command::Serve) {
        Command::Scan => {
            let result = run_and_record(&orchestrator, &db, ScanTrigger::Manual)
                .context("Scan failed")?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        Command::Serve => serve(config, db, store, orchestrator),
    }
}

fn serve(
    config: Config,
    db: Database,
    store: SqliteStore,
    orchestrator: Arc<ScanOrchestrator>,
) -> Result<()> {
    // 3️⃣ Periodic trigger, unless disabled
    match config.scan_interval() {
        Some(interval) => {
            spawn_periodic_scan(Arc::clone(&orchestrator), db.clone(), interval)
                .context("Failed to start periodic scan thread")?;
        }
        None => info!("Periodic scan disabled"),
    }

    // 4️⃣ Serve requests
    let state = AppState {
        db,
        store,
        orchestrator,
    };
    info!("Starting server at http://{}", config.bind_addr);

    let server = Server::bind(&config.bind_addr).max_workers(8);
    let result = server.serve(move |req, _info| match handle(req, &state) {
        Ok(resp) => resp,
        Err(err) => {
            if err.status() >= 500 {
                error!(error = %err, "Request failed");
            }
            responses::error_to_response(err)
        }
    });

    if let Err(e) = result {
        error!(error = %e, "Server ended with error");
    }

    info!("Server shut down cleanly.");
    Ok(())
}
