// src/scan/scheduler.rs

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{error, info};

use crate::db::connection::Database;
use crate::scan::orchestrator::{ScanError, ScanOrchestrator, ScanTrigger};
use crate::scan::run_and_record;

/// Runs a scan every `interval` on a background thread. A tick that lands
/// while a scan is in flight is skipped, not queued. Failures are logged and
/// the next tick runs as normal.
pub fn spawn_periodic_scan(
    orchestrator: Arc<ScanOrchestrator>,
    db: Database,
    interval: Duration,
) -> std::io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("periodic-scan".into())
        .spawn(move || {
            info!(interval_secs = interval.as_secs(), "Periodic scan thread started");
            loop {
                std::thread::sleep(interval);
                match run_and_record(&orchestrator, &db, ScanTrigger::Scheduled) {
                    Ok(result) => info!(
                        clusters_found = result.clusters_found,
                        created = result.shared_properties_created,
                        "Scheduled scan finished"
                    ),
                    Err(ScanError::AlreadyRunning) => {
                        info!("Skipping scheduled scan; one is already running")
                    }
                    Err(e) => error!(error = %e, "Scheduled scan failed"),
                }
            }
        })
}
