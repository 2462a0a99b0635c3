pub mod guard;
pub mod materializer;
pub mod orchestrator;
pub mod scheduler;
pub mod stores;

use std::time::Instant;

use chrono::Utc;
use tracing::{error, info};

use crate::db::connection::Database;
use crate::db::scan_runs::{record_completed_scan, record_failed_scan};

pub use orchestrator::{ScanError, ScanOrchestrator, ScanResult, ScanSettings, ScanTrigger};

/// Entry point shared by the manual and periodic triggers: runs one scan and
/// writes it to the scan history. Rejected scans leave no history row.
pub fn run_and_record(
    orchestrator: &ScanOrchestrator,
    db: &Database,
    trigger: ScanTrigger,
) -> Result<ScanResult, ScanError> {
    let started = Instant::now();
    let outcome = orchestrator.run_scan();

    if matches!(outcome, Err(ScanError::AlreadyRunning)) {
        info!(trigger = trigger.as_str(), "Scan already running; request rejected");
        return outcome;
    }

    let recorded = match &outcome {
        Ok(result) => db.with_conn(|conn| record_completed_scan(conn, trigger, result)),
        Err(e) => {
            let duration_ms = started.elapsed().as_millis() as u64;
            let message = e.to_string();
            db.with_conn(|conn| record_failed_scan(conn, trigger, Utc::now(), duration_ms, &message))
        }
    };

    // Scan outcome wins over a history write failure.
    if let Err(e) = recorded {
        error!(error = %e, "Failed to record scan run");
    }
    outcome
}
