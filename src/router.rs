use std::collections::HashMap;
use std::sync::Arc;

use astra::Request;
use serde::Serialize;
use tracing::info;

use crate::db::scan_runs::get_recent_scans;
use crate::db::shared_listings::list_shared_listings;
use crate::db::{Database, SqliteStore};
use crate::domain::shared_listing::{AcquisitionStage, SharedListing};
use crate::errors::{ResultResp, ServerError};
use crate::responses::{json_response, text_response};
use crate::scan::{run_and_record, ScanOrchestrator, ScanTrigger};

const DEFAULT_SCAN_HISTORY: i64 = 50;
const MAX_SCAN_HISTORY: i64 = 500;

/// Everything a request handler needs. Shared across astra's worker threads.
pub struct AppState {
    pub db: Database,
    pub store: SqliteStore,
    pub orchestrator: Arc<ScanOrchestrator>,
}

pub fn handle(req: Request, state: &AppState) -> ResultResp {
    let method = req.method().as_str();
    let path = req.uri().path();

    match (method, path) {
        ("GET", "/health") => text_response("ok"),

        ("POST", "/scans") => {
            info!("Manual scan requested");
            let result = run_and_record(&state.orchestrator, &state.db, ScanTrigger::Manual)?;
            json_response(&result)
        }

        ("GET", "/scans") => {
            let params = parse_query(&req);
            let limit = match params.get("limit") {
                None => DEFAULT_SCAN_HISTORY,
                Some(raw) => raw
                    .parse::<i64>()
                    .ok()
                    .filter(|n| (1..=MAX_SCAN_HISTORY).contains(n))
                    .ok_or_else(|| ServerError::BadRequest(format!("invalid limit: {raw}")))?,
            };
            let runs = state.db.with_conn(|conn| get_recent_scans(conn, limit))?;
            json_response(&runs)
        }

        ("GET", "/shared-listings") => {
            let params = parse_query(&req);
            let stage = match params.get("stage") {
                None => None,
                Some(raw) => Some(
                    AcquisitionStage::parse(raw)
                        .ok_or_else(|| ServerError::BadRequest(format!("unknown stage: {raw}")))?,
                ),
            };

            let mut listings = list_shared_listings(&state.store)?;
            if let Some(stage) = stage {
                listings.retain(|l| l.stage == stage);
            }
            json_response(&SharedListingsPage {
                total: listings.len(),
                listings,
            })
        }

        _ => Err(ServerError::NotFound),
    }
}

#[derive(Serialize)]
struct SharedListingsPage {
    total: usize,
    listings: Vec<SharedListing>,
}

fn parse_query(req: &Request) -> HashMap<String, String> {
    let mut map = HashMap::new();

    if let Some(q) = req.uri().query() {
        for pair in q.split('&') {
            let mut parts = pair.splitn(2, '=');
            if let (Some(k), Some(v)) = (parts.next(), parts.next()) {
                map.insert(k.to_string(), v.to_string());
            }
        }
    }

    map
}
