use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::Serialize;

use crate::scan::orchestrator::{ScanResult, ScanTrigger};
use crate::scan::stores::StoreError;

/// One finished scan, successful or not.
#[derive(Debug, Clone, Serialize)]
pub struct ScanRun {
    pub id: i64,
    pub triggered_by: String,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: i64,
    pub success: bool,
    pub total_properties: i64,
    pub clusters_found: i64,
    pub multiagency_properties: i64,
    pub exclusive_properties: i64,
    pub properties_updated: i64,
    pub shared_properties_created: i64,
    pub failed_clusters: i64,
    pub empty_pool: bool,
    pub error_message: Option<String>,
}

pub fn record_completed_scan(
    conn: &Connection,
    trigger: ScanTrigger,
    result: &ScanResult,
) -> Result<i64, StoreError> {
    conn.execute(
        r#"
        INSERT INTO scan_runs (
            triggered_by, finished_at, duration_ms, success,
            total_properties, clusters_found, multiagency_properties, exclusive_properties,
            properties_updated, shared_properties_created, failed_clusters, empty_pool
        ) VALUES (?1, ?2, ?3, 1, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        "#,
        params![
            trigger.as_str(),
            result.timestamp,
            result.duration_ms as i64,
            result.total_properties as i64,
            result.clusters_found as i64,
            result.multiagency_properties as i64,
            result.exclusive_properties as i64,
            result.properties_updated as i64,
            result.shared_properties_created as i64,
            result.failed_clusters as i64,
            result.empty_pool,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn record_failed_scan(
    conn: &Connection,
    trigger: ScanTrigger,
    finished_at: DateTime<Utc>,
    duration_ms: u64,
    error: &str,
) -> Result<i64, StoreError> {
    conn.execute(
        "INSERT INTO scan_runs (triggered_by, finished_at, duration_ms, success, error_message) VALUES (?1, ?2, ?3, 0, ?4)",
        params![trigger.as_str(), finished_at, duration_ms as i64, error],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_recent_scans(conn: &Connection, limit: i64) -> Result<Vec<ScanRun>, StoreError> {
    let mut stmt = conn.prepare(
        r#"
        SELECT
            id, triggered_by, finished_at, duration_ms, success,
            total_properties, clusters_found, multiagency_properties, exclusive_properties,
            properties_updated, shared_properties_created, failed_clusters, empty_pool,
            error_message
        FROM scan_runs
        ORDER BY id DESC
        LIMIT ?1
        "#,
    )?;

    let rows = stmt.query_map(params![limit], |row| {
        Ok(ScanRun {
            id: row.get(0)?,
            triggered_by: row.get(1)?,
            finished_at: row.get(2)?,
            duration_ms: row.get(3)?,
            success: row.get(4)?,
            total_properties: row.get(5)?,
            clusters_found: row.get(6)?,
            multiagency_properties: row.get(7)?,
            exclusive_properties: row.get(8)?,
            properties_updated: row.get(9)?,
            shared_properties_created: row.get(10)?,
            failed_clusters: row.get(11)?,
            empty_pool: row.get(12)?,
            error_message: row.get(13)?,
        })
    })?;

    let mut runs = Vec::new();
    for r in rows {
        runs.push(r?);
    }
    Ok(runs)
}
