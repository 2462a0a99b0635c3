// src/scan/orchestrator.rs

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::domain::property::PropertyRecord;
use crate::matching::classifier::{classify_unclustered, DEFAULT_EXCLUSIVITY_KEYWORDS};
use crate::matching::clustering::cluster_records;
use crate::matching::geo::GeoDistance;
use crate::matching::image::ImageSimilarity;
use crate::matching::similarity::{ScoringConfig, SimilarityScorer};
use crate::scan::guard::ScanGuard;
use crate::scan::materializer::materialize_clusters;
use crate::scan::stores::{ListingStore, SharedListingStore, StoreError};

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("a scan is already running")]
    AlreadyRunning,

    #[error("no available listings in the pool")]
    EmptyPool,

    #[error("listing store failed: {0}")]
    Store(#[from] StoreError),
}

/// Who asked for the scan. Both go through the same `run_scan`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanTrigger {
    Manual,
    Scheduled,
}

impl ScanTrigger {
    pub fn as_str(self) -> &'static str {
        match self {
            ScanTrigger::Manual => "manual",
            ScanTrigger::Scheduled => "scheduled",
        }
    }
}

/// Summary of one finished scan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanResult {
    pub total_properties: usize,
    /// Multi-agency clusters only; exclusivity singletons are counted below.
    pub clusters_found: usize,
    pub multiagency_properties: usize,
    pub exclusive_properties: usize,
    /// Existing shared listings that gained agencies this run.
    pub properties_updated: usize,
    pub shared_properties_created: usize,
    pub failed_clusters: usize,
    pub empty_pool: bool,
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
}

impl ScanResult {
    pub fn empty(timestamp: DateTime<Utc>, duration_ms: u64) -> Self {
        Self {
            total_properties: 0,
            clusters_found: 0,
            multiagency_properties: 0,
            exclusive_properties: 0,
            properties_updated: 0,
            shared_properties_created: 0,
            failed_clusters: 0,
            empty_pool: false,
            duration_ms,
            timestamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScanSettings {
    pub scoring: ScoringConfig,
    pub exclusivity_keywords: Vec<String>,
    /// Treat an empty pool as a failed scan instead of a zero summary.
    pub fail_on_empty_pool: bool,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            scoring: ScoringConfig::default(),
            exclusivity_keywords: DEFAULT_EXCLUSIVITY_KEYWORDS
                .iter()
                .map(|kw| kw.to_string())
                .collect(),
            fail_on_empty_pool: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PoolState {
    Ready,
    Empty,
}

/// The pool only holds records ingestion has tagged `available`. An empty pool
/// almost always means that tagging step didn't run.
fn check_pool_precondition(records: &[PropertyRecord], strict: bool) -> Result<PoolState, ScanError> {
    if !records.is_empty() {
        return Ok(PoolState::Ready);
    }
    warn!(
        "No available listings found; check that ingestion is tagging records with status 'available'"
    );
    if strict {
        Err(ScanError::EmptyPool)
    } else {
        Ok(PoolState::Empty)
    }
}

/// Runs the full dedupe pass: cluster, classify, materialize.
pub struct ScanOrchestrator {
    listings: Arc<dyn ListingStore>,
    shared: Arc<dyn SharedListingStore>,
    images: Arc<dyn ImageSimilarity>,
    scorer: SimilarityScorer,
    settings: ScanSettings,
    guard: ScanGuard,
}

impl ScanOrchestrator {
    pub fn new(
        listings: Arc<dyn ListingStore>,
        shared: Arc<dyn SharedListingStore>,
        geo: Arc<dyn GeoDistance>,
        images: Arc<dyn ImageSimilarity>,
        settings: ScanSettings,
    ) -> Self {
        Self {
            listings,
            shared,
            images,
            scorer: SimilarityScorer::new(settings.scoring, geo),
            settings,
            guard: ScanGuard::new(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.guard.is_running()
    }

    /// Rejects with `AlreadyRunning` instead of queueing when another scan
    /// holds the guard. The guard is released however this returns.
    pub fn run_scan(&self) -> Result<ScanResult, ScanError> {
        let _permit = self.guard.try_acquire().ok_or(ScanError::AlreadyRunning)?;
        let started = Instant::now();

        info!("Listing scan started");
        let records = self.listings.fetch_available()?;
        info!(total = records.len(), "Loaded available listings");

        if check_pool_precondition(&records, self.settings.fail_on_empty_pool)? == PoolState::Empty {
            let mut result = ScanResult::empty(Utc::now(), elapsed_ms(started));
            result.empty_pool = true;
            return Ok(result);
        }

        let clusters = cluster_records(&records, &self.scorer, self.images.as_ref());
        info!(clusters = clusters.len(), "Clustering complete");

        let keywords: Vec<&str> = self
            .settings
            .exclusivity_keywords
            .iter()
            .map(String::as_str)
            .collect();
        let hints = classify_unclustered(&records, &clusters, &keywords);

        let report = materialize_clusters(
            &clusters,
            &records,
            self.listings.as_ref(),
            self.shared.as_ref(),
        );

        let result = ScanResult {
            total_properties: records.len(),
            clusters_found: clusters.len(),
            multiagency_properties: report.marked_shared,
            exclusive_properties: hints.len(),
            properties_updated: report.updated,
            shared_properties_created: report.created,
            failed_clusters: report.failures.len(),
            empty_pool: false,
            duration_ms: elapsed_ms(started),
            timestamp: Utc::now(),
        };

        info!(
            total_properties = result.total_properties,
            clusters_found = result.clusters_found,
            multiagency_properties = result.multiagency_properties,
            exclusive_properties = result.exclusive_properties,
            created = result.shared_properties_created,
            updated = result.properties_updated,
            failed_clusters = result.failed_clusters,
            duration_ms = result.duration_ms,
            "Listing scan complete"
        );

        Ok(result)
    }
}

impl std::fmt::Debug for ScanOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanOrchestrator")
            .field("settings", &self.settings)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
