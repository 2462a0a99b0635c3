// src/scan/stores.rs

use thiserror::Error;

use crate::domain::property::PropertyRecord;
use crate::domain::shared_listing::{AgencyEntry, NewSharedListing, SharedListing};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("malformed agencies column: {0}")]
    Agencies(#[from] serde_json::Error),

    #[error("row {id} not found")]
    NotFound { id: i64 },
}

/// The pool of listings produced by ingestion.
pub trait ListingStore: Send + Sync {
    /// Every record currently tagged available, in stable id order.
    fn fetch_available(&self) -> Result<Vec<PropertyRecord>, StoreError>;

    /// Write-back of the shared flags onto a source record.
    fn mark_shared(&self, id: i64, is_multiagency: bool) -> Result<(), StoreError>;
}

/// Durable shared listings derived from multi-agency clusters.
pub trait SharedListingStore: Send + Sync {
    /// A non-acquired shared listing whose normalized address equals `key`.
    fn find_by_normalized_address(&self, key: &str) -> Result<Option<SharedListing>, StoreError>;

    /// Returns the new row id.
    fn create(&self, listing: &NewSharedListing) -> Result<i64, StoreError>;

    /// Appends entries to an existing listing. Entries whose source record id
    /// is already present are dropped. Returns how many were added.
    fn append_agencies(&self, id: i64, entries: &[AgencyEntry]) -> Result<usize, StoreError>;
}
