use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::SqliteStore;
use crate::domain::shared_listing::{
    merge_agencies, parse_agencies, AcquisitionStage, AgencyEntry, NewSharedListing,
    SharedListing,
};
use crate::matching::address::normalize;
use crate::scan::stores::{SharedListingStore, StoreError};

const SELECT_SHARED_COLUMNS: &str = r#"
    SELECT
        id, address, city, size_sqm, property_type, price, floor,
        owner_name, owner_phone, agencies, dedupe_key, stage,
        created_at, updated_at
    FROM shared_listings
"#;

/// Row plus the raw agencies JSON, parsed outside the rusqlite row closure so
/// a malformed column surfaces as `StoreError::Agencies`.
struct SharedRow {
    listing: SharedListing,
    agencies_json: String,
}

fn shared_from_row(row: &Row<'_>) -> rusqlite::Result<SharedRow> {
    let stage: String = row.get("stage")?;
    Ok(SharedRow {
        listing: SharedListing {
            id: row.get("id")?,
            address: row.get("address")?,
            city: row.get("city")?,
            size_sqm: row.get("size_sqm")?,
            property_type: row.get("property_type")?,
            price: row.get("price")?,
            floor: row.get("floor")?,
            owner_name: row.get("owner_name")?,
            owner_phone: row.get("owner_phone")?,
            agencies: Vec::new(),
            dedupe_key: row.get("dedupe_key")?,
            stage: AcquisitionStage::parse(&stage).unwrap_or(AcquisitionStage::New),
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        },
        agencies_json: row.get("agencies")?,
    })
}

impl SharedRow {
    fn into_listing(self) -> Result<SharedListing, StoreError> {
        let mut listing = self.listing;
        listing.agencies = parse_agencies(&self.agencies_json)?;
        Ok(listing)
    }
}

fn find_by_key(conn: &Connection, key: &str) -> Result<Option<SharedListing>, StoreError> {
    // Exact hit on the stored key first.
    let sql = format!(
        "{SELECT_SHARED_COLUMNS} WHERE dedupe_key = ?1 AND stage != ?2 ORDER BY id LIMIT 1"
    );
    let exact = conn
        .query_row(
            &sql,
            params![key, AcquisitionStage::Acquired.as_str()],
            shared_from_row,
        )
        .optional()?;
    if let Some(row) = exact {
        return row.into_listing().map(Some);
    }

    // Rows written before dedupe keys existed: compare normalized addresses.
    let sql = format!(
        "{SELECT_SHARED_COLUMNS} WHERE (dedupe_key IS NULL OR dedupe_key = '') AND stage != ?1 ORDER BY id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![AcquisitionStage::Acquired.as_str()], shared_from_row)?;
    for row in rows {
        let row = row?;
        if normalize(&row.listing.address) == key {
            return row.into_listing().map(Some);
        }
    }
    Ok(None)
}

impl SharedListingStore for SqliteStore {
    fn find_by_normalized_address(&self, key: &str) -> Result<Option<SharedListing>, StoreError> {
        self.db.with_conn(|conn| find_by_key(conn, key))
    }

    fn create(&self, listing: &NewSharedListing) -> Result<i64, StoreError> {
        let agencies = serde_json::to_string(&listing.agencies)?;
        let now = Utc::now().naive_utc();

        self.db.with_conn(|conn| {
            conn.execute(
                r#"
                INSERT INTO shared_listings (
                    address, city, size_sqm, property_type, price, floor,
                    owner_name, owner_phone, agencies, dedupe_key, stage,
                    created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                "#,
                params![
                    &listing.address,
                    &listing.city,
                    listing.size_sqm,
                    &listing.property_type,
                    listing.price,
                    &listing.floor,
                    &listing.owner_name,
                    &listing.owner_phone,
                    agencies,
                    &listing.dedupe_key,
                    AcquisitionStage::New.as_str(),
                    now,
                    now,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    fn append_agencies(&self, id: i64, entries: &[AgencyEntry]) -> Result<usize, StoreError> {
        self.db.with_conn(|conn| {
            let tx = conn.transaction()?;

            let raw: Option<String> = tx
                .query_row(
                    "SELECT agencies FROM shared_listings WHERE id = ?1",
                    params![id],
                    |row| row.get(0),
                )
                .optional()?;
            let raw = raw.ok_or(StoreError::NotFound { id })?;

            // Re-serializing also rewrites legacy bare-string entries.
            let mut agencies = parse_agencies(&raw)?;
            let added = merge_agencies(&mut agencies, entries);

            tx.execute(
                "UPDATE shared_listings SET agencies = ?1, updated_at = ?2 WHERE id = ?3",
                params![serde_json::to_string(&agencies)?, Utc::now().naive_utc(), id],
            )?;
            tx.commit()?;
            Ok(added)
        })
    }
}

/// All shared listings, newest first.
pub fn list_shared_listings(store: &SqliteStore) -> Result<Vec<SharedListing>, StoreError> {
    store.db.with_conn(|conn| {
        let sql = format!("{SELECT_SHARED_COLUMNS} ORDER BY created_at DESC, id DESC");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], shared_from_row)?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?.into_listing()?);
        }
        Ok(out)
    })
}

#[cfg(test)]
pub fn count_shared_listings(store: &SqliteStore) -> Result<i64, StoreError> {
    store.db.with_conn(|conn| {
        let n = conn.query_row("SELECT COUNT(*) FROM shared_listings", [], |r| r.get(0))?;
        Ok(n)
    })
}

/// Moves a shared listing along the acquisition workflow.
#[cfg(test)]
pub fn set_stage(store: &SqliteStore, id: i64, stage: AcquisitionStage) -> Result<(), StoreError> {
    let now = Utc::now().naive_utc();
    store.db.with_conn(|conn| {
        let updated = conn.execute(
            "UPDATE shared_listings SET stage = ?1, updated_at = ?2 WHERE id = ?3",
            params![stage.as_str(), now, id],
        )?;
        if updated == 0 {
            return Err(StoreError::NotFound { id });
        }
        Ok(())
    })
}
