use rusqlite::{params, Row};

use crate::db::SqliteStore;
use crate::domain::property::{ListingStatus, PropertyRecord};
use crate::scan::stores::{ListingStore, StoreError};

const SELECT_RECORD_COLUMNS: &str = r#"
    SELECT
        id, address, city, latitude, longitude,
        price, size_sqm, floor, bedrooms, bathrooms, property_type, description,
        portal, external_link, owner_name, owner_phone,
        status, is_shared, is_multiagency
    FROM property_records
"#;

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<PropertyRecord> {
    let status: String = row.get("status")?;
    Ok(PropertyRecord {
        id: row.get("id")?,
        address: row.get("address")?,
        city: row.get("city")?,
        latitude: row.get("latitude")?,
        longitude: row.get("longitude")?,
        price: row.get("price")?,
        size_sqm: row.get("size_sqm")?,
        floor: row.get("floor")?,
        bedrooms: row.get("bedrooms")?,
        bathrooms: row.get("bathrooms")?,
        property_type: row.get("property_type")?,
        description: row.get("description")?,
        portal: row.get("portal")?,
        external_link: row.get("external_link")?,
        owner_name: row.get("owner_name")?,
        owner_phone: row.get("owner_phone")?,
        status: ListingStatus::parse(&status),
        is_shared: row.get("is_shared")?,
        is_multiagency: row.get("is_multiagency")?,
    })
}

impl ListingStore for SqliteStore {
    fn fetch_available(&self) -> Result<Vec<PropertyRecord>, StoreError> {
        self.db.with_conn(|conn| {
            // Same leniency as `ListingStatus::parse`.
            let sql = format!("{SELECT_RECORD_COLUMNS} WHERE lower(trim(status, ' ' || char(9, 10, 13))) = ?1 ORDER BY id");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![ListingStatus::Available.as_str()], record_from_row)?;

            let mut out = Vec::new();
            for r in rows {
                out.push(r?);
            }
            Ok(out)
        })
    }

    fn mark_shared(&self, id: i64, is_multiagency: bool) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE property_records SET is_shared = 1, is_multiagency = ?1 WHERE id = ?2",
                params![is_multiagency, id],
            )?;
            if updated == 0 {
                return Err(StoreError::NotFound { id });
            }
            Ok(())
        })
    }
}

/// Single record lookup, any status.
#[cfg(test)]
pub fn get_property_record(
    store: &SqliteStore,
    id: i64,
) -> Result<Option<PropertyRecord>, StoreError> {
    use rusqlite::OptionalExtension;

    store.db.with_conn(|conn| {
        let sql = format!("{SELECT_RECORD_COLUMNS} WHERE id = ?1");
        let record = conn
            .query_row(&sql, params![id], record_from_row)
            .optional()?;
        Ok(record)
    })
}

/// Inserts or replaces a record in the pool. Ingestion owns this table; the
/// function exists for imports and fixtures.
pub fn upsert_property_record(store: &SqliteStore, rec: &PropertyRecord) -> Result<(), StoreError> {
    store.db.with_conn(|conn| {
        conn.execute(
            r#"
            INSERT INTO property_records (
                id, address, city, latitude, longitude,
                price, size_sqm, floor, bedrooms, bathrooms, property_type, description,
                portal, external_link, owner_name, owner_phone,
                status, is_shared, is_multiagency
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)
            ON CONFLICT(id) DO UPDATE SET
                address = excluded.address,
                city = excluded.city,
                latitude = excluded.latitude,
                longitude = excluded.longitude,
                price = excluded.price,
                size_sqm = excluded.size_sqm,
                floor = excluded.floor,
                bedrooms = excluded.bedrooms,
                bathrooms = excluded.bathrooms,
                property_type = excluded.property_type,
                description = excluded.description,
                portal = excluded.portal,
                external_link = excluded.external_link,
                owner_name = excluded.owner_name,
                owner_phone = excluded.owner_phone,
                status = excluded.status
            "#,
            params![
                rec.id,
                &rec.address,
                &rec.city,
                rec.latitude,
                rec.longitude,
                rec.price,
                rec.size_sqm,
                &rec.floor,
                rec.bedrooms,
                rec.bathrooms,
                &rec.property_type,
                &rec.description,
                &rec.portal,
                &rec.external_link,
                &rec.owner_name,
                &rec.owner_phone,
                rec.status.as_str(),
                rec.is_shared,
                rec.is_multiagency,
            ],
        )?;
        Ok(())
    })
}
