use std::sync::Arc;

use crate::db::connection::{init_db, Database};
use crate::db::listings::upsert_property_record;
use crate::db::SqliteStore;
use crate::domain::property::PropertyRecord;
use crate::matching::geo::Haversine;
use crate::matching::image::NoImageSimilarity;
use crate::scan::{ScanOrchestrator, ScanSettings};

/// A fresh SQLite file with the production schema. Keep the `TempDir` alive
/// for as long as the database is used.
pub struct TestDb {
    pub _dir: tempfile::TempDir,
    pub db: Database,
    pub store: SqliteStore,
}

pub fn init_test_db() -> TestDb {
    let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir failed: {e}"));
    let db = Database::new(dir.path().join("test.sqlite").to_string_lossy().to_string());

    init_db(&db).unwrap_or_else(|e| panic!("Database initialization failed: {e}"));

    TestDb {
        store: SqliteStore::new(db.clone()),
        db,
        _dir: dir,
    }
}

pub fn orchestrator_for(test_db: &TestDb, settings: ScanSettings) -> Arc<ScanOrchestrator> {
    Arc::new(ScanOrchestrator::new(
        Arc::new(test_db.store.clone()),
        Arc::new(test_db.store.clone()),
        Arc::new(Haversine),
        Arc::new(NoImageSimilarity),
        settings,
    ))
}

pub fn listing(id: i64, portal: &str, address: &str, price: i64, size_sqm: f64) -> PropertyRecord {
    let mut rec = PropertyRecord::new(id, portal);
    rec.address = Some(address.to_string());
    rec.city = Some("Milano".to_string());
    rec.price = Some(price);
    rec.size_sqm = Some(size_sqm);
    rec.external_link = Some(format!("https://{portal}.example/annunci/{id}"));
    rec
}

pub fn seed(test_db: &TestDb, records: &[PropertyRecord]) {
    for rec in records {
        upsert_property_record(&test_db.store, rec).unwrap();
    }
}
