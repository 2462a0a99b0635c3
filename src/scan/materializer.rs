// src/scan/materializer.rs

use std::collections::HashMap;

use thiserror::Error;
use tracing::{debug, error, info};

use crate::domain::property::PropertyRecord;
use crate::domain::shared_listing::{AgencyEntry, NewSharedListing};
use crate::matching::address::normalize;
use crate::matching::clustering::Cluster;
use crate::scan::stores::{ListingStore, SharedListingStore, StoreError};

#[derive(Debug, Error)]
pub enum MaterializeError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("cluster member {0} is not in the scanned pool")]
    UnknownMember(i64),

    #[error("cluster lead record {0} has no address")]
    MissingAddress(i64),

    #[error("cluster has no members")]
    EmptyCluster,
}

/// What happened to one multi-agency cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterOutcome {
    Created { shared_listing_id: i64 },
    Updated { shared_listing_id: i64, added: usize },
    Unchanged { shared_listing_id: i64 },
}

#[derive(Debug)]
pub struct ClusterFailure {
    pub members: Vec<i64>,
    pub error: MaterializeError,
}

#[derive(Debug, Default)]
pub struct MaterializeReport {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// Records whose shared flags were written back.
    pub marked_shared: usize,
    pub failures: Vec<ClusterFailure>,
}

fn agency_entry(record: &PropertyRecord) -> AgencyEntry {
    AgencyEntry {
        agency_name: record.portal.clone(),
        listing_link: record.external_link.clone(),
        source_property_record_id: Some(record.id),
    }
}

/// Upserts a shared listing per multi-agency cluster and flags the members.
///
/// Each cluster is its own unit of work: a failure is logged and recorded in
/// the report, and the remaining clusters still run.
pub fn materialize_clusters(
    clusters: &[Cluster],
    records: &[PropertyRecord],
    listings: &dyn ListingStore,
    shared: &dyn SharedListingStore,
) -> MaterializeReport {
    let by_id: HashMap<i64, &PropertyRecord> = records.iter().map(|r| (r.id, r)).collect();
    let mut report = MaterializeReport::default();

    for cluster in clusters.iter().filter(|c| c.is_multi_agency) {
        match materialize_one(cluster, &by_id, listings, shared) {
            Ok(outcome) => {
                report.marked_shared += cluster.members.len();
                match outcome {
                    ClusterOutcome::Created { shared_listing_id } => {
                        info!(shared_listing_id, members = ?cluster.members, "Created shared listing");
                        report.created += 1;
                    }
                    ClusterOutcome::Updated {
                        shared_listing_id,
                        added,
                    } => {
                        info!(shared_listing_id, added, "Added agencies to shared listing");
                        report.updated += 1;
                    }
                    ClusterOutcome::Unchanged { shared_listing_id } => {
                        debug!(shared_listing_id, "Shared listing already up to date");
                        report.unchanged += 1;
                    }
                }
            }
            Err(e) => {
                error!(members = ?cluster.members, error = %e, "Failed to materialize cluster");
                report.failures.push(ClusterFailure {
                    members: cluster.members.clone(),
                    error: e,
                });
            }
        }
    }

    report
}

pub fn materialize_one(
    cluster: &Cluster,
    by_id: &HashMap<i64, &PropertyRecord>,
    listings: &dyn ListingStore,
    shared: &dyn SharedListingStore,
) -> Result<ClusterOutcome, MaterializeError> {
    let members: Vec<&PropertyRecord> = cluster
        .members
        .iter()
        .map(|id| {
            by_id
                .get(id)
                .copied()
                .ok_or(MaterializeError::UnknownMember(*id))
        })
        .collect::<Result<_, _>>()?;

    let Some(lead) = members.first() else {
        return Err(MaterializeError::EmptyCluster);
    };
    let address = lead
        .address
        .as_deref()
        .ok_or(MaterializeError::MissingAddress(lead.id))?;
    let dedupe_key = normalize(address);

    let incoming: Vec<AgencyEntry> = members.iter().map(|r| agency_entry(r)).collect();

    let outcome = match shared.find_by_normalized_address(&dedupe_key)? {
        None => {
            let new_listing = NewSharedListing {
                address: address.to_string(),
                city: lead.city.clone(),
                size_sqm: lead.size_sqm,
                property_type: lead.property_type.clone(),
                price: lead.price,
                floor: lead.floor.clone(),
                owner_name: lead.owner_name.clone(),
                owner_phone: lead.owner_phone.clone(),
                agencies: incoming,
                dedupe_key,
            };
            ClusterOutcome::Created {
                shared_listing_id: shared.create(&new_listing)?,
            }
        }
        Some(existing) => {
            let missing: Vec<AgencyEntry> = incoming
                .into_iter()
                .filter(|entry| {
                    entry
                        .source_property_record_id
                        .map_or(true, |id| !existing.has_source(id))
                })
                .collect();

            if missing.is_empty() {
                ClusterOutcome::Unchanged {
                    shared_listing_id: existing.id,
                }
            } else {
                let added = shared.append_agencies(existing.id, &missing)?;
                ClusterOutcome::Updated {
                    shared_listing_id: existing.id,
                    added,
                }
            }
        }
    };

    for member in &members {
        listings.mark_shared(member.id, true)?;
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::shared_listing::{merge_agencies, AcquisitionStage, SharedListing};
    use chrono::Utc;
    use std::sync::Mutex;

    /// In-memory stores with an optional poisoned address that fails to create.
    #[derive(Default)]
    struct MemoryStore {
        shared: Mutex<Vec<SharedListing>>,
        marked: Mutex<Vec<(i64, bool)>>,
        fail_create_for: Option<String>,
    }

    impl ListingStore for MemoryStore {
        fn fetch_available(&self) -> Result<Vec<PropertyRecord>, StoreError> {
            Ok(Vec::new())
        }

        fn mark_shared(&self, id: i64, is_multiagency: bool) -> Result<(), StoreError> {
            self.marked.lock().unwrap().push((id, is_multiagency));
            Ok(())
        }
    }

    impl SharedListingStore for MemoryStore {
        fn find_by_normalized_address(&self, key: &str) -> Result<Option<SharedListing>, StoreError> {
            Ok(self
                .shared
                .lock()
                .unwrap()
                .iter()
                .find(|s| s.stage != AcquisitionStage::Acquired && normalize(&s.address) == key)
                .cloned())
        }

        fn create(&self, listing: &NewSharedListing) -> Result<i64, StoreError> {
            if self.fail_create_for.as_deref() == Some(listing.address.as_str()) {
                return Err(StoreError::Sqlite(rusqlite::Error::InvalidQuery));
            }
            let mut shared = self.shared.lock().unwrap();
            let id = shared.len() as i64 + 1;
            let now = Utc::now().naive_utc();
            shared.push(SharedListing {
                id,
                address: listing.address.clone(),
                city: listing.city.clone(),
                size_sqm: listing.size_sqm,
                property_type: listing.property_type.clone(),
                price: listing.price,
                floor: listing.floor.clone(),
                owner_name: listing.owner_name.clone(),
                owner_phone: listing.owner_phone.clone(),
                agencies: listing.agencies.clone(),
                dedupe_key: Some(listing.dedupe_key.clone()),
                stage: AcquisitionStage::New,
                created_at: now,
                updated_at: now,
            });
            Ok(id)
        }

        fn append_agencies(&self, id: i64, entries: &[AgencyEntry]) -> Result<usize, StoreError> {
            let mut shared = self.shared.lock().unwrap();
            let listing = shared
                .iter_mut()
                .find(|s| s.id == id)
                .ok_or(StoreError::NotFound { id })?;
            Ok(merge_agencies(&mut listing.agencies, entries))
        }
    }

    fn rec(id: i64, address: &str, portal: &str) -> PropertyRecord {
        let mut r = PropertyRecord::new(id, portal);
        r.address = Some(address.to_string());
        r.city = Some("Milano".to_string());
        r.price = Some(300_000);
        r.size_sqm = Some(80.0);
        r.owner_phone = Some("+39 02 1234567".to_string());
        r.external_link = Some(format!("https://{portal}.example/{id}"));
        r
    }

    fn cluster(members: &[i64]) -> Cluster {
        Cluster {
            members: members.to_vec(),
            match_score: 95.0,
            match_reasons: vec![],
            is_multi_agency: true,
            exclusivity_hint: false,
        }
    }

    #[test]
    fn new_cluster_creates_shared_listing_seeded_from_lead() {
        let store = MemoryStore::default();
        let records = vec![rec(1, "Via Roma 10", "immobiliare"), rec(2, "via roma, 10", "idealista")];

        let report = materialize_clusters(&[cluster(&[1, 2])], &records, &store, &store);

        assert_eq!(report.created, 1);
        assert_eq!(report.marked_shared, 2);
        assert!(report.failures.is_empty());

        let shared = store.shared.lock().unwrap();
        assert_eq!(shared.len(), 1);
        assert_eq!(shared[0].address, "Via Roma 10");
        assert_eq!(shared[0].owner_phone.as_deref(), Some("+39 02 1234567"));
        assert_eq!(shared[0].dedupe_key.as_deref(), Some("v roma 10"));

        let names: Vec<&str> = shared[0].agencies.iter().map(|a| a.agency_name.as_str()).collect();
        assert_eq!(names, vec!["immobiliare", "idealista"]);
        assert_eq!(
            *store.marked.lock().unwrap(),
            vec![(1, true), (2, true)]
        );
    }

    #[test]
    fn rerun_is_idempotent_and_merges_only_new_agencies() {
        let store = MemoryStore::default();
        let mut records = vec![rec(1, "Via Roma 10", "immobiliare"), rec(2, "Via Roma 10", "idealista")];

        let first = materialize_clusters(&[cluster(&[1, 2])], &records, &store, &store);
        assert_eq!(first.created, 1);

        let second = materialize_clusters(&[cluster(&[1, 2])], &records, &store, &store);
        assert_eq!(second.created, 0);
        assert_eq!(second.unchanged, 1);

        // A third agency shows up for the same flat.
        records.push(rec(3, "V. Roma 10", "casa.it"));
        let third = materialize_clusters(&[cluster(&[1, 2, 3])], &records, &store, &store);
        assert_eq!(third.updated, 1);

        let shared = store.shared.lock().unwrap();
        assert_eq!(shared.len(), 1);
        assert_eq!(shared[0].agencies.len(), 3);
    }

    #[test]
    fn one_failing_cluster_does_not_stop_the_rest() {
        let store = MemoryStore {
            fail_create_for: Some("Via Roma 10".to_string()),
            ..MemoryStore::default()
        };
        let records = vec![
            rec(1, "Via Roma 10", "a"),
            rec(2, "Via Roma 10", "b"),
            rec(3, "Corso Como 5", "a"),
            rec(4, "Corso Como 5", "b"),
        ];

        let report =
            materialize_clusters(&[cluster(&[1, 2]), cluster(&[3, 4])], &records, &store, &store);

        assert_eq!(report.created, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].members, vec![1, 2]);
        assert!(matches!(
            report.failures[0].error,
            MaterializeError::Store(StoreError::Sqlite(_))
        ));
        // Members of the failed cluster were not flagged.
        assert_eq!(*store.marked.lock().unwrap(), vec![(3, true), (4, true)]);
    }

    #[test]
    fn acquired_listing_is_not_reused() {
        let store = MemoryStore::default();
        let records = vec![rec(1, "Via Roma 10", "a"), rec(2, "Via Roma 10", "b")];

        materialize_clusters(&[cluster(&[1, 2])], &records, &store, &store);
        store.shared.lock().unwrap()[0].stage = AcquisitionStage::Acquired;

        let report = materialize_clusters(&[cluster(&[1, 2])], &records, &store, &store);
        assert_eq!(report.created, 1);
        assert_eq!(store.shared.lock().unwrap().len(), 2);
    }

    #[test]
    fn unknown_member_is_reported() {
        let store = MemoryStore::default();
        let records = vec![rec(1, "Via Roma 10", "a")];

        let report = materialize_clusters(&[cluster(&[1, 9])], &records, &store, &store);
        assert!(matches!(
            report.failures[0].error,
            MaterializeError::UnknownMember(9)
        ));
    }
}
