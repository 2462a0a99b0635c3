// src/domain/shared_listing.rs

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One agency advertising a shared property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgencyEntry {
    pub agency_name: String,
    pub listing_link: Option<String>,
    pub source_property_record_id: Option<i64>,
}

/// How an agency entry can look inside the stored JSON array.
/// Older rows hold bare agency names instead of objects.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StoredAgency {
    Structured(AgencyEntry),
    Legacy(String),
}

impl From<StoredAgency> for AgencyEntry {
    fn from(stored: StoredAgency) -> Self {
        match stored {
            StoredAgency::Structured(entry) => entry,
            StoredAgency::Legacy(name) => AgencyEntry {
                agency_name: name,
                listing_link: None,
                source_property_record_id: None,
            },
        }
    }
}

/// Workflow stage of a shared listing on the acquisition side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcquisitionStage {
    New,
    Contacted,
    Negotiating,
    Acquired,
    Discarded,
}

impl AcquisitionStage {
    pub fn as_str(self) -> &'static str {
        match self {
            AcquisitionStage::New => "new",
            AcquisitionStage::Contacted => "contacted",
            AcquisitionStage::Negotiating => "negotiating",
            AcquisitionStage::Acquired => "acquired",
            AcquisitionStage::Discarded => "discarded",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "new" => Some(AcquisitionStage::New),
            "contacted" => Some(AcquisitionStage::Contacted),
            "negotiating" => Some(AcquisitionStage::Negotiating),
            "acquired" => Some(AcquisitionStage::Acquired),
            "discarded" => Some(AcquisitionStage::Discarded),
            _ => None,
        }
    }
}

/// A physical property advertised by two or more agencies.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SharedListing {
    pub id: i64,
    pub address: String,
    pub city: Option<String>,
    pub size_sqm: Option<f64>,
    pub property_type: Option<String>,
    pub price: Option<i64>,
    pub floor: Option<String>,
    pub owner_name: Option<String>,
    pub owner_phone: Option<String>,
    pub agencies: Vec<AgencyEntry>,
    pub dedupe_key: Option<String>,
    pub stage: AcquisitionStage,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl SharedListing {
    /// True when an entry for this source record is already present.
    pub fn has_source(&self, record_id: i64) -> bool {
        self.agencies
            .iter()
            .any(|a| a.source_property_record_id == Some(record_id))
    }
}

/// Insert payload for a shared listing that doesn't exist yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSharedListing {
    pub address: String,
    pub city: Option<String>,
    pub size_sqm: Option<f64>,
    pub property_type: Option<String>,
    pub price: Option<i64>,
    pub floor: Option<String>,
    pub owner_name: Option<String>,
    pub owner_phone: Option<String>,
    pub agencies: Vec<AgencyEntry>,
    pub dedupe_key: String,
}

/// Parses the stored JSON array, upgrading legacy bare-string entries.
pub fn parse_agencies(raw: &str) -> Result<Vec<AgencyEntry>, serde_json::Error> {
    let stored: Vec<StoredAgency> = serde_json::from_str(raw)?;
    Ok(stored.into_iter().map(AgencyEntry::from).collect())
}

/// Appends `incoming` to `existing`, skipping any entry whose source record id
/// is already present. Returns how many entries were added.
pub fn merge_agencies(existing: &mut Vec<AgencyEntry>, incoming: &[AgencyEntry]) -> usize {
    let mut added = 0;
    for entry in incoming {
        let duplicate = entry.source_property_record_id.is_some()
            && existing
                .iter()
                .any(|e| e.source_property_record_id == entry.source_property_record_id);
        if !duplicate {
            existing.push(entry.clone());
            added += 1;
        }
    }
    added
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, id: i64) -> AgencyEntry {
        AgencyEntry {
            agency_name: name.to_string(),
            listing_link: Some(format!("https://{name}.example/{id}")),
            source_property_record_id: Some(id),
        }
    }

    #[test]
    fn legacy_strings_are_upgraded() {
        let raw = r#"["Tecnocasa", {"agency_name":"Gabetti","listing_link":null,"source_property_record_id":7}]"#;
        let agencies = parse_agencies(raw).unwrap();

        assert_eq!(agencies.len(), 2);
        assert_eq!(agencies[0].agency_name, "Tecnocasa");
        assert_eq!(agencies[0].source_property_record_id, None);
        assert_eq!(agencies[1].source_property_record_id, Some(7));
    }

    #[test]
    fn merge_never_duplicates_a_source_record() {
        let mut agencies = vec![entry("a", 1)];

        let added = merge_agencies(&mut agencies, &[entry("a", 1), entry("b", 2)]);
        assert_eq!(added, 1);

        let added_again = merge_agencies(&mut agencies, &[entry("b", 2)]);
        assert_eq!(added_again, 0);
        assert_eq!(agencies.len(), 2);
    }
}
