// src/domain/property.rs

use serde::{Deserialize, Serialize};

/// Lifecycle status of a listing as tagged by the ingestion side.
/// Only `Available` records take part in a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    Available,
    Withdrawn,
    Sold,
}

impl ListingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ListingStatus::Available => "available",
            ListingStatus::Withdrawn => "withdrawn",
            ListingStatus::Sold => "sold",
        }
    }

    /// Unknown strings are treated as withdrawn so they never enter a scan.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "available" => ListingStatus::Available,
            "sold" => ListingStatus::Sold,
            _ => ListingStatus::Withdrawn,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

/// Point-in-time snapshot of one listing, as produced by ingestion.
/// The engine reads these and only ever writes back the shared flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyRecord {
    pub id: i64,

    // Location
    pub address: Option<String>,
    pub city: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,

    // Details
    pub price: Option<i64>,
    pub size_sqm: Option<f64>,
    pub floor: Option<String>,
    pub bedrooms: Option<i64>,
    pub bathrooms: Option<i64>,
    pub property_type: Option<String>,
    pub description: String,

    // Source
    pub portal: String,
    pub external_link: Option<String>,

    // Owner contact, copied onto a new shared listing when present
    pub owner_name: Option<String>,
    pub owner_phone: Option<String>,

    pub status: ListingStatus,
    pub is_shared: bool,
    pub is_multiagency: bool,
}

impl PropertyRecord {
    /// Both halves of the coordinate pair, or nothing.
    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some(Coordinates { lat, lon }),
            _ => None,
        }
    }

    /// A record with only the fields every listing has. Handy for building
    /// fixtures field by field.
    pub fn new(id: i64, portal: impl Into<String>) -> Self {
        Self {
            id,
            address: None,
            city: None,
            latitude: None,
            longitude: None,
            price: None,
            size_sqm: None,
            floor: None,
            bedrooms: None,
            bathrooms: None,
            property_type: None,
            description: String::new(),
            portal: portal.into(),
            external_link: None,
            owner_name: None,
            owner_phone: None,
            status: ListingStatus::Available,
            is_shared: false,
            is_multiagency: false,
        }
    }
}
