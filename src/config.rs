use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use crate::matching::similarity::ScoringConfig;
use crate::scan::ScanSettings;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: String,
    pub bind_addr: SocketAddr,
    /// Zero disables the periodic scan.
    pub scan_interval_secs: u64,
    pub match_threshold: f64,
    pub geo_max_distance_meters: f64,
    pub fail_on_empty_pool: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "listing_dedup.sqlite3".to_string()),
            bind_addr: env::var("BIND_ADDR")
                .unwrap_or_else(|_| "127.0.0.1:3000".to_string())
                .parse()
                .context("BIND_ADDR must be a socket address like 127.0.0.1:3000")?,
            scan_interval_secs: env::var("SCAN_INTERVAL_SECS")
                .unwrap_or_else(|_| "3600".to_string())
                .parse()
                .context("SCAN_INTERVAL_SECS must be a whole number of seconds")?,
            match_threshold: env::var("MATCH_THRESHOLD")
                .unwrap_or_else(|_| "70".to_string())
                .parse()
                .context("MATCH_THRESHOLD must be a number between 0 and 100")?,
            geo_max_distance_meters: env::var("GEO_MAX_DISTANCE_METERS")
                .unwrap_or_else(|_| "500".to_string())
                .parse()
                .context("GEO_MAX_DISTANCE_METERS must be a number")?,
            fail_on_empty_pool: parse_flag(env::var("FAIL_ON_EMPTY_POOL").ok().as_deref())
                .context("FAIL_ON_EMPTY_POOL must be true or false")?,
        })
    }

    pub fn scan_interval(&self) -> Option<Duration> {
        (self.scan_interval_secs > 0).then(|| Duration::from_secs(self.scan_interval_secs))
    }

    pub fn scan_settings(&self) -> ScanSettings {
        ScanSettings {
            scoring: ScoringConfig {
                match_threshold: self.match_threshold,
                geo_max_distance_meters: self.geo_max_distance_meters,
                ..ScoringConfig::default()
            },
            fail_on_empty_pool: self.fail_on_empty_pool,
            ..ScanSettings::default()
        }
    }
}

fn parse_flag(raw: Option<&str>) -> Result<bool> {
    match raw.map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(false),
        Some(v) => match v.as_str() {
            "" | "0" | "false" | "no" | "off" => Ok(false),
            "1" | "true" | "yes" | "on" => Ok(true),
            other => anyhow::bail!("unrecognized flag value {other:?}"),
        },
    }
}
