// src/matching/geo.rs

use crate::domain::property::Coordinates;

const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Great-circle distance between two resolved coordinate pairs.
pub trait GeoDistance: Send + Sync {
    fn distance_meters(&self, a: Coordinates, b: Coordinates) -> f64;
}

/// Spherical-earth haversine distance.
#[derive(Debug, Clone, Copy, Default)]
pub struct Haversine;

impl GeoDistance for Haversine {
    fn distance_meters(&self, a: Coordinates, b: Coordinates) -> f64 {
        haversine_meters(a.lat, a.lon, b.lat, b.lon)
    }
}

pub fn haversine_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let lat1_r = lat1.to_radians();
    let lat2_r = lat2.to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + lat1_r.cos() * lat2_r.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().min(1.0).asin();
    EARTH_RADIUS_METERS * c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_point_is_zero() {
        let d = haversine_meters(45.4642, 9.19, 45.4642, 9.19);
        assert!(d < 0.001, "same point should be 0m, got {d}");
    }

    #[test]
    fn milan_duomo_to_castello() {
        // Duomo -> Castello Sforzesco is roughly 1.2km
        let d = haversine_meters(45.4641, 9.1919, 45.4705, 9.1793);
        assert!((d - 1_200.0).abs() < 200.0, "got {d}");
    }

    #[test]
    fn symmetric() {
        let h = Haversine;
        let a = Coordinates { lat: 41.9028, lon: 12.4964 };
        let b = Coordinates { lat: 41.8902, lon: 12.4922 };
        assert!((h.distance_meters(a, b) - h.distance_meters(b, a)).abs() < 1e-9);
    }
}
