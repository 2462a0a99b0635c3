// src/matching/similarity.rs

use std::cmp::Ordering;
use std::sync::Arc;

use crate::domain::property::{Coordinates, PropertyRecord};
use crate::matching::address::{address_similarity, is_generic_opt, normalize};
use crate::matching::geo::GeoDistance;

pub const GEO_WEIGHT: f64 = 40.0;
pub const ADDRESS_WEIGHT: f64 = 40.0;
pub const PRICE_WEIGHT: f64 = 20.0;
pub const SIZE_WEIGHT: f64 = 20.0;
pub const FLOOR_WEIGHT: f64 = 10.0;
pub const BEDROOM_WEIGHT: f64 = 10.0;

pub const INELIGIBLE_REASON: &str = "ineligible: generic/missing address";

/// Tunables for pair scoring and the match decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringConfig {
    /// A pair at or above this score is the same property.
    pub match_threshold: f64,
    /// Distance at which the geography signal reaches zero.
    pub geo_max_distance_meters: f64,
    /// Address similarity must exceed this to count as a signal at all.
    pub min_address_similarity: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            match_threshold: 70.0,
            geo_max_distance_meters: 500.0,
            min_address_similarity: 0.65,
        }
    }
}

/// Points one signal earned out of the points it was worth.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalScore {
    pub earned: f64,
    pub weight: f64,
    pub reason: Option<String>,
}

impl SignalScore {
    fn full(weight: f64, reason: impl Into<String>) -> Self {
        Self {
            earned: weight,
            weight,
            reason: Some(reason.into()),
        }
    }

    fn partial(earned: f64, weight: f64, reason: impl Into<String>) -> Self {
        Self {
            earned,
            weight,
            reason: Some(reason.into()),
        }
    }

    fn miss(weight: f64) -> Self {
        Self {
            earned: 0.0,
            weight,
            reason: None,
        }
    }
}

/// Running `{earned, possible}` totals over the signals available for a pair.
/// Missing data never adds to `possible`, so sparse listings aren't penalized.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScoreAccumulator {
    pub earned: f64,
    pub possible: f64,
}

impl ScoreAccumulator {
    pub fn add(&mut self, signal: &SignalScore) {
        self.earned += signal.earned;
        self.possible += signal.weight;
    }

    /// Percentage in `[0, 100]`; zero when no signal was available.
    pub fn score(&self) -> f64 {
        if self.possible > 0.0 {
            (self.earned / self.possible) * 100.0
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityResult {
    pub score: f64,
    pub reasons: Vec<String>,
    pub accumulator: ScoreAccumulator,
}

impl SimilarityResult {
    fn ineligible() -> Self {
        Self {
            score: 0.0,
            reasons: vec![INELIGIBLE_REASON.to_string()],
            accumulator: ScoreAccumulator::default(),
        }
    }

    pub fn is_eligible(&self) -> bool {
        !self.reasons.iter().any(|r| r == INELIGIBLE_REASON)
    }
}

/// Full credit at 0m, linearly down to nothing at `max_distance`.
pub fn geography_signal(distance_meters: f64, max_distance: f64) -> SignalScore {
    if distance_meters < max_distance {
        let earned = GEO_WEIGHT * (1.0 - distance_meters / max_distance);
        SignalScore::partial(earned, GEO_WEIGHT, format!("{distance_meters:.0}m apart"))
    } else {
        SignalScore::miss(GEO_WEIGHT)
    }
}

/// `None` when similarity doesn't clear `min_similarity`: a weak string match
/// is no evidence either way.
pub fn address_signal(normalized_a: &str, normalized_b: &str, min_similarity: f64) -> Option<SignalScore> {
    let similarity = address_similarity(normalized_a, normalized_b);
    if similarity > min_similarity {
        Some(SignalScore::partial(
            similarity * ADDRESS_WEIGHT,
            ADDRESS_WEIGHT,
            format!("address similarity {:.0}%", similarity * 100.0),
        ))
    } else {
        None
    }
}

/// Relative difference is taken against the lower of the two prices.
pub fn price_signal(a: i64, b: i64) -> Option<SignalScore> {
    if a <= 0 || b <= 0 {
        return None;
    }
    let diff = (a - b).abs() as f64 / a.min(b) as f64;
    Some(if diff < 0.05 {
        SignalScore::full(PRICE_WEIGHT, "price within 5%")
    } else if diff < 0.10 {
        SignalScore::partial(15.0, PRICE_WEIGHT, "price within 10%")
    } else {
        SignalScore::miss(PRICE_WEIGHT)
    })
}

pub fn size_signal(a: f64, b: f64) -> Option<SignalScore> {
    if a <= 0.0 || b <= 0.0 {
        return None;
    }
    let diff = (a - b).abs();
    Some(if diff <= 5.0 {
        SignalScore::full(SIZE_WEIGHT, "size within 5 m²")
    } else if diff <= 10.0 {
        SignalScore::partial(15.0, SIZE_WEIGHT, "size within 10 m²")
    } else {
        SignalScore::miss(SIZE_WEIGHT)
    })
}

pub fn floor_signal(a: &str, b: &str) -> Option<SignalScore> {
    let (a, b) = (a.trim(), b.trim());
    if a.is_empty() || b.is_empty() {
        return None;
    }
    Some(if a.eq_ignore_ascii_case(b) {
        SignalScore::full(FLOOR_WEIGHT, "same floor")
    } else {
        SignalScore::miss(FLOOR_WEIGHT)
    })
}

pub fn bedroom_signal(a: i64, b: i64) -> SignalScore {
    if a == b {
        SignalScore::full(BEDROOM_WEIGHT, "same bedroom count")
    } else {
        SignalScore::miss(BEDROOM_WEIGHT)
    }
}

/// Pairwise similarity between two listings.
#[derive(Clone)]
pub struct SimilarityScorer {
    config: ScoringConfig,
    geo: Arc<dyn GeoDistance>,
}

impl SimilarityScorer {
    pub fn new(config: ScoringConfig, geo: Arc<dyn GeoDistance>) -> Self {
        Self { config, geo }
    }

    pub fn is_match(&self, result: &SimilarityResult) -> bool {
        result.score >= self.config.match_threshold
    }

    /// Symmetric: `score(a, b) == score(b, a)`.
    pub fn score(&self, a: &PropertyRecord, b: &PropertyRecord) -> SimilarityResult {
        // Generic or missing addresses short-circuit everything else.
        if is_generic_opt(a.address.as_deref()) || is_generic_opt(b.address.as_deref()) {
            return SimilarityResult::ineligible();
        }

        let mut acc = ScoreAccumulator::default();
        let mut reasons = Vec::new();
        let mut push = |signal: SignalScore, acc: &mut ScoreAccumulator| {
            acc.add(&signal);
            if let Some(reason) = signal.reason {
                reasons.push(reason);
            }
        };

        // Location: coordinates when both have them, otherwise the address string.
        match (a.coordinates(), b.coordinates()) {
            (Some(ca), Some(cb)) => {
                let (first, second) = canonical_pair(ca, cb);
                let distance = self.geo.distance_meters(first, second);
                push(
                    geography_signal(distance, self.config.geo_max_distance_meters),
                    &mut acc,
                );
            }
            _ => {
                if let (Some(addr_a), Some(addr_b)) = (a.address.as_deref(), b.address.as_deref()) {
                    let (norm_a, norm_b) = (normalize(addr_a), normalize(addr_b));
                    if let Some(signal) =
                        address_signal(&norm_a, &norm_b, self.config.min_address_similarity)
                    {
                        push(signal, &mut acc);
                    }
                }
            }
        }

        if let (Some(pa), Some(pb)) = (a.price, b.price) {
            if let Some(signal) = price_signal(pa, pb) {
                push(signal, &mut acc);
            }
        }

        if let (Some(sa), Some(sb)) = (a.size_sqm, b.size_sqm) {
            if let Some(signal) = size_signal(sa, sb) {
                push(signal, &mut acc);
            }
        }

        if let (Some(fa), Some(fb)) = (a.floor.as_deref(), b.floor.as_deref()) {
            if let Some(signal) = floor_signal(fa, fb) {
                push(signal, &mut acc);
            }
        }

        if let (Some(ba), Some(bb)) = (a.bedrooms, b.bedrooms) {
            push(bedroom_signal(ba, bb), &mut acc);
        }

        SimilarityResult {
            score: acc.score(),
            reasons,
            accumulator: acc,
        }
    }
}

impl std::fmt::Debug for SimilarityScorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimilarityScorer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Orders two points so the distance call sees the same argument order
/// whichever record came first.
fn canonical_pair(a: Coordinates, b: Coordinates) -> (Coordinates, Coordinates) {
    match a.lat.total_cmp(&b.lat).then(a.lon.total_cmp(&b.lon)) {
        Ordering::Greater => (b, a),
        _ => (a, b),
    }
}
