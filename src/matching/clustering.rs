// src/matching/clustering.rs

use std::collections::{BTreeMap, HashSet};

use rayon::prelude::*;
use serde::Serialize;
use tracing::debug;

use crate::domain::property::PropertyRecord;
use crate::matching::image::ImageSimilarity;
use crate::matching::similarity::SimilarityScorer;

/// Disjoint sets over `0..len`. `union` links roots without path compression,
/// so `find` walks the parent chain every time.
#[derive(Debug, Clone)]
pub struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    pub fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
        }
    }

    pub fn find(&self, mut x: usize) -> usize {
        while self.parent[x] != x {
            x = self.parent[x];
        }
        x
    }

    /// The lower root becomes the parent, so the representative of a set is
    /// always its smallest element.
    pub fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        let (root, child) = if ra < rb { (ra, rb) } else { (rb, ra) };
        self.parent[child] = root;
    }

    /// Sets keyed by representative, members in ascending order.
    pub fn sets(&self) -> BTreeMap<usize, Vec<usize>> {
        let mut sets: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for x in 0..self.parent.len() {
            sets.entry(self.find(x)).or_default().push(x);
        }
        sets
    }
}

/// A group of listings believed to describe one physical property.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cluster {
    /// Record ids, in pool order.
    pub members: Vec<i64>,
    pub match_score: f64,
    pub match_reasons: Vec<String>,
    pub is_multi_agency: bool,
    pub exclusivity_hint: bool,
}

impl Cluster {
    /// Singleton flagged by its description as an exclusive listing.
    pub fn exclusive(record_id: i64, reason: String) -> Self {
        Self {
            members: vec![record_id],
            match_score: 0.0,
            match_reasons: vec![reason],
            is_multi_agency: false,
            exclusivity_hint: true,
        }
    }
}

/// A pair that cleared the match decision. Unmatched pairs are dropped as
/// soon as they are scored.
struct MatchedPair {
    i: usize,
    j: usize,
    reasons: Vec<String>,
}

/// Groups records into multi-agency clusters.
///
/// Every unordered pair is scored; a pair matches when its score reaches the
/// threshold or the image comparator says the photos match. Matching is
/// transitive: A~B and B~C put A, B and C together even if A and C alone
/// wouldn't match. Only sets of two or more are returned.
///
/// Only matched pairs are held in memory. The cluster score is recomputed
/// afterwards over the pairs inside each cluster.
pub fn cluster_records(
    records: &[PropertyRecord],
    scorer: &SimilarityScorer,
    images: &dyn ImageSimilarity,
) -> Vec<Cluster> {
    let n = records.len();

    // `collect` keeps the sequential (i, j) order.
    let matched: Vec<MatchedPair> = (0..n)
        .into_par_iter()
        .flat_map_iter(|i| {
            ((i + 1)..n).filter_map(move |j| {
                let (a, b) = (&records[i], &records[j]);
                let result = scorer.score(a, b);
                // Ineligible pairs never reach the image comparator.
                let is_match = scorer.is_match(&result)
                    || (result.is_eligible() && images.is_visual_match(a, b));
                is_match.then(|| MatchedPair {
                    i,
                    j,
                    reasons: result.reasons,
                })
            })
        })
        .collect();

    let mut sets = DisjointSet::new(n);
    for pair in &matched {
        sets.union(pair.i, pair.j);
    }

    debug!(
        records = n,
        pairs = n * n.saturating_sub(1) / 2,
        matched_pairs = matched.len(),
        "Pairwise scoring complete"
    );

    let mut reasons: BTreeMap<usize, Vec<String>> = BTreeMap::new();
    for pair in matched {
        let seen = reasons.entry(sets.find(pair.i)).or_default();
        for reason in pair.reasons {
            if !seen.contains(&reason) {
                seen.push(reason);
            }
        }
    }

    sets.sets()
        .into_iter()
        .filter(|(_, members)| members.len() >= 2)
        .map(|(root, members)| Cluster {
            match_score: average_internal_score(records, &members, scorer),
            members: members.iter().map(|&idx| records[idx].id).collect(),
            match_reasons: reasons.remove(&root).unwrap_or_default(),
            is_multi_agency: true,
            exclusivity_hint: false,
        })
        .collect()
}

/// Mean score over every pair inside one set, matched or not.
fn average_internal_score(
    records: &[PropertyRecord],
    members: &[usize],
    scorer: &SimilarityScorer,
) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for (pos, &i) in members.iter().enumerate() {
        for &j in &members[pos + 1..] {
            sum += scorer.score(&records[i], &records[j]).score;
            count += 1;
        }
    }
    if count > 0 {
        sum / count as f64
    } else {
        0.0
    }
}

/// Ids of every record that belongs to some multi-member cluster.
pub fn clustered_ids(clusters: &[Cluster]) -> HashSet<i64> {
    clusters
        .iter()
        .filter(|c| c.is_multi_agency)
        .flat_map(|c| c.members.iter().copied())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::geo::Haversine;
    use crate::matching::image::NoImageSimilarity;
    use crate::matching::similarity::ScoringConfig;
    use std::sync::Arc;

    const DEG_PER_METER: f64 = 1.0 / 111_195.0;

    fn scorer() -> SimilarityScorer {
        SimilarityScorer::new(ScoringConfig::default(), Arc::new(Haversine))
    }

    fn listing(id: i64, address: &str, price: i64, size: f64) -> PropertyRecord {
        let mut rec = PropertyRecord::new(id, format!("agency-{id}"));
        rec.address = Some(address.to_string());
        rec.price = Some(price);
        rec.size_sqm = Some(size);
        rec
    }

    fn at_meters_north(mut rec: PropertyRecord, meters: f64) -> PropertyRecord {
        rec.latitude = Some(45.4642 + meters * DEG_PER_METER);
        rec.longitude = Some(9.19);
        rec
    }

    struct AlwaysMatch;
    impl ImageSimilarity for AlwaysMatch {
        fn is_visual_match(&self, _a: &PropertyRecord, _b: &PropertyRecord) -> bool {
            true
        }
    }

    #[test]
    fn disjoint_set_unions_transitively() {
        let mut sets = DisjointSet::new(5);
        sets.union(0, 1);
        sets.union(3, 1);

        assert_eq!(sets.find(0), sets.find(3));
        assert_ne!(sets.find(0), sets.find(2));
        assert_eq!(sets.find(3), 0);

        let all = sets.sets();
        assert_eq!(all.get(&0), Some(&vec![0, 1, 3]));
        assert_eq!(all.get(&2), Some(&vec![2]));
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn two_agencies_same_flat_form_one_cluster() {
        let records = vec![
            listing(10, "Via Roma 10", 300_000, 80.0),
            listing(11, "via Roma, 10", 310_000, 82.0),
            listing(12, "Corso Garibaldi 87", 520_000, 140.0),
        ];

        let clusters = cluster_records(&records, &scorer(), &NoImageSimilarity);

        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].members, vec![10, 11]);
        assert!(clusters[0].is_multi_agency);
        assert!(!clusters[0].exclusivity_hint);
        assert!(clusters[0].match_score >= 70.0);
    }

    #[test]
    fn generic_addresses_never_cluster() {
        let records = vec![
            listing(1, "Milano", 300_000, 80.0),
            listing(2, "Milano", 300_000, 80.0),
        ];

        assert!(cluster_records(&records, &scorer(), &NoImageSimilarity).is_empty());
        // Not even a visual match overrides the address gate.
        assert!(cluster_records(&records, &scorer(), &AlwaysMatch).is_empty());
    }

    #[test]
    fn chain_of_matches_is_one_cluster() {
        // a-b and b-c are 200m apart, a-c is 400m apart.
        let a = at_meters_north(listing(1, "Via Roma 10", 300_000, 80.0), 0.0);
        let b = at_meters_north(listing(2, "Via Roma 12", 300_000, 80.0), 200.0);
        let c = at_meters_north(listing(3, "Via Roma 14", 300_000, 80.0), 400.0);

        let s = scorer();
        assert!(s.score(&a, &b).score >= 70.0);
        assert!(s.score(&b, &c).score >= 70.0);
        assert!(s.score(&a, &c).score < 70.0);

        let clusters = cluster_records(&[a, b, c], &s, &NoImageSimilarity);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].members, vec![1, 2, 3]);

        // Average over all three internal pairs: (80 + 80 + 60) / 3
        assert!((clusters[0].match_score - 220.0 / 3.0).abs() < 0.5);
    }

    #[test]
    fn visual_match_joins_low_scoring_pair() {
        let records = vec![
            listing(1, "Via Roma 10", 300_000, 80.0),
            listing(2, "Corso Garibaldi 87", 520_000, 140.0),
        ];

        let clusters = cluster_records(&records, &scorer(), &AlwaysMatch);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clustered_ids(&clusters), HashSet::from([1, 2]));
    }

    #[test]
    fn reasons_are_deduplicated() {
        let records = vec![
            listing(1, "Via Roma 10", 300_000, 80.0),
            listing(2, "Via Roma 10", 300_000, 80.0),
            listing(3, "Via Roma 10", 300_000, 80.0),
        ];

        let clusters = cluster_records(&records, &scorer(), &NoImageSimilarity);
        assert_eq!(clusters.len(), 1);

        let reasons = &clusters[0].match_reasons;
        let unique: HashSet<&String> = reasons.iter().collect();
        assert_eq!(unique.len(), reasons.len());
        assert!(reasons.iter().any(|r| r == "price within 5%"));
    }

    #[test]
    fn large_pool_clusters_only_true_duplicates() {
        // 1000 flats about 1.1 km apart, each listed by two agencies.
        let flats = 1000;
        let records: Vec<PropertyRecord> = (0..flats)
            .flat_map(|flat| {
                let north = flat as f64 * 1_100.0;
                let address = format!("Via Roma {}", flat + 1);
                [
                    at_meters_north(listing(2 * flat, &address, 300_000, 80.0), north),
                    at_meters_north(listing(2 * flat + 1, &address, 300_000, 80.0), north),
                ]
            })
            .collect();

        let clusters = cluster_records(&records, &scorer(), &NoImageSimilarity);

        assert_eq!(clusters.len(), flats as usize);
        for (flat, cluster) in clusters.iter().enumerate() {
            let flat = flat as i64;
            assert_eq!(cluster.members, vec![2 * flat, 2 * flat + 1]);
            assert_eq!(cluster.match_score, 100.0);
        }
    }

    #[test]
    fn empty_and_single_pools_have_no_clusters() {
        assert!(cluster_records(&[], &scorer(), &NoImageSimilarity).is_empty());
        let one = vec![listing(1, "Via Roma 10", 300_000, 80.0)];
        assert!(cluster_records(&one, &scorer(), &NoImageSimilarity).is_empty());
    }
}
