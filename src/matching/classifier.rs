// src/matching/classifier.rs

use std::collections::HashSet;

use crate::domain::property::PropertyRecord;
use crate::matching::clustering::{clustered_ids, Cluster};

/// Phrases in a description that mean the listing is exclusive to one agency.
/// Matched on whole words.
pub const DEFAULT_EXCLUSIVITY_KEYWORDS: &[&str] = &[
    "in esclusiva",
    "esclusiva",
    "esclusivo",
    "mandato esclusivo",
    "solo da noi",
    "exclusive listing",
    "exclusive mandate",
    "exclusivity",
];

/// A keyword preceded by one of these within `NEGATION_WINDOW` words doesn't
/// count: "non in esclusiva", "not an exclusive listing".
const NEGATIONS: &[&str] = &["non", "no", "senza", "not", "without"];
const NEGATION_WINDOW: usize = 2;

fn words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

/// Returns the first keyword found in `description` as whole words, ignoring
/// case and negated mentions.
pub fn exclusivity_keyword<'a>(description: &str, keywords: &[&'a str]) -> Option<&'a str> {
    let text = words(description);

    keywords.iter().copied().find(|kw| {
        let phrase = words(kw);
        if phrase.is_empty() || phrase.len() > text.len() {
            return false;
        }
        (0..=text.len() - phrase.len()).any(|start| {
            text[start..start + phrase.len()] == phrase[..]
                && !text[start.saturating_sub(NEGATION_WINDOW)..start]
                    .iter()
                    .any(|w| NEGATIONS.contains(&w.as_str()))
        })
    })
}

/// Emits an exclusivity-hint singleton for every record left out of the
/// multi-agency clusters whose description carries an exclusivity keyword.
pub fn classify_unclustered(
    records: &[PropertyRecord],
    clusters: &[Cluster],
    keywords: &[&str],
) -> Vec<Cluster> {
    let clustered: HashSet<i64> = clustered_ids(clusters);

    records
        .iter()
        .filter(|r| !clustered.contains(&r.id))
        .filter_map(|r| {
            exclusivity_keyword(&r.description, keywords)
                .map(|kw| Cluster::exclusive(r.id, format!("description mentions \"{kw}\"")))
        })
        .collect()
}
