// src/matching/address.rs

use strsim::normalized_levenshtein;

/// Street-type words and the abbreviation they collapse to. Abbreviations are
/// written with their dots; punctuation is stripped afterwards, so "Via" and
/// "V." normalize identically.
const STREET_TYPES: &[(&str, &str)] = &[
    ("via", "v."),
    ("viale", "vle."),
    ("corso", "c.so"),
    ("piazza", "p.za"),
];

/// Bare city names that show up in the address field when a portal only
/// knows the municipality.
const BARE_CITY_NAMES: &[&str] = &[
    "milano", "milan", "roma", "rome", "torino", "turin", "napoli", "naples", "bologna",
    "firenze", "florence", "genova", "venezia", "venice", "verona", "palermo", "bari",
    "catania", "padova", "brescia", "monza", "bergamo", "trieste", "parma", "modena",
];

const MIN_NORMALIZED_LEN: usize = 5;

/// Lower-cases, collapses street types, strips punctuation and collapses whitespace.
///
/// `"Via Roma, 10"` and `"V. Roma 10"` both become `"v roma 10"`.
pub fn normalize(address: &str) -> String {
    let lowered = address.to_lowercase();

    let collapsed: Vec<&str> = lowered
        .split_whitespace()
        .map(|token| {
            let bare = token.trim_end_matches(|c: char| c == ',' || c == ';');
            STREET_TYPES
                .iter()
                .find(|(word, _)| *word == bare)
                .map(|(_, abbr)| *abbr)
                .unwrap_or(token)
        })
        .collect();

    let stripped: String = collapsed
        .join(" ")
        .chars()
        .filter_map(|c| {
            if c.is_alphanumeric() || c.is_whitespace() {
                Some(c)
            } else if c == '.' || c == '\'' {
                // "c.so" -> "cso", "dell'arte" -> "dellarte"
                None
            } else {
                Some(' ')
            }
        })
        .collect();

    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// True when an address is too vague to locate a property: empty, a bare city
/// name, no street number, or too short once normalized.
pub fn is_generic(address: &str) -> bool {
    let trimmed = address.trim();
    if trimmed.is_empty() {
        return true;
    }

    let lowered = trimmed.to_lowercase();
    if BARE_CITY_NAMES.contains(&lowered.as_str()) {
        return true;
    }

    if !trimmed.chars().any(|c| c.is_ascii_digit()) {
        return true;
    }

    normalize(trimmed).chars().count() < MIN_NORMALIZED_LEN
}

/// Same as [`is_generic`] but treats a missing address as generic.
pub fn is_generic_opt(address: Option<&str>) -> bool {
    address.map_or(true, is_generic)
}

/// Token-set ratio in `[0, 1]` between two already-normalized addresses.
///
/// Tokens shared by both sides are compared against each side's full token
/// set, so extra words on one side ("v roma 10" vs "v roma 10 milano") don't
/// sink the score. Symmetric in its arguments.
pub fn address_similarity(a: &str, b: &str) -> f64 {
    let tokens_a = sorted_tokens(a);
    let tokens_b = sorted_tokens(b);

    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }

    let common: Vec<&str> = tokens_a
        .iter()
        .filter(|t| tokens_b.contains(t))
        .copied()
        .collect();
    let only_a: Vec<&str> = tokens_a
        .iter()
        .filter(|t| !tokens_b.contains(t))
        .copied()
        .collect();
    let only_b: Vec<&str> = tokens_b
        .iter()
        .filter(|t| !tokens_a.contains(t))
        .copied()
        .collect();

    let base = common.join(" ");
    let full_a = join_nonempty(&base, &only_a.join(" "));
    let full_b = join_nonempty(&base, &only_b.join(" "));

    let mut best = normalized_levenshtein(&full_a, &full_b);
    if !base.is_empty() {
        best = best
            .max(normalized_levenshtein(&base, &full_a))
            .max(normalized_levenshtein(&base, &full_b));
    }
    best
}

fn sorted_tokens(s: &str) -> Vec<&str> {
    let mut tokens: Vec<&str> = s.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.dedup();
    tokens
}

fn join_nonempty(head: &str, tail: &str) -> String {
    match (head.is_empty(), tail.is_empty()) {
        (true, _) => tail.to_string(),
        (_, true) => head.to_string(),
        _ => format!("{head} {tail}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_street_types_and_punctuation() {
        assert_eq!(normalize("Via Roma, 10"), "v roma 10");
        assert_eq!(normalize("V. Roma 10"), "v roma 10");
        assert_eq!(normalize("  VIALE   Monza 2/A "), "vle monza 2 a");
        assert_eq!(normalize("Corso Buenos Aires 33"), "cso buenos aires 33");
        assert_eq!(normalize("Piazza del Duomo, 1"), "pza del duomo 1");
        assert_eq!(normalize("P.za del Duomo 1"), "pza del duomo 1");
    }

    #[test]
    fn normalize_leaves_street_type_substrings_alone() {
        // "viareggio" contains "via" but isn't a street type.
        assert_eq!(normalize("Via Viareggio 4"), "v viareggio 4");
    }

    #[test]
    fn generic_addresses() {
        assert!(is_generic(""));
        assert!(is_generic("   "));
        assert!(is_generic("Milano"));
        assert!(is_generic(" ROMA "));
        assert!(is_generic("Via Roma"), "no street number");
        assert!(is_generic("V 1"), "too short once normalized");
        assert!(is_generic_opt(None));

        assert!(!is_generic("Via Roma 10"));
        assert!(!is_generic_opt(Some("Corso Como 5")));
    }

    #[test]
    fn similarity_is_one_for_identical_and_symmetric() {
        let a = normalize("Via Roma 10");
        let b = normalize("Via Roma 10, Milano");

        assert!((address_similarity(&a, &a) - 1.0).abs() < 1e-9);
        assert_eq!(address_similarity(&a, &b), address_similarity(&b, &a));
        assert!(address_similarity(&a, &b) > 0.9);
    }

    #[test]
    fn similarity_is_low_for_different_streets() {
        let a = normalize("Via Roma 10");
        let b = normalize("Corso Garibaldi 87");
        assert!(address_similarity(&a, &b) < 0.65);
    }
}
