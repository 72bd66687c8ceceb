//! Feature extraction for product matching.
//!
//! Provides pure functions for turning a raw product or query string into a
//! structured [`ProductFeatures`] bundle, plus the text primitives the scorer
//! builds on:
//! - Normalization with static spelling correction
//! - Phonetic fingerprinting
//! - Tokenization with suffix-stripping stemming
//! - Brand / category / size extraction against the lexicon tables
//! - Character bigrams, Jaccard overlap, Levenshtein edit distance
//!
//! Extraction never fails; absent signals are `None`/empty, not errors.

use grocermatch_lexicon as lexicon;
use grocermatch_model::{ProductFeatures, TextStats};
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

static SIZE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    let pattern = format!(
        r"(\d+(?:\.\d+)?)\s*({})\b",
        lexicon::unit_alternation()
    );
    Regex::new(&pattern).expect("size pattern is valid")
});

/// Normalize a string for matching: lower-case, trim, collapse whitespace,
/// and correct each word against the static misspelling dictionary.
pub fn normalize(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .map(|word| lexicon::correct_spelling(word).unwrap_or(word).to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Compute a phonetic fingerprint: alphabetic characters only, vowels
/// removed, runs of repeated consonants collapsed to one.
///
/// "cheese" → "chs", "milk" → "mlk". Coarse by construction; used for
/// sound-alike brand matching, not display.
pub fn phonetic_key(text: &str) -> String {
    let mut key = String::new();
    let mut last = None;
    for c in text.to_lowercase().chars() {
        if !c.is_alphabetic() || matches!(c, 'a' | 'e' | 'i' | 'o' | 'u') {
            continue;
        }
        if last != Some(c) {
            key.push(c);
            last = Some(c);
        }
    }
    key
}

/// Apply suffix-stripping stemming rules, first match wins:
/// `-ies→y`, `-es→∅`, `-s→∅` (unless `-ss`), `-ed→∅`, `-ing→∅`.
///
/// A rule only applies when it leaves a stem of at least two characters;
/// otherwise the token passes through unchanged.
pub fn stem(token: &str) -> String {
    if let Some(base) = token.strip_suffix("ies") {
        if base.len() >= 1 {
            return format!("{base}y");
        }
    }
    if let Some(base) = token.strip_suffix("es") {
        if base.len() >= 2 {
            return base.to_string();
        }
    }
    if let Some(base) = token.strip_suffix('s') {
        if !base.ends_with('s') && base.len() >= 2 {
            return base.to_string();
        }
    }
    if let Some(base) = token.strip_suffix("ed") {
        if base.len() >= 2 {
            return base.to_string();
        }
    }
    if let Some(base) = token.strip_suffix("ing") {
        if base.len() >= 2 {
            return base.to_string();
        }
    }
    token.to_string()
}

/// Tokenize a normalized string: strip punctuation except hyphens and
/// apostrophes, split on whitespace, drop tokens of length ≤ 1, stem.
pub fn tokenize(normalized: &str) -> Vec<String> {
    normalized
        .split_whitespace()
        .map(|word| {
            word.chars()
                .filter(|c| c.is_alphanumeric() || *c == '-' || *c == '\'')
                .collect::<String>()
        })
        .filter(|token| token.chars().count() > 1)
        .map(|token| stem(&token))
        .collect()
}

/// Whether `term` occurs in `text` on word boundaries ("pop" does not match
/// inside "popcorn").
fn contains_term(text: &str, term: &str) -> bool {
    let mut start = 0;
    while let Some(pos) = text[start..].find(term) {
        let begin = start + pos;
        let end = begin + term.len();
        let boundary_before = begin == 0
            || !text[..begin]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_alphanumeric());
        let boundary_after = end == text.len()
            || !text[end..].chars().next().is_some_and(|c| c.is_alphanumeric());
        if boundary_before && boundary_after {
            return true;
        }
        start = begin
            + text[begin..]
                .chars()
                .next()
                .map_or(1, |c| c.len_utf8());
    }
    false
}

/// Longest-match scan against the brand table; first hit wins.
pub fn extract_brand(normalized: &str) -> Option<String> {
    lexicon::brand_terms()
        .iter()
        .find(|(term, _)| contains_term(normalized, term))
        .map(|(_, canonical)| canonical.to_string())
}

/// Longest-match scan against the category table; first hit wins.
pub fn extract_category(normalized: &str) -> Option<String> {
    lexicon::category_terms()
        .iter()
        .find(|(term, _)| contains_term(normalized, term))
        .map(|(_, canonical)| canonical.to_string())
}

/// First `<number><unit>` occurrence, with the unit alias canonicalized.
pub fn extract_size(normalized: &str) -> Option<(f32, String)> {
    let caps = SIZE_PATTERN.captures(normalized)?;
    let value: f32 = caps[1].parse().ok()?;
    let unit = lexicon::canonical_unit(&caps[2])?;
    Some((value, unit.to_string()))
}

/// Character bigrams of a string with whitespace removed, as a set.
pub fn bigrams(text: &str) -> BTreeSet<String> {
    let chars: Vec<char> = text.chars().filter(|c| !c.is_whitespace()).collect();
    if chars.len() < 2 {
        return chars.iter().map(|c| c.to_string()).collect();
    }
    chars.windows(2).map(|w| w.iter().collect()).collect()
}

/// Jaccard overlap of two sets: |A ∩ B| / |A ∪ B|, 1.0 when both empty.
pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f32 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    if union == 0 {
        return 1.0;
    }
    intersection as f32 / union as f32
}

/// Levenshtein edit distance between two strings.
pub fn edit_distance(s1: &str, s2: &str) -> usize {
    let a: Vec<char> = s1.chars().collect();
    let b: Vec<char> = s2.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Extract the full feature bundle from a raw product or query string.
///
/// Deterministic pure function of the normalized input; the only external
/// dependency is the static lexicon.
pub fn extract(text: &str) -> ProductFeatures {
    extract_with(text, phonetic_key)
}

/// [`extract`] with an injectable phonetic-key function, so callers that
/// extract many near-duplicate strings can route the fingerprint through a
/// memo table.
pub fn extract_with(text: &str, phonetic: impl FnOnce(&str) -> String) -> ProductFeatures {
    let normalized = normalize(text);
    let mut features = ProductFeatures::empty(normalized.clone());

    features.phonetic = phonetic(&normalized);

    let tokens = tokenize(&normalized);

    features.brand = extract_brand(&normalized);
    features.category = extract_category(&normalized);
    if let Some((size, unit)) = extract_size(&normalized) {
        features.size = Some(size);
        features.unit = Some(unit);
    }

    features.keywords = tokens
        .iter()
        .filter(|token| {
            let in_brand = features
                .brand
                .as_deref()
                .is_some_and(|brand| brand.contains(token.as_str()));
            let is_size = features
                .size
                .is_some_and(|size| token.parse::<f32>().is_ok_and(|v| v == size));
            !in_brand && !is_size
        })
        .cloned()
        .collect();

    let total_len: usize = tokens.iter().map(|t| t.chars().count()).sum();
    features.stats = TextStats {
        length: normalized.chars().count(),
        word_count: tokens.len(),
        avg_word_length: if tokens.is_empty() {
            0.0
        } else {
            total_len as f32 / tokens.len() as f32
        },
        unique_word_count: tokens.iter().collect::<BTreeSet<_>>().len(),
        digit_group_count: count_digit_groups(&normalized),
    };

    features
}

fn count_digit_groups(text: &str) -> usize {
    let mut groups = 0;
    let mut in_group = false;
    for c in text.chars() {
        if c.is_ascii_digit() {
            if !in_group {
                groups += 1;
                in_group = true;
            }
        } else {
            in_group = false;
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  Great Value  2% Milk "), "great value 2% milk");
        assert_eq!(normalize("CHOCLATE bar"), "chocolate bar");
    }

    #[test]
    fn test_phonetic_key() {
        assert_eq!(phonetic_key("milk"), "mlk");
        assert_eq!(phonetic_key("cheese"), "chs");
        assert_eq!(phonetic_key("Coca-Cola"), "ccl");
        assert_eq!(phonetic_key("aeiou"), "");
    }

    #[test]
    fn test_stem_rules() {
        assert_eq!(stem("berries"), "berry");
        assert_eq!(stem("tomatoes"), "tomato");
        assert_eq!(stem("eggs"), "egg");
        assert_eq!(stem("glass"), "glass");
        assert_eq!(stem("sliced"), "slic");
        assert_eq!(stem("baking"), "bak");
        assert_eq!(stem("milk"), "milk");
    }

    #[test]
    fn test_stem_keeps_short_tokens() {
        // stripping would leave fewer than two characters
        assert_eq!(stem("is"), "is");
        assert_eq!(stem("ed"), "ed");
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(
            tokenize("great value 2% milk, 1 gal"),
            vec!["great", "value", "milk", "gal"]
        );
        // hyphens and apostrophes survive
        assert_eq!(tokenize("lay's sour-cream"), vec!["lay'", "sour-cream"]);
    }

    #[test]
    fn test_extract_brand_longest_match() {
        assert_eq!(
            extract_brand("great value whole milk"),
            Some("great value".to_string())
        );
        // alias resolves to canonical
        assert_eq!(extract_brand("diet coke 12 oz"), Some("coca-cola".to_string()));
        assert_eq!(extract_brand("store brand milk"), None);
    }

    #[test]
    fn test_extract_brand_respects_word_boundaries() {
        // "gv" must not match inside another word
        assert_eq!(extract_brand("gvx cereal"), None);
        assert_eq!(extract_brand("gv cereal"), Some("great value".to_string()));
    }

    #[test]
    fn test_extract_category() {
        assert_eq!(extract_category("whole milk"), Some("dairy".to_string()));
        assert_eq!(extract_category("orange juice"), Some("beverages".to_string()));
        assert_eq!(extract_category("mystery item"), None);
    }

    #[test]
    fn test_extract_size() {
        assert_eq!(extract_size("milk 1 gal"), Some((1.0, "gal".to_string())));
        assert_eq!(extract_size("12oz cola"), Some((12.0, "oz".to_string())));
        assert_eq!(extract_size("2.5 pounds beef"), Some((2.5, "lb".to_string())));
        // first match wins
        assert_eq!(extract_size("6 ct 12 oz"), Some((6.0, "ct".to_string())));
        assert_eq!(extract_size("plain milk"), None);
    }

    #[test]
    fn test_extract_size_ignores_bare_numbers() {
        assert_eq!(extract_size("2% milk"), None);
    }

    #[test]
    fn test_bigrams() {
        let grams = bigrams("nike");
        assert_eq!(
            grams.iter().cloned().collect::<Vec<_>>(),
            vec!["ik", "ke", "ni"]
        );
        assert_eq!(bigrams("a").len(), 1);
        assert!(bigrams("").is_empty());
    }

    #[test]
    fn test_jaccard() {
        let a: BTreeSet<String> = ["milk", "whole"].iter().map(|s| s.to_string()).collect();
        let b: BTreeSet<String> = ["milk", "skim"].iter().map(|s| s.to_string()).collect();
        assert!((jaccard(&a, &b) - 1.0 / 3.0).abs() < 1e-6);
        assert_eq!(jaccard(&a, &a), 1.0);
        assert_eq!(jaccard(&BTreeSet::new(), &BTreeSet::new()), 1.0);
    }

    #[test]
    fn test_edit_distance() {
        assert_eq!(edit_distance("milk", "milk"), 0);
        assert_eq!(edit_distance("milk", "silk"), 1);
        assert_eq!(edit_distance("milk", ""), 4);
        assert_eq!(edit_distance("chocolate", "choclate"), 1);
    }

    #[test]
    fn test_extract_great_value_milk() {
        let f = extract("Great Value 2% Milk 1 Gal");

        assert_eq!(f.brand.as_deref(), Some("great value"));
        assert_eq!(f.category.as_deref(), Some("dairy"));
        assert_eq!(f.size, Some(1.0));
        assert_eq!(f.unit.as_deref(), Some("gal"));
        assert!(f.keywords.contains("milk"));
        // brand words are excluded from keywords
        assert!(!f.keywords.contains("great"));
        assert!(!f.keywords.contains("value"));
        assert_eq!(f.stats.digit_group_count, 2);
    }

    #[test]
    fn test_extract_never_fails_on_odd_input() {
        let f = extract("");
        assert_eq!(f.normalized, "");
        assert!(f.brand.is_none());
        assert!(f.keywords.is_empty());

        let f = extract("!!! ### 1");
        assert!(f.brand.is_none());
        assert_eq!(f.stats.word_count, 0);
    }
}
