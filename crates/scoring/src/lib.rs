//! Similarity scoring for product matching.
//!
//! Computes five independent sub-scores between two feature bundles and
//! combines them through a weighted sigmoid:
//! - Lexical: bigram Jaccard + normalized Levenshtein over the raw
//!   normalized strings
//! - Semantic: keyword-set Jaccard blended with category and size signals
//! - Brand / category: tiered exact → synonym → fuzzy/related matching
//! - Size: unit-converted proximity
//!
//! For fixed weights, scoring is a pure function of the two inputs; the
//! expensive string sub-computations are memoized through [`MemoPool`].

use grocermatch_cache::MemoPool;
use grocermatch_features as features;
use grocermatch_lexicon as lexicon;
use grocermatch_model::{ProductFeatures, SimilarityMetrics, WeightModel};
use std::sync::Arc;

/// Blend factors inside the lexical signal.
const LEXICAL_BIGRAM_WEIGHT: f32 = 0.6;
const LEXICAL_LEVENSHTEIN_WEIGHT: f32 = 0.4;

/// Blend factors inside the semantic signal. Category and size are also
/// scored independently; the combiner's weights are tuned for that
/// correlation (see DESIGN.md).
const SEMANTIC_KEYWORD_WEIGHT: f32 = 0.5;
const SEMANTIC_CATEGORY_WEIGHT: f32 = 0.3;
const SEMANTIC_SIZE_WEIGHT: f32 = 0.2;

/// Levenshtein similarity a fuzzy brand match must exceed.
const BRAND_FUZZY_THRESHOLD: f32 = 0.8;

/// Logistic function mapping the unbounded weighted sum into (0, 1).
pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Similarity scorer sharing a memo pool across calls.
pub struct Scorer {
    memo: Arc<MemoPool>,
}

impl Scorer {
    pub fn new(memo: Arc<MemoPool>) -> Self {
        Self { memo }
    }

    /// Score two feature bundles under the given weights.
    pub fn score(
        &self,
        a: &ProductFeatures,
        b: &ProductFeatures,
        weights: &WeightModel,
    ) -> SimilarityMetrics {
        let mut metrics = SimilarityMetrics {
            lexical: self.lexical_similarity(&a.normalized, &b.normalized),
            semantic: 0.0,
            brand: self.brand_similarity(a.brand.as_deref(), b.brand.as_deref()),
            category: category_similarity(a.category.as_deref(), b.category.as_deref()),
            size: size_similarity(a, b),
            overall: 0.0,
        };
        metrics.semantic = self.semantic_similarity(a, b, metrics.category, metrics.size);
        metrics.overall = sigmoid(weights.combine(&metrics));
        metrics
    }

    /// Character-level closeness of the two raw normalized strings.
    pub fn lexical_similarity(&self, a: &str, b: &str) -> f32 {
        let grams_a = self.memo.bigrams(a, || features::bigrams(a));
        let grams_b = self.memo.bigrams(b, || features::bigrams(b));
        let bigram = features::jaccard(&grams_a, &grams_b);

        LEXICAL_BIGRAM_WEIGHT * bigram
            + LEXICAL_LEVENSHTEIN_WEIGHT * self.levenshtein_similarity(a, b)
    }

    /// Normalized Levenshtein similarity with an early exit: strings whose
    /// lengths differ by more than half the longer length short-circuit to
    /// 0 without paying the O(n·m) computation.
    pub fn levenshtein_similarity(&self, a: &str, b: &str) -> f32 {
        let len_a = a.chars().count();
        let len_b = b.chars().count();
        let max_len = len_a.max(len_b);
        if max_len == 0 {
            return 1.0;
        }
        if len_a.abs_diff(len_b) as f32 > 0.5 * max_len as f32 {
            return 0.0;
        }

        let distance = self.memo.distance(a, b, || features::edit_distance(a, b));
        1.0 - distance as f32 / max_len as f32
    }

    /// Keyword overlap blended with the category and size signals.
    fn semantic_similarity(
        &self,
        a: &ProductFeatures,
        b: &ProductFeatures,
        category: f32,
        size: f32,
    ) -> f32 {
        let keywords = features::jaccard(&a.keywords, &b.keywords);
        SEMANTIC_KEYWORD_WEIGHT * keywords
            + SEMANTIC_CATEGORY_WEIGHT * category
            + SEMANTIC_SIZE_WEIGHT * size
    }

    /// Tiered brand match: exact 1.0, synonym 0.9, fuzzy
    /// `lev_sim × 0.8` above the threshold, else 0. Absent on either side
    /// is a missing signal, scored 0.
    pub fn brand_similarity(&self, a: Option<&str>, b: Option<&str>) -> f32 {
        let (Some(a), Some(b)) = (a, b) else {
            return 0.0;
        };
        if a.eq_ignore_ascii_case(b) {
            return 1.0;
        }
        if lexicon::brands_synonymous(a, b) {
            return 0.9;
        }
        let fuzzy = self.levenshtein_similarity(a, b);
        if fuzzy > BRAND_FUZZY_THRESHOLD {
            fuzzy * 0.8
        } else {
            0.0
        }
    }
}

/// Tiered category match: exact 1.0, synonym-linked 0.8, related via the
/// parent/child table 0.6, else 0.
pub fn category_similarity(a: Option<&str>, b: Option<&str>) -> f32 {
    let (Some(a), Some(b)) = (a, b) else {
        return 0.0;
    };
    if a.eq_ignore_ascii_case(b) {
        return 1.0;
    }
    if lexicon::categories_synonymous(a, b) {
        return 0.8;
    }
    if lexicon::categories_related(a, b) {
        return 0.6;
    }
    0.0
}

/// Size proximity after converting both sides to ounces. Count-style units
/// with no ounce factor are comparable only against the same unit. Missing
/// size or unit on either side scores 0.
pub fn size_similarity(a: &ProductFeatures, b: &ProductFeatures) -> f32 {
    let (Some(size_a), Some(unit_a), Some(size_b), Some(unit_b)) =
        (a.size, a.unit.as_deref(), b.size, b.unit.as_deref())
    else {
        return 0.0;
    };

    let (s1, s2) = match (lexicon::ounce_factor(unit_a), lexicon::ounce_factor(unit_b)) {
        (Some(fa), Some(fb)) => (size_a * fa, size_b * fb),
        _ if unit_a == unit_b => (size_a, size_b),
        _ => return 0.0,
    };

    let avg = (s1 + s2) / 2.0;
    if avg == 0.0 {
        // both zero
        return 1.0;
    }
    (1.0 - (s1 - s2).abs() / avg).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use grocermatch_features::extract;
    use pretty_assertions::assert_eq;

    fn scorer() -> Scorer {
        Scorer::new(Arc::new(MemoPool::default()))
    }

    #[test]
    fn test_identical_input_scores_near_perfect() {
        let s = scorer();
        let f = extract("Great Value Whole Milk 1 Gal");
        let metrics = s.score(&f, &f, &WeightModel::default());

        assert!(metrics.lexical > 0.999);
        assert!(metrics.semantic > 0.999);
        assert_eq!(metrics.brand, 1.0);
        assert_eq!(metrics.category, 1.0);
        assert_eq!(metrics.size, 1.0);
        assert!(metrics.overall > 0.5);
    }

    #[test]
    fn test_query_against_branded_product() {
        let s = scorer();
        let query = extract("milk");
        let product = extract("Great Value Whole Milk");
        let metrics = s.score(&query, &product, &WeightModel::default());

        // shared keyword "milk" carries the semantic signal past the bar
        // and leaves a material bigram overlap in the lexical signal
        assert!(metrics.semantic > 0.3);
        assert!(metrics.lexical > 0.05);
        // query has no brand: missing signal, not an error
        assert_eq!(metrics.brand, 0.0);
    }

    #[test]
    fn test_spell_correction_lifts_lexical_score() {
        let s = scorer();
        let corrected = s.lexical_similarity(
            &features::normalize("choclate"),
            &features::normalize("chocolate bar"),
        );
        let uncorrected = s.lexical_similarity("choclate", "chocolate bar");

        assert!(corrected > uncorrected);
    }

    #[test]
    fn test_brand_tiers_are_ordered() {
        let s = scorer();
        let exact = s.brand_similarity(Some("coca-cola"), Some("coca-cola"));
        let synonym = s.brand_similarity(Some("coke"), Some("coca cola"));
        let fuzzy = s.brand_similarity(Some("kelloggs"), Some("kellogs"));
        let none = s.brand_similarity(Some("pepsi"), Some("heinz"));

        assert_eq!(exact, 1.0);
        assert_eq!(synonym, 0.9);
        assert!(fuzzy > 0.0 && fuzzy < 0.9);
        assert_eq!(none, 0.0);
        assert!(exact >= synonym && synonym >= fuzzy && fuzzy >= none);
    }

    #[test]
    fn test_brand_missing_is_zero() {
        let s = scorer();
        assert_eq!(s.brand_similarity(None, Some("heinz")), 0.0);
        assert_eq!(s.brand_similarity(None, None), 0.0);
    }

    #[test]
    fn test_category_tiers() {
        assert_eq!(category_similarity(Some("dairy"), Some("dairy")), 1.0);
        assert_eq!(category_similarity(Some("milk"), Some("cheese")), 0.8);
        assert_eq!(category_similarity(Some("dairy"), Some("beverages")), 0.6);
        assert_eq!(category_similarity(Some("dairy"), Some("household")), 0.0);
        assert_eq!(category_similarity(None, Some("dairy")), 0.0);
    }

    #[test]
    fn test_size_similarity_converts_units() {
        let mut a = ProductFeatures::empty("a");
        a.size = Some(1.0);
        a.unit = Some("lb".to_string());
        let mut b = ProductFeatures::empty("b");
        b.size = Some(16.0);
        b.unit = Some("oz".to_string());

        assert!((size_similarity(&a, &b) - 1.0).abs() < 1e-6);

        b.size = Some(8.0);
        // 16oz vs 8oz: |16-8|/12 = 0.667 away
        assert!((size_similarity(&a, &b) - (1.0 - 8.0 / 12.0)).abs() < 1e-4);
    }

    #[test]
    fn test_size_count_units_compare_only_with_themselves() {
        let mut a = ProductFeatures::empty("a");
        a.size = Some(12.0);
        a.unit = Some("ct".to_string());
        let mut b = ProductFeatures::empty("b");
        b.size = Some(12.0);
        b.unit = Some("ct".to_string());
        assert!((size_similarity(&a, &b) - 1.0).abs() < 1e-6);

        b.unit = Some("oz".to_string());
        assert_eq!(size_similarity(&a, &b), 0.0);
    }

    #[test]
    fn test_size_missing_is_zero() {
        let a = ProductFeatures::empty("a");
        let mut b = ProductFeatures::empty("b");
        b.size = Some(12.0);
        b.unit = Some("oz".to_string());
        assert_eq!(size_similarity(&a, &b), 0.0);
    }

    #[test]
    fn test_levenshtein_early_exit_agrees_on_dissimilarity() {
        let s = scorer();
        // length mismatch big enough to short-circuit
        let shortcut = s.levenshtein_similarity("oj", "organic orange juice 64 oz");
        assert_eq!(shortcut, 0.0);

        // the full computation also reports near-zero similarity
        let d = features::edit_distance("oj", "organic orange juice 64 oz");
        let full = 1.0 - d as f32 / 26.0;
        assert!(full < 0.2);
    }

    #[test]
    fn test_levenshtein_similarity_empty_strings() {
        let s = scorer();
        assert_eq!(s.levenshtein_similarity("", ""), 1.0);
        assert_eq!(s.levenshtein_similarity("", "milk"), 0.0);
    }

    #[test]
    fn test_sigmoid_bounds() {
        assert!(sigmoid(0.0) == 0.5);
        assert!(sigmoid(50.0) > 0.999);
        assert!(sigmoid(-50.0) < 0.001);
    }

    #[test]
    fn test_scoring_is_deterministic() {
        let s = scorer();
        let a = extract("tropicana orange juice 64 oz");
        let b = extract("great value orange juice 1 gal");
        let w = WeightModel::default();

        let first = s.score(&a, &b, &w);
        let second = s.score(&a, &b, &w);
        assert_eq!(first, second);
    }
}
