//! Core domain model for GrocerMatch product similarity matching.
//!
//! This crate defines the fundamental types used throughout the system:
//! - `ProductFeatures`: The structured feature bundle extracted from a product string
//! - `SimilarityMetrics`: Per-signal sub-scores plus the combined overall score
//! - `WeightModel`: The adaptive weighting vector applied by the scorer
//! - `FeedbackEvent`: A user feedback signal consumed by online training
//! - `BatchReport`: Aggregate output of a batch matching run

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::{Duration, SystemTime};

/// Numeric statistics computed from a product string and its token list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TextStats {
    /// Raw string length in characters
    pub length: usize,

    /// Number of tokens after tokenization
    pub word_count: usize,

    /// Mean token length
    pub avg_word_length: f32,

    /// Number of distinct tokens
    pub unique_word_count: usize,

    /// Number of contiguous digit runs in the raw string
    pub digit_group_count: usize,
}

/// The structured feature bundle for one product or query string.
///
/// Immutable once computed; keyed by `normalized`, the lower-cased, trimmed,
/// spell-corrected form of the source string. Serialized as-is into the
/// shared feature cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductFeatures {
    /// Normalized source string (also the cache key for this bundle)
    pub normalized: String,

    /// Canonical brand, if one was recognized
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,

    /// Canonical category, if one was recognized
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    /// Package size, if present (e.g. 12 for "12 oz")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<f32>,

    /// Canonical unit for `size`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,

    /// Deduplicated, stemmed keyword set
    #[serde(default)]
    pub keywords: BTreeSet<String>,

    /// Phonetic fingerprint for fuzzy brand matching
    #[serde(default)]
    pub phonetic: String,

    /// Numeric stats over the string and token list
    #[serde(default)]
    pub stats: TextStats,
}

impl ProductFeatures {
    /// Create an empty bundle for a normalized string. Used as the base the
    /// extractor fills in; every signal starts absent.
    pub fn empty(normalized: impl Into<String>) -> Self {
        Self {
            normalized: normalized.into(),
            brand: None,
            category: None,
            size: None,
            unit: None,
            keywords: BTreeSet::new(),
            phonetic: String::new(),
            stats: TextStats::default(),
        }
    }

}

/// Per-signal sub-scores in [0, 1] plus the derived overall score.
///
/// Pure value type with no identity; created per scoring call and cached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SimilarityMetrics {
    pub lexical: f32,
    pub semantic: f32,
    pub brand: f32,
    pub category: f32,
    pub size: f32,

    /// Sigmoid-combined score in (0, 1)
    pub overall: f32,
}

/// Minimum value any weight is clamped to before renormalization.
pub const WEIGHT_FLOOR: f32 = 1e-4;

/// Named weights for the five similarity signals.
///
/// Invariant: weights are non-negative and sum to 1 after every update.
/// Mutated only by the training procedure, which publishes a complete new
/// model; every scoring call reads a consistent snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightModel {
    pub lexical: f32,
    pub semantic: f32,
    pub brand: f32,
    pub category: f32,
    pub size: f32,

    /// Additive bias inside the sigmoid combiner
    pub bias: f32,

    /// Fixed step size for online updates
    pub learning_rate: f32,
}

impl Default for WeightModel {
    fn default() -> Self {
        Self {
            lexical: 0.30,
            semantic: 0.25,
            brand: 0.15,
            category: 0.15,
            size: 0.15,
            bias: 0.0,
            learning_rate: 0.01,
        }
    }
}

impl WeightModel {
    /// Sum of the five signal weights.
    pub fn weight_sum(&self) -> f32 {
        self.lexical + self.semantic + self.brand + self.category + self.size
    }

    /// Clamp each weight to a small positive floor, then rescale so the
    /// weights sum to 1. The floor guards the degenerate case where updates
    /// have driven every weight to zero.
    pub fn normalize(&mut self) {
        self.lexical = self.lexical.max(WEIGHT_FLOOR);
        self.semantic = self.semantic.max(WEIGHT_FLOOR);
        self.brand = self.brand.max(WEIGHT_FLOOR);
        self.category = self.category.max(WEIGHT_FLOOR);
        self.size = self.size.max(WEIGHT_FLOOR);

        let sum = self.weight_sum();
        self.lexical /= sum;
        self.semantic /= sum;
        self.brand /= sum;
        self.category /= sum;
        self.size /= sum;
    }

    /// Weighted sum of the five sub-scores plus bias (the sigmoid input).
    pub fn combine(&self, m: &SimilarityMetrics) -> f32 {
        self.lexical * m.lexical
            + self.semantic * m.semantic
            + self.brand * m.brand
            + self.category * m.category
            + self.size * m.size
            + self.bias
    }
}

/// Outcome label attached to a feedback event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackLabel {
    /// The user accepted the match (clicked, added to cart, accepted a deal)
    Positive,
    /// The user dismissed the match
    Negative,
    /// Shown but not acted on
    Neutral,
}

impl FeedbackLabel {
    /// The target score the model should have produced for this outcome.
    pub fn expected(&self) -> f32 {
        match self {
            Self::Positive => 1.0,
            Self::Negative => 0.0,
            Self::Neutral => 0.5,
        }
    }
}

/// One user feedback signal about a scored (query, product) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackEvent {
    pub query: String,
    pub product_name: String,

    /// The overall score the engine reported for the pair
    pub score: f32,

    pub label: FeedbackLabel,
    pub timestamp: SystemTime,
}

impl FeedbackEvent {
    pub fn new(
        query: impl Into<String>,
        product_name: impl Into<String>,
        score: f32,
        label: FeedbackLabel,
    ) -> Self {
        Self {
            query: query.into(),
            product_name: product_name.into(),
            score,
            label,
            timestamp: SystemTime::now(),
        }
    }
}

/// Score for a single (query, product) pair inside a batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairScore {
    pub query: String,
    pub product: String,
    pub score: f32,
}

/// Aggregate result of a batch matching run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    /// One entry per (query, product) pair, in no particular order
    pub scores: Vec<PairScore>,

    pub total_pairs: usize,

    /// Pairs served from either cache tier
    pub cache_hits: usize,

    /// `cache_hits / total_pairs`, 0 when the batch was empty
    pub cache_hit_rate: f32,

    pub elapsed: Duration,
}

impl BatchReport {
    /// Look up the score for a specific pair.
    pub fn get(&self, query: &str, product: &str) -> Option<f32> {
        self.scores
            .iter()
            .find(|p| p.query == query && p.product == product)
            .map(|p| p.score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weights_sum_to_one() {
        let w = WeightModel::default();
        assert!((w.weight_sum() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_restores_sum() {
        let mut w = WeightModel {
            lexical: 0.9,
            semantic: 0.4,
            brand: 0.2,
            category: 0.1,
            size: 0.3,
            ..Default::default()
        };
        w.normalize();
        assert!((w.weight_sum() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_handles_all_zero_weights() {
        let mut w = WeightModel {
            lexical: 0.0,
            semantic: 0.0,
            brand: 0.0,
            category: 0.0,
            size: 0.0,
            ..Default::default()
        };
        w.normalize();
        assert!((w.weight_sum() - 1.0).abs() < 1e-6);
        assert!(w.lexical > 0.0);
    }

    #[test]
    fn test_feedback_expected_values() {
        assert_eq!(FeedbackLabel::Positive.expected(), 1.0);
        assert_eq!(FeedbackLabel::Negative.expected(), 0.0);
        assert_eq!(FeedbackLabel::Neutral.expected(), 0.5);
    }

    #[test]
    fn test_features_serialization() {
        let mut f = ProductFeatures::empty("great value whole milk");
        f.brand = Some("great value".to_string());
        f.keywords.insert("milk".to_string());

        let json = serde_json::to_string(&f).unwrap();
        let parsed: ProductFeatures = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, f);
    }

    #[test]
    fn test_batch_report_lookup() {
        let report = BatchReport {
            scores: vec![PairScore {
                query: "milk".into(),
                product: "whole milk".into(),
                score: 0.7,
            }],
            total_pairs: 1,
            ..Default::default()
        };
        assert_eq!(report.get("milk", "whole milk"), Some(0.7));
        assert_eq!(report.get("milk", "bread"), None);
    }
}
