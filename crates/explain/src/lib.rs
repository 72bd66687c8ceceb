//! Explanation generation for product matches.
//!
//! Converts scored metrics into human-readable explanations suitable for
//! display in the shopping assistant's suggestion and deal surfaces.

use grocermatch_model::{ProductFeatures, SimilarityMetrics};
use serde::{Deserialize, Serialize};

/// A signal contributing to a match, derived from the scored metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "detail")]
pub enum MatchSignal {
    /// Normalized names are identical
    ExactName,

    /// Keywords present on both sides
    SharedKeywords {
        terms: Vec<String>,
    },

    /// Same canonical brand
    BrandExact {
        brand: String,
    },

    /// Brands linked through the synonym table
    BrandSynonym,

    /// Brands spelled nearly alike
    BrandFuzzy {
        similarity: f32,
    },

    /// Phonetic fingerprints collide but the names differ
    SoundsAlike {
        code: String,
    },

    /// Same canonical category
    CategoryMatch {
        category: String,
    },

    /// Categories linked via synonyms or the relation table
    CategoryLinked {
        similarity: f32,
    },

    /// Package sizes close after unit conversion
    SizeClose {
        similarity: f32,
    },
}

impl MatchSignal {
    /// Get a human-readable label for this signal.
    pub fn label(&self) -> &'static str {
        match self {
            Self::ExactName => "Exact Name",
            Self::SharedKeywords { .. } => "Shared Keywords",
            Self::BrandExact { .. } => "Same Brand",
            Self::BrandSynonym => "Equivalent Brand",
            Self::BrandFuzzy { .. } => "Similar Brand",
            Self::SoundsAlike { .. } => "Sounds Alike",
            Self::CategoryMatch { .. } => "Same Category",
            Self::CategoryLinked { .. } => "Related Category",
            Self::SizeClose { .. } => "Similar Size",
        }
    }

    /// Get signal strength (higher = stronger evidence of a match).
    pub fn strength(&self) -> f32 {
        match self {
            Self::ExactName => 1.0,
            Self::BrandExact { .. } => 0.9,
            Self::BrandSynonym => 0.8,
            Self::SharedKeywords { terms } => (0.4 + 0.1 * terms.len() as f32).min(0.8),
            Self::BrandFuzzy { similarity } => similarity * 0.8,
            Self::SoundsAlike { .. } => 0.6,
            Self::CategoryMatch { .. } => 0.5,
            Self::SizeClose { similarity } => similarity * 0.5,
            Self::CategoryLinked { similarity } => similarity * 0.5,
        }
    }
}

/// Derive the signals present in a scored pair.
pub fn derive_signals(
    metrics: &SimilarityMetrics,
    a: &ProductFeatures,
    b: &ProductFeatures,
) -> Vec<MatchSignal> {
    let mut signals = Vec::new();

    if !a.normalized.is_empty() && a.normalized == b.normalized {
        signals.push(MatchSignal::ExactName);
    }

    let shared: Vec<String> = a.keywords.intersection(&b.keywords).cloned().collect();
    if !shared.is_empty() {
        signals.push(MatchSignal::SharedKeywords { terms: shared });
    }

    if metrics.brand >= 1.0 {
        if let Some(brand) = &a.brand {
            signals.push(MatchSignal::BrandExact {
                brand: brand.clone(),
            });
        }
    } else if metrics.brand >= 0.9 {
        signals.push(MatchSignal::BrandSynonym);
    } else if metrics.brand > 0.0 {
        signals.push(MatchSignal::BrandFuzzy {
            similarity: metrics.brand,
        });
    }

    if !a.phonetic.is_empty() && a.phonetic == b.phonetic && a.normalized != b.normalized {
        signals.push(MatchSignal::SoundsAlike {
            code: a.phonetic.clone(),
        });
    }

    if metrics.category >= 1.0 {
        if let Some(category) = &a.category {
            signals.push(MatchSignal::CategoryMatch {
                category: category.clone(),
            });
        }
    } else if metrics.category > 0.0 {
        signals.push(MatchSignal::CategoryLinked {
            similarity: metrics.category,
        });
    }

    if metrics.size > 0.5 {
        signals.push(MatchSignal::SizeClose {
            similarity: metrics.size,
        });
    }

    signals
}

/// A structured explanation of one match signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Explanation {
    /// Short summary (1 line)
    pub summary: String,

    /// Detailed explanation
    pub detail: String,

    /// Signal strength (0.0 - 1.0)
    pub strength: f32,
}

/// Generate explanations for every signal in a scored pair.
pub fn explain_match(
    metrics: &SimilarityMetrics,
    a: &ProductFeatures,
    b: &ProductFeatures,
) -> Vec<Explanation> {
    derive_signals(metrics, a, b)
        .iter()
        .map(|signal| explain_signal(signal, &a.normalized, &b.normalized))
        .collect()
}

/// Generate the explanation for a single signal.
pub fn explain_signal(signal: &MatchSignal, query_text: &str, product_text: &str) -> Explanation {
    let strength = signal.strength();
    match signal {
        MatchSignal::ExactName => Explanation {
            summary: "Exact name match".to_string(),
            detail: format!("'{product_text}' is exactly what was asked for."),
            strength,
        },

        MatchSignal::SharedKeywords { terms } => Explanation {
            summary: format!("Shares {} keyword(s)", terms.len()),
            detail: format!(
                "'{product_text}' shares the terms [{}] with '{query_text}'.",
                terms.join(", ")
            ),
            strength,
        },

        MatchSignal::BrandExact { brand } => Explanation {
            summary: format!("Same brand '{brand}'"),
            detail: format!("Both items are from '{brand}'."),
            strength,
        },

        MatchSignal::BrandSynonym => Explanation {
            summary: "Equivalent brand".to_string(),
            detail: "The two brand names refer to the same brand.".to_string(),
            strength,
        },

        MatchSignal::BrandFuzzy { similarity } => Explanation {
            summary: "Similar brand spelling".to_string(),
            detail: format!(
                "The brand names are spelled {:.0}% alike and likely refer to the same brand.",
                similarity * 100.0
            ),
            strength,
        },

        MatchSignal::SoundsAlike { code } => Explanation {
            summary: "Sounds alike".to_string(),
            detail: format!(
                "'{product_text}' sounds like '{query_text}' (both reduce to '{code}')."
            ),
            strength,
        },

        MatchSignal::CategoryMatch { category } => Explanation {
            summary: format!("Same category ({category})"),
            detail: format!("Both items belong to the {category} aisle."),
            strength,
        },

        MatchSignal::CategoryLinked { .. } => Explanation {
            summary: "Related category".to_string(),
            detail: "The items come from related aisles and often substitute for each other."
                .to_string(),
            strength,
        },

        MatchSignal::SizeClose { similarity } => Explanation {
            summary: "Similar package size".to_string(),
            detail: format!(
                "The package sizes are {:.0}% alike after unit conversion.",
                similarity * 100.0
            ),
            strength,
        },
    }
}

/// One-line verdict for a scored pair.
pub fn summarize_match(
    metrics: &SimilarityMetrics,
    a: &ProductFeatures,
    b: &ProductFeatures,
) -> String {
    let signals = derive_signals(metrics, a, b);
    if signals.is_empty() {
        return "Weak match - no significant shared signals.".to_string();
    }

    let strongest = signals
        .iter()
        .map(|s| s.strength())
        .fold(0.0_f32, f32::max);

    let level = if strongest >= 0.8 {
        "STRONG MATCH"
    } else if strongest >= 0.5 {
        "MODERATE MATCH"
    } else {
        "WEAK MATCH"
    };

    let labels: Vec<_> = signals.iter().map(|s| s.label()).collect();
    format!("{}: {}", level, labels.join(", "))
}
