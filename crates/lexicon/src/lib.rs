//! Static lexicon tables for grocery product matching.
//!
//! Read-only after initialization; used during both feature extraction and
//! scoring:
//! - Brand synonym groups ("coke" ↔ "coca-cola")
//! - Category synonym groups ("milk" → dairy) and category relations
//! - Unit aliases and conversions to ounces
//! - A static misspelling dictionary for query correction
//!
//! All lookups are O(1) against `LazyLock`-built HashMaps.

use std::collections::HashMap;
use std::sync::LazyLock;

/// Brand synonym groups. The first entry of each group is the canonical form.
static BRAND_GROUPS: &[&[&str]] = &[
    &["great value", "gv", "walmart brand"],
    &["coca-cola", "coca cola", "coke"],
    &["pepsi", "pepsi-cola", "pepsi cola"],
    &["kraft", "kraft foods", "kraft heinz"],
    &["heinz"],
    &["kellogg's", "kelloggs", "kellogg"],
    &["general mills"],
    &["tropicana", "trop"],
    &["nabisco"],
    &["tyson", "tyson foods"],
    &["oscar mayer", "oscar meyer"],
    &["quaker", "quaker oats"],
    &["lay's", "lays", "frito-lay", "frito lay"],
    &["nestle", "nestlé"],
    &["dannon", "danone"],
    &["sargento"],
    &["philadelphia", "philly cream cheese"],
    &["ben & jerry's", "ben and jerry's", "ben & jerrys"],
];

/// Category synonym groups. The first entry is the canonical category; the
/// rest are product words that imply it.
static CATEGORY_GROUPS: &[&[&str]] = &[
    &[
        "dairy", "milk", "cheese", "yogurt", "yoghurt", "butter", "cream", "creamer", "eggs",
    ],
    &[
        "beverages", "juice", "soda", "pop", "water", "coffee", "tea", "drink", "lemonade",
    ],
    &[
        "produce", "apple", "banana", "lettuce", "tomato", "onion", "potato", "carrot", "grape",
        "avocado", "spinach",
    ],
    &[
        "bakery", "bread", "bagel", "muffin", "roll", "bun", "tortilla", "croissant",
    ],
    &[
        "meat", "chicken", "beef", "pork", "turkey", "ham", "bacon", "sausage", "steak",
    ],
    &[
        "snacks", "chips", "crackers", "cookies", "pretzels", "popcorn", "candy", "chocolate",
        "granola",
    ],
    &["frozen", "pizza", "waffles", "ice cream", "popsicle"],
    &[
        "pantry", "rice", "pasta", "flour", "sugar", "cereal", "oats", "beans", "soup", "sauce",
        "oil", "vinegar", "ketchup", "mustard", "mayonnaise", "peanut butter", "jelly",
    ],
    &[
        "household", "detergent", "soap", "shampoo", "towels", "tissue", "bleach", "wipes",
    ],
];

/// Related category pairs scored below synonym matches (adjacent aisles
/// whose products substitute for each other).
static CATEGORY_RELATIONS: &[(&str, &str)] = &[
    ("dairy", "beverages"),
    ("bakery", "snacks"),
    ("meat", "frozen"),
    ("pantry", "snacks"),
    ("produce", "frozen"),
];

/// Unit aliases mapped to canonical units.
static UNIT_ALIASES: &[(&str, &str)] = &[
    ("oz", "oz"),
    ("ounce", "oz"),
    ("ounces", "oz"),
    ("lb", "lb"),
    ("lbs", "lb"),
    ("pound", "lb"),
    ("pounds", "lb"),
    ("gal", "gal"),
    ("gallon", "gal"),
    ("gallons", "gal"),
    ("ml", "ml"),
    ("milliliter", "ml"),
    ("milliliters", "ml"),
    ("l", "l"),
    ("liter", "l"),
    ("liters", "l"),
    ("litre", "l"),
    ("litres", "l"),
    ("kg", "kg"),
    ("kilogram", "kg"),
    ("kilograms", "kg"),
    ("g", "g"),
    ("gram", "g"),
    ("grams", "g"),
    ("ct", "ct"),
    ("count", "ct"),
    ("pk", "pk"),
    ("pack", "pk"),
];

/// Conversion factors from canonical units to ounces. Count-style units have
/// no factor and are only comparable against themselves.
static UNIT_TO_OUNCES: &[(&str, Option<f32>)] = &[
    ("oz", Some(1.0)),
    ("lb", Some(16.0)),
    ("gal", Some(128.0)),
    ("l", Some(33.814)),
    ("ml", Some(0.033_814)),
    ("kg", Some(35.274)),
    ("g", Some(0.035_274)),
    ("ct", None),
    ("pk", None),
];

/// Common grocery-term misspellings corrected during normalization.
static MISSPELLINGS: &[(&str, &str)] = &[
    ("choclate", "chocolate"),
    ("chocolat", "chocolate"),
    ("bannana", "banana"),
    ("bananna", "banana"),
    ("tomatoe", "tomato"),
    ("potatoe", "potato"),
    ("brocolli", "broccoli"),
    ("broccolli", "broccoli"),
    ("cerial", "cereal"),
    ("yoghurt", "yogurt"),
    ("mayonaise", "mayonnaise"),
    ("spagetti", "spaghetti"),
    ("letuce", "lettuce"),
    ("avacado", "avocado"),
    ("chedder", "cheddar"),
    ("sausege", "sausage"),
];

/// term → canonical brand, covering canonicals and every alias.
static BRAND_LOOKUP: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    let mut map = HashMap::new();
    for group in BRAND_GROUPS {
        let canonical = group[0];
        for term in *group {
            map.insert(*term, canonical);
        }
    }
    map
});

/// Brand terms sorted longest first, for longest-match extraction.
static BRAND_TERMS_BY_LEN: LazyLock<Vec<(&'static str, &'static str)>> = LazyLock::new(|| {
    let mut terms: Vec<(&str, &str)> = BRAND_GROUPS
        .iter()
        .flat_map(|group| group.iter().map(|term| (*term, group[0])))
        .collect();
    terms.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then(a.0.cmp(b.0)));
    terms
});

static CATEGORY_LOOKUP: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    let mut map = HashMap::new();
    for group in CATEGORY_GROUPS {
        let canonical = group[0];
        for term in *group {
            map.insert(*term, canonical);
        }
    }
    map
});

static CATEGORY_TERMS_BY_LEN: LazyLock<Vec<(&'static str, &'static str)>> = LazyLock::new(|| {
    let mut terms: Vec<(&str, &str)> = CATEGORY_GROUPS
        .iter()
        .flat_map(|group| group.iter().map(|term| (*term, group[0])))
        .collect();
    terms.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then(a.0.cmp(b.0)));
    terms
});

static UNIT_LOOKUP: LazyLock<HashMap<&'static str, &'static str>> =
    LazyLock::new(|| UNIT_ALIASES.iter().copied().collect());

static OUNCE_FACTORS: LazyLock<HashMap<&'static str, Option<f32>>> =
    LazyLock::new(|| UNIT_TO_OUNCES.iter().copied().collect());

static MISSPELLING_LOOKUP: LazyLock<HashMap<&'static str, &'static str>> =
    LazyLock::new(|| MISSPELLINGS.iter().copied().collect());

/// Resolve a term to its canonical brand, if it names one.
pub fn canonical_brand(term: &str) -> Option<&'static str> {
    BRAND_LOOKUP.get(term).copied()
}

/// All brand terms paired with their canonical form, longest term first.
pub fn brand_terms() -> &'static [(&'static str, &'static str)] {
    &BRAND_TERMS_BY_LEN
}

/// Whether two brand names belong to the same synonym group.
pub fn brands_synonymous(a: &str, b: &str) -> bool {
    match (canonical_brand(a), canonical_brand(b)) {
        (Some(ca), Some(cb)) => ca == cb,
        _ => false,
    }
}

/// Resolve a term to its canonical category, if it implies one.
pub fn canonical_category(term: &str) -> Option<&'static str> {
    CATEGORY_LOOKUP.get(term).copied()
}

/// All category terms paired with their canonical form, longest term first.
pub fn category_terms() -> &'static [(&'static str, &'static str)] {
    &CATEGORY_TERMS_BY_LEN
}

/// Whether two category names belong to the same synonym group.
pub fn categories_synonymous(a: &str, b: &str) -> bool {
    match (canonical_category(a), canonical_category(b)) {
        (Some(ca), Some(cb)) => ca == cb,
        _ => false,
    }
}

/// Whether two canonical categories are linked in the relation table.
pub fn categories_related(a: &str, b: &str) -> bool {
    CATEGORY_RELATIONS
        .iter()
        .any(|(x, y)| (*x == a && *y == b) || (*x == b && *y == a))
}

/// Canonicalize a unit alias ("ounces" → "oz").
pub fn canonical_unit(alias: &str) -> Option<&'static str> {
    UNIT_LOOKUP.get(alias).copied()
}

/// Conversion factor from a canonical unit to ounces. `None` for count-style
/// units, which are only comparable against the same unit.
pub fn ounce_factor(unit: &str) -> Option<f32> {
    OUNCE_FACTORS.get(unit).copied().flatten()
}

/// Correct a single word against the misspelling dictionary.
pub fn correct_spelling(word: &str) -> Option<&'static str> {
    MISSPELLING_LOOKUP.get(word).copied()
}

/// Regex alternation of every unit alias, longest alias first so that e.g.
/// "gal" wins over "g" and "lb" over "l".
pub fn unit_alternation() -> String {
    let mut aliases: Vec<&str> = UNIT_ALIASES.iter().map(|(alias, _)| *alias).collect();
    aliases.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
    aliases.join("|")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_brand_synonyms() {
        assert_eq!(canonical_brand("coke"), Some("coca-cola"));
        assert_eq!(canonical_brand("gv"), Some("great value"));
        assert_eq!(canonical_brand("great value"), Some("great value"));
        assert_eq!(canonical_brand("acme"), None);
        assert!(brands_synonymous("coke", "coca cola"));
        assert!(!brands_synonymous("coke", "pepsi"));
    }

    #[test]
    fn test_brand_terms_longest_first() {
        let terms = brand_terms();
        for pair in terms.windows(2) {
            assert!(pair[0].0.len() >= pair[1].0.len());
        }
    }

    #[test]
    fn test_category_synonyms() {
        assert_eq!(canonical_category("milk"), Some("dairy"));
        assert_eq!(canonical_category("juice"), Some("beverages"));
        assert_eq!(canonical_category("dairy"), Some("dairy"));
        assert_eq!(canonical_category("sprocket"), None);
    }

    #[test]
    fn test_category_relations() {
        assert!(categories_related("dairy", "beverages"));
        assert!(categories_related("beverages", "dairy"));
        assert!(!categories_related("dairy", "household"));
    }

    #[test]
    fn test_unit_canonicalization() {
        assert_eq!(canonical_unit("ounces"), Some("oz"));
        assert_eq!(canonical_unit("pounds"), Some("lb"));
        assert_eq!(canonical_unit("gal"), Some("gal"));
        assert_eq!(canonical_unit("furlong"), None);
    }

    #[test]
    fn test_ounce_factors() {
        assert_eq!(ounce_factor("lb"), Some(16.0));
        assert_eq!(ounce_factor("gal"), Some(128.0));
        assert_eq!(ounce_factor("ct"), None);
        assert_eq!(ounce_factor("parsec"), None);
    }

    #[test]
    fn test_spelling_correction() {
        assert_eq!(correct_spelling("choclate"), Some("chocolate"));
        assert_eq!(correct_spelling("chocolate"), None);
    }

    #[test]
    fn test_unit_alternation_prefers_longer_aliases() {
        let alt = unit_alternation();
        let gal = alt.find("gal").unwrap();
        let g = alt.find("|g|").unwrap();
        assert!(gal < g);
    }
}
