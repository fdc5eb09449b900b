//! Typed views over the travel resources.
//!
//! The cache stores raw JSON; these types are for callers that want typed
//! access. Only the fields the client reasons about are modelled, everything
//! else is kept in `extra` so nothing is lost on a round trip.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A monetary amount as served: either a JSON number or a decimal string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Amount {
    Number(f64),
    Text(String),
}

impl Amount {
    /// Numeric value, if the amount parses.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// An accommodation listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub id: u64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Amount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default)]
    pub is_favorite: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A holiday package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Package {
    pub id: u64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Amount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A guest review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<u64>,
    pub name: String,
    pub rating: u8,
    pub comment: String,
    #[serde(default)]
    pub approved: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Combined result of a global search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    #[serde(default)]
    pub properties: Vec<Value>,
    #[serde(default)]
    pub packages: Vec<Value>,
}

impl SearchResults {
    /// Total number of hits across both collections.
    pub fn total(&self) -> usize {
        self.properties.len() + self.packages.len()
    }

    /// Whether nothing matched.
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Filters for property listings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_type: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub amenities: Vec<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_featured: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

/// Filters for package listings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_featured: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
}

/// Filters for experiences.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExperienceFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experience_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_featured: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_property_keeps_unknown_fields() {
        let raw = json!({
            "id": 42,
            "name": "Paradise Beach Resort",
            "price": "450.00",
            "bedrooms": 3,
        });
        let property: Property = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(property.price.as_ref().and_then(Amount::as_f64), Some(450.0));
        assert!(!property.is_favorite);
        assert_eq!(property.extra.get("bedrooms"), Some(&json!(3)));
    }

    #[test]
    fn test_empty_filters_serialize_to_empty_object() {
        assert_eq!(serde_json::to_value(PropertyFilters::default()).unwrap(), json!({}));
        let filters = PackageFilters {
            category: Some("honeymoon".into()),
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(filters).unwrap(), json!({"category": "honeymoon"}));
    }

    #[test]
    fn test_search_results_total() {
        let results = SearchResults {
            properties: vec![json!({"id": 1})],
            packages: vec![json!({"id": 2}), json!({"id": 3})],
        };
        assert_eq!(results.total(), 3);
        assert!(SearchResults::default().is_empty());
    }
}
