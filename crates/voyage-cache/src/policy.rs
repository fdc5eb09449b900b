//! Freshness windows per resource class.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::QueryKey;

/// Freshness class of a cached read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FreshnessClass {
    /// Lookup data: property types, amenities, locations, destinations.
    Reference,
    /// Filtered listings.
    Listing,
    /// A single resource.
    Detail,
    /// Curated lists that only change through admin action.
    Featured,
    /// Review listings.
    Reviews,
    /// Search results.
    Search,
    /// Anything else.
    Fallback,
}

impl FreshnessClass {
    /// Classify a key by its domain and operation.
    pub fn of(key: &QueryKey) -> Self {
        match (key.root(), key.operation()) {
            (Some("reference"), _) => Self::Reference,
            (Some("search"), _) => Self::Search,
            (_, Some("featured")) => Self::Featured,
            (_, Some("reviews-for")) | (Some("reviews"), _) => Self::Reviews,
            (_, Some("detail")) => Self::Detail,
            (_, Some("list")) => Self::Listing,
            _ => Self::Fallback,
        }
    }
}

impl std::fmt::Display for FreshnessClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reference => write!(f, "reference"),
            Self::Listing => write!(f, "listing"),
            Self::Detail => write!(f, "detail"),
            Self::Featured => write!(f, "featured"),
            Self::Reviews => write!(f, "reviews"),
            Self::Search => write!(f, "search"),
            Self::Fallback => write!(f, "fallback"),
        }
    }
}

/// Staleness windows in milliseconds, one per [`FreshnessClass`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StalenessPolicy {
    pub reference_ms: u64,
    pub listing_ms: u64,
    pub detail_ms: u64,
    pub featured_ms: u64,
    pub reviews_ms: u64,
    pub search_ms: u64,
    pub fallback_ms: u64,
}

impl StalenessPolicy {
    /// Window for a freshness class.
    pub fn window(&self, class: FreshnessClass) -> Duration {
        let ms = match class {
            FreshnessClass::Reference => self.reference_ms,
            FreshnessClass::Listing => self.listing_ms,
            FreshnessClass::Detail => self.detail_ms,
            FreshnessClass::Featured => self.featured_ms,
            FreshnessClass::Reviews => self.reviews_ms,
            FreshnessClass::Search => self.search_ms,
            FreshnessClass::Fallback => self.fallback_ms,
        };
        Duration::from_millis(ms)
    }

    /// Window for a key.
    pub fn for_key(&self, key: &QueryKey) -> Duration {
        self.window(FreshnessClass::of(key))
    }

    /// Same window for every class. Handy in tests.
    pub fn uniform(window: Duration) -> Self {
        let ms = window.as_millis() as u64;
        Self {
            reference_ms: ms,
            listing_ms: ms,
            detail_ms: ms,
            featured_ms: ms,
            reviews_ms: ms,
            search_ms: ms,
            fallback_ms: ms,
        }
    }
}

impl Default for StalenessPolicy {
    fn default() -> Self {
        Self {
            reference_ms: 60 * 60 * 1000,
            listing_ms: 5 * 60 * 1000,
            detail_ms: 10 * 60 * 1000,
            featured_ms: 30 * 60 * 1000,
            reviews_ms: 2 * 60 * 1000,
            search_ms: 60 * 1000,
            fallback_ms: 5 * 60 * 1000,
        }
    }
}
