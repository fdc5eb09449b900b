//! Resource domains served by the remote service.

/// Top-level resource domains.
///
/// Each domain is the root of a cache key subtree, so invalidating a domain
/// reaches every list, detail and nested read beneath it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Domain {
    /// Accommodation listings.
    Properties,
    /// Holiday packages.
    Packages,
    /// Guest reviews.
    Reviews,
    /// Bookable experiences.
    Experiences,
    /// Lookup data: property types, amenities, locations, destinations.
    Reference,
    /// Free-text search across properties and packages.
    Search,
}

impl Domain {
    /// Get the name of this domain as used in query keys.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Properties => "properties",
            Self::Packages => "packages",
            Self::Reviews => "reviews",
            Self::Experiences => "experiences",
            Self::Reference => "reference",
            Self::Search => "search",
        }
    }

    /// Collection path for domains backed by a single REST collection.
    pub fn collection_path(&self) -> Option<&'static str> {
        match self {
            Self::Properties => Some("properties/"),
            Self::Packages => Some("packages/"),
            Self::Reviews => Some("reviews/"),
            Self::Experiences => Some("experiences/"),
            Self::Reference | Self::Search => None,
        }
    }

    /// Parse a domain name.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "properties" => Some(Self::Properties),
            "packages" => Some(Self::Packages),
            "reviews" => Some(Self::Reviews),
            "experiences" => Some(Self::Experiences),
            "reference" => Some(Self::Reference),
            "search" => Some(Self::Search),
            _ => None,
        }
    }
}

impl std::fmt::Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
