//! Query key composition.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use voyage_data::Domain;

/// One segment of a query key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyPart {
    /// Domain or operation name, or a free-text term.
    Str(String),
    /// Numeric resource identifier.
    Int(i64),
    /// Unsigned identifier beyond the range of `Int`.
    Uint(u64),
    /// Canonical JSON text of a parameter object.
    Params(String),
}

impl From<&str> for KeyPart {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for KeyPart {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<u64> for KeyPart {
    fn from(n: u64) -> Self {
        i64::try_from(n).map_or(Self::Uint(n), Self::Int)
    }
}

impl From<i64> for KeyPart {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl std::fmt::Display for KeyPart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Str(s) => write!(f, "{}", s),
            Self::Int(n) => write!(f, "{}", n),
            Self::Uint(n) => write!(f, "{}", n),
            Self::Params(p) => write!(f, "{}", p),
        }
    }
}

/// Hierarchical identifier of a cacheable read.
///
/// Keys compare part by part, so `properties` is a prefix of
/// `properties:list:{}` and of `properties:detail:42`, which lets one
/// invalidation reach a whole subtree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QueryKey {
    parts: Vec<KeyPart>,
}

impl QueryKey {
    /// Create a key rooted at a domain name.
    pub fn new(root: impl Into<KeyPart>) -> Self {
        Self {
            parts: vec![root.into()],
        }
    }

    /// Create a key rooted at a resource domain.
    pub fn domain(domain: Domain) -> Self {
        Self::new(domain.name())
    }

    /// Append a segment.
    pub fn with(mut self, part: impl Into<KeyPart>) -> Self {
        self.parts.push(part.into());
        self
    }

    /// Append a canonicalized parameter object.
    pub fn with_params(mut self, params: &Value) -> Self {
        self.parts.push(KeyPart::Params(canonical_params(params)));
        self
    }

    /// Append serializable parameters. `None` is the same as an empty object.
    ///
    /// Fails when `params` has no JSON form, so distinct parameters never
    /// collapse onto one key.
    pub fn with_serialized<T: Serialize>(self, params: Option<&T>) -> Result<Self, serde_json::Error> {
        let value = match params {
            Some(p) => serde_json::to_value(p)?,
            None => Value::Null,
        };
        Ok(self.with_params(&value))
    }

    pub fn parts(&self) -> &[KeyPart] {
        &self.parts
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Name of the root segment.
    pub fn root(&self) -> Option<&str> {
        self.str_at(0)
    }

    /// Name of the operation segment.
    pub fn operation(&self) -> Option<&str> {
        self.str_at(1)
    }

    /// Whether `self` is a (non-strict) prefix of `other`.
    pub fn is_prefix_of(&self, other: &QueryKey) -> bool {
        other.parts.starts_with(&self.parts)
    }

    fn str_at(&self, index: usize) -> Option<&str> {
        match self.parts.get(index) {
            Some(KeyPart::Str(s)) => Some(s),
            _ => None,
        }
    }
}

impl std::fmt::Display for QueryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                f.write_str(":")?;
            }
            write!(f, "{}", part)?;
        }
        Ok(())
    }
}

/// Canonical JSON text for a parameter object.
///
/// Object keys are sorted at every depth and null members are dropped, so
/// `{a:1,b:2}`, `{b:2,a:1}` and `{a:1,b:2,c:null}` agree. A null or absent
/// parameter set is `{}`. Array order is preserved.
pub fn canonical_params(params: &Value) -> String {
    match params {
        Value::Null => "{}".to_string(),
        other => canonicalize(other).to_string(),
    }
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<&String, Value> = map
                .iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k, canonicalize(v)))
                .collect();
            let mut out = serde_json::Map::new();
            for (k, v) in sorted {
                out.insert(k.clone(), v);
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_param_order_does_not_matter() {
        let a = QueryKey::new("properties")
            .with("list")
            .with_params(&json!({"a": 1, "b": {"y": 2, "x": 1}}));
        let b = QueryKey::new("properties")
            .with("list")
            .with_params(&json!({"b": {"x": 1, "y": 2}, "a": 1, "c": null}));
        assert_eq!(a, b);
        assert_eq!(a.to_string(), r#"properties:list:{"a":1,"b":{"x":1,"y":2}}"#);
    }

    #[test]
    fn test_different_params_do_not_collide() {
        let a = QueryKey::new("properties").with("list").with_params(&json!({"a": 1}));
        let b = QueryKey::new("properties").with("list").with_params(&json!({"a": "1"}));
        let c = QueryKey::new("properties").with("detail").with(1_u64);
        let d = QueryKey::new("properties").with("detail").with("1");
        assert_ne!(a, b);
        assert_ne!(c, d);
    }

    #[test]
    fn test_large_ids_keep_their_value() {
        let max = QueryKey::new("properties").with("detail").with(u64::MAX);
        let negative = QueryKey::new("properties").with("detail").with(-1_i64);
        assert_ne!(max, negative);
        assert_eq!(max.to_string(), format!("properties:detail:{}", u64::MAX));
        assert_eq!(
            QueryKey::new("properties").with(42_u64),
            QueryKey::new("properties").with(42_i64)
        );
    }

    #[test]
    fn test_absent_params_are_empty_object() {
        let none = QueryKey::new("properties").with("list").with_serialized::<Value>(None).unwrap();
        let empty = QueryKey::new("properties").with("list").with_params(&json!({}));
        assert_eq!(none, empty);
        assert_eq!(none.to_string(), "properties:list:{}");
    }

    #[test]
    fn test_prefix_matching() {
        let all = QueryKey::domain(Domain::Properties);
        let detail = QueryKey::domain(Domain::Properties).with("detail").with(42_u64);
        let packages = QueryKey::domain(Domain::Packages).with("detail").with(42_u64);

        assert!(all.is_prefix_of(&detail));
        assert!(detail.is_prefix_of(&detail));
        assert!(!detail.is_prefix_of(&all));
        assert!(!all.is_prefix_of(&packages));
        assert_eq!(detail.root(), Some("properties"));
        assert_eq!(detail.operation(), Some("detail"));
    }

    #[test]
    fn test_segment_prefix_is_not_string_prefix() {
        let short = QueryKey::new("search").with("global").with("mal");
        let long = QueryKey::new("search").with("global").with("male");
        assert!(!short.is_prefix_of(&long));
    }
}
