//! Service request builder.

use serde::Serialize;
use serde_json::Value;

use crate::FetchError;

/// HTTP methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    /// Convert to HTTP method string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }

    /// Whether the method reads without side effects.
    pub fn is_read(&self) -> bool {
        matches!(self, Method::Get)
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request to the remote resource service.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceRequest {
    /// HTTP method.
    pub method: Method,
    /// Path relative to the service base URL (e.g. `properties/42/`).
    pub path: String,
    /// Query pairs, in order. Keys may repeat.
    pub query: Vec<(String, String)>,
    /// JSON body for writes.
    pub body: Option<Value>,
}

impl ServiceRequest {
    /// Create a new request.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    /// Create a GET request.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    /// Create a POST request.
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    /// Create a PATCH request.
    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::Patch, path)
    }

    /// Create a DELETE request.
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    /// Append a query pair.
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Append query pairs from a flat JSON object of filters.
    ///
    /// Nulls are skipped, arrays become repeated keys, strings are used
    /// verbatim and everything else uses its JSON text.
    pub fn filters(mut self, filters: &Value) -> Self {
        if let Value::Object(map) = filters {
            for (key, value) in map {
                match value {
                    Value::Null => {}
                    Value::Array(items) => {
                        for item in items {
                            self.query.push((key.clone(), scalar_text(item)));
                        }
                    }
                    other => self.query.push((key.clone(), scalar_text(other))),
                }
            }
        }
        self
    }

    /// Set the request body as JSON.
    pub fn json<T: Serialize>(mut self, value: &T) -> Result<Self, FetchError> {
        self.body = Some(serde_json::to_value(value)?);
        Ok(self)
    }

    /// Set a JSON body that is already a value.
    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Path with the query string appended, unencoded.
    pub fn target(&self) -> String {
        if self.query.is_empty() {
            return self.path.clone();
        }
        let query = self
            .query
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");
        format!("{}?{}", self.path, query)
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
