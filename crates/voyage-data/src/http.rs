//! HTTP transport backed by `reqwest`.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use serde_json::Value;

use crate::{FetchError, Method, RemoteService, ServiceRequest, TimeoutConfig};

/// Remote service reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpService {
    client: reqwest::Client,
    base_url: String,
}

impl HttpService {
    /// Create a client for the given base URL.
    pub fn new(base_url: impl Into<String>, timeouts: &TimeoutConfig) -> Result<Self, FetchError> {
        Self::build(base_url.into(), timeouts, HeaderMap::new())
    }

    /// Create a client that sends a bearer token with every request.
    pub fn with_bearer_token(
        base_url: impl Into<String>,
        timeouts: &TimeoutConfig,
        token: &str,
    ) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        let value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|e| FetchError::Request(e.to_string()))?;
        headers.insert(AUTHORIZATION, value);
        Self::build(base_url.into(), timeouts, headers)
    }

    fn build(
        base_url: String,
        timeouts: &TimeoutConfig,
        mut headers: HeaderMap,
    ) -> Result<Self, FetchError> {
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let client = reqwest::Client::builder()
            .connect_timeout(timeouts.connect())
            .timeout(timeouts.total())
            .default_headers(headers)
            .build()
            .map_err(|e| FetchError::Request(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// The base URL requests are resolved against.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl RemoteService for HttpService {
    async fn send(&self, request: ServiceRequest) -> Result<Value, FetchError> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self
            .client
            .request(method, self.url(&request.path))
            .query(&request.query);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        tracing::debug!(method = %request.method, target = %request.target(), "sending request");

        let response = builder.send().await.map_err(map_transport_error)?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(map_transport_error)?;

        let body = if bytes.is_empty() {
            Value::Null
        } else {
            match serde_json::from_slice::<Value>(&bytes) {
                Ok(value) => value,
                Err(e) if status.is_success() => return Err(e.into()),
                Err(_) => Value::String(String::from_utf8_lossy(&bytes).into_owned()),
            }
        };

        if !status.is_success() {
            return Err(FetchError::http(status.as_u16(), error_message(&body, status.as_u16())));
        }

        Ok(body)
    }
}

/// Pull a readable message out of an error body.
fn error_message(body: &Value, status: u16) -> String {
    let field = |name: &str| body.get(name).and_then(Value::as_str).map(str::to_string);
    field("message")
        .or_else(|| field("detail"))
        .or_else(|| body.as_str().filter(|s| !s.is_empty()).map(str::to_string))
        .unwrap_or_else(|| format!("HTTP error! status: {}", status))
}

fn map_transport_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else if e.is_connect() {
        FetchError::Connection(e.to_string())
    } else if e.is_decode() {
        FetchError::Deserialization(e.to_string())
    } else {
        FetchError::Request(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_url_join() {
        let service = HttpService::new("http://localhost:8001/api/", &TimeoutConfig::default()).unwrap();
        assert_eq!(service.base_url(), "http://localhost:8001/api");
        assert_eq!(service.url("properties/42/"), "http://localhost:8001/api/properties/42/");
        assert_eq!(service.url("/reviews/"), "http://localhost:8001/api/reviews/");
    }

    #[test]
    fn test_error_message_prefers_message_then_detail() {
        assert_eq!(error_message(&json!({"message": "bad", "detail": "x"}), 400), "bad");
        assert_eq!(error_message(&json!({"detail": "Not found."}), 404), "Not found.");
        assert_eq!(error_message(&json!("gateway down"), 502), "gateway down");
        assert_eq!(error_message(&Value::Null, 500), "HTTP error! status: 500");
    }
}
