//! Fixture-backed transport.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::{FetchError, Method, RemoteService, ServiceRequest};

#[derive(Debug, Clone)]
enum Route {
    Respond(Value),
    Fail(FetchError),
}

type RouteKey = (Method, String);

/// In-memory remote service answering from registered fixtures.
///
/// Routes are keyed by method and request target (path plus query string).
/// Unknown routes answer with a 404. Every request is counted, whether it
/// succeeds or not.
#[derive(Debug, Default)]
pub struct InMemoryService {
    routes: Mutex<HashMap<RouteKey, Route>>,
    log: Mutex<Vec<ServiceRequest>>,
    latency: Option<Duration>,
}

impl InMemoryService {
    /// Create an empty service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load GET fixtures from a JSON object mapping target to response.
    pub fn from_fixtures(fixtures: &Value) -> Result<Self, FetchError> {
        let map = fixtures.as_object().ok_or_else(|| {
            FetchError::Deserialization("fixtures must be a JSON object".to_string())
        })?;
        let service = Self::new();
        for (target, response) in map {
            service.respond(Method::Get, target.trim_start_matches('/'), response.clone());
        }
        Ok(service)
    }

    /// Delay every response by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Register a GET fixture.
    pub fn with_get(self, target: &str, response: Value) -> Self {
        self.respond(Method::Get, target, response);
        self
    }

    /// Register a fixture for any method.
    pub fn with_route(self, method: Method, target: &str, response: Value) -> Self {
        self.respond(method, target, response);
        self
    }

    /// Register (or replace) a fixture.
    pub fn respond(&self, method: Method, target: &str, response: Value) {
        lock(&self.routes).insert((method, target.to_string()), Route::Respond(response));
    }

    /// Make a route fail with `error` until it is replaced.
    pub fn fail(&self, method: Method, target: &str, error: FetchError) {
        lock(&self.routes).insert((method, target.to_string()), Route::Fail(error));
    }

    /// Number of requests received for a target, any method.
    pub fn request_count(&self, target: &str) -> usize {
        lock(&self.log)
            .iter()
            .filter(|r| r.target() == target)
            .count()
    }

    /// Total number of requests received.
    pub fn total_requests(&self) -> usize {
        lock(&self.log).len()
    }

    /// Copy of every request received, in arrival order.
    pub fn requests(&self) -> Vec<ServiceRequest> {
        lock(&self.log).clone()
    }
}

#[async_trait]
impl RemoteService for InMemoryService {
    async fn send(&self, request: ServiceRequest) -> Result<Value, FetchError> {
        let target = request.target();
        let route = lock(&self.routes)
            .get(&(request.method, target.clone()))
            .cloned();
        lock(&self.log).push(request);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        match route {
            Some(Route::Respond(value)) => Ok(value),
            Some(Route::Fail(error)) => Err(error),
            None => {
                tracing::debug!(target = %target, "no fixture registered");
                Err(FetchError::http(404, "Not found."))
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
