//! CLI execution context.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, Result};
use voyage_data::{HttpService, InMemoryService, SharedService};
use voyage_sdk::TravelClient;

use crate::config::CliConfig;
use crate::output::Output;

/// Config file names searched for, in order, from the working directory up.
pub const CONFIG_NAMES: [&str; 3] = ["voyage.toml", ".voyage.toml", "voyage.json"];

/// Execution context for CLI commands.
pub struct Context {
    /// CLI configuration.
    pub config: CliConfig,
    /// File the configuration came from, if any.
    pub config_path: Option<PathBuf>,
    /// Output handler.
    pub output: Output,
    /// Working directory.
    pub cwd: PathBuf,
}

impl Context {
    /// Load context from config file.
    pub fn load(config_path: Option<&str>, output: Output) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to get current directory")?;

        let (config, config_path) = if let Some(path) = config_path {
            (CliConfig::load(path)?, Some(PathBuf::from(path)))
        } else {
            match find_config(&cwd) {
                Some((config, path)) => (config, Some(path)),
                None => (CliConfig::default(), None),
            }
        };

        Ok(Self {
            config,
            config_path,
            output,
            cwd,
        })
    }

    /// Resolve a path relative to the working directory.
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        if PathBuf::from(path).is_absolute() {
            PathBuf::from(path)
        } else {
            self.cwd.join(path)
        }
    }

    /// The backend: a fixture file when given, otherwise the configured API.
    pub fn service(&self, fixtures: Option<&str>) -> Result<SharedService> {
        if let Some(path) = fixtures {
            let path = self.resolve_path(path);
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read fixtures: {}", path.display()))?;
            let value: serde_json::Value = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse fixtures: {}", path.display()))?;
            let service = InMemoryService::from_fixtures(&value)?;
            self.output
                .debug(&format!("Serving from fixtures: {}", path.display()));
            return Ok(Arc::new(service));
        }

        let service = &self.config.service;
        let http = match &service.token {
            Some(token) => HttpService::with_bearer_token(&service.base_url, &service.timeouts, token)?,
            None => HttpService::new(&service.base_url, &service.timeouts)?,
        };
        self.output.debug(&format!("Using API at {}", service.base_url));
        Ok(Arc::new(http))
    }

    /// A fresh client over [`service`](Self::service).
    pub fn client(&self, fixtures: Option<&str>) -> Result<TravelClient> {
        let client = TravelClient::new(self.service(fixtures)?, self.config.staleness.clone())
            .with_search_config(self.config.search.clone());
        Ok(client)
    }
}

/// Find a config file in the directory tree.
fn find_config(start: &Path) -> Option<(CliConfig, PathBuf)> {
    let mut current = start.to_path_buf();
    loop {
        for name in &CONFIG_NAMES {
            let config_path = current.join(name);
            if config_path.exists() {
                if let Ok(config) = CliConfig::load(config_path.to_str()?) {
                    return Some((config, config_path));
                }
            }
        }

        if !current.pop() {
            break;
        }
    }

    None
}
