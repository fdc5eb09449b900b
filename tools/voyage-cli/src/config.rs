//! CLI configuration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use voyage_cache::StalenessPolicy;
use voyage_data::TimeoutConfig;
use voyage_observability::LogConfig;
use voyage_search::SearchConfig;

/// CLI configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CliConfig {
    /// Remote service settings.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Freshness windows per resource class.
    #[serde(default)]
    pub staleness: StalenessPolicy,

    /// Search-as-you-type tuning.
    #[serde(default)]
    pub search: SearchConfig,

    /// Log level and format.
    #[serde(default)]
    pub logging: LogConfig,
}

impl CliConfig {
    /// Load config from a file.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        if path.ends_with(".json") {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path))
        } else {
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse TOML config: {}", path))
        }
    }

    /// Save config to a file.
    pub fn save(&self, path: &str) -> Result<()> {
        let content = if path.ends_with(".json") {
            serde_json::to_string_pretty(self)?
        } else {
            generate_config(self)?
        };

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path))
    }
}

/// Where the data comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// API root; every resource path is joined onto it.
    pub base_url: String,

    /// Bearer token sent with every request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    pub timeouts: TimeoutConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api/".to_string(),
            token: None,
            timeouts: TimeoutConfig::default(),
        }
    }
}

/// Render a voyage.toml with a header comment.
pub fn generate_config(config: &CliConfig) -> Result<String> {
    let body = toml::to_string_pretty(config).context("Failed to render config")?;
    Ok(format!(
        "# Voyage data layer configuration\n# Durations are in milliseconds.\n\n{}",
        body
    ))
}
