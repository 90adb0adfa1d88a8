//! Application configuration structures.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::PathTemplate;
use crate::error::{AppError, Result};
use crate::services::RetryPolicy;

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// HTTP and paging behavior
    #[serde(default)]
    pub harvest: HarvestConfig,

    /// Static catalog layout rules
    #[serde(default)]
    pub layout: LayoutConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.harvest.user_agent.trim().is_empty() {
            return Err(AppError::validation("harvest.user_agent is empty"));
        }
        if self.harvest.page_limit == 0 {
            return Err(AppError::validation("harvest.page_limit must be > 0"));
        }
        if self.harvest.max_concurrent == 0 {
            return Err(AppError::validation("harvest.max_concurrent must be > 0"));
        }
        if self.layout.write_concurrent == 0 {
            return Err(AppError::validation("layout.write_concurrent must be > 0"));
        }
        PathTemplate::parse(&self.layout.item_template)
            .map_err(|e| AppError::validation(format!("layout.item_template: {e}")))?;
        Ok(())
    }
}

/// HTTP client and paging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Per-request timeout in seconds (0 disables the timeout)
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Records requested per page
    #[serde(default = "defaults::page_limit")]
    pub page_limit: u32,

    /// Maximum concurrent page requests
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,

    /// Extra attempts after a transport failure
    #[serde(default = "defaults::retries")]
    pub retries: u32,

    /// Pause before each retry in milliseconds
    #[serde(default)]
    pub retry_delay_ms: u64,

    /// Drop records that fail structural validation
    #[serde(default = "defaults::validate_records")]
    pub validate_records: bool,
}

impl HarvestConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retries, Duration::from_millis(self.retry_delay_ms))
    }
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            page_limit: defaults::page_limit(),
            max_concurrent: defaults::max_concurrent(),
            retries: defaults::retries(),
            retry_delay_ms: 0,
            validate_records: defaults::validate_records(),
        }
    }
}

/// Static catalog layout settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Subcatalog template for items
    #[serde(default = "defaults::item_template")]
    pub item_template: String,

    /// API-only link relations stripped from providers
    #[serde(default = "defaults::provider_rels")]
    pub provider_rels: Vec<String>,

    /// API-only link relations stripped from collections
    #[serde(default = "defaults::collection_rels")]
    pub collection_rels: Vec<String>,

    /// API-only link relations stripped from harvested items
    #[serde(default = "defaults::item_rels")]
    pub item_rels: Vec<String>,

    /// Maximum concurrent storage writes
    #[serde(default = "defaults::write_concurrent")]
    pub write_concurrent: usize,
}

impl LayoutConfig {
    pub fn provider_rel_set(&self) -> HashSet<String> {
        self.provider_rels.iter().cloned().collect()
    }

    pub fn collection_rel_set(&self) -> HashSet<String> {
        self.collection_rels.iter().cloned().collect()
    }

    pub fn item_rel_set(&self) -> HashSet<String> {
        self.item_rels.iter().cloned().collect()
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            item_template: defaults::item_template(),
            provider_rels: defaults::provider_rels(),
            collection_rels: defaults::collection_rels(),
            item_rels: defaults::item_rels(),
            write_concurrent: defaults::write_concurrent(),
        }
    }
}

mod defaults {
    use crate::models::template::DEFAULT_ITEM_TEMPLATE;

    // Harvest defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; catalog-mirror/0.1)".into()
    }
    pub fn timeout() -> u64 {
        60
    }
    pub fn page_limit() -> u32 {
        500
    }
    pub fn max_concurrent() -> usize {
        10
    }
    pub fn retries() -> u32 {
        1
    }
    pub fn validate_records() -> bool {
        true
    }

    // Layout defaults
    pub fn item_template() -> String {
        DEFAULT_ITEM_TEMPLATE.into()
    }
    pub fn provider_rels() -> Vec<String> {
        vec!["search".into(), "collections".into(), "next".into()]
    }
    pub fn collection_rels() -> Vec<String> {
        vec!["child".into(), "next".into(), "items".into()]
    }
    pub fn item_rels() -> Vec<String> {
        vec!["search".into(), "next".into(), "prev".into()]
    }
    pub fn write_concurrent() -> usize {
        32
    }
}
