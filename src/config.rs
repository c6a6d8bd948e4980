//! Configuration parsing and validation.
//!
//! Graph Directory is configured via a TOML file (default:
//! `config/gdir.toml`). Every section has defaults, and a missing file
//! yields [`Config::default`], so the binary runs against Microsoft Graph
//! with nothing but the access-token variable set.
//!
//! # Example
//!
//! ```toml
//! [graph]
//! base_url = "https://graph.microsoft.com/v1.0"
//! token_env = "GRAPH_ACCESS_TOKEN"
//! timeout_secs = 30
//!
//! [directory]
//! page_size = 8
//! facet_page_size = 100
//! facet_attributes = ["jobTitle", "department", "officeLocation"]
//!
//! [server]
//! bind = "127.0.0.1:7341"
//! ```
//!
//! # Validation
//!
//! [`load_config`] rejects:
//! - page sizes outside `1..=999` (the listing endpoint's `$top` limit)
//! - an empty projection, or one without `id`
//! - unknown facet attributes
//! - an empty `graph.base_url`

use anyhow::{bail, Context, Result};
use graph_directory_core::models::RECORD_ATTRIBUTES;
use graph_directory_core::query::{DEFAULT_FACET_PAGE_SIZE, DEFAULT_PAGE_SIZE};
use graph_directory_core::{FacetOptions, FilterAttribute, QueryBuilder};
use serde::Deserialize;
use std::path::Path;

/// Largest `$top` the listing endpoint accepts.
const MAX_PAGE_SIZE: usize = 999;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub graph: GraphConfig,
    #[serde(default)]
    pub directory: DirectoryConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GraphConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Environment variable holding a pre-issued bearer token.
    #[serde(default = "default_token_env")]
    pub token_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token_env: default_token_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "https://graph.microsoft.com/v1.0".to_string()
}
fn default_token_env() -> String {
    "GRAPH_ACCESS_TOKEN".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct DirectoryConfig {
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_facet_page_size")]
    pub facet_page_size: usize,
    #[serde(default = "default_projection")]
    pub projection: Vec<String>,
    /// Wire names; parsed into [`FilterAttribute`] by [`load_config`].
    #[serde(default = "default_facet_attributes")]
    pub facet_attributes: Vec<String>,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            facet_page_size: default_facet_page_size(),
            projection: default_projection(),
            facet_attributes: default_facet_attributes(),
        }
    }
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}
fn default_facet_page_size() -> usize {
    DEFAULT_FACET_PAGE_SIZE
}
fn default_projection() -> Vec<String> {
    RECORD_ATTRIBUTES.iter().map(|s| s.to_string()).collect()
}
fn default_facet_attributes() -> Vec<String> {
    FilterAttribute::ALL
        .iter()
        .map(|a| a.as_str().to_string())
        .collect()
}

impl DirectoryConfig {
    pub fn query_builder(&self) -> QueryBuilder {
        QueryBuilder::new(self.page_size, self.projection.clone())
    }

    /// Parsed facet attributes. Unknown names were rejected at load time;
    /// any that slip through (hand-built configs) are skipped.
    pub fn facet_attributes(&self) -> Vec<FilterAttribute> {
        self.facet_attributes
            .iter()
            .filter_map(|name| name.parse().ok())
            .collect()
    }

    pub fn facet_options(&self) -> FacetOptions {
        FacetOptions {
            attributes: self.facet_attributes(),
            page_size: self.facet_page_size,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7341".to_string()
}

/// Read, parse and validate the config file at `path`.
///
/// A file that does not exist yields the defaults; one that exists but
/// cannot be read or parsed is an error.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    // Validate graph
    if config.graph.base_url.trim().is_empty() {
        bail!("graph.base_url must not be empty");
    }

    // Validate directory
    let dir = &config.directory;
    if !(1..=MAX_PAGE_SIZE).contains(&dir.page_size) {
        bail!("directory.page_size must be in [1, {}]", MAX_PAGE_SIZE);
    }
    if !(1..=MAX_PAGE_SIZE).contains(&dir.facet_page_size) {
        bail!("directory.facet_page_size must be in [1, {}]", MAX_PAGE_SIZE);
    }
    if dir.projection.is_empty() {
        bail!("directory.projection must not be empty");
    }
    if !dir.projection.iter().any(|a| a == "id") {
        bail!("directory.projection must include 'id'");
    }
    for name in &dir.facet_attributes {
        if let Err(e) = name.parse::<FilterAttribute>() {
            bail!("directory.facet_attributes: {}", e);
        }
    }

    Ok(())
}
