//! Microsoft Graph page source.
//!
//! [`GraphClient`] implements [`PageSource`] over the Graph REST API
//! `/users` listing using `reqwest`. It performs exactly one HTTP request
//! per fetch; pagination is driven by the caller through continuation
//! tokens.
//!
//! # Environment Variables
//!
//! The bearer token is read from the variable named by
//! `graph.token_env` (default `GRAPH_ACCESS_TOKEN`). Acquiring the token
//! (device code, client credentials, ...) is left to the caller.
//!
//! # URL resolution
//!
//! | Request | URL |
//! |---------|-----|
//! | fresh descriptor | `{base_url}{path}?{encoded params}` |
//! | replay, absolute token | the token, verbatim |
//! | replay, relative token | `{base_url}/{token}` |
//!
//! Graph returns `@odata.nextLink` as an absolute URL, so replays normally
//! take the verbatim path.

use anyhow::{Context, Result};
use async_trait::async_trait;
use graph_directory_core::error::TransportError;
use graph_directory_core::models::{ListResponse, Page};
use graph_directory_core::source::{PageRequest, PageSource};
use std::time::Duration;
use tracing::debug;

use crate::config::GraphConfig;

/// Response bodies are truncated to this many characters in errors.
const ERROR_BODY_LIMIT: usize = 500;

// ============ Credentials ============

/// A pre-issued Graph access token.
pub struct GraphCredentials {
    token: String,
}

impl GraphCredentials {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    /// Load the token from the environment variable `var`.
    pub fn from_env(var: &str) -> Result<Self> {
        let token = std::env::var(var)
            .with_context(|| format!("{} environment variable not set", var))?;
        if token.trim().is_empty() {
            anyhow::bail!("{} environment variable is empty", var);
        }
        Ok(Self::new(token.trim()))
    }
}

// ============ Client ============

/// Graph REST client for the `/users` listing.
pub struct GraphClient {
    client: reqwest::Client,
    base_url: String,
    credentials: GraphCredentials,
}

impl GraphClient {
    pub fn new(config: &GraphConfig, credentials: GraphCredentials) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    /// Build a client whose token comes from `config.token_env`.
    pub fn from_config(config: &GraphConfig) -> Result<Self> {
        let credentials = GraphCredentials::from_env(&config.token_env)?;
        Self::new(config, credentials)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for a request.
    pub fn url_for(&self, request: &PageRequest) -> String {
        match request {
            PageRequest::Fresh(desc) => format!("{}{}", self.base_url, desc.to_relative_url()),
            PageRequest::Replay { token, .. } => {
                let raw = token.as_str();
                if raw.starts_with("https://") || raw.starts_with("http://") {
                    raw.to_string()
                } else {
                    format!("{}/{}", self.base_url, raw.trim_start_matches('/'))
                }
            }
        }
    }
}

#[async_trait]
impl PageSource for GraphClient {
    async fn fetch(&self, request: &PageRequest) -> Result<Page, TransportError> {
        let url = self.url_for(request);
        debug!(url = %url, "GET");

        let mut req_builder = self
            .client
            .get(&url)
            .bearer_auth(&self.credentials.token)
            .header("Accept", "application/json");
        for (name, value) in request.headers() {
            req_builder = req_builder.header(name.as_str(), value.as_str());
        }

        let resp = req_builder
            .send()
            .await
            .map_err(|e| TransportError::Network {
                url: url.clone(),
                message: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                url,
                status: status.as_u16(),
                body: body.chars().take(ERROR_BODY_LIMIT).collect(),
            });
        }

        let body = resp.text().await.map_err(|e| TransportError::Network {
            url: url.clone(),
            message: e.to_string(),
        })?;
        let listing: ListResponse =
            serde_json::from_str(&body).map_err(|e| TransportError::Decode {
                url: url.clone(),
                message: e.to_string(),
            })?;

        debug!(
            url = %url,
            records = listing.value.len(),
            has_next = listing.next_link.is_some(),
            "page received"
        );
        Ok(listing.into())
    }
}
