//! Remote page fetching abstraction.
//!
//! The [`PageSource`] trait is the single seam between the engine and the
//! remote user-graph service, enabling pluggable backends (the Graph REST
//! client in the application crate, the in-memory source here).
//!
//! A source supports two call shapes:
//!
//! | Request | Meaning |
//! |---------|---------|
//! | [`PageRequest::Fresh`] | First page of a query, built by the [`QueryBuilder`](crate::query::QueryBuilder) |
//! | [`PageRequest::Replay`] | A continuation token dereferenced verbatim |
//!
//! A continuation token fully determines its page; the first-page descriptor
//! is not consulted. Sources never retry.

pub mod memory;
#[cfg(test)]
pub(crate) mod scripted;

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::TransportError;
use crate::models::{ContinuationToken, Page};
use crate::query::RequestDescriptor;

/// One fetch, either from a built descriptor or a remembered token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageRequest {
    Fresh(RequestDescriptor),
    Replay {
        token: ContinuationToken,
        /// Headers of the query the token belongs to.
        headers: Vec<(String, String)>,
    },
}

impl PageRequest {
    pub fn headers(&self) -> &[(String, String)] {
        match self {
            Self::Fresh(desc) => &desc.headers,
            Self::Replay { headers, .. } => headers,
        }
    }

    /// Short form for log lines.
    pub fn describe(&self) -> String {
        match self {
            Self::Fresh(desc) => desc.to_relative_url(),
            Self::Replay { token, .. } => token.to_string(),
        }
    }
}

/// Executes one paged request against the remote service.
///
/// Implementations must be `Send + Sync` to work with async runtimes.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetch exactly one page.
    async fn fetch(&self, request: &PageRequest) -> Result<Page, TransportError>;
}

#[async_trait]
impl<T: PageSource + ?Sized> PageSource for Arc<T> {
    async fn fetch(&self, request: &PageRequest) -> Result<Page, TransportError> {
        (**self).fetch(request).await
    }
}
