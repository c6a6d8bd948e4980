//! Error taxonomy for the directory engine.

use thiserror::Error;

/// Failure of a single page fetch.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The request never produced a response (DNS, connect, timeout, ...).
    #[error("request to {url} failed: {message}")]
    Network { url: String, message: String },

    /// The remote service answered with a non-success status.
    #[error("remote returned HTTP {status} for {url}: {body}")]
    Status { url: String, status: u16, body: String },

    /// The response body was not a valid listing.
    #[error("malformed listing response from {url}: {message}")]
    Decode { url: String, message: String },

    /// The source is deliberately unavailable (in-memory failure injection).
    #[error("page source is offline")]
    Offline,

    /// A replayed token is unknown to the source that should have issued it.
    #[error("unknown continuation token: {0}")]
    UnknownToken(String),
}

/// A facet traversal stopped before reaching the last page.
///
/// Carried inside [`FacetSet`](crate::facets::FacetSet); never propagated.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("facet traversal for {attribute} stopped after {pages_fetched} page(s): {source}")]
pub struct PartialFacetError {
    pub attribute: String,
    pub pages_fetched: usize,
    #[source]
    pub source: TransportError,
}

/// Why a navigation request was ignored. Not an error: these are normal
/// UI-timing occurrences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidNavigation {
    /// `next()` on the last page.
    NoNextPage,
    /// `previous()` on page 1.
    AtFirstPage,
    /// No page is loaded (never reset, or the last reset failed).
    NotReady,
}

impl InvalidNavigation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoNextPage => "no_next_page",
            Self::AtFirstPage => "at_first_page",
            Self::NotReady => "not_ready",
        }
    }
}

/// Errors surfaced by the [`Directory`](crate::directory::Directory) facade.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DirectoryError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("unknown filter attribute: '{0}'. Must be jobTitle, department, or officeLocation.")]
    UnknownAttribute(String),
}
