//! # Graph Directory Core
//!
//! Runtime-free logic for browsing a paged user directory: records and
//! continuation tokens, the query builder, the cursor navigator with
//! backward navigation, the facet aggregator, and the page source trait.
//!
//! This crate contains no tokio, HTTP client, or filesystem I/O. Remote
//! access is injected through [`source::PageSource`].
//!
//! | Module | Role |
//! |--------|------|
//! | [`query`] | Query definitions, filter predicates, request descriptors |
//! | [`source`] | Page fetching seam plus an in-memory listing |
//! | [`navigator`] | Session state machine and token history |
//! | [`facets`] | Distinct values per filter attribute |
//! | [`directory`] | UI-event facade tying the above together |

pub mod directory;
pub mod error;
pub mod facets;
pub mod models;
pub mod navigator;
pub mod query;
pub mod source;

pub use directory::{Directory, DirectoryView, FacetOptions};
pub use error::{DirectoryError, InvalidNavigation, PartialFacetError, TransportError};
pub use facets::FacetSet;
pub use models::{ContinuationToken, Page, Record};
pub use navigator::{NavState, Navigation, Navigator, PageInfo};
pub use query::{FilterAttribute, QueryBuilder, QueryDefinition, RequestDescriptor};
pub use source::{memory::InMemorySource, PageRequest, PageSource};
