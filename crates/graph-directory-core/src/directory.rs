//! UI-event facade over the navigator and facet aggregator.
//!
//! A presentation layer (the HTTP surface, the CLI) drives a
//! [`Directory`] with the events a directory page produces: initial load,
//! search text change, dropdown change, "clear filters", previous/next.
//! Each query-changing event starts a fresh session; the facade derives
//! the new [`QueryDefinition`] from the current one, so search and
//! filters never combine.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::DirectoryError;
use crate::facets::{collect_facets, FacetSet};
use crate::models::Record;
use crate::navigator::{NavState, Navigation, Navigator, PageInfo};
use crate::query::{FilterAttribute, QueryBuilder, QueryDefinition};
use crate::source::PageSource;

/// Everything a presentation layer needs to render the current page.
#[derive(Debug, Clone, Serialize)]
pub struct DirectoryView {
    pub query: QueryDefinition,
    pub records: Vec<Record>,
    pub page: PageInfo,
    pub state: NavState,
    pub error: Option<String>,
}

/// Facet options for the directory.
#[derive(Debug, Clone)]
pub struct FacetOptions {
    pub attributes: Vec<FilterAttribute>,
    pub page_size: usize,
}

impl Default for FacetOptions {
    fn default() -> Self {
        Self {
            attributes: FilterAttribute::ALL.to_vec(),
            page_size: crate::query::DEFAULT_FACET_PAGE_SIZE,
        }
    }
}

pub struct Directory<S: PageSource + ?Sized> {
    source: Arc<S>,
    navigator: Navigator<Arc<S>>,
    facet_options: FacetOptions,
    facets: Vec<FacetSet>,
}

impl<S: PageSource + ?Sized> Directory<S> {
    pub fn new(source: Arc<S>, builder: QueryBuilder, facet_options: FacetOptions) -> Self {
        Self {
            navigator: Navigator::new(source.clone(), builder),
            source,
            facet_options,
            facets: Vec::new(),
        }
    }

    pub fn navigator(&self) -> &Navigator<Arc<S>> {
        &self.navigator
    }

    pub fn facets(&self) -> &[FacetSet] {
        &self.facets
    }

    /// Load the first unfiltered page and all facets concurrently.
    ///
    /// Facets are stored even when the first page fails to load.
    pub async fn init(&mut self) -> Result<(), DirectoryError> {
        let source = self.source.clone();
        let (page, facets) = futures::join!(
            self.navigator.reset(QueryDefinition::Unfiltered),
            collect_facets(
                source.as_ref(),
                &self.facet_options.attributes,
                self.facet_options.page_size,
            )
        );
        self.facets = facets;
        page.map_err(DirectoryError::from)
    }

    /// Search by name. Drops any active filters; blank text lists everyone.
    pub async fn search(&mut self, text: &str) -> Result<(), DirectoryError> {
        self.reset(QueryDefinition::search(text)).await
    }

    /// Select (`Some`) or deselect (`None` / empty) one filter value.
    ///
    /// Other selected filters are kept; an active search is dropped.
    pub async fn set_filter(
        &mut self,
        attribute: FilterAttribute,
        value: Option<String>,
    ) -> Result<(), DirectoryError> {
        let mut selected = self.selected_filters();
        match value.filter(|v| !v.is_empty()) {
            Some(v) => {
                selected.insert(attribute, v);
            }
            None => {
                selected.remove(&attribute);
            }
        }
        self.reset(QueryDefinition::filter(selected)).await
    }

    /// [`set_filter`](Self::set_filter) with the attribute given by wire name.
    pub async fn set_filter_by_name(
        &mut self,
        attribute: &str,
        value: Option<String>,
    ) -> Result<(), DirectoryError> {
        let attribute = attribute.parse::<FilterAttribute>()?;
        self.set_filter(attribute, value).await
    }

    /// Drop every filter selection.
    pub async fn clear_filters(&mut self) -> Result<(), DirectoryError> {
        self.reset(QueryDefinition::Filter(BTreeMap::new())).await
    }

    pub async fn next(&mut self) -> Result<Navigation, DirectoryError> {
        Ok(self.navigator.next().await?)
    }

    pub async fn previous(&mut self) -> Result<Navigation, DirectoryError> {
        Ok(self.navigator.previous().await?)
    }

    /// Filters in effect, empty unless the current query is a filter query.
    pub fn selected_filters(&self) -> BTreeMap<FilterAttribute, String> {
        match self.navigator.session().definition() {
            QueryDefinition::Filter(selected) => selected.clone(),
            _ => BTreeMap::new(),
        }
    }

    pub fn view(&self) -> DirectoryView {
        let session = self.navigator.session();
        DirectoryView {
            query: session.definition().clone(),
            records: session.records().to_vec(),
            page: self.navigator.page_info(),
            state: self.navigator.state(),
            error: self.navigator.last_error().map(|e| e.to_string()),
        }
    }

    async fn reset(&mut self, definition: QueryDefinition) -> Result<(), DirectoryError> {
        Ok(self.navigator.reset(definition).await?)
    }
}
