//! Facet aggregation: distinct attribute values across the whole directory.
//!
//! Each facet is a full forward traversal of an unfiltered listing
//! projected to a single attribute. Cost is one request per
//! `facet_page_size` users, which dominates start-up time on large
//! directories.
//!
//! Traversals are fail-soft: a failed page stops that traversal and the
//! values gathered so far are returned with `complete = false`.

use futures::future::join_all;
use serde::{Serialize, Serializer};
use std::collections::HashSet;
use tracing::{info, warn};

use crate::error::PartialFacetError;
use crate::query::{FilterAttribute, QueryBuilder, QueryDefinition};
use crate::source::{PageRequest, PageSource};

/// Distinct values observed for one attribute.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FacetSet {
    pub attribute: FilterAttribute,
    /// Non-empty values in first-seen order, without duplicates.
    pub values: Vec<String>,
    /// `false` when the traversal stopped before the last page.
    pub complete: bool,
    #[serde(serialize_with = "serialize_error")]
    pub error: Option<PartialFacetError>,
}

fn serialize_error<S: Serializer>(
    error: &Option<PartialFacetError>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match error {
        Some(e) => serializer.serialize_some(&e.to_string()),
        None => serializer.serialize_none(),
    }
}

/// Traverse every page of the listing and collect `attribute`'s values.
pub async fn collect_facet<S: PageSource + ?Sized>(
    source: &S,
    attribute: FilterAttribute,
    page_size: usize,
) -> FacetSet {
    let descriptor =
        QueryBuilder::for_facet(attribute, page_size).build(&QueryDefinition::Unfiltered);
    let headers = descriptor.headers.clone();
    let mut request = PageRequest::Fresh(descriptor);

    let mut values = Vec::new();
    let mut seen = HashSet::new();
    let mut pages_fetched = 0;

    loop {
        let page = match source.fetch(&request).await {
            Ok(page) => page,
            Err(e) => {
                let error = PartialFacetError {
                    attribute: attribute.as_str().to_string(),
                    pages_fetched,
                    source: e,
                };
                warn!("{}; returning {} value(s) gathered so far", error, values.len());
                return FacetSet {
                    attribute,
                    values,
                    complete: false,
                    error: Some(error),
                };
            }
        };
        pages_fetched += 1;

        for record in &page.records {
            if let Some(value) = record.attribute(attribute.as_str()) {
                if !value.is_empty() && seen.insert(value.to_string()) {
                    values.push(value.to_string());
                }
            }
        }

        match page.next {
            Some(token) => {
                request = PageRequest::Replay {
                    token,
                    headers: headers.clone(),
                }
            }
            None => break,
        }
    }

    info!(
        attribute = attribute.as_str(),
        pages = pages_fetched,
        "collected {} facet value(s)",
        values.len()
    );
    FacetSet {
        attribute,
        values,
        complete: true,
        error: None,
    }
}

/// Run one traversal per attribute concurrently and wait for all of them.
///
/// Results are returned in `attributes` order regardless of completion
/// order; partial failures are tolerated.
pub async fn collect_facets<S: PageSource + ?Sized>(
    source: &S,
    attributes: &[FilterAttribute],
    page_size: usize,
) -> Vec<FacetSet> {
    join_all(
        attributes
            .iter()
            .map(|attribute| collect_facet(source, *attribute, page_size)),
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::models::Record;
    use crate::query::DEFAULT_FACET_PAGE_SIZE;
    use crate::source::memory::InMemorySource;
    use crate::source::scripted::{ScriptedSource, GATE_TIMEOUT};

    fn dept_name(i: usize) -> String {
        format!("Dept {:02}", (i * 7) % 40)
    }

    /// 250 users over 40 departments; each department recurs on every page.
    fn staff() -> Vec<Record> {
        (0..250)
            .map(|i| Record {
                id: Some(format!("u{}", i)),
                department: if i % 50 == 49 { None } else { Some(dept_name(i)) },
                job_title: Some(if i % 10 == 0 { "" } else { "Engineer" }.to_string()),
                office_location: Some(["Oslo", "Lima", "Pune"][i % 3].to_string()),
                ..Default::default()
            })
            .collect()
    }

    #[tokio::test]
    async fn test_distinct_values_first_seen_order() {
        let source = InMemorySource::new(staff());
        let facet =
            collect_facet(&source, FilterAttribute::Department, DEFAULT_FACET_PAGE_SIZE).await;

        assert!(facet.complete);
        assert!(facet.error.is_none());
        assert_eq!(facet.values.len(), 40);
        let expected: Vec<String> = (0..40).map(dept_name).collect();
        assert_eq!(facet.values, expected);
        assert_eq!(source.fetch_count(), 3);
    }

    #[tokio::test]
    async fn test_empty_values_are_skipped() {
        let source = InMemorySource::new(staff());
        let facet = collect_facet(&source, FilterAttribute::JobTitle, 100).await;
        assert_eq!(facet.values, vec!["Engineer".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_page_returns_partial_set() {
        let source = InMemorySource::new(staff());
        source.fail_after(1);
        let facet = collect_facet(&source, FilterAttribute::Department, 10).await;

        assert!(!facet.complete);
        assert_eq!(facet.values, (0..10).map(dept_name).collect::<Vec<_>>());
        let error = facet.error.unwrap();
        assert_eq!(error.pages_fetched, 1);
        assert_eq!(error.attribute, "department");
        assert_eq!(error.source, TransportError::Offline);
    }

    #[tokio::test]
    async fn test_failure_on_first_page_is_empty_not_fatal() {
        let source = InMemorySource::new(staff());
        source.set_offline(true);
        let facet = collect_facet(&source, FilterAttribute::OfficeLocation, 100).await;
        assert!(facet.values.is_empty());
        assert!(!facet.complete);
    }

    #[tokio::test]
    async fn test_all_facets_in_attribute_order() {
        let source = InMemorySource::new(staff());
        let facets = collect_facets(&source, &FilterAttribute::ALL, 100).await;

        let attrs: Vec<FilterAttribute> = facets.iter().map(|f| f.attribute).collect();
        assert_eq!(attrs, FilterAttribute::ALL.to_vec());
        assert!(facets.iter().all(|f| f.complete));
        assert_eq!(facets[2].values, vec!["Oslo", "Lima", "Pune"]);
        assert_eq!(source.fetch_count(), 9);
    }

    #[tokio::test]
    async fn test_traversals_are_in_flight_together() {
        // Each traversal's first fetch is held until all three have started.
        let source = ScriptedSource::new(staff()).gate_first(3);
        let facets = tokio::time::timeout(
            GATE_TIMEOUT,
            collect_facets(&source, &FilterAttribute::ALL, 100),
        )
        .await
        .expect("traversals ran one after another");

        assert!(facets.iter().all(|f| f.complete));
        assert_eq!(facets[1].values.len(), 40);
        assert_eq!(source.fetch_count(), 9);
    }

    #[tokio::test]
    async fn test_one_failed_traversal_spares_the_others() {
        let source = ScriptedSource::new(staff())
            .gate_first(3)
            .fail_select("department");
        let facets = tokio::time::timeout(
            GATE_TIMEOUT,
            collect_facets(&source, &FilterAttribute::ALL, 100),
        )
        .await
        .expect("traversals ran one after another");

        let department = &facets[1];
        assert_eq!(department.attribute, FilterAttribute::Department);
        assert!(!department.complete);
        assert!(department.values.is_empty());
        let error = department.error.as_ref().unwrap();
        assert_eq!(error.pages_fetched, 0);
        assert_eq!(error.source, TransportError::Offline);

        assert!(facets[0].complete);
        assert_eq!(facets[0].values, vec!["Engineer"]);
        assert!(facets[2].complete);
        assert_eq!(facets[2].values, vec!["Oslo", "Lima", "Pune"]);
    }
}
