//! `gdir page` and `gdir facets`.
//!
//! One-shot command-line renditions of the directory page: build a query
//! from flags, walk forward to the requested page, print it. Both run
//! against any [`PageSource`], so `gdir demo` reuses them unchanged.

use anyhow::{bail, Result};
use graph_directory_core::facets::collect_facets;
use graph_directory_core::{
    FacetSet, FilterAttribute, Navigation, Navigator, PageSource, QueryDefinition,
};
use std::fmt::Write as _;

use crate::config::Config;

/// Query flags shared by `page` and `demo`.
#[derive(Debug, Clone, Default)]
pub struct PageQuery {
    pub search: Option<String>,
    /// `(attribute, value)` pairs, attribute by wire name.
    pub filters: Vec<(String, String)>,
    /// 1-based page to show.
    pub page: usize,
}

impl PageQuery {
    /// Resolve flags into a definition. Unknown attributes are rejected
    /// before anything is fetched.
    pub fn definition(&self) -> Result<QueryDefinition> {
        if let Some(ref text) = self.search {
            if !self.filters.is_empty() {
                bail!("--search and --filter cannot be combined");
            }
            return Ok(QueryDefinition::search(text));
        }
        let mut selected = Vec::with_capacity(self.filters.len());
        for (attribute, value) in &self.filters {
            selected.push((attribute.parse::<FilterAttribute>()?, value.clone()));
        }
        Ok(QueryDefinition::filter(selected))
    }
}

/// Load `query.page` by resetting and then advancing one page at a time.
pub async fn walk_to_page<S: PageSource>(
    navigator: &mut Navigator<S>,
    query: &PageQuery,
) -> Result<()> {
    if query.page == 0 {
        bail!("--page is 1-based");
    }
    navigator.reset(query.definition()?).await?;
    while navigator.session().index() < query.page {
        if let Navigation::Ignored(_) = navigator.next().await? {
            bail!(
                "page {} requested but the query has only {} page(s)",
                query.page,
                navigator.session().index()
            );
        }
    }
    Ok(())
}

/// Plain-text rendition of the navigator's current page.
pub fn format_page<S: PageSource>(navigator: &Navigator<S>) -> String {
    let session = navigator.session();
    let info = navigator.page_info();
    let mut out = String::new();

    let _ = write!(out, "Page {}", info.index);
    if let Some(total) = info.total_count {
        let _ = write!(out, " ({} users)", total);
    }
    out.push('\n');

    if session.records().is_empty() {
        out.push_str("No users.\n");
        return out;
    }

    let first = (info.index - 1) * navigator.builder().page_size();
    for (i, record) in session.records().iter().enumerate() {
        let _ = writeln!(
            out,
            "{}. {}",
            first + i + 1,
            record.display_name.as_deref().unwrap_or("(no name)")
        );
        for (label, value) in [
            ("title", &record.job_title),
            ("mail", &record.mail),
            ("department", &record.department),
            ("office", &record.office_location),
            ("mobile", &record.mobile_phone),
        ] {
            if let Some(v) = value {
                let _ = writeln!(out, "    {}: {}", label, v);
            }
        }
        if let Some(ref id) = record.id {
            let _ = writeln!(out, "    id: {}", id);
        }
    }

    let mut hints = Vec::new();
    if info.has_previous {
        hints.push(format!("--page {} for previous", info.index - 1));
    }
    if info.has_next {
        hints.push(format!("--page {} for more", info.index + 1));
    }
    if !hints.is_empty() {
        let _ = writeln!(out, "\n({})", hints.join(", "));
    }
    out
}

/// Plain-text rendition of facet sets.
pub fn format_facets(facets: &[FacetSet]) -> String {
    let mut out = String::new();
    for facet in facets {
        let _ = write!(out, "{} ({} values", facet.attribute, facet.values.len());
        if let Some(ref e) = facet.error {
            let _ = write!(out, ", incomplete: {}", e);
        }
        out.push_str(")\n");
        for value in &facet.values {
            let _ = writeln!(out, "    {}", value);
        }
    }
    out
}

pub async fn run_page<S: PageSource>(config: &Config, source: S, query: &PageQuery) -> Result<()> {
    let mut navigator = Navigator::new(source, config.directory.query_builder());
    walk_to_page(&mut navigator, query).await?;
    print!("{}", format_page(&navigator));
    Ok(())
}

pub async fn run_facets<S: PageSource>(
    config: &Config,
    source: S,
    attribute: Option<&str>,
) -> Result<()> {
    let attributes = match attribute {
        Some(name) => vec![name.parse::<FilterAttribute>()?],
        None => config.directory.facet_attributes(),
    };
    let facets = collect_facets(&source, &attributes, config.directory.facet_page_size).await;
    print!("{}", format_facets(&facets));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo::demo_source;
    use graph_directory_core::QueryBuilder;

    fn query(page: usize) -> PageQuery {
        PageQuery {
            page,
            ..Default::default()
        }
    }

    #[test]
    fn test_search_and_filter_conflict() {
        let q = PageQuery {
            search: Some("ada".into()),
            filters: vec![("department".into(), "Sales".into())],
            page: 1,
        };
        assert!(q.definition().is_err());
    }

    #[test]
    fn test_unknown_filter_attribute() {
        let q = PageQuery {
            search: None,
            filters: vec![("salary".into(), "high".into())],
            page: 1,
        };
        let err = q.definition().unwrap_err().to_string();
        assert!(err.contains("salary"), "{}", err);
    }

    #[tokio::test]
    async fn test_walk_to_third_page() {
        let mut navigator = Navigator::new(demo_source(30), QueryBuilder::default());
        walk_to_page(&mut navigator, &query(3)).await.unwrap();
        assert_eq!(navigator.session().index(), 3);
        assert_eq!(navigator.session().history().len(), 2);

        let text = format_page(&navigator);
        assert!(text.starts_with("Page 3 (30 users)\n"), "{}", text);
        assert!(text.contains("\n17. "), "{}", text);
        assert!(text.contains("--page 2 for previous, --page 4 for more"));
    }

    #[tokio::test]
    async fn test_walk_past_last_page_fails() {
        let mut navigator = Navigator::new(demo_source(10), QueryBuilder::default());
        let err = walk_to_page(&mut navigator, &query(5)).await.unwrap_err();
        assert!(err.to_string().contains("only 2 page(s)"), "{}", err);
    }

    #[tokio::test]
    async fn test_empty_result_page() {
        let mut navigator = Navigator::new(demo_source(10), QueryBuilder::default());
        let q = PageQuery {
            search: Some("zz".into()),
            ..query(1)
        };
        walk_to_page(&mut navigator, &q).await.unwrap();
        assert_eq!(format_page(&navigator), "Page 1 (0 users)\nNo users.\n");
    }
}
