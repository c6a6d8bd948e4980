//! Query definitions and the request builder.
//!
//! A [`QueryDefinition`] captures what the user asked for (nothing, a name
//! search, or a set of equality filters). [`QueryBuilder::build`] turns it
//! into a [`RequestDescriptor`]: the `/users` path, its OData parameters,
//! and the headers the remote service expects.
//!
//! # Predicate grammar
//!
//! | Form | Rendered |
//! |------|----------|
//! | prefix | `startsWith(field,'literal')` |
//! | equality | `field eq 'literal'` |
//! | disjunction | `(a or b)` |
//! | conjunction | `a and b` |
//!
//! Literals double embedded single quotes. Percent-encoding happens once,
//! when the descriptor is rendered to a URL.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::DirectoryError;
use crate::models::{Record, RECORD_ATTRIBUTES};

/// Listing endpoint path.
pub const USERS_PATH: &str = "/users";
/// Header required by the remote service for `$count` and advanced queries.
pub const CONSISTENCY_HEADER: &str = "ConsistencyLevel";
pub const CONSISTENCY_EVENTUAL: &str = "eventual";
pub const DEFAULT_PAGE_SIZE: usize = 8;
pub const DEFAULT_FACET_PAGE_SIZE: usize = 100;

/// Name attributes matched by a search token.
const SEARCH_FIELDS: [&str; 2] = ["givenName", "surname"];

/// Attributes a listing can be filtered (and faceted) on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterAttribute {
    JobTitle,
    Department,
    OfficeLocation,
}

impl FilterAttribute {
    pub const ALL: [FilterAttribute; 3] = [
        FilterAttribute::JobTitle,
        FilterAttribute::Department,
        FilterAttribute::OfficeLocation,
    ];

    /// Wire name of the attribute.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::JobTitle => "jobTitle",
            Self::Department => "department",
            Self::OfficeLocation => "officeLocation",
        }
    }
}

impl fmt::Display for FilterAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterAttribute {
    type Err = DirectoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| DirectoryError::UnknownAttribute(s.to_string()))
    }
}

/// What the current listing is restricted to.
///
/// Search and filters are mutually exclusive; the enum makes the combined
/// state unrepresentable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum QueryDefinition {
    #[default]
    Unfiltered,
    /// Whitespace-separated name fragments, never empty.
    Search(Vec<String>),
    /// One selected value per attribute. An empty map means "filters
    /// cleared" and builds the same request as [`Unfiltered`](Self::Unfiltered).
    Filter(BTreeMap<FilterAttribute, String>),
}

impl QueryDefinition {
    /// Build a search definition from raw input.
    ///
    /// Blank input (or input that is only whitespace) yields `Unfiltered`.
    pub fn search(text: &str) -> Self {
        let tokens: Vec<String> = text.split_whitespace().map(str::to_string).collect();
        if tokens.is_empty() {
            Self::Unfiltered
        } else {
            Self::Search(tokens)
        }
    }

    /// Build a filter definition; entries with an empty value are dropped.
    pub fn filter(selected: impl IntoIterator<Item = (FilterAttribute, String)>) -> Self {
        Self::Filter(
            selected
                .into_iter()
                .filter(|(_, v)| !v.is_empty())
                .collect(),
        )
    }

    /// The predicate this definition restricts the listing to, if any.
    pub fn predicate(&self) -> Option<Predicate> {
        match self {
            Self::Unfiltered => None,
            Self::Search(tokens) if tokens.is_empty() => None,
            Self::Search(tokens) => Some(Predicate::And(
                tokens
                    .iter()
                    .map(|token| {
                        Predicate::Or(
                            SEARCH_FIELDS
                                .iter()
                                .map(|field| Predicate::StartsWith {
                                    field: field.to_string(),
                                    literal: token.clone(),
                                })
                                .collect(),
                        )
                    })
                    .collect(),
            )),
            Self::Filter(selected) if selected.is_empty() => None,
            Self::Filter(selected) => Some(Predicate::And(
                selected
                    .iter()
                    .map(|(attr, value)| Predicate::Eq {
                        field: attr.as_str().to_string(),
                        literal: value.clone(),
                    })
                    .collect(),
            )),
        }
    }
}

/// Structured `$filter` expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    StartsWith { field: String, literal: String },
    Eq { field: String, literal: String },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

impl Predicate {
    /// Evaluate against a record the way the remote service does:
    /// `startsWith` ignores case, `eq` is exact.
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Self::StartsWith { field, literal } => record
                .attribute(field)
                .map(|v| v.to_lowercase().starts_with(&literal.to_lowercase()))
                .unwrap_or(false),
            Self::Eq { field, literal } => record.attribute(field) == Some(literal.as_str()),
            Self::And(terms) => terms.iter().all(|t| t.matches(record)),
            Self::Or(terms) => terms.iter().any(|t| t.matches(record)),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StartsWith { field, literal } => {
                write!(f, "startsWith({},'{}')", field, quote_literal(literal))
            }
            Self::Eq { field, literal } => write!(f, "{} eq '{}'", field, quote_literal(literal)),
            Self::And(terms) => write_joined(f, terms, " and "),
            Self::Or(terms) => {
                f.write_str("(")?;
                write_joined(f, terms, " or ")?;
                f.write_str(")")
            }
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, terms: &[Predicate], sep: &str) -> fmt::Result {
    for (i, term) in terms.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{}", term)?;
    }
    Ok(())
}

/// Escape a string literal for the filter grammar (`'` → `''`).
fn quote_literal(s: &str) -> String {
    s.replace('\'', "''")
}

/// Percent-encode a query parameter value per RFC 3986.
///
/// Encodes all characters except unreserved characters:
/// `A-Z a-z 0-9 - _ . ~`
pub fn encode_component(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                result.push(byte as char);
            }
            _ => {
                result.push_str(&format!("%{:02X}", byte));
            }
        }
    }
    result
}

/// A fully specified listing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    pub path: String,
    /// OData parameters in render order, values not yet encoded.
    pub params: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    /// Structured form of the `$filter` parameter, if present.
    pub filter: Option<Predicate>,
}

impl RequestDescriptor {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Header lookup, case-insensitive on the name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Requested page size (`$top`).
    pub fn top(&self) -> Option<usize> {
        self.param("$top").and_then(|v| v.parse().ok())
    }

    /// Requested projection (`$select`).
    pub fn select(&self) -> Vec<String> {
        self.param("$select")
            .map(|v| {
                v.split(',')
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Render as `path?k=v&...` with every value percent-encoded.
    pub fn to_relative_url(&self) -> String {
        if self.params.is_empty() {
            return self.path.clone();
        }
        let query = self
            .params
            .iter()
            .map(|(k, v)| format!("{}={}", k, encode_component(v)))
            .collect::<Vec<_>>()
            .join("&");
        format!("{}?{}", self.path, query)
    }
}

/// Turns query definitions into request descriptors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryBuilder {
    page_size: usize,
    projection: Vec<String>,
    /// Ask for `$count=true` with the eventual consistency header.
    count: bool,
}

impl Default for QueryBuilder {
    fn default() -> Self {
        Self::new(
            DEFAULT_PAGE_SIZE,
            RECORD_ATTRIBUTES.iter().map(|s| s.to_string()).collect(),
        )
    }
}

impl QueryBuilder {
    pub fn new(page_size: usize, projection: Vec<String>) -> Self {
        Self {
            page_size,
            projection,
            count: true,
        }
    }

    /// Builder for a single-attribute traversal, as used by facet collection.
    ///
    /// Facet pages never display a total, so they skip the count and the
    /// consistency header it requires.
    pub fn for_facet(attribute: FilterAttribute, page_size: usize) -> Self {
        Self::new(page_size, vec![attribute.as_str().to_string()]).with_count(false)
    }

    /// Turn the `$count=true` request (and its consistency header) on or off.
    pub fn with_count(mut self, count: bool) -> Self {
        self.count = count;
        self
    }

    pub fn counts(&self) -> bool {
        self.count
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn projection(&self) -> &[String] {
        &self.projection
    }

    /// Build the first-page request for `definition`.
    ///
    /// An empty projection omits `$select`, returning the service's default
    /// attribute set.
    ///
    /// A counting builder (the default) puts the exact count and the
    /// eventual consistency header on every request regardless of the
    /// definition, so an unfiltered load and a cleared filter set produce
    /// the same request.
    pub fn build(&self, definition: &QueryDefinition) -> RequestDescriptor {
        let filter = definition.predicate();
        let mut params = Vec::with_capacity(4);
        if !self.projection.is_empty() {
            params.push(("$select".to_string(), self.projection.join(",")));
        }
        params.push(("$top".to_string(), self.page_size.to_string()));
        let mut headers = Vec::new();
        if self.count {
            params.push(("$count".to_string(), "true".to_string()));
            headers.push((
                CONSISTENCY_HEADER.to_string(),
                CONSISTENCY_EVENTUAL.to_string(),
            ));
        }
        if let Some(ref predicate) = filter {
            params.push(("$filter".to_string(), predicate.to_string()));
        }
        RequestDescriptor {
            path: USERS_PATH.to_string(),
            params,
            headers,
            filter,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_two_tokens() {
        let req = QueryBuilder::default().build(&QueryDefinition::search("john smith"));
        assert_eq!(
            req.param("$filter"),
            Some(
                "(startsWith(givenName,'john') or startsWith(surname,'john')) and \
                 (startsWith(givenName,'smith') or startsWith(surname,'smith'))"
            )
        );
    }

    #[test]
    fn test_search_trims_and_collapses_whitespace() {
        let def = QueryDefinition::search("  ada \t  lovelace ");
        assert_eq!(
            def,
            QueryDefinition::Search(vec!["ada".to_string(), "lovelace".to_string()])
        );
    }

    #[test]
    fn test_blank_search_is_unfiltered() {
        assert_eq!(QueryDefinition::search("   "), QueryDefinition::Unfiltered);
        let req = QueryBuilder::default().build(&QueryDefinition::search(""));
        assert_eq!(req.param("$filter"), None);
    }

    #[test]
    fn test_unfiltered_request() {
        let req = QueryBuilder::default().build(&QueryDefinition::Unfiltered);
        assert_eq!(req.path, "/users");
        assert_eq!(
            req.param("$select"),
            Some("displayName,jobTitle,mail,userPrincipalName,department,officeLocation,mobilePhone,id")
        );
        assert_eq!(req.top(), Some(8));
        assert_eq!(req.param("$count"), Some("true"));
        assert_eq!(req.header("consistencylevel"), Some("eventual"));
    }

    #[test]
    fn test_filter_request() {
        let def = QueryDefinition::filter([
            (FilterAttribute::OfficeLocation, "Berlin".to_string()),
            (FilterAttribute::Department, "Sales".to_string()),
        ]);
        let req = QueryBuilder::default().build(&def);
        assert_eq!(
            req.param("$filter"),
            Some("department eq 'Sales' and officeLocation eq 'Berlin'")
        );
        assert_eq!(req.param("$count"), Some("true"));
        assert_eq!(req.header(CONSISTENCY_HEADER), Some("eventual"));
    }

    #[test]
    fn test_cleared_filters_equal_never_filtered() {
        let builder = QueryBuilder::default();
        let cleared = builder.build(&QueryDefinition::filter([(
            FilterAttribute::JobTitle,
            String::new(),
        )]));
        assert_eq!(cleared.param("$filter"), None);
        assert_eq!(cleared.param("$count"), Some("true"));
        assert_eq!(cleared.header(CONSISTENCY_HEADER), Some("eventual"));
        assert_eq!(cleared, builder.build(&QueryDefinition::Unfiltered));
    }

    #[test]
    fn test_facet_request_skips_count() {
        let req = QueryBuilder::for_facet(FilterAttribute::Department, 100)
            .build(&QueryDefinition::Unfiltered);
        assert_eq!(req.to_relative_url(), "/users?$select=department&$top=100");
        assert_eq!(req.param("$count"), None);
        assert!(req.headers.is_empty());
        assert!(QueryBuilder::default().counts());
    }

    #[test]
    fn test_literal_quotes_are_doubled() {
        let def = QueryDefinition::filter([(FilterAttribute::Department, "R'n'D".to_string())]);
        let req = QueryBuilder::default().build(&def);
        assert_eq!(req.param("$filter"), Some("department eq 'R''n''D'"));
    }

    #[test]
    fn test_relative_url_encodes_values() {
        let def = QueryDefinition::filter([(FilterAttribute::Department, "R&D".to_string())]);
        let url = QueryBuilder::new(5, vec!["id".to_string()]).build(&def).to_relative_url();
        assert_eq!(
            url,
            "/users?$select=id&$top=5&$count=true&$filter=department%20eq%20%27R%26D%27"
        );
    }

    #[test]
    fn test_attribute_parse() {
        assert_eq!(
            "officeLocation".parse::<FilterAttribute>().unwrap(),
            FilterAttribute::OfficeLocation
        );
        assert!(matches!(
            "salary".parse::<FilterAttribute>(),
            Err(DirectoryError::UnknownAttribute(name)) if name == "salary"
        ));
    }

    #[test]
    fn test_predicate_matches() {
        let mut record = Record {
            department: Some("Sales".into()),
            ..Default::default()
        };
        record
            .extra
            .insert("givenName".into(), serde_json::json!("John"));
        record
            .extra
            .insert("surname".into(), serde_json::json!("Smithers"));

        let search = QueryDefinition::search("jo smith").predicate().unwrap();
        assert!(search.matches(&record));
        let miss = QueryDefinition::search("jane").predicate().unwrap();
        assert!(!miss.matches(&record));

        let filter = QueryDefinition::filter([(FilterAttribute::Department, "sales".into())])
            .predicate()
            .unwrap();
        assert!(!filter.matches(&record), "eq is case-sensitive");
    }
}
