//! Core data models for the directory engine.
//!
//! These types represent the user records, pages, and continuation tokens
//! that flow between a [`PageSource`](crate::source::PageSource) and the
//! [`Navigator`](crate::navigator::Navigator).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Wire names of the fixed record attributes, in projection order.
pub const RECORD_ATTRIBUTES: [&str; 8] = [
    "displayName",
    "jobTitle",
    "mail",
    "userPrincipalName",
    "department",
    "officeLocation",
    "mobilePhone",
    "id",
];

/// A directory user as returned by the remote `/users` listing.
///
/// Every fixed attribute is optional: the remote service returns `null`
/// for unset values and omits attributes that were not projected.
/// Anything else the service sends (e.g. `givenName`, `surname`,
/// `companyName`) lands in [`extra`](Record::extra).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub job_title: Option<String>,
    #[serde(default)]
    pub mail: Option<String>,
    #[serde(default)]
    pub user_principal_name: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub office_location: Option<String>,
    #[serde(default)]
    pub mobile_phone: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    /// Extension attributes keyed by wire name.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Record {
    /// Look up a string attribute by its wire name.
    ///
    /// Fixed attributes are checked first, then string-valued extension
    /// entries. Returns `None` for unset, `null` or non-string values.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        let fixed = match name {
            "displayName" => &self.display_name,
            "jobTitle" => &self.job_title,
            "mail" => &self.mail,
            "userPrincipalName" => &self.user_principal_name,
            "department" => &self.department,
            "officeLocation" => &self.office_location,
            "mobilePhone" => &self.mobile_phone,
            "id" => &self.id,
            other => return self.extra.get(other).and_then(|v| v.as_str()),
        };
        fixed.as_deref()
    }

    /// Keep only the named attributes, mirroring a `$select` projection.
    pub fn project(&self, names: &[String]) -> Record {
        let keep = |name: &str, value: &Option<String>| {
            if names.iter().any(|n| n == name) {
                value.clone()
            } else {
                None
            }
        };
        Record {
            display_name: keep("displayName", &self.display_name),
            job_title: keep("jobTitle", &self.job_title),
            mail: keep("mail", &self.mail),
            user_principal_name: keep("userPrincipalName", &self.user_principal_name),
            department: keep("department", &self.department),
            office_location: keep("officeLocation", &self.office_location),
            mobile_phone: keep("mobilePhone", &self.mobile_phone),
            id: keep("id", &self.id),
            extra: self
                .extra
                .iter()
                .filter(|(k, _)| names.iter().any(|n| n == *k))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }
}

/// Opaque continuation token handed out by the remote service.
///
/// The engine stores and replays tokens verbatim; it never parses or
/// builds one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContinuationToken(String);

impl ContinuationToken {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContinuationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One page of a listing, in the order the remote service returned it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub records: Vec<Record>,
    /// Token for the following page; `None` on the last page.
    pub next: Option<ContinuationToken>,
    /// Exact result count, present when the request asked for `$count`.
    pub total_count: Option<u64>,
}

impl Page {
    pub fn is_last(&self) -> bool {
        self.next.is_none()
    }
}

/// Raw `/users` response body.
#[derive(Debug, Deserialize)]
pub struct ListResponse {
    #[serde(default)]
    pub value: Vec<Record>,
    #[serde(rename = "@odata.nextLink", alias = "nextLink", default)]
    pub next_link: Option<String>,
    #[serde(rename = "@odata.count", default)]
    pub count: Option<u64>,
}

impl From<ListResponse> for Page {
    fn from(resp: ListResponse) -> Self {
        Page {
            records: resp.value,
            next: resp
                .next_link
                .filter(|link| !link.is_empty())
                .map(ContinuationToken::new),
            total_count: resp.count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_keeps_extension_attributes() {
        let json = r#"{
            "displayName": "Ada Lovelace",
            "jobTitle": null,
            "id": "u-1",
            "givenName": "Ada",
            "surname": "Lovelace",
            "businessPhones": []
        }"#;
        let record: Record = serde_json::from_str(json).unwrap();
        assert_eq!(record.attribute("displayName"), Some("Ada Lovelace"));
        assert_eq!(record.attribute("jobTitle"), None);
        assert_eq!(record.attribute("givenName"), Some("Ada"));
        assert_eq!(record.attribute("businessPhones"), None);
        assert_eq!(record.attribute("department"), None);
    }

    #[test]
    fn test_list_response_next_link() {
        let json = r#"{
            "@odata.count": 42,
            "value": [{"id": "a"}, {"id": "b"}],
            "@odata.nextLink": "https://graph.example/v1.0/users?$skiptoken=X"
        }"#;
        let page: Page = serde_json::from_str::<ListResponse>(json).unwrap().into();
        assert_eq!(page.records.len(), 2);
        assert_eq!(page.total_count, Some(42));
        assert_eq!(
            page.next.as_ref().map(ContinuationToken::as_str),
            Some("https://graph.example/v1.0/users?$skiptoken=X")
        );
        assert!(!page.is_last());
    }

    #[test]
    fn test_list_response_without_next_is_last() {
        let page: Page = serde_json::from_str::<ListResponse>(r#"{"value": []}"#)
            .unwrap()
            .into();
        assert!(page.is_last());
        assert_eq!(page.total_count, None);
    }

    #[test]
    fn test_project_drops_unselected() {
        let record = Record {
            display_name: Some("Grace".into()),
            department: Some("Navy".into()),
            ..Default::default()
        };
        let projected = record.project(&["department".to_string()]);
        assert_eq!(projected.display_name, None);
        assert_eq!(projected.department.as_deref(), Some("Navy"));
    }
}
