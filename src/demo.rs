//! Generated directory for offline use.
//!
//! `gdir demo` and `gdir serve --demo` page through an [`InMemorySource`]
//! filled by [`generate_directory`] instead of calling Microsoft Graph.
//! The data is deterministic: the same size always yields the same users.

use graph_directory_core::{InMemorySource, Record};
use serde_json::json;

const GIVEN_NAMES: [&str; 12] = [
    "Ada", "Alan", "Grace", "John", "Johanna", "Katherine", "Linus", "Margaret", "Niklaus",
    "Barbara", "Edsger", "Frances",
];
const SURNAMES: [&str; 10] = [
    "Lovelace", "Turing", "Hopper", "Smith", "Smithson", "Johnson", "Torvalds", "Hamilton",
    "Wirth", "Liskov",
];
const JOB_TITLES: [&str; 5] = [
    "Engineer",
    "Senior Engineer",
    "Product Manager",
    "Designer",
    "Support Specialist",
];
const DEPARTMENTS: [&str; 6] = ["Engineering", "Sales", "Marketing", "R&D", "Legal", "Operations"];
const OFFICES: [&str; 4] = ["Berlin", "Lima", "Oslo", "O'Fallon"];

/// Generate `size` users with varied names and attributes.
///
/// Every seventh user has no office and every eleventh no job title, so
/// facets and filters see unset values.
pub fn generate_directory(size: usize) -> Vec<Record> {
    (0..size)
        .map(|i| {
            let given = GIVEN_NAMES[i % GIVEN_NAMES.len()];
            let surname = SURNAMES[(i / GIVEN_NAMES.len() + i) % SURNAMES.len()];
            let login = format!("{}.{}{}", given, surname, i).to_lowercase();
            let mut record = Record {
                id: Some(format!("00000000-0000-0000-0000-{:012}", i)),
                display_name: Some(format!("{} {}", given, surname)),
                job_title: (i % 11 != 0).then(|| JOB_TITLES[i % JOB_TITLES.len()].to_string()),
                mail: Some(format!("{}@contoso.example", login)),
                user_principal_name: Some(format!("{}@contoso.example", login)),
                department: Some(DEPARTMENTS[(i * 5) % DEPARTMENTS.len()].to_string()),
                office_location: (i % 7 != 0).then(|| OFFICES[i % OFFICES.len()].to_string()),
                mobile_phone: Some(format!("+1 555 01{:02}", i % 100)),
                ..Default::default()
            };
            record.extra.insert("givenName".to_string(), json!(given));
            record.extra.insert("surname".to_string(), json!(surname));
            record
        })
        .collect()
}

/// An in-memory source over a generated directory.
pub fn demo_source(size: usize) -> InMemorySource {
    InMemorySource::new(generate_directory(size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use graph_directory_core::facets::collect_facet;
    use graph_directory_core::FilterAttribute;

    #[test]
    fn test_generation_is_deterministic() {
        assert_eq!(generate_directory(40), generate_directory(40));
        assert_eq!(generate_directory(0).len(), 0);
    }

    #[test]
    fn test_every_user_is_searchable_by_name() {
        for record in generate_directory(30) {
            assert!(record.attribute("givenName").is_some());
            assert!(record.attribute("surname").is_some());
            assert!(record.id.is_some());
        }
    }

    #[tokio::test]
    async fn test_demo_facets_include_awkward_literals() {
        let source = demo_source(60);
        let offices = collect_facet(&source, FilterAttribute::OfficeLocation, 25).await;
        assert!(offices.complete);
        assert!(offices.values.contains(&"O'Fallon".to_string()));
        let departments = collect_facet(&source, FilterAttribute::Department, 25).await;
        assert!(departments.values.contains(&"R&D".to_string()));
        assert_eq!(departments.values.len(), DEPARTMENTS.len());
    }
}
