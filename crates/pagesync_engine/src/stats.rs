//! Page-local statistics and reference data filtering.
//!
//! Everything here is computed over the records of the **current page**
//! only. Collection-wide totals come from the server.

use pagesync_protocol::{Lead, Resource};

/// Lead classification counts of one page of inquiries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LeadSummary {
    /// Red leads.
    pub red: usize,
    /// Green leads.
    pub green: usize,
    /// Orange leads.
    pub orange: usize,
    /// Inquiries with an audio recording.
    pub with_audio: usize,
}

impl LeadSummary {
    /// Counts the leads of a page.
    pub fn from_items(items: &[Resource]) -> Self {
        items.iter().fold(Self::default(), |mut summary, item| {
            match item.lead() {
                Some(Lead::Red) => summary.red += 1,
                Some(Lead::Green) => summary.green += 1,
                Some(Lead::Orange) => summary.orange += 1,
                None => {}
            }
            if item.has_audio() {
                summary.with_audio += 1;
            }
            summary
        })
    }

    /// Number of classified inquiries.
    pub fn classified(&self) -> usize {
        self.red + self.green + self.orange
    }
}

/// Filters loaded reference records (areas) by a search term.
///
/// Inactive records are always excluded. A blank term keeps every active
/// record; otherwise the term must appear, ignoring case, in the `name`,
/// `city` or `state` field.
pub fn filter_reference<'a>(items: &'a [Resource], term: &str) -> Vec<&'a Resource> {
    let needle = term.trim().to_lowercase();
    items
        .iter()
        .filter(|item| item.is_active())
        .filter(|item| {
            needle.is_empty()
                || ["name", "city", "state"].iter().any(|field| {
                    item.text(field)
                        .is_some_and(|value| value.to_lowercase().contains(&needle))
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: serde_json::Value) -> Resource {
        Resource::from_value(value).unwrap()
    }

    #[test]
    fn lead_summary_counts_page() {
        let items = vec![
            record(json!({"_id": "1", "lead": "Red", "audio": {"key": "a.mp3"}})),
            record(json!({"_id": "2", "lead": "Green"})),
            record(json!({"_id": "3", "lead": "Red", "audio": {"key": null}})),
            record(json!({"_id": "4"})),
        ];
        let summary = LeadSummary::from_items(&items);
        assert_eq!(
            summary,
            LeadSummary {
                red: 2,
                green: 1,
                orange: 0,
                with_audio: 1
            }
        );
        assert_eq!(summary.classified(), 3);
    }

    #[test]
    fn reference_filter() {
        let areas = vec![
            record(json!({"_id": "a1", "name": "Downtown", "city": "Pune", "state": "MH"})),
            record(json!({"_id": "a2", "name": "Harbor", "city": "Mumbai", "state": "MH"})),
            record(json!({"_id": "a3", "name": "Old Town", "city": "Pune", "isActive": false})),
        ];

        let ids = |found: Vec<&Resource>| -> Vec<String> {
            found.iter().map(|r| r.id().to_string()).collect()
        };
        assert_eq!(ids(filter_reference(&areas, "")), ["a1", "a2"]);
        assert_eq!(ids(filter_reference(&areas, "pune")), ["a1"]);
        assert_eq!(ids(filter_reference(&areas, " HARB ")), ["a2"]);
        assert_eq!(ids(filter_reference(&areas, "mh")), ["a1", "a2"]);
        assert!(filter_reference(&areas, "delhi").is_empty());
    }
}
