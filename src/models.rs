//! Data carried through the harvest pipeline
//!
//! `Category`, `ThreadRef` and `RawThread` only live for one run. `Record`
//! is the durable unit written by the record store.

use serde::{Deserialize, Serialize};

/// A top-level forum section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub name: String,
    /// Absolute URL of the first listing page
    pub url: String,
}

/// A thread link found on a listing page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadRef {
    /// Stable id derived from the thread URL, used as the dedup key
    pub id: String,
    pub url: String,
}

/// A freshly fetched thread page, not yet parsed
#[derive(Debug, Clone)]
pub struct RawThread {
    pub id: String,
    pub url: String,
    pub html: String,
    /// Name of the category the thread was found in
    pub category: String,
}

/// A harvested thread record
///
/// `id` always equals the `ThreadRef::id` of the thread it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub title: String,
    pub site_url: String,
    pub page_url: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub categories: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_json_field_names() {
        let record = Record {
            id: "10".to_string(),
            title: "Hello".to_string(),
            site_url: "https://forum.example.com/".to_string(),
            page_url: "https://forum.example.com/threads/hello.10/".to_string(),
            content: Some("Body".to_string()),
            published_at: None,
            categories: vec!["general".to_string()],
        };

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["id"], "10");
        assert_eq!(value["page_url"], "https://forum.example.com/threads/hello.10/");
        assert!(value["published_at"].is_null());
        assert_eq!(value["categories"][0], "general");
    }

    #[test]
    fn test_record_tolerates_missing_optional_fields() {
        let json = r#"{"id":"7","title":"T","site_url":"s","page_url":"p"}"#;
        let record: Record = serde_json::from_str(json).unwrap();
        assert_eq!(record.content, None);
        assert!(record.categories.is_empty());
    }
}
