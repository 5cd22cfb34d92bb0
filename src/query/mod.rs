//! Paginated query protocol
//!
//! The engine does not prescribe a wire format. The contract with the
//! remote query layer is only that a request, given a cursor, yields a JSON
//! response in which an ordered record list can be located by walking
//! `data_path`, and a `{has_next_page, end_cursor}` object by walking
//! `page_info_path`. GraphQL connections satisfy this directly; a REST
//! endpoint wrapped to that convention works just as well.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::ExtractError;

/// Declarative description of one paginated remote query
#[derive(Debug, Clone)]
pub struct PagedQuery {
    /// Serialized query/request body, with `{entity_path}`, `{cursor}` and
    /// `{page_size}` placeholders substituted at request time
    pub body: &'static str,
    /// Keys locating the record list within the response
    pub data_path: &'static [&'static str],
    /// Keys locating the page info object within the response
    pub page_info_path: &'static [&'static str],
}

impl PagedQuery {
    /// Render the request body for one extractor call
    ///
    /// Path and cursor are serialized as JSON strings, so arbitrary
    /// characters in either stay inside the intended field. A `None`
    /// cursor renders as JSON `null`, which remote connection endpoints
    /// treat as "first page".
    pub fn render_body(&self, entity_path: &str, cursor: Option<&str>, page_size: u32) -> String {
        let cursor_json = match cursor {
            Some(c) => Value::from(c).to_string(),
            None => "null".to_string(),
        };
        self.body
            .replace("{entity_path}", &Value::from(entity_path).to_string())
            .replace("{cursor}", &cursor_json)
            .replace("{page_size}", &page_size.to_string())
    }

    /// Parse a raw JSON response into a [`Page`]
    ///
    /// A missing path segment or a wrong shape at either path is a schema
    /// violation and therefore fatal, never retried.
    pub fn parse_response(&self, response: &Value) -> Result<Page, ExtractError> {
        let records = walk_path(response, self.data_path)?
            .as_array()
            .ok_or_else(|| {
                ExtractError::fatal(format!(
                    "expected array at data path {:?}",
                    self.data_path
                ))
            })?
            .clone();

        let page_info_value = walk_path(response, self.page_info_path)?;
        let page_info: PageInfo = serde_json::from_value(page_info_value.clone())
            .map_err(|e| {
                ExtractError::fatal(format!(
                    "malformed page info at {:?}: {e}",
                    self.page_info_path
                ))
            })?;

        Ok(Page { records, page_info })
    }
}

/// Descend a JSON value key by key
fn walk_path<'a>(value: &'a Value, path: &[&str]) -> Result<&'a Value, ExtractError> {
    let mut current = value;
    for key in path {
        current = current.get(key).ok_or_else(|| {
            ExtractError::fatal(format!("missing key '{key}' while walking path {path:?}"))
        })?;
    }
    Ok(current)
}

/// Pagination state returned alongside every page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PageInfo {
    pub has_next_page: bool,
    pub end_cursor: Option<String>,
}

impl PageInfo {
    /// Marker for a single-page (or final) response
    pub fn end_of_data() -> Self {
        Self {
            has_next_page: false,
            end_cursor: None,
        }
    }

    /// Continuation marker pointing at the next page
    pub fn next<C: Into<String>>(cursor: C) -> Self {
        Self {
            has_next_page: true,
            end_cursor: Some(cursor.into()),
        }
    }
}

/// One page of raw records plus its pagination state
///
/// An empty record list with `has_next_page == true` is valid and means
/// "keep polling"; only `has_next_page == false` terminates a pipeline.
#[derive(Debug, Clone)]
pub struct Page {
    pub records: Vec<Value>,
    pub page_info: PageInfo,
}

impl Page {
    /// Page that terminates a pipeline with no records
    pub fn empty() -> Self {
        Self {
            records: Vec::new(),
            page_info: PageInfo::end_of_data(),
        }
    }

    /// Whether the extractor has reported end-of-data
    pub fn is_last(&self) -> bool {
        !self.page_info.has_next_page
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const MEMBERS_QUERY: PagedQuery = PagedQuery {
        body: r#"{"query":"members","full_path":{entity_path},"cursor":{cursor},"first":{page_size}}"#,
        data_path: &["data", "group", "members", "nodes"],
        page_info_path: &["data", "group", "members", "pageInfo"],
    };

    #[test]
    fn test_render_body_substitutes_placeholders() {
        let first = MEMBERS_QUERY.render_body("group-a", None, 100);
        assert!(first.contains("\"full_path\":\"group-a\""));
        assert!(first.contains("\"cursor\":null"));
        assert!(first.contains("\"first\":100"));

        let next = MEMBERS_QUERY.render_body("group-a", Some("c1"), 50);
        assert!(next.contains("\"cursor\":\"c1\""));
    }

    #[test]
    fn test_render_body_escapes_special_characters() {
        let body = MEMBERS_QUERY.render_body(
            "group \"a\"",
            Some(r#"c1","admin":true,"x":"y"#),
            100,
        );

        // Hostile content stays inside its own field instead of
        // introducing new top-level keys
        let parsed: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed["full_path"], "group \"a\"");
        assert_eq!(parsed["cursor"], r#"c1","admin":true,"x":"y"#);
        assert_eq!(parsed.get("admin"), None);
    }

    #[test]
    fn test_parse_response_walks_paths() {
        let response = json!({
            "data": {
                "group": {
                    "members": {
                        "nodes": [{"username": "alice"}, {"username": "bob"}],
                        "pageInfo": {"has_next_page": true, "end_cursor": "c1"}
                    }
                }
            }
        });

        let page = MEMBERS_QUERY.parse_response(&response).unwrap();
        assert_eq!(page.records.len(), 2);
        assert_eq!(page.page_info, PageInfo::next("c1"));
        assert!(!page.is_last());
    }

    #[test]
    fn test_missing_path_is_fatal() {
        let response = json!({"data": {"group": {}}});
        let err = MEMBERS_QUERY.parse_response(&response).unwrap_err();
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_wrong_shape_at_data_path_is_fatal() {
        let response = json!({
            "data": {
                "group": {
                    "members": {
                        "nodes": "not-an-array",
                        "pageInfo": {"has_next_page": false, "end_cursor": null}
                    }
                }
            }
        });
        let err = MEMBERS_QUERY.parse_response(&response).unwrap_err();
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_empty_page_with_next_cursor_keeps_polling() {
        let page = Page {
            records: Vec::new(),
            page_info: PageInfo::next("c2"),
        };
        assert!(!page.is_last());

        let done = Page::empty();
        assert!(done.is_last());
    }
}
