//! Example catalog: the `{"items": [...]}` document of message/reply pairs
//! that the similarity index is built from.
//!
//! Reading is strict and returns a [`CatalogError`]; [`load`] is the
//! fail-soft entry point that turns any structural problem into an empty
//! catalog so a bad document never takes the service down.

use serde::Serialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::TEXT_SEPARATOR;
use crate::error::CatalogError;

/// One example. Only `message` and `reply` are interpreted; every other
/// field is carried through to search results untouched.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CatalogItem(Map<String, Value>);

impl CatalogItem {
    pub fn message(&self) -> Option<&str> {
        self.0.get("message").and_then(Value::as_str)
    }

    pub fn reply(&self) -> Option<&str> {
        self.0.get("reply").and_then(Value::as_str)
    }

    /// Text fed to the embedder: message and reply joined by a newline,
    /// with a missing or non-string part read as empty.
    pub fn embedding_text(&self) -> String {
        let message = self.message().unwrap_or_default();
        let reply = self.reply().unwrap_or_default();
        let mut text = String::with_capacity(message.len() + TEXT_SEPARATOR.len() + reply.len());
        text.push_str(message);
        text.push_str(TEXT_SEPARATOR);
        text.push_str(reply);
        text
    }
}

impl From<Map<String, Value>> for CatalogItem {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

/// Somewhere a catalog can be read from.
pub trait CatalogSource: Send + Sync {
    /// Human-readable location, used in logs.
    fn describe(&self) -> String;

    fn read(&self) -> Result<Vec<CatalogItem>, CatalogError>;
}

/// Catalog stored as a JSON file on disk.
pub struct JsonFileCatalog {
    path: PathBuf,
}

impl JsonFileCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CatalogSource for JsonFileCatalog {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn read(&self) -> Result<Vec<CatalogItem>, CatalogError> {
        let raw = std::fs::read_to_string(&self.path).map_err(|source| CatalogError::Io {
            path: self.describe(),
            source,
        })?;
        parse_catalog(&raw)
    }
}

/// Parse a catalog document. A missing or null `items` field is an empty
/// catalog; any other non-array `items`, a non-object top level, or a
/// non-object element is a shape error.
pub fn parse_catalog(raw: &str) -> Result<Vec<CatalogItem>, CatalogError> {
    let document: Value = serde_json::from_str(raw)?;
    let Value::Object(mut root) = document else {
        return Err(CatalogError::Shape("top-level value is not an object".into()));
    };

    let items = match root.remove("items") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(_) => return Err(CatalogError::Shape("`items` is not an array".into())),
    };

    items
        .into_iter()
        .enumerate()
        .map(|(position, item)| match item {
            Value::Object(fields) => Ok(CatalogItem(fields)),
            _ => Err(CatalogError::Shape(format!("item {} is not an object", position))),
        })
        .collect()
}

/// Read the catalog, degrading to an empty one on any error.
pub fn load(source: &dyn CatalogSource) -> Vec<CatalogItem> {
    match source.read() {
        Ok(items) => {
            info!(source = %source.describe(), count = items.len(), "Catalog loaded");
            items
        }
        Err(e) => {
            warn!(source = %source.describe(), error = %e, "Catalog unusable, continuing with no examples");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn item(value: Value) -> CatalogItem {
        match value {
            Value::Object(fields) => CatalogItem::from(fields),
            other => panic!("not an object: {other}"),
        }
    }

    fn write_catalog(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_embedding_text_joins_message_and_reply() {
        let it = item(json!({"message": "hello", "reply": "hi there"}));
        assert_eq!(it.embedding_text(), "hello\nhi there");
    }

    #[test]
    fn test_embedding_text_missing_parts_are_empty() {
        assert_eq!(item(json!({"reply": "ok"})).embedding_text(), "\nok");
        assert_eq!(item(json!({"message": "hey"})).embedding_text(), "hey\n");
        assert_eq!(item(json!({})).embedding_text(), "\n");
        assert_eq!(item(json!({"message": null, "reply": 7})).embedding_text(), "\n");
    }

    #[test]
    fn test_parse_keeps_order_and_extra_fields() {
        let items = parse_catalog(
            r#"{"items": [
                {"id": 1, "ts": "2024-01-01", "message": "a", "reply": "b"},
                {"message": "c", "reply": "d", "tags": ["x"]}
            ]}"#,
        )
        .unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].message(), Some("a"));
        assert_eq!(items[1].reply(), Some("d"));

        let round = serde_json::to_value(&items[0]).unwrap();
        assert_eq!(round, json!({"id": 1, "ts": "2024-01-01", "message": "a", "reply": "b"}));
    }

    #[test]
    fn test_parse_missing_items_is_empty() {
        assert!(parse_catalog(r#"{"other": 1}"#).unwrap().is_empty());
        assert!(parse_catalog(r#"{"items": null}"#).unwrap().is_empty());
        assert!(parse_catalog(r#"{"items": []}"#).unwrap().is_empty());
    }

    #[test]
    fn test_parse_rejects_wrong_shapes() {
        assert!(matches!(parse_catalog("[1, 2]"), Err(CatalogError::Shape(_))));
        assert!(matches!(parse_catalog(r#"{"items": {"a": 1}}"#), Err(CatalogError::Shape(_))));
        assert!(matches!(parse_catalog(r#"{"items": [{"message": "a"}, "b"]}"#), Err(CatalogError::Shape(_))));
        assert!(matches!(parse_catalog("{not json"), Err(CatalogError::Malformed(_))));
    }

    #[test]
    fn test_load_reads_file() {
        let file = write_catalog(r#"{"items": [{"message": "hello", "reply": "hi there"}]}"#);
        let items = load(&JsonFileCatalog::new(file.path()));
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].message(), Some("hello"));
    }

    #[test]
    fn test_load_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let missing = JsonFileCatalog::new(dir.path().join("nope.json"));
        assert!(matches!(missing.read(), Err(CatalogError::Io { .. })));
        assert!(load(&missing).is_empty());

        let garbage = write_catalog("this is not json");
        assert!(load(&JsonFileCatalog::new(garbage.path())).is_empty());

        let wrong_shape = write_catalog(r#"["message", "reply"]"#);
        assert!(load(&JsonFileCatalog::new(wrong_shape.path())).is_empty());
    }
}
