// Document codec - JSON validation, object parsing, canonical field text

use crate::error::{FolderDbError, Result};
use serde_json::{Map, Value};
use std::borrow::Cow;

/// A parsed top-level JSON object, field order preserved.
pub type DocumentObject = Map<String, Value>;

/// Check that `text` is a single well-formed JSON value.
pub fn validate_json(text: &str) -> Result<()> {
    if text.trim().is_empty() {
        return Err(FolderDbError::InvalidContent(
            "request body must not be empty".into(),
        ));
    }
    serde_json::from_str::<serde::de::IgnoredAny>(text)
        .map(|_| ())
        .map_err(|e| FolderDbError::InvalidContent(format!("not valid JSON ({e})")))
}

/// Parse `text` as a JSON object. Returns `None` for malformed JSON and for any
/// top-level value that is not an object.
pub fn parse_object(text: &str) -> Option<DocumentObject> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Byte-level variant of [`parse_object`] used by directory scans.
pub fn parse_object_bytes(bytes: &[u8]) -> Option<DocumentObject> {
    match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// The textual form of a value used for filter comparisons.
///
/// Strings are returned without quotes, numbers exactly as written in the
/// source text, `null` becomes the empty string, and arrays/objects are
/// rendered as compact JSON.
pub fn canonical_string(value: &Value) -> Cow<'_, str> {
    match value {
        Value::String(s) => Cow::Borrowed(s.as_str()),
        Value::Null => Cow::Borrowed(""),
        Value::Bool(true) => Cow::Borrowed("true"),
        Value::Bool(false) => Cow::Borrowed("false"),
        Value::Number(n) => Cow::Owned(n.to_string()),
        Value::Array(_) | Value::Object(_) => Cow::Owned(value.to_string()),
    }
}

/// Outcome of a best-effort scan over a collection.
#[derive(Debug, Default, Clone)]
pub struct ScanReport {
    /// Object documents that were kept, in enumeration order.
    pub documents: Vec<Value>,
    /// Files that could not be read or did not hold a JSON object.
    pub skipped: usize,
}

impl ScanReport {
    /// Fold one file's read result into the report.
    pub fn push(&mut self, read: std::io::Result<Vec<u8>>, keep: impl FnOnce(&DocumentObject) -> bool) {
        let object = match read {
            Ok(bytes) => parse_object_bytes(&bytes),
            Err(e) => {
                log::debug!("Skipping unreadable document: {e}");
                None
            }
        };

        match object {
            Some(object) => {
                if keep(&object) {
                    self.documents.push(Value::Object(object));
                }
            }
            None => self.skipped += 1,
        }
    }

    /// The kept documents as a JSON array.
    pub fn into_value(self) -> Value {
        Value::Array(self.documents)
    }
}
