//! Reading the listing feed and the dictionary resource from disk.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use propsync_core::{json_scalar_text, DictionaryCategory, DictionaryTable, RawRecord};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DictionaryError {
    #[error("dictionary document is not marked successful")]
    Unsuccessful,
    #[error("dictionary document has no `data` collection")]
    MissingData,
}

fn read_json_value(path: &Path) -> Result<JsonValue> {
    let data = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("parsing {}", path.display()))
}

/// Feed items from either `{"data": [...]}` or a bare array. Entries that are not
/// JSON objects are kept as `None` so the caller can report them.
pub fn parse_feed(document: JsonValue) -> Result<Vec<Option<RawRecord>>> {
    let items = match document {
        JsonValue::Array(items) => items,
        JsonValue::Object(mut map) => match map.remove("data") {
            Some(JsonValue::Array(items)) => items,
            Some(_) => bail!("feed `data` is not an array"),
            None => bail!("feed document has no `data` array"),
        },
        _ => bail!("feed document must be an object or an array"),
    };
    Ok(items.into_iter().map(RawRecord::from_value).collect())
}

pub fn load_feed(path: impl AsRef<Path>) -> Result<Vec<Option<RawRecord>>> {
    let path = path.as_ref();
    let records = parse_feed(read_json_value(path)?)
        .with_context(|| format!("reading feed items from {}", path.display()))?;
    debug!(path = %path.display(), count = records.len(), "loaded feed");
    Ok(records)
}

fn insert_category(table: &mut DictionaryTable, category: DictionaryCategory, entries: &JsonValue) {
    match entries {
        JsonValue::Object(map) => {
            for (code, label) in map {
                if let Some(label) = json_scalar_text(label) {
                    table.insert(category, code.as_str(), label);
                }
            }
        }
        JsonValue::Array(items) => {
            for (index, label) in items.iter().enumerate() {
                if let Some(label) = json_scalar_text(label) {
                    table.insert(category, index.to_string(), label);
                }
            }
        }
        _ => debug!(%category, "dictionary category is not a collection"),
    }
}

/// Accepts `{"success": true, "data": {category: {code: label}}}`. Unknown categories are skipped.
pub fn parse_dictionary(document: &JsonValue) -> Result<DictionaryTable, DictionaryError> {
    if document.get("success") != Some(&JsonValue::Bool(true)) {
        return Err(DictionaryError::Unsuccessful);
    }
    let mut table = DictionaryTable::new();
    match document.get("data") {
        Some(JsonValue::Object(categories)) => {
            for (name, entries) in categories {
                match DictionaryCategory::from_name(name) {
                    Some(category) => insert_category(&mut table, category, entries),
                    None => debug!(category = %name, "skipping unknown dictionary category"),
                }
            }
        }
        // A positional `data` array carries no category names.
        Some(JsonValue::Array(_)) => {}
        _ => return Err(DictionaryError::MissingData),
    }
    Ok(table)
}

/// A missing, empty or rejected dictionary yields an empty table so mapping still runs
/// with every coded field falling back to its default. Unreadable or malformed JSON is an error.
pub fn load_dictionary(path: impl AsRef<Path>) -> Result<DictionaryTable> {
    let path = path.as_ref();
    if !path.exists() {
        warn!(path = %path.display(), "dictionary file not found, using an empty dictionary");
        return Ok(DictionaryTable::new());
    }
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    if raw.trim().is_empty() {
        warn!(path = %path.display(), "dictionary file is empty, using an empty dictionary");
        return Ok(DictionaryTable::new());
    }
    let document: JsonValue =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
    match parse_dictionary(&document) {
        Ok(table) => Ok(table),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "using an empty dictionary");
            Ok(DictionaryTable::new())
        }
    }
}
