use propsync_core::{json_scalar_text, DictionaryCategory, DictionaryTable};
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::sanitize::sanitize_text;

/// Labels meaning "unspecified" in the feed's dictionaries (Polish and English).
pub const UNSPECIFIED_SENTINELS: [&str; 2] = ["dowolny", "any"];

pub fn is_unspecified(label: &str) -> bool {
    let label = label.trim();
    UNSPECIFIED_SENTINELS
        .iter()
        .any(|sentinel| label.eq_ignore_ascii_case(sentinel))
}

/// Empty labels and the literal `"0"` carry no information.
pub fn is_blank_label(label: &str) -> bool {
    label.is_empty() || label == "0"
}

/// Read-only view over a [`DictionaryTable`]. Lookups never fail; a miss yields the default.
#[derive(Debug, Clone, Copy)]
pub struct DictionaryResolver<'a> {
    table: &'a DictionaryTable,
}

impl<'a> DictionaryResolver<'a> {
    pub fn new(table: &'a DictionaryTable) -> Self {
        Self { table }
    }

    pub fn resolve(&self, category: DictionaryCategory, code: Option<&JsonValue>, default: &str) -> String {
        match code.and_then(json_scalar_text) {
            Some(code) => self.resolve_code(category, &code, default),
            None => default.to_string(),
        }
    }

    pub fn resolve_code(&self, category: DictionaryCategory, code: &str, default: &str) -> String {
        let code = code.trim();
        if code.is_empty() {
            return default.to_string();
        }
        match self.table.lookup(category, code) {
            Some(label) => sanitize_text(label),
            None => {
                debug!(%category, code, "dictionary miss");
                default.to_string()
            }
        }
    }

    /// Resolved label, unless it is blank or an "unspecified" sentinel.
    pub fn resolve_specified(&self, category: DictionaryCategory, code: Option<&JsonValue>) -> Option<String> {
        let label = self.resolve(category, code, "");
        (!is_blank_label(&label) && !is_unspecified(&label)).then_some(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn table() -> DictionaryTable {
        DictionaryTable::new()
            .with_entry(DictionaryCategory::Currency, "1", "€")
            .with_entry(DictionaryCategory::Market, "0", "Secondary")
            .with_entry(DictionaryCategory::Market, "3", "Dowolny")
            .with_entry(DictionaryCategory::Types, "2", "<b>Flat</b>")
    }

    #[test]
    fn missing_codes_fall_back_to_the_default() {
        let table = table();
        let resolver = DictionaryResolver::new(&table);
        assert_eq!(resolver.resolve(DictionaryCategory::Currency, Some(&json!(9)), "X"), "X");
        assert_eq!(resolver.resolve(DictionaryCategory::Heating, Some(&json!(1)), "X"), "X");
        assert_eq!(resolver.resolve(DictionaryCategory::Currency, None, "X"), "X");
        assert_eq!(resolver.resolve(DictionaryCategory::Currency, Some(&json!("")), "X"), "X");
        assert_eq!(resolver.resolve(DictionaryCategory::Currency, Some(&json!(null)), ""), "");
    }

    #[test]
    fn numeric_and_string_codes_resolve_alike() {
        let table = table();
        let resolver = DictionaryResolver::new(&table);
        assert_eq!(resolver.resolve(DictionaryCategory::Currency, Some(&json!(1)), ""), "€");
        assert_eq!(resolver.resolve(DictionaryCategory::Currency, Some(&json!("1")), ""), "€");
        assert_eq!(resolver.resolve(DictionaryCategory::Market, Some(&json!(0)), ""), "Secondary");
    }

    #[test]
    fn labels_are_sanitized() {
        let table = table();
        let resolver = DictionaryResolver::new(&table);
        assert_eq!(resolver.resolve(DictionaryCategory::Types, Some(&json!(2)), ""), "Flat");
    }

    #[test]
    fn sentinels_are_rejected_case_insensitively() {
        let table = table();
        let resolver = DictionaryResolver::new(&table);
        assert_eq!(resolver.resolve_specified(DictionaryCategory::Market, Some(&json!(3))), None);
        assert!(is_unspecified("ANY"));
        assert!(is_unspecified(" dowolny "));
        assert!(!is_unspecified("Anywhere"));
    }
}
