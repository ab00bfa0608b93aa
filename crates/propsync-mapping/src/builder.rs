use propsync_core::{ImageRefs, MetaKey, MetaValue, NormalizedRecord, PostFields, Taxonomy};

/// Accumulator threaded through the field mappers for one record.
#[derive(Debug, Clone, Default)]
pub struct RecordBuilder {
    record: NormalizedRecord,
}

impl RecordBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn post(&self) -> &PostFields {
        &self.record.post
    }

    pub fn post_mut(&mut self) -> &mut PostFields {
        &mut self.record.post
    }

    pub fn set_meta(&mut self, key: MetaKey, value: impl Into<MetaValue>) {
        self.record.metadata.insert(key, value.into());
    }

    pub fn meta(&self, key: MetaKey) -> Option<&MetaValue> {
        self.record.metadata.get(&key)
    }

    pub fn meta_text(&self, key: MetaKey) -> Option<&str> {
        self.meta(key).and_then(MetaValue::as_text)
    }

    /// Append a term unless it is blank or already present. Returns whether it was added.
    pub fn add_term(&mut self, taxonomy: Taxonomy, term: impl Into<String>) -> bool {
        let term = term.into();
        let term = term.trim();
        if term.is_empty() {
            return false;
        }
        let terms = self.record.taxonomy_terms.entry(taxonomy).or_default();
        if terms.iter().any(|t| t == term) {
            return false;
        }
        terms.push(term.to_string());
        true
    }

    /// Replace all terms of a single-valued taxonomy.
    pub fn set_term(&mut self, taxonomy: Taxonomy, term: impl Into<String>) {
        self.record.taxonomy_terms.remove(&taxonomy);
        self.add_term(taxonomy, term);
    }

    pub fn terms(&self, taxonomy: Taxonomy) -> &[String] {
        self.record.terms(taxonomy)
    }

    pub fn set_images(&mut self, images: ImageRefs) {
        self.record.images = images;
    }

    pub fn finish(mut self) -> NormalizedRecord {
        self.record.taxonomy_terms.retain(|_, terms| !terms.is_empty());
        self.record
    }
}
