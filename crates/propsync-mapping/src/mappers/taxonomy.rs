use propsync_core::{feed_codes, DictionaryCategory, MetaKey, RawRecord, Taxonomy};

use super::details::FEATURED_YES;
use super::{FieldMapper, MappingContext};
use crate::builder::RecordBuilder;
use crate::dictionary::{is_blank_label, is_unspecified};
use crate::sanitize::{as_int, as_text};

pub const FEATURED_LABEL: &str = "Featured";

const LOCATION_TAXONOMIES: [(&str, Taxonomy); 4] = [
    ("locationCityName", Taxonomy::City),
    ("locationPrecinctName", Taxonomy::Area),
    ("locationProvinceName", Taxonomy::State),
    ("locationCountryName", Taxonomy::Country),
];

const LABEL_FLAGS: [(&str, i64, &str); 3] = [
    ("labelNew", feed_codes::LABEL_NEW, "New"),
    ("labelSold", feed_codes::LABEL_SOLD, "Sold"),
    ("labelReserved", feed_codes::LABEL_RESERVED, "Reserved"),
];

pub fn transaction_status(code: i64) -> Option<&'static str> {
    match code {
        feed_codes::TRANSACTION_SALE => Some("For Sale"),
        feed_codes::TRANSACTION_RENT => Some("For Rent"),
        _ => None,
    }
}

/// Type, location, status and label terms. Runs after the identifier mapper
/// so the featured flag is already known.
#[derive(Debug, Default, Clone, Copy)]
pub struct TaxonomyMapper;

impl TaxonomyMapper {
    fn property_type(raw: &RawRecord, ctx: &MappingContext<'_>) -> Option<String> {
        let from_dictionary = raw
            .is_set("mainTypeId")
            .then(|| ctx.dictionary.resolve(DictionaryCategory::Types, raw.get("mainTypeId"), ""))
            .filter(|label| !label.is_empty());
        let label = from_dictionary
            .or_else(|| raw.non_empty("typeName").map(as_text))
            .filter(|label| !is_blank_label(label))?;
        (!is_unspecified(&label)).then_some(label)
    }

    fn labels(raw: &RawRecord, ctx: &MappingContext<'_>, out: &mut RecordBuilder) {
        for (field, code, label) in LABEL_FLAGS {
            if raw.get(field).map(as_int) == Some(code) {
                out.add_term(Taxonomy::Label, label);
            }
        }

        if raw.is_set("market") {
            if let Some(market) = ctx
                .dictionary
                .resolve_specified(DictionaryCategory::Market, raw.get("market"))
            {
                out.add_term(Taxonomy::Label, market);
            }
        }

        if out.meta_text(MetaKey::Featured) == Some(FEATURED_YES) {
            out.add_term(Taxonomy::Label, FEATURED_LABEL);
        }
    }
}

impl FieldMapper for TaxonomyMapper {
    fn name(&self) -> &'static str {
        "taxonomy"
    }

    fn map(&self, raw: &RawRecord, ctx: &MappingContext<'_>, out: &mut RecordBuilder) {
        if let Some(property_type) = Self::property_type(raw, ctx) {
            out.set_term(Taxonomy::PropertyType, property_type);
        }

        for (field, taxonomy) in LOCATION_TAXONOMIES {
            let value = raw.non_empty(field).map(as_text).unwrap_or_default();
            if value.is_empty() {
                continue;
            }
            if taxonomy == Taxonomy::Country {
                out.set_meta(MetaKey::Country, value.clone());
            }
            out.set_term(taxonomy, value);
        }

        if let Some(status) = raw.get("transaction").map(as_int).and_then(transaction_status) {
            out.set_term(Taxonomy::Status, status);
        }

        Self::labels(raw, ctx, out);
    }
}
