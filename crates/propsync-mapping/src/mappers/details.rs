use propsync_core::{feed_codes, DictionaryCategory, MetaKey, MetaValue, RawRecord};

use super::{FieldMapper, MappingContext, AREA_UNIT};
use crate::builder::RecordBuilder;
use crate::sanitize::{as_float, as_int, as_price_string, as_text};

pub const FEATURED_YES: &str = "1";
pub const FEATURED_NO: &str = "0";

/// `jsonId`, display number, slider default and the featured flag.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentifierMapper;

impl IdentifierMapper {
    /// Stored form of a source id. Only canonical integers become `Int`, so the
    /// text form always equals the trimmed source id.
    pub fn json_id_value(source_id: &str) -> MetaValue {
        let id = source_id.trim();
        match id.parse::<i64>() {
            Ok(numeric) if numeric.to_string() == id => MetaValue::Int(numeric),
            _ => MetaValue::Text(id.to_string()),
        }
    }
}

impl FieldMapper for IdentifierMapper {
    fn name(&self) -> &'static str {
        "identifiers"
    }

    fn map(&self, raw: &RawRecord, _ctx: &MappingContext<'_>, out: &mut RecordBuilder) {
        if let Some(id) = raw.source_id() {
            out.set_meta(MetaKey::JsonId, Self::json_id_value(&id));
        }

        let number = raw
            .get("number")
            .or_else(|| raw.get("id"))
            .map(as_text)
            .unwrap_or_default();
        if !number.is_empty() {
            out.set_meta(MetaKey::PropertyId, number);
        }

        out.set_meta(MetaKey::Homeslider, "no");

        let featured = raw
            .get("isFeatured")
            .or_else(|| raw.get("labelNew"))
            .map(as_int)
            .unwrap_or(0);
        let flag = if featured == feed_codes::LABEL_NEW {
            FEATURED_YES
        } else {
            FEATURED_NO
        };
        out.set_meta(MetaKey::Featured, flag);
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PriceMapper;

impl FieldMapper for PriceMapper {
    fn name(&self) -> &'static str {
        "price"
    }

    fn map(&self, raw: &RawRecord, ctx: &MappingContext<'_>, out: &mut RecordBuilder) {
        if let Some(price) = raw.get("price").map(as_price_string) {
            if !price.is_empty() {
                out.set_meta(MetaKey::Price, price);
            }
        }

        if raw.is_set("priceCurrency") {
            let symbol = ctx.dictionary.resolve(
                DictionaryCategory::Currency,
                raw.get("priceCurrency"),
                "",
            );
            if !symbol.is_empty() {
                out.set_meta(MetaKey::Currency, symbol.clone());
                out.set_meta(MetaKey::PricePrefix, symbol);
            }
        }

        if let Some(per_meter) = raw.get("pricePermeter") {
            if as_float(per_meter) > 0.0 {
                out.set_meta(MetaKey::SecondPrice, as_price_string(per_meter));
                out.set_meta(MetaKey::PricePostfix, AREA_UNIT);
            }
        }
    }
}

/// Total and plot area, kept in their original textual form.
#[derive(Debug, Default, Clone, Copy)]
pub struct SizeMapper;

impl FieldMapper for SizeMapper {
    fn name(&self) -> &'static str {
        "size"
    }

    fn map(&self, raw: &RawRecord, _ctx: &MappingContext<'_>, out: &mut RecordBuilder) {
        let areas = [
            ("areaTotal", MetaKey::Size, MetaKey::SizePrefix),
            ("areaPlot", MetaKey::LandArea, MetaKey::LandAreaPostfix),
        ];
        for (field, value_key, unit_key) in areas {
            let Some(value) = raw.get(field) else {
                continue;
            };
            if as_float(value) > 0.0 {
                out.set_meta(value_key, as_text(value));
                out.set_meta(unit_key, AREA_UNIT);
            }
        }
    }
}

const ROOM_COUNT_FIELDS: [(&str, MetaKey); 4] = [
    ("apartmentRoomNumber", MetaKey::Rooms),
    ("apartmentBedroomNumber", MetaKey::Bedrooms),
    ("apartmentBathroomNumber", MetaKey::Bathrooms),
    ("apartmentToiletNumber", MetaKey::Restrooms),
];

#[derive(Debug, Default, Clone, Copy)]
pub struct RoomCountMapper;

impl FieldMapper for RoomCountMapper {
    fn name(&self) -> &'static str {
        "room_counts"
    }

    fn map(&self, raw: &RawRecord, _ctx: &MappingContext<'_>, out: &mut RecordBuilder) {
        for (field, key) in ROOM_COUNT_FIELDS {
            if let Some(count) = raw.get(field).map(as_int) {
                if count >= 0 {
                    out.set_meta(key, count);
                }
            }
        }
    }
}

const BUILDING_FIELDS: [(&str, MetaKey); 3] = [
    ("buildingYear", MetaKey::YearBuilt),
    ("apartmentFloor", MetaKey::FloorNo),
    ("buildingFloornumber", MetaKey::TotalFloors),
];

#[derive(Debug, Default, Clone, Copy)]
pub struct BuildingMapper;

impl FieldMapper for BuildingMapper {
    fn name(&self) -> &'static str {
        "building"
    }

    fn map(&self, raw: &RawRecord, _ctx: &MappingContext<'_>, out: &mut RecordBuilder) {
        for (field, key) in BUILDING_FIELDS {
            if let Some(value) = raw.get(field).map(as_int) {
                if value > 0 {
                    out.set_meta(key, value);
                }
            }
        }
    }
}

/// Explicit garage count, else one space implied by underground parking.
#[derive(Debug, Default, Clone, Copy)]
pub struct GarageMapper;

impl GarageMapper {
    pub fn garage_count(raw: &RawRecord) -> i64 {
        let explicit = raw.get("additionalGarage").map(as_int).unwrap_or(0);
        if explicit > 0 {
            return explicit;
        }
        match raw.get("additionalParkingunderground").map(as_int) {
            Some(1) => 1,
            _ => 0,
        }
    }
}

impl FieldMapper for GarageMapper {
    fn name(&self) -> &'static str {
        "garage"
    }

    fn map(&self, raw: &RawRecord, _ctx: &MappingContext<'_>, out: &mut RecordBuilder) {
        let count = Self::garage_count(raw);
        if count > 0 {
            out.set_meta(MetaKey::Garage, count.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MapperConfig;
    use crate::dictionary::DictionaryResolver;
    use propsync_core::DictionaryTable;
    use serde_json::json;

    fn run(mapper: &dyn FieldMapper, raw: serde_json::Value) -> RecordBuilder {
        let table = DictionaryTable::new().with_entry(DictionaryCategory::Currency, "1", "zł");
        let config = MapperConfig::default();
        let ctx = MappingContext {
            dictionary: DictionaryResolver::new(&table),
            config: &config,
        };
        let raw = RawRecord::from_value(raw).expect("object");
        let mut out = RecordBuilder::new();
        mapper.map(&raw, &ctx, &mut out);
        out
    }

    #[test]
    fn numeric_ids_are_stored_as_integers() {
        let out = run(&IdentifierMapper, json!({"id": "42", "number": "AB-1"}));
        assert_eq!(out.meta(MetaKey::JsonId), Some(&MetaValue::Int(42)));
        assert_eq!(out.meta_text(MetaKey::PropertyId), Some("AB-1"));
        assert_eq!(out.meta_text(MetaKey::Featured), Some(FEATURED_NO));

        let out = run(&IdentifierMapper, json!({"id": "x-9", "isFeatured": 1}));
        assert_eq!(out.meta_text(MetaKey::JsonId), Some("x-9"));
        assert_eq!(out.meta_text(MetaKey::PropertyId), Some("x-9"));
        assert_eq!(out.meta_text(MetaKey::Featured), Some(FEATURED_YES));
    }

    #[test]
    fn padded_or_signed_ids_keep_their_text() {
        assert_eq!(IdentifierMapper::json_id_value("042"), MetaValue::Text("042".to_string()));
        assert_eq!(IdentifierMapper::json_id_value("+5"), MetaValue::Text("+5".to_string()));
        assert_eq!(IdentifierMapper::json_id_value(" 7 "), MetaValue::Int(7));
        assert_eq!(IdentifierMapper::json_id_value("-3"), MetaValue::Int(-3));

        let out = run(&IdentifierMapper, json!({"id": "007"}));
        assert_eq!(out.meta(MetaKey::JsonId), Some(&MetaValue::Text("007".to_string())));
    }

    #[test]
    fn featured_falls_back_to_the_new_label() {
        let out = run(&IdentifierMapper, json!({"id": 1, "labelNew": 1}));
        assert_eq!(out.meta_text(MetaKey::Featured), Some(FEATURED_YES));
        let out = run(&IdentifierMapper, json!({"id": 1, "isFeatured": 0, "labelNew": 1}));
        assert_eq!(out.meta_text(MetaKey::Featured), Some(FEATURED_NO));
    }

    #[test]
    fn price_per_meter_requires_a_positive_value() {
        let out = run(
            &PriceMapper,
            json!({"price": "310 000", "priceCurrency": 1, "pricePermeter": "6 200,50"}),
        );
        assert_eq!(out.meta_text(MetaKey::Price), Some("310000"));
        assert_eq!(out.meta_text(MetaKey::Currency), Some("zł"));
        assert_eq!(out.meta_text(MetaKey::PricePrefix), Some("zł"));
        assert_eq!(out.meta_text(MetaKey::SecondPrice), Some("620050"));
        assert_eq!(out.meta_text(MetaKey::PricePostfix), Some(AREA_UNIT));

        let out = run(&PriceMapper, json!({"price": "n/a", "priceCurrency": 7, "pricePermeter": 0}));
        assert!(out.meta(MetaKey::Price).is_none());
        assert!(out.meta(MetaKey::Currency).is_none());
        assert!(out.meta(MetaKey::SecondPrice).is_none());
    }

    #[test]
    fn zero_rooms_are_kept_but_zero_floors_are_not() {
        let out = run(&RoomCountMapper, json!({"apartmentRoomNumber": 0, "apartmentBedroomNumber": "2"}));
        assert_eq!(out.meta(MetaKey::Rooms), Some(&MetaValue::Int(0)));
        assert_eq!(out.meta(MetaKey::Bedrooms), Some(&MetaValue::Int(2)));
        assert!(out.meta(MetaKey::Bathrooms).is_none());

        let out = run(&BuildingMapper, json!({"apartmentFloor": 0, "buildingYear": 1998}));
        assert!(out.meta(MetaKey::FloorNo).is_none());
        assert_eq!(out.meta(MetaKey::YearBuilt), Some(&MetaValue::Int(1998)));
    }

    #[test]
    fn land_area_needs_a_positive_value() {
        let out = run(&SizeMapper, json!({"areaTotal": "0", "areaPlot": "812,5"}));
        assert!(out.meta(MetaKey::Size).is_none());
        assert_eq!(out.meta_text(MetaKey::LandArea), Some("812,5"));
        assert_eq!(out.meta_text(MetaKey::LandAreaPostfix), Some(AREA_UNIT));
    }

    #[test]
    fn garage_count_prefers_the_explicit_field() {
        let raw = |v| RawRecord::from_value(v).expect("object");
        assert_eq!(
            GarageMapper::garage_count(&raw(json!({"additionalGarage": 0, "additionalParkingunderground": 1}))),
            1
        );
        assert_eq!(
            GarageMapper::garage_count(&raw(json!({"additionalGarage": 3, "additionalParkingunderground": 1}))),
            3
        );
        assert_eq!(GarageMapper::garage_count(&raw(json!({}))), 0);

        let out = run(&GarageMapper, json!({"additionalGarage": "2"}));
        assert_eq!(out.meta_text(MetaKey::Garage), Some("2"));
    }
}
