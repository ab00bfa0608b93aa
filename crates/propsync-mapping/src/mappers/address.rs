use propsync_core::{MetaKey, RawRecord};

use super::{FieldMapper, MappingContext};
use crate::builder::RecordBuilder;
use crate::sanitize::{as_text, parse_strict_float};

pub const DEFAULT_MAP_ZOOM: u8 = 16;
pub const STREET_VIEW_DISPLAY: &str = "show";

/// Street, postal code, the composed map address and coordinates.
#[derive(Debug, Default, Clone, Copy)]
pub struct AddressMapper;

impl AddressMapper {
    fn text(raw: &RawRecord, field: &str) -> String {
        raw.non_empty(field).map(as_text).unwrap_or_default()
    }

    fn map_address(raw: &RawRecord, street: &str) -> Option<String> {
        let mut parts = Vec::with_capacity(5);
        if !street.is_empty() {
            parts.push(street.to_string());
        }
        for field in [
            "locationCityName",
            "locationPostal",
            "locationProvinceName",
            "locationCountryName",
        ] {
            let part = Self::text(raw, field);
            if !part.is_empty() {
                parts.push(part);
            }
        }
        let joined = parts.join(", ");
        if !joined.is_empty() {
            Some(joined)
        } else if !street.is_empty() {
            Some(street.to_string())
        } else {
            None
        }
    }

    /// Both coordinates must parse on their own; returns them formatted to six decimals.
    pub fn coordinates(raw: &RawRecord) -> Option<(String, String)> {
        let latitude = Self::text(raw, "locationLatitude");
        let longitude = Self::text(raw, "locationLongitude");
        if latitude.is_empty() || longitude.is_empty() {
            return None;
        }
        let lat = parse_strict_float(&latitude)?;
        let lng = parse_strict_float(&longitude)?;
        Some((format!("{lat:.6}"), format!("{lng:.6}")))
    }
}

impl FieldMapper for AddressMapper {
    fn name(&self) -> &'static str {
        "address"
    }

    fn map(&self, raw: &RawRecord, _ctx: &MappingContext<'_>, out: &mut RecordBuilder) {
        let street = Self::text(raw, "locationStreetName");
        if !street.is_empty() {
            out.set_meta(MetaKey::Address, street.clone());
        }

        let postal = Self::text(raw, "locationPostal");
        if !postal.is_empty() {
            out.set_meta(MetaKey::Zip, postal);
        }

        if let Some(address) = Self::map_address(raw, &street) {
            out.set_meta(MetaKey::MapAddress, address);
        }

        match Self::coordinates(raw) {
            Some((lat, lng)) => {
                out.set_meta(
                    MetaKey::LocationCoords,
                    format!("{lat},{lng},{DEFAULT_MAP_ZOOM}"),
                );
                out.set_meta(MetaKey::Latitude, lat);
                out.set_meta(MetaKey::Longitude, lng);
                out.set_meta(MetaKey::MapEnabled, "1");
            }
            None => out.set_meta(MetaKey::MapEnabled, "0"),
        }
        out.set_meta(MetaKey::MapStreetView, STREET_VIEW_DISPLAY);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MapperConfig;
    use crate::dictionary::DictionaryResolver;
    use propsync_core::DictionaryTable;
    use serde_json::json;

    fn run(raw: serde_json::Value) -> RecordBuilder {
        let table = DictionaryTable::new();
        let config = MapperConfig::default();
        let ctx = MappingContext {
            dictionary: DictionaryResolver::new(&table),
            config: &config,
        };
        let mut out = RecordBuilder::new();
        AddressMapper.map(&RawRecord::from_value(raw).expect("object"), &ctx, &mut out);
        out
    }

    #[test]
    fn map_address_skips_missing_parts() {
        let out = run(json!({
            "locationStreetName": "Długa 5",
            "locationCityName": "Gdańsk",
            "locationPostal": "",
            "locationCountryName": "Polska"
        }));
        assert_eq!(out.meta_text(MetaKey::Address), Some("Długa 5"));
        assert_eq!(out.meta_text(MetaKey::MapAddress), Some("Długa 5, Gdańsk, Polska"));
        assert!(out.meta(MetaKey::Zip).is_none());
    }

    #[test]
    fn comma_decimal_coordinates_are_accepted() {
        let out = run(json!({"locationLatitude": "51,1", "locationLongitude": "17,0"}));
        assert_eq!(out.meta_text(MetaKey::LocationCoords), Some("51.100000,17.000000,16"));
        assert_eq!(out.meta_text(MetaKey::Latitude), Some("51.100000"));
        assert_eq!(out.meta_text(MetaKey::Longitude), Some("17.000000"));
        assert_eq!(out.meta_text(MetaKey::MapEnabled), Some("1"));
        assert_eq!(out.meta_text(MetaKey::MapStreetView), Some(STREET_VIEW_DISPLAY));
    }

    #[test]
    fn one_bad_coordinate_disables_the_map() {
        let out = run(json!({"locationLatitude": "abc", "locationLongitude": "17.0"}));
        assert_eq!(out.meta_text(MetaKey::MapEnabled), Some("0"));
        assert!(out.meta(MetaKey::LocationCoords).is_none());
        assert!(out.meta(MetaKey::Latitude).is_none());
        assert!(out.meta(MetaKey::Longitude).is_none());
        assert_eq!(out.meta_text(MetaKey::MapStreetView), Some(STREET_VIEW_DISPLAY));
    }
}
