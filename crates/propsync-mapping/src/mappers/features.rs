use propsync_core::{
    json_scalar_text, AdditionalFeature, DictionaryCategory, MetaKey, RawRecord, Taxonomy,
};
use tracing::warn;

use super::{FieldMapper, MappingContext};
use crate::builder::RecordBuilder;
use crate::dates::parse_feed_datetime;
use crate::sanitize::{as_int, sanitize_text};

pub const FEATURES_ENABLED: &str = "enable";
pub const AVAILABLE_FROM_TITLE: &str = "Available From";
pub const ELEVATOR_TERM: &str = "Elevator";

const DICTIONARY_FEATURES: [(&str, DictionaryCategory, &str); 5] = [
    ("buildingConditionId", DictionaryCategory::BuildingCondition, "Building Condition"),
    ("apartmentOwnership", DictionaryCategory::ApartmentOwnership, "Ownership Type"),
    ("apartmentFurnishings", DictionaryCategory::ApartmentFurnishings, "Furnishings"),
    ("buildingType", DictionaryCategory::BuildingType, "Building Type"),
    ("buildingMaterial", DictionaryCategory::BuildingMaterial, "Building Material"),
];

/// Feed flags that become a feature term when set to `1`.
pub const BINARY_FEATURE_TERMS: [(&str, &str); 28] = [
    ("additionalBalcony", "Balcony"),
    ("additionalStorage", "Storage Room"),
    ("additionalParkingunderground", "Underground Parking"),
    ("securityIntercom", "Intercom"),
    ("securityVideocameras", "Video Cameras"),
    ("buildingSwimmingpool", "Swimming Pool"),
    ("buildingGym", "Gym"),
    ("securityGuarded", "Guarded"),
    ("securityReception", "Reception"),
    ("securityVideointercom", "Video Intercom"),
    ("securityGated", "Gated Community"),
    ("securitySecuredoor", "Secure Door"),
    ("securityBlinds", "Blinds"),
    ("securityGrating", "Security Grating"),
    ("securityMonitoring", "Security Monitoring"),
    ("securitySmokeDetector", "Smoke Detector"),
    ("securityAccessControl", "Access Control"),
    ("securityAlarm", "Alarm System"),
    ("buildingAdapted", "Disabled Access"),
    ("buildingAirConditioning", "Air Conditioning"),
    ("additionalLoggia", "Loggia"),
    ("additionalTerrace", "Terrace"),
    ("additionalBasement", "Basement"),
    ("additionalAttic", "Attic"),
    ("additionalParking", "Parking"),
    ("additionalGarage", "Garage"),
    ("additionalGarden", "Garden"),
    ("buildingCarPark", "Car Park"),
];

/// Substring (lowercase) -> term, for free-text equipment labels.
const EQUIPMENT_KEYWORDS: [(&[&str], &str); 2] = [(&["sauna"], "Sauna"), (&["shower", "prysznic"], "Shower")];
const BATHROOM_KEYWORDS: [(&[&str], &str); 2] = [
    (&["shower", "prysznic"], "Shower"),
    (&["bathtub", "wanna"], "Bathtub"),
];

/// The additional-features list plus the feature taxonomy terms.
#[derive(Debug, Default, Clone, Copy)]
pub struct FeatureMapper;

impl FeatureMapper {
    fn dictionary_features(raw: &RawRecord, ctx: &MappingContext<'_>) -> Vec<AdditionalFeature> {
        DICTIONARY_FEATURES
            .iter()
            .filter(|(field, _, _)| raw.is_set(field))
            .filter_map(|(field, category, title)| {
                ctx.dictionary
                    .resolve_specified(*category, raw.get(field))
                    .map(|value| AdditionalFeature::new(*title, value))
            })
            .collect()
    }

    fn available_from(raw: &RawRecord, ctx: &MappingContext<'_>) -> Option<AdditionalFeature> {
        let value = raw.non_empty("availableDate").and_then(json_scalar_text)?;
        match parse_feed_datetime(&value, ctx.config.site_offset) {
            Ok(parsed) => Some(AdditionalFeature::new(
                AVAILABLE_FROM_TITLE,
                sanitize_text(&parsed.format("%Y-%m-%d").to_string()),
            )),
            Err(err) => {
                warn!(value = %value, error = %err, "ignoring unparseable availableDate");
                None
            }
        }
    }

    fn keyword_terms(
        raw: &RawRecord,
        ctx: &MappingContext<'_>,
        field: &str,
        category: DictionaryCategory,
        keywords: &[(&[&str], &str)],
        out: &mut RecordBuilder,
    ) {
        if !raw.is_set(field) {
            return;
        }
        let Some(label) = ctx.dictionary.resolve_specified(category, raw.get(field)) else {
            return;
        };
        let label = label.to_lowercase();
        for (needles, term) in keywords {
            if needles.iter().any(|needle| label.contains(needle)) {
                out.add_term(Taxonomy::Feature, *term);
            }
        }
    }

    fn has_elevator(raw: &RawRecord) -> bool {
        let counted = raw
            .get("buildingElevatornumber")
            .map(|v| as_int(v) > 0)
            .unwrap_or(false);
        let flagged = raw
            .get("buildingElevator")
            .map(|v| as_int(v) == 1)
            .unwrap_or(false);
        counted || flagged
    }
}

impl FieldMapper for FeatureMapper {
    fn name(&self) -> &'static str {
        "features"
    }

    fn map(&self, raw: &RawRecord, ctx: &MappingContext<'_>, out: &mut RecordBuilder) {
        let mut features = Self::dictionary_features(raw, ctx);
        features.extend(Self::available_from(raw, ctx));

        if raw.is_set("buildingHeating") {
            if let Some(heating) = ctx
                .dictionary
                .resolve_specified(DictionaryCategory::Heating, raw.get("buildingHeating"))
            {
                out.add_term(Taxonomy::Feature, heating);
            }
        }

        for (field, term) in BINARY_FEATURE_TERMS {
            if raw.get(field).map(as_int) == Some(1) {
                out.add_term(Taxonomy::Feature, term);
            }
        }

        if Self::has_elevator(raw) {
            out.add_term(Taxonomy::Feature, ELEVATOR_TERM);
        }

        Self::keyword_terms(
            raw,
            ctx,
            "apartmentEquipment",
            DictionaryCategory::ApartmentEquipment,
            &EQUIPMENT_KEYWORDS,
            out,
        );
        Self::keyword_terms(
            raw,
            ctx,
            "apartmentBathroomType",
            DictionaryCategory::ApartmentBathroomType,
            &BATHROOM_KEYWORDS,
            out,
        );

        let enabled = if features.is_empty() { "" } else { FEATURES_ENABLED };
        out.set_meta(MetaKey::AdditionalFeaturesEnable, enabled);
        out.set_meta(MetaKey::AdditionalFeatures, features);
    }
}
