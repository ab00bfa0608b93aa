//! Core domain model for the property feed -> CMS reconciliation pipeline.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

pub const CRATE_NAME: &str = "propsync-core";

/// Format used for post timestamps written to the content store.
pub const POST_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Fixed codes used by the external feed.
pub mod feed_codes {
    pub const TRANSACTION_SALE: i64 = 131;
    pub const TRANSACTION_RENT: i64 = 132;
    pub const LABEL_NEW: i64 = 1;
    pub const LABEL_SOLD: i64 = 55;
    pub const LABEL_RESERVED: i64 = 57;
}

/// Internal identifier of a content-store entity (property post or attachment).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub u64);

pub type AttachmentId = EntityId;

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Property,
    Attachment,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Property => "property",
            Self::Attachment => "attachment",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Publish,
    Draft,
    Inherit,
    Trash,
}

/// Text form of a scalar JSON value, the way the feed's loose typing expects it.
///
/// Integral floats print without a fractional part, `true` becomes `"1"` and
/// `false` an empty string. Arrays, objects and `null` have no text form.
pub fn json_scalar_text(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Bool(true) => Some("1".to_string()),
        JsonValue::Bool(false) => Some(String::new()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(i.to_string())
            } else if let Some(u) = n.as_u64() {
                Some(u.to_string())
            } else {
                n.as_f64().map(float_text)
            }
        }
        JsonValue::Null | JsonValue::Array(_) | JsonValue::Object(_) => None,
    }
}

fn float_text(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// Loose emptiness test used across the feed: absent-like scalars and empty collections.
pub fn is_empty_value(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => true,
        JsonValue::Bool(b) => !b,
        JsonValue::Number(n) => n.as_f64().map(|f| f == 0.0).unwrap_or(false),
        JsonValue::String(s) => s.is_empty() || s == "0",
        JsonValue::Array(items) => items.is_empty(),
        JsonValue::Object(map) => map.is_empty(),
    }
}

/// One listing as delivered by the feed. Every field is optional and loosely typed;
/// a JSON `null` is treated the same as an absent key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord(Map<String, JsonValue>);

impl RawRecord {
    pub fn new(fields: Map<String, JsonValue>) -> Self {
        Self(fields)
    }

    /// Returns `None` when the value is not a JSON object.
    pub fn from_value(value: JsonValue) -> Option<Self> {
        match value {
            JsonValue::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    pub fn fields(&self) -> &Map<String, JsonValue> {
        &self.0
    }

    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    pub fn is_set(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn non_empty(&self, key: &str) -> Option<&JsonValue> {
        self.get(key).filter(|v| !is_empty_value(v))
    }

    pub fn has_value(&self, key: &str) -> bool {
        self.non_empty(key).is_some()
    }

    /// The external identifier, if present and non-empty.
    pub fn source_id(&self) -> Option<String> {
        self.non_empty("id")
            .and_then(json_scalar_text)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    /// The raw `portalTitle` string, when it is a non-empty string.
    pub fn portal_title(&self) -> Option<&str> {
        self.get("portalTitle")
            .and_then(JsonValue::as_str)
            .filter(|s| !s.trim().is_empty())
    }
}

/// Closed set of lookup categories in the dictionary resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DictionaryCategory {
    Currency,
    BuildingCondition,
    Heating,
    KitchenTypes,
    ApartmentEquipments,
    Binary,
    Types,
    Market,
    ApartmentOwnership,
    ApartmentFurnishings,
    BuildingType,
    BuildingMaterial,
    ApartmentEquipment,
    ApartmentBathroomType,
}

impl DictionaryCategory {
    pub const ALL: [DictionaryCategory; 14] = [
        Self::Currency,
        Self::BuildingCondition,
        Self::Heating,
        Self::KitchenTypes,
        Self::ApartmentEquipments,
        Self::Binary,
        Self::Types,
        Self::Market,
        Self::ApartmentOwnership,
        Self::ApartmentFurnishings,
        Self::BuildingType,
        Self::BuildingMaterial,
        Self::ApartmentEquipment,
        Self::ApartmentBathroomType,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Currency => "currency",
            Self::BuildingCondition => "building_condition",
            Self::Heating => "heating",
            Self::KitchenTypes => "kitchen_types",
            Self::ApartmentEquipments => "apartment_equipments",
            Self::Binary => "binary",
            Self::Types => "types",
            Self::Market => "market",
            Self::ApartmentOwnership => "apartment_ownership",
            Self::ApartmentFurnishings => "apartment_furnishings",
            Self::BuildingType => "building_type",
            Self::BuildingMaterial => "building_material",
            Self::ApartmentEquipment => "apartment_equipment",
            Self::ApartmentBathroomType => "apartment_bathroom_type",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == name)
    }
}

impl fmt::Display for DictionaryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category -> (code -> label). Loaded once, read-only during a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DictionaryTable {
    entries: HashMap<DictionaryCategory, HashMap<String, String>>,
}

impl DictionaryTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        category: DictionaryCategory,
        code: impl Into<String>,
        label: impl Into<String>,
    ) {
        self.entries
            .entry(category)
            .or_default()
            .insert(code.into(), label.into());
    }

    pub fn with_entry(
        mut self,
        category: DictionaryCategory,
        code: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        self.insert(category, code, label);
        self
    }

    pub fn lookup(&self, category: DictionaryCategory, code: &str) -> Option<&str> {
        self.entries
            .get(&category)
            .and_then(|codes| codes.get(code))
            .map(String::as_str)
    }

    pub fn category_len(&self, category: DictionaryCategory) -> usize {
        self.entries.get(&category).map(HashMap::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.values().all(HashMap::is_empty)
    }
}

/// Metadata keys understood by the target theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MetaKey {
    #[serde(rename = "_esti_json_id")]
    JsonId,
    #[serde(rename = "fave_property_id")]
    PropertyId,
    #[serde(rename = "fave_prop_homeslider")]
    Homeslider,
    #[serde(rename = "fave_featured")]
    Featured,
    #[serde(rename = "fave_property_price")]
    Price,
    #[serde(rename = "fave_property_price_prefix")]
    PricePrefix,
    #[serde(rename = "fave_property_price_postfix")]
    PricePostfix,
    #[serde(rename = "fave_property_sec_price")]
    SecondPrice,
    #[serde(rename = "fave_currency_info")]
    Currency,
    #[serde(rename = "fave_property_size")]
    Size,
    #[serde(rename = "fave_property_size_prefix")]
    SizePrefix,
    #[serde(rename = "fave_property_land")]
    LandArea,
    #[serde(rename = "fave_property_land_postfix")]
    LandAreaPostfix,
    #[serde(rename = "fave_property_rooms")]
    Rooms,
    #[serde(rename = "fave_property_bedrooms")]
    Bedrooms,
    #[serde(rename = "fave_property_bathrooms")]
    Bathrooms,
    #[serde(rename = "fave_property_restrooms")]
    Restrooms,
    #[serde(rename = "fave_property_garage")]
    Garage,
    #[serde(rename = "fave_property_year")]
    YearBuilt,
    #[serde(rename = "fave_property_floor_no")]
    FloorNo,
    #[serde(rename = "fave_property_total_floors")]
    TotalFloors,
    #[serde(rename = "fave_property_address")]
    Address,
    #[serde(rename = "fave_property_zip")]
    Zip,
    #[serde(rename = "fave_property_map_address")]
    MapAddress,
    #[serde(rename = "fave_property_location")]
    LocationCoords,
    #[serde(rename = "houzez_geolocation_lat")]
    Latitude,
    #[serde(rename = "houzez_geolocation_long")]
    Longitude,
    #[serde(rename = "fave_property_map")]
    MapEnabled,
    #[serde(rename = "fave_property_map_street_view")]
    MapStreetView,
    #[serde(rename = "fave_property_country")]
    Country,
    #[serde(rename = "fave_agent_display_option")]
    AgentDisplayOption,
    #[serde(rename = "fave_property_agency")]
    PropertyAgency,
    #[serde(rename = "fave_agent_email")]
    AgentEmail,
    #[serde(rename = "fave_agent_mobile")]
    AgentMobile,
    #[serde(rename = "fave_agent_name")]
    AgentName,
    #[serde(rename = "fave_agency_email")]
    AgencyEmail,
    #[serde(rename = "fave_agency_mobile")]
    AgencyMobile,
    #[serde(rename = "fave_agency_name")]
    AgencyName,
    #[serde(rename = "fave_additional_features_enable")]
    AdditionalFeaturesEnable,
    #[serde(rename = "additional_features")]
    AdditionalFeatures,
    #[serde(rename = "fave_property_images")]
    GalleryImages,
    #[serde(rename = "fave_property_images_count")]
    GalleryImageCount,
    #[serde(rename = "fave_video_images")]
    GalleryMediaType,
    #[serde(rename = "_sideloaded_source_url")]
    SideloadedSourceUrl,
    #[serde(rename = "_wp_attachment_image_alt")]
    AttachmentAlt,
}

impl MetaKey {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::JsonId => "_esti_json_id",
            Self::PropertyId => "fave_property_id",
            Self::Homeslider => "fave_prop_homeslider",
            Self::Featured => "fave_featured",
            Self::Price => "fave_property_price",
            Self::PricePrefix => "fave_property_price_prefix",
            Self::PricePostfix => "fave_property_price_postfix",
            Self::SecondPrice => "fave_property_sec_price",
            Self::Currency => "fave_currency_info",
            Self::Size => "fave_property_size",
            Self::SizePrefix => "fave_property_size_prefix",
            Self::LandArea => "fave_property_land",
            Self::LandAreaPostfix => "fave_property_land_postfix",
            Self::Rooms => "fave_property_rooms",
            Self::Bedrooms => "fave_property_bedrooms",
            Self::Bathrooms => "fave_property_bathrooms",
            Self::Restrooms => "fave_property_restrooms",
            Self::Garage => "fave_property_garage",
            Self::YearBuilt => "fave_property_year",
            Self::FloorNo => "fave_property_floor_no",
            Self::TotalFloors => "fave_property_total_floors",
            Self::Address => "fave_property_address",
            Self::Zip => "fave_property_zip",
            Self::MapAddress => "fave_property_map_address",
            Self::LocationCoords => "fave_property_location",
            Self::Latitude => "houzez_geolocation_lat",
            Self::Longitude => "houzez_geolocation_long",
            Self::MapEnabled => "fave_property_map",
            Self::MapStreetView => "fave_property_map_street_view",
            Self::Country => "fave_property_country",
            Self::AgentDisplayOption => "fave_agent_display_option",
            Self::PropertyAgency => "fave_property_agency",
            Self::AgentEmail => "fave_agent_email",
            Self::AgentMobile => "fave_agent_mobile",
            Self::AgentName => "fave_agent_name",
            Self::AgencyEmail => "fave_agency_email",
            Self::AgencyMobile => "fave_agency_mobile",
            Self::AgencyName => "fave_agency_name",
            Self::AdditionalFeaturesEnable => "fave_additional_features_enable",
            Self::AdditionalFeatures => "additional_features",
            Self::GalleryImages => "fave_property_images",
            Self::GalleryImageCount => "fave_property_images_count",
            Self::GalleryMediaType => "fave_video_images",
            Self::SideloadedSourceUrl => "_sideloaded_source_url",
            Self::AttachmentAlt => "_wp_attachment_image_alt",
        }
    }
}

impl fmt::Display for MetaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Taxonomy {
    #[serde(rename = "property_type")]
    PropertyType,
    #[serde(rename = "property_status")]
    Status,
    #[serde(rename = "property_label")]
    Label,
    #[serde(rename = "property_city")]
    City,
    #[serde(rename = "property_area")]
    Area,
    #[serde(rename = "property_state")]
    State,
    #[serde(rename = "property_country")]
    Country,
    #[serde(rename = "property_feature")]
    Feature,
}

impl Taxonomy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PropertyType => "property_type",
            Self::Status => "property_status",
            Self::Label => "property_label",
            Self::City => "property_city",
            Self::Area => "property_area",
            Self::State => "property_state",
            Self::Country => "property_country",
            Self::Feature => "property_feature",
        }
    }
}

impl fmt::Display for Taxonomy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `{title, value}` entry of the free-text additional features list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdditionalFeature {
    #[serde(rename = "fave_additional_feature_title")]
    pub title: String,
    #[serde(rename = "fave_additional_feature_value")]
    pub value: String,
}

impl AdditionalFeature {
    pub fn new(title: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Int(i64),
    Text(String),
    Features(Vec<AdditionalFeature>),
}

impl MetaValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Text(s) => s.trim().parse().ok(),
            Self::Features(_) => None,
        }
    }

    /// Scalar comparison form used by metadata equality lookups.
    pub fn text_form(&self) -> String {
        match self {
            Self::Int(i) => i.to_string(),
            Self::Text(s) => s.clone(),
            Self::Features(items) => serde_json::to_string(items).unwrap_or_default(),
        }
    }
}

impl From<i64> for MetaValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<String> for MetaValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for MetaValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<Vec<AdditionalFeature>> for MetaValue {
    fn from(value: Vec<AdditionalFeature>) -> Self {
        Self::Features(value)
    }
}

/// A post timestamp in site-local time plus its UTC counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostDate {
    pub local: NaiveDateTime,
    pub gmt: NaiveDateTime,
}

impl PostDate {
    pub fn local_string(&self) -> String {
        self.local.format(POST_DATE_FORMAT).to_string()
    }

    pub fn gmt_string(&self) -> String {
        self.gmt.format(POST_DATE_FORMAT).to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostFields {
    pub title: String,
    pub content: String,
    pub status: PostStatus,
    pub post_type: EntityKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<PostDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<PostDate>,
}

impl Default for PostFields {
    fn default() -> Self {
        Self {
            title: String::new(),
            content: String::new(),
            status: PostStatus::Publish,
            post_type: EntityKind::Property,
            created: None,
            modified: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRefs {
    pub featured_image_url: Option<String>,
    pub gallery_image_urls: Vec<String>,
}

/// Mapping output for one record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub post: PostFields,
    pub metadata: BTreeMap<MetaKey, MetaValue>,
    pub taxonomy_terms: BTreeMap<Taxonomy, Vec<String>>,
    pub images: ImageRefs,
}

impl NormalizedRecord {
    pub fn meta(&self, key: MetaKey) -> Option<&MetaValue> {
        self.metadata.get(&key)
    }

    pub fn meta_text(&self, key: MetaKey) -> Option<&str> {
        self.metadata.get(&key).and_then(MetaValue::as_text)
    }

    pub fn terms(&self, taxonomy: Taxonomy) -> &[String] {
        self.taxonomy_terms
            .get(&taxonomy)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Per-record classification reported by the batch driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum SyncOutcome {
    Success(EntityId),
    Skipped,
    Error(String),
}
