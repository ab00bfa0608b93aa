use propsync_core::{ImageRefs, RawRecord};
use serde_json::Value as JsonValue;

use super::{FieldMapper, MappingContext};
use crate::builder::RecordBuilder;
use crate::sanitize::is_valid_url;

/// Picks the featured image and gallery from `pictures`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageMapper;

impl ImageMapper {
    pub fn valid_urls(raw: &RawRecord) -> Vec<String> {
        let Some(JsonValue::Array(pictures)) = raw.get("pictures") else {
            return Vec::new();
        };
        pictures
            .iter()
            .filter_map(JsonValue::as_str)
            .map(str::trim)
            .filter(|url| is_valid_url(url))
            .map(str::to_string)
            .collect()
    }
}

impl FieldMapper for ImageMapper {
    fn name(&self) -> &'static str {
        "images"
    }

    fn map(&self, raw: &RawRecord, _ctx: &MappingContext<'_>, out: &mut RecordBuilder) {
        let gallery = Self::valid_urls(raw);
        out.set_images(ImageRefs {
            featured_image_url: gallery.first().cloned(),
            gallery_image_urls: gallery,
        });
    }
}
