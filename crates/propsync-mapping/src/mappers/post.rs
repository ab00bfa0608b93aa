use propsync_core::{json_scalar_text, EntityKind, PostDate, PostStatus, RawRecord};
use tracing::warn;

use super::{FieldMapper, MappingContext};
use crate::builder::RecordBuilder;
use crate::dates::{parse_feed_datetime, to_post_date};
use crate::sanitize::{as_rich_content, sanitize_text};

/// Title, body, status and the created/modified timestamps.
#[derive(Debug, Default, Clone, Copy)]
pub struct CorePostMapper;

impl CorePostMapper {
    fn title(raw: &RawRecord) -> String {
        let title = match raw.portal_title() {
            Some(title) => title.to_string(),
            None => match raw.get("id").and_then(json_scalar_text) {
                Some(id) => format!("Property {id}"),
                None => "Property Unknown".to_string(),
            },
        };
        sanitize_text(&title)
    }

    fn content(raw: &RawRecord) -> String {
        raw.get("descriptionWebsite")
            .or_else(|| raw.get("description"))
            .and_then(json_scalar_text)
            .map(|html| as_rich_content(&html))
            .unwrap_or_default()
    }

    fn date(raw: &RawRecord, field: &str, ctx: &MappingContext<'_>) -> Option<PostDate> {
        let value = raw.non_empty(field).and_then(json_scalar_text)?;
        match parse_feed_datetime(&value, ctx.config.site_offset) {
            Ok(parsed) => Some(to_post_date(parsed)),
            Err(err) => {
                warn!(field, value = %value, error = %err, "ignoring unparseable date");
                None
            }
        }
    }
}

impl FieldMapper for CorePostMapper {
    fn name(&self) -> &'static str {
        "core_post"
    }

    fn map(&self, raw: &RawRecord, ctx: &MappingContext<'_>, out: &mut RecordBuilder) {
        let post = out.post_mut();
        post.title = Self::title(raw);
        post.content = Self::content(raw);
        post.status = PostStatus::Publish;
        post.post_type = EntityKind::Property;
        post.created = Self::date(raw, "addDate", ctx);
        post.modified = Self::date(raw, "updateDate", ctx);
    }
}
