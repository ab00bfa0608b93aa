use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use propsync_core::PostDate;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DateParseError {
    #[error("empty date value")]
    Empty,
    #[error("unrecognized date `{0}`")]
    Unrecognized(String),
}

const NAIVE_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"];

/// Parse a feed timestamp. Values without an offset are read as site-local time;
/// values with one are converted to the site offset.
pub fn parse_feed_datetime(
    input: &str,
    site_offset: FixedOffset,
) -> Result<DateTime<FixedOffset>, DateParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(DateParseError::Empty);
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&site_offset));
    }

    let naive = NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
                .ok()
                .map(|date| date.and_time(NaiveTime::MIN))
        })
        .ok_or_else(|| DateParseError::Unrecognized(trimmed.to_string()))?;

    site_offset
        .from_local_datetime(&naive)
        .single()
        .ok_or_else(|| DateParseError::Unrecognized(trimmed.to_string()))
}

pub fn to_post_date(value: DateTime<FixedOffset>) -> PostDate {
    PostDate {
        local: value.naive_local(),
        gmt: value.naive_utc(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plus_one() -> FixedOffset {
        FixedOffset::east_opt(3600).expect("offset")
    }

    #[test]
    fn naive_values_are_site_local() {
        let parsed = parse_feed_datetime("2024-03-01 10:15:00", plus_one()).expect("parse");
        let post = to_post_date(parsed);
        assert_eq!(post.local_string(), "2024-03-01 10:15:00");
        assert_eq!(post.gmt_string(), "2024-03-01 09:15:00");
    }

    #[test]
    fn offsets_are_converted_to_site_time() {
        let parsed = parse_feed_datetime("2024-03-01T10:15:00.250Z", plus_one()).expect("parse");
        let post = to_post_date(parsed);
        assert_eq!(post.local_string(), "2024-03-01 11:15:00");
        assert_eq!(post.gmt_string(), "2024-03-01 10:15:00");
    }

    #[test]
    fn date_only_values_start_at_midnight() {
        let parsed = parse_feed_datetime("2024-05-20", plus_one()).expect("parse");
        assert_eq!(to_post_date(parsed).local_string(), "2024-05-20 00:00:00");
    }

    #[test]
    fn garbage_is_reported_not_panicked() {
        assert_eq!(
            parse_feed_datetime("next tuesday", plus_one()),
            Err(DateParseError::Unrecognized("next tuesday".to_string()))
        );
        assert_eq!(parse_feed_datetime("  ", plus_one()), Err(DateParseError::Empty));
    }
}
