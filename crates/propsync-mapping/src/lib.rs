//! Raw feed record -> normalized post, metadata, taxonomy and image references.

pub mod builder;
pub mod config;
pub mod dates;
pub mod dictionary;
pub mod loader;
pub mod mapper;
pub mod mappers;
pub mod sanitize;

pub use builder::RecordBuilder;
pub use config::MapperConfig;
pub use dates::{parse_feed_datetime, to_post_date, DateParseError};
pub use dictionary::{is_unspecified, DictionaryResolver};
pub use loader::{load_dictionary, load_feed, parse_dictionary, parse_feed, DictionaryError};
pub use mapper::PropertyMapper;
pub use mappers::{FieldMapper, MappingContext};

pub const CRATE_NAME: &str = "propsync-mapping";
