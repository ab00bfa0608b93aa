//! Field mappers. Each one owns a slice of the normalized record and writes it
//! into the shared [`RecordBuilder`].

use propsync_core::RawRecord;

use crate::builder::RecordBuilder;
use crate::config::MapperConfig;
use crate::dictionary::DictionaryResolver;

mod address;
mod agent;
mod details;
mod features;
mod images;
mod post;
mod taxonomy;

pub use address::AddressMapper;
pub use agent::AgentMapper;
pub use details::{
    BuildingMapper, GarageMapper, IdentifierMapper, PriceMapper, RoomCountMapper, SizeMapper,
};
pub use features::{FeatureMapper, BINARY_FEATURE_TERMS};
pub use images::ImageMapper;
pub use post::CorePostMapper;
pub use taxonomy::TaxonomyMapper;

pub const AREA_UNIT: &str = "m²";

/// Read-only inputs shared by every mapper for one record.
#[derive(Debug, Clone, Copy)]
pub struct MappingContext<'a> {
    pub dictionary: DictionaryResolver<'a>,
    pub config: &'a MapperConfig,
}

pub trait FieldMapper: Send + Sync {
    fn name(&self) -> &'static str;

    /// Must not fail: unusable input leaves the mapper's fields unset.
    fn map(&self, raw: &RawRecord, ctx: &MappingContext<'_>, out: &mut RecordBuilder);
}
