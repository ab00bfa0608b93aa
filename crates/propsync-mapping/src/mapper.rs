use propsync_core::{DictionaryTable, NormalizedRecord, RawRecord};
use tracing::trace;

use crate::builder::RecordBuilder;
use crate::config::MapperConfig;
use crate::dictionary::DictionaryResolver;
use crate::mappers::{
    AddressMapper, AgentMapper, BuildingMapper, CorePostMapper, FeatureMapper, FieldMapper,
    GarageMapper, IdentifierMapper, ImageMapper, MappingContext, PriceMapper, RoomCountMapper,
    SizeMapper, TaxonomyMapper,
};

/// Runs the field mappers in their fixed order over one raw record.
pub struct PropertyMapper {
    mappers: Vec<Box<dyn FieldMapper>>,
    config: MapperConfig,
}

impl PropertyMapper {
    pub fn new(config: MapperConfig) -> Self {
        Self {
            mappers: default_mappers(),
            config,
        }
    }

    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    pub fn mapper_names(&self) -> Vec<&'static str> {
        self.mappers.iter().map(|m| m.name()).collect()
    }

    pub fn map(&self, raw: &RawRecord, dictionary: &DictionaryTable) -> NormalizedRecord {
        let ctx = MappingContext {
            dictionary: DictionaryResolver::new(dictionary),
            config: &self.config,
        };
        let mut builder = RecordBuilder::new();
        for mapper in &self.mappers {
            trace!(mapper = mapper.name(), "applying field mapper");
            mapper.map(raw, &ctx, &mut builder);
        }
        builder.finish()
    }
}

impl Default for PropertyMapper {
    fn default() -> Self {
        Self::new(MapperConfig::default())
    }
}

fn default_mappers() -> Vec<Box<dyn FieldMapper>> {
    vec![
        Box::new(CorePostMapper),
        Box::new(IdentifierMapper),
        Box::new(PriceMapper),
        Box::new(SizeMapper),
        Box::new(RoomCountMapper),
        Box::new(BuildingMapper),
        Box::new(GarageMapper),
        Box::new(AddressMapper),
        Box::new(AgentMapper),
        Box::new(FeatureMapper),
        Box::new(TaxonomyMapper),
        Box::new(ImageMapper),
    ]
}
