//! Concrete import pipelines
//!
//! Each pipeline here implements the [`crate::pipeline::Pipeline`] contract
//! for one concern of one entity: its attributes, its subgroups, and its
//! sub-resources (members, labels, milestones, badges). Destination-side
//! writes go through the [`RecordLoader`] seam so the actual persistence of
//! imported records stays an external collaborator.

pub mod entity_attributes;
pub mod loader;
pub mod resources;
pub mod subgroup_discovery;

pub use entity_attributes::EntityAttributesPipeline;
pub use loader::{MemoryLoader, RecordLoader};
pub use resources::ResourcePipeline;
pub use subgroup_discovery::SubgroupDiscoveryPipeline;

use std::sync::Arc;

use crate::extract::HttpExtractor;
use crate::pipeline::PipelineSet;
use crate::store::TransferStore;

/// Build the full stage set declared by the registry
pub fn standard_pipeline_set(
    extractor: HttpExtractor,
    store: Arc<dyn TransferStore>,
    loader: Arc<dyn RecordLoader>,
) -> PipelineSet {
    PipelineSet::new()
        .register(Arc::new(EntityAttributesPipeline::new(
            extractor.clone(),
            loader.clone(),
        )))
        .register(Arc::new(SubgroupDiscoveryPipeline::new(
            extractor.clone(),
            store,
        )))
        .register(Arc::new(ResourcePipeline::members(
            extractor.clone(),
            loader.clone(),
        )))
        .register(Arc::new(ResourcePipeline::labels(
            extractor.clone(),
            loader.clone(),
        )))
        .register(Arc::new(ResourcePipeline::milestones(
            extractor.clone(),
            loader.clone(),
        )))
        .register(Arc::new(ResourcePipeline::badges(extractor, loader)))
}
