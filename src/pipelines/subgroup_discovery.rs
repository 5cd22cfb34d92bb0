//! Subgroup discovery pipeline
//!
//! The one pipeline whose load step creates new work: each discovered
//! subgroup becomes a child [`Entity`] under the same migration, picked up
//! by the orchestrator's next pass. This pipeline is the sole creator of
//! child entities, which is what structurally enforces parent-before-child
//! ordering: a child cannot exist until its parent's discovery stage runs.
//!
//! Only applicable to groups; for projects the tracker is skipped.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use crate::errors::{ExtractResult, PipelineError, PipelineResult};
use crate::extract::HttpExtractor;
use crate::models::{Entity, EntityKind, PipelineKind};
use crate::pipeline::{Context, Pipeline};
use crate::query::{Page, PagedQuery};
use crate::store::TransferStore;

const SUBGROUPS_QUERY: PagedQuery = PagedQuery {
    body: r#"{"query":"descendant_groups","full_path":{entity_path},"cursor":{cursor},"first":{page_size}}"#,
    data_path: &["data", "group", "descendantGroups", "nodes"],
    page_info_path: &["data", "group", "descendantGroups", "pageInfo"],
};

pub struct SubgroupDiscoveryPipeline {
    extractor: HttpExtractor,
    store: Arc<dyn TransferStore>,
}

impl SubgroupDiscoveryPipeline {
    pub fn new(extractor: HttpExtractor, store: Arc<dyn TransferStore>) -> Self {
        Self { extractor, store }
    }
}

#[async_trait]
impl Pipeline for SubgroupDiscoveryPipeline {
    fn kind(&self) -> PipelineKind {
        PipelineKind::SubgroupDiscovery
    }

    fn applicable(&self, entity: &Entity) -> bool {
        entity.kind == EntityKind::Group
    }

    async fn extract(&self, ctx: &Context) -> ExtractResult<Page> {
        self.extractor.extract(&SUBGROUPS_QUERY, ctx).await
    }

    fn transform(&self, _ctx: &Context, record: Value) -> PipelineResult<Value> {
        match record.get("full_path").and_then(Value::as_str) {
            Some(path) if !path.is_empty() => Ok(Value::String(path.to_string())),
            _ => Err(PipelineError::transform(
                self.kind().name(),
                "subgroup record is missing 'full_path'",
            )),
        }
    }

    async fn load(&self, ctx: &Context, record: Value) -> PipelineResult<()> {
        let source_path = record.as_str().ok_or_else(|| {
            PipelineError::load(self.kind().name(), "transformed subgroup is not a string")
        })?;

        // Replayed pages must not duplicate children: the (migration,
        // source_path) pair acts as the natural key.
        let existing = self.store.entities_for_migration(ctx.migration_id).await?;
        if existing.iter().any(|e| e.source_path == source_path) {
            return Ok(());
        }

        // Children land under the parent's own destination namespace
        let destination_parent = format!(
            "{}/{}",
            ctx.entity.destination_parent,
            ctx.entity
                .source_path
                .rsplit('/')
                .next()
                .unwrap_or(&ctx.entity.source_path)
        );

        let child = Entity::new(
            ctx.migration_id,
            EntityKind::Group,
            source_path,
            destination_parent,
        );

        info!(
            "Discovered subgroup '{}' under '{}', creating child entity",
            source_path, ctx.entity.source_path
        );

        self.store.insert_entity(child).await?;
        Ok(())
    }
}
