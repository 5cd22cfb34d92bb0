//! Entity attributes pipeline
//!
//! First stage for every entity and the registry's only hard dependency:
//! it materializes the group or project itself on the destination. When it
//! fails, every later stage for the entity is skipped; there is nothing to
//! attach members or labels to.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::{ExtractResult, PipelineError, PipelineResult};
use crate::extract::HttpExtractor;
use crate::models::PipelineKind;
use crate::pipeline::{Context, Pipeline};
use crate::query::{Page, PagedQuery};

use super::RecordLoader;

const ATTRIBUTES_QUERY: PagedQuery = PagedQuery {
    body: r#"{"query":"entity_attributes","full_path":{entity_path},"cursor":{cursor},"first":{page_size}}"#,
    data_path: &["data", "entity", "nodes"],
    page_info_path: &["data", "entity", "pageInfo"],
};

pub struct EntityAttributesPipeline {
    extractor: HttpExtractor,
    loader: Arc<dyn RecordLoader>,
}

impl EntityAttributesPipeline {
    pub fn new(extractor: HttpExtractor, loader: Arc<dyn RecordLoader>) -> Self {
        Self { extractor, loader }
    }
}

#[async_trait]
impl Pipeline for EntityAttributesPipeline {
    fn kind(&self) -> PipelineKind {
        PipelineKind::EntityAttributes
    }

    async fn extract(&self, ctx: &Context) -> ExtractResult<Page> {
        // Attribute queries return a single page; the runner still sees the
        // normal end-of-data marker and finishes after one iteration.
        self.extractor.extract(&ATTRIBUTES_QUERY, ctx).await
    }

    fn transform(&self, ctx: &Context, record: Value) -> PipelineResult<Value> {
        let mut attributes = match record {
            Value::Object(map) => map,
            other => {
                return Err(PipelineError::transform(
                    self.kind().name(),
                    format!("expected object record, got {other}"),
                ));
            }
        };

        if !attributes.contains_key("path") {
            return Err(PipelineError::transform(
                self.kind().name(),
                "entity attributes record is missing 'path'",
            ));
        }

        attributes.insert(
            "destination_parent".to_string(),
            Value::String(ctx.entity.destination_parent.clone()),
        );
        attributes.insert(
            "kind".to_string(),
            Value::String(ctx.entity.kind.to_string()),
        );

        Ok(Value::Object(attributes))
    }

    async fn load(&self, ctx: &Context, record: Value) -> PipelineResult<()> {
        self.loader.upsert(ctx, "attributes", record).await
    }
}
