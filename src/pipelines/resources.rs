//! Sub-resource pipelines: members, labels, milestones, badges
//!
//! These four stages differ only in their query and the record fields they
//! require, so a single generic pipeline covers them, configured by one
//! descriptor per resource.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::{ExtractResult, PipelineError, PipelineResult};
use crate::extract::HttpExtractor;
use crate::models::PipelineKind;
use crate::pipeline::{Context, Pipeline};
use crate::query::{Page, PagedQuery};

use super::RecordLoader;

const MEMBERS_QUERY: PagedQuery = PagedQuery {
    body: r#"{"query":"members","full_path":{entity_path},"cursor":{cursor},"first":{page_size}}"#,
    data_path: &["data", "entity", "members", "nodes"],
    page_info_path: &["data", "entity", "members", "pageInfo"],
};

const LABELS_QUERY: PagedQuery = PagedQuery {
    body: r#"{"query":"labels","full_path":{entity_path},"cursor":{cursor},"first":{page_size}}"#,
    data_path: &["data", "entity", "labels", "nodes"],
    page_info_path: &["data", "entity", "labels", "pageInfo"],
};

const MILESTONES_QUERY: PagedQuery = PagedQuery {
    body: r#"{"query":"milestones","full_path":{entity_path},"cursor":{cursor},"first":{page_size}}"#,
    data_path: &["data", "entity", "milestones", "nodes"],
    page_info_path: &["data", "entity", "milestones", "pageInfo"],
};

const BADGES_QUERY: PagedQuery = PagedQuery {
    body: r#"{"query":"badges","full_path":{entity_path},"cursor":{cursor},"first":{page_size}}"#,
    data_path: &["data", "entity", "badges", "nodes"],
    page_info_path: &["data", "entity", "badges", "pageInfo"],
};

/// Generic paginated copy of one sub-resource collection
pub struct ResourcePipeline {
    kind: PipelineKind,
    query: PagedQuery,
    /// Collection name on the destination side
    collection: &'static str,
    /// Field that must be present on every raw record
    required_field: &'static str,
    extractor: HttpExtractor,
    loader: Arc<dyn RecordLoader>,
}

impl ResourcePipeline {
    pub fn members(extractor: HttpExtractor, loader: Arc<dyn RecordLoader>) -> Self {
        Self {
            kind: PipelineKind::Members,
            query: MEMBERS_QUERY,
            collection: "members",
            required_field: "username",
            extractor,
            loader,
        }
    }

    pub fn labels(extractor: HttpExtractor, loader: Arc<dyn RecordLoader>) -> Self {
        Self {
            kind: PipelineKind::Labels,
            query: LABELS_QUERY,
            collection: "labels",
            required_field: "title",
            extractor,
            loader,
        }
    }

    pub fn milestones(extractor: HttpExtractor, loader: Arc<dyn RecordLoader>) -> Self {
        Self {
            kind: PipelineKind::Milestones,
            query: MILESTONES_QUERY,
            collection: "milestones",
            required_field: "title",
            extractor,
            loader,
        }
    }

    pub fn badges(extractor: HttpExtractor, loader: Arc<dyn RecordLoader>) -> Self {
        Self {
            kind: PipelineKind::Badges,
            query: BADGES_QUERY,
            collection: "badges",
            required_field: "link_url",
            extractor,
            loader,
        }
    }
}

#[async_trait]
impl Pipeline for ResourcePipeline {
    fn kind(&self) -> PipelineKind {
        self.kind
    }

    async fn extract(&self, ctx: &Context) -> ExtractResult<Page> {
        self.extractor.extract(&self.query, ctx).await
    }

    fn transform(&self, _ctx: &Context, record: Value) -> PipelineResult<Value> {
        let mut fields = match record {
            Value::Object(map) => map,
            other => {
                return Err(PipelineError::transform(
                    self.kind.name(),
                    format!("expected object record, got {other}"),
                ));
            }
        };

        if !fields.contains_key(self.required_field) {
            return Err(PipelineError::transform(
                self.kind.name(),
                format!("record is missing '{}'", self.required_field),
            ));
        }

        // Protocol bookkeeping keys never reach the destination
        fields.retain(|key, _| !key.starts_with("__"));

        Ok(Value::Object(fields))
    }

    async fn load(&self, ctx: &Context, record: Value) -> PipelineResult<()> {
        self.loader.upsert(ctx, self.collection, record).await
    }
}
