//! Destination-side record loading seam
//!
//! The engine never writes imported records itself; concrete pipelines hand
//! transformed records to a [`RecordLoader`]. Implementations must use
//! upsert or ignore-duplicate semantics: after a crash the runner replays
//! at most one already-applied page, and those records arrive here twice.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::errors::PipelineResult;
use crate::pipeline::Context;

/// Persists transformed records on the destination instance
#[async_trait]
pub trait RecordLoader: Send + Sync {
    /// Upsert one record into the named collection of the context's entity
    async fn upsert(&self, ctx: &Context, collection: &str, record: Value) -> PipelineResult<()>;
}

/// In-memory loader keyed by (entity source path, collection)
///
/// Reference implementation for tests and embedders without a destination
/// backend. Deduplicates on the record's `id` field when present, matching
/// the upsert contract.
#[derive(Clone, Default)]
pub struct MemoryLoader {
    collections: Arc<RwLock<HashMap<(String, String), Vec<Value>>>>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records loaded so far for one entity's collection
    pub async fn records(&self, entity_path: &str, collection: &str) -> Vec<Value> {
        let collections = self.collections.read().await;
        collections
            .get(&(entity_path.to_string(), collection.to_string()))
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl RecordLoader for MemoryLoader {
    async fn upsert(&self, ctx: &Context, collection: &str, record: Value) -> PipelineResult<()> {
        let mut collections = self.collections.write().await;
        let entry = collections
            .entry((ctx.entity.source_path.clone(), collection.to_string()))
            .or_default();

        if let Some(id) = record.get("id") {
            if let Some(existing) = entry.iter_mut().find(|r| r.get("id") == Some(id)) {
                *existing = record;
                return Ok(());
            }
        }

        entry.push(record);
        Ok(())
    }
}
