//! Pipeline execution engine
//!
//! Drives one tracker to completion: extract a page, transform and load its
//! records, persist the continuation cursor, repeat until the extractor
//! reports end-of-data. The persisted cursor is what makes a crash
//! mid-pipeline resume from the last committed page instead of the start.

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::TransferConfig;
use crate::errors::{ExtractError, PipelineError, StoreError, TransferResult};
use crate::models::{Failure, Tracker, TrackerStatus};
use crate::query::Page;
use crate::store::TransferStore;
use crate::utils::backoff::retry_delay;

use super::{Context, Pipeline};

/// Executes pipelines against their trackers
#[derive(Clone)]
pub struct PipelineRunner {
    store: Arc<dyn TransferStore>,
    config: TransferConfig,
}

impl PipelineRunner {
    pub fn new(store: Arc<dyn TransferStore>, config: TransferConfig) -> Self {
        Self { store, config }
    }

    /// Drive one tracker to a terminal state
    ///
    /// Returns the tracker's final status. A fatal pipeline error marks the
    /// tracker failed and records a failure on the entity, but returns
    /// `Ok(Failed)`: stage failures are reported, never propagated out of
    /// the importer's stage loop. An `Err` from this function means a
    /// programming-contract violation (e.g. a tracker pointing at a missing
    /// entity), which the job system's own retry handles.
    pub async fn run(
        &self,
        pipeline: &dyn Pipeline,
        tracker_id: Uuid,
    ) -> TransferResult<TrackerStatus> {
        let mut tracker = self
            .store
            .tracker(tracker_id)
            .await?
            .ok_or_else(|| StoreError::not_found("tracker", tracker_id))?;

        // Already-terminal trackers are a no-op. This check, not a lock, is
        // what makes at-least-once job delivery safe.
        if tracker.status.is_terminal() {
            debug!(
                "Tracker for pipeline '{}' already terminal ({}), nothing to do",
                tracker.pipeline, tracker.status
            );
            return Ok(tracker.status);
        }

        let entity = self
            .store
            .entity(tracker.entity_id)
            .await?
            .ok_or_else(|| StoreError::not_found("entity", tracker.entity_id))?;

        if !pipeline.applicable(&entity) {
            info!(
                "Pipeline '{}' not applicable to {} '{}', skipping",
                tracker.pipeline, entity.kind, entity.source_path
            );
            tracker.skip()?;
            self.store.update_tracker(tracker.clone()).await?;
            return Ok(tracker.status);
        }

        let migration = self
            .store
            .migration(entity.migration_id)
            .await?
            .ok_or_else(|| StoreError::not_found("migration", entity.migration_id))?;

        tracker.start()?;
        self.store.update_tracker(tracker.clone()).await?;

        let ctx = Context::from_tracker(&tracker, entity, migration.source.clone());

        info!(
            "Running pipeline '{}' for '{}' from cursor {} (correlation: {})",
            tracker.pipeline,
            ctx.entity.source_path,
            tracker.cursor.as_deref().unwrap_or("<first page>"),
            ctx.correlation_id
        );

        loop {
            let page_ctx = ctx.at_cursor(tracker.cursor.clone());

            let page = match self.extract_with_retries(pipeline, &page_ctx).await {
                Ok(page) => page,
                Err(err) => {
                    return self
                        .fail_tracker(tracker, &page_ctx, PipelineError::Extract(err))
                        .await;
                }
            };

            let record_count = page.records.len() as u64;
            let is_last = page.is_last();
            let next_cursor = page.page_info.end_cursor.clone();

            for record in page.records {
                let result = match pipeline.transform(&page_ctx, record) {
                    Ok(transformed) => pipeline.load(&page_ctx, transformed).await,
                    Err(err) => Err(err),
                };

                if let Err(err) = result {
                    return self.fail_tracker(tracker, &page_ctx, err).await;
                }
            }

            // Commit the continuation token before touching the next page.
            // A crash after this point re-processes at most one page, which
            // loaders tolerate via upsert semantics.
            tracker.advance_cursor(next_cursor, record_count);
            self.store.update_tracker(tracker.clone()).await?;

            debug!(
                "Pipeline '{}' committed page {} ({} records so far)",
                tracker.pipeline, tracker.pages_processed, tracker.records_processed
            );

            if is_last {
                tracker.finish()?;
                self.store.update_tracker(tracker.clone()).await?;
                info!(
                    "Pipeline '{}' finished for '{}' ({} records)",
                    tracker.pipeline, ctx.entity.source_path, tracker.records_processed
                );
                return Ok(tracker.status);
            }
        }
    }

    /// Retry retryable extraction failures at the same cursor, bounded
    async fn extract_with_retries(
        &self,
        pipeline: &dyn Pipeline,
        ctx: &Context,
    ) -> Result<Page, ExtractError> {
        let mut attempt = 0;

        loop {
            match pipeline.extract(ctx).await {
                Ok(page) => return Ok(page),
                Err(err) if err.is_retryable() && attempt < self.config.max_retries => {
                    let delay = retry_delay(
                        attempt,
                        self.config.retry_base_delay_ms,
                        self.config.retry_max_delay_ms,
                        self.config.retry_jitter_percent,
                    );
                    warn!(
                        "Retryable extraction failure on pipeline '{}' (attempt {}/{}), backing off {}ms: {}",
                        pipeline.kind(),
                        attempt + 1,
                        self.config.max_retries,
                        delay.as_millis(),
                        err
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Mark the tracker failed and record a failure on its entity
    async fn fail_tracker(
        &self,
        mut tracker: Tracker,
        ctx: &Context,
        err: PipelineError,
    ) -> TransferResult<TrackerStatus> {
        warn!(
            "Pipeline '{}' failed for '{}' (correlation: {}): {}",
            tracker.pipeline, ctx.entity.source_path, ctx.correlation_id, err
        );

        tracker.fail()?;
        self.store.update_tracker(tracker.clone()).await?;

        self.store
            .append_failure(
                ctx.entity.id,
                Failure::new(
                    tracker.pipeline.name(),
                    err.class(),
                    err.to_string(),
                    ctx.correlation_id,
                ),
            )
            .await?;

        Ok(tracker.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceConfig;
    use crate::models::{Entity, EntityKind, Migration, PipelineKind};
    use crate::query::PageInfo;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use std::sync::Mutex;

    /// Scripted pipeline: plays back a fixed page sequence and records loads
    struct ScriptedPipeline {
        kind: PipelineKind,
        pages: Mutex<Vec<Result<Page, ExtractError>>>,
        loaded: Mutex<Vec<Value>>,
        groups_only: bool,
    }

    impl ScriptedPipeline {
        fn new(pages: Vec<Result<Page, ExtractError>>) -> Self {
            Self {
                kind: PipelineKind::Members,
                pages: Mutex::new(pages),
                loaded: Mutex::new(Vec::new()),
                groups_only: false,
            }
        }

        fn load_count(&self) -> usize {
            self.loaded.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Pipeline for ScriptedPipeline {
        fn kind(&self) -> PipelineKind {
            self.kind
        }

        fn applicable(&self, entity: &Entity) -> bool {
            !self.groups_only || entity.kind == EntityKind::Group
        }

        async fn extract(&self, _ctx: &Context) -> Result<Page, ExtractError> {
            let mut pages = self.pages.lock().unwrap();
            if pages.is_empty() {
                return Ok(Page::empty());
            }
            pages.remove(0)
        }

        fn transform(&self, _ctx: &Context, record: Value) -> Result<Value, PipelineError> {
            Ok(record)
        }

        async fn load(&self, _ctx: &Context, record: Value) -> Result<(), PipelineError> {
            self.loaded.lock().unwrap().push(record);
            Ok(())
        }
    }

    fn page(records: Vec<Value>, info: PageInfo) -> Page {
        Page {
            records,
            page_info: info,
        }
    }

    async fn setup(store: &MemoryStore) -> (Entity, Tracker) {
        let migration = Migration::new(SourceConfig::new("https://source.example.com", "token"));
        let entity = Entity::new(migration.id, EntityKind::Group, "group-a", "imported");
        let tracker = Tracker::new(entity.id, PipelineKind::Members, 2);

        store.insert_migration(migration).await.unwrap();
        store.insert_entity(entity.clone()).await.unwrap();
        store.insert_tracker(tracker.clone()).await.unwrap();
        (entity, tracker)
    }

    fn runner(store: &MemoryStore) -> PipelineRunner {
        let config = TransferConfig {
            retry_base_delay_ms: 1,
            retry_max_delay_ms: 2,
            ..TransferConfig::default()
        };
        PipelineRunner::new(Arc::new(store.clone()), config)
    }

    #[tokio::test]
    async fn test_runs_to_completion_across_pages() {
        let store = MemoryStore::new();
        let (_, tracker) = setup(&store).await;

        let pipeline = ScriptedPipeline::new(vec![
            Ok(page(vec![json!({"n": 1}), json!({"n": 2})], PageInfo::next("c1"))),
            Ok(page(vec![json!({"n": 3})], PageInfo::end_of_data())),
        ]);

        let status = runner(&store).run(&pipeline, tracker.id).await.unwrap();
        assert_eq!(status, TrackerStatus::Finished);
        assert_eq!(pipeline.load_count(), 3);

        let stored = store.tracker(tracker.id).await.unwrap().unwrap();
        assert_eq!(stored.pages_processed, 2);
        assert_eq!(stored.records_processed, 3);
    }

    #[tokio::test]
    async fn test_each_page_extracts_at_the_previous_pages_cursor() {
        let store = MemoryStore::new();
        let (_, tracker) = setup(&store).await;

        struct CursorRecorder {
            inner: ScriptedPipeline,
            seen: Mutex<Vec<Option<String>>>,
        }

        #[async_trait]
        impl Pipeline for CursorRecorder {
            fn kind(&self) -> PipelineKind {
                self.inner.kind()
            }

            async fn extract(&self, ctx: &Context) -> Result<Page, ExtractError> {
                self.seen.lock().unwrap().push(ctx.cursor.clone());
                self.inner.extract(ctx).await
            }

            fn transform(&self, ctx: &Context, record: Value) -> Result<Value, PipelineError> {
                self.inner.transform(ctx, record)
            }

            async fn load(&self, ctx: &Context, record: Value) -> Result<(), PipelineError> {
                self.inner.load(ctx, record).await
            }
        }

        let pipeline = CursorRecorder {
            inner: ScriptedPipeline::new(vec![
                Ok(page(vec![json!({"n": 1})], PageInfo::next("c1"))),
                Ok(page(vec![json!({"n": 2})], PageInfo::next("c2"))),
                Ok(page(vec![json!({"n": 3})], PageInfo::end_of_data())),
            ]),
            seen: Mutex::new(Vec::new()),
        };

        let status = runner(&store).run(&pipeline, tracker.id).await.unwrap();
        assert_eq!(status, TrackerStatus::Finished);

        // The cursor committed after each page is exactly what the next
        // extraction sees, with no gaps or rewinds
        assert_eq!(
            *pipeline.seen.lock().unwrap(),
            vec![None, Some("c1".to_string()), Some("c2".to_string())]
        );
    }

    #[tokio::test]
    async fn test_finished_tracker_is_idempotent_noop() {
        let store = MemoryStore::new();
        let (_, tracker) = setup(&store).await;

        let pipeline = ScriptedPipeline::new(vec![Ok(page(
            vec![json!({"n": 1})],
            PageInfo::end_of_data(),
        ))]);

        let r = runner(&store);
        r.run(&pipeline, tracker.id).await.unwrap();
        assert_eq!(pipeline.load_count(), 1);

        let before = store.tracker(tracker.id).await.unwrap().unwrap();
        let status = r.run(&pipeline, tracker.id).await.unwrap();
        let after = store.tracker(tracker.id).await.unwrap().unwrap();

        // Second run produced no loader calls and left state unchanged
        assert_eq!(status, TrackerStatus::Finished);
        assert_eq!(pipeline.load_count(), 1);
        assert_eq!(after.pages_processed, before.pages_processed);
        assert_eq!(after.cursor, before.cursor);
    }

    #[tokio::test]
    async fn test_cursor_persisted_per_page_for_resume() {
        let store = MemoryStore::new();
        let (_, tracker) = setup(&store).await;

        // Page 1 loads fine, page 2 fails fatally: the tracker must still
        // hold page 1's cursor so a restart does not re-request page 1.
        let pipeline = ScriptedPipeline::new(vec![
            Ok(page(vec![json!({"n": 1})], PageInfo::next("c1"))),
            Err(ExtractError::fatal("boom")),
        ]);

        let status = runner(&store).run(&pipeline, tracker.id).await.unwrap();
        assert_eq!(status, TrackerStatus::Failed);

        let stored = store.tracker(tracker.id).await.unwrap().unwrap();
        assert_eq!(stored.cursor.as_deref(), Some("c1"));
        assert_eq!(stored.pages_processed, 1);
    }

    #[tokio::test]
    async fn test_resumes_from_persisted_cursor() {
        let store = MemoryStore::new();
        let (entity, _) = setup(&store).await;

        // Simulate a process that crashed after committing cursor "c1"
        let mut resumed = Tracker::new(entity.id, PipelineKind::Labels, 3);
        resumed.start().unwrap();
        resumed.advance_cursor(Some("c1".to_string()), 50);
        store.insert_tracker(resumed.clone()).await.unwrap();

        struct CursorEcho {
            seen: Mutex<Vec<Option<String>>>,
        }

        #[async_trait]
        impl Pipeline for CursorEcho {
            fn kind(&self) -> PipelineKind {
                PipelineKind::Labels
            }

            async fn extract(&self, ctx: &Context) -> Result<Page, ExtractError> {
                self.seen.lock().unwrap().push(ctx.cursor.clone());
                Ok(Page::empty())
            }

            fn transform(&self, _ctx: &Context, record: Value) -> Result<Value, PipelineError> {
                Ok(record)
            }

            async fn load(&self, _ctx: &Context, _record: Value) -> Result<(), PipelineError> {
                Ok(())
            }
        }

        let pipeline = CursorEcho {
            seen: Mutex::new(Vec::new()),
        };
        runner(&store).run(&pipeline, resumed.id).await.unwrap();

        // First extraction after restart happens at "c1", not the start
        assert_eq!(
            *pipeline.seen.lock().unwrap(),
            vec![Some("c1".to_string())]
        );
    }

    #[tokio::test]
    async fn test_retryable_errors_are_retried_then_succeed() {
        let store = MemoryStore::new();
        let (_, tracker) = setup(&store).await;

        let pipeline = ScriptedPipeline::new(vec![
            Err(ExtractError::retryable("timeout")),
            Err(ExtractError::retryable("502")),
            Ok(page(vec![json!({"n": 1})], PageInfo::end_of_data())),
        ]);

        let status = runner(&store).run(&pipeline, tracker.id).await.unwrap();
        assert_eq!(status, TrackerStatus::Finished);
        assert_eq!(pipeline.load_count(), 1);
    }

    #[tokio::test]
    async fn test_retries_exhausted_escalates_to_failure() {
        let store = MemoryStore::new();
        let (entity, tracker) = setup(&store).await;

        let pipeline = ScriptedPipeline::new(vec![
            Err(ExtractError::retryable("timeout")),
            Err(ExtractError::retryable("timeout")),
            Err(ExtractError::retryable("timeout")),
            Err(ExtractError::retryable("timeout")),
        ]);

        let status = runner(&store).run(&pipeline, tracker.id).await.unwrap();
        assert_eq!(status, TrackerStatus::Failed);

        let stored = store.entity(entity.id).await.unwrap().unwrap();
        assert_eq!(stored.failures.len(), 1);
        assert_eq!(stored.failures[0].error_class, "RetriesExhausted");
    }

    #[tokio::test]
    async fn test_fatal_error_records_failure_without_raising() {
        let store = MemoryStore::new();
        let (entity, tracker) = setup(&store).await;

        let pipeline = ScriptedPipeline::new(vec![Err(ExtractError::fatal("404 not found"))]);

        let status = runner(&store).run(&pipeline, tracker.id).await.unwrap();
        assert_eq!(status, TrackerStatus::Failed);

        let stored = store.entity(entity.id).await.unwrap().unwrap();
        assert_eq!(stored.failures.len(), 1);
        assert_eq!(stored.failures[0].pipeline, "members");
        assert!(stored.failures[0].message.contains("404"));
    }

    #[tokio::test]
    async fn test_inapplicable_pipeline_is_skipped_without_failure() {
        let store = MemoryStore::new();

        let migration = Migration::new(SourceConfig::new("https://source.example.com", "token"));
        let project = Entity::new(migration.id, EntityKind::Project, "group-a/proj", "imported");
        let tracker = Tracker::new(project.id, PipelineKind::SubgroupDiscovery, 1);
        store.insert_migration(migration).await.unwrap();
        store.insert_entity(project.clone()).await.unwrap();
        store.insert_tracker(tracker.clone()).await.unwrap();

        let pipeline = ScriptedPipeline {
            kind: PipelineKind::SubgroupDiscovery,
            pages: Mutex::new(vec![Ok(Page::empty())]),
            loaded: Mutex::new(Vec::new()),
            groups_only: true,
        };

        let status = runner(&store).run(&pipeline, tracker.id).await.unwrap();
        assert_eq!(status, TrackerStatus::Skipped);
        assert_eq!(pipeline.load_count(), 0);

        let stored = store.entity(project.id).await.unwrap().unwrap();
        assert!(stored.failures.is_empty());
    }

    #[tokio::test]
    async fn test_empty_page_with_continuation_keeps_polling() {
        let store = MemoryStore::new();
        let (_, tracker) = setup(&store).await;

        let pipeline = ScriptedPipeline::new(vec![
            Ok(page(Vec::new(), PageInfo::next("c1"))),
            Ok(page(vec![json!({"n": 1})], PageInfo::end_of_data())),
        ]);

        let status = runner(&store).run(&pipeline, tracker.id).await.unwrap();
        assert_eq!(status, TrackerStatus::Finished);

        let stored = store.tracker(tracker.id).await.unwrap().unwrap();
        assert_eq!(stored.pages_processed, 2);
        assert_eq!(stored.records_processed, 1);
    }
}
