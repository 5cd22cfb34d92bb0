//! Entity importer
//!
//! Runs the registry's ordered stage list for one entity. A stage failure
//! does not halt later stages (partial import beats total loss), except
//! when the failed stage is a declared hard dependency, in which case every
//! later tracker is marked skipped instead of attempted.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::{StoreError, TransferError, TransferResult};
use crate::models::{Entity, Tracker, TrackerStatus};
use crate::pipeline::{PipelineRunner, PipelineSet, stages_for};
use crate::store::TransferStore;

/// Imports one entity, stage by stage
#[derive(Clone)]
pub struct EntityImporter {
    store: Arc<dyn TransferStore>,
    pipelines: PipelineSet,
    runner: PipelineRunner,
}

impl EntityImporter {
    pub fn new(store: Arc<dyn TransferStore>, pipelines: PipelineSet, runner: PipelineRunner) -> Self {
        Self {
            store,
            pipelines,
            runner,
        }
    }

    /// Run every stage for the entity in registry order
    ///
    /// Finishes the entity afterwards regardless of individual stage
    /// failures: "finished" means no more work is queued, and callers read
    /// the entity's failure list for the actual outcome. Re-dispatching an
    /// already-finished entity is a no-op.
    pub async fn run(&self, entity_id: Uuid) -> TransferResult<Entity> {
        let mut entity = self
            .store
            .entity(entity_id)
            .await?
            .ok_or_else(|| StoreError::not_found("entity", entity_id))?;

        if entity.status.is_terminal() {
            info!(
                "Entity '{}' already terminal ({}), nothing to import",
                entity.source_path, entity.status
            );
            return Ok(entity);
        }

        entity.start()?;
        self.store.update_entity(entity.clone()).await?;

        info!("Importing {} '{}'", entity.kind, entity.source_path);

        let mut hard_dependency_failed = false;

        for (index, stage) in stages_for(entity.kind).iter().enumerate() {
            let tracker = self.ensure_tracker(entity_id, stage.kind, index as u32).await?;

            if hard_dependency_failed {
                self.skip_tracker(tracker).await?;
                continue;
            }

            let pipeline = self.pipelines.get(stage.kind).ok_or_else(|| {
                TransferError::internal(format!("no pipeline registered for stage {}", stage.kind))
            })?;

            let status = self.runner.run(pipeline.as_ref(), tracker.id).await?;

            if status == TrackerStatus::Failed && stage.hard_dependency {
                warn!(
                    "Hard dependency stage '{}' failed for '{}', skipping remaining stages",
                    stage.kind, entity.source_path
                );
                hard_dependency_failed = true;
            }
        }

        // Refetch: stages appended failures to the stored entity
        let mut entity = self
            .store
            .entity(entity_id)
            .await?
            .ok_or_else(|| StoreError::not_found("entity", entity_id))?;
        entity.finish()?;
        self.store.update_entity(entity.clone()).await?;

        info!(
            "Entity import finished for '{}' ({} recorded failures)",
            entity.source_path,
            entity.failures.len()
        );

        Ok(entity)
    }

    /// Fetch the stage's tracker, creating it on first encounter
    async fn ensure_tracker(
        &self,
        entity_id: Uuid,
        pipeline: crate::models::PipelineKind,
        stage: u32,
    ) -> TransferResult<Tracker> {
        if let Some(existing) = self.store.tracker_for(entity_id, pipeline).await? {
            return Ok(existing);
        }

        let tracker = Tracker::new(entity_id, pipeline, stage);
        match self.store.insert_tracker(tracker.clone()).await {
            Ok(()) => Ok(tracker),
            // Lost a race with a duplicate dispatch; use the winner's record
            Err(StoreError::ConstraintViolation { .. }) => self
                .store
                .tracker_for(entity_id, pipeline)
                .await?
                .ok_or_else(|| StoreError::not_found("tracker", tracker.id).into()),
            Err(e) => Err(e.into()),
        }
    }

    async fn skip_tracker(&self, mut tracker: Tracker) -> TransferResult<()> {
        if tracker.status.is_terminal() {
            return Ok(());
        }
        tracker.skip()?;
        self.store.update_tracker(tracker).await?;
        Ok(())
    }
}
