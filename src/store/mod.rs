//! Persistence boundary
//!
//! The real persistence layer is an external collaborator; the engine only
//! talks to it through [`TransferStore`]. [`MemoryStore`] is the reference
//! implementation used by tests and by embedders that do not need durable
//! storage. Records pass by value: callers fetch a clone, mutate it through
//! the model's own transition methods, and write it back.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::errors::{StoreError, StoreResult};
use crate::models::{Entity, Failure, Migration, PipelineKind, Tracker};

/// Storage contract for migration state
#[async_trait]
pub trait TransferStore: Send + Sync {
    async fn insert_migration(&self, migration: Migration) -> StoreResult<()>;
    async fn migration(&self, id: Uuid) -> StoreResult<Option<Migration>>;
    async fn update_migration(&self, migration: Migration) -> StoreResult<()>;

    async fn insert_entity(&self, entity: Entity) -> StoreResult<()>;
    async fn entity(&self, id: Uuid) -> StoreResult<Option<Entity>>;
    async fn update_entity(&self, entity: Entity) -> StoreResult<()>;
    async fn entities_for_migration(&self, migration_id: Uuid) -> StoreResult<Vec<Entity>>;

    /// Insert a tracker, enforcing at most one per (entity, pipeline)
    async fn insert_tracker(&self, tracker: Tracker) -> StoreResult<()>;
    async fn tracker(&self, id: Uuid) -> StoreResult<Option<Tracker>>;
    async fn update_tracker(&self, tracker: Tracker) -> StoreResult<()>;
    async fn tracker_for(
        &self,
        entity_id: Uuid,
        pipeline: PipelineKind,
    ) -> StoreResult<Option<Tracker>>;
    async fn trackers_for_entity(&self, entity_id: Uuid) -> StoreResult<Vec<Tracker>>;

    /// Append a failure record to an entity's diagnostics log
    async fn append_failure(&self, entity_id: Uuid, failure: Failure) -> StoreResult<()> {
        let mut entity = self
            .entity(entity_id)
            .await?
            .ok_or_else(|| StoreError::not_found("entity", entity_id))?;
        entity.record_failure(failure);
        self.update_entity(entity).await
    }
}

/// In-memory store backed by `tokio::sync::RwLock` maps
#[derive(Clone, Default)]
pub struct MemoryStore {
    migrations: Arc<RwLock<HashMap<Uuid, Migration>>>,
    entities: Arc<RwLock<HashMap<Uuid, Entity>>>,
    trackers: Arc<RwLock<HashMap<Uuid, Tracker>>>,
    /// (entity, pipeline) uniqueness index
    tracker_index: Arc<RwLock<HashMap<(Uuid, PipelineKind), Uuid>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransferStore for MemoryStore {
    async fn insert_migration(&self, migration: Migration) -> StoreResult<()> {
        let mut migrations = self.migrations.write().await;
        migrations.insert(migration.id, migration);
        Ok(())
    }

    async fn migration(&self, id: Uuid) -> StoreResult<Option<Migration>> {
        let migrations = self.migrations.read().await;
        Ok(migrations.get(&id).cloned())
    }

    async fn update_migration(&self, migration: Migration) -> StoreResult<()> {
        let mut migrations = self.migrations.write().await;
        if !migrations.contains_key(&migration.id) {
            return Err(StoreError::not_found("migration", migration.id));
        }
        migrations.insert(migration.id, migration);
        Ok(())
    }

    async fn insert_entity(&self, entity: Entity) -> StoreResult<()> {
        let mut entities = self.entities.write().await;
        entities.insert(entity.id, entity);
        Ok(())
    }

    async fn entity(&self, id: Uuid) -> StoreResult<Option<Entity>> {
        let entities = self.entities.read().await;
        Ok(entities.get(&id).cloned())
    }

    async fn update_entity(&self, entity: Entity) -> StoreResult<()> {
        let mut entities = self.entities.write().await;
        if !entities.contains_key(&entity.id) {
            return Err(StoreError::not_found("entity", entity.id));
        }
        entities.insert(entity.id, entity);
        Ok(())
    }

    async fn entities_for_migration(&self, migration_id: Uuid) -> StoreResult<Vec<Entity>> {
        let entities = self.entities.read().await;
        let mut matching: Vec<Entity> = entities
            .values()
            .filter(|e| e.migration_id == migration_id)
            .cloned()
            .collect();
        matching.sort_by_key(|e| e.created_at);
        Ok(matching)
    }

    async fn insert_tracker(&self, tracker: Tracker) -> StoreResult<()> {
        let mut index = self.tracker_index.write().await;
        let key = (tracker.entity_id, tracker.pipeline);

        if index.contains_key(&key) {
            return Err(StoreError::ConstraintViolation {
                constraint: "unique_tracker_per_entity_pipeline".to_string(),
                message: format!(
                    "tracker for entity {} pipeline {} already exists",
                    tracker.entity_id, tracker.pipeline
                ),
            });
        }

        index.insert(key, tracker.id);
        drop(index);

        let mut trackers = self.trackers.write().await;
        trackers.insert(tracker.id, tracker);
        Ok(())
    }

    async fn tracker(&self, id: Uuid) -> StoreResult<Option<Tracker>> {
        let trackers = self.trackers.read().await;
        Ok(trackers.get(&id).cloned())
    }

    async fn update_tracker(&self, tracker: Tracker) -> StoreResult<()> {
        let mut trackers = self.trackers.write().await;
        if !trackers.contains_key(&tracker.id) {
            return Err(StoreError::not_found("tracker", tracker.id));
        }
        trackers.insert(tracker.id, tracker);
        Ok(())
    }

    async fn tracker_for(
        &self,
        entity_id: Uuid,
        pipeline: PipelineKind,
    ) -> StoreResult<Option<Tracker>> {
        let index = self.tracker_index.read().await;
        let Some(tracker_id) = index.get(&(entity_id, pipeline)).copied() else {
            return Ok(None);
        };
        drop(index);

        let trackers = self.trackers.read().await;
        Ok(trackers.get(&tracker_id).cloned())
    }

    async fn trackers_for_entity(&self, entity_id: Uuid) -> StoreResult<Vec<Tracker>> {
        let trackers = self.trackers.read().await;
        let mut matching: Vec<Tracker> = trackers
            .values()
            .filter(|t| t.entity_id == entity_id)
            .cloned()
            .collect();
        matching.sort_by_key(|t| t.stage);
        Ok(matching)
    }
}
