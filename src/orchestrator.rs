//! Migration orchestrator
//!
//! Drives a migration one scheduling slice at a time. Each `run_pass` call
//! looks at the current entity set, dispatches whatever is ready, and
//! reports back what it did; the scheduling layer turns that report into
//! follow-up jobs. The orchestrator itself never sleeps, loops, or talks
//! to the network, which keeps a pass cheap enough to re-run after every
//! batch of imports and makes mid-flight discovery converge: discovered
//! children show up as `Created` entities and get picked up by the next
//! pass, and the entity set for a finite hierarchy can only grow finitely.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::config::SourceConfig;
use crate::errors::TransferResult;
use crate::models::{Entity, EntityKind, EntityStatus, Migration};
use crate::store::TransferStore;

/// What a single orchestrator pass decided
///
/// The scheduling layer maps this to follow-up jobs: `Dispatched` entities
/// become import jobs plus an immediate next pass, `Waiting` becomes a
/// delayed next pass, the terminal outcomes schedule nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    /// The migration record does not exist; nothing to do
    MigrationMissing,
    /// These entities were selected for import this pass
    Dispatched(Vec<Uuid>),
    /// No new entities, but imports are still in flight
    Waiting,
    /// All entities terminal; the migration is finished
    Finished,
}

/// One entity requested by the initiator when creating a migration
#[derive(Debug, Clone)]
pub struct EntityRequest {
    pub kind: EntityKind,
    pub source_path: String,
    pub destination_parent: String,
}

impl EntityRequest {
    pub fn new<S, D>(kind: EntityKind, source_path: S, destination_parent: D) -> Self
    where
        S: Into<String>,
        D: Into<String>,
    {
        Self {
            kind,
            source_path: source_path.into(),
            destination_parent: destination_parent.into(),
        }
    }
}

/// Coordinates entity dispatch and migration lifecycle
#[derive(Clone)]
pub struct MigrationOrchestrator {
    store: Arc<dyn TransferStore>,
}

impl MigrationOrchestrator {
    pub fn new(store: Arc<dyn TransferStore>) -> Self {
        Self { store }
    }

    /// Create a migration and its initial entity set
    ///
    /// The source url is accepted as given here; scheme validation happens
    /// on the first extract so that a bad url surfaces as a per-stage
    /// failure with a diagnostic, not as a rejected request.
    pub async fn create_migration(
        &self,
        source: SourceConfig,
        requests: Vec<EntityRequest>,
    ) -> TransferResult<Migration> {
        let migration = Migration::new(source);
        self.store.insert_migration(migration.clone()).await?;

        for request in requests {
            let entity = Entity::new(
                migration.id,
                request.kind,
                request.source_path,
                request.destination_parent,
            );
            self.store.insert_entity(entity).await?;
        }

        info!("Created migration {}", migration.id);
        Ok(migration)
    }

    /// Run one scheduling slice for the migration
    ///
    /// Idempotent: a pass over a terminal migration reports `Finished`
    /// without touching anything, and a duplicate pass over an active one
    /// re-selects the same `Created` entities, which downstream job-key
    /// deduplication and terminal-entity no-ops absorb.
    pub async fn run_pass(&self, migration_id: Uuid) -> TransferResult<PassOutcome> {
        let Some(mut migration) = self.store.migration(migration_id).await? else {
            warn!("Pass requested for unknown migration {migration_id}");
            return Ok(PassOutcome::MigrationMissing);
        };

        if migration.status.is_terminal() {
            info!(
                "Migration {} already terminal ({}), pass is a no-op",
                migration.id, migration.status
            );
            return Ok(PassOutcome::Finished);
        }

        migration.start()?;
        self.store.update_migration(migration.clone()).await?;

        let entities = self.store.entities_for_migration(migration_id).await?;
        let ready: Vec<Uuid> = entities
            .iter()
            .filter(|e| e.status == EntityStatus::Created)
            .map(|e| e.id)
            .collect();

        if !ready.is_empty() {
            info!(
                "Dispatching {} entities for import (migration {})",
                ready.len(),
                migration.id
            );
            return Ok(PassOutcome::Dispatched(ready));
        }

        if entities.iter().any(|e| !e.status.is_terminal()) {
            info!(
                "Imports in flight for migration {}, waiting for next pass",
                migration.id
            );
            return Ok(PassOutcome::Waiting);
        }

        // No creatable or running work left: done. Finishing purges the
        // source credential, so no stage can make an outbound call after
        // this point.
        migration.finish()?;
        self.store.update_migration(migration.clone()).await?;

        let failed = entities
            .iter()
            .filter(|e| !e.failures.is_empty())
            .count();
        info!(
            "Migration {} finished ({} entities, {} with failures)",
            migration.id,
            entities.len(),
            failed
        );
        Ok(PassOutcome::Finished)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn source() -> SourceConfig {
        SourceConfig::new("https://source.example.com/api", "token")
    }

    fn orchestrator() -> (MigrationOrchestrator, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (MigrationOrchestrator::new(store.clone()), store)
    }

    #[tokio::test]
    async fn test_unknown_migration_exits_quietly() {
        let (orchestrator, _) = orchestrator();
        let outcome = orchestrator.run_pass(Uuid::new_v4()).await.unwrap();
        assert_eq!(outcome, PassOutcome::MigrationMissing);
    }

    #[tokio::test]
    async fn test_first_pass_starts_migration_and_dispatches() {
        let (orchestrator, store) = orchestrator();
        let migration = orchestrator
            .create_migration(
                source(),
                vec![
                    EntityRequest::new(EntityKind::Group, "group-a", "imported"),
                    EntityRequest::new(EntityKind::Project, "group-a/app", "imported/group-a"),
                ],
            )
            .await
            .unwrap();

        let outcome = orchestrator.run_pass(migration.id).await.unwrap();
        match outcome {
            PassOutcome::Dispatched(ids) => assert_eq!(ids.len(), 2),
            other => panic!("expected dispatch, got {other:?}"),
        }

        let stored = store.migration(migration.id).await.unwrap().unwrap();
        assert_eq!(stored.status, crate::models::MigrationStatus::Started);
    }

    #[tokio::test]
    async fn test_in_flight_entities_mean_waiting() {
        let (orchestrator, store) = orchestrator();
        let migration = orchestrator
            .create_migration(
                source(),
                vec![EntityRequest::new(EntityKind::Group, "group-a", "imported")],
            )
            .await
            .unwrap();

        let mut entity = store
            .entities_for_migration(migration.id)
            .await
            .unwrap()
            .remove(0);
        entity.start().unwrap();
        store.update_entity(entity).await.unwrap();

        let outcome = orchestrator.run_pass(migration.id).await.unwrap();
        assert_eq!(outcome, PassOutcome::Waiting);
    }

    #[tokio::test]
    async fn test_all_terminal_finishes_and_purges_credential() {
        let (orchestrator, store) = orchestrator();
        let migration = orchestrator
            .create_migration(
                source(),
                vec![EntityRequest::new(EntityKind::Group, "group-a", "imported")],
            )
            .await
            .unwrap();
        orchestrator.run_pass(migration.id).await.unwrap();

        let mut entity = store
            .entities_for_migration(migration.id)
            .await
            .unwrap()
            .remove(0);
        entity.start().unwrap();
        entity.finish().unwrap();
        store.update_entity(entity).await.unwrap();

        let outcome = orchestrator.run_pass(migration.id).await.unwrap();
        assert_eq!(outcome, PassOutcome::Finished);

        let stored = store.migration(migration.id).await.unwrap().unwrap();
        assert_eq!(stored.status, crate::models::MigrationStatus::Finished);
        assert!(stored.source.credential().is_none());

        // Further passes are no-ops
        let again = orchestrator.run_pass(migration.id).await.unwrap();
        assert_eq!(again, PassOutcome::Finished);
    }

    #[tokio::test]
    async fn test_discovered_entities_are_picked_up_by_later_pass() {
        let (orchestrator, store) = orchestrator();
        let migration = orchestrator
            .create_migration(
                source(),
                vec![EntityRequest::new(EntityKind::Group, "group-a", "imported")],
            )
            .await
            .unwrap();
        orchestrator.run_pass(migration.id).await.unwrap();

        // Parent finishes, having discovered a child mid-flight
        let mut parent = store
            .entities_for_migration(migration.id)
            .await
            .unwrap()
            .remove(0);
        parent.start().unwrap();
        parent.finish().unwrap();
        store.update_entity(parent).await.unwrap();

        let child = Entity::new(
            migration.id,
            EntityKind::Group,
            "group-a/team",
            "imported/group-a",
        );
        let child_id = child.id;
        store.insert_entity(child).await.unwrap();

        let outcome = orchestrator.run_pass(migration.id).await.unwrap();
        assert_eq!(outcome, PassOutcome::Dispatched(vec![child_id]));
    }
}
