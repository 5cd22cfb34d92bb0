//! Importable entity records and their failure log

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::TransferError;

/// Kind of entity being migrated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Group,
    Project,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Group => write!(f, "group"),
            Self::Project => write!(f, "project"),
        }
    }
}

/// Lifecycle states of an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityStatus {
    Created,
    Started,
    Finished,
    Failed,
}

impl EntityStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Failed)
    }
}

impl std::fmt::Display for EntityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Started => write!(f, "started"),
            Self::Finished => write!(f, "finished"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Immutable failure record attached to an entity
///
/// Captures which pipeline failed and why, keyed by correlation id for log
/// attribution. A failure never rolls back other entities or trackers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Failure {
    pub pipeline: String,
    pub error_class: String,
    pub message: String,
    pub correlation_id: Uuid,
    pub recorded_at: DateTime<Utc>,
}

impl Failure {
    pub fn new<P, C, M>(pipeline: P, error_class: C, message: M, correlation_id: Uuid) -> Self
    where
        P: Into<String>,
        C: Into<String>,
        M: Into<String>,
    {
        Self {
            pipeline: pipeline.into(),
            error_class: error_class.into(),
            message: message.into(),
            correlation_id,
            recorded_at: Utc::now(),
        }
    }
}

/// One importable unit: a group or project scoped to exactly one migration
///
/// Entities are created by the orchestrator at discovery time, so the initial
/// set from the initiator's request, and later ones by a parent group's
/// subgroup discovery pipeline. Status only ever advances; a finished
/// entity is never re-opened.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: Uuid,
    pub migration_id: Uuid,
    pub kind: EntityKind,
    /// Full path of the entity on the source instance
    pub source_path: String,
    /// Destination namespace this entity is imported under
    pub destination_parent: String,
    pub status: EntityStatus,
    pub failures: Vec<Failure>,
    pub created_at: DateTime<Utc>,
}

impl Entity {
    pub fn new<S, D>(migration_id: Uuid, kind: EntityKind, source_path: S, destination_parent: D) -> Self
    where
        S: Into<String>,
        D: Into<String>,
    {
        Self {
            id: Uuid::new_v4(),
            migration_id,
            kind,
            source_path: source_path.into(),
            destination_parent: destination_parent.into(),
            status: EntityStatus::Created,
            failures: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Transition `Created -> Started`; idempotent on re-dispatch
    pub fn start(&mut self) -> Result<(), TransferError> {
        match self.status {
            EntityStatus::Created => {
                self.status = EntityStatus::Started;
                Ok(())
            }
            EntityStatus::Started => Ok(()),
            other => Err(self.invalid_transition(other, EntityStatus::Started)),
        }
    }

    /// Transition `Started -> Finished`
    ///
    /// "Finished" means no more work is queued for this entity, not that
    /// every pipeline succeeded; callers inspect `failures` for that.
    pub fn finish(&mut self) -> Result<(), TransferError> {
        match self.status {
            EntityStatus::Started => {
                self.status = EntityStatus::Finished;
                Ok(())
            }
            EntityStatus::Finished => Ok(()),
            other => Err(self.invalid_transition(other, EntityStatus::Finished)),
        }
    }

    /// Transition into the `Failed` terminal state
    pub fn fail(&mut self) -> Result<(), TransferError> {
        match self.status {
            EntityStatus::Created | EntityStatus::Started => {
                self.status = EntityStatus::Failed;
                Ok(())
            }
            EntityStatus::Failed => Ok(()),
            other => Err(self.invalid_transition(other, EntityStatus::Failed)),
        }
    }

    /// Record a pipeline failure for diagnostics
    pub fn record_failure(&mut self, failure: Failure) {
        self.failures.push(failure);
    }

    fn invalid_transition(&self, from: EntityStatus, to: EntityStatus) -> TransferError {
        TransferError::InvalidTransition {
            record: format!("entity {} ({})", self.id, self.source_path),
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}
