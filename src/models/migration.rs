//! Top-level migration record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::SourceConfig;
use crate::errors::TransferError;

/// Lifecycle states of a migration
///
/// Transitions are strictly forward: `Created -> Started -> Finished |
/// Failed`. Terminal states are never left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationStatus {
    Created,
    Started,
    Finished,
    Failed,
}

impl MigrationStatus {
    /// Whether no further orchestrator passes will change this migration
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Failed)
    }
}

impl std::fmt::Display for MigrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Started => write!(f, "started"),
            Self::Finished => write!(f, "finished"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// One top-level migration job
///
/// Created by the initiator, mutated only by the orchestrator (`start`,
/// `finish`, `fail`); pipelines never touch this record directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Migration {
    pub id: Uuid,
    pub status: MigrationStatus,
    pub source: SourceConfig,
    pub created_at: DateTime<Utc>,
}

impl Migration {
    pub fn new(source: SourceConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            status: MigrationStatus::Created,
            source,
            created_at: Utc::now(),
        }
    }

    /// Transition `Created -> Started`
    ///
    /// Starting an already-started migration is a no-op so that duplicate
    /// orchestrator passes stay idempotent.
    pub fn start(&mut self) -> Result<(), TransferError> {
        match self.status {
            MigrationStatus::Created => {
                self.status = MigrationStatus::Started;
                Ok(())
            }
            MigrationStatus::Started => Ok(()),
            other => Err(self.invalid_transition(other, MigrationStatus::Started)),
        }
    }

    /// Transition `Started -> Finished` and purge the access credential
    ///
    /// Finishing is the point where no further outbound calls can happen,
    /// so the credential is removed here and can never be read back.
    pub fn finish(&mut self) -> Result<(), TransferError> {
        match self.status {
            MigrationStatus::Started => {
                self.status = MigrationStatus::Finished;
                self.source.purge_credential();
                Ok(())
            }
            MigrationStatus::Finished => Ok(()),
            other => Err(self.invalid_transition(other, MigrationStatus::Finished)),
        }
    }

    /// Transition into the `Failed` terminal state
    pub fn fail(&mut self) -> Result<(), TransferError> {
        match self.status {
            MigrationStatus::Created | MigrationStatus::Started => {
                self.status = MigrationStatus::Failed;
                self.source.purge_credential();
                Ok(())
            }
            MigrationStatus::Failed => Ok(()),
            other => Err(self.invalid_transition(other, MigrationStatus::Failed)),
        }
    }

    fn invalid_transition(&self, from: MigrationStatus, to: MigrationStatus) -> TransferError {
        TransferError::InvalidTransition {
            record: format!("migration {}", self.id),
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}
