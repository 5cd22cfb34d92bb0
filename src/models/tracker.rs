//! Pipeline progress trackers, the unit of resumability

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::TransferError;

/// Closed set of pipeline stages
///
/// Stage order is declared once per entity kind in the pipeline registry,
/// keyed by this enum, so the execution order is statically inspectable
/// rather than discovered through dynamic dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineKind {
    EntityAttributes,
    SubgroupDiscovery,
    Members,
    Labels,
    Milestones,
    Badges,
}

impl PipelineKind {
    /// Stable name used in logs, failure records and job keys
    pub fn name(&self) -> &'static str {
        match self {
            Self::EntityAttributes => "entity_attributes",
            Self::SubgroupDiscovery => "subgroup_discovery",
            Self::Members => "members",
            Self::Labels => "labels",
            Self::Milestones => "milestones",
            Self::Badges => "badges",
        }
    }
}

impl std::fmt::Display for PipelineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Lifecycle states of a tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackerStatus {
    Enqueued,
    Started,
    Finished,
    Failed,
    Skipped,
}

impl TrackerStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Failed | Self::Skipped)
    }
}

impl std::fmt::Display for TrackerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Enqueued => write!(f, "enqueued"),
            Self::Started => write!(f, "started"),
            Self::Finished => write!(f, "finished"),
            Self::Failed => write!(f, "failed"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

/// Durable progress record for one (entity, pipeline) pair
///
/// The cursor holds the pagination continuation token from the last
/// successfully loaded page. It only ever advances; the single sanctioned
/// rewind is [`Tracker::restart`], which resets this one pipeline from the
/// beginning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tracker {
    pub id: Uuid,
    pub entity_id: Uuid,
    pub pipeline: PipelineKind,
    /// Position within the entity's stage list; defines execution order
    pub stage: u32,
    pub status: TrackerStatus,
    pub cursor: Option<String>,
    pub pages_processed: u64,
    pub records_processed: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tracker {
    pub fn new(entity_id: Uuid, pipeline: PipelineKind, stage: u32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            entity_id,
            pipeline,
            stage,
            status: TrackerStatus::Enqueued,
            cursor: None,
            pages_processed: 0,
            records_processed: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Transition `Enqueued -> Started`; idempotent on resume
    pub fn start(&mut self) -> Result<(), TransferError> {
        match self.status {
            TrackerStatus::Enqueued => {
                self.status = TrackerStatus::Started;
                self.touch();
                Ok(())
            }
            TrackerStatus::Started => Ok(()),
            other => Err(self.invalid_transition(other, TrackerStatus::Started)),
        }
    }

    /// Mark this pipeline complete; terminal
    pub fn finish(&mut self) -> Result<(), TransferError> {
        match self.status {
            TrackerStatus::Started => {
                self.status = TrackerStatus::Finished;
                self.touch();
                Ok(())
            }
            TrackerStatus::Finished => Ok(()),
            other => Err(self.invalid_transition(other, TrackerStatus::Finished)),
        }
    }

    /// Mark this pipeline failed; terminal
    pub fn fail(&mut self) -> Result<(), TransferError> {
        match self.status {
            TrackerStatus::Enqueued | TrackerStatus::Started => {
                self.status = TrackerStatus::Failed;
                self.touch();
                Ok(())
            }
            TrackerStatus::Failed => Ok(()),
            other => Err(self.invalid_transition(other, TrackerStatus::Failed)),
        }
    }

    /// Mark this pipeline inapplicable for the entity; terminal, not an error
    pub fn skip(&mut self) -> Result<(), TransferError> {
        match self.status {
            TrackerStatus::Enqueued | TrackerStatus::Started => {
                self.status = TrackerStatus::Skipped;
                self.touch();
                Ok(())
            }
            TrackerStatus::Skipped => Ok(()),
            other => Err(self.invalid_transition(other, TrackerStatus::Skipped)),
        }
    }

    /// Persist the continuation token after a successfully loaded page
    pub fn advance_cursor(&mut self, cursor: Option<String>, records_on_page: u64) {
        self.cursor = cursor;
        self.pages_processed += 1;
        self.records_processed += records_on_page;
        self.touch();
    }

    /// Explicitly restart this one pipeline from the beginning
    ///
    /// The only sanctioned cursor rewind. Counters reset alongside so a
    /// re-run reports accurate totals.
    pub fn restart(&mut self) {
        self.status = TrackerStatus::Enqueued;
        self.cursor = None;
        self.pages_processed = 0;
        self.records_processed = 0;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    fn invalid_transition(&self, from: TrackerStatus, to: TrackerStatus) -> TransferError {
        TransferError::InvalidTransition {
            record: format!("tracker {} ({})", self.id, self.pipeline),
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}
