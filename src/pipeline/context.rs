//! Ephemeral per-stage execution context
//!
//! A [`Context`] binds one tracker execution to its entity, cursor and
//! caller credential. It is constructed fresh from the tracker at the start
//! of each stage execution (or resumption) and discarded at stage end, so
//! there is no ambient or thread-local migration state anywhere in the
//! engine.

use uuid::Uuid;

use crate::config::SourceConfig;
use crate::models::{Entity, Tracker};

/// Everything a pipeline needs for one extract/transform/load cycle
#[derive(Debug, Clone)]
pub struct Context {
    pub migration_id: Uuid,
    pub entity: Entity,
    pub tracker_id: Uuid,
    /// Continuation token for the next extraction; `None` on the first page
    pub cursor: Option<String>,
    /// Remote connection configuration, including the caller credential
    pub source: SourceConfig,
    /// Attribution id stamped onto failures and log lines for this stage run
    pub correlation_id: Uuid,
}

impl Context {
    /// Build a context from a tracker's current durable state
    pub fn from_tracker(tracker: &Tracker, entity: Entity, source: SourceConfig) -> Self {
        Self {
            migration_id: entity.migration_id,
            entity,
            tracker_id: tracker.id,
            cursor: tracker.cursor.clone(),
            source,
            correlation_id: Uuid::new_v4(),
        }
    }

    /// Same stage run, advanced to a new cursor position
    pub fn at_cursor(&self, cursor: Option<String>) -> Self {
        Self {
            cursor,
            ..self.clone()
        }
    }
}
