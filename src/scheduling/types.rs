//! Job scheduling type definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use uuid::Uuid;

/// Priority levels for job execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobPriority {
    /// Recovery passes after a restart
    Critical = 0,
    /// Initiator-triggered first passes
    High = 1,
    /// Regular passes and entity imports
    Normal = 2,
    /// Background maintenance tasks
    Low = 3,
}

impl PartialOrd for JobPriority {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for JobPriority {
    fn cmp(&self, other: &Self) -> Ordering {
        (*self as u8).cmp(&(*other as u8))
    }
}

/// Type of job to be executed
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobType {
    /// One orchestrator pass over a migration
    MigrationPass(Uuid),
    /// Import of a single entity
    EntityImport(Uuid),
}

impl JobType {
    /// Deduplication key; jobs with the same key collapse in the queue
    ///
    /// Keyed by record id, so at most one pass per migration and one
    /// import per entity is pending or running at a time. Anything that
    /// slips past this (a crashed runner redelivering) lands on the
    /// idempotent terminal-state no-ops downstream.
    pub fn job_key(&self) -> String {
        match self {
            JobType::MigrationPass(migration_id) => format!("migration:{migration_id}"),
            JobType::EntityImport(entity_id) => format!("entity:{entity_id}"),
        }
    }

    /// The record this job operates on
    pub fn resource_id(&self) -> Uuid {
        match self {
            JobType::MigrationPass(id) | JobType::EntityImport(id) => *id,
        }
    }
}

/// A scheduled job ready for execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledJob {
    pub id: Uuid,
    pub job_type: JobType,
    /// When this job becomes eligible to run
    pub scheduled_time: DateTime<Utc>,
    pub priority: JobPriority,
}

impl ScheduledJob {
    pub fn new(job_type: JobType, priority: JobPriority) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_type,
            scheduled_time: Utc::now(),
            priority,
        }
    }

    pub fn new_scheduled(
        job_type: JobType,
        priority: JobPriority,
        scheduled_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_type,
            scheduled_time,
            priority,
        }
    }

    pub fn job_key(&self) -> String {
        self.job_type.job_key()
    }

    pub fn is_ready(&self, now: DateTime<Utc>) -> bool {
        self.scheduled_time <= now
    }
}

impl PartialEq for ScheduledJob {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ScheduledJob {}

impl PartialOrd for ScheduledJob {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledJob {
    /// Priority first, then scheduled time (earlier first)
    fn cmp(&self, other: &Self) -> Ordering {
        match self.priority.cmp(&other.priority) {
            Ordering::Equal => self.scheduled_time.cmp(&other.scheduled_time),
            priority_order => priority_order,
        }
    }
}
