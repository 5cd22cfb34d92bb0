//! Background job system
//!
//! Migrations advance through two job types: orchestrator passes and
//! entity imports. Jobs are deduplicated by key while pending or running,
//! ordered by priority then time, and executed by a polling runner that
//! schedules follow-up jobs from each result. Delivery is at-least-once;
//! the idempotent terminal-state no-ops in the orchestrator, importer,
//! and pipeline runner absorb any redelivery.

pub mod job_queue;
pub mod runner;
pub mod types;

pub use job_queue::{JobDispatcher, JobQueue, JobQueueStats, JobTypeCategory};
pub use runner::JobRunner;
pub use types::{JobPriority, JobType, ScheduledJob};
