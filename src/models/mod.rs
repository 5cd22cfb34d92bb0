//! Durable data model for the transfer engine
//!
//! Three records make up the persistent state of a migration, nested by
//! scope: a [`Migration`] owns many [`Entity`] records, and each entity owns
//! one [`Tracker`] per pipeline. Trackers are the unit of resumability;
//! entities accumulate immutable [`Failure`] records for diagnostics.

pub mod entity;
pub mod migration;
pub mod tracker;

pub use entity::{Entity, EntityKind, EntityStatus, Failure};
pub use migration::{Migration, MigrationStatus};
pub use tracker::{PipelineKind, Tracker, TrackerStatus};
