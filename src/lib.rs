//! Cross-instance bulk migration engine
//!
//! Copies an organizational hierarchy (groups, subgroups, projects and
//! their members, labels, milestones and badges) from a remote source
//! instance into a destination namespace over a paginated query protocol.
//!
//! The moving parts, outermost first:
//!
//! - [`orchestrator::MigrationOrchestrator`] advances a migration one
//!   scheduling slice at a time and decides when it is finished.
//! - [`importer::EntityImporter`] runs the ordered stage list for one
//!   group or project.
//! - [`pipeline::PipelineRunner`] executes a single stage: extract pages,
//!   transform records, load them, with cursor checkpointing and bounded
//!   retries.
//! - [`scheduling`] ties these together with a deduplicating job queue
//!   and a polling runner.
//!
//! Persistence ([`store::TransferStore`]) and destination writes
//! ([`pipelines::RecordLoader`]) are trait seams for embedders; in-memory
//! reference implementations back the tests.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use direct_transfer::config::{SourceConfig, TransferConfig};
//! use direct_transfer::extract::HttpExtractor;
//! use direct_transfer::importer::EntityImporter;
//! use direct_transfer::models::EntityKind;
//! use direct_transfer::orchestrator::{EntityRequest, MigrationOrchestrator};
//! use direct_transfer::pipeline::PipelineRunner;
//! use direct_transfer::pipelines::{MemoryLoader, standard_pipeline_set};
//! use direct_transfer::scheduling::{JobDispatcher, JobPriority, JobQueue, JobRunner, JobType};
//! use direct_transfer::store::{MemoryStore, TransferStore};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = TransferConfig::default();
//! let store: Arc<dyn TransferStore> = Arc::new(MemoryStore::new());
//! let loader = Arc::new(MemoryLoader::new());
//!
//! let extractor = HttpExtractor::new(config.page_size)?;
//! let pipelines = standard_pipeline_set(extractor, store.clone(), loader);
//! let runner = PipelineRunner::new(store.clone(), config.clone());
//! let importer = EntityImporter::new(store.clone(), pipelines, runner);
//! let orchestrator = MigrationOrchestrator::new(store.clone());
//!
//! let migration = orchestrator
//!     .create_migration(
//!         SourceConfig::new("https://source.example.com/api/graphql", "token"),
//!         vec![EntityRequest::new(EntityKind::Group, "group-a", "imported")],
//!     )
//!     .await?;
//!
//! let queue = Arc::new(JobQueue::new());
//! queue
//!     .schedule(JobType::MigrationPass(migration.id), JobPriority::High)
//!     .await?;
//!
//! let job_runner = JobRunner::new(queue, orchestrator, importer, &config);
//! let shutdown = tokio_util::sync::CancellationToken::new();
//! job_runner.run(shutdown).await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod errors;
pub mod extract;
pub mod importer;
pub mod models;
pub mod orchestrator;
pub mod pipeline;
pub mod pipelines;
pub mod query;
pub mod scheduling;
pub mod store;
pub mod utils;
