//! Pipeline abstraction and execution engine
//!
//! A pipeline is the ordered extract → transform → load unit for one
//! concern of one entity. The trait is the seam the entity importer is
//! written and tested against; the registry declares the closed, ordered
//! stage list per entity kind; the runner drives one tracker to completion
//! with page-granular resumability.

pub mod context;
pub mod registry;
pub mod runner;

pub use context::Context;
pub use registry::{PipelineSet, StageSpec, stages_for};
pub use runner::PipelineRunner;

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::{ExtractResult, PipelineResult};
use crate::models::{Entity, PipelineKind};
use crate::query::Page;

/// Uniform contract for one import stage
///
/// `extract` performs exactly one paginated fetch; looping across pages
/// belongs to the runner. `transform` converts one raw record into its
/// destination-side shape, and `load` persists it. Loaders must tolerate
/// replay of at most one already-applied page (upsert or ignore-duplicate
/// semantics), because the runner persists the cursor after loading a page,
/// not before.
#[async_trait]
pub trait Pipeline: Send + Sync {
    /// Which stage of the closed registry this pipeline implements
    fn kind(&self) -> PipelineKind;

    /// Applicability predicate for the given entity
    ///
    /// Returning false marks the tracker `Skipped` rather than attempting
    /// the stage; skipping is not an error and records no failure.
    fn applicable(&self, entity: &Entity) -> bool {
        let _ = entity;
        true
    }

    /// Fetch one page of raw records at the context's cursor
    async fn extract(&self, ctx: &Context) -> ExtractResult<Page>;

    /// Convert one raw record into its destination-side representation
    fn transform(&self, ctx: &Context, record: Value) -> PipelineResult<Value>;

    /// Persist one transformed record on the destination
    async fn load(&self, ctx: &Context, record: Value) -> PipelineResult<()>;
}
