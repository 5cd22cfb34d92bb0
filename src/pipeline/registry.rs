//! Closed, ordered stage registry
//!
//! Stage order is declared here once per entity kind instead of being
//! discovered through dynamic dispatch, so the execution order is
//! statically inspectable and testable. The tracker's stage index is the
//! position within these lists.

use std::collections::HashMap;
use std::sync::Arc;

use crate::models::{EntityKind, PipelineKind};

use super::Pipeline;

/// One stage declaration in an entity's ordered pipeline list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageSpec {
    pub kind: PipelineKind,
    /// Later stages are skipped (not attempted) when a hard dependency
    /// fails: a group that was never created on the destination cannot
    /// receive members or labels.
    pub hard_dependency: bool,
}

/// Stage order shared by groups and projects
///
/// Subgroup discovery is declared for both kinds; its applicability
/// predicate rejects projects, which the runner records as `Skipped`.
const STAGES: &[StageSpec] = &[
    StageSpec {
        kind: PipelineKind::EntityAttributes,
        hard_dependency: true,
    },
    StageSpec {
        kind: PipelineKind::SubgroupDiscovery,
        hard_dependency: false,
    },
    StageSpec {
        kind: PipelineKind::Members,
        hard_dependency: false,
    },
    StageSpec {
        kind: PipelineKind::Labels,
        hard_dependency: false,
    },
    StageSpec {
        kind: PipelineKind::Milestones,
        hard_dependency: false,
    },
    StageSpec {
        kind: PipelineKind::Badges,
        hard_dependency: false,
    },
];

/// Ordered stage list for one entity kind
pub fn stages_for(kind: EntityKind) -> &'static [StageSpec] {
    match kind {
        EntityKind::Group | EntityKind::Project => STAGES,
    }
}

/// Instantiated pipelines keyed by stage kind
///
/// Built once per engine instance; the importer looks pipelines up here by
/// the registry's declared order.
#[derive(Clone, Default)]
pub struct PipelineSet {
    pipelines: HashMap<PipelineKind, Arc<dyn Pipeline>>,
}

impl PipelineSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pipeline under its own declared kind
    pub fn register(mut self, pipeline: Arc<dyn Pipeline>) -> Self {
        self.pipelines.insert(pipeline.kind(), pipeline);
        self
    }

    pub fn get(&self, kind: PipelineKind) -> Option<&Arc<dyn Pipeline>> {
        self.pipelines.get(&kind)
    }

    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }
}
