// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use tracing::debug;

use crate::allotment::Allotment;

use super::{Decision, ResizePolicy};

/// Result of one pass through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeOutcome {
    /// The tree was resized to this pool.
    Applied { pool: u64 },
    /// A stage vetoed the resize; capacities are unchanged.
    Skipped { stage: &'static str },
    /// The tree is not resized periodically (entry-counted trees).
    Unmanaged,
}

impl ResizeOutcome {
    #[must_use]
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }

    /// Label used in logs and metrics.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Applied { .. } => "applied",
            Self::Skipped { .. } => "skipped",
            Self::Unmanaged => "unmanaged",
        }
    }
}

/// Ordered list of [`ResizePolicy`] stages applied around the root's
/// capacity calculation.
#[derive(Default)]
pub struct ResizePipeline {
    stages: Vec<Box<dyn ResizePolicy>>,
}

impl ResizePipeline {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage. Stages run in insertion order.
    #[must_use]
    pub fn with_stage(mut self, stage: impl ResizePolicy + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    /// Run `available` through every stage and, unless one vetoes, resize
    /// `root` so that it is granted the resulting pool.
    pub fn resize(&mut self, root: &mut Allotment, available: u64) -> ResizeOutcome {
        let mut pool = available;
        for stage in &mut self.stages {
            match stage.adjust(pool) {
                Decision::Apply(adjusted) => pool = adjusted,
                Decision::Skip => {
                    let stage = stage.name();
                    debug!(available, stage, "Resize skipped");
                    return ResizeOutcome::Skipped { stage };
                }
            }
        }

        root.calc_capacity_top_level(pool);
        for stage in &mut self.stages {
            stage.commit(pool);
        }
        ResizeOutcome::Applied { pool }
    }

    /// Clear every stage's learned baseline.
    pub fn rebase(&mut self) {
        for stage in &mut self.stages {
            stage.rebase();
        }
    }
}

impl std::fmt::Debug for ResizePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResizePipeline")
            .field("stages", &self.stage_names())
            .finish()
    }
}
