//! Parallel evaluation sweeps.
//!
//! Independent runs are a pure function of (workload, config, seed), so a
//! sweep over model kinds and cache capacities fans out across a rayon
//! pool with one isolated cache/graph/plan set per point. Results come
//! back in point order regardless of scheduling.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::cache::CacheConfig;
use crate::error::CoreResult;
use crate::hw::HwParameters;
use crate::models::{evaluate, HybridConfig, ModelEvaluation, ModelKind};
use crate::workload::Workload;

/// One (strategy, capacity) point of a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SweepPoint {
    /// Strategy to run.
    pub model: ModelKind,
    /// Cache capacity bound in bytes, `None` for unbounded.
    pub max_capacity: Option<i64>,
}

/// Evaluation of one sweep point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SweepOutcome {
    /// The point that produced this outcome.
    pub point: SweepPoint,
    /// Plan-derived runtime and cost figures.
    pub evaluation: ModelEvaluation,
}

/// Sweep runner: one workload, one hardware profile, many points.
#[derive(Debug, Clone)]
pub struct EvaluationSweep {
    workload: Workload,
    hw: HwParameters,
    cache_config: CacheConfig,
    hybrid_config: HybridConfig,
    jitter_seed: u64,
}

impl EvaluationSweep {
    /// A sweep over the given workload and base configurations. Per-point
    /// capacities override the base cache capacity.
    pub fn new(
        workload: Workload,
        hw: HwParameters,
        cache_config: CacheConfig,
        hybrid_config: HybridConfig,
        jitter_seed: u64,
    ) -> CoreResult<Self> {
        hw.validate()?;
        cache_config.validate()?;
        hybrid_config.validate()?;
        // points override max_capacity; everything else is shared
        Ok(Self {
            workload,
            hw,
            cache_config,
            hybrid_config,
            jitter_seed,
        })
    }

    /// The cartesian product of models and capacities.
    #[must_use]
    pub fn points(models: &[ModelKind], capacities: &[Option<i64>]) -> Vec<SweepPoint> {
        models
            .iter()
            .flat_map(|&model| {
                capacities
                    .iter()
                    .map(move |&max_capacity| SweepPoint {
                        model,
                        max_capacity,
                    })
            })
            .collect()
    }

    /// Run every point in parallel. Each point owns an isolated cache,
    /// graph, and plan; the shared workload is cloned per worker.
    pub fn run(&self, points: &[SweepPoint]) -> CoreResult<Vec<SweepOutcome>> {
        info!(points = points.len(), "starting evaluation sweep");
        points
            .par_iter()
            .map(|&point| self.run_point(point))
            .collect()
    }

    fn run_point(&self, point: SweepPoint) -> CoreResult<SweepOutcome> {
        let cache_config = CacheConfig {
            max_capacity: point.max_capacity,
            ..self.cache_config.clone()
        };
        let mut model = point
            .model
            .build(self.workload.clone(), cache_config, self.hybrid_config)?;
        let evaluation = evaluate(model.as_mut(), &self.hw, self.jitter_seed)?;
        Ok(SweepOutcome { point, evaluation })
    }
}
