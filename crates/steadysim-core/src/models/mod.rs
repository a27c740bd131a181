//! Execution strategies.
//!
//! Every model consumes a [`Workload`] in timestamp order and produces an
//! [`ExecutionPlan`]; which strategy runs is a constructor argument, not a
//! runtime switch. One-off, eager and lazy are degenerate cases of the
//! same data model the hybrid scheduler uses.

mod eager;
mod hybrid;
mod lazy;
mod one_off;

pub use eager::EagerModel;
pub use hybrid::{HybridConfig, HybridModel};
pub use lazy::LazyModel;
pub use one_off::OneOffModel;

use serde::{Deserialize, Serialize};

use crate::cache::{CacheConfig, CacheEntry, RepetitionAwareCache};
use crate::error::CoreResult;
use crate::hw::HwParameters;
use crate::load::{estimate_load, LoadReference};
use crate::pricing::{CostSummary, PricingCalculator};
use crate::query::{Execution, ExecutionPlan, ExecutionTrigger, PlanRow, Query};
use crate::workload::Workload;

/// Which execution strategy a simulation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelKind {
    /// Every query runs from scratch; no cache, no dependency graph.
    OneOff,
    /// Writes refresh affected cache entries immediately.
    Eager,
    /// Writes accumulate; reads flush their dependency closure.
    Lazy,
    /// Per-hour admission control with deferred writes and opportunistic
    /// refresh.
    Hybrid,
}

impl ModelKind {
    /// Stable label used in exports and sweep outputs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OneOff => "one-off",
            Self::Eager => "eager",
            Self::Lazy => "lazy",
            Self::Hybrid => "hybrid",
        }
    }

    /// Construct the strategy for a workload. The cache configuration is
    /// ignored by one-off; the hybrid configuration only matters for
    /// hybrid.
    pub fn build(
        self,
        workload: Workload,
        cache_config: CacheConfig,
        hybrid_config: HybridConfig,
    ) -> CoreResult<Box<dyn ExecutionModel>> {
        Ok(match self {
            Self::OneOff => Box::new(OneOffModel::new(workload)),
            Self::Eager => Box::new(EagerModel::new(workload, cache_config)?),
            Self::Lazy => Box::new(LazyModel::new(workload, cache_config)?),
            Self::Hybrid => Box::new(HybridModel::new(workload, cache_config, hybrid_config)?),
        })
    }
}

/// An execution strategy over one workload.
pub trait ExecutionModel {
    /// Generate the plan on first call; later calls return the same plan.
    fn plan(&mut self) -> CoreResult<&ExecutionPlan>;

    /// The strategy this model implements.
    fn kind(&self) -> ModelKind;

    /// The result cache, for strategies that keep one.
    fn cache(&self) -> Option<&RepetitionAwareCache>;
}

/// Plan-derived figures for one finished run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelEvaluation {
    /// Strategy that produced the plan.
    pub kind: ModelKind,
    /// Summed runtime over all plan rows, seconds.
    pub total_runtime: f64,
    /// Cost breakdown.
    pub cost: CostSummary,
    /// Cache bytes resident at end of run.
    pub cache_usage: i64,
    /// Number of plan rows emitted.
    pub plan_rows: usize,
}

/// Run the estimators over a model's plan.
pub fn evaluate(
    model: &mut dyn ExecutionModel,
    hw: &HwParameters,
    jitter_seed: u64,
) -> CoreResult<ModelEvaluation> {
    model.plan()?;
    let cache_usage = model.cache().map_or(0, RepetitionAwareCache::usage);
    let kind = model.kind();

    let calculator = PricingCalculator::new(hw.clone(), jitter_seed)?;
    let plan = model.plan()?;
    let cost = calculator.summarize(plan, cache_usage)?;
    let total_runtime = calculator.total_runtime(plan)?;

    Ok(ModelEvaluation {
        kind,
        total_runtime,
        cost,
        cache_usage,
        plan_rows: plan.len(),
    })
}

/// The row shape for a read answered straight from the cache: nothing is
/// scanned, computed, or written; one cache read is paid.
pub(crate) fn served_from_cache_row(query: Query, trigger: ExecutionTrigger) -> PlanRow {
    let mut served = query;
    served.bytes_scanned = 0;
    served.cpu_time = 0.0;
    served.write_volume = 0;
    let fingerprint = served.fingerprint.clone();

    let mut row = PlanRow::new(served, Execution::Incremental, trigger);
    row.triggered_by = Some(fingerprint);
    row.was_cached = true;
    row.cache_reads += 1;
    row
}

/// Rewrite `base` into a delta-sized incremental refresh of a dirty entry
/// and re-put the refreshed state, which clears the entry's dirty flag and
/// accumulated delta. The caller owns trigger semantics and load
/// accounting.
pub(crate) fn refresh_from_delta(
    cache: &mut RepetitionAwareCache,
    base: Query,
    entry: &CacheEntry,
    trigger: ExecutionTrigger,
    triggered_by: Option<String>,
    load_reference: Option<&LoadReference>,
) -> PlanRow {
    let delta = entry.delta;
    let mut refreshed = base;
    refreshed.bytes_scanned = delta;
    refreshed.result_size = (entry.query.scan_to_result_ratio * delta as f64).round() as i64;
    refreshed.intermediate_result_size =
        (entry.query.scan_to_i_result_ratio * delta as f64).round() as i64;
    if let Some(reference) = load_reference {
        refreshed.load = estimate_load(&refreshed, reference);
    }

    let fingerprint = refreshed.fingerprint.clone();
    let mut row = PlanRow::new(refreshed, Execution::Incremental, trigger);
    row.triggered_by = triggered_by;
    row.cache_reads += 1;
    if cache.put(&fingerprint, CacheEntry::clean(row.query.clone())) {
        row.cache_result = true;
        row.cache_ir = true;
        row.cache_writes += 1;
    }
    row
}
