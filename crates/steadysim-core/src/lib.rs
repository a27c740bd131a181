#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::module_name_repetitions,
    clippy::float_cmp,
    clippy::similar_names
)]
//! # SteadySim Core
//!
//! Offline, deterministic simulation of caching and execution strategies
//! for analytical query workloads against a remote object store.
//!
//! A timestamp-ordered stream of read and write queries enters one of four
//! execution models. The model consults a repetition-aware result cache
//! and a read-after-write dependency graph, decides per query whether it
//! runs from scratch, serves from cache, refreshes incrementally, or is
//! deferred, and emits an execution plan. The pricing layer then converts
//! the plan into per-row runtimes and aggregate compute/storage cost for a
//! given hardware profile.
//!
//! The whole run is a pure function of (workload, configuration, seed):
//! the core is single-threaded and synchronous, and the only random draw
//! (cache request latency jitter) is seeded explicitly. Independent runs
//! are embarrassingly parallel; see [`sweep`].

pub mod cache;
pub mod error;
pub mod graph;
pub mod hw;
pub mod load;
pub mod models;
pub mod pricing;
pub mod query;
pub mod sweep;
pub mod workload;


// Property-based invariant checks
#[cfg(test)]
mod proptest_suite;

// Shared fixtures for the test modules above
#[cfg(test)]
pub(crate) mod testutil;

pub use cache::{CacheConfig, CacheEntry, CacheInsights, RepetitionAwareCache};
pub use error::{CoreError, CoreResult};
pub use graph::{DependencyGraph, NodeId};
pub use hw::{CacheServiceKind, CacheServiceParams, HwParameters, InstanceParams};
pub use load::{estimate_load, LoadReference};
pub use models::{
    evaluate, EagerModel, ExecutionModel, HybridConfig, HybridModel, LazyModel, ModelEvaluation,
    ModelKind, OneOffModel,
};
pub use pricing::{CostSummary, PricingCalculator, RuntimeEstimator};
pub use query::{Execution, ExecutionPlan, ExecutionTrigger, PlanRow, Query, QueryKind};
pub use sweep::{EvaluationSweep, SweepOutcome, SweepPoint};
pub use workload::Workload;
