#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::module_name_repetitions,
    clippy::float_cmp
)]
//! # SteadySim Workload
//!
//! Collaborators of the simulation core: everything that produces or
//! transports a typed query stream without reaching into model
//! internals.
//!
//! - [`generator`] draws reproducible synthetic workloads from a
//!   [`profile::WorkloadProfile`] and a seed;
//! - [`csv`] moves workloads and execution plans through rectangular CSV
//!   with a stable column set;
//! - [`insights`] characterizes a workload (repetitiveness, hourly load
//!   profile, spikiness) before it is simulated.

pub mod csv;
pub mod error;
pub mod generator;
pub mod insights;
pub mod profile;
mod scheduler;
pub mod statistics;

pub use csv::{read_workload_csv, write_plan_csv, write_workload_csv};
pub use error::{WorkloadError, WorkloadResult};
pub use generator::WorkloadGenerator;
pub use insights::{KindFrequencies, WorkloadInsights};
pub use profile::{
    KindWeights, MagnitudeBounds, QueryProfile, ScheduleProfile, WorkloadProfile,
};
pub use statistics::{gamma_params, lognormal_params};
