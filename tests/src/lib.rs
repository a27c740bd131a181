//! Shared fixtures for the end-to-end suites.

use steadysim_core::{
    CacheConfig, CacheServiceParams, HwParameters, HybridConfig, InstanceParams, LoadReference,
    Workload,
};
use steadysim_workload::{ScheduleProfile, WorkloadGenerator, WorkloadProfile};

/// A mid-sized generated workload: three simulated hours, moderate
/// repetition, default query mix.
pub fn generated_workload(seed: u64) -> Workload {
    let profile = WorkloadProfile {
        size: 200,
        repetitiveness: 0.4,
        schedule: ScheduleProfile {
            duration_hours: 3,
            ..ScheduleProfile::default()
        },
        ..WorkloadProfile::default()
    };
    WorkloadGenerator::new(profile)
        .generate(seed)
        .expect("default profile generates")
}

/// The c5n.large / S3 profile with latency jitter disabled for exact
/// reproducibility.
#[must_use]
pub fn hw_no_jitter() -> HwParameters {
    HwParameters {
        instance: InstanceParams::c5n_large(),
        cache: CacheServiceParams::s3().without_latency_jitter(),
    }
}

/// Unbounded S3-priced cache.
#[must_use]
pub fn cache_config() -> CacheConfig {
    CacheConfig::unbounded()
}

/// Hybrid knobs over the workload's median magnitudes.
#[must_use]
pub fn hybrid_config(workload: &Workload) -> HybridConfig {
    HybridConfig::new(LoadReference::median_of(workload))
}
