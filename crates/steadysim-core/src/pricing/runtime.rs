//! Per-row runtime estimation.
//!
//! Runtime is the sum of a CPU term, a network term for base-table scans
//! and writes, a cache I/O term for the bytes a row moves in or out of the
//! result cache, and a per-request latency term. The latency draw is the
//! only randomness in the whole simulation; it is seeded explicitly and
//! collapses to a constant when the configured bounds coincide.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::CoreResult;
use crate::hw::HwParameters;
use crate::query::{ExecutionPlan, PlanRow};

/// 2³⁰, the advertised Gibit→bytes factor.
pub const GIB_TO_BYTES: f64 = 1_073_741_824.0;

/// Effective fraction of advertised bandwidth reachable against an object
/// store.
const OBJECT_STORE_NETWORK_SCALE: f64 = 0.8;

/// MB/s → bytes/s factor the gp3 throughput figures are quoted in.
const GP3_THROUGHPUT_TO_BYTES: f64 = 1.0e7;

const MS_TO_SECONDS: f64 = 1_000.0;

/// Converts plan rows into runtime seconds for a hardware profile.
#[derive(Debug)]
pub struct RuntimeEstimator {
    hw: HwParameters,
    rng: StdRng,
}

impl RuntimeEstimator {
    /// Build an estimator for a validated hardware profile. `seed` drives
    /// the latency jitter and nothing else.
    pub fn new(hw: HwParameters, seed: u64) -> CoreResult<Self> {
        hw.validate()?;
        Ok(Self {
            hw,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// Bytes per second the instance moves over the network. Scanning
    /// against an object store only reaches a fraction of the advertised
    /// bandwidth.
    #[must_use]
    pub fn network_speed(&self) -> f64 {
        let scale = if self.hw.cache.kind.is_object_store() {
            OBJECT_STORE_NETWORK_SCALE
        } else {
            1.0
        };
        self.hw.instance.network_speed_gibps * GIB_TO_BYTES * scale
    }

    /// Bytes per second for cache I/O: the network path for an object
    /// store, the provisioned volume throughput otherwise.
    #[must_use]
    pub fn cache_speed(&self) -> f64 {
        if self.hw.cache.kind.is_object_store() {
            self.network_speed()
        } else {
            self.hw
                .cache
                .throughput_mb_per_s
                .map_or(0.0, |throughput| throughput * GP3_THROUGHPUT_TO_BYTES)
        }
    }

    /// Runtime in seconds for one plan row.
    pub fn row_runtime(&mut self, row: &PlanRow) -> f64 {
        let query = &row.query;

        let cpu_time = query.cpu_time / self.hw.instance.vcpus;
        let network_time =
            (query.bytes_scanned + query.write_volume) as f64 / self.network_speed();

        let mut cache_bytes = 0_i64;
        if row.cache_result {
            cache_bytes += query.result_size;
        }
        if row.cache_ir {
            cache_bytes += query.intermediate_result_size;
        }
        if row.write_delta {
            cache_bytes += query.write_volume;
        }
        if row.was_cached {
            cache_bytes += query.result_size;
        }
        let cache_time = cache_bytes as f64 / self.cache_speed();

        let requests = (row.cache_reads + row.cache_writes) as f64;
        let latency = requests * self.draw_request_latency_seconds();

        cpu_time + network_time + cache_time + latency
    }

    /// Runtimes for every row, in plan order.
    pub fn plan_runtimes(&mut self, plan: &ExecutionPlan) -> Vec<f64> {
        plan.rows().iter().map(|row| self.row_runtime(row)).collect()
    }

    /// Summed runtime of the whole plan.
    pub fn total_runtime(&mut self, plan: &ExecutionPlan) -> f64 {
        self.plan_runtimes(plan).iter().sum()
    }

    fn draw_request_latency_seconds(&mut self) -> f64 {
        let min = self.hw.cache.request_latency_min_ms;
        let max = self.hw.cache.request_latency_max_ms;
        if max - min <= f64::EPSILON {
            min / MS_TO_SECONDS
        } else {
            self.rng.gen_range(min..max) / MS_TO_SECONDS
        }
    }
}
