//! Aggregate cost estimation over a finished plan.

use serde::{Deserialize, Serialize};

use crate::error::CoreResult;
use crate::hw::HwParameters;
use crate::query::{ExecutionPlan, ExecutionTrigger};

use super::runtime::RuntimeEstimator;

/// Seconds in the 30-day month capacity prices are quoted against.
pub const SECONDS_PER_MONTH: f64 = 30.0 * 24.0 * 60.0 * 60.0;

const REQUESTS_PER_PRICE_UNIT: f64 = 1_000.0;
const BYTES_PER_GB: f64 = 1.0e9;

/// Cost breakdown for one simulated run, in USD.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CostSummary {
    /// Instance-hours consumed by all plan rows.
    pub compute: f64,
    /// Cache capacity over the plan timespan plus request charges.
    pub storage: f64,
    /// Compute cost of rows that never ran inside the input horizon.
    pub pending: f64,
    /// compute + storage.
    pub total: f64,
}

/// Prices a plan for one hardware profile. The latency jitter seed is
/// fixed per calculator so repeated cost queries agree with each other.
#[derive(Debug, Clone)]
pub struct PricingCalculator {
    hw: HwParameters,
    jitter_seed: u64,
}

impl PricingCalculator {
    /// Build a calculator for a validated hardware profile.
    pub fn new(hw: HwParameters, jitter_seed: u64) -> CoreResult<Self> {
        hw.validate()?;
        Ok(Self { hw, jitter_seed })
    }

    /// Summed plan runtime in seconds.
    pub fn total_runtime(&self, plan: &ExecutionPlan) -> CoreResult<f64> {
        let mut estimator = RuntimeEstimator::new(self.hw.clone(), self.jitter_seed)?;
        Ok(estimator.total_runtime(plan))
    }

    /// Instance cost of executing the whole plan.
    pub fn compute_cost(&self, plan: &ExecutionPlan) -> CoreResult<f64> {
        Ok(self.summarize(plan, 0)?.compute)
    }

    /// Cache capacity cost over the plan timespan, plus per-request
    /// charges for object-store caches.
    #[must_use]
    pub fn storage_cost(&self, plan: &ExecutionPlan, cache_usage_bytes: i64) -> f64 {
        let capacity_cost = cache_usage_bytes as f64 * self.hw.cache.cost_per_gb / BYTES_PER_GB
            * (plan.timespan_seconds() / SECONDS_PER_MONTH);

        if self.hw.cache.kind.is_object_store() {
            let puts =
                plan.total_cache_writes() as f64 * self.hw.cache.put_cost / REQUESTS_PER_PRICE_UNIT;
            let gets =
                plan.total_cache_reads() as f64 * self.hw.cache.get_cost / REQUESTS_PER_PRICE_UNIT;
            capacity_cost + puts + gets
        } else {
            capacity_cost
        }
    }

    /// Compute cost restricted to trailing `pending` rows.
    pub fn pending_cost(&self, plan: &ExecutionPlan) -> CoreResult<f64> {
        Ok(self.summarize(plan, 0)?.pending)
    }

    /// Full breakdown in one pass, sharing a single jitter sequence so the
    /// pending slice is priced consistently with the compute total.
    pub fn summarize(&self, plan: &ExecutionPlan, cache_usage_bytes: i64) -> CoreResult<CostSummary> {
        let mut estimator = RuntimeEstimator::new(self.hw.clone(), self.jitter_seed)?;
        let runtimes = estimator.plan_runtimes(plan);
        let hourly_rate = self.hw.instance.price_per_hour / 3_600.0;

        let mut compute = 0.0;
        let mut pending = 0.0;
        for (row, runtime) in plan.rows().iter().zip(&runtimes) {
            let cost = runtime * hourly_rate;
            compute += cost;
            if row.execution_trigger == ExecutionTrigger::Pending {
                pending += cost;
            }
        }

        let storage = self.storage_cost(plan, cache_usage_bytes);
        Ok(CostSummary {
            compute,
            storage,
            pending,
            total: compute + storage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hw::{CacheServiceParams, InstanceParams};
    use crate::query::{Execution, PlanRow};
    use crate::testutil::{read_query, write_query, ts};

    fn calculator() -> PricingCalculator {
        let hw = HwParameters {
            instance: InstanceParams::c5n_large(),
            cache: CacheServiceParams::s3().without_latency_jitter(),
        };
        PricingCalculator::new(hw, 0).unwrap()
    }

    #[test]
    fn empty_plan_costs_nothing() {
        let plan = ExecutionPlan::new();
        let summary = calculator().summarize(&plan, 0).unwrap();
        assert_eq!(summary.compute, 0.0);
        assert_eq!(summary.storage, 0.0);
        assert_eq!(summary.pending, 0.0);
        assert_eq!(summary.total, 0.0);
    }

    #[test]
    fn compute_cost_scales_with_runtime() {
        let mut plan = ExecutionPlan::new();
        let mut query = read_query("q1", ts(0));
        query.bytes_scanned = 0;
        query.result_size = 0;
        query.intermediate_result_size = 0;
        query.cpu_time = 7_200.0; // 3600 s at 2 vCPUs
        plan.push(PlanRow::immediate(query));

        let cost = calculator().compute_cost(&plan).unwrap();
        assert!((cost - 0.108).abs() < 1e-9);
    }

    #[test]
    fn storage_cost_includes_request_charges_for_s3() {
        let mut plan = ExecutionPlan::new();
        let mut row = PlanRow::immediate(read_query("q1", ts(0)));
        row.cache_writes = 2_000;
        row.cache_reads = 1_000;
        plan.push(row);
        let mut late = PlanRow::immediate(read_query("q2", ts(SECONDS_PER_MONTH as i64)));
        late.cache_reads = 0;
        plan.push(late);

        // 1 GB held for exactly one month + 2000 puts + 1000 gets
        let storage = calculator().storage_cost(&plan, 1_000_000_000);
        let expected = 0.023 + 2_000.0 * 0.005 / 1_000.0 + 1_000.0 * 0.0004 / 1_000.0;
        assert!((storage - expected).abs() < 1e-9);
    }

    #[test]
    fn pending_rows_price_separately() {
        let mut plan = ExecutionPlan::new();
        let mut executed = write_query("w1", ts(0), "t1");
        executed.cpu_time = 3_600.0;
        plan.push(PlanRow::immediate(executed));

        let mut left_over = write_query("w2", ts(10), "t1");
        left_over.cpu_time = 3_600.0;
        let row = PlanRow::new(left_over, Execution::Normal, ExecutionTrigger::Pending);
        plan.push(row);

        let summary = calculator().summarize(&plan, 0).unwrap();
        assert!(summary.pending > 0.0);
        assert!((summary.compute - 2.0 * summary.pending).abs() < 1e-12);
    }
}
