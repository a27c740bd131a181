//! Write-triggered refresh: the cache is never allowed to go stale.
//!
//! Reads serve from the cache when possible and cache their result
//! otherwise. Every write immediately re-materializes all affected
//! entries as delta-sized incremental rows, so no dirty state and no
//! dependency graph exist in this strategy.

use tracing::debug;

use crate::cache::{CacheConfig, CacheEntry, RepetitionAwareCache};
use crate::error::CoreResult;
use crate::query::{Execution, ExecutionPlan, ExecutionTrigger, PlanRow, Query};
use crate::workload::Workload;

use super::{served_from_cache_row, ExecutionModel, ModelKind};

/// The eager strategy.
#[derive(Debug)]
pub struct EagerModel {
    workload: Workload,
    cache: RepetitionAwareCache,
    plan: Option<ExecutionPlan>,
}

impl EagerModel {
    /// An eager model over the workload with a fresh cache.
    pub fn new(workload: Workload, cache_config: CacheConfig) -> CoreResult<Self> {
        Ok(Self {
            workload,
            cache: RepetitionAwareCache::new(cache_config)?,
            plan: None,
        })
    }

    fn generate(&mut self) -> ExecutionPlan {
        let mut plan = ExecutionPlan::new();

        for query in self.workload.queries().to_vec() {
            if query.kind.is_write() {
                self.execute_write(query, &mut plan);
            } else if self.cache.get(&query.fingerprint).is_some() {
                plan.push(served_from_cache_row(query, ExecutionTrigger::Immediate));
            } else {
                self.execute_read_normal(query, &mut plan);
            }
        }

        plan
    }

    /// Emit the write itself, then one delta-sized refresh row per
    /// affected cache entry. The write pays one cache read for the
    /// affected-entry lookup and, when anything needs refreshing, one
    /// bulk cache write for pushing all refreshed state.
    fn execute_write(&mut self, query: Query, plan: &mut ExecutionPlan) {
        let affected: Vec<CacheEntry> = self.cache.affected_by(&query).cloned().collect();
        let delta = query.write_volume;

        let mut write_row = PlanRow::immediate(query.clone());
        write_row.cache_reads += 1;
        if !affected.is_empty() {
            write_row.cache_writes = 1;
            debug!(
                write = %query.fingerprint,
                affected = affected.len(),
                "write triggers eager refresh"
            );
        }
        plan.push(write_row);

        for entry in affected {
            let mut refreshed = entry.query.clone();
            refreshed.bytes_scanned = delta;
            refreshed.result_size = (refreshed.scan_to_result_ratio * delta as f64).round() as i64;
            refreshed.intermediate_result_size =
                (refreshed.scan_to_i_result_ratio * delta as f64).round() as i64;
            refreshed.timestamp = query.timestamp;
            refreshed.hour = query.hour;

            let mut row = PlanRow::new(
                refreshed,
                Execution::Incremental,
                ExecutionTrigger::TriggeredByWrite,
            );
            row.triggered_by = Some(query.fingerprint.clone());
            row.cache_result = true;
            row.cache_ir = true;
            plan.push(row);
        }
    }

    fn execute_read_normal(&mut self, query: Query, plan: &mut ExecutionPlan) {
        let mut row = PlanRow::immediate(query.clone());
        let fingerprint = query.fingerprint.clone();
        if self.cache.put(&fingerprint, CacheEntry::clean(query)) {
            row.cache_result = true;
            row.cache_ir = true;
            row.cache_writes += 1;
        }
        plan.push(row);
    }
}

impl ExecutionModel for EagerModel {
    fn plan(&mut self) -> CoreResult<&ExecutionPlan> {
        if self.plan.is_none() {
            let plan = self.generate();
            self.plan = Some(plan);
        }
        Ok(self.plan.get_or_insert_with(ExecutionPlan::new))
    }

    fn kind(&self) -> ModelKind {
        ModelKind::Eager
    }

    fn cache(&self) -> Option<&RepetitionAwareCache> {
        Some(&self.cache)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{read_query, write_query, ts};

    fn model(queries: Vec<Query>) -> EagerModel {
        let workload = Workload::from_queries(queries).unwrap();
        EagerModel::new(workload, CacheConfig::unbounded()).unwrap()
    }

    #[test]
    fn repeated_read_serves_from_cache() {
        let mut model = model(vec![read_query("q1", ts(0)), read_query("q1", ts(10))]);
        let plan = model.plan().unwrap();

        assert_eq!(plan.len(), 2);
        let first = &plan.rows()[0];
        assert!(first.cache_result && first.cache_ir);
        assert_eq!(first.cache_writes, 1);

        let second = &plan.rows()[1];
        assert!(second.was_cached);
        assert_eq!(second.query.bytes_scanned, 0);
        assert_eq!(second.query.cpu_time, 0.0);
        assert_eq!(second.query.write_volume, 0);
        assert_eq!(second.cache_reads, 1);

        let insights = model.cache.insights();
        assert_eq!(insights.cache_hits, 1);
        assert_eq!(insights.cache_misses, 1);
    }

    #[test]
    fn write_refreshes_affected_entries() {
        let mut write = write_query("w1", ts(20), "t1");
        write.write_volume = 400;
        let mut model = model(vec![read_query("q1", ts(0)), write]);
        let plan = model.plan().unwrap();

        assert_eq!(plan.len(), 3);
        let write_row = &plan.rows()[1];
        assert_eq!(write_row.execution, Execution::Normal);
        assert_eq!(write_row.cache_reads, 1);
        assert_eq!(write_row.cache_writes, 1);

        let refresh = &plan.rows()[2];
        assert_eq!(refresh.query.fingerprint, "q1");
        assert_eq!(refresh.execution, Execution::Incremental);
        assert_eq!(refresh.execution_trigger, ExecutionTrigger::TriggeredByWrite);
        assert_eq!(refresh.triggered_by.as_deref(), Some("w1"));
        assert_eq!(refresh.query.bytes_scanned, 400);
        // sized by the entry's scan-to-result ratios
        assert_eq!(refresh.query.result_size, 40);
        assert_eq!(refresh.query.intermediate_result_size, 20);
        assert_eq!(refresh.query.timestamp, ts(20));
    }

    #[test]
    fn write_to_untouched_table_refreshes_nothing() {
        let mut model = model(vec![
            read_query("q1", ts(0)),
            write_query("w1", ts(10), "unrelated"),
        ]);
        let plan = model.plan().unwrap();

        assert_eq!(plan.len(), 2);
        let write_row = &plan.rows()[1];
        assert_eq!(write_row.cache_writes, 0);
        assert_eq!(write_row.cache_reads, 1);
    }

    #[test]
    fn single_occurrence_reads_are_not_cached() {
        // repetition coefficient 0 keeps both reads out of the cache
        let mut q1 = read_query("q1", ts(0));
        let mut q2 = read_query("q2", ts(10));
        q1.repetition_coefficient = 0.0;
        q2.repetition_coefficient = 0.0;
        let mut model = model(vec![q1, q2]);
        let plan = model.plan().unwrap();

        for row in plan.rows() {
            assert!(!row.cache_result);
            assert_eq!(row.cache_writes, 0);
        }
        assert!(model.cache.is_empty());
    }
}
