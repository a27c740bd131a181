//! Read-triggered refresh: writes never execute eagerly.
//!
//! Writes accumulate in the dependency graph. A read flushes the closure
//! of writes it transitively depends on, which marks overlapping cache
//! entries dirty; the read then serves from cache, refreshes from the
//! accumulated delta, or runs from scratch. Writes nothing ever reads stay
//! pending and surface as trailing rows past the input horizon.

use tracing::debug;

use crate::cache::{CacheConfig, CacheEntry, RepetitionAwareCache};
use crate::error::CoreResult;
use crate::graph::DependencyGraph;
use crate::query::{Execution, ExecutionPlan, ExecutionTrigger, PlanRow, Query};
use crate::workload::Workload;

use super::{refresh_from_delta, served_from_cache_row, ExecutionModel, ModelKind};

/// The lazy strategy.
#[derive(Debug)]
pub struct LazyModel {
    workload: Workload,
    cache: RepetitionAwareCache,
    graph: DependencyGraph,
    plan: Option<ExecutionPlan>,
}

impl LazyModel {
    /// A lazy model over the workload with a fresh cache and graph.
    pub fn new(workload: Workload, cache_config: CacheConfig) -> CoreResult<Self> {
        Ok(Self {
            workload,
            cache: RepetitionAwareCache::new(cache_config)?,
            graph: DependencyGraph::new(),
            plan: None,
        })
    }

    fn generate(&mut self) -> CoreResult<ExecutionPlan> {
        let mut plan = ExecutionPlan::new();
        let max_hour = self.workload.max_hour();
        let last_timestamp = self.workload.last_timestamp();

        for query in self.workload.queries().to_vec() {
            if query.kind.is_write() {
                self.graph.add(query);
                continue;
            }
            self.execute_read(query, &mut plan)?;
        }

        // writes nothing read: trailing pending rows past the horizon
        let leftover: Vec<Query> = self
            .graph
            .pending_writes()
            .into_iter()
            .map(|(_, write)| write.clone())
            .collect();
        for mut write in leftover {
            write.hour = max_hour + 1;
            if let Some(timestamp) = last_timestamp {
                write.timestamp = timestamp;
            }
            plan.push(PlanRow::new(
                write,
                Execution::Normal,
                ExecutionTrigger::Pending,
            ));
        }

        Ok(plan)
    }

    fn execute_read(&mut self, query: Query, plan: &mut ExecutionPlan) -> CoreResult<()> {
        let read_id = self.graph.add(query.clone());
        let dep_ids = self.graph.transitive_deps(read_id);

        // flush the dependency closure just before the read, oldest first
        let flushed: Vec<Query> = dep_ids
            .iter()
            .filter_map(|id| self.graph.query(*id).cloned())
            .collect();
        if !flushed.is_empty() {
            debug!(
                read = %query.fingerprint,
                writes = flushed.len(),
                "read flushes pending writes"
            );
        }
        for write in &flushed {
            self.cache.mark_dirty(write);
            let mut flushed_write = write.clone();
            flushed_write.timestamp = query.timestamp;
            flushed_write.hour = query.hour;
            let mut row = PlanRow::new(
                flushed_write,
                Execution::Normal,
                ExecutionTrigger::TriggeredByRead,
            );
            row.triggered_by = Some(query.fingerprint.clone());
            plan.push(row);
        }
        self.graph.remove_with_deps(read_id)?;

        match self.cache.get(&query.fingerprint).cloned() {
            Some(entry) if entry.dirty => {
                let triggered_by = Some(query.fingerprint.clone());
                plan.push(refresh_from_delta(
                    &mut self.cache,
                    query,
                    &entry,
                    ExecutionTrigger::Immediate,
                    triggered_by,
                    None,
                ));
            }
            Some(_) => {
                plan.push(served_from_cache_row(query, ExecutionTrigger::Immediate));
            }
            None => {
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
        Ok(())
    }
}

impl ExecutionModel for LazyModel {
    fn plan(&mut self) -> CoreResult<&ExecutionPlan> {
        if self.plan.is_none() {
            let plan = self.generate()?;
            self.plan = Some(plan);
        }
        Ok(self.plan.get_or_insert_with(ExecutionPlan::new))
    }

    fn kind(&self) -> ModelKind {
        ModelKind::Lazy
    }

    fn cache(&self) -> Option<&RepetitionAwareCache> {
        Some(&self.cache)
    }
}
