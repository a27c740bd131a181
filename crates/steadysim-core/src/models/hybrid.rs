//! The hybrid scheduler: admission control, deferred writes, and
//! opportunistic refresh in one strategy.
//!
//! Each hour carries a soft load budget derived from the workload's mean
//! hourly load. Writes are admitted against the budget together with their
//! pending dependency closure; writes that do not fit stay in the graph.
//! At every hour boundary the scheduler drains idle capacity: it refreshes
//! dirty cache entries and retries pending writes against the fresh hourly
//! budget, stamping the emitted rows with the elapsed hour's last observed
//! timestamp. Reads are always admitted and account their actual work.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::{CacheConfig, CacheEntry, RepetitionAwareCache};
use crate::error::{CoreError, CoreResult};
use crate::graph::{DependencyGraph, NodeId};
use crate::load::{estimate_load, LoadReference};
use crate::query::{Execution, ExecutionPlan, ExecutionTrigger, PlanRow, Query};
use crate::workload::Workload;

use super::{refresh_from_delta, served_from_cache_row, ExecutionModel, ModelKind};

/// Scheduler tuning knobs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HybridConfig {
    /// Fraction of the mean hourly load admitted per hour.
    pub threshold_factor: f64,
    /// Reference magnitudes the load scores normalize against.
    pub load_reference: LoadReference,
    /// Dirty-entry refreshes attempted per drain pass.
    pub max_refreshes_per_drain: usize,
    /// Pending writes attempted per drain pass.
    pub max_write_drains: usize,
}

impl HybridConfig {
    /// Default knobs over the given load reference.
    #[must_use]
    pub fn new(load_reference: LoadReference) -> Self {
        Self {
            threshold_factor: 0.7,
            load_reference,
            max_refreshes_per_drain: 20,
            max_write_drains: 10,
        }
    }

    /// Reject knob settings the scheduler cannot run under.
    pub fn validate(&self) -> CoreResult<()> {
        if self.threshold_factor <= 0.0 {
            return Err(CoreError::config(format!(
                "threshold_factor must be positive, got {}",
                self.threshold_factor
            )));
        }
        if self.max_refreshes_per_drain == 0 || self.max_write_drains == 0 {
            return Err(CoreError::config("drain batch sizes must be at least 1"));
        }
        Ok(())
    }
}

/// The hybrid strategy.
#[derive(Debug)]
pub struct HybridModel {
    workload: Workload,
    config: HybridConfig,
    cache: RepetitionAwareCache,
    graph: DependencyGraph,
    threshold: f64,
    hourly_load: HashMap<i64, f64>,
    current_hour: i64,
    last_seen: Option<DateTime<Utc>>,
    plan: Option<ExecutionPlan>,
}

impl HybridModel {
    /// A hybrid model over the workload. Loads are (re)assigned from the
    /// configured reference so the admission threshold and the hourly
    /// accounting agree on one scale.
    pub fn new(
        mut workload: Workload,
        cache_config: CacheConfig,
        config: HybridConfig,
    ) -> CoreResult<Self> {
        config.validate()?;
        let cache = RepetitionAwareCache::new(cache_config)?;
        workload.assign_loads(&config.load_reference);

        let threshold = config.threshold_factor * mean_hourly_load(&workload);
        debug!(threshold, "hybrid admission threshold");

        Ok(Self {
            workload,
            config,
            cache,
            graph: DependencyGraph::new(),
            threshold,
            hourly_load: HashMap::new(),
            current_hour: 1,
            last_seen: None,
            plan: None,
        })
    }

    /// The per-hour admission threshold this run schedules against.
    #[must_use]
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Load admitted so far for `hour`.
    #[must_use]
    pub fn hourly_load(&self, hour: i64) -> f64 {
        self.hourly_load.get(&hour).copied().unwrap_or(0.0)
    }

    fn generate(&mut self) -> CoreResult<ExecutionPlan> {
        let mut plan = ExecutionPlan::new();
        let max_hour = self.workload.max_hour();

        for query in self.workload.queries().to_vec() {
            while query.hour > self.current_hour {
                self.current_hour += 1;
                self.drain_idle_capacity(&mut plan)?;
            }
            self.last_seen = Some(query.timestamp);

            if query.kind.is_write() {
                let id = self.graph.add(query.clone());
                let admitted =
                    self.try_execute_write(id, ExecutionTrigger::Immediate, query.timestamp, &mut plan)?;
                if !admitted {
                    debug!(
                        write = %query.fingerprint,
                        hour = query.hour,
                        "write deferred: hourly budget exhausted"
                    );
                }
            } else {
                self.execute_read(query, &mut plan)?;
            }
        }

        // writes never admitted: trailing pending rows past the horizon
        let leftover: Vec<Query> = self
            .graph
            .pending_writes()
            .into_iter()
            .map(|(_, write)| write.clone())
            .collect();
        for mut write in leftover {
            write.hour = max_hour + 1;
            if let Some(timestamp) = self.last_seen {
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

    fn remaining_budget(&self) -> f64 {
        self.threshold - self.hourly_load(self.current_hour)
    }

    fn account(&mut self, load: f64) {
        *self.hourly_load.entry(self.current_hour).or_insert(0.0) += load;
    }

    /// End-of-hour opportunistic work: refresh dirty entries and retry
    /// pending writes while the hour still has budget, until neither step
    /// makes progress.
    fn drain_idle_capacity(&mut self, plan: &mut ExecutionPlan) -> CoreResult<()> {
        loop {
            if self.remaining_budget() <= 0.0 {
                break;
            }
            let refreshed = self.refresh_dirty_entries(plan);
            let drained = self.drain_pending_writes(plan)?;
            if refreshed == 0 && drained == 0 {
                break;
            }
        }
        Ok(())
    }

    /// Refresh the most valuable dirty entries first: repetition
    /// coefficient, then load, fingerprints as the final tie-break.
    fn refresh_dirty_entries(&mut self, plan: &mut ExecutionPlan) -> usize {
        let mut candidates: Vec<(String, f64, f64)> = self
            .cache
            .dirty_entries()
            .map(|entry| {
                (
                    entry.query.fingerprint.clone(),
                    entry.query.repetition_coefficient,
                    entry.query.load,
                )
            })
            .collect();
        candidates.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal))
                .then(a.0.cmp(&b.0))
        });
        candidates.truncate(self.config.max_refreshes_per_drain);

        let mut refreshed = 0;
        for (fingerprint, _, _) in candidates {
            if self.remaining_budget() <= 0.0 {
                break;
            }
            let Some(entry) = self.cache.get(&fingerprint).cloned() else {
                continue;
            };
            let mut base = entry.query.clone();
            if let Some(timestamp) = self.last_seen {
                base.timestamp = timestamp;
            }
            base.hour = self.current_hour;

            let row = refresh_from_delta(
                &mut self.cache,
                base,
                &entry,
                ExecutionTrigger::Deferred,
                None,
                Some(&self.config.load_reference),
            );
            self.account(row.query.load);
            plan.push(row);
            refreshed += 1;
        }
        if refreshed > 0 {
            debug!(refreshed, hour = self.current_hour, "drained dirty entries");
        }
        refreshed
    }

    /// Retry pending writes in (hour asc, id asc) order, stopping at the
    /// first that does not fit the remaining budget.
    fn drain_pending_writes(&mut self, plan: &mut ExecutionPlan) -> CoreResult<usize> {
        let Some(timestamp) = self.last_seen else {
            return Ok(0);
        };
        let candidates: Vec<NodeId> = self
            .graph
            .pending_writes()
            .iter()
            .map(|(id, _)| *id)
            .take(self.config.max_write_drains)
            .collect();

        let mut drained = 0;
        for id in candidates {
            // earlier drains may have flushed this node as a dependency
            if !self.graph.contains(id) {
                continue;
            }
            if !self.try_execute_write(id, ExecutionTrigger::Deferred, timestamp, plan)? {
                break;
            }
            drained += 1;
        }
        Ok(drained)
    }

    /// Admit the write at `id` together with its pending dependency
    /// closure, or leave it in the graph when the closure does not fit the
    /// hour's remaining budget.
    fn try_execute_write(
        &mut self,
        id: NodeId,
        trigger: ExecutionTrigger,
        timestamp: DateTime<Utc>,
        plan: &mut ExecutionPlan,
    ) -> CoreResult<bool> {
        let query = self
            .graph
            .query(id)
            .cloned()
            .ok_or_else(|| CoreError::graph_misuse(format!("executing unknown write {id}")))?;
        let dep_ids = self.graph.transitive_deps(id);
        let deps: Vec<Query> = dep_ids
            .iter()
            .filter_map(|dep| self.graph.query(*dep).cloned())
            .collect();

        let required: f64 = query.load + deps.iter().map(|dep| dep.load).sum::<f64>();
        if self.remaining_budget() < required {
            return Ok(false);
        }

        for dep in &deps {
            self.cache.mark_dirty(dep);
            let mut dep_query = dep.clone();
            dep_query.timestamp = timestamp;
            dep_query.hour = self.current_hour;
            let mut row = PlanRow::new(
                dep_query,
                Execution::Normal,
                ExecutionTrigger::TriggeredByWrite,
            );
            row.triggered_by = Some(query.fingerprint.clone());
            plan.push(row);
        }

        self.cache.mark_dirty(&query);
        let mut write_query = query.clone();
        write_query.timestamp = timestamp;
        write_query.hour = self.current_hour;
        let mut row = PlanRow::new(write_query, Execution::Normal, trigger);
        if trigger == ExecutionTrigger::Immediate {
            row.triggered_by = Some(query.fingerprint.clone());
        }
        row.cache_reads += 1;
        plan.push(row);

        self.account(required);
        self.graph.remove_with_deps(id)?;
        Ok(true)
    }

    /// Reads are always admitted: flush the pending closure, then serve
    /// from cache, refresh from the accumulated delta, or run from
    /// scratch.
    fn execute_read(&mut self, query: Query, plan: &mut ExecutionPlan) -> CoreResult<()> {
        let read_id = self.graph.add(query.clone());
        let dep_ids = self.graph.transitive_deps(read_id);
        let flushed: Vec<Query> = dep_ids
            .iter()
            .filter_map(|id| self.graph.query(*id).cloned())
            .collect();

        for write in &flushed {
            self.cache.mark_dirty(write);
            let mut flushed_write = write.clone();
            flushed_write.timestamp = query.timestamp;
            flushed_write.hour = self.current_hour;
            let load = flushed_write.load;
            let mut row = PlanRow::new(
                flushed_write,
                Execution::Normal,
                ExecutionTrigger::TriggeredByRead,
            );
            row.triggered_by = Some(query.fingerprint.clone());
            plan.push(row);
            self.account(load);
        }
        self.graph.remove_with_deps(read_id)?;

        match self.cache.get(&query.fingerprint).cloned() {
            Some(entry) if entry.dirty => {
                let triggered_by = Some(query.fingerprint.clone());
                let row = refresh_from_delta(
                    &mut self.cache,
                    query,
                    &entry,
                    ExecutionTrigger::Immediate,
                    triggered_by,
                    Some(&self.config.load_reference),
                );
                self.account(row.query.load);
                plan.push(row);
            }
            Some(_) => {
                let mut row = served_from_cache_row(query, ExecutionTrigger::Immediate);
                row.query.load = estimate_load(&row.query, &self.config.load_reference);
                self.account(row.query.load);
                plan.push(row);
            }
            None => {
                let mut row = PlanRow::immediate(query.clone());
                let fingerprint = query.fingerprint.clone();
                if self.cache.put(&fingerprint, CacheEntry::clean(query)) {
                    row.cache_result = true;
                    row.cache_ir = true;
                    row.cache_writes += 1;
                }
                self.account(row.query.load);
                plan.push(row);
            }
        }
        Ok(())
    }
}

impl ExecutionModel for HybridModel {
    fn plan(&mut self) -> CoreResult<&ExecutionPlan> {
        if self.plan.is_none() {
            let plan = self.generate()?;
            self.plan = Some(plan);
        }
        Ok(self.plan.get_or_insert_with(ExecutionPlan::new))
    }

    fn kind(&self) -> ModelKind {
        ModelKind::Hybrid
    }

    fn cache(&self) -> Option<&RepetitionAwareCache> {
        Some(&self.cache)
    }
}

/// Mean of the per-hour load sums over hours 1..=max. Hours without
/// queries contribute zero, so this is the load total over the hour span.
fn mean_hourly_load(workload: &Workload) -> f64 {
    let max_hour = workload.max_hour();
    if max_hour == 0 {
        return 0.0;
    }
    let total: f64 = workload.queries().iter().map(|query| query.load).sum();
    total / max_hour as f64
}
