//! The no-cache baseline: every query runs from scratch.

use crate::cache::RepetitionAwareCache;
use crate::error::CoreResult;
use crate::query::{ExecutionPlan, PlanRow};
use crate::workload::Workload;

use super::{ExecutionModel, ModelKind};

/// Emits one immediate, self-triggered, from-scratch row per input query.
#[derive(Debug)]
pub struct OneOffModel {
    workload: Workload,
    plan: Option<ExecutionPlan>,
}

impl OneOffModel {
    /// A baseline model over the workload.
    #[must_use]
    pub fn new(workload: Workload) -> Self {
        Self {
            workload,
            plan: None,
        }
    }
}

impl ExecutionModel for OneOffModel {
    fn plan(&mut self) -> CoreResult<&ExecutionPlan> {
        if self.plan.is_none() {
            let mut plan = ExecutionPlan::new();
            for query in &self.workload {
                plan.push(PlanRow::immediate(query.clone()));
            }
            self.plan = Some(plan);
        }
        Ok(self.plan.get_or_insert_with(ExecutionPlan::new))
    }

    fn kind(&self) -> ModelKind {
        ModelKind::OneOff
    }

    fn cache(&self) -> Option<&RepetitionAwareCache> {
        None
    }
}
