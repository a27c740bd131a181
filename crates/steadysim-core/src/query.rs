//! Canonical row schema for workloads and execution plans.
//!
//! A [`Query`] is one row of the workload stream; a [`PlanRow`] is one row
//! of the execution plan an execution model emits. Column names and value
//! domains are stable across tools, so the serde names here are load-bearing.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of a workload query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryKind {
    /// Read-only query; the only kind eligible for result caching.
    Select,
    /// Appends rows to its write table.
    Insert,
    /// Rewrites rows in place.
    Update,
    /// Removes rows.
    Delete,
}

impl QueryKind {
    /// True for `select`.
    #[must_use]
    pub fn is_read(self) -> bool {
        matches!(self, Self::Select)
    }

    /// True for any mutating kind.
    #[must_use]
    pub fn is_write(self) -> bool {
        !self.is_read()
    }

    /// Stable column value.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Select => "select",
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

/// How a plan row runs: from scratch or against cached state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Execution {
    /// Full execution, scanning base tables.
    Normal,
    /// Delta-sized execution against a materialized cache entry, or a
    /// direct cache serve.
    Incremental,
}

impl Execution {
    /// Stable column value.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Incremental => "incremental",
        }
    }
}

/// Why a plan row was emitted when it was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionTrigger {
    /// Ran at its own arrival timestamp.
    Immediate,
    /// A pending write flushed because a later read depended on it.
    TriggeredByRead,
    /// A cache refresh caused by a write to an overlapping table.
    TriggeredByWrite,
    /// Scheduled opportunistically by the hybrid drain loop.
    Deferred,
    /// Never admitted; emitted as a trailing row past the input horizon.
    Pending,
}

impl ExecutionTrigger {
    /// Stable column value.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Immediate => "immediate",
            Self::TriggeredByRead => "triggered_by_read",
            Self::TriggeredByWrite => "triggered_by_write",
            Self::Deferred => "deferred",
            Self::Pending => "pending",
        }
    }
}

/// One row of the workload stream.
///
/// `fingerprint` is a stable content-derived identifier: repeated
/// occurrences of the same query template collide on it. `hour` is the
/// 1-based bucket derived from the timestamp at ingest; `load` is the
/// resource-requirement score assigned by the load estimator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    /// Stable identifier shared by all repetitions of the same template.
    pub fingerprint: String,
    /// select / insert / update / delete.
    pub kind: QueryKind,
    /// Bytes read from base tables when executed from scratch.
    pub bytes_scanned: i64,
    /// Bytes of the materialized result.
    pub result_size: i64,
    /// Bytes of intermediate state a refresh would also materialize.
    pub intermediate_result_size: i64,
    /// Bytes written by mutating kinds; 0 for selects.
    pub write_volume: i64,
    /// CPU seconds on the reference instance.
    pub cpu_time: f64,
    /// Cluster/database the query runs against.
    pub db_instance_id: i64,
    /// Tables the query reads. A set at the core boundary; the
    /// comma-joined form exists only in the CSV transport.
    pub read_tables: BTreeSet<String>,
    /// Table a mutating query writes, absent for selects.
    pub write_table: Option<String>,
    /// 1-based hour bucket, derived once at ingest.
    pub hour: i64,
    /// Arrival time; the workload stream is sorted on this.
    pub timestamp: DateTime<Utc>,
    /// result_size / bytes_scanned at generation time, used to size
    /// incremental refreshes.
    pub scan_to_result_ratio: f64,
    /// intermediate_result_size / bytes_scanned at generation time.
    pub scan_to_i_result_ratio: f64,
    /// (occurrences of this fingerprint − 1) / workload size.
    pub repetition_coefficient: f64,
    /// Resource-requirement score, assigned by the load estimator.
    pub load: f64,
}

impl Query {
    /// Bytes a cache entry for this query would occupy.
    #[must_use]
    pub fn cached_size(&self) -> i64 {
        self.result_size + self.intermediate_result_size
    }
}

/// One row of an execution plan: the query that ran plus the mandatory
/// execution metadata and the cache interactions attributed to it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanRow {
    /// The query as it actually ran (magnitudes may be rewritten for
    /// incremental or served-from-cache rows).
    #[serde(flatten)]
    pub query: Query,
    /// normal or incremental.
    pub execution: Execution,
    /// Why this row was emitted.
    pub execution_trigger: ExecutionTrigger,
    /// Fingerprint of the query that caused this row, absent for
    /// scheduler-initiated (deferred/pending) rows.
    pub triggered_by: Option<String>,
    /// The result was served directly from cache.
    pub was_cached: bool,
    /// This row wrote its result bytes to the cache.
    pub cache_result: bool,
    /// This row wrote its intermediate-result bytes to the cache.
    pub cache_ir: bool,
    /// This row wrote its write-volume delta to the cache.
    pub write_delta: bool,
    /// Cache read requests attributed to this row.
    pub cache_reads: i64,
    /// Cache write requests attributed to this row.
    pub cache_writes: i64,
}

impl PlanRow {
    /// A plan row with no cache interaction and no trigger source.
    #[must_use]
    pub fn new(query: Query, execution: Execution, trigger: ExecutionTrigger) -> Self {
        Self {
            query,
            execution,
            execution_trigger: trigger,
            triggered_by: None,
            was_cached: false,
            cache_result: false,
            cache_ir: false,
            write_delta: false,
            cache_reads: 0,
            cache_writes: 0,
        }
    }

    /// An immediate, self-triggered, from-scratch row: the shape every
    /// model uses for plain execution.
    #[must_use]
    pub fn immediate(query: Query) -> Self {
        let fingerprint = query.fingerprint.clone();
        let mut row = Self::new(query, Execution::Normal, ExecutionTrigger::Immediate);
        row.triggered_by = Some(fingerprint);
        row
    }
}

/// An ordered execution plan, one row per executed (or pending) unit of
/// work, in emission order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExecutionPlan {
    rows: Vec<PlanRow>,
}

impl ExecutionPlan {
    /// An empty plan.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a row.
    pub fn push(&mut self, row: PlanRow) {
        self.rows.push(row);
    }

    /// All rows in emission order.
    #[must_use]
    pub fn rows(&self) -> &[PlanRow] {
        &self.rows
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when no rows were emitted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Wall-clock span covered by the plan, in seconds. Zero for empty
    /// or single-instant plans.
    #[must_use]
    pub fn timespan_seconds(&self) -> f64 {
        let timestamps = self.rows.iter().map(|row| row.query.timestamp);
        match (timestamps.clone().min(), timestamps.max()) {
            (Some(first), Some(last)) => (last - first).num_seconds() as f64,
            _ => 0.0,
        }
    }

    /// Total cache read requests across the plan.
    #[must_use]
    pub fn total_cache_reads(&self) -> i64 {
        self.rows.iter().map(|row| row.cache_reads).sum()
    }

    /// Total cache write requests across the plan.
    #[must_use]
    pub fn total_cache_writes(&self) -> i64 {
        self.rows.iter().map(|row| row.cache_writes).sum()
    }
}

impl<'a> IntoIterator for &'a ExecutionPlan {
    type Item = &'a PlanRow;
    type IntoIter = std::slice::Iter<'a, PlanRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn query(fingerprint: &str) -> Query {
        Query {
            fingerprint: fingerprint.to_owned(),
            kind: QueryKind::Select,
            bytes_scanned: 1_000,
            result_size: 100,
            intermediate_result_size: 50,
            write_volume: 0,
            cpu_time: 0.2,
            db_instance_id: 1,
            read_tables: BTreeSet::from(["orders".to_owned()]),
            write_table: None,
            hour: 1,
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap(),
            scan_to_result_ratio: 0.1,
            scan_to_i_result_ratio: 0.05,
            repetition_coefficient: 0.5,
            load: 1.0,
        }
    }

    #[test]
    fn kind_read_write_split() {
        assert!(QueryKind::Select.is_read());
        for kind in [QueryKind::Insert, QueryKind::Update, QueryKind::Delete] {
            assert!(kind.is_write());
        }
    }

    #[test]
    fn column_values_are_stable() {
        assert_eq!(Execution::Incremental.as_str(), "incremental");
        assert_eq!(
            ExecutionTrigger::TriggeredByWrite.as_str(),
            "triggered_by_write"
        );
        assert_eq!(
            serde_json::to_value(ExecutionTrigger::TriggeredByRead).unwrap(),
            serde_json::Value::String("triggered_by_read".to_owned())
        );
        assert_eq!(
            serde_json::to_value(QueryKind::Delete).unwrap(),
            serde_json::Value::String("delete".to_owned())
        );
    }

    #[test]
    fn immediate_row_is_self_triggered() {
        let row = PlanRow::immediate(query("q1"));
        assert_eq!(row.execution, Execution::Normal);
        assert_eq!(row.execution_trigger, ExecutionTrigger::Immediate);
        assert_eq!(row.triggered_by.as_deref(), Some("q1"));
        assert!(!row.was_cached);
        assert_eq!(row.cache_reads, 0);
    }

    #[test]
    fn plan_timespan_covers_min_to_max() {
        let mut plan = ExecutionPlan::new();
        assert_eq!(plan.timespan_seconds(), 0.0);

        let mut early = query("a");
        let mut late = query("b");
        early.timestamp = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        late.timestamp = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();
        // emission order is not timestamp order; the span must not care
        plan.push(PlanRow::immediate(late));
        plan.push(PlanRow::immediate(early));

        assert_eq!(plan.timespan_seconds(), 5_400.0);
        assert_eq!(plan.len(), 2);
    }
}
