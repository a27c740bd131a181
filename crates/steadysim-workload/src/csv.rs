//! Rectangular CSV transport for workloads and execution plans.
//!
//! Column names and types are stable for cross-tool comparability. The
//! only representation difference at this boundary is `read_tables`,
//! which travels as a comma-joined string and becomes a set again at
//! ingest.

use std::collections::BTreeSet;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use steadysim_core::{
    Execution, ExecutionPlan, ExecutionTrigger, PlanRow, Query, QueryKind, Workload,
};

use crate::error::{WorkloadError, WorkloadResult};

const READ_TABLES_SEPARATOR: char = ',';

/// One workload row in transport shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkloadRecord {
    fingerprint: String,
    kind: QueryKind,
    bytes_scanned: i64,
    result_size: i64,
    write_volume: i64,
    intermediate_result_size: i64,
    cpu_time: f64,
    db_instance_id: i64,
    read_tables: String,
    write_table: Option<String>,
    hour: i64,
    timestamp: DateTime<Utc>,
    scan_to_result_ratio: f64,
    scan_to_i_result_ratio: f64,
    repetition_coefficient: f64,
    load: f64,
}

impl From<&Query> for WorkloadRecord {
    fn from(query: &Query) -> Self {
        Self {
            fingerprint: query.fingerprint.clone(),
            kind: query.kind,
            bytes_scanned: query.bytes_scanned,
            result_size: query.result_size,
            write_volume: query.write_volume,
            intermediate_result_size: query.intermediate_result_size,
            cpu_time: query.cpu_time,
            db_instance_id: query.db_instance_id,
            read_tables: join_tables(&query.read_tables),
            write_table: query.write_table.clone(),
            hour: query.hour,
            timestamp: query.timestamp,
            scan_to_result_ratio: query.scan_to_result_ratio,
            scan_to_i_result_ratio: query.scan_to_i_result_ratio,
            repetition_coefficient: query.repetition_coefficient,
            load: query.load,
        }
    }
}

impl From<WorkloadRecord> for Query {
    fn from(record: WorkloadRecord) -> Self {
        Self {
            fingerprint: record.fingerprint,
            kind: record.kind,
            bytes_scanned: record.bytes_scanned,
            result_size: record.result_size,
            write_volume: record.write_volume,
            intermediate_result_size: record.intermediate_result_size,
            cpu_time: record.cpu_time,
            db_instance_id: record.db_instance_id,
            read_tables: split_tables(&record.read_tables),
            write_table: record.write_table.filter(|table| !table.is_empty()),
            hour: record.hour,
            timestamp: record.timestamp,
            scan_to_result_ratio: record.scan_to_result_ratio,
            scan_to_i_result_ratio: record.scan_to_i_result_ratio,
            repetition_coefficient: record.repetition_coefficient,
            load: record.load,
        }
    }
}

/// One plan row in transport shape, stable columns per the output
/// contract plus an optional per-row runtime.
#[derive(Debug, Clone, Serialize)]
struct PlanRecord {
    fingerprint: String,
    kind: QueryKind,
    bytes_scanned: i64,
    result_size: i64,
    write_volume: i64,
    intermediate_result_size: i64,
    cpu_time: f64,
    hour: i64,
    execution: Execution,
    execution_trigger: ExecutionTrigger,
    triggered_by: Option<String>,
    was_cached: bool,
    cache_result: bool,
    cache_ir: bool,
    write_delta: bool,
    cache_reads: i64,
    cache_writes: i64,
    runtime: Option<f64>,
}

impl PlanRecord {
    fn new(row: &PlanRow, runtime: Option<f64>) -> Self {
        Self {
            fingerprint: row.query.fingerprint.clone(),
            kind: row.query.kind,
            bytes_scanned: row.query.bytes_scanned,
            result_size: row.query.result_size,
            write_volume: row.query.write_volume,
            intermediate_result_size: row.query.intermediate_result_size,
            cpu_time: row.query.cpu_time,
            hour: row.query.hour,
            execution: row.execution,
            execution_trigger: row.execution_trigger,
            triggered_by: row.triggered_by.clone(),
            was_cached: row.was_cached,
            cache_result: row.cache_result,
            cache_ir: row.cache_ir,
            write_delta: row.write_delta,
            cache_reads: row.cache_reads,
            cache_writes: row.cache_writes,
            runtime,
        }
    }
}

/// Read a workload from CSV, validating the stream on ingest.
pub fn read_workload_csv(path: impl AsRef<Path>) -> WorkloadResult<Workload> {
    let mut reader = ::csv::Reader::from_path(path.as_ref())?;
    let mut queries = Vec::new();
    for (index, record) in reader.deserialize::<WorkloadRecord>().enumerate() {
        let record = record.map_err(|err| {
            WorkloadError::malformed_row(format!("row {index}: {err}"))
        })?;
        queries.push(Query::from(record));
    }
    info!(rows = queries.len(), "read workload csv");
    Ok(Workload::from_queries(queries)?)
}

/// Write a workload to CSV.
pub fn write_workload_csv(path: impl AsRef<Path>, workload: &Workload) -> WorkloadResult<()> {
    let mut writer = ::csv::Writer::from_path(path.as_ref())?;
    for query in workload.queries() {
        writer.serialize(WorkloadRecord::from(query))?;
    }
    writer.flush()?;
    Ok(())
}

/// Write an execution plan to CSV. When `runtimes` is given it must be
/// plan-aligned (one runtime per row) and adds a `runtime` column.
pub fn write_plan_csv(
    path: impl AsRef<Path>,
    plan: &ExecutionPlan,
    runtimes: Option<&[f64]>,
) -> WorkloadResult<()> {
    if let Some(runtimes) = runtimes {
        if runtimes.len() != plan.len() {
            return Err(WorkloadError::malformed_row(format!(
                "runtime column has {} entries for {} plan rows",
                runtimes.len(),
                plan.len()
            )));
        }
    }
    let mut writer = ::csv::Writer::from_path(path.as_ref())?;
    for (index, row) in plan.rows().iter().enumerate() {
        let runtime = runtimes.map(|values| values[index]);
        writer.serialize(PlanRecord::new(row, runtime))?;
    }
    writer.flush()?;
    Ok(())
}

fn join_tables(tables: &BTreeSet<String>) -> String {
    tables
        .iter()
        .map(String::as_str)
        .collect::<Vec<&str>>()
        .join(&READ_TABLES_SEPARATOR.to_string())
}

fn split_tables(joined: &str) -> BTreeSet<String> {
    joined
        .split(READ_TABLES_SEPARATOR)
        .filter(|table| !table.is_empty())
        .map(str::to_owned)
        .collect()
}
