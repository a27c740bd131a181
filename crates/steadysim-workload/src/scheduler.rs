//! Arrival scheduling for generated query templates.
//!
//! Spreads drafts over the simulated span according to the per-hour
//! read/write fractions, assigns each query a uniform timestamp inside
//! its hour, and binds read/write table sets from the per-instance table
//! pool. Drafts the fractions do not cover are dropped.

use std::collections::BTreeSet;

use chrono::Duration;
use rand::rngs::StdRng;
use rand::seq::index;
use rand::Rng;
use tracing::debug;

use steadysim_core::Query;

use crate::generator::QueryDraft;
use crate::profile::ScheduleProfile;

const SECONDS_PER_HOUR: i64 = 3_600;

/// Turn drafts into schedulable queries with timestamps and table sets.
pub(crate) fn schedule(
    profile: &ScheduleProfile,
    rng: &mut StdRng,
    drafts: Vec<QueryDraft>,
) -> Vec<Query> {
    let (mut reads, mut writes): (Vec<QueryDraft>, Vec<QueryDraft>) =
        drafts.into_iter().partition(|draft| draft.kind.is_read());
    let total_reads = reads.len();
    let total_writes = writes.len();

    let table_pool: Vec<String> = (1..=profile.table_count)
        .map(|index| format!("t{index}"))
        .collect();

    let mut queries = Vec::with_capacity(total_reads + total_writes);
    for hour in 1..=profile.duration_hours {
        let read_count =
            ((profile.read_fraction(hour) * total_reads as f64) as usize).min(reads.len());
        let write_count =
            ((profile.write_fraction(hour) * total_writes as f64) as usize).min(writes.len());

        for draft in reads.drain(..read_count) {
            queries.push(materialize(profile, rng, &table_pool, draft, hour, false));
        }
        for draft in writes.drain(..write_count) {
            queries.push(materialize(profile, rng, &table_pool, draft, hour, true));
        }
    }

    if !reads.is_empty() || !writes.is_empty() {
        debug!(
            dropped_reads = reads.len(),
            dropped_writes = writes.len(),
            "hourly fractions left drafts unscheduled"
        );
    }

    queries.sort_by_key(|query| query.timestamp);
    queries
}

fn materialize(
    profile: &ScheduleProfile,
    rng: &mut StdRng,
    table_pool: &[String],
    draft: QueryDraft,
    hour: usize,
    is_write: bool,
) -> Query {
    let offset = (hour as i64 - 1) * SECONDS_PER_HOUR + rng.gen_range(0..SECONDS_PER_HOUR);
    let timestamp = profile.start_time + Duration::seconds(offset);

    let read_count = draft.num_read_tables.clamp(1, table_pool.len());
    let read_tables: BTreeSet<String> = index::sample(rng, table_pool.len(), read_count)
        .into_iter()
        .map(|table_index| table_pool[table_index].clone())
        .collect();

    let write_table = is_write.then(|| {
        let table_index = rng.gen_range(0..table_pool.len());
        table_pool[table_index].clone()
    });

    Query {
        fingerprint: draft.fingerprint,
        kind: draft.kind,
        bytes_scanned: draft.bytes_scanned,
        result_size: draft.result_size,
        intermediate_result_size: draft.intermediate_result_size,
        write_volume: draft.write_volume,
        cpu_time: draft.cpu_time,
        db_instance_id: draft.db_instance_id,
        read_tables,
        write_table,
        hour: 0, // derived at ingest
        timestamp,
        scan_to_result_ratio: 0.0,
        scan_to_i_result_ratio: 0.0,
        repetition_coefficient: 0.0,
        load: 0.0,
    }
}
