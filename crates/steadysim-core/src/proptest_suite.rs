//! Property-based invariant checks over randomized workloads.
//!
//! These target the accounting invariants that must hold after every
//! plan-row emission: cache usage bookkeeping, dependency-edge direction,
//! and plan-row field domains.

use std::collections::BTreeSet;

use proptest::prelude::*;

use crate::cache::{CacheConfig, CacheEntry, RepetitionAwareCache};
use crate::graph::DependencyGraph;
use crate::load::LoadReference;
use crate::models::{ExecutionModel, HybridConfig, ModelKind};
use crate::query::{ExecutionTrigger, Query, QueryKind};
use crate::testutil::ts;
use crate::workload::Workload;

const TABLE_POOL: [&str; 4] = ["t1", "t2", "t3", "t4"];

fn arb_kind() -> impl Strategy<Value = QueryKind> {
    prop_oneof![
        3 => Just(QueryKind::Select),
        1 => Just(QueryKind::Insert),
        1 => Just(QueryKind::Update),
        1 => Just(QueryKind::Delete),
    ]
}

#[allow(clippy::type_complexity)]
fn arb_query() -> impl Strategy<Value = Query> {
    let shape = (
        arb_kind(),
        0_usize..6,    // fingerprint pool
        1_i64..50_000, // bytes scanned
        0_i64..5_000,  // result size
        0_i64..2_000,  // intermediate result size
        1_i64..10_000, // write volume
    );
    let context = (
        0.0_f64..2.0, // cpu seconds
        0_i64..2,     // db instance
        prop::collection::btree_set(0_usize..TABLE_POOL.len(), 1..3),
        0_usize..TABLE_POOL.len(),
        0.0_f64..0.9, // repetition coefficient
    );
    (shape, context).prop_map(
        |((kind, fp, bs, rs, irs, wv), (cpu, db, read_idx, write_idx, coeff))| {
            let read_tables: BTreeSet<String> = read_idx
                .into_iter()
                .map(|i| TABLE_POOL[i].to_owned())
                .collect();
            let result_size = if kind.is_read() { rs } else { 0 };
            let intermediate = if kind.is_read() { irs } else { 0 };
            Query {
                fingerprint: format!("q{fp}"),
                kind,
                bytes_scanned: bs,
                result_size,
                intermediate_result_size: intermediate,
                write_volume: if kind.is_write() { wv } else { 0 },
                cpu_time: cpu,
                db_instance_id: db,
                read_tables,
                write_table: kind.is_write().then(|| TABLE_POOL[write_idx].to_owned()),
                hour: 1,
                timestamp: ts(0),
                scan_to_result_ratio: result_size as f64 / bs as f64,
                scan_to_i_result_ratio: intermediate as f64 / bs as f64,
                repetition_coefficient: coeff,
                load: 0.0,
            }
        },
    )
}

fn arb_workload(max_len: usize) -> impl Strategy<Value = Workload> {
    prop::collection::vec(arb_query(), 0..max_len).prop_map(|mut queries| {
        for (index, query) in queries.iter_mut().enumerate() {
            query.timestamp = ts(index as i64 * 240);
        }
        Workload::from_queries(queries).expect("generated workloads are valid")
    })
}

fn check_cache_accounting(cache: &RepetitionAwareCache, capacity: Option<i64>) {
    let summed: i64 = cache.entries().map(|entry| entry.size).sum();
    assert_eq!(summed, cache.usage(), "usage must equal summed entry sizes");
    if let Some(capacity) = capacity {
        assert!(cache.usage() <= capacity, "usage must respect capacity");
    }
    let lowest = cache
        .entries()
        .map(|entry| entry.query.repetition_coefficient)
        .fold(None, |acc: Option<f64>, c| Some(acc.map_or(c, |a| a.min(c))));
    assert_eq!(cache.lowest_repetition_coefficient(), lowest);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn cache_accounting_holds_under_random_traffic(
        workload in arb_workload(24),
        capacity in prop_oneof![Just(None), (500_i64..20_000).prop_map(Some)],
    ) {
        let config = CacheConfig {
            max_capacity: capacity,
            ..CacheConfig::unbounded()
        };
        let mut cache = RepetitionAwareCache::new(config).unwrap();
        for query in &workload {
            if query.kind.is_read() {
                cache.put(query.fingerprint.as_str(), CacheEntry::clean(query.clone()));
            } else {
                cache.mark_dirty(query);
            }
            check_cache_accounting(&cache, capacity);
        }
    }

    #[test]
    fn graph_edges_always_point_backwards(workload in arb_workload(24)) {
        let mut graph = DependencyGraph::new();
        let mut ids = Vec::new();
        for query in &workload {
            ids.push(graph.add(query.clone()));
        }
        for &id in &ids {
            let Some(query) = graph.query(id) else { continue };
            for dep in graph.transitive_deps(id) {
                let Some(prev) = graph.query(dep) else { continue };
                prop_assert!(prev.timestamp < query.timestamp);
                prop_assert!(prev.kind.is_write());
                prop_assert!(prev.write_table.is_some());
            }
        }
    }

    #[test]
    fn plans_keep_row_domains_valid(
        workload in arb_workload(20),
        kind in prop_oneof![
            Just(ModelKind::OneOff),
            Just(ModelKind::Eager),
            Just(ModelKind::Lazy),
            Just(ModelKind::Hybrid),
        ],
        capacity in prop_oneof![Just(None), (500_i64..20_000).prop_map(Some)],
    ) {
        let max_hour = workload.max_hour();
        let reference = LoadReference::median_of(&workload);
        let cache_config = CacheConfig {
            max_capacity: capacity,
            ..CacheConfig::unbounded()
        };
        let mut model = kind
            .build(workload, cache_config, HybridConfig::new(reference))
            .unwrap();
        let plan = model.plan().unwrap();

        for row in plan.rows() {
            if row.was_cached {
                prop_assert_eq!(row.query.bytes_scanned, 0);
                prop_assert_eq!(row.query.cpu_time, 0.0);
                prop_assert_eq!(row.query.write_volume, 0);
            }
            if row.execution_trigger == ExecutionTrigger::Pending {
                prop_assert_eq!(row.query.hour, max_hour + 1);
                prop_assert!(row.triggered_by.is_none());
            }
            prop_assert!(row.cache_reads >= 0 && row.cache_writes >= 0);
        }

        if let Some(cache) = model.cache() {
            check_cache_accounting(cache, capacity);
        }
    }
}
