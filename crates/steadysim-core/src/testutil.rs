//! Hand-built query fixtures shared by the unit and scenario tests.

use std::collections::BTreeSet;

use chrono::{DateTime, TimeZone, Utc};

use crate::query::{Query, QueryKind};

/// Timestamp `seconds` after the fixed workload start.
pub fn ts(seconds: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap() + chrono::Duration::seconds(seconds)
}

/// A select reading `t1`, sized like a typical cached query.
pub fn read_query(fingerprint: &str, timestamp: DateTime<Utc>) -> Query {
    Query {
        fingerprint: fingerprint.to_owned(),
        kind: QueryKind::Select,
        bytes_scanned: 1_000,
        result_size: 100,
        intermediate_result_size: 50,
        write_volume: 0,
        cpu_time: 0.2,
        db_instance_id: 1,
        read_tables: BTreeSet::from(["t1".to_owned()]),
        write_table: None,
        hour: 1,
        timestamp,
        scan_to_result_ratio: 0.1,
        scan_to_i_result_ratio: 0.05,
        repetition_coefficient: 0.5,
        load: 0.0,
    }
}

/// An insert of 500 bytes into `table`.
pub fn write_query(fingerprint: &str, timestamp: DateTime<Utc>, table: &str) -> Query {
    Query {
        fingerprint: fingerprint.to_owned(),
        kind: QueryKind::Insert,
        bytes_scanned: 0,
        result_size: 0,
        intermediate_result_size: 0,
        write_volume: 500,
        cpu_time: 0.1,
        db_instance_id: 1,
        read_tables: BTreeSet::new(),
        write_table: Some(table.to_owned()),
        hour: 1,
        timestamp,
        scan_to_result_ratio: 0.0,
        scan_to_i_result_ratio: 0.0,
        repetition_coefficient: 0.0,
        load: 0.0,
    }
}
