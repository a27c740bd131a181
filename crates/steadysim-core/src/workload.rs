//! Validated workload stream.
//!
//! A [`Workload`] is the only way queries enter an execution model. It
//! checks the ingest contract once, derives the hour bucket from the first
//! timestamp, and computes repetition coefficients over the full stream, so
//! the models downstream never re-validate.

use std::collections::HashMap;

use crate::error::{CoreError, CoreResult};
use crate::load::{estimate_load, LoadReference};
use crate::query::Query;

const SECONDS_PER_HOUR: i64 = 3_600;

/// A timestamp-ordered, validated sequence of queries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Workload {
    queries: Vec<Query>,
}

impl Workload {
    /// Validate and finalize a raw query sequence.
    ///
    /// Checks each row against the ingest contract (non-negative
    /// magnitudes, fingerprint present, write kinds carry a write table and
    /// selects do not, timestamps never decrease), then derives `hour` from
    /// the first timestamp. Supplied repetition coefficients are trusted;
    /// call [`Self::recompute_repetition_coefficients`] for inputs that
    /// lack them. An empty input is a valid, empty workload.
    pub fn from_queries(mut queries: Vec<Query>) -> CoreResult<Self> {
        for (index, query) in queries.iter().enumerate() {
            validate_query(index, query)?;
            if index > 0 && query.timestamp < queries[index - 1].timestamp {
                return Err(CoreError::invalid_input(format!(
                    "timestamps are not monotonically increasing at row {index} \
                     (fingerprint {})",
                    query.fingerprint
                )));
            }
        }

        if let Some(first) = queries.first().map(|query| query.timestamp) {
            for query in &mut queries {
                let elapsed = (query.timestamp - first).num_seconds();
                query.hour = elapsed / SECONDS_PER_HOUR + 1;
            }
        }

        Ok(Self { queries })
    }

    /// Overwrite every query's repetition coefficient with
    /// `(occurrences of its fingerprint − 1) / workload size`.
    pub fn recompute_repetition_coefficients(&mut self) {
        let total = self.queries.len();
        let mut occurrences: HashMap<String, i64> = HashMap::new();
        for query in &self.queries {
            *occurrences.entry(query.fingerprint.clone()).or_insert(0) += 1;
        }
        for query in &mut self.queries {
            let count = occurrences[query.fingerprint.as_str()];
            query.repetition_coefficient = (count - 1) as f64 / total as f64;
        }
    }

    /// Assign the resource-requirement score to every query.
    pub fn assign_loads(&mut self, reference: &LoadReference) {
        for query in &mut self.queries {
            query.load = estimate_load(query, reference);
        }
    }

    /// The queries in timestamp order.
    #[must_use]
    pub fn queries(&self) -> &[Query] {
        &self.queries
    }

    /// Number of queries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queries.len()
    }

    /// True for the empty workload.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    /// Highest hour bucket in the stream, 0 when empty.
    #[must_use]
    pub fn max_hour(&self) -> i64 {
        self.queries.iter().map(|query| query.hour).max().unwrap_or(0)
    }

    /// Last timestamp in the stream.
    #[must_use]
    pub fn last_timestamp(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.queries.last().map(|query| query.timestamp)
    }
}

impl<'a> IntoIterator for &'a Workload {
    type Item = &'a Query;
    type IntoIter = std::slice::Iter<'a, Query>;

    fn into_iter(self) -> Self::IntoIter {
        self.queries.iter()
    }
}

fn validate_query(index: usize, query: &Query) -> CoreResult<()> {
    if query.fingerprint.is_empty() {
        return Err(CoreError::invalid_input(format!(
            "row {index} has an empty fingerprint"
        )));
    }

    let magnitudes = [
        ("bytes_scanned", query.bytes_scanned),
        ("result_size", query.result_size),
        ("intermediate_result_size", query.intermediate_result_size),
        ("write_volume", query.write_volume),
    ];
    for (field, value) in magnitudes {
        if value < 0 {
            return Err(CoreError::invalid_input(format!(
                "row {index} ({}) has negative {field}: {value}",
                query.fingerprint
            )));
        }
    }
    if query.cpu_time < 0.0 {
        return Err(CoreError::invalid_input(format!(
            "row {index} ({}) has negative cpu_time: {}",
            query.fingerprint, query.cpu_time
        )));
    }

    if query.kind.is_write() && query.write_table.is_none() {
        return Err(CoreError::invalid_input(format!(
            "row {index} ({}) is a {} without a write_table",
            query.fingerprint,
            query.kind.as_str()
        )));
    }
    if query.kind.is_read() && query.write_table.is_some() {
        return Err(CoreError::invalid_input(format!(
            "row {index} ({}) is a select carrying a write_table",
            query.fingerprint
        )));
    }

    Ok(())
}
