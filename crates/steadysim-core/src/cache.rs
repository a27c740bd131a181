//! Repetition-aware result cache.
//!
//! A capacity-bounded, insertion-ordered store keyed by query fingerprint.
//! Admission and eviction are driven purely by the repetition coefficient:
//! entries that repeat more are worth more, and the lowest-repetition
//! entries go first when space is needed. Each entry additionally tracks
//! whether intervening writes have made it stale (`dirty`) and how many
//! bytes of write activity have accumulated against its read tables since
//! the last refresh (`delta`).

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CoreError, CoreResult};
use crate::hw::CacheServiceKind;
use crate::query::Query;

/// Cache construction parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Capacity bound in bytes; `None` is unbounded.
    pub max_capacity: Option<i64>,
    /// Capacity price in USD per GB-month, carried for the pricing layer.
    pub cost_per_gb: f64,
    /// USD per 1000 put requests.
    pub put_cost: f64,
    /// USD per 1000 get requests.
    pub get_cost: f64,
    /// Which service backs the cache.
    pub kind: CacheServiceKind,
}

impl CacheConfig {
    /// Unbounded S3-priced cache.
    #[must_use]
    pub fn unbounded() -> Self {
        Self {
            max_capacity: None,
            cost_per_gb: 0.023,
            put_cost: 0.005,
            get_cost: 0.0004,
            kind: CacheServiceKind::S3,
        }
    }

    /// Same profile with a byte capacity bound.
    #[must_use]
    pub fn bounded(max_capacity: i64) -> Self {
        Self {
            max_capacity: Some(max_capacity),
            ..Self::unbounded()
        }
    }

    /// Reject configurations the cache cannot operate under.
    pub fn validate(&self) -> CoreResult<()> {
        if let Some(capacity) = self.max_capacity {
            if capacity < 0 {
                return Err(CoreError::config(format!(
                    "negative cache capacity: {capacity}"
                )));
            }
        }
        if self.cost_per_gb < 0.0 || self.put_cost < 0.0 || self.get_cost < 0.0 {
            return Err(CoreError::config("cache costs must be non-negative"));
        }
        Ok(())
    }
}

/// The materialized state cached for one fingerprint: the last observed
/// query plus the bytes it occupies and its staleness accounting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheEntry {
    /// Last query observed for this fingerprint.
    pub query: Query,
    /// Bytes occupied: result_size + intermediate_result_size at put time.
    pub size: i64,
    /// Stale due to intervening writes against its read tables.
    pub dirty: bool,
    /// Accumulated write-volume bytes since the last refresh.
    pub delta: i64,
}

impl CacheEntry {
    /// A freshly materialized entry: clean, no accumulated delta.
    #[must_use]
    pub fn clean(query: Query) -> Self {
        let size = query.cached_size();
        Self {
            query,
            size,
            dirty: false,
            delta: 0,
        }
    }
}

/// Counters exposed for workload insights.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheInsights {
    /// Lookups that found an entry.
    pub cache_hits: u64,
    /// Lookups that found nothing.
    pub cache_misses: u64,
    /// Total `get` calls.
    pub get_requests: u64,
    /// Total `put` calls, admitted or not.
    pub put_requests: u64,
    /// Entries removed to make room.
    pub evictions: u64,
}

impl CacheInsights {
    /// Hits over total lookups; 0 before any lookup.
    #[must_use]
    pub fn hit_ratio(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }
}

/// Capacity-bounded result cache evicting lowest-repetition entries first.
#[derive(Debug, Clone)]
pub struct RepetitionAwareCache {
    entries: IndexMap<String, CacheEntry>,
    usage: i64,
    config: CacheConfig,
    lowest_repetition_coefficient: Option<f64>,
    insights: CacheInsights,
}

impl RepetitionAwareCache {
    /// Build a cache from a validated configuration.
    pub fn new(config: CacheConfig) -> CoreResult<Self> {
        config.validate()?;
        Ok(Self {
            entries: IndexMap::new(),
            usage: 0,
            config,
            lowest_repetition_coefficient: None,
            insights: CacheInsights::default(),
        })
    }

    /// Whether an entry exists for the fingerprint. Does not touch the
    /// hit/miss counters.
    #[must_use]
    pub fn contains(&self, fingerprint: &str) -> bool {
        self.entries.contains_key(fingerprint)
    }

    /// Look up an entry, counting a hit or a miss.
    pub fn get(&mut self, fingerprint: &str) -> Option<&CacheEntry> {
        self.insights.get_requests += 1;
        match self.entries.get(fingerprint) {
            Some(entry) => {
                self.insights.cache_hits += 1;
                Some(entry)
            }
            None => {
                self.insights.cache_misses += 1;
                None
            }
        }
    }

    /// Try to admit an entry under `fingerprint`. Returns whether it was
    /// admitted.
    ///
    /// A resident entry under the same fingerprint is evicted first and its
    /// space returned. The candidate is rejected outright when its size is
    /// negative, its repetition coefficient is zero, or it cannot fit even
    /// in an empty cache. When it does not fit the free space, it is
    /// admitted only if it repeats strictly more than the current
    /// lowest-repetition resident; room is then made by evicting ascending
    /// repetition coefficients (earliest-inserted first among ties).
    pub fn put(&mut self, fingerprint: &str, entry: CacheEntry) -> bool {
        self.insights.put_requests += 1;

        if self.entries.contains_key(fingerprint) {
            self.remove(fingerprint);
        }

        if entry.size < 0 || entry.query.repetition_coefficient == 0.0 {
            return false;
        }
        if let Some(capacity) = self.config.max_capacity {
            if entry.size > capacity {
                return false;
            }
        }

        if !self.can_fit(entry.size) {
            let admissible = self
                .lowest_repetition_coefficient
                .is_some_and(|lowest| entry.query.repetition_coefficient > lowest);
            if !admissible {
                return false;
            }
            // capacity is Some here, otherwise anything fits
            let remaining = self.config.max_capacity.unwrap_or(i64::MAX) - self.usage;
            self.evict(entry.size - remaining);
        }

        let coefficient = entry.query.repetition_coefficient;
        self.usage += entry.size;
        self.entries.insert(fingerprint.to_owned(), entry);
        self.lowest_repetition_coefficient = Some(
            self.lowest_repetition_coefficient
                .map_or(coefficient, |lowest| lowest.min(coefficient)),
        );

        true
    }

    /// Free at least `space` bytes by repeated lowest-repetition eviction.
    pub fn evict(&mut self, space: i64) {
        let mut evicted = 0_i64;
        while evicted < space {
            // unreachable while the usage invariant holds: put never asks
            // for more space than the resident entries occupy
            let Some(victim) = self.select_for_eviction() else {
                break;
            };
            if let Some(entry) = self.entries.shift_remove(&victim) {
                evicted += entry.size;
                self.insights.evictions += 1;
                debug!(
                    fingerprint = %victim,
                    size = entry.size,
                    repetition_coefficient = entry.query.repetition_coefficient,
                    "evicted cache entry"
                );
            }
            self.refresh_lowest_coefficient();
        }
        self.usage -= evicted;
    }

    /// Entries whose materialized result a write invalidates: same db
    /// instance, write table among the entry's read tables.
    pub fn affected_by<'cache>(
        &'cache self,
        write: &'cache Query,
    ) -> impl Iterator<Item = &'cache CacheEntry> {
        self.entries.values().filter(move |entry| {
            entry.query.db_instance_id == write.db_instance_id
                && write
                    .write_table
                    .as_ref()
                    .is_some_and(|table| entry.query.read_tables.contains(table))
        })
    }

    /// Mark every affected entry dirty, accumulating the write volume into
    /// its delta. Returns how many entries were touched.
    pub fn mark_dirty(&mut self, write: &Query) -> usize {
        let Some(table) = write.write_table.as_ref() else {
            return 0;
        };
        let mut touched = 0;
        for entry in self.entries.values_mut() {
            if entry.query.db_instance_id == write.db_instance_id
                && entry.query.read_tables.contains(table)
            {
                entry.dirty = true;
                entry.delta += write.write_volume;
                touched += 1;
            }
        }
        touched
    }

    /// Dirty entries in insertion order.
    pub fn dirty_entries(&self) -> impl Iterator<Item = &CacheEntry> {
        self.entries.values().filter(|entry| entry.dirty)
    }

    /// All entries in insertion order.
    pub fn entries(&self) -> impl Iterator<Item = &CacheEntry> {
        self.entries.values()
    }

    /// Bytes currently resident.
    #[must_use]
    pub fn usage(&self) -> i64 {
        self.usage
    }

    /// Number of resident entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Smallest repetition coefficient among residents, `None` when empty.
    #[must_use]
    pub fn lowest_repetition_coefficient(&self) -> Option<f64> {
        self.lowest_repetition_coefficient
    }

    /// Counter bundle.
    #[must_use]
    pub fn insights(&self) -> &CacheInsights {
        &self.insights
    }

    /// The configuration this cache was built from.
    #[must_use]
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn can_fit(&self, size: i64) -> bool {
        self.config
            .max_capacity
            .map_or(true, |capacity| capacity - self.usage >= size)
    }

    /// Lowest repetition coefficient wins; earliest-inserted among ties.
    fn select_for_eviction(&self) -> Option<String> {
        let mut victim: Option<(&String, f64)> = None;
        for (fingerprint, entry) in &self.entries {
            let coefficient = entry.query.repetition_coefficient;
            match victim {
                Some((_, lowest)) if coefficient >= lowest => {}
                _ => victim = Some((fingerprint, coefficient)),
            }
        }
        victim.map(|(fingerprint, _)| fingerprint.clone())
    }

    fn remove(&mut self, fingerprint: &str) {
        if let Some(entry) = self.entries.shift_remove(fingerprint) {
            self.usage -= entry.size;
            self.refresh_lowest_coefficient();
        }
    }

    fn refresh_lowest_coefficient(&mut self) {
        self.lowest_repetition_coefficient = self
            .entries
            .values()
            .map(|entry| entry.query.repetition_coefficient)
            .fold(None, |lowest: Option<f64>, coefficient| {
                Some(lowest.map_or(coefficient, |value| value.min(coefficient)))
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{read_query, write_query, ts};

    fn entry(fingerprint: &str, result_size: i64, coefficient: f64) -> CacheEntry {
        let mut query = read_query(fingerprint, ts(0));
        query.result_size = result_size;
        query.intermediate_result_size = 0;
        query.repetition_coefficient = coefficient;
        CacheEntry::clean(query)
    }

    fn bounded(capacity: i64) -> RepetitionAwareCache {
        RepetitionAwareCache::new(CacheConfig::bounded(capacity)).unwrap()
    }

    #[test]
    fn rejects_negative_capacity_config() {
        let config = CacheConfig::bounded(-5);
        assert!(RepetitionAwareCache::new(config).is_err());
    }

    #[test]
    fn put_then_get_hits() {
        let mut cache = bounded(1_000);
        assert!(cache.put("q1", entry("q1", 150, 0.5)));
        assert_eq!(cache.usage(), 150);
        assert!(cache.contains("q1"));
        assert!(cache.get("q1").is_some());
        assert!(cache.get("q2").is_none());

        let insights = cache.insights();
        assert_eq!(insights.cache_hits, 1);
        assert_eq!(insights.cache_misses, 1);
        assert_eq!(insights.get_requests, 2);
        assert_eq!(insights.put_requests, 1);
    }

    #[test]
    fn rejects_zero_repetition_and_oversized() {
        let mut cache = bounded(200);
        assert!(!cache.put("once", entry("once", 50, 0.0)));
        assert!(!cache.put("huge", entry("huge", 201, 0.9)));
        assert!(cache.is_empty());
        assert_eq!(cache.usage(), 0);
    }

    #[test]
    fn evicts_lowest_repetition_first() {
        let mut cache = bounded(200);
        assert!(cache.put("q1", entry("q1", 150, 0.1)));
        assert!(cache.put("q2", entry("q2", 150, 0.5)));

        assert!(!cache.contains("q1"));
        assert!(cache.contains("q2"));
        assert_eq!(cache.usage(), 150);
        assert_eq!(cache.lowest_repetition_coefficient(), Some(0.5));
        assert_eq!(cache.insights().evictions, 1);
    }

    #[test]
    fn rejects_when_not_repeating_more_than_lowest() {
        let mut cache = bounded(200);
        assert!(cache.put("q1", entry("q1", 150, 0.5)));
        // equal coefficient is not strictly greater
        assert!(!cache.put("q2", entry("q2", 150, 0.5)));
        assert!(cache.contains("q1"));
        assert_eq!(cache.usage(), 150);
    }

    #[test]
    fn eviction_ties_break_by_insertion_order() {
        let mut cache = bounded(300);
        assert!(cache.put("first", entry("first", 100, 0.2)));
        assert!(cache.put("second", entry("second", 100, 0.2)));
        assert!(cache.put("third", entry("third", 100, 0.2)));

        cache.evict(1);
        assert!(!cache.contains("first"));
        assert!(cache.contains("second"));
        assert!(cache.contains("third"));
        assert_eq!(cache.usage(), 200);
    }

    #[test]
    fn same_key_put_replaces_and_returns_space() {
        let mut cache = bounded(1_000);
        assert!(cache.put("q1", entry("q1", 600, 0.5)));
        let mut replacement = entry("q1", 300, 0.5);
        replacement.dirty = true;
        replacement.delta = 42;
        assert!(cache.put("q1", replacement));

        assert_eq!(cache.usage(), 300);
        assert_eq!(cache.len(), 1);
        // replacement state comes from the supplied entry
        let resident = cache.get("q1").unwrap();
        assert!(resident.dirty);
        assert_eq!(resident.delta, 42);
        // same-key replacement is not an eviction
        assert_eq!(cache.insights().evictions, 0);
    }

    #[test]
    fn unbounded_cache_admits_everything_repeating() {
        let mut cache = RepetitionAwareCache::new(CacheConfig::unbounded()).unwrap();
        for index in 0..100 {
            let key = format!("q{index}");
            assert!(cache.put(&key, entry(&key, 1_000_000, 0.01)));
        }
        assert_eq!(cache.usage(), 100_000_000);
        assert_eq!(cache.insights().evictions, 0);
    }

    #[test]
    fn affected_by_matches_table_and_instance() {
        let mut cache = bounded(1_000);
        let mut reader = read_query("r1", ts(0));
        reader.read_tables = ["orders".to_owned(), "items".to_owned()].into();
        reader.repetition_coefficient = 0.3;
        cache.put("r1", CacheEntry::clean(reader));

        let mut other_db = read_query("r2", ts(1));
        other_db.read_tables = ["orders".to_owned()].into();
        other_db.db_instance_id = 99;
        other_db.repetition_coefficient = 0.3;
        cache.put("r2", CacheEntry::clean(other_db));

        let write = write_query("w1", ts(2), "orders");
        let affected: Vec<&str> = cache
            .affected_by(&write)
            .map(|entry| entry.query.fingerprint.as_str())
            .collect();
        assert_eq!(affected, vec!["r1"]);
    }

    #[test]
    fn mark_dirty_accumulates_delta() {
        let mut cache = bounded(1_000);
        let mut reader = read_query("r1", ts(0));
        reader.read_tables = ["orders".to_owned()].into();
        reader.repetition_coefficient = 0.3;
        cache.put("r1", CacheEntry::clean(reader));

        let mut write = write_query("w1", ts(1), "orders");
        write.write_volume = 500;
        assert_eq!(cache.mark_dirty(&write), 1);
        assert_eq!(cache.mark_dirty(&write), 1);

        let resident = cache.get("r1").unwrap();
        assert!(resident.dirty);
        assert_eq!(resident.delta, 1_000);
    }

    #[test]
    fn usage_always_sums_entry_sizes() {
        let mut cache = bounded(500);
        cache.put("a", entry("a", 200, 0.1));
        cache.put("b", entry("b", 200, 0.4));
        cache.put("c", entry("c", 200, 0.6));

        let total: i64 = cache.entries().map(|entry| entry.size).sum();
        assert_eq!(total, cache.usage());
        assert!(cache.usage() <= 500);
    }
}
