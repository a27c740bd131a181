//! Generation profiles.
//!
//! A [`WorkloadProfile`] fully determines a synthetic workload together
//! with a seed: the query-shape distributions, the repetition share, and
//! the hourly arrival pattern.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{WorkloadError, WorkloadResult};

/// `[lower MB, upper GB]` bound pair for a log-normally drawn byte
/// magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MagnitudeBounds {
    /// Lower bound in megabytes.
    pub lower_bound_mb: f64,
    /// Upper bound in gigabytes.
    pub upper_bound_gb: f64,
}

impl MagnitudeBounds {
    fn validate(&self, field: &str) -> WorkloadResult<()> {
        if self.lower_bound_mb <= 0.0 || self.upper_bound_gb <= 0.0 {
            return Err(WorkloadError::profile(format!(
                "{field} bounds must be positive"
            )));
        }
        if self.lower_bound_mb * 1.0e6 >= self.upper_bound_gb * 1.0e9 {
            return Err(WorkloadError::profile(format!(
                "{field} lower bound must sit below the upper bound"
            )));
        }
        Ok(())
    }
}

/// Relative frequency of each query kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KindWeights {
    /// Read-only queries.
    pub select: f64,
    /// Appends.
    pub insert: f64,
    /// In-place rewrites.
    pub update: f64,
    /// Removals.
    pub delete: f64,
}

impl Default for KindWeights {
    fn default() -> Self {
        // read-heavy analytical mix
        Self {
            select: 0.8,
            insert: 0.1,
            update: 0.06,
            delete: 0.04,
        }
    }
}

impl KindWeights {
    /// Sum of all weights.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.select + self.insert + self.update + self.delete
    }
}

/// Shape distributions for individual query templates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryProfile {
    /// Query-kind mix.
    pub kind_weights: KindWeights,
    /// Bytes scanned per query.
    pub bytes_scanned: MagnitudeBounds,
    /// Result size for selects.
    pub result_size: MagnitudeBounds,
    /// Write volume for mutating kinds.
    pub write_volume: MagnitudeBounds,
    /// Weighted choices for how many tables a query reads.
    pub read_table_counts: Vec<(usize, f64)>,
    /// Log10 scale applied to the intermediate-result estimate.
    pub ir_scale: f64,
    /// Number of simulated database instances.
    pub db_count: i64,
}

impl Default for QueryProfile {
    fn default() -> Self {
        Self {
            kind_weights: KindWeights::default(),
            bytes_scanned: MagnitudeBounds {
                lower_bound_mb: 1.0,
                upper_bound_gb: 2.0,
            },
            result_size: MagnitudeBounds {
                lower_bound_mb: 0.5,
                upper_bound_gb: 0.2,
            },
            write_volume: MagnitudeBounds {
                lower_bound_mb: 0.5,
                upper_bound_gb: 0.5,
            },
            read_table_counts: vec![(1, 0.5), (2, 0.3), (3, 0.2)],
            ir_scale: -2.0,
            db_count: 4,
        }
    }
}

impl QueryProfile {
    fn validate(&self) -> WorkloadResult<()> {
        if self.kind_weights.total() <= 0.0 {
            return Err(WorkloadError::profile("query kind weights sum to zero"));
        }
        self.bytes_scanned.validate("bytes_scanned")?;
        self.result_size.validate("result_size")?;
        self.write_volume.validate("write_volume")?;
        if self.read_table_counts.is_empty()
            || self.read_table_counts.iter().all(|(_, weight)| *weight <= 0.0)
        {
            return Err(WorkloadError::profile("read_table_counts has no weight"));
        }
        if self.read_table_counts.iter().any(|(count, _)| *count == 0) {
            return Err(WorkloadError::profile("queries must read at least one table"));
        }
        if self.db_count <= 0 {
            return Err(WorkloadError::profile("db_count must be positive"));
        }
        Ok(())
    }
}

/// Arrival pattern over the simulated span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleProfile {
    /// Timestamp of the first simulated hour.
    pub start_time: DateTime<Utc>,
    /// Simulated span in hours.
    pub duration_hours: usize,
    /// Fraction of all reads arriving per hour; entries beyond
    /// `duration_hours` are ignored, a uniform spread is assumed when
    /// empty.
    pub hourly_read_fractions: Vec<f64>,
    /// Fraction of all writes arriving per hour, same convention.
    pub hourly_write_fractions: Vec<f64>,
    /// Number of distinct tables per database instance.
    pub table_count: usize,
}

impl Default for ScheduleProfile {
    fn default() -> Self {
        Self {
            start_time: Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0)
                .single()
                .unwrap_or_default(),
            duration_hours: 24,
            hourly_read_fractions: Vec::new(),
            hourly_write_fractions: Vec::new(),
            table_count: 12,
        }
    }
}

impl ScheduleProfile {
    fn validate(&self) -> WorkloadResult<()> {
        if self.duration_hours == 0 {
            return Err(WorkloadError::profile("duration_hours must be positive"));
        }
        if self.table_count == 0 {
            return Err(WorkloadError::profile("table_count must be positive"));
        }
        for fractions in [&self.hourly_read_fractions, &self.hourly_write_fractions] {
            if fractions.iter().any(|fraction| *fraction < 0.0) {
                return Err(WorkloadError::profile("hourly fractions must be non-negative"));
            }
            if fractions.iter().sum::<f64>() > 1.0 + 1e-9 {
                return Err(WorkloadError::profile("hourly fractions sum above 1"));
            }
        }
        Ok(())
    }

    /// The fraction of reads scheduled into `hour` (1-based).
    #[must_use]
    pub fn read_fraction(&self, hour: usize) -> f64 {
        fraction_for(&self.hourly_read_fractions, hour, self.duration_hours)
    }

    /// The fraction of writes scheduled into `hour` (1-based).
    #[must_use]
    pub fn write_fraction(&self, hour: usize) -> f64 {
        fraction_for(&self.hourly_write_fractions, hour, self.duration_hours)
    }
}

fn fraction_for(fractions: &[f64], hour: usize, duration: usize) -> f64 {
    if fractions.is_empty() {
        return 1.0 / duration as f64;
    }
    fractions.get(hour - 1).copied().unwrap_or(0.0)
}

/// Everything a reproducible synthetic workload needs besides the seed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadProfile {
    /// Total number of queries.
    pub size: usize,
    /// Share of the workload made of repeated templates, in [0, 1).
    pub repetitiveness: f64,
    /// Query-shape distributions.
    pub query: QueryProfile,
    /// Arrival pattern.
    pub schedule: ScheduleProfile,
}

impl Default for WorkloadProfile {
    fn default() -> Self {
        Self {
            size: 1_000,
            repetitiveness: 0.4,
            query: QueryProfile::default(),
            schedule: ScheduleProfile::default(),
        }
    }
}

impl WorkloadProfile {
    /// Reject profiles the generator cannot realize.
    pub fn validate(&self) -> WorkloadResult<()> {
        if self.size == 0 {
            return Err(WorkloadError::profile("workload size must be positive"));
        }
        if !(0.0..1.0).contains(&self.repetitiveness) {
            return Err(WorkloadError::profile(format!(
                "repetitiveness must lie in [0, 1), got {}",
                self.repetitiveness
            )));
        }
        self.query.validate()?;
        self.schedule.validate()?;
        Ok(())
    }
}
