//! Workload characterization.
//!
//! Summary statistics used to position a workload before simulating it:
//! how repetitive it is, how its load distributes over the hours, and how
//! spiky that hourly profile is. Spikiness is the RMSE of successive
//! normalized hourly loads; the standard deviation is computed on the
//! same normalized profile.

use serde::{Deserialize, Serialize};

use steadysim_core::{QueryKind, Workload};

/// Hourly profiles are padded to at least one day for comparability.
const MIN_PROFILE_HOURS: i64 = 24;

/// Share of the workload per query kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct KindFrequencies {
    /// Fraction of selects.
    pub select: f64,
    /// Fraction of inserts.
    pub insert: f64,
    /// Fraction of updates.
    pub update: f64,
    /// Fraction of deletes.
    pub delete: f64,
}

/// Summary statistics over one workload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadInsights {
    /// Number of queries.
    pub size: usize,
    /// Fraction of queries that are repetitions of an earlier fingerprint.
    pub repetitiveness: f64,
    /// Query-kind mix.
    pub kind_frequencies: KindFrequencies,
    /// RMSE of successive normalized hourly loads.
    pub spikiness: f64,
    /// Standard deviation of the normalized hourly loads.
    pub std_dev: f64,
    /// Summed load per hour, 1-based, padded to at least a day.
    pub hourly_load: Vec<f64>,
}

impl WorkloadInsights {
    /// Characterize a workload. Loads must already be assigned for the
    /// hourly profile to be meaningful.
    #[must_use]
    pub fn analyze(workload: &Workload) -> Self {
        let size = workload.len();
        let hourly_load = hourly_profile(workload);

        Self {
            size,
            repetitiveness: repetitiveness(workload),
            kind_frequencies: kind_frequencies(workload),
            spikiness: spikiness(&hourly_load),
            std_dev: normalized_std_dev(&hourly_load),
            hourly_load,
        }
    }

    /// Pretty JSON in the shape result directories store.
    pub fn to_json(&self) -> crate::error::WorkloadResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn hourly_profile(workload: &Workload) -> Vec<f64> {
    let hours = workload.max_hour().max(MIN_PROFILE_HOURS);
    let mut profile = vec![0.0; hours as usize];
    for query in workload {
        let index = (query.hour - 1).clamp(0, hours - 1) as usize;
        profile[index] += query.load;
    }
    profile
}

fn repetitiveness(workload: &Workload) -> f64 {
    if workload.is_empty() {
        return 0.0;
    }
    let unique: std::collections::HashSet<&str> = workload
        .queries()
        .iter()
        .map(|query| query.fingerprint.as_str())
        .collect();
    let repeated = workload.len() - unique.len();
    round4(repeated as f64 / workload.len() as f64)
}

fn kind_frequencies(workload: &Workload) -> KindFrequencies {
    if workload.is_empty() {
        return KindFrequencies::default();
    }
    let total = workload.len() as f64;
    let count = |kind: QueryKind| {
        workload
            .queries()
            .iter()
            .filter(|query| query.kind == kind)
            .count() as f64
    };
    KindFrequencies {
        select: round4(count(QueryKind::Select) / total),
        insert: round4(count(QueryKind::Insert) / total),
        update: round4(count(QueryKind::Update) / total),
        delete: round4(count(QueryKind::Delete) / total),
    }
}

fn normalize(profile: &[f64]) -> Vec<f64> {
    let max = profile.iter().copied().fold(0.0_f64, f64::max);
    if max == 0.0 {
        return vec![0.0; profile.len()];
    }
    profile.iter().map(|load| load / max).collect()
}

fn spikiness(profile: &[f64]) -> f64 {
    let normalized = normalize(profile);
    if normalized.len() < 2 {
        return 0.0;
    }
    let squared_diffs: Vec<f64> = normalized
        .windows(2)
        .map(|pair| (pair[1] - pair[0]).powi(2))
        .collect();
    (squared_diffs.iter().sum::<f64>() / squared_diffs.len() as f64).sqrt()
}

fn normalized_std_dev(profile: &[f64]) -> f64 {
    let normalized = normalize(profile);
    if normalized.is_empty() {
        return 0.0;
    }
    let mean = normalized.iter().sum::<f64>() / normalized.len() as f64;
    let variance = normalized
        .iter()
        .map(|load| (load - mean).powi(2))
        .sum::<f64>()
        / normalized.len() as f64;
    variance.sqrt()
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}
