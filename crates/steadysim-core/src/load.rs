//! Resource-requirement scoring.
//!
//! The load score is a unitless scalar; only per-hour sums and the hybrid
//! admission threshold are meaningful. Byte magnitudes are normalized
//! against a [`LoadReference`] snapshot of the workload so that differently
//! sized workloads produce comparable hourly profiles.

use serde::{Deserialize, Serialize};

use crate::query::Query;
use crate::workload::Workload;

const BYTES_SCANNED_WEIGHT: f64 = 0.8;
const RESULT_SIZE_WEIGHT: f64 = 0.5;
const WRITE_VOLUME_WEIGHT: f64 = 0.8;
const CPU_TIME_WEIGHT: f64 = 1.5;

/// Magnitude snapshot the load score normalizes against.
///
/// Either a median-based or a max-based snapshot of the workload; the
/// choice scales the admission threshold, nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoadReference {
    /// Reference bytes scanned per query.
    pub bytes_scanned: f64,
    /// Reference result size.
    pub result_size: f64,
    /// Reference write volume.
    pub write_volume: f64,
    /// Reference CPU seconds.
    pub cpu_time: f64,
}

impl LoadReference {
    /// Median of each magnitude over the workload. Zero for an empty one.
    #[must_use]
    pub fn median_of(workload: &Workload) -> Self {
        Self {
            bytes_scanned: median(workload, |query| query.bytes_scanned as f64),
            result_size: median(workload, |query| query.result_size as f64),
            write_volume: median(workload, |query| query.write_volume as f64),
            cpu_time: median(workload, |query| query.cpu_time),
        }
    }

    /// Maximum of each magnitude over the workload. Zero for an empty one.
    #[must_use]
    pub fn max_of(workload: &Workload) -> Self {
        let fold = |extract: fn(&Query) -> f64| {
            workload
                .queries()
                .iter()
                .map(extract)
                .fold(0.0_f64, f64::max)
        };
        Self {
            bytes_scanned: fold(|query| query.bytes_scanned as f64),
            result_size: fold(|query| query.result_size as f64),
            write_volume: fold(|query| query.write_volume as f64),
            cpu_time: fold(|query| query.cpu_time),
        }
    }
}

/// Score one query against the reference.
///
/// `0.8·bs/ref + 0.5·rs/ref + 0.8·wv/ref + 1.5·cpu_seconds`, each ratio
/// taken as 0 when its reference magnitude is 0. Rounded to two decimals so
/// hourly sums stay readable in exported plans.
#[must_use]
pub fn estimate_load(query: &Query, reference: &LoadReference) -> f64 {
    let ratio = |value: f64, reference: f64| {
        if reference == 0.0 {
            0.0
        } else {
            value / reference
        }
    };

    let load = BYTES_SCANNED_WEIGHT * ratio(query.bytes_scanned as f64, reference.bytes_scanned)
        + RESULT_SIZE_WEIGHT * ratio(query.result_size as f64, reference.result_size)
        + WRITE_VOLUME_WEIGHT * ratio(query.write_volume as f64, reference.write_volume)
        + CPU_TIME_WEIGHT * query.cpu_time;

    (load * 100.0).round() / 100.0
}

fn median(workload: &Workload, extract: impl Fn(&Query) -> f64) -> f64 {
    let mut values: Vec<f64> = workload.queries().iter().map(extract).collect();
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        values[mid]
    } else {
        (values[mid - 1] + values[mid]) / 2.0
    }
}
