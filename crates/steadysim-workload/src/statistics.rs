//! Distribution parameter fitting for the synthetic generator.
//!
//! Byte magnitudes in real analytical workloads span several orders of
//! magnitude, so the generator draws them log-normally between a
//! megabyte-scale lower bound and a gigabyte-scale upper bound. The
//! fitting treats the bound pair as an approximate 95% interval in log
//! space.

const MB_TO_BYTES: f64 = 1.0e6;
const GB_TO_BYTES: f64 = 1.0e9;
const KB_TO_BYTES: f64 = 1.0e3;

/// Log-normal (mu, sigma) such that draws land mostly inside
/// `[lower_bound_mb MB, upper_bound_gb GB]`, skewed towards the upper
/// bound by `skew_factor` in [0, 1].
#[must_use]
pub fn lognormal_params(lower_bound_mb: f64, upper_bound_gb: f64, skew_factor: f64) -> (f64, f64) {
    let lower = lower_bound_mb * MB_TO_BYTES;
    let upper = upper_bound_gb * GB_TO_BYTES;

    let log_lower = lower.ln();
    let log_upper = upper.ln();

    // bound pair read as a 2-sigma interval in log space
    let spread = (log_upper - log_lower) / 2.0;
    let sigma = spread / 2.0;
    let mu = log_lower + skew_factor * (log_upper - log_lower);

    (mu, sigma)
}

/// Gamma (shape, scale) with the geometric mean of
/// `[lower_bound_kb KB, upper_bound_mb MB]` as the mean and roughly 95%
/// of the mass inside the bounds.
#[must_use]
pub fn gamma_params(lower_bound_kb: f64, upper_bound_mb: f64) -> (f64, f64) {
    let lower = lower_bound_kb * KB_TO_BYTES;
    let upper = upper_bound_mb * MB_TO_BYTES;

    let mean = (lower * upper).sqrt();
    let std_dev = (upper - lower) / 4.0;
    let variance = std_dev * std_dev;

    let shape = mean * mean / variance;
    let scale = variance / mean;

    (shape, scale)
}
