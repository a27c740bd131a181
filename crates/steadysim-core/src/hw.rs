//! Hardware parameter profiles.
//!
//! Supplied by the caller as plain structs; the presets mirror the AWS
//! numbers the original experiments ran against. All prices are USD.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Which service backs the result cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheServiceKind {
    /// Object store; throughput bound by instance network speed, charged
    /// per request on top of capacity.
    S3,
    /// Provisioned block volume; fixed throughput, no request charges.
    Gp3,
}

impl CacheServiceKind {
    /// True for the object-store kind.
    #[must_use]
    pub fn is_object_store(self) -> bool {
        matches!(self, Self::S3)
    }
}

/// Compute instance the simulated queries run on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InstanceParams {
    /// Virtual CPUs available to a single query.
    pub vcpus: f64,
    /// Advertised network bandwidth in Gibit/s.
    pub network_speed_gibps: f64,
    /// On-demand price in USD per hour.
    pub price_per_hour: f64,
}

impl InstanceParams {
    /// The c5n.large profile the original experiments used.
    #[must_use]
    pub fn c5n_large() -> Self {
        Self {
            vcpus: 2.0,
            network_speed_gibps: 25.0,
            price_per_hour: 0.108,
        }
    }
}

/// Pricing and latency profile of the cache service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheServiceParams {
    /// s3 or gp3.
    pub kind: CacheServiceKind,
    /// Capacity price in USD per GB-month.
    pub cost_per_gb: f64,
    /// USD per 1000 put requests (object store only; 0 otherwise).
    pub put_cost: f64,
    /// USD per 1000 get requests (object store only; 0 otherwise).
    pub get_cost: f64,
    /// Lower bound of the per-request latency draw, milliseconds.
    pub request_latency_min_ms: f64,
    /// Upper bound of the per-request latency draw, milliseconds.
    pub request_latency_max_ms: f64,
    /// Provisioned throughput in MB/s, required for gp3.
    pub throughput_mb_per_s: Option<f64>,
}

impl CacheServiceParams {
    /// S3 standard-tier profile.
    #[must_use]
    pub fn s3() -> Self {
        Self {
            kind: CacheServiceKind::S3,
            cost_per_gb: 0.023,
            put_cost: 0.005,
            get_cost: 0.0004,
            request_latency_min_ms: 100.0,
            request_latency_max_ms: 200.0,
            throughput_mb_per_s: None,
        }
    }

    /// gp3 volume profile at the given provisioned throughput.
    #[must_use]
    pub fn gp3(throughput_mb_per_s: f64) -> Self {
        Self {
            kind: CacheServiceKind::Gp3,
            cost_per_gb: 0.08,
            put_cost: 0.0,
            get_cost: 0.0,
            request_latency_min_ms: 0.5,
            request_latency_max_ms: 2.0,
            throughput_mb_per_s: Some(throughput_mb_per_s),
        }
    }

    /// Disable the latency jitter draw, for reproducible cost comparisons.
    #[must_use]
    pub fn without_latency_jitter(mut self) -> Self {
        self.request_latency_min_ms = 0.0;
        self.request_latency_max_ms = 0.0;
        self
    }
}

/// Full hardware profile handed to the estimators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HwParameters {
    /// Compute instance profile.
    pub instance: InstanceParams,
    /// Cache service profile.
    pub cache: CacheServiceParams,
}

impl HwParameters {
    /// Reject profiles the estimators cannot price.
    pub fn validate(&self) -> CoreResult<()> {
        if self.instance.vcpus <= 0.0 {
            return Err(CoreError::config(format!(
                "instance vCPUs must be positive, got {}",
                self.instance.vcpus
            )));
        }
        if self.instance.network_speed_gibps <= 0.0 {
            return Err(CoreError::config(format!(
                "instance network speed must be positive, got {}",
                self.instance.network_speed_gibps
            )));
        }
        if self.instance.price_per_hour < 0.0 {
            return Err(CoreError::config("instance price_per_hour is negative"));
        }
        let cache = &self.cache;
        if cache.cost_per_gb < 0.0 || cache.put_cost < 0.0 || cache.get_cost < 0.0 {
            return Err(CoreError::config("cache costs must be non-negative"));
        }
        if cache.request_latency_min_ms < 0.0
            || cache.request_latency_max_ms < cache.request_latency_min_ms
        {
            return Err(CoreError::config(format!(
                "cache latency bounds are inverted: [{}, {}]",
                cache.request_latency_min_ms, cache.request_latency_max_ms
            )));
        }
        match (cache.kind, cache.throughput_mb_per_s) {
            (CacheServiceKind::Gp3, None) => Err(CoreError::config(
                "gp3 cache requires throughput_mb_per_s",
            )),
            (CacheServiceKind::Gp3, Some(throughput)) if throughput <= 0.0 => Err(
                CoreError::config("gp3 throughput_mb_per_s must be positive"),
            ),
            _ => Ok(()),
        }
    }
}
