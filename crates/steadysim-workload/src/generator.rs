//! Synthetic workload generation.
//!
//! A generated workload is a pure function of (profile, seed). Unique
//! query templates are drawn from the profile's shape distributions, a
//! repetition share re-samples templates with replacement, the scheduler
//! spreads everything over the simulated span, and a final pass simulates
//! data growth: every write perturbs the scan and result sizes of later
//! queries over the tables it touched.

use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_distr::{Gamma, LogNormal};
use tracing::debug;
use uuid::Uuid;

use steadysim_core::{Query, QueryKind, Workload};

use crate::error::{WorkloadError, WorkloadResult};
use crate::profile::{QueryProfile, WorkloadProfile};
use crate::scheduler::schedule;
use crate::statistics::lognormal_params;

const LOGNORMAL_SKEW: f64 = 0.5;

/// Minimum magnitudes a delete may shrink later queries down to.
const MIN_BYTES_SCANNED: i64 = 10;
const MIN_RESULT_SIZE: i64 = 7;
const MIN_INTERMEDIATE_SIZE: i64 = 5;

/// A query template before scheduling: shape without tables or arrival
/// time.
#[derive(Debug, Clone)]
pub(crate) struct QueryDraft {
    pub fingerprint: String,
    pub kind: QueryKind,
    pub bytes_scanned: i64,
    pub result_size: i64,
    pub intermediate_result_size: i64,
    pub write_volume: i64,
    pub cpu_time: f64,
    pub db_instance_id: i64,
    pub num_read_tables: usize,
}

/// Draws individual query templates from a [`QueryProfile`].
#[derive(Debug)]
pub(crate) struct QueryGenerator<'profile> {
    profile: &'profile QueryProfile,
    kind_choice: WeightedIndex<f64>,
    table_count_choice: WeightedIndex<f64>,
    cpu_jitter: Gamma<f64>,
}

impl<'profile> QueryGenerator<'profile> {
    /// Build a generator over a validated profile.
    pub(crate) fn new(profile: &'profile QueryProfile) -> WorkloadResult<Self> {
        let weights = &profile.kind_weights;
        let kind_choice =
            WeightedIndex::new([weights.select, weights.insert, weights.update, weights.delete])
                .map_err(|err| WorkloadError::profile(format!("kind weights: {err}")))?;
        let table_count_choice =
            WeightedIndex::new(profile.read_table_counts.iter().map(|(_, weight)| *weight))
                .map_err(|err| WorkloadError::profile(format!("read_table_counts: {err}")))?;
        let cpu_jitter = Gamma::new(2.0, 2.0)
            .map_err(|err| WorkloadError::profile(format!("cpu jitter: {err}")))?;
        Ok(Self {
            profile,
            kind_choice,
            table_count_choice,
            cpu_jitter,
        })
    }

    pub(crate) fn draw(&self, rng: &mut StdRng) -> QueryDraft {
        const KINDS: [QueryKind; 4] = [
            QueryKind::Select,
            QueryKind::Insert,
            QueryKind::Update,
            QueryKind::Delete,
        ];
        let kind = KINDS[self.kind_choice.sample(rng)];

        let bytes_scanned = self.draw_lognormal(rng, &self.profile.bytes_scanned);
        let (num_read_tables, _) =
            self.profile.read_table_counts[self.table_count_choice.sample(rng)];

        let result_size = if kind.is_read() {
            self.draw_lognormal(rng, &self.profile.result_size)
        } else {
            0
        };

        let intermediate_result_size =
            self.estimate_intermediate_size(kind, bytes_scanned, result_size, num_read_tables);

        // deletes move little data, updates a tenth of an insert
        let write_volume_scale = match kind {
            QueryKind::Select => 0.0,
            QueryKind::Insert => 1.0,
            QueryKind::Update => 0.1,
            QueryKind::Delete => 0.01,
        };
        let write_volume =
            (self.draw_lognormal(rng, &self.profile.write_volume) as f64 * write_volume_scale) as i64;

        let cpu_time = (1.0e-9 * bytes_scanned as f64
            + 1.0e-8 * result_size as f64
            + 1.0e-8 * write_volume as f64
            + self.cpu_jitter.sample(rng))
            / 1_000.0;

        let db_instance_id = rng.gen_range(0..self.profile.db_count);

        QueryDraft {
            fingerprint: Uuid::from_bytes(rng.gen()).simple().to_string(),
            kind,
            bytes_scanned,
            result_size,
            intermediate_result_size,
            write_volume,
            cpu_time,
            db_instance_id,
            num_read_tables,
        }
    }

    fn draw_lognormal(&self, rng: &mut StdRng, bounds: &crate::profile::MagnitudeBounds) -> i64 {
        let (mu, sigma) = lognormal_params(bounds.lower_bound_mb, bounds.upper_bound_gb, LOGNORMAL_SKEW);
        match LogNormal::new(mu, sigma) {
            Ok(distribution) => distribution.sample(rng) as i64,
            Err(_) => (mu.exp()) as i64,
        }
    }

    /// Rough intermediate-state estimate: scans blow up with joins and
    /// shrink with selective results.
    fn estimate_intermediate_size(
        &self,
        kind: QueryKind,
        bytes_scanned: i64,
        result_size: i64,
        num_read_tables: usize,
    ) -> i64 {
        let kind_factor = match kind {
            QueryKind::Select => 2.0,
            QueryKind::Update => 1.8,
            QueryKind::Delete => 1.5,
            QueryKind::Insert => 1.2,
        };
        let read_tables_factor = 1.0 + (num_read_tables as f64 - 1.0) * 0.5;
        let reduction_ratio = if bytes_scanned > 0 {
            result_size as f64 / bytes_scanned as f64
        } else {
            1.0
        };
        (bytes_scanned as f64
            * kind_factor
            * read_tables_factor
            * reduction_ratio
            * 10.0_f64.powf(self.profile.ir_scale))
        .round() as i64
    }
}

/// Generates full workloads from a [`WorkloadProfile`].
#[derive(Debug, Clone)]
pub struct WorkloadGenerator {
    profile: WorkloadProfile,
}

impl WorkloadGenerator {
    /// A generator over the given profile.
    #[must_use]
    pub fn new(profile: WorkloadProfile) -> Self {
        Self { profile }
    }

    /// Generate a validated workload. Identical (profile, seed) pairs
    /// produce identical workloads.
    pub fn generate(&self, seed: u64) -> WorkloadResult<Workload> {
        self.profile.validate()?;
        let mut rng = StdRng::seed_from_u64(seed);

        let repetition_count = (self.profile.size as f64 * self.profile.repetitiveness) as usize;
        let unique_count = self.profile.size - repetition_count;

        let query_generator = QueryGenerator::new(&self.profile.query)?;
        let unique: Vec<QueryDraft> = (0..unique_count)
            .map(|_| query_generator.draw(&mut rng))
            .collect();

        let mut drafts = unique.clone();
        for _ in 0..repetition_count {
            let index = rng.gen_range(0..unique.len());
            drafts.push(unique[index].clone());
        }
        drafts.shuffle(&mut rng);
        debug!(
            unique = unique_count,
            repeated = repetition_count,
            "drew query templates"
        );

        let mut queries = schedule(&self.profile.schedule, &mut rng, drafts);
        assign_scan_ratios(&mut queries);
        propagate_write_volumes(&mut queries);

        let mut workload = Workload::from_queries(queries)?;
        workload.recompute_repetition_coefficients();
        Ok(workload)
    }
}

/// Freeze each query's scan-to-result ratios before writes perturb the
/// magnitudes; refreshes size incremental runs from these.
fn assign_scan_ratios(queries: &mut [Query]) {
    for query in queries {
        if query.bytes_scanned > 0 {
            query.scan_to_result_ratio = query.result_size as f64 / query.bytes_scanned as f64;
            query.scan_to_i_result_ratio =
                query.intermediate_result_size as f64 / query.bytes_scanned as f64;
        }
    }
}

/// Simulate data growth: each write shifts the scan and result sizes of
/// every later query reading its table on the same instance.
fn propagate_write_volumes(queries: &mut Vec<Query>) {
    let writes: Vec<(usize, Query)> = queries
        .iter()
        .enumerate()
        .filter(|(_, query)| query.kind.is_write())
        .map(|(index, query)| (index, query.clone()))
        .collect();

    for (position, write) in writes {
        let Some(table) = write.write_table.as_ref() else {
            continue;
        };
        let delta = write.write_volume;
        for query in queries.iter_mut().skip(position + 1) {
            if query.timestamp <= write.timestamp
                || query.db_instance_id != write.db_instance_id
                || !query.read_tables.contains(table)
            {
                continue;
            }
            let delta_result = (query.scan_to_result_ratio * delta as f64) as i64;
            let delta_intermediate = (query.scan_to_i_result_ratio * delta as f64) as i64;
            match write.kind {
                QueryKind::Insert | QueryKind::Update => {
                    query.bytes_scanned += delta;
                    query.result_size += delta_result;
                    query.intermediate_result_size += delta_intermediate;
                }
                QueryKind::Delete => {
                    query.bytes_scanned = (query.bytes_scanned - delta).max(MIN_BYTES_SCANNED);
                    query.result_size = (query.result_size - delta_result).max(MIN_RESULT_SIZE);
                    query.intermediate_result_size = (query.intermediate_result_size
                        - delta_intermediate)
                        .max(MIN_INTERMEDIATE_SIZE);
                }
                QueryKind::Select => {}
            }
        }
    }
}
