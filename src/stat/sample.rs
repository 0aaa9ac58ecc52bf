// Down-sampling to a target number of records.

use super::SampleParams;
use crate::ir::LayerRecord;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleMethod {
    /// Reservoir sampling; output keeps source order.
    Random,
    /// Evenly strided indices with a seed-derived phase.
    Systematic,
}

impl SampleMethod {
    /// Parse a method name. Unknown names fall back to `Random`.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "random" => SampleMethod::Random,
            "systematic" => SampleMethod::Systematic,
            other => {
                log::warn!("unknown sample method '{}'; using 'random'", other);
                SampleMethod::Random
            }
        }
    }
}

pub fn compute(params: &SampleParams, records: Vec<LayerRecord>) -> Vec<LayerRecord> {
    let total = records.len();
    if params.n >= total {
        return records;
    }
    let indices = match params.method {
        SampleMethod::Random => reservoir(total, params.n, params.seed),
        SampleMethod::Systematic => systematic(total, params.n, params.seed),
    };
    log::debug!("sampled {} of {} records", indices.len(), total);

    let mut keep = indices.into_iter().peekable();
    records
        .into_iter()
        .enumerate()
        .filter_map(|(i, rec)| {
            if keep.peek() == Some(&i) {
                keep.next();
                Some(rec)
            } else {
                None
            }
        })
        .collect()
}

fn rng_for(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// `n` distinct indices out of `0..total`, ascending.
fn reservoir(total: usize, n: usize, seed: Option<u64>) -> Vec<usize> {
    let mut rng = rng_for(seed);
    let mut picked: Vec<usize> = (0..n).collect();
    for i in n..total {
        let j = rng.gen_range(0..=i);
        if j < n {
            picked[j] = i;
        }
    }
    picked.sort_unstable();
    picked
}

fn systematic(total: usize, n: usize, seed: Option<u64>) -> Vec<usize> {
    let offset: f64 = match seed {
        Some(seed) => StdRng::seed_from_u64(seed).gen(),
        None => 0.0,
    };
    let stride = total as f64 / n as f64;
    let mut picked: Vec<usize> = (0..n)
        .map(|i| (((i as f64 + offset) * stride).floor() as usize).min(total - 1))
        .collect();
    picked.dedup();
    picked
}
