// Binning stats: `summary_bin`, `bin` (histogram) and `count`.

use super::{group_refs, sort_floats, BinParams};
use crate::error::{PipelineError, Result};
use crate::ir::LayerRecord;
use crate::scale::extent;
use std::collections::BTreeMap;
use std::str::FromStr;

/// Aggregate applied to the y values of one bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryFun {
    Mean,
    Median,
    Sum,
    Min,
    Max,
}

impl FromStr for SummaryFun {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mean" => Ok(SummaryFun::Mean),
            "median" => Ok(SummaryFun::Median),
            "sum" => Ok(SummaryFun::Sum),
            "min" => Ok(SummaryFun::Min),
            "max" => Ok(SummaryFun::Max),
            _ => Err(PipelineError::validation(
                "fun",
                format!("unknown summary function '{}' (expected mean, median, sum, min or max)", s),
            )),
        }
    }
}

impl SummaryFun {
    fn apply(&self, values: &mut [f64]) -> f64 {
        match self {
            SummaryFun::Mean => values.iter().sum::<f64>() / values.len() as f64,
            SummaryFun::Median => {
                sort_floats(values);
                super::distribution::quantile(values, 0.5)
            }
            SummaryFun::Sum => values.iter().sum(),
            SummaryFun::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            SummaryFun::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

/// Upper bound on buckets per binning stat.
pub const MAX_BINS: usize = 100_000;

/// Equal-width buckets over a fixed x range. The last bucket is closed.
#[derive(Debug, Clone, Copy)]
struct Edges {
    min: f64,
    width: f64,
    bins: usize,
}

impl Edges {
    fn new(min: f64, max: f64, params: &BinParams) -> Self {
        let range = max - min;
        match params.binwidth {
            Some(width) if range / width > MAX_BINS as f64 => {
                log::warn!(
                    "binwidth {} over range {} needs more than {} buckets; widening to {} buckets",
                    width,
                    range,
                    MAX_BINS,
                    MAX_BINS
                );
                Self {
                    min,
                    width: range / MAX_BINS as f64,
                    bins: MAX_BINS,
                }
            }
            Some(width) => Self {
                min,
                width,
                bins: ((range / width).ceil() as usize).max(1),
            },
            None => Self {
                min,
                width: if range == 0.0 { 1.0 } else { range / params.bins as f64 },
                bins: params.bins,
            },
        }
    }

    fn index(&self, v: f64) -> usize {
        let idx = ((v - self.min) / self.width).floor();
        if idx <= 0.0 {
            0
        } else {
            (idx as usize).min(self.bins - 1)
        }
    }

    fn lower(&self, idx: usize) -> f64 {
        self.min + idx as f64 * self.width
    }

    fn upper(&self, idx: usize) -> f64 {
        self.lower(idx + 1)
    }

    fn center(&self, idx: usize) -> f64 {
        self.lower(idx) + self.width / 2.0
    }
}

fn bucket_record(template: &LayerRecord, edges: &Edges, idx: usize, y: f64, n: usize) -> LayerRecord {
    let mut rec = LayerRecord::synthetic().with_grouping_of(template);
    let (lo, hi) = (edges.lower(idx), edges.upper(idx));
    rec.x = Some(edges.center(idx));
    rec.y = Some(y);
    rec.xmin = Some(lo);
    rec.xmax = Some(hi);
    rec.set_meta("n", n);
    rec.set_meta("xmin", lo);
    rec.set_meta("xmax", hi);
    rec
}

/// Bin x per group over shared edges and aggregate y in each non-empty bucket.
pub fn compute_summary_bin(params: &BinParams, fun: SummaryFun, records: Vec<LayerRecord>) -> Vec<LayerRecord> {
    let complete = |r: &&LayerRecord| r.x.is_some() && r.y.is_some();
    let Some((min, max)) = extent(records.iter().filter(complete).filter_map(|r| r.x)) else {
        return records;
    };
    let edges = Edges::new(min, max, params);

    let mut out = Vec::new();
    for (_, members) in group_refs(&records) {
        let mut buckets: BTreeMap<usize, Vec<f64>> = BTreeMap::new();
        for rec in members.iter().copied().filter(complete) {
            let (Some(x), Some(y)) = (rec.x, rec.y) else { continue };
            buckets.entry(edges.index(x)).or_default().push(y);
        }
        let Some(template) = members.first() else { continue };
        for (idx, mut ys) in buckets {
            let n = ys.len();
            let y = fun.apply(&mut ys);
            out.push(bucket_record(template, &edges, idx, y, n));
        }
    }
    out
}

/// Histogram: count x per group over shared edges. Every bucket is emitted,
/// including empty ones.
pub fn compute_bin(params: &BinParams, records: Vec<LayerRecord>) -> Vec<LayerRecord> {
    let Some((min, max)) = extent(records.iter().filter_map(|r| r.x)) else {
        return records;
    };
    let edges = Edges::new(min, max, params);

    let mut out = Vec::new();
    for (_, members) in group_refs(&records) {
        let mut counts = vec![0usize; edges.bins];
        for x in members.iter().filter_map(|r| r.x) {
            counts[edges.index(x)] += 1;
        }
        let total: usize = counts.iter().sum();
        if total == 0 {
            continue;
        }
        for (idx, count) in counts.into_iter().enumerate() {
            let mut rec = bucket_record(members[0], &edges, idx, count as f64, count);
            rec.set_meta("density", count as f64 / (total as f64 * edges.width));
            out.push(rec);
        }
    }
    out
}

/// Number of records per group and distinct x, in ascending x order.
pub fn compute_count(records: Vec<LayerRecord>) -> Vec<LayerRecord> {
    let mut out = Vec::new();
    for (_, members) in group_refs(&records) {
        let mut xs: Vec<f64> = members.iter().filter_map(|r| r.x).collect();
        if xs.is_empty() {
            continue;
        }
        sort_floats(&mut xs);

        let mut i = 0;
        while i < xs.len() {
            let x = xs[i];
            let n = xs[i..].iter().take_while(|v| **v == x).count();
            let mut rec = LayerRecord::synthetic().with_grouping_of(members[0]);
            rec.x = Some(x);
            rec.y = Some(n as f64);
            rec.set_meta("n", n);
            out.push(rec);
            i += n;
        }
    }
    out
}
