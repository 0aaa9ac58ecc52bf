// Normal quantile-quantile points and reference line.

use super::distribution::{normal_quantile, quantile};
use super::{group_refs, sort_floats};
use crate::ir::LayerRecord;

/// Sorted sample values (y) against standard normal quantiles (x), per group.
pub fn compute_qq(records: Vec<LayerRecord>) -> Vec<LayerRecord> {
    let mut out = Vec::with_capacity(records.len());
    for (_, members) in group_refs(&records) {
        let mut sample: Vec<&LayerRecord> = members.into_iter().filter(|r| r.y.is_some()).collect();
        sample.sort_by(|a, b| a.y.unwrap_or_default().total_cmp(&b.y.unwrap_or_default()));
        let n = sample.len() as f64;
        for (i, source) in sample.into_iter().enumerate() {
            let mut rec = source.clone();
            rec.x = Some(normal_quantile((i as f64 + 0.5) / n));
            out.push(rec);
        }
    }
    out
}

/// Line through the sample and theoretical quantiles at `probs`, emitted as
/// two endpoints spanning the theoretical range of the group.
pub fn compute_qq_line(probs: [f64; 2], records: Vec<LayerRecord>) -> Vec<LayerRecord> {
    let theoretical = probs.map(normal_quantile);
    let spread = theoretical[1] - theoretical[0];
    if spread == 0.0 {
        return Vec::new();
    }

    let mut out = Vec::new();
    for (_, members) in group_refs(&records) {
        let mut ys: Vec<f64> = members.iter().filter_map(|r| r.y).collect();
        if ys.is_empty() {
            continue;
        }
        sort_floats(&mut ys);
        let n = ys.len() as f64;
        let (lo, hi) = (normal_quantile(0.5 / n), normal_quantile((n - 0.5) / n));
        if hi - lo == 0.0 {
            continue;
        }
        let empirical = probs.map(|p| quantile(&ys, p));

        let slope = (empirical[1] - empirical[0]) / spread;
        let intercept = empirical[0] - slope * theoretical[0];

        for x in [lo, hi] {
            let mut rec = LayerRecord::synthetic().with_grouping_of(members[0]);
            rec.x = Some(x);
            rec.y = Some(intercept + slope * x);
            rec.set_meta("slope", slope);
            rec.set_meta("intercept", intercept);
            out.push(rec);
        }
    }
    out
}
