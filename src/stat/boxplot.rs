use super::distribution::quantile;
use super::{group_refs, sort_floats};
use crate::ir::LayerRecord;
use serde_json::Value;

/// Five-number summaries per group and distinct x.
///
/// y is the median, ymin/ymax the whiskers (most extreme values inside
/// `coef`·IQR of the quartiles); the quartiles, count and outliers go to meta.
pub fn compute(coef: f64, records: Vec<LayerRecord>) -> Vec<LayerRecord> {
    let mut out = Vec::new();

    for (_, members) in group_refs(&records) {
        // Group by X value
        let mut pairs: Vec<(f64, f64)> = members.iter().filter_map(|r| Some((r.x?, r.y?))).collect();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
        let mut boxes: Vec<(f64, Vec<f64>)> = Vec::new();
        for (x, y) in pairs {
            match boxes.last_mut() {
                Some((bx, ys)) if *bx == x => ys.push(y),
                _ => boxes.push((x, vec![y])),
            }
        }

        for (x, mut ys) in boxes {
            sort_floats(&mut ys);

            let q1 = quantile(&ys, 0.25);
            let median = quantile(&ys, 0.50);
            let q3 = quantile(&ys, 0.75);
            let iqr = q3 - q1;

            let lower_fence = q1 - coef * iqr;
            let upper_fence = q3 + coef * iqr;

            // Whiskers: range of data within the fences
            let lower_whisker = ys.iter().copied().find(|v| *v >= lower_fence).unwrap_or(q1);
            let upper_whisker = ys.iter().rev().copied().find(|v| *v <= upper_fence).unwrap_or(q3);

            let outliers: Vec<Value> = ys
                .iter()
                .filter(|v| **v < lower_fence || **v > upper_fence)
                .map(|v| Value::from(*v))
                .collect();

            let mut rec = LayerRecord::synthetic().with_grouping_of(members[0]);
            rec.x = Some(x);
            rec.y = Some(median);
            rec.ymin = Some(lower_whisker);
            rec.ymax = Some(upper_whisker);
            rec.set_meta("lower", q1);
            rec.set_meta("middle", median);
            rec.set_meta("upper", q3);
            rec.set_meta("n", ys.len());
            rec.set_meta("outliers", outliers);
            out.push(rec);
        }
    }
    out
}
