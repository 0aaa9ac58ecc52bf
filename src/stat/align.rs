// Align every group onto a shared x grid by linear interpolation.

use super::{group_refs, sort_floats};
use crate::ir::LayerRecord;

pub fn compute(records: Vec<LayerRecord>) -> Vec<LayerRecord> {
    let mut grid: Vec<f64> = records
        .iter()
        .filter(|r| r.y.is_some())
        .filter_map(|r| r.x)
        .collect();
    if grid.is_empty() {
        return records;
    }
    sort_floats(&mut grid);
    grid.dedup();

    let mut out = Vec::with_capacity(grid.len() * 2);
    for (_, members) in group_refs(&records) {
        let mut observed: Vec<&LayerRecord> = members
            .into_iter()
            .filter(|r| r.x.is_some() && r.y.is_some())
            .collect();
        if observed.is_empty() {
            continue;
        }
        observed.sort_by(|a, b| a.x.unwrap_or_default().total_cmp(&b.x.unwrap_or_default()));
        observed.dedup_by(|a, b| a.x == b.x);

        let template = observed[0];
        for &gx in &grid {
            let hit = observed
                .binary_search_by(|r| r.x.unwrap_or_default().total_cmp(&gx))
                .ok()
                .map(|i| observed[i]);
            let rec = match hit {
                Some(source) => source.clone(),
                None => {
                    let mut rec = LayerRecord::synthetic().with_grouping_of(template);
                    rec.x = Some(gx);
                    rec.y = Some(interpolate(&observed, gx));
                    rec
                }
            };
            out.push(rec);
        }
    }
    out
}

/// Piecewise-linear y at `x`, clamped to the end values outside the range.
fn interpolate(sorted: &[&LayerRecord], x: f64) -> f64 {
    let at = |i: usize| {
        let r = sorted[i];
        (r.x.unwrap_or_default(), r.y.unwrap_or_default())
    };
    let (x0, y0) = at(0);
    let (xn, yn) = at(sorted.len() - 1);
    if x <= x0 {
        return y0;
    }
    if x >= xn {
        return yn;
    }
    let upper = sorted.partition_point(|r| r.x.unwrap_or_default() < x);
    let (xa, ya) = at(upper - 1);
    let (xb, yb) = at(upper);
    ya + (yb - ya) * (x - xa) / (xb - xa)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(idx: usize, group: &str, x: f64, y: f64) -> LayerRecord {
        let mut r = LayerRecord::from_row(idx);
        r.group = Some(group.to_string());
        r.x = Some(x);
        r.y = Some(y);
        r
    }

    fn ys(out: &[LayerRecord], group: &str) -> Vec<(f64, f64)> {
        out.iter()
            .filter(|r| r.group.as_deref() == Some(group))
            .map(|r| (r.x.unwrap(), r.y.unwrap()))
            .collect()
    }

    #[test]
    fn test_two_groups_share_grid() {
        let input = vec![
            rec(0, "a", 0.0, 0.0),
            rec(1, "a", 10.0, 10.0),
            rec(2, "b", 0.0, 5.0),
            rec(3, "b", 5.0, 5.0),
            rec(4, "b", 10.0, 5.0),
        ];
        let out = compute(input);
        assert_eq!(out.len(), 6);
        assert_eq!(ys(&out, "a"), vec![(0.0, 0.0), (5.0, 5.0), (10.0, 10.0)]);
        assert_eq!(ys(&out, "b"), vec![(0.0, 5.0), (5.0, 5.0), (10.0, 5.0)]);
    }

    #[test]
    fn test_observed_points_keep_row_index() {
        let input = vec![rec(0, "a", 0.0, 0.0), rec(1, "a", 10.0, 10.0), rec(2, "b", 5.0, 1.0)];
        let out = compute(input);
        let a: Vec<Option<usize>> = out
            .iter()
            .filter(|r| r.group.as_deref() == Some("a"))
            .map(|r| r.row_index)
            .collect();
        assert_eq!(a, vec![Some(0), None, Some(1)]);
    }

    #[test]
    fn test_clamps_outside_group_range() {
        let input = vec![rec(0, "a", 2.0, 4.0), rec(1, "a", 4.0, 8.0), rec(2, "b", 0.0, 0.0), rec(3, "b", 6.0, 0.0)];
        let out = compute(input);
        assert_eq!(ys(&out, "a"), vec![(0.0, 4.0), (2.0, 4.0), (4.0, 8.0), (6.0, 8.0)]);
    }

    #[test]
    fn test_empty_input() {
        assert!(compute(Vec::new()).is_empty());
    }
}
