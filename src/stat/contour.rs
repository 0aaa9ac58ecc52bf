// Z-level binning: tags every point with the equal-width level its z falls in.

use crate::data::coerce_to_decimal;
use crate::ir::LayerRecord;
use crate::scale::extent;
use serde_json::Value;

fn z_of(record: &LayerRecord) -> Option<f64> {
    record
        .label
        .as_ref()
        .and_then(|l| coerce_to_decimal(&Value::String(l.clone())))
        .or_else(|| record.meta_f64("z"))
}

pub fn compute(bins: usize, records: Vec<LayerRecord>) -> Vec<LayerRecord> {
    let bins = bins.max(1);
    let positioned = records.iter().filter(|r| r.x.is_some() && r.y.is_some());
    let Some((z_min, z_max)) = extent(positioned.filter_map(z_of)) else {
        return records;
    };
    let mut tagged: Vec<(usize, f64, LayerRecord)> = Vec::with_capacity(records.len());
    let z_max = if z_max == z_min { z_min + 1.0 } else { z_max };
    let width = (z_max - z_min) / bins as f64;

    for mut rec in records {
        let (Some(x), Some(_), Some(z)) = (rec.x, rec.y, z_of(&rec)) else {
            continue;
        };
        let level = (((z - z_min) / width).floor() as usize).min(bins - 1);
        rec.group = Some(format!("level-{}", level));
        rec.set_meta("level", level);
        rec.set_meta("z", z);
        tagged.push((level, x, rec));
    }

    tagged.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.total_cmp(&b.1)));
    tagged.into_iter().map(|(_, _, rec)| rec).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(x: f64, z: f64) -> LayerRecord {
        let mut r = LayerRecord::xy(x, 0.0);
        r.set_meta("z", z);
        r
    }

    #[test]
    fn test_levels_and_ordering() {
        let input = vec![rec(3.0, 9.0), rec(1.0, 0.0), rec(2.0, 9.5), rec(0.0, 4.9), rec(5.0, 10.0)];
        let out = compute(2, input);
        let tags: Vec<(String, f64)> = out
            .iter()
            .map(|r| (r.group.clone().unwrap(), r.x.unwrap()))
            .collect();
        assert_eq!(
            tags,
            vec![
                ("level-0".to_string(), 0.0),
                ("level-0".to_string(), 1.0),
                ("level-1".to_string(), 2.0),
                ("level-1".to_string(), 3.0),
                ("level-1".to_string(), 5.0),
            ]
        );
        assert_eq!(out[4].meta_f64("level"), Some(1.0));
        assert_eq!(out[4].meta_f64("z"), Some(10.0));
    }

    #[test]
    fn test_ten_levels_sort_numerically() {
        let input: Vec<LayerRecord> = (0..11).rev().map(|i| rec(i as f64, i as f64)).collect();
        let out = compute(10, input);
        let levels: Vec<f64> = out.iter().map(|r| r.meta_f64("level").unwrap()).collect();
        assert_eq!(levels.first(), Some(&0.0));
        assert_eq!(levels.last(), Some(&9.0));
        assert!(levels.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_z_from_label() {
        let mut a = LayerRecord::xy(0.0, 0.0);
        a.label = Some("2.5".to_string());
        let mut b = LayerRecord::xy(1.0, 0.0);
        b.label = Some("n/a".to_string());
        let out = compute(10, vec![a, b]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].meta_f64("z"), Some(2.5));
    }

    #[test]
    fn test_degenerate_range_widens() {
        let out = compute(4, vec![rec(0.0, 3.0), rec(1.0, 3.0)]);
        assert!(out.iter().all(|r| r.group.as_deref() == Some("level-0")));
    }

    #[test]
    fn test_without_z_is_unchanged() {
        let input = vec![LayerRecord::xy(0.0, 1.0)];
        assert_eq!(compute(10, input.clone()), input);
    }
}
