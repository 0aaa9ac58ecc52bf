// Default palettes and Brewer-style palette selection.

use crate::error::{PipelineError, Result};

/// Default discrete color cycle (evenly spaced hues).
pub const DEFAULT_COLORS: [&str; 7] = [
    "#F8766D", "#C49A00", "#53B400", "#00C094", "#00B6EB", "#A58AFF", "#FB61D7",
];

pub const DEFAULT_SHAPES: [&str; 7] = [
    "circle",
    "triangle",
    "square",
    "plus",
    "cross",
    "diamond",
    "triangle-down",
];

pub const DEFAULT_LINETYPES: [&str; 6] = ["solid", "dashed", "dotted", "dotdash", "longdash", "twodash"];

const SET1: &[&str] = &[
    "#E41A1C", "#377EB8", "#4DAF4A", "#984EA3", "#FF7F00", "#FFFF33", "#A65628", "#F781BF", "#999999",
];
const SET2: &[&str] = &[
    "#66C2A5", "#FC8D62", "#8DA0CB", "#E78AC3", "#A6D854", "#FFD92F", "#E5C494", "#B3B3B3",
];
const SET3: &[&str] = &[
    "#8DD3C7", "#FFFFB3", "#BEBADA", "#FB8072", "#80B1D3", "#FDB462", "#B3DE69", "#FCCDE5", "#D9D9D9",
    "#BC80BD", "#CCEBC5", "#FFED6F",
];
const DARK2: &[&str] = &[
    "#1B9E77", "#D95F02", "#7570B3", "#E7298A", "#66A61E", "#E6AB02", "#A6761D", "#666666",
];
const PAIRED: &[&str] = &[
    "#A6CEE3", "#1F78B4", "#B2DF8A", "#33A02C", "#FB9A99", "#E31A1C", "#FDBF6F", "#FF7F00", "#CAB2D6",
    "#6A3D9A", "#FFFF99", "#B15928",
];
const PASTEL1: &[&str] = &[
    "#FBB4AE", "#B3CDE3", "#CCEBC5", "#DECBE4", "#FED9A6", "#FFFFCC", "#E5D8BD", "#FDDAEC", "#F2F2F2",
];
const ACCENT: &[&str] = &[
    "#7FC97F", "#BEAED4", "#FDC086", "#FFFF99", "#386CB0", "#F0027F", "#BF5B17", "#666666",
];
const BLUES: &[&str] = &[
    "#F7FBFF", "#DEEBF7", "#C6DBEF", "#9ECAE1", "#6BAED6", "#4292C6", "#2171B5", "#08519C", "#08306B",
];
const GREENS: &[&str] = &[
    "#F7FCF5", "#E5F5E0", "#C7E9C0", "#A1D99B", "#74C476", "#41AB5D", "#238B45", "#006D2C", "#00441B",
];
const REDS: &[&str] = &[
    "#FFF5F0", "#FEE0D2", "#FCBBA1", "#FC9272", "#FB6A4A", "#EF3B2C", "#CB181D", "#A50F15", "#67000D",
];
const SPECTRAL: &[&str] = &[
    "#9E0142", "#D53E4F", "#F46D43", "#FDAE61", "#FEE08B", "#FFFFBF", "#E6F598", "#ABDDA4", "#66C2A5",
    "#3288BD", "#5E4FA2",
];

/// Look up a named Brewer palette (case-insensitive).
pub fn brewer(name: &str) -> Option<&'static [&'static str]> {
    let palette = match name.to_ascii_lowercase().as_str() {
        "set1" => SET1,
        "set2" => SET2,
        "set3" => SET3,
        "dark2" => DARK2,
        "paired" => PAIRED,
        "pastel1" => PASTEL1,
        "accent" => ACCENT,
        "blues" => BLUES,
        "greens" => GREENS,
        "reds" => REDS,
        "spectral" => SPECTRAL,
        _ => return None,
    };
    Some(palette)
}

/// Pick `k` colors from the named palette.
pub fn select_palette(name: &str, k: usize) -> Result<Vec<String>> {
    let palette = brewer(name).ok_or_else(|| {
        PipelineError::validation("palette", format!("unknown palette '{}'", name))
    })?;
    Ok(select_from(palette, k))
}

/// Pick `k` entries from `palette`: verbatim when sizes match, the middle entry
/// for one, cycling when more are needed, evenly spaced otherwise.
pub fn select_from<S: AsRef<str>>(palette: &[S], k: usize) -> Vec<String> {
    let m = palette.len();
    if m == 0 || k == 0 {
        return Vec::new();
    }
    let pick = |i: usize| palette[i].as_ref().to_string();

    if k == m {
        (0..m).map(pick).collect()
    } else if k == 1 {
        vec![pick(m / 2)]
    } else if k > m {
        (0..k).map(|i| pick(i % m)).collect()
    } else {
        let step = (m - 1) as f64 / (k - 1) as f64;
        (0..k).map(|i| pick((i as f64 * step).round() as usize)).collect()
    }
}
