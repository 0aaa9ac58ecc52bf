use crate::error::{PipelineError, Result};
use crate::ir::{Aesthetic, LayerRecord, Mapping};
use crate::palette::{self, DEFAULT_COLORS, DEFAULT_LINETYPES, DEFAULT_SHAPES};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// Named transforms
// =============================================================================

/// Monotonic transform applied before an affine mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScaleTransform {
    #[default]
    Identity,
    Log10,
    Log,
    Log2,
    Sqrt,
    Reverse,
    Exp,
}

impl ScaleTransform {
    pub fn from_name(name: &str) -> Option<Self> {
        let t = match name.to_ascii_lowercase().as_str() {
            "identity" | "linear" => ScaleTransform::Identity,
            "log10" => ScaleTransform::Log10,
            "log" | "ln" => ScaleTransform::Log,
            "log2" => ScaleTransform::Log2,
            "sqrt" => ScaleTransform::Sqrt,
            "reverse" => ScaleTransform::Reverse,
            "exp" => ScaleTransform::Exp,
            _ => return None,
        };
        Some(t)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ScaleTransform::Identity => "identity",
            ScaleTransform::Log10 => "log10",
            ScaleTransform::Log => "log",
            ScaleTransform::Log2 => "log2",
            ScaleTransform::Sqrt => "sqrt",
            ScaleTransform::Reverse => "reverse",
            ScaleTransform::Exp => "exp",
        }
    }

    /// Transform `v`, or `None` outside the transform's domain.
    pub fn apply(&self, v: f64) -> Option<f64> {
        let out = match self {
            ScaleTransform::Identity => v,
            ScaleTransform::Log10 if v > 0.0 => v.log10(),
            ScaleTransform::Log if v > 0.0 => v.ln(),
            ScaleTransform::Log2 if v > 0.0 => v.log2(),
            ScaleTransform::Sqrt if v >= 0.0 => v.sqrt(),
            ScaleTransform::Reverse => -v,
            ScaleTransform::Exp => v.exp(),
            _ => return None,
        };
        out.is_finite().then_some(out)
    }
}

// =============================================================================
// Scales
// =============================================================================

/// Numeric domain extent mapped onto a numeric range extent.
#[derive(Debug, Clone, PartialEq)]
pub struct ContinuousScale {
    pub domain: (f64, f64),
    pub range: (f64, f64),
    pub transform: ScaleTransform,
}

impl ContinuousScale {
    pub fn new(domain: (f64, f64), range: (f64, f64)) -> Self {
        Self {
            domain,
            range,
            transform: ScaleTransform::Identity,
        }
    }

    pub fn with_transform(mut self, transform: ScaleTransform) -> Self {
        self.transform = transform;
        self
    }

    /// Map a domain value into the range. A degenerate domain maps to the
    /// middle of the range.
    pub fn map(&self, v: f64) -> Option<f64> {
        let tv = self.transform.apply(v)?;
        let t0 = self.transform.apply(self.domain.0)?;
        let t1 = self.transform.apply(self.domain.1)?;
        let (r0, r1) = self.range;
        if t1 == t0 {
            return Some((r0 + r1) / 2.0);
        }
        Some(r0 + (tv - t0) / (t1 - t0) * (r1 - r0))
    }
}

/// Ordered levels mapped to output values via an explicit table or a cycling palette.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscreteScale {
    pub levels: Vec<String>,
    pub table: BTreeMap<String, String>,
    pub palette: Vec<String>,
}

impl DiscreteScale {
    /// Levels in first-seen order, duplicates dropped.
    pub fn from_values<'a, I>(values: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let levels: IndexSet<&str> = values.into_iter().collect();
        Self::declared(levels.into_iter().map(str::to_string).collect())
    }

    /// Explicitly declared levels; later duplicates are dropped.
    pub fn declared(levels: Vec<String>) -> Self {
        let levels: IndexSet<String> = levels.into_iter().collect();
        Self {
            levels: levels.into_iter().collect(),
            table: BTreeMap::new(),
            palette: Vec::new(),
        }
    }

    pub fn with_palette<S: AsRef<str>>(mut self, palette: &[S]) -> Self {
        self.palette = palette.iter().map(|s| s.as_ref().to_string()).collect();
        self
    }

    pub fn with_table(mut self, table: BTreeMap<String, String>) -> Self {
        self.table = table;
        self
    }

    pub fn index_of(&self, value: &str) -> Option<usize> {
        self.levels.iter().position(|l| l == value)
    }

    /// Explicit table first, else the palette entry at the level's index (wrapping).
    pub fn map(&self, value: &str) -> Option<String> {
        if let Some(mapped) = self.table.get(value) {
            return Some(mapped.clone());
        }
        if self.palette.is_empty() {
            return None;
        }
        let idx = self.index_of(value)?;
        Some(self.palette[idx % self.palette.len()].clone())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Scale {
    Continuous(ContinuousScale),
    Discrete(DiscreteScale),
}

// =============================================================================
// Scale overrides
// =============================================================================

/// Per-aesthetic scale override supplied with a layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScaleSpec {
    /// Continuous domain override.
    pub limits: Option<[f64; 2]>,
    /// Continuous output range override.
    pub range: Option<[f64; 2]>,
    pub transform: Option<String>,
    /// Declared discrete levels.
    pub levels: Option<Vec<String>>,
    /// Manual values: paired with `levels` when declared, else used as the palette.
    pub values: Option<Vec<String>>,
    /// Brewer palette name.
    pub palette: Option<String>,
}

impl ScaleSpec {
    pub fn validate(&self, aesthetic: Aesthetic) -> Result<()> {
        if let Some(name) = &self.transform {
            if ScaleTransform::from_name(name).is_none() {
                return Err(PipelineError::validation(
                    "transform",
                    format!("unknown transform '{}' for {} scale", name, aesthetic),
                ));
            }
        }
        if let (Some(levels), Some(values)) = (&self.levels, &self.values) {
            if levels.len() != values.len() {
                return Err(PipelineError::validation(
                    "values",
                    format!(
                        "{} scale declares {} levels but {} values",
                        aesthetic,
                        levels.len(),
                        values.len()
                    ),
                ));
            }
        }
        if let Some(name) = &self.palette {
            if palette::brewer(name).is_none() {
                return Err(PipelineError::validation(
                    "palette",
                    format!("unknown palette '{}' for {} scale", name, aesthetic),
                ));
            }
        }
        for (param, pair) in [("limits", &self.limits), ("range", &self.range)] {
            if let Some([lo, hi]) = pair {
                if !lo.is_finite() || !hi.is_finite() {
                    return Err(PipelineError::validation(param, "bounds must be finite"));
                }
            }
        }
        Ok(())
    }

    fn transform(&self) -> ScaleTransform {
        self.transform
            .as_deref()
            .and_then(ScaleTransform::from_name)
            .unwrap_or_default()
    }
}

// =============================================================================
// Per-layer training
// =============================================================================

/// Scales trained for one layer, keyed by aesthetic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayerScales(BTreeMap<Aesthetic, Scale>);

impl LayerScales {
    pub fn get(&self, aesthetic: Aesthetic) -> Option<&Scale> {
        self.0.get(&aesthetic)
    }

    pub fn insert(&mut self, aesthetic: Aesthetic, scale: Scale) {
        self.0.insert(aesthetic, scale);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

const DISCRETE_AESTHETICS: [Aesthetic; 4] = [
    Aesthetic::Color,
    Aesthetic::Fill,
    Aesthetic::Shape,
    Aesthetic::Linetype,
];

const CONTINUOUS_AESTHETICS: [Aesthetic; 2] = [Aesthetic::Size, Aesthetic::Alpha];

pub fn default_range(aesthetic: Aesthetic) -> (f64, f64) {
    match aesthetic {
        Aesthetic::Alpha => (0.1, 1.0),
        _ => (1.0, 6.0),
    }
}

fn default_palette(aesthetic: Aesthetic) -> &'static [&'static str] {
    match aesthetic {
        Aesthetic::Shape => &DEFAULT_SHAPES,
        Aesthetic::Linetype => &DEFAULT_LINETYPES,
        _ => &DEFAULT_COLORS,
    }
}

/// Train the non-positional scales of one layer from its stat output.
///
/// Only aesthetics that are mapped, or carry an explicit override, get a scale.
pub fn train_layer_scales(
    mapping: &Mapping,
    overrides: &BTreeMap<Aesthetic, ScaleSpec>,
    records: &[LayerRecord],
) -> Result<LayerScales> {
    let mut scales = LayerScales::default();

    for aes in DISCRETE_AESTHETICS {
        let spec = overrides.get(&aes);
        if !mapping.contains(aes) && spec.is_none() {
            continue;
        }
        let spec = spec.cloned().unwrap_or_default();
        spec.validate(aes)?;

        let base = match &spec.levels {
            Some(levels) => DiscreteScale::declared(levels.clone()),
            None => DiscreteScale::from_values(records.iter().filter_map(|r| r.category(aes))),
        };

        let scale = match (&spec.levels, &spec.values, &spec.palette) {
            (Some(levels), Some(values), _) => {
                let table = levels.iter().cloned().zip(values.iter().cloned()).collect();
                base.with_table(table)
            }
            (None, Some(values), _) => base.with_palette(values.as_slice()),
            (_, None, Some(name)) => {
                let colors = palette::select_palette(name, base.levels.len())?;
                base.with_palette(colors.as_slice())
            }
            (_, None, None) => base.with_palette(default_palette(aes)),
        };
        scales.insert(aes, Scale::Discrete(scale));
    }

    for aes in CONTINUOUS_AESTHETICS {
        let spec = overrides.get(&aes);
        if !mapping.contains(aes) && spec.is_none() {
            continue;
        }
        let spec = spec.cloned().unwrap_or_default();
        spec.validate(aes)?;

        let domain = match spec.limits {
            Some([lo, hi]) => Some((lo, hi)),
            None => extent(records.iter().filter_map(|r| r.numeric(aes))),
        };
        let Some(domain) = domain else {
            continue;
        };
        let range = spec.range.map(|[lo, hi]| (lo, hi)).unwrap_or_else(|| default_range(aes));
        let scale = ContinuousScale::new(domain, range).with_transform(spec.transform());
        scales.insert(aes, Scale::Continuous(scale));
    }

    Ok(scales)
}

/// Min and max of the finite values, if any.
pub fn extent<I: IntoIterator<Item = f64>>(values: I) -> Option<(f64, f64)> {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for v in values {
        if !v.is_finite() {
            continue;
        }
        if v < min {
            min = v;
        }
        if v > max {
            max = v;
        }
    }
    (min <= max).then_some((min, max))
}
