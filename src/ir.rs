use crate::coord::CoordSpec;
use crate::data::{coerce_to_decimal, Row};
use crate::scale::ScaleSpec;
use crate::stat::StatKind;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::cell::OnceCell;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Free-form parameter map (stat parameters, style parameters, coord parameters).
pub type Params = BTreeMap<String, Value>;

/// Stat-specific side channel carried by a record.
pub type Meta = BTreeMap<String, Value>;

// =============================================================================
// Aesthetics & Mapping
// =============================================================================

/// A named visual channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aesthetic {
    X,
    Y,
    Xend,
    Yend,
    Xmin,
    Xmax,
    Ymin,
    Ymax,
    #[serde(alias = "colour")]
    Color,
    Fill,
    Size,
    Alpha,
    Group,
    Shape,
    Linetype,
    Label,
    Tooltip,
    Z,
}

impl Aesthetic {
    pub const NUMERIC: [Aesthetic; 10] = [
        Aesthetic::X,
        Aesthetic::Y,
        Aesthetic::Xend,
        Aesthetic::Yend,
        Aesthetic::Xmin,
        Aesthetic::Xmax,
        Aesthetic::Ymin,
        Aesthetic::Ymax,
        Aesthetic::Size,
        Aesthetic::Alpha,
    ];

    pub const CATEGORICAL: [Aesthetic; 7] = [
        Aesthetic::Color,
        Aesthetic::Fill,
        Aesthetic::Group,
        Aesthetic::Shape,
        Aesthetic::Linetype,
        Aesthetic::Label,
        Aesthetic::Tooltip,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Aesthetic::X => "x",
            Aesthetic::Y => "y",
            Aesthetic::Xend => "xend",
            Aesthetic::Yend => "yend",
            Aesthetic::Xmin => "xmin",
            Aesthetic::Xmax => "xmax",
            Aesthetic::Ymin => "ymin",
            Aesthetic::Ymax => "ymax",
            Aesthetic::Color => "color",
            Aesthetic::Fill => "fill",
            Aesthetic::Size => "size",
            Aesthetic::Alpha => "alpha",
            Aesthetic::Group => "group",
            Aesthetic::Shape => "shape",
            Aesthetic::Linetype => "linetype",
            Aesthetic::Label => "label",
            Aesthetic::Tooltip => "tooltip",
            Aesthetic::Z => "z",
        }
    }

    /// Positional channels on the x side.
    pub fn is_x_family(&self) -> bool {
        matches!(self, Aesthetic::X | Aesthetic::Xend | Aesthetic::Xmin | Aesthetic::Xmax)
    }

    pub fn is_y_family(&self) -> bool {
        matches!(self, Aesthetic::Y | Aesthetic::Yend | Aesthetic::Ymin | Aesthetic::Ymax)
    }
}

impl fmt::Display for Aesthetic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Binding from aesthetics to data columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Mapping(BTreeMap<Aesthetic, String>);

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, aesthetic: Aesthetic, column: impl Into<String>) -> Self {
        self.0.insert(aesthetic, column.into());
        self
    }

    pub fn get(&self, aesthetic: Aesthetic) -> Option<&str> {
        self.0.get(&aesthetic).map(String::as_str)
    }

    pub fn contains(&self, aesthetic: Aesthetic) -> bool {
        self.0.contains_key(&aesthetic)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Aesthetic, &str)> {
        self.0.iter().map(|(a, c)| (*a, c.as_str()))
    }

    /// Layer mapping laid over an inherited chart mapping, one aesthetic at a time.
    pub fn merged_over(&self, inherited: &Mapping) -> Mapping {
        let mut merged = inherited.0.clone();
        merged.extend(self.0.iter().map(|(a, c)| (*a, c.clone())));
        Mapping(merged)
    }
}

// =============================================================================
// Layer Specification
// =============================================================================

/// Geometry tag. The pipeline only carries it through; drawing belongs to the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Geom {
    #[default]
    Point,
    Line,
    Path,
    Bar,
    Col,
    Area,
    Ribbon,
    Smooth,
    Text,
    Segment,
    Rect,
    Tile,
    Boxplot,
    Histogram,
    Abline,
}

impl Geom {
    /// Geoms drawn as strokes, whose size channel is a line width.
    pub fn is_stroke(&self) -> bool {
        matches!(
            self,
            Geom::Line | Geom::Path | Geom::Smooth | Geom::Segment | Geom::Abline
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PositionSpec {
    pub kind: String,
    pub params: Params,
}

impl Default for PositionSpec {
    fn default() -> Self {
        Self {
            kind: "identity".to_string(),
            params: Params::new(),
        }
    }
}

/// Per-datum style values produced by a layer's style callback.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StyleOverride {
    pub color: Option<String>,
    pub fill: Option<String>,
    pub alpha: Option<f64>,
    pub linewidth: Option<f64>,
    pub size: Option<f64>,
    pub shape: Option<String>,
    pub linetype: Option<String>,
}

type StyleFn = dyn Fn(&LayerRecord, Option<Row<'_>>) -> Option<StyleOverride> + Send + Sync;

/// Optional per-point style hook. It may have side effects; the cascade calls
/// it at most once per record.
#[derive(Clone)]
pub struct StyleCallback(Arc<StyleFn>);

impl StyleCallback {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&LayerRecord, Option<Row<'_>>) -> Option<StyleOverride> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn call(&self, record: &LayerRecord, row: Option<Row<'_>>) -> Option<StyleOverride> {
        (self.0)(record, row)
    }
}

impl fmt::Debug for StyleCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StyleCallback(..)")
    }
}

/// One layer: geometry + stat + mapping + style configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerSpec {
    pub geom: Geom,
    pub stat: StatKind,
    pub stat_params: Params,
    pub mapping: Mapping,
    pub inherit_mapping: bool,
    pub position: PositionSpec,
    pub params: Params,
    #[serde(skip)]
    pub style: Option<StyleCallback>,
    pub scales: BTreeMap<Aesthetic, ScaleSpec>,
}

impl Default for LayerSpec {
    fn default() -> Self {
        Self {
            geom: Geom::default(),
            stat: StatKind::Identity,
            stat_params: Params::new(),
            mapping: Mapping::new(),
            inherit_mapping: true,
            position: PositionSpec::default(),
            params: Params::new(),
            style: None,
            scales: BTreeMap::new(),
        }
    }
}

impl LayerSpec {
    pub fn new(geom: Geom, stat: StatKind) -> Self {
        Self {
            geom,
            stat,
            ..Default::default()
        }
    }

    pub fn with_mapping(mut self, mapping: Mapping) -> Self {
        self.mapping = mapping;
        self
    }

    pub fn with_stat_param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.stat_params.insert(key.to_string(), value.into());
        self
    }

    pub fn with_param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    pub fn with_scale(mut self, aesthetic: Aesthetic, scale: ScaleSpec) -> Self {
        self.scales.insert(aesthetic, scale);
        self
    }

    pub fn with_style(mut self, callback: StyleCallback) -> Self {
        self.style = Some(callback);
        self
    }

    /// The mapping this layer actually uses.
    pub fn effective_mapping(&self, inherited: &Mapping) -> Mapping {
        if self.inherit_mapping {
            self.mapping.merged_over(inherited)
        } else {
            self.mapping.clone()
        }
    }
}

/// A whole chart: inherited mapping, ordered layers, one coordinate system.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartSpec {
    pub mapping: Mapping,
    pub layers: Vec<LayerSpec>,
    pub coord: CoordSpec,
}

impl ChartSpec {
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

/// Typed lookups over a parameter map.
pub trait ParamMap {
    fn number(&self, key: &str) -> Option<f64>;
    fn text(&self, key: &str) -> Option<&str>;
    fn flag(&self, key: &str) -> Option<bool>;
    fn numbers(&self, key: &str) -> Option<Vec<f64>>;
}

impl ParamMap for Params {
    fn number(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(coerce_to_decimal)
    }

    fn text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    fn flag(&self, key: &str) -> Option<bool> {
        match self.get(key)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) if s.eq_ignore_ascii_case("true") => Some(true),
            Value::String(s) if s.eq_ignore_ascii_case("false") => Some(false),
            _ => None,
        }
    }

    fn numbers(&self, key: &str) -> Option<Vec<f64>> {
        let items = self.get(key)?.as_array()?;
        items.iter().map(coerce_to_decimal).collect()
    }
}

// =============================================================================
// LayerRecord
// =============================================================================

/// Memo for the style callback's result. Compares equal regardless of state so
/// that resolving a record's style never changes record equality.
#[derive(Debug, Clone, Default)]
pub(crate) struct StyleCache(OnceCell<Option<StyleOverride>>);

impl PartialEq for StyleCache {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

/// The canonical intermediate point record.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LayerRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xend: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub yend: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xmin: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xmax: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ymin: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ymax: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alpha: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shape: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linetype: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tooltip: Option<String>,
    #[serde(rename = "rowIndex", serialize_with = "serialize_row_index")]
    pub row_index: Option<usize>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub meta: Meta,
    #[serde(skip)]
    pub(crate) style_cache: StyleCache,
}

/// Synthetic records serialize their row index as -1.
fn serialize_row_index<S: Serializer>(index: &Option<usize>, s: S) -> Result<S::Ok, S::Error> {
    match index {
        Some(i) => s.serialize_i64(*i as i64),
        None => s.serialize_i64(-1),
    }
}

impl LayerRecord {
    /// A record traced to source row `index`.
    pub fn from_row(index: usize) -> Self {
        Self {
            row_index: Some(index),
            ..Default::default()
        }
    }

    /// A record derived by a stat, with no source row.
    pub fn synthetic() -> Self {
        Self::default()
    }

    pub fn xy(x: f64, y: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            ..Default::default()
        }
    }

    pub fn is_synthetic(&self) -> bool {
        self.row_index.is_none()
    }

    pub fn numeric(&self, aesthetic: Aesthetic) -> Option<f64> {
        match aesthetic {
            Aesthetic::X => self.x,
            Aesthetic::Y => self.y,
            Aesthetic::Xend => self.xend,
            Aesthetic::Yend => self.yend,
            Aesthetic::Xmin => self.xmin,
            Aesthetic::Xmax => self.xmax,
            Aesthetic::Ymin => self.ymin,
            Aesthetic::Ymax => self.ymax,
            Aesthetic::Size => self.size,
            Aesthetic::Alpha => self.alpha,
            Aesthetic::Z => self.meta_f64("z"),
            _ => None,
        }
    }

    pub fn set_numeric(&mut self, aesthetic: Aesthetic, value: Option<f64>) {
        match aesthetic {
            Aesthetic::X => self.x = value,
            Aesthetic::Y => self.y = value,
            Aesthetic::Xend => self.xend = value,
            Aesthetic::Yend => self.yend = value,
            Aesthetic::Xmin => self.xmin = value,
            Aesthetic::Xmax => self.xmax = value,
            Aesthetic::Ymin => self.ymin = value,
            Aesthetic::Ymax => self.ymax = value,
            Aesthetic::Size => self.size = value,
            Aesthetic::Alpha => self.alpha = value,
            Aesthetic::Z => match value {
                Some(z) => self.set_meta("z", z),
                None => {
                    self.meta.remove("z");
                }
            },
            _ => {}
        }
    }

    pub fn category(&self, aesthetic: Aesthetic) -> Option<&str> {
        let value = match aesthetic {
            Aesthetic::Color => &self.color,
            Aesthetic::Fill => &self.fill,
            Aesthetic::Group => &self.group,
            Aesthetic::Shape => &self.shape,
            Aesthetic::Linetype => &self.linetype,
            Aesthetic::Label => &self.label,
            Aesthetic::Tooltip => &self.tooltip,
            _ => return None,
        };
        value.as_deref()
    }

    pub fn set_category(&mut self, aesthetic: Aesthetic, value: Option<String>) {
        match aesthetic {
            Aesthetic::Color => self.color = value,
            Aesthetic::Fill => self.fill = value,
            Aesthetic::Group => self.group = value,
            Aesthetic::Shape => self.shape = value,
            Aesthetic::Linetype => self.linetype = value,
            Aesthetic::Label => self.label = value,
            Aesthetic::Tooltip => self.tooltip = value,
            _ => {}
        }
    }

    pub fn meta_f64(&self, key: &str) -> Option<f64> {
        self.meta.get(key).and_then(coerce_to_decimal)
    }

    pub fn set_meta(&mut self, key: &str, value: impl Into<Value>) {
        self.meta.insert(key.to_string(), value.into());
    }

    /// Copy the grouping channels (group, color, fill) from `source`.
    pub fn with_grouping_of(mut self, source: &LayerRecord) -> Self {
        self.group = source.group.clone();
        self.color = source.color.clone();
        self.fill = source.fill.clone();
        self
    }

    /// The memoized style override, computing it with `compute` on first access.
    pub fn style_override<F>(&self, compute: F) -> Option<&StyleOverride>
    where
        F: FnOnce() -> Option<StyleOverride>,
    {
        self.style_cache.0.get_or_init(compute).as_ref()
    }

    /// Whether the style callback has already been consulted for this record.
    pub fn style_resolved(&self) -> bool {
        self.style_cache.0.get().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_mapping_merge_overrides_per_aesthetic() {
        let chart = Mapping::new().with(Aesthetic::X, "a").with(Aesthetic::Y, "b");
        let layer = Mapping::new().with(Aesthetic::Y, "c").with(Aesthetic::Color, "g");
        let merged = layer.merged_over(&chart);
        assert_eq!(merged.get(Aesthetic::X), Some("a"));
        assert_eq!(merged.get(Aesthetic::Y), Some("c"));
        assert_eq!(merged.get(Aesthetic::Color), Some("g"));
    }

    #[test]
    fn test_effective_mapping_without_inheritance() {
        let chart = Mapping::new().with(Aesthetic::X, "a");
        let mut layer = LayerSpec::default().with_mapping(Mapping::new().with(Aesthetic::Y, "c"));
        assert_eq!(layer.effective_mapping(&chart).get(Aesthetic::X), Some("a"));
        layer.inherit_mapping = false;
        assert_eq!(layer.effective_mapping(&chart).get(Aesthetic::X), None);
    }

    #[test]
    fn test_mapping_deserializes_colour_alias() {
        let m: Mapping = serde_json::from_value(json!({"x": "a", "colour": "g"})).unwrap();
        assert_eq!(m.get(Aesthetic::Color), Some("g"));
    }

    #[test]
    fn test_style_override_memoized() {
        let rec = LayerRecord::from_row(0);
        let mut calls = 0;
        let first = rec
            .style_override(|| {
                calls += 1;
                Some(StyleOverride {
                    color: Some("red".into()),
                    ..Default::default()
                })
            })
            .cloned();
        let second = rec.style_override(|| unreachable!()).cloned();
        assert_eq!(calls, 1);
        assert_eq!(first, second);
        assert!(rec.style_resolved());
        assert_eq!(rec, LayerRecord::from_row(0));
    }

    #[test]
    fn test_synthetic_row_index_serializes_as_minus_one() {
        let mut rec = LayerRecord::xy(1.0, 2.0);
        rec.set_meta("n", 3);
        let v = serde_json::to_value(&rec).unwrap();
        assert_eq!(v["rowIndex"], json!(-1));
        assert_eq!(v["x"], json!(1.0));
        assert_eq!(v["meta"]["n"], json!(3));
        assert!(v.get("color").is_none());
    }

    #[test]
    fn test_param_map_lookups() {
        let mut p = Params::new();
        p.insert("bins".into(), json!("12"));
        p.insert("se".into(), json!(false));
        p.insert("q".into(), json!([0.1, 0.9]));
        assert_eq!(p.number("bins"), Some(12.0));
        assert_eq!(p.flag("se"), Some(false));
        assert_eq!(p.numbers("q"), Some(vec![0.1, 0.9]));
        assert_eq!(p.text("missing"), None);
    }
}
