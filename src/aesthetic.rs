// Aesthetic Resolution Cascade.
//
// Every channel resolves with the same precedence, highest first:
// the per-datum style override, the layer parameter, the mapped value
// through the layer's scale, the record's raw field, then a default.

use crate::data::{display_value, PlotData, Row};
use crate::ir::{Aesthetic, LayerRecord, LayerSpec, Mapping, ParamMap, StyleOverride};
use crate::scale::{LayerScales, Scale};
use crate::template::expand_placeholders;
use serde::Serialize;

pub const DEFAULT_COLOR: &str = "black";
pub const DEFAULT_FILL: &str = "grey35";
pub const DEFAULT_ALPHA: f64 = 1.0;
pub const DEFAULT_LINEWIDTH: f64 = 0.5;
pub const DEFAULT_SIZE: f64 = 1.5;
pub const DEFAULT_SHAPE: &str = "circle";
pub const DEFAULT_LINETYPE: &str = "solid";

/// Every channel of one record, resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedStyle {
    pub color: String,
    pub fill: String,
    pub alpha: f64,
    pub linewidth: f64,
    pub size: f64,
    pub shape: String,
    pub linetype: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tooltip: Option<String>,
}

/// Resolves aesthetics for the records of one layer.
#[derive(Debug, Clone, Copy)]
pub struct AestheticResolver<'a> {
    layer: &'a LayerSpec,
    mapping: &'a Mapping,
    scales: &'a LayerScales,
    data: &'a PlotData,
}

impl<'a> AestheticResolver<'a> {
    pub fn new(layer: &'a LayerSpec, mapping: &'a Mapping, scales: &'a LayerScales, data: &'a PlotData) -> Self {
        Self {
            layer,
            mapping,
            scales,
            data,
        }
    }

    /// Source row of a record; synthetic records have none.
    pub fn row(&self, record: &LayerRecord) -> Option<Row<'a>> {
        record.row_index.and_then(|i| self.data.row(i))
    }

    /// The layer callback's override for this record, computed at most once.
    fn style_override<'r>(&self, record: &'r LayerRecord) -> Option<&'r StyleOverride> {
        let callback = self.layer.style.as_ref()?;
        record.style_override(|| callback.call(record, self.row(record)))
    }

    fn param_text(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|k| self.layer.params.text(k)).map(str::to_string)
    }

    fn param_number(&self, keys: &[&str]) -> Option<f64> {
        keys.iter().find_map(|k| self.layer.params.number(k))
    }

    /// Mapped categorical value routed through the layer's discrete scale.
    fn scaled_category(&self, record: &LayerRecord, aes: Aesthetic) -> Option<String> {
        if !self.mapping.contains(aes) {
            return None;
        }
        let value = record.category(aes)?;
        match self.scales.get(aes)? {
            Scale::Discrete(scale) => scale.map(value),
            Scale::Continuous(_) => None,
        }
    }

    /// Mapped numeric value routed through the layer's continuous scale.
    fn scaled_number(&self, record: &LayerRecord, aes: Aesthetic) -> Option<f64> {
        if !self.mapping.contains(aes) {
            return None;
        }
        let value = record.numeric(aes)?;
        match self.scales.get(aes)? {
            Scale::Continuous(scale) => scale.map(value),
            Scale::Discrete(_) => None,
        }
    }

    fn category_channel(
        &self,
        record: &LayerRecord,
        aes: Aesthetic,
        from_override: impl FnOnce(&StyleOverride) -> Option<&String>,
        param_keys: &[&str],
        default: &str,
    ) -> String {
        self.style_override(record)
            .and_then(from_override)
            .cloned()
            .or_else(|| self.param_text(param_keys))
            .or_else(|| self.scaled_category(record, aes))
            .or_else(|| record.category(aes).map(str::to_string))
            .unwrap_or_else(|| default.to_string())
    }

    pub fn color(&self, record: &LayerRecord) -> String {
        self.category_channel(record, Aesthetic::Color, |o| o.color.as_ref(), &["color", "colour"], DEFAULT_COLOR)
    }

    pub fn fill(&self, record: &LayerRecord) -> String {
        self.category_channel(record, Aesthetic::Fill, |o| o.fill.as_ref(), &["fill"], DEFAULT_FILL)
    }

    pub fn shape(&self, record: &LayerRecord) -> String {
        self.category_channel(record, Aesthetic::Shape, |o| o.shape.as_ref(), &["shape"], DEFAULT_SHAPE)
    }

    pub fn linetype(&self, record: &LayerRecord) -> String {
        self.category_channel(record, Aesthetic::Linetype, |o| o.linetype.as_ref(), &["linetype"], DEFAULT_LINETYPE)
    }

    pub fn alpha(&self, record: &LayerRecord) -> f64 {
        self.style_override(record)
            .and_then(|o| o.alpha)
            .or_else(|| self.param_number(&["alpha"]))
            .or_else(|| self.scaled_number(record, Aesthetic::Alpha).map(|a| a.clamp(0.0, 1.0)))
            .or(record.alpha)
            .unwrap_or(DEFAULT_ALPHA)
    }

    pub fn size(&self, record: &LayerRecord) -> f64 {
        self.style_override(record)
            .and_then(|o| o.size)
            .or_else(|| self.param_number(&["size"]))
            .or_else(|| self.scaled_number(record, Aesthetic::Size).map(|s| s.max(0.0)))
            .or(record.size)
            .unwrap_or(DEFAULT_SIZE)
    }

    /// Stroke width. Stroke geoms also accept `size` as the layer parameter,
    /// and a mapped size drives the width.
    pub fn linewidth(&self, record: &LayerRecord) -> f64 {
        let keys: &[&str] = if self.layer.geom.is_stroke() {
            &["linewidth", "size"]
        } else {
            &["linewidth"]
        };
        self.style_override(record)
            .and_then(|o| o.linewidth)
            .or_else(|| self.param_number(keys))
            .or_else(|| self.scaled_number(record, Aesthetic::Size).map(|s| s.max(0.0)))
            .or(record.size)
            .unwrap_or(DEFAULT_LINEWIDTH)
    }

    /// Tooltip text: disabled by `tooltip: false`; else the `tooltip`
    /// template, the mapped tooltip field, or (with `tooltip_auto`) a dump of
    /// the source row.
    pub fn tooltip(&self, record: &LayerRecord) -> Option<String> {
        let params = &self.layer.params;
        if params.flag("tooltip") == Some(false) {
            return None;
        }
        let row = self.row(record);

        if let Some(template) = params.text("tooltip").filter(|t| !t.eq_ignore_ascii_case("true")) {
            let lookup = |name: &str| {
                row.and_then(|r| r.get(name))
                    .map(display_value)
                    .or_else(|| record_field(record, name))
            };
            return Some(expand_placeholders(template, lookup));
        }
        if let Some(mapped) = &record.tooltip {
            return Some(mapped.clone());
        }
        if params.flag("tooltip_auto") == Some(true) {
            let row = row?;
            let parts: Vec<String> = row.iter().map(|(k, v)| format!("{}: {}", k, display_value(v))).collect();
            return Some(parts.join(", "));
        }
        None
    }

    pub fn style(&self, record: &LayerRecord) -> ResolvedStyle {
        ResolvedStyle {
            color: self.color(record),
            fill: self.fill(record),
            alpha: self.alpha(record),
            linewidth: self.linewidth(record),
            size: self.size(record),
            shape: self.shape(record),
            linetype: self.linetype(record),
            tooltip: self.tooltip(record),
        }
    }
}

/// A record's core field or meta entry by name, for tooltip placeholders.
fn record_field(record: &LayerRecord, name: &str) -> Option<String> {
    let lowered = name.to_ascii_lowercase();
    let numeric = Aesthetic::NUMERIC.iter().find(|a| a.name() == lowered);
    if let Some(aes) = numeric {
        return record.numeric(*aes).map(|v| v.to_string());
    }
    let categorical = Aesthetic::CATEGORICAL.iter().find(|a| a.name() == lowered);
    if let Some(aes) = categorical {
        return record.category(*aes).map(str::to_string);
    }
    record.meta.get(name).map(display_value)
}
