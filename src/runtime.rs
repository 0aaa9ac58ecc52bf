// Layer pipeline executor: mapping -> records -> stat -> position -> scales,
// then one chart-wide coordinate projection.

use crate::aesthetic::AestheticResolver;
use crate::coord::{self, CoordHints};
use crate::data::PlotData;
use crate::ir::{ChartSpec, LayerRecord, LayerSpec, Mapping, PositionSpec};
use crate::resolve::{materialize, Materialized};
use crate::scale::{train_layer_scales, LayerScales};
use crate::stat::{self, StatSpec};
use anyhow::{Context, Result};
use serde_json::{json, Value};

/// Hand-off point for position adjustment (dodge, stack, jitter).
pub trait PositionAdjust {
    fn adjust(&self, position: &PositionSpec, records: Vec<LayerRecord>) -> Result<Vec<LayerRecord>>;
}

/// Leaves positions untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityPosition;

impl PositionAdjust for IdentityPosition {
    fn adjust(&self, position: &PositionSpec, records: Vec<LayerRecord>) -> Result<Vec<LayerRecord>> {
        if !position.kind.eq_ignore_ascii_case("identity") {
            log::debug!("position '{}' has no adjuster; leaving records in place", position.kind);
        }
        Ok(records)
    }
}

/// One layer after stat, position adjustment and projection.
#[derive(Debug, Clone)]
pub struct LayerOutput {
    pub records: Vec<LayerRecord>,
    pub scales: LayerScales,
    pub mapping: Mapping,
    pub x_levels: Option<Vec<String>>,
    pub y_levels: Option<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct ChartOutput<'a> {
    pub spec: &'a ChartSpec,
    pub data: &'a PlotData,
    pub layers: Vec<LayerOutput>,
    pub coord: CoordHints,
}

impl<'a> ChartOutput<'a> {
    /// Lazy aesthetic resolution for the records of layer `index`.
    pub fn resolver(&self, index: usize) -> Option<AestheticResolver<'_>> {
        let layer = self.layers.get(index)?;
        let spec = self.spec.layers.get(index)?;
        Some(AestheticResolver::new(spec, &layer.mapping, &layer.scales, self.data))
    }

    /// Records with their resolved style, per layer, plus the coordinate hints.
    pub fn to_json(&self) -> Result<Value> {
        let mut layers = Vec::with_capacity(self.layers.len());
        for (i, (output, spec)) in self.layers.iter().zip(&self.spec.layers).enumerate() {
            let resolver = AestheticResolver::new(spec, &output.mapping, &output.scales, self.data);
            let records = output
                .records
                .iter()
                .map(|rec| {
                    let mut value = serde_json::to_value(rec)?;
                    value["style"] = serde_json::to_value(resolver.style(rec))?;
                    Ok(value)
                })
                .collect::<serde_json::Result<Vec<Value>>>()
                .with_context(|| format!("Failed to serialize records of layer {}", i))?;

            let mut layer = json!({
                "geom": spec.geom,
                "stat": spec.stat,
                "records": records,
            });
            if let Some(levels) = &output.x_levels {
                layer["x_levels"] = json!(levels);
            }
            if let Some(levels) = &output.y_levels {
                layer["y_levels"] = json!(levels);
            }
            layers.push(layer);
        }
        Ok(json!({ "layers": layers, "coord": self.coord }))
    }
}

/// Build every layer of `spec` against `data` and project the result.
pub fn build_chart<'a>(
    spec: &'a ChartSpec,
    data: &'a PlotData,
    position: &dyn PositionAdjust,
) -> Result<ChartOutput<'a>> {
    if spec.layers.is_empty() {
        anyhow::bail!("Chart requires at least one layer");
    }

    let mut layers = Vec::with_capacity(spec.layers.len());
    for (i, layer) in spec.layers.iter().enumerate() {
        let output = build_layer(layer, &spec.mapping, data, position)
            .with_context(|| format!("Failed to build layer {} ({:?}, stat '{}')", i, layer.geom, layer.stat))?;
        layers.push(output);
    }

    let positioned: Vec<Vec<LayerRecord>> = layers.iter_mut().map(|l| std::mem::take(&mut l.records)).collect();
    let (projected, coord) = coord::project(&spec.coord, positioned);
    for (layer, records) in layers.iter_mut().zip(projected) {
        layer.records = records;
    }

    Ok(ChartOutput {
        spec,
        data,
        layers,
        coord,
    })
}

fn build_layer(
    layer: &LayerSpec,
    inherited: &Mapping,
    data: &PlotData,
    position: &dyn PositionAdjust,
) -> Result<LayerOutput> {
    // Validate everything before touching data
    let stat_spec = StatSpec::from_params(layer.stat, &layer.stat_params)?;
    for (aes, scale) in &layer.scales {
        scale.validate(*aes)?;
    }

    let mapping = layer.effective_mapping(inherited);
    let Materialized {
        records,
        x_levels,
        y_levels,
    } = materialize(&mapping, data)?;

    let before = records.len();
    let records = stat::apply(&stat_spec, records);
    log::debug!("stat '{}' produced {} records from {}", layer.stat, records.len(), before);

    let records = position
        .adjust(&layer.position, records)
        .with_context(|| format!("Position adjustment '{}' failed", layer.position.kind))?;

    let scales = train_layer_scales(&mapping, &layer.scales, &records)?;
    log::debug!("trained {} scales", scales.len());

    Ok(LayerOutput {
        records,
        scales,
        mapping,
        x_levels,
        y_levels,
    })
}
