use crate::data::{coerce_to_decimal, value_to_category, PlotData};
use crate::error::{PipelineError, Result};
use crate::ir::{Aesthetic, LayerRecord, Mapping};
use indexmap::IndexSet;
use serde_json::Value;

/// Records materialized from the source rows of one layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Materialized {
    pub records: Vec<LayerRecord>,
    /// Levels of a discrete x axis, in first-seen order.
    pub x_levels: Option<Vec<String>>,
    pub y_levels: Option<Vec<String>>,
}

/// Column index for every mapped aesthetic, failing on the first missing column.
pub fn resolve_columns(mapping: &Mapping, data: &PlotData) -> Result<Vec<(Aesthetic, usize)>> {
    mapping
        .iter()
        .map(|(aes, column)| {
            data.column_index(column)
                .map(|idx| (aes, idx))
                .ok_or_else(|| PipelineError::ColumnNotFound {
                    aesthetic: aes.name().to_string(),
                    column: column.to_string(),
                })
        })
        .collect()
}

/// A column is discrete when some present cell is not numeric.
fn column_is_discrete(data: &PlotData, idx: usize) -> bool {
    data.rows.iter().filter_map(|row| row.get(idx)).any(|cell| {
        value_to_category(cell).is_some() && coerce_to_decimal(cell).is_none()
    })
}

/// Levels of a discrete positional axis, seeded from its main column.
struct AxisLevels(IndexSet<String>);

impl AxisLevels {
    fn seeded(data: &PlotData, idx: usize) -> Self {
        Self(
            data.rows
                .iter()
                .filter_map(|row| row.get(idx).and_then(value_to_category))
                .collect(),
        )
    }

    fn position(&mut self, cell: &Value) -> Option<f64> {
        let category = value_to_category(cell)?;
        let (idx, _) = self.0.insert_full(category);
        Some(idx as f64)
    }
}

/// Materialize one record per source row through the layer's mapping.
///
/// Numeric channels go through [`coerce_to_decimal`]; a positional axis whose
/// main column is not numeric becomes discrete and its positions are level
/// indices; `z` lands in `meta.z`.
pub fn materialize(mapping: &Mapping, data: &PlotData) -> Result<Materialized> {
    let columns = resolve_columns(mapping, data)?;

    let axis = |main: Aesthetic| {
        columns
            .iter()
            .find(|(aes, _)| *aes == main)
            .map(|(_, idx)| *idx)
            .filter(|idx| column_is_discrete(data, *idx))
            .map(|idx| AxisLevels::seeded(data, idx))
    };
    let mut x_axis = axis(Aesthetic::X);
    let mut y_axis = axis(Aesthetic::Y);

    let mut records = Vec::with_capacity(data.len());
    for (row_idx, row) in data.rows.iter().enumerate() {
        let mut rec = LayerRecord::from_row(row_idx);
        for &(aes, idx) in &columns {
            let cell = row.get(idx).unwrap_or(&Value::Null);
            match aes {
                a if a.is_x_family() && x_axis.is_some() => {
                    let value = x_axis.as_mut().and_then(|levels| levels.position(cell));
                    rec.set_numeric(a, value);
                }
                a if a.is_y_family() && y_axis.is_some() => {
                    let value = y_axis.as_mut().and_then(|levels| levels.position(cell));
                    rec.set_numeric(a, value);
                }
                Aesthetic::Z => {
                    if let Some(z) = coerce_to_decimal(cell) {
                        rec.set_meta("z", z);
                    }
                }
                a if Aesthetic::NUMERIC.contains(&a) => rec.set_numeric(a, coerce_to_decimal(cell)),
                a => rec.set_category(a, value_to_category(cell)),
            }
        }
        records.push(rec);
    }

    log::debug!("materialized {} records from {} mapped columns", records.len(), columns.len());
    Ok(Materialized {
        records,
        x_levels: x_axis.map(|levels| levels.0.into_iter().collect()),
        y_levels: y_axis.map(|levels| levels.0.into_iter().collect()),
    })
}
