// Statistical Transform Engine.
//
// `StatKind` names a transform; `StatSpec` is the kind with its parameters
// validated at layer-build time. `apply` dispatches to a pure function per
// variant. Every stat filters to the records carrying the numeric fields it
// needs and degrades to its input (or an empty list) when there is not
// enough data.

pub mod align;
pub mod boxplot;
pub mod contour;
pub mod distribution;
pub mod qq;
pub mod sample;
pub mod smooth;
pub mod summary;

use crate::error::{PipelineError, Result};
use crate::ir::{LayerRecord, ParamMap, Params};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use sample::SampleMethod;
pub use summary::{SummaryFun, MAX_BINS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum StatKind {
    #[default]
    Identity,
    Smooth,
    Align,
    Contour,
    SummaryBin,
    Sample,
    Qq,
    QqLine,
    Bin,
    Count,
    Boxplot,
}

impl StatKind {
    pub fn name(&self) -> &'static str {
        match self {
            StatKind::Identity => "identity",
            StatKind::Smooth => "smooth",
            StatKind::Align => "align",
            StatKind::Contour => "contour",
            StatKind::SummaryBin => "summary_bin",
            StatKind::Sample => "sample",
            StatKind::Qq => "qq",
            StatKind::QqLine => "qq_line",
            StatKind::Bin => "bin",
            StatKind::Count => "count",
            StatKind::Boxplot => "boxplot",
        }
    }
}

impl FromStr for StatKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        let kind = match normalized.as_str() {
            "identity" => StatKind::Identity,
            "smooth" => StatKind::Smooth,
            "align" => StatKind::Align,
            "contour" => StatKind::Contour,
            "summary_bin" | "summarybin" => StatKind::SummaryBin,
            "sample" => StatKind::Sample,
            "qq" => StatKind::Qq,
            "qq_line" | "qqline" => StatKind::QqLine,
            "bin" | "histogram" => StatKind::Bin,
            "count" => StatKind::Count,
            "boxplot" => StatKind::Boxplot,
            _ => return Err(PipelineError::UnknownStat(s.to_string())),
        };
        Ok(kind)
    }
}

impl TryFrom<String> for StatKind {
    type Error = PipelineError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<StatKind> for String {
    fn from(kind: StatKind) -> Self {
        kind.name().to_string()
    }
}

impl fmt::Display for StatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Validated stat parameters
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct SmoothParams {
    pub degree: usize,
    pub n: usize,
    pub se: bool,
    pub level: f64,
}

impl Default for SmoothParams {
    fn default() -> Self {
        Self {
            degree: 1,
            n: 80,
            se: true,
            level: 0.95,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BinParams {
    pub bins: usize,
    pub binwidth: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SampleParams {
    pub n: usize,
    pub method: SampleMethod,
    pub seed: Option<u64>,
}

/// A stat kind with its parameters validated.
#[derive(Debug, Clone, PartialEq)]
pub enum StatSpec {
    Identity,
    Smooth(SmoothParams),
    Align,
    Contour { bins: usize },
    SummaryBin { bins: BinParams, fun: SummaryFun },
    Sample(SampleParams),
    Qq,
    QqLine { quantiles: [f64; 2] },
    Bin(BinParams),
    Count,
    Boxplot { coef: f64 },
}

impl StatSpec {
    /// Validate `params` for `kind`, naming the offending parameter on failure.
    pub fn from_params(kind: StatKind, params: &Params) -> Result<Self> {
        let spec = match kind {
            StatKind::Identity => StatSpec::Identity,
            StatKind::Smooth => {
                if let Some(method) = params.text("method") {
                    if !method.eq_ignore_ascii_case("lm") {
                        log::warn!("smooth method '{}' is not supported; fitting 'lm'", method);
                    }
                }
                let degree = count_param(params, "degree", 1)?;
                if degree < 1 {
                    return Err(PipelineError::validation("degree", "polynomial degree must be at least 1"));
                }
                let level = params.number("level").unwrap_or(0.95);
                if !(level > 0.0 && level < 1.0) {
                    return Err(PipelineError::validation("level", "confidence level must lie in (0, 1)"));
                }
                StatSpec::Smooth(SmoothParams {
                    degree,
                    n: count_param(params, "n", 80)?.max(1),
                    se: flag_param(params, "se", true)?,
                    level,
                })
            }
            StatKind::Align => StatSpec::Align,
            StatKind::Contour => StatSpec::Contour {
                bins: nonzero_count(params, "bins", 10)?,
            },
            StatKind::SummaryBin => StatSpec::SummaryBin {
                bins: bin_params(params)?,
                fun: match params.text("fun") {
                    Some(name) => name.parse()?,
                    None => SummaryFun::Mean,
                },
            },
            StatKind::Sample => StatSpec::Sample(SampleParams {
                n: count_param(params, "n", 10_000)?,
                method: SampleMethod::from_name(params.text("method").unwrap_or("random")),
                seed: seed_param(params)?,
            }),
            StatKind::Qq => StatSpec::Qq,
            StatKind::QqLine => {
                let quantiles = match params.get("quantiles") {
                    None => [0.25, 0.75],
                    Some(_) => {
                        let values = params.numbers("quantiles").ok_or_else(|| {
                            PipelineError::validation("quantiles", "expected a list of numbers")
                        })?;
                        let [lo, hi] = <[f64; 2]>::try_from(values.as_slice()).map_err(|_| {
                            PipelineError::validation(
                                "quantiles",
                                format!("expected exactly 2 probabilities, got {}", values.len()),
                            )
                        })?;
                        if [lo, hi].iter().any(|p| !(*p > 0.0 && *p < 1.0)) {
                            return Err(PipelineError::validation("quantiles", "probabilities must lie in (0, 1)"));
                        }
                        [lo, hi]
                    }
                };
                StatSpec::QqLine { quantiles }
            }
            StatKind::Bin => StatSpec::Bin(bin_params(params)?),
            StatKind::Count => StatSpec::Count,
            StatKind::Boxplot => {
                let coef = params.number("coef").unwrap_or(1.5);
                if coef < 0.0 {
                    return Err(PipelineError::validation("coef", "whisker coefficient must be non-negative"));
                }
                StatSpec::Boxplot { coef }
            }
        };
        Ok(spec)
    }

    pub fn kind(&self) -> StatKind {
        match self {
            StatSpec::Identity => StatKind::Identity,
            StatSpec::Smooth(_) => StatKind::Smooth,
            StatSpec::Align => StatKind::Align,
            StatSpec::Contour { .. } => StatKind::Contour,
            StatSpec::SummaryBin { .. } => StatKind::SummaryBin,
            StatSpec::Sample(_) => StatKind::Sample,
            StatSpec::Qq => StatKind::Qq,
            StatSpec::QqLine { .. } => StatKind::QqLine,
            StatSpec::Bin(_) => StatKind::Bin,
            StatSpec::Count => StatKind::Count,
            StatSpec::Boxplot { .. } => StatKind::Boxplot,
        }
    }
}

fn count_param(params: &Params, key: &str, default: usize) -> Result<usize> {
    let Some(raw) = params.get(key) else {
        return Ok(default);
    };
    match params.number(key) {
        Some(v) if v >= 0.0 && v.fract() == 0.0 => Ok(v as usize),
        _ => Err(PipelineError::validation(
            key,
            format!("expected a non-negative integer, got {}", raw),
        )),
    }
}

fn nonzero_count(params: &Params, key: &str, default: usize) -> Result<usize> {
    match count_param(params, key, default)? {
        0 => Err(PipelineError::validation(key, "must be at least 1")),
        n => Ok(n),
    }
}

fn flag_param(params: &Params, key: &str, default: bool) -> Result<bool> {
    match params.get(key) {
        None => Ok(default),
        Some(raw) => params
            .flag(key)
            .ok_or_else(|| PipelineError::validation(key, format!("expected a boolean, got {}", raw))),
    }
}

fn bin_params(params: &Params) -> Result<BinParams> {
    let binwidth = match params.get("binwidth") {
        None => None,
        Some(raw) => match params.number("binwidth") {
            Some(w) if w > 0.0 => Some(w),
            _ => {
                return Err(PipelineError::validation(
                    "binwidth",
                    format!("expected a positive number, got {}", raw),
                ))
            }
        },
    };
    let bins = nonzero_count(params, "bins", 30)?;
    if bins > MAX_BINS {
        return Err(PipelineError::validation(
            "bins",
            format!("at most {} buckets are supported, got {}", MAX_BINS, bins),
        ));
    }
    Ok(BinParams { bins, binwidth })
}

fn seed_param(params: &Params) -> Result<Option<u64>> {
    match params.get("seed") {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(raw) => raw
            .as_u64()
            .map(Some)
            .ok_or_else(|| PipelineError::validation("seed", format!("expected an unsigned integer, got {}", raw))),
    }
}

// =============================================================================
// Dispatch
// =============================================================================

/// Run the stat described by `spec` over `records`.
pub fn apply(spec: &StatSpec, records: Vec<LayerRecord>) -> Vec<LayerRecord> {
    match spec {
        StatSpec::Identity => records,
        StatSpec::Smooth(params) => smooth::compute(params, records),
        StatSpec::Align => align::compute(records),
        StatSpec::Contour { bins } => contour::compute(*bins, records),
        StatSpec::SummaryBin { bins, fun } => summary::compute_summary_bin(bins, *fun, records),
        StatSpec::Sample(params) => sample::compute(params, records),
        StatSpec::Qq => qq::compute_qq(records),
        StatSpec::QqLine { quantiles } => qq::compute_qq_line(*quantiles, records),
        StatSpec::Bin(bins) => summary::compute_bin(bins, records),
        StatSpec::Count => summary::compute_count(records),
        StatSpec::Boxplot { coef } => boxplot::compute(*coef, records),
    }
}

// =============================================================================
// Shared helpers
// =============================================================================

/// Grouping key: `group`, else `color`, else `fill`; `None` is the implicit group.
pub fn group_key(record: &LayerRecord) -> Option<&str> {
    record
        .group
        .as_deref()
        .or(record.color.as_deref())
        .or(record.fill.as_deref())
}

/// Split records into groups, preserving first-seen group order and the
/// record order within each group.
pub fn partition_groups(records: Vec<LayerRecord>) -> IndexMap<Option<String>, Vec<LayerRecord>> {
    let mut groups: IndexMap<Option<String>, Vec<LayerRecord>> = IndexMap::new();
    for record in records {
        let key = group_key(&record).map(str::to_string);
        groups.entry(key).or_default().push(record);
    }
    groups
}

/// Borrowing variant of [`partition_groups`], for stats that may hand back
/// their input untouched.
pub fn group_refs(records: &[LayerRecord]) -> IndexMap<Option<&str>, Vec<&LayerRecord>> {
    let mut groups: IndexMap<Option<&str>, Vec<&LayerRecord>> = IndexMap::new();
    for record in records {
        groups.entry(group_key(record)).or_default().push(record);
    }
    groups
}

/// Sort finite values ascending in place.
pub(crate) fn sort_floats(values: &mut [f64]) {
    values.sort_by(f64::total_cmp);
}
