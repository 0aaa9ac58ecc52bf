// Coordinate Projection Engine.
//
// Runs once per chart over every layer's positioned records. Projections
// either rewrite positions (flip, polar/radial, trans) or leave them alone
// and surface layout hints (cartesian, fixed).

use crate::ir::{LayerRecord, ParamMap, Params};
use crate::scale::{extent, ScaleTransform};
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordSpec {
    pub kind: String,
    pub params: Params,
}

impl Default for CoordSpec {
    fn default() -> Self {
        Self {
            kind: "cartesian".to_string(),
            params: Params::new(),
        }
    }
}

impl CoordSpec {
    pub fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            params: Params::new(),
        }
    }

    pub fn with_param(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoordKind {
    Cartesian,
    Flip,
    Fixed,
    Polar,
    Radial,
    Trans,
    Unknown(String),
}

impl CoordKind {
    /// Never fails; unrecognized names become `Unknown`.
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "cartesian" | "" => CoordKind::Cartesian,
            "flip" => CoordKind::Flip,
            "fixed" | "equal" => CoordKind::Fixed,
            "polar" => CoordKind::Polar,
            "radial" => CoordKind::Radial,
            "trans" | "transform" => CoordKind::Trans,
            _ => CoordKind::Unknown(name.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            CoordKind::Cartesian => "cartesian",
            CoordKind::Flip => "flip",
            CoordKind::Fixed => "fixed",
            CoordKind::Polar => "polar",
            CoordKind::Radial => "radial",
            CoordKind::Trans => "trans",
            CoordKind::Unknown(name) => name,
        }
    }
}

/// Layout hints for the renderer. Values are never altered to honor them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoordHints {
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xlim: Option<[f64; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ylim: Option<[f64; 2]>,
    pub clip: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theta: Option<String>,
}

impl CoordHints {
    fn from_params(kind: &str, params: &Params) -> Self {
        let clip = match params.get("clip") {
            Some(serde_json::Value::String(s)) => !s.eq_ignore_ascii_case("off"),
            Some(_) => params.flag("clip").unwrap_or(true),
            None => true,
        };
        Self {
            kind: kind.to_string(),
            aspect_ratio: None,
            xlim: limits(params, "xlim"),
            ylim: limits(params, "ylim"),
            clip,
            theta: None,
        }
    }
}

fn limits(params: &Params, key: &str) -> Option<[f64; 2]> {
    let values = params.numbers(key)?;
    <[f64; 2]>::try_from(values.as_slice()).ok()
}

/// Project every layer's records through the chart's coordinate system.
pub fn project(spec: &CoordSpec, mut layers: Vec<Vec<LayerRecord>>) -> (Vec<Vec<LayerRecord>>, CoordHints) {
    let kind = CoordKind::parse(&spec.kind);
    let params = &spec.params;

    let hints = match &kind {
        CoordKind::Cartesian => CoordHints::from_params("cartesian", params),
        CoordKind::Unknown(name) => {
            log::warn!("coordinate system '{}' is not supported; using cartesian", name);
            CoordHints::from_params("cartesian", params)
        }
        CoordKind::Flip => {
            for_each_record(&mut layers, flip_record);
            let mut hints = CoordHints::from_params("flip", params);
            std::mem::swap(&mut hints.xlim, &mut hints.ylim);
            hints
        }
        CoordKind::Fixed => CoordHints {
            aspect_ratio: Some(params.number("ratio").unwrap_or(1.0)),
            ..CoordHints::from_params("fixed", params)
        },
        CoordKind::Polar | CoordKind::Radial => {
            let polar = Polar::new(&kind, params, &layers);
            for_each_record(&mut layers, |rec| polar.project(rec));
            CoordHints {
                aspect_ratio: Some(1.0),
                theta: Some(polar.theta_name().to_string()),
                ..CoordHints::from_params(kind.name(), params)
            }
        }
        CoordKind::Trans => {
            let mut hints = CoordHints::from_params("trans", params);
            let x = axis_transform(params, "x");
            let y = axis_transform(params, "y");
            for_each_record(&mut layers, |rec| {
                transform_fields([&mut rec.x, &mut rec.xend, &mut rec.xmin, &mut rec.xmax], x);
                transform_fields([&mut rec.y, &mut rec.yend, &mut rec.ymin, &mut rec.ymax], y);
            });
            hints.xlim = hints.xlim.and_then(|[a, b]| Some([x.apply(a)?, x.apply(b)?]));
            hints.ylim = hints.ylim.and_then(|[a, b]| Some([y.apply(a)?, y.apply(b)?]));
            hints
        }
    };

    log::debug!("projected {} layers through '{}'", layers.len(), hints.kind);
    (layers, hints)
}

fn for_each_record<F: FnMut(&mut LayerRecord)>(layers: &mut [Vec<LayerRecord>], mut f: F) {
    for rec in layers.iter_mut().flat_map(|l| l.iter_mut()) {
        f(rec);
    }
}

fn flip_record(rec: &mut LayerRecord) {
    std::mem::swap(&mut rec.x, &mut rec.y);
    std::mem::swap(&mut rec.xend, &mut rec.yend);
    std::mem::swap(&mut rec.xmin, &mut rec.ymin);
    std::mem::swap(&mut rec.xmax, &mut rec.ymax);
}

// =============================================================================
// trans
// =============================================================================

fn axis_transform(params: &Params, axis: &str) -> ScaleTransform {
    let Some(name) = params.text(axis) else {
        return ScaleTransform::Identity;
    };
    ScaleTransform::from_name(name).unwrap_or_else(|| {
        log::warn!("unknown transform '{}' for {} axis; leaving it untransformed", name, axis);
        ScaleTransform::Identity
    })
}

fn transform_fields(fields: [&mut Option<f64>; 4], transform: ScaleTransform) {
    if transform == ScaleTransform::Identity {
        return;
    }
    for field in fields {
        *field = field.and_then(|v| transform.apply(v));
    }
}

// =============================================================================
// polar / radial
// =============================================================================

struct Polar {
    theta_is_x: bool,
    theta_range: Option<(f64, f64)>,
    r_range: Option<(f64, f64)>,
    start: f64,
    span: f64,
    direction: f64,
    inner: f64,
}

impl Polar {
    fn new(kind: &CoordKind, params: &Params, layers: &[Vec<LayerRecord>]) -> Self {
        let theta_is_x = !params.text("theta").is_some_and(|t| t.eq_ignore_ascii_case("y"));
        let start = params.number("start").unwrap_or(0.0);
        let direction = if params.number("direction").unwrap_or(1.0) < 0.0 { -1.0 } else { 1.0 };
        let (span, inner) = match kind {
            CoordKind::Radial => (
                params.number("end").unwrap_or(start + TAU) - start,
                params.number("inner_radius").unwrap_or(0.0).clamp(0.0, 1.0),
            ),
            _ => (TAU, 0.0),
        };

        let records = || layers.iter().flat_map(|l| l.iter());
        let x_extent = extent(records().flat_map(|r| [r.x, r.xend, r.xmin, r.xmax]).flatten());
        let y_extent = extent(records().flat_map(|r| [r.y, r.yend, r.ymin, r.ymax]).flatten());
        let (theta_range, r_range) = if theta_is_x {
            (x_extent, y_extent)
        } else {
            (y_extent, x_extent)
        };

        Self {
            theta_is_x,
            theta_range,
            r_range,
            start,
            span,
            direction,
            inner,
        }
    }

    fn theta_name(&self) -> &'static str {
        if self.theta_is_x {
            "x"
        } else {
            "y"
        }
    }

    fn angle(&self, v: f64) -> f64 {
        self.start + self.direction * self.span * fraction(v, self.theta_range, 0.0)
    }

    fn radius(&self, v: f64) -> f64 {
        self.inner + (1.0 - self.inner) * fraction(v, self.r_range, 1.0)
    }

    /// Split a position pair into its (angular, radial) components.
    fn components(&self, x: Option<f64>, y: Option<f64>) -> (Option<f64>, Option<f64>) {
        if self.theta_is_x {
            (x, y)
        } else {
            (y, x)
        }
    }

    fn to_cartesian(&self, a: Option<f64>, r: Option<f64>) -> Option<(f64, f64, f64, f64)> {
        let theta = self.angle(a?);
        let radius = self.radius(r?);
        Some((radius * theta.sin(), radius * theta.cos(), theta, radius))
    }

    fn project(&self, rec: &mut LayerRecord) {
        let (a, r) = self.components(rec.x, rec.y);
        if let Some((x, y, theta, radius)) = self.to_cartesian(a, r) {
            rec.x = Some(x);
            rec.y = Some(y);
            rec.set_meta("theta", theta);
            rec.set_meta("r", radius);
        }

        let (a_end, r_end) = self.components(rec.xend, rec.yend);
        if let Some((x, y, _, _)) = self.to_cartesian(a_end, r_end) {
            rec.xend = Some(x);
            rec.yend = Some(y);
        }

        // Range fields stay in polar terms: angles on the theta side, radii on the other
        let (theta_min, theta_max, r_min, r_max) = if self.theta_is_x {
            (&mut rec.xmin, &mut rec.xmax, &mut rec.ymin, &mut rec.ymax)
        } else {
            (&mut rec.ymin, &mut rec.ymax, &mut rec.xmin, &mut rec.xmax)
        };
        *theta_min = theta_min.map(|v| self.angle(v));
        *theta_max = theta_max.map(|v| self.angle(v));
        *r_min = r_min.map(|v| self.radius(v));
        *r_max = r_max.map(|v| self.radius(v));
    }
}

/// Position of `v` within `range` as a fraction; `degenerate` when the range
/// has no width.
fn fraction(v: f64, range: Option<(f64, f64)>, degenerate: f64) -> f64 {
    match range {
        Some((lo, hi)) if hi > lo => (v - lo) / (hi - lo),
        _ => degenerate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use serde_json::json;
    use std::f64::consts::{FRAC_PI_2, PI};

    fn layer(points: &[(f64, f64)]) -> Vec<LayerRecord> {
        points.iter().map(|(x, y)| LayerRecord::xy(*x, *y)).collect()
    }

    #[test]
    fn test_cartesian_is_identity_with_hints() {
        let spec = CoordSpec::new("cartesian")
            .with_param("xlim", json!([0, 10]))
            .with_param("clip", json!("off"));
        let input = vec![layer(&[(1.0, 2.0)])];
        let (out, hints) = project(&spec, input.clone());
        assert_eq!(out, input);
        assert_eq!(hints.xlim, Some([0.0, 10.0]));
        assert_eq!(hints.ylim, None);
        assert!(!hints.clip);
    }

    #[test]
    fn test_flip_swaps_fields_and_limits() {
        let mut rec = LayerRecord::xy(1.0, 2.0);
        rec.xmin = Some(0.5);
        rec.ymax = Some(3.0);
        rec.xend = Some(9.0);
        let spec = CoordSpec::new("flip").with_param("ylim", json!([0, 5]));
        let (out, hints) = project(&spec, vec![vec![rec]]);
        let r = &out[0][0];
        assert_eq!((r.x, r.y), (Some(2.0), Some(1.0)));
        assert_eq!((r.ymin, r.xmax), (Some(0.5), Some(3.0)));
        assert_eq!((r.xend, r.yend), (None, Some(9.0)));
        assert_eq!(hints.xlim, Some([0.0, 5.0]));
        assert_eq!(hints.ylim, None);
    }

    #[test]
    fn test_fixed_ratio_hint() {
        let input = vec![layer(&[(1.0, 2.0)])];
        let (out, hints) = project(&CoordSpec::new("equal"), input.clone());
        assert_eq!(out, input);
        assert_eq!(hints.aspect_ratio, Some(1.0));
        let (_, hints) = project(&CoordSpec::new("fixed").with_param("ratio", 2.5), input);
        assert_eq!(hints.aspect_ratio, Some(2.5));
    }

    #[test]
    fn test_polar_projection() {
        let input = vec![layer(&[(0.0, 0.0), (1.0, 1.0), (4.0, 1.0)])];
        let (out, hints) = project(&CoordSpec::new("polar"), input);
        let p = &out[0];
        assert_abs_diff_eq!(p[0].x.unwrap(), 0.0);
        assert_abs_diff_eq!(p[0].y.unwrap(), 0.0);
        assert_abs_diff_eq!(p[1].x.unwrap(), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(p[1].y.unwrap(), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(p[1].meta_f64("theta").unwrap(), FRAC_PI_2, epsilon = 1e-12);
        assert_eq!(p[1].meta_f64("r"), Some(1.0));
        assert_eq!(hints.aspect_ratio, Some(1.0));
        assert_eq!(hints.theta.as_deref(), Some("x"));
    }

    #[test]
    fn test_polar_counter_clockwise_and_theta_y() {
        let input = vec![layer(&[(0.0, 0.0), (1.0, 1.0), (4.0, 1.0)])];
        let (out, _) = project(&CoordSpec::new("polar").with_param("direction", -1), input.clone());
        assert_abs_diff_eq!(out[0][1].x.unwrap(), -1.0, epsilon = 1e-12);

        // angle from y: y=1 is the top of the angular range, x=1 a quarter of the radius
        let (out, hints) = project(&CoordSpec::new("polar").with_param("theta", "y"), input);
        assert_eq!(hints.theta.as_deref(), Some("y"));
        assert_abs_diff_eq!(out[0][1].meta_f64("r").unwrap(), 0.25, epsilon = 1e-12);
        assert_abs_diff_eq!(out[0][1].meta_f64("theta").unwrap(), TAU, epsilon = 1e-12);
    }

    #[test]
    fn test_radial_span_and_inner_radius() {
        let spec = CoordSpec::new("radial")
            .with_param("end", PI)
            .with_param("inner_radius", 0.5);
        let (out, _) = project(&spec, vec![layer(&[(0.0, 0.0), (4.0, 1.0)])]);
        assert_abs_diff_eq!(out[0][0].x.unwrap(), 0.0);
        assert_abs_diff_eq!(out[0][0].y.unwrap(), 0.5);
        assert_abs_diff_eq!(out[0][1].x.unwrap(), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(out[0][1].y.unwrap(), -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_polar_ranges_are_chart_wide() {
        let layers = vec![layer(&[(0.0, 0.0)]), layer(&[(2.0, 2.0), (1.0, 2.0)])];
        let (out, _) = project(&CoordSpec::new("polar"), layers);
        // second layer's (1, 2): half the angular range, full radius
        assert_abs_diff_eq!(out[1][1].meta_f64("theta").unwrap(), PI, epsilon = 1e-12);
        assert_abs_diff_eq!(out[1][1].y.unwrap(), -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_polar_range_fields_keep_angles_and_radii() {
        let mut rec = LayerRecord::xy(1.0, 1.0);
        rec.xmin = Some(0.0);
        rec.xmax = Some(2.0);
        rec.ymin = Some(0.0);
        rec.ymax = Some(2.0);
        let (out, _) = project(&CoordSpec::new("polar"), vec![vec![rec]]);
        let r = &out[0][0];
        assert_abs_diff_eq!(r.xmin.unwrap(), 0.0);
        assert_abs_diff_eq!(r.xmax.unwrap(), TAU);
        assert_abs_diff_eq!(r.ymax.unwrap(), 1.0);
    }

    #[test]
    fn test_trans_applies_named_transform() {
        let mut rec = LayerRecord::xy(100.0, 4.0);
        rec.xmin = Some(10.0);
        let negative = LayerRecord::xy(-1.0, 9.0);
        let spec = CoordSpec::new("trans")
            .with_param("x", "log10")
            .with_param("y", "sqrt")
            .with_param("xlim", json!([1, 1000]));
        let (out, hints) = project(&spec, vec![vec![rec, negative]]);
        assert_abs_diff_eq!(out[0][0].x.unwrap(), 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(out[0][0].xmin.unwrap(), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(out[0][0].y.unwrap(), 2.0);
        assert_eq!(out[0][1].x, None);
        assert_eq!(out[0][1].y, Some(3.0));
        let [lo, hi] = hints.xlim.unwrap();
        assert_abs_diff_eq!(lo, 0.0);
        assert_abs_diff_eq!(hi, 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_unknown_kind_degrades_to_cartesian() {
        let input = vec![layer(&[(1.0, 2.0)])];
        let (out, hints) = project(&CoordSpec::new("mercator"), input.clone());
        assert_eq!(out, input);
        assert_eq!(hints.kind, "cartesian");
        assert_eq!(CoordKind::parse("mercator"), CoordKind::Unknown("mercator".to_string()));
    }

    #[test]
    fn test_coord_spec_deserializes_with_defaults() {
        let spec: CoordSpec = serde_json::from_value(json!({"params": {"ratio": 2}})).unwrap();
        assert_eq!(spec.kind, "cartesian");
    }
}
