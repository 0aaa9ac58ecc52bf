// Least-squares polynomial smoother with an optional confidence band.

use super::distribution::t_quantile;
use super::{group_refs, SmoothParams};
use crate::ir::LayerRecord;

type Matrix = Vec<Vec<f64>>;

/// Fit each group and evaluate the fit on an even grid. Groups that cannot
/// be fitted are dropped; when none can, the input comes back unchanged.
pub fn compute(params: &SmoothParams, records: Vec<LayerRecord>) -> Vec<LayerRecord> {
    let mut out = Vec::new();
    let mut fitted_any = false;

    for (_, members) in group_refs(&records) {
        let points: Vec<(f64, f64)> = members
            .iter()
            .filter_map(|r| Some((r.x?, r.y?)))
            .collect();
        let Some(fit) = Fit::new(&points, params.degree) else {
            continue;
        };
        fitted_any = true;

        let band = if params.se { fit.band(params.level) } else { None };
        let template = members[0];
        for x in grid(fit.x_min, fit.x_max, params.n) {
            let mut rec = LayerRecord::synthetic().with_grouping_of(template);
            let y = fit.predict(x);
            rec.x = Some(x);
            rec.y = Some(y);
            if let Some(band) = &band {
                let se = band.standard_error(&fit, x);
                let lo = y - band.t_crit * se;
                let hi = y + band.t_crit * se;
                rec.ymin = Some(lo);
                rec.ymax = Some(hi);
                rec.set_meta("ymin", lo);
                rec.set_meta("ymax", hi);
                rec.set_meta("se", se);
            }
            out.push(rec);
        }
    }

    if fitted_any {
        out
    } else {
        records
    }
}

fn grid(min: f64, max: f64, n: usize) -> Vec<f64> {
    if n <= 1 {
        return vec![min];
    }
    let step = (max - min) / (n - 1) as f64;
    (0..n).map(|i| min + i as f64 * step).collect()
}

/// A polynomial fit on centred, rescaled x (`u = (x - mean) / scale`) for
/// numerical stability.
struct Fit {
    degree: usize,
    n: usize,
    x_mean: f64,
    x_scale: f64,
    x_min: f64,
    x_max: f64,
    sxx: f64,
    coef: Vec<f64>,
    /// (UᵀU)⁻¹ in the rescaled basis.
    inverse: Matrix,
    sse: f64,
    tss: f64,
}

impl Fit {
    fn new(points: &[(f64, f64)], degree: usize) -> Option<Self> {
        let p = degree + 1;
        let n = points.len();
        if n < p {
            return None;
        }

        let nf = n as f64;
        let x_mean = points.iter().map(|(x, _)| x).sum::<f64>() / nf;
        let y_mean = points.iter().map(|(_, y)| y).sum::<f64>() / nf;
        let x_scale = points.iter().map(|(x, _)| (x - x_mean).abs()).fold(0.0, f64::max);
        if x_scale == 0.0 {
            return None;
        }
        let x_min = points.iter().map(|(x, _)| *x).fold(f64::INFINITY, f64::min);
        let x_max = points.iter().map(|(x, _)| *x).fold(f64::NEG_INFINITY, f64::max);
        let sxx = points.iter().map(|(x, _)| (x - x_mean).powi(2)).sum::<f64>();

        // Normal equations in the rescaled basis
        let mut normal = vec![vec![0.0; p]; p];
        let mut rhs = vec![0.0; p];
        for (x, y) in points {
            let basis = powers((x - x_mean) / x_scale, p);
            for i in 0..p {
                rhs[i] += basis[i] * y;
                for j in 0..p {
                    normal[i][j] += basis[i] * basis[j];
                }
            }
        }

        let inverse = invert(normal)?;
        let coef: Vec<f64> = inverse
            .iter()
            .map(|row| row.iter().zip(&rhs).map(|(a, b)| a * b).sum())
            .collect();

        let mut fit = Self {
            degree,
            n,
            x_mean,
            x_scale,
            x_min,
            x_max,
            sxx,
            coef,
            inverse,
            sse: 0.0,
            tss: 0.0,
        };
        fit.sse = points.iter().map(|(x, y)| (y - fit.predict(*x)).powi(2)).sum();
        fit.tss = points.iter().map(|(_, y)| (y - y_mean).powi(2)).sum();
        Some(fit)
    }

    fn basis(&self, x: f64) -> Vec<f64> {
        powers((x - self.x_mean) / self.x_scale, self.degree + 1)
    }

    fn predict(&self, x: f64) -> f64 {
        self.basis(x).iter().zip(&self.coef).map(|(b, c)| b * c).sum()
    }

    /// Band parameters, or `None` when the residual variance is zero or the
    /// residual degrees of freedom are exhausted.
    fn band(&self, level: f64) -> Option<Band> {
        let p = self.degree + 1;
        let df = self.n as f64 - p as f64 - 1.0;
        if df <= 0.0 || self.sse <= 1e-12 * self.tss || self.sse <= 0.0 {
            return None;
        }
        let sigma2 = self.sse / df;
        Some(Band {
            sigma2,
            t_crit: t_quantile(0.5 + level / 2.0, df),
        })
    }
}

struct Band {
    sigma2: f64,
    t_crit: f64,
}

impl Band {
    fn standard_error(&self, fit: &Fit, x: f64) -> f64 {
        if fit.degree == 1 {
            let dx = x - fit.x_mean;
            return (self.sigma2 * (1.0 / fit.n as f64 + dx * dx / fit.sxx)).sqrt();
        }
        let v = fit.basis(x);
        let leverage: f64 = fit
            .inverse
            .iter()
            .zip(&v)
            .map(|(row, vi)| vi * row.iter().zip(&v).map(|(a, vj)| a * vj).sum::<f64>())
            .sum();
        (self.sigma2 * leverage.max(0.0)).sqrt()
    }
}

fn powers(u: f64, count: usize) -> Vec<f64> {
    let mut out = Vec::with_capacity(count);
    let mut acc = 1.0;
    for _ in 0..count {
        out.push(acc);
        acc *= u;
    }
    out
}

/// Gauss-Jordan inversion with partial pivoting. `None` for a singular matrix.
fn invert(mut a: Matrix) -> Option<Matrix> {
    let n = a.len();
    let scale = a
        .iter()
        .flat_map(|row| row.iter())
        .fold(0.0_f64, |m, v| m.max(v.abs()));
    if scale == 0.0 {
        return None;
    }
    let mut inv: Matrix = (0..n)
        .map(|i| (0..n).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
        .collect();

    for col in 0..n {
        let pivot_row = (col..n).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot_row][col].abs() < 1e-12 * scale {
            return None;
        }
        a.swap(col, pivot_row);
        inv.swap(col, pivot_row);

        let pivot = a[col][col];
        for j in 0..n {
            a[col][j] /= pivot;
            inv[col][j] /= pivot;
        }
        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = a[row][col];
            if factor == 0.0 {
                continue;
            }
            for j in 0..n {
                a[row][j] -= factor * a[col][j];
                inv[row][j] -= factor * inv[col][j];
            }
        }
    }
    Some(inv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn points(xy: &[(f64, f64)]) -> Vec<LayerRecord> {
        xy.iter()
            .enumerate()
            .map(|(i, (x, y))| {
                let mut r = LayerRecord::from_row(i);
                r.x = Some(*x);
                r.y = Some(*y);
                r
            })
            .collect()
    }

    fn params(degree: usize, n: usize) -> SmoothParams {
        SmoothParams {
            degree,
            n,
            ..SmoothParams::default()
        }
    }

    #[test]
    fn test_exact_line_has_no_band() {
        let input = points(&[(0.0, 1.0), (1.0, 3.0), (2.0, 5.0), (3.0, 7.0)]);
        let out = compute(&SmoothParams::default(), input);
        assert_eq!(out.len(), 80);
        for rec in &out {
            let x = rec.x.unwrap();
            assert!((rec.y.unwrap() - (2.0 * x + 1.0)).abs() < 1e-6);
            assert!(rec.ymin.is_none());
            assert!(rec.meta.get("se").is_none());
            assert!(rec.is_synthetic());
        }
        assert_abs_diff_eq!(out[0].x.unwrap(), 0.0);
        assert_abs_diff_eq!(out[79].x.unwrap(), 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_linear_band_matches_closed_form() {
        let input = points(&[(0.0, 1.0), (1.0, 3.0), (2.0, 2.0), (3.0, 5.0), (4.0, 4.0)]);
        let out = compute(&params(1, 5), input);
        assert_eq!(out.len(), 5);

        // slope 0.8, intercept 1.4, SSE 3.6 over 2 residual df
        let centre = &out[2];
        assert_abs_diff_eq!(centre.x.unwrap(), 2.0);
        assert_abs_diff_eq!(centre.y.unwrap(), 3.0, epsilon = 1e-9);
        assert_abs_diff_eq!(centre.meta_f64("se").unwrap(), 0.6, epsilon = 1e-9);
        let half_width = centre.ymax.unwrap() - centre.y.unwrap();
        assert_abs_diff_eq!(half_width, 4.302653 * 0.6, epsilon = 1e-4);
        assert_eq!(centre.meta_f64("ymin"), centre.ymin);
        assert_eq!(centre.meta_f64("ymax"), centre.ymax);

        // the band is narrowest at the mean of x
        let se_edge = out[0].meta_f64("se").unwrap();
        assert!(se_edge > 0.6);
    }

    #[test]
    fn test_quadratic_fit() {
        let input = points(&[(-2.0, 5.0), (-1.0, 2.0), (0.0, 1.0), (1.0, 2.0), (2.0, 5.0)]);
        let out = compute(&params(2, 9), input);
        for rec in &out {
            let x = rec.x.unwrap();
            assert_abs_diff_eq!(rec.y.unwrap(), x * x + 1.0, epsilon = 1e-9);
            assert!(rec.ymin.is_none());
        }
    }

    #[test]
    fn test_quadratic_band_uses_leverage() {
        let input = points(&[
            (0.0, 0.1),
            (1.0, 0.9),
            (2.0, 4.2),
            (3.0, 8.8),
            (4.0, 16.1),
            (5.0, 25.3),
        ]);
        let out = compute(&params(2, 11), input);
        assert_eq!(out.len(), 11);
        for rec in &out {
            let se = rec.meta_f64("se").unwrap();
            assert!(se > 0.0);
            assert!(rec.ymin.unwrap() < rec.y.unwrap());
            assert!(rec.ymax.unwrap() > rec.y.unwrap());
        }
    }

    #[test]
    fn test_se_disabled_by_param() {
        let input = points(&[(0.0, 1.0), (1.0, 3.0), (2.0, 2.0), (3.0, 5.0), (4.0, 4.0)]);
        let p = SmoothParams {
            se: false,
            ..params(1, 5)
        };
        assert!(compute(&p, input).iter().all(|r| r.ymin.is_none()));
    }

    #[test]
    fn test_per_group_fits() {
        let mut input = points(&[(0.0, 0.0), (1.0, 1.0), (2.0, 2.0), (0.0, 5.0), (1.0, 5.0), (2.0, 5.0)]);
        for (i, rec) in input.iter_mut().enumerate() {
            rec.color = Some(if i < 3 { "a" } else { "b" }.to_string());
        }
        let out = compute(&params(1, 3), input);
        assert_eq!(out.len(), 6);
        assert!(out[..3].iter().all(|r| r.color.as_deref() == Some("a")));
        assert_abs_diff_eq!(out[2].y.unwrap(), 2.0, epsilon = 1e-9);
        assert_abs_diff_eq!(out[5].y.unwrap(), 5.0, epsilon = 1e-9);
    }

    #[test]
    fn test_unfittable_input_returned_unchanged() {
        let input = points(&[(1.0, 1.0)]);
        assert_eq!(compute(&SmoothParams::default(), input.clone()), input);

        // all x equal: singular design
        let input = points(&[(1.0, 1.0), (1.0, 2.0), (1.0, 3.0)]);
        assert_eq!(compute(&SmoothParams::default(), input.clone()), input);
    }

    #[test]
    fn test_deterministic() {
        let input = points(&[(0.0, 1.0), (1.0, 3.0), (2.0, 2.0), (3.0, 5.0), (4.0, 4.0)]);
        assert_eq!(
            compute(&SmoothParams::default(), input.clone()),
            compute(&SmoothParams::default(), input)
        );
    }
}
