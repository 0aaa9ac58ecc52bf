// Distribution helpers shared by the stats: sample quantiles, the standard
// normal quantile and Student's t distribution.

/// Linear-interpolation sample quantile (type 7) of an ascending slice.
pub fn quantile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }

    let h = (sorted.len() - 1) as f64 * p.clamp(0.0, 1.0);
    let lower = h.floor() as usize;
    let upper = h.ceil() as usize;
    let weight = h - lower as f64;

    sorted[lower] * (1.0 - weight) + sorted[upper] * weight
}

/// Standard normal quantile Φ⁻¹(p), rational approximation with relative
/// error below 1.15e-9.
pub fn normal_quantile(p: f64) -> f64 {
    const A: [f64; 6] = [
        -3.969683028665376e+01,
        2.209460984245205e+02,
        -2.759285104469687e+02,
        1.383577518672690e+02,
        -3.066479806614716e+01,
        2.506628277459239e+00,
    ];
    const B: [f64; 5] = [
        -5.447609879822406e+01,
        1.615858368580409e+02,
        -1.556989798598866e+02,
        6.680131188771972e+01,
        -1.328068155288572e+01,
    ];
    const C: [f64; 6] = [
        -7.784894002430293e-03,
        -3.223964580411365e-01,
        -2.400758277161838e+00,
        -2.549732539343734e+00,
        4.374664141464968e+00,
        2.938163982698783e+00,
    ];
    const D: [f64; 4] = [
        7.784695709041462e-03,
        3.224671290700398e-01,
        2.445134137142996e+00,
        3.754408661907416e+00,
    ];
    const P_LOW: f64 = 0.02425;

    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }

    let tail = |q: f64| {
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    };

    if p < P_LOW {
        tail((-2.0 * p.ln()).sqrt())
    } else if p <= 1.0 - P_LOW {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        -tail((-2.0 * (1.0 - p).ln()).sqrt())
    }
}

/// ln Γ(x) for x > 0 (Lanczos series).
pub fn ln_gamma(x: f64) -> f64 {
    const COF: [f64; 6] = [
        76.18009172947146,
        -86.50532032941677,
        24.01409824083091,
        -1.231739572450155,
        0.1208650973866179e-2,
        -0.5395239384953e-5,
    ];
    let mut y = x;
    let tmp = x + 5.5;
    let tmp = tmp - (x + 0.5) * tmp.ln();
    let mut ser = 1.000000000190015;
    for c in COF {
        y += 1.0;
        ser += c / y;
    }
    -tmp + (2.5066282746310005 * ser / x).ln()
}

/// Regularized incomplete beta function I_x(a, b).
pub fn incomplete_beta(a: f64, b: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }
    let front = (ln_gamma(a + b) - ln_gamma(a) - ln_gamma(b) + a * x.ln() + b * (1.0 - x).ln()).exp();
    if x < (a + 1.0) / (a + b + 2.0) {
        front * beta_continued_fraction(a, b, x) / a
    } else {
        1.0 - front * beta_continued_fraction(b, a, 1.0 - x) / b
    }
}

fn beta_continued_fraction(a: f64, b: f64, x: f64) -> f64 {
    const MAX_ITER: usize = 300;
    const EPS: f64 = 3e-16;
    const TINY: f64 = 1e-300;

    let guard = |v: f64| if v.abs() < TINY { TINY } else { v };

    let qab = a + b;
    let qap = a + 1.0;
    let qam = a - 1.0;
    let mut c = 1.0;
    let mut d = 1.0 / guard(1.0 - qab * x / qap);
    let mut h = d;

    for m in 1..=MAX_ITER {
        let m = m as f64;
        let m2 = 2.0 * m;

        let aa = m * (b - m) * x / ((qam + m2) * (a + m2));
        d = 1.0 / guard(1.0 + aa * d);
        c = guard(1.0 + aa / c);
        h *= d * c;

        let aa = -(a + m) * (qab + m) * x / ((a + m2) * (qap + m2));
        d = 1.0 / guard(1.0 + aa * d);
        c = guard(1.0 + aa / c);
        let delta = d * c;
        h *= delta;

        if (delta - 1.0).abs() < EPS {
            break;
        }
    }
    h
}

/// CDF of Student's t distribution with `df` degrees of freedom.
pub fn t_cdf(t: f64, df: f64) -> f64 {
    let x = df / (df + t * t);
    let tail = 0.5 * incomplete_beta(df / 2.0, 0.5, x);
    if t >= 0.0 {
        1.0 - tail
    } else {
        tail
    }
}

/// Quantile of Student's t: the `t` with `t_cdf(t, df) == prob`.
///
/// Brackets by doubling (capped at 1e6) and then bisects.
pub fn t_quantile(prob: f64, df: f64) -> f64 {
    const CAP: f64 = 1e6;
    let mut hi = 1.0;
    while t_cdf(hi, df) < prob && hi < CAP {
        hi *= 2.0;
    }
    let mut hi = hi.min(CAP);
    let mut lo = -hi;
    for _ in 0..80 {
        let mid = 0.5 * (lo + hi);
        if t_cdf(mid, df) < prob {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    0.5 * (lo + hi)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_quantile_type7() {
        let data = [1.0, 2.0, 3.0, 4.0];
        assert_abs_diff_eq!(quantile(&data, 0.25), 1.75);
        assert_abs_diff_eq!(quantile(&data, 0.5), 2.5);
        assert_abs_diff_eq!(quantile(&data, 0.75), 3.25);
        assert_abs_diff_eq!(quantile(&data, 0.0), 1.0);
        assert_abs_diff_eq!(quantile(&data, 1.0), 4.0);
        assert_abs_diff_eq!(quantile(&[7.0], 0.3), 7.0);
    }

    #[test]
    fn test_normal_quantile_known_values() {
        assert_abs_diff_eq!(normal_quantile(0.5), 0.0);
        assert_abs_diff_eq!(normal_quantile(0.975), 1.959963985, epsilon = 1e-7);
        assert_abs_diff_eq!(normal_quantile(0.01), -2.326347874, epsilon = 1e-7);
        assert_abs_diff_eq!(normal_quantile(0.25), -normal_quantile(0.75), epsilon = 1e-12);
        assert!(normal_quantile(0.0).is_infinite());
    }

    #[test]
    fn test_ln_gamma() {
        assert_abs_diff_eq!(ln_gamma(1.0), 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(ln_gamma(5.0), 24f64.ln(), epsilon = 1e-9);
        assert_abs_diff_eq!(ln_gamma(0.5), std::f64::consts::PI.sqrt().ln(), epsilon = 1e-9);
    }

    #[test]
    fn test_t_cdf_symmetry_and_cauchy() {
        assert_abs_diff_eq!(t_cdf(0.0, 5.0), 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(t_cdf(1.3, 7.0) + t_cdf(-1.3, 7.0), 1.0, epsilon = 1e-12);
        // df = 1 is the Cauchy distribution
        assert_abs_diff_eq!(t_cdf(1.0, 1.0), 0.75, epsilon = 1e-9);
    }

    #[test]
    fn test_t_quantile_table_values() {
        assert_abs_diff_eq!(t_quantile(0.975, 10.0), 2.228139, epsilon = 1e-5);
        assert_abs_diff_eq!(t_quantile(0.975, 1.0), 12.706205, epsilon = 1e-4);
        assert_abs_diff_eq!(t_quantile(0.975, 1e6), 1.959966, epsilon = 1e-4);
        assert_abs_diff_eq!(t_quantile(0.95, 3.0), 2.353363, epsilon = 1e-5);
    }
}
