//! Two-sample Kolmogorov-Smirnov test

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Outcome of a two-sample KS test
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KsOutcome {
    /// Maximum absolute distance between the two empirical CDFs
    pub statistic: f64,
    /// Asymptotic two-sided p-value, in [0, 1]
    pub p_value: f64,
}

/// Kolmogorov-Smirnov test for distribution comparison
#[derive(Debug, Clone, Copy, Default)]
pub struct KolmogorovSmirnovTest;

impl KolmogorovSmirnovTest {
    pub fn new() -> Self {
        Self
    }

    /// Compare two samples. NaN values are ignored.
    ///
    /// Returns `None` when either side has no usable values.
    pub fn two_sample(&self, reference: &[f64], test: &[f64]) -> Option<KsOutcome> {
        let a = sorted_finite(reference);
        let b = sorted_finite(test);
        if a.is_empty() || b.is_empty() {
            return None;
        }

        let statistic = Self::statistic(&a, &b);
        let n = a.len() as f64;
        let m = b.len() as f64;
        let p_value = Self::p_value(statistic, n * m / (n + m));
        Some(KsOutcome { statistic, p_value })
    }

    /// Sup distance between ECDFs of two sorted samples, stepping over ties together
    fn statistic(a: &[f64], b: &[f64]) -> f64 {
        let (n, m) = (a.len() as f64, b.len() as f64);
        let (mut i, mut j) = (0usize, 0usize);
        let mut d = 0.0f64;

        while i < a.len() && j < b.len() {
            let x = if a[i] <= b[j] { a[i] } else { b[j] };
            while i < a.len() && a[i] <= x {
                i += 1;
            }
            while j < b.len() && b[j] <= x {
                j += 1;
            }
            d = d.max((i as f64 / n - j as f64 / m).abs());
        }
        d
    }

    /// Survival function of the Kolmogorov distribution with the
    /// small-sample correction `(sqrt(ne) + 0.12 + 0.11 / sqrt(ne)) * d`
    fn p_value(d: f64, effective_n: f64) -> f64 {
        if d <= 0.0 {
            return 1.0;
        }
        let en = effective_n.sqrt();
        let lambda = (en + 0.12 + 0.11 / en) * d;
        kolmogorov_q(lambda).clamp(0.0, 1.0)
    }
}

/// Q_KS(λ) = 2 Σ_{k≥1} (-1)^(k-1) exp(-2 k² λ²)
fn kolmogorov_q(lambda: f64) -> f64 {
    const EPS1: f64 = 1e-3;
    const EPS2: f64 = 1e-8;

    let a2 = -2.0 * lambda * lambda;
    let mut fac = 2.0;
    let mut sum = 0.0;
    let mut previous = 0.0f64;

    for k in 1..=100 {
        let kf = k as f64;
        let term = fac * (a2 * kf * kf).exp();
        sum += term;
        if term.abs() <= EPS1 * previous || term.abs() <= EPS2 * sum {
            return sum;
        }
        fac = -fac;
        previous = term.abs();
    }
    // Series fails to converge only for tiny λ, where the distributions are indistinguishable
    1.0
}

fn sorted_finite(values: &[f64]) -> Vec<f64> {
    let mut out: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    out.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_samples_have_p_value_one() {
        let data: Vec<f64> = (0..40).map(|i| (i % 7) as f64).collect();
        let outcome = KolmogorovSmirnovTest::new().two_sample(&data, &data).unwrap();
        assert_eq!(outcome.statistic, 0.0);
        assert_eq!(outcome.p_value, 1.0);
    }

    #[test]
    fn test_shifted_samples_drift() {
        let reference: Vec<f64> = (1..=10).map(|i| i as f64).collect();
        let test: Vec<f64> = (1..=10).map(|i| 100.0 + 10.0 * i as f64).collect();

        let outcome = KolmogorovSmirnovTest::new().two_sample(&reference, &test).unwrap();
        assert!((outcome.statistic - 1.0).abs() < 1e-12);
        assert!(outcome.p_value < 0.001);
    }

    #[test]
    fn test_interleaved_samples_do_not_drift() {
        let reference: Vec<f64> = (1..=10).map(|i| i as f64).collect();
        let test: Vec<f64> = (1..=10).map(|i| i as f64 + 0.5).collect();

        let outcome = KolmogorovSmirnovTest::new().two_sample(&reference, &test).unwrap();
        assert!((outcome.statistic - 0.1).abs() < 1e-12);
        assert!(outcome.p_value > 0.9);
    }

    #[test]
    fn test_constant_columns_are_well_defined() {
        let ks = KolmogorovSmirnovTest::new();
        let same = ks.two_sample(&[1.0], &[1.0, 1.0, 1.0]).unwrap();
        assert_eq!(same.p_value, 1.0);

        let different = ks.two_sample(&[0.0; 30], &[1.0; 30]).unwrap();
        assert_eq!(different.statistic, 1.0);
        assert!(different.p_value >= 0.0 && different.p_value < 0.05);
    }

    #[test]
    fn test_nan_ignored_and_empty_side() {
        let ks = KolmogorovSmirnovTest::new();
        assert!(ks.two_sample(&[f64::NAN], &[1.0]).is_none());
        let outcome = ks.two_sample(&[1.0, f64::NAN, 2.0], &[1.0, 2.0]).unwrap();
        assert_eq!(outcome.statistic, 0.0);
    }
}
