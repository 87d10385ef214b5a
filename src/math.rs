//! Scalar comparisons with tolerance and small combinatorial helpers.

use crate::Tolerance;

/// Tolerant equality on scalars using the coordinate tolerance.
pub fn almost_equal(a: f64, b: f64) -> bool {
    (a - b).abs() < Tolerance::default().coordinate
}

pub fn greater_than(a: f64, b: f64) -> bool {
    a - b > Tolerance::default().coordinate
}

pub fn greater_than_or_equal(a: f64, b: f64) -> bool {
    a - b > -Tolerance::default().coordinate
}

pub fn less_than(a: f64, b: f64) -> bool {
    b - a > Tolerance::default().coordinate
}

pub fn less_than_or_equal(a: f64, b: f64) -> bool {
    b - a > -Tolerance::default().coordinate
}

/// Binomial coefficient C(n, k) as a float.
///
/// Multiplicative form; exact for the small arguments the basis and
/// degree-elevation formulas use.
pub fn binomial(n: usize, k: usize) -> f64 {
    if k > n {
        return 0.0;
    }
    let k = k.min(n - k);
    let mut result = 1.0;
    for i in 0..k {
        result = result * (n - i) as f64 / (i + 1) as f64;
    }
    result
}
