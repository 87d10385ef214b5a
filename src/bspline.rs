//! Non-rational B-spline evaluation over homogeneous control buffers.
//!
//! Rational curve evaluation reuses these routines by running them in 4D
//! and projecting afterwards, so no rational-specific evaluation logic is
//! duplicated elsewhere.

use crate::basis;
use crate::geometry::homogeneous::Vec4w;

/// Evaluate the B-spline point `sum N_{i,p}(t) * P[i]` in 4D.
pub fn point_on_curve(degree: usize, knots: &[f64], t: f64, control_points: &[Vec4w]) -> Vec4w {
    let span = basis::find_span(degree, knots, t);
    let values = basis::basis_functions(span, degree, knots, t);

    let mut point = Vec4w::ZERO;
    for (i, &value) in values.iter().enumerate() {
        point = point + control_points[span - degree + i] * value;
    }
    point
}

/// Derivatives `C^(k)(t)` for `k = 0..=order` in 4D.
///
/// Derivatives beyond the degree are identically zero.
pub fn derivatives(
    degree: usize,
    order: usize,
    knots: &[f64],
    t: f64,
    control_points: &[Vec4w],
) -> Vec<Vec4w> {
    let span = basis::find_span(degree, knots, t);
    let ders = basis::basis_function_derivatives(span, degree, order, knots, t);

    let mut result = vec![Vec4w::ZERO; order + 1];
    for k in 0..=order.min(degree) {
        for j in 0..=degree {
            result[k] = result[k] + control_points[span - degree + j] * ders[k][j];
        }
    }
    result
}
