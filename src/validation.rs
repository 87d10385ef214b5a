//! Argument validation and data-dependent tolerances.
//!
//! Each public operation performs one declarative precondition check up
//! front; validation is never interleaved with computation.

use crate::geometry::homogeneous::Vec4w;
use crate::math;
use crate::Tolerance;

/// Errors surfaced by curve operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NurbsError {
    #[error("degree must be at least {min}, got {got}")]
    InvalidDegree { got: usize, min: usize },

    #[error("knot vector must be a nondecreasing sequence")]
    DecreasingKnotVector,

    #[error("knot count {knots} must equal control count {controls} + degree {degree} + 1")]
    SizeMismatch {
        knots: usize,
        controls: usize,
        degree: usize,
    },

    #[error("control net is empty")]
    EmptyControlNet,

    #[error("control point weights must be positive")]
    NonPositiveWeight,

    #[error("parameter {t} outside the knot range [{min}, {max}]")]
    ParameterOutOfRange { t: f64, min: f64, max: f64 },

    #[error("need at least {needed} points, got {got}")]
    NotEnoughPoints { needed: usize, got: usize },

    #[error("tolerance could not be met: {0}")]
    ToleranceNotMet(String),

    #[error("degenerate geometry: {0}")]
    DegenerateGeometry(String),

    #[error("matrix is singular")]
    SingularMatrix,
}

/// True if the knot sequence never decreases.
pub fn is_valid_knot_vector(knots: &[f64]) -> bool {
    knots.windows(2).all(|w| w[0] <= w[1])
}

/// True if `knots = controls + degree + 1` holds.
pub fn is_valid_relation(degree: usize, knot_count: usize, control_count: usize) -> bool {
    knot_count == control_count + degree + 1
}

/// Precondition check shared by every operation that consumes a curve.
pub fn check_curve(degree: usize, knots: &[f64], control_points: &[Vec4w]) -> Result<(), NurbsError> {
    if degree == 0 {
        return Err(NurbsError::InvalidDegree { got: degree, min: 1 });
    }
    if control_points.is_empty() {
        return Err(NurbsError::EmptyControlNet);
    }
    if !is_valid_knot_vector(knots) {
        return Err(NurbsError::DecreasingKnotVector);
    }
    if !is_valid_relation(degree, knots.len(), control_points.len()) {
        return Err(NurbsError::SizeMismatch {
            knots: knots.len(),
            controls: control_points.len(),
            degree,
        });
    }
    if control_points.iter().any(|p| p.w <= 0.0) {
        return Err(NurbsError::NonPositiveWeight);
    }
    Ok(())
}

/// Check that `t` lies within the full knot range.
pub fn check_parameter(t: f64, knots: &[f64]) -> Result<(), NurbsError> {
    let min = knots[0];
    let max = knots[knots.len() - 1];
    if t < min - Tolerance::default().coordinate || t > max + Tolerance::default().coordinate {
        return Err(NurbsError::ParameterOutOfRange { t, min, max });
    }
    Ok(())
}

/// Data-dependent tolerance for curve-modifying operations:
/// `min_i w_i * eps_d / (1 + max_i |P_i|)`.
pub fn curve_modify_tolerance(control_points: &[Vec4w]) -> f64 {
    let mut min_weight = 1.0f64;
    let mut max_distance = 0.0f64;
    for p in control_points {
        min_weight = min_weight.min(p.w);
        max_distance = max_distance.max(p.project().length());
    }
    Tolerance::default().distance * min_weight / (1.0 + max_distance)
}

/// Closed-form max error of reducing a degree-`p` Bezier to degree `p-1`.
pub fn max_error_of_bezier_reduction(degree: usize, bezier_points: &[Vec4w]) -> f64 {
    let (_, error) = crate::operations::degree::reduce_bezier(degree, bezier_points);
    error
}

/// True when the curve's first and last control points coincide.
pub fn is_closed(control_points: &[Vec4w]) -> bool {
    let first = control_points[0].project();
    let last = control_points[control_points.len() - 1].project();
    first.coincides_with(&last)
}

/// Tolerant membership check used when comparing knot values.
pub fn contains_knot(knots: &[f64], u: f64) -> bool {
    knots.iter().any(|&k| math::almost_equal(k, u))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::vector::Vec3;

    fn controls(n: usize) -> Vec<Vec4w> {
        (0..n)
            .map(|i| Vec4w::from_point(Vec3::new(i as f64, 0.0, 0.0), 1.0))
            .collect()
    }

    #[test]
    fn test_knot_vector_validity() {
        assert!(is_valid_knot_vector(&[0.0, 0.0, 1.0, 2.0, 2.0]));
        assert!(!is_valid_knot_vector(&[0.0, 1.0, 0.5]));
    }

    #[test]
    fn test_check_curve_accepts_valid() {
        let knots = vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        assert!(check_curve(2, &knots, &controls(3)).is_ok());
    }

    #[test]
    fn test_check_curve_rejects_size_mismatch() {
        let knots = vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        let err = check_curve(2, &knots, &controls(4)).unwrap_err();
        assert!(matches!(err, NurbsError::SizeMismatch { .. }));
    }

    #[test]
    fn test_check_curve_rejects_zero_weight() {
        let knots = vec![0.0, 0.0, 1.0, 1.0];
        let mut pts = controls(2);
        pts[1].w = 0.0;
        let err = check_curve(1, &knots, &pts).unwrap_err();
        assert_eq!(err, NurbsError::NonPositiveWeight);
    }

    #[test]
    fn test_check_parameter_range() {
        let knots = vec![0.0, 0.0, 1.0, 2.0, 2.0];
        assert!(check_parameter(1.5, &knots).is_ok());
        assert!(check_parameter(2.5, &knots).is_err());
        assert!(check_parameter(-0.5, &knots).is_err());
    }

    #[test]
    fn test_modify_tolerance_scales_with_size() {
        let small = curve_modify_tolerance(&controls(2));
        let big: Vec<Vec4w> = vec![
            Vec4w::from_point(Vec3::new(1000.0, 0.0, 0.0), 1.0),
            Vec4w::from_point(Vec3::new(2000.0, 0.0, 0.0), 1.0),
        ];
        assert!(curve_modify_tolerance(&big) < small);
    }

    #[test]
    fn test_is_closed() {
        let mut pts = controls(4);
        assert!(!is_closed(&pts));
        pts[3] = pts[0];
        assert!(is_closed(&pts));
    }
}
