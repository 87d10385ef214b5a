//! Inverse point projection and coarse uniform tessellation.

use tracing::{debug, instrument};

use crate::curve::NurbsCurve;
use crate::geometry::vector::Vec3;
use crate::math;
use crate::validation::{self, NurbsError};
use crate::{Tolerance, MAX_DISTANCE};

/// Find the parameter whose curve point is closest to `point`.
///
/// Phase one samples `controls * degree` parameters and projects onto the
/// chord segments between consecutive samples; phase two refines by
/// Newton iteration on `f(t) = C'(t) . (C(t) - Q)`, at most 10 steps.
/// Closed curves wrap an out-of-domain iterate around, open curves clamp.
#[instrument(skip(curve, point))]
pub fn closest_parameter(curve: &NurbsCurve, point: &Vec3) -> Result<f64, NurbsError> {
    validation::check_curve(curve.degree(), curve.knots(), curve.control_points())?;

    let knots = curve.knots();
    let min_param = knots[0];
    let max_param = knots[knots.len() - 1];
    let eps = Tolerance::default().distance;

    let samples = (curve.control_points().len() * curve.degree()).max(2);
    let step = (max_param - min_param) / (samples - 1) as f64;

    let mut best_t = min_param;
    let mut best_dist = MAX_DISTANCE;
    let mut current = curve.point_at(min_param)?;
    for i in 0..(samples - 1) {
        let t0 = min_param + step * i as f64;
        let t1 = t0 + step;
        let next = curve.point_at(t1)?;

        // Project onto the chord, clamping to the segment.
        let chord = next - current;
        let ratio = if chord.length_squared() < 1e-30 {
            0.0
        } else {
            ((*point - current).dot(&chord) / chord.length_squared()).clamp(0.0, 1.0)
        };
        let projected = current + chord * ratio;
        let dist = point.distance_to(&projected);
        if dist < best_dist {
            best_dist = dist;
            best_t = t0 + (t1 - t0) * ratio;
        }
        current = next;
    }

    let is_closed = curve.is_closed();
    let mut t = best_t;
    for iteration in 0..10 {
        let ders = curve.derivatives(t, 2)?;
        let diff = ders[0] - *point;
        let dist = diff.length();
        let f = ders[1].dot(&diff);

        let point_coincides = dist < eps;
        let angle_vanishes = f.abs() < eps * ders[1].length() * dist.max(1e-30);
        if point_coincides && angle_vanishes {
            debug!(iteration, t, "projection converged");
            return Ok(t);
        }

        let df = ders[2].dot(&diff) + ders[1].length_squared();
        if df.abs() < 1e-30 {
            break;
        }
        let mut next = t - f / df;
        if is_closed {
            if next < min_param {
                next = max_param - (min_param - next);
            }
            if next > max_param {
                next = min_param + (next - max_param);
            }
        } else {
            next = next.clamp(min_param, max_param);
        }

        // A vanishing parameter step means no further progress.
        if ((next - t) * ders[1]).length() < eps {
            return Ok(t);
        }
        t = next;
    }
    Ok(t)
}

/// Sample every unique knot interval with a fixed number of steps.
///
/// Returns the sampled points with their parameters; the final curve point
/// is appended exactly once.
pub fn equally_tessellate(curve: &NurbsCurve) -> Result<(Vec<Vec3>, Vec<f64>), NurbsError> {
    validation::check_curve(curve.degree(), curve.knots(), curve.control_points())?;

    let knots = curve.knots();
    let mut unique = vec![knots[0]];
    for &k in knots {
        if !math::almost_equal(k, *unique.last().unwrap()) {
            unique.push(k);
        }
    }

    const INTERVALS: usize = 100;
    let mut points = Vec::new();
    let mut params = Vec::new();
    for window in unique.windows(2) {
        let (current, next) = (window[0], window[1]);
        let step = (next - current) / INTERVALS as f64;
        for j in 0..INTERVALS {
            let t = current + step * j as f64;
            params.push(t);
            points.push(curve.point_at(t)?);
        }
    }
    let last = knots[knots.len() - 1];
    params.push(last);
    points.push(curve.point_at(last)?);
    Ok((points, params))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::homogeneous::Vec4w;

    fn sample_curve() -> NurbsCurve {
        NurbsCurve::new(
            3,
            vec![0.0, 0.0, 0.0, 0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 5.0, 5.0, 5.0],
            vec![
                Vec4w::new(0.0, 0.0, 0.0, 1.0),
                Vec4w::new(1.0, 1.0, 0.0, 4.0),
                Vec4w::new(3.0, 2.0, 0.0, 1.0),
                Vec4w::new(4.0, 1.0, 0.0, 1.0),
                Vec4w::new(5.0, -1.0, 0.0, 1.0),
                Vec4w::new(6.0, 0.0, 0.0, 1.0),
                Vec4w::new(7.0, 1.0, 0.0, 1.0),
                Vec4w::new(8.0, 0.0, 0.0, 1.0),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_projection_recovers_on_curve_parameter() {
        let curve = sample_curve();
        for &t0 in &[0.5, 1.3, 2.7, 4.2] {
            let q = curve.point_at(t0).unwrap();
            let t = closest_parameter(&curve, &q).unwrap();
            let recovered = curve.point_at(t).unwrap();
            assert!(
                (t - t0).abs() < 1e-6 || recovered.distance_to(&q) < 1e-6,
                "t0={} got t={}",
                t0,
                t
            );
        }
    }

    #[test]
    fn test_projection_with_noise() {
        let curve = sample_curve();
        let q = curve.point_at(2.7).unwrap() + Vec3::new(1e-4, -1e-4, 1e-4);
        let t = closest_parameter(&curve, &q).unwrap();
        assert!((t - 2.7).abs() < 1e-3, "got t={}", t);
    }

    #[test]
    fn test_projection_clamps_outside_point_to_endpoint() {
        let curve = sample_curve();
        // far beyond the end of the curve
        let q = Vec3::new(20.0, 0.0, 0.0);
        let t = closest_parameter(&curve, &q).unwrap();
        assert!((t - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_tessellation_shape() {
        let curve = sample_curve();
        let (points, params) = equally_tessellate(&curve).unwrap();
        // five unique spans, 100 samples each, plus the final point
        assert_eq!(points.len(), 501);
        assert_eq!(params.len(), 501);
        assert!(params.windows(2).all(|w| w[0] < w[1]));
        assert!((params[0] - 0.0).abs() < 1e-12);
        assert!((params[500] - 5.0).abs() < 1e-12);
        // samples lie on the curve
        let probe = curve.point_at(params[250]).unwrap();
        assert!(points[250].is_almost_equal_to(&probe, 1e-12));
    }
}
