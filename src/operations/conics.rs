//! Circular-arc and conic construction as degree-two NURBS.

use std::f64::consts::PI;

use crate::curve::NurbsCurve;
use crate::geometry::homogeneous::Vec4w;
use crate::geometry::intersection::{intersect_rays, RayRayIntersection};
use crate::geometry::vector::Vec3;
use crate::math;
use crate::validation::NurbsError;

/// Build a circular or elliptical arc around `center`.
///
/// `x_axis`/`y_axis` span the arc plane, `x_radius`/`y_radius` scale them,
/// and the sweep runs from `start_rad` to `end_rad` (normalized so the
/// sweep is positive). The arc is split into at most four segments so each
/// subtends at most 90 degrees; middle control points carry weight
/// `cos(dtheta / 2)`.
pub fn circular_arc(
    center: Vec3,
    x_axis: Vec3,
    y_axis: Vec3,
    start_rad: f64,
    end_rad: f64,
    x_radius: f64,
    y_radius: f64,
) -> Result<NurbsCurve, NurbsError> {
    let nx = x_axis
        .normalized()
        .ok_or_else(|| NurbsError::DegenerateGeometry("zero-length x axis".into()))?;
    let ny = y_axis
        .normalized()
        .ok_or_else(|| NurbsError::DegenerateGeometry("zero-length y axis".into()))?;
    if x_radius <= 0.0 || y_radius <= 0.0 {
        return Err(NurbsError::DegenerateGeometry("radius must be positive".into()));
    }

    let mut end_rad = end_rad;
    if end_rad < start_rad {
        end_rad += 2.0 * PI;
    }
    let theta = end_rad - start_rad;

    let narcs = if math::less_than_or_equal(theta, PI / 2.0) {
        1
    } else if math::less_than_or_equal(theta, PI) {
        2
    } else if math::less_than_or_equal(theta, 3.0 * PI / 2.0) {
        3
    } else {
        4
    };
    let dtheta = theta / narcs as f64;
    let n = 2 * narcs;

    let point_on = |angle: f64| {
        center + nx * (x_radius * angle.cos()) + ny * (y_radius * angle.sin())
    };
    // Ellipse tangent: the radii scale each axis separately.
    let tangent_at = |angle: f64| {
        nx * (-x_radius * angle.sin()) + ny * (y_radius * angle.cos())
    };

    let w1 = (dtheta / 2.0).cos();
    let mut control_points = vec![Vec4w::ZERO; n + 1];
    let mut p0 = point_on(start_rad);
    let mut t0 = tangent_at(start_rad);
    control_points[0] = Vec4w::from_point(p0, 1.0);

    let mut index = 0;
    let mut angle = start_rad;
    for i in 1..=narcs {
        angle += dtheta;
        let p2 = point_on(angle);
        let t2 = tangent_at(angle);
        control_points[index + 2] = Vec4w::from_point(p2, 1.0);
        match intersect_rays(&p0, &t0, &p2, &t2) {
            RayRayIntersection::Intersecting { point, .. } => {
                control_points[index + 1] = Vec4w::from_point(point, w1);
            }
            _ => {
                return Err(NurbsError::DegenerateGeometry(
                    "arc segment tangents do not intersect".into(),
                ))
            }
        }
        index += 2;
        if i < narcs {
            p0 = p2;
            t0 = t2;
        }
    }

    let mut knots = vec![0.0; n + 4];
    let j = n + 1;
    for i in 0..3 {
        knots[i] = 0.0;
        knots[i + j] = 1.0;
    }
    match narcs {
        2 => {
            knots[3] = 0.5;
            knots[4] = 0.5;
        }
        3 => {
            knots[3] = 1.0 / 3.0;
            knots[4] = 1.0 / 3.0;
            knots[5] = 2.0 / 3.0;
            knots[6] = 2.0 / 3.0;
        }
        4 => {
            knots[3] = 0.25;
            knots[4] = 0.25;
            knots[5] = 0.5;
            knots[6] = 0.5;
            knots[7] = 0.75;
            knots[8] = 0.75;
        }
        _ => {}
    }

    NurbsCurve::new(2, knots, control_points)
}

/// Shoulder point and weight of the single conic segment through
/// `point_on_conic` with the given end tangents.
///
/// Parallel tangents yield the half-arc case: the returned "point" is a
/// displacement vector and the weight is zero (a control point at
/// infinity); callers split that conic before building a curve.
pub fn one_conic_arc(
    start: Vec3,
    start_tangent: Vec3,
    end: Vec3,
    end_tangent: Vec3,
    point_on_conic: Vec3,
) -> Result<(Vec3, f64), NurbsError> {
    let chord = end - start;
    match intersect_rays(&start, &start_tangent, &end, &end_tangent) {
        RayRayIntersection::Intersecting { point: shoulder, .. } => {
            let to_point = point_on_conic - shoulder;
            match intersect_rays(&shoulder, &to_point, &start, &chord) {
                RayRayIntersection::Intersecting { t1: alf2, .. } => {
                    let a = (alf2 / (1.0 - alf2)).sqrt();
                    let u = a / (1.0 + a);
                    let num = (1.0 - u) * (1.0 - u)
                        * (point_on_conic - start).dot(&(shoulder - point_on_conic))
                        + u * u * (point_on_conic - end).dot(&(shoulder - point_on_conic));
                    let den = 2.0 * u * (1.0 - u)
                        * (shoulder - point_on_conic).dot(&(shoulder - point_on_conic));
                    Ok((shoulder, num / den))
                }
                _ => Err(NurbsError::DegenerateGeometry(
                    "conic sample point is not between the end points".into(),
                )),
            }
        }
        RayRayIntersection::Parallel => {
            match intersect_rays(&point_on_conic, &start_tangent, &start, &chord) {
                RayRayIntersection::Intersecting { t0: alf0, t1: alf2, .. } => {
                    let a = (alf2 / (1.0 - alf2)).sqrt();
                    let u = a / (1.0 + a);
                    let b = 2.0 * u * (1.0 - u);
                    let b = -alf0 * (1.0 - b) / b;
                    Ok((start_tangent * b, 0.0))
                }
                _ => Err(NurbsError::DegenerateGeometry(
                    "conic sample point is not between the end points".into(),
                )),
            }
        }
        _ => Err(NurbsError::DegenerateGeometry(
            "conic end tangents are coincident or skew".into(),
        )),
    }
}

/// Split the conic `(start, shoulder w, end)` at its parametric middle.
///
/// Returns the two inner control points, the split point on the conic, and
/// the weight shared by the inner points. A zero shoulder weight means the
/// shoulder is a direction vector (180-degree conic); the inner points are
/// then plain offsets by it.
pub fn split_arc(start: Vec3, shoulder: Vec3, w: f64, end: Vec3) -> (Vec3, Vec3, Vec3, f64) {
    let (q1, r1) = if math::almost_equal(w, 0.0) {
        (start + shoulder, end + shoulder)
    } else {
        (
            (start + shoulder * w) / (1.0 + w),
            (shoulder * w + end) / (1.0 + w),
        )
    };
    let split = (q1 + r1) * 0.5;
    let wqr = ((1.0 + w) / 2.0).sqrt();
    (q1, split, r1, wqr)
}

/// Build an open conic arc through `point_on_conic` with the given end
/// tangents.
///
/// A shoulder weight of one or more yields a single parabolic/hyperbolic
/// segment; elliptic conics split into two or four segments so every
/// segment stays well conditioned.
pub fn open_conic(
    start: Vec3,
    start_tangent: Vec3,
    end: Vec3,
    end_tangent: Vec3,
    point_on_conic: Vec3,
) -> Result<NurbsCurve, NurbsError> {
    let (p1, w1) = one_conic_arc(start, start_tangent, end, end_tangent, point_on_conic)?;
    if math::less_than_or_equal(w1, -1.0) {
        return Err(NurbsError::DegenerateGeometry(
            "conic shoulder weight is not above -1".into(),
        ));
    }

    let nsegs = if math::greater_than_or_equal(w1, 1.0) {
        1
    } else if math::almost_equal(w1, 0.0) {
        2
    } else {
        let v1 = (p1 - start).normalized().ok_or_else(|| {
            NurbsError::DegenerateGeometry("conic shoulder coincides with an end point".into())
        })?;
        let v2 = (end - p1).normalized().ok_or_else(|| {
            NurbsError::DegenerateGeometry("conic shoulder coincides with an end point".into())
        })?;
        let rad = v1.angle_to(&v2);
        if w1 > 0.0 && rad > 60.0_f64.to_radians() {
            1
        } else if w1 < 0.0 && rad > 90.0_f64.to_radians() {
            4
        } else {
            2
        }
    };

    let n = 2 * nsegs;
    let j = n + 1;
    let mut knots = vec![0.0; j + 3];
    for i in 0..3 {
        knots[i] = 0.0;
        knots[i + j] = 1.0;
    }

    let mut control_points = vec![Vec4w::ZERO; n + 1];
    control_points[0] = Vec4w::from_point(start, 1.0);
    control_points[n] = Vec4w::from_point(end, 1.0);

    if nsegs == 1 {
        control_points[1] = Vec4w::from_point(p1, w1);
        return NurbsCurve::new(2, knots, control_points);
    }

    let (q1, split, r1, wqr) = split_arc(start, p1, w1, end);

    if nsegs == 2 {
        control_points[1] = Vec4w::from_point(q1, wqr);
        control_points[2] = Vec4w::from_point(split, 1.0);
        control_points[3] = Vec4w::from_point(r1, wqr);
        knots[3] = 0.5;
        knots[4] = 0.5;
        return NurbsCurve::new(2, knots, control_points);
    }

    // Four segments: split each half again.
    control_points[4] = Vec4w::from_point(split, 1.0);
    let (hq, hs, hr, hw) = split_arc(start, q1, wqr, split);
    control_points[1] = Vec4w::from_point(hq, hw);
    control_points[2] = Vec4w::from_point(hs, 1.0);
    control_points[3] = Vec4w::from_point(hr, hw);
    let (hq, hs, hr, hw) = split_arc(split, r1, wqr, end);
    control_points[5] = Vec4w::from_point(hq, hw);
    control_points[6] = Vec4w::from_point(hs, 1.0);
    control_points[7] = Vec4w::from_point(hr, hw);
    for i in 0..2 {
        knots[i + 3] = 0.25;
        knots[i + 5] = 0.5;
        knots[i + 7] = 0.75;
    }
    NurbsCurve::new(2, knots, control_points)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_circle_layout() {
        let circle = circular_arc(Vec3::ZERO, Vec3::X, Vec3::Y, 0.0, 2.0 * PI, 1.0, 1.0).unwrap();
        assert_eq!(circle.degree(), 2);
        assert_eq!(circle.control_points().len(), 9);
        let expected_knots = [0.0, 0.0, 0.0, 0.25, 0.25, 0.5, 0.5, 0.75, 0.75, 1.0, 1.0, 1.0];
        for (a, b) in circle.knots().iter().zip(expected_knots.iter()) {
            assert!((a - b).abs() < 1e-12);
        }
        let root_half = std::f64::consts::FRAC_1_SQRT_2;
        for (i, cp) in circle.control_points().iter().enumerate() {
            let expected_w = if i % 2 == 0 { 1.0 } else { root_half };
            assert!((cp.w - expected_w).abs() < 1e-12, "weight {} at {}", cp.w, i);
        }
    }

    #[test]
    fn test_full_circle_radius() {
        let circle = circular_arc(Vec3::ZERO, Vec3::X, Vec3::Y, 0.0, 2.0 * PI, 1.0, 1.0).unwrap();
        for i in 0..=200 {
            let t = i as f64 / 200.0;
            let p = circle.point_at(t).unwrap();
            assert!((p.length() - 1.0).abs() < 1e-9, "t={} r={}", t, p.length());
        }
        assert!(circle.is_closed());
    }

    #[test]
    fn test_quarter_arc_endpoints() {
        let arc = circular_arc(
            Vec3::new(1.0, 2.0, 3.0),
            Vec3::X,
            Vec3::Y,
            0.0,
            PI / 2.0,
            2.0,
            2.0,
        )
        .unwrap();
        assert_eq!(arc.control_points().len(), 3);
        let start = arc.point_at(0.0).unwrap();
        let end = arc.point_at(1.0).unwrap();
        assert!(start.is_almost_equal_to(&Vec3::new(3.0, 2.0, 3.0), 1e-12));
        assert!(end.is_almost_equal_to(&Vec3::new(1.0, 4.0, 3.0), 1e-12));
    }

    #[test]
    fn test_elliptical_arc_satisfies_equation() {
        let arc = circular_arc(Vec3::ZERO, Vec3::X, Vec3::Y, 0.0, PI, 2.0, 1.0).unwrap();
        for i in 0..=100 {
            let t = i as f64 / 100.0;
            let p = arc.point_at(t).unwrap();
            let value = (p.x / 2.0).powi(2) + p.y.powi(2);
            assert!((value - 1.0).abs() < 1e-9, "t={} value={}", t, value);
        }
    }

    #[test]
    fn test_open_conic_parabola_single_segment() {
        let curve = open_conic(
            Vec3::ZERO,
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(2.0, 0.0, 0.0),
            Vec3::new(1.0, -1.0, 0.0),
            Vec3::new(1.0, 0.5, 0.0),
        )
        .unwrap();
        assert_eq!(curve.control_points().len(), 3);
        let mid = curve.point_at(0.5).unwrap();
        assert!(mid.is_almost_equal_to(&Vec3::new(1.0, 0.5, 0.0), 1e-9));
    }

    #[test]
    fn test_open_conic_semicircle_from_parallel_tangents() {
        // Antiparallel tangents: the shoulder is at infinity (weight 0).
        let curve = open_conic(
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::Y,
            Vec3::new(-1.0, 0.0, 0.0),
            -Vec3::Y,
            Vec3::new(0.0, 1.0, 0.0),
        )
        .unwrap();
        assert_eq!(curve.control_points().len(), 5);
        for i in 0..=100 {
            let t = i as f64 / 100.0;
            let p = curve.point_at(t).unwrap();
            assert!((p.length() - 1.0).abs() < 1e-9, "t={} r={}", t, p.length());
            assert!(p.y > -1e-12);
        }
    }

    #[test]
    fn test_open_conic_major_circular_arc() {
        // 270 degrees of the unit circle: a negative shoulder weight.
        let curve = open_conic(
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::Y,
            Vec3::new(0.0, -1.0, 0.0),
            Vec3::X,
            Vec3::new(-1.0, 0.0, 0.0),
        )
        .unwrap();
        for i in 0..=100 {
            let t = i as f64 / 100.0;
            let p = curve.point_at(t).unwrap();
            assert!((p.length() - 1.0).abs() < 1e-9, "t={} r={}", t, p.length());
        }
        let start = curve.point_at(0.0).unwrap();
        let end = curve.point_at(1.0).unwrap();
        assert!(start.is_almost_equal_to(&Vec3::new(1.0, 0.0, 0.0), 1e-9));
        assert!(end.is_almost_equal_to(&Vec3::new(0.0, -1.0, 0.0), 1e-9));
    }

    #[test]
    fn test_open_conic_rejects_coincident_tangents() {
        let result = open_conic(
            Vec3::ZERO,
            Vec3::X,
            Vec3::new(2.0, 0.0, 0.0),
            Vec3::X,
            Vec3::new(1.0, 0.0, 0.0),
        );
        assert!(matches!(result, Err(NurbsError::DegenerateGeometry(_))));
    }
}
