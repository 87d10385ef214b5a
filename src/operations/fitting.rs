//! Interpolation and approximation of curves from sample data.

use tracing::{info, instrument};

use crate::basis;
use crate::curve::NurbsCurve;
use crate::geometry::homogeneous::Vec4w;
use crate::geometry::intersection::{intersect_rays, RayRayIntersection};
use crate::geometry::vector::Vec3;
use crate::interpolation;
use crate::linalg;
use crate::math;
use crate::operations::{degree, project};
use crate::validation::NurbsError;
use crate::MAX_DISTANCE;

/// Globally interpolate the points with a clamped curve of the given
/// degree.
///
/// Chord-length parameters, averaged knots, and one LU solve of the
/// square collocation system `N * X = Q`.
pub fn interpolate(curve_degree: usize, points: &[Vec3]) -> Result<NurbsCurve, NurbsError> {
    if curve_degree == 0 {
        return Err(NurbsError::InvalidDegree { got: 0, min: 1 });
    }
    if points.len() < curve_degree + 1 {
        return Err(NurbsError::NotEnoughPoints {
            needed: curve_degree + 1,
            got: points.len(),
        });
    }

    let uk = interpolation::chord_parameterization(points);
    let knots = interpolation::interpolation_knot_vector(curve_degree, &uk);

    let size = points.len();
    let mut matrix = vec![vec![0.0; size]; size];
    for (i, &u) in uk.iter().enumerate() {
        let span = basis::find_span(curve_degree, &knots, u);
        let values = basis::basis_functions(span, curve_degree, &knots, u);
        for (j, &value) in values.iter().enumerate() {
            matrix[i][span - curve_degree + j] = value;
        }
    }

    let solution = linalg::lu_factor(matrix)?.solve_points(points);
    NurbsCurve::from_points(curve_degree, knots, &solution)
}

/// Global interpolation with tangent constraints at selected points.
///
/// Each `(index, direction)` pair adds one derivative-evaluation row; the
/// right-hand side is the unit direction scaled by the total chord length.
pub fn interpolate_with_tangents(
    curve_degree: usize,
    points: &[Vec3],
    tangents: &[(usize, Vec3)],
) -> Result<NurbsCurve, NurbsError> {
    if tangents.is_empty() {
        return interpolate(curve_degree, points);
    }
    if points.len() + tangents.len() < curve_degree + 1 {
        return Err(NurbsError::NotEnoughPoints {
            needed: curve_degree + 1,
            got: points.len(),
        });
    }
    for &(index, _) in tangents {
        if index >= points.len() {
            return Err(NurbsError::NotEnoughPoints {
                needed: index + 1,
                got: points.len(),
            });
        }
    }

    let uk = interpolation::chord_parameterization(points);
    let indices: Vec<usize> = tangents.iter().map(|&(i, _)| i).collect();
    let knots = interpolation::tangent_knot_vector(curve_degree, &uk, &indices);
    let chord = interpolation::total_chord_length(points);

    let size = points.len() + tangents.len();
    let mut matrix = vec![vec![0.0; size]; size];
    let mut rhs = vec![Vec3::ZERO; size];

    let mut row = 0;
    for (i, &u) in uk.iter().enumerate() {
        let span = basis::find_span(curve_degree, &knots, u);
        let values = basis::basis_functions(span, curve_degree, &knots, u);
        for (j, &value) in values.iter().enumerate() {
            matrix[row][span - curve_degree + j] = value;
        }
        rhs[row] = points[i];
        row += 1;

        for &(index, direction) in tangents {
            if index != i {
                continue;
            }
            let ders = basis::basis_function_derivatives(span, curve_degree, 1, &knots, u);
            for (j, &value) in ders[1].iter().enumerate() {
                matrix[row][span - curve_degree + j] = value;
            }
            let unit = direction.normalized().ok_or_else(|| {
                NurbsError::DegenerateGeometry("zero-length tangent constraint".into())
            })?;
            rhs[row] = unit * chord;
            row += 1;
        }
    }

    let solution = linalg::lu_factor(matrix)?.solve_points(&rhs);
    NurbsCurve::from_points(curve_degree, knots, &solution)
}

/// Local C1 cubic interpolation.
///
/// Estimates a tangent at each point, sizes each cubic segment by solving
/// the one-parameter length quadratic, and joins the segments as a single
/// clamped cubic with doubled interior knots.
pub fn local_cubic_interpolate(points: &[Vec3]) -> Result<NurbsCurve, NurbsError> {
    let n = points.len().saturating_sub(1);
    if n < 1 {
        return Err(NurbsError::NotEnoughPoints {
            needed: 2,
            got: points.len(),
        });
    }
    let tangents = interpolation::compute_tangents(points).ok_or_else(|| {
        NurbsError::DegenerateGeometry("tangent estimation failed on coincident points".into())
    })?;

    let mut uk = vec![0.0; n + 1];
    let mut inner = Vec::with_capacity(2 * n);
    for k in 0..n {
        let t0 = tangents[k];
        let t3 = tangents[k + 1];
        let p0 = points[k];
        let p3 = points[k + 1];

        // Segment length from |alpha|: a*x^2 + b*x + c = 0.
        let a = 16.0 - (t0 + t3).length_squared();
        let b = 12.0 * (p3 - p0).dot(&(t0 + t3));
        let c = -36.0 * (p3 - p0).length_squared();
        let alpha = (-b + (b * b - 4.0 * a * c).sqrt()) / (2.0 * a);

        let p1 = p0 + t0 * (alpha / 3.0);
        let p2 = p3 - t3 * (alpha / 3.0);
        uk[k + 1] = uk[k] + 3.0 * (p1 - p0).length();
        inner.push(p1);
        inner.push(p2);
    }

    let total = uk[n];
    let kv_size = 2 * 4 + 2 * (n - 1);
    let mut knots = vec![0.0; kv_size];
    for i in 0..4 {
        knots[kv_size - 1 - i] = 1.0;
    }
    for i in 1..n {
        knots[2 * i + 2] = uk[i] / total;
        knots[2 * i + 3] = uk[i] / total;
    }

    let mut control_points = Vec::with_capacity(2 * n + 2);
    control_points.push(points[0]);
    control_points.extend(inner);
    control_points.push(points[n]);

    NurbsCurve::from_points(3, knots, &control_points)
}

/// Least-squares approximation with `control_count` control points.
///
/// End points are fixed; the interior controls solve the normal equations
/// `(N^T N) X = N^T R` over the residuals against the fixed ends.
pub fn approximate_least_squares(
    curve_degree: usize,
    points: &[Vec3],
    control_count: usize,
) -> Result<NurbsCurve, NurbsError> {
    if points.len() < control_count + 1 {
        return Err(NurbsError::NotEnoughPoints {
            needed: control_count + 1,
            got: points.len(),
        });
    }
    let m = points.len() - 1;
    let n = control_count - 1;
    if n < curve_degree {
        return Err(NurbsError::NotEnoughPoints {
            needed: curve_degree + 2,
            got: control_count,
        });
    }

    let uk = interpolation::chord_parameterization(points);
    let knots = interpolation::approximation_knot_vector(curve_degree, control_count, &uk);

    if n < 2 {
        // No interior unknowns: the curve is just the fixed end points.
        return NurbsCurve::from_points(curve_degree, knots, &[points[0], points[m]]);
    }

    // Residuals after subtracting the clamped end contributions.
    let mut residuals = vec![Vec3::ZERO; m];
    for k in 1..m {
        let n0 = basis::one_basis_function(0, curve_degree, &knots, uk[k]);
        let nn = basis::one_basis_function(n, curve_degree, &knots, uk[k]);
        residuals[k] = points[k] - points[0] * n0 - points[m] * nn;
    }

    let mut matrix = vec![vec![0.0; n - 1]; m - 1];
    for i in 0..(m - 1) {
        for j in 0..(n - 1) {
            matrix[i][j] = basis::one_basis_function(j + 1, curve_degree, &knots, uk[i + 1]);
        }
    }
    let normal = linalg::multiply(&linalg::transpose(&matrix), &matrix);

    let mut rhs = vec![Vec3::ZERO; n - 1];
    for (i, value) in rhs.iter_mut().enumerate() {
        let mut acc = Vec3::ZERO;
        for k in 1..m {
            acc = acc + residuals[k] * basis::one_basis_function(i + 1, curve_degree, &knots, uk[k]);
        }
        *value = acc;
    }

    let interior = linalg::lu_factor(normal)?.solve_points(&rhs);

    let mut all = Vec::with_capacity(control_count);
    all.push(points[0]);
    all.extend(interior);
    all.push(points[m]);
    NurbsCurve::from_points(curve_degree, knots, &all)
}

/// Weighted and constrained least-squares approximation.
///
/// Points (and optional tangents) with a positive weight are fitted in the
/// weighted least-squares sense; a non-positive weight marks an equality
/// constraint enforced through Lagrange multipliers against the
/// precomputed inverse of `N^T W N`.
pub fn approximate_constrained(
    curve_degree: usize,
    points: &[Vec3],
    point_weights: &[f64],
    tangents: &[(usize, Vec3, f64)],
    control_count: usize,
) -> Result<NurbsCurve, NurbsError> {
    if points.len() != point_weights.len() {
        return Err(NurbsError::NotEnoughPoints {
            needed: points.len(),
            got: point_weights.len(),
        });
    }
    let n = control_count - 1;

    let uk = interpolation::chord_parameterization(points);
    let knots = interpolation::approximation_knot_vector(curve_degree, control_count, &uk);

    let mut soft_rows: Vec<Vec<f64>> = Vec::new();
    let mut soft_weights: Vec<f64> = Vec::new();
    let mut soft_targets: Vec<Vec3> = Vec::new();
    let mut hard_rows: Vec<Vec<f64>> = Vec::new();
    let mut hard_targets: Vec<Vec3> = Vec::new();

    let chord = interpolation::total_chord_length(points);
    for (i, &u) in uk.iter().enumerate() {
        let span = basis::find_span(curve_degree, &knots, u);
        let tangent = tangents.iter().find(|&&(idx, _, _)| idx == i);
        let ders = basis::basis_function_derivatives(span, curve_degree, 1, &knots, u);

        let mut row = vec![0.0; n + 1];
        for (j, &value) in ders[0].iter().enumerate() {
            row[span - curve_degree + j] = value;
        }
        if point_weights[i] > 0.0 {
            soft_rows.push(row);
            soft_weights.push(point_weights[i]);
            soft_targets.push(points[i]);
        } else {
            hard_rows.push(row);
            hard_targets.push(points[i]);
        }

        if let Some(&(_, direction, weight)) = tangent {
            let mut der_row = vec![0.0; n + 1];
            for (j, &value) in ders[1].iter().enumerate() {
                der_row[span - curve_degree + j] = value;
            }
            let unit = direction.normalized().ok_or_else(|| {
                NurbsError::DegenerateGeometry("zero-length tangent constraint".into())
            })?;
            if weight > 0.0 {
                soft_rows.push(der_row);
                soft_weights.push(weight);
                soft_targets.push(unit * chord);
            } else {
                hard_rows.push(der_row);
                hard_targets.push(unit * chord);
            }
        }
    }

    let mu = soft_rows.len();
    let mc = hard_rows.len();
    if mc >= n || mc + n >= mu + 1 {
        return Err(NurbsError::DegenerateGeometry(
            "constraint count incompatible with control count".into(),
        ));
    }

    // N^T W N and N^T (W * S)
    let mut weighted = soft_rows.clone();
    for (row, &w) in weighted.iter_mut().zip(soft_weights.iter()) {
        for value in row.iter_mut() {
            *value *= w;
        }
    }
    let nt = linalg::transpose(&soft_rows);
    let ntwn = linalg::multiply(&nt, &weighted);
    let weighted_targets: Vec<Vec3> = soft_targets
        .iter()
        .zip(soft_weights.iter())
        .map(|(&t, &w)| t * w)
        .collect();
    let ntws = linalg::multiply_points(&nt, &weighted_targets);

    if mc == 0 {
        let solution = linalg::lu_factor(ntwn)?.solve_points(&ntws);
        return NurbsCurve::from_points(curve_degree, knots, &solution);
    }

    // Lagrange path: A from (M inv(NtWN) M^T) A = M inv(NtWN) NtWS - T,
    // then X = inv(NtWN) (NtWS - M^T A).
    let inv = linalg::inverse(&ntwn)?;
    let m_inv = linalg::multiply(&hard_rows, &inv);
    let m_inv_mt = linalg::multiply(&m_inv, &linalg::transpose(&hard_rows));
    let m_inv_ntws = linalg::multiply_points(&m_inv, &ntws);
    let gap: Vec<Vec3> = m_inv_ntws
        .iter()
        .zip(hard_targets.iter())
        .map(|(&a, &t)| a - t)
        .collect();
    let multipliers = linalg::lu_factor(m_inv_mt)?.solve_points(&gap);
    let mt_a = linalg::multiply_points(&linalg::transpose(&hard_rows), &multipliers);
    let adjusted: Vec<Vec3> = ntws.iter().zip(mt_a.iter()).map(|(&a, &b)| a - b).collect();
    let solution = linalg::multiply_points(&inv, &adjusted);
    NurbsCurve::from_points(curve_degree, knots, &solution)
}

/// Weight of the single conic fitted through a run of points, expressed as
/// the middle control point.
///
/// Accumulates each intermediate point's shoulder fraction `w/(1+w)`,
/// averages after the loop, and converts back once; the fit fails when any
/// intermediate point deviates more than `max_error` from the conic.
pub fn local_quadratic_middle_point(
    points: &[Vec3],
    start_index: usize,
    end_index: usize,
    start_tangent: Vec3,
    end_tangent: Vec3,
    max_error: f64,
) -> Result<Vec4w, NurbsError> {
    let start = points[start_index];
    let end = points[end_index];

    if end_index - start_index == 1 {
        return match intersect_rays(&start, &start_tangent, &end, &end_tangent) {
            RayRayIntersection::Intersecting { point, .. } => Ok(Vec4w::from_point(point, 1.0)),
            RayRayIntersection::Coincident => Ok(Vec4w::from_point((start + end) * 0.5, 1.0)),
            _ => Err(NurbsError::DegenerateGeometry(
                "segment tangents do not meet".into(),
            )),
        };
    }

    let shoulder = match intersect_rays(&start, &start_tangent, &end, &end_tangent) {
        RayRayIntersection::Coincident => {
            return Ok(Vec4w::from_point((start + end) * 0.5, 1.0));
        }
        RayRayIntersection::Intersecting { t0, t1, point } => {
            if math::less_than_or_equal(t0, 0.0) || math::greater_than_or_equal(t1, 0.0) {
                return Err(NurbsError::DegenerateGeometry(
                    "tangent cone does not contain the points".into(),
                ));
            }
            point
        }
        _ => {
            return Err(NurbsError::DegenerateGeometry(
                "segment tangents are parallel or skew".into(),
            ))
        }
    };

    let mut fraction_sum = 0.0;
    let interior = end_index - start_index - 1;
    for i in (start_index + 1)..end_index {
        let (_, wi) =
            crate::operations::conics::one_conic_arc(start, start_tangent, end, end_tangent, points[i])?;
        if math::less_than_or_equal(wi, -1.0) {
            return Err(NurbsError::DegenerateGeometry(
                "intermediate point outside the conic range".into(),
            ));
        }
        fraction_sum += wi / (1.0 + wi);
    }
    let mean = fraction_sum / interior as f64;
    let w = mean / (1.0 - mean);

    let conic = NurbsCurve::new(
        2,
        vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0],
        vec![
            Vec4w::from_point(start, 1.0),
            Vec4w::from_point(shoulder, w),
            Vec4w::from_point(end, 1.0),
        ],
    )?;
    for i in (start_index + 1)..end_index {
        let mut best = MAX_DISTANCE;
        let mut prev = conic.point_at(0.0)?;
        for step in 1..=99 {
            let next = conic.point_at(step as f64 / 99.0)?;
            let chord = next - prev;
            let ratio = if chord.length_squared() < 1e-30 {
                0.0
            } else {
                ((points[i] - prev).dot(&chord) / chord.length_squared()).clamp(0.0, 1.0)
            };
            let dist = points[i].distance_to(&(prev + chord * ratio));
            best = best.min(dist);
            prev = next;
        }
        if best > max_error {
            return Err(NurbsError::ToleranceNotMet(format!(
                "conic fit deviates {} at point {}",
                best, i
            )));
        }
    }

    Ok(Vec4w::from_point(shoulder, w))
}

/// Bound on the deviation caused by removing the knot at `index` once.
fn remove_knot_error_bound(curve: &NurbsCurve, index: usize) -> f64 {
    let p = curve.degree();
    let knots = curve.knots();
    let ctrl = curve.control_points();
    let u = knots[index];
    let s = basis::knot_multiplicity(knots, u);
    let order = p + 1;

    let first = index - p;
    let last = index - s;
    let off = first - 1;
    let mut temp = vec![Vec4w::ZERO; last + 2 - off];
    temp[0] = ctrl[off];
    temp[last + 1 - off] = ctrl[last + 1];

    let mut i = first as isize;
    let mut j = last as isize;
    let mut ii = 1isize;
    let mut jj = (last - off) as isize;
    while j - i > 0 {
        let alfi = (u - knots[i as usize]) / (knots[i as usize + order] - knots[i as usize]);
        let alfj = (u - knots[j as usize]) / (knots[j as usize + order] - knots[j as usize]);
        temp[ii as usize] = (ctrl[i as usize] - temp[(ii - 1) as usize] * (1.0 - alfi)) / alfi;
        temp[jj as usize] = (ctrl[j as usize] - temp[(jj + 1) as usize] * alfj) / (1.0 - alfj);
        i += 1;
        ii += 1;
        j -= 1;
        jj -= 1;
    }
    if j - i < 0 {
        temp[(ii - 1) as usize].distance_to(&temp[(jj + 1) as usize])
    } else {
        let alfi = (u - knots[i as usize]) / (knots[i as usize + order] - knots[i as usize]);
        let blend = temp[(ii + 1) as usize] * alfi + temp[(ii - 1) as usize] * (1.0 - alfi);
        ctrl[i as usize].distance_to(&blend)
    }
}

/// Remove the knot at `index` once, unconditionally.
///
/// Bound-based removal commits deviations the error budget has already
/// authorized, so no tolerance test is applied here.
fn force_remove_once(curve: &NurbsCurve, index: usize) -> Result<NurbsCurve, NurbsError> {
    let p = curve.degree();
    let knots = curve.knots();
    let u = knots[index];
    let s = basis::knot_multiplicity(knots, u);
    let n = curve.control_points().len() - 1;
    let m = n + p + 1;

    let mut ctrl = curve.control_points().to_vec();
    let first = index - p;
    let last = index - s;
    let off = first - 1;
    let mut temp = vec![Vec4w::ZERO; last + 2 - off];
    temp[0] = ctrl[off];
    temp[last + 1 - off] = ctrl[last + 1];

    let mut i = first as isize;
    let mut j = last as isize;
    let mut ii = 1isize;
    let mut jj = (last - off) as isize;
    while j - i > 0 {
        let alfi = (u - knots[i as usize]) / (knots[i as usize + p + 1] - knots[i as usize]);
        let alfj = (u - knots[j as usize]) / (knots[j as usize + p + 1] - knots[j as usize]);
        temp[ii as usize] = (ctrl[i as usize] - temp[(ii - 1) as usize] * (1.0 - alfi)) / alfi;
        temp[jj as usize] = (ctrl[j as usize] - temp[(jj + 1) as usize] * alfj) / (1.0 - alfj);
        i += 1;
        ii += 1;
        j -= 1;
        jj -= 1;
    }

    let mut ci = first as isize;
    let mut cj = last as isize;
    while cj - ci > 0 {
        ctrl[ci as usize] = temp[(ci as usize - off)];
        ctrl[cj as usize] = temp[(cj as usize - off)];
        ci += 1;
        cj -= 1;
    }

    let mut new_knots = knots.to_vec();
    for k in (index + 1)..=m {
        new_knots[k - 1] = new_knots[k];
    }
    new_knots.pop();

    let gone = (2 * index - s - p) / 2;
    for k in (gone + 1)..=n {
        ctrl[k - 1] = ctrl[k];
    }
    ctrl.pop();

    NurbsCurve::new(p, new_knots, ctrl)
}

/// Remove as many knots as the per-parameter error budget allows.
///
/// `errors[i]` is the deviation already accumulated at `params[i]`; every
/// committed removal adds its bound to the affected band and nothing ever
/// exceeds `max_error`. Returns the thinned curve and the updated budget.
pub fn remove_knots_with_bound(
    curve: &NurbsCurve,
    params: &[f64],
    errors: &[f64],
    max_error: f64,
) -> Result<(NurbsCurve, Vec<f64>), NurbsError> {
    let mut current = curve.clone();
    let mut errors = errors.to_vec();
    let mut blocked: Vec<f64> = Vec::new();

    loop {
        let p = current.degree();
        let knots = current.knots().to_vec();
        let n = current.control_points().len() - 1;
        if n + 1 <= p + 1 {
            break;
        }

        // Cheapest removable interior knot not yet ruled out.
        let mut candidate: Option<(usize, f64)> = None;
        let mut idx = p + 1;
        while idx <= n {
            let u = knots[idx];
            let mut last = idx;
            while last + 1 <= n && math::almost_equal(knots[last + 1], u) {
                last += 1;
            }
            if !blocked.iter().any(|&b| math::almost_equal(b, u)) {
                let bound = remove_knot_error_bound(&current, last);
                if candidate.map_or(true, |(_, best)| bound < best) {
                    candidate = Some((last, bound));
                }
            }
            idx = last + 1;
        }
        let Some((r, bound)) = candidate else { break };
        let u = knots[r];
        let s = basis::knot_multiplicity(&knots, u);

        // Added deviation at each parameter in the affected band
        // (depends on the parity of degree + multiplicity).
        let (lo, scale) = if (p + s) % 2 == 1 {
            let k = (p + s + 1) / 2;
            let lo = r - k + 1;
            let alpha = (knots[r] - knots[lo]) / (knots[lo + p + 1] - knots[lo]);
            (lo, 1.0 - alpha)
        } else {
            let k = (p + s) / 2;
            (r - k, 1.0)
        };

        let mut new_errors = errors.clone();
        let mut fits = true;
        for (i, &param) in params.iter().enumerate() {
            if param < knots[lo] || param > knots[lo + p + 1] {
                continue;
            }
            let added = scale * bound * basis::one_basis_function(lo, p, &knots, param);
            new_errors[i] += added;
            if new_errors[i] > max_error {
                fits = false;
                break;
            }
        }

        if fits {
            current = force_remove_once(&current, r)?;
            errors = new_errors;
            blocked.clear();
        } else {
            blocked.push(u);
        }
    }

    Ok((current, errors))
}

/// Approximate the points to within `max_error`, growing the degree from
/// one and removing every knot the error budget allows along the way.
#[instrument(skip(points))]
pub fn approximate_with_bound(
    curve_degree: usize,
    points: &[Vec3],
    max_error: f64,
) -> Result<NurbsCurve, NurbsError> {
    if curve_degree == 0 {
        return Err(NurbsError::InvalidDegree { got: 0, min: 1 });
    }
    if points.len() < 2 {
        return Err(NurbsError::NotEnoughPoints {
            needed: 2,
            got: points.len(),
        });
    }

    let mut uk = interpolation::chord_parameterization(points);
    let mut errors = vec![0.0; points.len()];

    // Degree-one polyline through every point.
    let mut knots = Vec::with_capacity(points.len() + 2);
    knots.push(0.0);
    knots.extend_from_slice(&uk);
    knots.push(1.0);
    let mut curve = NurbsCurve::from_points(1, knots, points)?;

    for deg in 1..=curve_degree {
        let (thinned, thinned_errors) = remove_knots_with_bound(&curve, &uk, &errors, max_error)?;
        curve = thinned;
        errors = thinned_errors;
        if deg == curve_degree {
            break;
        }

        curve = degree::elevate_degree(&curve, 1)?;

        // Refit at the elevated degree with the same control count; keep
        // the fit only when it stays inside the budget everywhere.
        if let Ok(fitted) =
            approximate_least_squares(deg + 1, points, curve.control_points().len())
        {
            let mut new_uk = Vec::with_capacity(points.len());
            let mut new_errors = Vec::with_capacity(points.len());
            let mut ok = true;
            for q in points {
                let t = project::closest_parameter(&fitted, q)?;
                let d = fitted.point_at(t)?.distance_to(q);
                if d > max_error {
                    ok = false;
                    break;
                }
                new_uk.push(t);
                new_errors.push(d);
            }
            let monotone = new_uk.windows(2).all(|w| w[0] <= w[1]);
            if ok && monotone {
                curve = fitted;
                uk = new_uk;
                errors = new_errors;
            }
        }
    }

    info!(
        degree = curve.degree(),
        controls = curve.control_points().len(),
        "error-bounded approximation finished"
    );
    Ok(curve)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wave_points() -> Vec<Vec3> {
        (0..=8)
            .map(|i| {
                let x = i as f64;
                Vec3::new(x, (x * 0.8).sin(), 0.0)
            })
            .collect()
    }

    #[test]
    fn test_interpolation_passes_through_points() {
        let points = wave_points();
        let curve = interpolate(3, &points).unwrap();
        let uk = interpolation::chord_parameterization(&points);
        for (q, &u) in points.iter().zip(uk.iter()) {
            let p = curve.point_at(u).unwrap();
            assert!(p.is_almost_equal_to(q, 1e-9), "u={} {:?} vs {:?}", u, p, q);
        }
    }

    #[test]
    fn test_interpolation_rejects_too_few_points() {
        let points = vec![Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0)];
        assert!(matches!(
            interpolate(3, &points),
            Err(NurbsError::NotEnoughPoints { .. })
        ));
    }

    #[test]
    fn test_interpolation_with_end_tangents() {
        let points = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(2.0, 0.0, 0.0),
            Vec3::new(3.0, -1.0, 0.0),
        ];
        let tangents = [(0usize, Vec3::Y), (3usize, Vec3::X)];
        let curve = interpolate_with_tangents(3, &points, &tangents).unwrap();

        let uk = interpolation::chord_parameterization(&points);
        for (q, &u) in points.iter().zip(uk.iter()) {
            let p = curve.point_at(u).unwrap();
            assert!(p.is_almost_equal_to(q, 1e-8), "point at u={}", u);
        }
        let start_der = curve.derivatives(0.0, 1).unwrap()[1];
        assert!(start_der.normalized().unwrap().is_almost_equal_to(&Vec3::Y, 1e-8));
        let end_der = curve.derivatives(1.0, 1).unwrap()[1];
        assert!(end_der.normalized().unwrap().is_almost_equal_to(&Vec3::X, 1e-8));
    }

    #[test]
    fn test_local_cubic_interpolation() {
        let points = wave_points();
        let curve = local_cubic_interpolate(&points).unwrap();
        assert_eq!(curve.degree(), 3);
        assert_eq!(curve.control_points().len(), 2 * (points.len() - 1) + 2);

        // Interpolates the end points exactly and the interior closely.
        let start = curve.point_at(0.0).unwrap();
        let end = curve.point_at(1.0).unwrap();
        assert!(start.is_almost_equal_to(&points[0], 1e-9));
        assert!(end.is_almost_equal_to(points.last().unwrap(), 1e-9));
        for q in &points {
            let t = project::closest_parameter(&curve, q).unwrap();
            let d = curve.point_at(t).unwrap().distance_to(q);
            assert!(d < 1e-6, "distance {} to {:?}", d, q);
        }
    }

    #[test]
    fn test_least_squares_endpoints_and_residual() {
        let points = wave_points();
        let curve = approximate_least_squares(3, &points, 6).unwrap();
        assert_eq!(curve.control_points().len(), 6);

        let start = curve.point_at(0.0).unwrap();
        let end = curve.point_at(1.0).unwrap();
        assert!(start.is_almost_equal_to(&points[0], 1e-9));
        assert!(end.is_almost_equal_to(points.last().unwrap(), 1e-9));

        // The smooth wave is well approximated by six controls.
        for q in &points {
            let t = project::closest_parameter(&curve, q).unwrap();
            let d = curve.point_at(t).unwrap().distance_to(q);
            assert!(d < 0.2, "distance {} to {:?}", d, q);
        }
    }

    #[test]
    fn test_constrained_fit_honours_hard_points() {
        let points = wave_points();
        let mut weights = vec![1.0; points.len()];
        weights[0] = -1.0;
        weights[8] = -1.0;
        let curve = approximate_constrained(3, &points, &weights, &[], 6).unwrap();

        let uk = interpolation::chord_parameterization(&points);
        let start = curve.point_at(uk[0]).unwrap();
        let end = curve.point_at(uk[8]).unwrap();
        assert!(start.is_almost_equal_to(&points[0], 1e-7));
        assert!(end.is_almost_equal_to(&points[8], 1e-7));
    }

    #[test]
    fn test_local_quadratic_fits_circle_run() {
        // Points on the first quadrant of the unit circle.
        let points: Vec<Vec3> = (0..=4)
            .map(|i| {
                let a = std::f64::consts::FRAC_PI_2 * i as f64 / 4.0;
                Vec3::new(a.cos(), a.sin(), 0.0)
            })
            .collect();
        let middle =
            local_quadratic_middle_point(&points, 0, 4, Vec3::Y, -Vec3::X, 1e-3).unwrap();
        // The exact arc shoulder is (1,1) with weight cos(45 deg).
        assert!(middle.project().is_almost_equal_to(&Vec3::new(1.0, 1.0, 0.0), 1e-6));
        assert!((middle.w - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-3);
    }

    #[test]
    fn test_remove_knots_with_bound_thins_straight_line_data() {
        // Collinear data: every knot is removable within any budget.
        let points: Vec<Vec3> = (0..=6).map(|i| Vec3::new(i as f64, 0.0, 0.0)).collect();
        let uk = interpolation::chord_parameterization(&points);
        let mut knots = vec![0.0];
        knots.extend_from_slice(&uk);
        knots.push(1.0);
        let curve = NurbsCurve::from_points(1, knots, &points).unwrap();

        let errors = vec![0.0; points.len()];
        let (thinned, new_errors) =
            remove_knots_with_bound(&curve, &uk, &errors, 1e-3).unwrap();
        assert_eq!(thinned.control_points().len(), 2);
        assert!(new_errors.iter().all(|&e| e <= 1e-3));
    }

    #[test]
    fn test_approximate_with_bound_meets_tolerance() {
        let points = wave_points();
        let tolerance = 0.05;
        let curve = approximate_with_bound(3, &points, tolerance).unwrap();
        assert_eq!(curve.degree(), 3);
        for q in &points {
            let t = project::closest_parameter(&curve, q).unwrap();
            let d = curve.point_at(t).unwrap().distance_to(q);
            assert!(d <= tolerance * 1.01, "distance {} to {:?}", d, q);
        }
    }

    #[test]
    fn test_approximate_with_bound_compresses_line() {
        let points: Vec<Vec3> = (0..=20).map(|i| Vec3::new(i as f64, 0.0, 0.0)).collect();
        let curve = approximate_with_bound(3, &points, 1e-4).unwrap();
        assert!(curve.control_points().len() <= 4);
    }
}
