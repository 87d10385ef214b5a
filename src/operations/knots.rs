//! Knot insertion, refinement, removal, and Bézier decomposition.
//!
//! The two-ended sweeps below index with signed locals; the window
//! boundaries (`first`, `last`, `off`) cross during removal and must not
//! wrap.

use crate::basis;
use crate::curve::NurbsCurve;
use crate::geometry::homogeneous::Vec4w;
use crate::geometry::vector::Vec3;
use crate::math;
use crate::validation::{self, NurbsError};

/// Insert the knot `u` up to `times` times.
///
/// The multiplicity after insertion never exceeds the degree: `times` is
/// clamped to `degree - multiplicity(u)`. Inserting zero times returns the
/// curve unchanged.
pub fn insert_knot(curve: &NurbsCurve, u: f64, times: usize) -> Result<NurbsCurve, NurbsError> {
    validation::check_curve(curve.degree(), curve.knots(), curve.control_points())?;
    validation::check_parameter(u, curve.knots())?;

    let p = curve.degree();
    let knots = curve.knots();
    let ctrl = curve.control_points();

    let span = basis::find_span(p, knots, u);
    let s = basis::knot_multiplicity(knots, u);
    let times = times.min(p.saturating_sub(s));
    if times == 0 {
        return Ok(curve.clone());
    }

    let mut new_knots = Vec::with_capacity(knots.len() + times);
    new_knots.extend_from_slice(&knots[..=span]);
    new_knots.extend(std::iter::repeat(u).take(times));
    new_knots.extend_from_slice(&knots[span + 1..]);

    let n = ctrl.len() - 1;
    let mut new_ctrl = vec![Vec4w::ZERO; ctrl.len() + times];
    for i in 0..=(span - p) {
        new_ctrl[i] = ctrl[i];
    }
    for i in (span - s)..=n {
        new_ctrl[i + times] = ctrl[i];
    }

    let mut temp: Vec<Vec4w> = (0..=(p - s)).map(|i| ctrl[span - p + i]).collect();
    let mut leftmost = 0;
    for j in 1..=times {
        let l = span - p + j;
        for i in 0..=(p - j - s) {
            let alpha = (u - knots[l + i]) / (knots[i + span + 1] - knots[l + i]);
            temp[i] = temp[i + 1] * alpha + temp[i] * (1.0 - alpha);
        }
        new_ctrl[l] = temp[0];
        new_ctrl[span + times - j - s] = temp[p - j - s];
        leftmost = l;
    }
    for i in (leftmost + 1)..(span - s) {
        new_ctrl[i] = temp[i - leftmost];
    }

    NurbsCurve::new(p, new_knots, new_ctrl)
}

/// Evaluate the curve point at `t` by corner cutting.
///
/// Inserts `t` until its multiplicity reaches the degree; the collapsed
/// control point is the curve point. Endpoints short-circuit to the
/// clamped control points.
pub fn point_at_by_corner_cut(curve: &NurbsCurve, t: f64) -> Result<Vec3, NurbsError> {
    validation::check_curve(curve.degree(), curve.knots(), curve.control_points())?;
    validation::check_parameter(t, curve.knots())?;

    let p = curve.degree();
    let knots = curve.knots();
    let ctrl = curve.control_points();
    let n = ctrl.len() - 1;

    if math::almost_equal(t, knots[0]) {
        return Ok(ctrl[0].project());
    }
    if math::almost_equal(t, knots[n + p + 1]) {
        return Ok(ctrl[n].project());
    }

    let span = basis::find_span(p, knots, t);
    let s = basis::knot_multiplicity(knots, t);
    let times = p.saturating_sub(s);

    let mut temp: Vec<Vec4w> = (0..=times).map(|i| ctrl[span - p + i]).collect();
    for j in 1..=times {
        for i in 0..=(times - j) {
            let left = knots[span - p + j + i];
            let alpha = (t - left) / (knots[i + span + 1] - left);
            temp[i] = temp[i + 1] * alpha + temp[i] * (1.0 - alpha);
        }
    }
    Ok(temp[0].project())
}

/// Insert every value of the sorted vector `inserts` in one pass.
///
/// Boehm's refinement: equivalent to repeated insertion but a single
/// right-to-left merge over the knot vector.
pub fn refine_knots(curve: &NurbsCurve, inserts: &[f64]) -> Result<NurbsCurve, NurbsError> {
    validation::check_curve(curve.degree(), curve.knots(), curve.control_points())?;
    if inserts.is_empty() {
        return Ok(curve.clone());
    }
    if !validation::is_valid_knot_vector(inserts) {
        return Err(NurbsError::DecreasingKnotVector);
    }
    for &x in inserts {
        validation::check_parameter(x, curve.knots())?;
    }

    let p = curve.degree();
    let knots = curve.knots();
    let ctrl = curve.control_points();
    let n = ctrl.len() - 1;
    let m = n + p + 1;
    let r = inserts.len() - 1;

    let a = basis::find_span(p, knots, inserts[0]);
    let b = basis::find_span(p, knots, inserts[r]) + 1;

    let mut new_knots = vec![0.0; m + r + 2];
    let mut new_ctrl = vec![Vec4w::ZERO; n + r + 2];

    new_knots[..=a].copy_from_slice(&knots[..=a]);
    for j in (b + p)..=m {
        new_knots[j + r + 1] = knots[j];
    }
    new_ctrl[..=(a - p)].copy_from_slice(&ctrl[..=(a - p)]);
    for j in (b - 1)..=n {
        new_ctrl[j + r + 1] = ctrl[j];
    }

    let ps = p as isize;
    let mut i = (b + p - 1) as isize;
    let mut k = (b + p + r) as isize;
    for j in (0..=r).rev() {
        let x = inserts[j];
        while x <= knots[i as usize] && i > a as isize {
            new_ctrl[(k - ps - 1) as usize] = ctrl[(i - ps - 1) as usize];
            new_knots[k as usize] = knots[i as usize];
            k -= 1;
            i -= 1;
        }
        new_ctrl[(k - ps - 1) as usize] = new_ctrl[(k - ps) as usize];
        for l in 1..=ps {
            let ind = (k - ps + l) as usize;
            let mut alpha = new_knots[(k + l) as usize] - x;
            if math::almost_equal(alpha.abs(), 0.0) {
                new_ctrl[ind - 1] = new_ctrl[ind];
            } else {
                alpha /= new_knots[(k + l) as usize] - knots[(i - ps + l) as usize];
                new_ctrl[ind - 1] = new_ctrl[ind - 1] * alpha + new_ctrl[ind] * (1.0 - alpha);
            }
        }
        new_knots[k as usize] = x;
        k -= 1;
    }

    NurbsCurve::new(p, new_knots, new_ctrl)
}

/// Split the curve into its Bézier segments, one per nonzero knot span.
///
/// Each segment is `degree + 1` control points in standard Bézier form.
pub fn decompose_into_beziers(curve: &NurbsCurve) -> Result<Vec<Vec<Vec4w>>, NurbsError> {
    validation::check_curve(curve.degree(), curve.knots(), curve.control_points())?;

    let p = curve.degree();
    let knots = curve.knots();
    let ctrl = curve.control_points();
    let n = ctrl.len() - 1;
    let m = n + p + 1;

    let mut segments = Vec::new();
    let mut bezier: Vec<Vec4w> = ctrl[..=p].to_vec();
    let mut a = p;
    let mut b = p + 1;

    while b < m {
        let i = b;
        while b < m && math::almost_equal(knots[b], knots[b + 1]) {
            b += 1;
        }
        let mult = (b - i + 1).min(p);
        let r = p - mult;
        let mut next_bezier = vec![Vec4w::ZERO; p + 1];

        if mult < p {
            let numer = knots[b] - knots[a];
            let mut alphas = vec![0.0; r];
            for j in ((mult + 1)..=p).rev() {
                alphas[j - mult - 1] = numer / (knots[a + j] - knots[a]);
            }
            for j in 1..=r {
                let save = r - j;
                let s = mult + j;
                for k in (s..=p).rev() {
                    let alpha = alphas[k - s];
                    bezier[k] = bezier[k] * alpha + bezier[k - 1] * (1.0 - alpha);
                }
                if b < m {
                    next_bezier[save] = bezier[p];
                }
            }
        }

        segments.push(bezier.clone());
        if b < m {
            for k in (p - mult)..=p {
                next_bezier[k] = ctrl[b - p + k];
            }
            bezier = next_bezier;
            a = b;
            b += 1;
        }
    }

    Ok(segments)
}

/// Remove the knot `u` up to `times` times, returning the new curve and
/// the number of removals that actually succeeded.
///
/// A removal commits only when the reconstructed control points converge
/// within the data-dependent modification tolerance; the sweep stops at
/// the first failure and the output reflects the removals committed so
/// far.
pub fn remove_knot(curve: &NurbsCurve, u: f64, times: usize) -> Result<(NurbsCurve, usize), NurbsError> {
    validation::check_curve(curve.degree(), curve.knots(), curve.control_points())?;
    validation::check_parameter(u, curve.knots())?;

    let p = curve.degree();
    let knots = curve.knots();
    let n = curve.control_points().len() - 1;
    let m = n + p + 1;

    if times == 0 || math::almost_equal(u, knots[0]) || math::almost_equal(u, knots[m]) {
        return Ok((curve.clone(), 0));
    }
    let s = basis::knot_multiplicity(knots, u);
    if s == 0 {
        return Ok((curve.clone(), 0));
    }
    let times = times.min(s);

    let tol = validation::curve_modify_tolerance(curve.control_points());
    let order = (p + 1) as isize;
    let r = basis::find_span(p, knots, u);

    let mut ctrl = curve.control_points().to_vec();
    let mut temp = vec![Vec4w::ZERO; 2 * p + 2];
    let mut first = (r - p) as isize;
    let mut last = (r - s) as isize;
    let mut removed = 0usize;

    for t in 0..times {
        let t_i = t as isize;
        let off = first - 1;
        temp[0] = ctrl[off as usize];
        temp[(last + 1 - off) as usize] = ctrl[(last + 1) as usize];

        let mut i = first;
        let mut j = last;
        let mut ii = 1isize;
        let mut jj = last - off;
        let mut remflag = false;

        // Reconstruct candidate pre-insertion points from both ends.
        while j - i > t_i {
            let alfi = (u - knots[i as usize]) / (knots[(i + order + t_i) as usize] - knots[i as usize]);
            let alfj =
                (u - knots[(j - t_i) as usize]) / (knots[(j + order) as usize] - knots[(j - t_i) as usize]);
            temp[ii as usize] = (ctrl[i as usize] - temp[(ii - 1) as usize] * (1.0 - alfi)) / alfi;
            temp[jj as usize] = (ctrl[j as usize] - temp[(jj + 1) as usize] * alfj) / (1.0 - alfj);
            i += 1;
            ii += 1;
            j -= 1;
            jj -= 1;
        }

        if j - i < t_i {
            if temp[(ii - 1) as usize].distance_to(&temp[(jj + 1) as usize]) <= tol {
                remflag = true;
            }
        } else {
            let alfi = (u - knots[i as usize]) / (knots[(i + order + t_i) as usize] - knots[i as usize]);
            let blend = temp[(ii + t_i + 1) as usize] * alfi + temp[(ii - 1) as usize] * (1.0 - alfi);
            if ctrl[i as usize].distance_to(&blend) <= tol {
                remflag = true;
            }
        }

        if !remflag {
            break;
        }
        let mut ci = first;
        let mut cj = last;
        while cj - ci > t_i {
            ctrl[ci as usize] = temp[(ci - off) as usize];
            ctrl[cj as usize] = temp[(cj - off) as usize];
            ci += 1;
            cj -= 1;
        }
        removed = t + 1;
        first -= 1;
        last += 1;
    }

    if removed == 0 {
        return Ok((curve.clone(), 0));
    }

    let mut new_knots = knots.to_vec();
    for k in (r + 1)..=m {
        new_knots[k - removed] = new_knots[k];
    }
    new_knots.truncate(knots.len() - removed);

    // Close the gap left by the removed control points.
    let fo = (2 * r - s - p) / 2;
    let mut j = fo as isize;
    let mut i = j;
    for k in 1..removed {
        if k % 2 == 1 {
            i += 1;
        } else {
            j -= 1;
        }
    }
    for k in (i as usize + 1)..=n {
        ctrl[j as usize] = ctrl[k];
        j += 1;
    }
    ctrl.truncate(ctrl.len() - removed);

    Ok((NurbsCurve::new(p, new_knots, ctrl)?, removed))
}

#[cfg(test)]
mod tests {
    use super::*;

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

    fn sample_params(curve: &NurbsCurve, count: usize) -> Vec<f64> {
        let (t0, t1) = curve.domain();
        (0..=count)
            .map(|i| t0 + (t1 - t0) * i as f64 / count as f64)
            .collect()
    }

    #[test]
    fn test_insert_knot_preserves_point() {
        let curve = sample_curve();
        let before = curve.point_at(2.5).unwrap();
        let inserted = insert_knot(&curve, 2.5, 2).unwrap();
        assert_eq!(inserted.knots().len(), curve.knots().len() + 2);
        assert_eq!(basis::knot_multiplicity(inserted.knots(), 2.5), 2);
        let after = inserted.point_at(2.5).unwrap();
        assert!(before.is_almost_equal_to(&after, 1e-9));
    }

    #[test]
    fn test_insert_knot_preserves_whole_curve() {
        let curve = sample_curve();
        let inserted = insert_knot(&curve, 1.25, 1).unwrap();
        for t in sample_params(&curve, 100) {
            let a = curve.point_at(t).unwrap();
            let b = inserted.point_at(t).unwrap();
            assert!(a.is_almost_equal_to(&b, 1e-9), "t={}", t);
        }
    }

    #[test]
    fn test_insert_clamps_to_degree() {
        let curve = sample_curve();
        let inserted = insert_knot(&curve, 2.0, 5).unwrap();
        // existing multiplicity 1, so at most 2 more
        assert_eq!(basis::knot_multiplicity(inserted.knots(), 2.0), 3);
    }

    #[test]
    fn test_insert_at_full_multiplicity_is_identity() {
        let curve = sample_curve();
        let saturated = insert_knot(&curve, 2.0, 2).unwrap();
        let again = insert_knot(&saturated, 2.0, 1).unwrap();
        assert_eq!(again.knots().len(), saturated.knots().len());
    }

    #[test]
    fn test_corner_cut_matches_basis_evaluation() {
        let curve = sample_curve();
        for t in [0.0, 0.4, 1.0, 2.5, 3.99, 5.0] {
            let direct = curve.point_at(t).unwrap();
            let cut = point_at_by_corner_cut(&curve, t).unwrap();
            assert!(direct.is_almost_equal_to(&cut, 1e-9), "t={}", t);
        }
    }

    #[test]
    fn test_refine_matches_repeated_insertion() {
        let curve = sample_curve();
        let xs = vec![0.5, 1.5, 2.5, 2.5, 4.5];
        let refined = refine_knots(&curve, &xs).unwrap();
        assert_eq!(refined.knots().len(), curve.knots().len() + xs.len());

        let mut repeated = curve.clone();
        for &x in &xs {
            repeated = insert_knot(&repeated, x, 1).unwrap();
        }
        for t in sample_params(&curve, 100) {
            let a = refined.point_at(t).unwrap();
            let b = repeated.point_at(t).unwrap();
            assert!(a.is_almost_equal_to(&b, 1e-9), "t={}", t);
        }
    }

    #[test]
    fn test_decompose_segment_count_and_shape() {
        let curve = sample_curve();
        let segments = decompose_into_beziers(&curve).unwrap();
        assert_eq!(segments.len(), 5);
        for segment in &segments {
            assert_eq!(segment.len(), 4);
        }
        // Segment corners join.
        for pair in segments.windows(2) {
            let end = pair[0][3].project();
            let start = pair[1][0].project();
            assert!(end.is_almost_equal_to(&start, 1e-9));
        }
    }

    #[test]
    fn test_decompose_round_trip_evaluation() {
        let curve = sample_curve();
        let segments = decompose_into_beziers(&curve).unwrap();
        for t in sample_params(&curve, 100) {
            // Spans are unit width starting at integers here.
            let seg = (t.floor() as usize).min(segments.len() - 1);
            let local = t - seg as f64;
            let mut acc = Vec4w::ZERO;
            for (j, point) in segments[seg].iter().enumerate() {
                acc = acc + *point * basis::bernstein(j, 3, local);
            }
            let direct = curve.point_at(t).unwrap();
            assert!(acc.project().is_almost_equal_to(&direct, 1e-9), "t={}", t);
        }
    }

    #[test]
    fn test_remove_inserted_knot_round_trip() {
        let curve = sample_curve();
        let inserted = insert_knot(&curve, 2.5, 2).unwrap();
        let (removed_curve, count) = remove_knot(&inserted, 2.5, 2).unwrap();
        assert_eq!(count, 2);
        assert_eq!(removed_curve.knots().len(), curve.knots().len());
        for t in sample_params(&curve, 100) {
            let a = curve.point_at(t).unwrap();
            let b = removed_curve.point_at(t).unwrap();
            assert!(a.is_almost_equal_to(&b, 1e-7), "t={}", t);
        }
    }

    #[test]
    fn test_remove_unremovable_knot_reports_zero() {
        let curve = sample_curve();
        let (unchanged, count) = remove_knot(&curve, 2.0, 1).unwrap();
        assert_eq!(count, 0);
        assert_eq!(unchanged.knots().len(), curve.knots().len());
    }

    #[test]
    fn test_remove_absent_knot_is_noop() {
        let curve = sample_curve();
        let (unchanged, count) = remove_knot(&curve, 2.5, 1).unwrap();
        assert_eq!(count, 0);
        assert_eq!(unchanged.knots().len(), curve.knots().len());
    }
}
