//! Degree elevation and reduction.
//!
//! Both walk the knot vector segment by segment, carrying the
//! `a`/`b`/`kind`/`cind`/`r`/`oldr` state of the Piegl-Tiller algorithms.
//! Output buffer sizes are exact: each distinct interior knot gains
//! `times` copies under elevation and loses one copy under reduction.

use crate::curve::NurbsCurve;
use crate::geometry::homogeneous::Vec4w;
use crate::math;
use crate::validation::{self, NurbsError};

/// Number of distinct knot values strictly inside the clamped ends.
fn distinct_interior_knots(degree: usize, knots: &[f64]) -> usize {
    let n = knots.len() - degree - 2;
    let mut count = 0;
    let mut i = degree + 1;
    while i <= n {
        count += 1;
        let value = knots[i];
        while i <= n && math::almost_equal(knots[i], value) {
            i += 1;
        }
    }
    count
}

/// Raise the degree by `times`, leaving the curve's shape unchanged.
///
/// Implicit Bézier decomposition, per-segment elevation with the
/// `C(p,j)*C(t,i-j)/C(p+t,i)` coefficients, then removal of the knots the
/// decomposition introduced at interior breakpoints.
pub fn elevate_degree(curve: &NurbsCurve, times: usize) -> Result<NurbsCurve, NurbsError> {
    validation::check_curve(curve.degree(), curve.knots(), curve.control_points())?;
    if times == 0 {
        return Ok(curve.clone());
    }

    let p = curve.degree();
    let knots = curve.knots();
    let ctrl = curve.control_points();
    let n = ctrl.len() - 1;
    let m = n + p + 1;
    let ph = p + times;
    let ph2 = ph / 2;

    // Coefficients for elevating one Bezier segment.
    let mut bezalfs = vec![vec![0.0; p + 1]; ph + 1];
    bezalfs[0][0] = 1.0;
    bezalfs[ph][p] = 1.0;
    for i in 1..=ph2 {
        let inv = 1.0 / math::binomial(ph, i);
        let mpi = p.min(i);
        for j in i.saturating_sub(times)..=mpi {
            bezalfs[i][j] = inv * math::binomial(p, j) * math::binomial(times, i - j);
        }
    }
    for i in (ph2 + 1)..=(ph - 1) {
        let mpi = p.min(i);
        for j in i.saturating_sub(times)..=mpi {
            bezalfs[i][j] = bezalfs[ph - i][p - j];
        }
    }

    let interior = distinct_interior_knots(p, knots);
    let new_ctrl_len = (n + 1) + times * (interior + 1);
    let new_knot_len = (m + 1) + times * (interior + 2);
    let mut qw = vec![Vec4w::ZERO; new_ctrl_len];
    let mut uh = vec![0.0; new_knot_len];

    let mut kind = ph + 1;
    let mut r: isize = -1;
    let mut a = p;
    let mut b = p + 1;
    let mut cind = 1usize;
    let mut ua = knots[0];

    qw[0] = ctrl[0];
    for knot in uh.iter_mut().take(ph + 1) {
        *knot = ua;
    }

    let mut bpts: Vec<Vec4w> = ctrl[..=p].to_vec();
    let mut next_bpts = vec![Vec4w::ZERO; p.saturating_sub(1)];
    let mut ebpts = vec![Vec4w::ZERO; ph + 1];

    while b < m {
        let seg_start = b;
        while b < m && math::almost_equal(knots[b], knots[b + 1]) {
            b += 1;
        }
        let mul = b - seg_start + 1;
        let ub = knots[b];
        let oldr = r;
        r = p as isize - mul as isize;
        let lbz = if oldr > 0 { ((oldr + 2) / 2) as usize } else { 1 };
        let rbz = if r > 0 { ph - (r as usize + 1) / 2 } else { ph };

        if r > 0 {
            // Insert ub enough times to finish this Bezier segment.
            let numer = ub - ua;
            let mut alfs = vec![0.0; p - mul];
            for k in ((mul + 1)..=p).rev() {
                alfs[k - mul - 1] = numer / (knots[a + k] - ua);
            }
            for j in 1..=(r as usize) {
                let save = r as usize - j;
                let s = mul + j;
                for k in (s..=p).rev() {
                    bpts[k] = bpts[k] * alfs[k - s] + bpts[k - 1] * (1.0 - alfs[k - s]);
                }
                next_bpts[save] = bpts[p];
            }
        }

        for i in lbz..=ph {
            ebpts[i] = Vec4w::ZERO;
            let mpi = p.min(i);
            for j in i.saturating_sub(times)..=mpi {
                ebpts[i] = ebpts[i] + bpts[j] * bezalfs[i][j];
            }
        }

        if oldr > 1 {
            // Remove the knots the previous decomposition step inserted.
            let first = kind as isize - 2;
            let last = kind as isize;
            let den = ub - ua;
            let bet = (ub - uh[kind - 1]) / den;
            let mut lo = first;
            let mut hi = last;
            for tr in 1..oldr {
                let mut i = lo;
                let mut j = hi;
                let mut kj = j - kind as isize + 1;
                while j - i > tr {
                    if i < cind as isize {
                        let alf = (ub - uh[i as usize]) / (ua - uh[i as usize]);
                        qw[i as usize] = qw[i as usize] * alf + qw[(i - 1) as usize] * (1.0 - alf);
                    }
                    if j >= lbz as isize {
                        if j - tr <= kind as isize - ph as isize + oldr {
                            let gam = (ub - uh[(j - tr) as usize]) / den;
                            ebpts[kj as usize] =
                                ebpts[kj as usize] * gam + ebpts[(kj + 1) as usize] * (1.0 - gam);
                        } else {
                            ebpts[kj as usize] =
                                ebpts[kj as usize] * bet + ebpts[(kj + 1) as usize] * (1.0 - bet);
                        }
                    }
                    i += 1;
                    j -= 1;
                    kj -= 1;
                }
                lo -= 1;
                hi += 1;
            }
        }

        if a != p {
            let fill = (ph as isize - oldr) as usize;
            for _ in 0..fill {
                uh[kind] = ua;
                kind += 1;
            }
        }
        for j in lbz..=rbz {
            qw[cind] = ebpts[j];
            cind += 1;
        }

        if b < m {
            let r_us = r.max(0) as usize;
            bpts[..r_us].copy_from_slice(&next_bpts[..r_us]);
            for j in r_us..=p {
                bpts[j] = ctrl[b - p + j];
            }
            a = b;
            b += 1;
            ua = ub;
        } else {
            for i in 0..=ph {
                uh[kind + i] = ub;
            }
        }
    }

    NurbsCurve::new(ph, uh, qw)
}

/// Reduce a Bezier segment from `degree` to `degree - 1`.
///
/// Returns the reduced control points and the closed-form bound on the
/// max deviation (even/odd split per the degree parity).
pub(crate) fn reduce_bezier(degree: usize, bpts: &[Vec4w]) -> (Vec<Vec4w>, f64) {
    let p = degree;
    let r = (p - 1) / 2;
    let mut rbpts = vec![Vec4w::ZERO; p];
    rbpts[0] = bpts[0];
    rbpts[p - 1] = bpts[p];

    if p % 2 == 0 {
        for i in 1..=r {
            let alfi = i as f64 / p as f64;
            rbpts[i] = (bpts[i] - rbpts[i - 1] * alfi) / (1.0 - alfi);
        }
        for i in ((r + 1)..=(p - 2)).rev() {
            let alfi = (i + 1) as f64 / p as f64;
            rbpts[i] = (bpts[i + 1] - rbpts[i + 1] * (1.0 - alfi)) / alfi;
        }
        let mid = (rbpts[r] + rbpts[r + 1]) * 0.5;
        let error = bpts[r + 1].distance_to(&mid);
        (rbpts, error)
    } else {
        for i in 1..r {
            let alfi = i as f64 / p as f64;
            rbpts[i] = (bpts[i] - rbpts[i - 1] * alfi) / (1.0 - alfi);
        }
        for i in ((r + 1)..=(p - 2)).rev() {
            let alfi = (i + 1) as f64 / p as f64;
            rbpts[i] = (bpts[i + 1] - rbpts[i + 1] * (1.0 - alfi)) / alfi;
        }
        let alfr = r as f64 / p as f64;
        let left = (bpts[r] - rbpts[r - 1] * alfr) / (1.0 - alfr);
        let alfr1 = (r + 1) as f64 / p as f64;
        let right = (bpts[r + 1] - rbpts[r + 1] * (1.0 - alfr1)) / alfr1;
        rbpts[r] = (left + right) * 0.5;
        let error = 0.5 * left.distance_to(&right);
        (rbpts, error)
    }
}

/// Lower the degree by one if every knot span stays within the
/// data-dependent tolerance; otherwise fail and leave the input untouched.
pub fn reduce_degree(curve: &NurbsCurve) -> Result<NurbsCurve, NurbsError> {
    validation::check_curve(curve.degree(), curve.knots(), curve.control_points())?;

    let p = curve.degree();
    if p < 2 {
        return Err(NurbsError::InvalidDegree { got: p, min: 2 });
    }
    let knots = curve.knots();
    let ctrl = curve.control_points();
    let n = ctrl.len() - 1;
    let m = n + p + 1;
    let tol = validation::curve_modify_tolerance(ctrl);
    let ph = p - 1;

    let interior = distinct_interior_knots(p, knots);
    let new_ctrl_len = (n + 1) - (interior + 1);
    let new_knot_len = (m + 1) - (interior + 2);
    let mut qw = vec![Vec4w::ZERO; new_ctrl_len];
    let mut uh = vec![0.0; new_knot_len];

    let mut kind = ph + 1;
    let mut r: isize = -1;
    let mut a = p;
    let mut b = p + 1;
    let mut cind = 1usize;

    qw[0] = ctrl[0];
    for knot in uh.iter_mut().take(ph + 1) {
        *knot = knots[0];
    }

    let mut bpts: Vec<Vec4w> = ctrl[..=p].to_vec();
    let mut next_bpts = vec![Vec4w::ZERO; p.saturating_sub(1)];
    let mut errors = vec![0.0; m + 1];

    while b < m {
        let seg_start = b;
        while b < m && math::almost_equal(knots[b], knots[b + 1]) {
            b += 1;
        }
        let mult = b - seg_start + 1;
        let oldr = r;
        r = p as isize - mult as isize;
        let lbz = if oldr > 0 { ((oldr + 2) / 2) as usize } else { 1 };

        if r > 0 {
            let numer = knots[b] - knots[a];
            let mut alphas = vec![0.0; p - mult];
            for k in ((mult + 1)..=p).rev() {
                alphas[k - mult - 1] = numer / (knots[a + k] - knots[a]);
            }
            for j in 1..=(r as usize) {
                let save = r as usize - j;
                let s = mult + j;
                for k in (s..=p).rev() {
                    bpts[k] = bpts[k] * alphas[k - s] + bpts[k - 1] * (1.0 - alphas[k - s]);
                }
                next_bpts[save] = bpts[p];
            }
        }

        let (mut rbpts, max_err) = reduce_bezier(p, &bpts);
        errors[a] += max_err;
        if errors[a] > tol {
            return Err(NurbsError::ToleranceNotMet(format!(
                "degree reduction error {} at knot index {}",
                errors[a], a
            )));
        }

        if oldr > 0 {
            // Remove the decomposition knot at U[a] oldr times, folding the
            // merged control points back together and tracking the bound.
            let mut lo = kind as isize;
            let mut hi = kind as isize;
            let mut sweep_end = lo;
            for k in 0..oldr {
                let mut i = lo;
                let mut j = hi;
                let mut kj = j - kind as isize;
                while j - i > k {
                    let alfa =
                        (knots[a] - uh[(i - 1) as usize]) / (knots[b] - uh[(i - 1) as usize]);
                    let beta = (knots[a] - uh[(j - k - 1) as usize])
                        / (knots[b] - uh[(j - k - 1) as usize]);
                    qw[(i - 1) as usize] =
                        (qw[(i - 1) as usize] - qw[(i - 2) as usize] * (1.0 - alfa)) / alfa;
                    rbpts[kj as usize] =
                        (rbpts[kj as usize] - rbpts[(kj + 1) as usize] * beta) / (1.0 - beta);
                    i += 1;
                    j -= 1;
                    kj -= 1;
                }

                let br = if j - i < k {
                    qw[(i - 2) as usize].distance_to(&rbpts[(kj + 1) as usize])
                } else {
                    let delta =
                        (knots[a] - uh[(i - 1) as usize]) / (knots[b] - uh[(i - 1) as usize]);
                    let blend =
                        rbpts[(kj + 1) as usize] * delta + qw[(i - 2) as usize] * (1.0 - delta);
                    qw[(i - 1) as usize].distance_to(&blend)
                };

                let affected_end = a + oldr as usize - k as usize;
                let q = (2 * p - k as usize + 1) / 2;
                for ii in (affected_end - q)..=a {
                    errors[ii] += br;
                    if errors[ii] > tol {
                        return Err(NurbsError::ToleranceNotMet(format!(
                            "knot removal error {} at span {}",
                            errors[ii], ii
                        )));
                    }
                }
                sweep_end = i;
                lo -= 1;
                hi += 1;
            }
            cind = (sweep_end - 1) as usize;
        }

        if a != p {
            let fill = (ph as isize - oldr) as usize;
            for _ in 0..fill {
                uh[kind] = knots[a];
                kind += 1;
            }
        }
        for point in rbpts.iter().take(ph + 1).skip(lbz) {
            qw[cind] = *point;
            cind += 1;
        }

        if b < m {
            let r_us = r.max(0) as usize;
            bpts[..r_us].copy_from_slice(&next_bpts[..r_us]);
            for j in r_us..=p {
                bpts[j] = ctrl[b - p + j];
            }
            a = b;
            b += 1;
        } else {
            for i in 0..=ph {
                uh[kind + i] = knots[b];
            }
        }
    }

    NurbsCurve::new(ph, uh, qw)
}
