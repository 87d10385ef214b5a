//! Parameterization and knot-vector synthesis for curve fitting.

use crate::geometry::vector::Vec3;

/// Total length of the polyline through the points.
pub fn total_chord_length(points: &[Vec3]) -> f64 {
    points.windows(2).map(|w| w[0].distance_to(&w[1])).sum()
}

/// Chord-length parameters: `u_0 = 0`, `u_n = 1`, interior spacing
/// proportional to the chord between consecutive points.
pub fn chord_parameterization(points: &[Vec3]) -> Vec<f64> {
    let n = points.len();
    let total = total_chord_length(points);
    let mut uk = vec![0.0; n];
    for i in 1..n {
        uk[i] = uk[i - 1] + points[i - 1].distance_to(&points[i]) / total;
    }
    uk[n - 1] = 1.0;
    uk
}

/// Clamped knot vector for interpolation, interior knots by averaging:
/// `U[j+p] = mean(uk[j..j+p])`.
pub fn interpolation_knot_vector(degree: usize, uk: &[f64]) -> Vec<f64> {
    let p = degree;
    let n = uk.len() - 1;
    let mut knots = vec![0.0; n + p + 2];
    for j in 1..=(n - p) {
        let sum: f64 = uk[j..(j + p)].iter().sum();
        knots[j + p] = sum / p as f64;
    }
    for k in 0..=p {
        knots[n + 1 + k] = 1.0;
    }
    knots
}

/// Clamped knot vector for least-squares approximation with
/// `control_count` control points over `uk.len()` parameters.
pub fn approximation_knot_vector(degree: usize, control_count: usize, uk: &[f64]) -> Vec<f64> {
    let p = degree;
    let n = control_count - 1;
    let m = uk.len() - 1;
    let mut knots = vec![0.0; n + p + 2];

    let d = (m + 1) as f64 / (n - p + 1) as f64;
    for j in 1..=(n - p) {
        let jd = j as f64 * d;
        let i = jd.floor() as usize;
        let alpha = jd - i as f64;
        knots[p + j] = (1.0 - alpha) * uk[i - 1] + alpha * uk[i];
    }
    for k in 0..=p {
        knots[n + 1 + k] = 1.0;
    }
    knots
}

/// Knot vector for interpolation with tangent constraints.
///
/// Each constrained parameter is duplicated in the averaging multiset so
/// the system gains one control point per tangent row.
pub fn tangent_knot_vector(degree: usize, uk: &[f64], tangent_indices: &[usize]) -> Vec<f64> {
    let mut merged = Vec::with_capacity(uk.len() + tangent_indices.len());
    for (i, &u) in uk.iter().enumerate() {
        merged.push(u);
        if tangent_indices.contains(&i) {
            merged.push(u);
        }
    }
    interpolation_knot_vector(degree, &merged)
}

/// Estimate a unit tangent at every point by the five-point heuristic,
/// reflecting the chord differences at the ends.
///
/// Returns `None` when a tangent degenerates (coincident points).
pub fn compute_tangents(points: &[Vec3]) -> Option<Vec<Vec3>> {
    if points.len() < 2 {
        return None;
    }
    let n = points.len() - 1;

    // ext[i] holds q_{i-2}; q_k = Q_k - Q_{k-1} with reflected extensions.
    let mut ext = vec![Vec3::ZERO; n + 5];
    for k in 1..=n {
        ext[k + 2] = points[k] - points[k - 1];
    }
    if n >= 2 {
        ext[2] = ext[3] * 2.0 - ext[4];
    } else {
        ext[2] = ext[3];
    }
    ext[1] = ext[2] * 2.0 - ext[3];
    ext[n + 3] = ext[n + 2] * 2.0 - ext[n + 1];
    ext[n + 4] = ext[n + 3] * 2.0 - ext[n + 2];

    let mut tangents = Vec::with_capacity(n + 1);
    for k in 0..=n {
        let prev = ext[k + 1].cross(&ext[k + 2]).length();
        let next = ext[k + 3].cross(&ext[k + 4]).length();
        // alpha blends the two neighboring chords; collinear data uses 1/2.
        let denom = prev + next;
        let alpha = if denom < 1e-15 { 0.5 } else { prev / denom };
        let v = ext[k + 2] * (1.0 - alpha) + ext[k + 3] * alpha;
        tangents.push(v.normalized()?);
    }
    Some(tangents)
}
