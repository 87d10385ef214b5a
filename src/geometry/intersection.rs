use super::vector::Vec3;
use crate::Tolerance;

/// Result of intersecting two rays in 3D.
///
/// Parameters are measured in units of the given direction vectors, which
/// are deliberately not normalized: conic construction feeds chord and
/// tangent vectors here and reads the parameters back in those units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RayRayIntersection {
    Intersecting { t0: f64, t1: f64, point: Vec3 },
    Parallel,
    Coincident,
    Skew,
}

/// Intersect the rays `origin0 + t0*dir0` and `origin1 + t1*dir1`.
///
/// Finds the closest points of the two carrier lines; the rays intersect
/// when those points coincide within the distance tolerance.
pub fn intersect_rays(origin0: &Vec3, dir0: &Vec3, origin1: &Vec3, dir1: &Vec3) -> RayRayIntersection {
    let tol = Tolerance::default();

    let w = *origin0 - *origin1;
    let a = dir0.dot(dir0);
    let b = dir0.dot(dir1);
    let c = dir1.dot(dir1);
    let d = dir0.dot(&w);
    let e = dir1.dot(&w);

    // denom = |dir0 x dir1|^2, zero exactly when the lines are parallel
    let denom = a * c - b * b;
    if denom.abs() < 1e-12 * (a * c).max(1e-30) {
        let offset = *origin1 - *origin0;
        if offset.is_zero()
            || offset.cross(dir0).length() < tol.distance * offset.length() * dir0.length().max(1e-15)
        {
            return RayRayIntersection::Coincident;
        }
        return RayRayIntersection::Parallel;
    }

    let t0 = (b * e - c * d) / denom;
    let t1 = (a * e - b * d) / denom;

    let p0 = *origin0 + *dir0 * t0;
    let p1 = *origin1 + *dir1 * t1;
    if p0.distance_to(&p1) < tol.distance {
        RayRayIntersection::Intersecting { t0, t1, point: p0 }
    } else {
        RayRayIntersection::Skew
    }
}
