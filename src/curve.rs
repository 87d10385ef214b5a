use serde::{Deserialize, Serialize};

use crate::bspline;
use crate::geometry::homogeneous::Vec4w;
use crate::geometry::vector::Vec3;
use crate::math;
use crate::validation::{self, NurbsError};

/// A NURBS curve: degree, knot vector, and weighted control points.
///
/// The invariant `knots.len() == control_points.len() + degree + 1` holds
/// for every constructed value; operations that modify the curve return a
/// fresh one rather than mutating in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NurbsCurve {
    degree: usize,
    knots: Vec<f64>,
    control_points: Vec<Vec4w>,
}

impl NurbsCurve {
    pub fn new(
        degree: usize,
        knots: Vec<f64>,
        control_points: Vec<Vec4w>,
    ) -> Result<Self, NurbsError> {
        validation::check_curve(degree, &knots, &control_points)?;
        Ok(Self {
            degree,
            knots,
            control_points,
        })
    }

    /// Build a curve from Euclidean points, all with weight one.
    pub fn from_points(
        degree: usize,
        knots: Vec<f64>,
        points: &[Vec3],
    ) -> Result<Self, NurbsError> {
        let control_points = points.iter().map(|p| Vec4w::from_point(*p, 1.0)).collect();
        Self::new(degree, knots, control_points)
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn knots(&self) -> &[f64] {
        &self.knots
    }

    pub fn control_points(&self) -> &[Vec4w] {
        &self.control_points
    }

    /// Parameter domain `[knots[p], knots[n+1]]`.
    pub fn domain(&self) -> (f64, f64) {
        (
            self.knots[self.degree],
            self.knots[self.knots.len() - self.degree - 1],
        )
    }

    /// True when the first and last control points coincide.
    pub fn is_closed(&self) -> bool {
        validation::is_closed(&self.control_points)
    }

    /// Evaluate the curve point at `t`.
    pub fn point_at(&self, t: f64) -> Result<Vec3, NurbsError> {
        validation::check_parameter(t, &self.knots)?;
        let homogeneous = bspline::point_on_curve(self.degree, &self.knots, t, &self.control_points);
        Ok(homogeneous.project())
    }

    /// Rational derivatives `C^(k)(t)` for `k = 0..=order`.
    ///
    /// The 4D derivatives split into numerator and weight parts; the
    /// rational recurrence
    /// `D^(k) = (A^(k) - sum C(k,i) w^(i) D^(k-i)) / w^(0)`
    /// recovers the Euclidean derivatives.
    pub fn derivatives(&self, t: f64, order: usize) -> Result<Vec<Vec3>, NurbsError> {
        validation::check_parameter(t, &self.knots)?;

        let ders = bspline::derivatives(self.degree, order, &self.knots, t, &self.control_points);
        let a_ders: Vec<Vec3> = ders.iter().map(|d| d.truncate()).collect();
        let w_ders: Vec<f64> = ders.iter().map(|d| d.w).collect();

        let mut result = vec![Vec3::ZERO; order + 1];
        for k in 0..=order {
            let mut v = a_ders[k];
            for i in 1..=k {
                v = v - result[k - i] * (math::binomial(k, i) * w_ders[i]);
            }
            result[k] = v / w_ders[0];
        }
        Ok(result)
    }

    /// The same curve traversed in the opposite direction.
    ///
    /// The reversed knot vector preserves the original span lengths so the
    /// parameter domain is unchanged.
    pub fn reverse(&self) -> Self {
        let size = self.knots.len();
        let mut knots = vec![0.0; size];
        knots[0] = self.knots[0];
        for i in 1..size {
            knots[i] = knots[i - 1] + (self.knots[size - i] - self.knots[size - i - 1]);
        }

        let mut control_points = self.control_points.clone();
        control_points.reverse();

        Self {
            degree: self.degree,
            knots,
            control_points,
        }
    }
}
