use serde::{Deserialize, Serialize};
use std::ops::{Add, Div, Mul, Sub};

use super::vector::Vec3;

/// A weighted control point in homogeneous coordinates.
///
/// Stores `(x, y, z, w)` where the Euclidean point is `(x/w, y/w, z/w)`.
/// Arithmetic is componentwise on all four coordinates, which lets the
/// B-spline routines run non-rationally in 4D; a single division at the
/// end recovers the rational result.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec4w {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Vec4w {
    pub const ZERO: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        w: 0.0,
    };

    pub fn new(x: f64, y: f64, z: f64, w: f64) -> Self {
        Self { x, y, z, w }
    }

    /// Lift a Euclidean point with the given weight: `(p*w, w)`.
    pub fn from_point(p: Vec3, w: f64) -> Self {
        Self {
            x: p.x * w,
            y: p.y * w,
            z: p.z * w,
            w,
        }
    }

    /// The Euclidean point `(x/w, y/w, z/w)`.
    pub fn project(&self) -> Vec3 {
        Vec3::new(self.x / self.w, self.y / self.w, self.z / self.w)
    }

    /// The first three coordinates without dividing by the weight.
    pub fn truncate(&self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }

    /// Distance in homogeneous 4D space.
    pub fn distance_to(&self, other: &Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        let dw = self.w - other.w;
        (dx * dx + dy * dy + dz * dz + dw * dw).sqrt()
    }
}

impl Add for Vec4w {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self::new(
            self.x + rhs.x,
            self.y + rhs.y,
            self.z + rhs.z,
            self.w + rhs.w,
        )
    }
}

impl Sub for Vec4w {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Self::new(
            self.x - rhs.x,
            self.y - rhs.y,
            self.z - rhs.z,
            self.w - rhs.w,
        )
    }
}

impl Mul<f64> for Vec4w {
    type Output = Self;
    fn mul(self, rhs: f64) -> Self::Output {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs, self.w * rhs)
    }
}

impl Mul<Vec4w> for f64 {
    type Output = Vec4w;
    fn mul(self, rhs: Vec4w) -> Self::Output {
        rhs * self
    }
}

impl Div<f64> for Vec4w {
    type Output = Self;
    fn div(self, rhs: f64) -> Self::Output {
        Self::new(self.x / rhs, self.y / rhs, self.z / rhs, self.w / rhs)
    }
}
