//! Dense linear algebra used by interpolation and approximation.
//!
//! Small row-major matrices, LU factorization with partial pivoting, and
//! right-hand sides whose columns are `Vec3` coordinates.

use crate::geometry::vector::Vec3;
use crate::validation::NurbsError;

/// LU factorization `P*A = L*U` of a square matrix.
#[derive(Debug, Clone)]
pub struct LuFactor {
    lu: Vec<Vec<f64>>,
    pivots: Vec<usize>,
}

/// Factor a square matrix; fails on a (numerically) singular input.
pub fn lu_factor(mut matrix: Vec<Vec<f64>>) -> Result<LuFactor, NurbsError> {
    let n = matrix.len();
    let mut pivots = vec![0; n];

    for k in 0..n {
        let mut pivot_row = k;
        let mut pivot_value = matrix[k][k].abs();
        for i in (k + 1)..n {
            if matrix[i][k].abs() > pivot_value {
                pivot_value = matrix[i][k].abs();
                pivot_row = i;
            }
        }
        if pivot_value < 1e-13 {
            return Err(NurbsError::SingularMatrix);
        }
        pivots[k] = pivot_row;
        matrix.swap(k, pivot_row);

        for i in (k + 1)..n {
            let factor = matrix[i][k] / matrix[k][k];
            matrix[i][k] = factor;
            for j in (k + 1)..n {
                matrix[i][j] -= factor * matrix[k][j];
            }
        }
    }

    Ok(LuFactor { lu: matrix, pivots })
}

impl LuFactor {
    pub fn size(&self) -> usize {
        self.lu.len()
    }

    /// Solve `A*x = b` for a scalar right-hand side.
    pub fn solve(&self, b: &[f64]) -> Vec<f64> {
        let n = self.lu.len();
        let mut x = b.to_vec();

        for k in 0..n {
            x.swap(k, self.pivots[k]);
        }
        // forward substitution with the unit lower triangle
        for i in 1..n {
            for j in 0..i {
                x[i] = x[i] - self.lu[i][j] * x[j];
            }
        }
        // back substitution
        for i in (0..n).rev() {
            for j in (i + 1)..n {
                x[i] = x[i] - self.lu[i][j] * x[j];
            }
            x[i] /= self.lu[i][i];
        }
        x
    }

    /// Solve `A*X = B` where the right-hand side columns are x, y, z.
    pub fn solve_points(&self, b: &[Vec3]) -> Vec<Vec3> {
        let xs = self.solve(&b.iter().map(|p| p.x).collect::<Vec<_>>());
        let ys = self.solve(&b.iter().map(|p| p.y).collect::<Vec<_>>());
        let zs = self.solve(&b.iter().map(|p| p.z).collect::<Vec<_>>());
        (0..b.len()).map(|i| Vec3::new(xs[i], ys[i], zs[i])).collect()
    }
}

pub fn transpose(matrix: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let rows = matrix.len();
    let cols = matrix[0].len();
    let mut result = vec![vec![0.0; rows]; cols];
    for i in 0..rows {
        for j in 0..cols {
            result[j][i] = matrix[i][j];
        }
    }
    result
}

pub fn multiply(a: &[Vec<f64>], b: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let rows = a.len();
    let inner = b.len();
    let cols = b[0].len();
    let mut result = vec![vec![0.0; cols]; rows];
    for i in 0..rows {
        for k in 0..inner {
            let aik = a[i][k];
            for j in 0..cols {
                result[i][j] += aik * b[k][j];
            }
        }
    }
    result
}

/// Multiply a matrix by a column of points.
pub fn multiply_points(matrix: &[Vec<f64>], points: &[Vec3]) -> Vec<Vec3> {
    matrix
        .iter()
        .map(|row| {
            let mut acc = Vec3::ZERO;
            for (j, &value) in row.iter().enumerate() {
                acc = acc + points[j] * value;
            }
            acc
        })
        .collect()
}

/// Invert a square matrix by solving against the identity columns.
pub fn inverse(matrix: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, NurbsError> {
    let n = matrix.len();
    let factor = lu_factor(matrix.to_vec())?;
    let mut result = vec![vec![0.0; n]; n];
    for col in 0..n {
        let mut e = vec![0.0; n];
        e[col] = 1.0;
        let x = factor.solve(&e);
        for row in 0..n {
            result[row][col] = x[row];
        }
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lu_solve() {
        let a = vec![
            vec![2.0, 1.0, 1.0],
            vec![4.0, -6.0, 0.0],
            vec![-2.0, 7.0, 2.0],
        ];
        let factor = lu_factor(a).unwrap();
        let x = factor.solve(&[5.0, -2.0, 9.0]);
        assert!((x[0] - 1.0).abs() < 1e-10);
        assert!((x[1] - 1.0).abs() < 1e-10);
        assert!((x[2] - 2.0).abs() < 1e-10);
    }

    #[test]
    fn test_lu_requires_pivoting() {
        let a = vec![vec![0.0, 1.0], vec![1.0, 0.0]];
        let factor = lu_factor(a).unwrap();
        let x = factor.solve(&[3.0, 7.0]);
        assert!((x[0] - 7.0).abs() < 1e-12);
        assert!((x[1] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_singular_matrix_detected() {
        let a = vec![vec![1.0, 2.0], vec![2.0, 4.0]];
        assert!(matches!(lu_factor(a), Err(NurbsError::SingularMatrix)));
    }

    #[test]
    fn test_solve_points_by_column() {
        let a = vec![vec![2.0, 0.0], vec![0.0, 4.0]];
        let factor = lu_factor(a).unwrap();
        let b = vec![Vec3::new(2.0, 4.0, 6.0), Vec3::new(4.0, 8.0, 12.0)];
        let x = factor.solve_points(&b);
        assert!(x[0].is_almost_equal_to(&Vec3::new(1.0, 2.0, 3.0), 1e-12));
        assert!(x[1].is_almost_equal_to(&Vec3::new(1.0, 2.0, 3.0), 1e-12));
    }

    #[test]
    fn test_inverse_times_original_is_identity() {
        let a = vec![
            vec![4.0, 7.0, 2.0],
            vec![2.0, 6.0, 1.0],
            vec![1.0, 3.0, 9.0],
        ];
        let inv = inverse(&a).unwrap();
        let product = multiply(&a, &inv);
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((product[i][j] - expected).abs() < 1e-10);
            }
        }
    }

    #[test]
    fn test_transpose_and_multiply_shapes() {
        let a = vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]];
        let at = transpose(&a);
        assert_eq!(at.len(), 3);
        assert_eq!(at[0].len(), 2);
        let ata = multiply(&at, &a);
        assert_eq!(ata.len(), 3);
        assert!((ata[0][0] - 17.0).abs() < 1e-12);
    }
}
