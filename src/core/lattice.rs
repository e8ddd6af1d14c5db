use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

/// A 3x3 real Bravais matrix whose *rows* are the lattice vectors `a, b, c`,
/// plus which axes apply periodic boundary conditions. The inverse is
/// computed eagerly at construction since every fractional/Cartesian
/// conversion needs it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lattice {
    pub matrix: Matrix3<f64>,
    inverse: Matrix3<f64>,
    pub pbc: [bool; 3],
}

impl Lattice {
    /// Builds a lattice from row vectors `a`, `b`, `c`. Returns `None` if the
    /// vectors are degenerate (non-invertible matrix).
    pub fn new(a: Vector3<f64>, b: Vector3<f64>, c: Vector3<f64>, pbc: [bool; 3]) -> Option<Self> {
        let matrix = Matrix3::from_rows(&[a.transpose(), b.transpose(), c.transpose()]);
        Self::from_matrix(matrix, pbc)
    }

    pub fn from_matrix(matrix: Matrix3<f64>, pbc: [bool; 3]) -> Option<Self> {
        let inverse = matrix.transpose().try_inverse()?;
        Some(Self {
            matrix,
            inverse,
            pbc,
        })
    }

    #[inline]
    pub fn to_cartesian(&self, frac: &Vector3<f64>) -> Vector3<f64> {
        self.matrix.transpose() * frac
    }

    #[inline]
    pub fn to_fractional(&self, cart: &Vector3<f64>) -> Vector3<f64> {
        self.inverse * cart
    }

    pub fn row(&self, i: usize) -> Vector3<f64> {
        self.matrix.row(i).transpose()
    }
}
