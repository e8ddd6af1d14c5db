use serde::{Deserialize, Serialize};

/// A flattened row-major `n x n` matrix. Access is O(1) via `index = i * n + j`.
/// Used for any square per-site or per-species grid (distance matrix,
/// shell-index matrix).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid2<T> {
    n: usize,
    data: Vec<T>,
}

impl<T: Clone + Default> Grid2<T> {
    pub fn filled(n: usize, value: T) -> Self {
        Self {
            n,
            data: vec![value; n * n],
        }
    }

    pub fn zeros(n: usize) -> Self {
        Self::filled(n, T::default())
    }
}

impl<T> Grid2<T> {
    pub fn from_vec(n: usize, data: Vec<T>) -> Self {
        assert_eq!(data.len(), n * n, "Grid2 data length must equal n*n");
        Self { n, data }
    }

    #[inline(always)]
    pub fn n(&self) -> usize {
        self.n
    }

    #[inline(always)]
    pub fn get(&self, i: usize, j: usize) -> &T {
        &self.data[i * self.n + j]
    }

    #[inline(always)]
    pub fn set(&mut self, i: usize, j: usize, value: T) {
        self.data[i * self.n + j] = value;
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn row(&self, i: usize) -> &[T] {
        &self.data[i * self.n..(i + 1) * self.n]
    }
}

/// A flattened row-major `m x s x s` tensor (shells x species x species).
///
/// Same flattening idiom as [`Grid2`], extended to the three-axis tensors
/// (bond counts, SRO, prefactors, pair-weights, target objective), each
/// shaped `[M][S][S]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid3<T> {
    m: usize,
    s: usize,
    data: Vec<T>,
}

impl<T: Clone + Default> Grid3<T> {
    pub fn zeros(m: usize, s: usize) -> Self {
        Self {
            m,
            s,
            data: vec![T::default(); m * s * s],
        }
    }
}

impl<T: Clone> Grid3<T> {
    pub fn filled(m: usize, s: usize, value: T) -> Self {
        Self {
            m,
            s,
            data: vec![value; m * s * s],
        }
    }
}

impl<T> Grid3<T> {
    pub fn from_vec(m: usize, s: usize, data: Vec<T>) -> Self {
        assert_eq!(data.len(), m * s * s, "Grid3 data length must equal m*s*s");
        Self { m, s, data }
    }

    #[inline(always)]
    pub fn shape(&self) -> (usize, usize) {
        (self.m, self.s)
    }

    #[inline(always)]
    fn index(&self, shell: usize, a: usize, b: usize) -> usize {
        (shell * self.s + a) * self.s + b
    }

    #[inline(always)]
    pub fn get(&self, shell: usize, a: usize, b: usize) -> &T {
        &self.data[self.index(shell, a, b)]
    }

    #[inline(always)]
    pub fn get_mut(&mut self, shell: usize, a: usize, b: usize) -> &mut T {
        let idx = self.index(shell, a, b);
        &mut self.data[idx]
    }

    #[inline(always)]
    pub fn set(&mut self, shell: usize, a: usize, b: usize, value: T) {
        let idx = self.index(shell, a, b);
        self.data[idx] = value;
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_slice_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn iter_cells(&self) -> impl Iterator<Item = (usize, usize, usize, &T)> {
        let s = self.s;
        self.data.iter().enumerate().map(move |(idx, v)| {
            let b = idx % s;
            let a = (idx / s) % s;
            let shell = idx / (s * s);
            (shell, a, b, v)
        })
    }
}
