//! Shared parameter storage for asynchronous SGD.
//!
//! Rows are updated by many workers at once without locking. Each component
//! is an `AtomicU64` holding `f64` bits accessed with relaxed ordering, so a
//! read-modify-write may lose a concurrent update. Training tolerates those
//! lost updates because rows touched by different workers rarely overlap.

use std::sync::atomic::{AtomicU64, Ordering};

use rand::Rng;
use rand_distr::{Distribution, Uniform};

use crate::Word2VecError;

pub struct Matrix {
    data: Box<[AtomicU64]>,
    rows: usize,
    cols: usize,
}

impl Matrix {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        let data = (0..rows * cols)
            .map(|_| AtomicU64::new(0.0f64.to_bits()))
            .collect();
        Self { data, rows, cols }
    }

    /// Each component drawn from `U(-0.5/cols, 0.5/cols)`.
    pub fn random<R: Rng + ?Sized>(
        rows: usize,
        cols: usize,
        rng: &mut R,
    ) -> Result<Self, Word2VecError> {
        let bound = 0.5 / cols as f64;
        let uniform = Uniform::new(-bound, bound)
            .map_err(|_| Word2VecError::InvalidConfiguration("matrix needs at least one column"))?;
        let data = (0..rows * cols)
            .map(|_| AtomicU64::new(uniform.sample(rng).to_bits()))
            .collect();
        Ok(Self { data, rows, cols })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    fn cells(&self, row: usize) -> &[AtomicU64] {
        let start = row * self.cols;
        &self.data[start..start + self.cols]
    }

    pub fn row(&self, row: usize) -> Vec<f64> {
        self.cells(row).iter().map(load).collect()
    }

    pub fn read_row_into(&self, row: usize, out: &mut [f64]) {
        for (o, cell) in out.iter_mut().zip(self.cells(row)) {
            *o = load(cell);
        }
    }

    pub fn dot(&self, row: usize, v: &[f64]) -> f64 {
        self.cells(row).iter().zip(v).map(|(c, x)| load(c) * x).sum()
    }

    /// `row += scale * v`
    pub fn axpy_row(&self, row: usize, scale: f64, v: &[f64]) {
        for (cell, x) in self.cells(row).iter().zip(v) {
            store(cell, load(cell) + scale * x);
        }
    }

    /// `out += scale * row`
    pub fn add_row_to(&self, row: usize, scale: f64, out: &mut [f64]) {
        for (o, cell) in out.iter_mut().zip(self.cells(row)) {
            *o += scale * load(cell);
        }
    }
}

fn load(cell: &AtomicU64) -> f64 {
    f64::from_bits(cell.load(Ordering::Relaxed))
}

fn store(cell: &AtomicU64, value: f64) {
    cell.store(value.to_bits(), Ordering::Relaxed);
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn random_init_is_bounded_by_dimension() {
        let mut rng = StdRng::seed_from_u64(1);
        let m = Matrix::random(20, 4, &mut rng).unwrap();
        for r in 0..m.rows() {
            assert!(m.row(r).iter().all(|v| v.abs() <= 0.125));
        }
        assert!(m.row(0).iter().any(|v| *v != 0.0));
    }

    #[test]
    fn row_arithmetic() {
        let m = Matrix::zeros(2, 3);
        m.axpy_row(1, 2.0, &[1.0, 0.5, -1.0]);
        assert_eq!(m.row(1), vec![2.0, 1.0, -2.0]);
        assert_eq!(m.row(0), vec![0.0; 3]);
        assert_relative_eq!(m.dot(1, &[1.0, 1.0, 1.0]), 1.0);

        let mut out = vec![1.0; 3];
        m.add_row_to(1, 0.5, &mut out);
        assert_eq!(out, vec![2.0, 1.5, 0.0]);
    }

    #[test]
    fn zero_columns_cannot_be_randomised() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(Matrix::random(3, 0, &mut rng).is_err());
    }
}
