//! Exact rational matrices.
//!
//! The scanner inverts the iterator part of each schedule to express the
//! original iterators in terms of the scattering dimensions; rational
//! entries keep that exact for non-unimodular schedules.

use num_rational::Rational64;
use num_traits::{One, Signed, Zero};
use std::fmt;

/// A dense matrix with rational entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RationalMatrix {
    data: Vec<Vec<Rational64>>,
    rows: usize,
    cols: usize,
}

impl RationalMatrix {
    /// Create a matrix from integer rows.
    pub fn from_vec(data: Vec<Vec<i64>>) -> Self {
        let rows = data.len();
        let cols = data.first().map_or(0, |r| r.len());
        let data = data
            .into_iter()
            .map(|row| row.into_iter().map(Rational64::from_integer).collect())
            .collect();
        Self { data, rows, cols }
    }

    /// Get an element.
    pub fn get(&self, row: usize, col: usize) -> Option<&Rational64> {
        self.data.get(row)?.get(col)
    }

    /// Inverse by Gauss-Jordan elimination; `None` when not square or singular.
    pub fn inverse(&self) -> Option<Self> {
        if self.rows != self.cols {
            return None;
        }
        let n = self.rows;

        // Augmented matrix [A | I]
        let mut aug: Vec<Vec<Rational64>> = self.data.iter()
            .enumerate()
            .map(|(i, row)| {
                let mut r = row.clone();
                r.extend((0..n).map(|j| if i == j { Rational64::one() } else { Rational64::zero() }));
                r
            })
            .collect();

        for k in 0..n {
            let pivot_row = (k..n).max_by(|&a, &b| aug[a][k].abs().cmp(&aug[b][k].abs()))?;
            aug.swap(k, pivot_row);

            let pivot = aug[k][k];
            if pivot.is_zero() {
                return None;
            }
            for v in aug[k].iter_mut() {
                *v /= pivot;
            }

            let pivot_vals = aug[k].clone();
            for (i, row) in aug.iter_mut().enumerate() {
                if i == k || row[k].is_zero() {
                    continue;
                }
                let factor = row[k];
                for (v, p) in row.iter_mut().zip(&pivot_vals) {
                    *v -= factor * *p;
                }
            }
        }

        Some(Self {
            data: aug.into_iter().map(|row| row[n..].to_vec()).collect(),
            rows: n,
            cols: n,
        })
    }

    /// Rank by row reduction.
    pub fn rank(&self) -> usize {
        let mut m = self.data.clone();
        let mut rank = 0;
        for col in 0..self.cols {
            let Some(pivot) = (rank..self.rows).find(|&r| !m[r][col].is_zero()) else {
                continue;
            };
            m.swap(rank, pivot);
            let pivot_vals = m[rank].clone();
            for row in m.iter_mut().skip(rank + 1) {
                if row[col].is_zero() {
                    continue;
                }
                let factor = row[col] / pivot_vals[col];
                for (v, p) in row.iter_mut().zip(&pivot_vals) {
                    *v -= factor * *p;
                }
            }
            rank += 1;
        }
        rank
    }

    /// Check if all entries are integers.
    pub fn is_integer(&self) -> bool {
        self.data.iter().all(|row| row.iter().all(|r| r.is_integer()))
    }
}

impl fmt::Display for RationalMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in &self.data {
            let cells: Vec<String> = row.iter().map(|v| v.to_string()).collect();
            writeln!(f, "[{}]", cells.join(", "))?;
        }
        Ok(())
    }
}
