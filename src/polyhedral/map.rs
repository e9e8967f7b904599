//! Affine maps for statement schedules.

use crate::polyhedral::space::Space;
use crate::polyhedral::expr::AffineExpr;
use crate::polyhedral::constraint::Constraint;
use crate::polyhedral::set::IntegerSet;
use serde::{Serialize, Deserialize};
use std::fmt;

/// An affine map from one space to another.
///
/// For a schedule, each output is one hyperplane (schedule row) expressed
/// over the statement iterators and the program parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffineMap {
    pub space: Space,
    /// Output expressions (one per output dimension)
    pub outputs: Vec<AffineExpr>,
}

impl AffineMap {
    /// Create an identity map of given dimension.
    pub fn identity(n_dim: usize, n_param: usize) -> Self {
        let outputs = (0..n_dim)
            .map(|i| AffineExpr::var(i, n_dim, n_param))
            .collect();
        Self::from_outputs(n_dim, n_param, outputs)
    }

    /// Create from output expressions.
    pub fn from_outputs(n_in: usize, n_param: usize, outputs: Vec<AffineExpr>) -> Self {
        Self {
            space: Space::map_with_params(n_in, outputs.len(), n_param),
            outputs,
        }
    }

    /// Create from a transformation matrix.
    ///
    /// Each row holds the iterator coefficients, then the parameter
    /// coefficients, then the constant.
    pub fn from_matrix(n_in: usize, n_param: usize, rows: &[Vec<i64>]) -> Self {
        let outputs = rows.iter()
            .map(|row| AffineExpr::from_row(row, n_in, n_param))
            .collect();
        Self::from_outputs(n_in, n_param, outputs)
    }

    /// Get input dimensions.
    pub fn n_in(&self) -> usize { self.space.n_in }

    /// Get output dimensions.
    pub fn n_out(&self) -> usize { self.outputs.len() }

    /// Get number of parameters.
    pub fn n_param(&self) -> usize { self.space.n_param }

    /// Whether output `row` is constant with respect to the input dimensions.
    ///
    /// Rows past the end count as scalar.
    pub fn is_row_scalar(&self, row: usize) -> bool {
        self.outputs.get(row).map_or(true, |e| e.is_dim_free())
    }

    /// Express the map as a relation `{ [out.., in..] : out_k - f_k(in) = 0 }`.
    ///
    /// The output dimensions come first, as expected by scattering-function consumers.
    pub fn to_relation(&self) -> IntegerSet {
        let n_out = self.n_out();
        let n_in = self.n_in();
        let n_param = self.n_param();
        let n_dim = n_out + n_in;

        let mut rel = IntegerSet::from_space(Space::set_with_params(n_dim, n_param));
        for (k, f) in self.outputs.iter().enumerate() {
            let mut expr = AffineExpr::zero(n_dim, n_param);
            expr.set_coeff(k, 1);
            for (j, &c) in f.coeffs.iter().enumerate() {
                expr.set_coeff(n_out + j, -c);
            }
            for (p, &c) in f.param_coeffs.iter().enumerate() {
                expr.set_param_coeff(p, -c);
            }
            expr.constant = -f.constant;
            rel.add_constraint(Constraint::eq_zero(expr));
        }
        rel
    }
}

impl fmt::Display for AffineMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dim_names: Vec<String> = (0..self.n_in()).map(|i| format!("i{}", i)).collect();
        write!(f, "{{ [{}] -> [", dim_names.join(", "))?;
        for (i, expr) in self.outputs.iter().enumerate() {
            if i > 0 { write!(f, ", ")?; }
            write!(f, "{}", expr.to_string_with_names(&dim_names, &self.space.param_names))?;
        }
        write!(f, "] }}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity() {
        let map = AffineMap::identity(3, 0);
        assert_eq!(map.n_out(), 3);
        assert!(!map.is_row_scalar(0));
    }

    #[test]
    fn test_from_matrix_with_scalar_rows() {
        // (i, j) -> (0, j, i + 1)
        let map = AffineMap::from_matrix(2, 0, &[
            vec![0, 0, 0],
            vec![0, 1, 0],
            vec![1, 0, 1],
        ]);
        assert_eq!(map.n_out(), 3);
        assert!(map.is_row_scalar(0));
        assert!(!map.is_row_scalar(1));
        assert_eq!(map.outputs[2].evaluate(&[4, 7], &[]), 5);
    }

    #[test]
    fn test_to_relation() {
        // i -> (i + N)
        let map = AffineMap::from_matrix(1, 1, &[vec![1, 1, 0]]);
        let rel = map.to_relation();
        assert_eq!(rel.dim(), 2);
        // t = 7, i = 2, N = 5
        assert!(rel.contains(&[7, 2], &[5]));
        assert!(!rel.contains(&[6, 2], &[5]));
        let mut out = String::new();
        rel.constraints.write_polylib(&mut out).unwrap();
        assert_eq!(out, "1 5\n0 1 -1 -1 0\n");
    }
}
