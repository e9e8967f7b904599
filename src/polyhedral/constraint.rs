//! Linear constraints for polyhedral representation.
//!
//! A constraint is a linear inequality or equality:
//! - Inequality: expr >= 0
//! - Equality: expr = 0

use crate::polyhedral::expr::AffineExpr;
use serde::{Serialize, Deserialize};
use std::fmt;

/// A linear constraint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Constraint {
    /// The affine expression (constraint is: expr >= 0 or expr = 0)
    pub expr: AffineExpr,
    /// Kind of constraint
    pub kind: ConstraintKind,
}

/// Kind of constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConstraintKind {
    /// Greater than or equal: expr >= 0
    Inequality,
    /// Equal: expr = 0
    Equality,
}

impl Constraint {
    /// Create a new constraint.
    pub fn new(expr: AffineExpr, kind: ConstraintKind) -> Self {
        Self { expr, kind }
    }

    /// Create an inequality constraint: expr >= 0
    pub fn ge_zero(expr: AffineExpr) -> Self {
        Self::new(expr, ConstraintKind::Inequality)
    }

    /// Create an equality constraint: expr = 0
    pub fn eq_zero(expr: AffineExpr) -> Self {
        Self::new(expr, ConstraintKind::Equality)
    }

    /// Create a lower bound constraint: var >= lower
    pub fn lower_bound(dim: usize, lower: i64, n_dim: usize, n_param: usize) -> Self {
        let mut expr = AffineExpr::var(dim, n_dim, n_param);
        expr.constant = -lower;
        Self::ge_zero(expr)
    }

    /// Create a parametric upper bound: var <= param + offset
    pub fn param_upper_bound(
        dim: usize,
        param: usize,
        offset: i64,
        n_dim: usize,
        n_param: usize,
    ) -> Self {
        let mut bound = AffineExpr::param(param, n_dim, n_param);
        bound.constant = offset;
        Self::ge_zero(bound - AffineExpr::var(dim, n_dim, n_param))
    }

    /// Check if this is an equality constraint.
    pub fn is_equality(&self) -> bool {
        matches!(self.kind, ConstraintKind::Equality)
    }

    /// Check if this constraint is satisfied by the given point.
    pub fn is_satisfied(&self, dim_values: &[i64], param_values: &[i64]) -> bool {
        let value = self.expr.evaluate(dim_values, param_values);
        match self.kind {
            ConstraintKind::Inequality => value >= 0,
            ConstraintKind::Equality => value == 0,
        }
    }

    /// Get the number of dimensions.
    pub fn n_dim(&self) -> usize {
        self.expr.n_dim()
    }

    /// Get the number of parameters.
    pub fn n_param(&self) -> usize {
        self.expr.n_param()
    }

    /// Convert to string with given names.
    pub fn to_string_with_names(&self, dim_names: &[String], param_names: &[String]) -> String {
        let expr_str = self.expr.to_string_with_names(dim_names, param_names);
        match self.kind {
            ConstraintKind::Inequality => format!("{} >= 0", expr_str),
            ConstraintKind::Equality => format!("{} = 0", expr_str),
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_string_with_names(&[], &[]))
    }
}

/// A system of constraints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConstraintSystem {
    /// All constraints in the system
    pub constraints: Vec<Constraint>,
    /// Number of dimensions
    pub n_dim: usize,
    /// Number of parameters
    pub n_param: usize,
}

impl ConstraintSystem {
    /// Create an empty constraint system.
    pub fn new(n_dim: usize, n_param: usize) -> Self {
        Self {
            constraints: Vec::new(),
            n_dim,
            n_param,
        }
    }

    /// Add a constraint.
    pub fn add(&mut self, constraint: Constraint) {
        assert_eq!(constraint.n_dim(), self.n_dim);
        assert_eq!(constraint.n_param(), self.n_param);
        self.constraints.push(constraint);
    }

    /// Check if a point satisfies all constraints.
    pub fn is_satisfied(&self, dim_values: &[i64], param_values: &[i64]) -> bool {
        self.constraints.iter().all(|c| c.is_satisfied(dim_values, param_values))
    }

    /// Check if the system is empty (has no constraints).
    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Get the number of constraints.
    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    /// Number of columns in the polylib matrix form: kind flag, dims, params, constant.
    pub fn polylib_cols(&self) -> usize {
        self.n_dim + self.n_param + 2
    }

    /// Write the system as a polylib constraint matrix.
    ///
    /// The header is `<rows> <cols>`; every row starts with `0` for an
    /// equality or `1` for an inequality, followed by the dimension
    /// coefficients, the parameter coefficients and the constant.
    pub fn write_polylib<W: fmt::Write>(&self, out: &mut W) -> fmt::Result {
        writeln!(out, "{} {}", self.len(), self.polylib_cols())?;
        for c in &self.constraints {
            let flag = if c.is_equality() { 0 } else { 1 };
            write!(out, "{}", flag)?;
            for v in c.expr.to_row() {
                write!(out, " {}", v)?;
            }
            writeln!(out)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lower_bound() {
        // i >= 0
        let c = Constraint::lower_bound(0, 0, 2, 0);
        assert!(c.is_satisfied(&[0, 0], &[]));
        assert!(c.is_satisfied(&[5, 0], &[]));
        assert!(!c.is_satisfied(&[-1, 0], &[]));
    }

    #[test]
    fn test_param_upper_bound() {
        // i <= N - 1
        let c = Constraint::param_upper_bound(0, 0, -1, 1, 1);
        assert!(c.is_satisfied(&[9], &[10]));
        assert!(!c.is_satisfied(&[10], &[10]));
    }

    #[test]
    fn test_equality() {
        let mut expr = AffineExpr::var(0, 1, 0);
        expr.constant = -5;
        let c = Constraint::eq_zero(expr);
        assert!(c.is_satisfied(&[5], &[]));
        assert!(!c.is_satisfied(&[4], &[]));
        assert!(c.is_equality());
    }

    #[test]
    fn test_polylib_matrix() {
        let mut sys = ConstraintSystem::new(1, 1);
        sys.add(Constraint::lower_bound(0, 0, 1, 1));
        sys.add(Constraint::param_upper_bound(0, 0, -1, 1, 1));

        let mut out = String::new();
        sys.write_polylib(&mut out).unwrap();
        assert_eq!(out, "2 4\n1 1 0 0\n1 -1 1 -1\n");
    }

    #[test]
    fn test_empty_polylib_matrix() {
        let sys = ConstraintSystem::new(0, 2);
        let mut out = String::new();
        sys.write_polylib(&mut out).unwrap();
        assert_eq!(out, "0 4\n");
    }
}
