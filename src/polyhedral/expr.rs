//! Affine expressions for polyhedral representation.
//!
//! An affine expression is a linear combination of variables plus a constant:
//! `aff(x) = c0 + c1*x1 + c2*x2 + ... + cn*xn`

use num_integer::Integer;
use serde::{Serialize, Deserialize};
use std::fmt;
use std::ops::{Add, Sub, Neg};

/// An affine expression: constant + sum(coeff[i] * var[i]) + sum(param_coeff[j] * param[j])
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AffineExpr {
    /// Constant term
    pub constant: i64,
    /// Coefficients for each dimension (index = dimension index)
    pub coeffs: Vec<i64>,
    /// Coefficients for parameters (index = parameter index)
    pub param_coeffs: Vec<i64>,
}

impl AffineExpr {
    /// Create a zero expression.
    pub fn zero(n_dim: usize, n_param: usize) -> Self {
        Self::constant(0, n_dim, n_param)
    }

    /// Create a constant expression.
    pub fn constant(value: i64, n_dim: usize, n_param: usize) -> Self {
        Self {
            constant: value,
            coeffs: vec![0; n_dim],
            param_coeffs: vec![0; n_param],
        }
    }

    /// Create an expression for a single dimension variable.
    pub fn var(dim: usize, n_dim: usize, n_param: usize) -> Self {
        let mut expr = Self::zero(n_dim, n_param);
        expr.set_coeff(dim, 1);
        expr
    }

    /// Create an expression for a parameter.
    pub fn param(param_idx: usize, n_dim: usize, n_param: usize) -> Self {
        let mut expr = Self::zero(n_dim, n_param);
        expr.set_param_coeff(param_idx, 1);
        expr
    }

    /// Build an expression from a polylib-style row: `[dims.., params.., constant]`.
    pub fn from_row(row: &[i64], n_dim: usize, n_param: usize) -> Self {
        assert_eq!(row.len(), n_dim + n_param + 1, "row width does not match space");
        Self {
            constant: row[n_dim + n_param],
            coeffs: row[..n_dim].to_vec(),
            param_coeffs: row[n_dim..n_dim + n_param].to_vec(),
        }
    }

    /// Flatten to a polylib-style row: `[dims.., params.., constant]`.
    pub fn to_row(&self) -> Vec<i64> {
        let mut row = Vec::with_capacity(self.coeffs.len() + self.param_coeffs.len() + 1);
        row.extend_from_slice(&self.coeffs);
        row.extend_from_slice(&self.param_coeffs);
        row.push(self.constant);
        row
    }

    /// Check if the expression has no dimension and no parameter terms.
    pub fn is_constant(&self) -> bool {
        self.is_dim_free() && self.param_coeffs.iter().all(|&c| c == 0)
    }

    /// Check if the expression does not depend on any dimension variable.
    pub fn is_dim_free(&self) -> bool {
        self.coeffs.iter().all(|&c| c == 0)
    }

    /// Get the constant value if this is a constant expression.
    pub fn as_constant(&self) -> Option<i64> {
        if self.is_constant() {
            Some(self.constant)
        } else {
            None
        }
    }

    /// Get the number of dimensions.
    pub fn n_dim(&self) -> usize {
        self.coeffs.len()
    }

    /// Get the number of parameters.
    pub fn n_param(&self) -> usize {
        self.param_coeffs.len()
    }

    /// Get coefficient for a dimension.
    pub fn coeff(&self, dim: usize) -> i64 {
        self.coeffs.get(dim).copied().unwrap_or(0)
    }

    /// Get coefficient for a parameter.
    pub fn param_coeff(&self, idx: usize) -> i64 {
        self.param_coeffs.get(idx).copied().unwrap_or(0)
    }

    /// Set coefficient for a dimension.
    pub fn set_coeff(&mut self, dim: usize, value: i64) {
        if dim < self.coeffs.len() {
            self.coeffs[dim] = value;
        }
    }

    /// Set coefficient for a parameter.
    pub fn set_param_coeff(&mut self, idx: usize, value: i64) {
        if idx < self.param_coeffs.len() {
            self.param_coeffs[idx] = value;
        }
    }

    /// Evaluate the expression given concrete values.
    pub fn evaluate(&self, dim_values: &[i64], param_values: &[i64]) -> i64 {
        let mut result = self.constant;
        for (i, &c) in self.coeffs.iter().enumerate() {
            if let Some(&v) = dim_values.get(i) {
                result += c * v;
            }
        }
        for (i, &c) in self.param_coeffs.iter().enumerate() {
            if let Some(&v) = param_values.get(i) {
                result += c * v;
            }
        }
        result
    }

    /// Scale the expression by a constant.
    pub fn scale(&self, factor: i64) -> Self {
        Self {
            constant: self.constant * factor,
            coeffs: self.coeffs.iter().map(|&c| c * factor).collect(),
            param_coeffs: self.param_coeffs.iter().map(|&c| c * factor).collect(),
        }
    }

    /// GCD of the variable and parameter coefficients (constant excluded).
    pub fn coeff_gcd(&self) -> i64 {
        let g = self.coeffs.iter()
            .chain(self.param_coeffs.iter())
            .fold(0i64, |g, &c| g.gcd(&c.abs()));
        if g == 0 { 1 } else { g }
    }

    /// Tighten `self >= 0` by dividing through by the coefficient GCD.
    ///
    /// The constant is floored, which is exact for integer points.
    pub fn tighten_inequality(&self) -> Self {
        let g = self.coeff_gcd();
        if g <= 1 {
            return self.clone();
        }
        Self {
            constant: Integer::div_floor(&self.constant, &g),
            coeffs: self.coeffs.iter().map(|&c| c / g).collect(),
            param_coeffs: self.param_coeffs.iter().map(|&c| c / g).collect(),
        }
    }

    /// Convert to string with given dimension and parameter names.
    pub fn to_string_with_names(&self, dim_names: &[String], param_names: &[String]) -> String {
        let mut parts = Vec::new();

        let named = |prefix: &str, i: usize, names: &[String]| {
            names.get(i).cloned().unwrap_or_else(|| format!("{}{}", prefix, i))
        };
        let term = |c: i64, name: String| match c {
            1 => name,
            -1 => format!("-{}", name),
            _ => format!("{}*{}", c, name),
        };

        for (i, &c) in self.coeffs.iter().enumerate() {
            if c != 0 {
                parts.push(term(c, named("d", i, dim_names)));
            }
        }
        for (i, &c) in self.param_coeffs.iter().enumerate() {
            if c != 0 {
                parts.push(term(c, named("p", i, param_names)));
            }
        }
        if self.constant != 0 || parts.is_empty() {
            parts.push(self.constant.to_string());
        }

        parts.join(" + ").replace("+ -", "- ")
    }
}

impl Add for AffineExpr {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        assert_eq!(self.coeffs.len(), other.coeffs.len());
        assert_eq!(self.param_coeffs.len(), other.param_coeffs.len());
        Self {
            constant: self.constant + other.constant,
            coeffs: self.coeffs.iter().zip(&other.coeffs)
                .map(|(&a, &b)| a + b).collect(),
            param_coeffs: self.param_coeffs.iter().zip(&other.param_coeffs)
                .map(|(&a, &b)| a + b).collect(),
        }
    }
}

impl Sub for AffineExpr {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        self + (-other)
    }
}

impl Neg for AffineExpr {
    type Output = Self;

    fn neg(self) -> Self {
        self.scale(-1)
    }
}

impl fmt::Display for AffineExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_string_with_names(&[], &[]))
    }
}
