//! Polyhedral spaces define the dimensions of iteration domains.
//!
//! A space describes the structure of an iteration domain or map:
//! - Input dimensions (for maps)
//! - Output dimensions
//! - Parameter dimensions (symbolic constants)

use serde::{Serialize, Deserialize};
use std::fmt;

/// A polyhedral space describes the dimensionality and structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Space {
    /// Number of set/output dimensions
    pub n_dim: usize,
    /// Number of parameter dimensions
    pub n_param: usize,
    /// Number of input dimensions (for maps only)
    #[serde(default)]
    pub n_in: usize,
    /// Names of dimensions (optional)
    #[serde(default)]
    pub dim_names: Vec<String>,
    /// Names of parameters (optional)
    #[serde(default)]
    pub param_names: Vec<String>,
}

impl Space {
    /// Create a new set space with the given dimensions.
    pub fn set(n_dim: usize) -> Self {
        Self::set_with_params(n_dim, 0)
    }

    /// Create a new set space with parameters.
    pub fn set_with_params(n_dim: usize, n_param: usize) -> Self {
        Self {
            n_dim,
            n_param,
            n_in: 0,
            dim_names: Vec::new(),
            param_names: Vec::new(),
        }
    }

    /// Create a parameter-only space, as used by program contexts.
    pub fn params(n_param: usize) -> Self {
        Self::set_with_params(0, n_param)
    }

    /// Create a new map space with parameters.
    pub fn map_with_params(n_in: usize, n_out: usize, n_param: usize) -> Self {
        Self {
            n_dim: n_out,
            n_param,
            n_in,
            dim_names: Vec::new(),
            param_names: Vec::new(),
        }
    }

    /// Check if this is a map space (has input dimensions).
    pub fn is_map(&self) -> bool {
        self.n_in > 0
    }

    /// Get the number of output/set dimensions.
    pub fn dim(&self) -> usize {
        self.n_dim
    }

    /// Set dimension names.
    pub fn with_dim_names(mut self, names: Vec<String>) -> Self {
        self.dim_names = names;
        self
    }

    /// Set parameter names.
    pub fn with_param_names(mut self, names: Vec<String>) -> Self {
        self.param_names = names;
        self
    }

    /// Get the name of a dimension.
    pub fn dim_name(&self, idx: usize) -> Option<&str> {
        self.dim_names.get(idx).map(|s| s.as_str())
    }

    /// Get all dimension names with defaults.
    pub fn all_dim_names(&self) -> Vec<String> {
        (0..self.n_dim)
            .map(|i| {
                self.dim_names.get(i)
                    .cloned()
                    .unwrap_or_else(|| format!("d{}", i))
            })
            .collect()
    }

    /// Get all parameter names with defaults.
    pub fn all_param_names(&self) -> Vec<String> {
        (0..self.n_param)
            .map(|i| {
                self.param_names.get(i)
                    .cloned()
                    .unwrap_or_else(|| format!("p{}", i))
            })
            .collect()
    }
}

impl fmt::Display for Space {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_map() {
            write!(f, "[{}] -> [{}]", self.n_in, self.n_dim)?;
        } else {
            write!(f, "[{}]", self.n_dim)?;
        }
        if self.n_param > 0 {
            write!(f, " : {} params", self.n_param)?;
        }
        Ok(())
    }
}
