//! Integer sets (polyhedra) for iteration domains and parameter contexts.

use crate::polyhedral::space::Space;
use crate::polyhedral::constraint::{Constraint, ConstraintSystem};
use serde::{Serialize, Deserialize};
use std::fmt;

/// An integer set defined by affine constraints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegerSet {
    pub space: Space,
    pub constraints: ConstraintSystem,
}

impl IntegerSet {
    pub fn universe(n_dim: usize) -> Self {
        Self::from_space(Space::set(n_dim))
    }

    pub fn from_space(space: Space) -> Self {
        let constraints = ConstraintSystem::new(space.n_dim, space.n_param);
        Self { space, constraints }
    }

    /// Unconstrained parameter context.
    pub fn param_universe(n_param: usize) -> Self {
        Self::from_space(Space::params(n_param))
    }

    /// `{ [i0..] : 0 <= i_k <= P_k - 1 }` where dimension `k` is bounded by parameter `bounds[k]`.
    pub fn parametric_box(bounds: &[usize], n_param: usize) -> Self {
        let n_dim = bounds.len();
        let mut set = Self::from_space(Space::set_with_params(n_dim, n_param));
        for (dim, &param) in bounds.iter().enumerate() {
            set.add_constraint(Constraint::lower_bound(dim, 0, n_dim, n_param));
            set.add_constraint(Constraint::param_upper_bound(dim, param, -1, n_dim, n_param));
        }
        set
    }

    pub fn dim(&self) -> usize { self.space.n_dim }
    pub fn n_param(&self) -> usize { self.space.n_param }

    pub fn add_constraint(&mut self, constraint: Constraint) {
        self.constraints.add(constraint);
    }

    pub fn contains(&self, point: &[i64], params: &[i64]) -> bool {
        self.constraints.is_satisfied(point, params)
    }

    /// Syntactic intersection: the union of both constraint lists.
    pub fn intersect(&self, other: &IntegerSet) -> IntegerSet {
        assert_eq!(self.dim(), other.dim());
        assert_eq!(self.n_param(), other.n_param());
        let mut result = self.clone();
        for c in &other.constraints.constraints {
            if !result.constraints.constraints.contains(c) {
                result.add_constraint(c.clone());
            }
        }
        result
    }

    pub fn dim_names(&self) -> Vec<String> { self.space.all_dim_names() }
    pub fn param_names(&self) -> Vec<String> { self.space.all_param_names() }

    pub fn with_dim_names(mut self, names: Vec<String>) -> Self {
        self.space = self.space.with_dim_names(names);
        self
    }

    pub fn with_param_names(mut self, names: Vec<String>) -> Self {
        self.space = self.space.with_param_names(names);
        self
    }
}

impl fmt::Display for IntegerSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dim_names = self.dim_names();
        let param_names = self.param_names();
        write!(f, "{{ [{}]", dim_names.join(", "))?;
        if !self.constraints.is_empty() {
            write!(f, " : ")?;
            for (i, c) in self.constraints.constraints.iter().enumerate() {
                if i > 0 { write!(f, " and ")?; }
                write!(f, "{}", c.to_string_with_names(&dim_names, &param_names))?;
            }
        }
        write!(f, " }}")
    }
}
