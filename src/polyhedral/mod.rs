//! Polyhedral data structures.
//!
//! This module provides the affine building blocks the code generator
//! consumes and prints:
//! - Affine expressions and constraints
//! - Integer sets (domains and parameter contexts)
//! - Affine maps (schedules)

pub mod space;
pub mod expr;
pub mod constraint;
pub mod set;
pub mod map;

pub use space::Space;
pub use expr::AffineExpr;
pub use constraint::{Constraint, ConstraintKind, ConstraintSystem};
pub use set::IntegerSet;
pub use map::AffineMap;
