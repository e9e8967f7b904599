//! Utility modules for the code generator.
//!
//! This module contains common utilities used throughout the codebase:
//! - Error types
//! - Rational matrix operations
//! - Code layout helpers

pub mod errors;
pub mod matrix;
pub mod pretty;

// Re-exports
pub use errors::*;
pub use matrix::RationalMatrix;
pub use pretty::CodeFormatter;
