//! Intermediate representation consumed by the code generator.
//!
//! PIR: the scheduled polyhedral program (statements, schedules,
//! hyperplane properties, contexts).

pub mod pir;

pub use pir::*;
