//! Analyses over the scheduled program.

pub mod loops;

pub use loops::{LoopQuery, Ploop, ScheduleLoopQuery};
