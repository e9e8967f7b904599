//! Code generation options.

use crate::utils::errors::{CodegenError, CodegenResult};
use serde::{Serialize, Deserialize};
use std::fmt;

/// Maximum number of nested parallel loops annotated when multi-level
/// parallelism is enabled.
pub const MAX_PARALLEL_NESTING: usize = 2;

/// Default unroll-jam factor.
pub const DEFAULT_UFACTOR: usize = 8;

/// Configuration for the code generator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodegenOptions {
    /// Schedules carry tile dimensions; enables tile-aware range selection
    pub tile: bool,

    /// Annotate outer parallel loops
    pub parallel: bool,

    /// Annotate up to `max_parallel_loops` nested parallel loops
    pub multipar: bool,

    /// Annotate innermost parallel loops as vectorizable
    pub prevector: bool,

    /// Unroll-jam the dimensions flagged for it
    pub unrolljam: bool,

    /// Unroll-jam factor
    pub ufactor: usize,

    /// Induction variable width in bits (32 or 64)
    pub indvar_type: u32,

    /// Global override of the first optimized level (1-based)
    pub first_loop: Option<usize>,

    /// Global override of the last optimized level (1-based)
    pub last_loop: Option<usize>,

    /// Let the generator backtrack for better code
    pub backtrack: bool,

    /// Ask the generator to compute convex hulls for disjunctions
    pub share_disjunctions: bool,

    /// Verbose generator output
    pub debug: bool,

    /// Suppress informational messages
    pub silent: bool,

    /// Cap on parallel annotations when `multipar` is set
    pub max_parallel_loops: usize,

    /// Prefix statement macros with their schedule for Bee/Cl@k
    pub bee: bool,
}

impl Default for CodegenOptions {
    fn default() -> Self {
        Self {
            tile: false,
            parallel: false,
            multipar: false,
            prevector: false,
            unrolljam: false,
            ufactor: DEFAULT_UFACTOR,
            indvar_type: 32,
            first_loop: None,
            last_loop: None,
            backtrack: true,
            share_disjunctions: false,
            debug: false,
            silent: false,
            max_parallel_loops: MAX_PARALLEL_NESTING,
            bee: false,
        }
    }
}

impl CodegenOptions {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tile(mut self, v: bool) -> Self {
        self.tile = v;
        self
    }

    pub fn parallel(mut self, v: bool) -> Self {
        self.parallel = v;
        self
    }

    pub fn multipar(mut self, v: bool) -> Self {
        self.multipar = v;
        self
    }

    pub fn prevector(mut self, v: bool) -> Self {
        self.prevector = v;
        self
    }

    /// Enable unroll-jam with the given factor
    pub fn unroll_jam(mut self, factor: usize) -> Self {
        self.unrolljam = true;
        self.ufactor = factor;
        self
    }

    pub fn indvar_type(mut self, width: u32) -> Self {
        self.indvar_type = width;
        self
    }

    /// Force the optimized level range for every statement
    pub fn loop_range(mut self, first: usize, last: usize) -> Self {
        self.first_loop = Some(first);
        self.last_loop = Some(last);
        self
    }

    pub fn debug(mut self, v: bool) -> Self {
        self.debug = v;
        self
    }

    pub fn silent(mut self, v: bool) -> Self {
        self.silent = v;
        self
    }

    pub fn bee(mut self, v: bool) -> Self {
        self.bee = v;
        self
    }

    pub fn max_parallel_loops(mut self, cap: usize) -> Self {
        self.max_parallel_loops = cap;
        self
    }

    /// Parallel-and-vector preset used for multicore output
    pub fn multicore() -> Self {
        Self {
            parallel: true,
            prevector: true,
            ..Default::default()
        }
    }

    /// Number of parallel annotations allowed under these options.
    pub fn parallel_cap(&self) -> usize {
        if self.multipar { self.max_parallel_loops } else { 1 }
    }

    /// The global range override, when both ends are set and at least 1.
    pub fn global_range(&self) -> Option<(usize, usize)> {
        match (self.first_loop, self.last_loop) {
            (Some(f), Some(l)) if f >= 1 && l >= 1 => Some((f, l)),
            _ => None,
        }
    }

    /// Resolve the induction variable type.
    pub fn resolve_indvar_type(&self) -> CodegenResult<IndvarType> {
        IndvarType::try_from(self.indvar_type)
    }
}

/// C type used for generated induction variables.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndvarType {
    I32,
    I64,
}

impl IndvarType {
    pub fn c_name(self) -> &'static str {
        match self {
            IndvarType::I32 => "int",
            IndvarType::I64 => "long long",
        }
    }
}

impl TryFrom<u32> for IndvarType {
    type Error = CodegenError;

    fn try_from(width: u32) -> Result<Self, Self::Error> {
        match width {
            32 => Ok(IndvarType::I32),
            64 => Ok(IndvarType::I64),
            other => Err(CodegenError::invalid_indvar_type(other)),
        }
    }
}

impl fmt::Display for IndvarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.c_name())
    }
}
