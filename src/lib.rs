//! # PolyEmit - Polyhedral Code Generation Back End
//!
//! Turns a scheduled polyhedral program into annotated C loop nests:
//! - Generator input serialization (domains, scatterings, context)
//! - Statement macros and scalar declarations
//! - Loop-nest AST generation with tile-aware optimization ranges
//! - OpenMP parallel, vector and unroll-jam annotation
//!
//! ## Architecture
//!
//! ```text
//! PolyProgram → GeneratorInput → AstGenerator → AnnotationPipeline → CRenderer → C
//!                                                 (vector, parallel, unroll-jam)
//! ```
//!
//! ## Example
//!
//! ```rust
//! use polyemit::prelude::*;
//!
//! let mut prog = PolyProgram::new("copy", vec!["N".to_string()]);
//! prog.add_statement(
//!     StatementBuilder::new(IntegerSet::parametric_box(&[0], 1), "B[i] = A[i];")
//!         .iterators(["i"])
//!         .schedule(AffineMap::identity(1, 1)),
//! );
//! prog.hyperplanes = vec![HyperplaneProperty::parallel_loop()];
//!
//! let opts = CodegenOptions::new().parallel(true);
//! let code = polyemit::multicore_codegen(&prog, &opts).unwrap();
//! assert!(code.contains("#pragma omp parallel for"));
//! ```

#![warn(clippy::all)]

pub mod options;
pub mod ir;
pub mod polyhedral;
pub mod analysis;
pub mod transform;
pub mod codegen;
pub mod utils;

// Re-export commonly used types
pub mod prelude {
    //! Convenient re-exports of commonly used types and traits.

    pub use crate::ir::pir::*;
    pub use crate::options::{CodegenOptions, IndvarType};
    pub use crate::polyhedral::{
        AffineExpr, Constraint, IntegerSet, AffineMap, Space,
    };
    pub use crate::analysis::{LoopQuery, Ploop, ScheduleLoopQuery};
    pub use crate::transform::{
        AnnotationPipeline, AstPass, ParallelAnnotations,
        find_parallel_annotations, omp_parallelize,
    };
    pub use crate::codegen::{
        Ast, AstGenerator, CodegenDriver, CRenderer, GeneratorInput, LoopNestScanner,
    };
    pub use crate::utils::errors::*;
}

pub use codegen::{generate_code, multicore_codegen};

use utils::errors::PolyResult;

/// Read a scheduled program from its JSON description.
pub fn parse_program(json: &str) -> PolyResult<ir::PolyProgram> {
    Ok(serde_json::from_str(json)?)
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
