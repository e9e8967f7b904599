//! Annotation passes over the generated loop-nest AST.
//!
//! Passes run in a fixed order (vector, parallel, unroll-jam); see
//! [`pipeline::AnnotationPipeline`].

pub mod parallel;
pub mod pipeline;
pub mod unrolling;
pub mod vector;

pub use parallel::{
    find_parallel_annotations, omp_parallelize, parallel_loop_list, MarkParallel,
    ParallelAnnotation, ParallelAnnotations,
};
pub use pipeline::AnnotationPipeline;
pub use unrolling::UnrollJam;
pub use vector::{vector_loop_list, MarkVector};

use crate::analysis::LoopQuery;
use crate::codegen::ast::{Ast, Directives, ForLoop};
use crate::ir::pir::PolyProgram;
use crate::utils::errors::CodegenResult;

/// A loop selected for annotation, in terms of generated names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotatedLoop {
    /// Iterator name, `t<depth+1>`
    pub iter: String,
    pub depth: usize,
    /// 1-based statement ids
    pub stmt_ids: Vec<usize>,
    /// Deepest schedule row among the statements
    pub max_depth: usize,
    pub directives: Directives,
    pub private_vars: Vec<String>,
}

impl AnnotatedLoop {
    /// Private variables as they appear in a pragma clause.
    pub fn private_vars_string(&self) -> String {
        self.private_vars.join(", ")
    }

    /// Whether the AST loop iterates over this dimension and only runs
    /// statements of this loop.
    pub fn matches(&self, l: &ForLoop) -> bool {
        if l.iterator != self.iter {
            return false;
        }
        let ids = l.stmt_ids();
        !ids.is_empty() && ids.iter().all(|id| self.stmt_ids.contains(&id.number()))
    }
}

/// Shared state of one pipeline run.
pub struct PassContext<'a> {
    pub program: &'a PolyProgram,
    pub query: &'a dyn LoopQuery,
    /// Loops marked by the vector pass
    pub vector_loops_found: usize,
}

impl<'a> PassContext<'a> {
    pub fn new(program: &'a PolyProgram, query: &'a dyn LoopQuery) -> Self {
        Self { program, query, vector_loops_found: 0 }
    }
}

/// Annotation pass trait.
pub trait AstPass {
    /// Annotate the AST, returning how many loops were marked.
    fn run(&self, ctx: &mut PassContext<'_>, ast: &mut Ast) -> CodegenResult<usize>;

    /// Get pass name.
    fn name(&self) -> &str;
}
