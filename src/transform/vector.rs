//! Vectorizable loop annotation.
//!
//! Innermost parallel loops are marked for `ivdep`/`vector always` hints.
//! Unlike parallel marking there is no cap and no private-variable list.

use crate::analysis::LoopQuery;
use crate::codegen::ast::{Ast, Directives};
use crate::ir::pir::PolyProgram;
use crate::transform::{AnnotatedLoop, AstPass, PassContext};
use crate::utils::errors::CodegenResult;
use log::debug;

/// Parallel loops of the program that are also innermost.
pub fn vector_loop_list(prog: &PolyProgram, query: &dyn LoopQuery) -> Vec<AnnotatedLoop> {
    query.parallel_loops(prog)
        .into_iter()
        .filter(|lp| query.is_innermost(lp, prog))
        .map(|lp| AnnotatedLoop {
            iter: format!("t{}", lp.depth + 1),
            depth: lp.depth,
            stmt_ids: lp.stmts.iter().map(|s| s.number()).collect(),
            max_depth: prog.max_schedule_depth(&lp.stmts),
            directives: Directives { vector: true, ..Directives::default() },
            private_vars: Vec::new(),
        })
        .collect()
}

/// Marks vectorizable loops of the AST.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkVector;

impl AstPass for MarkVector {
    fn run(&self, ctx: &mut PassContext<'_>, ast: &mut Ast) -> CodegenResult<usize> {
        let loops = vector_loop_list(ctx.program, ctx.query);
        let mut marked = 0;
        ast.for_each_loop_mut(|l| {
            if loops.iter().any(|t| t.matches(l)) {
                l.directives.vector = true;
                marked += 1;
            }
        });
        debug!("marked {} loop(s) vectorizable", marked);
        ctx.vector_loops_found = marked;
        Ok(marked)
    }

    fn name(&self) -> &str {
        "vector"
    }
}
