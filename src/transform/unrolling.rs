//! Unroll-and-jam of the generated loop nest.
//!
//! A loop over a dimension flagged for unrolling is split in two:
//! ```text
//! for t = lb to ub:
//!   for u = ..:
//!     S(t, u)
//! ```
//! After unroll-jam by factor 2:
//! ```text
//! for t = lb to lb + floord(ub-lb+1, 2)*2 - 1 step 2:
//!   for u = ..:
//!     S(t, u)
//!     S(t+1, u)
//! for t = max(lb + floord(ub-lb+1, 2)*2, lb) to ub:
//!   for u = ..:
//!     S(t, u)
//! ```
//! A loop that already steps by `s` is split at `lb + floord(ub-lb+1, 2*s)*2*s`
//! and its second copy runs at `t+s`. The epilogue never starts below `lb`,
//! so a loop with `ub < lb - 1` stays empty.
//!
//! Inner loops whose bounds do not depend on `t` are kept and their bodies
//! jammed. Anything else is replicated as a whole.

use crate::codegen::ast::{Ast, AstExpr, AstNode, Directives, ForLoop};
use crate::ir::pir::PolyProgram;
use crate::transform::{AstPass, PassContext};
use crate::utils::errors::CodegenResult;
use log::debug;

/// Unroll-and-jam transformation on the AST.
#[derive(Debug, Clone, Copy)]
pub struct UnrollJam {
    /// Unrolling factor
    pub factor: usize,
}

impl UnrollJam {
    pub fn new(factor: usize) -> Self {
        Self { factor }
    }

    /// Mark every loop whose dimension is flagged for unrolling.
    pub fn mark(&self, prog: &PolyProgram, ast: &mut Ast) -> usize {
        let mut marked = 0;
        ast.for_each_loop_mut(|l| {
            let flagged = dimension_of(&l.iterator)
                .and_then(|d| prog.hyperplanes.get(d))
                .map_or(false, |h| h.unroll);
            if flagged {
                l.directives.unroll_jam = Some(self.factor);
                marked += 1;
            }
        });
        marked
    }

    /// Expand marked loops into a jammed main loop and an epilogue.
    pub fn expand(&self, nodes: Vec<AstNode>) -> Vec<AstNode> {
        let mut out = Vec::with_capacity(nodes.len());
        for node in nodes {
            match node {
                AstNode::For(mut l) => {
                    l.body = self.expand(std::mem::take(&mut l.body));
                    match l.directives.unroll_jam {
                        Some(f) if f > 1 => {
                            let (main, epilogue) = split_loop(l, f);
                            out.push(AstNode::For(main));
                            out.push(AstNode::For(epilogue));
                        }
                        _ => out.push(AstNode::For(l)),
                    }
                }
                AstNode::If { condition, then_body, else_body } => out.push(AstNode::If {
                    condition,
                    then_body: self.expand(then_body),
                    else_body: else_body.map(|e| self.expand(e)),
                }),
                AstNode::Block { statements } => out.push(AstNode::Block {
                    statements: self.expand(statements),
                }),
                stmt @ AstNode::Stmt { .. } => out.push(stmt),
            }
        }
        out
    }
}

/// Dimension (0-based) scanned by a `t<k>` iterator.
fn dimension_of(iterator: &str) -> Option<usize> {
    iterator.strip_prefix('t')?.parse::<usize>().ok()?.checked_sub(1)
}

fn split_loop(l: ForLoop, f: usize) -> (ForLoop, ForLoop) {
    let factor = f as i64;
    let span = l.step * factor;
    // lb + floord(ub - lb + 1, f*step) * f*step
    let split = l.lower.clone().add(
        l.upper.clone()
            .sub(l.lower.clone())
            .add(AstExpr::int(1))
            .floor_div(span)
            .mul(AstExpr::int(span)),
    );

    let epilogue = ForLoop {
        iterator: l.iterator.clone(),
        lower: split.clone().max(l.lower.clone()),
        upper: l.upper.clone(),
        step: l.step,
        body: l.body.clone(),
        directives: Directives::default(),
        private_vars: Vec::new(),
    };
    let main = ForLoop {
        body: jam(&l.body, &l.iterator, f, l.step),
        upper: split.sub(AstExpr::int(1)),
        step: span,
        ..l
    };
    (main, epilogue)
}

fn jam(nodes: &[AstNode], iter: &str, f: usize, step: i64) -> Vec<AstNode> {
    let mut out = Vec::new();
    let mut run: Vec<&AstNode> = Vec::new();

    for node in nodes {
        match node {
            AstNode::For(inner) if !node.bounds_mention(iter) => {
                replicate(&run, iter, f, step, &mut out);
                run.clear();
                let mut inner = inner.clone();
                inner.body = jam(&inner.body, iter, f, step);
                out.push(AstNode::For(inner));
            }
            _ => run.push(node),
        }
    }
    replicate(&run, iter, f, step, &mut out);
    out
}

fn replicate(run: &[&AstNode], iter: &str, f: usize, step: i64, out: &mut Vec<AstNode>) {
    for k in 0..f {
        let shifted = AstExpr::var(iter).add(AstExpr::int(k as i64 * step));
        out.extend(run.iter().map(|n| n.substitute(iter, &shifted)));
    }
}

impl AstPass for UnrollJam {
    fn run(&self, ctx: &mut PassContext<'_>, ast: &mut Ast) -> CodegenResult<usize> {
        if self.factor <= 1 {
            return Ok(0);
        }
        let marked = self.mark(ctx.program, ast);
        if marked > 0 {
            ast.body = self.expand(std::mem::take(&mut ast.body));
        }
        debug!("unroll-jammed {} loop(s) by {}", marked, self.factor);
        Ok(marked)
    }

    fn name(&self) -> &str {
        "unroll-jam"
    }
}
