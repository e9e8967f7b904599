//! Annotation pipeline for the generated AST.
//!
//! The passes always run in the same order: vector marking first, so the
//! parallel pass knows whether `lbv`/`ubv` must be privatized, then parallel
//! marking, then unroll-jam.

use crate::analysis::{LoopQuery, ScheduleLoopQuery};
use crate::codegen::ast::Ast;
use crate::ir::pir::PolyProgram;
use crate::options::CodegenOptions;
use crate::transform::{AstPass, MarkParallel, MarkVector, PassContext, UnrollJam};
use crate::utils::errors::CodegenResult;
use log::debug;

/// Result of one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotationReport {
    /// (pass name, loops marked) in run order
    pub passes: Vec<(String, usize)>,
}

impl AnnotationReport {
    /// Loops marked by the named pass.
    pub fn marked(&self, pass: &str) -> usize {
        self.passes.iter()
            .find(|(name, _)| name == pass)
            .map_or(0, |(_, n)| *n)
    }
}

/// Ordered set of annotation passes.
pub struct AnnotationPipeline {
    passes: Vec<Box<dyn AstPass>>,
    query: Box<dyn LoopQuery>,
}

impl AnnotationPipeline {
    /// Pipeline with no passes.
    pub fn empty() -> Self {
        Self {
            passes: Vec::new(),
            query: Box::new(ScheduleLoopQuery::new()),
        }
    }

    /// Build the passes enabled by the options.
    pub fn from_options(opts: &CodegenOptions) -> Self {
        let mut pipeline = Self::empty();
        if opts.prevector {
            pipeline.passes.push(Box::new(MarkVector));
        }
        if opts.parallel {
            pipeline.passes.push(Box::new(MarkParallel));
        }
        if opts.unrolljam {
            pipeline.passes.push(Box::new(UnrollJam::new(opts.ufactor)));
        }
        pipeline
    }

    /// Answer loop queries with a different implementation.
    pub fn with_query(mut self, query: Box<dyn LoopQuery>) -> Self {
        self.query = query;
        self
    }

    /// Names of the passes, in run order.
    pub fn pass_names(&self) -> Vec<&str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    /// Run every pass over the AST.
    pub fn run(&self, prog: &PolyProgram, ast: &mut Ast) -> CodegenResult<AnnotationReport> {
        let mut ctx = PassContext::new(prog, self.query.as_ref());
        let mut report = AnnotationReport::default();
        for pass in &self.passes {
            let marked = pass.run(&mut ctx, ast)?;
            debug!("{}: {} loop(s)", pass.name(), marked);
            report.passes.push((pass.name().to_string(), marked));
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::ast::{AstExpr, AstNode, ForLoop};
    use crate::ir::pir::{HyperplaneProperty, StatementBuilder, StmtId};
    use crate::polyhedral::{AffineMap, IntegerSet};

    fn program() -> PolyProgram {
        let mut prog = PolyProgram::new("p", vec!["N".into()]);
        prog.add_statement(
            StatementBuilder::new(IntegerSet::parametric_box(&[0, 0], 1), "s;")
                .iterators(["i", "j"])
                .schedule(AffineMap::identity(2, 1)),
        );
        prog.hyperplanes = vec![HyperplaneProperty::parallel_loop(), HyperplaneProperty::parallel_loop()];
        prog
    }

    fn nest() -> Ast {
        let inner = ForLoop::new("t2", AstExpr::int(0), AstExpr::var("N"), vec![
            AstNode::Stmt { id: StmtId(0), args: vec![AstExpr::var("t1"), AstExpr::var("t2")] },
        ]);
        Ast::new(vec![AstNode::For(ForLoop::new("t1", AstExpr::int(0), AstExpr::var("N"), vec![
            AstNode::For(inner),
        ]))])
    }

    #[test]
    fn test_pass_order_is_fixed() {
        let opts = CodegenOptions::new().unroll_jam(4).parallel(true).prevector(true);
        let pipeline = AnnotationPipeline::from_options(&opts);
        assert_eq!(pipeline.pass_names(), vec!["vector", "parallel", "unroll-jam"]);
    }

    #[test]
    fn test_disabled_pipeline_is_identity() {
        let pipeline = AnnotationPipeline::from_options(&CodegenOptions::new());
        assert!(pipeline.is_empty());
        let mut ast = nest();
        let report = pipeline.run(&program(), &mut ast).unwrap();
        assert!(report.passes.is_empty());
        assert_eq!(ast, nest());
    }

    #[test]
    fn test_vector_result_feeds_parallel_pass() {
        let opts = CodegenOptions::new().parallel(true).prevector(true);
        let mut ast = nest();
        let report = AnnotationPipeline::from_options(&opts).run(&program(), &mut ast).unwrap();
        assert_eq!(report.marked("vector"), 1);
        assert_eq!(report.marked("parallel"), 1);

        let outer = ast.loops_over("t1")[0];
        assert!(outer.directives.parallel);
        assert_eq!(outer.private_vars, vec!["lbv", "ubv", "t2"]);
        assert!(ast.loops_over("t2")[0].directives.vector);
    }
}
