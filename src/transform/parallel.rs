//! Parallel loop annotation.
//!
//! Two views of the same information: per-dimension OpenMP clause records
//! (shared and private scalars for the outermost sync-free dimensions) that
//! a post-processor can apply to the printed code, and the `MarkParallel`
//! pass that tags the dominant parallel loops of the AST directly.

use crate::analysis::LoopQuery;
use crate::codegen::ast::{Ast, Directives};
use crate::ir::pir::PolyProgram;
use crate::options::CodegenOptions;
use crate::transform::{AnnotatedLoop, AstPass, PassContext};
use crate::utils::errors::{CodegenError, CodegenResult};
use crate::utils::pretty::format_list;
use log::{debug, warn};
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// OpenMP clauses for one parallel schedule dimension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParallelAnnotation {
    /// 0-based schedule depth
    pub depth: usize,
    pub shared: Vec<String>,
    pub private: Vec<String>,
}

impl ParallelAnnotation {
    /// Name of the annotated dimension.
    pub fn dim_name(&self) -> String {
        format!("t{}", self.depth + 1)
    }

    pub fn pragma(&self) -> String {
        format!(
            "#pragma omp parallel for shared({}) private({})",
            format_list(&self.shared, ","),
            format_list(&self.private, ",")
        )
    }
}

impl fmt::Display for ParallelAnnotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.dim_name(), self.pragma())
    }
}

/// Annotation records, outermost dimension first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParallelAnnotations {
    records: Vec<ParallelAnnotation>,
}

impl ParallelAnnotations {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ParallelAnnotation> {
        self.records.iter()
    }

    /// Write one line per record.
    pub fn write_to<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        for record in &self.records {
            writeln!(out, "{}", record)?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a ParallelAnnotations {
    type Item = &'a ParallelAnnotation;
    type IntoIter = std::slice::Iter<'a, ParallelAnnotation>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Select the outermost parallel dimensions and build their clauses.
///
/// Only one dimension is annotated unless `multipar` is set, in which case
/// up to [`CodegenOptions::parallel_cap`] are.
pub fn find_parallel_annotations(prog: &PolyProgram, opts: &CodegenOptions) -> ParallelAnnotations {
    let n = prog.num_hyperplanes();
    let cap = opts.parallel_cap();
    let mut records = Vec::new();

    for depth in 0..n {
        if records.len() >= cap {
            break;
        }
        if !prog.is_parallel_hyperplane(depth) {
            continue;
        }
        let k = records.len() + 1;

        let mut shared: Vec<String> = (1..=depth).map(|i| format!("t{}", i)).collect();
        for j in 1..=k {
            shared.push(format!("lb{}", j));
            shared.push(format!("ub{}", j));
        }

        let mut private = Vec::new();
        if opts.prevector {
            private.push("ubv".to_string());
            private.push("lbv".to_string());
        }
        // Bounds of the parallel loops still to be marked
        if opts.multipar {
            for j in (k + 1)..=cap {
                private.push(format!("lb{}", j));
                private.push(format!("ub{}", j));
            }
        }
        private.extend(((depth + 1)..=n).map(|i| format!("t{}", i)));

        records.push(ParallelAnnotation { depth, shared, private });
    }

    debug!("marked {} loop(s) parallel", records.len());
    ParallelAnnotations { records }
}

/// Persist the parallel annotations to `path`, one line per dimension.
///
/// Returns the number of annotated dimensions. No file is created when there
/// is nothing to annotate. A sink that cannot be opened or written is a
/// recoverable error: the generated code is still valid, only unannotated.
pub fn omp_parallelize(prog: &PolyProgram, opts: &CodegenOptions, path: impl AsRef<Path>) -> CodegenResult<usize> {
    let path = path.as_ref();
    let annotations = find_parallel_annotations(prog, opts);
    if annotations.is_empty() {
        return Ok(0);
    }

    let file = File::create(path).map_err(|e| {
        warn!("cannot create {}: {}", path.display(), e);
        CodegenError::sink_unavailable(path, &e)
    })?;
    let mut out = BufWriter::new(file);
    annotations.write_to(&mut out)
        .and_then(|_| out.flush())
        .map_err(|e| {
            warn!("cannot write {}: {}", path.display(), e);
            CodegenError::sink_unavailable(path, &e)
        })?;

    Ok(annotations.len())
}

/// Dominant parallel loops as annotation targets.
///
/// Each loop privatizes the scalars of the dimensions below it, plus the
/// vector bounds when vector loops were marked.
pub fn parallel_loop_list(prog: &PolyProgram, query: &dyn LoopQuery, vector_loops_found: bool) -> Vec<AnnotatedLoop> {
    query.dominant_parallel_loops(prog)
        .into_iter()
        .map(|lp| {
            let max_depth = prog.max_schedule_depth(&lp.stmts);
            let mut private_vars = Vec::new();
            if vector_loops_found {
                private_vars.push("lbv".to_string());
                private_vars.push("ubv".to_string());
            }
            private_vars.extend(((lp.depth + 2)..=max_depth).map(|d| format!("t{}", d)));

            AnnotatedLoop {
                iter: format!("t{}", lp.depth + 1),
                depth: lp.depth,
                stmt_ids: lp.stmts.iter().map(|s| s.number()).collect(),
                max_depth,
                directives: Directives { parallel: true, ..Directives::default() },
                private_vars,
            }
        })
        .collect()
}

/// Marks the dominant parallel loops of the AST for OpenMP.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkParallel;

impl AstPass for MarkParallel {
    fn run(&self, ctx: &mut PassContext<'_>, ast: &mut Ast) -> CodegenResult<usize> {
        let loops = parallel_loop_list(ctx.program, ctx.query, ctx.vector_loops_found > 0);
        let mut marked = 0;
        ast.for_each_loop_mut(|l| {
            if let Some(target) = loops.iter().find(|t| t.matches(l)) {
                l.directives.parallel = true;
                l.private_vars = target.private_vars.clone();
                marked += 1;
            }
        });
        Ok(marked)
    }

    fn name(&self) -> &str {
        "parallel"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::ScheduleLoopQuery;
    use crate::codegen::ast::{AstExpr, AstNode, ForLoop};
    use crate::ir::pir::{HyperplaneProperty, StatementBuilder, StmtId};
    use crate::polyhedral::{AffineMap, IntegerSet};

    fn program(hyperplanes: Vec<HyperplaneProperty>) -> PolyProgram {
        let n = hyperplanes.len();
        let mut prog = PolyProgram::new("p", vec!["N".into()]);
        prog.add_statement(
            StatementBuilder::new(IntegerSet::parametric_box(&vec![0; n], 1), "s;")
                .iterators((0..n).map(|i| format!("i{}", i)))
                .schedule(AffineMap::identity(n, 1)),
        );
        prog.hyperplanes = hyperplanes;
        prog
    }

    #[test]
    fn test_single_annotation_without_multipar() {
        let prog = program(vec![
            HyperplaneProperty::parallel_loop(),
            HyperplaneProperty::sequential_loop(),
            HyperplaneProperty::parallel_loop(),
        ]);
        let anns = find_parallel_annotations(&prog, &CodegenOptions::new().parallel(true));
        assert_eq!(anns.len(), 1);
        let a = anns.iter().next().unwrap();
        assert_eq!(a.to_string(), "t1 #pragma omp parallel for shared(lb1,ub1) private(t1,t2,t3)");
    }

    #[test]
    fn test_multipar_annotations() {
        let prog = program(vec![
            HyperplaneProperty::sequential_loop(),
            HyperplaneProperty::parallel_loop(),
            HyperplaneProperty::scalar(),
            HyperplaneProperty::parallel_loop(),
            HyperplaneProperty::parallel_loop(),
        ]);
        let opts = CodegenOptions::new().parallel(true).multipar(true).prevector(true);
        let anns: Vec<_> = find_parallel_annotations(&prog, &opts).iter().cloned().collect();
        assert_eq!(anns.len(), 2);
        assert_eq!(anns[0].depth, 1);
        assert_eq!(anns[0].shared, vec!["t1", "lb1", "ub1"]);
        assert_eq!(anns[0].private, vec!["ubv", "lbv", "lb2", "ub2", "t2", "t3", "t4", "t5"]);
        assert_eq!(anns[1].depth, 3);
        assert_eq!(anns[1].shared, vec!["t1", "t2", "t3", "lb1", "ub1", "lb2", "ub2"]);
        assert_eq!(anns[1].private, vec!["ubv", "lbv", "t4", "t5"]);
    }

    #[test]
    fn test_no_parallel_dimension_writes_nothing() {
        let prog = program(vec![HyperplaneProperty::sequential_loop()]);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".pragmas");
        let n = omp_parallelize(&prog, &CodegenOptions::new().parallel(true), &path).unwrap();
        assert_eq!(n, 0);
        assert!(!path.exists());
    }

    #[test]
    fn test_unwritable_sink_is_recoverable() {
        let prog = program(vec![HyperplaneProperty::parallel_loop()]);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join(".pragmas");
        let err = omp_parallelize(&prog, &CodegenOptions::new(), &path).unwrap_err();
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_parallel_loop_list_private_vars() {
        let prog = program(vec![
            HyperplaneProperty::parallel_loop(),
            HyperplaneProperty::sequential_loop(),
            HyperplaneProperty::parallel_loop(),
        ]);
        let loops = parallel_loop_list(&prog, &ScheduleLoopQuery::new(), true);
        assert_eq!(loops.len(), 1);
        assert_eq!(loops[0].iter, "t1");
        assert_eq!(loops[0].stmt_ids, vec![1]);
        assert_eq!(loops[0].max_depth, 3);
        assert_eq!(loops[0].private_vars_string(), "lbv, ubv, t2, t3");

        let loops = parallel_loop_list(&prog, &ScheduleLoopQuery::new(), false);
        assert_eq!(loops[0].private_vars_string(), "t2, t3");
    }

    #[test]
    fn test_mark_parallel() {
        let prog = program(vec![HyperplaneProperty::parallel_loop(), HyperplaneProperty::sequential_loop()]);
        let inner = ForLoop::new("t2", AstExpr::int(0), AstExpr::var("N"), vec![
            AstNode::Stmt { id: StmtId(0), args: vec![AstExpr::var("t1"), AstExpr::var("t2")] },
        ]);
        let mut ast = Ast::new(vec![AstNode::For(ForLoop::new("t1", AstExpr::int(0), AstExpr::var("N"), vec![
            AstNode::For(inner),
        ]))]);

        let query = ScheduleLoopQuery::new();
        let mut ctx = PassContext::new(&prog, &query);
        assert_eq!(MarkParallel.run(&mut ctx, &mut ast).unwrap(), 1);
        let loops = ast.loops();
        assert!(loops[0].directives.parallel);
        assert_eq!(loops[0].private_vars, vec!["t2"]);
        assert!(!loops[1].directives.parallel);
    }
}
