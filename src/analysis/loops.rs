//! Loop structure derived from the schedule.
//!
//! A loop is a schedule depth together with the statements that vary along
//! it inside one scalar-dimension partition. The parallel and vector
//! annotators ask three questions about these loops, captured by
//! [`LoopQuery`].

use crate::ir::pir::{HyperplaneKind, PolyProgram, StmtId};
use log::debug;
use std::collections::BTreeMap;
use std::fmt;

/// A loop at some schedule depth and the statements it encloses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ploop {
    /// 0-based schedule depth
    pub depth: usize,
    pub stmts: Vec<StmtId>,
}

impl Ploop {
    pub fn new(depth: usize, stmts: Vec<StmtId>) -> Self {
        Self { depth, stmts }
    }

    /// Whether every statement of `self` is also in `other`.
    pub fn is_nested_in(&self, other: &Ploop) -> bool {
        self.stmts.iter().all(|s| other.stmts.contains(s))
    }
}

impl fmt::Display for Ploop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stmts: Vec<String> = self.stmts.iter().map(|s| s.to_string()).collect();
        write!(f, "t{} {{{}}}", self.depth + 1, stmts.join(","))
    }
}

/// Loop-level queries the annotators depend on.
pub trait LoopQuery {
    /// All loops whose dimension carries no dependence.
    fn parallel_loops(&self, prog: &PolyProgram) -> Vec<Ploop>;

    /// Parallel loops not enclosed by a shallower parallel loop covering
    /// all of their statements.
    fn dominant_parallel_loops(&self, prog: &PolyProgram) -> Vec<Ploop>;

    /// Whether no deeper loop dimension varies for any of the loop's statements.
    fn is_innermost(&self, lp: &Ploop, prog: &PolyProgram) -> bool;
}

/// [`LoopQuery`] computed from the schedule rows and hyperplane properties.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScheduleLoopQuery;

impl ScheduleLoopQuery {
    pub fn new() -> Self {
        Self
    }

    /// Every loop of the program, outer loops first.
    pub fn all_loops(&self, prog: &PolyProgram) -> Vec<Ploop> {
        let stmts: Vec<StmtId> = prog.statements.iter()
            .filter(|s| s.schedule.is_some())
            .map(|s| s.id)
            .collect();
        let mut loops = Vec::new();
        loops_under(prog, &stmts, 0, &mut loops);
        loops
    }
}

fn loops_under(prog: &PolyProgram, stmts: &[StmtId], depth: usize, out: &mut Vec<Ploop>) {
    if stmts.is_empty() || depth >= prog.num_hyperplanes() {
        return;
    }
    let scalar_at = |id: StmtId| prog.get_stmt(id).map_or(true, |s| s.is_hyperplane_scalar(depth));

    if prog.hyperplanes[depth].kind == HyperplaneKind::Scalar || stmts.iter().all(|&s| scalar_at(s)) {
        // Split by the constant value of this row
        let mut groups: BTreeMap<Option<i64>, Vec<StmtId>> = BTreeMap::new();
        for &id in stmts {
            let value = prog.get_stmt(id).and_then(|s| s.scalar_value(depth));
            groups.entry(value).or_default().push(id);
        }
        for group in groups.values() {
            loops_under(prog, group, depth + 1, out);
        }
        return;
    }

    let in_loop: Vec<StmtId> = stmts.iter().copied().filter(|&s| !scalar_at(s)).collect();
    out.push(Ploop::new(depth, in_loop));
    loops_under(prog, stmts, depth + 1, out);
}

impl LoopQuery for ScheduleLoopQuery {
    fn parallel_loops(&self, prog: &PolyProgram) -> Vec<Ploop> {
        self.all_loops(prog)
            .into_iter()
            .filter(|l| prog.is_parallel_hyperplane(l.depth))
            .collect()
    }

    fn dominant_parallel_loops(&self, prog: &PolyProgram) -> Vec<Ploop> {
        let parallel = self.parallel_loops(prog);
        let dominant: Vec<Ploop> = parallel.iter()
            .filter(|l| {
                !parallel.iter().any(|o| o.depth < l.depth && l.is_nested_in(o))
            })
            .cloned()
            .collect();
        for l in &dominant {
            debug!("dominant parallel loop {}", l);
        }
        dominant
    }

    fn is_innermost(&self, lp: &Ploop, prog: &PolyProgram) -> bool {
        ((lp.depth + 1)..prog.num_hyperplanes())
            .filter(|&d| prog.hyperplanes[d].kind == HyperplaneKind::Loop)
            .all(|d| {
                lp.stmts.iter()
                    .filter_map(|&id| prog.get_stmt(id))
                    .all(|s| s.is_hyperplane_scalar(d))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::pir::{HyperplaneProperty, StatementBuilder};
    use crate::polyhedral::IntegerSet;

    /// Two statements in a common 3-deep nest: parallel, sequential, parallel.
    fn program() -> PolyProgram {
        let mut prog = PolyProgram::new("p", vec!["N".into()]);
        for text in ["a;", "b;"] {
            prog.add_statement(
                StatementBuilder::new(IntegerSet::parametric_box(&[0, 0, 0], 1), text)
                    .iterators(["i", "j", "k"])
                    .schedule(crate::polyhedral::AffineMap::identity(3, 1)),
            );
        }
        prog.hyperplanes = vec![
            HyperplaneProperty::parallel_loop(),
            HyperplaneProperty::sequential_loop(),
            HyperplaneProperty::parallel_loop(),
        ];
        prog
    }

    #[test]
    fn test_all_loops() {
        let loops = ScheduleLoopQuery::new().all_loops(&program());
        assert_eq!(loops.len(), 3);
        assert!(loops.iter().all(|l| l.stmts.len() == 2));
    }

    #[test]
    fn test_dominant_and_innermost() {
        let prog = program();
        let q = ScheduleLoopQuery::new();
        let par = q.parallel_loops(&prog);
        assert_eq!(par.iter().map(|l| l.depth).collect::<Vec<_>>(), vec![0, 2]);
        let dom = q.dominant_parallel_loops(&prog);
        assert_eq!(dom.len(), 1);
        assert_eq!(dom[0].depth, 0);
        assert!(!q.is_innermost(&par[0], &prog));
        assert!(q.is_innermost(&par[1], &prog));
    }

    #[test]
    fn test_scalar_split() {
        let mut prog = PolyProgram::new("p", vec!["N".into()]);
        let dom = IntegerSet::parametric_box(&[0], 1);
        prog.add_statement(StatementBuilder::new(dom.clone(), "a;").iterators(["i"])
            .schedule_rows(&[vec![0, 0, 0], vec![1, 0, 0]]));
        prog.add_statement(StatementBuilder::new(dom, "b;").iterators(["i"])
            .schedule_rows(&[vec![0, 0, 1], vec![1, 0, 0]]));
        prog.hyperplanes = vec![HyperplaneProperty::scalar(), HyperplaneProperty::parallel_loop()];

        let q = ScheduleLoopQuery::new();
        let loops = q.dominant_parallel_loops(&prog);
        assert_eq!(loops, vec![
            Ploop::new(1, vec![StmtId(0)]),
            Ploop::new(1, vec![StmtId(1)]),
        ]);
        assert!(loops.iter().all(|l| q.is_innermost(l, &prog)));
    }
}
