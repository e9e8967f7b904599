//! Default AST generator.
//!
//! Each statement's domain is rewritten over the scattering dimensions by
//! inverting the iterator part of its scattering function, then projected
//! with Fourier-Motzkin elimination so that the bounds of `t_k` only refer
//! to `t_1..t_{k-1}` and the parameters. Scanning walks the dimensions
//! outermost first: a dimension on which every statement of a group is a
//! constant only orders the group, any other dimension becomes a loop.
//! Statements sharing a loop with different bounds get a guard at the leaf.

use crate::codegen::ast::{Ast, AstBinOp, AstExpr, AstNode, ForLoop};
use crate::codegen::driver::{AstGenerator, GeneratorOptions, RangeSelection};
use crate::codegen::input::{GeneratorInput, InputDomain, Scattering};
use crate::ir::pir::StmtId;
use crate::polyhedral::{AffineExpr, Constraint, ConstraintKind};
use crate::utils::errors::{CodegenError, CodegenErrorKind, CodegenResult};
use crate::utils::matrix::RationalMatrix;
use log::debug;
use num_integer::Integer;
use std::collections::{BTreeMap, HashMap};

/// Fourier-Motzkin based polyhedral scanner.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoopNestScanner;

impl LoopNestScanner {
    pub fn new() -> Self {
        Self
    }
}

impl AstGenerator for LoopNestScanner {
    fn generate(&self, input: &GeneratorInput, options: &GeneratorOptions) -> CodegenResult<Ast> {
        let Some(scatterings) = &input.scatterings else {
            debug!("No scattering functions, nothing to scan");
            return Ok(Ast::default());
        };
        check_ranges(&options.ranges, input.num_statements())?;

        let n = input.num_scattering_dims();
        let mut stmts = Vec::with_capacity(scatterings.len());
        for (domain, scattering) in input.domains.iter().zip(scatterings) {
            let stmt = ScannedStmt::new(domain, scattering, n)?;
            if stmt.is_empty() {
                debug!("{} has an empty domain, skipped", stmt.id);
                continue;
            }
            stmts.push(stmt);
        }
        if stmts.is_empty() {
            return Ok(Ast::default());
        }

        let context = normalize_all(input.context.constraints.constraints.iter().cloned());
        for s in &mut stmts {
            s.param_guards.retain(|g| !implied_by_context(g, &context));
        }

        // Guards shared by every statement are hoisted around the whole nest
        let common: Vec<Constraint> = stmts[0].param_guards.iter()
            .filter(|g| stmts.iter().all(|s| s.param_guards.contains(g)))
            .cloned()
            .collect();

        let scanner = Scan {
            stmts: &stmts,
            dims: &input.scattering_names,
            params: &input.parameters,
            quiet: options.quiet,
        };

        let members = stmts.iter()
            .enumerate()
            .map(|(idx, s)| Member {
                idx,
                guards: s.param_guards.iter()
                    .filter(|g| !common.contains(g))
                    .map(|g| scanner.condition(g))
                    .collect(),
            })
            .collect();

        let body = scanner.scan(members, 0)?;
        let cond = AstExpr::and_all(common.iter().map(|g| scanner.condition(g)));
        let body = match cond {
            Some(condition) => vec![AstNode::If { condition, then_body: body, else_body: None }],
            None => body,
        };
        Ok(Ast::new(body))
    }
}

fn check_ranges(ranges: &RangeSelection, n_stmts: usize) -> CodegenResult<()> {
    if let RangeSelection::PerStatement(rs) = ranges {
        if rs.len() != n_stmts {
            return Err(CodegenError::new(
                CodegenErrorKind::Generator,
                format!("{} statement ranges given for {} statements", rs.len(), n_stmts),
            ));
        }
    }
    Ok(())
}

/// A statement rewritten over the scattering dimensions.
#[derive(Debug)]
struct ScannedStmt {
    id: StmtId,
    /// `projections[k]` constrains `t_1..t_k` and the parameters
    projections: Vec<Vec<Constraint>>,
    /// Original iterators as affine functions of the scattering dimensions
    args: Vec<AffineExpr>,
    /// Constraints on the parameters alone
    param_guards: Vec<Constraint>,
    /// Constant value of each scattering row, if any
    scalars: Vec<Option<i64>>,
}

impl ScannedStmt {
    fn new(domain: &InputDomain, scattering: &Scattering, n: usize) -> CodegenResult<Self> {
        let map = &scattering.map;
        let m = domain.domain.dim();
        let n_param = domain.domain.n_param();
        if map.n_out() != n {
            return Err(CodegenError::new(
                CodegenErrorKind::Generator,
                format!("scattering of {} has {} rows, expected {}", domain.id, map.n_out(), n),
            ));
        }

        let selected = select_loop_rows(&map.outputs, m);
        if selected.len() < m {
            return Err(CodegenError::new(
                CodegenErrorKind::NonInvertibleSchedule,
                format!("schedule of {} has rank {} on a {}-dimensional domain", domain.id, selected.len(), m),
            ));
        }
        let args = invert_rows(&map.outputs, &selected, n, n_param)
            .ok_or_else(|| CodegenError::new(
                CodegenErrorKind::NonInvertibleSchedule,
                format!("schedule of {} is not unimodular on its loop rows", domain.id),
            ))?;

        let mut full: Vec<Constraint> = domain.domain.constraints.constraints.iter()
            .map(|c| Constraint::new(substitute_dims(&c.expr, &args, n), c.kind))
            .collect();
        for (k, row) in map.outputs.iter().enumerate() {
            if selected.contains(&k) {
                continue;
            }
            // t_k - f_k(i(t)) = 0
            let eq = AffineExpr::var(k, n, n_param) - substitute_dims(row, &args, n);
            full.push(Constraint::eq_zero(eq));
        }

        let mut projections = vec![Vec::new(); n + 1];
        projections[n] = normalize_all(full);
        for k in (0..n).rev() {
            projections[k] = eliminate(&projections[k + 1], k);
        }
        let param_guards = projections[0].clone();
        let scalars = map.outputs.iter().map(|e| e.as_constant()).collect();

        Ok(Self { id: domain.id, projections, args, param_guards, scalars })
    }

    fn is_empty(&self) -> bool {
        self.param_guards.iter().any(is_infeasible)
    }

    /// Bounds on dimension `d` from the projection onto `t_1..t_{d+1}`.
    fn bounds(&self, d: usize) -> DimBounds {
        let mut b = DimBounds::default();
        for c in &self.projections[d + 1] {
            let a = c.expr.coeff(d);
            if a == 0 {
                continue;
            }
            let mut rest = c.expr.clone();
            rest.set_coeff(d, 0);
            let bound = if a > 0 { Bound::new(-rest, a) } else { Bound::new(rest, -a) };
            match c.kind {
                ConstraintKind::Inequality if a > 0 => b.lowers.push(bound),
                ConstraintKind::Inequality => b.uppers.push(bound),
                ConstraintKind::Equality => {
                    b.lowers.push(bound.clone());
                    b.uppers.push(bound);
                }
            }
        }
        b.simplify();
        b
    }
}

/// Pick rows, in order, whose iterator parts are linearly independent.
fn select_loop_rows(rows: &[AffineExpr], m: usize) -> Vec<usize> {
    let mut selected: Vec<usize> = Vec::with_capacity(m);
    for (k, row) in rows.iter().enumerate() {
        if selected.len() == m {
            break;
        }
        if row.is_dim_free() {
            continue;
        }
        let candidate: Vec<Vec<i64>> = selected.iter()
            .chain(std::iter::once(&k))
            .map(|&r| rows[r].coeffs.clone())
            .collect();
        if RationalMatrix::from_vec(candidate).rank() == selected.len() + 1 {
            selected.push(k);
        }
    }
    selected
}

/// Express the iterators over the scattering dimensions:
/// `i = A^-1 (t_sel - B p - c)` where `A` holds the iterator coefficients of
/// the selected rows. `None` when the inverse is not integral.
fn invert_rows(rows: &[AffineExpr], selected: &[usize], n: usize, n_param: usize) -> Option<Vec<AffineExpr>> {
    let m = selected.len();
    let a = RationalMatrix::from_vec(selected.iter().map(|&r| rows[r].coeffs.clone()).collect());
    let inv = a.inverse()?;
    if !inv.is_integer() {
        debug!("schedule inverse is not integral:\n{}", inv);
        return None;
    }

    let mut args = Vec::with_capacity(m);
    for j in 0..m {
        let mut e = AffineExpr::zero(n, n_param);
        for (r, &k) in selected.iter().enumerate() {
            let w = inv.get(j, r)?.to_integer();
            if w == 0 {
                continue;
            }
            let row = &rows[k];
            e.set_coeff(k, e.coeff(k) + w);
            for p in 0..n_param {
                e.set_param_coeff(p, e.param_coeff(p) - w * row.param_coeff(p));
            }
            e.constant -= w * row.constant;
        }
        args.push(e);
    }
    Some(args)
}

/// Replace each dimension of `expr` by the matching expression in `values`.
fn substitute_dims(expr: &AffineExpr, values: &[AffineExpr], n: usize) -> AffineExpr {
    let mut out = AffineExpr::constant(expr.constant, n, expr.n_param());
    out.param_coeffs = expr.param_coeffs.clone();
    for (j, &c) in expr.coeffs.iter().enumerate() {
        if c != 0 {
            out = out + values[j].scale(c);
        }
    }
    out
}

fn is_infeasible(c: &Constraint) -> bool {
    match c.expr.as_constant() {
        Some(v) => match c.kind {
            ConstraintKind::Inequality => v < 0,
            ConstraintKind::Equality => v != 0,
        },
        None => false,
    }
}

fn infeasible(n_dim: usize, n_param: usize) -> Constraint {
    Constraint::ge_zero(AffineExpr::constant(-1, n_dim, n_param))
}

/// Canonical form of a constraint; `None` for a tautology.
fn normalize(c: Constraint) -> Option<Constraint> {
    if c.expr.is_constant() {
        return is_infeasible(&c).then(|| infeasible(c.expr.n_dim(), c.expr.n_param()));
    }
    match c.kind {
        ConstraintKind::Inequality => Some(Constraint::ge_zero(c.expr.tighten_inequality())),
        ConstraintKind::Equality => {
            let g = c.expr.coeff_gcd();
            if c.expr.constant % g != 0 {
                return Some(infeasible(c.expr.n_dim(), c.expr.n_param()));
            }
            let mut e = AffineExpr {
                constant: c.expr.constant / g,
                coeffs: c.expr.coeffs.iter().map(|&x| x / g).collect(),
                param_coeffs: c.expr.param_coeffs.iter().map(|&x| x / g).collect(),
            };
            let leading = e.coeffs.iter().chain(&e.param_coeffs).find(|&&x| x != 0).copied();
            if leading.map_or(false, |x| x < 0) {
                e = -e;
            }
            Some(Constraint::eq_zero(e))
        }
    }
}

/// Normalize, drop tautologies, and keep only the tightest inequality per
/// coefficient vector.
fn normalize_all(cs: impl IntoIterator<Item = Constraint>) -> Vec<Constraint> {
    let mut out: Vec<Constraint> = Vec::new();
    let mut tightest: HashMap<(Vec<i64>, Vec<i64>), usize> = HashMap::new();
    for c in cs.into_iter().filter_map(normalize) {
        if c.is_equality() {
            if !out.contains(&c) {
                out.push(c);
            }
            continue;
        }
        let key = (c.expr.coeffs.clone(), c.expr.param_coeffs.clone());
        match tightest.get(&key) {
            Some(&i) => {
                if c.expr.constant < out[i].expr.constant {
                    out[i] = c;
                }
            }
            None => {
                tightest.insert(key, out.len());
                out.push(c);
            }
        }
    }
    out
}

/// Project dimension `k` out of a constraint list.
fn eliminate(cs: &[Constraint], k: usize) -> Vec<Constraint> {
    let mut with: Vec<&Constraint> = Vec::new();
    let mut out: Vec<Constraint> = Vec::new();
    for c in cs {
        if c.expr.coeff(k) != 0 { with.push(c) } else { out.push(c.clone()) }
    }

    if let Some(eq) = with.iter().copied().find(|c| c.is_equality()) {
        let a = eq.expr.coeff(k);
        for c in with.iter().copied().filter(|&c| !std::ptr::eq(c, eq)) {
            let b = c.expr.coeff(k);
            let e = c.expr.scale(a.abs()) - eq.expr.scale(b * a.signum());
            out.push(Constraint::new(e, c.kind));
        }
        return normalize_all(out);
    }

    let lowers: Vec<&Constraint> = with.iter().copied().filter(|c| c.expr.coeff(k) > 0).collect();
    let uppers: Vec<&Constraint> = with.iter().copied().filter(|c| c.expr.coeff(k) < 0).collect();
    for l in &lowers {
        for u in &uppers {
            let a = l.expr.coeff(k);
            let b = -u.expr.coeff(k);
            out.push(Constraint::ge_zero(l.expr.scale(b) + u.expr.scale(a)));
        }
    }
    normalize_all(out)
}

fn implied_by_context(guard: &Constraint, context: &[Constraint]) -> bool {
    context.iter().any(|c| {
        c.kind == guard.kind
            && c.expr.param_coeffs == guard.expr.param_coeffs
            && (c.expr.constant == guard.expr.constant
                || (c.kind == ConstraintKind::Inequality && c.expr.constant <= guard.expr.constant))
    })
}

/// `t >= ceil(expr / div)` or `t <= floor(expr / div)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Bound {
    expr: AffineExpr,
    div: i64,
}

impl Bound {
    fn new(expr: AffineExpr, div: i64) -> Self {
        let g = expr.coeffs.iter()
            .chain(&expr.param_coeffs)
            .fold(expr.constant.abs().gcd(&div), |g, &c| g.gcd(&c.abs()));
        if g > 1 {
            Self { expr: AffineExpr {
                constant: expr.constant / g,
                coeffs: expr.coeffs.iter().map(|&c| c / g).collect(),
                param_coeffs: expr.param_coeffs.iter().map(|&c| c / g).collect(),
            }, div: div / g }
        } else {
            Self { expr, div }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct DimBounds {
    lowers: Vec<Bound>,
    uppers: Vec<Bound>,
}

impl DimBounds {
    /// Fold constant bounds into one and drop duplicates.
    fn simplify(&mut self) {
        fold_bounds(&mut self.lowers, |v, d| Integer::div_ceil(&v, &d), i64::max);
        fold_bounds(&mut self.uppers, |v, d| Integer::div_floor(&v, &d), i64::min);
    }

    fn same_as(&self, other: &DimBounds) -> bool {
        same_set(&self.lowers, &other.lowers) && same_set(&self.uppers, &other.uppers)
    }
}

fn fold_bounds(bounds: &mut Vec<Bound>, round: impl Fn(i64, i64) -> i64, pick: fn(i64, i64) -> i64) {
    let mut constant: Option<Bound> = None;
    let mut kept: Vec<Bound> = Vec::new();
    for b in bounds.drain(..) {
        match b.expr.as_constant() {
            Some(v) => {
                let v = round(v, b.div);
                let v = constant.as_ref().map_or(v, |c| pick(c.expr.constant, v));
                constant = Some(Bound {
                    expr: AffineExpr::constant(v, b.expr.n_dim(), b.expr.n_param()),
                    div: 1,
                });
            }
            None => {
                if !kept.contains(&b) {
                    kept.push(b);
                }
            }
        }
    }
    if let Some(c) = constant {
        kept.insert(0, c);
    }
    *bounds = kept;
}

fn same_set<T: PartialEq>(a: &[T], b: &[T]) -> bool {
    a.len() == b.len() && a.iter().all(|x| b.contains(x))
}

/// A statement taking part in the current scan, with the guards collected
/// on the way down.
#[derive(Debug, Clone)]
struct Member {
    idx: usize,
    guards: Vec<AstExpr>,
}

struct Scan<'a> {
    stmts: &'a [ScannedStmt],
    dims: &'a [String],
    params: &'a [String],
    quiet: bool,
}

impl Scan<'_> {
    fn scan(&self, members: Vec<Member>, d: usize) -> CodegenResult<Vec<AstNode>> {
        if d == self.dims.len() {
            return Ok(members.into_iter().map(|m| self.leaf(m)).collect());
        }

        let values: Option<Vec<i64>> = members.iter()
            .map(|m| self.stmts[m.idx].scalars[d])
            .collect();
        if let Some(values) = values {
            let mut groups: BTreeMap<i64, Vec<Member>> = BTreeMap::new();
            for (m, v) in members.into_iter().zip(values) {
                groups.entry(v).or_default().push(m);
            }
            let mut nodes = Vec::new();
            for (_, group) in groups {
                nodes.extend(self.scan(group, d + 1)?);
            }
            return Ok(nodes);
        }

        let t = &self.dims[d];
        let bounds: Vec<DimBounds> = members.iter().map(|m| self.stmts[m.idx].bounds(d)).collect();
        for (m, b) in members.iter().zip(&bounds) {
            let id = self.stmts[m.idx].id;
            if b.lowers.is_empty() || b.uppers.is_empty() {
                return Err(CodegenError::new(
                    CodegenErrorKind::UnboundedDimension,
                    format!("{} is unbounded {} for {}", t, if b.lowers.is_empty() { "below" } else { "above" }, id),
                ));
            }
        }

        let per_member: Vec<(AstExpr, AstExpr)> = bounds.iter()
            .map(|b| (self.max_of(&b.lowers), self.min_of(&b.uppers)))
            .collect();

        let (lower, upper, members) = if bounds.iter().all(|b| b.same_as(&bounds[0])) {
            let (l, u) = per_member[0].clone();
            (l, u, members)
        } else {
            let lower = per_member.iter().map(|(l, _)| l.clone()).reduce(AstExpr::min);
            let upper = per_member.iter().map(|(_, u)| u.clone()).reduce(AstExpr::max);
            let (Some(lower), Some(upper)) = (lower, upper) else {
                return Ok(Vec::new());
            };
            let members = members.into_iter()
                .zip(per_member)
                .map(|(mut m, (l, u))| {
                    if l != lower {
                        m.guards.push(AstExpr::cmp(AstBinOp::Ge, AstExpr::var(t), l));
                    }
                    if u != upper {
                        m.guards.push(AstExpr::cmp(AstBinOp::Le, AstExpr::var(t), u));
                    }
                    m
                })
                .collect();
            (lower, upper, members)
        };

        if !self.quiet {
            debug!("{}: {:?} .. {:?}", t, lower, upper);
        }
        let body = self.scan(members, d + 1)?;
        Ok(vec![AstNode::For(ForLoop::new(t.clone(), lower, upper, body))])
    }

    fn leaf(&self, m: Member) -> AstNode {
        let stmt = &self.stmts[m.idx];
        let node = AstNode::Stmt {
            id: stmt.id,
            args: stmt.args.iter().map(|a| self.affine(a)).collect(),
        };
        match AstExpr::and_all(m.guards) {
            Some(condition) => AstNode::If { condition, then_body: vec![node], else_body: None },
            None => node,
        }
    }

    fn max_of(&self, bounds: &[Bound]) -> AstExpr {
        bounds.iter()
            .map(|b| self.affine(&b.expr).ceil_div(b.div))
            .reduce(AstExpr::max)
            .unwrap_or(AstExpr::Int(0))
    }

    fn min_of(&self, bounds: &[Bound]) -> AstExpr {
        bounds.iter()
            .map(|b| self.affine(&b.expr).floor_div(b.div))
            .reduce(AstExpr::min)
            .unwrap_or(AstExpr::Int(0))
    }

    /// Render an affine expression over the scattering dimensions and parameters.
    fn affine(&self, e: &AffineExpr) -> AstExpr {
        let terms = e.coeffs.iter()
            .zip(self.dims)
            .chain(e.param_coeffs.iter().zip(self.params))
            .filter(|(&c, _)| c != 0);

        let mut acc: Option<AstExpr> = None;
        for (&c, name) in terms {
            let v = AstExpr::var(name);
            acc = Some(match acc {
                None => AstExpr::int(c).mul(v),
                Some(a) if c > 0 => a.add(AstExpr::int(c).mul(v)),
                Some(a) => a.sub(AstExpr::int(-c).mul(v)),
            });
        }
        match acc {
            Some(a) => a.add(AstExpr::int(e.constant)),
            None => AstExpr::int(e.constant),
        }
    }

    /// A parameter constraint as `lhs >= rhs` (or `==`) with positive terms on each side.
    fn condition(&self, c: &Constraint) -> AstExpr {
        let pos = AffineExpr {
            constant: c.expr.constant.max(0),
            coeffs: c.expr.coeffs.iter().map(|&x| x.max(0)).collect(),
            param_coeffs: c.expr.param_coeffs.iter().map(|&x| x.max(0)).collect(),
        };
        let neg = pos.clone() - c.expr.clone();
        let op = if c.is_equality() { AstBinOp::Eq } else { AstBinOp::Ge };
        AstExpr::cmp(op, self.affine(&pos), self.affine(&neg))
    }
}
