//! Loop-nest AST produced by the generator and annotated by the transform passes.

use crate::ir::pir::StmtId;
use std::collections::BTreeSet;

/// A generated loop nest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ast {
    pub body: Vec<AstNode>,
}

/// A node in the generated AST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AstNode {
    /// A for loop
    For(ForLoop),
    /// An if statement
    If {
        condition: AstExpr,
        then_body: Vec<AstNode>,
        else_body: Option<Vec<AstNode>>,
    },
    /// A statement instance
    Stmt {
        id: StmtId,
        args: Vec<AstExpr>,
    },
    /// A block of statements
    Block {
        statements: Vec<AstNode>,
    },
}

/// Directives attached to a loop by the annotation passes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Directives {
    pub parallel: bool,
    pub vector: bool,
    /// Unroll-jam factor, once marked
    pub unroll_jam: Option<usize>,
}

impl Directives {
    pub fn is_empty(&self) -> bool {
        !self.parallel && !self.vector && self.unroll_jam.is_none()
    }
}

/// A `for` loop over one scattering dimension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForLoop {
    pub iterator: String,
    pub lower: AstExpr,
    pub upper: AstExpr,
    pub step: i64,
    pub body: Vec<AstNode>,
    pub directives: Directives,
    /// Variables made private when the loop is parallel
    pub private_vars: Vec<String>,
}

impl ForLoop {
    pub fn new(iterator: impl Into<String>, lower: AstExpr, upper: AstExpr, body: Vec<AstNode>) -> Self {
        Self {
            iterator: iterator.into(),
            lower,
            upper,
            step: 1,
            body,
            directives: Directives::default(),
            private_vars: Vec::new(),
        }
    }

    /// Statements executed anywhere inside the loop.
    pub fn stmt_ids(&self) -> BTreeSet<StmtId> {
        let mut ids = BTreeSet::new();
        collect_stmt_ids(&self.body, &mut ids);
        ids
    }
}

impl Ast {
    pub fn new(body: Vec<AstNode>) -> Self {
        Self { body }
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// All loops, outermost first.
    pub fn loops(&self) -> Vec<&ForLoop> {
        let mut out = Vec::new();
        collect_loops(&self.body, &mut out);
        out
    }

    /// Loops iterating over the given dimension.
    pub fn loops_over(&self, iterator: &str) -> Vec<&ForLoop> {
        self.loops().into_iter().filter(|l| l.iterator == iterator).collect()
    }

    /// Visit every loop mutably, outer loops before the loops they contain.
    pub fn for_each_loop_mut<F: FnMut(&mut ForLoop)>(&mut self, mut f: F) {
        visit_loops_mut(&mut self.body, &mut f);
    }

    pub fn stmt_ids(&self) -> BTreeSet<StmtId> {
        let mut ids = BTreeSet::new();
        collect_stmt_ids(&self.body, &mut ids);
        ids
    }
}

fn collect_loops<'a>(nodes: &'a [AstNode], out: &mut Vec<&'a ForLoop>) {
    for node in nodes {
        match node {
            AstNode::For(l) => {
                out.push(l);
                collect_loops(&l.body, out);
            }
            AstNode::If { then_body, else_body, .. } => {
                collect_loops(then_body, out);
                if let Some(e) = else_body {
                    collect_loops(e, out);
                }
            }
            AstNode::Block { statements } => collect_loops(statements, out),
            AstNode::Stmt { .. } => {}
        }
    }
}

fn visit_loops_mut<F: FnMut(&mut ForLoop)>(nodes: &mut [AstNode], f: &mut F) {
    for node in nodes {
        match node {
            AstNode::For(l) => {
                f(l);
                visit_loops_mut(&mut l.body, f);
            }
            AstNode::If { then_body, else_body, .. } => {
                visit_loops_mut(then_body, f);
                if let Some(e) = else_body {
                    visit_loops_mut(e, f);
                }
            }
            AstNode::Block { statements } => visit_loops_mut(statements, f),
            AstNode::Stmt { .. } => {}
        }
    }
}

pub(crate) fn collect_stmt_ids(nodes: &[AstNode], ids: &mut BTreeSet<StmtId>) {
    for node in nodes {
        match node {
            AstNode::For(l) => collect_stmt_ids(&l.body, ids),
            AstNode::If { then_body, else_body, .. } => {
                collect_stmt_ids(then_body, ids);
                if let Some(e) = else_body {
                    collect_stmt_ids(e, ids);
                }
            }
            AstNode::Stmt { id, .. } => {
                ids.insert(*id);
            }
            AstNode::Block { statements } => collect_stmt_ids(statements, ids),
        }
    }
}

impl AstNode {
    /// Replace every use of `var` with `value`.
    pub fn substitute(&self, var: &str, value: &AstExpr) -> AstNode {
        match self {
            AstNode::For(l) => AstNode::For(ForLoop {
                iterator: l.iterator.clone(),
                lower: l.lower.substitute(var, value),
                upper: l.upper.substitute(var, value),
                step: l.step,
                body: l.body.iter().map(|n| n.substitute(var, value)).collect(),
                directives: l.directives,
                private_vars: l.private_vars.clone(),
            }),
            AstNode::If { condition, then_body, else_body } => AstNode::If {
                condition: condition.substitute(var, value),
                then_body: then_body.iter().map(|n| n.substitute(var, value)).collect(),
                else_body: else_body.as_ref()
                    .map(|e| e.iter().map(|n| n.substitute(var, value)).collect()),
            },
            AstNode::Stmt { id, args } => AstNode::Stmt {
                id: *id,
                args: args.iter().map(|a| a.substitute(var, value)).collect(),
            },
            AstNode::Block { statements } => AstNode::Block {
                statements: statements.iter().map(|n| n.substitute(var, value)).collect(),
            },
        }
    }

    /// Whether `var` appears in a loop bound or guard of this subtree.
    pub fn bounds_mention(&self, var: &str) -> bool {
        match self {
            AstNode::For(l) => {
                l.lower.mentions(var)
                    || l.upper.mentions(var)
                    || l.body.iter().any(|n| n.bounds_mention(var))
            }
            AstNode::If { condition, then_body, else_body } => {
                condition.mentions(var)
                    || then_body.iter().any(|n| n.bounds_mention(var))
                    || else_body.as_ref().map_or(false, |e| e.iter().any(|n| n.bounds_mention(var)))
            }
            AstNode::Stmt { .. } => false,
            AstNode::Block { statements } => statements.iter().any(|n| n.bounds_mention(var)),
        }
    }
}

/// An expression in the generated AST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AstExpr {
    /// Integer constant
    Int(i64),
    /// Variable
    Var(String),
    /// Binary operation
    Binary {
        op: AstBinOp,
        left: Box<AstExpr>,
        right: Box<AstExpr>,
    },
    /// Minimum
    Min(Box<AstExpr>, Box<AstExpr>),
    /// Maximum
    Max(Box<AstExpr>, Box<AstExpr>),
    /// Floor division
    FloorDiv(Box<AstExpr>, Box<AstExpr>),
    /// Ceiling division
    CeilDiv(Box<AstExpr>, Box<AstExpr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AstBinOp {
    Add, Sub, Mul, Div, Mod,
    Lt, Le, Gt, Ge, Eq, Ne,
    And, Or,
}

impl AstBinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            AstBinOp::Add => "+",
            AstBinOp::Sub => "-",
            AstBinOp::Mul => "*",
            AstBinOp::Div => "/",
            AstBinOp::Mod => "%",
            AstBinOp::Lt => "<",
            AstBinOp::Le => "<=",
            AstBinOp::Gt => ">",
            AstBinOp::Ge => ">=",
            AstBinOp::Eq => "==",
            AstBinOp::Ne => "!=",
            AstBinOp::And => "&&",
            AstBinOp::Or => "||",
        }
    }

    /// C precedence, higher binds tighter.
    pub fn precedence(self) -> u8 {
        match self {
            AstBinOp::Or => 1,
            AstBinOp::And => 2,
            AstBinOp::Eq | AstBinOp::Ne => 3,
            AstBinOp::Lt | AstBinOp::Le | AstBinOp::Gt | AstBinOp::Ge => 4,
            AstBinOp::Add | AstBinOp::Sub => 5,
            AstBinOp::Mul | AstBinOp::Div | AstBinOp::Mod => 6,
        }
    }
}

impl AstExpr {
    pub fn int(v: i64) -> Self { Self::Int(v) }
    pub fn var(name: &str) -> Self { Self::Var(name.to_string()) }

    fn binary(op: AstBinOp, left: Self, right: Self) -> Self {
        Self::Binary { op, left: Box::new(left), right: Box::new(right) }
    }

    pub fn add(self, other: Self) -> Self {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => Self::Int(a + b),
            (e, Self::Int(0)) | (Self::Int(0), e) => e,
            (e, Self::Int(b)) => {
                let (base, c) = e.split_constant();
                base.offset(c + b)
            }
            (l, r) => Self::binary(AstBinOp::Add, l, r),
        }
    }

    pub fn sub(self, other: Self) -> Self {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => Self::Int(a - b),
            (e, Self::Int(b)) => e.add(Self::Int(-b)),
            (l, r) => Self::binary(AstBinOp::Sub, l, r),
        }
    }

    /// Split `e + c` / `e - c` into `e` and the signed constant.
    fn split_constant(self) -> (Self, i64) {
        match self {
            Self::Binary { op: op @ (AstBinOp::Add | AstBinOp::Sub), left, right } => match *right {
                Self::Int(c) if op == AstBinOp::Add => (*left, c),
                Self::Int(c) => (*left, -c),
                r => (Self::binary(op, *left, r), 0),
            },
            e => (e, 0),
        }
    }

    fn offset(self, c: i64) -> Self {
        match self {
            Self::Int(a) => Self::Int(a + c),
            e if c == 0 => e,
            e if c < 0 => Self::binary(AstBinOp::Sub, e, Self::Int(-c)),
            e => Self::binary(AstBinOp::Add, e, Self::Int(c)),
        }
    }

    pub fn mul(self, other: Self) -> Self {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => Self::Int(a * b),
            (Self::Int(1), e) | (e, Self::Int(1)) => e,
            (l, r) => Self::binary(AstBinOp::Mul, l, r),
        }
    }

    pub fn cmp(op: AstBinOp, left: Self, right: Self) -> Self {
        Self::binary(op, left, right)
    }

    /// Conjunction of conditions; `None` when empty.
    pub fn and_all(conds: impl IntoIterator<Item = Self>) -> Option<Self> {
        conds.into_iter().reduce(|acc, c| Self::binary(AstBinOp::And, acc, c))
    }

    pub fn min(self, other: Self) -> Self {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => Self::Int(a.min(b)),
            (a, b) if a == b => a,
            (a, b) => Self::Min(Box::new(a), Box::new(b)),
        }
    }

    pub fn max(self, other: Self) -> Self {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => Self::Int(a.max(b)),
            (a, b) if a == b => a,
            (a, b) => Self::Max(Box::new(a), Box::new(b)),
        }
    }

    pub fn floor_div(self, d: i64) -> Self {
        match self {
            e if d == 1 => e,
            Self::Int(n) => Self::Int(num_integer::Integer::div_floor(&n, &d)),
            e => Self::FloorDiv(Box::new(e), Box::new(Self::Int(d))),
        }
    }

    pub fn ceil_div(self, d: i64) -> Self {
        match self {
            e if d == 1 => e,
            Self::Int(n) => Self::Int(num_integer::Integer::div_ceil(&n, &d)),
            e => Self::CeilDiv(Box::new(e), Box::new(Self::Int(d))),
        }
    }

    /// Replace every occurrence of variable `var` with `value`.
    pub fn substitute(&self, var: &str, value: &AstExpr) -> AstExpr {
        match self {
            Self::Var(name) if name == var => value.clone(),
            Self::Int(_) | Self::Var(_) => self.clone(),
            Self::Binary { op, left, right } => Self::binary(
                *op,
                left.substitute(var, value),
                right.substitute(var, value),
            ),
            Self::Min(a, b) => Self::Min(Box::new(a.substitute(var, value)), Box::new(b.substitute(var, value))),
            Self::Max(a, b) => Self::Max(Box::new(a.substitute(var, value)), Box::new(b.substitute(var, value))),
            Self::FloorDiv(a, b) => Self::FloorDiv(Box::new(a.substitute(var, value)), Box::new(b.substitute(var, value))),
            Self::CeilDiv(a, b) => Self::CeilDiv(Box::new(a.substitute(var, value)), Box::new(b.substitute(var, value))),
        }
    }

    /// Whether variable `var` occurs in the expression.
    pub fn mentions(&self, var: &str) -> bool {
        match self {
            Self::Int(_) => false,
            Self::Var(name) => name == var,
            Self::Binary { left, right, .. } => left.mentions(var) || right.mentions(var),
            Self::Min(a, b) | Self::Max(a, b) | Self::FloorDiv(a, b) | Self::CeilDiv(a, b) => {
                a.mentions(var) || b.mentions(var)
            }
        }
    }
}
