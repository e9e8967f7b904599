//! Polyhedral Intermediate Representation (PIR).
//!
//! The PIR is the already-scheduled program handed to the code generator:
//! - Statements with iteration domains and body text
//! - One affine schedule per statement (rows are hyperplanes)
//! - Per-hyperplane properties (loop/scalar, dependence class, unroll flag)
//! - Parameter names and contexts

use crate::polyhedral::{AffineMap, IntegerSet};
use serde::{Serialize, Deserialize};

/// A unique identifier for PIR statements. Zero-based; printed one-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StmtId(pub usize);

impl StmtId {
    pub fn new(id: usize) -> Self { Self(id) }

    /// One-based number used in generated names (`S1`, `T(S1)`).
    pub fn number(self) -> usize { self.0 + 1 }
}

impl std::fmt::Display for StmtId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "S{}", self.number())
    }
}

/// Origin of a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StmtKind {
    /// A statement of the input program
    #[default]
    Original,
    /// Data movement into a local buffer
    CopyIn,
    /// Data movement out of a local buffer
    CopyOut,
}

/// A statement in polyhedral form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Statement {
    pub id: StmtId,
    /// Iteration domain
    pub domain: IntegerSet,
    /// Schedule: one output per hyperplane
    #[serde(default)]
    pub schedule: Option<AffineMap>,
    /// Original iterator names, needed for the statement macro
    #[serde(default)]
    pub iterators: Option<Vec<String>>,
    /// Body text, substituted into the statement macro
    pub text: String,
    #[serde(default)]
    pub kind: StmtKind,
    /// Last schedule row that belongs to the tile space
    #[serde(default)]
    pub last_tile_dim: Option<usize>,
}

impl Statement {
    /// Dimensionality of the iteration domain.
    pub fn dim(&self) -> usize {
        self.domain.dim()
    }

    pub fn num_schedule_rows(&self) -> usize {
        self.schedule.as_ref().map_or(0, |s| s.n_out())
    }

    /// Whether schedule row `row` does not depend on this statement's iterators.
    pub fn is_hyperplane_scalar(&self, row: usize) -> bool {
        self.schedule.as_ref().map_or(true, |s| s.is_row_scalar(row))
    }

    /// Constant value of schedule row `row` when it is scalar and parameter free.
    pub fn scalar_value(&self, row: usize) -> Option<i64> {
        self.schedule.as_ref()?.outputs.get(row)?.as_constant()
    }
}

/// Whether a hyperplane produces a loop or only a textual ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HyperplaneKind {
    #[default]
    Loop,
    Scalar,
}

/// Dependence satisfaction class of a hyperplane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DepClass {
    /// Carries no dependence
    Parallel,
    #[default]
    Sequential,
    /// Pipelined parallel; annotated like `Sequential`
    Pipelined,
}

/// Properties of one schedule dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HyperplaneProperty {
    pub kind: HyperplaneKind,
    pub dep_class: DepClass,
    /// Flagged for unroll-jam
    #[serde(default)]
    pub unroll: bool,
}

impl HyperplaneProperty {
    pub fn new(kind: HyperplaneKind, dep_class: DepClass) -> Self {
        Self { kind, dep_class, unroll: false }
    }

    pub fn parallel_loop() -> Self {
        Self::new(HyperplaneKind::Loop, DepClass::Parallel)
    }

    pub fn sequential_loop() -> Self {
        Self::new(HyperplaneKind::Loop, DepClass::Sequential)
    }

    pub fn scalar() -> Self {
        Self::new(HyperplaneKind::Scalar, DepClass::Sequential)
    }

    pub fn with_unroll(mut self) -> Self {
        self.unroll = true;
        self
    }

    /// A loop dimension carrying no dependence.
    pub fn is_parallel_loop(&self) -> bool {
        self.dep_class == DepClass::Parallel && self.kind != HyperplaneKind::Scalar
    }
}

/// A complete scheduled program.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolyProgram {
    /// Name of the program/function
    pub name: String,
    /// Symbolic parameters (N, M, K, etc.)
    pub parameters: Vec<String>,
    /// Parameter values for which the program is valid
    pub param_context: IntegerSet,
    /// Extra parameter constraints known at code generation time
    pub codegen_context: IntegerSet,
    /// Statements in the program
    pub statements: Vec<Statement>,
    /// One entry per schedule row
    pub hyperplanes: Vec<HyperplaneProperty>,
}

impl PolyProgram {
    pub fn new(name: impl Into<String>, parameters: Vec<String>) -> Self {
        let n_param = parameters.len();
        Self {
            name: name.into(),
            param_context: IntegerSet::param_universe(n_param).with_param_names(parameters.clone()),
            codegen_context: IntegerSet::param_universe(n_param).with_param_names(parameters.clone()),
            parameters,
            statements: Vec::new(),
            hyperplanes: Vec::new(),
        }
    }

    pub fn num_hyperplanes(&self) -> usize {
        self.hyperplanes.len()
    }

    pub fn num_params(&self) -> usize {
        self.parameters.len()
    }

    /// Get a statement by ID.
    pub fn get_stmt(&self, id: StmtId) -> Option<&Statement> {
        self.statements.iter().find(|s| s.id == id)
    }

    /// Append a statement, assigning the next ID.
    pub fn add_statement(&mut self, builder: StatementBuilder) -> StmtId {
        let id = StmtId(self.statements.len());
        self.statements.push(builder.build(id));
        id
    }

    /// Whether hyperplane `depth` is a loop dimension carrying no dependence.
    pub fn is_parallel_hyperplane(&self, depth: usize) -> bool {
        self.hyperplanes.get(depth).map_or(false, |h| h.is_parallel_loop())
    }

    /// Deepest schedule row used by any of the given statements.
    pub fn max_schedule_depth(&self, ids: &[StmtId]) -> usize {
        ids.iter()
            .filter_map(|&id| self.get_stmt(id))
            .map(|s| s.num_schedule_rows())
            .max()
            .unwrap_or(0)
    }
}

/// Builder for constructing statements.
#[derive(Debug)]
pub struct StatementBuilder {
    domain: IntegerSet,
    text: String,
    schedule: Option<AffineMap>,
    iterators: Option<Vec<String>>,
    kind: StmtKind,
    last_tile_dim: Option<usize>,
}

impl StatementBuilder {
    pub fn new(domain: IntegerSet, text: impl Into<String>) -> Self {
        Self {
            domain,
            text: text.into(),
            schedule: None,
            iterators: None,
            kind: StmtKind::Original,
            last_tile_dim: None,
        }
    }

    pub fn schedule(mut self, schedule: AffineMap) -> Self {
        self.schedule = Some(schedule);
        self
    }

    /// Schedule given as rows of iterator coefficients, parameter coefficients and constant.
    pub fn schedule_rows(self, rows: &[Vec<i64>]) -> Self {
        let map = AffineMap::from_matrix(self.domain.dim(), self.domain.n_param(), rows);
        self.schedule(map)
    }

    pub fn iterators<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.iterators = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn kind(mut self, kind: StmtKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn last_tile_dim(mut self, dim: usize) -> Self {
        self.last_tile_dim = Some(dim);
        self
    }

    pub fn build(self, id: StmtId) -> Statement {
        let domain = match &self.iterators {
            Some(names) if names.len() == self.domain.dim() => {
                self.domain.with_dim_names(names.clone())
            }
            _ => self.domain,
        };
        Statement {
            id,
            domain,
            schedule: self.schedule,
            iterators: self.iterators,
            text: self.text,
            kind: self.kind,
            last_tile_dim: self.last_tile_dim,
        }
    }
}
