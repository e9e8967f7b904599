//! AST generation driver.
//!
//! Chooses the per-statement optimization ranges, runs the AST generator on
//! the exchange input, applies the annotation pipeline and prints the
//! resulting loop nest.

use crate::codegen::ast::Ast;
use crate::codegen::c::CRenderer;
use crate::codegen::declarations::{generate_declarations, math_macros};
use crate::codegen::input::GeneratorInput;
use crate::codegen::scanner::LoopNestScanner;
use crate::ir::pir::{HyperplaneKind, PolyProgram, Statement, StmtKind};
use crate::options::CodegenOptions;
use crate::transform::pipeline::AnnotationPipeline;
use crate::utils::errors::{CodegenError, CodegenErrorKind, CodegenResult};
use log::{debug, info};
use std::fmt::{self, Write};

/// Range of scattering levels (1-based, inclusive) the generator optimizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DimRange {
    pub first: usize,
    pub last: usize,
}

impl DimRange {
    pub fn new(first: usize, last: usize) -> Self {
        Self { first, last }
    }
}

/// Optimization ranges passed to the generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeSelection {
    /// Same range for all statements
    Uniform(DimRange),
    /// One range per statement, in statement order
    PerStatement(Vec<DimRange>),
}

impl RangeSelection {
    /// Range that applies to statement `idx`.
    pub fn for_statement(&self, idx: usize) -> Option<DimRange> {
        match self {
            RangeSelection::Uniform(r) => Some(*r),
            RangeSelection::PerStatement(rs) => rs.get(idx).copied(),
        }
    }
}

impl fmt::Display for RangeSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangeSelection::Uniform(r) => write!(f, "first/last levels: {} {}", r.first, r.last),
            RangeSelection::PerStatement(rs) => {
                write!(f, "statement-wise first/last levels: ")?;
                for (i, r) in rs.iter().enumerate() {
                    write!(f, "S{}({},{}), ", i + 1, r.first, r.last)?;
                }
                Ok(())
            }
        }
    }
}

/// Parameters of one generator invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorOptions {
    pub ranges: RangeSelection,
    pub backtrack: bool,
    pub strides: bool,
    pub quiet: bool,
    pub share_disjunctions: bool,
    /// Eliminate scalar dimensions by spreading equalities
    pub esp: bool,
}

/// Turns generator input into a loop-nest AST.
pub trait AstGenerator {
    fn generate(&self, input: &GeneratorInput, options: &GeneratorOptions) -> CodegenResult<Ast>;
}

/// First schedule row that scans points rather than tiles.
///
/// For statements of the input program this is the first loop hyperplane
/// after the last tile dimension; for copy statements it is the first row
/// the statement actually varies along. Falls back to 0.
pub fn first_point_loop(stmt: &Statement, prog: &PolyProgram) -> usize {
    let n = prog.num_hyperplanes();
    if stmt.kind != StmtKind::Original {
        return (0..n).find(|&i| !stmt.is_hyperplane_scalar(i)).unwrap_or(0);
    }

    let start = stmt.last_tile_dim.map_or(0, |d| d + 1);
    (start..stmt.num_schedule_rows().min(n))
        .find(|&i| prog.hyperplanes[i].kind == HyperplaneKind::Loop)
        .unwrap_or(0)
}

/// Pick the optimization ranges.
///
/// Precedence: the global option override, then the caller override (both
/// ends must be at least 1), then tile-aware per-statement ranges when tiling
/// is on, then `1..=num_hyperplanes`.
pub fn select_ranges(
    prog: &PolyProgram,
    opts: &CodegenOptions,
    caller: Option<(usize, usize)>,
) -> RangeSelection {
    if let Some((first, last)) = opts.global_range() {
        return RangeSelection::Uniform(DimRange::new(first, last));
    }
    if let Some((first, last)) = caller.filter(|&(f, l)| f >= 1 && l >= 1) {
        return RangeSelection::Uniform(DimRange::new(first, last));
    }
    let n = prog.num_hyperplanes();
    if opts.tile {
        return RangeSelection::PerStatement(
            prog.statements.iter()
                .map(|s| DimRange::new(first_point_loop(s, prog) + 1, n))
                .collect(),
        );
    }
    RangeSelection::Uniform(DimRange::new(1, n))
}

/// Generator parameters for a program under the given options.
pub fn generator_options(
    prog: &PolyProgram,
    opts: &CodegenOptions,
    caller: Option<(usize, usize)>,
) -> GeneratorOptions {
    let ranges = select_ranges(prog, opts, caller);
    if !opts.silent {
        info!("using {}", ranges);
    }
    GeneratorOptions {
        ranges,
        backtrack: opts.backtrack,
        strides: true,
        quiet: !opts.debug,
        share_disjunctions: opts.share_disjunctions,
        esp: true,
    }
}

/// Drives the generator and the annotation passes.
#[derive(Debug, Default)]
pub struct CodegenDriver<G = LoopNestScanner> {
    generator: G,
}

impl CodegenDriver<LoopNestScanner> {
    pub fn new() -> Self {
        Self { generator: LoopNestScanner::new() }
    }
}

impl<G: AstGenerator> CodegenDriver<G> {
    /// Use a different AST generator.
    pub fn with_generator(generator: G) -> Self {
        Self { generator }
    }

    /// Generate the annotated AST for a program.
    pub fn build_ast(
        &self,
        prog: &PolyProgram,
        opts: &CodegenOptions,
        input: &GeneratorInput,
        caller: Option<(usize, usize)>,
    ) -> CodegenResult<Ast> {
        let gen_opts = generator_options(prog, opts, caller);
        debug!("Running AST generator");
        let mut ast = self.generator.generate(input, &gen_opts)?;
        AnnotationPipeline::from_options(opts).run(prog, &mut ast)?;
        Ok(ast)
    }

    /// Generate the framed loop nest for a program into `out`.
    pub fn generate_code<W: Write>(
        &self,
        prog: &PolyProgram,
        opts: &CodegenOptions,
        input: &GeneratorInput,
        caller: Option<(usize, usize)>,
        out: &mut W,
    ) -> CodegenResult<()> {
        let ast = self.build_ast(prog, opts, input, caller)?;
        let body = CRenderer::new().render(&ast);
        write_out(out, "/* Start of generated loop nest */\n")?;
        write_out(out, &body)?;
        write_out(out, "/* End of generated loop nest */\n")
    }

    /// Generate a complete multicore translation unit.
    pub fn multicore_codegen<W: Write>(
        &self,
        prog: &PolyProgram,
        opts: &CodegenOptions,
        out: &mut W,
    ) -> CodegenResult<()> {
        // Fails on a bad indvar type before anything is written
        let decls = generate_declarations(prog, opts)?;

        if opts.parallel {
            write_out(out, "#include <omp.h>\n\n")?;
        }
        write_out(out, math_macros())?;
        write_out(out, "\n")?;
        write_out(out, &decls)?;
        if opts.multipar {
            write_out(out, "\tomp_set_nested(1);\n")?;
            write_out(out, "\tomp_set_num_threads(2);\n")?;
        }

        let input = GeneratorInput::from_program(prog);
        self.generate_code(prog, opts, &input, None, out)
    }
}

fn write_out<W: Write>(out: &mut W, s: &str) -> CodegenResult<()> {
    out.write_str(s)
        .map_err(|e| CodegenError::new(CodegenErrorKind::Generator, format!("cannot write generated code: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::pir::{HyperplaneProperty, StatementBuilder};
    use crate::polyhedral::IntegerSet;

    /// Six hyperplanes: two tile loops, a scalar, then three point loops.
    fn tiled_program() -> PolyProgram {
        let mut prog = PolyProgram::new("tiled", vec!["N".into()]);
        prog.hyperplanes = vec![
            HyperplaneProperty::parallel_loop(),
            HyperplaneProperty::sequential_loop(),
            HyperplaneProperty::scalar(),
            HyperplaneProperty::sequential_loop(),
            HyperplaneProperty::parallel_loop(),
            HyperplaneProperty::parallel_loop(),
        ];
        let rows = vec![
            vec![1, 0, 0, 0, 0, 0, 0],
            vec![0, 1, 0, 0, 0, 0, 0],
            vec![0, 0, 0, 0, 0, 0, 0],
            vec![0, 0, 1, 0, 0, 0, 0],
            vec![0, 0, 0, 1, 0, 0, 0],
            vec![0, 0, 0, 0, 1, 0, 0],
        ];
        prog.add_statement(
            StatementBuilder::new(IntegerSet::parametric_box(&[0; 5], 1), "s;")
                .iterators(["it", "jt", "i", "j", "k"])
                .schedule_rows(&rows)
                .last_tile_dim(3),
        );
        prog
    }

    #[test]
    fn test_first_point_loop_skips_tile_space() {
        let prog = tiled_program();
        assert_eq!(first_point_loop(&prog.statements[0], &prog), 4);
    }

    #[test]
    fn test_tile_aware_ranges() {
        let prog = tiled_program();
        let opts = CodegenOptions::new().tile(true);
        assert_eq!(
            select_ranges(&prog, &opts, None),
            RangeSelection::PerStatement(vec![DimRange::new(5, 6)])
        );
    }

    #[test]
    fn test_range_precedence() {
        let prog = tiled_program();
        let opts = CodegenOptions::new().tile(true);
        assert_eq!(
            select_ranges(&prog, &opts, Some((2, 3))),
            RangeSelection::Uniform(DimRange::new(2, 3))
        );
        // Caller override with a zero end is ignored
        assert!(matches!(select_ranges(&prog, &opts, Some((0, 3))), RangeSelection::PerStatement(_)));
        // Global override wins over the caller
        let opts = opts.loop_range(1, 4);
        assert_eq!(
            select_ranges(&prog, &opts, Some((2, 3))),
            RangeSelection::Uniform(DimRange::new(1, 4))
        );
        assert_eq!(
            select_ranges(&prog, &CodegenOptions::new(), None),
            RangeSelection::Uniform(DimRange::new(1, 6))
        );
    }

    #[test]
    fn test_copy_statement_first_point_loop() {
        let mut prog = tiled_program();
        prog.statements[0].kind = StmtKind::CopyIn;
        assert_eq!(first_point_loop(&prog.statements[0], &prog), 0);
        prog.statements[0].schedule.as_mut().unwrap().outputs[0] =
            crate::polyhedral::AffineExpr::constant(0, 5, 1);
        assert_eq!(first_point_loop(&prog.statements[0], &prog), 1);
    }

    #[test]
    fn test_generator_options() {
        let prog = tiled_program();
        let g = generator_options(&prog, &CodegenOptions::new().debug(true).silent(true), None);
        assert!(g.strides && g.esp && g.backtrack);
        assert!(!g.quiet);
    }

    #[test]
    fn test_range_display() {
        let r = RangeSelection::PerStatement(vec![DimRange::new(5, 6), DimRange::new(1, 6)]);
        assert_eq!(r.to_string(), "statement-wise first/last levels: S1(5,6), S2(1,6), ");
    }
}
