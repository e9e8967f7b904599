//! Code generation from the scheduled polyhedral program.
//!
//! The flow is: [`GeneratorInput`] (exchange document) → [`AstGenerator`]
//! (loop-nest AST) → annotation passes → [`CRenderer`] (C text), with
//! statement macros and declarations from [`declarations`].

pub mod ast;
pub mod c;
pub mod declarations;
pub mod driver;
pub mod input;
pub mod scanner;

pub use ast::{Ast, AstExpr, AstNode, ForLoop, Directives};
pub use c::CRenderer;
pub use declarations::{generate_declarations, math_macros};
pub use driver::{AstGenerator, CodegenDriver, DimRange, GeneratorOptions, RangeSelection};
pub use input::GeneratorInput;
pub use scanner::LoopNestScanner;

use crate::ir::pir::PolyProgram;
use crate::options::CodegenOptions;
use crate::utils::errors::CodegenResult;

/// Generate the framed loop nest for a program with the default generator.
pub fn generate_code(prog: &PolyProgram, opts: &CodegenOptions) -> CodegenResult<String> {
    let input = GeneratorInput::from_program(prog);
    let mut out = String::new();
    CodegenDriver::new().generate_code(prog, opts, &input, None, &mut out)?;
    Ok(out)
}

/// Generate a complete multicore translation unit with the default generator.
pub fn multicore_codegen(prog: &PolyProgram, opts: &CodegenOptions) -> CodegenResult<String> {
    let mut out = String::new();
    CodegenDriver::new().multicore_codegen(prog, opts, &mut out)?;
    Ok(out)
}
