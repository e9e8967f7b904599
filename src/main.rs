//! PolyEmit Command Line Interface
//!
//! Usage:
//!   polyemit [OPTIONS] <input-file>
//!   polyemit --help
//!
//! Examples:
//!   polyemit gemm.json                          # Plain loop nest
//!   polyemit --parallel --prevector gemm.json   # OpenMP + vector hints
//!   polyemit --tile --parallel --multipar --pragmas .pragmas gemm.json
//!   polyemit --emit=input gemm.json             # Just dump the generator input

use clap::{Parser, ValueEnum};
use polyemit::codegen::{generate_declarations, GeneratorInput};
use polyemit::options::{CodegenOptions, DEFAULT_UFACTOR};
use polyemit::transform::omp_parallelize;
use std::path::PathBuf;
use std::fs;
use anyhow::{Result, Context};
use log::{info, debug, warn};

/// PolyEmit - Polyhedral Code Generation Back End
#[derive(Parser, Debug)]
#[command(name = "polyemit")]
#[command(version)]
#[command(about = "Generates annotated C loop nests from a scheduled polyhedral program", long_about = None)]
struct Cli {
    /// Scheduled program (JSON)
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Output file (defaults to stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// The schedule is tiled; optimize point loops only
    #[arg(long)]
    tile: bool,

    /// Mark parallel loops with OpenMP
    #[arg(long)]
    parallel: bool,

    /// Extract up to two degrees of parallelism
    #[arg(long)]
    multipar: bool,

    /// Mark vectorizable innermost loops
    #[arg(long)]
    prevector: bool,

    /// Unroll-jam loops flagged for unrolling
    #[arg(long)]
    unrolljam: bool,

    /// Unroll-jam factor
    #[arg(long, default_value_t = DEFAULT_UFACTOR)]
    ufactor: usize,

    /// Width of the generated scalars (32 or 64)
    #[arg(long, default_value_t = 32)]
    indvar_type: u32,

    /// First scattering level to optimize
    #[arg(long)]
    first_loop: Option<usize>,

    /// Last scattering level to optimize
    #[arg(long)]
    last_loop: Option<usize>,

    /// Prefix statement macros with their schedule for Bee/Cl@k
    #[arg(long)]
    bee: bool,

    /// Write parallel annotations to this file
    #[arg(long, value_name = "FILE")]
    pragmas: Option<PathBuf>,

    /// What to emit
    #[arg(long, default_value = "code")]
    emit: EmitKind,

    /// Generator debug output
    #[arg(long)]
    debug: bool,

    /// Suppress informational output
    #[arg(long)]
    silent: bool,

    /// Verbose output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum EmitKind {
    /// Complete translation unit
    Code,
    /// Generator input document
    Input,
    /// Statement macros and declarations
    Declarations,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.silent {
        log::LevelFilter::Error
    } else if cli.debug {
        log::LevelFilter::Debug
    } else {
        match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();

    info!("PolyEmit v{}", polyemit::VERSION);
    debug!("Input file: {:?}", cli.input);

    let source = fs::read_to_string(&cli.input)
        .with_context(|| format!("Failed to read input file: {:?}", cli.input))?;
    let program = polyemit::parse_program(&source)
        .with_context(|| "Failed to parse program description")?;

    let opts = build_options(&cli);
    debug!("Codegen options: {:?}", opts);

    let output = match cli.emit {
        EmitKind::Input => GeneratorInput::from_program(&program).to_string(),
        EmitKind::Declarations => generate_declarations(&program, &opts)?,
        EmitKind::Code => polyemit::multicore_codegen(&program, &opts)
            .with_context(|| format!("Code generation failed for {}", program.name))?,
    };

    if let (true, Some(path)) = (opts.parallel, &cli.pragmas) {
        match omp_parallelize(&program, &opts, path) {
            Ok(n) => info!("marked {} loop(s) parallel in {:?}", n, path),
            Err(e) if !e.is_fatal() => warn!("{}; continuing without annotations", e),
            Err(e) => return Err(e.into()),
        }
    }

    write_output(&cli.output, &output)
}

fn build_options(cli: &Cli) -> CodegenOptions {
    let mut opts = CodegenOptions::new()
        .tile(cli.tile)
        .parallel(cli.parallel)
        .multipar(cli.multipar)
        .prevector(cli.prevector)
        .indvar_type(cli.indvar_type)
        .debug(cli.debug)
        .silent(cli.silent)
        .bee(cli.bee);

    if cli.unrolljam {
        opts = opts.unroll_jam(cli.ufactor);
    }
    opts.first_loop = cli.first_loop;
    opts.last_loop = cli.last_loop;

    opts
}

fn write_output(path: &Option<PathBuf>, content: &str) -> Result<()> {
    match path {
        Some(p) => {
            fs::write(p, content)
                .with_context(|| format!("Failed to write output file: {:?}", p))?;
        }
        None => {
            print!("{}", content);
        }
    }
    Ok(())
}
