extern crate clap;
extern crate thiserror;

pub mod bytecode;
pub mod codegen;
pub mod interpreter;
pub mod jit;
pub mod lexer;
pub mod optimizer;
pub mod parser;

use std::{
    collections::HashSet,
    error::Error as StdError,
    fs::{self, File},
    io::{self, BufWriter, Write},
    path::PathBuf,
    process::ExitCode,
    time::Instant,
};

use clap::{ArgAction, Parser, ValueEnum};
use colored::Colorize;
use log::{info, warn, LevelFilter};
use thiserror::Error;

use crate::{
    bytecode::Program,
    codegen::{Architecture, ArchitectureError},
    interpreter::{bytecode_interpreter::ByteCodeInterpreter, Runtime, RuntimeError},
    jit::JitError,
    lexer::{lexer::Lexer, Token},
    optimizer::optimize,
    parser::{parser::Parser as ProgramParser, ParserError},
};

/// Brainf**k compiler: assembly output for x86_64/arm32, an x86_64 JIT and a debug interpreter
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// The `.bf` file to compile
    #[arg()]
    file: PathBuf,

    /// Enable every optimization, the default unless a subset is picked
    #[arg(short, long)]
    all_optimizations: bool,

    /// Only enable these optimizations
    #[arg(long, value_enum, num_args = 1.., conflicts_with = "all_optimizations")]
    optimizations: Vec<Optimizations>,

    /// Compile the source exactly as written
    #[arg(short, long, conflicts_with_all = ["all_optimizations", "optimizations"])]
    no_optimizations: bool,

    /// Run the checked interpreter, tracing every instruction to `<file>.dbg`
    #[arg(short, long)]
    debug: bool,

    /// -v for phase timings, -vv for debug logs
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Compile to native code and run it in-process
    #[arg(short, long)]
    jit: bool,

    /// Stop after this many instructions, 0 is unlimited (interpreter only)
    #[arg(short = 'c', long, default_value_t = 0)]
    max_cycles: u64,

    /// Tape size in cells
    #[arg(short, long, default_value_t = 30_000, value_parser = parse_memory_size)]
    memory_size: usize,

    /// Target architecture, defaults to the host
    #[arg(short, long, value_enum)]
    target: Option<Architecture>,

    /// Output file, defaults to the source with its extension replaced
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print internal stages to stderr
    #[arg(long, value_enum, num_args = 1..)]
    dump: Vec<Dump>,
}

fn parse_memory_size(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) => Err("the tape needs at least one cell".to_owned()),
        Ok(size) => Ok(size),
        Err(e) => Err(e.to_string()),
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum Optimizations {
    /// Merge runs of the same instruction into one
    RunLength,
    /// `[-]` becomes a single clear
    ClearLoop,
    /// `[->+<]` and friends become a single transfer
    TransferLoop,
}

#[derive(ValueEnum, Debug, Clone, Copy, Hash, PartialEq, Eq)]
enum Dump {
    /// Output the lexer
    Tokens,
    /// Output the final bytecode
    Bytecode,
    /// Output how often each instruction appears
    Frequencies,
}

#[derive(Error, Debug)]
enum Error {
    #[error("Expected a `.bf` file but got {0}")]
    InvalidExtension(PathBuf),

    #[error("Failed to read {path}")]
    Source {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Parser(#[from] ParserError),

    #[error(transparent)]
    Architecture(#[from] ArchitectureError),

    #[error(transparent)]
    Jit(#[from] JitError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error("IO Error")]
    Io(#[from] io::Error),
}

/// Phase timings on stderr, stdout belongs to the compiled program
struct Timer {
    enabled: bool,
}

impl Timer {
    fn phase<T>(&self, name: &str, f: impl FnOnce() -> T) -> T {
        if !self.enabled {
            return f();
        }

        eprintln!("{}", format!("Starting {}", name).blue());
        let now = Instant::now();
        let result = f();
        eprintln!(
            "{} {:.2?}",
            format!("Finished {} in", name).green(),
            now.elapsed()
        );
        result
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };

    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .init();
}

fn selected_optimizations(args: &Args) -> HashSet<Optimizations> {
    if args.debug {
        if args.all_optimizations || !args.optimizations.is_empty() {
            warn!("optimizations are ignored in debug mode");
        }
        return HashSet::new();
    }

    if args.no_optimizations {
        return HashSet::new();
    }

    if !args.all_optimizations && !args.optimizations.is_empty() {
        return args.optimizations.iter().copied().collect();
    }

    Optimizations::value_variants().iter().copied().collect()
}

fn dump_tokens(tokens: &[Token]) {
    for token in tokens {
        eprint!("{}", token.kind.symbol());
    }
    eprintln!();
}

fn debug_run(args: &Args, program: &Program) -> Result<(), Error> {
    let trace_path = args.file.with_extension("dbg");
    let mut trace = BufWriter::new(File::create(&trace_path)?);
    writeln!(trace, "Debugging information:")?;
    writeln!(trace, "Debug file: {}", args.file.display())?;
    info!("writing trace to {}", trace_path.display());

    let mut runtime = Runtime::new(
        args.memory_size,
        Box::new(io::stdin()),
        Box::new(io::stdout()),
    )?;
    ByteCodeInterpreter::new()
        .with_cycle_limit(args.max_cycles)
        .with_trace(Box::new(trace))
        .run(&mut runtime, program)?;
    Ok(())
}

fn output_path(args: &Args, architecture: Architecture) -> PathBuf {
    match &args.output {
        Some(output) => output.clone(),
        None => args
            .file
            .with_extension(architecture.output_extension()),
    }
}

fn run(args: Args) -> Result<(), Error> {
    if args.file.extension().and_then(|ext| ext.to_str()) != Some("bf") {
        return Err(Error::InvalidExtension(args.file));
    }

    let architecture = match args.target {
        Some(architecture) => architecture,
        None => Architecture::host()?,
    };
    info!("targeting {}", architecture);

    let optimizations = selected_optimizations(&args);
    if args.max_cycles > 0 && !args.debug {
        warn!("--max-cycles is only enforced in debug mode");
    }

    let timer = Timer {
        enabled: args.verbose > 0,
    };

    let text = fs::read_to_string(&args.file).map_err(|source| Error::Source {
        path: args.file.clone(),
        source,
    })?;

    let tokens = timer.phase("lexing", || Lexer::new(&text).collect());
    if args.dump.contains(&Dump::Tokens) {
        dump_tokens(&tokens);
    }

    let merge_runs = optimizations.contains(&Optimizations::RunLength);
    let program = timer.phase("parsing", || {
        ProgramParser::new(&tokens, merge_runs).parse_program()
    })?;

    let program = timer.phase("optimizations", || optimize(&program, &optimizations));
    if args.dump.contains(&Dump::Bytecode) {
        eprint!("{}", program);
    }
    if args.dump.contains(&Dump::Frequencies) {
        eprint!("{}", program.frequencies());
    }

    if args.debug {
        return timer.phase("debug interpreter", || debug_run(&args, &program));
    }

    if args.jit {
        timer.phase("jit", || jit::run(&program, architecture, args.memory_size))?;
        return Ok(());
    }

    let assembly = timer.phase("code generation", || {
        codegen::assemble(&program, architecture, args.memory_size)
    });
    let path = output_path(&args, architecture);
    fs::write(&path, assembly)?;
    info!("wrote {}", path.display());
    Ok(())
}

fn report(error: &Error) {
    eprintln!("{}: {}", "Error".red(), error);

    let mut source = error.source();
    while let Some(cause) = source {
        eprintln!("  caused by: {}", cause);
        source = cause.source();
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            report(&error);
            ExitCode::FAILURE
        }
    }
}
