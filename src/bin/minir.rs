//! Host driver for minir.
//!
//! Builds one of the tutorial modules or reads a module from its text form,
//! prints the verifier's diagnostics, and evaluates a function with literal
//! arguments. Exit status is 0 on success, 1 when evaluation fails or strict
//! verification rejects the module, and 2 on usage or parse errors.

use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use minir::{
    count_instructions, has_errors, parse_module, samples, verify_module, write_module, Diagnostic,
    EvalConfig, Interpreter, Module, VerifyPolicy,
};

#[derive(Parser, Debug)]
#[command(name = "minir", version, about = "Build, verify and evaluate minimal SSA modules")]
struct Cli {
    /// Increase log output (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build, verify, print and evaluate a tutorial program
    Demo {
        #[arg(value_enum)]
        program: Demo,

        /// Write the module text to PATH
        #[arg(long, value_name = "PATH")]
        emit: Option<PathBuf>,

        #[command(flatten)]
        eval: EvalArgs,
    },
    /// Parse a module file and evaluate one of its functions
    Run {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Function to evaluate
        #[arg(short, long)]
        function: String,

        /// Integer arguments
        #[arg(allow_negative_numbers = true)]
        args: Vec<i32>,

        /// Print the module before evaluating it
        #[arg(long)]
        print: bool,

        #[command(flatten)]
        eval: EvalArgs,
    },
    /// Print the diagnostics of a module file
    Verify {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Count instructions per block and per opcode
    Stats {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

#[derive(Args, Debug)]
struct EvalArgs {
    /// Refuse to evaluate a module with verification errors
    #[arg(long)]
    strict: bool,

    /// Maximum number of executed instructions
    #[arg(long, default_value_t = EvalConfig::DEFAULT_MAX_STEPS)]
    max_steps: u64,

    /// Maximum call depth
    #[arg(long, default_value_t = EvalConfig::DEFAULT_MAX_CALL_DEPTH)]
    max_depth: usize,
}

impl EvalArgs {
    fn config(&self) -> EvalConfig {
        EvalConfig::default()
            .with_max_steps(self.max_steps)
            .with_max_call_depth(self.max_depth)
    }

    fn policy(&self) -> VerifyPolicy {
        if self.strict {
            VerifyPolicy::Strict
        } else {
            VerifyPolicy::Permissive
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum Demo {
    MulAdd,
    Gcd,
    ConstantAdd,
}

const FAILURE: u8 = 1;
const USAGE: u8 = 2;

fn init_logging(verbose: u8) {
    let default_filter = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}

fn report(diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics {
        eprintln!("{diagnostic}");
    }
}

/// Evaluate `function` unless the policy rejects the module's diagnostics.
/// `None` when evaluation did not happen or failed; the reason has been
/// printed.
fn evaluate(
    module: &Module,
    diagnostics: &[Diagnostic],
    function: &str,
    args: &[i32],
    opts: &EvalArgs,
) -> Option<i32> {
    if !opts.policy().allows(diagnostics) {
        eprintln!("not evaluating @{function}: the module has verification errors");
        return None;
    }

    let mut interp = Interpreter::new(module, opts.config());
    let args_text = args.iter().map(i32::to_string).collect::<Vec<_>>().join(", ");
    match interp.evaluate_by_name(function, args) {
        Ok(value) => {
            println!("{function}({args_text}) = {value}");
            log::info!("{}", interp.stats());
            Some(value)
        }
        Err(err) => {
            eprintln!("{function}({args_text}) failed with {}: {err}", err.kind_name());
            None
        }
    }
}

fn native_gcd(mut a: i32, mut b: i32) -> i32 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Read and parse a module file. Both failures are usage errors.
fn load(path: &Path) -> Result<Module, ExitCode> {
    let text = fs::read_to_string(path).map_err(|err| {
        eprintln!("{}: {err}", path.display());
        ExitCode::from(USAGE)
    })?;
    parse_module(&text).map_err(|err| {
        eprintln!("{}:{err}", path.display());
        ExitCode::from(USAGE)
    })
}

fn demo(program: Demo, emit: Option<&Path>, opts: &EvalArgs) -> Result<ExitCode, Box<dyn Error>> {
    let (module, function, args, expected) = match program {
        Demo::MulAdd => (samples::mul_add_module()?, "mul_add", vec![2, 3, 4], 2 * 3 + 4),
        Demo::Gcd => (samples::gcd_module()?, "gcd", vec![8, 12], native_gcd(8, 12)),
        Demo::ConstantAdd => (samples::constant_add_module()?, "main", vec![], 2 + 3),
    };

    let diagnostics = verify_module(&module);
    report(&diagnostics);
    print!("{module}");
    if let Some(path) = emit {
        write_module(&module, path)?;
    }

    match evaluate(&module, &diagnostics, function, &args, opts) {
        Some(value) if value == expected => {
            println!("matches native result {expected}");
            Ok(ExitCode::SUCCESS)
        }
        Some(value) => {
            eprintln!("mismatch: evaluated {value}, native result is {expected}");
            Ok(ExitCode::from(FAILURE))
        }
        None => Ok(ExitCode::from(FAILURE)),
    }
}

fn main() -> Result<ExitCode, Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Demo {
            program,
            emit,
            eval,
        } => demo(program, emit.as_deref(), &eval),
        Command::Run {
            file,
            function,
            args,
            print,
            eval,
        } => {
            let module = match load(&file) {
                Ok(module) => module,
                Err(code) => return Ok(code),
            };
            let diagnostics = verify_module(&module);
            report(&diagnostics);
            if print {
                print!("{module}");
            }
            Ok(match evaluate(&module, &diagnostics, &function, &args, &eval) {
                Some(_) => ExitCode::SUCCESS,
                None => ExitCode::from(FAILURE),
            })
        }
        Command::Verify { file } => {
            let module = match load(&file) {
                Ok(module) => module,
                Err(code) => return Ok(code),
            };
            let diagnostics = verify_module(&module);
            report(&diagnostics);
            if has_errors(&diagnostics) {
                Ok(ExitCode::from(FAILURE))
            } else {
                println!("{}: ok ({} warning(s))", file.display(), diagnostics.len());
                Ok(ExitCode::SUCCESS)
            }
        }
        Command::Stats { file } => {
            let module = match load(&file) {
                Ok(module) => module,
                Err(code) => return Ok(code),
            };
            print!("{}", count_instructions(&module));
            Ok(ExitCode::SUCCESS)
        }
    }
}
