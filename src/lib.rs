//! minir - a minimal in-memory SSA intermediate representation.
//!
//! Programs are built into a [`Module`] through a cursor-based [`Builder`],
//! checked by the structural verifier, and executed by a reference
//! interpreter that supports recursion.
//!
//! # Primary Usage
//!
//! ```
//! use minir::{samples, verify_module, EvalConfig, Interpreter};
//!
//! let module = samples::gcd_module().unwrap();
//! assert!(verify_module(&module).is_empty());
//!
//! let mut interp = Interpreter::new(&module, EvalConfig::default());
//! assert_eq!(interp.evaluate_by_name("gcd", &[8, 12]), Ok(4));
//! ```
//!
//! # Architecture
//!
//! - [`ir`] - Values, types, instructions, blocks, functions and the module registry,
//!   plus the builder, the printer and the text parser
//! - [`analysis`] - Control-flow graph, reverse post-order and dominators
//! - [`verify`] - Diagnostics for malformed functions
//! - [`interp`] - Evaluation with step and call depth bounds
//! - [`stats`] - Instruction counting pass
//! - [`samples`] - Tutorial programs

pub mod analysis;
pub mod error;
pub mod interp;
pub mod ir;
pub mod samples;
pub mod stats;
pub mod verify;

pub use error::{BuildError, BuildResult, EvalError, EvalResult, ParseError, TrapKind};
pub use interp::{EvalConfig, EvalStats, Interpreter};
pub use ir::{
    parse_module, write_module, BinaryOp, BlockId, Builder, FuncId, Function, InstId, Instruction,
    IntConst, IntPredicate, Module, Type, Value,
};
pub use stats::{count_instructions, ModuleStats};
pub use verify::{has_errors, verify_function, verify_module, Diagnostic, DiagnosticKind, Severity, VerifyPolicy};
