// This module defines the error types of minir using the thiserror crate. BuildError covers
// construction-time failures raised immediately by the builder and the module registry:
// appending past a terminator, duplicate function names, and handles that do not name an
// existing function, block or instruction. EvalError covers everything that aborts an
// evaluation: arity mismatches, calls to functions the module does not define, branches to
// missing blocks, safety traps (step and call depth limits, division by zero), reads of
// values that were never computed in the current activation, and control falling off the
// end of a block. ParseError reports problems in the textual module form with the offending
// line. Verification defects are not errors: they are collected as diagnostics in `verify`.

//! Error types for building, parsing and evaluating modules.

use thiserror::Error;

/// Failure raised while constructing a module.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("invalid builder state: {0}")]
    InvalidState(String),

    #[error("function @{0} is already defined")]
    DuplicateFunction(String),

    #[error("invalid function name {0:?}")]
    InvalidName(String),

    #[error("unknown function #{0}")]
    UnknownFunction(u32),

    #[error("unknown block #{block} in @{function}")]
    UnknownBlock { function: String, block: u32 },

    #[error("unknown instruction #{inst} in @{function}")]
    UnknownInstruction { function: String, inst: u32 },
}

/// Result type alias for construction operations.
pub type BuildResult<T> = Result<T, BuildError>;

/// Reason an evaluation was stopped by the interpreter itself.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrapKind {
    #[error("step limit of {0} instructions exceeded")]
    StepLimit(u64),

    #[error("call depth limit of {0} exceeded")]
    CallDepth(usize),

    #[error("division by zero")]
    DivisionByZero,
}

/// Failure raised while evaluating a function.
///
/// Errors raised inside a nested activation abort every enclosing
/// activation unchanged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    #[error("@{function} expects {expected} argument(s) but {found} were supplied")]
    ArityMismatch {
        function: String,
        expected: usize,
        found: usize,
    },

    #[error("@{caller} calls @{callee}, which is not defined in the module")]
    UnresolvedCall { caller: String, callee: String },

    #[error("branch in @{function} targets missing block #{block}")]
    UnresolvedBranchTarget { function: String, block: u32 },

    #[error("trap in @{function}: {kind}")]
    Trap { function: String, kind: TrapKind },

    #[error("@{function} reads {value} before it is defined")]
    UndefinedValue { function: String, value: String },

    #[error("block %{block} in @{function} ends without a terminator")]
    MissingTerminator { function: String, block: String },

    #[error("@{function} has no body")]
    EmptyFunction { function: String },
}

impl EvalError {
    /// Short name of the failure kind, as reported by the driver.
    pub fn kind_name(&self) -> &'static str {
        match self {
            EvalError::ArityMismatch { .. } => "ArityMismatch",
            EvalError::UnresolvedCall { .. } => "UnresolvedCall",
            EvalError::UnresolvedBranchTarget { .. } => "UnresolvedBranchTarget",
            EvalError::Trap { .. } => "Trap",
            EvalError::UndefinedValue { .. } => "UndefinedValue",
            EvalError::MissingTerminator { .. } => "MissingTerminator",
            EvalError::EmptyFunction { .. } => "EmptyFunction",
        }
    }
}

/// Result type alias for evaluation.
pub type EvalResult<T> = Result<T, EvalError>;

/// Error in the textual module form.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("line {line}: {message}")]
pub struct ParseError {
    pub line: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}
