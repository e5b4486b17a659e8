//! Evaluation limits.

/// Bounds that keep an evaluation from running away.
///
/// Both limits are checked before the offending instruction or call runs, so
/// a trapped evaluation has executed at most `max_steps` instructions and
/// nested at most `max_call_depth` activations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalConfig {
    /// Total instructions executed across all activations.
    pub max_steps: u64,
    /// Activations live at the same time, the outermost included.
    pub max_call_depth: usize,
}

impl EvalConfig {
    pub const DEFAULT_MAX_STEPS: u64 = 1_000_000;
    /// Activations recurse on the host stack; this depth fits a 2 MiB thread
    /// stack in an unoptimized build.
    pub const DEFAULT_MAX_CALL_DEPTH: usize = 256;

    pub fn with_max_steps(mut self, max_steps: u64) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_max_call_depth(mut self, max_call_depth: usize) -> Self {
        self.max_call_depth = max_call_depth;
        self
    }
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            max_steps: Self::DEFAULT_MAX_STEPS,
            max_call_depth: Self::DEFAULT_MAX_CALL_DEPTH,
        }
    }
}
