// This module implements the structural verifier. It walks every function of a module and
// collects diagnostics instead of stopping at the first defect, so a caller sees the whole
// picture at once. Checks cover the entry block, block termination, branch and call target
// resolution, call signatures, operand visibility through the dominator tree, and the
// operand type rules of each opcode. Blocks the entry cannot reach are reported as warnings
// and their operands are not checked against dominance. The output order follows block and
// instruction order, so verifying an unchanged module twice yields identical lists.

//! Module verifier.

use std::fmt;

use crate::analysis::{ControlFlowGraph, DominatorTree};
use crate::ir::{BlockId, FuncId, Function, InstId, Instruction, Module, Type, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Warning => "warning",
            Severity::Error => "error",
        })
    }
}

/// Category of a verification finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    MissingEntry,
    EmptyBlock,
    MissingTerminator,
    TerminatorNotLast,
    UnresolvedBranchTarget,
    UnresolvedCall,
    CallSignatureMismatch,
    InvalidOperand,
    DominanceViolation,
    TypeMismatch,
    UnreachableBlock,
}

impl DiagnosticKind {
    pub const fn name(self) -> &'static str {
        match self {
            DiagnosticKind::MissingEntry => "MissingEntry",
            DiagnosticKind::EmptyBlock => "EmptyBlock",
            DiagnosticKind::MissingTerminator => "MissingTerminator",
            DiagnosticKind::TerminatorNotLast => "TerminatorNotLast",
            DiagnosticKind::UnresolvedBranchTarget => "UnresolvedBranchTarget",
            DiagnosticKind::UnresolvedCall => "UnresolvedCall",
            DiagnosticKind::CallSignatureMismatch => "CallSignatureMismatch",
            DiagnosticKind::InvalidOperand => "InvalidOperand",
            DiagnosticKind::DominanceViolation => "DominanceViolation",
            DiagnosticKind::TypeMismatch => "TypeMismatch",
            DiagnosticKind::UnreachableBlock => "UnreachableBlock",
        }
    }
}

/// Where a diagnostic applies. `inst` is the position within the block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub function: String,
    pub block: Option<String>,
    pub inst: Option<usize>,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.function)?;
        if let Some(block) = &self.block {
            write!(f, ", %{block}")?;
        }
        if let Some(inst) = self.inst {
            write!(f, ", inst {inst}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    pub location: Location,
    pub message: String,
}

impl Diagnostic {
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}] {}: {}",
            self.severity,
            self.kind.name(),
            self.location,
            self.message
        )
    }
}

/// Whether verification errors stop a module from being evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VerifyPolicy {
    /// Report diagnostics and evaluate anyway.
    #[default]
    Permissive,
    /// Refuse to evaluate a module with errors.
    Strict,
}

impl VerifyPolicy {
    pub fn allows(self, diagnostics: &[Diagnostic]) -> bool {
        match self {
            VerifyPolicy::Permissive => true,
            VerifyPolicy::Strict => !has_errors(diagnostics),
        }
    }
}

pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}

/// Verify every function of `module`, in declaration order.
pub fn verify_module(module: &Module) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    for (id, _) in module.functions() {
        diagnostics.extend(verify_function(module, id));
    }
    log::debug!(
        "verified module '{}': {} error(s), {} warning(s)",
        module.name(),
        diagnostics.iter().filter(|d| d.is_error()).count(),
        diagnostics.iter().filter(|d| !d.is_error()).count()
    );
    diagnostics
}

/// Verify a single function. Declarations have nothing to check.
pub fn verify_function(module: &Module, id: FuncId) -> Vec<Diagnostic> {
    let Some(func) = module.function(id) else {
        return Vec::new();
    };
    if func.is_declaration() {
        return Vec::new();
    }
    let mut verifier = FunctionVerifier::new(module, func);
    verifier.run();
    verifier.diagnostics
}

/// Block and in-block position of every placed instruction.
fn placement(func: &Function) -> Vec<Option<(BlockId, usize)>> {
    let mut placed = vec![None; func.num_insts()];
    for (block, data) in func.blocks() {
        for (pos, inst) in data.insts().iter().enumerate() {
            if let Some(slot) = placed.get_mut(inst.index()) {
                *slot = Some((block, pos));
            }
        }
    }
    placed
}

struct FunctionVerifier<'m> {
    module: &'m Module,
    func: &'m Function,
    dom_tree: DominatorTree,
    placed: Vec<Option<(BlockId, usize)>>,
    diagnostics: Vec<Diagnostic>,
}

impl<'m> FunctionVerifier<'m> {
    fn new(module: &'m Module, func: &'m Function) -> Self {
        let cfg = ControlFlowGraph::new(func);
        Self {
            module,
            func,
            dom_tree: DominatorTree::new(&cfg),
            placed: placement(func),
            diagnostics: Vec::new(),
        }
    }

    fn report(
        &mut self,
        severity: Severity,
        kind: DiagnosticKind,
        block: Option<BlockId>,
        inst: Option<usize>,
        message: String,
    ) {
        let location = Location {
            function: self.func.name().to_string(),
            block: block
                .and_then(|b| self.func.block(b))
                .map(|b| b.name().to_string()),
            inst,
        };
        self.diagnostics.push(Diagnostic {
            severity,
            kind,
            location,
            message,
        });
    }

    fn error(&mut self, kind: DiagnosticKind, block: BlockId, inst: usize, message: String) {
        self.report(Severity::Error, kind, Some(block), Some(inst), message);
    }

    /// Human-readable name for a value in messages.
    fn describe(&self, value: Value) -> String {
        match (value, self.func.value_name(value)) {
            (Value::Constant(c), _) => format!("{} {}", c.ty(), c),
            (_, Some(name)) => format!("%{name}"),
            (Value::Argument(idx), None) => format!("argument #{idx}"),
            (Value::Result(id), None) => format!("instruction #{}", id.0),
        }
    }

    fn run(&mut self) {
        match self.func.entry_block() {
            Some(entry) if self.func.block(entry).is_some() => {}
            other => {
                let message = match other {
                    Some(entry) => format!("entry block #{} does not exist", entry.0),
                    None => "function has blocks but no entry block".to_string(),
                };
                self.report(Severity::Error, DiagnosticKind::MissingEntry, None, None, message);
            }
        }

        let blocks: Vec<BlockId> = self.func.blocks().map(|(id, _)| id).collect();
        for block in blocks {
            self.verify_block(block);
        }
    }

    fn verify_block(&mut self, block: BlockId) {
        let func = self.func;
        let Some(data) = func.block(block) else {
            return;
        };
        let reachable = self.dom_tree.is_reachable(block);

        if !reachable {
            self.report(
                Severity::Warning,
                DiagnosticKind::UnreachableBlock,
                Some(block),
                None,
                format!("block %{} is unreachable from the entry block", data.name()),
            );
        }

        if data.is_empty() {
            self.report(
                Severity::Error,
                DiagnosticKind::EmptyBlock,
                Some(block),
                None,
                format!("block %{} has no instructions", data.name()),
            );
            return;
        }

        let last = data.len() - 1;
        for (pos, &id) in data.insts().iter().enumerate() {
            let Some(inst_data) = func.inst(id) else {
                continue;
            };
            let inst = &inst_data.inst;
            if inst.is_terminator() && pos != last {
                self.error(
                    DiagnosticKind::TerminatorNotLast,
                    block,
                    pos,
                    format!(
                        "terminator '{}' is followed by {} more instruction(s)",
                        inst.opcode().name(),
                        last - pos
                    ),
                );
            }
            self.verify_inst(block, pos, inst, reachable);
        }

        let ends_in_terminator = data
            .insts()
            .last()
            .and_then(|&id| func.inst(id))
            .is_some_and(|d| d.inst.is_terminator());
        if !ends_in_terminator {
            self.report(
                Severity::Error,
                DiagnosticKind::MissingTerminator,
                Some(block),
                Some(last),
                format!("block %{} does not end in a terminator", data.name()),
            );
        }
    }

    fn verify_inst(&mut self, block: BlockId, pos: usize, inst: &Instruction, reachable: bool) {
        for target in inst.successors() {
            if self.func.block(target).is_none() {
                self.error(
                    DiagnosticKind::UnresolvedBranchTarget,
                    block,
                    pos,
                    format!("branch target #{} is not a block of @{}", target.0, self.func.name()),
                );
            }
        }

        for operand in inst.operands() {
            self.verify_operand(block, pos, operand, reachable);
        }

        match inst {
            Instruction::Const(_) | Instruction::Br { .. } => {}
            Instruction::Binary { op, lhs, rhs } => {
                for operand in [*lhs, *rhs] {
                    self.expect_type(block, pos, operand, Type::I32, op.mnemonic());
                }
            }
            Instruction::ICmp { lhs, rhs, .. } => {
                let types = (self.func.value_type(*lhs), self.func.value_type(*rhs));
                if let (Some(l), Some(r)) = types {
                    if l != r {
                        let message = format!(
                            "icmp compares {} with {} of different types",
                            self.describe(*lhs),
                            self.describe(*rhs)
                        );
                        self.error(DiagnosticKind::TypeMismatch, block, pos, message);
                    }
                }
            }
            Instruction::CondBr { cond, .. } => {
                self.expect_type(block, pos, *cond, Type::I1, "branch condition");
            }
            Instruction::Ret { value } => {
                let ret = self.func.return_type();
                self.expect_type(block, pos, *value, ret, "return value");
            }
            Instruction::Call { callee, args, ret } => {
                self.verify_call(block, pos, callee, args, *ret);
            }
        }
    }

    fn expect_type(&mut self, block: BlockId, pos: usize, value: Value, expected: Type, what: &str) {
        // Unknown types are reported as invalid operands.
        let Some(found) = self.func.value_type(value) else {
            return;
        };
        if found != expected {
            let message = format!(
                "{what} {} has type {found}, expected {expected}",
                self.describe(value)
            );
            self.error(DiagnosticKind::TypeMismatch, block, pos, message);
        }
    }

    fn verify_call(&mut self, block: BlockId, pos: usize, callee: &str, args: &[Value], ret: Type) {
        let Some(target) = self.module.function_named(callee) else {
            self.error(
                DiagnosticKind::UnresolvedCall,
                block,
                pos,
                format!("call to @{callee}, which is not defined in the module"),
            );
            return;
        };

        if target.is_declaration() {
            self.report(
                Severity::Warning,
                DiagnosticKind::UnresolvedCall,
                Some(block),
                Some(pos),
                format!("@{callee} has no body and cannot be evaluated"),
            );
        }

        let params = target.params();
        if params.len() != args.len() {
            self.error(
                DiagnosticKind::CallSignatureMismatch,
                block,
                pos,
                format!(
                    "@{callee} expects {} argument(s) but the call passes {}",
                    params.len(),
                    args.len()
                ),
            );
        }
        for (idx, (param, arg)) in params.iter().zip(args).enumerate() {
            let Some(found) = self.func.value_type(*arg) else {
                continue;
            };
            if found != param.ty {
                let message = format!(
                    "argument {idx} of call to @{callee} has type {found}, parameter %{} is {}",
                    param.name, param.ty
                );
                self.error(DiagnosticKind::CallSignatureMismatch, block, pos, message);
            }
        }
        if target.return_type() != ret {
            self.error(
                DiagnosticKind::CallSignatureMismatch,
                block,
                pos,
                format!(
                    "call result is {ret} but @{callee} returns {}",
                    target.return_type()
                ),
            );
        }
    }

    fn verify_operand(&mut self, block: BlockId, pos: usize, value: Value, reachable: bool) {
        match value {
            Value::Constant(_) => {}
            Value::Argument(idx) => {
                if idx as usize >= self.func.params().len() {
                    let message = format!(
                        "argument #{idx} is out of range, @{} has {} parameter(s)",
                        self.func.name(),
                        self.func.params().len()
                    );
                    self.error(DiagnosticKind::InvalidOperand, block, pos, message);
                }
            }
            Value::Result(id) => self.verify_result_use(block, pos, id, reachable),
        }
    }

    fn verify_result_use(&mut self, block: BlockId, pos: usize, id: InstId, reachable: bool) {
        let Some(def) = self.func.inst(id) else {
            self.error(
                DiagnosticKind::InvalidOperand,
                block,
                pos,
                format!("instruction #{} does not exist in @{}", id.0, self.func.name()),
            );
            return;
        };
        if !def.inst.defines_value() {
            let message = format!(
                "operand refers to '{}', which defines no value",
                def.inst.opcode().name()
            );
            self.error(DiagnosticKind::InvalidOperand, block, pos, message);
            return;
        }
        let Some((def_block, def_pos)) = self.placed.get(id.index()).copied().flatten() else {
            let message = format!("{} is not placed in any block", self.describe(Value::Result(id)));
            self.error(DiagnosticKind::InvalidOperand, block, pos, message);
            return;
        };
        if !reachable {
            return;
        }

        let visible = if def_block == block {
            def_pos < pos
        } else {
            self.dom_tree.dominates(def_block, block)
        };
        if !visible {
            let def_name = self
                .func
                .block(def_block)
                .map(|b| b.name().to_string())
                .unwrap_or_default();
            let message = format!(
                "{} defined in %{def_name} does not dominate this use",
                self.describe(Value::Result(id))
            );
            self.error(DiagnosticKind::DominanceViolation, block, pos, message);
        }
    }
}
