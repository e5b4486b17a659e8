//! The closed instruction set.
//!
//! Every instruction is a variant of [`Instruction`]. Static facts about an
//! opcode (mnemonic, whether it terminates a block, whether it defines a
//! value, how many value operands and successors it has) live in a single
//! table returned by [`Opcode::info`], which the verifier, printer and
//! statistics pass all consult.

use super::types::{IntConst, Type};
use super::{BlockId, Value};

/// Two-operand integer arithmetic and bitwise operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    UDiv,
    SDiv,
    URem,
    SRem,
    And,
    Or,
    Xor,
}

impl BinaryOp {
    pub const ALL: [BinaryOp; 10] = [
        BinaryOp::Add,
        BinaryOp::Sub,
        BinaryOp::Mul,
        BinaryOp::UDiv,
        BinaryOp::SDiv,
        BinaryOp::URem,
        BinaryOp::SRem,
        BinaryOp::And,
        BinaryOp::Or,
        BinaryOp::Xor,
    ];

    pub const fn mnemonic(self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::UDiv => "udiv",
            BinaryOp::SDiv => "sdiv",
            BinaryOp::URem => "urem",
            BinaryOp::SRem => "srem",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Xor => "xor",
        }
    }

    pub fn from_mnemonic(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.mnemonic() == s)
    }

    /// Division and remainder trap on a zero divisor.
    pub const fn can_trap(self) -> bool {
        matches!(
            self,
            BinaryOp::UDiv | BinaryOp::SDiv | BinaryOp::URem | BinaryOp::SRem
        )
    }
}

/// Integer comparison predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntPredicate {
    Eq,
    Ne,
    Ult,
    Ule,
    Ugt,
    Uge,
    Slt,
    Sle,
    Sgt,
    Sge,
}

impl IntPredicate {
    pub const ALL: [IntPredicate; 10] = [
        IntPredicate::Eq,
        IntPredicate::Ne,
        IntPredicate::Ult,
        IntPredicate::Ule,
        IntPredicate::Ugt,
        IntPredicate::Uge,
        IntPredicate::Slt,
        IntPredicate::Sle,
        IntPredicate::Sgt,
        IntPredicate::Sge,
    ];

    pub const fn mnemonic(self) -> &'static str {
        match self {
            IntPredicate::Eq => "eq",
            IntPredicate::Ne => "ne",
            IntPredicate::Ult => "ult",
            IntPredicate::Ule => "ule",
            IntPredicate::Ugt => "ugt",
            IntPredicate::Uge => "uge",
            IntPredicate::Slt => "slt",
            IntPredicate::Sle => "sle",
            IntPredicate::Sgt => "sgt",
            IntPredicate::Sge => "sge",
        }
    }

    pub fn from_mnemonic(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|pred| pred.mnemonic() == s)
    }

    pub const fn is_signed(self) -> bool {
        matches!(
            self,
            IntPredicate::Slt | IntPredicate::Sle | IntPredicate::Sgt | IntPredicate::Sge
        )
    }
}

/// An instruction. Non-terminators define exactly one value; terminators
/// (`CondBr`, `Br`, `Ret`) define none and end their block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    Const(IntConst),
    Binary {
        op: BinaryOp,
        lhs: Value,
        rhs: Value,
    },
    ICmp {
        pred: IntPredicate,
        lhs: Value,
        rhs: Value,
    },
    /// Call by name; the callee is resolved against the module when the
    /// module is verified or the call is executed.
    Call {
        callee: String,
        args: Vec<Value>,
        ret: Type,
    },
    CondBr {
        cond: Value,
        then_dest: BlockId,
        else_dest: BlockId,
    },
    Br {
        dest: BlockId,
    },
    Ret {
        value: Value,
    },
}

/// Opcode of an instruction, without its operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Const,
    Binary(BinaryOp),
    ICmp,
    Call,
    CondBr,
    Br,
    Ret,
}

/// Static facts about an opcode. A count of `!0` means variadic.
#[derive(Debug, Clone, Copy)]
pub struct OpInfo {
    pub name: &'static str,
    pub is_terminator: bool,
    pub is_def: bool,
    pub op_count: u32,
    pub succ_count: u32,
}

impl Opcode {
    pub const fn info(self) -> OpInfo {
        use Opcode::*;
        match self {
            Const => OpInfo { name: "const", is_terminator: false, is_def: true, op_count: 0, succ_count: 0 },
            Binary(op) => OpInfo { name: op.mnemonic(), is_terminator: false, is_def: true, op_count: 2, succ_count: 0 },
            ICmp => OpInfo { name: "icmp", is_terminator: false, is_def: true, op_count: 2, succ_count: 0 },
            Call => OpInfo { name: "call", is_terminator: false, is_def: true, op_count: !0, succ_count: 0 },
            CondBr => OpInfo { name: "br", is_terminator: true, is_def: false, op_count: 1, succ_count: 2 },
            Br => OpInfo { name: "br", is_terminator: true, is_def: false, op_count: 0, succ_count: 1 },
            Ret => OpInfo { name: "ret", is_terminator: true, is_def: false, op_count: 1, succ_count: 0 },
        }
    }

    pub const fn name(self) -> &'static str {
        self.info().name
    }
}

impl Instruction {
    pub fn opcode(&self) -> Opcode {
        match self {
            Instruction::Const(_) => Opcode::Const,
            Instruction::Binary { op, .. } => Opcode::Binary(*op),
            Instruction::ICmp { .. } => Opcode::ICmp,
            Instruction::Call { .. } => Opcode::Call,
            Instruction::CondBr { .. } => Opcode::CondBr,
            Instruction::Br { .. } => Opcode::Br,
            Instruction::Ret { .. } => Opcode::Ret,
        }
    }

    pub fn is_terminator(&self) -> bool {
        self.opcode().info().is_terminator
    }

    pub fn defines_value(&self) -> bool {
        self.opcode().info().is_def
    }

    /// Value operands in order.
    pub fn operands(&self) -> Vec<Value> {
        match self {
            Instruction::Const(_) | Instruction::Br { .. } => Vec::new(),
            Instruction::Binary { lhs, rhs, .. } | Instruction::ICmp { lhs, rhs, .. } => {
                vec![*lhs, *rhs]
            }
            Instruction::Call { args, .. } => args.clone(),
            Instruction::CondBr { cond, .. } => vec![*cond],
            Instruction::Ret { value } => vec![*value],
        }
    }

    /// Control-flow successors in order.
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            Instruction::CondBr {
                then_dest,
                else_dest,
                ..
            } => vec![*then_dest, *else_dest],
            Instruction::Br { dest } => vec![*dest],
            _ => Vec::new(),
        }
    }

    /// Type of the value this instruction defines.
    pub fn result_type(&self) -> Option<Type> {
        match self {
            Instruction::Const(c) => Some(c.ty()),
            Instruction::Binary { .. } => Some(Type::I32),
            Instruction::ICmp { .. } => Some(Type::I1),
            Instruction::Call { ret, .. } => Some(*ret),
            Instruction::CondBr { .. } | Instruction::Br { .. } | Instruction::Ret { .. } => None,
        }
    }
}
