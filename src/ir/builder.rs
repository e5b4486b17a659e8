//! Instruction builder with an insertion point.
//!
//! The builder borrows a [`Module`] mutably and keeps a cursor bound to one
//! block (or to a position in front of one instruction) at a time. Every
//! `build_*` call inserts at the cursor. Moving the cursor is always legal;
//! appending to a block that already ends in a terminator is not.
//!
//! ```
//! use minir::ir::{Builder, Module, Type};
//!
//! let mut module = Module::new("MyFirstModule");
//! let f = module
//!     .add_function("mul_add", &[("x", Type::I32), ("y", Type::I32), ("z", Type::I32)], Type::I32)
//!     .unwrap();
//! let entry = module.create_block(f, "entry").unwrap();
//! let (x, y, z) = {
//!     let func = module.function(f).unwrap();
//!     (func.param(0).unwrap(), func.param(1).unwrap(), func.param(2).unwrap())
//! };
//!
//! let mut builder = Builder::new(&mut module);
//! builder.position_at_end(f, entry);
//! let tmp = builder.build_mul(x, y, "tmp").unwrap();
//! let tmp2 = builder.build_add(tmp, z, "tmp2").unwrap();
//! builder.build_ret(tmp2).unwrap();
//! ```

use super::{BinaryOp, BlockId, FuncId, InstId, Instruction, IntConst, IntPredicate, Module, Type, Value};
use crate::error::{BuildError, BuildResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InsertPoint {
    End { func: FuncId, block: BlockId },
    Before { func: FuncId, inst: InstId },
}

/// Cursor-based instruction builder.
pub struct Builder<'m> {
    module: &'m mut Module,
    point: Option<InsertPoint>,
}

impl<'m> Builder<'m> {
    pub fn new(module: &'m mut Module) -> Self {
        Self {
            module,
            point: None,
        }
    }

    pub fn module(&self) -> &Module {
        self.module
    }

    /// Append subsequent instructions to the end of `block`.
    pub fn position_at_end(&mut self, func: FuncId, block: BlockId) {
        self.point = Some(InsertPoint::End { func, block });
    }

    /// Insert subsequent instructions in front of `inst`, in its block.
    pub fn position_before(&mut self, func: FuncId, inst: InstId) {
        self.point = Some(InsertPoint::Before { func, inst });
    }

    pub fn clear_insertion_point(&mut self) {
        self.point = None;
    }

    /// Function and block the cursor currently inserts into.
    pub fn insertion_block(&self) -> Option<(FuncId, BlockId)> {
        match self.point? {
            InsertPoint::End { func, block } => Some((func, block)),
            InsertPoint::Before { func, inst } => {
                let data = self.module.function(func)?.inst(inst)?;
                Some((func, data.block))
            }
        }
    }

    /// Insert `inst` at the cursor. Returns the defined value for
    /// non-terminators.
    pub fn append(&mut self, inst: Instruction, name: &str) -> BuildResult<Option<Value>> {
        let point = self
            .point
            .ok_or_else(|| BuildError::InvalidState("no insertion point set".to_string()))?;

        let defines_value = inst.defines_value();
        let id = match point {
            InsertPoint::End { func, block } => {
                let function = self.module.function_mut(func)?;
                if let Some(term) = function.terminator(block) {
                    let block_name = function.block(block).map(|b| b.name()).unwrap_or_default();
                    return Err(BuildError::InvalidState(format!(
                        "block %{} in @{} is already terminated by '{}'",
                        block_name,
                        function.name(),
                        term.opcode().name()
                    )));
                }
                function.push_inst(block, inst, name)?
            }
            InsertPoint::Before { func, inst: before } => {
                self.module
                    .function_mut(func)?
                    .insert_inst_before(before, inst, name)?
            }
        };

        log::trace!("built instruction #{} ({:?})", id.0, point);
        Ok(defines_value.then_some(Value::Result(id)))
    }

    fn append_def(&mut self, inst: Instruction, name: &str) -> BuildResult<Value> {
        self.append(inst, name)?
            .ok_or_else(|| BuildError::InvalidState("instruction defines no value".to_string()))
    }

    pub fn build_const(&mut self, ty: Type, value: i64, name: &str) -> BuildResult<Value> {
        self.append_def(Instruction::Const(IntConst::new(ty, value)), name)
    }

    pub fn build_binary(
        &mut self,
        op: BinaryOp,
        lhs: Value,
        rhs: Value,
        name: &str,
    ) -> BuildResult<Value> {
        self.append_def(Instruction::Binary { op, lhs, rhs }, name)
    }

    pub fn build_add(&mut self, lhs: Value, rhs: Value, name: &str) -> BuildResult<Value> {
        self.build_binary(BinaryOp::Add, lhs, rhs, name)
    }

    pub fn build_sub(&mut self, lhs: Value, rhs: Value, name: &str) -> BuildResult<Value> {
        self.build_binary(BinaryOp::Sub, lhs, rhs, name)
    }

    pub fn build_mul(&mut self, lhs: Value, rhs: Value, name: &str) -> BuildResult<Value> {
        self.build_binary(BinaryOp::Mul, lhs, rhs, name)
    }

    pub fn build_icmp(
        &mut self,
        pred: IntPredicate,
        lhs: Value,
        rhs: Value,
        name: &str,
    ) -> BuildResult<Value> {
        self.append_def(Instruction::ICmp { pred, lhs, rhs }, name)
    }

    /// Call `callee` by name. The result type is taken from the callee's
    /// signature when it is already declared, `i32` otherwise.
    pub fn build_call(&mut self, callee: &str, args: &[Value], name: &str) -> BuildResult<Value> {
        let ret = self
            .module
            .function_named(callee)
            .map(|f| f.return_type())
            .unwrap_or(Type::I32);
        self.append_def(
            Instruction::Call {
                callee: callee.to_string(),
                args: args.to_vec(),
                ret,
            },
            name,
        )
    }

    pub fn build_cond_br(
        &mut self,
        cond: Value,
        then_dest: BlockId,
        else_dest: BlockId,
    ) -> BuildResult<()> {
        self.append(
            Instruction::CondBr {
                cond,
                then_dest,
                else_dest,
            },
            "",
        )
        .map(|_| ())
    }

    pub fn build_br(&mut self, dest: BlockId) -> BuildResult<()> {
        self.append(Instruction::Br { dest }, "").map(|_| ())
    }

    pub fn build_ret(&mut self, value: Value) -> BuildResult<()> {
        self.append(Instruction::Ret { value }, "").map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Module, FuncId, BlockId) {
        let mut module = Module::new("test");
        let f = module
            .add_function("f", &[("x", Type::I32)], Type::I32)
            .unwrap();
        let entry = module.create_block(f, "entry").unwrap();
        (module, f, entry)
    }

    #[test]
    fn test_append_after_terminator_fails() {
        let (mut module, f, entry) = setup();
        let mut builder = Builder::new(&mut module);
        builder.position_at_end(f, entry);
        builder.build_ret(Value::i32(0)).unwrap();

        let err = builder.build_ret(Value::i32(1)).unwrap_err();
        assert!(matches!(err, BuildError::InvalidState(_)));
        let err = builder
            .build_add(Value::i32(1), Value::i32(2), "sum")
            .unwrap_err();
        assert!(matches!(err, BuildError::InvalidState(_)));

        let func = module.function(f).unwrap();
        assert_eq!(func.block(entry).unwrap().len(), 1);
    }

    #[test]
    fn test_no_insertion_point() {
        let (mut module, _, _) = setup();
        let mut builder = Builder::new(&mut module);
        let err = builder.build_ret(Value::i32(0)).unwrap_err();
        assert!(matches!(err, BuildError::InvalidState(_)));
    }

    #[test]
    fn test_switching_blocks() {
        let (mut module, f, entry) = setup();
        let next = module.create_block(f, "next").unwrap();
        let mut builder = Builder::new(&mut module);

        builder.position_at_end(f, entry);
        builder.build_br(next).unwrap();
        builder.position_at_end(f, next);
        assert_eq!(builder.insertion_block(), Some((f, next)));
        builder.build_ret(Value::Argument(0)).unwrap();

        // Moving back to a terminated block is legal; appending is not.
        builder.position_at_end(f, entry);
        assert!(builder.build_ret(Value::i32(0)).is_err());

        let func = module.function(f).unwrap();
        assert_eq!(func.successors(entry), vec![next]);
    }

    #[test]
    fn test_value_names_are_uniqued() {
        let (mut module, f, entry) = setup();
        let mut builder = Builder::new(&mut module);
        builder.position_at_end(f, entry);
        let a = builder.build_add(Value::Argument(0), Value::i32(1), "tmp").unwrap();
        let b = builder.build_add(a, Value::i32(1), "tmp").unwrap();
        let c = builder.build_add(b, Value::i32(1), "").unwrap();
        let d = builder.build_add(c, Value::i32(1), "x").unwrap();

        let func = module.function(f).unwrap();
        assert_eq!(func.value_name(a), Some("tmp"));
        assert_eq!(func.value_name(b), Some("tmp1"));
        assert_eq!(func.value_name(c), None);
        assert_eq!(func.value_name(d), Some("x1"));
    }

    #[test]
    fn test_position_before_inserts_in_order() {
        let (mut module, f, entry) = setup();
        let mut builder = Builder::new(&mut module);
        builder.position_at_end(f, entry);
        builder.build_ret(Value::Argument(0)).unwrap();

        let ret = module.function(f).unwrap().block(entry).unwrap().insts()[0];
        let mut builder = Builder::new(&mut module);
        builder.position_before(f, ret);
        assert_eq!(builder.insertion_block(), Some((f, entry)));
        builder.build_const(Type::I32, 1, "one").unwrap();
        builder.build_const(Type::I32, 2, "two").unwrap();

        let func = module.function(f).unwrap();
        let names: Vec<_> = func
            .block(entry)
            .unwrap()
            .insts()
            .iter()
            .map(|&id| func.inst(id).unwrap().inst.opcode().name())
            .collect();
        assert_eq!(names, vec!["const", "const", "ret"]);
        assert_eq!(func.value_name(Value::Result(InstId(1))), Some("one"));
    }

    #[test]
    fn test_call_takes_callee_return_type() {
        let mut module = Module::new("test");
        module.add_function("pred", &[], Type::I1).unwrap();
        let f = module.add_function("f", &[], Type::I32).unwrap();
        let entry = module.create_block(f, "entry").unwrap();

        let mut builder = Builder::new(&mut module);
        builder.position_at_end(f, entry);
        let known = builder.build_call("pred", &[], "p").unwrap();
        let unknown = builder.build_call("missing", &[], "m").unwrap();

        let func = module.function(f).unwrap();
        assert_eq!(func.value_type(known), Some(Type::I1));
        assert_eq!(func.value_type(unknown), Some(Type::I32));
    }
}
