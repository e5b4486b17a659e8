// This module implements the reference interpreter. Evaluation starts at a function's entry
// block and follows terminators until a return. Every activation owns a fresh environment
// mapping instruction handles to computed bits, so recursive calls never observe each
// other's values. Calls are resolved by name against the module when they execute and
// recurse on the host stack, bounded by the configured call depth. A global step counter
// bounds the total number of executed instructions. Arithmetic is two's complement and
// wraps at the type width; division and remainder by zero trap. Errors raised in a nested
// activation propagate unchanged to the caller of `evaluate`.

//! Interpreter for verified or unverified modules.

use std::fmt;

use hashbrown::HashMap;

use crate::error::{EvalError, EvalResult, TrapKind};
use crate::ir::{BinaryOp, BlockId, FuncId, Function, InstId, Instruction, IntPredicate, Module, Type, Value};

pub mod config;

pub use config::EvalConfig;

/// Counters collected during one call to [`Interpreter::evaluate`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvalStats {
    /// Instructions executed.
    pub steps: u64,
    /// Activations entered, the outermost included.
    pub calls: u64,
    /// Deepest nesting reached.
    pub max_depth: usize,
}

impl fmt::Display for EvalStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Evaluation Statistics:")?;
        writeln!(f, "  Instructions executed: {}", self.steps)?;
        writeln!(f, "  Calls: {}", self.calls)?;
        writeln!(f, "  Max call depth: {}", self.max_depth)
    }
}

/// Values computed so far in one activation.
struct Frame<'a> {
    func: &'a Function,
    args: Vec<u32>,
    env: HashMap<InstId, u32>,
}

impl<'a> Frame<'a> {
    fn new(func: &'a Function, args: &[u32]) -> Self {
        let args = func
            .params()
            .iter()
            .zip(args)
            .map(|(param, &bits)| bits & param.ty.mask())
            .collect();
        Self {
            func,
            args,
            env: HashMap::new(),
        }
    }

    fn read(&self, value: Value) -> EvalResult<u32> {
        let bits = match value {
            Value::Constant(c) => Some(c.bits()),
            Value::Argument(idx) => self.args.get(idx as usize).copied(),
            Value::Result(id) => self.env.get(&id).copied(),
        };
        bits.ok_or_else(|| EvalError::UndefinedValue {
            function: self.func.name().to_string(),
            value: self.describe(value),
        })
    }

    fn describe(&self, value: Value) -> String {
        match (value, self.func.value_name(value)) {
            (_, Some(name)) => format!("%{name}"),
            (Value::Argument(idx), None) => format!("argument #{idx}"),
            (Value::Result(id), None) => format!("instruction #{}", id.0),
            (Value::Constant(c), None) => c.to_string(),
        }
    }

    /// Operand bits sign extended from their type's width.
    fn read_signed(&self, value: Value) -> EvalResult<i32> {
        let bits = self.read(value)?;
        Ok(match self.func.value_type(value).unwrap_or(Type::I32) {
            Type::I1 => -((bits & 1) as i32),
            Type::I32 => bits as i32,
        })
    }

    fn trap(&self, kind: TrapKind) -> EvalError {
        EvalError::Trap {
            function: self.func.name().to_string(),
            kind,
        }
    }
}

/// Reference interpreter over a borrowed module.
pub struct Interpreter<'m> {
    module: &'m Module,
    config: EvalConfig,
    stats: EvalStats,
    depth: usize,
}

impl<'m> Interpreter<'m> {
    pub fn new(module: &'m Module, config: EvalConfig) -> Self {
        Self {
            module,
            config,
            stats: EvalStats::default(),
            depth: 0,
        }
    }

    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    /// Counters of the most recent evaluation.
    pub fn stats(&self) -> EvalStats {
        self.stats
    }

    /// Evaluate `func` with `args`. Arguments are truncated to their
    /// parameter types and an `i1` result is returned as 0 or 1.
    pub fn evaluate(&mut self, func: FuncId, args: &[i32]) -> EvalResult<i32> {
        let function = self.module.function(func).ok_or_else(|| EvalError::UnresolvedCall {
            caller: "<host>".to_string(),
            callee: format!("#{}", func.0),
        })?;

        self.stats = EvalStats::default();
        self.depth = 0;
        log::info!("evaluating @{} with arguments {:?}", function.name(), args);

        let raw: Vec<u32> = args.iter().map(|&arg| arg as u32).collect();
        let result = self.call(function, &raw);

        match &result {
            Ok(bits) => log::info!(
                "@{} returned {} after {} step(s)",
                function.name(),
                *bits as i32,
                self.stats.steps
            ),
            Err(err) => log::info!("@{} failed: {}", function.name(), err),
        }
        result.map(|bits| bits as i32)
    }

    pub fn evaluate_by_name(&mut self, name: &str, args: &[i32]) -> EvalResult<i32> {
        let func = self.module.lookup(name).ok_or_else(|| EvalError::UnresolvedCall {
            caller: "<host>".to_string(),
            callee: name.to_string(),
        })?;
        self.evaluate(func, args)
    }

    fn call(&mut self, func: &'m Function, args: &[u32]) -> EvalResult<u32> {
        if func.params().len() != args.len() {
            return Err(EvalError::ArityMismatch {
                function: func.name().to_string(),
                expected: func.params().len(),
                found: args.len(),
            });
        }
        let entry = func
            .entry_block()
            .filter(|_| !func.is_declaration())
            .ok_or_else(|| EvalError::EmptyFunction {
                function: func.name().to_string(),
            })?;
        if self.depth >= self.config.max_call_depth {
            return Err(EvalError::Trap {
                function: func.name().to_string(),
                kind: TrapKind::CallDepth(self.config.max_call_depth),
            });
        }

        self.depth += 1;
        self.stats.calls += 1;
        self.stats.max_depth = self.stats.max_depth.max(self.depth);
        log::debug!("enter @{} at depth {}", func.name(), self.depth);

        let mut frame = Frame::new(func, args);
        let result = self.run(&mut frame, entry);

        self.depth -= 1;
        result
    }

    fn step(&mut self, frame: &Frame<'_>) -> EvalResult<()> {
        if self.stats.steps >= self.config.max_steps {
            return Err(frame.trap(TrapKind::StepLimit(self.config.max_steps)));
        }
        self.stats.steps += 1;
        Ok(())
    }

    fn run(&mut self, frame: &mut Frame<'m>, entry: BlockId) -> EvalResult<u32> {
        let func = frame.func;
        let mut block = entry;

        loop {
            let data = func.block(block).ok_or_else(|| EvalError::UnresolvedBranchTarget {
                function: func.name().to_string(),
                block: block.0,
            })?;

            let mut next = None;
            for &id in data.insts() {
                let Some(inst_data) = func.inst(id) else {
                    return Err(EvalError::UndefinedValue {
                        function: func.name().to_string(),
                        value: format!("instruction #{}", id.0),
                    });
                };
                self.step(frame)?;
                log::trace!("@{} %{}: {}", func.name(), data.name(), inst_data.inst.opcode().name());

                match &inst_data.inst {
                    Instruction::Const(c) => {
                        frame.env.insert(id, c.bits());
                    }
                    Instruction::Binary { op, lhs, rhs } => {
                        let bits = binary(frame, *op, *lhs, *rhs)?;
                        frame.env.insert(id, bits);
                    }
                    Instruction::ICmp { pred, lhs, rhs } => {
                        let bit = compare(frame, *pred, *lhs, *rhs)?;
                        frame.env.insert(id, bit as u32);
                    }
                    Instruction::Call { callee, args, ret } => {
                        let target = self.module.function_named(callee).ok_or_else(|| {
                            EvalError::UnresolvedCall {
                                caller: func.name().to_string(),
                                callee: callee.clone(),
                            }
                        })?;
                        let values = args
                            .iter()
                            .map(|arg| frame.read(*arg))
                            .collect::<EvalResult<Vec<_>>>()?;
                        let bits = self.call(target, &values)?;
                        frame.env.insert(id, bits & ret.mask());
                    }
                    Instruction::CondBr {
                        cond,
                        then_dest,
                        else_dest,
                    } => {
                        let taken = frame.read(*cond)? & 1 != 0;
                        next = Some(if taken { *then_dest } else { *else_dest });
                        break;
                    }
                    Instruction::Br { dest } => {
                        next = Some(*dest);
                        break;
                    }
                    Instruction::Ret { value } => {
                        let bits = frame.read(*value)?;
                        return Ok(bits & func.return_type().mask());
                    }
                }
            }

            block = next.ok_or_else(|| EvalError::MissingTerminator {
                function: func.name().to_string(),
                block: data.name().to_string(),
            })?;
        }
    }
}

fn binary(frame: &Frame<'_>, op: BinaryOp, lhs: Value, rhs: Value) -> EvalResult<u32> {
    let l = frame.read(lhs)?;
    let r = frame.read(rhs)?;
    if op.can_trap() && r == 0 {
        return Err(frame.trap(TrapKind::DivisionByZero));
    }

    let bits = match op {
        BinaryOp::Add => l.wrapping_add(r),
        BinaryOp::Sub => l.wrapping_sub(r),
        BinaryOp::Mul => l.wrapping_mul(r),
        BinaryOp::UDiv => l / r,
        BinaryOp::URem => l % r,
        BinaryOp::SDiv => (l as i32).wrapping_div(r as i32) as u32,
        BinaryOp::SRem => (l as i32).wrapping_rem(r as i32) as u32,
        BinaryOp::And => l & r,
        BinaryOp::Or => l | r,
        BinaryOp::Xor => l ^ r,
    };
    Ok(bits)
}

fn compare(frame: &Frame<'_>, pred: IntPredicate, lhs: Value, rhs: Value) -> EvalResult<bool> {
    if pred.is_signed() {
        let l = frame.read_signed(lhs)?;
        let r = frame.read_signed(rhs)?;
        return Ok(match pred {
            IntPredicate::Slt => l < r,
            IntPredicate::Sle => l <= r,
            IntPredicate::Sgt => l > r,
            _ => l >= r,
        });
    }

    let l = frame.read(lhs)?;
    let r = frame.read(rhs)?;
    Ok(match pred {
        IntPredicate::Eq => l == r,
        IntPredicate::Ne => l != r,
        IntPredicate::Ult => l < r,
        IntPredicate::Ule => l <= r,
        IntPredicate::Ugt => l > r,
        _ => l >= r,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Builder;

    fn single_block(
        params: &[(&str, Type)],
        ret: Type,
        body: impl FnOnce(&mut Builder<'_>) -> Value,
    ) -> (Module, FuncId) {
        let mut module = Module::new("test");
        let f = module.add_function("f", params, ret).unwrap();
        let entry = module.create_block(f, "entry").unwrap();
        let mut b = Builder::new(&mut module);
        b.position_at_end(f, entry);
        let result = body(&mut b);
        b.build_ret(result).unwrap();
        (module, f)
    }

    fn eval(module: &Module, f: FuncId, args: &[i32]) -> EvalResult<i32> {
        Interpreter::new(module, EvalConfig::default()).evaluate(f, args)
    }

    #[test]
    fn test_wrapping_arithmetic() {
        let (module, f) = single_block(&[("x", Type::I32)], Type::I32, |b| {
            b.build_add(Value::Argument(0), Value::i32(1), "inc").unwrap()
        });
        assert_eq!(eval(&module, f, &[41]), Ok(42));
        assert_eq!(eval(&module, f, &[i32::MAX]), Ok(i32::MIN));
    }

    #[test]
    fn test_signed_and_unsigned_division() {
        for (op, expected) in [
            (BinaryOp::SDiv, -3),
            (BinaryOp::SRem, -1),
            (BinaryOp::UDiv, ((-7i32 as u32) / 2) as i32),
            (BinaryOp::URem, 1),
        ] {
            let (module, f) = single_block(&[], Type::I32, |b| {
                b.build_binary(op, Value::i32(-7), Value::i32(2), "r").unwrap()
            });
            assert_eq!(eval(&module, f, &[]), Ok(expected), "{}", op.mnemonic());
        }

        let (module, f) = single_block(&[], Type::I32, |b| {
            b.build_binary(BinaryOp::SDiv, Value::i32(i32::MIN), Value::i32(-1), "r")
                .unwrap()
        });
        assert_eq!(eval(&module, f, &[]), Ok(i32::MIN));
    }

    #[test]
    fn test_division_by_zero_traps() {
        let (module, f) = single_block(&[("d", Type::I32)], Type::I32, |b| {
            b.build_binary(BinaryOp::UDiv, Value::i32(1), Value::Argument(0), "q")
                .unwrap()
        });
        assert_eq!(eval(&module, f, &[1]), Ok(1));
        let err = eval(&module, f, &[0]).unwrap_err();
        assert_eq!(
            err,
            EvalError::Trap {
                function: "f".to_string(),
                kind: TrapKind::DivisionByZero
            }
        );
    }

    #[test]
    fn test_comparisons() {
        let cases = [
            (IntPredicate::Slt, -1, 0, 1),
            (IntPredicate::Ult, -1, 0, 0),
            (IntPredicate::Sge, 5, 5, 1),
            (IntPredicate::Ne, 5, 5, 0),
            (IntPredicate::Ugt, -1, 0, 1),
        ];
        for (pred, l, r, expected) in cases {
            let (module, f) = single_block(&[], Type::I1, |b| {
                b.build_icmp(pred, Value::i32(l), Value::i32(r), "c").unwrap()
            });
            assert_eq!(eval(&module, f, &[]), Ok(expected), "{}", pred.mnemonic());
        }
    }

    #[test]
    fn test_bool_arguments_are_truncated() {
        let (module, f) = single_block(&[("c", Type::I1)], Type::I1, |b| {
            b.build_icmp(IntPredicate::Slt, Value::Argument(0), Value::bool(false), "neg")
                .unwrap()
        });
        // 3 truncates to i1 true, which is -1 when read as signed.
        assert_eq!(eval(&module, f, &[3]), Ok(1));
        assert_eq!(eval(&module, f, &[2]), Ok(0));
    }

    #[test]
    fn test_arity_mismatch() {
        let (module, f) = single_block(&[("x", Type::I32)], Type::I32, |_| Value::Argument(0));
        let err = eval(&module, f, &[1, 2]).unwrap_err();
        assert_eq!(
            err,
            EvalError::ArityMismatch {
                function: "f".to_string(),
                expected: 1,
                found: 2
            }
        );
    }

    #[test]
    fn test_infinite_loop_hits_step_limit() {
        let mut module = Module::new("test");
        let f = module.add_function("spin", &[], Type::I32).unwrap();
        let entry = module.create_block(f, "entry").unwrap();
        let mut b = Builder::new(&mut module);
        b.position_at_end(f, entry);
        b.build_br(entry).unwrap();

        let mut interp = Interpreter::new(&module, EvalConfig::default().with_max_steps(100));
        let err = interp.evaluate(f, &[]).unwrap_err();
        assert!(matches!(
            err,
            EvalError::Trap {
                kind: TrapKind::StepLimit(100),
                ..
            }
        ));
        assert_eq!(interp.stats().steps, 100);
    }

    #[test]
    fn test_infinite_recursion_hits_depth_limit() {
        let mut module = Module::new("test");
        let f = module.add_function("down", &[("n", Type::I32)], Type::I32).unwrap();
        let entry = module.create_block(f, "entry").unwrap();
        let mut b = Builder::new(&mut module);
        b.position_at_end(f, entry);
        let r = b.build_call("down", &[Value::Argument(0)], "r").unwrap();
        b.build_ret(r).unwrap();

        let mut interp = Interpreter::new(&module, EvalConfig::default().with_max_call_depth(16));
        let err = interp.evaluate(f, &[0]).unwrap_err();
        assert_eq!(err.kind_name(), "Trap");
        assert!(matches!(
            err,
            EvalError::Trap {
                kind: TrapKind::CallDepth(16),
                ..
            }
        ));
        assert_eq!(interp.stats().max_depth, 16);
        assert_eq!(interp.stats().calls, 16);
    }

    #[test]
    fn test_undefined_value_and_missing_terminator() {
        let mut module = Module::new("test");
        let f = module.add_function("f", &[("c", Type::I1)], Type::I32).unwrap();
        let [entry, left, join] = ["entry", "left", "join"].map(|n| module.create_block(f, n).unwrap());
        let mut b = Builder::new(&mut module);
        b.position_at_end(f, entry);
        b.build_cond_br(Value::Argument(0), left, join).unwrap();
        b.position_at_end(f, left);
        let v = b.build_const(Type::I32, 9, "v").unwrap();
        b.build_br(join).unwrap();
        b.position_at_end(f, join);
        b.build_ret(v).unwrap();

        assert_eq!(eval(&module, f, &[1]), Ok(9));
        let err = eval(&module, f, &[0]).unwrap_err();
        assert_eq!(
            err,
            EvalError::UndefinedValue {
                function: "f".to_string(),
                value: "%v".to_string()
            }
        );

        let mut module = Module::new("test");
        let f = module.add_function("f", &[], Type::I32).unwrap();
        let entry = module.create_block(f, "entry").unwrap();
        let mut b = Builder::new(&mut module);
        b.position_at_end(f, entry);
        b.build_const(Type::I32, 1, "one").unwrap();
        assert_eq!(eval(&module, f, &[]).unwrap_err().kind_name(), "MissingTerminator");
    }

    #[test]
    fn test_unresolved_targets() {
        let mut module = Module::new("test");
        let f = module.add_function("f", &[], Type::I32).unwrap();
        let entry = module.create_block(f, "entry").unwrap();
        let mut b = Builder::new(&mut module);
        b.position_at_end(f, entry);
        b.build_br(BlockId(5)).unwrap();
        assert_eq!(
            eval(&module, f, &[]),
            Err(EvalError::UnresolvedBranchTarget {
                function: "f".to_string(),
                block: 5
            })
        );

        let mut interp = Interpreter::new(&module, EvalConfig::default());
        assert_eq!(interp.evaluate_by_name("nope", &[]).unwrap_err().kind_name(), "UnresolvedCall");

        let g = module.add_function("g", &[], Type::I32).unwrap();
        assert_eq!(eval(&module, g, &[]).unwrap_err().kind_name(), "EmptyFunction");
    }

    #[test]
    fn test_stats_display() {
        let stats = EvalStats {
            steps: 12,
            calls: 3,
            max_depth: 2,
        };
        let text = stats.to_string();
        assert!(text.starts_with("Evaluation Statistics:"));
        assert!(text.contains("  Instructions executed: 12"));
        assert!(text.contains("  Max call depth: 2"));
    }
}
