//! Property-based tests for the builder, verifier and interpreter.
//!
//! These tests use proptest to check that:
//! 1. The tutorial programs agree with native arithmetic
//! 2. Arity is enforced for every wrong argument count
//! 3. Arbitrarily wired functions never make the verifier or the interpreter
//!    panic, and a function the verifier accepts only fails by trapping

use minir::{
    has_errors, parse_module, samples, verify_module, BlockId, Builder, EvalConfig, EvalError,
    InstId, Instruction, IntConst, IntPredicate, Interpreter, Module, TrapKind, Type, Value,
};
use proptest::prelude::*;

// =============================================================================
// STRATEGY GENERATORS
// =============================================================================

/// Shape of one instruction; operand and target indices are resolved later
/// and may point at nothing.
#[derive(Debug, Clone)]
enum Op {
    Const(i32),
    Add(u32, u32),
    ICmp(u32, u32),
    Br(u32),
    CondBr(u32, u32, u32),
    Ret(u32),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        any::<i32>().prop_map(Op::Const),
        (0u32..10, 0u32..10).prop_map(|(a, b)| Op::Add(a, b)),
        (0u32..10, 0u32..10).prop_map(|(a, b)| Op::ICmp(a, b)),
        (0u32..5).prop_map(Op::Br),
        (0u32..10, 0u32..5, 0u32..5).prop_map(|(c, t, e)| Op::CondBr(c, t, e)),
        (0u32..10).prop_map(Op::Ret),
    ]
}

fn blocks() -> impl Strategy<Value = Vec<Vec<Op>>> {
    prop::collection::vec(prop::collection::vec(op(), 0..6), 1..5)
}

/// Indices below 8 name instruction results, the rest name arguments.
fn operand(index: u32) -> Value {
    if index < 8 {
        Value::Result(InstId(index))
    } else {
        Value::Argument(index - 8)
    }
}

fn build(blocks: &[Vec<Op>]) -> Module {
    let mut module = Module::new("generated");
    let f = module.add_function("f", &[("a", Type::I32)], Type::I32).unwrap();
    let ids: Vec<_> = (0..blocks.len())
        .map(|_| module.create_block(f, "").unwrap())
        .collect();

    let mut b = Builder::new(&mut module);
    for (block, ops) in ids.iter().zip(blocks) {
        b.position_at_end(f, *block);
        for op in ops {
            let inst = match *op {
                Op::Const(v) => Instruction::Const(IntConst::i32(v)),
                Op::Add(l, r) => Instruction::Binary {
                    op: minir::BinaryOp::Add,
                    lhs: operand(l),
                    rhs: operand(r),
                },
                Op::ICmp(l, r) => Instruction::ICmp {
                    pred: IntPredicate::Slt,
                    lhs: operand(l),
                    rhs: operand(r),
                },
                Op::Br(t) => Instruction::Br { dest: BlockId(t) },
                Op::CondBr(c, t, e) => Instruction::CondBr {
                    cond: operand(c),
                    then_dest: BlockId(t),
                    else_dest: BlockId(e),
                },
                Op::Ret(v) => Instruction::Ret { value: operand(v) },
            };
            // Appending past a terminator is rejected; the block keeps its shape.
            let _ = b.append(inst, "");
        }
    }
    module
}

fn native_gcd(mut a: i32, mut b: i32) -> i32 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

// =============================================================================
// PROPERTIES
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn prop_mul_add_matches_wrapping_arithmetic(x in any::<i32>(), y in any::<i32>(), z in any::<i32>()) {
        let module = samples::mul_add_module().unwrap();
        let mut interp = Interpreter::new(&module, EvalConfig::default());
        let result = interp.evaluate_by_name("mul_add", &[x, y, z]).unwrap();
        prop_assert_eq!(result, x.wrapping_mul(y).wrapping_add(z));
    }

    #[test]
    fn prop_gcd_matches_native(x in 1i32..=64, y in 1i32..=64) {
        let module = samples::gcd_module().unwrap();
        let mut interp = Interpreter::new(&module, EvalConfig::default());
        prop_assert_eq!(interp.evaluate_by_name("gcd", &[x, y]).unwrap(), native_gcd(x, y));
    }

    #[test]
    fn prop_gcd_survives_print_and_parse(x in 1i32..=64, y in 1i32..=64) {
        let module = samples::gcd_module().unwrap();
        let reparsed = parse_module(&module.to_string()).unwrap();
        let original = Interpreter::new(&module, EvalConfig::default()).evaluate_by_name("gcd", &[x, y]);
        let round_trip = Interpreter::new(&reparsed, EvalConfig::default()).evaluate_by_name("gcd", &[x, y]);
        prop_assert_eq!(original, round_trip);
    }

    #[test]
    fn prop_wrong_arity_is_rejected(args in prop::collection::vec(any::<i32>(), 0..8)) {
        prop_assume!(args.len() != 3);
        let module = samples::mul_add_module().unwrap();
        let err = Interpreter::new(&module, EvalConfig::default())
            .evaluate_by_name("mul_add", &args)
            .unwrap_err();
        prop_assert_eq!(
            err,
            EvalError::ArityMismatch {
                function: "mul_add".to_string(),
                expected: 3,
                found: args.len(),
            }
        );
    }

    #[test]
    fn prop_generated_functions_are_handled(shape in blocks(), arg in any::<i32>()) {
        let module = build(&shape);

        let diagnostics = verify_module(&module);
        prop_assert_eq!(&diagnostics, &verify_module(&module));

        let config = EvalConfig::default().with_max_steps(200);
        let result = Interpreter::new(&module, config).evaluate_by_name("f", &[arg]);
        if !has_errors(&diagnostics) {
            let clean = matches!(
                result,
                Ok(_) | Err(EvalError::Trap { kind: TrapKind::StepLimit(200), .. })
            );
            prop_assert!(clean, "verified function failed with {:?}\n{}", result, module);
        }
    }
}
