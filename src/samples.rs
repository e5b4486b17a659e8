//! Small tutorial programs built with the [`Builder`].
//!
//! These are used by the `demo` subcommand and by the tests.

use crate::error::BuildResult;
use crate::ir::{Builder, IntPredicate, Module, Type, Value};

/// `mul_add(x, y, z) = x * y + z`.
pub fn mul_add_module() -> BuildResult<Module> {
    let mut module = Module::new("MyFirstModule");
    let f = module.add_function(
        "mul_add",
        &[("x", Type::I32), ("y", Type::I32), ("z", Type::I32)],
        Type::I32,
    )?;
    let entry = module.create_block(f, "entry")?;

    let mut builder = Builder::new(&mut module);
    builder.position_at_end(f, entry);
    let (x, y, z) = (Value::Argument(0), Value::Argument(1), Value::Argument(2));
    let tmp = builder.build_mul(x, y, "tmp")?;
    let tmp2 = builder.build_add(tmp, z, "tmp2")?;
    builder.build_ret(tmp2)?;

    Ok(module)
}

/// Euclid's algorithm by repeated subtraction, recursing on itself.
pub fn gcd_module() -> BuildResult<Module> {
    let mut module = Module::new("MySecondModule");
    let f = module.add_function("gcd", &[("x", Type::I32), ("y", Type::I32)], Type::I32)?;
    let entry = module.create_block(f, "entry")?;
    let ret = module.create_block(f, "return")?;
    let cond_false = module.create_block(f, "cond_false")?;
    let cond_true = module.create_block(f, "cond_true")?;
    let cond_false_2 = module.create_block(f, "cond_false_2")?;

    let (x, y) = (Value::Argument(0), Value::Argument(1));

    let mut builder = Builder::new(&mut module);

    builder.position_at_end(f, entry);
    let x_eq_y = builder.build_icmp(IntPredicate::Eq, x, y, "tmp")?;
    builder.build_cond_br(x_eq_y, ret, cond_false)?;

    builder.position_at_end(f, ret);
    builder.build_ret(x)?;

    builder.position_at_end(f, cond_false);
    let x_lt_y = builder.build_icmp(IntPredicate::Ult, x, y, "tmp")?;
    builder.build_cond_br(x_lt_y, cond_true, cond_false_2)?;

    builder.position_at_end(f, cond_true);
    let y_sub_x = builder.build_sub(y, x, "tmp")?;
    let recur_1 = builder.build_call("gcd", &[x, y_sub_x], "tmp")?;
    builder.build_ret(recur_1)?;

    builder.position_at_end(f, cond_false_2);
    let x_sub_y = builder.build_sub(x, y, "tmp")?;
    let recur_2 = builder.build_call("gcd", &[x_sub_y, y], "tmp")?;
    builder.build_ret(recur_2)?;

    Ok(module)
}

/// `main() = 2 + 3`, with both operands materialized as constants.
pub fn constant_add_module() -> BuildResult<Module> {
    let mut module = Module::new("constant_add");
    let f = module.add_function("main", &[], Type::I32)?;
    let entry = module.create_block(f, "entry")?;

    let mut builder = Builder::new(&mut module);
    builder.position_at_end(f, entry);
    let two = builder.build_const(Type::I32, 2, "two")?;
    let three = builder.build_const(Type::I32, 3, "three")?;
    let sum = builder.build_add(two, three, "sum")?;
    builder.build_ret(sum)?;

    Ok(module)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verify::verify_module;

    #[test]
    fn test_samples_verify_cleanly() {
        for module in [
            mul_add_module().unwrap(),
            gcd_module().unwrap(),
            constant_add_module().unwrap(),
        ] {
            assert!(verify_module(&module).is_empty(), "{module}");
        }
    }

    #[test]
    fn test_gcd_shape() {
        let module = gcd_module().unwrap();
        let func = module.function_named("gcd").unwrap();
        let names: Vec<_> = func.blocks().map(|(_, b)| b.name().to_string()).collect();
        assert_eq!(
            names,
            ["entry", "return", "cond_false", "cond_true", "cond_false_2"]
        );
        assert_eq!(func.num_insts(), 11);
    }
}
