//! Integer arithmetic and comparison, mostly infix.

use std::cmp::Ordering;

use crate::action::{Action, Args, Native, Param};
use crate::binding::Env;
use crate::error::EvalError;
use crate::value::Value;
use crate::vm::Vm;

use super::define;

pub(crate) fn register(lib: &Env) {
    define(lib, Action::infix("+", op_add));
    define(lib, Action::infix("-", op_subtract));
    define(lib, Action::infix("*", op_multiply));
    define(lib, Action::infix("/", op_divide));
    define(lib, Action::infix("<", op_lesser));
    define(lib, Action::infix(">", op_greater));
    define(lib, Action::infix("<=", op_lesser_or_equal));
    define(lib, Action::infix(">=", op_greater_or_equal));
    define(lib, Action::infix("=", op_equal));
    define(lib, Action::infix("<>", op_not_equal));
    define(lib, Action::native("even?", vec![Param::normal("value")], Native::Plain(native_even)));
    define(lib, Action::native("odd?", vec![Param::normal("value")], Native::Plain(native_odd)));
}

fn operands(args: &Args) -> Result<(i64, i64), EvalError> {
    Ok((args.int("left")?, args.int("right")?))
}

fn op_add(_vm: &mut Vm, _env: &Env, args: &Args) -> Result<Value, EvalError> {
    let (a, b) = operands(args)?;
    a.checked_add(b)
        .map(Value::Integer)
        .ok_or(EvalError::Overflow { op: "+" })
}

fn op_subtract(_vm: &mut Vm, _env: &Env, args: &Args) -> Result<Value, EvalError> {
    let (a, b) = operands(args)?;
    a.checked_sub(b)
        .map(Value::Integer)
        .ok_or(EvalError::Overflow { op: "-" })
}

fn op_multiply(_vm: &mut Vm, _env: &Env, args: &Args) -> Result<Value, EvalError> {
    let (a, b) = operands(args)?;
    a.checked_mul(b)
        .map(Value::Integer)
        .ok_or(EvalError::Overflow { op: "*" })
}

fn op_divide(_vm: &mut Vm, _env: &Env, args: &Args) -> Result<Value, EvalError> {
    let (a, b) = operands(args)?;
    if b == 0 {
        return Err(EvalError::DivideByZero);
    }
    a.checked_div(b)
        .map(Value::Integer)
        .ok_or(EvalError::Overflow { op: "/" })
}

/// Ordering for integers and texts; other pairs are not comparable.
fn compare(args: &Args) -> Result<Ordering, EvalError> {
    match (args.get("left"), args.get("right")) {
        (Value::Integer(a), Value::Integer(b)) => Ok(a.cmp(&b)),
        (Value::Text(a), Value::Text(b)) => Ok(a.cmp(&b)),
        (left, right) => Err(EvalError::type_mismatch(
            format!("{} comparison", args.action),
            left.type_name(),
            right.type_name(),
        )),
    }
}

fn op_lesser(_vm: &mut Vm, _env: &Env, args: &Args) -> Result<Value, EvalError> {
    Ok(Value::Logic(compare(args)? == Ordering::Less))
}

fn op_greater(_vm: &mut Vm, _env: &Env, args: &Args) -> Result<Value, EvalError> {
    Ok(Value::Logic(compare(args)? == Ordering::Greater))
}

fn op_lesser_or_equal(_vm: &mut Vm, _env: &Env, args: &Args) -> Result<Value, EvalError> {
    Ok(Value::Logic(compare(args)? != Ordering::Greater))
}

fn op_greater_or_equal(_vm: &mut Vm, _env: &Env, args: &Args) -> Result<Value, EvalError> {
    Ok(Value::Logic(compare(args)? != Ordering::Less))
}

fn op_equal(_vm: &mut Vm, _env: &Env, args: &Args) -> Result<Value, EvalError> {
    Ok(Value::Logic(args.get("left").equals(&args.get("right"))))
}

fn op_not_equal(_vm: &mut Vm, _env: &Env, args: &Args) -> Result<Value, EvalError> {
    Ok(Value::Logic(!args.get("left").equals(&args.get("right"))))
}

fn native_even(_vm: &mut Vm, _env: &Env, args: &Args) -> Result<Value, EvalError> {
    Ok(Value::Logic(args.int("value")? % 2 == 0))
}

fn native_odd(_vm: &mut Vm, _env: &Env, args: &Args) -> Result<Value, EvalError> {
    Ok(Value::Logic(args.int("value")? % 2 != 0))
}

#[cfg(test)]
mod tests {
    use crate::error::EvalError;
    use crate::vm::Vm;

    #[test]
    fn test_arithmetic() {
        let mut vm = Vm::new();
        assert_eq!(vm.eval_str("7 - 2 * 3").unwrap().as_int(), Some(15));
        assert_eq!(vm.eval_str("7 / 2").unwrap().as_int(), Some(3));
        assert_eq!(vm.eval_str("-7 + 2").unwrap().as_int(), Some(-5));
    }

    #[test]
    fn test_comparisons() {
        let mut vm = Vm::new();
        assert_eq!(vm.eval_str("1 <= 1").unwrap().to_string(), "true");
        assert_eq!(vm.eval_str("\"a\" < \"b\"").unwrap().to_string(), "true");
        assert_eq!(vm.eval_str("[1 2] = [1 2]").unwrap().to_string(), "true");
        assert_eq!(vm.eval_str("1 <> 1").unwrap().to_string(), "false");
    }

    #[test]
    fn test_math_errors() {
        let mut vm = Vm::new();
        assert!(matches!(vm.eval_str("1 / 0"), Err(EvalError::DivideByZero)));
        assert!(matches!(
            vm.eval_str("9223372036854775807 + 1"),
            Err(EvalError::Overflow { op: "+" })
        ));
        assert!(matches!(vm.eval_str("1 < \"a\""), Err(EvalError::TypeMismatch { .. })));
    }
}
