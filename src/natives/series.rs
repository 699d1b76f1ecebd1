//! Series natives over blocks.

use crate::action::{Action, Args, Native, Param};
use crate::binding::Env;
use crate::error::EvalError;
use crate::value::{Block, Value};
use crate::vm::Vm;

use super::define;

pub(crate) fn register(lib: &Env) {
    let series_value = || vec![Param::normal("series"), Param::normal("value")];
    define(lib, Action::native("append", series_value(), Native::Plain(native_append)));
    define(lib, Action::native("insert", series_value(), Native::Plain(native_insert)));
    define(
        lib,
        Action::native("pick", vec![Param::normal("series"), Param::normal("index")], Native::Plain(native_pick)),
    );
    for (name, f) in [
        ("length-of", native_length_of as crate::action::PlainFn),
        ("clear", native_clear),
        ("copy", native_copy),
        ("next", native_next),
    ] {
        define(lib, Action::native(name, vec![Param::normal("series")], Native::Plain(f)));
    }
}

/// Items a value contributes when added to a block; blocks are spliced.
fn spliced(args: &Args) -> Result<Vec<Value>, EvalError> {
    match args.get("value") {
        Value::Block(block) => Ok(block.series.to_vec()),
        Value::Void => Ok(Vec::new()),
        Value::Null => Err(args.mismatch("value", "non-null value", &Value::Null)),
        other => Ok(vec![other]),
    }
}

fn native_append(_vm: &mut Vm, _env: &Env, args: &Args) -> Result<Value, EvalError> {
    let block = args.block("series")?;
    for item in spliced(args)? {
        block.series.append(item)?;
    }
    Ok(Value::Block(block))
}

/// Insert at the block's position; returns the position just past the
/// inserted items.
fn native_insert(_vm: &mut Vm, _env: &Env, args: &Args) -> Result<Value, EvalError> {
    let block = args.block("series")?;
    let items = spliced(args)?;
    let count = items.len();
    for (offset, item) in items.into_iter().enumerate() {
        block.series.insert(offset, item)?;
    }
    Ok(Value::Block(Block {
        series: block.series.at(block.series.index() + count),
        binding: block.binding,
    }))
}

/// One-based pick; out of range gives null.
fn native_pick(_vm: &mut Vm, _env: &Env, args: &Args) -> Result<Value, EvalError> {
    let block = args.block("series")?;
    let index = args.int("index")?;
    if index < 1 {
        return Ok(Value::Null);
    }
    Ok(block.series.get(index as usize - 1).unwrap_or(Value::Null))
}

fn native_length_of(_vm: &mut Vm, _env: &Env, args: &Args) -> Result<Value, EvalError> {
    match args.get("series") {
        Value::Block(block) | Value::Group(block) => Ok(Value::Integer(block.series.len() as i64)),
        Value::Text(text) => Ok(Value::Integer(text.chars().count() as i64)),
        other => Err(args.mismatch("series", "block or text", &other)),
    }
}

fn native_clear(_vm: &mut Vm, _env: &Env, args: &Args) -> Result<Value, EvalError> {
    let block = args.block("series")?;
    block.series.clear()?;
    Ok(Value::Block(block))
}

fn native_copy(_vm: &mut Vm, _env: &Env, args: &Args) -> Result<Value, EvalError> {
    match args.get("series") {
        Value::Block(block) => {
            let mut copied = Block::new(block.series.to_vec());
            copied.binding = block.binding;
            Ok(Value::Block(copied))
        }
        Value::Text(text) => Ok(Value::Text(text)),
        other => Err(args.mismatch("series", "block or text", &other)),
    }
}

fn native_next(_vm: &mut Vm, _env: &Env, args: &Args) -> Result<Value, EvalError> {
    let block = args.block("series")?;
    let index = (block.series.index() + 1).min(block.series.total_len());
    Ok(Value::Block(Block {
        series: block.series.at(index),
        binding: block.binding,
    }))
}

#[cfg(test)]
mod tests {
    use crate::error::EvalError;
    use crate::vm::Vm;

    #[test]
    fn test_append_splices_blocks() {
        let mut vm = Vm::new();
        let value = vm.eval_str("b: copy [1] append b [2 3] append b 4 b").unwrap();
        assert_eq!(value.to_string(), "[1 2 3 4]");
    }

    #[test]
    fn test_insert_at_position() {
        let mut vm = Vm::new();
        let value = vm.eval_str("b: copy [1 4] insert next b [2 3] b").unwrap();
        assert_eq!(value.to_string(), "[1 2 3 4]");
    }

    #[test]
    fn test_pick_and_length() {
        let mut vm = Vm::new();
        assert_eq!(vm.eval_str("pick [a b c] 2").unwrap().to_string(), "b");
        assert!(vm.eval_str("pick [a b c] 9").unwrap().is_null());
        assert_eq!(vm.eval_str("length-of next [1 2 3]").unwrap().as_int(), Some(2));
    }

    #[test]
    fn test_copy_is_independent() {
        let mut vm = Vm::new();
        let value = vm.eval_str("a: [1 2] b: copy a append b 3 a").unwrap();
        assert_eq!(value.to_string(), "[1 2]");
    }

    #[test]
    fn test_append_null_is_error() {
        let mut vm = Vm::new();
        assert!(matches!(
            vm.eval_str("append copy [] null"),
            Err(EvalError::TypeMismatch { .. })
        ));
    }
}
