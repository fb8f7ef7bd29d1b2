//! Host natives bound in the globals frame. Immediates are handled here;
//! everything else goes through the dispatch table.

use crate::{
    Action, CompareMode, Interpreter, RuntimeError, RuntimeResult, Series, TypeTag, Value,
};

pub type NativeFnPtr = fn(&mut Interpreter, &[Value]) -> RuntimeResult<Value>;

#[derive(Clone, Copy)]
pub struct NativeDesc {
    pub name: &'static str,
    pub arity: usize,
    pub func: NativeFnPtr,
}

impl NativeDesc {
    pub const fn new(name: &'static str, arity: usize, func: NativeFnPtr) -> Self {
        Self { name, arity, func }
    }
}

pub fn default_natives() -> Vec<NativeDesc> {
    vec![
        NativeDesc::new("make", 2, make),
        NativeDesc::new("copy", 1, copy),
        NativeDesc::new("reflect", 2, reflect),
        NativeDesc::new("add", 2, add),
        NativeDesc::new("subtract", 2, subtract),
        NativeDesc::new("multiply", 2, multiply),
        NativeDesc::new("divide", 2, divide),
        NativeDesc::new("negate", 1, negate),
        NativeDesc::new("absolute", 1, absolute),
        NativeDesc::new("length?", 1, length_q),
        NativeDesc::new("append", 2, append),
        NativeDesc::new("to", 2, to),
        NativeDesc::new("equal?", 2, equal_q),
        NativeDesc::new("same?", 2, same_q),
        NativeDesc::new("greater?", 2, greater_q),
        NativeDesc::new("form", 1, form),
    ]
}

fn make(interp: &mut Interpreter, args: &[Value]) -> RuntimeResult<Value> {
    match (args[0], args[1]) {
        (Value::Datatype(TypeTag::Object), Value::Block(decls)) => interp.make_object(decls),
        (Value::Datatype(TypeTag::Object), other) => Err(RuntimeError::MakeTypeMismatch {
            target: TypeTag::Object,
            got: other.type_tag(),
        }),
        (value, argument) => interp.make(value, argument),
    }
}

fn copy(interp: &mut Interpreter, args: &[Value]) -> RuntimeResult<Value> {
    let value = args[0];
    match value.series() {
        Some(series) => {
            let data = interp.heap.series(series)?.clone();
            Ok(value.with_series(interp.heap.alloc_series(data)))
        }
        None => interp.copy(value),
    }
}

fn reflect(interp: &mut Interpreter, args: &[Value]) -> RuntimeResult<Value> {
    interp.act(Action::Reflect, &args[..2])
}

enum Numbers {
    Integers(i64, i64),
    Decimals(f64, f64),
}

fn numbers(a: Value, b: Value) -> Option<Numbers> {
    Some(match (a, b) {
        (Value::Integer(a), Value::Integer(b)) => Numbers::Integers(a, b),
        (Value::Integer(a), Value::Decimal(b)) => Numbers::Decimals(a as f64, b),
        (Value::Decimal(a), Value::Integer(b)) => Numbers::Decimals(a, b as f64),
        (Value::Decimal(a), Value::Decimal(b)) => Numbers::Decimals(a, b),
        _ => return None,
    })
}

fn overflow() -> RuntimeError {
    RuntimeError::User("math or number overflow".into())
}

fn arith(
    interp: &mut Interpreter,
    action: Action,
    args: &[Value],
    int: fn(i64, i64) -> Option<i64>,
    dec: fn(f64, f64) -> f64,
) -> RuntimeResult<Value> {
    match numbers(args[0], args[1]) {
        Some(Numbers::Integers(a, b)) => int(a, b).map(Value::Integer).ok_or_else(overflow),
        Some(Numbers::Decimals(a, b)) => Ok(Value::Decimal(dec(a, b))),
        None => interp.act(action, &args[..2]),
    }
}

fn add(interp: &mut Interpreter, args: &[Value]) -> RuntimeResult<Value> {
    arith(interp, Action::Add, args, i64::checked_add, |a, b| a + b)
}

fn subtract(interp: &mut Interpreter, args: &[Value]) -> RuntimeResult<Value> {
    arith(interp, Action::Subtract, args, i64::checked_sub, |a, b| a - b)
}

fn multiply(interp: &mut Interpreter, args: &[Value]) -> RuntimeResult<Value> {
    arith(interp, Action::Multiply, args, i64::checked_mul, |a, b| a * b)
}

fn divide(interp: &mut Interpreter, args: &[Value]) -> RuntimeResult<Value> {
    match numbers(args[0], args[1]) {
        Some(Numbers::Integers(_, 0)) => Err(RuntimeError::User("attempt to divide by zero".into())),
        Some(Numbers::Decimals(_, b)) if b == 0.0 => {
            Err(RuntimeError::User("attempt to divide by zero".into()))
        }
        Some(Numbers::Integers(a, b)) if a.checked_rem(b) != Some(0) => {
            Ok(Value::Decimal(a as f64 / b as f64))
        }
        Some(Numbers::Integers(a, b)) => a.checked_div(b).map(Value::Integer).ok_or_else(overflow),
        Some(Numbers::Decimals(a, b)) => Ok(Value::Decimal(a / b)),
        None => interp.act(Action::Divide, &args[..2]),
    }
}

fn negate(interp: &mut Interpreter, args: &[Value]) -> RuntimeResult<Value> {
    match args[0] {
        Value::Integer(n) => n.checked_neg().map(Value::Integer).ok_or_else(overflow),
        Value::Decimal(n) => Ok(Value::Decimal(-n)),
        other => interp.act(Action::Negate, &[other]),
    }
}

fn absolute(interp: &mut Interpreter, args: &[Value]) -> RuntimeResult<Value> {
    match args[0] {
        Value::Integer(n) => n.checked_abs().map(Value::Integer).ok_or_else(overflow),
        Value::Decimal(n) => Ok(Value::Decimal(n.abs())),
        other => interp.act(Action::Absolute, &[other]),
    }
}

fn length_q(interp: &mut Interpreter, args: &[Value]) -> RuntimeResult<Value> {
    match args[0].series() {
        Some(series) => Ok(Value::Integer(interp.heap.series(series)?.len() as i64)),
        None => interp.act(Action::LengthQ, &[args[0]]),
    }
}

fn append(interp: &mut Interpreter, args: &[Value]) -> RuntimeResult<Value> {
    match args[0] {
        Value::Block(series) => {
            if let Series::Values(values) = interp.heap.series_mut(series)? {
                values.push(args[1]);
            }
            Ok(args[0])
        }
        _ => interp.act(Action::Append, &args[..2]),
    }
}

fn to(interp: &mut Interpreter, args: &[Value]) -> RuntimeResult<Value> {
    interp.act(Action::To, &args[..2])
}

fn equal_q(interp: &mut Interpreter, args: &[Value]) -> RuntimeResult<Value> {
    interp
        .compare(args[0], args[1], CompareMode::Equal)
        .map(Value::Logic)
}

fn same_q(interp: &mut Interpreter, args: &[Value]) -> RuntimeResult<Value> {
    interp
        .compare(args[0], args[1], CompareMode::Same)
        .map(Value::Logic)
}

fn greater_q(interp: &mut Interpreter, args: &[Value]) -> RuntimeResult<Value> {
    interp
        .compare(args[0], args[1], CompareMode::Greater)
        .map(Value::Logic)
}

fn form(interp: &mut Interpreter, args: &[Value]) -> RuntimeResult<Value> {
    let text = interp.form(args[0])?;
    Ok(interp.make_string(&text))
}
