use log::debug;

use super::find_hook;
use crate::{action::COMPARE_HOOK, CompareMode, Interpreter, RuntimeResult, Value};

/// Identity: both are instances of the same frame.
pub fn same(a: &Value, b: &Value) -> bool {
    matches!((a, b), (Value::Utype(x), Value::Utype(y)) if x == y)
}

/// Identity for [`CompareMode::Same`]; otherwise the first truthy answer
/// from the `.compare` hook of `a`, then of `b`.
pub(super) fn compare(
    interp: &mut Interpreter,
    a: Value,
    b: Value,
    mode: CompareMode,
) -> RuntimeResult<bool> {
    if mode == CompareMode::Same {
        return Ok(same(&a, &b));
    }

    let hook = interp.intern(COMPARE_HOOK);
    for operand in [a, b] {
        let Value::Utype(frame) = operand else {
            continue;
        };
        let Some(function) = find_hook(interp, frame, hook)? else {
            continue;
        };
        let result = interp.apply(function, &[a, b, Value::Integer(mode.code())])?;
        debug!("compare {:?}: {:?}", mode, result);
        if result.is_truthy() {
            return Ok(true);
        }
    }
    Ok(false)
}
