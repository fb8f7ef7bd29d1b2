use log::debug;

use crate::{
    lookup::lookup, ActionRequest, FrameId, FunctionId, Interpreter, RuntimeError, RuntimeResult,
    Symbol, TypeTag, Value,
};

/// The function bound to `name` in `frame`, if any. Members bound to
/// anything else do not count as hooks.
pub fn find_hook(
    interp: &Interpreter,
    frame: FrameId,
    name: Symbol,
) -> RuntimeResult<Option<FunctionId>> {
    Ok(match lookup(&interp.heap, frame, name)?.value() {
        Some(Value::Function(id)) => Some(id),
        _ => None,
    })
}

/// Run the hook for `request.action`, trying operand 2 as well for
/// actions that consult it. A hook returning `unset` declines.
pub(super) fn dispatch_hooks(
    interp: &mut Interpreter,
    request: &ActionRequest,
) -> RuntimeResult<Value> {
    let action = request.action;
    let not_supported = RuntimeError::ActionNotSupported {
        tag: TypeTag::Utype,
        action,
    };
    let Some(hook) = action.hook_symbol(&interp.symbols) else {
        return Err(not_supported);
    };

    let operands = if action.consults_second_operand() { 2 } else { 1 };
    let args = request.positional(&interp.symbols)?;
    for index in 1..=operands {
        let Value::Utype(frame) = request.arg(index) else {
            continue;
        };
        let Some(function) = find_hook(interp, frame, hook)? else {
            debug!("{}: operand {} has no hook", action, index);
            continue;
        };
        let result = interp.apply(function, &args)?;
        if !result.is_unset() {
            debug!("{}: handled by operand {}", action, index);
            return Ok(result);
        }
        debug!("{}: operand {} declined", action, index);
    }
    Err(not_supported)
}

/// Call hook `name` on `args[0]` with `args`.
///
/// `Ok(None)` when `args[0]` is not an instance; `ArgumentInvalid` when it
/// is one but has no callable `name`.
pub fn try_method(
    interp: &mut Interpreter,
    args: &[Value],
    name: &str,
) -> RuntimeResult<Option<Value>> {
    let Some(Value::Utype(frame)) = args.first().copied() else {
        return Ok(None);
    };
    let hook = interp.intern(name);
    match find_hook(interp, frame, hook)? {
        Some(function) => interp.apply(function, args).map(Some),
        None => Err(RuntimeError::ArgumentInvalid {
            tag: TypeTag::Utype,
            hook: name.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::{
        cell::{Cell, RefCell},
        rc::Rc,
    };

    use super::*;
    use crate::{utype::test_support::*, Action, Symbol};

    #[test]
    fn hook_receives_the_full_positional_argument_set() {
        let mut interp = interp();
        let hook = native(&mut interp, 1, |_, args| Ok(Value::Integer(args.len() as i64)));
        let p = instance(&mut interp, &[(".append", hook)]);
        let request = ActionRequest::new(Action::Append, vec![p, Value::Integer(1)])
            .refine(Symbol::PART, Some(Value::Integer(2)));
        // two operands, then part/only/dup slots
        assert_eq!(interp.dispatch(request), Ok(Value::Integer(7)));
    }

    #[test]
    fn refinements_keep_their_slots_whatever_else_is_passed() {
        let mut interp = interp();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let record = seen.clone();
        let hook = native(&mut interp, 1, move |_, args| {
            record.borrow_mut().push(args.to_vec());
            Ok(Value::None)
        });
        let p = instance(&mut interp, &[(".take", hook)]);

        let part = ActionRequest::new(Action::Take, vec![p]).refine(Symbol::PART, Some(Value::Integer(2)));
        let deep = ActionRequest::new(Action::Take, vec![p]).refine(Symbol::DEEP, None);
        interp.dispatch(part).unwrap();
        interp.dispatch(deep).unwrap();

        let seen = seen.borrow();
        assert_eq!(
            seen[0],
            vec![p, Value::Logic(true), Value::Integer(2), Value::Logic(false), Value::Logic(false)]
        );
        assert_eq!(
            seen[1],
            vec![p, Value::Logic(false), Value::None, Value::Logic(true), Value::Logic(false)]
        );
    }

    #[test]
    fn undeclared_refinements_never_reach_the_hook() {
        let mut interp = interp();
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let hook = native(&mut interp, 1, move |_, _| {
            counter.set(counter.get() + 1);
            Ok(Value::None)
        });
        let p = instance(&mut interp, &[(".negate", hook)]);
        let request = ActionRequest::new(Action::Negate, vec![p]).refine(Symbol::DEEP, None);
        assert_eq!(interp.dispatch(request), Err(RuntimeError::BadRefinement));
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn second_operand_handles_when_first_has_no_hook() {
        let mut interp = interp();
        let add = native(&mut interp, 2, |_, args| Ok(args[1]));
        let plain = instance(&mut interp, &[]);
        let adder = instance(&mut interp, &[(".add", add)]);
        assert_eq!(interp.act(Action::Add, &[plain, adder]), Ok(adder));
        assert_eq!(interp.act(Action::Add, &[Value::Integer(1), adder]), Ok(adder));
    }

    #[test]
    fn unset_result_declines_to_the_second_operand() {
        let mut interp = interp();
        let decline = native(&mut interp, 2, |_, _| Ok(Value::Unset));
        let accept = native(&mut interp, 2, |_, _| Ok(Value::Integer(2)));
        let a = instance(&mut interp, &[(".subtract", decline)]);
        let b = instance(&mut interp, &[(".subtract", accept)]);
        assert_eq!(interp.act(Action::Subtract, &[a, b]), Ok(Value::Integer(2)));
        assert_eq!(
            interp.act(Action::Subtract, &[a, a]),
            Err(RuntimeError::ActionNotSupported {
                tag: TypeTag::Utype,
                action: Action::Subtract
            })
        );
    }

    #[test]
    fn unary_actions_never_consult_the_second_operand() {
        let mut interp = interp();
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let hook = native(&mut interp, 1, move |_, _| {
            counter.set(counter.get() + 1);
            Ok(Value::None)
        });
        let plain = instance(&mut interp, &[]);
        let hooked = instance(&mut interp, &[(".append", hook)]);
        assert!(interp.act(Action::Append, &[plain, hooked]).is_err());
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn non_function_members_are_not_hooks() {
        let mut interp = interp();
        let p = instance(&mut interp, &[(".negate", Value::Integer(1))]);
        assert!(matches!(
            interp.act(Action::Negate, &[p]),
            Err(RuntimeError::ActionNotSupported { .. })
        ));
    }

    #[test]
    fn hook_names_are_case_insensitive() {
        let mut interp = interp();
        let hook = native(&mut interp, 1, |_, _| Ok(Value::Integer(3)));
        let p = instance(&mut interp, &[(".LENGTH?", hook)]);
        assert_eq!(interp.act(Action::LengthQ, &[p]), Ok(Value::Integer(3)));
    }

    #[test]
    fn try_method_distinguishes_non_instances_from_missing_hooks() {
        let mut interp = interp();
        assert_eq!(try_method(&mut interp, &[Value::Integer(1)], ".form"), Ok(None));

        let p = instance(&mut interp, &[(".form", Value::None)]);
        assert_eq!(
            try_method(&mut interp, &[p], ".form"),
            Err(RuntimeError::ArgumentInvalid {
                tag: TypeTag::Utype,
                hook: ".form".into()
            })
        );

        let text = interp.make_string("point");
        interp.heap.pin(text);
        let form = native(&mut interp, 1, move |_, _| Ok(text));
        let q = instance(&mut interp, &[(".form", form)]);
        assert_eq!(try_method(&mut interp, &[q], ".form"), Ok(Some(text)));
        assert_eq!(interp.form(q).unwrap(), "point");
    }
}
