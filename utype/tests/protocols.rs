use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use utype::{
    Action, ActionRequest, CompareMode, HeapCreateInfo, Interpreter, InterpreterCreateInfo,
    RuntimeError, RuntimeResult, Symbol, TypeTag, Value,
};

fn interpreter(stress: bool) -> Interpreter {
    let _ = env_logger::builder().is_test(true).try_init();
    Interpreter::new(InterpreterCreateInfo {
        heap: HeapCreateInfo {
            stress: Some(stress),
            ..Default::default()
        },
    })
}

fn pin(interp: &mut Interpreter, value: Value) -> Value {
    interp.heap.pin(value);
    value
}

fn block(interp: &mut Interpreter, values: Vec<Value>) -> Value {
    let block = interp.make_block(values);
    pin(interp, block)
}

fn hook(
    interp: &mut Interpreter,
    name: &str,
    arity: usize,
    f: impl Fn(&mut Interpreter, &[Value]) -> RuntimeResult<Value> + 'static,
) {
    interp.define_native(name, arity, Rc::new(f));
}

/// `make utype! [a: 1 items: [1 [2]] b: add a 1]`
fn fresh(interp: &mut Interpreter) -> Value {
    let a = interp.intern("a");
    let b = interp.intern("b");
    let items = interp.intern("items");
    let add = interp.intern("add");
    let nested = block(interp, vec![Value::Integer(2)]);
    let list = block(interp, vec![Value::Integer(1), nested]);
    let decls = block(
        interp,
        vec![
            Value::SetWord(a),
            Value::Integer(1),
            Value::SetWord(items),
            list,
            Value::SetWord(b),
            Value::Word(add),
            Value::Word(a),
            Value::Integer(1),
        ],
    );
    let x = interp
        .make(Value::Datatype(TypeTag::Utype), decls)
        .expect("fresh make");
    pin(interp, x)
}

fn both_modes(test: impl Fn(&mut Interpreter)) {
    for stress in [false, true] {
        let mut interp = interpreter(stress);
        test(&mut interp);
    }
}

#[test]
fn identity_holds_only_for_the_same_instance() {
    both_modes(|interp| {
        let x = fresh(interp);
        let y = fresh(interp);
        assert!(interp.compare(x, x, CompareMode::Same).unwrap());
        assert!(!interp.compare(x, y, CompareMode::Same).unwrap());
    });
}

#[test]
fn fresh_construction_survives_collection_during_evaluation() {
    let mut interp = interpreter(true);
    let x = fresh(&mut interp);
    assert_eq!(interp.member(x, "b").unwrap(), Value::Integer(2));
    assert!(interp.heap.stats().collections > 0);
    let Value::Utype(id) = x else {
        panic!("expected an instance, got {x:?}");
    };
    assert_eq!(interp.heap.frame(id).unwrap().self_value(), x);
}

#[test]
fn clone_is_independent_and_self_referencing() {
    both_modes(|interp| {
        let x = fresh(interp);
        let me = interp.intern("me");
        let decls = block(interp, vec![Value::SetWord(me), Value::Word(Symbol::SELF)]);
        let x = interp.make(x, decls).unwrap();
        let x = pin(interp, x);
        assert_eq!(interp.member(x, "me").unwrap(), x);

        let y = interp.make(x, Value::None).unwrap();
        let y = pin(interp, y);
        interp.set_member(y, "a", Value::Integer(100)).unwrap();
        assert_eq!(interp.member(x, "a").unwrap(), Value::Integer(1));
        assert_eq!(interp.member(y, "me").unwrap(), y);
        assert_ne!(interp.member(y, "items").unwrap(), interp.member(x, "items").unwrap());
    });
}

#[test]
fn derive_adds_fields_and_snapshots_the_source() {
    both_modes(|interp| {
        let x = fresh(interp);
        let newfield = interp.intern("newfield");
        let decls = block(interp, vec![Value::SetWord(newfield), Value::Integer(1)]);
        let z = interp.make(x, decls).unwrap();
        let z = pin(interp, z);

        for name in ["a", "b", "items"] {
            assert!(interp.member(z, name).is_ok(), "missing {name}");
        }
        assert_eq!(interp.member(z, "newfield").unwrap(), Value::Integer(1));

        interp.set_member(x, "a", Value::Integer(42)).unwrap();
        assert_eq!(interp.member(z, "a").unwrap(), Value::Integer(1));
    });
}

#[test]
fn merge_takes_the_argument_on_collision() {
    both_modes(|interp| {
        let f = interp.intern("f");
        let left = block(interp, vec![Value::SetWord(f), Value::Integer(1)]);
        let right = block(interp, vec![Value::SetWord(f), Value::Integer(2)]);
        let a = interp.make(Value::Datatype(TypeTag::Utype), left).unwrap();
        let a = pin(interp, a);
        let b = interp.make(Value::Datatype(TypeTag::Utype), right).unwrap();
        let b = pin(interp, b);

        let m = interp.make(a, b).unwrap();
        let m = pin(interp, m);
        assert_eq!(interp.member(m, "f").unwrap(), interp.member(b, "f").unwrap());
        assert!(!interp.compare(m, a, CompareMode::Same).unwrap());
        assert!(!interp.compare(m, b, CompareMode::Same).unwrap());
    });
}

#[test]
fn copy_shares_nested_members_unless_deep() {
    both_modes(|interp| {
        let x = fresh(interp);
        let items = interp.member(x, "items").unwrap();

        let shallow = interp.copy(x).unwrap();
        let shallow = pin(interp, shallow);
        assert_eq!(interp.member(shallow, "items").unwrap(), items);

        let deep = interp
            .dispatch(ActionRequest::new(Action::Copy, vec![x]).refine(Symbol::DEEP, None))
            .unwrap();
        let deep = pin(interp, deep);
        assert_ne!(interp.member(deep, "items").unwrap(), items);
    });
}

#[test]
fn copy_part_is_a_bad_refinement() {
    let mut interp = interpreter(false);
    let x = fresh(&mut interp);
    let request = ActionRequest::new(Action::Copy, vec![x]).refine(Symbol::PART, Some(Value::Integer(1)));
    assert_eq!(interp.dispatch(request), Err(RuntimeError::BadRefinement));
}

#[test]
fn spec_without_template_is_none() {
    both_modes(|interp| {
        let x = fresh(interp);
        assert_eq!(interp.reflect(x, "spec"), Ok(Value::None));
    });
}

#[test]
fn reflect_views_include_derived_members() {
    both_modes(|interp| {
        let x = fresh(interp);
        let extra = interp.intern("extra");
        let decls = block(interp, vec![Value::SetWord(extra), Value::None]);
        let z = interp.make(x, decls).unwrap();
        let z = pin(interp, z);
        let words = interp.reflect(z, "words").unwrap();
        assert_eq!(interp.form(words).unwrap(), "[a items b extra]");
    });
}

#[test]
fn unresolved_actions_fail_without_calling_any_hook() {
    let mut interp = interpreter(false);
    let calls = Rc::new(Cell::new(0));
    let counter = calls.clone();
    hook(&mut interp, "count-hook", 2, move |_, _| {
        counter.set(counter.get() + 1);
        Ok(Value::None)
    });
    let add_hook = interp.intern(".add");
    let count_hook = interp.intern("count-hook");
    let decls = block(&mut interp, vec![Value::SetWord(add_hook), Value::GetWord(count_hook)]);
    let hooked = interp.make(Value::Datatype(TypeTag::Utype), decls).unwrap();
    let hooked = pin(&mut interp, hooked);
    let plain = fresh(&mut interp);

    assert_eq!(
        interp.act(Action::Subtract, &[hooked, plain]),
        Err(RuntimeError::ActionNotSupported {
            tag: TypeTag::Utype,
            action: Action::Subtract
        })
    );
    assert_eq!(calls.get(), 0);
}

#[test]
fn second_operand_hook_handles_binary_actions() {
    both_modes(|interp| {
        hook(interp, "scaled", 2, |interp, args| {
            let Value::Integer(n) = args[0] else {
                return Ok(Value::Unset);
            };
            let factor = Interpreter::integer(interp.member(args[1], "factor")?)?;
            Ok(Value::Integer(n * factor))
        });
        let factor = interp.intern("factor");
        let multiply = interp.intern(".multiply");
        let scaled = interp.intern("scaled");
        let decls = block(
            interp,
            vec![
                Value::SetWord(factor),
                Value::Integer(3),
                Value::SetWord(multiply),
                Value::GetWord(scaled),
            ],
        );
        let scaler = interp.make(Value::Datatype(TypeTag::Utype), decls).unwrap();
        let scaler = pin(interp, scaler);
        let plain = fresh(interp);

        assert_eq!(interp.act(Action::Multiply, &[Value::Integer(5), scaler]), Ok(Value::Integer(15)));
        // the hook declines anything but an integer on the left
        assert_eq!(
            interp.act(Action::Multiply, &[plain, scaler]),
            Err(RuntimeError::ActionNotSupported {
                tag: TypeTag::Utype,
                action: Action::Multiply
            })
        );

        let multiply_native = interp.global("multiply").unwrap();
        assert_eq!(
            interp.apply_value(multiply_native, &[Value::Integer(2), scaler]),
            Ok(Value::Integer(6))
        );
    });
}

#[test]
fn compare_hook_answers_equality() {
    both_modes(|interp| {
        hook(interp, "same-a", 3, |interp, args| {
            if !(args[0].is_utype() && args[1].is_utype()) {
                return Ok(Value::Logic(false));
            }
            Ok(Value::Logic(interp.member(args[0], "a")? == interp.member(args[1], "a")?))
        });
        let compare = interp.intern(".compare");
        let same_a = interp.intern("same-a");
        let x = fresh(interp);
        let decls = block(interp, vec![Value::SetWord(compare), Value::GetWord(same_a)]);
        let y = interp.make(x, decls).unwrap();
        let y = pin(interp, y);

        assert!(interp.compare(x, y, CompareMode::Equal).unwrap());
        assert!(!interp.compare(x, y, CompareMode::Same).unwrap());
        let equal = interp.global("equal?").unwrap();
        assert_eq!(interp.apply_value(equal, &[y, x]), Ok(Value::Logic(true)));
    });
}

#[test]
fn make_rejects_unsupported_shapes() {
    let mut interp = interpreter(false);
    let x = fresh(&mut interp);
    assert_eq!(
        interp.make(Value::Datatype(TypeTag::Utype), Value::Integer(1)),
        Err(RuntimeError::MakeTypeMismatch {
            target: TypeTag::Utype,
            got: TypeTag::Integer
        })
    );
    assert_eq!(
        interp.make(x, Value::Logic(true)),
        Err(RuntimeError::MakeNotSupported {
            value: TypeTag::Utype,
            argument: TypeTag::Logic
        })
    );
}

#[test]
fn make_from_plain_object_records_the_spec() {
    both_modes(|interp| {
        let a = interp.intern("a");
        let decls = block(interp, vec![Value::SetWord(a), Value::Integer(7)]);
        let object = interp.make_object(decls.series().unwrap()).unwrap();
        let object = pin(interp, object);

        let x = interp.make(Value::Datatype(TypeTag::Utype), object).unwrap();
        let x = pin(interp, x);
        assert_eq!(interp.member(x, "a").unwrap(), Value::Integer(7));
        assert_eq!(interp.reflect(x, "spec"), Ok(object));
    });
}

#[test]
fn construction_survives_allocating_declarations() {
    both_modes(|interp| {
        let x = fresh(interp);
        let t = interp.intern("t");
        let s = interp.intern("s");
        let a = interp.intern("a");
        let form = interp.intern("form");
        let copy = interp.intern("copy");
        let items = interp.member(x, "items").unwrap();
        let allocating = vec![
            Value::SetWord(t),
            Value::Word(form),
            Value::Word(a),
            Value::SetWord(s),
            Value::Word(copy),
            items,
        ];
        let mut own = vec![Value::SetWord(a), Value::Integer(5)];
        own.extend(allocating.iter().copied());
        let own = block(interp, own);
        let derived = block(interp, allocating);

        let y = interp.make(Value::Datatype(TypeTag::Utype), own).unwrap();
        let y = pin(interp, y);
        let z = interp.make(x, derived).unwrap();
        let z = pin(interp, z);

        for (instance, text) in [(y, "5"), (z, "1")] {
            let formed = interp.member(instance, "t").unwrap();
            assert_eq!(interp.text(formed).unwrap(), text);
            assert!(matches!(interp.member(instance, "s").unwrap(), Value::Block(_)));
            assert_ne!(interp.member(instance, "s").unwrap(), items);
        }
        interp.heap.collect();
        assert_eq!(interp.member(z, "b").unwrap(), Value::Integer(2));
        assert!(interp.compare(y, y, CompareMode::Same).unwrap());
    });
}

#[test]
fn hooks_see_each_refinement_in_its_own_slot() {
    let mut interp = interpreter(false);
    let seen = Rc::new(RefCell::new(Vec::new()));
    let record = seen.clone();
    hook(&mut interp, "record", 1, move |_, args| {
        record.borrow_mut().push(args.to_vec());
        Ok(Value::None)
    });
    let append_hook = interp.intern(".append");
    let record_word = interp.intern("record");
    let decls = block(&mut interp, vec![Value::SetWord(append_hook), Value::GetWord(record_word)]);
    let x = interp.make(Value::Datatype(TypeTag::Utype), decls).unwrap();
    let x = pin(&mut interp, x);
    let dup = interp.intern("dup");
    let one = Value::Integer(1);
    let two = Value::Integer(2);

    let with_part = ActionRequest::new(Action::Append, vec![x, one]).refine(Symbol::PART, Some(two));
    let with_dup = ActionRequest::new(Action::Append, vec![x, one]).refine(dup, Some(two));
    let with_deep = ActionRequest::new(Action::Append, vec![x, one]).refine(Symbol::DEEP, None);
    interp.dispatch(with_part).unwrap();
    interp.dispatch(with_dup).unwrap();
    assert_eq!(interp.dispatch(with_deep), Err(RuntimeError::BadRefinement));

    let seen = seen.borrow();
    let off = Value::Logic(false);
    let on = Value::Logic(true);
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0], vec![x, one, on, two, off, off, Value::None]);
    assert_eq!(seen[1], vec![x, one, off, Value::None, off, on, two]);
}
