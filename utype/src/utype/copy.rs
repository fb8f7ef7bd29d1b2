use log::debug;

use crate::{
    frame::{self, Duplicator},
    ActionRequest, Interpreter, RuntimeError, RuntimeResult, Symbol, TypeSet, Value,
};

/// Type filter named by a `/types` argument: a datatype or a typeset.
fn types_filter(argument: Value) -> RuntimeResult<TypeSet> {
    match argument {
        Value::Datatype(tag) => Ok(TypeSet::of(tag)),
        Value::Typeset(set) => Ok(set),
        other => Err(RuntimeError::ExpectedType {
            expected: "typeset!",
            got: other.type_tag(),
        }),
    }
}

/// `copy` of an instance: always a new frame; `/deep` and `/types` select
/// which members are duplicated. `/part` is rejected.
pub(super) fn copy(interp: &mut Interpreter, request: &ActionRequest) -> RuntimeResult<Value> {
    if request.has_refinement(Symbol::PART) {
        return Err(RuntimeError::BadRefinement);
    }
    let value = request.value();
    let Value::Utype(src) = value else {
        return Err(RuntimeError::ExpectedType {
            expected: "utype!",
            got: value.type_tag(),
        });
    };

    let deep = request.has_refinement(Symbol::DEEP);
    let explicit = if request.has_refinement(Symbol::TYPES) {
        let argument = request
            .refinement_arg(Symbol::TYPES)
            .ok_or(RuntimeError::BadRefinement)?;
        Some(types_filter(argument)?)
    } else {
        None
    };
    let types = match explicit {
        Some(types) => types,
        None if deep => TypeSet::STD_SERIES,
        None => TypeSet::empty(),
    };
    debug!("copy {:?}: deep={} types={:?}", src, deep, types);

    let id = frame::copy_frame(&mut interp.heap, src)?;
    let instance = Value::Utype(id);
    interp.heap.frame_mut(id)?.set_self(instance);
    if !types.is_empty() {
        interp.with_roots(&[instance], |interp| {
            Duplicator::new(types, deep).copy_frame_values(&mut interp.heap, id)
        })?;
    }
    Ok(instance)
}
