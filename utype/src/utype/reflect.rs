use log::debug;

use crate::{
    frame::{self, ObjectBlockMode},
    ActionRequest, Interpreter, Reflector, RuntimeError, RuntimeResult, TypeTag, Value,
};

fn selector_name(interp: &Interpreter, selector: Value) -> String {
    match selector {
        Value::Word(sym) | Value::LitWord(sym) => interp.symbols.name(sym).to_string(),
        other => other.type_tag().name().to_string(),
    }
}

pub(super) fn reflect(interp: &mut Interpreter, request: &ActionRequest) -> RuntimeResult<Value> {
    let value = request.value();
    let Value::Utype(id) = value else {
        return Err(RuntimeError::ExpectedType {
            expected: "utype!",
            got: value.type_tag(),
        });
    };
    let selector = request.argument();
    let reflector = Reflector::from_value(&selector);
    debug!("reflect {:?}: {:?}", id, reflector);

    if reflector == Some(Reflector::Spec) {
        return Ok(match interp.heap.frame(id)?.spec() {
            Some(spec) => Value::Object(spec),
            None => Value::None,
        });
    }

    let mode = match reflector {
        Some(Reflector::Words) => ObjectBlockMode::Words,
        Some(Reflector::Values) => ObjectBlockMode::Values,
        Some(Reflector::Body) => ObjectBlockMode::Body,
        _ => {
            return Err(RuntimeError::ReflectNotSupported {
                tag: TypeTag::Utype,
                selector: selector_name(interp, selector),
            });
        }
    };
    if request.thrown {
        return Err(RuntimeError::ThrowMisuse);
    }
    let block = frame::object_block(&mut interp.heap, id, mode)?;
    Ok(Value::Block(block))
}
