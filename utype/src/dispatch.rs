use std::{collections::HashMap, fmt, rc::Rc};

use crate::{Action, ActionRequest, CompareMode, Interpreter, RuntimeResult, TypeTag, Value};

/// Per-type behaviour plugged into the host's dispatch table.
///
/// `act` is the generic entry point; implementations route `make`, `copy`
/// and any other action they special-case from there.
pub trait TypeHandler {
    fn type_tag(&self) -> TypeTag;

    fn make(&self, interp: &mut Interpreter, request: &ActionRequest) -> RuntimeResult<Value>;

    fn copy(&self, interp: &mut Interpreter, request: &ActionRequest) -> RuntimeResult<Value>;

    fn compare(
        &self,
        interp: &mut Interpreter,
        a: Value,
        b: Value,
        mode: CompareMode,
    ) -> RuntimeResult<bool>;

    fn act(&self, interp: &mut Interpreter, request: &ActionRequest) -> RuntimeResult<Value>;
}

#[derive(Default)]
pub struct DispatchTable {
    handlers: HashMap<TypeTag, Rc<dyn TypeHandler>, ahash::RandomState>,
}

impl DispatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for its type, replacing any previous one.
    pub fn register(&mut self, handler: Rc<dyn TypeHandler>) -> Option<Rc<dyn TypeHandler>> {
        self.handlers.insert(handler.type_tag(), handler)
    }

    pub fn get(&self, tag: TypeTag) -> Option<Rc<dyn TypeHandler>> {
        self.handlers.get(&tag).cloned()
    }

    /// Type whose handler an operand selects. A datatype operand of `make`
    /// selects the type it names.
    fn routing_tag(action: Action, operand: &Value) -> TypeTag {
        match (action, operand) {
            (Action::Make, Value::Datatype(tag)) => *tag,
            _ => operand.type_tag(),
        }
    }

    /// Handler for `request`: operand 1's type, or operand 2's for an
    /// action that consults it.
    pub fn route(&self, request: &ActionRequest) -> Option<Rc<dyn TypeHandler>> {
        let first = Self::routing_tag(request.action, &request.arg(1));
        self.get(first).or_else(|| {
            if request.action.consults_second_operand() && request.args.len() > 1 {
                self.get(Self::routing_tag(request.action, &request.arg(2)))
            } else {
                None
            }
        })
    }

    /// Handler for a comparison of `a` and `b`.
    pub fn route_compare(&self, a: &Value, b: &Value) -> Option<Rc<dyn TypeHandler>> {
        self.get(a.type_tag()).or_else(|| self.get(b.type_tag()))
    }
}

impl fmt::Debug for DispatchTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.handlers.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Stub(TypeTag);

    impl TypeHandler for Stub {
        fn type_tag(&self) -> TypeTag {
            self.0
        }
        fn make(&self, _: &mut Interpreter, _: &ActionRequest) -> RuntimeResult<Value> {
            Ok(Value::None)
        }
        fn copy(&self, _: &mut Interpreter, _: &ActionRequest) -> RuntimeResult<Value> {
            Ok(Value::None)
        }
        fn compare(&self, _: &mut Interpreter, _: Value, _: Value, _: CompareMode) -> RuntimeResult<bool> {
            Ok(false)
        }
        fn act(&self, _: &mut Interpreter, _: &ActionRequest) -> RuntimeResult<Value> {
            Ok(Value::Datatype(self.0))
        }
    }

    fn table() -> DispatchTable {
        let mut table = DispatchTable::new();
        table.register(Rc::new(Stub(TypeTag::Utype)));
        table
    }

    #[test]
    fn make_routes_by_named_datatype() {
        let request = ActionRequest::new(Action::Make, vec![Value::Datatype(TypeTag::Utype), Value::None]);
        assert_eq!(table().route(&request).map(|h| h.type_tag()), Some(TypeTag::Utype));
    }

    #[test]
    fn binary_actions_fall_back_to_second_operand() {
        let table = table();
        let frame = {
            let mut heap = crate::Heap::new(Default::default());
            heap.alloc_frame(crate::Frame::new())
        };
        let add = ActionRequest::new(Action::Add, vec![Value::Integer(1), Value::Utype(frame)]);
        assert!(table.route(&add).is_some());

        let append = ActionRequest::new(Action::Append, vec![Value::Integer(1), Value::Utype(frame)]);
        assert!(table.route(&append).is_none());
    }
}
