//! The `utype!` datatype: instances are frames whose `.`-prefixed members
//! implement the generic actions for them.

mod compare;
mod copy;
mod make;
mod reflect;
mod resolve;

use log::debug;

use crate::{
    Action, ActionRequest, CompareMode, Interpreter, RuntimeError, RuntimeResult, TypeHandler,
    TypeTag, Value,
};

pub use compare::same;
pub use resolve::{find_hook, try_method};

/// Type handler for `utype!`.
#[derive(Debug, Default, Clone, Copy)]
pub struct UtypeHandler {
    /// Minimal variant: no hook dispatch, non-identity comparisons are false.
    legacy: bool,
}

impl UtypeHandler {
    pub fn new() -> Self {
        Self { legacy: false }
    }

    pub fn legacy() -> Self {
        Self { legacy: true }
    }
}

impl TypeHandler for UtypeHandler {
    fn type_tag(&self) -> TypeTag {
        TypeTag::Utype
    }

    fn make(&self, interp: &mut Interpreter, request: &ActionRequest) -> RuntimeResult<Value> {
        make::make(interp, request.value(), request.argument())
    }

    fn copy(&self, interp: &mut Interpreter, request: &ActionRequest) -> RuntimeResult<Value> {
        copy::copy(interp, request)
    }

    fn compare(
        &self,
        interp: &mut Interpreter,
        a: Value,
        b: Value,
        mode: CompareMode,
    ) -> RuntimeResult<bool> {
        if self.legacy {
            return Ok(mode == CompareMode::Same && same(&a, &b));
        }
        compare::compare(interp, a, b, mode)
    }

    fn act(&self, interp: &mut Interpreter, request: &ActionRequest) -> RuntimeResult<Value> {
        match request.action {
            Action::Make => self.make(interp, request),
            Action::Copy => self.copy(interp, request),
            Action::Reflect => reflect::reflect(interp, request),
            action if self.legacy => {
                debug!("legacy handler rejects {}", action);
                Err(RuntimeError::ActionNotSupported {
                    tag: TypeTag::Utype,
                    action,
                })
            }
            _ => resolve::dispatch_hooks(interp, request),
        }
    }
}


#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::{test_support::*, *};

    #[test]
    fn legacy_handler_keeps_the_protocols_but_not_hooks() {
        let mut interp = interp();
        interp.register_handler(Rc::new(UtypeHandler::legacy()));
        let hook = native(&mut interp, 1, |_, _| Ok(Value::Integer(1)));
        let x = instance(&mut interp, &[(".negate", hook)]);

        assert_eq!(
            interp.act(Action::Negate, &[x]),
            Err(RuntimeError::ActionNotSupported {
                tag: TypeTag::Utype,
                action: Action::Negate
            })
        );
        let y = interp.copy(x).unwrap();
        assert_ne!(y, x);
        assert!(interp.reflect(y, "words").is_ok());
    }

    #[test]
    fn unhookable_actions_are_not_supported() {
        let mut interp = interp();
        let x = instance(&mut interp, &[]);
        for action in [Action::Pick, Action::Trim] {
            assert_eq!(
                interp.act(action, &[x, Value::Integer(1)]),
                Err(RuntimeError::ActionNotSupported {
                    tag: TypeTag::Utype,
                    action
                })
            );
        }
    }
}
