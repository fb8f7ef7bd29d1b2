use thiserror::Error;

use crate::{Action, TypeTag};

pub type RuntimeResult<T, E = RuntimeError> = Result<T, E>;

/// Failures raised while dispatching an action. None of them are recovered
/// inside the handler; they abort the current dispatch.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("cannot make {target} from {got} argument")]
    MakeTypeMismatch { target: TypeTag, got: TypeTag },

    #[error("cannot make {value} from {argument}")]
    MakeNotSupported { value: TypeTag, argument: TypeTag },

    #[error("incompatible or invalid refinements")]
    BadRefinement,

    #[error("{tag} does not allow {action} action")]
    ActionNotSupported { tag: TypeTag, action: Action },

    #[error("cannot use {selector} on {tag} value")]
    ReflectNotSupported { tag: TypeTag, selector: String },

    #[error("throw used on a value already being thrown")]
    ThrowMisuse,

    #[error("invalid argument: {tag} has no callable {hook}")]
    ArgumentInvalid { tag: TypeTag, hook: String },

    #[error("reference to a collected heap object")]
    StaleReference,

    #[error("cannot set {word}: word is protected")]
    ProtectedWord { word: String },

    #[error("{word} has no value")]
    NoValue { word: String },

    #[error("expected {expected}, got {got}")]
    ExpectedType { expected: &'static str, got: TypeTag },

    #[error("{function} expects {expected} arguments, got {got}")]
    ArityMismatch {
        function: String,
        expected: usize,
        got: usize,
    },

    /// Raised by host code or a user hook.
    #[error("{0}")]
    User(String),
}
