mod action;
mod dispatch;
mod error;
pub mod frame;
mod heap;
mod interning;
mod interpreter;
pub mod lookup;
pub mod natives;
pub mod utype;
mod value;
mod visitor;

pub use action::{Action, ActionRequest, CompareMode, Refinement, Reflector, COMPARE_HOOK};
pub use dispatch::{DispatchTable, TypeHandler};
pub use error::{RuntimeError, RuntimeResult};
pub use frame::{Duplicator, Frame, ObjectBlockMode};
pub use heap::{
    FrameId, Function, FunctionId, GarbageCollectionStats, Heap, HeapCreateInfo, HeapObject,
    HeapSettings, NativeFn, ObjectRef, RootMark, Series, SeriesId,
};
pub use interning::{Symbol, SymbolTable};
pub use interpreter::{Interpreter, InterpreterCreateInfo};
pub use lookup::LookupResult;
pub use utype::UtypeHandler;
pub use value::{TypeSet, TypeTag, Value};
pub use visitor::{CollectVisitor, Visitable, Visitor};
