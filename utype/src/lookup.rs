use crate::{FrameId, Heap, RuntimeError, Symbol, Value};

/// The result of a slot lookup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LookupResult {
    /// Name is not bound in the frame.
    None,
    Found {
        value: Value,
        /// Index of the slot within its frame.
        slot_index: usize,
    },
}

impl LookupResult {
    pub fn value(self) -> Option<Value> {
        match self {
            LookupResult::None => None,
            LookupResult::Found { value, .. } => Some(value),
        }
    }
}

/// Look up `name` in `frame` only.
///
/// Frames are flattened at construction, so inherited members are already
/// local and no parent walk happens here. `self` is visible as slot 0.
pub fn lookup(heap: &Heap, frame: FrameId, name: Symbol) -> Result<LookupResult, RuntimeError> {
    let frame = heap.frame(frame)?;
    Ok(match frame.index_of(name) {
        Some(slot_index) => LookupResult::Found {
            value: frame.values()[slot_index],
            slot_index,
        },
        None => LookupResult::None,
    })
}
