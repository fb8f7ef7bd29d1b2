//! Frames and the frame store primitives the handler builds on.
//!
//! A frame is an ordered symbol → value mapping. Slot 0 is always the
//! synthetic `self` binding; members start at index 1.
//!
//! Every primitive here that allocates more than once protects the frame
//! it is building for its own duration. Callers still have to root their
//! inputs: the heap may collect on any allocation.

use std::collections::HashMap;

use log::trace;

use crate::{
    FrameId, Heap, ObjectRef, RuntimeError, Series, SeriesId, Symbol, TypeSet, Value, Visitable,
    Visitor,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    keys: Vec<Symbol>,
    values: Vec<Value>,
    /// Template the frame was built from.
    spec: Option<FrameId>,
    /// Set only while a derived frame is being constructed.
    parent: Option<FrameId>,
}

impl Default for Frame {
    fn default() -> Self {
        Self::new()
    }
}

impl Frame {
    pub const SELF_INDEX: usize = 0;

    pub fn new() -> Self {
        Self {
            keys: vec![Symbol::SELF],
            values: vec![Value::None],
            spec: None,
            parent: None,
        }
    }

    /// Number of members, `self` excluded.
    #[inline]
    pub fn len(&self) -> usize {
        self.keys.len() - 1
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All slot names including `self`.
    pub fn keys(&self) -> &[Symbol] {
        &self.keys
    }

    /// All slot values including `self`.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Members in declaration order, `self` excluded.
    pub fn members(&self) -> impl Iterator<Item = (Symbol, Value)> + '_ {
        self.keys
            .iter()
            .copied()
            .zip(self.values.iter().copied())
            .skip(1)
    }

    pub fn index_of(&self, name: Symbol) -> Option<usize> {
        self.keys.iter().position(|&key| key == name)
    }

    pub fn get(&self, name: Symbol) -> Option<Value> {
        self.index_of(name).map(|idx| self.values[idx])
    }

    pub fn value_at(&self, index: usize) -> Option<Value> {
        self.values.get(index).copied()
    }

    pub fn set_at(&mut self, index: usize, value: Value) {
        self.values[index] = value;
    }

    /// Overwrite an existing slot. Returns `false` if `name` is unbound.
    pub fn set(&mut self, name: Symbol, value: Value) -> bool {
        match self.index_of(name) {
            Some(idx) => {
                self.values[idx] = value;
                true
            }
            None => false,
        }
    }

    /// Overwrite `name` or append it as a new member.
    pub fn push(&mut self, name: Symbol, value: Value) {
        if !self.set(name, value) {
            self.keys.push(name);
            self.values.push(value);
        }
    }

    pub fn self_value(&self) -> Value {
        self.values[Self::SELF_INDEX]
    }

    pub fn set_self(&mut self, value: Value) {
        self.values[Self::SELF_INDEX] = value;
    }

    pub fn spec(&self) -> Option<FrameId> {
        self.spec
    }

    pub fn set_spec(&mut self, spec: Option<FrameId>) {
        self.spec = spec;
    }

    pub fn parent(&self) -> Option<FrameId> {
        self.parent
    }

    pub fn set_parent(&mut self, parent: Option<FrameId>) {
        self.parent = parent;
    }
}

impl Visitable for Frame {
    fn visit_edges(&self, visitor: &mut impl Visitor) {
        self.values.as_slice().visit_edges(visitor);
        if let Some(spec) = self.spec {
            visitor.visit(Value::Object(spec));
        }
        if let Some(parent) = self.parent {
            visitor.visit(Value::Object(parent));
        }
    }
}

/// Shape of the block produced by [`object_block`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectBlockMode {
    Words,
    Values,
    Body,
}

/// Duplicates values matching a type filter, remembering every copy it
/// made so shared or cyclic structure is copied once.
#[derive(Debug)]
pub struct Duplicator {
    types: TypeSet,
    deep: bool,
    copies: HashMap<ObjectRef, Value, ahash::RandomState>,
}

#[derive(Clone, Copy)]
enum Container {
    Frame(FrameId),
    Series(SeriesId),
}

impl Duplicator {
    pub fn new(types: TypeSet, deep: bool) -> Self {
        Self {
            types,
            deep,
            copies: HashMap::default(),
        }
    }

    /// Series created by this duplicator.
    pub fn fresh_series(&self) -> impl Iterator<Item = SeriesId> + '_ {
        self.copies.values().filter_map(Value::series)
    }

    /// Frames created by this duplicator.
    pub fn fresh_frames(&self) -> impl Iterator<Item = FrameId> + '_ {
        self.copies.values().filter_map(Value::frame)
    }

    /// Replace the matching members of `frame` (self excluded) with copies.
    /// `frame` must be rooted.
    pub fn copy_frame_values(&mut self, heap: &mut Heap, frame: FrameId) -> Result<(), RuntimeError> {
        self.copy_container(heap, Container::Frame(frame))
    }

    fn copy_container(&mut self, heap: &mut Heap, container: Container) -> Result<(), RuntimeError> {
        let (start, len) = match container {
            Container::Frame(id) => (1, heap.frame(id)?.values().len()),
            Container::Series(id) => (0, heap.series(id)?.values().map_or(0, <[Value]>::len)),
        };

        for index in start..len {
            let value = match container {
                Container::Frame(id) => heap.frame(id)?.values()[index],
                Container::Series(id) => match heap.series(id)?.values() {
                    Some(values) => values[index],
                    None => return Ok(()),
                },
            };
            if !self.types.has(value.type_tag()) {
                continue;
            }

            let (copy, is_new) = self.duplicate(heap, value)?;
            // store before recursing so the copy is reachable from a root
            match container {
                Container::Frame(id) => heap.frame_mut(id)?.set_at(index, copy),
                Container::Series(id) => {
                    if let Series::Values(values) = heap.series_mut(id)? {
                        values[index] = copy;
                    }
                }
            }

            if self.deep && is_new {
                if let Some(series) = copy.series() {
                    self.copy_container(heap, Container::Series(series))?;
                } else if let Some(frame) = copy.frame() {
                    self.copy_container(heap, Container::Frame(frame))?;
                }
            }
        }
        Ok(())
    }

    /// One-level duplicate of a series or frame value. Returns the copy and
    /// whether it was created by this call.
    fn duplicate(&mut self, heap: &mut Heap, value: Value) -> Result<(Value, bool), RuntimeError> {
        let key = if let Some(series) = value.series() {
            series.object_ref()
        } else if let Some(frame) = value.frame() {
            frame.object_ref()
        } else {
            return Ok((value, false));
        };
        if let Some(copy) = self.copies.get(&key) {
            return Ok((*copy, false));
        }

        let copy = if let Some(series) = value.series() {
            let data = heap.series(series)?.clone();
            value.with_series(heap.alloc_series(data))
        } else if let Some(frame) = value.frame() {
            let new = copy_frame(heap, frame)?;
            value.with_frame(new)
        } else {
            value
        };
        self.copies.insert(key, copy);
        Ok((copy, true))
    }
}

/// Top-level set-words of a declaration block, in order, without
/// duplicates.
pub fn collect_set_words(heap: &Heap, block: SeriesId) -> Result<Vec<Symbol>, RuntimeError> {
    let values = heap.series(block)?.values().unwrap_or(&[]);
    let mut words = Vec::new();
    for value in values {
        if let Value::SetWord(sym) = value {
            if *sym != Symbol::SELF && !words.contains(sym) {
                words.push(*sym);
            }
        }
    }
    Ok(words)
}

/// Build a frame for `decls`: the parent's members (cloneable values
/// duplicated) followed by the block's new set-words bound to `none`.
///
/// The parent link is left set; the caller clears it once construction is
/// finished. `parent` and `decls` must be rooted.
pub fn make_object(
    heap: &mut Heap,
    parent: Option<FrameId>,
    decls: Option<SeriesId>,
) -> Result<FrameId, RuntimeError> {
    let mut frame = match parent {
        Some(parent) => heap.frame(parent)?.clone(),
        None => Frame::new(),
    };
    if let Some(decls) = decls {
        for word in collect_set_words(heap, decls)? {
            if frame.index_of(word).is_none() {
                frame.push(word, Value::None);
            }
        }
    }
    frame.set_parent(parent);

    let id = heap.alloc_frame(frame);
    let self_value = match parent {
        Some(_) => heap.frame(id)?.self_value().with_frame(id),
        None => Value::Object(id),
    };
    heap.frame_mut(id)?.set_self(self_value);

    if let Some(parent) = parent {
        let mark = heap.root_mark();
        heap.protect(Value::Object(id));
        let result = clone_members(heap, &[parent], id);
        heap.release_to(mark);
        result?;
    }
    trace!("make_object {:?} parent={:?}", id, parent);
    Ok(id)
}

/// New frame sharing every slot with `src`; `self` points at the copy.
/// `src` must be rooted.
pub fn copy_frame(heap: &mut Heap, src: FrameId) -> Result<FrameId, RuntimeError> {
    let mut frame = heap.frame(src)?.clone();
    frame.set_parent(None);
    let self_value = frame.self_value();
    let id = heap.alloc_frame(frame);
    let self_value = match self_value.frame() {
        Some(_) => self_value.with_frame(id),
        None => Value::Object(id),
    };
    heap.frame_mut(id)?.set_self(self_value);
    Ok(id)
}

/// Frame holding `a`'s members overridden and extended by `b`'s.
/// Cloneable values are duplicated and references to either parent are
/// redirected to the result. `a` and `b` must be rooted.
pub fn merge_frames(heap: &mut Heap, a: FrameId, b: FrameId) -> Result<FrameId, RuntimeError> {
    let mut frame = heap.frame(a)?.clone();
    frame.set_parent(None);
    for (name, value) in heap.frame(b)?.members() {
        frame.push(name, value);
    }

    let self_value = frame.self_value();
    let id = heap.alloc_frame(frame);
    let self_value = match self_value.frame() {
        Some(_) => self_value.with_frame(id),
        None => Value::Object(id),
    };
    heap.frame_mut(id)?.set_self(self_value);

    let mark = heap.root_mark();
    heap.protect(Value::Object(id));
    let result = clone_members(heap, &[a, b], id);
    heap.release_to(mark);
    result?;
    Ok(id)
}

fn clone_members(heap: &mut Heap, sources: &[FrameId], dst: FrameId) -> Result<(), RuntimeError> {
    let mut duplicator = Duplicator::new(TypeSet::CLONE, false);
    duplicator.copy_frame_values(heap, dst)?;
    rebind_frame(heap, sources, dst, &duplicator)
}

/// Redirect references to any of `sources` inside `dst`, and inside the
/// series and frames `duplicator` created for it, to `dst`.
pub fn rebind_frame(
    heap: &mut Heap,
    sources: &[FrameId],
    dst: FrameId,
    duplicator: &Duplicator,
) -> Result<(), RuntimeError> {
    let redirect = |value: &mut Value| {
        if let Some(frame) = value.frame() {
            if sources.contains(&frame) {
                *value = value.with_frame(dst);
            }
        }
    };

    {
        let frame = heap.frame_mut(dst)?;
        for index in 0..frame.values().len() {
            let mut value = frame.values()[index];
            redirect(&mut value);
            frame.set_at(index, value);
        }
    }

    let fresh: Vec<SeriesId> = duplicator.fresh_series().collect();
    for series in fresh {
        if let Series::Values(values) = heap.series_mut(series)? {
            values.iter_mut().for_each(redirect);
        }
    }

    let nested: Vec<FrameId> = duplicator.fresh_frames().collect();
    for id in nested {
        let frame = heap.frame_mut(id)?;
        // slot 0 is the nested frame's own self
        for index in 1..frame.values().len() {
            let mut value = frame.values()[index];
            redirect(&mut value);
            frame.set_at(index, value);
        }
    }
    Ok(())
}

/// Block view of a frame's members. `frame` must be rooted.
pub fn object_block(heap: &mut Heap, frame: FrameId, mode: ObjectBlockMode) -> Result<SeriesId, RuntimeError> {
    let source = heap.frame(frame)?;
    let mut values = Vec::with_capacity(match mode {
        ObjectBlockMode::Body => source.len() * 2,
        _ => source.len(),
    });
    for (name, value) in source.members() {
        match mode {
            ObjectBlockMode::Words => values.push(Value::Word(name)),
            ObjectBlockMode::Values => values.push(value),
            ObjectBlockMode::Body => {
                values.push(Value::SetWord(name));
                values.push(value);
            }
        }
    }
    Ok(heap.alloc_block(values))
}
