use std::{fmt, rc::Rc, sync::Arc};

use log::{debug, trace};

use crate::{Frame, Interpreter, RuntimeError, Value, Visitable, Visitor};

/// Generational arena index. A handle whose generation no longer matches
/// its slot refers to a collected object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectRef {
    index: u32,
    generation: u32,
}

macro_rules! heap_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(ObjectRef);

        impl $name {
            #[inline]
            pub fn object_ref(self) -> ObjectRef {
                self.0
            }
        }
    };
}

heap_id!(
    /// Handle to a [`Frame`].
    FrameId
);
heap_id!(
    /// Handle to a [`Series`].
    SeriesId
);
heap_id!(
    /// Handle to a [`Function`].
    FunctionId
);

pub type NativeFn = Rc<dyn Fn(&mut Interpreter, &[Value]) -> Result<Value, RuntimeError>>;

/// A host callable. Natives must not capture heap values: the collector
/// cannot see them.
#[derive(Clone)]
pub struct Function {
    pub name: Arc<str>,
    pub arity: usize,
    pub native: NativeFn,
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Series {
    Values(Vec<Value>),
    Text(String),
    Bytes(Vec<u8>),
}

impl Series {
    pub fn len(&self) -> usize {
        match self {
            Series::Values(values) => values.len(),
            Series::Text(text) => text.chars().count(),
            Series::Bytes(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn values(&self) -> Option<&[Value]> {
        match self {
            Series::Values(values) => Some(values),
            _ => None,
        }
    }
}

impl Visitable for Series {
    fn visit_edges(&self, visitor: &mut impl Visitor) {
        if let Series::Values(values) = self {
            values.as_slice().visit_edges(visitor);
        }
    }
}

#[derive(Debug)]
pub enum HeapObject {
    Frame(Frame),
    Series(Series),
    Function(Function),
}

impl Visitable for HeapObject {
    fn visit_edges(&self, visitor: &mut impl Visitor) {
        match self {
            HeapObject::Frame(frame) => frame.visit_edges(visitor),
            HeapObject::Series(series) => series.visit_edges(visitor),
            HeapObject::Function(_) => (),
        }
    }
}

// TODO: add growth limits once something other than tests drives the heap
#[derive(Debug, Default, Clone)]
pub struct HeapCreateInfo {
    /// Allocations between two collections.
    pub gc_threshold: Option<usize>,
    /// Collect before every allocation.
    pub stress: Option<bool>,
    pub initial_capacity: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct HeapSettings {
    pub gc_threshold: usize,
    pub stress: bool,
    pub initial_capacity: usize,
}

impl Default for HeapSettings {
    fn default() -> Self {
        Self {
            gc_threshold: 1024,
            stress: false,
            initial_capacity: 256,
        }
    }
}

impl HeapSettings {
    pub fn from_info(info: &HeapCreateInfo) -> Self {
        let mut settings = Self::default();
        info.gc_threshold
            .inspect(|&val| settings.gc_threshold = val.max(1));
        info.stress.inspect(|&val| settings.stress = val);
        info.initial_capacity
            .inspect(|&val| settings.initial_capacity = val);
        settings
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GarbageCollectionStats {
    pub collections: usize,
    pub freed: usize,
    pub live: usize,
}

/// Position on the protection stack, restored by [`Heap::release_to`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RootMark(usize);

#[derive(Debug, Default)]
struct RootSet {
    /// Lives as long as the heap.
    pinned: Vec<Value>,
    /// Temporary roots, released in LIFO order.
    protected: Vec<Value>,
}

#[derive(Debug)]
struct Entry {
    generation: u32,
    marked: bool,
    object: Option<HeapObject>,
}

#[derive(Debug)]
pub struct Heap {
    settings: HeapSettings,
    entries: Vec<Entry>,
    free: Vec<u32>,
    roots: RootSet,
    allocated_since_gc: usize,
    stats: GarbageCollectionStats,
}

struct Marker<'a> {
    entries: &'a [Entry],
    worklist: Vec<ObjectRef>,
}

impl Visitor for Marker<'_> {
    fn visit(&mut self, value: Value) {
        if let Some(object) = heap_ref(&value) {
            let live = self
                .entries
                .get(object.index as usize)
                .is_some_and(|entry| entry.generation == object.generation && !entry.marked);
            if live {
                self.worklist.push(object);
            }
        }
    }
}

fn heap_ref(value: &Value) -> Option<ObjectRef> {
    match *value {
        Value::Object(id) | Value::Utype(id) => Some(id.object_ref()),
        Value::String(id) | Value::Binary(id) | Value::Block(id) | Value::Paren(id) => {
            Some(id.object_ref())
        }
        Value::Function(id) => Some(id.object_ref()),
        _ => None,
    }
}

impl Heap {
    pub fn new(info: HeapCreateInfo) -> Self {
        let settings = HeapSettings::from_info(&info);
        debug!(
            "heap: threshold={} stress={}",
            settings.gc_threshold, settings.stress
        );
        Self {
            entries: Vec::with_capacity(settings.initial_capacity),
            free: Vec::new(),
            roots: RootSet::default(),
            allocated_since_gc: 0,
            stats: GarbageCollectionStats::default(),
            settings,
        }
    }

    pub fn settings(&self) -> &HeapSettings {
        &self.settings
    }

    pub fn stats(&self) -> GarbageCollectionStats {
        self.stats
    }

    // ── Allocation ─────────────────────────────────────────────────

    /// Allocate `object`. May collect first; the returned handle is not a
    /// root.
    fn allocate(&mut self, object: HeapObject) -> ObjectRef {
        if self.settings.stress || self.allocated_since_gc >= self.settings.gc_threshold {
            self.collect();
        }
        self.allocated_since_gc += 1;

        match self.free.pop() {
            Some(index) => {
                let entry = &mut self.entries[index as usize];
                entry.object = Some(object);
                entry.marked = false;
                ObjectRef {
                    index,
                    generation: entry.generation,
                }
            }
            None => {
                let index = self.entries.len() as u32;
                self.entries.push(Entry {
                    generation: 0,
                    marked: false,
                    object: Some(object),
                });
                ObjectRef {
                    index,
                    generation: 0,
                }
            }
        }
    }

    pub fn alloc_frame(&mut self, frame: Frame) -> FrameId {
        FrameId(self.allocate(HeapObject::Frame(frame)))
    }

    pub fn alloc_series(&mut self, series: Series) -> SeriesId {
        SeriesId(self.allocate(HeapObject::Series(series)))
    }

    pub fn alloc_block(&mut self, values: Vec<Value>) -> SeriesId {
        self.alloc_series(Series::Values(values))
    }

    pub fn alloc_function(&mut self, function: Function) -> FunctionId {
        FunctionId(self.allocate(HeapObject::Function(function)))
    }

    // ── Access ─────────────────────────────────────────────────────

    fn object(&self, object: ObjectRef) -> Option<&HeapObject> {
        self.entries
            .get(object.index as usize)
            .filter(|entry| entry.generation == object.generation)
            .and_then(|entry| entry.object.as_ref())
    }

    fn object_mut(&mut self, object: ObjectRef) -> Option<&mut HeapObject> {
        self.entries
            .get_mut(object.index as usize)
            .filter(|entry| entry.generation == object.generation)
            .and_then(|entry| entry.object.as_mut())
    }

    pub fn frame(&self, id: FrameId) -> Result<&Frame, RuntimeError> {
        match self.object(id.0) {
            Some(HeapObject::Frame(frame)) => Ok(frame),
            _ => Err(RuntimeError::StaleReference),
        }
    }

    pub fn frame_mut(&mut self, id: FrameId) -> Result<&mut Frame, RuntimeError> {
        match self.object_mut(id.0) {
            Some(HeapObject::Frame(frame)) => Ok(frame),
            _ => Err(RuntimeError::StaleReference),
        }
    }

    pub fn series(&self, id: SeriesId) -> Result<&Series, RuntimeError> {
        match self.object(id.0) {
            Some(HeapObject::Series(series)) => Ok(series),
            _ => Err(RuntimeError::StaleReference),
        }
    }

    pub fn series_mut(&mut self, id: SeriesId) -> Result<&mut Series, RuntimeError> {
        match self.object_mut(id.0) {
            Some(HeapObject::Series(series)) => Ok(series),
            _ => Err(RuntimeError::StaleReference),
        }
    }

    pub fn function(&self, id: FunctionId) -> Result<&Function, RuntimeError> {
        match self.object(id.0) {
            Some(HeapObject::Function(function)) => Ok(function),
            _ => Err(RuntimeError::StaleReference),
        }
    }

    /// `true` for immediates and for handles whose object is still alive.
    pub fn is_live(&self, value: &Value) -> bool {
        match heap_ref(value) {
            Some(object) => self.object(object).is_some(),
            None => true,
        }
    }

    pub fn live_objects(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.object.is_some())
            .count()
    }

    // ── Roots ──────────────────────────────────────────────────────

    /// Root `value` for the lifetime of the heap.
    pub fn pin(&mut self, value: Value) {
        self.roots.pinned.push(value);
    }

    pub fn root_mark(&self) -> RootMark {
        RootMark(self.roots.protected.len())
    }

    /// Root `value` until the protection stack is released below it.
    pub fn protect(&mut self, value: Value) {
        trace!("protect {:?} depth={}", value, self.roots.protected.len());
        self.roots.protected.push(value);
    }

    pub fn release_to(&mut self, mark: RootMark) {
        debug_assert!(mark.0 <= self.roots.protected.len());
        trace!(
            "release roots {} -> {}",
            self.roots.protected.len(),
            mark.0
        );
        self.roots.protected.truncate(mark.0);
    }

    // ── Collection ─────────────────────────────────────────────────

    /// Mark from the pinned and protected roots, sweep the rest.
    pub fn collect(&mut self) -> usize {
        self.allocated_since_gc = 0;

        let mut marker = Marker {
            entries: &self.entries,
            worklist: Vec::new(),
        };
        self.roots.pinned.as_slice().visit_edges(&mut marker);
        self.roots.protected.as_slice().visit_edges(&mut marker);
        let mut worklist = marker.worklist;

        while let Some(object) = worklist.pop() {
            let entry = &mut self.entries[object.index as usize];
            if entry.marked {
                continue;
            }
            entry.marked = true;
            if let Some(heap_object) = &self.entries[object.index as usize].object {
                let mut marker = Marker {
                    entries: &self.entries,
                    worklist,
                };
                heap_object.visit_edges(&mut marker);
                worklist = marker.worklist;
            }
        }

        let mut freed = 0;
        for (index, entry) in self.entries.iter_mut().enumerate() {
            if entry.object.is_none() {
                continue;
            }
            if entry.marked {
                entry.marked = false;
                continue;
            }
            entry.object = None;
            entry.generation = entry.generation.wrapping_add(1);
            self.free.push(index as u32);
            freed += 1;
        }

        self.stats.collections += 1;
        self.stats.freed += freed;
        self.stats.live = self.live_objects();
        trace!(
            "gc #{}: freed={} live={}",
            self.stats.collections, freed, self.stats.live
        );
        freed
    }
}
