use std::{collections::HashMap, fmt, sync::Arc};

use parking_lot::RwLock;

/// Interned, case-insensitive name.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(u32);

impl Symbol {
    pub const SELF: Symbol = Symbol(0);
    pub const PART: Symbol = Symbol(1);
    pub const DEEP: Symbol = Symbol(2);
    pub const TYPES: Symbol = Symbol(3);
    pub const SPEC: Symbol = Symbol(4);
    pub const WORDS: Symbol = Symbol(5);
    pub const VALUES: Symbol = Symbol(6);
    pub const BODY: Symbol = Symbol(7);
    pub const TITLE: Symbol = Symbol(8);

    #[inline]
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self.0)
    }
}

// order must match the `Symbol` constants above
const WELL_KNOWN: &[&str] = &[
    "self", "part", "deep", "types", "spec", "words", "values", "body", "title",
];

struct SymbolTableImpl {
    names: Vec<Arc<str>>,
    mappings: HashMap<Arc<str>, Symbol, ahash::RandomState>,
}

impl SymbolTableImpl {
    fn new() -> Self {
        let mut new = Self {
            names: Vec::with_capacity(64),
            mappings: HashMap::default(),
        };
        for name in WELL_KNOWN {
            new.get_or_add(name);
        }
        new
    }

    fn get_or_add(&mut self, value: &str) -> Symbol {
        let canonical = value.to_lowercase();
        if let Some(&sym) = self.mappings.get(canonical.as_str()) {
            return sym;
        }
        let sym = Symbol(self.names.len() as u32);
        let interned = Arc::<str>::from(canonical);
        self.names.push(interned.clone());
        self.mappings.insert(interned, sym);
        sym
    }

    fn find(&self, value: &str) -> Option<Symbol> {
        self.mappings.get(value.to_lowercase().as_str()).copied()
    }

    fn name(&self, sym: Symbol) -> Option<Arc<str>> {
        self.names.get(sym.0 as usize).cloned()
    }
}

/// Shared symbol table. Clones refer to the same table.
#[derive(Clone)]
pub struct SymbolTable(Arc<RwLock<SymbolTableImpl>>);

impl SymbolTable {
    pub fn new() -> Self {
        Self(Arc::new(RwLock::new(SymbolTableImpl::new())))
    }

    pub fn intern(&self, value: &str) -> Symbol {
        if let Some(sym) = self.0.read().find(value) {
            return sym;
        }
        self.0.write().get_or_add(value)
    }

    /// Lookup without interning.
    pub fn find(&self, value: &str) -> Option<Symbol> {
        self.0.read().find(value)
    }

    pub fn name(&self, sym: Symbol) -> Arc<str> {
        self.0
            .read()
            .name(sym)
            .unwrap_or_else(|| Arc::from(format!("#{}", sym.0)))
    }

    pub fn len(&self) -> usize {
        self.0.read().names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SymbolTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymbolTable")
            .field("len", &self.len())
            .finish()
    }
}
