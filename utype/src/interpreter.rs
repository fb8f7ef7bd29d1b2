use std::rc::Rc;

use log::{debug, trace};

use crate::{
    frame, lookup::lookup, natives, utype::UtypeHandler, Action, ActionRequest, CompareMode,
    DispatchTable, Frame, FrameId, Function, FunctionId, Heap, HeapCreateInfo, LookupResult,
    RuntimeError, RuntimeResult, Series, SeriesId, Symbol, SymbolTable, TypeHandler, TypeTag,
    Value,
};

const MAX_FORM_DEPTH: usize = 64;

#[derive(Debug, Default, Clone)]
pub struct InterpreterCreateInfo {
    pub heap: HeapCreateInfo,
}

/// The host side of the handler: heap, symbols, a globals frame and the
/// per-type dispatch table.
pub struct Interpreter {
    pub heap: Heap,
    pub symbols: SymbolTable,
    globals: FrameId,
    handlers: DispatchTable,
}

impl Interpreter {
    pub fn new(info: InterpreterCreateInfo) -> Self {
        let mut heap = Heap::new(info.heap);
        let globals = heap.alloc_frame(Frame::new());
        heap.pin(Value::Object(globals));
        if let Ok(frame) = heap.frame_mut(globals) {
            frame.set_self(Value::Object(globals));
        }

        let mut handlers = DispatchTable::new();
        handlers.register(Rc::new(UtypeHandler::new()));

        let mut interp = Self {
            heap,
            symbols: SymbolTable::new(),
            globals,
            handlers,
        };
        for desc in natives::default_natives() {
            interp.define_native(desc.name, desc.arity, Rc::new(desc.func));
        }
        interp
    }

    pub fn globals(&self) -> FrameId {
        self.globals
    }

    #[inline]
    pub fn intern(&self, name: &str) -> Symbol {
        self.symbols.intern(name)
    }

    /// Replace the handler registered for `handler`'s type.
    pub fn register_handler(&mut self, handler: Rc<dyn TypeHandler>) {
        debug!("register handler for {}", handler.type_tag());
        self.handlers.register(handler);
    }

    // ── Globals ────────────────────────────────────────────────────

    pub fn global(&self, name: &str) -> RuntimeResult<Value> {
        let sym = self.intern(name);
        lookup(&self.heap, self.globals, sym)?
            .value()
            .ok_or_else(|| RuntimeError::NoValue {
                word: name.to_string(),
            })
    }

    pub fn set_global(&mut self, name: &str, value: Value) -> RuntimeResult<()> {
        let sym = self.intern(name);
        self.heap.frame_mut(self.globals)?.push(sym, value);
        Ok(())
    }

    /// Allocate a native and bind it in the globals frame.
    pub fn define_native(
        &mut self,
        name: &str,
        arity: usize,
        native: crate::NativeFn,
    ) -> FunctionId {
        let id = self.make_function(name, arity, native);
        let sym = self.intern(name);
        if let Ok(globals) = self.heap.frame_mut(self.globals) {
            globals.push(sym, Value::Function(id));
        }
        trace!("native {} / {}", name, arity);
        id
    }

    /// Allocate a native without binding it. The result is unrooted.
    pub fn make_function(&mut self, name: &str, arity: usize, native: crate::NativeFn) -> FunctionId {
        self.heap.alloc_function(Function {
            name: name.into(),
            arity,
            native,
        })
    }

    // ── Allocation helpers (results are unrooted) ──────────────────

    pub fn make_block(&mut self, values: Vec<Value>) -> Value {
        Value::Block(self.heap.alloc_block(values))
    }

    pub fn make_string(&mut self, text: &str) -> Value {
        Value::String(self.heap.alloc_series(Series::Text(text.to_string())))
    }

    /// Plain object from a declaration block. `decls` must be rooted.
    pub fn make_object(&mut self, decls: SeriesId) -> RuntimeResult<Value> {
        let id = frame::make_object(&mut self.heap, None, Some(decls))?;
        let object = Value::Object(id);
        self.with_roots(&[object], |interp| interp.do_bind_block(id, decls))?;
        Ok(object)
    }

    // ── Roots ──────────────────────────────────────────────────────

    /// Run `f` with `values` protected from collection. The protection is
    /// released on every path out of `f`.
    pub fn with_roots<T>(&mut self, values: &[Value], f: impl FnOnce(&mut Self) -> T) -> T {
        let mark = self.heap.root_mark();
        for value in values {
            self.heap.protect(*value);
        }
        let result = f(self);
        self.heap.release_to(mark);
        result
    }

    // ── Member access ──────────────────────────────────────────────

    fn frame_of(value: Value) -> RuntimeResult<FrameId> {
        value.frame().ok_or(RuntimeError::ExpectedType {
            expected: "object!",
            got: value.type_tag(),
        })
    }

    /// Member `name` of an object or instance.
    pub fn member(&self, value: Value, name: &str) -> RuntimeResult<Value> {
        let frame = Self::frame_of(value)?;
        lookup(&self.heap, frame, self.intern(name))?
            .value()
            .ok_or_else(|| RuntimeError::NoValue {
                word: name.to_string(),
            })
    }

    /// Overwrite an existing member of an object or instance.
    pub fn set_member(&mut self, value: Value, name: &str, new: Value) -> RuntimeResult<()> {
        let frame = Self::frame_of(value)?;
        let sym = self.intern(name);
        if self.heap.frame_mut(frame)?.set(sym, new) {
            Ok(())
        } else {
            Err(RuntimeError::NoValue {
                word: name.to_string(),
            })
        }
    }

    pub fn integer(value: Value) -> RuntimeResult<i64> {
        match value {
            Value::Integer(n) => Ok(n),
            other => Err(RuntimeError::ExpectedType {
                expected: "integer!",
                got: other.type_tag(),
            }),
        }
    }

    pub fn text(&self, value: Value) -> RuntimeResult<String> {
        match value {
            Value::String(id) => match self.heap.series(id)? {
                Series::Text(text) => Ok(text.clone()),
                _ => Err(RuntimeError::StaleReference),
            },
            other => Err(RuntimeError::ExpectedType {
                expected: "string!",
                got: other.type_tag(),
            }),
        }
    }

    // ── Evaluation ─────────────────────────────────────────────────

    /// Evaluate `block` in the context of `frame`. Set-words naming a
    /// member of `frame` assign to it; others assign to globals. Both
    /// `frame` and `block` must be rooted.
    pub fn do_bind_block(&mut self, frame: FrameId, block: SeriesId) -> RuntimeResult<Value> {
        let values = match self.heap.series(block)? {
            Series::Values(values) => values.clone(),
            _ => {
                return Err(RuntimeError::ExpectedType {
                    expected: "block!",
                    got: TypeTag::String,
                });
            }
        };
        trace!("do_bind_block {:?} ({} values)", frame, values.len());

        let mut pos = 0;
        let mut last = Value::Unset;
        while pos < values.len() {
            last = self.eval_expression(frame, &values, &mut pos)?;
        }
        Ok(last)
    }

    fn eval_expression(
        &mut self,
        frame: FrameId,
        values: &[Value],
        pos: &mut usize,
    ) -> RuntimeResult<Value> {
        let value = values[*pos];
        *pos += 1;
        match value {
            Value::SetWord(sym) => {
                if *pos >= values.len() {
                    return Err(RuntimeError::NoValue {
                        word: format!("{}:", self.symbols.name(sym)),
                    });
                }
                let result = self.eval_expression(frame, values, pos)?;
                self.assign(frame, sym, result)?;
                Ok(result)
            }
            Value::Word(sym) => match self.resolve_word(frame, sym)? {
                Value::Function(function) => {
                    let arity = self.heap.function(function)?.arity;
                    self.apply_from(frame, function, arity, values, pos)
                }
                other => Ok(other),
            },
            Value::GetWord(sym) => self.resolve_word(frame, sym),
            Value::LitWord(sym) => Ok(Value::Word(sym)),
            Value::Paren(inner) => self.do_bind_block(frame, inner),
            literal => Ok(literal),
        }
    }

    /// Evaluate `arity` arguments and apply `function`. Each evaluated
    /// argument stays protected while the following ones are evaluated.
    fn apply_from(
        &mut self,
        frame: FrameId,
        function: FunctionId,
        arity: usize,
        values: &[Value],
        pos: &mut usize,
    ) -> RuntimeResult<Value> {
        let mark = self.heap.root_mark();
        self.heap.protect(Value::Function(function));
        let mut args = Vec::with_capacity(arity);
        let mut result = Ok(());
        while args.len() < arity {
            if *pos >= values.len() {
                let name = self.heap.function(function).map(|f| f.name.to_string());
                result = Err(RuntimeError::ArityMismatch {
                    function: name.unwrap_or_default(),
                    expected: arity,
                    got: args.len(),
                });
                break;
            }
            match self.eval_expression(frame, values, pos) {
                Ok(arg) => {
                    self.heap.protect(arg);
                    args.push(arg);
                }
                Err(err) => {
                    result = Err(err);
                    break;
                }
            }
        }
        let result = result.and_then(|()| self.apply(function, &args));
        self.heap.release_to(mark);
        result
    }

    fn resolve_word(&self, frame: FrameId, sym: Symbol) -> RuntimeResult<Value> {
        if let LookupResult::Found { value, .. } = lookup(&self.heap, frame, sym)? {
            return Ok(value);
        }
        lookup(&self.heap, self.globals, sym)?
            .value()
            .ok_or_else(|| RuntimeError::NoValue {
                word: self.symbols.name(sym).to_string(),
            })
    }

    fn assign(&mut self, frame: FrameId, sym: Symbol, value: Value) -> RuntimeResult<()> {
        // slot 0 always holds the frame's own instance
        if sym == Symbol::SELF {
            return Err(RuntimeError::ProtectedWord {
                word: self.symbols.name(sym).to_string(),
            });
        }
        if self.heap.frame_mut(frame)?.set(sym, value) {
            return Ok(());
        }
        self.heap.frame_mut(self.globals)?.push(sym, value);
        Ok(())
    }

    /// Call `function` with `args`, protected for the duration of the call.
    pub fn apply(&mut self, function: FunctionId, args: &[Value]) -> RuntimeResult<Value> {
        let Function { name, arity, native } = self.heap.function(function)?.clone();
        if args.len() < arity {
            return Err(RuntimeError::ArityMismatch {
                function: name.to_string(),
                expected: arity,
                got: args.len(),
            });
        }
        trace!("apply {} with {} args", name, args.len());
        self.with_roots(args, |interp| native(interp, args))
    }

    pub fn apply_value(&mut self, function: Value, args: &[Value]) -> RuntimeResult<Value> {
        match function {
            Value::Function(id) => self.apply(id, args),
            other => Err(RuntimeError::ExpectedType {
                expected: "function!",
                got: other.type_tag(),
            }),
        }
    }

    // ── Dispatch ───────────────────────────────────────────────────

    /// Route `request` to the handler of its operand type. Operands are
    /// rooted while the handler runs.
    pub fn dispatch(&mut self, request: ActionRequest) -> RuntimeResult<Value> {
        let Some(handler) = self.handlers.route(&request) else {
            return Err(RuntimeError::ActionNotSupported {
                tag: request.value().type_tag(),
                action: request.action,
            });
        };
        debug!(
            "dispatch {} on {} via {}",
            request.action,
            request.value().type_tag(),
            handler.type_tag()
        );
        let roots: Vec<Value> = request.values().collect();
        self.with_roots(&roots, |interp| handler.act(interp, &request))
    }

    /// Shorthand for an action without refinements.
    pub fn act(&mut self, action: Action, args: &[Value]) -> RuntimeResult<Value> {
        self.dispatch(ActionRequest::new(action, args))
    }

    pub fn make(&mut self, value: Value, argument: Value) -> RuntimeResult<Value> {
        self.act(Action::Make, &[value, argument])
    }

    pub fn copy(&mut self, value: Value) -> RuntimeResult<Value> {
        self.act(Action::Copy, &[value])
    }

    pub fn reflect(&mut self, value: Value, selector: &str) -> RuntimeResult<Value> {
        let selector = Value::Word(self.intern(selector));
        self.act(Action::Reflect, &[value, selector])
    }

    /// Compare through the handler of either operand's type; values
    /// without a handler compare structurally.
    pub fn compare(&mut self, a: Value, b: Value, mode: CompareMode) -> RuntimeResult<bool> {
        match self.handlers.route_compare(&a, &b) {
            Some(handler) => self.with_roots(&[a, b], |interp| handler.compare(interp, a, b, mode)),
            None => self.compare_plain(a, b, mode),
        }
    }

    fn compare_plain(&self, a: Value, b: Value, mode: CompareMode) -> RuntimeResult<bool> {
        let ordered = |a: f64, b: f64| match mode {
            CompareMode::Greater => a > b,
            CompareMode::GreaterOrEqual => a >= b,
            _ => a == b,
        };
        Ok(match (a, b) {
            (Value::Integer(a), Value::Integer(b)) => ordered(a as f64, b as f64),
            (Value::Integer(a), Value::Decimal(b)) => ordered(a as f64, b),
            (Value::Decimal(a), Value::Integer(b)) => ordered(a, b as f64),
            (Value::Decimal(a), Value::Decimal(b)) => ordered(a, b),
            (Value::String(x), Value::String(y)) if mode != CompareMode::Same => {
                let (x, y) = (self.heap.series(x)?, self.heap.series(y)?);
                match (x, y, mode) {
                    (Series::Text(x), Series::Text(y), CompareMode::Equal | CompareMode::Equivalent) => {
                        x.eq_ignore_ascii_case(y)
                    }
                    _ => x == y,
                }
            }
            _ => match mode {
                CompareMode::Greater | CompareMode::GreaterOrEqual => {
                    return Err(RuntimeError::ExpectedType {
                        expected: "number!",
                        got: a.type_tag(),
                    });
                }
                _ => a == b,
            },
        })
    }

    // ── Formatting ─────────────────────────────────────────────────

    /// Render `value` as text. Instances with a `.form` hook render
    /// through it.
    pub fn form(&mut self, value: Value) -> RuntimeResult<String> {
        self.form_nested(value, &mut Vec::new())
    }

    /// `open` holds the blocks and hooked instances being formed further
    /// up; meeting one again renders it without recursing.
    fn form_nested(&mut self, value: Value, open: &mut Vec<Value>) -> RuntimeResult<String> {
        if open.len() >= MAX_FORM_DEPTH {
            return Err(RuntimeError::User("form: value nested too deeply".into()));
        }
        if value.is_utype() && !open.contains(&value) {
            match crate::utype::try_method(self, &[value], ".form") {
                Ok(Some(formed)) if !formed.is_utype() => {
                    open.push(value);
                    let result = self.with_roots(&[formed], |interp| interp.form_nested(formed, open));
                    open.pop();
                    return result;
                }
                Ok(_) | Err(RuntimeError::ArgumentInvalid { .. }) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(match value {
            Value::Unset => String::new(),
            Value::None => "none".into(),
            Value::Logic(flag) => flag.to_string(),
            Value::Integer(n) => n.to_string(),
            Value::Decimal(n) => n.to_string(),
            Value::Word(sym) => self.symbols.name(sym).to_string(),
            Value::SetWord(sym) => format!("{}:", self.symbols.name(sym)),
            Value::GetWord(sym) => format!(":{}", self.symbols.name(sym)),
            Value::LitWord(sym) => format!("'{}", self.symbols.name(sym)),
            Value::String(_) => self.text(value)?,
            Value::Binary(id) => match self.heap.series(id)? {
                Series::Bytes(bytes) => bytes.iter().map(|b| format!("{b:02X}")).collect(),
                _ => String::new(),
            },
            Value::Block(id) | Value::Paren(id) => {
                let (start, end) = if matches!(value, Value::Paren(_)) { ("(", ")") } else { ("[", "]") };
                if open.contains(&value) {
                    return Ok(format!("{start}...{end}"));
                }
                let items = self.heap.series(id)?.values().unwrap_or(&[]).to_vec();
                open.push(value);
                let mut parts = Vec::with_capacity(items.len());
                for item in items {
                    parts.push(self.form_nested(item, open)?);
                }
                open.pop();
                format!("{start}{}{end}", parts.join(" "))
            }
            Value::Object(id) | Value::Utype(id) => {
                let members: Vec<_> = self.heap.frame(id)?.members().collect();
                let mut parts = Vec::with_capacity(members.len());
                for (name, member) in members {
                    let rendered = match member {
                        Value::Object(_) | Value::Utype(_) => member.type_tag().name().to_string(),
                        other => self.form_nested(other, open)?,
                    };
                    parts.push(format!("{}: {}", self.symbols.name(name), rendered));
                }
                format!("[{}]", parts.join(" "))
            }
            Value::Function(id) => format!("native {}", self.heap.function(id)?.name),
            Value::Datatype(tag) => tag.name().to_string(),
            Value::Typeset(set) => {
                let names: Vec<_> = TypeTag::ALL
                    .iter()
                    .filter(|tag| set.has(**tag))
                    .map(|tag| tag.name())
                    .collect();
                format!("[{}]", names.join(" "))
            }
        })
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new(InterpreterCreateInfo::default())
    }
}
