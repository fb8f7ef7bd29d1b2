use std::fmt;

use crate::{RuntimeError, Symbol, SymbolTable, Value};

macro_rules! actions {
    ($( $variant:ident => $name:literal, $hook:expr; )*) => {
        /// Generic action verbs routed to type handlers.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Action {
            $( $variant, )*
        }

        impl Action {
            pub const ALL: &'static [Action] = &[ $( Action::$variant, )* ];

            pub fn name(self) -> &'static str {
                match self {
                    $( Action::$variant => $name, )*
                }
            }

            /// Name of the frame member implementing this action, if the
            /// action can be hooked at all.
            pub fn hook_name(self) -> Option<&'static str> {
                match self {
                    $( Action::$variant => $hook, )*
                }
            }
        }
    };
}

actions! {
    Absolute => "absolute", Some(".absolute");
    Add => "add", Some(".add");
    And => "and", Some(".and");
    Append => "append", Some(".append");
    At => "at", Some(".at");
    Back => "back", Some(".back");
    Change => "change", Some(".change");
    Clear => "clear", Some(".clear");
    Close => "close", Some(".close");
    Complement => "complement", Some(".complement");
    Create => "create", Some(".create");
    Delete => "delete", Some(".delete");
    Divide => "divide", Some(".divide");
    EvenQ => "even?", Some(".even?");
    Find => "find", Some(".find");
    Head => "head", Some(".head");
    HeadQ => "head?", Some(".head?");
    IndexQ => "index?", Some(".index?");
    Insert => "insert", Some(".insert");
    LengthQ => "length?", Some(".length?");
    Modify => "modify", Some(".modify");
    Multiply => "multiply", Some(".multiply");
    Negate => "negate", Some(".negate");
    Next => "next", Some(".next");
    OddQ => "odd?", Some(".odd?");
    Open => "open", Some(".open");
    OpenQ => "open?", Some(".open?");
    Or => "or", Some(".or");
    PastQ => "past?", Some(".past?");
    Poke => "poke", Some(".poke");
    Power => "power", Some(".power");
    Query => "query", Some(".query");
    Random => "random", Some(".random");
    Read => "read", Some(".read");
    Remainder => "remainder", Some(".remainder");
    Remove => "remove", Some(".remove");
    Rename => "rename", Some(".rename");
    Reverse => "reverse", Some(".reverse");
    Round => "round", Some(".round");
    Select => "select", Some(".select");
    Skip => "skip", Some(".skip");
    Sort => "sort", Some(".sort");
    Subtract => "subtract", Some(".subtract");
    Swap => "swap", Some(".swap");
    Tail => "tail", Some(".tail");
    TailQ => "tail?", Some(".tail?");
    Take => "take", Some(".take");
    To => "to", Some(".to");
    Update => "update", Some(".update");
    Write => "write", Some(".write");
    Xor => "xor", Some(".xor");
    // handled by the protocols, never hooked
    Make => "make", None;
    Copy => "copy", None;
    Reflect => "reflect", None;
    // known to the host but not hookable
    Pick => "pick", None;
    Trim => "trim", None;
}

/// One refinement in an action's fixed argument layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Refinement {
    pub name: &'static str,
    pub takes_arg: bool,
}

const fn flag(name: &'static str) -> Refinement {
    Refinement {
        name,
        takes_arg: false,
    }
}

const fn with_arg(name: &'static str) -> Refinement {
    Refinement {
        name,
        takes_arg: true,
    }
}

const SERIES_EDIT: &[Refinement] = &[with_arg("part"), flag("only"), with_arg("dup")];
const SEARCH: &[Refinement] = &[
    with_arg("part"),
    flag("only"),
    flag("case"),
    flag("any"),
    with_arg("with"),
    with_arg("skip"),
    flag("last"),
    flag("reverse"),
    flag("tail"),
    flag("match"),
];
const COPY: &[Refinement] = &[with_arg("part"), flag("deep"), with_arg("types")];
const TAKE: &[Refinement] = &[with_arg("part"), flag("deep"), flag("last")];
const PART_ONLY: &[Refinement] = &[with_arg("part")];
const SORT: &[Refinement] = &[
    flag("case"),
    with_arg("skip"),
    with_arg("compare"),
    with_arg("part"),
    flag("all"),
    flag("reverse"),
];
const ROUND: &[Refinement] = &[
    with_arg("to"),
    flag("even"),
    flag("down"),
    flag("half-down"),
    flag("floor"),
    flag("ceiling"),
    flag("half-ceiling"),
];
const RANDOM: &[Refinement] = &[flag("seed"), flag("secure"), flag("only")];
const INDEX: &[Refinement] = &[flag("xy")];
const OPEN: &[Refinement] = &[
    flag("new"),
    flag("read"),
    flag("write"),
    flag("seek"),
    with_arg("allow"),
];
const READ: &[Refinement] = &[
    with_arg("part"),
    with_arg("seek"),
    flag("string"),
    flag("lines"),
];
const WRITE: &[Refinement] = &[
    with_arg("part"),
    with_arg("seek"),
    flag("append"),
    with_arg("allow"),
    flag("lines"),
];
const QUERY: &[Refinement] = &[with_arg("mode")];
const TRIM: &[Refinement] = &[
    flag("head"),
    flag("tail"),
    flag("auto"),
    flag("lines"),
    flag("all"),
    with_arg("with"),
];

/// Frame member consulted by the comparison protocol.
pub const COMPARE_HOOK: &str = ".compare";

impl Action {
    /// Two-operand actions, where the second operand gets a chance to
    /// handle the action when the first declines.
    pub fn is_binary(self) -> bool {
        matches!(
            self,
            Action::Add
                | Action::Subtract
                | Action::Multiply
                | Action::Divide
                | Action::Remainder
                | Action::Power
                | Action::And
                | Action::Or
                | Action::Xor
        )
    }

    /// Binary actions plus type conversion.
    pub fn consults_second_operand(self) -> bool {
        self.is_binary() || self == Action::To
    }

    pub fn hook_symbol(self, symbols: &SymbolTable) -> Option<Symbol> {
        self.hook_name().map(|name| symbols.intern(name))
    }

    /// Refinements in the order their slots follow the operands.
    pub fn refinements(self) -> &'static [Refinement] {
        match self {
            Action::Append | Action::Insert | Action::Change => SERIES_EDIT,
            Action::Find => SEARCH,
            // select has no /tail or /match
            Action::Select => &SEARCH[..8],
            Action::Copy => COPY,
            Action::Take => TAKE,
            Action::Remove | Action::Reverse => PART_ONLY,
            Action::Sort => SORT,
            Action::Round => ROUND,
            Action::Random => RANDOM,
            Action::IndexQ => INDEX,
            Action::Open => OPEN,
            Action::Read => READ,
            Action::Write => WRITE,
            Action::Query => QUERY,
            Action::Trim => TRIM,
            _ => &[],
        }
    }

    pub fn from_name(name: &str) -> Option<Action> {
        Action::ALL
            .iter()
            .copied()
            .find(|action| action.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Selectors understood by the host's `reflect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reflector {
    Spec,
    Words,
    Values,
    Body,
    Types,
    Title,
}

impl Reflector {
    pub fn from_symbol(sym: Symbol) -> Option<Reflector> {
        Some(match sym {
            Symbol::SPEC => Reflector::Spec,
            Symbol::WORDS => Reflector::Words,
            Symbol::VALUES => Reflector::Values,
            Symbol::BODY => Reflector::Body,
            Symbol::TYPES => Reflector::Types,
            Symbol::TITLE => Reflector::Title,
            _ => return None,
        })
    }

    /// Selector argument as passed to `reflect`: a word or lit-word.
    pub fn from_value(value: &Value) -> Option<Reflector> {
        match value {
            Value::Word(sym) | Value::LitWord(sym) => Self::from_symbol(*sym),
            _ => None,
        }
    }
}

/// Integer comparison modes handed to comparison hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareMode {
    Greater,
    GreaterOrEqual,
    Equal,
    Equivalent,
    StrictEqual,
    /// Identity: same frame, same type. Never consults a hook.
    Same,
}

impl CompareMode {
    pub fn code(self) -> i64 {
        match self {
            CompareMode::Greater => -2,
            CompareMode::GreaterOrEqual => -1,
            CompareMode::Equal => 0,
            CompareMode::Equivalent => 1,
            CompareMode::StrictEqual => 2,
            CompareMode::Same => 3,
        }
    }

    pub fn from_code(code: i64) -> Option<CompareMode> {
        Some(match code {
            -2 => CompareMode::Greater,
            -1 => CompareMode::GreaterOrEqual,
            0 => CompareMode::Equal,
            1 => CompareMode::Equivalent,
            2 => CompareMode::StrictEqual,
            3 => CompareMode::Same,
            _ => return None,
        })
    }
}

/// A generic action request: verb, positional operands and named
/// refinements. Operand 1 is the value the action applies to.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionRequest {
    pub action: Action,
    pub args: Vec<Value>,
    pub refinements: Vec<(Symbol, Option<Value>)>,
    /// Operand 1 carries an in-flight throw.
    pub thrown: bool,
}

impl ActionRequest {
    pub fn new(action: Action, args: impl Into<Vec<Value>>) -> Self {
        Self {
            action,
            args: args.into(),
            refinements: Vec::new(),
            thrown: false,
        }
    }

    /// Add a refinement, optionally with its argument.
    pub fn refine(mut self, name: Symbol, arg: Option<Value>) -> Self {
        self.refinements.push((name, arg));
        self
    }

    pub fn with_thrown(mut self) -> Self {
        self.thrown = true;
        self
    }

    /// Operand `index`, 1-based; `none` when absent.
    pub fn arg(&self, index: usize) -> Value {
        index
            .checked_sub(1)
            .and_then(|idx| self.args.get(idx))
            .copied()
            .unwrap_or(Value::None)
    }

    pub fn value(&self) -> Value {
        self.arg(1)
    }

    pub fn argument(&self) -> Value {
        self.arg(2)
    }

    pub fn has_refinement(&self, name: Symbol) -> bool {
        self.refinements.iter().any(|(sym, _)| *sym == name)
    }

    pub fn refinement_arg(&self, name: Symbol) -> Option<Value> {
        self.refinements
            .iter()
            .find(|(sym, _)| *sym == name)
            .and_then(|(_, arg)| *arg)
    }

    /// Operands followed by one slot group per refinement the action
    /// declares: a flag, then the argument for refinements taking one.
    /// Absent refinements fill their slots with `false` and `none`.
    pub fn positional(&self, symbols: &SymbolTable) -> Result<Vec<Value>, RuntimeError> {
        let layout = self.action.refinements();
        let declared = |sym: Symbol| layout.iter().any(|slot| symbols.find(slot.name) == Some(sym));
        if self.refinements.iter().any(|(sym, _)| !declared(*sym)) {
            return Err(RuntimeError::BadRefinement);
        }

        let mut values = self.args.clone();
        for slot in layout {
            let given = symbols
                .find(slot.name)
                .and_then(|sym| self.refinements.iter().find(|(name, _)| *name == sym));
            values.push(Value::Logic(given.is_some()));
            if slot.takes_arg {
                values.push(given.and_then(|(_, arg)| *arg).unwrap_or(Value::None));
            }
        }
        Ok(values)
    }

    /// Every heap value the request refers to.
    pub fn values(&self) -> impl Iterator<Item = Value> + '_ {
        self.args
            .iter()
            .copied()
            .chain(self.refinements.iter().filter_map(|(_, arg)| *arg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_hookable_action_has_a_dotted_name() {
        let hooked: Vec<_> = Action::ALL
            .iter()
            .filter_map(|action| action.hook_name())
            .collect();
        assert_eq!(hooked.len(), 51);
        assert!(hooked.iter().all(|name| name.starts_with('.')));
        assert_eq!(Action::LengthQ.hook_name(), Some(".length?"));
        assert_eq!(Action::Make.hook_name(), None);
    }

    #[test]
    fn conversion_consults_second_operand_but_append_does_not() {
        assert!(Action::Add.consults_second_operand());
        assert!(Action::To.consults_second_operand());
        assert!(!Action::To.is_binary());
        assert!(!Action::Append.consults_second_operand());
    }

    #[test]
    fn compare_mode_codes_round_trip() {
        for code in -2..=3 {
            assert_eq!(CompareMode::from_code(code).map(CompareMode::code), Some(code));
        }
        assert_eq!(CompareMode::from_code(9), None);
    }

    #[test]
    fn positional_fills_every_declared_slot() {
        let symbols = SymbolTable::new();
        let request = ActionRequest::new(Action::Copy, vec![Value::Integer(1)])
            .refine(Symbol::TYPES, Some(Value::Integer(2)));
        assert_eq!(
            request.positional(&symbols),
            Ok(vec![
                Value::Integer(1),
                Value::Logic(false),
                Value::None,
                Value::Logic(false),
                Value::Logic(true),
                Value::Integer(2)
            ])
        );
        assert_eq!(request.argument(), Value::None);
        assert_eq!(Action::from_name("APPEND"), Some(Action::Append));
        assert!(Reflector::from_value(&Value::Word(symbols.intern("words"))).is_some());
    }

    #[test]
    fn positional_rejects_undeclared_refinements() {
        let symbols = SymbolTable::new();
        let request = ActionRequest::new(Action::Add, vec![Value::Integer(1), Value::Integer(2)])
            .refine(Symbol::DEEP, None);
        assert_eq!(request.positional(&symbols), Err(RuntimeError::BadRefinement));
        assert_eq!(Action::Select.refinements().last(), Some(&flag("reverse")));
    }
}
