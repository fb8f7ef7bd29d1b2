use std::fmt;

use crate::{FrameId, FunctionId, SeriesId, Symbol};

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    Unset = 0,
    None = 1,
    Logic = 2,
    Integer = 3,
    Decimal = 4,
    Word = 5,
    SetWord = 6,
    GetWord = 7,
    LitWord = 8,
    String = 9,
    Binary = 10,
    Block = 11,
    Paren = 12,
    Object = 13,
    Utype = 14,
    Function = 15,
    Datatype = 16,
    Typeset = 17,
}

impl TypeTag {
    pub const ALL: [TypeTag; 18] = [
        TypeTag::Unset,
        TypeTag::None,
        TypeTag::Logic,
        TypeTag::Integer,
        TypeTag::Decimal,
        TypeTag::Word,
        TypeTag::SetWord,
        TypeTag::GetWord,
        TypeTag::LitWord,
        TypeTag::String,
        TypeTag::Binary,
        TypeTag::Block,
        TypeTag::Paren,
        TypeTag::Object,
        TypeTag::Utype,
        TypeTag::Function,
        TypeTag::Datatype,
        TypeTag::Typeset,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TypeTag::Unset => "unset!",
            TypeTag::None => "none!",
            TypeTag::Logic => "logic!",
            TypeTag::Integer => "integer!",
            TypeTag::Decimal => "decimal!",
            TypeTag::Word => "word!",
            TypeTag::SetWord => "set-word!",
            TypeTag::GetWord => "get-word!",
            TypeTag::LitWord => "lit-word!",
            TypeTag::String => "string!",
            TypeTag::Binary => "binary!",
            TypeTag::Block => "block!",
            TypeTag::Paren => "paren!",
            TypeTag::Object => "object!",
            TypeTag::Utype => "utype!",
            TypeTag::Function => "function!",
            TypeTag::Datatype => "datatype!",
            TypeTag::Typeset => "typeset!",
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

bitflags::bitflags! {
    /// One bit per [`TypeTag`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TypeSet: u32 {
        const UNSET = 1 << TypeTag::Unset as u32;
        const NONE = 1 << TypeTag::None as u32;
        const LOGIC = 1 << TypeTag::Logic as u32;
        const INTEGER = 1 << TypeTag::Integer as u32;
        const DECIMAL = 1 << TypeTag::Decimal as u32;
        const WORD = 1 << TypeTag::Word as u32;
        const SET_WORD = 1 << TypeTag::SetWord as u32;
        const GET_WORD = 1 << TypeTag::GetWord as u32;
        const LIT_WORD = 1 << TypeTag::LitWord as u32;
        const STRING = 1 << TypeTag::String as u32;
        const BINARY = 1 << TypeTag::Binary as u32;
        const BLOCK = 1 << TypeTag::Block as u32;
        const PAREN = 1 << TypeTag::Paren as u32;
        const OBJECT = 1 << TypeTag::Object as u32;
        const UTYPE = 1 << TypeTag::Utype as u32;
        const FUNCTION = 1 << TypeTag::Function as u32;
        const DATATYPE = 1 << TypeTag::Datatype as u32;
        const TYPESET = 1 << TypeTag::Typeset as u32;

        const STD_SERIES = Self::STRING.bits()
            | Self::BINARY.bits()
            | Self::BLOCK.bits()
            | Self::PAREN.bits();
        /// Duplicated by clone, derive and merge.
        const CLONE = Self::STD_SERIES.bits();
    }
}

impl TypeSet {
    #[inline]
    pub fn of(tag: TypeTag) -> Self {
        Self::from_bits_truncate(1 << tag as u32)
    }

    #[inline]
    pub fn has(self, tag: TypeTag) -> bool {
        self.contains(Self::of(tag))
    }
}

/// A runtime value. Heap-backed kinds hold generational handles; the
/// collector decides their lifetime.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    /// The "no result" sentinel.
    Unset,
    None,
    Logic(bool),
    Integer(i64),
    Decimal(f64),
    Word(Symbol),
    SetWord(Symbol),
    GetWord(Symbol),
    LitWord(Symbol),
    String(SeriesId),
    Binary(SeriesId),
    Block(SeriesId),
    Paren(SeriesId),
    Object(FrameId),
    Utype(FrameId),
    Function(FunctionId),
    Datatype(TypeTag),
    Typeset(TypeSet),
}

impl Value {
    pub fn type_tag(&self) -> TypeTag {
        match self {
            Value::Unset => TypeTag::Unset,
            Value::None => TypeTag::None,
            Value::Logic(_) => TypeTag::Logic,
            Value::Integer(_) => TypeTag::Integer,
            Value::Decimal(_) => TypeTag::Decimal,
            Value::Word(_) => TypeTag::Word,
            Value::SetWord(_) => TypeTag::SetWord,
            Value::GetWord(_) => TypeTag::GetWord,
            Value::LitWord(_) => TypeTag::LitWord,
            Value::String(_) => TypeTag::String,
            Value::Binary(_) => TypeTag::Binary,
            Value::Block(_) => TypeTag::Block,
            Value::Paren(_) => TypeTag::Paren,
            Value::Object(_) => TypeTag::Object,
            Value::Utype(_) => TypeTag::Utype,
            Value::Function(_) => TypeTag::Function,
            Value::Datatype(_) => TypeTag::Datatype,
            Value::Typeset(_) => TypeTag::Typeset,
        }
    }

    /// `none`, `false` and `unset` are falsy, everything else is truthy.
    #[inline]
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::None | Value::Logic(false) | Value::Unset)
    }

    #[inline]
    pub fn is_unset(&self) -> bool {
        matches!(self, Value::Unset)
    }

    #[inline]
    pub fn is_utype(&self) -> bool {
        matches!(self, Value::Utype(_))
    }

    /// Frame behind an object or utype value.
    #[inline]
    pub fn frame(&self) -> Option<FrameId> {
        match *self {
            Value::Object(id) | Value::Utype(id) => Some(id),
            _ => None,
        }
    }

    /// Series behind any series value.
    #[inline]
    pub fn series(&self) -> Option<SeriesId> {
        match *self {
            Value::String(id) | Value::Binary(id) | Value::Block(id) | Value::Paren(id) => {
                Some(id)
            }
            _ => None,
        }
    }

    /// Same kind of series value, pointing at another series.
    pub fn with_series(&self, id: SeriesId) -> Value {
        match self {
            Value::String(_) => Value::String(id),
            Value::Binary(_) => Value::Binary(id),
            Value::Block(_) => Value::Block(id),
            Value::Paren(_) => Value::Paren(id),
            other => *other,
        }
    }

    /// Same kind of frame value, pointing at another frame.
    pub fn with_frame(&self, id: FrameId) -> Value {
        match self {
            Value::Object(_) => Value::Object(id),
            Value::Utype(_) => Value::Utype(id),
            other => *other,
        }
    }
}
