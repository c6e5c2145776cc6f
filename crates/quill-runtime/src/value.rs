//! `RuntimeValue`: the tagged-sum representation of a live value passing
//! through the evaluator, bridging [`ValueTag`] with an actual Rust
//! representation.

use quill_core::ValueTag;

use crate::memory::NULL_ADDRESS;

#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeValue {
    Int { value: i64, tag: ValueTag },
    Float { value: f64, tag: ValueTag },
    Bool(bool),
    Char(char),
    /// Heap address of the string's payload, or `NULL_ADDRESS`.
    String(i64),
    /// Heap address of the array's payload plus its element tag.
    Array { addr: i64, element_tag: ValueTag },
    /// Heap address of a struct/class/tuple/dictionary instance, plus the
    /// concrete declared type name (the `ValueTag` alone only says
    /// "Struct" or "Class", not which one — field/method lookup needs the
    /// name).
    Object { addr: i64, tag: ValueTag, type_name: String },
    /// A stack or heap address (the operand of `&x`).
    Pointer { addr: i64, pointee_tag: ValueTag },
    IntPtr(i64),
    Null(ValueTag),
    Tuple(Vec<RuntimeValue>),
    Void,
}

impl RuntimeValue {
    pub fn tag(&self) -> ValueTag {
        match self {
            RuntimeValue::Int { tag, .. } => *tag,
            RuntimeValue::Float { tag, .. } => *tag,
            RuntimeValue::Bool(_) => ValueTag::Bool,
            RuntimeValue::Char(_) => ValueTag::Char,
            RuntimeValue::String(_) => ValueTag::String,
            RuntimeValue::Array { .. } => ValueTag::Array,
            RuntimeValue::Object { tag, .. } => *tag,
            RuntimeValue::Pointer { .. } => ValueTag::Reference,
            RuntimeValue::IntPtr(_) => ValueTag::IntPtr,
            RuntimeValue::Null(tag) => *tag,
            RuntimeValue::Tuple(_) => ValueTag::Tuple,
            RuntimeValue::Void => ValueTag::Object,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, RuntimeValue::Null(_))
            || matches!(self, RuntimeValue::String(a) if *a == NULL_ADDRESS)
            || matches!(self, RuntimeValue::Object { addr, .. } if *addr == NULL_ADDRESS)
            || matches!(self, RuntimeValue::Array { addr, .. } if *addr == NULL_ADDRESS)
    }

    pub fn null_object(tag: ValueTag, type_name: impl Into<String>) -> Self {
        RuntimeValue::Object { addr: NULL_ADDRESS, tag, type_name: type_name.into() }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            RuntimeValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            RuntimeValue::Int { value, .. } => Some(*value),
            RuntimeValue::Char(c) => Some(*c as i64),
            RuntimeValue::IntPtr(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            RuntimeValue::Float { value, .. } => Some(*value),
            RuntimeValue::Int { value, .. } => Some(*value as f64),
            _ => None,
        }
    }

    pub fn int(value: i64, tag: ValueTag) -> Self {
        RuntimeValue::Int { value, tag }
    }

    pub fn float(value: f64, tag: ValueTag) -> Self {
        RuntimeValue::Float { value, tag }
    }
}

impl std::fmt::Display for RuntimeValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuntimeValue::Int { value, .. } => write!(f, "{value}"),
            RuntimeValue::Float { value, tag } => match tag {
                ValueTag::Float => write!(f, "{}", *value as f32),
                _ => write!(f, "{value}"),
            },
            RuntimeValue::Bool(b) => write!(f, "{b}"),
            RuntimeValue::Char(c) => write!(f, "{c}"),
            RuntimeValue::String(_) => write!(f, "<string>"),
            RuntimeValue::Array { .. } => write!(f, "<array>"),
            RuntimeValue::Object { .. } => write!(f, "<object>"),
            RuntimeValue::Pointer { addr, .. } => write!(f, "0x{addr:x}"),
            RuntimeValue::IntPtr(v) => write!(f, "{v}"),
            RuntimeValue::Null(_) => write!(f, "null"),
            RuntimeValue::Tuple(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
            RuntimeValue::Void => write!(f, ""),
        }
    }
}
