//! `ValueTag`: the closed set of primitive and composite tags that classify
//! in-memory layout and reference-ness.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueTag {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    Float,
    Double,
    Decimal,
    Char,
    Bool,
    IntPtr,
    Reference,
    DateTime,
    TimeSpan,
    Point,
    Vector3,
    String,
    Array,
    Object,
    Struct,
    Class,
    Tuple,
    Dictionary,
    Nullable,
    Enum,
}

impl ValueTag {
    /// Value-kind tags live inline in their stack slot; reference-kind tags
    /// store a heap address in their stack slot.
    pub fn is_value_kind(self) -> bool {
        matches!(
            self,
            ValueTag::I8
                | ValueTag::U8
                | ValueTag::I16
                | ValueTag::U16
                | ValueTag::I32
                | ValueTag::U32
                | ValueTag::I64
                | ValueTag::U64
                | ValueTag::Float
                | ValueTag::Double
                | ValueTag::Decimal
                | ValueTag::Char
                | ValueTag::Bool
                | ValueTag::IntPtr
                | ValueTag::Reference
                | ValueTag::DateTime
                | ValueTag::TimeSpan
                | ValueTag::Point
                | ValueTag::Vector3
        )
    }

    pub fn is_reference_kind(self) -> bool {
        !self.is_value_kind()
    }

    /// In-stack footprint in bytes. Reference-kind tags occupy 4 bytes (a heap
    /// address); composite layouts (`Struct`, `Class`, `Tuple`, `Dictionary`,
    /// `Enum`, `Nullable`, `Object`) are reference-kind in this implementation
    /// and so also occupy 4 bytes on the stack, with their fields living in
    /// heap-allocated storage.
    pub fn size_of(self) -> u32 {
        match self {
            ValueTag::I8 | ValueTag::U8 | ValueTag::Bool => 1,
            ValueTag::I16 | ValueTag::U16 | ValueTag::Char => 2,
            ValueTag::I32
            | ValueTag::U32
            | ValueTag::Float
            | ValueTag::IntPtr
            | ValueTag::Point => 4,
            ValueTag::I64 | ValueTag::U64 | ValueTag::Double | ValueTag::TimeSpan => 8,
            ValueTag::DateTime => 8,
            ValueTag::Vector3 => 12,
            ValueTag::Decimal => 16,
            ValueTag::Reference
            | ValueTag::String
            | ValueTag::Array
            | ValueTag::Object
            | ValueTag::Struct
            | ValueTag::Class
            | ValueTag::Tuple
            | ValueTag::Dictionary
            | ValueTag::Nullable
            | ValueTag::Enum => 4,
        }
    }

    /// Whether this tag denotes an integer family (used by numeric literal
    /// suffix resolution and arithmetic dispatch).
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            ValueTag::I8
                | ValueTag::U8
                | ValueTag::I16
                | ValueTag::U16
                | ValueTag::I32
                | ValueTag::U32
                | ValueTag::I64
                | ValueTag::U64
        )
    }

    pub fn is_signed_integer(self) -> bool {
        matches!(
            self,
            ValueTag::I8 | ValueTag::I16 | ValueTag::I32 | ValueTag::I64
        )
    }

    pub fn is_floating(self) -> bool {
        matches!(self, ValueTag::Float | ValueTag::Double | ValueTag::Decimal)
    }

    /// Parse a recognized type-name token (as spelled in Quill source) into a
    /// tag, when the name denotes a tag directly (arrays/structs/classes are
    /// resolved by the parser/evaluator instead, since they carry extra
    /// structure).
    pub fn from_type_name(name: &str) -> Option<ValueTag> {
        Some(match name {
            "sbyte" => ValueTag::I8,
            "byte" => ValueTag::U8,
            "short" => ValueTag::I16,
            "ushort" => ValueTag::U16,
            "int" => ValueTag::I32,
            "uint" => ValueTag::U32,
            "long" => ValueTag::I64,
            "ulong" => ValueTag::U64,
            "float" => ValueTag::Float,
            "double" => ValueTag::Double,
            "decimal" => ValueTag::Decimal,
            "char" => ValueTag::Char,
            "bool" => ValueTag::Bool,
            "string" => ValueTag::String,
            "object" => ValueTag::Object,
            "IntPtr" => ValueTag::IntPtr,
            "DateTime" => ValueTag::DateTime,
            "TimeSpan" => ValueTag::TimeSpan,
            "Point" => ValueTag::Point,
            "Vector3" => ValueTag::Vector3,
            _ => return None,
        })
    }
}

impl fmt::Display for ValueTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ValueTag::I8 => "sbyte",
            ValueTag::U8 => "byte",
            ValueTag::I16 => "short",
            ValueTag::U16 => "ushort",
            ValueTag::I32 => "int",
            ValueTag::U32 => "uint",
            ValueTag::I64 => "long",
            ValueTag::U64 => "ulong",
            ValueTag::Float => "float",
            ValueTag::Double => "double",
            ValueTag::Decimal => "decimal",
            ValueTag::Char => "char",
            ValueTag::Bool => "bool",
            ValueTag::IntPtr => "IntPtr",
            ValueTag::Reference => "reference",
            ValueTag::DateTime => "DateTime",
            ValueTag::TimeSpan => "TimeSpan",
            ValueTag::Point => "Point",
            ValueTag::Vector3 => "Vector3",
            ValueTag::String => "string",
            ValueTag::Array => "array",
            ValueTag::Object => "object",
            ValueTag::Struct => "struct",
            ValueTag::Class => "class",
            ValueTag::Tuple => "tuple",
            ValueTag::Dictionary => "Dictionary",
            ValueTag::Nullable => "nullable",
            ValueTag::Enum => "enum",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_kind_classification_matches_spec() {
        assert!(ValueTag::I32.is_value_kind());
        assert!(ValueTag::Bool.is_value_kind());
        assert!(ValueTag::IntPtr.is_value_kind());
        assert!(!ValueTag::String.is_value_kind());
        assert!(!ValueTag::Array.is_value_kind());
        assert!(ValueTag::String.is_reference_kind());
    }

    #[test]
    fn size_of_matches_widths() {
        assert_eq!(ValueTag::I8.size_of(), 1);
        assert_eq!(ValueTag::I64.size_of(), 8);
        assert_eq!(ValueTag::Decimal.size_of(), 16);
        assert_eq!(ValueTag::String.size_of(), 4);
    }

    #[test]
    fn from_type_name_round_trips_display() {
        for name in ["int", "uint", "long", "ulong", "byte", "bool", "string"] {
            let tag = ValueTag::from_type_name(name).unwrap();
            assert_eq!(tag.to_string(), name);
        }
    }
}
