//! `Cast(value, targetTag)`: the single numeric-coercion routine the
//! evaluator funnels all conversions through.

use quill_core::ValueTag;

use crate::error::InterpError;
use crate::memory::{MemoryImage, NULL_ADDRESS};
use crate::value::RuntimeValue;

/// Render any value as display text, used both by `ToString` targets and by
/// `+`-concatenation with a string operand.
pub fn to_display_string(value: &RuntimeValue, mem: &MemoryImage) -> Result<String, InterpError> {
    Ok(match value {
        RuntimeValue::String(addr) => {
            if *addr == NULL_ADDRESS {
                String::new()
            } else {
                mem.read_string(*addr)?
            }
        }
        other => other.to_string(),
    })
}

/// Widen through `f64` as the canonical wide type, then checked-narrow to
/// the target integer width.
fn checked_narrow(wide: f64, target: ValueTag) -> Result<i64, InterpError> {
    let (lo, hi): (f64, f64) = match target {
        ValueTag::I8 => (i8::MIN as f64, i8::MAX as f64),
        ValueTag::U8 => (u8::MIN as f64, u8::MAX as f64),
        ValueTag::I16 => (i16::MIN as f64, i16::MAX as f64),
        ValueTag::U16 | ValueTag::Char => (u16::MIN as f64, u16::MAX as f64),
        ValueTag::I32 => (i32::MIN as f64, i32::MAX as f64),
        ValueTag::U32 | ValueTag::IntPtr => (u32::MIN as f64, u32::MAX as f64),
        ValueTag::I64 => (i64::MIN as f64, i64::MAX as f64),
        ValueTag::U64 => (u64::MIN as f64, u64::MAX as f64),
        _ => return Err(InterpError::type_error(format!("{target} is not an integer tag"))),
    };
    if wide.is_nan() || wide < lo || wide > hi {
        return Err(InterpError::arithmetic(format!(
            "value {wide} does not fit in {target}"
        )));
    }
    Ok(wide as i64)
}

pub fn cast(value: &RuntimeValue, target: ValueTag, mem: &mut MemoryImage) -> Result<RuntimeValue, InterpError> {
    if value.tag() == target {
        return Ok(value.clone());
    }

    if target.is_reference_kind() {
        if value.is_null() {
            return Ok(RuntimeValue::Null(target));
        }
        if target == ValueTag::String {
            let text = to_display_string(value, mem)?;
            let addr = mem.alloc_string(&text)? as i64;
            return Ok(RuntimeValue::String(addr));
        }
        if value.tag() != target && target != ValueTag::Object {
            return Err(InterpError::type_error(format!(
                "cannot cast {} to {target}",
                value.tag()
            )));
        }
        return Ok(value.clone());
    }

    match target {
        ValueTag::Bool => Ok(RuntimeValue::Bool(match value {
            RuntimeValue::Bool(b) => *b,
            RuntimeValue::Int { value, .. } => *value != 0,
            RuntimeValue::Float { value, .. } => *value != 0.0,
            _ => return Err(InterpError::type_error(format!("cannot cast {} to bool", value.tag()))),
        })),
        ValueTag::Char => Ok(RuntimeValue::Char(match value {
            RuntimeValue::Char(c) => *c,
            RuntimeValue::Int { value, .. } => {
                char::from_u32(*value as u32).ok_or_else(|| InterpError::arithmetic("invalid char value"))?
            }
            _ => return Err(InterpError::type_error(format!("cannot cast {} to char", value.tag()))),
        })),
        ValueTag::Float | ValueTag::Double | ValueTag::Decimal => {
            let wide = value
                .as_float()
                .ok_or_else(|| InterpError::type_error(format!("cannot cast {} to {target}", value.tag())))?;
            Ok(RuntimeValue::float(wide, target))
        }
        ValueTag::I8 | ValueTag::U8 | ValueTag::I16 | ValueTag::U16 | ValueTag::I32 | ValueTag::U32
        | ValueTag::I64 | ValueTag::U64 => {
            let wide = match value {
                RuntimeValue::Float { value, .. } => *value,
                RuntimeValue::Char(c) => *c as i64 as f64,
                RuntimeValue::Bool(b) => {
                    if *b {
                        1.0
                    } else {
                        0.0
                    }
                }
                _ => value
                    .as_int()
                    .ok_or_else(|| InterpError::type_error(format!("cannot cast {} to {target}", value.tag())))?
                    as f64,
            };
            Ok(RuntimeValue::int(checked_narrow(wide, target)?, target))
        }
        ValueTag::IntPtr => {
            let wide = value
                .as_int()
                .ok_or_else(|| InterpError::type_error(format!("cannot cast {} to IntPtr", value.tag())))?;
            Ok(RuntimeValue::IntPtr(wide as i32 as i64))
        }
        _ => Err(InterpError::type_error(format!("unsupported cast target {target}"))),
    }
}

/// Unchecked integer-family conversion used when binding an arithmetic
/// right-hand operand to the left operand's tag. Unlike [`cast`], this wraps
/// rather than rejecting overflow.
pub fn coerce_for_arithmetic(value: &RuntimeValue, target: ValueTag) -> RuntimeValue {
    if value.tag() == target {
        return value.clone();
    }
    if target.is_floating() {
        return RuntimeValue::float(value.as_float().unwrap_or(0.0), target);
    }
    if target.is_integer() || target == ValueTag::Char {
        let wide = value.as_int().unwrap_or_else(|| value.as_float().unwrap_or(0.0) as i64);
        let wrapped = wrap_to_tag(wide, target);
        return RuntimeValue::int(wrapped, target);
    }
    value.clone()
}

pub fn wrap_to_tag(value: i64, tag: ValueTag) -> i64 {
    match tag {
        ValueTag::I8 => value as i8 as i64,
        ValueTag::U8 => value as u8 as i64,
        ValueTag::I16 => value as i16 as i64,
        ValueTag::U16 | ValueTag::Char => value as u16 as i64,
        ValueTag::I32 => value as i32 as i64,
        ValueTag::U32 | ValueTag::IntPtr => value as u32 as i64,
        ValueTag::I64 => value,
        ValueTag::U64 => value as u64 as i64,
        _ => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn narrowing_cast_rejects_overflow() {
        let v = RuntimeValue::int(300, ValueTag::I32);
        let mut mem = MemoryImage::new(0, 64);
        assert!(cast(&v, ValueTag::U8, &mut mem).is_err());
    }

    #[test]
    fn widening_cast_succeeds() {
        let v = RuntimeValue::int(10, ValueTag::I8);
        let mut mem = MemoryImage::new(0, 64);
        let out = cast(&v, ValueTag::I64, &mut mem).unwrap();
        assert_eq!(out.as_int(), Some(10));
    }

    #[test]
    fn to_string_target_always_succeeds() {
        let v = RuntimeValue::int(42, ValueTag::I32);
        let mut mem = MemoryImage::new(0, 64);
        let out = cast(&v, ValueTag::String, &mut mem).unwrap();
        let RuntimeValue::String(addr) = out else { panic!() };
        assert_eq!(mem.read_string(addr).unwrap(), "42");
    }

    #[test]
    fn arithmetic_coercion_wraps_instead_of_rejecting() {
        let v = RuntimeValue::int(300, ValueTag::I32);
        let coerced = coerce_for_arithmetic(&v, ValueTag::U8);
        assert_eq!(coerced.as_int(), Some(300i64 as u8 as i64));
    }
}
