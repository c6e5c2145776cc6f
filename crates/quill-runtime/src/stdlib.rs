//! Built-in native bindings: `print`, `Write`/`WriteLine`, `typeof`,
//! `sizeof`, `Length`/`Count`, `Add`, `ToString`, `Align`, `InRange`,
//! `GetTest`. Registered once at `Evaluator::run` entry, appended to the
//! same [`FunctionRegistry`] user functions live in — natives and user
//! overloads resolve through one algorithm, and the registry is append-only.

use std::rc::Rc;

use quill_core::ValueTag;

use crate::cast::to_display_string;
use crate::error::InterpError;
use crate::function::{Callable, FunctionRegistry, NativeFunction};
use crate::memory::{MemoryImage, NULL_ADDRESS};
use crate::value::RuntimeValue;

fn native(
    registry: &mut FunctionRegistry,
    name: &str,
    param_tags: Vec<ValueTag>,
    out_mask: Vec<bool>,
    is_params_last: bool,
    func: impl Fn(&mut [RuntimeValue], &mut MemoryImage) -> Result<RuntimeValue, InterpError> + 'static,
) {
    registry.register(
        name,
        Callable::Native(NativeFunction { param_tags, out_mask, is_params_last, func: Rc::new(func) }),
    );
}

/// Resolves `^k`-from-end / omitted-bound slice indices against `len`.
/// Bounds are half-open `[start, end)`; `^k` means `length - k`, applied
/// uniformly to strings and arrays.
fn resolve_bound(value: Option<i64>, len: i64, default: i64) -> i64 {
    match value {
        None => default,
        Some(v) if v < 0 => (len + v).clamp(0, len),
        Some(v) => v.clamp(0, len),
    }
}

pub fn register(registry: &mut FunctionRegistry, console_output: bool) {
    native(registry, "print", vec![ValueTag::Object], Vec::new(), true, move |args, mem| {
        let mut line = String::new();
        for (i, a) in args.iter().enumerate() {
            if i > 0 {
                line.push(' ');
            }
            line.push_str(&to_display_string(a, mem)?);
        }
        if console_output {
            println!("{line}");
        }
        tracing::trace!(%line, "print");
        Ok(RuntimeValue::Void)
    });

    native(registry, "Write", vec![ValueTag::Object], Vec::new(), true, move |args, mem| {
        let mut out = String::new();
        for a in args {
            out.push_str(&to_display_string(a, mem)?);
        }
        if console_output {
            print!("{out}");
        }
        Ok(RuntimeValue::Void)
    });

    native(registry, "WriteLine", vec![ValueTag::Object], Vec::new(), true, move |args, mem| {
        let mut out = String::new();
        for a in args {
            out.push_str(&to_display_string(a, mem)?);
        }
        if console_output {
            println!("{out}");
        }
        Ok(RuntimeValue::Void)
    });

    native(registry, "typeof", vec![ValueTag::Object], vec![false], false, |args, mem| {
        let text = args[0].tag().to_string();
        let addr = mem.alloc_string(&text)?;
        Ok(RuntimeValue::String(addr as i64))
    });

    native(registry, "sizeof", vec![ValueTag::Object], vec![false], false, |args, _mem| {
        Ok(RuntimeValue::int(args[0].tag().size_of() as i64, ValueTag::I32))
    });

    native(registry, "Length", vec![ValueTag::Object], vec![false], false, |args, mem| length_of(&args[0], mem));
    native(registry, "Count", vec![ValueTag::Object], vec![false], false, |args, mem| length_of(&args[0], mem));

    native(registry, "Add", vec![ValueTag::Array, ValueTag::Object], vec![true, false], false, |args, mem| {
        let RuntimeValue::Array { addr, element_tag } = args[0] else {
            return Err(InterpError::type_error("Add requires an array"));
        };
        let old_len = if addr == NULL_ADDRESS { 0 } else { mem.array_length(addr)? };
        let new_addr = mem.alloc_array(element_tag, old_len + 1)? as i64;
        for i in 0..old_len {
            let elem_addr = addr + (i as i64) * element_tag.size_of() as i64;
            let bytes = mem.read_bytes(elem_addr, element_tag.size_of())?.to_vec();
            mem.write_bytes(new_addr + (i as i64) * element_tag.size_of() as i64, &bytes)?;
        }
        let tail_addr = new_addr + (old_len as i64) * element_tag.size_of() as i64;
        write_elem(mem, tail_addr, element_tag, &args[1])?;
        if addr != NULL_ADDRESS {
            mem.free(addr)?;
        }
        args[0] = RuntimeValue::Array { addr: new_addr, element_tag };
        Ok(RuntimeValue::Void)
    });

    native(registry, "ToString", vec![ValueTag::Object], vec![false], false, |args, mem| {
        let text = to_display_string(&args[0], mem)?;
        let addr = mem.alloc_string(&text)?;
        Ok(RuntimeValue::String(addr as i64))
    });

    native(registry, "Align", vec![ValueTag::Object, ValueTag::I32], vec![false, false], false, |args, mem| {
        let text = to_display_string(&args[0], mem)?;
        let width = args[1].as_int().unwrap_or(0);
        let w = width.unsigned_abs() as usize;
        let padded = if text.chars().count() >= w {
            text
        } else {
            let pad = " ".repeat(w - text.chars().count());
            if width < 0 {
                format!("{text}{pad}")
            } else {
                format!("{pad}{text}")
            }
        };
        let addr = mem.alloc_string(&padded)?;
        Ok(RuntimeValue::String(addr as i64))
    });

    native(
        registry,
        "InRange",
        vec![ValueTag::Object, ValueTag::I32, ValueTag::I32],
        vec![false, false, false],
        true,
        |args, mem| {
            let len = match &args[0] {
                RuntimeValue::String(addr) if *addr != NULL_ADDRESS => mem.read_string(*addr)?.chars().count() as i64,
                RuntimeValue::Array { addr, .. } if *addr != NULL_ADDRESS => mem.array_length(*addr)? as i64,
                _ => return Err(InterpError::type_error("InRange requires a string or array")),
            };
            let start = resolve_bound(args.get(1).and_then(|v| v.as_int()), len, 0);
            let end = resolve_bound(args.get(2).and_then(|v| v.as_int()), len, len);
            Ok(RuntimeValue::Bool(start <= end && start >= 0 && end <= len))
        },
    );

    native(registry, "GetTest", Vec::new(), Vec::new(), false, |_args, mem| {
        let addr = mem.alloc_string("test")?;
        Ok(RuntimeValue::String(addr as i64))
    });
}

fn length_of(value: &RuntimeValue, mem: &MemoryImage) -> Result<RuntimeValue, InterpError> {
    let len = match value {
        RuntimeValue::String(addr) => {
            if *addr == NULL_ADDRESS {
                0
            } else {
                mem.read_string(*addr)?.chars().count() as i64
            }
        }
        RuntimeValue::Array { addr, .. } => {
            if *addr == NULL_ADDRESS {
                0
            } else {
                mem.array_length(*addr)? as i64
            }
        }
        _ => return Err(InterpError::type_error("Length/Count requires a string or array")),
    };
    Ok(RuntimeValue::int(len, ValueTag::I32))
}

fn write_elem(mem: &mut MemoryImage, addr: i64, tag: ValueTag, value: &RuntimeValue) -> Result<(), InterpError> {
    if tag.is_floating() {
        mem.write_f64(addr, tag, value.as_float().unwrap_or(0.0))
    } else if tag == ValueTag::Bool {
        mem.write_i64(addr, tag, value.as_bool().unwrap_or(false) as i64)
    } else if tag.is_integer() || tag == ValueTag::Char || tag == ValueTag::IntPtr {
        mem.write_i64(addr, tag, value.as_int().unwrap_or(0))
    } else {
        let raw = match value {
            RuntimeValue::String(a) => *a,
            RuntimeValue::Array { addr, .. } => *addr,
            RuntimeValue::Object { addr, .. } => *addr,
            RuntimeValue::Pointer { addr, .. } => *addr,
            _ => NULL_ADDRESS,
        };
        mem.write_i64(addr, tag, raw)
    }
}
