//! Memory manager, execution context, and evaluator for the Quill
//! interpreter. [`Ast`] is the public facade: parse, hoist declarations,
//! walk the tree, return the last value produced.

pub mod cast;
pub mod context;
pub mod error;
pub mod evaluator;
pub mod function;
pub mod memory;
pub mod pattern;
pub mod scope;
pub mod stdlib;
pub mod types;
pub mod value;

pub use context::{CancellationToken, ExecutionContext};
pub use error::InterpError;
pub use evaluator::Evaluator;
pub use function::{Callable, NativeFn, NativeFunction};
pub use memory::MemoryImage;
pub use value::RuntimeValue;

const DEFAULT_STACK_SIZE: u32 = 64 * 1024;
const DEFAULT_HEAP_CAPACITY: u32 = 4 * 1024 * 1024;

/// Entry point named in the external-interfaces surface: owns an
/// [`ExecutionContext`] across calls so natives registered via
/// [`Ast::register_native`] survive to the next [`Ast::interpret`].
pub struct Ast {
    evaluator: Evaluator,
    pending_natives: Vec<(String, NativeFn)>,
}

impl Ast {
    pub fn new(cancellation: Option<CancellationToken>) -> Self {
        let ctx = ExecutionContext::new(DEFAULT_STACK_SIZE, DEFAULT_HEAP_CAPACITY, cancellation.unwrap_or_default());
        Ast { evaluator: Evaluator::new(ctx), pending_natives: Vec::new() }
    }

    /// Registers an external native under `name`, appended to the same
    /// registry user-defined overloads resolve through. Takes effect from
    /// the next [`Ast::interpret`] call (the registry is rebuilt with the
    /// standard library on every run).
    pub fn register_native(&mut self, name: &str, callable: NativeFn) {
        self.pending_natives.push((name.to_string(), callable));
    }

    pub fn interpret(
        &mut self,
        code: &str,
        console_output: bool,
        print_tree: bool,
    ) -> Result<Option<RuntimeValue>, InterpError> {
        let (program, diagnostics) = quill_compiler::parse(code);
        if let Some(first) = diagnostics.iter().find(|d| d.severity == quill_core::Severity::Error) {
            return Err(InterpError::Parse {
                message: first.message.clone(),
                where_: Some(first.span.into()),
            });
        }
        if print_tree {
            tracing::info!(tree = ?program, "parsed program");
        }
        self.evaluator.set_console_output(console_output);
        for (name, callable) in &self.pending_natives {
            self.evaluator.register_native(name, callable.clone());
        }
        self.evaluator.run(&program)
    }
}
