//! Execution context: the process-wide state owned by [`crate::Ast`] — scope
//! stack, function registry, call-depth counter, and cancellation token.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::InterpError;
use crate::function::FunctionRegistry;
use crate::memory::MemoryImage;
use crate::scope::ScopeStack;

pub const MAX_CALL_DEPTH: usize = 512;

/// Cooperative cancellation signal, polled at statement boundaries and loop
/// tops. An atomic flag checked cooperatively rather than a preemptive
/// timer, so cancellation only interrupts at well-defined points instead
/// of mid-instruction.
#[derive(Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        CancellationToken { flag: Arc::new(AtomicBool::new(false)) }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

pub struct ExecutionContext {
    pub memory: MemoryImage,
    pub scopes: ScopeStack,
    pub functions: FunctionRegistry,
    pub call_depth: usize,
    pub cancellation: CancellationToken,
}

impl ExecutionContext {
    pub fn new(stack_size: u32, heap_capacity: u32, cancellation: CancellationToken) -> Self {
        ExecutionContext {
            memory: MemoryImage::new(stack_size, heap_capacity),
            scopes: ScopeStack::new(),
            functions: FunctionRegistry::new(),
            call_depth: 0,
            cancellation,
        }
    }

    /// Run at every statement boundary and loop-iteration top: raises
    /// `Cancelled` if the token fired, and enforces the scope/variable
    /// population caps.
    pub fn check(&self) -> Result<(), InterpError> {
        if self.cancellation.is_cancelled() {
            tracing::info!("cancellation token signaled; aborting evaluation");
            return Err(InterpError::Cancelled);
        }
        if self.scopes.depth() >= crate::scope::MAX_LIVE_SCOPES {
            return Err(InterpError::stack_overflow("too many live scopes"));
        }
        if self.scopes.total_variables() >= crate::scope::MAX_LIVE_VARIABLES {
            return Err(InterpError::out_of_memory("too many live variables"));
        }
        Ok(())
    }

    /// Push a new scope at the current allocation pointer, run `body`, then
    /// pop the scope, restore the stack pointer, and sweep the heap — the
    /// only reclamation event for heap blocks.
    pub fn with_scope<T>(
        &mut self,
        body: impl FnOnce(&mut Self) -> Result<T, InterpError>,
    ) -> Result<T, InterpError> {
        let checkpoint = self.memory.alloc_pointer();
        self.scopes.push(checkpoint)?;
        let result = body(self);
        let checkpoint = self.scopes.pop();
        let live: Vec<_> = self.scopes.all_live_variables().collect();
        self.memory.sweep(live);
        self.memory.restore_alloc_pointer(checkpoint);
        result
    }

    pub fn enter_call(&mut self) -> Result<(), InterpError> {
        if self.call_depth >= MAX_CALL_DEPTH {
            return Err(InterpError::stack_overflow("call depth exceeded"));
        }
        self.call_depth += 1;
        Ok(())
    }

    pub fn exit_call(&mut self) {
        self.call_depth -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_token_starts_clear() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
        token.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn with_scope_restores_alloc_pointer_on_exit() {
        let mut ctx = ExecutionContext::new(64, 64, CancellationToken::new());
        let before = ctx.memory.alloc_pointer();
        ctx.with_scope(|ctx| {
            ctx.memory.stackalloc(quill_core::ValueTag::I32).unwrap();
            Ok::<_, InterpError>(())
        })
        .unwrap();
        assert_eq!(ctx.memory.alloc_pointer(), before);
    }

    #[test]
    fn call_depth_cap_enforced() {
        let mut ctx = ExecutionContext::new(64, 64, CancellationToken::new());
        for _ in 0..MAX_CALL_DEPTH {
            ctx.enter_call().unwrap();
        }
        assert!(ctx.enter_call().is_err());
    }
}
