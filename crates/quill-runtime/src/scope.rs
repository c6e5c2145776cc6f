//! Scoped symbol table: a stack of `name → Variable` maps, each recording the
//! stack `allocPointer` checkpoint it entered with.

use std::collections::HashMap;

use crate::error::InterpError;
use crate::memory::Variable;

pub const MAX_LIVE_SCOPES: usize = 1024;
pub const MAX_LIVE_VARIABLES: usize = 2048;

pub struct Scope {
    vars: HashMap<String, Variable>,
    checkpoint: u32,
}

impl Scope {
    pub fn new(checkpoint: u32) -> Self {
        Scope {
            vars: HashMap::new(),
            checkpoint,
        }
    }
}

pub struct ScopeStack {
    scopes: Vec<Scope>,
    total_variables: usize,
}

impl ScopeStack {
    pub fn new() -> Self {
        ScopeStack {
            scopes: Vec::new(),
            total_variables: 0,
        }
    }

    pub fn push(&mut self, checkpoint: u32) -> Result<(), InterpError> {
        if self.scopes.len() >= MAX_LIVE_SCOPES {
            return Err(InterpError::stack_overflow("too many live scopes"));
        }
        self.scopes.push(Scope::new(checkpoint));
        Ok(())
    }

    /// Pop the innermost scope, returning its checkpoint so the caller can
    /// restore the memory image's `alloc_pointer`.
    pub fn pop(&mut self) -> u32 {
        let scope = self.scopes.pop().expect("pop on empty scope stack");
        self.total_variables -= scope.vars.len();
        scope.checkpoint
    }

    pub fn declare(&mut self, name: &str, var: Variable) -> Result<(), InterpError> {
        if self.total_variables >= MAX_LIVE_VARIABLES {
            return Err(InterpError::out_of_memory("too many live variables"));
        }
        let scope = self.scopes.last_mut().expect("declare with no active scope");
        if scope.vars.insert(name.to_string(), var).is_none() {
            self.total_variables += 1;
        }
        Ok(())
    }

    /// Resolve a name, innermost scope first.
    pub fn resolve(&self, name: &str) -> Option<Variable> {
        self.scopes.iter().rev().find_map(|s| s.vars.get(name).copied())
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn total_variables(&self) -> usize {
        self.total_variables
    }

    /// All variables visible right now, used by the memory manager's mark
    /// phase at scope exit.
    pub fn all_live_variables(&self) -> impl Iterator<Item = Variable> + '_ {
        self.scopes.iter().flat_map(|s| s.vars.values().copied())
    }
}

impl Default for ScopeStack {
    fn default() -> Self {
        ScopeStack::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_core::ValueTag;

    #[test]
    fn inner_scope_shadows_outer() {
        let mut stack = ScopeStack::new();
        stack.push(0).unwrap();
        stack
            .declare("x", Variable { tag: ValueTag::I32, address: 0, size: 4 })
            .unwrap();
        stack.push(4).unwrap();
        stack
            .declare("x", Variable { tag: ValueTag::I32, address: 4, size: 4 })
            .unwrap();
        assert_eq!(stack.resolve("x").unwrap().address, 4);
        stack.pop();
        assert_eq!(stack.resolve("x").unwrap().address, 0);
    }

    #[test]
    fn pop_restores_checkpoint() {
        let mut stack = ScopeStack::new();
        stack.push(0).unwrap();
        stack.push(12).unwrap();
        assert_eq!(stack.pop(), 12);
    }
}
