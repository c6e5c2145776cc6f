//! The evaluator: one behavior per AST node variant.
//!
//! Dispatch is a single evaluate-by-match over [`Expr`]/[`Stmt`] node kinds,
//! a tree walk rather than a flat instruction tape, since Quill has no
//! separate bytecode stage.

use std::collections::HashMap;
use std::rc::Rc;

use quill_compiler::ast::{
    Arg, AssignOp, BinOp, Block, CatchClause, Expr, ForEachBinding, FunctionDecl, IndexKind,
    InterpolationPart, Item, ParamMode, Pattern, Program, Stmt, SwitchArm, UnOp,
};
use quill_core::ValueTag;

use crate::cast::{cast, coerce_for_arithmetic, to_display_string, wrap_to_tag};
use crate::context::ExecutionContext;
use crate::error::InterpError;
use crate::function::{user_function_from_decl, Callable, NativeFn, NativeFunction};
use crate::memory::{Variable, NULL_ADDRESS};
use crate::pattern;
use crate::types::{EnumLayout, TypeLayout};
use crate::value::RuntimeValue;

/// What a statement handed back up the call stack: whether execution should
/// keep going, or unwind for a `break`/`continue`/`return`/`goto`.
pub enum Signal {
    Proceed,
    Break,
    Continue,
    Return(Option<RuntimeValue>),
}

fn signed_min(tag: ValueTag) -> Option<i64> {
    match tag {
        ValueTag::I8 => Some(i8::MIN as i64),
        ValueTag::I16 => Some(i16::MIN as i64),
        ValueTag::I32 => Some(i32::MIN as i64),
        ValueTag::I64 => Some(i64::MIN),
        _ => None,
    }
}

fn default_value(tag: ValueTag) -> RuntimeValue {
    match tag {
        ValueTag::Bool => RuntimeValue::Bool(false),
        ValueTag::Char => RuntimeValue::Char('\0'),
        t if t.is_floating() => RuntimeValue::float(0.0, t),
        t if t.is_integer() => RuntimeValue::int(0, t),
        ValueTag::IntPtr => RuntimeValue::IntPtr(0),
        ValueTag::String => RuntimeValue::Null(ValueTag::String),
        ValueTag::Array => RuntimeValue::Null(ValueTag::Array),
        other => RuntimeValue::Null(other),
    }
}

fn extract_address(value: &RuntimeValue) -> i64 {
    match value {
        RuntimeValue::String(a) => *a,
        RuntimeValue::IntPtr(a) => *a,
        RuntimeValue::Array { addr, .. } => *addr,
        RuntimeValue::Object { addr, .. } => *addr,
        RuntimeValue::Pointer { addr, .. } => *addr,
        _ => NULL_ADDRESS,
    }
}

fn type_name_of(ty: &quill_compiler::ast::TypeRef) -> &str {
    &ty.name
}

/// An uncaught `throw` carries a plain `String` message, with no
/// exception-type hierarchy; the evaluator maps it to [`InterpError::Type`]
/// since `InterpError` has no dedicated thrown-value kind, and a `catch`
/// clause unwraps the message text back out.
const THROWN_MARKER: &str = "__thrown__:";

fn thrown(message: String) -> InterpError {
    InterpError::type_error(format!("{THROWN_MARKER}{message}"))
}

fn thrown_message(err: &InterpError) -> Option<String> {
    if let InterpError::Type { message, .. } = err {
        message.strip_prefix(THROWN_MARKER).map(|s| s.to_string())
    } else {
        None
    }
}

/// What `goto case`/`goto default` is jumping toward, carried on the
/// evaluator as a side channel since the `__goto_case__` sentinel error that
/// propagates the jump can't hold a `RuntimeValue` itself.
enum PendingGoto {
    Case(RuntimeValue),
    Default,
}

pub struct Evaluator {
    pub ctx: ExecutionContext,
    type_layouts: HashMap<String, Rc<TypeLayout>>,
    enums: HashMap<String, Rc<EnumLayout>>,
    /// Side table from heap address to declared type name, since a struct's
    /// heap block header only stores the generic `Struct`/`Class` tag, not
    /// which concrete type was allocated there.
    object_types: HashMap<i64, String>,
    /// Side table from heap address to element values, mirroring
    /// `object_types`: a boxed `Tuple`'s block header only carries the
    /// generic `Tuple` tag, not its element values or arity.
    tuple_values: HashMap<i64, Vec<RuntimeValue>>,
    pending_goto: Option<PendingGoto>,
    console_output: bool,
}

impl Evaluator {
    pub fn new(ctx: ExecutionContext) -> Self {
        Evaluator {
            ctx,
            type_layouts: HashMap::new(),
            enums: HashMap::new(),
            object_types: HashMap::new(),
            tuple_values: HashMap::new(),
            pending_goto: None,
            console_output: false,
        }
    }

    pub fn set_console_output(&mut self, on: bool) {
        self.console_output = on;
    }

    /// Registers an externally-supplied native under `name`, accepting any
    /// arity/argument types: modeled as a single `params`-style `Object`
    /// parameter so [`crate::function::FunctionRegistry::resolve`] always
    /// finds it (score 1 per argument, never rejected).
    pub fn register_native(&mut self, name: &str, callable: NativeFn) {
        self.ctx.functions.register(
            name,
            Callable::Native(NativeFunction {
                param_tags: vec![ValueTag::Object],
                out_mask: Vec::new(),
                is_params_last: true,
                func: callable,
            }),
        );
    }

    // --- top level ----------------------------------------------------------

    pub fn run(&mut self, program: &Program) -> Result<Option<RuntimeValue>, InterpError> {
        crate::stdlib::register(&mut self.ctx.functions, self.console_output);
        self.hoist_items(&program.items);

        let stmts: Vec<&Stmt> =
            program.items.iter().filter_map(|i| if let Item::Statement(s) = i { Some(s) } else { None }).collect();

        let mut last_value: Option<RuntimeValue> = None;
        let outcome = self.with_scope(|ev| {
            for stmt in &stmts {
                if let Stmt::Expr(e) = stmt {
                    last_value = Some(ev.eval_expr(e)?);
                    continue;
                }
                match ev.exec_stmt(stmt)? {
                    Signal::Return(v) => return Ok(Some(v)),
                    Signal::Proceed => {}
                    Signal::Break | Signal::Continue => {
                        return Err(InterpError::type_error("break/continue outside a loop"));
                    }
                }
            }
            Ok(None)
        })?;

        match outcome {
            Some(returned) => Ok(returned),
            None => Ok(last_value),
        }
    }

    fn hoist_items(&mut self, items: &[Item]) {
        for item in items {
            match item {
                Item::Function(decl) => {
                    self.ctx.functions.register(
                        &decl.name,
                        Callable::User(user_function_from_decl(Rc::new(decl.clone()))),
                    );
                }
                Item::Struct(decl) => {
                    self.type_layouts.insert(decl.name.clone(), Rc::new(TypeLayout::from_struct(decl)));
                }
                Item::Class(decl) => {
                    self.type_layouts.insert(decl.name.clone(), Rc::new(TypeLayout::from_class(decl)));
                }
                Item::Enum(decl) => {
                    let layout = EnumLayout::from_decl(decl, |e| eval_const_i64(e));
                    self.enums.insert(decl.name.clone(), Rc::new(layout));
                }
                Item::Namespace(ns) => self.hoist_items(&ns.items),
                Item::Using(_) | Item::Interface(_) | Item::Statement(_) => {}
            }
        }
    }

    // --- scope helper ---------------------------------------------------

    fn with_scope<T>(&mut self, body: impl FnOnce(&mut Self) -> Result<T, InterpError>) -> Result<T, InterpError> {
        let checkpoint = self.ctx.memory.alloc_pointer();
        self.ctx.scopes.push(checkpoint)?;
        let result = body(self);
        let checkpoint = self.ctx.scopes.pop();
        let live: Vec<_> = self.ctx.scopes.all_live_variables().collect();
        self.ctx.memory.sweep(live);
        self.ctx.memory.restore_alloc_pointer(checkpoint);
        result
    }

    // --- statements -------------------------------------------------------

    fn exec_block(&mut self, block: &Block) -> Result<Signal, InterpError> {
        self.with_scope(|ev| ev.exec_stmt_list(&block.stmts))
    }

    /// Executes a statement list with goto/label support: the list is
    /// scanned once for `LabelNode`s up front so `goto L` can jump the
    /// instruction pointer.
    fn exec_stmt_list(&mut self, stmts: &[Stmt]) -> Result<Signal, InterpError> {
        let mut labels: HashMap<&str, usize> = HashMap::new();
        for (i, s) in stmts.iter().enumerate() {
            if let Stmt::Label { name, .. } = s {
                labels.insert(name.as_str(), i);
            }
        }

        let mut ip = 0usize;
        while ip < stmts.len() {
            self.ctx.check()?;
            match self.exec_stmt(&stmts[ip]) {
                Ok(Signal::Proceed) => ip += 1,
                Ok(other) => return Ok(other),
                Err(err) => {
                    if let Some(label) = goto_target(&err) {
                        if let Some(&target) = labels.get(label.as_str()) {
                            ip = target;
                            continue;
                        }
                    }
                    // Not a goto, or a goto whose label isn't in this list:
                    // propagate unchanged so an enclosing statement list can
                    // try to resolve it.
                    return Err(err);
                }
            }
        }
        Ok(Signal::Proceed)
    }

    fn exec_stmt(&mut self, stmt: &Stmt) -> Result<Signal, InterpError> {
        match stmt {
            Stmt::Empty { .. } | Stmt::Label { .. } => Ok(Signal::Proceed),
            Stmt::Expr(e) => {
                self.eval_expr(e)?;
                Ok(Signal::Proceed)
            }
            Stmt::VarDecl(decl) => {
                self.exec_var_decl(decl)?;
                Ok(Signal::Proceed)
            }
            Stmt::Block(b) => self.exec_block(b),
            Stmt::If { cond, then_branch, else_branch, .. } => {
                self.with_scope(|ev| {
                    let truthy = ev.eval_condition(cond)?;
                    if truthy {
                        ev.exec_stmt(then_branch)
                    } else if let Some(else_b) = else_branch {
                        ev.exec_stmt(else_b)
                    } else {
                        Ok(Signal::Proceed)
                    }
                })
            }
            Stmt::While { cond, body, .. } => {
                loop {
                    self.ctx.check()?;
                    let truthy = self.with_scope(|ev| ev.eval_condition(cond))?;
                    if !truthy {
                        break;
                    }
                    match self.exec_stmt(body)? {
                        Signal::Break => break,
                        Signal::Continue | Signal::Proceed => {}
                        ret @ Signal::Return(_) => return Ok(ret),
                    }
                }
                Ok(Signal::Proceed)
            }
            Stmt::DoWhile { body, cond, .. } => {
                loop {
                    match self.exec_stmt(body)? {
                        Signal::Break => break,
                        Signal::Continue | Signal::Proceed => {}
                        ret @ Signal::Return(_) => return Ok(ret),
                    }
                    self.ctx.check()?;
                    let truthy = self.with_scope(|ev| ev.eval_condition(cond))?;
                    if !truthy {
                        break;
                    }
                }
                Ok(Signal::Proceed)
            }
            Stmt::For { init, cond, step, body, .. } => self.with_scope(|ev| {
                if let Some(init) = init {
                    ev.exec_stmt(init)?;
                }
                loop {
                    ev.ctx.check()?;
                    if let Some(cond) = cond {
                        if !ev.eval_condition(cond)? {
                            break;
                        }
                    }
                    match ev.exec_stmt(body)? {
                        Signal::Break => break,
                        Signal::Continue | Signal::Proceed => {}
                        ret @ Signal::Return(_) => return Ok(ret),
                    }
                    for e in step {
                        ev.eval_expr(e)?;
                    }
                }
                Ok(Signal::Proceed)
            }),
            Stmt::ForEach { binding, iterable, body, .. } => self.with_scope(|ev| {
                let iter_value = ev.eval_expr(iterable)?;
                let (addr, elem_tag, len) = match iter_value {
                    RuntimeValue::Array { addr, element_tag } if addr != NULL_ADDRESS => {
                        (addr, element_tag, ev.ctx.memory.array_length(addr)?)
                    }
                    _ => return Err(InterpError::type_error("foreach requires a non-null array")),
                };
                for i in 0..len {
                    ev.ctx.check()?;
                    let elem = ev.read_array_elem(addr, elem_tag, i)?;
                    let signal = ev.with_scope(|inner| {
                        inner.bind_foreach_binding(binding, &elem)?;
                        inner.exec_stmt(body)
                    })?;
                    match signal {
                        Signal::Break => break,
                        Signal::Continue | Signal::Proceed => {}
                        ret @ Signal::Return(_) => return Ok(ret),
                    }
                }
                Ok(Signal::Proceed)
            }),
            Stmt::Switch { scrutinee, arms, .. } => self.exec_switch(scrutinee, arms),
            Stmt::Using { decl, body, .. } => self.exec_using(decl, body),
            Stmt::Try { body, catches, finally, .. } => self.exec_try(body, catches, finally.as_ref()),
            Stmt::Throw { value, .. } => {
                let message = match value {
                    Some(e) => {
                        let v = self.eval_expr(e)?;
                        to_display_string(&v, &self.ctx.memory)?
                    }
                    None => "exception".to_string(),
                };
                Err(thrown(message))
            }
            Stmt::Return { value, .. } => {
                let v = match value {
                    Some(e) => Some(self.eval_expr(e)?),
                    None => None,
                };
                Ok(Signal::Return(v))
            }
            Stmt::Break { .. } => Ok(Signal::Break),
            Stmt::Continue { .. } => Ok(Signal::Continue),
            Stmt::Goto { label, .. } => Err(InterpError::unresolved(format!("__goto__:{label}"))),
            Stmt::GotoCase { value, .. } => {
                let v = self.eval_expr(value)?;
                self.pending_goto = Some(PendingGoto::Case(v));
                Err(InterpError::unresolved("__goto_case__".to_string()))
            }
            Stmt::GotoDefault { .. } => {
                self.pending_goto = Some(PendingGoto::Default);
                Err(InterpError::unresolved("__goto_case__".to_string()))
            }
            Stmt::Function(decl) => {
                self.ctx.functions.register(&decl.name, Callable::User(user_function_from_decl(Rc::new(decl.clone()))));
                Ok(Signal::Proceed)
            }
        }
    }

    fn eval_condition(&mut self, cond: &Expr) -> Result<bool, InterpError> {
        let v = self.eval_expr(cond)?;
        v.as_bool()
            .ok_or_else(|| InterpError::type_error(format!("condition must be bool, found {}", v.tag())))
    }

    fn exec_var_decl(&mut self, decl: &quill_compiler::ast::VarDecl) -> Result<(), InterpError> {
        let value = match &decl.init {
            Some(e) => self.eval_expr(e)?,
            None => match &decl.ty {
                Some(ty) => default_value(ValueTag::from_type_name(&ty.name).unwrap_or(ValueTag::Object)),
                None => RuntimeValue::Null(ValueTag::Object),
            },
        };
        let tag = match &decl.ty {
            Some(ty) if ty.name != "var" => ValueTag::from_type_name(&ty.name).unwrap_or(value.tag()),
            _ => value.tag(),
        };
        let var = self.ctx.memory.stackalloc(tag)?;
        self.init_variable(var, &value)?;
        self.ctx.scopes.declare(&decl.name, var)?;
        Ok(())
    }

    fn bind_foreach_binding(&mut self, binding: &ForEachBinding, elem: &RuntimeValue) -> Result<(), InterpError> {
        match binding {
            ForEachBinding::Single(name) => {
                let var = self.ctx.memory.stackalloc(elem.tag())?;
                self.init_variable(var, elem)?;
                self.ctx.scopes.declare(name, var)?;
                Ok(())
            }
            ForEachBinding::Tuple(names) => {
                let RuntimeValue::Tuple(values) = elem else {
                    return Err(InterpError::type_error("foreach tuple binding requires a tuple element"));
                };
                if values.len() != names.len() {
                    return Err(InterpError::type_error("tuple deconstruction arity mismatch"));
                }
                for (name, v) in names.iter().zip(values.iter()) {
                    let var = self.ctx.memory.stackalloc(v.tag())?;
                    self.init_variable(var, v)?;
                    self.ctx.scopes.declare(name, var)?;
                }
                Ok(())
            }
        }
    }

    /// Runs `arms` in source order starting at `scrutinee`'s matching arm,
    /// resuming from a different arm each time a `goto case`/`goto default`
    /// sentinel bubbles up from inside the running arm's body.
    fn exec_switch(&mut self, scrutinee: &Expr, arms: &[SwitchArm]) -> Result<Signal, InterpError> {
        let value = self.eval_expr(scrutinee)?;
        let mut start = None;
        for (i, arm) in arms.iter().enumerate() {
            if self.try_switch_arm(&value, arm)? {
                start = Some(i);
                break;
            }
        }
        let Some(mut i) = start else { return Ok(Signal::Proceed) };
        loop {
            match self.with_scope(|ev| ev.exec_stmt_list(&arms[i].body)) {
                Ok(signal) => return Ok(signal),
                Err(err) if is_goto_case(&err) => {
                    let target = self.pending_goto.take();
                    i = self.resolve_case_target(arms, target)?;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Resolves a pending `goto case <value>`/`goto default` against the
    /// arm list the way `exec_stmt_list`'s label map resolves a plain
    /// `goto`: `goto case` compares against each `Pattern::Constant`,
    /// `goto default` takes the wildcard arm.
    fn resolve_case_target(&mut self, arms: &[SwitchArm], target: Option<PendingGoto>) -> Result<usize, InterpError> {
        match target {
            Some(PendingGoto::Default) => arms
                .iter()
                .position(|arm| matches!(arm.pattern, Pattern::Wildcard { .. }))
                .ok_or_else(|| InterpError::unresolved("goto default: no default case in this switch")),
            Some(PendingGoto::Case(value)) => {
                for (i, arm) in arms.iter().enumerate() {
                    if let Pattern::Constant { value: pat_expr, .. } = &arm.pattern {
                        let pat_value = self.eval_expr(pat_expr)?;
                        if values_equal(&pat_value, &value, &self.ctx.memory)? {
                            return Ok(i);
                        }
                    }
                }
                Err(InterpError::unresolved("goto case: no matching case in this switch"))
            }
            None => Err(InterpError::unresolved("goto case: no pending target")),
        }
    }

    fn try_switch_arm(&mut self, value: &RuntimeValue, arm: &SwitchArm) -> Result<bool, InterpError> {
        let result = pattern::matches(&arm.pattern, value, &mut |e| self.eval_expr(e))?;
        if !result.matched {
            return Ok(false);
        }
        if let Some(guard) = &arm.guard {
            let matched = self.with_scope(|ev| {
                for (name, bound) in &result.bindings {
                    let var = ev.ctx.memory.stackalloc(bound.tag())?;
                    ev.init_variable(var, bound)?;
                    ev.ctx.scopes.declare(name, var)?;
                }
                ev.eval_condition(guard)
            })?;
            return Ok(matched);
        }
        Ok(true)
    }

    fn exec_try(
        &mut self,
        body: &Block,
        catches: &[CatchClause],
        finally: Option<&Block>,
    ) -> Result<Signal, InterpError> {
        let result = self.exec_block(body);
        let result = match result {
            Err(err) if !matches!(err, InterpError::Cancelled) => {
                let message = thrown_message(&err).unwrap_or_else(|| err.to_string());
                let mut handled = None;
                for clause in catches {
                    let matches_ty = clause
                        .exception_ty
                        .as_ref()
                        .map(|ty| ty.name == "Exception" || ty.name == "object")
                        .unwrap_or(true);
                    if matches_ty {
                        handled = Some(self.with_scope(|ev| {
                            if let Some(name) = &clause.binding {
                                let addr = ev.ctx.memory.alloc_string(&message)?;
                                let var = ev.ctx.memory.stackalloc(ValueTag::String)?;
                                ev.ctx.memory.write_i64(var.address as i64, ValueTag::String, addr as i64)?;
                                ev.ctx.scopes.declare(name, var)?;
                            }
                            ev.exec_stmt_list(&clause.body.stmts)
                        }));
                        break;
                    }
                }
                handled.unwrap_or(Err(err))
            }
            other => other,
        };

        if let Some(finally) = finally {
            if !matches!(result, Err(InterpError::Cancelled)) {
                self.exec_block(finally)?;
            }
        }
        result
    }

    /// `using (<decl>) <body>`: runs `body`, then disposes the resource
    /// bound by `decl` on every exit path, the same guarantee `exec_try`
    /// gives `finally` relative to `body`.
    fn exec_using(&mut self, decl: &Stmt, body: &Stmt) -> Result<Signal, InterpError> {
        self.with_scope(|ev| {
            let resource = match decl {
                Stmt::VarDecl(vd) => {
                    ev.exec_var_decl(vd)?;
                    ev.ctx.scopes.resolve(&vd.name).map(|var| ev.read_variable(var)).transpose()?
                }
                Stmt::Expr(e) => Some(ev.eval_expr(e)?),
                other => {
                    ev.exec_stmt(other)?;
                    None
                }
            };
            let result = ev.exec_stmt(body);
            if let Some(resource) = resource {
                let disposed = ev.dispose(&resource);
                if !matches!(result, Err(InterpError::Cancelled)) {
                    disposed?;
                }
            }
            result
        })
    }

    /// Invokes a zero-argument `Dispose` method on `resource` if its type
    /// declares one; a resource with no `Dispose` method or a null resource
    /// is left alone.
    fn dispose(&mut self, resource: &RuntimeValue) -> Result<(), InterpError> {
        if resource.is_null() {
            return Ok(());
        }
        let RuntimeValue::Object { type_name, .. } = resource else {
            return Ok(());
        };
        if let Some(layout) = self.type_layouts.get(type_name).cloned() {
            if let Some(overloads) = layout.methods.get("Dispose") {
                if let Some(decl) = overloads.iter().find(|m| m.params.is_empty()).cloned() {
                    self.call_method(resource, &decl, &[])?;
                }
            }
        }
        Ok(())
    }

    // --- lvalues ------------------------------------------------------------

    fn read_lvalue(&mut self, target: &Expr) -> Result<RuntimeValue, InterpError> {
        self.eval_expr(target)
    }

    fn write_lvalue(&mut self, target: &Expr, value: RuntimeValue) -> Result<(), InterpError> {
        match target {
            Expr::Ident { name, .. } => {
                let var = self
                    .ctx
                    .scopes
                    .resolve(name)
                    .ok_or_else(|| InterpError::unresolved(format!("unknown variable `{name}`")))?;
                self.write_variable(var, &value)
            }
            Expr::Index { target, index, .. } => {
                let base = self.eval_expr(target)?;
                match base {
                    RuntimeValue::Array { addr, element_tag } => {
                        let len = self.ctx.memory.array_length(addr)?;
                        let idx = self.resolve_single_index(index, len as i64)?;
                        self.bounds_check(idx, len)?;
                        self.write_array_elem(addr, element_tag, idx as u32, &value)
                    }
                    _ => Err(InterpError::type_error("index target is not an array")),
                }
            }
            Expr::Unary { op: UnOp::Deref, operand, .. } => {
                let ptr = self.eval_expr(operand)?;
                match ptr {
                    RuntimeValue::Pointer { addr, pointee_tag } => self.write_typed(addr, pointee_tag, &value),
                    _ => Err(InterpError::invalid_memory("dereference of a non-pointer value")),
                }
            }
            Expr::Member { target, name, .. } => {
                let base = self.eval_expr(target)?;
                self.write_field(&base, name, &value)
            }
            Expr::Tuple { elements, .. } => {
                let RuntimeValue::Tuple(values) = value else {
                    return Err(InterpError::type_error("cannot deconstruct a non-tuple value"));
                };
                if values.len() != elements.len() {
                    return Err(InterpError::type_error("tuple deconstruction arity mismatch"));
                }
                for (target_elem, v) in elements.iter().zip(values.into_iter()) {
                    self.write_lvalue(target_elem, v)?;
                }
                Ok(())
            }
            _ => Err(InterpError::type_error("expression is not a valid assignment target")),
        }
    }

    /// Resolves `IndexKind::Single`/`FromEnd` against `len` (the target's
    /// element or character count); a bare `^k` means `len - k`, the same
    /// from-end convention `InRange` resolves slice bounds with. A `Range`
    /// reaching here is a caller error — slices are read through
    /// `eval_slice`, never through a plain single-index path.
    fn resolve_single_index(&mut self, index: &IndexKind, len: i64) -> Result<i64, InterpError> {
        match index {
            IndexKind::Single(e) => {
                let raw = self.eval_expr(e)?;
                raw.as_int().ok_or_else(|| InterpError::type_error("array index must be an integer"))
            }
            IndexKind::FromEnd(e) => {
                let raw = self.eval_expr(e)?;
                let k = raw.as_int().ok_or_else(|| InterpError::type_error("array index must be an integer"))?;
                Ok(len - k)
            }
            IndexKind::Range { .. } => Err(InterpError::type_error("a slice cannot be used as a single index")),
        }
    }

    /// Resolves a half-open slice's bounds against `len`, applying the same
    /// "negative/omitted bound" convention `InRange`'s `resolve_bound` uses:
    /// an omitted bound defaults to the relevant end, a negative bound
    /// counts back from `len`.
    fn resolve_slice_bounds(&mut self, start: &Option<Box<Expr>>, end: &Option<Box<Expr>>, len: i64) -> Result<(i64, i64), InterpError> {
        let start = match start {
            Some(e) => Some(self.eval_expr(e)?.as_int().ok_or_else(|| InterpError::type_error("slice bound must be an integer"))?),
            None => None,
        };
        let end = match end {
            Some(e) => Some(self.eval_expr(e)?.as_int().ok_or_else(|| InterpError::type_error("slice bound must be an integer"))?),
            None => None,
        };
        let resolve = |bound: Option<i64>, default: i64| match bound {
            None => default,
            Some(v) if v < 0 => (len + v).clamp(0, len),
            Some(v) => v.clamp(0, len),
        };
        let start = resolve(start, 0);
        let end = resolve(end, len);
        if start > end {
            return Err(InterpError::index_out_of_range(format!(
                "slice start {start} is past its end {end}"
            )));
        }
        Ok((start, end))
    }

    fn bounds_check(&self, index: i64, len: u32) -> Result<(), InterpError> {
        if index < 0 || index as u32 >= len {
            return Err(InterpError::index_out_of_range(format!(
                "index {index} out of range for array of length {len}"
            )));
        }
        Ok(())
    }

    fn write_field(&mut self, base: &RuntimeValue, name: &str, value: &RuntimeValue) -> Result<(), InterpError> {
        let RuntimeValue::Object { addr, .. } = base else {
            return Err(InterpError::type_error("member access target is not an object"));
        };
        let type_name = self.object_types.get(addr).cloned().unwrap_or_default();
        let layout = self
            .type_layouts
            .get(&type_name)
            .cloned()
            .ok_or_else(|| InterpError::unresolved(format!("unknown type `{type_name}`")))?;
        let field = layout
            .field(name)
            .ok_or_else(|| InterpError::unresolved(format!("no field `{name}` on `{type_name}`")))?;
        self.write_typed(*addr + field.offset as i64, field.tag, value)
    }

    // --- typed memory access shared by variables/fields/array elements -----

    fn read_typed(&mut self, addr: i64, tag: ValueTag) -> Result<RuntimeValue, InterpError> {
        Ok(match tag {
            ValueTag::String => RuntimeValue::String(self.ctx.memory.read_i64(addr, ValueTag::String)?),
            t if t.is_floating() => RuntimeValue::float(self.ctx.memory.read_f64(addr, t)?, t),
            ValueTag::Bool => RuntimeValue::Bool(self.ctx.memory.read_i64(addr, ValueTag::Bool)? != 0),
            ValueTag::Char => {
                let raw = self.ctx.memory.read_i64(addr, ValueTag::Char)? as u32;
                RuntimeValue::Char(char::from_u32(raw).unwrap_or('\0'))
            }
            t if t.is_integer() => RuntimeValue::int(self.ctx.memory.read_i64(addr, t)?, t),
            ValueTag::IntPtr => RuntimeValue::IntPtr(self.ctx.memory.read_i64(addr, ValueTag::IntPtr)?),
            ValueTag::Array => {
                let a = self.ctx.memory.read_i64(addr, ValueTag::Array)?;
                let elem_tag = if a == NULL_ADDRESS {
                    ValueTag::Object
                } else {
                    self.ctx.memory.block_header(a)?.2
                };
                RuntimeValue::Array { addr: a, element_tag: elem_tag }
            }
            ValueTag::Reference => {
                let a = self.ctx.memory.read_i64(addr, ValueTag::Reference)?;
                RuntimeValue::Pointer { addr: a, pointee_tag: ValueTag::I32 }
            }
            ValueTag::Tuple => {
                let a = self.ctx.memory.read_i64(addr, ValueTag::Tuple)?;
                if a == NULL_ADDRESS {
                    RuntimeValue::Null(ValueTag::Tuple)
                } else {
                    RuntimeValue::Tuple(self.tuple_values.get(&a).cloned().unwrap_or_default())
                }
            }
            ValueTag::Object | ValueTag::Struct | ValueTag::Class => {
                let a = self.ctx.memory.read_i64(addr, tag)?;
                if a != NULL_ADDRESS && tag == ValueTag::Object {
                    let (_, _, boxed_tag) = self.ctx.memory.block_header(a)?;
                    if !boxed_tag.is_reference_kind() {
                        return self.read_typed(a, boxed_tag);
                    }
                }
                let type_name = self.object_types.get(&a).cloned().unwrap_or_default();
                RuntimeValue::Object { addr: a, tag, type_name }
            }
            other => {
                let a = self.ctx.memory.read_i64(addr, other)?;
                if a == NULL_ADDRESS {
                    RuntimeValue::Null(other)
                } else {
                    RuntimeValue::IntPtr(a)
                }
            }
        })
    }

    fn write_typed(&mut self, addr: i64, tag: ValueTag, value: &RuntimeValue) -> Result<(), InterpError> {
        match tag {
            ValueTag::String => {
                let existing = self.ctx.memory.read_i64(addr, ValueTag::String)?;
                let new_addr = if value.is_null() {
                    NULL_ADDRESS
                } else {
                    let text = to_display_string(value, &self.ctx.memory)?;
                    self.ctx.memory.assign_string(existing, &text)? as i64
                };
                self.ctx.memory.write_i64(addr, ValueTag::String, new_addr)
            }
            t if t.is_floating() => self.ctx.memory.write_f64(addr, t, value.as_float().unwrap_or(0.0)),
            ValueTag::Bool => self.ctx.memory.write_i64(addr, ValueTag::Bool, value.as_bool().unwrap_or(false) as i64),
            ValueTag::Char => {
                let c = match value {
                    RuntimeValue::Char(c) => *c as i64,
                    _ => value.as_int().unwrap_or(0),
                };
                self.ctx.memory.write_i64(addr, ValueTag::Char, c)
            }
            t if t.is_integer() => {
                let coerced = coerce_for_arithmetic(value, t);
                self.ctx.memory.write_i64(addr, t, coerced.as_int().unwrap_or(0))
            }
            ValueTag::IntPtr => self.ctx.memory.write_i64(addr, ValueTag::IntPtr, extract_address(value)),
            ValueTag::Tuple => {
                let new_addr = match value {
                    RuntimeValue::Tuple(values) => {
                        let box_addr = self.ctx.memory.malloc(0, ValueTag::Tuple)? as i64;
                        self.tuple_values.insert(box_addr, values.clone());
                        box_addr
                    }
                    v if v.is_null() => NULL_ADDRESS,
                    _ => return Err(InterpError::type_error("expected a tuple value")),
                };
                self.ctx.memory.write_i64(addr, ValueTag::Tuple, new_addr)
            }
            // Boxes a scalar into a fresh heap cell so an `object`-typed slot
            // (a 4-byte reference) can still carry it; the old cell, if any,
            // is reclaimed by the next scope-exit sweep rather than freed
            // eagerly here, since it may still be aliased.
            ValueTag::Object if !value.is_null() && !value.tag().is_reference_kind() => {
                let vtag = value.tag();
                let box_addr = self.ctx.memory.malloc(vtag.size_of(), vtag)? as i64;
                self.write_typed(box_addr, vtag, value)?;
                self.ctx.memory.write_i64(addr, ValueTag::Object, box_addr)
            }
            _ => self.ctx.memory.write_i64(addr, tag, extract_address(value)),
        }
    }

    fn init_variable(&mut self, var: Variable, value: &RuntimeValue) -> Result<(), InterpError> {
        match var.tag {
            ValueTag::String => {
                let addr = if value.is_null() {
                    NULL_ADDRESS
                } else {
                    let text = to_display_string(value, &self.ctx.memory)?;
                    self.ctx.memory.alloc_string(&text)? as i64
                };
                self.ctx.memory.write_i64(var.address as i64, ValueTag::String, addr)
            }
            _ => self.write_typed(var.address as i64, var.tag, value),
        }
    }

    fn write_variable(&mut self, var: Variable, value: &RuntimeValue) -> Result<(), InterpError> {
        self.write_typed(var.address as i64, var.tag, value)
    }

    fn read_variable(&mut self, var: Variable) -> Result<RuntimeValue, InterpError> {
        self.read_typed(var.address as i64, var.tag)
    }

    fn read_array_elem(&mut self, addr: i64, tag: ValueTag, index: u32) -> Result<RuntimeValue, InterpError> {
        let elem_addr = addr + (index as i64) * tag.size_of() as i64;
        self.read_typed(elem_addr, tag)
    }

    fn write_array_elem(&mut self, addr: i64, tag: ValueTag, index: u32, value: &RuntimeValue) -> Result<(), InterpError> {
        let elem_addr = addr + (index as i64) * tag.size_of() as i64;
        self.write_typed(elem_addr, tag, value)
    }

    // --- expressions --------------------------------------------------------

    pub fn eval_expr(&mut self, expr: &Expr) -> Result<RuntimeValue, InterpError> {
        match expr {
            Expr::IntLiteral { value, tag_hint, .. } => {
                let tag = match tag_hint.as_deref() {
                    Some("u") => ValueTag::U32,
                    Some("l") => ValueTag::I64,
                    Some("ul") | Some("lu") => ValueTag::U64,
                    Some("f") => return Ok(RuntimeValue::float(*value as f64, ValueTag::Float)),
                    Some("d") => return Ok(RuntimeValue::float(*value as f64, ValueTag::Double)),
                    Some("m") => return Ok(RuntimeValue::float(*value as f64, ValueTag::Decimal)),
                    _ => {
                        if *value >= i32::MIN as i64 && *value <= i32::MAX as i64 {
                            ValueTag::I32
                        } else {
                            ValueTag::I64
                        }
                    }
                };
                Ok(RuntimeValue::int(*value, tag))
            }
            Expr::FloatLiteral { value, tag_hint, .. } => {
                let tag = match tag_hint.as_deref() {
                    Some("f") => ValueTag::Float,
                    Some("m") => ValueTag::Decimal,
                    _ => ValueTag::Double,
                };
                Ok(RuntimeValue::float(*value, tag))
            }
            Expr::BoolLiteral { value, .. } => Ok(RuntimeValue::Bool(*value)),
            Expr::CharLiteral { value, .. } => Ok(RuntimeValue::Char(*value)),
            Expr::StringLiteral { value, .. } => {
                let addr = self.ctx.memory.alloc_string(value)?;
                Ok(RuntimeValue::String(addr as i64))
            }
            Expr::InterpolatedString { parts, .. } => {
                let text = self.render_interpolation(parts)?;
                let addr = self.ctx.memory.alloc_string(&text)?;
                Ok(RuntimeValue::String(addr as i64))
            }
            Expr::NullLiteral { .. } => Ok(RuntimeValue::Null(ValueTag::Object)),
            Expr::Ident { name, .. } => self.eval_ident(name),
            Expr::This { .. } => self.eval_ident("this"),
            Expr::Paren { inner, .. } => self.eval_expr(inner),
            Expr::Tuple { elements, .. } => {
                let values = elements.iter().map(|e| self.eval_expr(e)).collect::<Result<Vec<_>, _>>()?;
                Ok(RuntimeValue::Tuple(values))
            }
            Expr::ArrayLiteral { elements, .. } => self.eval_array_literal(elements),
            Expr::NewArray { element_ty, lengths, .. } => self.eval_new_array(element_ty, lengths),
            Expr::NewObject { ty, args, .. } => self.eval_new_object(ty, args),
            Expr::Unary { op, operand, .. } => self.eval_unary(*op, operand),
            Expr::Binary { op, left, right, .. } => self.eval_binary(*op, left, right),
            Expr::Assign { op, target, value, .. } => self.eval_assign(*op, target, value),
            Expr::Ternary { cond, then_expr, else_expr, .. } => {
                if self.eval_condition(cond)? {
                    self.eval_expr(then_expr)
                } else {
                    self.eval_expr(else_expr)
                }
            }
            Expr::Call { callee, args, .. } => self.eval_call(callee, args),
            Expr::Index { target, index, .. } => {
                let base = self.eval_expr(target)?;
                match &base {
                    RuntimeValue::Array { addr, element_tag } => {
                        if *addr == NULL_ADDRESS {
                            return Err(InterpError::invalid_memory("index into a null array"));
                        }
                        let len = self.ctx.memory.array_length(*addr)?;
                        if let IndexKind::Range { start, end } = index {
                            let (start, stop) = self.resolve_slice_bounds(start, end, len as i64)?;
                            let out_len = (stop - start) as u32;
                            let out_addr = self.ctx.memory.alloc_array(*element_tag, out_len)?;
                            for i in 0..out_len {
                                let elem = self.read_array_elem(*addr, *element_tag, start as u32 + i)?;
                                self.write_array_elem(out_addr as i64, *element_tag, i, &elem)?;
                            }
                            return Ok(RuntimeValue::Array { addr: out_addr as i64, element_tag: *element_tag });
                        }
                        let idx = self.resolve_single_index(index, len as i64)?;
                        self.bounds_check(idx, len)?;
                        self.read_array_elem(*addr, *element_tag, idx as u32)
                    }
                    RuntimeValue::String(addr) => {
                        if *addr == NULL_ADDRESS {
                            return Err(InterpError::invalid_memory("index into a null string"));
                        }
                        let s = self.ctx.memory.read_string(*addr)?;
                        let chars: Vec<char> = s.chars().collect();
                        if let IndexKind::Range { start, end } = index {
                            let (start, stop) = self.resolve_slice_bounds(start, end, chars.len() as i64)?;
                            let slice: String = chars[start as usize..stop as usize].iter().collect();
                            let out_addr = self.ctx.memory.alloc_string(&slice)?;
                            return Ok(RuntimeValue::String(out_addr as i64));
                        }
                        let idx = self.resolve_single_index(index, chars.len() as i64)?;
                        if idx < 0 || idx as usize >= chars.len() {
                            return Err(InterpError::index_out_of_range(format!(
                                "index {idx} out of range for string of length {}",
                                chars.len()
                            )));
                        }
                        Ok(RuntimeValue::Char(chars[idx as usize]))
                    }
                    _ => Err(InterpError::type_error("cannot index this value")),
                }
            }
            Expr::Member { target, name, .. } => self.eval_member(target, name),
            Expr::Cast { ty, operand, .. } => {
                let value = self.eval_expr(operand)?;
                let target = ValueTag::from_type_name(&ty.name).unwrap_or(ValueTag::Object);
                cast(&value, target, &mut self.ctx.memory)
            }
            Expr::Is { operand, pattern, .. } => {
                let value = self.eval_expr(operand)?;
                let result = pattern::matches(pattern, &value, &mut |e| self.eval_expr(e))?;
                Ok(RuntimeValue::Bool(result.matched))
            }
            Expr::SwitchExpr { scrutinee, arms, .. } => self.eval_switch_expr(scrutinee, arms),
            Expr::Lambda { .. } => {
                Err(InterpError::type_error("lambda values cannot be stored or invoked indirectly"))
            }
        }
    }

    fn eval_ident(&mut self, name: &str) -> Result<RuntimeValue, InterpError> {
        if let Some(var) = self.ctx.scopes.resolve(name) {
            return self.read_variable(var);
        }
        for layout in self.enums.values() {
            if let Some(value) = layout.members.get(name) {
                return Ok(RuntimeValue::int(*value, layout.underlying));
            }
        }
        Err(InterpError::unresolved(format!("unknown identifier `{name}`")))
    }

    fn eval_member(&mut self, target: &Expr, name: &str) -> Result<RuntimeValue, InterpError> {
        if let Expr::Ident { name: enum_name, .. } = target {
            if let Some(layout) = self.enums.get(enum_name) {
                if let Some(value) = layout.members.get(name) {
                    return Ok(RuntimeValue::int(*value, layout.underlying));
                }
            }
        }

        let base = self.eval_expr(target)?;
        match &base {
            RuntimeValue::Array { addr, .. } => match name {
                "Length" | "Count" => Ok(RuntimeValue::int(self.ctx.memory.array_length(*addr)? as i64, ValueTag::I32)),
                _ => Err(InterpError::unresolved(format!("no member `{name}` on array"))),
            },
            RuntimeValue::String(addr) => match name {
                "Length" | "Count" => {
                    let s = self.ctx.memory.read_string(*addr)?;
                    Ok(RuntimeValue::int(s.chars().count() as i64, ValueTag::I32))
                }
                _ => Err(InterpError::unresolved(format!("no member `{name}` on string"))),
            },
            RuntimeValue::Object { addr, .. } => {
                let type_name = self.object_types.get(addr).cloned().unwrap_or_default();
                let layout = self
                    .type_layouts
                    .get(&type_name)
                    .cloned()
                    .ok_or_else(|| InterpError::unresolved(format!("unknown type `{type_name}`")))?;
                let field = layout
                    .field(name)
                    .ok_or_else(|| InterpError::unresolved(format!("no field `{name}` on `{type_name}`")))?;
                self.read_typed(*addr + field.offset as i64, field.tag)
            }
            _ => Err(InterpError::type_error(format!("cannot access member `{name}` on this value"))),
        }
    }

    fn render_interpolation(&mut self, parts: &[InterpolationPart]) -> Result<String, InterpError> {
        let mut out = String::new();
        for part in parts {
            match part {
                InterpolationPart::Literal(text) => out.push_str(text),
                InterpolationPart::Expr { expr, alignment, format } => {
                    let value = self.eval_expr(expr)?;
                    let mut text = self.format_value(&value, format.as_deref())?;
                    if let Some(align_expr) = alignment {
                        let width = self.eval_expr(align_expr)?.as_int().unwrap_or(0);
                        let w = width.unsigned_abs() as usize;
                        if text.chars().count() < w {
                            let pad = " ".repeat(w - text.chars().count());
                            text = if width < 0 { format!("{text}{pad}") } else { format!("{pad}{text}") };
                        }
                    }
                    out.push_str(&text);
                }
            }
        }
        Ok(out)
    }

    fn format_value(&mut self, value: &RuntimeValue, format: Option<&str>) -> Result<String, InterpError> {
        match format {
            Some(spec) if spec.starts_with(['X', 'x']) => {
                let n = value.as_int().ok_or_else(|| InterpError::type_error("X format requires an integer"))?;
                Ok(if spec.starts_with('X') { format!("{n:X}") } else { format!("{n:x}") })
            }
            Some(spec) if spec.starts_with('F') || spec.starts_with('f') => {
                let digits: usize = spec[1..].parse().unwrap_or(2);
                let f = value.as_float().ok_or_else(|| InterpError::type_error("F format requires a number"))?;
                Ok(format!("{f:.digits$}"))
            }
            _ => to_display_string(value, &self.ctx.memory),
        }
    }

    fn eval_array_literal(&mut self, elements: &[Expr]) -> Result<RuntimeValue, InterpError> {
        let values = elements.iter().map(|e| self.eval_expr(e)).collect::<Result<Vec<_>, _>>()?;
        let elem_tag = values.first().map(|v| v.tag()).unwrap_or(ValueTag::Object);
        let addr = self.ctx.memory.alloc_array(elem_tag, values.len() as u32)?;
        for (i, v) in values.iter().enumerate() {
            self.write_array_elem(addr as i64, elem_tag, i as u32, v)?;
        }
        Ok(RuntimeValue::Array { addr: addr as i64, element_tag: elem_tag })
    }

    fn eval_new_array(
        &mut self,
        element_ty: &quill_compiler::ast::TypeRef,
        lengths: &[Expr],
    ) -> Result<RuntimeValue, InterpError> {
        let elem_tag = ValueTag::from_type_name(type_name_of(element_ty)).unwrap_or(ValueTag::Object);
        let mut total: u32 = 1;
        for len_expr in lengths {
            let n = self.eval_expr(len_expr)?.as_int().unwrap_or(0);
            total = total.saturating_mul(n.max(0) as u32);
        }
        let addr = self.ctx.memory.alloc_array(elem_tag, total)?;
        Ok(RuntimeValue::Array { addr: addr as i64, element_tag: elem_tag })
    }

    fn eval_new_object(&mut self, ty: &quill_compiler::ast::TypeRef, args: &[Arg]) -> Result<RuntimeValue, InterpError> {
        let layout = self
            .type_layouts
            .get(&ty.name)
            .cloned()
            .ok_or_else(|| InterpError::unresolved(format!("unknown type `{}`", ty.name)))?;
        let tag = if layout.is_class { ValueTag::Class } else { ValueTag::Struct };
        let addr = self.ctx.memory.malloc(layout.total_size, tag)? as i64;
        self.object_types.insert(addr, layout.name.clone());

        for field in layout.fields.iter().filter(|f| !f.is_static) {
            self.write_typed(addr + field.offset as i64, field.tag, &default_value(field.tag))?;
        }

        let arg_values = args.iter().map(|a| self.eval_expr(&a.value)).collect::<Result<Vec<_>, _>>()?;
        let ctor = layout.constructors.iter().find(|c| c.params.len() == arg_values.len());
        if let Some(ctor) = ctor.cloned() {
            self.with_scope(|ev| {
                let this_var = ev.ctx.memory.stackalloc(tag)?;
                ev.write_typed(this_var.address as i64, tag, &RuntimeValue::Object { addr, tag, type_name: layout.name.clone() })?;
                ev.ctx.scopes.declare("this", this_var)?;
                for (param, value) in ctor.params.iter().zip(arg_values.iter()) {
                    let var = ev.ctx.memory.stackalloc(value.tag())?;
                    ev.init_variable(var, value)?;
                    ev.ctx.scopes.declare(&param.name, var)?;
                }
                if let Some(body) = &ctor.body {
                    ev.exec_stmt_list(&body.stmts)?;
                }
                Ok(())
            })?;
        } else {
            for (field, value) in layout.fields.iter().filter(|f| !f.is_static).zip(arg_values.iter()) {
                self.write_typed(addr + field.offset as i64, field.tag, value)?;
            }
        }

        Ok(RuntimeValue::Object { addr, tag, type_name: layout.name.clone() })
    }

    fn eval_unary(&mut self, op: UnOp, operand: &Expr) -> Result<RuntimeValue, InterpError> {
        match op {
            UnOp::Neg => {
                let v = self.eval_expr(operand)?;
                Ok(match v {
                    RuntimeValue::Int { value, tag } => RuntimeValue::int(wrap_to_tag(-value, tag), tag),
                    RuntimeValue::Float { value, tag } => RuntimeValue::float(-value, tag),
                    _ => return Err(InterpError::type_error("unary `-` requires a number")),
                })
            }
            UnOp::Not => {
                let v = self.eval_expr(operand)?;
                Ok(RuntimeValue::Bool(!v.as_bool().ok_or_else(|| InterpError::type_error("unary `!` requires bool"))?))
            }
            UnOp::BitNot => {
                let v = self.eval_expr(operand)?;
                let i = v.as_int().ok_or_else(|| InterpError::type_error("unary `~` requires an integer"))?;
                Ok(RuntimeValue::int(wrap_to_tag(!i, v.tag()), v.tag()))
            }
            UnOp::AddressOf => self.eval_address_of(operand),
            UnOp::Deref => {
                let v = self.eval_expr(operand)?;
                match v {
                    RuntimeValue::Pointer { addr, pointee_tag } => self.read_typed(addr, pointee_tag),
                    _ => Err(InterpError::invalid_memory("dereference of a non-pointer value")),
                }
            }
            UnOp::PreInc | UnOp::PreDec | UnOp::PostInc | UnOp::PostDec => {
                let old = self.read_lvalue(operand)?;
                let delta = if matches!(op, UnOp::PreInc | UnOp::PostInc) { 1 } else { -1 };
                let new = match &old {
                    RuntimeValue::Int { value, tag } => RuntimeValue::int(wrap_to_tag(value + delta, *tag), *tag),
                    RuntimeValue::Float { value, tag } => RuntimeValue::float(value + delta as f64, *tag),
                    _ => return Err(InterpError::type_error("++/-- requires a number")),
                };
                self.write_lvalue(operand, new.clone())?;
                Ok(if matches!(op, UnOp::PreInc | UnOp::PreDec) { new } else { old })
            }
        }
    }

    fn eval_address_of(&mut self, operand: &Expr) -> Result<RuntimeValue, InterpError> {
        let Expr::Ident { name, .. } = operand else {
            return Err(InterpError::type_error("`&` requires a plain variable operand"));
        };
        let var = self
            .ctx
            .scopes
            .resolve(name)
            .ok_or_else(|| InterpError::unresolved(format!("unknown variable `{name}`")))?;
        if var.tag.is_reference_kind() {
            let addr = self.ctx.memory.read_i64(var.address as i64, var.tag)?;
            Ok(RuntimeValue::Pointer { addr, pointee_tag: var.tag })
        } else {
            Ok(RuntimeValue::Pointer { addr: var.address as i64, pointee_tag: var.tag })
        }
    }

    fn eval_binary(&mut self, op: BinOp, left: &Expr, right: &Expr) -> Result<RuntimeValue, InterpError> {
        match op {
            BinOp::And => {
                let l = self.eval_condition(left)?;
                if !l {
                    return Ok(RuntimeValue::Bool(false));
                }
                Ok(RuntimeValue::Bool(self.eval_condition(right)?))
            }
            BinOp::Or => {
                let l = self.eval_condition(left)?;
                if l {
                    return Ok(RuntimeValue::Bool(true));
                }
                Ok(RuntimeValue::Bool(self.eval_condition(right)?))
            }
            BinOp::Coalesce => {
                let l = self.eval_expr(left)?;
                if !l.is_null() {
                    Ok(l)
                } else {
                    self.eval_expr(right)
                }
            }
            _ => {
                let l = self.eval_expr(left)?;
                let r = self.eval_expr(right)?;
                self.apply_binary(op, l, r)
            }
        }
    }

    fn apply_binary(&mut self, op: BinOp, l: RuntimeValue, r: RuntimeValue) -> Result<RuntimeValue, InterpError> {
        if op == BinOp::Add && (l.tag() == ValueTag::String || r.tag() == ValueTag::String) {
            let mut text = to_display_string(&l, &self.ctx.memory)?;
            text.push_str(&to_display_string(&r, &self.ctx.memory)?);
            let addr = self.ctx.memory.alloc_string(&text)?;
            return Ok(RuntimeValue::String(addr as i64));
        }

        match op {
            BinOp::Eq | BinOp::Ne => {
                let eq = values_equal(&l, &r, &self.ctx.memory)?;
                Ok(RuntimeValue::Bool(if op == BinOp::Eq { eq } else { !eq }))
            }
            BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
                let (a, b) = (
                    l.as_float().ok_or_else(|| InterpError::type_error("comparison requires numbers"))?,
                    r.as_float().ok_or_else(|| InterpError::type_error("comparison requires numbers"))?,
                );
                let ok = match op {
                    BinOp::Lt => a < b,
                    BinOp::Le => a <= b,
                    BinOp::Gt => a > b,
                    BinOp::Ge => a >= b,
                    _ => unreachable!(),
                };
                Ok(RuntimeValue::Bool(ok))
            }
            _ if l.tag().is_floating() => {
                let a = l.as_float().unwrap();
                let b = coerce_for_arithmetic(&r, l.tag()).as_float().unwrap_or(0.0);
                let result = match op {
                    BinOp::Add => a + b,
                    BinOp::Sub => a - b,
                    BinOp::Mul => a * b,
                    BinOp::Div => a / b,
                    BinOp::Rem => a % b,
                    BinOp::Pow => a.powf(b),
                    _ => return Err(InterpError::type_error(format!("{op:?} is not valid for floating types"))),
                };
                Ok(RuntimeValue::float(result, l.tag()))
            }
            _ => {
                let tag = l.tag();
                let a = l.as_int().ok_or_else(|| InterpError::type_error("operator requires an integer"))?;
                let b = coerce_for_arithmetic(&r, tag).as_int().unwrap_or(0);
                let result = match op {
                    BinOp::Add => wrap_to_tag(a.wrapping_add(b), tag),
                    BinOp::Sub => wrap_to_tag(a.wrapping_sub(b), tag),
                    BinOp::Mul => wrap_to_tag(a.wrapping_mul(b), tag),
                    BinOp::Div => {
                        if b == 0 {
                            return Err(InterpError::arithmetic("integer division by zero"));
                        }
                        if Some(a) == signed_min(tag) && b == -1 {
                            return Err(InterpError::arithmetic("integer division overflow"));
                        }
                        wrap_to_tag(a.wrapping_div(b), tag)
                    }
                    BinOp::Rem => {
                        if b == 0 {
                            return Err(InterpError::arithmetic("integer modulo by zero"));
                        }
                        wrap_to_tag(a.wrapping_rem(b), tag)
                    }
                    BinOp::Pow => wrap_to_tag((a as f64).powf(b as f64) as i64, tag),
                    BinOp::BitAnd => wrap_to_tag(a & b, tag),
                    BinOp::BitOr => wrap_to_tag(a | b, tag),
                    BinOp::BitXor => wrap_to_tag(a ^ b, tag),
                    BinOp::Shl => wrap_to_tag(a.wrapping_shl(b as u32), tag),
                    BinOp::Shr => wrap_to_tag(a.wrapping_shr(b as u32), tag),
                    BinOp::UShr => wrap_to_tag(((a as u64) >> (b as u32 & 63)) as i64, tag),
                    _ => return Err(InterpError::type_error(format!("{op:?} is not valid for integer types"))),
                };
                Ok(RuntimeValue::int(result, tag))
            }
        }
    }

    fn eval_assign(&mut self, op: AssignOp, target: &Expr, value_expr: &Expr) -> Result<RuntimeValue, InterpError> {
        let new_value = if op == AssignOp::Assign {
            self.eval_expr(value_expr)?
        } else {
            let old = self.read_lvalue(target)?;
            let rhs = self.eval_expr(value_expr)?;
            let bin_op = match op {
                AssignOp::Add => BinOp::Add,
                AssignOp::Sub => BinOp::Sub,
                AssignOp::Mul => BinOp::Mul,
                AssignOp::Div => BinOp::Div,
                AssignOp::Rem => BinOp::Rem,
                AssignOp::BitAnd => BinOp::BitAnd,
                AssignOp::BitOr => BinOp::BitOr,
                AssignOp::BitXor => BinOp::BitXor,
                AssignOp::Shl => BinOp::Shl,
                AssignOp::Shr => BinOp::Shr,
                AssignOp::UShr => BinOp::UShr,
                AssignOp::Coalesce => {
                    if !old.is_null() {
                        self.write_lvalue(target, old.clone())?;
                        return Ok(old);
                    }
                    self.write_lvalue(target, rhs.clone())?;
                    return Ok(rhs);
                }
                AssignOp::Assign => unreachable!(),
            };
            self.apply_binary(bin_op, old, rhs)?
        };
        self.write_lvalue(target, new_value.clone())?;
        Ok(new_value)
    }

    fn eval_switch_expr(
        &mut self,
        scrutinee: &Expr,
        arms: &[(Pattern, Option<Expr>, Expr)],
    ) -> Result<RuntimeValue, InterpError> {
        let value = self.eval_expr(scrutinee)?;
        for (pattern, guard, result_expr) in arms {
            let matched = pattern::matches(pattern, &value, &mut |e| self.eval_expr(e))?;
            if !matched.matched {
                continue;
            }
            let arm_ok = self.with_scope(|ev| {
                for (name, bound) in &matched.bindings {
                    let var = ev.ctx.memory.stackalloc(bound.tag())?;
                    ev.init_variable(var, bound)?;
                    ev.ctx.scopes.declare(name, var)?;
                }
                match guard {
                    Some(g) => ev.eval_condition(g),
                    None => Ok(true),
                }
            })?;
            if arm_ok {
                return self.with_scope(|ev| {
                    for (name, bound) in &matched.bindings {
                        let var = ev.ctx.memory.stackalloc(bound.tag())?;
                        ev.init_variable(var, bound)?;
                        ev.ctx.scopes.declare(name, var)?;
                    }
                    ev.eval_expr(result_expr)
                });
            }
        }
        Err(InterpError::type_error("switch expression matched no arm"))
    }

    // --- calls ----------------------------------------------------------

    fn eval_call(&mut self, callee: &Expr, args: &[Arg]) -> Result<RuntimeValue, InterpError> {
        match callee {
            Expr::Ident { name, .. } => self.call_named(name, args, None),
            Expr::Member { target, name, .. } => {
                let receiver = self.eval_expr(target)?;
                if let RuntimeValue::Object { type_name, .. } = &receiver {
                    if let Some(layout) = self.type_layouts.get(type_name).cloned() {
                        if let Some(overloads) = layout.methods.get(name) {
                            let decl = overloads
                                .iter()
                                .find(|m| m.params.len() == args.len())
                                .or_else(|| overloads.first())
                                .cloned();
                            if let Some(decl) = decl {
                                return self.call_method(&receiver, &decl, args);
                            }
                        }
                    }
                }
                self.call_named(name, args, Some((receiver, target.as_ref())))
            }
            _ => Err(InterpError::type_error("expression is not callable")),
        }
    }

    fn call_named(
        &mut self,
        name: &str,
        call_args: &[Arg],
        receiver: Option<(RuntimeValue, &Expr)>,
    ) -> Result<RuntimeValue, InterpError> {
        self.ctx.check()?;
        let leading_count = receiver.is_some() as usize;
        let mut values: Vec<RuntimeValue> = Vec::new();
        let mut arg_exprs: Vec<Option<&Expr>> = Vec::new();
        if let Some((r, target_expr)) = receiver {
            values.push(r);
            arg_exprs.push(Some(target_expr));
        }
        for a in call_args {
            values.push(self.eval_expr(&a.value)?);
            arg_exprs.push(Some(&a.value));
        }

        let arg_tags: Vec<ValueTag> = values.iter().map(|v| v.tag()).collect();
        let arg_is_null: Vec<bool> = values.iter().map(|v| v.is_null()).collect();

        enum Dispatch {
            User(Rc<FunctionDecl>),
            Native(NativeFn, Vec<bool>),
        }
        let dispatch = {
            let callable = self.ctx.functions.resolve(name, &arg_tags, &arg_is_null)?;
            match callable {
                Callable::User(u) => Dispatch::User(u.decl.clone()),
                Callable::Native(n) => Dispatch::Native(n.func.clone(), n.out_mask.clone()),
            }
        };

        match dispatch {
            Dispatch::Native(func, out_mask) => {
                let mut arr = values;
                let result = (func)(&mut arr, &mut self.ctx.memory)?;
                for (i, is_out) in out_mask.iter().enumerate() {
                    if *is_out {
                        if let Some(Some(expr)) = arg_exprs.get(i) {
                            self.write_lvalue(expr, arr[i].clone())?;
                        }
                    }
                }
                Ok(result)
            }
            Dispatch::User(decl) => {
                self.call_user_function(&decl, values, arg_exprs, call_args, leading_count, None)
            }
        }
    }

    fn call_method(&mut self, receiver: &RuntimeValue, decl: &FunctionDecl, call_args: &[Arg]) -> Result<RuntimeValue, InterpError> {
        self.ctx.check()?;
        let mut values = Vec::with_capacity(call_args.len());
        let mut arg_exprs = Vec::with_capacity(call_args.len());
        for a in call_args {
            values.push(self.eval_expr(&a.value)?);
            arg_exprs.push(Some(&a.value));
        }
        self.call_user_function(decl, values, arg_exprs, call_args, 0, Some(receiver.clone()))
    }

    /// `call_args`/`leading_count` describe how `values`/`arg_exprs` were
    /// assembled: the first `leading_count` entries are a UFCS receiver (or
    /// nothing) bound to `decl.params[..leading_count]` purely positionally,
    /// never nameable since they don't come from a source-level argument;
    /// the rest line up 1:1 with `call_args` until [`bind_named_args`]
    /// reorders them to match `decl.params` by name. A `params`-trailing
    /// (variadic) declaration skips name-based binding entirely and keeps
    /// pure positional binding, since named arguments and a variable-length
    /// tail don't have an unambiguous combination here.
    fn call_user_function(
        &mut self,
        decl: &FunctionDecl,
        values: Vec<RuntimeValue>,
        arg_exprs: Vec<Option<&Expr>>,
        call_args: &[Arg],
        leading_count: usize,
        this: Option<RuntimeValue>,
    ) -> Result<RuntimeValue, InterpError> {
        let is_variadic = matches!(decl.params.last(), Some(p) if matches!(p.mode, ParamMode::Params));
        let (mut values, arg_exprs) = if is_variadic {
            (values, arg_exprs)
        } else {
            bind_named_args(decl, values, arg_exprs, call_args, leading_count)?
        };

        if let Some(last) = decl.params.last() {
            if matches!(last.mode, ParamMode::Params) {
                let fixed = decl.params.len() - 1;
                let elem_tag =
                    last.ty.as_ref().and_then(|t| ValueTag::from_type_name(&t.name)).unwrap_or(ValueTag::Object);
                if values.len() >= fixed {
                    let trailing: Vec<RuntimeValue> = values.split_off(fixed);
                    let addr = self.ctx.memory.alloc_array(elem_tag, trailing.len() as u32)?;
                    for (i, v) in trailing.iter().enumerate() {
                        self.write_array_elem(addr as i64, elem_tag, i as u32, v)?;
                    }
                    values.push(RuntimeValue::Array { addr: addr as i64, element_tag: elem_tag });
                }
            }
        }

        self.ctx.enter_call()?;
        let body = decl.body.clone();
        let params = decl.params.clone();
        let name = decl.name.clone();
        let run = self.with_scope(|ev| {
            if let Some(this) = &this {
                let var = ev.ctx.memory.stackalloc(this.tag())?;
                ev.init_variable(var, this)?;
                ev.ctx.scopes.declare("this", var)?;
            }
            for (i, param) in params.iter().enumerate() {
                let value = values.get(i).cloned().unwrap_or(RuntimeValue::Null(ValueTag::Object));
                let var = ev.ctx.memory.stackalloc(if let Some(t) = &param.ty {
                    ValueTag::from_type_name(&t.name).unwrap_or(value.tag())
                } else {
                    value.tag()
                })?;
                ev.init_variable(var, &value)?;
                ev.ctx.scopes.declare(&param.name, var)?;
            }
            let body = body.as_ref().ok_or_else(|| InterpError::unresolved(format!("function `{name}` has no body")))?;
            let signal = ev.exec_stmt_list(&body.stmts)?;
            let ret = match signal {
                Signal::Return(v) => v.unwrap_or(RuntimeValue::Void),
                _ => RuntimeValue::Void,
            };
            let mut outs = Vec::new();
            for (i, param) in params.iter().enumerate() {
                if matches!(param.mode, ParamMode::Ref | ParamMode::Out) {
                    if let Some(var) = ev.ctx.scopes.resolve(&param.name) {
                        outs.push((i, ev.read_variable(var)?));
                    }
                }
            }
            Ok((ret, outs))
        });
        self.ctx.exit_call();
        let (ret, outs) = run?;
        for (i, v) in outs {
            if let Some(Some(expr)) = arg_exprs.get(i) {
                self.write_lvalue(expr, v)?;
            }
        }
        Ok(ret)
    }
}

/// Reorders `values`/`arg_exprs` to match `decl.params` by name wherever
/// `call_args` names an argument, after the positional `leading_count`
/// receiver slots (if any). Falls through untouched when no argument is
/// named, since that's the overwhelmingly common call shape. A positional
/// argument may not follow a named one, and a name must resolve to one of
/// `decl.params[leading_count..]` exactly once.
fn bind_named_args<'a>(
    decl: &FunctionDecl,
    values: Vec<RuntimeValue>,
    arg_exprs: Vec<Option<&'a Expr>>,
    call_args: &[Arg],
    leading_count: usize,
) -> Result<(Vec<RuntimeValue>, Vec<Option<&'a Expr>>), InterpError> {
    if call_args.iter().all(|a| a.name.is_none()) {
        return Ok((values, arg_exprs));
    }

    let param_count = decl.params.len();
    let mut bound_values: Vec<Option<RuntimeValue>> = vec![None; param_count];
    let mut bound_exprs: Vec<Option<&'a Expr>> = vec![None; param_count];
    for i in 0..leading_count.min(param_count) {
        bound_values[i] = values.get(i).cloned();
        bound_exprs[i] = arg_exprs.get(i).copied().flatten();
    }

    let mut seen_named = false;
    for (call_idx, arg) in call_args.iter().enumerate() {
        let src = leading_count + call_idx;
        let value = values.get(src).cloned().unwrap_or(RuntimeValue::Null(ValueTag::Object));
        let expr = arg_exprs.get(src).copied().flatten();
        match &arg.name {
            Some(param_name) => {
                seen_named = true;
                let idx = decl
                    .params
                    .iter()
                    .position(|p| &p.name == param_name)
                    .ok_or_else(|| InterpError::unresolved(format!("no parameter named `{param_name}` on `{}`", decl.name)))?;
                if idx < leading_count || bound_values[idx].is_some() {
                    return Err(InterpError::type_error(format!(
                        "parameter `{param_name}` cannot be bound by name in this call"
                    )));
                }
                bound_values[idx] = Some(value);
                bound_exprs[idx] = expr;
            }
            None => {
                if seen_named {
                    return Err(InterpError::type_error("a positional argument cannot follow a named argument"));
                }
                if src >= param_count {
                    return Err(InterpError::type_error(format!("too many arguments to `{}`", decl.name)));
                }
                bound_values[src] = Some(value);
                bound_exprs[src] = expr;
            }
        }
    }

    let values = bound_values.into_iter().map(|v| v.unwrap_or(RuntimeValue::Null(ValueTag::Object))).collect();
    Ok((values, bound_exprs))
}

fn goto_target(err: &InterpError) -> Option<String> {
    if let InterpError::UnresolvedName { message, .. } = err {
        message.strip_prefix("__goto__:").map(|s| s.to_string())
    } else {
        None
    }
}

fn is_goto_case(err: &InterpError) -> bool {
    matches!(err, InterpError::UnresolvedName { message, .. } if message == "__goto_case__")
}

fn values_equal(a: &RuntimeValue, b: &RuntimeValue, mem: &crate::memory::MemoryImage) -> Result<bool, InterpError> {
    if a.is_null() || b.is_null() {
        return Ok(a.is_null() && b.is_null());
    }
    Ok(match (a, b) {
        (RuntimeValue::String(x), RuntimeValue::String(y)) => {
            if x == y {
                true
            } else {
                mem.read_string(*x)? == mem.read_string(*y)?
            }
        }
        (RuntimeValue::Bool(x), RuntimeValue::Bool(y)) => x == y,
        (RuntimeValue::Char(x), RuntimeValue::Char(y)) => x == y,
        _ => match (a.as_float(), b.as_float()) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        },
    })
}

/// Evaluates a strictly-constant enum member initializer (integer literal or
/// unary negation of one) at hoist time, before the scope stack exists.
fn eval_const_i64(expr: &Expr) -> i64 {
    match expr {
        Expr::IntLiteral { value, .. } => *value,
        Expr::Unary { op: UnOp::Neg, operand, .. } => -eval_const_i64(operand),
        Expr::Paren { inner, .. } => eval_const_i64(inner),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CancellationToken;

    fn run(source: &str) -> Option<RuntimeValue> {
        let (program, diagnostics) = quill_compiler::parse(source);
        assert!(diagnostics.is_empty(), "parse errors: {diagnostics:?}");
        let ctx = ExecutionContext::new(1024, 3072, CancellationToken::new());
        let mut ev = Evaluator::new(ctx);
        ev.set_console_output(false);
        ev.run(&program).unwrap()
    }

    #[test]
    fn arithmetic_and_interpolation_scenario() {
        let result = run(
            r#"
            int a = 10;
            int b = 3;
            string s = $"{a+b}:{a*b}";
            s
        "#,
        );
        match result {
            Some(RuntimeValue::String(_)) => {}
            other => panic!("expected a string result, got {other:?}"),
        }
    }

    #[test]
    fn recursion_with_forward_reference() {
        let (program, diagnostics) = quill_compiler::parse(
            r#"
            int f = fact(5);
            int fact(int n) { return n <= 1 ? 1 : n * fact(n - 1); }
            f
        "#,
        );
        assert!(diagnostics.is_empty());
        let ctx = ExecutionContext::new(1024, 3072, CancellationToken::new());
        let mut ev = Evaluator::new(ctx);
        let result = ev.run(&program).unwrap();
        assert_eq!(result, Some(RuntimeValue::int(120, ValueTag::I32)));
    }

    #[test]
    fn pointer_write_through() {
        let (program, diagnostics) = quill_compiler::parse(
            r#"
            int x = 23;
            int* p = &x;
            *p = 99;
            x
        "#,
        );
        assert!(diagnostics.is_empty());
        let ctx = ExecutionContext::new(1024, 3072, CancellationToken::new());
        let mut ev = Evaluator::new(ctx);
        let result = ev.run(&program).unwrap();
        assert_eq!(result, Some(RuntimeValue::int(99, ValueTag::I32)));
    }

    #[test]
    fn array_fill_and_index() {
        let (program, diagnostics) = quill_compiler::parse(
            r#"
            int[] a = new int[4];
            for (int i = 0; i < 4; i++) a[i] = i * i;
            a[3]
        "#,
        );
        assert!(diagnostics.is_empty());
        let ctx = ExecutionContext::new(1024, 3072, CancellationToken::new());
        let mut ev = Evaluator::new(ctx);
        let result = ev.run(&program).unwrap();
        assert_eq!(result, Some(RuntimeValue::int(9, ValueTag::I32)));
    }

    #[test]
    fn integer_division_by_zero_is_arithmetic_error() {
        let (program, diagnostics) = quill_compiler::parse("int a = 1; int b = 0; a / b");
        assert!(diagnostics.is_empty());
        let ctx = ExecutionContext::new(1024, 3072, CancellationToken::new());
        let mut ev = Evaluator::new(ctx);
        let err = ev.run(&program).unwrap_err();
        assert!(matches!(err, InterpError::Arithmetic { .. }));
    }

    #[test]
    fn array_index_out_of_range_fails() {
        let (program, diagnostics) = quill_compiler::parse("int[] a = new int[2]; a[2]");
        assert!(diagnostics.is_empty());
        let ctx = ExecutionContext::new(1024, 3072, CancellationToken::new());
        let mut ev = Evaluator::new(ctx);
        let err = ev.run(&program).unwrap_err();
        assert!(matches!(err, InterpError::IndexOutOfRange { .. }));
    }
}
