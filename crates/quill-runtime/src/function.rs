//! Function dispatcher: bridges native and user-defined callables behind one
//! overload-resolution algorithm.

use std::collections::HashMap;
use std::rc::Rc;

use quill_compiler::ast::FunctionDecl;
use quill_core::ValueTag;

use crate::error::InterpError;
use crate::memory::MemoryImage;
use crate::value::RuntimeValue;

pub type NativeFn = Rc<dyn Fn(&mut [RuntimeValue], &mut MemoryImage) -> Result<RuntimeValue, InterpError>>;

pub struct NativeFunction {
    pub param_tags: Vec<ValueTag>,
    pub out_mask: Vec<bool>,
    pub is_params_last: bool,
    pub func: NativeFn,
}

impl std::fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeFunction")
            .field("param_tags", &self.param_tags)
            .field("out_mask", &self.out_mask)
            .field("is_params_last", &self.is_params_last)
            .finish()
    }
}

#[derive(Debug)]
pub struct UserFunction {
    pub decl: Rc<FunctionDecl>,
    pub param_tags: Vec<ValueTag>,
    pub is_params_last: bool,
}

#[derive(Debug)]
pub enum Callable {
    User(UserFunction),
    Native(NativeFunction),
}

impl Callable {
    pub fn param_tags(&self) -> &[ValueTag] {
        match self {
            Callable::User(u) => &u.param_tags,
            Callable::Native(n) => &n.param_tags,
        }
    }

    pub fn is_params_last(&self) -> bool {
        match self {
            Callable::User(u) => u.is_params_last,
            Callable::Native(n) => n.is_params_last,
        }
    }

    pub fn param_names(&self) -> Vec<String> {
        match self {
            Callable::User(u) => u.decl.params.iter().map(|p| p.name.clone()).collect(),
            Callable::Native(_) => Vec::new(),
        }
    }
}

fn type_ref_to_tag(name: &str) -> ValueTag {
    ValueTag::from_type_name(name).unwrap_or(ValueTag::Object)
}

pub fn user_function_from_decl(decl: Rc<FunctionDecl>) -> UserFunction {
    let is_params_last = decl
        .params
        .last()
        .map(|p| matches!(p.mode, quill_compiler::ast::ParamMode::Params))
        .unwrap_or(false);
    let param_tags = decl
        .params
        .iter()
        .map(|p| p.ty.as_ref().map(|t| type_ref_to_tag(&t.name)).unwrap_or(ValueTag::Object))
        .collect();
    UserFunction { decl, param_tags, is_params_last }
}

#[derive(Default)]
pub struct FunctionRegistry {
    overloads: HashMap<String, Vec<Callable>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        FunctionRegistry::default()
    }

    pub fn register(&mut self, name: &str, callable: Callable) {
        self.overloads.entry(name.to_string()).or_default().push(callable);
    }

    pub fn has(&self, name: &str) -> bool {
        self.overloads.contains_key(name)
    }

    pub fn overloads(&self, name: &str) -> &[Callable] {
        self.overloads.get(name).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Score one (candidate, args) pairing, or `None` if arity cannot
    /// possibly match.
    fn score(candidate: &Callable, arg_tags: &[ValueTag], arg_is_null: &[bool]) -> Option<i32> {
        let params = candidate.param_tags();
        let params_last = candidate.is_params_last();

        if !params_last {
            if params.len() != arg_tags.len() {
                return None;
            }
        } else if arg_tags.len() + 1 < params.len() {
            return None;
        }

        let fixed = if params_last { params.len() - 1 } else { params.len() };
        let mut total = 0i32;
        for i in 0..fixed {
            total += Self::score_param(params[i], arg_tags[i], arg_is_null[i])?;
        }
        if params_last {
            let elem_tag = params[fixed];
            for i in fixed..arg_tags.len() {
                total += Self::score_param(elem_tag, arg_tags[i], arg_is_null[i])?;
            }
        }
        Some(total)
    }

    fn score_param(param_tag: ValueTag, arg_tag: ValueTag, arg_is_null: bool) -> Option<i32> {
        if param_tag == arg_tag {
            return Some(3);
        }
        if arg_is_null && param_tag.is_reference_kind() {
            return Some(2);
        }
        if param_tag == ValueTag::Object {
            return Some(1);
        }
        if param_tag.is_integer() || param_tag.is_floating() {
            if arg_tag.is_integer() || arg_tag.is_floating() || arg_tag == ValueTag::Char {
                return Some(0);
            }
        }
        None
    }

    /// Select the highest-scoring overload; ties favor the first declared.
    pub fn resolve<'a>(
        &'a self,
        name: &str,
        arg_tags: &[ValueTag],
        arg_is_null: &[bool],
    ) -> Result<&'a Callable, InterpError> {
        let candidates = self.overloads(name);
        if candidates.is_empty() {
            return Err(InterpError::unresolved(format!("no function named `{name}`")));
        }
        let mut best: Option<(usize, i32)> = None;
        for (i, c) in candidates.iter().enumerate() {
            if let Some(score) = Self::score(c, arg_tags, arg_is_null) {
                if best.map(|(_, b)| score > b).unwrap_or(true) {
                    best = Some((i, score));
                }
            }
        }
        match best {
            Some((i, _)) => Ok(&candidates[i]),
            None => Err(InterpError::type_error(format!(
                "no overload of `{name}` accepts the given argument types"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn native(tags: &[ValueTag]) -> Callable {
        Callable::Native(NativeFunction {
            param_tags: tags.to_vec(),
            out_mask: vec![false; tags.len()],
            is_params_last: false,
            func: Rc::new(|_args, _mem| Ok(RuntimeValue::Void)),
        })
    }

    #[test]
    fn exact_tag_match_wins_over_coercion() {
        let mut reg = FunctionRegistry::new();
        reg.register("f", native(&[ValueTag::I64]));
        reg.register("f", native(&[ValueTag::I32]));
        let chosen = reg.resolve("f", &[ValueTag::I32], &[false]).unwrap();
        assert_eq!(chosen.param_tags(), &[ValueTag::I32]);
    }

    #[test]
    fn ties_favor_first_declared() {
        let mut reg = FunctionRegistry::new();
        reg.register("f", native(&[ValueTag::I32]));
        reg.register("f", native(&[ValueTag::I32]));
        let candidates = reg.overloads("f");
        assert_eq!(candidates.len(), 2);
        // Both score identically; resolve must pick index 0 deterministically.
        let chosen_score = FunctionRegistry::score(&candidates[0], &[ValueTag::I32], &[false]);
        assert_eq!(chosen_score, Some(3));
    }

    #[test]
    fn no_matching_overload_is_type_error() {
        let mut reg = FunctionRegistry::new();
        reg.register("f", native(&[ValueTag::String]));
        let err = reg.resolve("f", &[ValueTag::Bool], &[false]).unwrap_err();
        assert!(matches!(err, InterpError::Type { .. }));
    }
}
