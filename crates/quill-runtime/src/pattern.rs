//! Pattern matching: `value is Pattern` and `switch` arm matching.
//!
//! A successful match returns the bindings it introduces; the evaluator
//! installs them into the synthetic block scope that wraps the construct
//! (`if`/`while`/`for`/`switch`) whose condition carries the pattern.

use quill_compiler::ast::{BinOp, Pattern};
use quill_core::ValueTag;

use crate::error::InterpError;
use crate::value::RuntimeValue;

pub struct MatchResult {
    pub matched: bool,
    pub bindings: Vec<(String, RuntimeValue)>,
}

impl MatchResult {
    fn no() -> Self {
        MatchResult { matched: false, bindings: Vec::new() }
    }

    fn yes() -> Self {
        MatchResult { matched: true, bindings: Vec::new() }
    }

    fn yes_with(bindings: Vec<(String, RuntimeValue)>) -> Self {
        MatchResult { matched: true, bindings }
    }
}

fn values_equal(a: &RuntimeValue, b: &RuntimeValue) -> bool {
    match (a, b) {
        (RuntimeValue::Int { value: x, .. }, RuntimeValue::Int { value: y, .. }) => x == y,
        (RuntimeValue::Float { value: x, .. }, RuntimeValue::Float { value: y, .. }) => x == y,
        (RuntimeValue::Int { value: x, .. }, RuntimeValue::Float { value: y, .. })
        | (RuntimeValue::Float { value: y, .. }, RuntimeValue::Int { value: x, .. }) => (*x as f64) == *y,
        (RuntimeValue::Bool(x), RuntimeValue::Bool(y)) => x == y,
        (RuntimeValue::Char(x), RuntimeValue::Char(y)) => x == y,
        _ => a.is_null() && b.is_null(),
    }
}

fn compare_numeric(a: &RuntimeValue, b: &RuntimeValue) -> Option<std::cmp::Ordering> {
    let (x, y) = match (a.as_float(), b.as_float()) {
        (Some(x), Some(y)) => (x, y),
        _ => return None,
    };
    x.partial_cmp(&y)
}

/// Match `value` against `pattern`. `eval_guard_expr` evaluates a
/// `when`-guard expression (supplied by the caller since guards can
/// reference the pattern's own bindings) — pattern matching itself never
/// evaluates expressions other than the pattern's own constant/relational
/// operands, which `eval_const` resolves.
pub fn matches<F>(
    pattern: &Pattern,
    value: &RuntimeValue,
    eval_const: &mut F,
) -> Result<MatchResult, InterpError>
where
    F: FnMut(&quill_compiler::ast::Expr) -> Result<RuntimeValue, InterpError>,
{
    match pattern {
        Pattern::Wildcard { .. } => Ok(MatchResult::yes()),
        Pattern::Null { .. } => Ok(if value.is_null() { MatchResult::yes() } else { MatchResult::no() }),
        Pattern::Type { ty, binding, .. } => {
            let target_tag = ValueTag::from_type_name(&ty.name);
            let tag_matches = match target_tag {
                Some(t) => value.tag() == t,
                None => !value.is_null(),
            };
            if !tag_matches {
                return Ok(MatchResult::no());
            }
            match binding {
                Some(name) => Ok(MatchResult::yes_with(vec![(name.clone(), value.clone())])),
                None => Ok(MatchResult::yes()),
            }
        }
        Pattern::Constant { value: expr, .. } => {
            let constant = eval_const(expr)?;
            Ok(if values_equal(value, &constant) { MatchResult::yes() } else { MatchResult::no() })
        }
        Pattern::Relational { op, value: expr, .. } => {
            let constant = eval_const(expr)?;
            let ord = match compare_numeric(value, &constant) {
                Some(o) => o,
                None => return Ok(MatchResult::no()),
            };
            let ok = match op {
                BinOp::Lt => ord.is_lt(),
                BinOp::Le => ord.is_le(),
                BinOp::Gt => ord.is_gt(),
                BinOp::Ge => ord.is_ge(),
                _ => false,
            };
            Ok(if ok { MatchResult::yes() } else { MatchResult::no() })
        }
        Pattern::And { left, right, .. } => {
            let l = matches(left, value, eval_const)?;
            if !l.matched {
                return Ok(MatchResult::no());
            }
            let r = matches(right, value, eval_const)?;
            if !r.matched {
                return Ok(MatchResult::no());
            }
            let mut bindings = l.bindings;
            bindings.extend(r.bindings);
            Ok(MatchResult::yes_with(bindings))
        }
        Pattern::Or { left, right, .. } => {
            let l = matches(left, value, eval_const)?;
            if l.matched {
                return Ok(l);
            }
            matches(right, value, eval_const)
        }
        Pattern::Not { inner, .. } => {
            let r = matches(inner, value, eval_const)?;
            Ok(if r.matched { MatchResult::no() } else { MatchResult::yes() })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_core::Span;

    fn no_exprs(_e: &quill_compiler::ast::Expr) -> Result<RuntimeValue, InterpError> {
        unreachable!("test patterns here don't reference expressions")
    }

    #[test]
    fn wildcard_always_matches() {
        let p = Pattern::Wildcard { span: Span::synthetic() };
        let v = RuntimeValue::int(5, ValueTag::I32);
        let mut f = no_exprs;
        assert!(matches(&p, &v, &mut f).unwrap().matched);
    }

    #[test]
    fn null_pattern_matches_only_null() {
        let p = Pattern::Null { span: Span::synthetic() };
        let mut f = no_exprs;
        assert!(matches(&p, &RuntimeValue::Null(ValueTag::Object), &mut f).unwrap().matched);
        assert!(!matches(&p, &RuntimeValue::int(0, ValueTag::I32), &mut f).unwrap().matched);
    }

    #[test]
    fn type_pattern_binds_name_on_success() {
        let p = Pattern::Type {
            ty: quill_compiler::ast::TypeRef {
                name: "int".into(),
                array_rank: 0,
                nullable: false,
                span: Span::synthetic(),
            },
            binding: Some("n".into()),
            span: Span::synthetic(),
        };
        let mut f = no_exprs;
        let result = matches(&p, &RuntimeValue::int(7, ValueTag::I32), &mut f).unwrap();
        assert!(result.matched);
        assert_eq!(result.bindings, vec![("n".to_string(), RuntimeValue::int(7, ValueTag::I32))]);
    }

    #[test]
    fn and_pattern_requires_both_sides() {
        let left = Pattern::Type {
            ty: quill_compiler::ast::TypeRef {
                name: "int".into(),
                array_rank: 0,
                nullable: false,
                span: Span::synthetic(),
            },
            binding: None,
            span: Span::synthetic(),
        };
        let right = Pattern::Relational {
            op: BinOp::Gt,
            value: quill_compiler::ast::Expr::IntLiteral { value: 0, tag_hint: None, span: Span::synthetic() },
            span: Span::synthetic(),
        };
        let pattern = Pattern::And { left: Box::new(left), right: Box::new(right), span: Span::synthetic() };
        let mut f = |e: &quill_compiler::ast::Expr| match e {
            quill_compiler::ast::Expr::IntLiteral { value, .. } => Ok(RuntimeValue::int(*value, ValueTag::I32)),
            _ => unreachable!(),
        };
        assert!(matches(&pattern, &RuntimeValue::int(5, ValueTag::I32), &mut f).unwrap().matched);
        assert!(!matches(&pattern, &RuntimeValue::int(-5, ValueTag::I32), &mut f).unwrap().matched);
    }
}
