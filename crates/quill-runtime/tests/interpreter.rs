//! End-to-end scenarios and boundary cases run through the public [`Ast`]
//! facade and the [`Evaluator`] directly, split from the unit tests in
//! `src/evaluator.rs`.

use std::thread;
use std::time::Duration;

use quill_runtime::context::CancellationToken;
use quill_runtime::error::InterpError;
use quill_runtime::evaluator::Evaluator;
use quill_runtime::value::RuntimeValue;
use quill_runtime::{Ast, ExecutionContext};

fn eval(source: &str) -> Option<RuntimeValue> {
    let mut ast = Ast::new(None);
    ast.interpret(source, false, false).expect("interpretation failed")
}

#[test]
fn pattern_switch_scenario() {
    let result = eval(
        r#"
        object o = 42;
        string k = switch (o) {
            int n when n > 0 => "pos",
            null => "null",
            _ => "other",
        };
        k
        "#,
    );
    match result {
        Some(RuntimeValue::String(_)) => {}
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn pattern_switch_binds_result_value() {
    let (program, diags) = quill_compiler::parse(
        r#"
        object o = 42;
        string k = switch (o) {
            int n when n > 0 => "pos",
            null => "null",
            _ => "other",
        };
        k
        "#,
    );
    assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
    let cancellation = CancellationToken::new();
    let ctx = ExecutionContext::new(1024, 4096, cancellation);
    let mut ev = Evaluator::new(ctx);
    ev.set_console_output(false);
    let result = ev.run(&program).unwrap();
    let Some(RuntimeValue::String(addr)) = result else { panic!("expected string result") };
    assert_eq!(ev.ctx.memory.read_string(addr).unwrap(), "pos");
}

#[test]
fn cancellation_terminates_runaway_loop_without_leaking() {
    let token = CancellationToken::new();
    let ctx = ExecutionContext::new(1024, 4096, token.clone());
    let mut ev = Evaluator::new(ctx);
    ev.set_console_output(false);

    let live_before = ev.ctx.scopes.total_variables();

    let canceller = token.clone();
    thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        canceller.cancel();
    });

    let (program, diags) = quill_compiler::parse("while (true) { }");
    assert!(diags.is_empty());
    let result = ev.run(&program);

    assert!(matches!(result, Err(InterpError::Cancelled)));
    assert_eq!(ev.ctx.scopes.total_variables(), live_before);
}

#[test]
fn min_value_divided_by_negative_one_is_arithmetic_error() {
    let cancellation = CancellationToken::new();
    let ctx = ExecutionContext::new(1024, 4096, cancellation);
    let mut ev = Evaluator::new(ctx);
    ev.set_console_output(false);
    let (program, diags) = quill_compiler::parse(
        r#"
        int x = -2147483648;
        int y = x / -1;
        "#,
    );
    assert!(diags.is_empty());
    let err = ev.run(&program).unwrap_err();
    assert!(matches!(err, InterpError::Arithmetic { .. }), "got {err:?}");
}

#[test]
fn string_grows_past_original_capacity_on_reassignment() {
    let result = eval(
        r#"
        string s = "hi";
        s = "a much longer replacement string";
        s
        "#,
    );
    match result {
        Some(RuntimeValue::String(_)) => {}
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn array_index_at_length_is_out_of_range() {
    let cancellation = CancellationToken::new();
    let ctx = ExecutionContext::new(1024, 4096, cancellation);
    let mut ev = Evaluator::new(ctx);
    ev.set_console_output(false);
    let (program, diags) = quill_compiler::parse(
        r#"
        int[] a = new int[4];
        int v = a[4];
        "#,
    );
    assert!(diags.is_empty());
    let err = ev.run(&program).unwrap_err();
    assert!(matches!(err, InterpError::IndexOutOfRange { .. }), "got {err:?}");
}

#[test]
fn goto_unknown_label_is_unresolved_name() {
    let cancellation = CancellationToken::new();
    let ctx = ExecutionContext::new(1024, 4096, cancellation);
    let mut ev = Evaluator::new(ctx);
    ev.set_console_output(false);
    let (program, diags) = quill_compiler::parse(
        r#"
        void run() {
            goto nowhere;
        }
        run();
        "#,
    );
    assert!(diags.is_empty());
    let err = ev.run(&program).unwrap_err();
    assert!(matches!(err, InterpError::UnresolvedName { .. }), "got {err:?}");
}

#[test]
fn arithmetic_and_interpolation_end_to_end() {
    let result = eval(
        r#"
        int a = 10;
        int b = 3;
        string s = $"{a+b}:{a*b}";
        s
        "#,
    );
    assert!(matches!(result, Some(RuntimeValue::String(_))));
}

#[test]
fn goto_case_resumes_at_target_arm() {
    let result = eval(
        r#"
        int result = 0;
        switch (1) {
            case 1:
                result = result + 1;
                goto case 2;
            case 2:
                result = result + 10;
            default:
                result = result + 100;
        }
        result
        "#,
    );
    match result {
        Some(RuntimeValue::Int { value: 11, .. }) => {}
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn goto_default_resumes_at_default_arm() {
    let result = eval(
        r#"
        int result = 0;
        switch (1) {
            case 1:
                goto default;
            case 2:
                result = 2;
            default:
                result = 100;
        }
        result
        "#,
    );
    match result {
        Some(RuntimeValue::Int { value: 100, .. }) => {}
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn named_arguments_bind_out_of_order() {
    let result = eval(
        r#"
        int describe(int width, int height) { return width * 100 + height; }
        describe(height: 2, width: 7)
        "#,
    );
    match result {
        Some(RuntimeValue::Int { value: 702, .. }) => {}
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn positional_argument_after_named_argument_is_rejected() {
    let cancellation = CancellationToken::new();
    let ctx = ExecutionContext::new(1024, 4096, cancellation);
    let mut ev = Evaluator::new(ctx);
    ev.set_console_output(false);
    let (program, diags) = quill_compiler::parse(
        r#"
        int describe(int width, int height) { return width * 100 + height; }
        describe(height: 2, 7)
        "#,
    );
    assert!(diags.is_empty());
    let err = ev.run(&program).unwrap_err();
    assert!(matches!(err, InterpError::Type { .. }), "got {err:?}");
}

#[test]
fn foreach_destructures_tuple_elements() {
    let result = eval(
        r#"
        int total = 0;
        var pairs = [(1, 10), (2, 20), (3, 30)];
        foreach (var (k, v) in pairs) {
            total = total + k + v;
        }
        total
        "#,
    );
    match result {
        Some(RuntimeValue::Int { value: 66, .. }) => {}
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn using_statement_disposes_resource_on_normal_exit() {
    let result = eval(
        r#"
        class Resource {
            bool disposed = false;
            void Dispose() { this.disposed = true; }
        }
        Resource r = new Resource();
        using (r) {
        }
        r.disposed
        "#,
    );
    match result {
        Some(RuntimeValue::Bool(true)) => {}
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn using_statement_disposes_resource_when_body_throws() {
    let cancellation = CancellationToken::new();
    let ctx = ExecutionContext::new(1024, 4096, cancellation);
    let mut ev = Evaluator::new(ctx);
    ev.set_console_output(false);
    let (program, diags) = quill_compiler::parse(
        r#"
        class Resource {
            bool disposed = false;
            void Dispose() { this.disposed = true; }
        }
        Resource r = new Resource();
        try {
            using (r) {
                throw "boom";
            }
        } catch (Exception msg) {
        }
        r.disposed
        "#,
    );
    assert!(diags.is_empty());
    let result = ev.run(&program).unwrap();
    match result {
        Some(RuntimeValue::Bool(true)) => {}
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn array_slice_and_from_end_index() {
    let result = eval(
        r#"
        var a = [10, 20, 30, 40, 50];
        var mid = a[1..3];
        int last = a[^1];
        mid[0] + mid[1] + last
        "#,
    );
    match result {
        Some(RuntimeValue::Int { value: 100, .. }) => {}
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn string_slice_and_omitted_bounds() {
    let result = eval(
        r#"
        string s = "hello world";
        string head = s[..5];
        string tail = s[6..];
        head + tail
        "#,
    );
    match result {
        Some(RuntimeValue::String(_)) => {}
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn slice_start_past_end_is_index_out_of_range() {
    let cancellation = CancellationToken::new();
    let ctx = ExecutionContext::new(1024, 4096, cancellation);
    let mut ev = Evaluator::new(ctx);
    ev.set_console_output(false);
    let (program, diags) = quill_compiler::parse(
        r#"
        var a = [1, 2, 3];
        var bad = a[3..1];
        "#,
    );
    assert!(diags.is_empty());
    let err = ev.run(&program).unwrap_err();
    assert!(matches!(err, InterpError::IndexOutOfRange { .. }), "got {err:?}");
}

#[test]
fn recursion_with_forward_reference_end_to_end() {
    let result = eval(
        r#"
        int f = fact(5);
        int fact(int n) { return n <= 1 ? 1 : n * fact(n - 1); }
        f
        "#,
    );
    match result {
        Some(RuntimeValue::Int { value: 120, .. }) => {}
        other => panic!("unexpected result: {other:?}"),
    }
}
