//! Spec §8: `eval` never leaves the scope stack or argument stack at a
//! different depth than it found them, regardless of whether the source
//! evaluated cleanly or propagated an error.

use unum::{EvalDisposition, Runtime, Value};

fn register_arith(rt: &mut Runtime) {
    for (name, f) in [
        ("+", (|a: f64, b: f64| a + b) as fn(f64, f64) -> f64),
        ("-", |a, b| a - b),
        ("*", |a, b| a * b),
        ("/", |a, b| a / b),
    ] {
        let v = rt.register_fn(name, 2, move |_rt, mut args| {
            let b = args.pop().unwrap().as_number().unwrap_or(0.0);
            let a = args.pop().unwrap().as_number().unwrap_or(0.0);
            if name == "/" && b == 0.0 {
                return Value::new_error("Division by zero");
            }
            Value::Number(f(a, b))
        });
        rt.set_var(name, v, true);
    }
}

#[test]
fn successful_eval_leaves_stacks_at_entry_depth() {
    let mut rt = Runtime::default();
    register_arith(&mut rt);

    let scope_before = rt.env.scopes.depth();
    let args_before = rt.args.depth();

    let v = rt.eval("let x = 1 + 2 * 3\nx", EvalDisposition::Propagate);
    assert_eq!(v.as_number(), Some(9.0));

    assert_eq!(rt.env.scopes.depth(), scope_before);
    assert_eq!(rt.args.depth(), args_before);
}

#[test]
fn erroring_eval_still_restores_stack_depths() {
    let mut rt = Runtime::default();
    register_arith(&mut rt);

    let scope_before = rt.env.scopes.depth();
    let args_before = rt.args.depth();

    let v = rt.eval("let x = 1 / 0\nx", EvalDisposition::Catch);
    assert!(v.is_error());

    assert_eq!(rt.env.scopes.depth(), scope_before);
    assert_eq!(rt.args.depth(), args_before);
    assert!(rt.trace.is_empty());
}

#[test]
fn undeclared_variable_error_restores_stacks_too() {
    let mut rt = Runtime::default();
    let scope_before = rt.env.scopes.depth();
    let args_before = rt.args.depth();

    let v = rt.eval("nope 1 2 3", EvalDisposition::Catch);
    assert!(v.is_error());

    assert_eq!(rt.env.scopes.depth(), scope_before);
    assert_eq!(rt.args.depth(), args_before);
}

#[test]
fn nested_function_calls_restore_depths_after_each_call() {
    let mut rt = Runtime::default();
    register_arith(&mut rt);

    let v = rt.eval(
        "let add1 = function x do x + 1 end\nlet compose = function x do add1 (add1 x) end\ncompose 40",
        EvalDisposition::Propagate,
    );
    assert_eq!(v.as_number(), Some(42.0));
    assert_eq!(rt.env.scopes.depth(), 0);
    assert_eq!(rt.args.depth(), 0);
}
