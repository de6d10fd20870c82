//! The seven concrete end-to-end scenarios from spec §8, each driven purely
//! through `Runtime::eval` against the host-registered helpers a minimal
//! embedder would provide (`+`/`*`/`/`, `table`, `array`, `for`, `try`,
//! `invoke`) — none of which are part of this crate's own surface, since
//! the standard library is explicitly out of this core's scope (spec §1).
//! These tests exist to prove the *evaluator and dispatcher* behave exactly
//! as spec §8 describes when given a conforming stdlib to call into.

use unum::{EvalDisposition, Runtime, Value};

fn register_stdlib(rt: &mut Runtime) {
    for (name, f) in [
        ("+", (|a: f64, b: f64| a + b) as fn(f64, f64) -> f64),
        ("-", |a, b| a - b),
        ("*", |a, b| a * b),
    ] {
        let v = rt.register_fn(name, 2, move |_rt, mut args| {
            let b = args.pop().unwrap().as_number().unwrap_or(0.0);
            let a = args.pop().unwrap().as_number().unwrap_or(0.0);
            Value::Number(f(a, b))
        });
        rt.set_var(name, v, true);
    }
    let div = rt.register_fn("/", 2, |rt, mut args| {
        let b = args.pop().unwrap().as_number().unwrap_or(0.0);
        let a = args.pop().unwrap().as_number().unwrap_or(0.0);
        if b == 0.0 {
            rt.blame_arg(&Value::Number(a));
            return Value::new_error("Division by zero");
        }
        Value::Number(a / b)
    });
    rt.set_var("/", div, true);

    // `table k1 v1 k2 v2 ...` — variadic, builds a fresh table from
    // alternating key/value arguments (arity -1: "at least 0 args").
    let table = rt.register_fn("table", -1, |rt, args| {
        let result = rt.new_table(None);
        let Value::Table(id) = &result else { unreachable!() };
        let id = *id;
        let mut it = args.into_iter();
        while let (Some(k), Some(v)) = (it.next(), it.next()) {
            rt.table_insert(id, k, v, true);
        }
        result
    });
    rt.set_var("table", table, true);

    // `array v1 v2 ...` — variadic array constructor.
    let array = rt.register_fn("array", -1, |rt, args| rt.new_array(args));
    rt.set_var("array", array, true);

    // `invoke f` — calls `f` with zero arguments (spec §4.6's escape hatch
    // for calling a thunk without `f` picking up trailing tokens as args).
    let invoke = rt.register_fn("invoke", 1, |rt, mut args| {
        let f = args.pop().unwrap();
        rt.call(f, vec![])
    });
    rt.set_var("invoke", invoke, true);

    // `for start end body` — calls `body i` for `i` in `[start, end)` in
    // order, evaluating to the last call's result.
    let for_fn = rt.register_fn("for", 3, |rt, mut args| {
        let body = args.pop().unwrap();
        let end = args.pop().unwrap().as_number().unwrap_or(0.0) as i64;
        let start = args.pop().unwrap().as_number().unwrap_or(0.0) as i64;
        let mut result = Value::Null;
        for i in start..end {
            result.release(&mut rt.heap);
            let body_copy = body.retain(&rt.heap);
            result = rt.call(body_copy, vec![Value::Number(i as f64)]);
            if result.is_error() {
                body.release(&mut rt.heap);
                return result;
            }
        }
        body.release(&mut rt.heap);
        result
    });
    rt.set_var("for", for_fn, true);

    // `try thunk catch handler` — invokes `thunk`, and on error clears the
    // trace and forwards the rendered message to `handler` as a string.
    // `catch` itself is just a naming sentinel (spec glossary: "Tag ...
    // used to name sentinel options"), unused beyond occupying an arg slot.
    let catch_tag = rt.new_tag();
    rt.set_var("catch", catch_tag, true);
    let try_fn = rt.register_fn("try", 3, |rt, mut args| {
        let handler = args.pop().unwrap();
        let catch_marker = args.pop().unwrap();
        let thunk = args.pop().unwrap();
        catch_marker.release(&mut rt.heap);
        let res = rt.call(thunk, vec![]);
        if res.is_error() {
            let text = res.display(&rt.heap);
            res.release(&mut rt.heap);
            rt.trace.clear(&mut rt.heap);
            let msg = rt.new_string(&text);
            return rt.call(handler, vec![msg]);
        }
        handler.release(&mut rt.heap);
        res
    });
    rt.set_var("try", try_fn, true);
}

#[test]
fn scenario_1_no_operator_precedence() {
    let mut rt = Runtime::default();
    register_stdlib(&mut rt);
    let v = rt.eval("let x = 1 + 2 * 3\nx", EvalDisposition::Propagate);
    assert_eq!(v.as_number(), Some(9.0));
}

#[test]
fn scenario_2_function_application() {
    let mut rt = Runtime::default();
    register_stdlib(&mut rt);
    let v = rt.eval("let f = function x do x + 1 end\nf 41", EvalDisposition::Propagate);
    assert_eq!(v.as_number(), Some(42.0));
}

#[test]
fn scenario_3_table_constructor_and_lookup() {
    let mut rt = Runtime::default();
    register_stdlib(&mut rt);
    let v = rt.eval("let t = table \"a\" 1 \"b\" 2\nt \"a\"", EvalDisposition::Propagate);
    assert_eq!(v.as_number(), Some(1.0));

    let missing = rt.eval("t \"c\"", EvalDisposition::Propagate);
    assert!(missing.is_null());
}

#[test]
fn scenario_4_array_constructor_and_indexing() {
    let mut rt = Runtime::default();
    register_stdlib(&mut rt);
    let v = rt.eval("let a = array 10 20 30\na 1", EvalDisposition::Propagate);
    assert_eq!(v.as_number(), Some(20.0));

    let oob = rt.eval("a 9", EvalDisposition::Propagate);
    assert!(oob.is_null());
}

#[test]
fn scenario_5_try_catch_clears_trace() {
    let mut rt = Runtime::default();
    register_stdlib(&mut rt);
    let v = rt.eval(
        "let v = try (function do 1 / 0 end) catch with e do e end\nv",
        EvalDisposition::Propagate,
    );
    assert!(!v.is_error());
    assert_eq!(v.display(&rt.heap), "Division by zero");
    assert!(rt.trace.is_empty());
}

#[test]
fn scenario_6_for_loop_order_and_result() {
    let mut rt = Runtime::default();
    register_stdlib(&mut rt);
    let v = rt.eval("for 1 4 with i do i end", EvalDisposition::Propagate);
    assert_eq!(v.as_number(), Some(3.0));
}

#[test]
fn scenario_7_lexical_capture_by_source_range() {
    // Capture by source-range containment only holds for the dynamic extent
    // of the defining frame: the inner thunk must be invoked while `g`'s own
    // frame (holding `y`) is still on the scope stack, not after `g` has
    // already returned it to an outer caller.
    let mut rt = Runtime::default();
    register_stdlib(&mut rt);
    let v = rt.eval(
        "let g = function do\nlet y = 10\ninvoke (function do y end)\nend\ninvoke g",
        EvalDisposition::Propagate,
    );
    assert_eq!(v.as_number(), Some(10.0));
}
