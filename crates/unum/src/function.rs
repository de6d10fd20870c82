//! Scripted function invocation (spec §4.5) and early return (spec §4.8).
//!
//! Grounded on `call_internal_fn` in
//! `examples/original_source/src/interpreter.c`: re-lex the function's byte
//! range, bind parameters positionally (or bundle a trailing `...name` into a
//! fresh array) in a freshly entered scope namespaced to that byte range,
//! then run the body through the same parse-and-evaluate pass used at the
//! top level (`eval::eval_all`), which is also where the early-return
//! sentinel gets resolved back into the saved return value before the
//! function's own scope is torn down.

use crate::environment::Namespace;
use crate::eval::{self, until_eof};
use crate::lexer::{Lexer, TokenKind};
use crate::runtime::Runtime;
use crate::value::{ArrRepr, FnSlice, Value};

/// Invokes a scripted function value over `args`. Consumes `args` on every
/// path (spec §4.3's "dispatcher consumes callee+args" ownership contract,
/// which extends to this call-internal-fn step).
pub fn call_scripted(rt: &mut Runtime, f: &FnSlice, args: Vec<Value>) -> Value {
    if rt.rec_counter >= rt.config.recursion_limit {
        Value::release_all(args, &mut rt.heap);
        return Value::new_error("Recursion limit exceeded");
    }

    let guard = rt.env.scopes.enter();
    let namespace = Namespace::Local { source: f.source.clone(), start: f.start, end: f.end };

    let body_src = f.source.clone();
    let mut lex = Lexer::new(&body_src[f.start as usize..f.end as usize]);

    // The slice starts at the `function`/`with` keyword for TOK_FN-declared
    // functions, and at `do` itself for zero-arg `do ... end` thunks; either
    // way the keyword (if any) is optional here.
    lex.accept(|k| matches!(k, TokenKind::Fn));

    let n_args = args.len();
    let mut arg_iter = args.into_iter();
    let mut consumed = 0usize;

    loop {
        if lex.accept(|k| matches!(k, TokenKind::Do)).is_some() {
            break;
        }
        let tok = lex.pop();
        match tok.kind {
            TokenKind::Varargs => {
                let name_tok = lex.pop();
                let name = match name_tok.kind {
                    TokenKind::Symbol(s) | TokenKind::Op(s) => s,
                    _ => {
                        rt.env.scopes.leave(guard, &mut rt.heap);
                        Value::release_all(arg_iter, &mut rt.heap);
                        return Value::new_error("Expected varargs name");
                    }
                };
                let remaining: Vec<Value> = arg_iter.by_ref().collect();
                let id = rt.heap.alloc_array(remaining);
                let bundled = Value::Array(ArrRepr::Heap(id));
                if let Err(e) = rt.env.scopes.declare(name, bundled, namespace.clone(), &mut rt.heap) {
                    rt.env.scopes.leave(guard, &mut rt.heap);
                    return e;
                }
                consumed = n_args;
                // the `do` token itself still follows a varargs declaration
                lex.accept(|k| matches!(k, TokenKind::Do));
                break;
            }
            TokenKind::Symbol(name) | TokenKind::Op(name) => {
                let Some(val) = arg_iter.next() else {
                    rt.env.scopes.leave(guard, &mut rt.heap);
                    return Value::new_error("Not enough arguments provided when calling function");
                };
                consumed += 1;
                if let Err(e) = rt.env.scopes.declare(name, val, namespace.clone(), &mut rt.heap) {
                    rt.env.scopes.leave(guard, &mut rt.heap);
                    Value::release_all(arg_iter, &mut rt.heap);
                    return e;
                }
            }
            _ => {
                rt.env.scopes.leave(guard, &mut rt.heap);
                Value::release_all(arg_iter, &mut rt.heap);
                return Value::new_error("Not an argument");
            }
        }
    }

    if consumed != n_args {
        rt.env.scopes.leave(guard, &mut rt.heap);
        Value::release_all(arg_iter, &mut rt.heap);
        return Value::new_error("Too many arguments when calling function");
    }

    rt.rec_counter += 1;
    let prev_namespace = std::mem::replace(&mut rt.env.namespace, namespace);

    let res = eval::eval_all(rt, &mut lex, true, until_eof, &body_src);

    rt.env.namespace = prev_namespace;
    rt.rec_counter -= 1;

    rt.env.scopes.leave(guard, &mut rt.heap);
    res
}

/// Resolves the distinguished `MarkerReturn` sentinel into the value stashed
/// by the matching `return` host operation, clearing the slot (spec §4.8:
/// "single-shot, cleared on consumption"). No-op for anything else.
pub fn resolve_return(rt: &mut Runtime, res: Value) -> Value {
    if matches!(res, Value::MarkerReturn) {
        rt.return_slot.take().unwrap_or(Value::Null)
    } else {
        res
    }
}

/// Sets the process-wide return slot (spec §4.8: "a host-exposed 'return'
/// operation sets a ... return slot to the intended value and yields
/// MarkerReturn"). Only the first call before consumption takes effect,
/// matching `beryl_set_return_val`'s "if already null" guard.
pub fn set_return_val(rt: &mut Runtime, val: Value) {
    if rt.return_slot.is_none() {
        rt.return_slot = Some(val);
    } else {
        val.release(&mut rt.heap);
    }
}
