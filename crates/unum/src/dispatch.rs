//! The call dispatcher (spec §4.3): uniform invocation over every callable
//! variant. Grounded directly on `beryl_call` in
//! `examples/original_source/src/beryl.c` — that function (not the older
//! `call_internal_fn`-only dispatch in `interpreter.c`) is the one that
//! already separates table/array/null handling the way spec §4.3 describes,
//! so it is followed closely here.
//!
//! Ownership contract (spec §4.3, §5): `call` always consumes one reference
//! of `callee` and of every value in `args`, on every exit path — success,
//! error, or early return. [`call_borrowed`] is the Rust shape of the spec's
//! `borrow=true` mode: callers holding a `&Value` they don't want to give up
//! retain a copy first, then forward to the owning [`call`].

use crate::environment::Namespace;
use crate::function;
use crate::heap::HeapId;
use crate::runtime::Runtime;
use crate::value::{ExtFnId, Value};

/// Invokes `callee` with `args`, consuming both. This is the single entry
/// point every evaluator call site and every host `call`/`pcall` goes
/// through.
pub fn call(rt: &mut Runtime, callee: Value, args: Vec<Value>) -> Value {
    match callee {
        Value::ExtFunction(id) => call_ext_fn(rt, id, args),
        Value::Function(f) => {
            let res = function::call_scripted(rt, &f, args);
            function::resolve_return(rt, res)
        }
        Value::Table(id) => call_table(rt, id, args),
        Value::Array(_) => call_array(rt, callee, args),
        Value::Null => {
            Value::release_all(args, &mut rt.heap);
            Value::Null
        }
        Value::Object(id) => rt.heap.call_object(id, args),
        other => {
            rt.trace.blame(&other, &rt.heap);
            other.release(&mut rt.heap);
            Value::release_all(args, &mut rt.heap);
            Value::new_error("Attempting to call non-function value")
        }
    }
}

/// `call`, but borrowing `callee` instead of consuming it (spec §4.3's
/// `borrow=true`): retains a copy and forwards to the owning path.
pub fn call_borrowed(rt: &mut Runtime, callee: &Value, args: Vec<Value>) -> Value {
    let owned = callee.retain(&rt.heap);
    call(rt, owned, args)
}

fn call_ext_fn(rt: &mut Runtime, id: ExtFnId, args: Vec<Value>) -> Value {
    let idx = id.0 as usize;
    let Some(Some(mut ext_fn)) = rt.ext_fns.get_mut(idx).map(std::mem::take) else {
        Value::release_all(args, &mut rt.heap);
        return Value::new_error("Attempting to call non-function value");
    };

    let n_args = args.len() as i64;
    let arity_ok = if ext_fn.arity >= 0 {
        n_args == i64::from(ext_fn.arity)
    } else {
        // Negative arity encodes "at least `-(arity + 1)` args" (varargs
        // external functions), mirroring the original's convention for
        // `get_fn_arity` on variadic internal functions.
        let min = -(ext_fn.arity + 1);
        n_args >= i64::from(min)
    };

    if !arity_ok {
        let too_many = ext_fn.arity >= 0 && n_args > i64::from(ext_fn.arity);
        let name = ext_fn.name.clone();
        Value::release_all(args, &mut rt.heap);
        rt.ext_fns[idx] = Some(ext_fn);
        rt.trace.push_named(&name);
        return Value::new_error(if too_many { "Too many arguments" } else { "Not enough arguments" });
    }

    tracing::trace!(name = %ext_fn.name, argc = args.len(), "calling external function");
    let res = (ext_fn.callback)(rt, args);
    let name = ext_fn.name.clone();
    rt.ext_fns[idx] = Some(ext_fn);
    if res.is_error() {
        rt.trace.push_named(&name);
    }
    res
}

/// Table dispatch (spec §4.3): one argument indexes; two-or-more binds `self`
/// and recurses on the looked-up member (member-call sugar).
fn call_table(rt: &mut Runtime, id: HeapId, mut args: Vec<Value>) -> Value {
    if args.is_empty() {
        rt.heap.dec_ref(id);
        return Value::new_error("Cannot index table without key");
    }
    if args.len() == 1 {
        let key = args.pop().unwrap();
        let res = index_table(rt, id, &key);
        key.release(&mut rt.heap);
        rt.heap.dec_ref(id);
        return res;
    }

    let key = args.remove(0);
    let member = index_table(rt, id, &key);
    key.release(&mut rt.heap);

    let guard = rt.env.scopes.enter();
    if let Err(e) = rt.env.scopes.declare("self", Value::Table(id), Namespace::Global, &mut rt.heap) {
        rt.env.scopes.leave(guard, &mut rt.heap);
        Value::release_all(args, &mut rt.heap);
        member.release(&mut rt.heap);
        return e;
    }

    let res = call(rt, member, args);
    rt.env.scopes.leave(guard, &mut rt.heap);
    res
}

/// Looks up `key` in table `id` without consuming `id`'s reference (the
/// caller owns that decision); returns a retained copy of the stored value,
/// or `Null` if absent (spec §4.3).
fn index_table(rt: &mut Runtime, id: HeapId, key: &Value) -> Value {
    rt.heap.get_table(id).get(key, &rt.heap).map(|v| v.retain(&rt.heap)).unwrap_or(Value::Null)
}

/// Array dispatch (spec §4.3): exactly one integer argument indexes;
/// out-of-range yields `Null` rather than an error.
fn call_array(rt: &mut Runtime, callee: Value, mut args: Vec<Value>) -> Value {
    if args.len() != 1 {
        callee.release(&mut rt.heap);
        Value::release_all(args, &mut rt.heap);
        return Value::new_error("Can only index array with a single index");
    }
    let index_val = args.pop().unwrap();
    if !index_val.is_integer() {
        rt.trace.blame(&index_val, &rt.heap);
        index_val.release(&mut rt.heap);
        callee.release(&mut rt.heap);
        return Value::new_error("Can only index array with integer values");
    }
    let idx = index_val.as_number().unwrap_or(-1.0);
    index_val.release(&mut rt.heap);

    let items = crate::value::array_slice(&callee, &rt.heap);
    let res = if idx < 0.0 || idx as usize >= items.len() {
        Value::Null
    } else {
        items[idx as usize].retain(&rt.heap)
    };
    callee.release(&mut rt.heap);
    res
}
