//! Spec §8: table insert/replace/duplicate outcomes and array indexing via
//! the call dispatcher (`call(table, [k])`, `call(array, [i])`).

use unum::{ArrRepr, EvalDisposition, InsertOutcome, Runtime, Value};

fn key(rt: &mut Runtime, s: &str) -> Value {
    rt.new_string(s)
}

#[test]
fn insert_then_dispatch_lookup_returns_value() {
    let mut rt = Runtime::default();
    let table_id = rt.heap.alloc_table(8);

    let k = key(&mut rt, "a");
    let outcome = rt.table_insert(table_id, k, Value::Number(1.0), false);
    assert_eq!(outcome, InsertOutcome::Ok);

    let a_key = key(&mut rt, "a");
    let looked_up = rt.call(Value::Table(table_id), vec![a_key]);
    assert_eq!(looked_up.as_number(), Some(1.0));

    let c_key = key(&mut rt, "c");
    let missing = rt.call(Value::Table(table_id), vec![c_key]);
    assert!(missing.is_null());
}

#[test]
fn duplicate_insert_without_replace_leaves_table_unchanged() {
    let mut rt = Runtime::default();
    let table_id = rt.heap.alloc_table(8);

    let k1 = key(&mut rt, "a");
    let outcome1 = rt.table_insert(table_id, k1, Value::Number(1.0), false);
    assert_eq!(outcome1, InsertOutcome::Ok);

    let k2 = key(&mut rt, "a");
    let outcome2 = rt.table_insert(table_id, k2, Value::Number(2.0), false);
    assert_eq!(outcome2, InsertOutcome::Duplicate);

    let a_key = key(&mut rt, "a");
    let still_one = rt.call(Value::Table(table_id), vec![a_key]);
    assert_eq!(still_one.as_number(), Some(1.0));
}

#[test]
fn replace_true_overwrites_existing_key() {
    let mut rt = Runtime::default();
    let table_id = rt.heap.alloc_table(8);

    let k1 = key(&mut rt, "a");
    rt.table_insert(table_id, k1, Value::Number(1.0), false);
    let k2 = key(&mut rt, "a");
    let outcome = rt.table_insert(table_id, k2, Value::Number(2.0), true);
    assert_eq!(outcome, InsertOutcome::Ok);

    let a_key = key(&mut rt, "a");
    let now_two = rt.call(Value::Table(table_id), vec![a_key]);
    assert_eq!(now_two.as_number(), Some(2.0));
}

#[test]
fn array_index_in_range_and_out_of_range() {
    let mut rt = Runtime::default();
    let id = rt.heap.alloc_array(vec![Value::Number(10.0), Value::Number(20.0), Value::Number(30.0)]);

    let in_range = rt.call_borrowed(&Value::Array(ArrRepr::Heap(id)), vec![Value::Number(1.0)]);
    assert_eq!(in_range.as_number(), Some(20.0));

    let out_of_range = rt.call_borrowed(&Value::Array(ArrRepr::Heap(id)), vec![Value::Number(9.0)]);
    assert!(out_of_range.is_null());

    rt.heap.dec_ref(id);
}

#[test]
fn array_push_then_pop_round_trip() {
    let mut rt = Runtime::default();
    let id = rt.heap.alloc_array(Vec::new());
    assert!(rt.array_push(id, Value::Number(1.0)));
    assert!(rt.array_push(id, Value::Number(2.0)));
    assert_eq!(rt.heap.get_array(id).len(), 2);
    rt.heap.dec_ref(id);
}

#[test]
fn eval_table_member_call_binds_self() {
    let mut rt = Runtime::default();
    // `t "greet" self` style member-call sugar: dispatching a table with >=2
    // args looks up the first arg, then calls the result with `self` bound.
    let greeter = rt.register_fn("greet-impl", 1, |rt, mut args| {
        let self_val = args.pop().unwrap();
        let Value::Table(id) = self_val else { unreachable!() };
        rt.call(Value::Table(id), vec![rt.new_string("name")])
    });

    let table_id = rt.heap.alloc_table(4);
    let name_key = key(&mut rt, "name");
    let name_val = rt.new_string("ada");
    rt.table_insert(table_id, name_key, name_val, false);

    let greet_key = key(&mut rt, "greet");
    rt.table_insert(table_id, greet_key, greeter, false);

    let greet_key = key(&mut rt, "greet");
    let result = rt.call(Value::Table(table_id), vec![greet_key, Value::Null]);
    assert_eq!(result.display(&rt.heap), "ada");
}

#[test]
fn round_trip_smoke_eval() {
    let mut rt = Runtime::default();
    let v = rt.eval("42", EvalDisposition::Propagate);
    assert_eq!(v.as_number(), Some(42.0));
}
