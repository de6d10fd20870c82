//! The recursive-descent parse-and-evaluate pass (spec §4.6): a single walk
//! over the token stream that both builds and immediately runs the program,
//! with no intermediate AST.
//!
//! Grounded line-for-line on `parse_eval_term`/`parse_eval_subexpr`/
//! `parse_eval_expr`/`parse_eval_all_exprs` in
//! `examples/original_source/src/interpreter.c`. The `eval: bool` flag
//! threaded through every function here is exactly that source's own
//! `eval` parameter: when false, every function still *parses* (so a
//! function literal's byte range comes out correct) but elides variable
//! lookups, calls, and bindings.
//!
//! Two deliberate departures from the original, both noted in DESIGN.md:
//! string literals become inline-or-heap `Value`s rather than a borrowed
//! `Static` pointer (this crate's `Value` carries no lifetime parameter, so
//! a literal's source bytes cannot be trusted to outlive it the way a
//! process-lifetime C string constant can); and the `current_assignment`
//! micro-optimization in `parse_eval_expr` (nulling a variable's slot right
//! before the call that will overwrite it) is dropped, since Rust's
//! ownership model doesn't need the defensive null it existed to provide.

use std::rc::Rc;

use crate::dispatch;
use crate::lexer::{Lexer, Token, TokenKind};
use crate::runtime::Runtime;
use crate::value::{FnSlice, Value};

/// Stop condition for a top-level program or a scripted function's body
/// (spec §4.5/§4.6): run until the token stream is exhausted.
pub fn until_eof(kind: &TokenKind<'_>) -> bool {
    matches!(kind, TokenKind::Eof)
}

/// Stop condition for a `do ... end` block's body.
pub fn until_end(kind: &TokenKind<'_>) -> bool {
    matches!(kind, TokenKind::End)
}

/// Values that abort evaluation of whatever contains them and must be
/// forwarded unevaluated up the call chain: errors (spec §4.7) and the
/// early-return sentinel (spec §4.8). Matches `val_should_propagate`.
fn should_propagate(v: &Value) -> bool {
    matches!(v, Value::Err(_) | Value::MarkerReturn)
}

/// A token that closes the *current* expression without being consumed by
/// it: a parenthesized group's `)`, end of input, or a `do` block's `end`.
fn should_end_expr(lex: &Lexer<'_>) -> bool {
    matches!(lex.peek().kind, TokenKind::CloseParen | TokenKind::Eof | TokenKind::End)
}

fn make_fn_value(source: &Rc<str>, start: u32, end: u32) -> Value {
    Value::Function(FnSlice { source: source.clone(), start, end })
}

/// Recognizes a compound-assignment operator like `+=`: two bytes, ending
/// in `=`, whose prefix is one of the classic arithmetic compound-assign
/// operators. Deliberately narrower than "any op token ending in `=`" so
/// that `==`, `!=`, `<=`, `>=` keep being ordinary comparison operators —
/// see DESIGN.md for why this line had to be drawn by hand (the reference
/// implementation in `examples/original_source/` has no `op=` construct at
/// all; spec §4.6 is the only source for this feature).
fn compound_assign_op(text: &str) -> Option<&str> {
    if text.len() == 2 && text.ends_with('=') {
        let prefix = &text[..1];
        if matches!(prefix, "+" | "-" | "*" | "/" | "%" | "^") {
            return Some(prefix);
        }
    }
    None
}

/// `name = expr`: evaluates the RHS as a full expression, then mutates the
/// nearest visible binding (spec §4.6's assignment form).
fn eval_plain_assignment(rt: &mut Runtime, lex: &mut Lexer<'_>, eval: bool, name: &str, name_tok: Token<'_>, source: &Rc<str>) -> Value {
    let res = eval_expr(rt, lex, eval, false, source);
    if should_propagate(&res) {
        return res;
    }
    if !eval {
        res.release(&mut rt.heap);
        return Value::Null;
    }
    let stored = res.retain(&rt.heap);
    if let Err(e) = rt.env.assign(name, stored, &mut rt.heap) {
        res.release(&mut rt.heap);
        rt.trace.push_source_range(name_tok.start, name_tok.end);
        return e;
    }
    res
}

/// `name op= expr`: looks up `name` and the operator function `op`, calls
/// `op(current, expr)`, and stores the result back into `name` (spec
/// §4.6).
fn eval_compound_assignment(
    rt: &mut Runtime,
    lex: &mut Lexer<'_>,
    eval: bool,
    name: &str,
    op: &str,
    name_tok: Token<'_>,
    source: &Rc<str>,
) -> Value {
    let rhs = eval_expr(rt, lex, eval, false, source);
    if should_propagate(&rhs) {
        return rhs;
    }
    if !eval {
        rhs.release(&mut rt.heap);
        return Value::Null;
    }
    let current = match rt.env.lookup(name) {
        Some(v) => v.retain(&rt.heap),
        None => {
            rhs.release(&mut rt.heap);
            rt.trace.push_source_range(name_tok.start, name_tok.end);
            return Value::new_error("Assignment to undeclared variable");
        }
    };
    let op_fn = match rt.env.lookup(op) {
        Some(v) => v.retain(&rt.heap),
        None => {
            current.release(&mut rt.heap);
            rhs.release(&mut rt.heap);
            rt.trace.push_source_range(name_tok.start, name_tok.end);
            return Value::new_error("Unknown operator function");
        }
    };
    let computed = dispatch::call(rt, op_fn, vec![current, rhs]);
    if computed.is_error() {
        rt.trace.push_source_range(name_tok.start, name_tok.end);
        return computed;
    }
    let stored = computed.retain(&rt.heap);
    if let Err(e) = rt.env.assign(name, stored, &mut rt.heap) {
        computed.release(&mut rt.heap);
        return e;
    }
    computed
}

/// A bare symbol or operator term: either a variable/function reference,
/// or the start of an assignment form (plain or compound).
fn eval_symbol_term(rt: &mut Runtime, lex: &mut Lexer<'_>, eval: bool, name: &str, tok: Token<'_>, source: &Rc<str>) -> Value {
    if lex.accept(|k| matches!(k, TokenKind::Assign)).is_some() {
        return eval_plain_assignment(rt, lex, eval, name, tok, source);
    }
    if let TokenKind::Op(op_text) = lex.peek().kind {
        if let Some(op) = compound_assign_op(op_text) {
            lex.pop();
            return eval_compound_assignment(rt, lex, eval, name, op, tok, source);
        }
    }
    if !eval {
        return Value::Null;
    }
    match rt.env.lookup(name) {
        Some(v) => v.retain(&rt.heap),
        None => {
            rt.trace.push_source_range(tok.start, tok.end);
            Value::new_error("Undeclared variable")
        }
    }
}

/// `let [global] name = expr` (spec §4.6).
fn eval_let(rt: &mut Runtime, lex: &mut Lexer<'_>, eval: bool, source: &Rc<str>) -> Value {
    let force_global = lex.accept(|k| matches!(k, TokenKind::Global)).is_some();
    let name_tok = lex.pop();
    let name = match name_tok.kind {
        TokenKind::Symbol(s) | TokenKind::Op(s) => s,
        _ => {
            rt.trace.push_source_range(name_tok.start, name_tok.end);
            return Value::new_error("Expected variable identifier");
        }
    };
    let assign_tok = lex.pop();
    if !matches!(assign_tok.kind, TokenKind::Assign) {
        rt.trace.push_source_range(assign_tok.start, assign_tok.end);
        return Value::new_error("Expected '='");
    }

    let res = eval_expr(rt, lex, eval, false, source);
    if should_propagate(&res) {
        return res;
    }
    if !eval {
        res.release(&mut rt.heap);
        return Value::Null;
    }

    let stored = res.retain(&rt.heap);
    match rt.env.declare(name, stored, force_global, &mut rt.heap) {
        Ok(()) => res,
        Err(e) => {
            res.release(&mut rt.heap);
            rt.trace.push_source_range(name_tok.start, name_tok.end);
            e
        }
    }
}

/// Parses (and, in execute mode, discards) a `do ... end` body, returning
/// the byte offset the `end` keyword starts at — the exclusive end of the
/// function's source slice. Always parses with `eval = false`: a thunk's
/// body isn't run when the thunk value is created, only when it is later
/// called (matching `parse_do_block`, which hardcodes `eval = false`
/// regardless of the enclosing pass's own `eval` flag).
fn parse_do_block(rt: &mut Runtime, lex: &mut Lexer<'_>, source: &Rc<str>) -> Result<u32, Value> {
    let res = eval_all(rt, lex, false, until_end, source);
    if res.is_error() {
        return Err(res);
    }
    res.release(&mut rt.heap);
    let end_tok = lex.pop();
    debug_assert!(matches!(end_tok.kind, TokenKind::End), "parse_do_block: expected 'end'");
    Ok(end_tok.start)
}

/// `do ... end` as a term: a zero-parameter scripted function value (spec
/// §4.6's "thunk").
fn eval_do_thunk(rt: &mut Runtime, lex: &mut Lexer<'_>, fn_start: u32, source: &Rc<str>) -> Value {
    match parse_do_block(rt, lex, source) {
        Ok(end) => make_fn_value(source, fn_start, end),
        Err(e) => e,
    }
}

/// `function p1 p2 ... [...varargs] do body end` (or `with` in place of
/// `function`) as a term. Parameter-list parsing mirrors
/// `crate::function::call_scripted`'s own re-lexing exactly, since both
/// must agree on where the body starts.
fn eval_fn_literal(rt: &mut Runtime, lex: &mut Lexer<'_>, fn_start: u32, source: &Rc<str>) -> Value {
    loop {
        if lex.accept(|k| matches!(k, TokenKind::Do)).is_some() {
            break;
        }
        let arg = lex.pop();
        match arg.kind {
            TokenKind::Varargs => {
                let name_tok = lex.pop();
                if !matches!(name_tok.kind, TokenKind::Symbol(_) | TokenKind::Op(_)) {
                    rt.trace.push_source_range(name_tok.start, name_tok.end);
                    return Value::new_error("Expected varargs name");
                }
                lex.accept(|k| matches!(k, TokenKind::Do));
                break;
            }
            TokenKind::Symbol(_) | TokenKind::Op(_) => {}
            _ => {
                rt.trace.push_source_range(arg.start, arg.end);
                return Value::new_error("Expected function argument name or 'do'");
            }
        }
    }
    match parse_do_block(rt, lex, source) {
        Ok(end) => make_fn_value(source, fn_start, end),
        Err(e) => e,
    }
}

/// Parses (and, if `eval`, evaluates) a single term: a literal, a
/// parenthesized sub-expression, a symbol/operator reference or
/// assignment, a `let` declaration, or a function/thunk literal. Matches
/// `parse_eval_term`.
fn eval_term(rt: &mut Runtime, lex: &mut Lexer<'_>, eval: bool, source: &Rc<str>) -> Value {
    let tok = lex.pop();
    match tok.kind {
        TokenKind::Symbol(name) | TokenKind::Op(name) => eval_symbol_term(rt, lex, eval, name, tok, source),
        TokenKind::Number(n) => Value::Number(n),
        TokenKind::Str(s) => rt.new_string(s),
        TokenKind::OpenParen => {
            let res = eval_expr(rt, lex, eval, true, source);
            if should_propagate(&res) {
                return res;
            }
            let close = lex.pop();
            if !matches!(close.kind, TokenKind::CloseParen) {
                rt.trace.push_source_range(close.start, close.end);
                res.release(&mut rt.heap);
                return Value::new_error("Expected closing parenthesis");
            }
            res
        }
        TokenKind::Let => eval_let(rt, lex, eval, source),
        TokenKind::Do => eval_do_thunk(rt, lex, tok.start, source),
        TokenKind::Fn => eval_fn_literal(rt, lex, tok.start, source),
        TokenKind::Err(e) => {
            rt.trace.push_source_range(tok.start, tok.end);
            Value::new_error(e.message())
        }
        TokenKind::Eof => {
            rt.trace.push_source_range(tok.start, tok.end);
            Value::new_error("Unexpected end of file")
        }
        TokenKind::Endline => {
            rt.trace.push_source_range(tok.start, tok.end);
            Value::new_error("Unexpected end of line")
        }
        TokenKind::Assign | TokenKind::Global | TokenKind::Varargs | TokenKind::CloseParen | TokenKind::End => {
            rt.trace.push_source_range(tok.start, tok.end);
            Value::new_error("Unexpected token")
        }
    }
}

/// A chain of left-associative binary-operator applications with **no
/// precedence** (spec §4.6): `a + b * c` evaluates as `(a + b) * c`,
/// because each operator symbol is just looked up and called like any
/// other function, in strict left-to-right order. Matches
/// `parse_eval_subexpr`.
fn eval_subexpr(rt: &mut Runtime, lex: &mut Lexer<'_>, eval: bool, source: &Rc<str>) -> Value {
    let mut term = eval_term(rt, lex, eval, source);
    if should_propagate(&term) {
        return term;
    }

    while let Some(op_tok) = lex.accept(|k| matches!(k, TokenKind::Op(_))) {
        let TokenKind::Op(op_name) = op_tok.kind else { unreachable!() };

        let op_fn = if eval {
            match rt.env.lookup(op_name) {
                Some(v) => Some(v.retain(&rt.heap)),
                None => {
                    term.release(&mut rt.heap);
                    rt.trace.push_source_range(op_tok.start, op_tok.end);
                    return Value::new_error("Unknown function");
                }
            }
        } else {
            None
        };

        let second = eval_term(rt, lex, eval, source);
        if should_propagate(&second) {
            term.release(&mut rt.heap);
            if let Some(f) = op_fn {
                f.release(&mut rt.heap);
            }
            return second;
        }

        let res = if eval {
            let res = dispatch::call(rt, op_fn.unwrap(), vec![term, second]);
            if res.is_error() {
                rt.trace.push_source_range(op_tok.start, op_tok.end);
            }
            res
        } else {
            term.release(&mut rt.heap);
            second.release(&mut rt.heap);
            Value::Null
        };

        if res.is_error() {
            return res;
        }
        term = res;
    }

    term
}

/// A full expression: one subexpression in callee position, followed by
/// zero or more subexpressions gathered as call arguments — juxtaposition
/// is call (spec §4.6). With zero trailing arguments the expression is
/// just the callee term itself. Matches `parse_eval_expr` (minus the
/// `current_assignment` micro-optimization — see the module doc).
///
/// Guards the recursion with [`Runtime::expr_depth`] against
/// `config.expr_recursion_limit` (spec §4.6's "capped at ~128" adversarial-
/// input protection) before doing any real work, so a pathologically
/// parenthesized source errors out cleanly instead of overflowing the
/// native call stack.
fn eval_expr(rt: &mut Runtime, lex: &mut Lexer<'_>, eval: bool, ignore_endlines: bool, source: &Rc<str>) -> Value {
    rt.expr_depth += 1;
    if rt.expr_depth > rt.config.expr_recursion_limit {
        rt.expr_depth -= 1;
        let tok = lex.peek();
        rt.trace.push_source_range(tok.start, tok.end);
        return Value::new_error("Expression nesting limit exceeded");
    }
    let res = eval_expr_inner(rt, lex, eval, ignore_endlines, source);
    rt.expr_depth -= 1;
    res
}

fn eval_expr_inner(rt: &mut Runtime, lex: &mut Lexer<'_>, eval: bool, ignore_endlines: bool, source: &Rc<str>) -> Value {
    let expr_start = lex.peek();
    let callee = eval_subexpr(rt, lex, eval, source);
    if should_propagate(&callee) {
        return callee;
    }

    let mark = rt.args.save();
    loop {
        if ignore_endlines {
            lex.accept(|k| matches!(k, TokenKind::Endline));
        } else if matches!(lex.peek().kind, TokenKind::Endline) {
            break;
        }
        if should_end_expr(lex) {
            break;
        }

        let arg = eval_subexpr(rt, lex, eval, source);
        if should_propagate(&arg) {
            callee.release(&mut rt.heap);
            rt.args.restore(mark, &mut rt.heap);
            return arg;
        }
        if !eval {
            arg.release(&mut rt.heap);
            continue;
        }
        rt.args.push(arg);
    }

    if !eval {
        callee.release(&mut rt.heap);
        return Value::Null;
    }

    let args = rt.args.drain_since(&mark);
    if args.is_empty() {
        return callee;
    }

    let res = dispatch::call(rt, callee, args);
    if res.is_error() {
        rt.trace.push_source_range(expr_start.start, expr_start.end);
    }
    res
}

/// Runs a sequence of newline-separated expressions until `until` matches
/// the next token, returning the last expression's value — or, if the
/// sequence ended via an early `return`, the stashed return value (spec
/// §4.8; matches `parse_eval_all_exprs`, which resolves `MarkerReturn` for
/// both top-level `eval` and function-body evaluation alike, since both
/// funnel through this same routine).
pub fn eval_all(rt: &mut Runtime, lex: &mut Lexer<'_>, eval: bool, until: fn(&TokenKind<'_>) -> bool, source: &Rc<str>) -> Value {
    lex.accept(|k| matches!(k, TokenKind::Endline));
    let mut res = Value::Null;
    while !until(&lex.peek().kind) {
        res.release(&mut rt.heap);
        res = eval_expr(rt, lex, eval, false, source);
        if should_propagate(&res) {
            break;
        }
        lex.accept(|k| matches!(k, TokenKind::Endline));
    }
    if matches!(res, Value::MarkerReturn) {
        res = rt.return_slot.take().unwrap_or(Value::Null);
    }
    res
}

#[cfg(test)]
mod tests {
    use crate::runtime::{EvalDisposition, Runtime};
    use crate::value::Value;

    fn eval_ok(src: &str) -> Value {
        let mut rt = Runtime::default();
        rt.eval(src, EvalDisposition::Propagate)
    }

    #[test]
    fn number_literal() {
        let mut rt = Runtime::default();
        let v = rt.eval("42", EvalDisposition::Propagate);
        assert_eq!(v.as_number(), Some(42.0));
    }

    #[test]
    fn parens_are_identity() {
        let mut rt = Runtime::default();
        let v = rt.eval("(1)", EvalDisposition::Propagate);
        assert_eq!(v.as_number(), Some(1.0));
    }

    #[test]
    fn string_literal() {
        let mut rt = Runtime::default();
        let v = rt.eval("\"hi\"", EvalDisposition::Propagate);
        assert_eq!(v.display(&rt.heap), "hi");
        v.release(&mut rt.heap);
    }

    #[test]
    fn no_operator_precedence() {
        // 1 + 2 * 3 evaluates as (1 + 2) * 3 = 9, not 1 + 6 = 7.
        let mut rt = Runtime::default();
        register_arith(&mut rt);
        let v = rt.eval("let x = 1 + 2 * 3\nx", EvalDisposition::Propagate);
        assert_eq!(v.as_number(), Some(9.0));
    }

    #[test]
    fn undeclared_variable_is_an_error() {
        let v = eval_ok("nope");
        assert!(v.is_error());
    }

    #[test]
    fn deeply_nested_parens_hit_the_expression_recursion_limit() {
        use crate::config::RuntimeConfig;
        let mut rt = Runtime::new(RuntimeConfig::new().expr_recursion_limit(8));
        let src = format!("{}1{}", "(".repeat(20), ")".repeat(20));
        let v = rt.eval(&src, EvalDisposition::Propagate);
        assert!(v.is_error());
        v.release(&mut rt.heap);
    }

    fn register_arith(rt: &mut Runtime) {
        let add = rt.register_fn("+", 2, |rt, mut args| {
            let b = args.pop().unwrap().as_number().unwrap_or(0.0);
            let a = args.pop().unwrap().as_number().unwrap_or(0.0);
            Value::Number(a + b)
        });
        rt.set_var("+", add, true);
        let mul = rt.register_fn("*", 2, |rt, mut args| {
            let b = args.pop().unwrap().as_number().unwrap_or(0.0);
            let a = args.pop().unwrap().as_number().unwrap_or(0.0);
            Value::Number(a * b)
        });
        rt.set_var("*", mul, true);
    }
}
