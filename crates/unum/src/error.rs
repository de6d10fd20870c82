//! The `%N` blame-placeholder renderer (spec §4.7, §7). Errors are not a
//! Rust-level exception channel here — they are ordinary `Value::Err`s
//! returned up the call chain, mirroring
//! `examples/original_source/src/interpreter.c`'s `val_should_propagate`
//! (propagation-worthy values are exactly `Error` and the early-return
//! marker). A Rust `Result` is reserved for host-API-boundary plumbing
//! (`lib.rs`'s public entry points), not for everyday evaluation.

use crate::value::Value;

/// Renders a message's `%0`..`%9` placeholders against the blamed-values
/// list (spec §4.7). Any `%` not followed by an ASCII digit is passed
/// through literally, matching a conservative reading of the original's
/// substitution behavior.
pub fn render_message(template: &str, blamed: &[Value], heap: &Heap) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();
    while let Some((_, c)) = chars.next() {
        if c == '%' {
            if let Some(&(_, d)) = chars.peek() {
                if d.is_ascii_digit() {
                    chars.next();
                    let idx = d.to_digit(10).unwrap() as usize;
                    match blamed.get(idx) {
                        Some(v) => out.push_str(&v.display(heap)),
                        None => {
                            out.push('%');
                            out.push(d);
                        }
                    }
                    continue;
                }
            }
        }
        out.push(c);
    }
    out
}
