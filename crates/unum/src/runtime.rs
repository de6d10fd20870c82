//! The embeddable runtime record (spec §5, §6): every piece of state a
//! `unum` program needs, bundled into one struct instead of the original's
//! process-wide globals (`static Heap heap`, `static ScopeStack scopes`, a
//! process-wide `TraceLog` and argument stack). Spec §5 calls this out
//! explicitly ("scope state to a per-instance runtime record... trading a
//! little ergonomic convenience for safe concurrent embedding"), and it is
//! also what makes `#[test]`s able to run in parallel without sharing heap
//! state — grounded on `ouros::Interpreter` bundling its heap/globals/tracer
//! the same way.

use crate::argstack::ArgStack;
use crate::config::RuntimeConfig;
use crate::dispatch;
use crate::environment::Environment;
use crate::eval::{self, until_eof};
use crate::heap::Heap;
use crate::host::{HostIo, StdIo};
use crate::lexer::Lexer;
use crate::trace_log::TraceLog;
use crate::value::{ArrRepr, ExtFnId, StrRepr, Value};

/// A host-registered external function: a name (used in trace frames and
/// arity-error messages), an arity contract, and the callback itself.
///
/// Arity follows the original's convention (spec §4.3, §6): a non-negative
/// value is an exact argument count; a negative value `-(n+1)` means "at
/// least `n` arguments" (variadic).
pub struct ExtFn {
    pub name: Box<str>,
    pub arity: i32,
    pub callback: Box<dyn FnMut(&mut Runtime, Vec<Value>) -> Value>,
}

/// How an `eval`'d error should be handled once it propagates out of the
/// evaluated source (spec §4.7, §6): propagate it further, swallow it after
/// logging, or render and print it through the host's I/O sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalDisposition {
    Propagate,
    Catch,
    Print,
}

/// The whole interpreter: heap, environment, argument stack, trace buffer,
/// external-function registry, host I/O sink, and sizing configuration.
/// Never `Clone`/`Send`/`Sync` (spec §5's single-writer, non-atomic model) —
/// an embedder wanting concurrency runs one `Runtime` per thread.
pub struct Runtime {
    pub heap: Heap,
    pub env: Environment,
    pub args: ArgStack,
    pub trace: TraceLog,
    pub config: RuntimeConfig,
    pub io: Box<dyn HostIo>,
    pub(crate) ext_fns: Vec<Option<ExtFn>>,
    pub(crate) rec_counter: u32,
    /// Current expression-nesting depth (spec §4.6: "Expression recursion is
    /// capped (≈128) to prevent stack overflow from adversarial input"),
    /// incremented/decremented around every [`crate::eval::eval_expr`] call.
    pub(crate) expr_depth: u32,
    pub(crate) return_slot: Option<Value>,
    tag_counter: u64,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new(RuntimeConfig::default())
    }
}

impl Runtime {
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            env: Environment::new(config.globals_capacity),
            heap: Heap::new(),
            args: ArgStack::new(),
            trace: TraceLog::with_limit(config.trace_frame_limit),
            expr_depth: 0,
            config,
            io: Box::new(StdIo),
            ext_fns: Vec::new(),
            rec_counter: 0,
            return_slot: None,
            tag_counter: 0,
        }
    }

    /// Replaces the host I/O sink (spec §6: "I/O sinks").
    pub fn set_io(&mut self, io: Box<dyn HostIo>) {
        self.io = io;
    }

    /// Mints a fresh, globally-unique `Tag` value (spec §3.1: "opaque
    /// identity, equal only to itself"). Monotonic per-runtime counter, like
    /// `beryl_new_tag`'s process-wide one, just scoped down.
    pub fn new_tag(&mut self) -> Value {
        self.tag_counter += 1;
        Value::Tag(self.tag_counter)
    }

    /// Builds a string `Value`, choosing the inline encoding when it fits in
    /// a word and heap-allocating otherwise (spec §6's "value construction"
    /// ABI). This is the same logic the evaluator uses for string literals;
    /// exposed here too so a host embedding `unum` (the CLI's `argv`
    /// binding, for instance) doesn't need its own copy.
    pub fn new_string(&mut self, s: &str) -> Value {
        match StrRepr::inline(s) {
            Some(repr) => Value::Str(repr),
            None => Value::Str(StrRepr::Heap(self.heap.alloc_string(s.as_bytes()))),
        }
    }

    /// Builds an array `Value` from already-owned items (spec §6's "value
    /// construction" ABI).
    pub fn new_array(&mut self, items: Vec<Value>) -> Value {
        Value::Array(ArrRepr::Heap(self.heap.alloc_array(items)))
    }

    /// Builds an empty table `Value` with the given capacity, or
    /// [`RuntimeConfig::default_table_capacity`] when `capacity` is `None`
    /// (spec §6's `new_table(capacity, pad?)`).
    pub fn new_table(&mut self, capacity: Option<u32>) -> Value {
        let cap = capacity.unwrap_or(self.config.default_table_capacity);
        Value::Table(self.heap.alloc_table(cap))
    }

    /// Host ABI `table_insert(table, key, value, replace?)` (spec §6):
    /// consumes `key`/`value`, returns the structured outcome the spec
    /// describes (`{ok, duplicate, full, bad_key}`, realized as
    /// [`crate::heap::InsertOutcome`] rather than four separate booleans).
    pub fn table_insert(&mut self, table: crate::heap::HeapId, key: Value, value: Value, replace: bool) -> crate::heap::InsertOutcome {
        self.heap.table_insert(table, key, value, replace)
    }

    /// Host ABI `array_push(array, value) -> ok/fail` (spec §6). A Rust
    /// `Vec`-backed array has no fixed capacity to exhaust the way the
    /// original's manually-managed array does, so this always succeeds;
    /// the `bool` return is kept to match the ABI shape a host written
    /// against the spec's contract expects.
    pub fn array_push(&mut self, array: crate::heap::HeapId, value: Value) -> bool {
        self.heap.array_push(array, value);
        true
    }

    /// Registers a host function and returns the `Value` that calls it.
    /// Corresponds to spec §6's "value constructors... for... external
    /// functions".
    pub fn register_fn(
        &mut self,
        name: &str,
        arity: i32,
        callback: impl FnMut(&mut Runtime, Vec<Value>) -> Value + 'static,
    ) -> Value {
        let id = ExtFnId(self.ext_fns.len() as u32);
        self.ext_fns.push(Some(ExtFn { name: name.into(), arity, callback: Box::new(callback) }));
        Value::ExtFunction(id)
    }

    /// Host ABI `set_var` (spec §6): writes `value` into the current scope
    /// (global when outside any call), creating or overwriting.
    pub fn set_var(&mut self, name: &str, value: Value, as_const: bool) -> bool {
        self.env.set_var(name, value, as_const, &mut self.heap)
    }

    /// Host ABI `call`/`pcall` (spec §6): invokes `callee` with `args`,
    /// consuming both.
    pub fn call(&mut self, callee: Value, args: Vec<Value>) -> Value {
        dispatch::call(self, callee, args)
    }

    /// Same as [`Self::call`], but borrows `callee` (spec §4.3's `borrow`
    /// mode) instead of consuming it.
    pub fn call_borrowed(&mut self, callee: &Value, args: Vec<Value>) -> Value {
        dispatch::call_borrowed(self, callee, args)
    }

    /// `pcall`: call, but always clear any resulting error trace afterward
    /// (spec §6), optionally logging it through the host I/O sink first.
    /// Grounded on `beryl_pcall`.
    pub fn pcall(&mut self, callee: Value, args: Vec<Value>, log_err: bool) -> Value {
        let res = self.call(callee, args);
        if log_err && res.is_error() {
            let message = crate::error::render_message(&res.display(&self.heap), self.trace.blamed(), &self.heap);
            let rendered = self.trace.render("", &message, &self.heap);
            self.io.err_context(&rendered);
        }
        self.trace.clear(&mut self.heap);
        res
    }

    /// Host ABI `blame_arg` (spec §6): attaches a value to the trace buffer
    /// for the next rendered error, without consuming it.
    pub fn blame_arg(&mut self, v: &Value) {
        self.trace.blame(v, &self.heap);
    }

    /// Host ABI `eval(src, disposition)` (spec §6): parses and evaluates a
    /// whole source buffer from a fresh top-level scope, applying the given
    /// error disposition to whatever the final expression produces.
    ///
    /// The original's `beryl_eval` takes a `new_scope` flag; it is dropped
    /// here; see DESIGN.md Open Question — every `let` that isn't
    /// `let global` already lands in the call-frame scope the two-tier
    /// `Environment` gives every evaluation, and top-level `let` still goes
    /// straight to the persistent globals table regardless, so there is no
    /// remaining behavioral distinction for the flag to control.
    pub fn eval(&mut self, src: &str, disposition: EvalDisposition) -> Value {
        let source: std::rc::Rc<str> = std::rc::Rc::from(src);
        let mut lex = Lexer::new(&source);
        let guard = self.env.scopes.enter();
        let prev_namespace = std::mem::replace(&mut self.env.namespace, crate::environment::Namespace::Global);

        let res = eval::eval_all(self, &mut lex, true, until_eof, &source);

        self.env.namespace = prev_namespace;
        self.env.scopes.leave(guard, &mut self.heap);

        if res.is_error() {
            match disposition {
                EvalDisposition::Propagate => res,
                EvalDisposition::Catch => {
                    self.trace.clear(&mut self.heap);
                    res
                }
                EvalDisposition::Print => {
                    let message = crate::error::render_message(&res.display(&self.heap), self.trace.blamed(), &self.heap);
                    let rendered = self.trace.render(&source, &message, &self.heap);
                    self.io.err_context(&rendered);
                    self.trace.clear(&mut self.heap);
                    res
                }
            }
        } else {
            res
        }
    }
}
