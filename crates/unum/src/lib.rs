//! `unum`: an embeddable, dynamically-typed scripting language runtime — a
//! tagged value model over a refcounted heap, a byte-oriented lexer, and a
//! single-pass tree-walking evaluator with no intermediate AST.
//!
//! See `SPEC_FULL.md` and `DESIGN.md` at the repository root for the full
//! specification and the ledger grounding each module in its reference
//! implementation.

mod argstack;
mod config;
mod dispatch;
mod environment;
mod error;
mod eval;
mod function;
mod hash;
mod heap;
mod host;
mod lexer;
mod runtime;
mod trace_log;
mod value;

pub use crate::{
    config::{RuntimeConfig, DEFAULT_EXPR_RECURSION_LIMIT, DEFAULT_RECURSION_LIMIT, DEFAULT_TRACE_FRAME_LIMIT},
    error::render_message,
    function::set_return_val,
    heap::{Heap, HeapId, HostObject, InsertOutcome, LEAKED},
    host::{CollectIo, HostIo, NoIo, StdIo},
    runtime::{EvalDisposition, ExtFn, Runtime},
    value::{array_slice, format_number, ArrRepr, ExtFnId, FnSlice, StrRepr, Tag, Value, INLINE_STR_MAX, MAX_EXACT_INT},
};
