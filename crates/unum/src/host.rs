//! Host I/O sinks (spec §6: "I/O sinks: set `(print_bytes, print_value,
//! err_context)`").
//!
//! Grounded line-for-line on `ouros::io::PrintWriter`/`StdPrint`/
//! `CollectStringPrint`/`NoPrint`: a trait the embedder implements (or picks a
//! provided default for) plus a handful of ready-made implementations for the
//! common cases — write to stdout, collect into a string for tests, or
//! discard entirely.

use crate::heap::Heap;
use crate::value::Value;

/// Sink for everything the runtime writes on the host's behalf: print-style
/// builtins writing value text, and the error renderer writing a rendered
/// trace (spec §4.7/§7's "print" disposition).
pub trait HostIo {
    /// Writes raw bytes to the sink's primary output stream.
    fn print_bytes(&mut self, bytes: &[u8]);

    /// Writes a value's display form (spec §6: `print_value`). The default
    /// forwards to [`Self::print_bytes`] via [`Value::display`]; sinks that
    /// want structure-aware printing (e.g. syntax-highlighted output) can
    /// override this directly.
    fn print_value(&mut self, v: &Value, heap: &Heap) {
        self.print_bytes(v.display(heap).as_bytes());
    }

    /// Writes rendered error context (spec §6: `err_context`) — the output of
    /// [`crate::trace_log::TraceLog::render`] at the "print" disposition.
    fn err_context(&mut self, rendered: &str);
}

/// Default sink: stdout for prints, stderr for error context. Grounded on
/// `ouros::io::StdPrint`.
#[derive(Debug, Default)]
pub struct StdIo;

impl HostIo for StdIo {
    fn print_bytes(&mut self, bytes: &[u8]) {
        use std::io::Write as _;
        let _ = std::io::stdout().write_all(bytes);
    }

    fn err_context(&mut self, rendered: &str) {
        eprintln!("{rendered}");
    }
}

/// Collects everything written to it into owned strings — useful for tests
/// and embedders that want to capture output rather than inherit the
/// process's stdio. Grounded on `ouros::io::CollectStringPrint`.
#[derive(Debug, Default)]
pub struct CollectIo {
    pub out: String,
    pub err: String,
}

impl CollectIo {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HostIo for CollectIo {
    fn print_bytes(&mut self, bytes: &[u8]) {
        self.out.push_str(&String::from_utf8_lossy(bytes));
    }

    fn err_context(&mut self, rendered: &str) {
        self.err.push_str(rendered);
        self.err.push('\n');
    }
}

/// Discards everything. Grounded on `ouros::io::NoPrint`.
#[derive(Debug, Default)]
pub struct NoIo;

impl HostIo for NoIo {
    fn print_bytes(&mut self, _bytes: &[u8]) {}
    fn err_context(&mut self, _rendered: &str) {}
}
