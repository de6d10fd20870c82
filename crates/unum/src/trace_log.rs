//! The error trace buffer (spec §4.7, §7): source-range frames, named
//! frames, and up to 8 blamed values, accumulated as an error unwinds and
//! consumed at an `eval` boundary (propagate / catch / print).
//!
//! Grounded on the `{src_start, src_end, at, length}` / `{name, len}` frame
//! shapes and the `beryl_blame_arg` bound list described in spec §4.7; the
//! 8-slot cap is spec-mandated, not arbitrary.

use smallvec::SmallVec;

use crate::value::Value;

pub const MAX_BLAMED: usize = 8;

/// Small-size-optimized per spec §4.7's "up to 8" bound — grounded on
/// `ouros::args::ArgValues`'s use of `smallvec` for the common-case-is-small
/// collections on the call path.
pub type BlamedValues = SmallVec<[Value; MAX_BLAMED]>;

#[derive(Debug, Clone)]
pub enum TraceFrame {
    /// A span of source text implicated in the failure, captured at the
    /// token that triggered propagation.
    SourceRange { start: u32, end: u32 },
    /// The name of a callee whose invocation failed (external functions are
    /// named by their host-registered identifier, not a source range).
    Named { name: Box<str> },
}

/// Per-runtime trace accumulator. One instance lives on
/// [`crate::runtime::Runtime`]; never process-global (spec §5).
pub struct TraceLog {
    frames: Vec<TraceFrame>,
    blamed: BlamedValues,
    /// `STACK_TRACE_MAX` (spec §4.7, [`crate::config::RuntimeConfig::trace_frame_limit`]):
    /// once the frame list reaches this length, further frames are dropped
    /// rather than growing the buffer without bound — a long propagation
    /// chain still reports its innermost frames, just not every one above
    /// the cap.
    limit: usize,
}

impl Default for TraceLog {
    fn default() -> Self {
        Self::with_limit(crate::config::DEFAULT_TRACE_FRAME_LIMIT)
    }
}

impl TraceLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(limit: usize) -> Self {
        Self { frames: Vec::new(), blamed: BlamedValues::new(), limit }
    }

    pub fn push_source_range(&mut self, start: u32, end: u32) {
        if self.frames.len() < self.limit {
            self.frames.push(TraceFrame::SourceRange { start, end });
        }
    }

    pub fn push_named(&mut self, name: &str) {
        if self.frames.len() < self.limit {
            self.frames.push(TraceFrame::Named { name: name.into() });
        }
    }

    /// Retains and appends `v` to the blamed-values list, silently dropping
    /// it (after releasing) once the 8-slot cap is reached — a blame call
    /// past the cap is a logging nicety, not something that should itself
    /// be able to fail the operation that triggered it.
    pub fn blame(&mut self, v: &Value, heap: &crate::heap::Heap) {
        if self.blamed.len() < MAX_BLAMED {
            self.blamed.push(v.retain(heap));
        }
    }

    pub fn frames(&self) -> &[TraceFrame] {
        &self.frames
    }

    pub fn blamed(&self) -> &[Value] {
        &self.blamed
    }

    /// Clears the trace, releasing every blamed value (spec §4.7 "catch"
    /// disposition).
    pub fn clear(&mut self, heap: &mut crate::heap::Heap) {
        self.frames.clear();
        for v in self.blamed.drain(..) {
            v.release(heap);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty() && self.blamed.is_empty()
    }

    /// Renders the trace for the "print" disposition: reversed frames (most
    /// recent failure first), each frame's source span with a caret
    /// underline when it falls inside `source`, followed by the blamed
    /// values and the already-`%N`-substituted message.
    pub fn render(&self, source: &str, message: &str, heap: &crate::heap::Heap) -> String {
        let mut out = String::new();
        for frame in self.frames.iter().rev() {
            match frame {
                TraceFrame::SourceRange { start, end } => {
                    let start = *start as usize;
                    let end = (*end as usize).max(start);
                    if end <= source.len() {
                        let line_start = source[..start].rfind('\n').map_or(0, |i| i + 1);
                        let line_end = source[end..].find('\n').map_or(source.len(), |i| end + i);
                        out.push_str(&source[line_start..line_end]);
                        out.push('\n');
                        out.push_str(&" ".repeat(start - line_start));
                        out.push_str(&"^".repeat((end - start).max(1)));
                        out.push('\n');
                    }
                }
                TraceFrame::Named { name } => {
                    out.push_str("  in ");
                    out.push_str(name);
                    out.push('\n');
                }
            }
        }
        if !self.blamed.is_empty() {
            out.push_str("blamed: ");
            let rendered: Vec<String> = self.blamed.iter().map(|v| v.display(heap)).collect();
            out.push_str(&rendered.join(", "));
            out.push('\n');
        }
        out.push_str(message);
        out
    }
}
