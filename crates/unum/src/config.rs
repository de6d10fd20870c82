//! Runtime sizing knobs. Grounded on `ouros::resource::ResourceLimits`'s
//! builder-with-serde shape: a plain data struct with `#[must_use]` setter
//! methods, rather than a constructor taking a dozen positional arguments.
//!
//! Every field here corresponds to a compile-time constant in the original C
//! runtime (`STATIC_STACK_SIZE`, `EXPR_ARG_STACK_SIZE`, `RECURSION_LIMIT`,
//! `STACK_TRACE_MAX`, globals table size); making them runtime-configurable
//! instead is a deliberate embedding convenience documented in DESIGN.md, not
//! a semantic change — spec §4.5/§4.6's recursion caps are still enforced,
//! just against a field instead of a `#define`.

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RuntimeConfig {
    /// Scripted-function call depth cap (spec §4.5: "documented: 64-128
    /// frames"). Resolved to 64, matching `RECURSION_LIMIT` in
    /// `examples/original_source/src/interpreter.c`.
    pub recursion_limit: u32,
    /// Expression-nesting depth cap (spec §4.6: "capped at ~128 to prevent
    /// stack overflow from adversarial input").
    pub expr_recursion_limit: u32,
    /// Fixed capacity of the persistent globals hash table (spec §4.2).
    pub globals_capacity: u32,
    /// Trace buffer frame cap (spec §4.7: `STACK_TRACE_MAX` in the original).
    pub trace_frame_limit: usize,
    /// Default capacity for a heap table created via `new_table` with no
    /// explicit capacity hint.
    pub default_table_capacity: u32,
}

/// `RECURSION_LIMIT` in `examples/original_source/src/interpreter.c`.
pub const DEFAULT_RECURSION_LIMIT: u32 = 64;
/// Spec §4.6's own number for expression nesting, distinct from the
/// call-frame cap above.
pub const DEFAULT_EXPR_RECURSION_LIMIT: u32 = 128;
/// `STACK_TRACE_MAX` in the original.
pub const DEFAULT_TRACE_FRAME_LIMIT: usize = 16;

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            recursion_limit: DEFAULT_RECURSION_LIMIT,
            expr_recursion_limit: DEFAULT_EXPR_RECURSION_LIMIT,
            globals_capacity: 256,
            trace_frame_limit: DEFAULT_TRACE_FRAME_LIMIT,
            default_table_capacity: 8,
        }
    }
}

impl RuntimeConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn recursion_limit(mut self, limit: u32) -> Self {
        self.recursion_limit = limit;
        self
    }

    #[must_use]
    pub fn expr_recursion_limit(mut self, limit: u32) -> Self {
        self.expr_recursion_limit = limit;
        self
    }

    #[must_use]
    pub fn globals_capacity(mut self, capacity: u32) -> Self {
        self.globals_capacity = capacity;
        self
    }

    #[must_use]
    pub fn trace_frame_limit(mut self, limit: usize) -> Self {
        self.trace_frame_limit = limit;
        self
    }
}
