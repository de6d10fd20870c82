//! The tagged dynamic value at the heart of the runtime.
//!
//! Mirrors the C `struct i_val` this runtime is modeled on: a small, closed
//! set of variants, most stored inline, the rest living behind a refcounted
//! [`HeapId`] in [`crate::heap::Heap`]. There is deliberately no `Object`
//! trait hierarchy here — the cases are closed and few, so a flat enum reads
//! better than dynamic dispatch.
//!
//! `Value` does **not** implement `Clone`. Cloning a heap-backed variant
//! without bumping its refcount is how you get use-after-free bugs in a
//! manually-refcounted system; callers that want a duplicate must go through
//! [`Value::retain`] (bumps refcounts) or [`Value::release`] (drops them).

use std::rc::Rc;

use crate::heap::{Heap, HeapId};

/// Largest integer exactly representable as an `f64` (2^53), matching
/// `BERYL_NUM_MAX_INT` in the original C runtime (`DBL_MANT_DIG` bound).
pub const MAX_EXACT_INT: f64 = 9_007_199_254_740_992.0; // 2^53

/// Inline string/byte capacity: one machine word, per spec §3.1.
pub const INLINE_STR_MAX: usize = std::mem::size_of::<usize>();

/// A byte string value: inline (small), heap-owned, or borrowed-static.
#[derive(Debug)]
pub enum StrRepr {
    /// Content stored directly in the value; `len <= INLINE_STR_MAX`.
    Inline { bytes: [u8; INLINE_STR_MAX], len: u8 },
    /// Content lives in a refcounted heap slot.
    Heap(HeapId),
    /// Content borrows a buffer the runtime does not own. Retain/release are
    /// no-ops on this form (it behaves as if permanently saturated).
    Static(&'static str),
}

impl StrRepr {
    pub fn inline(s: &str) -> Option<Self> {
        if s.len() > INLINE_STR_MAX {
            return None;
        }
        let mut bytes = [0u8; INLINE_STR_MAX];
        bytes[..s.len()].copy_from_slice(s.as_bytes());
        Some(Self::Inline { bytes, len: s.len() as u8 })
    }

    /// Borrows the string content. For heap strings this requires the heap;
    /// callers without heap access should match on the variant directly.
    pub fn as_str<'a>(&'a self, heap: &'a Heap) -> &'a str {
        match self {
            Self::Inline { bytes, len } => {
                std::str::from_utf8(&bytes[..*len as usize]).unwrap_or("")
            }
            Self::Heap(id) => heap.get_str(*id),
            Self::Static(s) => s,
        }
    }

    fn retain(&self, heap: &Heap) -> Self {
        match self {
            Self::Inline { bytes, len } => Self::Inline { bytes: *bytes, len: *len },
            Self::Heap(id) => {
                heap.inc_ref(*id);
                Self::Heap(*id)
            }
            Self::Static(s) => Self::Static(s),
        }
    }

    fn release(self, heap: &mut Heap) {
        if let Self::Heap(id) = self {
            heap.dec_ref(id);
        }
    }
}

/// An array value: heap-owned (growable) or borrowed-static.
#[derive(Debug)]
pub enum ArrRepr {
    Heap(HeapId),
    Static(&'static [Value]),
}

/// A scripted function: a byte slice into some source buffer.
///
/// Per the design notes in §9, this runtime chooses the shared-ownership
/// form over a raw borrowed pointer: the source buffer is held in an `Rc<str>`
/// so a returned function value can safely outlive the `eval` call that
/// produced it, without requiring callers to separately track source
/// lifetimes. `start`/`end` are byte offsets into `source`.
#[derive(Debug, Clone)]
pub struct FnSlice {
    pub source: Rc<str>,
    pub start: u32,
    pub end: u32,
}

impl FnSlice {
    pub fn text(&self) -> &str {
        &self.source[self.start as usize..self.end as usize]
    }
}

/// Opaque identity. Equal only to itself; allocated from a monotonic counter.
pub type Tag = u64;

/// Identifier of an external (host-provided) function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExtFnId(pub u32);

/// The dynamic value type.
#[derive(Debug)]
pub enum Value {
    Null,
    Number(f64),
    Bool(bool),
    Tag(Tag),
    Str(StrRepr),
    /// Structurally identical to `Str` but a distinct variant (spec §3.1):
    /// an error never participates in arithmetic/comparison as a successful
    /// operand, and carries `%N` placeholders resolved at render time.
    Err(StrRepr),
    Array(ArrRepr),
    Table(HeapId),
    Function(FnSlice),
    ExtFunction(ExtFnId),
    Object(HeapId),
    /// Early-return sentinel (§4.8). Never observable by scripts; only
    /// produced by the `return` host operation and consumed by the function
    /// body evaluator that owns the matching return slot.
    MarkerReturn,
}

#[cfg(feature = "ref-count-panic")]
impl Drop for Value {
    fn drop(&mut self) {
        let heap_backed = matches!(
            self,
            Self::Str(StrRepr::Heap(_))
                | Self::Err(StrRepr::Heap(_))
                | Self::Array(ArrRepr::Heap(_))
                | Self::Table(_)
                | Self::Object(_)
        );
        if heap_backed {
            panic!("Value dropped without calling release() - this is a reference counting bug");
        }
    }
}

impl Value {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Err(_))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Truthiness used by conditional builtins (`if`, `while` style host
    /// functions layered above this core). Null and `false` are falsy;
    /// everything else, including `0`, is truthy per this language's design
    /// (it has no implicit numeric-to-bool coercion beyond `Bool` itself).
    pub fn truthy(&self) -> bool {
        !matches!(self, Self::Null | Self::Bool(false))
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// An integer is a number that equals its own truncation and is within
    /// the exactly-representable range (spec §3.1, §9 Open Question #3).
    pub fn is_integer(&self) -> bool {
        match self {
            Self::Number(n) => n.trunc() == *n && n.abs() <= MAX_EXACT_INT,
            _ => false,
        }
    }

    pub fn new_error(msg: &'static str) -> Self {
        Self::Err(StrRepr::Static(msg))
    }

    pub fn new_static_str(s: &'static str) -> Self {
        Self::Str(StrRepr::Static(s))
    }

    /// Returns a new owned `Value` equal to `self`, bumping any heap refcount.
    /// This is the only sanctioned way to duplicate a `Value`.
    pub fn retain(&self, heap: &Heap) -> Self {
        match self {
            Self::Null => Self::Null,
            Self::Number(n) => Self::Number(*n),
            Self::Bool(b) => Self::Bool(*b),
            Self::Tag(t) => Self::Tag(*t),
            Self::Str(s) => Self::Str(s.retain(heap)),
            Self::Err(s) => Self::Err(s.retain(heap)),
            Self::Array(ArrRepr::Heap(id)) => {
                heap.inc_ref(*id);
                Self::Array(ArrRepr::Heap(*id))
            }
            Self::Array(ArrRepr::Static(items)) => Self::Array(ArrRepr::Static(items)),
            Self::Table(id) => {
                heap.inc_ref(*id);
                Self::Table(*id)
            }
            Self::Function(f) => Self::Function(f.clone()),
            Self::ExtFunction(id) => Self::ExtFunction(*id),
            Self::Object(id) => {
                heap.inc_ref(*id);
                Self::Object(*id)
            }
            Self::MarkerReturn => Self::MarkerReturn,
        }
    }

    /// Consumes `self`, releasing any heap reference it held.
    pub fn release(self, heap: &mut Heap) {
        match self {
            Self::Str(s) | Self::Err(s) => s.release(heap),
            Self::Array(ArrRepr::Heap(id)) | Self::Table(id) | Self::Object(id) => heap.dec_ref(id),
            _ => {}
        }
        #[cfg(feature = "ref-count-panic")]
        std::mem::forget(self);
    }

    /// Releases a whole batch of values. Used at call boundaries where the
    /// dispatcher owns a slice of arguments it must consume one way or another.
    pub fn release_all(values: impl IntoIterator<Item = Value>, heap: &mut Heap) {
        for v in values {
            v.release(heap);
        }
    }

    /// Renders a value for display/printing/error interpolation.
    pub fn display(&self, heap: &Heap) -> String {
        match self {
            Self::Null => "null".to_owned(),
            Self::Number(n) => format_number(*n),
            Self::Bool(b) => b.to_string(),
            Self::Tag(t) => format!("<tag:{t}>"),
            Self::Str(s) | Self::Err(s) => s.as_str(heap).to_owned(),
            Self::Array(ArrRepr::Heap(id)) => {
                let items = heap.get_array(*id);
                let rendered: Vec<String> = items.iter().map(|v| v.display(heap)).collect();
                format!("[{}]", rendered.join(", "))
            }
            Self::Array(ArrRepr::Static(items)) => {
                let rendered: Vec<String> = items.iter().map(|v| v.display(heap)).collect();
                format!("[{}]", rendered.join(", "))
            }
            Self::Table(_) => "<table>".to_owned(),
            Self::Function(_) => "<function>".to_owned(),
            Self::ExtFunction(_) => "<external function>".to_owned(),
            Self::Object(id) => heap.get_object(*id).print(heap),
            Self::MarkerReturn => "<return>".to_owned(),
        }
    }

    /// Three-valued comparison used by ordering operators and table/array
    /// equality. Returns `-1` if `a` sorts after `b`, `0` if equal, `1` if
    /// `b` sorts after `a`, and `2` if the pair is not comparable — matching
    /// `beryl_val_cmp`'s documented contract in the original runtime.
    pub fn val_cmp(a: &Value, b: &Value, heap: &Heap) -> i8 {
        match (a, b) {
            (Self::Null, Self::Null) => 0,
            (Self::Bool(x), Self::Bool(y)) => cmp_ord(*x as i8, *y as i8),
            (Self::Number(x), Self::Number(y)) => {
                if x.is_nan() || y.is_nan() {
                    2
                } else if x < y {
                    1
                } else if x > y {
                    -1
                } else {
                    0
                }
            }
            (Self::Tag(x), Self::Tag(y)) => {
                if x == y {
                    0
                } else {
                    2
                }
            }
            (Self::Str(x), Self::Str(y)) | (Self::Err(x), Self::Err(y)) => {
                cmp_bytes(x.as_str(heap).as_bytes(), y.as_str(heap).as_bytes())
            }
            (Self::Array(_), Self::Array(_)) => {
                let xs = array_slice(a, heap);
                let ys = array_slice(b, heap);
                if xs.len() != ys.len() {
                    return 2;
                }
                for (x, y) in xs.iter().zip(ys.iter()) {
                    let c = Self::val_cmp(x, y, heap);
                    if c != 0 {
                        return c;
                    }
                }
                0
            }
            _ => 2,
        }
    }
}

fn cmp_ord(x: i8, y: i8) -> i8 {
    if x < y {
        1
    } else if x > y {
        -1
    } else {
        0
    }
}

fn cmp_bytes(x: &[u8], y: &[u8]) -> i8 {
    match x.cmp(y) {
        std::cmp::Ordering::Less => 1,
        std::cmp::Ordering::Equal => 0,
        std::cmp::Ordering::Greater => -1,
    }
}

/// Returns a borrowed view of an array's elements, regardless of storage form.
pub fn array_slice<'a>(v: &'a Value, heap: &'a Heap) -> &'a [Value] {
    match v {
        Value::Array(ArrRepr::Heap(id)) => heap.get_array(*id),
        Value::Array(ArrRepr::Static(items)) => items,
        _ => &[],
    }
}

/// Formats a number the way the original runtime's printf-style renderer
/// does: integral values print without a trailing `.0`.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "nan".to_owned();
    }
    if n.is_infinite() {
        return if n > 0.0 { "inf".to_owned() } else { "-inf".to_owned() };
    }
    if n.trunc() == n && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}
