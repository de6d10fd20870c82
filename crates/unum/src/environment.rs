//! Lexical scope stack + persistent globals table (spec §4.2).
//!
//! Two tiers, matching the spec exactly (this is a deliberate improvement
//! over `examples/original_source/src/interpreter.c`'s single linear stack
//! with a null-namespace sentinel for "global" — see DESIGN.md):
//!
//! 1. A **scope stack**: local bindings for the current call frame and any
//!    lexically enclosing function bodies, searched by name and namespace.
//! 2. A **globals table**: persists across evaluations, found by falling
//!    back out of the scope stack.
//!
//! Scripted functions carry no captured-environment pointer (spec §4.5): a
//! function's "closure" is reconstructed at call time purely by walking the
//! runtime's live scope stack and matching byte ranges, which is why
//! [`Namespace`] carries a *source identity* (`Rc<str>` pointer) alongside
//! the byte range — two different source buffers can have numerically
//! overlapping offsets without actually overlapping in the program text.

use std::rc::Rc;

use crate::heap::Heap;
use crate::value::Value;

/// The textual scope a binding was declared in: either the top-level
/// (persists via the globals table) or a byte range inside some source
/// buffer (the enclosing scripted function's body).
#[derive(Debug, Clone)]
pub enum Namespace {
    Global,
    Local { source: Rc<str>, start: u32, end: u32 },
}

impl Namespace {
    /// "Two namespaces overlap if one is textually contained in the other"
    /// (spec §4.2) — and a `Global` namespace is always visible, regardless
    /// of containment.
    fn overlaps(&self, other: &Namespace) -> bool {
        match (self, other) {
            (Namespace::Global, _) | (_, Namespace::Global) => true,
            (
                Namespace::Local { source: s1, start: a1, end: b1 },
                Namespace::Local { source: s2, start: a2, end: b2 },
            ) => Rc::ptr_eq(s1, s2) && ((a1 <= a2 && b2 <= b1) || (a2 <= a1 && b1 <= b2)),
        }
    }
}

struct Binding {
    name: Box<str>,
    value: Value,
    is_const: bool,
    namespace: Namespace,
}

/// Opaque token produced by [`ScopeStack::enter`]; must be passed back to
/// [`ScopeStack::leave`] on every exit path (success, error, early return) —
/// failing to do so leaks bindings (spec §5).
pub struct ScopeGuard {
    prev_base: usize,
    truncate_len: usize,
}

/// Fixed-purpose linear stack of local bindings for the whole run (spec
/// calls this a "fixed-capacity linear array"; a `Vec` gives the same
/// amortized-growth behavior without requiring a compile-time cap).
#[derive(Default)]
pub struct ScopeStack {
    bindings: Vec<Binding>,
    base: usize,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enters a new call frame: local bindings created from here on are only
    /// visible to this frame (and to nested scripted functions, via the
    /// namespace walk) until [`Self::leave`] is called.
    pub fn enter(&mut self) -> ScopeGuard {
        let guard = ScopeGuard { prev_base: self.base, truncate_len: self.bindings.len() };
        self.base = self.bindings.len();
        guard
    }

    /// Releases every binding pushed since the matching `enter` and restores
    /// the previous frame base.
    pub fn leave(&mut self, guard: ScopeGuard, heap: &mut Heap) {
        while self.bindings.len() > guard.truncate_len {
            let binding = self.bindings.pop().unwrap();
            binding.value.release(heap);
        }
        self.base = guard.prev_base;
    }

    pub fn depth(&self) -> usize {
        self.bindings.len()
    }

    /// Declares `name` as a new local in the current frame with the given
    /// namespace. Rejects redeclaration *within the current frame* (spec:
    /// "Redeclaring a name already in scope is an error" — matching the
    /// original's `get_local`, which only scans the current frame).
    pub fn declare(&mut self, name: &str, value: Value, namespace: Namespace, heap: &mut Heap) -> Result<(), Value> {
        if self.bindings[self.base..].iter().any(|b| &*b.name == name) {
            value.release(heap);
            return Err(Value::new_error("Duplicate variable declaration"));
        }
        self.bindings.push(Binding { name: name.into(), value, is_const: false, namespace });
        Ok(())
    }

    /// Walks the stack top-down for a binding visible from `current_ns`:
    /// either in the current frame, or in an enclosing frame whose namespace
    /// overlaps (spec §4.2 lookup rules 1+2).
    fn find_visible(&self, name: &str, current_ns: &Namespace) -> Option<usize> {
        self.bindings.iter().enumerate().rev().find_map(|(i, b)| {
            let in_current_frame = i >= self.base;
            if &*b.name == name && (in_current_frame || b.namespace.overlaps(current_ns)) {
                Some(i)
            } else {
                None
            }
        })
    }

    fn find_visible_mut(&mut self, name: &str, current_ns: &Namespace) -> Option<&mut Binding> {
        self.find_visible(name, current_ns).map(move |i| &mut self.bindings[i])
    }

    /// Pushes a binding unconditionally, with no duplicate check — the host
    /// ABI's `set_var` (spec §6) creates-or-overwrites, unlike the scripted
    /// `let` form which rejects redeclaration via [`Self::declare`].
    /// Matches `push_stack` in the original, which never checked for
    /// duplicates itself (only the `TOK_LET` handler did, explicitly).
    fn push_new(&mut self, name: &str, value: Value, is_const: bool, namespace: Namespace) {
        self.bindings.push(Binding { name: name.into(), value, is_const, namespace });
    }
}

/// Persistent, insert-only-by-name table of top-level bindings. Shares the
/// multiplier-7 polynomial hash with heap tables (spec §3.3/§4.2); fixed
/// capacity, like heap tables — growth is not part of this core (an
/// embedder sizing `RuntimeConfig::globals_capacity` too small will see
/// `declare_global` fail with a capacity error).
pub struct Globals {
    entries: Vec<Option<GlobalEntry>>,
    len: u32,
}

struct GlobalEntry {
    name: Box<str>,
    value: Value,
    is_const: bool,
}

impl Globals {
    pub fn with_capacity(capacity: u32) -> Self {
        let mut entries = Vec::with_capacity(capacity as usize);
        entries.resize_with(capacity as usize, || None);
        Self { entries, len: 0 }
    }

    fn probe(&self, name: &str) -> Option<usize> {
        let cap = self.entries.len() as u64;
        if cap == 0 {
            return None;
        }
        let start = crate::hash::poly_hash_bytes(name.as_bytes()) % cap;
        for i in 0..cap {
            let idx = ((start + i) % cap) as usize;
            match &self.entries[idx] {
                None => return None,
                Some(e) if &*e.name == name => return Some(idx),
                Some(_) => continue,
            }
        }
        None
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.probe(name).map(|i| &self.entries[i].as_ref().unwrap().value)
    }

    /// Declares a new global, rejecting a name already present.
    pub fn declare(&mut self, name: &str, value: Value, is_const: bool, heap: &mut Heap) -> Result<(), Value> {
        if self.probe(name).is_some() {
            value.release(heap);
            return Err(Value::new_error("Duplicate variable declaration"));
        }
        let cap = self.entries.len() as u64;
        if cap == 0 {
            value.release(heap);
            return Err(Value::new_error("Global table is full"));
        }
        let start = crate::hash::poly_hash_bytes(name.as_bytes()) % cap;
        for i in 0..cap {
            let idx = ((start + i) % cap) as usize;
            if self.entries[idx].is_none() {
                self.entries[idx] = Some(GlobalEntry { name: name.into(), value, is_const });
                self.len += 1;
                return Ok(());
            }
        }
        value.release(heap);
        Err(Value::new_error("Global table is full"))
    }

    /// Mutates an existing global in place (the host `set_var` path also
    /// creates one if absent, per spec §6).
    pub fn set_or_create(&mut self, name: &str, value: Value, is_const: bool, heap: &mut Heap) -> Result<(), Value> {
        if let Some(idx) = self.probe(name) {
            let entry = self.entries[idx].as_mut().unwrap();
            if entry.is_const {
                value.release(heap);
                return Err(Value::new_error("Cannot reassign a const binding"));
            }
            let old = std::mem::replace(&mut entry.value, value);
            old.release(heap);
            entry.is_const = is_const;
            Ok(())
        } else {
            self.declare(name, value, is_const, heap)
        }
    }

    /// Assignment form (`name = expr`): mutate only, error if undeclared or
    /// const.
    pub fn assign(&mut self, name: &str, value: Value, heap: &mut Heap) -> Result<(), Value> {
        match self.probe(name) {
            None => {
                value.release(heap);
                Err(Value::new_error("Assignment to undeclared variable"))
            }
            Some(idx) => {
                let entry = self.entries[idx].as_mut().unwrap();
                if entry.is_const {
                    value.release(heap);
                    return Err(Value::new_error("Cannot reassign a const binding"));
                }
                let old = std::mem::replace(&mut entry.value, value);
                old.release(heap);
                Ok(())
            }
        }
    }

    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// The full environment: scope stack + globals, plus the namespace of the
/// function body currently executing (`Namespace::Global` at the top level).
pub struct Environment {
    pub scopes: ScopeStack,
    pub globals: Globals,
    pub namespace: Namespace,
}

impl Environment {
    pub fn new(globals_capacity: u32) -> Self {
        Self { scopes: ScopeStack::new(), globals: Globals::with_capacity(globals_capacity), namespace: Namespace::Global }
    }

    /// Full lookup per spec §4.2: locals in the current frame, then
    /// namespace-overlapping enclosing frames, then globals.
    pub fn lookup<'a>(&'a self, name: &str) -> Option<&'a Value> {
        if let Some(i) = self.scopes.find_visible(name, &self.namespace) {
            return Some(&self.scopes.bindings[i].value);
        }
        self.globals.get(name)
    }

    /// `name = expr`: mutate the nearest visible binding, scope stack first.
    pub fn assign(&mut self, name: &str, value: Value, heap: &mut Heap) -> Result<(), Value> {
        if let Some(binding) = self.scopes.find_visible_mut(name, &self.namespace) {
            if binding.is_const {
                value.release(heap);
                return Err(Value::new_error("Cannot reassign a const binding"));
            }
            let old = std::mem::replace(&mut binding.value, value);
            old.release(heap);
            return Ok(());
        }
        self.globals.assign(name, value, heap)
    }

    /// `let [global] name = expr`. See module docs: a plain `let` at the top
    /// level (namespace already `Global`) or inside a function body targets
    /// the scope stack with the current namespace; `global` always targets
    /// the globals table directly, bypassing the scope stack even from
    /// inside a function.
    pub fn declare(&mut self, name: &str, value: Value, force_global: bool, heap: &mut Heap) -> Result<(), Value> {
        if force_global || matches!(self.namespace, Namespace::Global) {
            return self.globals.declare(name, value, false, heap);
        }
        self.scopes.declare(name, value, self.namespace.clone(), heap)
    }

    /// Host ABI `set_var` (spec §6): writes to the current scope, creating
    /// the binding if it doesn't already exist anywhere visible, overwriting
    /// it (respecting const-ness) if it does. Unlike [`Self::declare`], this
    /// never errors on redeclaration — it is the host's direct-binding
    /// primitive, not the scripted `let` statement. Returns `false` (and
    /// releases `value`) only when an existing binding is const.
    pub fn set_var(&mut self, name: &str, value: Value, as_const: bool, heap: &mut Heap) -> bool {
        if let Some(binding) = self.scopes.find_visible_mut(name, &self.namespace) {
            if binding.is_const {
                value.release(heap);
                return false;
            }
            let old = std::mem::replace(&mut binding.value, value);
            old.release(heap);
            binding.is_const = as_const;
            return true;
        }
        if self.globals.get(name).is_some() {
            return self.globals.set_or_create(name, value, as_const, heap).is_ok();
        }
        match self.namespace {
            Namespace::Global => {
                let _ = self.globals.declare(name, value, as_const, heap);
            }
            _ => self.scopes.push_new(name, value, as_const, self.namespace.clone()),
        }
        true
    }
}
