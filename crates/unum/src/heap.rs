//! The refcounted heap arena backing `Value::Str(StrRepr::Heap)`,
//! `Value::Array(ArrRepr::Heap)`, `Value::Table`, and `Value::Object`.
//!
//! Slots are reused (a free list) once their refcount drops to zero, so
//! `HeapId`s from an earlier allocation can alias a later one — callers must
//! not keep a `HeapId` around past the point its owning `Value` was released.
//! This mirrors `ouros::heap::Heap`'s arena, minus the atomics: spec §5
//! mandates a single-writer, non-atomic model, so refcounts here are plain
//! `Cell<u32>`, not `AtomicUsize`.

use std::cell::Cell;
use std::fmt;

use crate::value::{ArrRepr, Value};

/// Saturating refcount sentinel meaning "never free this" (spec §3.2).
pub const LEAKED: u32 = u32::MAX;

/// Handle into the heap arena. Not `Copy`-safe across a `dec_ref` that frees
/// the slot: once released, the id may be handed out again to a new object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeapId(u32);

impl HeapId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for HeapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Result of attempting to insert into a [`Table`], matching the host ABI's
/// `table_insert(...) -> {ok, duplicate, full, bad_key}` (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Ok,
    Duplicate,
    Full,
    BadKey,
}

fn is_hashable_key(key: &Value) -> bool {
    matches!(key, Value::Str(_) | Value::Bool(_) | Value::Tag(_)) || key.is_integer()
}

fn keys_equal(a: &Value, b: &Value, heap: &Heap) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Tag(x), Value::Tag(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => x == y,
        (Value::Str(x), Value::Str(y)) => x.as_str(heap) == y.as_str(heap),
        _ => false,
    }
}

/// An open-addressed, insert-only table (spec §3.3). Deletion is not
/// supported at this layer; scripts that want to "remove" a key build a new
/// table (the `replace` host library builtin, out of this core's scope).
#[derive(Debug)]
pub struct Table {
    entries: Vec<Option<(Value, Value)>>,
    len: u32,
}

impl Table {
    pub fn with_capacity(capacity: u32) -> Self {
        let mut entries = Vec::with_capacity(capacity as usize);
        entries.resize_with(capacity as usize, || None);
        Self { entries, len: 0 }
    }

    pub fn capacity(&self) -> u32 {
        self.entries.len() as u32
    }

    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Inserts `key -> value`. Consumes both on every path (matching the
    /// dispatcher's "callee+args are always consumed" ownership contract).
    pub fn insert(&mut self, key: Value, value: Value, replace: bool, heap: &mut Heap) -> InsertOutcome {
        if !is_hashable_key(&key) {
            key.release(heap);
            value.release(heap);
            return InsertOutcome::BadKey;
        }
        let cap = self.entries.len() as u64;
        if cap == 0 {
            key.release(heap);
            value.release(heap);
            return InsertOutcome::Full;
        }
        // Spec §3.3: load factor stays at or below 2/3. Only gates a brand
        // new key — the scan below still finds and replaces/rejects an
        // existing one even past this threshold, since that never grows
        // `len`.
        let would_exceed_load_factor = (self.len as u64 + 1) * 3 > cap * 2;
        let start = crate::hash::hash_key(&key, heap) % cap;
        for i in 0..cap {
            let idx = ((start + i) % cap) as usize;
            let occupied = self.entries[idx].is_some();
            if !occupied {
                if would_exceed_load_factor {
                    key.release(heap);
                    value.release(heap);
                    return InsertOutcome::Full;
                }
                self.entries[idx] = Some((key, value));
                self.len += 1;
                return InsertOutcome::Ok;
            }
            let (existing_key, _) = self.entries[idx].as_ref().unwrap();
            if keys_equal(existing_key, &key, heap) {
                if replace {
                    let (old_key, old_value) = self.entries[idx].take().unwrap();
                    old_key.release(heap);
                    old_value.release(heap);
                    self.entries[idx] = Some((key, value));
                    return InsertOutcome::Ok;
                }
                key.release(heap);
                value.release(heap);
                return InsertOutcome::Duplicate;
            }
        }
        key.release(heap);
        value.release(heap);
        InsertOutcome::Full
    }

    /// Looks up `key` without consuming it. The caller retains the result if
    /// it needs an owned copy (table lookups don't implicitly take ownership
    /// of the stored value).
    pub fn get(&self, key: &Value, heap: &Heap) -> Option<&Value> {
        if !is_hashable_key(key) || self.entries.is_empty() {
            return None;
        }
        let cap = self.entries.len() as u64;
        let start = crate::hash::hash_key(key, heap) % cap;
        for i in 0..cap {
            let idx = ((start + i) % cap) as usize;
            match &self.entries[idx] {
                None => return None,
                Some((k, v)) => {
                    if keys_equal(k, key, heap) {
                        return Some(v);
                    }
                }
            }
        }
        None
    }

    /// Stable iteration order depends on table capacity and insertion
    /// history (spec §5: implementation-defined but stable between
    /// mutations), since it simply walks slots in index order.
    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.entries.iter().filter_map(|e| e.as_ref().map(|(k, v)| (k, v)))
    }

    fn into_entries(self) -> impl Iterator<Item = (Value, Value)> {
        self.entries.into_iter().flatten()
    }
}

/// An object whose lifecycle and behavior the host defines. Corresponds to
/// spec §3.1's "free, call, print, size, typename slots" — realized here as
/// trait methods rather than a raw function-pointer struct, since Rust's
/// trait objects are the idiomatic stand-in for a manually-built vtable.
pub trait HostObject: fmt::Debug {
    fn type_name(&self) -> &'static str;

    /// Invoked when a script calls this object as a function. Default:
    /// calling is unsupported (dispatcher reports an error, spec §4.3).
    fn call(&mut self, args: Vec<Value>, heap: &mut Heap) -> Value {
        Value::release_all(args, heap);
        Value::new_error("attempting to call non-function value")
    }

    fn print(&self, _heap: &Heap) -> String {
        format!("<{}>", self.type_name())
    }

    fn size_hint(&self) -> usize {
        std::mem::size_of_val(self)
    }
}

enum HeapData {
    Str(Box<[u8]>),
    Array(Vec<Value>),
    Table(Table),
    Object(Box<dyn HostObject>),
    /// Transient placeholder used while an object's `call` is being invoked
    /// (the object is briefly removed from the arena so `&mut Heap` and
    /// `&mut dyn HostObject` don't alias). Never observed outside `call_object`.
    Taken,
}

impl fmt::Debug for HeapData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(b) => write!(f, "Str({} bytes)", b.len()),
            Self::Array(v) => write!(f, "Array(len={})", v.len()),
            Self::Table(t) => write!(f, "Table(len={})", t.len()),
            Self::Object(o) => write!(f, "Object({})", o.type_name()),
            Self::Taken => write!(f, "<taken>"),
        }
    }
}

struct Slot {
    refcount: Cell<u32>,
    data: HeapData,
}

/// The heap arena. One per [`crate::runtime::Runtime`] — never a process
/// global (spec §5's "scope state to a per-instance runtime record" option).
#[derive(Default)]
pub struct Heap {
    slots: Vec<Option<Slot>>,
    free_list: Vec<u32>,
}

impl fmt::Debug for Heap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Heap")
            .field("live", &self.slots.iter().filter(|s| s.is_some()).count())
            .field("free", &self.free_list.len())
            .finish()
    }
}

impl Heap {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&mut self, data: HeapData) -> HeapId {
        let slot = Some(Slot { refcount: Cell::new(1), data });
        if let Some(idx) = self.free_list.pop() {
            self.slots[idx as usize] = slot;
            HeapId(idx)
        } else {
            let idx = self.slots.len() as u32;
            self.slots.push(slot);
            HeapId(idx)
        }
    }

    pub fn alloc_string(&mut self, bytes: &[u8]) -> HeapId {
        self.allocate(HeapData::Str(bytes.into()))
    }

    pub fn alloc_array(&mut self, items: Vec<Value>) -> HeapId {
        self.allocate(HeapData::Array(items))
    }

    pub fn alloc_table(&mut self, capacity: u32) -> HeapId {
        self.allocate(HeapData::Table(Table::with_capacity(capacity)))
    }

    pub fn alloc_object(&mut self, obj: Box<dyn HostObject>) -> HeapId {
        self.allocate(HeapData::Object(obj))
    }

    fn slot(&self, id: HeapId) -> &Slot {
        self.slots[id.index()].as_ref().expect("Heap: slot already freed")
    }

    fn slot_mut(&mut self, id: HeapId) -> &mut Slot {
        self.slots[id.index()].as_mut().expect("Heap: slot already freed")
    }

    pub fn refcount(&self, id: HeapId) -> u32 {
        self.slot(id).refcount.get()
    }

    pub fn inc_ref(&self, id: HeapId) {
        let slot = self.slot(id);
        let count = slot.refcount.get();
        if count != LEAKED {
            slot.refcount.set(count + 1);
        }
    }

    /// Decrements the refcount, freeing (and recursively releasing
    /// children) once it reaches zero. A refcount already at the `LEAKED`
    /// sentinel never frees (spec §3.2).
    pub fn dec_ref(&mut self, id: HeapId) {
        let count = self.slot(id).refcount.get();
        if count == LEAKED {
            return;
        }
        if count > 1 {
            self.slot(id).refcount.set(count - 1);
            return;
        }
        let slot = self.slots[id.index()].take().expect("Heap: double free");
        self.free_list.push(id.0);
        match slot.data {
            HeapData::Str(_) => {}
            HeapData::Array(items) => Value::release_all(items, self),
            HeapData::Table(table) => {
                for (k, v) in table.into_entries() {
                    k.release(self);
                    v.release(self);
                }
            }
            HeapData::Object(_) | HeapData::Taken => {}
        }
    }

    pub fn get_str(&self, id: HeapId) -> &str {
        match &self.slot(id).data {
            HeapData::Str(bytes) => std::str::from_utf8(bytes).unwrap_or(""),
            _ => panic!("HeapId does not refer to a string"),
        }
    }

    pub fn get_array(&self, id: HeapId) -> &[Value] {
        match &self.slot(id).data {
            HeapData::Array(items) => items,
            _ => panic!("HeapId does not refer to an array"),
        }
    }

    pub fn get_array_mut(&mut self, id: HeapId) -> &mut Vec<Value> {
        match &mut self.slot_mut(id).data {
            HeapData::Array(items) => items,
            _ => panic!("HeapId does not refer to an array"),
        }
    }

    pub fn get_table(&self, id: HeapId) -> &Table {
        match &self.slot(id).data {
            HeapData::Table(t) => t,
            _ => panic!("HeapId does not refer to a table"),
        }
    }

    pub fn get_table_mut(&mut self, id: HeapId) -> &mut Table {
        match &mut self.slot_mut(id).data {
            HeapData::Table(t) => t,
            _ => panic!("HeapId does not refer to a table"),
        }
    }

    pub fn get_object(&self, id: HeapId) -> &dyn HostObject {
        match &self.slot(id).data {
            HeapData::Object(obj) => obj.as_ref(),
            _ => panic!("HeapId does not refer to an object"),
        }
    }

    /// Host ABI `table_insert` (spec §6): inserts `key -> value` into the
    /// table at `id`. `Table::insert` needs both a mutable view of itself and
    /// a mutable `Heap` (to release a value on the duplicate/full/bad-key
    /// paths) — since the table lives *inside* this same heap, those two
    /// borrows can't coexist directly. Worked around the same way
    /// [`Self::call_object`] handles a user object's `call` slot: temporarily
    /// swap the table out for an empty placeholder so the rest of the heap
    /// is free to borrow, then swap the (possibly mutated) table back in.
    pub fn table_insert(&mut self, id: HeapId, key: Value, value: Value, replace: bool) -> InsertOutcome {
        let mut table = std::mem::replace(self.get_table_mut(id), Table::with_capacity(0));
        let outcome = table.insert(key, value, replace, self);
        *self.get_table_mut(id) = table;
        outcome
    }

    /// Pushes `val` onto a heap array. Spec §8 testable property: `push`
    /// then `pop` restores observable length.
    pub fn array_push(&mut self, id: HeapId, val: Value) {
        self.get_array_mut(id).push(val);
    }

    pub fn array_pop(&mut self, id: HeapId) -> Option<Value> {
        self.get_array_mut(id).pop()
    }

    /// Invokes a user object's `call` slot without holding `&mut Heap` and
    /// `&mut dyn HostObject` simultaneously: the object is taken out of its
    /// slot, called, then restored.
    pub fn call_object(&mut self, id: HeapId, args: Vec<Value>) -> Value {
        let data = std::mem::replace(&mut self.slot_mut(id).data, HeapData::Taken);
        let HeapData::Object(mut obj) = data else {
            // Restore and bail; this should not happen in practice.
            self.slot_mut(id).data = data;
            Value::release_all(args, self);
            return Value::new_error("attempting to call non-function value");
        };
        let result = obj.call(args, self);
        self.slot_mut(id).data = HeapData::Object(obj);
        result
    }
}

/// Helper used where call sites need an owned `Vec<Value>` from an array
/// value regardless of storage form, consuming the heap reference if owned.
pub fn array_into_owned(v: Value, heap: &mut Heap) -> Vec<Value> {
    match v {
        Value::Array(ArrRepr::Heap(id)) => {
            let refcount = heap.refcount(id);
            if refcount == 1 {
                let items = std::mem::take(heap.get_array_mut(id));
                heap.dec_ref(id);
                items
            } else {
                let items: Vec<Value> = heap.get_array(id).iter().map(|v| v.retain(heap)).collect();
                heap.dec_ref(id);
                items
            }
        }
        Value::Array(ArrRepr::Static(items)) => items.iter().map(|v| v.retain(heap)).collect(),
        other => {
            other.release(heap);
            Vec::new()
        }
    }
}
