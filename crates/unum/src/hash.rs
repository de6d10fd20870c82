//! The polynomial hash shared by every open-addressed table in the runtime
//! (heap tables, §3.3, and the globals namespace, §4.2). Both are specified
//! to use "a FNV-like polynomial hash, multiplier 7" — pulling it out here
//! means the two tables can't silently drift apart.

/// Multiplier-7 polynomial hash over raw bytes.
pub fn poly_hash_bytes(bytes: &[u8]) -> u64 {
    let mut h: u64 = 0;
    for &b in bytes {
        h = h.wrapping_mul(7).wrapping_add(u64::from(b));
    }
    h
}

/// Hashes the small set of hashable `Value` encodings (spec §3.1: Null is
/// never a key; String, Bool, Tag, and integer Number are).
pub fn hash_key(key: &crate::value::Value, heap: &crate::heap::Heap) -> u64 {
    use crate::value::Value;
    match key {
        Value::Str(s) => poly_hash_bytes(s.as_str(heap).as_bytes()),
        Value::Bool(b) => u64::from(*b),
        Value::Tag(t) => poly_hash_bytes(&t.to_le_bytes()),
        Value::Number(n) => poly_hash_bytes(&(*n as i64).to_le_bytes()),
        _ => 0,
    }
}
