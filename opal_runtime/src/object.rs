//! Objects: ordered field maps with slot indices.
//!
//! An object maps identifier names to values, preserving insertion order.
//! Each field's position (its *slot*) is stable for the object's lifetime,
//! which is what lets an inline cache remember a slot and probe it first
//! on later lookups. Field layouts are append-only; there is no deletion.

use opal_core::{InternedStr, Value};
use smallvec::SmallVec;

/// Inline field capacity before spilling to the heap.
/// Most instruction and function objects carry at most four fields.
const INLINE_FIELDS: usize = 4;

/// Check a field name against the identifier grammar:
/// `[A-Za-z_][A-Za-z0-9_]*`.
pub fn is_valid_ident(bytes: &[u8]) -> bool {
    let Some(&first) = bytes.first() else {
        return false;
    };
    if !(first.is_ascii_alphabetic() || first == b'_') {
        return false;
    }
    bytes[1..]
        .iter()
        .all(|&b| b.is_ascii_alphanumeric() || b == b'_')
}

/// A heap object.
#[derive(Debug, Clone, Default)]
pub struct ObjData {
    fields: SmallVec<[(InternedStr, Value); INLINE_FIELDS]>,
}

impl ObjData {
    /// Create an empty object with a capacity hint.
    #[inline]
    pub fn with_capacity(capacity: usize) -> ObjData {
        ObjData {
            fields: SmallVec::with_capacity(capacity),
        }
    }

    /// Number of fields.
    #[inline]
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Presence test by name contents.
    #[inline]
    pub fn has(&self, name: &str) -> bool {
        self.fields.iter().any(|(n, _)| n.as_str() == name)
    }

    /// Get by name contents.
    #[inline]
    pub fn get(&self, name: &str) -> Option<Value> {
        self.fields
            .iter()
            .find(|(n, _)| n.as_str() == name)
            .map(|&(_, v)| v)
    }

    /// Get with a slot hint. Probes `hint` by name identity first, then
    /// falls back to a scan. Returns the value together with the slot it
    /// was found at so the caller can refresh its hint.
    #[inline]
    pub fn get_with_hint(&self, name: &InternedStr, hint: usize) -> Option<(Value, usize)> {
        if let Some((n, v)) = self.fields.get(hint) {
            if n.same(name) {
                return Some((*v, hint));
            }
        }
        self.fields
            .iter()
            .position(|(n, _)| n.same(name))
            .map(|slot| (self.fields[slot].1, slot))
    }

    /// Set a field, creating it if absent. Returns the field's slot.
    pub fn set(&mut self, name: InternedStr, value: Value) -> usize {
        if let Some(slot) = self.fields.iter().position(|(n, _)| n.same(&name)) {
            self.fields[slot].1 = value;
            return slot;
        }
        self.fields.push((name, value));
        self.fields.len() - 1
    }

    /// The field at `slot`, in insertion order.
    #[inline]
    pub fn field_at(&self, slot: usize) -> Option<(&InternedStr, Value)> {
        self.fields.get(slot).map(|(n, v)| (n, *v))
    }

    /// Iterate fields in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&InternedStr, Value)> {
        self.fields.iter().map(|(n, v)| (n, *v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opal_core::intern;

    #[test]
    fn test_ident_grammar() {
        assert!(is_valid_ident(b"x"));
        assert!(is_valid_ident(b"_private"));
        assert!(is_valid_ident(b"num_locals2"));
        assert!(!is_valid_ident(b""));
        assert!(!is_valid_ident(b"2x"));
        assert!(!is_valid_ident(b"a-b"));
        assert!(!is_valid_ident(b"a b"));
        assert!(!is_valid_ident(&[0xff, b'a']));
    }

    #[test]
    fn test_set_get_ordered() {
        let mut obj = ObjData::with_capacity(2);
        assert_eq!(obj.set(intern("a"), Value::int32(1)), 0);
        assert_eq!(obj.set(intern("b"), Value::int32(2)), 1);
        assert_eq!(obj.get("a"), Some(Value::int32(1)));
        assert_eq!(obj.get("b"), Some(Value::int32(2)));
        assert_eq!(obj.get("c"), None);
        assert!(obj.has("a"));
        assert!(!obj.has("c"));
    }

    #[test]
    fn test_set_preserves_slot() {
        let mut obj = ObjData::default();
        obj.set(intern("a"), Value::int32(1));
        obj.set(intern("b"), Value::int32(2));
        // Overwrite keeps the original slot and order.
        assert_eq!(obj.set(intern("a"), Value::int32(9)), 0);
        assert_eq!(obj.field_count(), 2);
        let names: Vec<&str> = obj.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["a", "b"]);
    }

    #[test]
    fn test_get_with_hint() {
        let mut obj = ObjData::default();
        obj.set(intern("x"), Value::int32(0));
        obj.set(intern("a"), Value::int32(7));

        let name = intern("a");
        // Wrong hint falls back to the scan and reports the true slot.
        assert_eq!(obj.get_with_hint(&name, 0), Some((Value::int32(7), 1)));
        // Right hint hits directly.
        assert_eq!(obj.get_with_hint(&name, 1), Some((Value::int32(7), 1)));
        // Out-of-range hint is just a miss.
        assert_eq!(obj.get_with_hint(&name, 99), Some((Value::int32(7), 1)));
        assert_eq!(obj.get_with_hint(&intern("zz"), 0), None);
    }

    #[test]
    fn test_spill_past_inline_capacity() {
        let mut obj = ObjData::default();
        for (i, name) in ["a", "b", "c", "d", "e", "f"].iter().enumerate() {
            obj.set(intern(name), Value::int32(i as i32));
        }
        assert_eq!(obj.field_count(), 6);
        assert_eq!(obj.get("f"), Some(Value::int32(5)));
    }
}
