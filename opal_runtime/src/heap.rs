//! Pool-backed heap.
//!
//! Strings, objects and arrays live in per-kind pools indexed by their
//! handles. The pools only ever grow; a handle handed out once stays
//! valid for the heap's lifetime. Collection is the concern of the full
//! system's collector and is not implemented here.

use crate::array::ArrData;
use crate::object::ObjData;
use crate::string::StrData;
use opal_core::{intern, ArrHandle, ObjHandle, StrHandle, Value};

/// The VM heap.
#[derive(Debug, Default)]
pub struct Heap {
    strs: Vec<StrData>,
    objs: Vec<ObjData>,
    arrs: Vec<ArrData>,
}

impl Heap {
    pub fn new() -> Heap {
        Heap::default()
    }

    // =========================================================================
    // Strings
    // =========================================================================

    /// Allocate a string from UTF-8 text.
    pub fn alloc_str(&mut self, s: &str) -> StrHandle {
        self.alloc_bytes(s.as_bytes().to_vec())
    }

    /// Allocate a string from raw bytes.
    pub fn alloc_bytes(&mut self, bytes: Vec<u8>) -> StrHandle {
        let h = StrHandle(self.strs.len() as u32);
        self.strs.push(StrData::from_bytes(bytes));
        h
    }

    /// Allocate a string and wrap it as a value.
    #[inline]
    pub fn str_value(&mut self, s: &str) -> Value {
        Value::Str(self.alloc_str(s))
    }

    /// Resolve a string handle.
    #[inline]
    pub fn str(&self, h: StrHandle) -> &StrData {
        &self.strs[h.0 as usize]
    }

    /// Concatenate two strings into a fresh one. The left operand comes
    /// first in the result.
    pub fn concat(&mut self, left: StrHandle, right: StrHandle) -> StrHandle {
        let mut bytes = Vec::with_capacity(self.str(left).len() + self.str(right).len());
        bytes.extend_from_slice(self.str(left).as_bytes());
        bytes.extend_from_slice(self.str(right).as_bytes());
        self.alloc_bytes(bytes)
    }

    /// Content equality of two strings.
    #[inline]
    pub fn str_eq(&self, a: StrHandle, b: StrHandle) -> bool {
        a == b || self.str(a).as_bytes() == self.str(b).as_bytes()
    }

    // =========================================================================
    // Objects
    // =========================================================================

    /// Allocate an empty object with a field-capacity hint.
    pub fn new_object(&mut self, capacity: usize) -> ObjHandle {
        let h = ObjHandle(self.objs.len() as u32);
        self.objs.push(ObjData::with_capacity(capacity));
        h
    }

    #[inline]
    pub fn obj(&self, h: ObjHandle) -> &ObjData {
        &self.objs[h.0 as usize]
    }

    #[inline]
    pub fn obj_mut(&mut self, h: ObjHandle) -> &mut ObjData {
        &mut self.objs[h.0 as usize]
    }

    /// Convenience setter used by embedders and loaders. The name is
    /// interned; no identifier validation happens here (the `set_field`
    /// opcode validates, trusted embedder code does not have to).
    pub fn set_field(&mut self, obj: ObjHandle, name: &str, value: Value) {
        let name = intern(name);
        self.obj_mut(obj).set(name, value);
    }

    #[inline]
    pub fn get_field(&self, obj: ObjHandle, name: &str) -> Option<Value> {
        self.obj(obj).get(name)
    }

    #[inline]
    pub fn has_field(&self, obj: ObjHandle, name: &str) -> bool {
        self.obj(obj).has(name)
    }

    // =========================================================================
    // Arrays
    // =========================================================================

    /// Allocate an empty array with a capacity hint.
    pub fn new_array(&mut self, capacity: usize) -> ArrHandle {
        let h = ArrHandle(self.arrs.len() as u32);
        self.arrs.push(ArrData::with_capacity(capacity));
        h
    }

    #[inline]
    pub fn arr(&self, h: ArrHandle) -> &ArrData {
        &self.arrs[h.0 as usize]
    }

    #[inline]
    pub fn arr_mut(&mut self, h: ArrHandle) -> &mut ArrData {
        &mut self.arrs[h.0 as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_pool() {
        let mut heap = Heap::new();
        let a = heap.alloc_str("left");
        let b = heap.alloc_str("right");
        let c = heap.concat(a, b);
        assert_eq!(heap.str(c).as_utf8(), Some("leftright"));
        assert_eq!(heap.str(c).len(), heap.str(a).len() + heap.str(b).len());
    }

    #[test]
    fn test_str_eq_by_contents() {
        let mut heap = Heap::new();
        let a = heap.alloc_str("same");
        let b = heap.alloc_str("same");
        let c = heap.alloc_str("other");
        assert_ne!(a, b);
        assert!(heap.str_eq(a, b));
        assert!(!heap.str_eq(a, c));
    }

    #[test]
    fn test_object_fields() {
        let mut heap = Heap::new();
        let o = heap.new_object(4);
        heap.set_field(o, "ten", Value::int32(10));
        assert!(heap.has_field(o, "ten"));
        assert_eq!(heap.get_field(o, "ten"), Some(Value::int32(10)));
        assert_eq!(heap.get_field(o, "eleven"), None);
    }

    #[test]
    fn test_array_pool() {
        let mut heap = Heap::new();
        let a = heap.new_array(2);
        heap.arr_mut(a).push(Value::int32(5));
        assert_eq!(heap.arr(a).len(), 1);
        assert_eq!(heap.arr(a).get(0), Some(Value::int32(5)));
    }

    #[test]
    fn test_handle_stability() {
        let mut heap = Heap::new();
        let first = heap.alloc_str("pinned");
        for i in 0..100 {
            heap.alloc_str(&i.to_string());
        }
        assert_eq!(heap.str(first).as_utf8(), Some("pinned"));
    }
}
