//! Per-use-site inline caches for named field lookups.
//!
//! A [`FieldIc`] memoizes the slot index of the last successful lookup of
//! one fixed field name. On the next invocation it probes that slot by
//! name identity before falling back to a full scan, then refreshes the
//! stored slot. Caches are never invalidated: object field layouts are
//! append-only, so a remembered slot can go stale (another object, another
//! layout) but never dangle.
//!
//! Single-threaded by design; each cache belongs to exactly one use site
//! inside the engine.

use opal_core::{intern, ArrHandle, InternedStr, ObjHandle, StrHandle, Value, VmError, VmResult};
use opal_runtime::Heap;

/// A one-entry field-lookup memo.
#[derive(Debug)]
pub struct FieldIc {
    name: InternedStr,
    slot: usize,
}

impl FieldIc {
    /// Create a cache for a single field name.
    pub fn new(name: &str) -> FieldIc {
        FieldIc {
            name: intern(name),
            slot: 0,
        }
    }

    /// The field name this cache looks up.
    #[inline]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Look up the field on `obj`, probing the cached slot first.
    pub fn get(&mut self, heap: &Heap, obj: ObjHandle) -> VmResult<Value> {
        match heap.obj(obj).get_with_hint(&self.name, self.slot) {
            Some((val, slot)) => {
                self.slot = slot;
                Ok(val)
            }
            None => Err(VmError::missing_field(self.name.as_str())),
        }
    }

    // =========================================================================
    // Typed accessors
    // =========================================================================

    /// Look up and require an `int32` field.
    pub fn get_i32(&mut self, heap: &Heap, obj: ObjHandle) -> VmResult<i32> {
        let val = self.get(heap, obj)?;
        val.as_i32()
            .ok_or_else(|| VmError::type_mismatch("int32", val.tag().name()))
    }

    /// Look up and require a string field.
    pub fn get_str(&mut self, heap: &Heap, obj: ObjHandle) -> VmResult<StrHandle> {
        let val = self.get(heap, obj)?;
        val.as_str_handle()
            .ok_or_else(|| VmError::type_mismatch("string", val.tag().name()))
    }

    /// Look up and require an object field.
    pub fn get_obj(&mut self, heap: &Heap, obj: ObjHandle) -> VmResult<ObjHandle> {
        let val = self.get(heap, obj)?;
        val.as_object()
            .ok_or_else(|| VmError::type_mismatch("object", val.tag().name()))
    }

    /// Look up and require an array field.
    pub fn get_arr(&mut self, heap: &Heap, obj: ObjHandle) -> VmResult<ArrHandle> {
        let val = self.get(heap, obj)?;
        val.as_array()
            .ok_or_else(|| VmError::type_mismatch("array", val.tag().name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_and_miss() {
        let mut heap = Heap::new();
        let obj = heap.new_object(2);
        heap.set_field(obj, "count", Value::int32(3));

        let mut ic = FieldIc::new("count");
        assert_eq!(ic.get(&heap, obj).unwrap(), Value::int32(3));
        assert_eq!(ic.get_i32(&heap, obj).unwrap(), 3);

        let empty = heap.new_object(0);
        assert_eq!(
            ic.get(&heap, empty),
            Err(VmError::missing_field("count"))
        );
    }

    #[test]
    fn test_slot_migration_across_layouts() {
        let mut heap = Heap::new();
        let a = heap.new_object(2);
        heap.set_field(a, "entry", Value::int32(1));

        let b = heap.new_object(2);
        heap.set_field(b, "pad", Value::UNDEF);
        heap.set_field(b, "entry", Value::int32(2));

        let mut ic = FieldIc::new("entry");
        // Warms the cache at slot 0.
        assert_eq!(ic.get(&heap, a).unwrap(), Value::int32(1));
        // Different layout: slot 0 probe misses, scan finds slot 1.
        assert_eq!(ic.get(&heap, b).unwrap(), Value::int32(2));
        // And back again.
        assert_eq!(ic.get(&heap, a).unwrap(), Value::int32(1));
    }

    #[test]
    fn test_typed_accessor_mismatch() {
        let mut heap = Heap::new();
        let obj = heap.new_object(1);
        heap.set_field(obj, "entry", Value::int32(9));

        let mut ic = FieldIc::new("entry");
        assert_eq!(
            ic.get_obj(&heap, obj),
            Err(VmError::type_mismatch("object", "int32"))
        );
    }
}
