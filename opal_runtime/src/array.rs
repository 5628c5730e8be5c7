//! Growable value arrays with bounds-checked access.

use opal_core::Value;

/// A heap array.
#[derive(Debug, Clone, Default)]
pub struct ArrData {
    elems: Vec<Value>,
}

impl ArrData {
    /// Create an empty array with a capacity hint.
    #[inline]
    pub fn with_capacity(capacity: usize) -> ArrData {
        ArrData {
            elems: Vec::with_capacity(capacity),
        }
    }

    /// Number of elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.elems.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }

    /// Bounds-checked read.
    #[inline]
    pub fn get(&self, idx: usize) -> Option<Value> {
        self.elems.get(idx).copied()
    }

    /// Bounds-checked write. Returns false when out of range.
    #[inline]
    pub fn set(&mut self, idx: usize, value: Value) -> bool {
        match self.elems.get_mut(idx) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Append an element.
    #[inline]
    pub fn push(&mut self, value: Value) {
        self.elems.push(value);
    }
}
