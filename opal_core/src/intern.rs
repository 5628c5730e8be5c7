//! Global identifier interner.
//!
//! Object field names are interned so that the hot path of an inline cache
//! probe can compare names by pointer identity instead of byte contents.
//! The pool is global and append-only; interned strings are never freed.

use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, LazyLock};

static POOL: LazyLock<Mutex<FxHashSet<Arc<str>>>> =
    LazyLock::new(|| Mutex::new(FxHashSet::default()));

/// An interned string.
///
/// Two `InternedStr`s are equal iff they came from the same pool entry,
/// which holds exactly when their contents are equal. Cloning is a cheap
/// reference-count bump.
#[derive(Clone)]
pub struct InternedStr(Arc<str>);

impl InternedStr {
    /// View as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Byte length.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Pointer-identity comparison. Equivalent to `==` but makes the
    /// fast path explicit at probe sites.
    #[inline]
    pub fn same(&self, other: &InternedStr) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for InternedStr {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for InternedStr {}

impl Hash for InternedStr {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Content hash; consistent with pointer equality because the pool
        // holds at most one Arc per content.
        self.0.hash(state);
    }
}

impl fmt::Debug for InternedStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", &*self.0)
    }
}

impl fmt::Display for InternedStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::ops::Deref for InternedStr {
    type Target = str;

    #[inline]
    fn deref(&self) -> &str {
        &self.0
    }
}

/// Intern a string, returning the canonical shared copy.
pub fn intern(s: &str) -> InternedStr {
    let mut pool = POOL.lock();
    if let Some(existing) = pool.get(s) {
        return InternedStr(existing.clone());
    }
    let arc: Arc<str> = Arc::from(s);
    pool.insert(arc.clone());
    InternedStr(arc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_identity() {
        let a = intern("entry");
        let b = intern("entry");
        assert!(a.same(&b));
        assert_eq!(a, b);
    }

    #[test]
    fn test_intern_distinct() {
        let a = intern("num_params");
        let b = intern("num_locals");
        assert!(!a.same(&b));
        assert_ne!(a, b);
    }

    #[test]
    fn test_as_str() {
        let a = intern("instrs");
        assert_eq!(a.as_str(), "instrs");
        assert_eq!(a.len(), 6);
    }
}
