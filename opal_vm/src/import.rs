//! Import bridge.
//!
//! The `import` instruction resolves a package name to a package object
//! through a loader installed by the embedder. The interpreter does not
//! cache resolutions; caching is the loader's concern.

use opal_core::{Value, VmError, VmResult};
use opal_runtime::Heap;
use rustc_hash::FxHashMap;

/// Resolves package names for the `import` instruction.
pub trait PackageLoader {
    /// Resolve `name` to a package object. The loader may allocate the
    /// package on first request or return one built ahead of time.
    fn load(&mut self, name: &str, heap: &mut Heap) -> VmResult<Value>;
}

/// A loader backed by a name -> package map, for embedders that build
/// their packages up front (and for tests).
#[derive(Debug, Default)]
pub struct RegistryLoader {
    packages: FxHashMap<String, Value>,
}

impl RegistryLoader {
    pub fn new() -> RegistryLoader {
        RegistryLoader::default()
    }

    /// Register a package object under `name`. Later registrations
    /// replace earlier ones.
    pub fn register(&mut self, name: impl Into<String>, pkg: Value) {
        self.packages.insert(name.into(), pkg);
    }
}

impl PackageLoader for RegistryLoader {
    fn load(&mut self, name: &str, _heap: &mut Heap) -> VmResult<Value> {
        self.packages
            .get(name)
            .copied()
            .ok_or_else(|| VmError::unknown_package(name))
    }
}
