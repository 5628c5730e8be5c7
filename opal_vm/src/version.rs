//! Block-version registry.
//!
//! Each source basic block gets at most one compiled version, created as
//! an uncompiled stub on first reference and never evicted. The registry
//! owns all versions in a flat table; the dispatch stream refers to them
//! by 32-bit id, which is the index-based rendition of the version graph
//! (no raw pointers, same reachability).
//!
//! The registry also keeps the reverse views the run-time semantics need:
//! which version owns a given instruction address (to recover source
//! position and caller identity at call/throw/abort sites), and which
//! exception handler, if any, is associated with a return continuation.

use opal_core::ObjHandle;
use rustc_hash::FxHashMap;

/// Identifier of a block version; index into the registry's table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VersionId(pub u32);

/// A compiled materialisation of one source basic block.
#[derive(Debug)]
pub struct BlockVersion {
    /// The function the block belongs to.
    pub fun: ObjHandle,
    /// The source block object.
    pub block: ObjHandle,
    /// Start offset in the code arena; `None` until compiled.
    pub start: Option<u32>,
    /// End offset in the code arena; `None` until compiled.
    pub end: Option<u32>,
}

impl BlockVersion {
    /// Length of the compiled range in bytes.
    pub fn len(&self) -> usize {
        match (self.start, self.end) {
            (Some(s), Some(e)) => (e - s) as usize,
            _ => 0,
        }
    }

    #[inline]
    pub fn is_compiled(&self) -> bool {
        self.start.is_some()
    }
}

/// Information associated with a return continuation.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetEntry {
    /// Exception/catch block version (may be absent).
    pub exc_ver: Option<VersionId>,
}

/// The version registry.
#[derive(Debug, Default)]
pub struct VersionTable {
    versions: Vec<BlockVersion>,
    by_block: FxHashMap<ObjHandle, VersionId>,
    instr_owners: FxHashMap<u32, VersionId>,
    ret_entries: FxHashMap<VersionId, RetEntry>,
}

impl VersionTable {
    pub fn new() -> VersionTable {
        VersionTable::default()
    }

    /// Get the unique version for `block`, creating an uncompiled stub on
    /// first reference.
    pub fn get_version(&mut self, fun: ObjHandle, block: ObjHandle) -> VersionId {
        if let Some(&id) = self.by_block.get(&block) {
            debug_assert_eq!(self.versions[id.0 as usize].fun, fun);
            return id;
        }
        let id = VersionId(self.versions.len() as u32);
        self.versions.push(BlockVersion {
            fun,
            block,
            start: None,
            end: None,
        });
        self.by_block.insert(block, id);
        id
    }

    #[inline]
    pub fn version(&self, id: VersionId) -> &BlockVersion {
        &self.versions[id.0 as usize]
    }

    #[inline]
    pub fn version_mut(&mut self, id: VersionId) -> &mut BlockVersion {
        &mut self.versions[id.0 as usize]
    }

    /// Number of versions created so far.
    #[inline]
    pub fn len(&self) -> usize {
        self.versions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    /// Record that the instruction beginning at `addr` belongs to `id`.
    /// Only call/throw/abort sites are registered.
    pub fn register_instr(&mut self, addr: u32, id: VersionId) {
        self.instr_owners.insert(addr, id);
    }

    /// The version owning the instruction at `addr`, if registered.
    #[inline]
    pub fn owner_of(&self, addr: u32) -> Option<VersionId> {
        self.instr_owners.get(&addr).copied()
    }

    /// Associate a return continuation with its exception handler.
    pub fn register_ret(&mut self, ret_ver: VersionId, entry: RetEntry) {
        self.ret_entries.insert(ret_ver, entry);
    }

    /// The handler entry for a return continuation, if any was registered.
    #[inline]
    pub fn ret_entry(&self, ret_ver: VersionId) -> Option<RetEntry> {
        self.ret_entries.get(&ret_ver).copied()
    }
}
