//! Lazy block-versioning interpreter for the Opal scripting language.
//!
//! This crate is the execution engine: it takes program images (object
//! graphs of functions and basic blocks produced by an external parser or
//! built through the heap API), compiles each basic block on first reach
//! into a dense encoded stream, and interprets that stream with in-place
//! jump patching.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │                      Interp                      │
//! ├──────────────────────────────────────────────────┤
//! │  ┌────────────┐  ┌───────────────┐  ┌─────────┐  │
//! │  │ CodeArena  │  │ VersionTable  │  │  Heap   │  │
//! │  │ (1 MiB,    │  │ block → ver   │  │ objects │  │
//! │  │  append)   │  │ addr  → ver   │  │ arrays  │  │
//! │  └────────────┘  └───────────────┘  │ strings │  │
//! │                                     └─────────┘  │
//! │  ┌────────────────────┐  ┌────────────────────┐  │
//! │  │ Operand stack      │  │ FieldIc caches     │  │
//! │  │ (64Ki slots, grows │  │ (per-use-site slot │  │
//! │  │  downward)         │  │  memos)            │  │
//! │  └────────────────────┘  └────────────────────┘  │
//! └──────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use opal_vm::Interp;
//!
//! let mut interp = Interp::new();
//! let pkg = /* image parser output */;
//! let result = interp.call_export(pkg, "main", &[])?;
//! ```

pub mod arena;
pub mod compiler;
pub mod host;
pub mod ic;
pub mod import;
pub mod interp;
pub mod opcode;
pub mod version;

pub use arena::{CodeArena, CODE_HEAP_SIZE};
pub use host::{HostFn, HostFnKind};
pub use ic::FieldIc;
pub use import::{PackageLoader, RegistryLoader};
pub use interp::{Interp, STACK_SIZE};
pub use opcode::Opcode;
pub use version::{BlockVersion, RetEntry, VersionId, VersionTable};

pub use opal_core::{Tag, Value, VmError, VmResult};
pub use opal_runtime::Heap;
