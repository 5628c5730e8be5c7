//! Core types for the Opal virtual machine.
//!
//! This crate provides the foundation shared by the runtime heap and the
//! execution engine:
//!
//! - [`Value`] - Fixed-width tagged value (the universal currency of the VM)
//! - [`Tag`] - Variant tags with a stable name mapping for `has_tag`
//! - [`intern`] - Global identifier interner for object field names
//! - [`VmError`] - Run-time error type covering every engine failure mode

pub mod error;
pub mod intern;
pub mod value;

pub use error::{VmError, VmResult};
pub use intern::{intern, InternedStr};
pub use value::{ArrHandle, HostFnHandle, ObjHandle, StrHandle, Tag, Value};
