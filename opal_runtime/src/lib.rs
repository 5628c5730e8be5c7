//! Heap runtime for the Opal VM.
//!
//! Provides the three heap-allocated container kinds the engine executes
//! against, behind compact `u32` handles:
//!
//! - [`StrData`] - Immutable byte strings with cached length
//! - [`ObjData`] - Ordered field maps with slot indices (inline-cache ready)
//! - [`ArrData`] - Growable arrays with bounds-checked access
//!
//! All allocations are owned by a [`Heap`] and live until it is dropped.
//! Handle stability is the interface contract: a handle handed out once
//! resolves to the same allocation for the heap's whole lifetime.

pub mod array;
pub mod heap;
pub mod object;
pub mod string;

pub use array::ArrData;
pub use heap::Heap;
pub use object::{is_valid_ident, ObjData};
pub use string::StrData;
