//! Host functions: native code callable from the interpreted language.
//!
//! A host function is registered on the interpreter and shows up to user
//! code as an opaque callable value. The calling convention is fixed
//! arity 0 through 3; the interpreter reads the arguments off the operand
//! stack, invokes the native function, pops the arguments, and pushes the
//! returned value. Host functions receive the interpreter itself and may
//! re-enter `call_fun`.

use crate::interp::Interp;
use opal_core::{Value, VmResult};

pub type HostFn0 = fn(&mut Interp) -> VmResult<Value>;
pub type HostFn1 = fn(&mut Interp, Value) -> VmResult<Value>;
pub type HostFn2 = fn(&mut Interp, Value, Value) -> VmResult<Value>;
pub type HostFn3 = fn(&mut Interp, Value, Value, Value) -> VmResult<Value>;

/// The native entry point of a host function, by arity.
#[derive(Debug, Clone, Copy)]
pub enum HostFnKind {
    Nullary(HostFn0),
    Unary(HostFn1),
    Binary(HostFn2),
    Ternary(HostFn3),
}

impl HostFnKind {
    /// Declared argument count.
    #[inline]
    pub fn arity(self) -> usize {
        match self {
            HostFnKind::Nullary(_) => 0,
            HostFnKind::Unary(_) => 1,
            HostFnKind::Binary(_) => 2,
            HostFnKind::Ternary(_) => 3,
        }
    }
}

/// A registered host function.
#[derive(Debug, Clone, Copy)]
pub struct HostFn {
    /// Name used in diagnostics.
    pub name: &'static str,
    pub kind: HostFnKind,
}

impl HostFn {
    pub fn new(name: &'static str, kind: HostFnKind) -> HostFn {
        HostFn { name, kind }
    }
}
