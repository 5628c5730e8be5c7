//! Tagged value representation.
//!
//! A [`Value`] is a fixed-width tagged union over the small closed set of
//! variants the VM manipulates. Heap-allocated variants (strings, objects,
//! arrays) are held by compact `u32` handles resolved against the runtime
//! heap; the value itself is `Copy` so it can live on the operand stack and
//! inside the encoded dispatch stream.

use std::fmt;

// =============================================================================
// Handles
// =============================================================================

/// Handle to an immutable string in the runtime heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StrHandle(pub u32);

/// Handle to an object in the runtime heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjHandle(pub u32);

/// Handle to an array in the runtime heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArrHandle(pub u32);

/// Handle to a registered host function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HostFnHandle(pub u32);

// =============================================================================
// Tags
// =============================================================================

/// Variant tag of a [`Value`].
///
/// The numeric representation is stable: it is written into the encoded
/// dispatch stream for `PUSH` and `HAS_TAG` operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Tag {
    Undef = 0,
    Bool = 1,
    Int32 = 2,
    Float32 = 3,
    String = 4,
    Object = 5,
    Array = 6,
    HostFn = 7,
    Raw = 8,
}

impl Tag {
    /// Decode a tag byte read back from the dispatch stream.
    #[inline]
    pub fn from_u8(v: u8) -> Option<Tag> {
        match v {
            0 => Some(Tag::Undef),
            1 => Some(Tag::Bool),
            2 => Some(Tag::Int32),
            3 => Some(Tag::Float32),
            4 => Some(Tag::String),
            5 => Some(Tag::Object),
            6 => Some(Tag::Array),
            7 => Some(Tag::HostFn),
            8 => Some(Tag::Raw),
            _ => None,
        }
    }

    /// Resolve the tag named by a `has_tag` instruction operand.
    pub fn from_name(name: &str) -> Option<Tag> {
        match name {
            "undef" => Some(Tag::Undef),
            "bool" => Some(Tag::Bool),
            "int32" => Some(Tag::Int32),
            "float32" => Some(Tag::Float32),
            "string" => Some(Tag::String),
            "object" => Some(Tag::Object),
            "array" => Some(Tag::Array),
            "hostfn" => Some(Tag::HostFn),
            "rawptr" => Some(Tag::Raw),
            _ => None,
        }
    }

    /// The stable name of this tag.
    pub fn name(self) -> &'static str {
        match self {
            Tag::Undef => "undef",
            Tag::Bool => "bool",
            Tag::Int32 => "int32",
            Tag::Float32 => "float32",
            Tag::String => "string",
            Tag::Object => "object",
            Tag::Array => "array",
            Tag::HostFn => "hostfn",
            Tag::Raw => "rawptr",
        }
    }
}

// =============================================================================
// Value
// =============================================================================

/// A tagged VM value.
///
/// Equality is variant-wise: integers and floats compare numerically within
/// their own kind, booleans by truth value, and strings, objects, arrays and
/// host functions by handle identity. Content equality of strings is a heap
/// operation and lives in the runtime crate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Undef,
    Bool(bool),
    Int32(i32),
    Float32(f32),
    Str(StrHandle),
    Object(ObjHandle),
    Array(ArrHandle),
    HostFn(HostFnHandle),
    /// Saved interpreter state (stack index, frame index, or version id).
    /// Only ever pushed by the engine itself, never by user code.
    Raw(usize),
}

impl Value {
    /// Canonical true.
    pub const TRUE: Value = Value::Bool(true);
    /// Canonical false.
    pub const FALSE: Value = Value::Bool(false);
    /// The undefined singleton.
    pub const UNDEF: Value = Value::Undef;

    /// Wrap a 32-bit integer.
    #[inline]
    pub const fn int32(v: i32) -> Value {
        Value::Int32(v)
    }

    /// Wrap a 32-bit float.
    #[inline]
    pub const fn float32(v: f32) -> Value {
        Value::Float32(v)
    }

    /// Get the variant tag.
    #[inline]
    pub fn tag(self) -> Tag {
        match self {
            Value::Undef => Tag::Undef,
            Value::Bool(_) => Tag::Bool,
            Value::Int32(_) => Tag::Int32,
            Value::Float32(_) => Tag::Float32,
            Value::Str(_) => Tag::String,
            Value::Object(_) => Tag::Object,
            Value::Array(_) => Tag::Array,
            Value::HostFn(_) => Tag::HostFn,
            Value::Raw(_) => Tag::Raw,
        }
    }

    // =========================================================================
    // Variant tests
    // =========================================================================

    #[inline]
    pub fn is_undef(self) -> bool {
        matches!(self, Value::Undef)
    }

    #[inline]
    pub fn is_bool(self) -> bool {
        matches!(self, Value::Bool(_))
    }

    #[inline]
    pub fn is_int32(self) -> bool {
        matches!(self, Value::Int32(_))
    }

    #[inline]
    pub fn is_float32(self) -> bool {
        matches!(self, Value::Float32(_))
    }

    #[inline]
    pub fn is_string(self) -> bool {
        matches!(self, Value::Str(_))
    }

    #[inline]
    pub fn is_object(self) -> bool {
        matches!(self, Value::Object(_))
    }

    #[inline]
    pub fn is_array(self) -> bool {
        matches!(self, Value::Array(_))
    }

    #[inline]
    pub fn is_host_fn(self) -> bool {
        matches!(self, Value::HostFn(_))
    }

    #[inline]
    pub fn is_raw(self) -> bool {
        matches!(self, Value::Raw(_))
    }

    // =========================================================================
    // Extraction
    // =========================================================================

    #[inline]
    pub fn as_bool(self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(b),
            _ => None,
        }
    }

    #[inline]
    pub fn as_i32(self) -> Option<i32> {
        match self {
            Value::Int32(v) => Some(v),
            _ => None,
        }
    }

    #[inline]
    pub fn as_f32(self) -> Option<f32> {
        match self {
            Value::Float32(v) => Some(v),
            _ => None,
        }
    }

    #[inline]
    pub fn as_str_handle(self) -> Option<StrHandle> {
        match self {
            Value::Str(h) => Some(h),
            _ => None,
        }
    }

    #[inline]
    pub fn as_object(self) -> Option<ObjHandle> {
        match self {
            Value::Object(h) => Some(h),
            _ => None,
        }
    }

    #[inline]
    pub fn as_array(self) -> Option<ArrHandle> {
        match self {
            Value::Array(h) => Some(h),
            _ => None,
        }
    }

    #[inline]
    pub fn as_host_fn(self) -> Option<HostFnHandle> {
        match self {
            Value::HostFn(h) => Some(h),
            _ => None,
        }
    }

    #[inline]
    pub fn as_raw(self) -> Option<usize> {
        match self {
            Value::Raw(p) => Some(p),
            _ => None,
        }
    }

    // =========================================================================
    // Stream encoding
    // =========================================================================

    /// Split into the stable (tag byte, payload bits) pair written into the
    /// dispatch stream for `PUSH` operands.
    #[inline]
    pub fn to_parts(self) -> (u8, u64) {
        let bits = match self {
            Value::Undef => 0,
            Value::Bool(b) => b as u64,
            Value::Int32(v) => v as u32 as u64,
            Value::Float32(v) => v.to_bits() as u64,
            Value::Str(h) => h.0 as u64,
            Value::Object(h) => h.0 as u64,
            Value::Array(h) => h.0 as u64,
            Value::HostFn(h) => h.0 as u64,
            Value::Raw(p) => p as u64,
        };
        (self.tag() as u8, bits)
    }

    /// Rebuild a value from its stream encoding. Returns `None` on an
    /// unrecognized tag byte.
    #[inline]
    pub fn from_parts(tag: u8, bits: u64) -> Option<Value> {
        Some(match Tag::from_u8(tag)? {
            Tag::Undef => Value::Undef,
            Tag::Bool => Value::Bool(bits != 0),
            Tag::Int32 => Value::Int32(bits as u32 as i32),
            Tag::Float32 => Value::Float32(f32::from_bits(bits as u32)),
            Tag::String => Value::Str(StrHandle(bits as u32)),
            Tag::Object => Value::Object(ObjHandle(bits as u32)),
            Tag::Array => Value::Array(ArrHandle(bits as u32)),
            Tag::HostFn => Value::HostFn(HostFnHandle(bits as u32)),
            Tag::Raw => Value::Raw(bits as usize),
        })
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Value::Undef => write!(f, "undef"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int32(v) => write!(f, "{}", v),
            Value::Float32(v) => write!(f, "{:.6}", v),
            Value::Str(h) => write!(f, "string#{}", h.0),
            Value::Object(h) => write!(f, "object#{}", h.0),
            Value::Array(h) => write!(f, "array#{}", h.0),
            Value::HostFn(h) => write!(f, "hostfn#{}", h.0),
            Value::Raw(p) => write!(f, "raw#{:#x}", p),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
