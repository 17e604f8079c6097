//! Value representations on both sides of the boundary
//!
//! `Value` is what callers hand to the dispatcher; `NativeValue` is the raw
//! machine word that goes into a prepared call.

use core::ffi::c_void;
use core::fmt;

/// Opaque pointer-sized bit pattern naming a native object, buffer or null
///
/// Equality is identity. This layer never dereferences it except through
/// the marshaller's explicit read helpers.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[repr(transparent)]
pub struct NativeAddress(usize);

impl NativeAddress {
    pub const NULL: Self = Self(0);

    #[inline]
    pub const fn from_bits(bits: usize) -> Self {
        Self(bits)
    }

    #[inline]
    pub fn from_ptr<T>(ptr: *const T) -> Self {
        Self(ptr as usize)
    }

    #[inline]
    pub fn from_mut_ptr<T>(ptr: *mut T) -> Self {
        Self(ptr as usize)
    }

    #[inline]
    pub const fn bits(self) -> usize {
        self.0
    }

    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub fn as_ptr<T>(self) -> *const T {
        self.0 as *const T
    }

    #[inline]
    pub fn as_mut_ptr<T>(self) -> *mut T {
        self.0 as *mut T
    }
}

impl fmt::Debug for NativeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeAddress({:#x})", self.0)
    }
}

impl fmt::Display for NativeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Managed-side value passed to and returned from entry points
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Result of a call declared to return nothing
    Unit,
    /// Any signed integer; narrowed per declared width on the way out
    Int(i64),
    Single(f32),
    Double(f64),
    Address(NativeAddress),
    Str(String),
}

impl Value {
    /// Short name used in mismatch diagnostics
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Unit => "unit",
            Self::Int(_) => "int",
            Self::Single(_) => "single",
            Self::Double(_) => "double",
            Self::Address(_) => "address",
            Self::Str(_) => "str",
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            Self::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_address(&self) -> Option<NativeAddress> {
        match self {
            Self::Address(a) => Some(*a),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_unit(&self) -> bool {
        matches!(self, Self::Unit)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::Single(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<NativeAddress> for Value {
    fn from(v: NativeAddress) -> Self {
        Self::Address(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Str(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

/// Raw argument or return slot (untagged union)
///
/// Every field starts at offset zero, so a pointer to the union is a valid
/// argument pointer for whichever lowered type the call interface declares.
#[repr(C)]
#[derive(Clone, Copy)]
pub union NativeValue {
    pub i32: i32,
    pub i64: i64,
    pub f32: f32,
    pub f64: f64,
    pub ptr: *mut c_void,
}

impl NativeValue {
    #[inline]
    pub const fn zeroed() -> Self {
        Self { i64: 0 }
    }

    #[inline]
    pub fn from_address(addr: NativeAddress) -> Self {
        Self { ptr: addr.as_mut_ptr() }
    }
}

impl Default for NativeValue {
    #[inline]
    fn default() -> Self {
        Self::zeroed()
    }
}

impl fmt::Debug for NativeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // SAFETY: every constructor initializes at least the low word
        let bits = unsafe { self.i64 };
        write!(f, "NativeValue({:#x})", bits)
    }
}
