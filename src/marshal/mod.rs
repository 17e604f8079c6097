//! Type marshaling - managed values ↔ native machine words
//!
//! Design: one conversion per declared kind, strict in both directions.
//! A value is only ever lowered as the kind its entry point declares; any
//! other pairing is a loud `KindMismatch`, never a coercion.
//!
//! Outbound strings live in the [`ArenaScope`] and are not freed when the
//! call returns. Inbound strings are copied out; the native buffer stays
//! owned by the runtime.

mod types;


pub use types::{NativeAddress, NativeValue, Value};

use crate::arena::ArenaScope;
use crate::signature::Kind;
use core::ffi::{c_char, CStr};
use thiserror::Error;

/// Marshalling failures - always a caller bug or a kind contract violation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MarshalError {
    #[error("expected a value of kind {expected}, got {found}")]
    KindMismatch { expected: Kind, found: &'static str },

    #[error("integer {value} does not fit in {kind}")]
    IntegerOverflow { value: i64, kind: Kind },

    #[error("string contains an interior NUL at byte {position}")]
    InteriorNul { position: usize },

    #[error("cannot decode a null address as a string")]
    NullString,

    #[error("native string is not valid UTF-8: {0}")]
    InvalidUtf8(String),

    #[error("cannot read through a null address")]
    NullAddress,

    #[error("{0} is not a valid argument kind")]
    NotAnArgument(Kind),

    #[error("arena exhausted while allocating {size} bytes")]
    ArenaExhausted { size: usize },
}

/// Lower a managed value into the raw slot for one declared parameter
pub fn to_native(value: &Value, kind: Kind, arena: &ArenaScope) -> Result<NativeValue, MarshalError> {
    let mut slot = NativeValue::zeroed();

    match (kind, value) {
        (Kind::Int32, Value::Int(i)) => {
            slot.i32 = i32::try_from(*i)
                .map_err(|_| MarshalError::IntegerOverflow { value: *i, kind })?;
        }
        (Kind::Int64, Value::Int(i)) => slot.i64 = *i,
        (Kind::Float32, Value::Single(f)) => slot.f32 = *f,
        (Kind::Float64, Value::Double(d)) => slot.f64 = *d,
        (Kind::Object | Kind::ObjectRef, Value::Address(addr)) => {
            slot = NativeValue::from_address(*addr);
        }
        (Kind::CString, Value::Str(s)) => {
            slot = NativeValue::from_address(encode_cstr(s, arena)?);
        }
        (Kind::Void, _) => return Err(MarshalError::NotAnArgument(kind)),
        (expected, found) => {
            return Err(MarshalError::KindMismatch {
                expected,
                found: found.kind_name(),
            })
        }
    }

    Ok(slot)
}

/// Raise a raw return slot into a managed value for the declared return kind
///
/// # Safety
/// `raw` must have been produced by a call whose return type lowers from
/// `kind`. For `CString`, a non-null address must point at a NUL-terminated
/// buffer that stays valid for the duration of this call.
pub unsafe fn from_native(raw: NativeValue, kind: Kind) -> Result<Value, MarshalError> {
    Ok(match kind {
        Kind::Void => Value::Unit,
        Kind::Int32 => Value::Int(raw.i32.into()),
        Kind::Int64 => Value::Int(raw.i64),
        Kind::Float32 => Value::Single(raw.f32),
        Kind::Float64 => Value::Double(raw.f64),
        Kind::Object | Kind::ObjectRef => Value::Address(NativeAddress::from_mut_ptr(raw.ptr)),
        Kind::CString => Value::Str(decode_cstr(NativeAddress::from_mut_ptr(raw.ptr))?),
    })
}

/// Copy a managed string into the arena as a NUL-terminated buffer
pub fn encode_cstr(s: &str, arena: &ArenaScope) -> Result<NativeAddress, MarshalError> {
    if let Some(position) = s.bytes().position(|b| b == 0) {
        return Err(MarshalError::InteriorNul { position });
    }

    let bytes = s.as_bytes();
    let size = bytes.len() + 1;
    let ptr = arena
        .alloc(size, 1)
        .ok_or(MarshalError::ArenaExhausted { size })?;

    // SAFETY: the arena handed out `size` writable bytes that nothing else aliases
    unsafe {
        core::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr.as_ptr(), bytes.len());
        ptr.as_ptr().add(bytes.len()).write(0);
    }

    Ok(NativeAddress::from_mut_ptr(ptr.as_ptr()))
}

/// Decode a NUL-terminated native buffer into an owned string
///
/// # Safety
/// A non-null `addr` must point at a readable NUL-terminated buffer.
pub unsafe fn decode_cstr(addr: NativeAddress) -> Result<String, MarshalError> {
    if addr.is_null() {
        return Err(MarshalError::NullString);
    }

    CStr::from_ptr(addr.as_ptr::<c_char>())
        .to_str()
        .map(str::to_owned)
        .map_err(|e| MarshalError::InvalidUtf8(e.to_string()))
}

/// Read the pointer stored in an out-parameter slot or pointer variable
///
/// # Safety
/// A non-null `slot` must be aligned and point at a readable pointer-sized word.
pub unsafe fn read_address(slot: NativeAddress) -> Result<NativeAddress, MarshalError> {
    if slot.is_null() {
        return Err(MarshalError::NullAddress);
    }

    Ok(NativeAddress::from_bits(slot.as_ptr::<usize>().read()))
}

/// Allocate a zeroed pointer-sized out-parameter slot in the arena
pub fn alloc_slot(arena: &ArenaScope) -> Result<NativeAddress, MarshalError> {
    let size = core::mem::size_of::<usize>();
    let ptr = arena
        .alloc(size, core::mem::align_of::<usize>())
        .ok_or(MarshalError::ArenaExhausted { size })?;

    // SAFETY: fresh, aligned, exclusively owned allocation
    unsafe { (ptr.as_ptr() as *mut usize).write(0) };

    Ok(NativeAddress::from_mut_ptr(ptr.as_ptr()))
}
