//! ABI handling - calling convention and native lowering of kinds
//!
//! Descriptor kinds are lowered to the handful of machine representations
//! the C ABI actually distinguishes. Handles, handle slots and strings all
//! become one pointer-sized address.

use crate::signature::Kind;
use libffi::middle::Type;

/// Calling convention an adapter was prepared for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CallingConvention {
    /// System V AMD64 ABI (Unix x86-64)
    SysV,
    /// Microsoft x64 calling convention (Windows)
    Win64,
    /// ARM64 procedure call standard
    Aarch64,
    /// Platform C default elsewhere
    C,
}

impl CallingConvention {
    /// Convention of exported C functions on the host
    #[inline]
    pub const fn host() -> Self {
        #[cfg(all(target_arch = "x86_64", target_os = "windows"))]
        return Self::Win64;

        #[cfg(all(target_arch = "x86_64", not(target_os = "windows")))]
        return Self::SysV;

        #[cfg(target_arch = "aarch64")]
        return Self::Aarch64;

        #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
        return Self::C;
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::SysV => "sysv64",
            Self::Win64 => "win64",
            Self::Aarch64 => "aapcs64",
            Self::C => "c",
        }
    }
}

impl Default for CallingConvention {
    #[inline]
    fn default() -> Self {
        Self::host()
    }
}

/// Native machine representation of a kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lowered {
    Void,
    I32,
    I64,
    F32,
    F64,
    Address,
}

impl Lowered {
    pub const fn of(kind: Kind) -> Self {
        match kind {
            Kind::Void => Self::Void,
            Kind::Int32 => Self::I32,
            Kind::Int64 => Self::I64,
            Kind::Float32 => Self::F32,
            Kind::Float64 => Self::F64,
            Kind::Object | Kind::ObjectRef | Kind::CString => Self::Address,
        }
    }

    /// Size in bytes of the native representation
    #[inline]
    pub const fn size(self) -> usize {
        match self {
            Self::Void => 0,
            Self::I32 | Self::F32 => 4,
            Self::I64 | Self::F64 => 8,
            Self::Address => core::mem::size_of::<usize>(),
        }
    }

    pub fn ffi_type(self) -> Type {
        match self {
            Self::Void => Type::void(),
            Self::I32 => Type::i32(),
            Self::I64 => Type::i64(),
            Self::F32 => Type::f32(),
            Self::F64 => Type::f64(),
            Self::Address => Type::pointer(),
        }
    }
}
