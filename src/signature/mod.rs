//! Signature descriptors - the declarative shape of every entry point
//!
//! Each native function the layer can call is declared once, by name, with
//! its ordered parameter kinds and return kind. Adapters are built from these
//! declarations alone; nothing is inferred from the values a caller passes.

pub mod catalog;


use crate::marshal::Value;
use core::fmt;
use std::collections::HashSet;
use thiserror::Error;

/// Descriptor-level kind of one parameter or return value
///
/// `Object`, `ObjectRef` and `CString` are distinct here so declarations read
/// like the C prototypes, but all three lower to a single native address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Int32,
    Int64,
    Float32,
    Float64,
    /// Opaque object handle (`PyObject *`, `PyThreadState *`)
    Object,
    /// Pointer to a handle or scalar slot (`PyObject **`, `Py_ssize_t *`)
    ObjectRef,
    /// NUL-terminated byte string (`const char *`)
    CString,
    /// No value; valid only as a return kind
    Void,
}

impl Kind {
    /// C `long`
    #[cfg(windows)]
    pub const LONG: Kind = Kind::Int32;
    #[cfg(not(windows))]
    pub const LONG: Kind = Kind::Int64;

    /// `Py_ssize_t`
    #[cfg(target_pointer_width = "64")]
    pub const SSIZE: Kind = Kind::Int64;
    #[cfg(not(target_pointer_width = "64"))]
    pub const SSIZE: Kind = Kind::Int32;

    pub const fn name(self) -> &'static str {
        match self {
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::Object => "object",
            Self::ObjectRef => "object-ref",
            Self::CString => "cstring",
            Self::Void => "void",
        }
    }

    #[inline]
    pub const fn is_address(self) -> bool {
        matches!(self, Self::Object | Self::ObjectRef | Self::CString)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a call reports failure through its return value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sentinel {
    /// Never signals failure through the return value
    None,
    /// A null handle or string means failure
    Null,
    /// `-1` means failure (or possible failure, for floats; query the error state)
    MinusOne,
}

impl Sentinel {
    /// Default convention for a return kind
    pub const fn for_return(kind: Kind) -> Self {
        match kind {
            Kind::Object | Kind::ObjectRef | Kind::CString => Self::Null,
            Kind::Int32 | Kind::Int64 | Kind::Float32 | Kind::Float64 => Self::MinusOne,
            Kind::Void => Self::None,
        }
    }
}

/// Parameter and return kinds of one entry point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    pub params: &'static [Kind],
    pub ret: Kind,
    pub failure: Sentinel,
}

impl Signature {
    pub const fn new(params: &'static [Kind], ret: Kind) -> Self {
        Self {
            params,
            ret,
            failure: Sentinel::for_return(ret),
        }
    }

    /// Same shape, but the return value never encodes failure
    pub const fn infallible(mut self) -> Self {
        self.failure = Sentinel::None;
        self
    }

    #[inline]
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Whether `ret` is this entry point's failure sentinel
    ///
    /// A `true` result means the caller should consult the error-state
    /// entry points; this layer never acts on it.
    pub fn signals_failure(&self, ret: &Value) -> bool {
        match (self.failure, ret) {
            (Sentinel::None, _) => false,
            (Sentinel::Null, Value::Address(addr)) => addr.is_null(),
            (Sentinel::MinusOne, Value::Int(i)) => *i == -1,
            (Sentinel::MinusOne, Value::Double(d)) => *d == -1.0,
            (Sentinel::MinusOne, Value::Single(f)) => *f == -1.0,
            _ => false,
        }
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, kind) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", kind)?;
        }
        write!(f, ") -> {}", self.ret)
    }
}

/// One declared native function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryPoint {
    pub name: &'static str,
    pub signature: Signature,
}

impl EntryPoint {
    pub const fn new(name: &'static str, params: &'static [Kind], ret: Kind) -> Self {
        Self {
            name,
            signature: Signature::new(params, ret),
        }
    }
}

/// Declare entry points in C-prototype order
///
/// ```
/// use pylink::{declare_entry_points, signature::EntryPoint};
///
/// static MATH: &[EntryPoint] = declare_entry_points! {
///     abs(Int32) -> Int32;
///     labs(LONG) -> LONG [infallible];
/// };
/// assert_eq!(MATH.len(), 2);
/// ```
#[macro_export]
macro_rules! declare_entry_points {
    (@sig [$($param:expr),*] $ret:ident) => {
        $crate::signature::Signature::new(&[$($param),*], $crate::signature::Kind::$ret)
    };
    (@sig [$($param:expr),*] $ret:ident infallible) => {
        $crate::signature::Signature::new(&[$($param),*], $crate::signature::Kind::$ret).infallible()
    };
    ($( $name:ident ( $($param:ident),* ) -> $ret:ident $([$flag:ident])? ; )*) => {
        &[$(
            $crate::signature::EntryPoint {
                name: stringify!($name),
                signature: $crate::declare_entry_points!(
                    @sig [$($crate::signature::Kind::$param),*] $ret $($flag)?
                ),
            },
        )*]
    };
}

/// Catalogue validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("entry point `{0}` is declared more than once")]
    Duplicate(&'static str),

    #[error("entry point `{0}` declares a void parameter")]
    VoidParameter(&'static str),

    #[error("entry point `{0}` is not declared")]
    Unknown(String),
}

/// Validated set of entry points: unique names, well-formed signatures
#[derive(Debug, Clone)]
pub struct Catalog {
    entries: Vec<EntryPoint>,
}

impl Catalog {
    pub fn new(entries: impl IntoIterator<Item = EntryPoint>) -> Result<Self, CatalogError> {
        let entries: Vec<EntryPoint> = entries.into_iter().collect();
        let mut seen = HashSet::with_capacity(entries.len());

        for entry in &entries {
            if !seen.insert(entry.name) {
                return Err(CatalogError::Duplicate(entry.name));
            }
            if entry.signature.params.contains(&Kind::Void) {
                return Err(CatalogError::VoidParameter(entry.name));
            }
        }

        Ok(Self { entries })
    }

    /// Every CPython C API function this layer binds
    pub fn python() -> Self {
        Self {
            entries: catalog::PYTHON_C_API.to_vec(),
        }
    }

    /// Restrict to the named entry points, keeping their declared signatures
    pub fn select(&self, names: &[&str]) -> Result<Self, CatalogError> {
        let entries = names
            .iter()
            .map(|name| {
                self.get(name)
                    .copied()
                    .ok_or_else(|| CatalogError::Unknown((*name).to_owned()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(entries)
    }

    pub fn get(&self, name: &str) -> Option<&EntryPoint> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &EntryPoint> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
