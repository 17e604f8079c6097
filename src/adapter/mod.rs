//! Call adapters - one prepared native call per declared entry point
//!
//! Design: every adapter is built once, up front, from the declaration alone.
//! A libffi call interface (`Cif`) is prepared for the lowered parameter and
//! return types, and paired with the symbol's code address. Invoking an
//! adapter afterwards costs one `ffi_call` and no allocation for up to eight
//! arguments.
//!
//! The table build is all-or-nothing: a single unresolved symbol means the
//! runtime is incompatible, so no partial table is ever returned.

pub mod abi;

#[cfg(test)]
mod tests;

use crate::library::SymbolSource;
use crate::marshal::{NativeAddress, NativeValue};
use crate::signature::{Catalog, EntryPoint, Signature};
use abi::{CallingConvention, Lowered};
use libffi::middle::{Arg, Cif, CodePtr};
use smallvec::SmallVec;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info};

/// Inline capacity for argument buffers on the call path
pub(crate) const INLINE_ARGS: usize = 8;

/// Resolved, reusable binding of one signature to one native symbol
pub struct CallAdapter {
    entry: EntryPoint,
    params: SmallVec<[Lowered; INLINE_ARGS]>,
    ret: Lowered,
    convention: CallingConvention,
    address: NativeAddress,
    code: CodePtr,
    cif: Cif,
}

// SAFETY: the adapter is immutable after construction. `Cif` owns its type
// descriptions and `ffi_call` only reads them; the code pointer names a
// function in a library that outlives the adapter table.
unsafe impl Send for CallAdapter {}
unsafe impl Sync for CallAdapter {}

impl CallAdapter {
    /// Prepare a call interface for `entry` at `address`
    pub fn prepare(entry: EntryPoint, address: NativeAddress) -> Self {
        let params: SmallVec<[Lowered; INLINE_ARGS]> =
            entry.signature.params.iter().copied().map(Lowered::of).collect();
        let ret = Lowered::of(entry.signature.ret);

        let cif = Cif::new(params.iter().map(|p| p.ffi_type()), ret.ffi_type());

        Self {
            entry,
            params,
            ret,
            convention: CallingConvention::host(),
            address,
            code: CodePtr(address.as_mut_ptr()),
            cif,
        }
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.entry.name
    }

    #[inline]
    pub fn signature(&self) -> &Signature {
        &self.entry.signature
    }

    #[inline]
    pub fn address(&self) -> NativeAddress {
        self.address
    }

    #[inline]
    pub fn convention(&self) -> CallingConvention {
        self.convention
    }

    pub fn lowered_params(&self) -> &[Lowered] {
        &self.params
    }

    pub fn lowered_return(&self) -> Lowered {
        self.ret
    }

    /// Perform the native call on already-lowered arguments
    ///
    /// # Safety
    /// - `args` must hold exactly one slot per declared parameter, each
    ///   initialized for that parameter's lowered type
    /// - any address argument must satisfy the native function's contract
    /// - calls touching interpreter state require the calling thread to hold
    ///   the interpreter lock
    pub unsafe fn call_raw(&self, args: &[NativeValue]) -> NativeValue {
        debug_assert_eq!(args.len(), self.params.len(), "arity checked by caller");

        let ffi_args: SmallVec<[Arg; INLINE_ARGS]> = args.iter().map(Arg::new).collect();
        let mut out = NativeValue::zeroed();

        match self.ret {
            Lowered::Void => self.cif.call::<()>(self.code, &ffi_args),
            // Integral returns narrower than a register come back widened to `ffi_arg`
            Lowered::I32 => out.i32 = self.cif.call::<libffi::raw::ffi_arg>(self.code, &ffi_args) as i32,
            Lowered::I64 => out.i64 = self.cif.call::<i64>(self.code, &ffi_args),
            Lowered::F32 => out.f32 = self.cif.call::<f32>(self.code, &ffi_args),
            Lowered::F64 => out.f64 = self.cif.call::<f64>(self.code, &ffi_args),
            Lowered::Address => {
                out.ptr = self.cif.call::<*mut core::ffi::c_void>(self.code, &ffi_args)
            }
        }

        out
    }
}

impl fmt::Debug for CallAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallAdapter")
            .field("name", &self.entry.name)
            .field("signature", &self.entry.signature.to_string())
            .field("convention", &self.convention)
            .field("address", &self.address)
            .finish()
    }
}

/// Adapter table build failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("{library} is missing {} declared entry point(s): {}", .missing.len(), .missing.join(", "))]
    MissingSymbols {
        library: String,
        missing: Vec<String>,
    },
}

/// Name → adapter map, read-only once built
pub struct AdapterTable {
    adapters: HashMap<&'static str, CallAdapter>,
    // Keeps the library mapped for as long as any adapter can be called
    source: Arc<dyn SymbolSource>,
}

impl AdapterTable {
    /// Resolve and prepare every entry point in `catalog`
    ///
    /// Every missing symbol is collected before failing so the report names
    /// all of them at once.
    pub fn build(catalog: &Catalog, source: Arc<dyn SymbolSource>) -> Result<Self, BuildError> {
        let mut adapters = HashMap::with_capacity(catalog.len());
        let mut missing = Vec::new();

        for entry in catalog.iter() {
            match source.symbol(entry.name) {
                Ok(address) => {
                    let adapter = CallAdapter::prepare(*entry, address);
                    debug!(
                        target: "pylink::adapter",
                        entry = entry.name,
                        signature = %entry.signature,
                        address = %address,
                        "adapter prepared"
                    );
                    adapters.insert(entry.name, adapter);
                }
                Err(e) => {
                    debug!(target: "pylink::adapter", entry = entry.name, error = %e, "symbol unresolved");
                    missing.push(entry.name.to_owned());
                }
            }
        }

        if !missing.is_empty() {
            error!(
                event = "adapter_table_failed",
                library = source.name(),
                missing = missing.len(),
                "declared entry points missing from runtime library"
            );
            return Err(BuildError::MissingSymbols {
                library: source.name().to_owned(),
                missing,
            });
        }

        info!(
            event = "adapter_table_built",
            library = source.name(),
            adapters = adapters.len(),
            convention = CallingConvention::host().name(),
            "adapter table ready"
        );

        Ok(Self { adapters, source })
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<&CallAdapter> {
        self.adapters.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.adapters.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.adapters.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// The symbol source the table was built against
    pub fn source(&self) -> &dyn SymbolSource {
        self.source.as_ref()
    }
}

impl fmt::Debug for AdapterTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterTable")
            .field("library", &self.source.name())
            .field("adapters", &self.adapters.len())
            .finish()
    }
}
