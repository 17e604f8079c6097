//! Call dispatcher - name + managed arguments → native call → managed result
//!
//! Design: a thin, stateless pass over the adapter table. Arguments are
//! checked and lowered before any native code runs, so a misuse error never
//! leaves the interpreter half-called. Native failures come back unchanged
//! as sentinel values; see [`Signature::signals_failure`].

use crate::adapter::{AdapterTable, CallAdapter, INLINE_ARGS};
use crate::arena::ArenaScope;
use crate::marshal::{self, MarshalError, NativeValue, Value};
use crate::signature::Signature;
use smallvec::SmallVec;
use std::sync::Arc;
use thiserror::Error;
use tracing::trace;

/// Dispatch-time misuse
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CallError {
    #[error("no entry point named `{0}`")]
    UnknownEntryPoint(String),

    #[error("`{entry}` takes {expected} argument(s), got {found}")]
    Arity {
        entry: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("`{entry}` argument {index}: {source}")]
    Marshal {
        entry: &'static str,
        index: usize,
        #[source]
        source: MarshalError,
    },

    #[error("`{entry}` returned an unrepresentable value: {source}")]
    Return {
        entry: &'static str,
        #[source]
        source: MarshalError,
    },
}

/// Invokes entry points by name over a built adapter table
#[derive(Debug)]
pub struct CallDispatcher {
    table: AdapterTable,
    arena: Arc<ArenaScope>,
}

impl CallDispatcher {
    pub fn new(table: AdapterTable, arena: Arc<ArenaScope>) -> Self {
        Self { table, arena }
    }

    /// Call `name` with `args`
    ///
    /// The calling thread must hold the interpreter lock for any entry point
    /// that touches interpreter state. This is not checked.
    pub fn invoke(&self, name: &str, args: &[Value]) -> Result<Value, CallError> {
        let adapter = self
            .table
            .get(name)
            .ok_or_else(|| CallError::UnknownEntryPoint(name.to_owned()))?;

        self.invoke_adapter(adapter, args)
    }

    /// Call a pre-resolved adapter, skipping the name lookup
    pub fn invoke_adapter(&self, adapter: &CallAdapter, args: &[Value]) -> Result<Value, CallError> {
        let entry = adapter.name();
        let signature = adapter.signature();

        let raw_args = self.lower(entry, signature, args)?;

        trace!(target: "pylink::dispatch", entry, args = args.len(), "native call");

        // SAFETY: one slot per declared parameter, each produced by `to_native`
        // for exactly that parameter's kind
        let raw_ret = unsafe { adapter.call_raw(&raw_args) };

        // SAFETY: `raw_ret` came from a call whose return lowers from `signature.ret`
        let ret = unsafe { marshal::from_native(raw_ret, signature.ret) }
            .map_err(|source| CallError::Return { entry, source })?;

        trace!(target: "pylink::dispatch", entry, ret = ret.kind_name(), "native return");

        Ok(ret)
    }

    fn lower(
        &self,
        entry: &'static str,
        signature: &Signature,
        args: &[Value],
    ) -> Result<SmallVec<[NativeValue; INLINE_ARGS]>, CallError> {
        if args.len() != signature.arity() {
            return Err(CallError::Arity {
                entry,
                expected: signature.arity(),
                found: args.len(),
            });
        }

        args.iter()
            .zip(signature.params)
            .enumerate()
            .map(|(index, (value, kind))| {
                marshal::to_native(value, *kind, &self.arena)
                    .map_err(|source| CallError::Marshal { entry, index, source })
            })
            .collect()
    }

    #[inline]
    pub fn adapter(&self, name: &str) -> Option<&CallAdapter> {
        self.table.get(name)
    }

    /// Scope for out-parameter slots and other caller-owned buffers
    pub fn arena(&self) -> &ArenaScope {
        &self.arena
    }

    pub fn table(&self) -> &AdapterTable {
        &self.table
    }
}
