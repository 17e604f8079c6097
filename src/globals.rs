//! Exported data symbols - singletons and exception types
//!
//! Some C API values are variables, not functions: `None` is the address of
//! `_Py_NoneStruct` itself, while `PyExc_TypeError` is a `PyObject *`
//! variable holding the type object's address. Both are resolved once, when
//! the runtime is built.

use crate::library::SymbolSource;
use crate::marshal::{self, NativeAddress};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{error, info};

/// How a data symbol's address relates to the object it names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Linkage {
    /// The symbol is the object
    Direct,
    /// The symbol is a pointer variable holding the object's address
    Indirect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataSymbol {
    pub symbol: &'static str,
    pub alias: &'static str,
    pub linkage: Linkage,
}

impl DataSymbol {
    pub const fn direct(symbol: &'static str, alias: &'static str) -> Self {
        Self { symbol, alias, linkage: Linkage::Direct }
    }

    pub const fn indirect(symbol: &'static str, alias: &'static str) -> Self {
        Self { symbol, alias, linkage: Linkage::Indirect }
    }
}

pub static PYTHON_GLOBALS: &[DataSymbol] = &[
    DataSymbol::direct("_Py_NoneStruct", "None"),
    DataSymbol::direct("_Py_TrueStruct", "True"),
    DataSymbol::direct("_Py_FalseStruct", "False"),
    DataSymbol::direct("_Py_NotImplementedStruct", "NotImplemented"),
    DataSymbol::direct("_Py_EllipsisObject", "Ellipsis"),
    DataSymbol::indirect("PyExc_BaseException", "BaseException"),
    DataSymbol::indirect("PyExc_Exception", "Exception"),
    DataSymbol::indirect("PyExc_RuntimeError", "RuntimeError"),
    DataSymbol::indirect("PyExc_TypeError", "TypeError"),
    DataSymbol::indirect("PyExc_ValueError", "ValueError"),
    DataSymbol::indirect("PyExc_KeyError", "KeyError"),
    DataSymbol::indirect("PyExc_IndexError", "IndexError"),
    DataSymbol::indirect("PyExc_AttributeError", "AttributeError"),
    DataSymbol::indirect("PyExc_NameError", "NameError"),
    DataSymbol::indirect("PyExc_ImportError", "ImportError"),
    DataSymbol::indirect("PyExc_ModuleNotFoundError", "ModuleNotFoundError"),
    DataSymbol::indirect("PyExc_StopIteration", "StopIteration"),
    DataSymbol::indirect("PyExc_ZeroDivisionError", "ZeroDivisionError"),
    DataSymbol::indirect("PyExc_OverflowError", "OverflowError"),
    DataSymbol::indirect("PyExc_MemoryError", "MemoryError"),
    DataSymbol::indirect("PyExc_OSError", "OSError"),
    DataSymbol::indirect("PyExc_NotImplementedError", "NotImplementedError"),
    DataSymbol::indirect("PyExc_SystemExit", "SystemExit"),
    DataSymbol::indirect("PyExc_KeyboardInterrupt", "KeyboardInterrupt"),
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GlobalsError {
    #[error("{library} is missing data symbol(s): {}", .missing.join(", "))]
    Missing { library: String, missing: Vec<String> },

    #[error("data symbol `{0}` holds a null pointer")]
    NullIndirect(&'static str),
}

/// Alias → object address, fixed once resolved
#[derive(Debug, Clone, Default)]
pub struct GlobalTable {
    objects: HashMap<&'static str, NativeAddress>,
}

impl GlobalTable {
    /// Resolve every symbol in `symbols`; any missing one fails the whole table
    pub fn resolve(symbols: &[DataSymbol], source: &dyn SymbolSource) -> Result<Self, GlobalsError> {
        let mut objects = HashMap::with_capacity(symbols.len());
        let mut missing = Vec::new();

        for data in symbols {
            let address = match source.symbol(data.symbol) {
                Ok(address) => address,
                Err(_) => {
                    missing.push(data.symbol.to_owned());
                    continue;
                }
            };

            let object = match data.linkage {
                Linkage::Direct => address,
                // SAFETY: the symbol is an exported, aligned `PyObject *` variable
                Linkage::Indirect => unsafe { marshal::read_address(address) }
                    .map_err(|_| GlobalsError::NullIndirect(data.symbol))?,
            };
            if object.is_null() {
                return Err(GlobalsError::NullIndirect(data.symbol));
            }

            objects.insert(data.alias, object);
        }

        if !missing.is_empty() {
            error!(event = "globals_failed", library = source.name(), missing = missing.len(), "data symbols missing");
            return Err(GlobalsError::Missing {
                library: source.name().to_owned(),
                missing,
            });
        }

        info!(event = "globals_resolved", library = source.name(), objects = objects.len(), "data symbols resolved");
        Ok(Self { objects })
    }

    #[inline]
    pub fn get(&self, alias: &str) -> Option<NativeAddress> {
        self.objects.get(alias).copied()
    }

    /// Address of `None`, if resolved
    pub fn none(&self) -> Option<NativeAddress> {
        self.get("None")
    }

    pub fn aliases(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.objects.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}
