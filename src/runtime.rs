//! Process-scoped runtime - library, adapters, globals and lifecycle in one place
//!
//! Design: nothing here is ambient. A [`Runtime`] is built explicitly and
//! passed by reference. [`Runtime::global`] is the one run-once singleton,
//! for hosts that want a single interpreter per process; it is never torn
//! down, so the library and every arena-backed string live until exit.

use crate::adapter::AdapterTable;
use crate::arena::ArenaScope;
use crate::config::Config;
use crate::dispatch::{CallDispatcher, CallError};
use crate::error::Result;
use crate::globals::{DataSymbol, GlobalTable, PYTHON_GLOBALS};
use crate::interpreter::{Interpreter, Lifecycle};
use crate::library::{self, SymbolSource};
use crate::marshal::{NativeAddress, Value};
use crate::signature::Catalog;
use once_cell::sync::OnceCell;
use std::sync::Arc;
use tracing::info;

static GLOBAL: OnceCell<Runtime> = OnceCell::new();

/// A bound runtime library, ready to call
#[derive(Debug)]
pub struct Runtime {
    dispatcher: CallDispatcher,
    globals: GlobalTable,
    lifecycle: Lifecycle,
}

impl Runtime {
    /// Find and load libpython, then bind the full C API surface
    pub fn load(config: &Config) -> Result<Self> {
        let candidates = library::candidates(&config.library);
        let handle = library::resolve(&candidates)?;

        Self::from_source(Arc::new(handle), &Catalog::python(), PYTHON_GLOBALS)
    }

    /// Bind `catalog` and `globals` against any symbol source
    pub fn from_source(
        source: Arc<dyn SymbolSource>,
        catalog: &Catalog,
        globals: &[DataSymbol],
    ) -> Result<Self> {
        let globals = GlobalTable::resolve(globals, source.as_ref())?;
        let table = AdapterTable::build(catalog, source)?;

        info!(
            event = "runtime_bound",
            library = table.source().name(),
            entry_points = table.len(),
            globals = globals.len(),
            "runtime bound"
        );

        Ok(Self {
            dispatcher: CallDispatcher::new(table, Arc::new(ArenaScope::new())),
            globals,
            lifecycle: Lifecycle::new(),
        })
    }

    /// The process-wide runtime, loaded on first use
    ///
    /// `config` is only consulted by the call that performs the load. A
    /// failed load is not cached; a later call tries again.
    pub fn global(config: &Config) -> Result<&'static Runtime> {
        GLOBAL.get_or_try_init(|| Self::load(config))
    }

    /// Lifecycle and lock operations
    pub fn interpreter(&self) -> Interpreter<'_> {
        Interpreter::new(&self.dispatcher, &self.lifecycle)
    }

    /// Call an entry point by name; see [`CallDispatcher::invoke`]
    pub fn invoke(&self, name: &str, args: &[Value]) -> std::result::Result<Value, CallError> {
        self.dispatcher.invoke(name, args)
    }

    pub fn dispatcher(&self) -> &CallDispatcher {
        &self.dispatcher
    }

    pub fn arena(&self) -> &ArenaScope {
        self.dispatcher.arena()
    }

    pub fn globals(&self) -> &GlobalTable {
        &self.globals
    }

    /// Address of an exported singleton or exception type by alias
    pub fn global_object(&self, alias: &str) -> Option<NativeAddress> {
        self.globals.get(alias)
    }

    pub fn library_name(&self) -> &str {
        self.dispatcher.table().source().name()
    }
}
