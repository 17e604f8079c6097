//! pylink - call the CPython C API of an embedded interpreter
//!
//! The runtime library is located and loaded at startup, and every declared
//! C API function gets a prepared call adapter built from its signature.
//! Calls then go by name through one dispatcher that marshals arguments and
//! results per declared kind.
//!
//! ```no_run
//! use pylink::{Config, Runtime, Value};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let rt = Runtime::global(&Config::discover()?)?;
//! let py = rt.interpreter();
//! py.initialize()?;
//!
//! let n = rt.invoke("PyLong_FromLongLong", &[Value::Int(42)])?;
//! let back = rt.invoke("PyLong_AsLongLong", &[n])?;
//! assert_eq!(back, Value::Int(42));
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod arena;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod globals;
pub mod interpreter;
pub mod library;
pub mod logging;
pub mod marshal;
pub mod runtime;
pub mod signature;

// Re-export core types
pub use adapter::{AdapterTable, BuildError, CallAdapter};
pub use arena::{ArenaScope, ArenaStats};
pub use config::Config;
pub use dispatch::{CallDispatcher, CallError};
pub use error::BindError;
pub use globals::GlobalTable;
pub use interpreter::{
    gil_depth, GilState, Interpreter, InterpreterState, LifecycleError, ReleaseError, Startup,
    ThreadToken,
};
pub use library::{LibraryHandle, ResolveError, StaticSymbols, SymbolSource};
pub use marshal::{MarshalError, NativeAddress, Value};
pub use runtime::Runtime;
pub use signature::{Catalog, EntryPoint, Kind, Signature};
