//! Runtime library discovery, loading and symbol resolution
//!
//! Candidates are tried strictly in priority order: the
//! `PYLINK_PYTHON_LIBRARY` environment variable, the `library.path`
//! configuration property, then a version-qualified default list. The first
//! library that loads wins; if none does, the error carries every attempt
//! and its failure text.
//!
//! On Unix the library is opened `RTLD_NOW | RTLD_GLOBAL` so extension
//! modules the interpreter imports later can see its symbols.


use crate::config::LibraryConfig;
use crate::marshal::NativeAddress;
use core::ffi::c_void;
use core::fmt;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, error, info};

/// Environment variable naming a library to try before anything else
pub const ENV_LIBRARY: &str = "PYLINK_PYTHON_LIBRARY";

/// Minor versions of CPython 3 probed by default, newest first
const DEFAULT_MINOR_VERSIONS: [u32; 6] = [13, 12, 11, 10, 9, 8];

/// Anything symbols can be resolved against
///
/// Implemented by the dynamically loaded [`LibraryHandle`] and by
/// [`StaticSymbols`] for runtimes already linked into the host image.
pub trait SymbolSource: Send + Sync {
    /// Human-readable name used in diagnostics
    fn name(&self) -> &str;

    /// Address of the exported symbol `name`
    fn symbol(&self, name: &str) -> Result<NativeAddress, SymbolError>;
}

/// Handle to the loaded runtime library
///
/// Lives as long as the adapter table built from it; the process-wide
/// runtime never drops it.
pub struct LibraryHandle {
    library: libloading::Library,
    name: String,
}

impl LibraryHandle {
    /// Load one library by file name or path
    pub fn open(name: &str) -> Result<Self, libloading::Error> {
        let library = Self::open_impl(name)?;
        Ok(Self {
            library,
            name: name.to_owned(),
        })
    }

    #[cfg(unix)]
    fn open_impl(name: &str) -> Result<libloading::Library, libloading::Error> {
        use libloading::os::unix::{Library, RTLD_GLOBAL, RTLD_NOW};

        // SAFETY: loading runs the library's initializers; the candidate
        // list only names the interpreter runtime.
        unsafe { Library::open(Some(name), RTLD_NOW | RTLD_GLOBAL) }.map(Into::into)
    }

    #[cfg(not(unix))]
    fn open_impl(name: &str) -> Result<libloading::Library, libloading::Error> {
        // SAFETY: as above
        unsafe { libloading::Library::new(name) }
    }
}

impl SymbolSource for LibraryHandle {
    fn name(&self) -> &str {
        &self.name
    }

    fn symbol(&self, name: &str) -> Result<NativeAddress, SymbolError> {
        if name.as_bytes().contains(&0) {
            return Err(SymbolError::InvalidName(name.to_owned()));
        }

        // SAFETY: the symbol is read as an untyped address, never called here
        let symbol = unsafe { self.library.get::<*mut c_void>(name.as_bytes()) }.map_err(|e| {
            SymbolError::NotFound {
                symbol: name.to_owned(),
                library: self.name.clone(),
                reason: e.to_string(),
            }
        })?;

        let addr = NativeAddress::from_mut_ptr(*symbol);
        if addr.is_null() {
            return Err(SymbolError::NotFound {
                symbol: name.to_owned(),
                library: self.name.clone(),
                reason: "symbol resolved to a null address".into(),
            });
        }

        Ok(addr)
    }
}

impl fmt::Debug for LibraryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LibraryHandle").field("name", &self.name).finish()
    }
}

/// In-memory symbol table
///
/// For runtimes statically linked into the host, where symbols are known
/// without a dynamic loader.
#[derive(Debug, Clone, Default)]
pub struct StaticSymbols {
    name: String,
    symbols: HashMap<String, NativeAddress>,
}

impl StaticSymbols {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            symbols: HashMap::new(),
        }
    }

    pub fn with(mut self, symbol: &str, addr: NativeAddress) -> Self {
        self.insert(symbol, addr);
        self
    }

    /// Register a function by pointer
    pub fn with_fn(self, symbol: &str, func: *const ()) -> Self {
        self.with(symbol, NativeAddress::from_ptr(func))
    }

    pub fn insert(&mut self, symbol: &str, addr: NativeAddress) {
        self.symbols.insert(symbol.to_owned(), addr);
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

impl SymbolSource for StaticSymbols {
    fn name(&self) -> &str {
        &self.name
    }

    fn symbol(&self, name: &str) -> Result<NativeAddress, SymbolError> {
        self.symbols
            .get(name)
            .copied()
            .filter(|addr| !addr.is_null())
            .ok_or_else(|| SymbolError::NotFound {
                symbol: name.to_owned(),
                library: self.name.clone(),
                reason: "not registered".into(),
            })
    }
}

/// Symbol lookup errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SymbolError {
    #[error("invalid symbol name {0:?}")]
    InvalidName(String),

    #[error("symbol `{symbol}` not found in {library}: {reason}")]
    NotFound {
        symbol: String,
        library: String,
        reason: String,
    },
}

/// One failed load, kept verbatim for the final report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadAttempt {
    pub candidate: String,
    pub reason: String,
}

impl fmt::Display for LoadAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.candidate, self.reason)
    }
}

/// Library resolution errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("no runtime library candidates to try")]
    NoCandidates,

    #[error("no runtime library could be loaded ({} tried):{}", .attempts.len(), format_attempts(.attempts))]
    Exhausted { attempts: Vec<LoadAttempt> },
}

impl ResolveError {
    /// Every attempt made, in order (empty for `NoCandidates`)
    pub fn attempts(&self) -> &[LoadAttempt] {
        match self {
            Self::NoCandidates => &[],
            Self::Exhausted { attempts } => attempts,
        }
    }
}

fn format_attempts(attempts: &[LoadAttempt]) -> String {
    attempts.iter().map(|a| format!("\n  - {}", a)).collect()
}

/// Ordered candidate list for the current process
pub fn candidates(config: &LibraryConfig) -> Vec<String> {
    candidates_from(std::env::var(ENV_LIBRARY).ok(), config)
}

/// Ordered candidate list from an explicit override value
///
/// Blank entries are skipped; repeated names keep their first position.
pub fn candidates_from(env_override: Option<String>, config: &LibraryConfig) -> Vec<String> {
    let defaults = config.defaults.clone().unwrap_or_else(default_candidates);

    let mut ordered: Vec<String> = Vec::with_capacity(defaults.len() + 2);
    let sources = env_override
        .into_iter()
        .chain(config.path.clone())
        .chain(defaults);

    for candidate in sources {
        let candidate = candidate.trim();
        if !candidate.is_empty() && !ordered.iter().any(|c| c == candidate) {
            ordered.push(candidate.to_owned());
        }
    }

    ordered
}

/// Version-qualified library names for this platform, newest first
pub fn default_candidates() -> Vec<String> {
    let mut names = Vec::new();

    for minor in DEFAULT_MINOR_VERSIONS {
        if cfg!(target_os = "windows") {
            names.push(format!("python3{}.dll", minor));
        } else if cfg!(target_os = "macos") {
            names.push(format!("libpython3.{}.dylib", minor));
        } else {
            names.push(format!("libpython3.{}.so.1.0", minor));
            names.push(format!("libpython3.{}.so", minor));
        }
    }

    names.push(
        if cfg!(target_os = "windows") {
            "python3.dll"
        } else if cfg!(target_os = "macos") {
            "libpython3.dylib"
        } else {
            "libpython3.so"
        }
        .to_owned(),
    );

    names
}

/// Load the first candidate that succeeds
pub fn resolve(candidates: &[String]) -> Result<LibraryHandle, ResolveError> {
    resolve_with(candidates, |name| {
        LibraryHandle::open(name).map_err(|e| e.to_string())
    })
}

/// Resolution over an arbitrary opener
///
/// Stops at the first success; later candidates are never touched.
pub fn resolve_with<L, F>(candidates: &[String], mut open: F) -> Result<L, ResolveError>
where
    F: FnMut(&str) -> Result<L, String>,
{
    if candidates.is_empty() {
        error!(event = "library_resolve_failed", "no candidates configured");
        return Err(ResolveError::NoCandidates);
    }

    let mut attempts = Vec::new();

    for candidate in candidates {
        debug!(event = "library_attempt", candidate = %candidate, "trying runtime library");

        match open(candidate) {
            Ok(library) => {
                info!(
                    event = "library_loaded",
                    candidate = %candidate,
                    failed_before = attempts.len(),
                    "runtime library loaded"
                );
                return Ok(library);
            }
            Err(reason) => {
                debug!(event = "library_attempt_failed", candidate = %candidate, reason = %reason);
                attempts.push(LoadAttempt {
                    candidate: candidate.clone(),
                    reason,
                });
            }
        }
    }

    error!(
        event = "library_resolve_failed",
        attempts = attempts.len(),
        "no runtime library could be loaded"
    );
    Err(ResolveError::Exhausted { attempts })
}
