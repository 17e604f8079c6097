//! Startup errors - everything that can stop a runtime from being bound

use crate::adapter::BuildError;
use crate::config::ConfigError;
use crate::globals::GlobalsError;
use crate::library::ResolveError;
use crate::signature::CatalogError;
use thiserror::Error;

/// Fatal binding failure; the process cannot use the runtime
#[derive(Debug, Error)]
pub enum BindError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("runtime library is incompatible: {0}")]
    Build(#[from] BuildError),

    #[error("runtime library is incompatible: {0}")]
    Globals(#[from] GlobalsError),

    #[error("invalid entry point catalogue: {0}")]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T, E = BindError> = std::result::Result<T, E>;
