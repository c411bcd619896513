//! # Mapper Errors

use thiserror::Error;

use crate::schema::SchemaError;

/// Result type for driver operations
pub type DriverResult<T> = Result<T, DriverError>;

/// Result type for mapper operations
pub type MapperResult<T> = Result<T, MapperError>;

/// Storage driver errors
#[derive(Debug, Clone, Error)]
pub enum DriverError {
    #[error("Duplicate key {key} in '{storage}'")]
    DuplicateKey { storage: String, key: String },

    #[error("Storage '{0}' has no primary key")]
    NoPrimaryKey(String),

    #[error("Join on '{storage}' failed: {reason}")]
    InvalidJoin { storage: String, reason: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DriverError {
    /// Stable error code, in the same family as schema error codes
    pub fn code(&self) -> &'static str {
        match self {
            DriverError::DuplicateKey { .. } => "MAP_DRIVER_DUPLICATE_KEY",
            DriverError::NoPrimaryKey(_) => "MAP_DRIVER_NO_PRIMARY_KEY",
            DriverError::InvalidJoin { .. } => "MAP_DRIVER_INVALID_JOIN",
            DriverError::Internal(_) => "MAP_DRIVER_INTERNAL",
        }
    }
}

/// Mapper errors
#[derive(Debug, Error)]
pub enum MapperError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),
}

impl MapperError {
    /// Error code of the underlying failure
    pub fn code(&self) -> &'static str {
        match self {
            MapperError::Schema(err) => err.code().code(),
            MapperError::Driver(err) => err.code(),
        }
    }
}
