//! Schema error types
//!
//! Error codes:
//! - MAP_INVALID_MODEL
//! - MAP_COLUMN_NOT_FOUND
//! - MAP_NO_PRIMARY_COLUMN
//! - MAP_DUPLICATE_PRIMARY_COLUMN
//! - MAP_CONFLICTING_ACCESS_MODIFIER
//! - MAP_COLUMN_KIND_CONFLICT
//! - MAP_MISSING_REQUIRED_COLUMN
//! - MAP_MISSING_REQUIRED_COLUMNS
//! - MAP_READ_ONLY_VIOLATION
//! - MAP_WRITE_ONLY_VIOLATION
//! - MAP_TYPE_MISMATCH
//! - MAP_INVALID_VALUE
//! - MAP_MAX_DEPTH_EXCEEDED
//! - MAP_ALREADY_INSTALLED

use std::fmt;

/// Phase in which an error is raised
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Raised while declaring or freezing the schema
    Declaration,
    /// Raised while materializing entity data
    Materialization,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Declaration => write!(f, "DECLARATION"),
            Phase::Materialization => write!(f, "MATERIALIZATION"),
        }
    }
}

/// Schema error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaErrorCode {
    /// Model does not resolve to a registered entity
    InvalidModel,
    /// Column is not declared
    ColumnNotFound,
    /// Entity has no primary column
    NoPrimaryColumn,
    /// A second primary column was declared
    DuplicatePrimaryColumn,
    /// Column is both read-only and write-only
    ConflictingAccessModifier,
    /// Column is both real and virtual, or a join got a scalar format
    ColumnKindConflict,
    /// Required column absent in strict input
    MissingRequiredColumn,
    /// Required columns absent in strict output
    MissingRequiredColumns,
    /// Value supplied for a read-only column on input
    ReadOnlyViolation,
    /// Value present for a write-only column on output
    WriteOnlyViolation,
    /// Runtime shape disagrees with the declared structure
    TypeMismatch,
    /// Value matches none of the declared formats
    InvalidValue,
    /// Nesting exceeds the configured depth
    MaxDepthExceeded,
    /// A process-wide schema is already installed
    AlreadyInstalled,
}

impl SchemaErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            SchemaErrorCode::InvalidModel => "MAP_INVALID_MODEL",
            SchemaErrorCode::ColumnNotFound => "MAP_COLUMN_NOT_FOUND",
            SchemaErrorCode::NoPrimaryColumn => "MAP_NO_PRIMARY_COLUMN",
            SchemaErrorCode::DuplicatePrimaryColumn => "MAP_DUPLICATE_PRIMARY_COLUMN",
            SchemaErrorCode::ConflictingAccessModifier => "MAP_CONFLICTING_ACCESS_MODIFIER",
            SchemaErrorCode::ColumnKindConflict => "MAP_COLUMN_KIND_CONFLICT",
            SchemaErrorCode::MissingRequiredColumn => "MAP_MISSING_REQUIRED_COLUMN",
            SchemaErrorCode::MissingRequiredColumns => "MAP_MISSING_REQUIRED_COLUMNS",
            SchemaErrorCode::ReadOnlyViolation => "MAP_READ_ONLY_VIOLATION",
            SchemaErrorCode::WriteOnlyViolation => "MAP_WRITE_ONLY_VIOLATION",
            SchemaErrorCode::TypeMismatch => "MAP_TYPE_MISMATCH",
            SchemaErrorCode::InvalidValue => "MAP_INVALID_VALUE",
            SchemaErrorCode::MaxDepthExceeded => "MAP_MAX_DEPTH_EXCEEDED",
            SchemaErrorCode::AlreadyInstalled => "MAP_ALREADY_INSTALLED",
        }
    }

    /// Returns the phase this error belongs to
    pub fn phase(&self) -> Phase {
        match self {
            SchemaErrorCode::DuplicatePrimaryColumn
            | SchemaErrorCode::ConflictingAccessModifier
            | SchemaErrorCode::ColumnKindConflict
            | SchemaErrorCode::AlreadyInstalled => Phase::Declaration,
            _ => Phase::Materialization,
        }
    }
}

impl fmt::Display for SchemaErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Schema error type with full context
#[derive(Debug, Clone)]
pub struct SchemaError {
    /// Error code
    code: SchemaErrorCode,
    /// Human-readable message
    message: String,
    /// Owning entity label (storage name, or type name when unnamed)
    entity: Option<String>,
    /// Offending column names
    columns: Vec<String>,
}

impl SchemaError {
    fn new(code: SchemaErrorCode, message: String) -> Self {
        Self {
            code,
            message,
            entity: None,
            columns: Vec::new(),
        }
    }

    fn with_context(mut self, entity: impl Into<String>, columns: Vec<String>) -> Self {
        self.entity = Some(entity.into());
        self.columns = columns;
        self
    }

    /// Model does not resolve to a registered entity
    pub fn invalid_model(model: impl Into<String>) -> Self {
        let model = model.into();
        Self::new(
            SchemaErrorCode::InvalidModel,
            format!("Model '{}' is not a registered entity", model),
        )
        .with_context(model, Vec::new())
    }

    /// Column is not declared on the entity
    pub fn column_not_found(entity: &str, column: &str) -> Self {
        Self::new(
            SchemaErrorCode::ColumnNotFound,
            format!("Column '{}' does not exist in entity '{}'", column, entity),
        )
        .with_context(entity, vec![column.to_string()])
    }

    /// Entity has no primary column
    pub fn no_primary_column(entity: &str) -> Self {
        Self::new(
            SchemaErrorCode::NoPrimaryColumn,
            format!("Entity '{}' has no primary column", entity),
        )
        .with_context(entity, Vec::new())
    }

    /// A second primary column was declared
    pub fn duplicate_primary_column(entity: &str, existing: &str, column: &str) -> Self {
        Self::new(
            SchemaErrorCode::DuplicatePrimaryColumn,
            format!(
                "Entity '{}' already has primary column '{}', cannot make '{}' primary",
                entity, existing, column
            ),
        )
        .with_context(entity, vec![existing.to_string(), column.to_string()])
    }

    /// Column is both read-only and write-only
    pub fn conflicting_access_modifier(entity: &str, column: &str, modifier: &str) -> Self {
        Self::new(
            SchemaErrorCode::ConflictingAccessModifier,
            format!(
                "Column '{}' in entity '{}' cannot be {}: read-only and write-only are exclusive",
                column, entity, modifier
            ),
        )
        .with_context(entity, vec![column.to_string()])
    }

    /// Column kind conflict (real versus virtual)
    pub fn column_kind_conflict(entity: &str, column: &str, reason: impl Into<String>) -> Self {
        Self::new(
            SchemaErrorCode::ColumnKindConflict,
            format!(
                "Column '{}' in entity '{}': {}",
                column,
                entity,
                reason.into()
            ),
        )
        .with_context(entity, vec![column.to_string()])
    }

    /// Required column absent in strict input
    pub fn missing_required_column(entity: &str, column: &str) -> Self {
        Self::new(
            SchemaErrorCode::MissingRequiredColumn,
            format!(
                "Required column '{}' in entity '{}' does not exist",
                column, entity
            ),
        )
        .with_context(entity, vec![column.to_string()])
    }

    /// Required columns absent in strict output
    pub fn missing_required_columns(entity: &str, columns: Vec<String>) -> Self {
        Self::new(
            SchemaErrorCode::MissingRequiredColumns,
            format!(
                "Required column(s) '{}' in entity '{}' does not exist",
                columns.join(", "),
                entity
            ),
        )
        .with_context(entity, columns)
    }

    /// Value supplied for a read-only column
    pub fn read_only_violation(entity: &str, column: &str) -> Self {
        Self::new(
            SchemaErrorCode::ReadOnlyViolation,
            format!(
                "Column '{}' in entity '{}' is read-only and cannot be supplied",
                column, entity
            ),
        )
        .with_context(entity, vec![column.to_string()])
    }

    /// Value present for a write-only column
    pub fn write_only_violation(entity: &str, column: &str) -> Self {
        Self::new(
            SchemaErrorCode::WriteOnlyViolation,
            format!(
                "Column '{}' in entity '{}' is write-only and cannot be returned",
                column, entity
            ),
        )
        .with_context(entity, vec![column.to_string()])
    }

    /// Runtime shape disagrees with the declared structure
    pub fn type_mismatch(entity: &str, column: &str, expected: &str, actual: &str) -> Self {
        Self::new(
            SchemaErrorCode::TypeMismatch,
            format!(
                "Column '{}' in entity '{}' expects {}, got {}",
                column, entity, expected, actual
            ),
        )
        .with_context(entity, vec![column.to_string()])
    }

    /// Value matches none of the declared formats
    pub fn invalid_value(entity: &str, column: &str, formats: &str) -> Self {
        Self::new(
            SchemaErrorCode::InvalidValue,
            format!(
                "Column '{}' in entity '{}' does not match any of: {}",
                column, entity, formats
            ),
        )
        .with_context(entity, vec![column.to_string()])
    }

    /// Nesting exceeds the configured depth
    pub fn max_depth_exceeded(entity: &str, max_depth: usize) -> Self {
        Self::new(
            SchemaErrorCode::MaxDepthExceeded,
            format!(
                "Entity '{}' nests deeper than the maximum of {} levels",
                entity, max_depth
            ),
        )
        .with_context(entity, Vec::new())
    }

    /// A process-wide schema is already installed
    pub fn already_installed() -> Self {
        Self::new(
            SchemaErrorCode::AlreadyInstalled,
            "A process-wide schema has already been installed".into(),
        )
    }

    /// Returns the error code
    pub fn code(&self) -> SchemaErrorCode {
        self.code
    }

    /// Returns the phase
    pub fn phase(&self) -> Phase {
        self.code.phase()
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the owning entity label if applicable
    pub fn entity(&self) -> Option<&str> {
        self.entity.as_deref()
    }

    /// Returns the offending columns
    pub fn columns(&self) -> &[String] {
        &self.columns
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.code.phase(), self.code.code(), self.message)
    }
}

impl std::error::Error for SchemaError {}

/// Result type for schema operations
pub type SchemaResult<T> = Result<T, SchemaError>;
