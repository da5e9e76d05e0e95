use semver::Version;
use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, GraphKbError>;

/// Error kinds surfaced by the core.
///
/// The core never swallows an error; callers pattern-match on the kind and
/// the HTTP boundary maps kinds to status codes.
#[derive(Debug, Error)]
pub enum GraphKbError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("schema error: {0}")]
    Schema(String),
    #[error("store connection failed: {0}")]
    Connection(String),
    #[error("query exceeded deadline after {0}ms")]
    Timeout(u64),
    #[error("schema migration required: store is at {current}, build expects {target}")]
    MigrationRequired { current: Version, target: Version },
    #[error("no migration path from {current} to {target}")]
    NoMigrationPath { current: Version, target: Version },
    #[error("internal error: {0}")]
    Internal(String),
}

impl GraphKbError {
    /// Whether a caller may retry the failed operation as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GraphKbError::Connection(_) | GraphKbError::Timeout(_)
        )
    }

    /// Stable kind name, used by the HTTP boundary's error payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            GraphKbError::Validation(_) => "ValidationError",
            GraphKbError::NotFound(_) => "NotFoundError",
            GraphKbError::Conflict(_) => "ConflictError",
            GraphKbError::Schema(_) => "SchemaError",
            GraphKbError::Connection(_) => "ConnectionError",
            GraphKbError::Timeout(_) => "TimeoutError",
            GraphKbError::MigrationRequired { .. } => "MigrationRequiredError",
            GraphKbError::NoMigrationPath { .. } => "NoMigrationPathError",
            GraphKbError::Internal(_) => "InternalError",
        }
    }
}

impl From<serde_json::Error> for GraphKbError {
    fn from(err: serde_json::Error) -> Self {
        GraphKbError::Internal(format!("record serialization: {err}"))
    }
}

impl From<semver::Error> for GraphKbError {
    fn from(err: semver::Error) -> Self {
        GraphKbError::Internal(format!("malformed schema version: {err}"))
    }
}
