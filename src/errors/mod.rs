//! Error handling module for sitekeeper.
//!
//! Provides the central error type used by storage writes, the restore pipeline
//! and the CLI boundary. Remote fetch problems are not errors here: they are
//! [`crate::remote::FetchFailure`] values that the reconciler absorbs.

/// Error codes as constants to avoid stringly-typed errors.
#[allow(dead_code)]
pub mod codes {
    pub const STORAGE_ERROR: &str = "STORAGE_ERROR";
    pub const PARSE_ERROR: &str = "PARSE_ERROR";
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const VERIFICATION_FAILED: &str = "VERIFICATION_FAILED";
    pub const PAYLOAD_TOO_LARGE: &str = "PAYLOAD_TOO_LARGE";
    pub const FETCH_ERROR: &str = "FETCH_ERROR";
    pub const IO_ERROR: &str = "IO_ERROR";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    /// The storage engine rejected a write
    Storage(String),
    /// A backup or document could not be parsed
    Parse(String),
    /// A backup parsed but lacks required sections
    Validation(String),
    /// Post-restore read-back did not match what was written
    Verification {
        expected: String,
        found: Option<String>,
    },
    /// Planned writes exceed the configured payload budget
    PayloadTooLarge { size: u64, limit: u64 },
    /// HTTP client could not be built or used outside reconciliation
    Fetch(String),
    /// Filesystem error
    Io(String),
    /// Internal error
    Internal(String),
}

impl AppError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Storage(_) => codes::STORAGE_ERROR,
            AppError::Parse(_) => codes::PARSE_ERROR,
            AppError::Validation(_) => codes::VALIDATION_ERROR,
            AppError::Verification { .. } => codes::VERIFICATION_FAILED,
            AppError::PayloadTooLarge { .. } => codes::PAYLOAD_TOO_LARGE,
            AppError::Fetch(_) => codes::FETCH_ERROR,
            AppError::Io(_) => codes::IO_ERROR,
            AppError::Internal(_) => codes::INTERNAL_ERROR,
        }
    }

    /// Get the error message.
    pub fn message(&self) -> String {
        match self {
            AppError::Storage(msg) => msg.clone(),
            AppError::Parse(msg) => msg.clone(),
            AppError::Validation(msg) => msg.clone(),
            AppError::Verification { expected, found } => format!(
                "Verification failed: expected version {}, found {}",
                expected,
                found.as_deref().unwrap_or("nothing")
            ),
            AppError::PayloadTooLarge { size, limit } => format!(
                "Payload of {} bytes exceeds the {} byte budget",
                size, limit
            ),
            AppError::Fetch(msg) => msg.clone(),
            AppError::Io(msg) => msg.clone(),
            AppError::Internal(msg) => msg.clone(),
        }
    }

    /// Operator-facing follow-up for errors that have one.
    pub fn user_hint(&self) -> Option<&'static str> {
        match self {
            AppError::Storage(_) => Some("Failed to persist data. Clear local data manually and retry."),
            AppError::Verification { .. } => Some("The restore did not verify. Please retry."),
            AppError::PayloadTooLarge { .. } => {
                Some("Compress images or raise SITEKEEPER_MAX_PAYLOAD_MB before restoring.")
            }
            _ => None,
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error_code(), self.message())
    }
}

impl std::error::Error for AppError {}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Storage error: {:?}", err);
        AppError::Storage(format!("Storage error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        tracing::error!("JSON error: {:?}", err);
        AppError::Parse(format!("JSON error: {}", err))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        tracing::error!("HTTP client error: {:?}", err);
        AppError::Fetch(format!("HTTP client error: {}", err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        tracing::error!("I/O error: {:?}", err);
        AppError::Io(format!("I/O error: {}", err))
    }
}
