//! Error type shared by every screencheck operation

use thiserror::Error;

/// Error type for screencheck operations
///
/// Every variant is reported at the boundary of the operation that raised it;
/// nothing here is fatal to the process.
#[derive(Debug, Error)]
pub enum Error {
    /// The database file could not be opened or the pool could not hand out
    /// its connection
    #[error("Connection error: {0}")]
    Connection(String),

    /// The store has no table by this name
    #[error("Unknown table '{0}'")]
    Schema(String),

    /// No row with this identifier
    #[error("No record {id} in table '{table}'")]
    NotFound { table: String, id: i64 },

    /// A required field was left blank
    #[error("Field '{0}' is required")]
    MissingField(String),

    /// Constraint violation or I/O failure on write
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// A field name that the form does not carry
    #[error("Form for '{table}' has no field '{field}'")]
    UnknownField { table: String, field: String },

    /// The primary key of an existing record cannot be changed
    #[error("Field '{0}' is read-only")]
    ReadOnlyField(String),

    #[error("Invalid username or password")]
    Authentication,

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// An operation was attempted in a session state that does not allow it
    #[error("Form session is {0}")]
    InvalidSession(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<diesel::result::Error> for Error {
    fn from(e: diesel::result::Error) -> Self {
        Error::Persistence(e.to_string())
    }
}

impl From<diesel::r2d2::PoolError> for Error {
    fn from(e: diesel::r2d2::PoolError) -> Self {
        Error::Connection(e.to_string())
    }
}

impl From<diesel::ConnectionError> for Error {
    fn from(e: diesel::ConnectionError) -> Self {
        Error::Connection(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Persistence(format!("malformed row: {}", e))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
