use thiserror::Error;

/// Error code and message captured from the native client library's
/// `errno()`/`error()` accessors at the moment a call failed.
#[derive(Debug, Clone, Error)]
#[error("ERROR {code}: {message}")]
pub struct ServerError {
    pub code: u32,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum Error {
    /// Failed to establish or authenticate a session. Fatal to the attempt;
    /// never retried internally.
    #[error("Connection error: {0}")]
    Connection(ServerError),

    /// The server rejected the statement at prepare time.
    #[error("Prepare error: {0}")]
    Prepare(ServerError),

    /// The server rejected the statement at execute time.
    #[error("Execute error: {0}")]
    Execute(ServerError),

    /// A row or column fetch failed mid-cursor.
    #[error("Fetch error: {0}")]
    Fetch(ServerError),

    /// A column's declared type does not match what the caller asked for.
    /// Local to one row/column.
    #[error("Cannot decode column `{column}`: expected {expected}, found {found}")]
    Decode {
        column: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Bad usage error: {0}")]
    BadUsageError(String),

    #[error("Bad config error: {0}")]
    BadConfigError(String),

    /// A state the type system says cannot be reached was reached anyway.
    #[error("Library bug: {0}")]
    LibraryBug(color_eyre::Report),
}

impl From<std::convert::Infallible> for Error {
    fn from(err: std::convert::Infallible) -> Self {
        match err {}
    }
}

pub use color_eyre::eyre::eyre;

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_error_carries_code_and_message() {
        let err = Error::Execute(ServerError {
            code: 1062,
            message: "Duplicate entry".to_owned(),
        });
        assert_eq!(err.to_string(), "Execute error: ERROR 1062: Duplicate entry");
    }

    #[test]
    fn decode_error_names_the_column() {
        let err = Error::Decode {
            column: "age".to_owned(),
            expected: "an i64",
            found: "text",
        };
        assert_eq!(
            err.to_string(),
            "Cannot decode column `age`: expected an i64, found text"
        );
    }
}
