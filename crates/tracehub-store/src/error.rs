use std::fmt;

/// Result type for tracehub-store operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur in the store layer
#[derive(Debug)]
pub enum Error {
    /// Database operation failed
    Database(sqlx::Error),

    /// Query-specific error (invalid input, ambiguous selector, etc.)
    Query(String),

    /// Ambiguous identifier: more than one row matched
    Ambiguous {
        identifier: String,
        matches: Vec<String>,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Database(err) => write!(f, "Database error: {}", err),
            Error::Query(msg) => write!(f, "Query error: {}", msg),
            Error::Ambiguous { identifier, matches } => write!(
                f,
                "Ambiguous identifier '{}': {} rows match",
                identifier,
                matches.len()
            ),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Database(err) => Some(err),
            Error::Query(_) | Error::Ambiguous { .. } => None,
        }
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::Database(err)
    }
}
