use std::fmt;

/// Result type for tracehub-pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur in the pipeline layer
#[derive(Debug)]
pub enum Error {
    /// Object store read or write failed
    Blob(String),

    /// Store layer error
    Store(tracehub_store::Error),

    /// Summary model call failed
    Summary(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Blob(msg) => write!(f, "Blob store error: {}", msg),
            Error::Store(err) => write!(f, "Store error: {}", err),
            Error::Summary(msg) => write!(f, "Summary error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Store(err) => Some(err),
            Error::Blob(_) | Error::Summary(_) => None,
        }
    }
}

impl From<tracehub_store::Error> for Error {
    fn from(err: tracehub_store::Error) -> Self {
        Error::Store(err)
    }
}

impl From<opendal::Error> for Error {
    fn from(err: opendal::Error) -> Self {
        Error::Blob(err.to_string())
    }
}
