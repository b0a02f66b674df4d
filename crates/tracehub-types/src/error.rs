use std::fmt;

/// Result type for tracehub-types operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur in the types layer
#[derive(Debug)]
pub enum Error {
    /// A string did not name a known lifecycle state
    InvalidLifecycle(String),

    /// A string did not name a known parse status
    InvalidParseStatus(String),

    /// A pagination cursor could not be decoded
    InvalidCursor(String),

    /// An event payload did not match the shape registered for its type
    InvalidPayload {
        event_type: String,
        detail: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidLifecycle(s) => write!(f, "Invalid lifecycle state: {}", s),
            Error::InvalidParseStatus(s) => write!(f, "Invalid parse status: {}", s),
            Error::InvalidCursor(msg) => write!(f, "Invalid cursor: {}", msg),
            Error::InvalidPayload { event_type, detail } => {
                write!(f, "Invalid payload for {}: {}", event_type, detail)
            }
        }
    }
}

impl std::error::Error for Error {}
