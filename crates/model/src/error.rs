use std::error::Error;
use std::fmt::{self, Display};

/// The kind of error a remote backend reported.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ApiErrorKind {
    /// The requested resource does not exist.
    NotFound,
    /// The credential is missing, expired or not allowed.
    Unauthorized,
    /// The request was rejected as invalid.
    Rejected,
    /// The request never reached the server or the connection broke.
    Network,
    /// The server failed to process the request.
    Server,
    /// The server answered with something that could not be decoded.
    InvalidResponse,
    /// Any other errors.
    Other,
}

impl Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiErrorKind::NotFound => write!(f, "Not found"),
            ApiErrorKind::Unauthorized => write!(f, "Unauthorized"),
            ApiErrorKind::Rejected => write!(f, "Rejected"),
            ApiErrorKind::Network => write!(f, "Network error"),
            ApiErrorKind::Server => write!(f, "Server error"),
            ApiErrorKind::InvalidResponse => write!(f, "Invalid response"),
            ApiErrorKind::Other => write!(f, "Other error"),
        }
    }
}

/// The error type for a conversation backend.
pub trait ApiError: Error + Send + Sync + 'static {
    /// Returns the kind of this error.
    fn kind(&self) -> ApiErrorKind;
}
