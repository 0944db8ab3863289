use std::borrow::Cow;
use std::error::Error as StdError;
use std::fmt::{self, Display};

use journal_sync_model::{ApiError, ApiErrorKind};

/// The kind of error that occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The operation was superseded by a newer one, or timed out.
    Cancelled,
    /// The input was rejected before anything was sent.
    Validation,
    /// Another operation of the same kind is still in flight.
    Busy,
    /// The conversation does not exist (anymore).
    NotFound,
    /// The credential is missing or expired.
    Unauthorized,
    /// The server could not be reached.
    Network,
    /// The server failed to process the request.
    Server,
    /// The server answered with something that could not be understood.
    InvalidResponse,
    /// The store has been torn down.
    TornDown,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Cancelled => write!(f, "Cancelled"),
            ErrorKind::Validation => write!(f, "Invalid input"),
            ErrorKind::Busy => write!(f, "Busy"),
            ErrorKind::NotFound => write!(f, "Not found"),
            ErrorKind::Unauthorized => write!(f, "Unauthorized"),
            ErrorKind::Network => write!(f, "Network error"),
            ErrorKind::Server => write!(f, "Server error"),
            ErrorKind::InvalidResponse => write!(f, "Invalid response"),
            ErrorKind::TornDown => write!(f, "Torn down"),
        }
    }
}

/// Describes a failed store operation.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Error {
    kind: ErrorKind,
    reason: Option<String>,
}

impl Error {
    #[inline]
    fn new(kind: ErrorKind) -> Self {
        Self { kind, reason: None }
    }

    /// Creates a new error with the `Cancelled` kind.
    #[inline]
    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled)
    }

    /// Creates a new error with the `Validation` kind.
    #[inline]
    pub fn validation() -> Self {
        Self::new(ErrorKind::Validation)
    }

    /// Creates a new error with the `Busy` kind.
    #[inline]
    pub fn busy() -> Self {
        Self::new(ErrorKind::Busy)
    }

    /// Creates a new error with the `TornDown` kind.
    #[inline]
    pub fn torn_down() -> Self {
        Self::new(ErrorKind::TornDown)
    }

    /// Converts an error reported by a backend.
    pub fn from_api<E: ApiError + ?Sized>(err: &E) -> Self {
        let kind = match err.kind() {
            ApiErrorKind::NotFound => ErrorKind::NotFound,
            ApiErrorKind::Unauthorized => ErrorKind::Unauthorized,
            ApiErrorKind::Rejected => ErrorKind::Validation,
            ApiErrorKind::Network => ErrorKind::Network,
            ApiErrorKind::InvalidResponse => ErrorKind::InvalidResponse,
            ApiErrorKind::Server | ApiErrorKind::Other => ErrorKind::Server,
        };
        Self::new(kind).with_reason(err.to_string())
    }

    /// Attaches a reason to the error.
    #[inline]
    pub fn with_reason<S: Into<String>>(self, reason: S) -> Self {
        Self {
            kind: self.kind,
            reason: Some(reason.into()),
        }
    }

    /// Returns the kind of this error.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the reason for the error.
    #[inline]
    pub fn reason(&self) -> Cow<'_, str> {
        match self.reason.as_deref() {
            Some(reason) => Cow::Borrowed(reason),
            None => Cow::Owned(format!("{}", self.kind)),
        }
    }

    /// Returns `true` if the operation was cancelled. Such errors are
    /// never meant for the user.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.kind == ErrorKind::Cancelled
    }

    /// Returns `true` if the user has to sign in again.
    #[inline]
    pub fn needs_reauth(&self) -> bool {
        self.kind == ErrorKind::Unauthorized
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            Some(reason) => write!(f, "{}: {reason}", self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl StdError for Error {}
