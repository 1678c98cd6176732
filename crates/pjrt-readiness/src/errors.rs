use std::backtrace::Backtrace;
use std::fmt::Display;

use thiserror::Error;

/// Represents errors that can occur while waiting on asynchronous values. The error kinds are based on the
/// [Abseil status codes](https://abseil.io/docs/cpp/guides/status-codes) which PJRT uses internally, plus a dedicated
/// [`Error::Interrupted`] kind that is only ever produced when a blocking wait is abandoned due to an interrupt
/// request, and which is therefore always distinguishable from errors carried by the awaited values themselves.
///
/// Each variant includes a `backtrace` field that captures the call stack at the point where the error was created,
/// which is useful for debugging. Note that it is represented as a [`String`] and not as a [`Backtrace`] because using
/// the latter is only currently supported in unstable Rust.
#[derive(Error, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Error {
    #[error("{message}")]
    Interrupted { message: String, backtrace: String },

    #[error("{message}")]
    Cancelled { message: String, backtrace: String },

    #[error("{message}")]
    Unknown { message: String, backtrace: String },

    #[error("{message}")]
    InvalidArgument { message: String, backtrace: String },

    #[error("{message}")]
    DeadlineExceeded { message: String, backtrace: String },

    #[error("{message}")]
    NotFound { message: String, backtrace: String },

    #[error("{message}")]
    AlreadyExists { message: String, backtrace: String },

    #[error("{message}")]
    PermissionDenied { message: String, backtrace: String },

    #[error("{message}")]
    ResourceExhausted { message: String, backtrace: String },

    #[error("{message}")]
    FailedPrecondition { message: String, backtrace: String },

    #[error("{message}")]
    Aborted { message: String, backtrace: String },

    #[error("{message}")]
    OutOfRange { message: String, backtrace: String },

    #[error("{message}")]
    Unimplemented { message: String, backtrace: String },

    #[error("{message}")]
    Internal { message: String, backtrace: String },

    #[error("{message}")]
    Unavailable { message: String, backtrace: String },

    #[error("{message}")]
    DataLoss { message: String, backtrace: String },

    #[error("{message}")]
    Unauthenticated { message: String, backtrace: String },
}

impl Error {
    /// Creates a new [`Error`] of the provided [`ErrorCode`] kind.
    pub fn new<M: Into<String>>(code: ErrorCode, message: M) -> Self {
        let message = message.into();
        let backtrace = Backtrace::capture().to_string();
        match code {
            ErrorCode::Interrupted => Self::Interrupted { message, backtrace },
            ErrorCode::Cancelled => Self::Cancelled { message, backtrace },
            ErrorCode::Unknown => Self::Unknown { message, backtrace },
            ErrorCode::InvalidArgument => Self::InvalidArgument { message, backtrace },
            ErrorCode::DeadlineExceeded => Self::DeadlineExceeded { message, backtrace },
            ErrorCode::NotFound => Self::NotFound { message, backtrace },
            ErrorCode::AlreadyExists => Self::AlreadyExists { message, backtrace },
            ErrorCode::PermissionDenied => Self::PermissionDenied { message, backtrace },
            ErrorCode::ResourceExhausted => Self::ResourceExhausted { message, backtrace },
            ErrorCode::FailedPrecondition => Self::FailedPrecondition { message, backtrace },
            ErrorCode::Aborted => Self::Aborted { message, backtrace },
            ErrorCode::OutOfRange => Self::OutOfRange { message, backtrace },
            ErrorCode::Unimplemented => Self::Unimplemented { message, backtrace },
            ErrorCode::Internal => Self::Internal { message, backtrace },
            ErrorCode::Unavailable => Self::Unavailable { message, backtrace },
            ErrorCode::DataLoss => Self::DataLoss { message, backtrace },
            ErrorCode::Unauthenticated => Self::Unauthenticated { message, backtrace },
        }
    }

    /// Creates a new [`Error::Interrupted`].
    pub fn interrupted<M: Into<String>>(message: M) -> Self {
        Self::new(ErrorCode::Interrupted, message)
    }

    /// Creates a new [`Error::Cancelled`].
    pub fn cancelled<M: Into<String>>(message: M) -> Self {
        Self::new(ErrorCode::Cancelled, message)
    }

    /// Creates a new [`Error::Unknown`].
    pub fn unknown<M: Into<String>>(message: M) -> Self {
        Self::new(ErrorCode::Unknown, message)
    }

    /// Creates a new [`Error::InvalidArgument`].
    pub fn invalid_argument<M: Into<String>>(message: M) -> Self {
        Self::new(ErrorCode::InvalidArgument, message)
    }

    /// Creates a new [`Error::DeadlineExceeded`].
    pub fn deadline_exceeded<M: Into<String>>(message: M) -> Self {
        Self::new(ErrorCode::DeadlineExceeded, message)
    }

    /// Creates a new [`Error::NotFound`].
    pub fn not_found<M: Into<String>>(message: M) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    /// Creates a new [`Error::AlreadyExists`].
    pub fn already_exists<M: Into<String>>(message: M) -> Self {
        Self::new(ErrorCode::AlreadyExists, message)
    }

    /// Creates a new [`Error::PermissionDenied`].
    pub fn permission_denied<M: Into<String>>(message: M) -> Self {
        Self::new(ErrorCode::PermissionDenied, message)
    }

    /// Creates a new [`Error::ResourceExhausted`].
    pub fn resource_exhausted<M: Into<String>>(message: M) -> Self {
        Self::new(ErrorCode::ResourceExhausted, message)
    }

    /// Creates a new [`Error::FailedPrecondition`].
    pub fn failed_precondition<M: Into<String>>(message: M) -> Self {
        Self::new(ErrorCode::FailedPrecondition, message)
    }

    /// Creates a new [`Error::Aborted`].
    pub fn aborted<M: Into<String>>(message: M) -> Self {
        Self::new(ErrorCode::Aborted, message)
    }

    /// Creates a new [`Error::OutOfRange`].
    pub fn out_of_range<M: Into<String>>(message: M) -> Self {
        Self::new(ErrorCode::OutOfRange, message)
    }

    /// Creates a new [`Error::Unimplemented`].
    pub fn unimplemented<M: Into<String>>(message: M) -> Self {
        Self::new(ErrorCode::Unimplemented, message)
    }

    /// Creates a new [`Error::Internal`].
    pub fn internal<M: Into<String>>(message: M) -> Self {
        Self::new(ErrorCode::Internal, message)
    }

    /// Creates a new [`Error::Unavailable`].
    pub fn unavailable<M: Into<String>>(message: M) -> Self {
        Self::new(ErrorCode::Unavailable, message)
    }

    /// Creates a new [`Error::DataLoss`].
    pub fn data_loss<M: Into<String>>(message: M) -> Self {
        Self::new(ErrorCode::DataLoss, message)
    }

    /// Creates a new [`Error::Unauthenticated`].
    pub fn unauthenticated<M: Into<String>>(message: M) -> Self {
        Self::new(ErrorCode::Unauthenticated, message)
    }

    /// Returns the [`ErrorCode`] that corresponds to this [`Error`].
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Interrupted { .. } => ErrorCode::Interrupted,
            Self::Cancelled { .. } => ErrorCode::Cancelled,
            Self::Unknown { .. } => ErrorCode::Unknown,
            Self::InvalidArgument { .. } => ErrorCode::InvalidArgument,
            Self::DeadlineExceeded { .. } => ErrorCode::DeadlineExceeded,
            Self::NotFound { .. } => ErrorCode::NotFound,
            Self::AlreadyExists { .. } => ErrorCode::AlreadyExists,
            Self::PermissionDenied { .. } => ErrorCode::PermissionDenied,
            Self::ResourceExhausted { .. } => ErrorCode::ResourceExhausted,
            Self::FailedPrecondition { .. } => ErrorCode::FailedPrecondition,
            Self::Aborted { .. } => ErrorCode::Aborted,
            Self::OutOfRange { .. } => ErrorCode::OutOfRange,
            Self::Unimplemented { .. } => ErrorCode::Unimplemented,
            Self::Internal { .. } => ErrorCode::Internal,
            Self::Unavailable { .. } => ErrorCode::Unavailable,
            Self::DataLoss { .. } => ErrorCode::DataLoss,
            Self::Unauthenticated { .. } => ErrorCode::Unauthenticated,
        }
    }

    /// Returns the message that is stored in this [`Error`].
    pub fn message(&self) -> &str {
        match self {
            Self::Interrupted { message, .. }
            | Self::Cancelled { message, .. }
            | Self::Unknown { message, .. }
            | Self::InvalidArgument { message, .. }
            | Self::DeadlineExceeded { message, .. }
            | Self::NotFound { message, .. }
            | Self::AlreadyExists { message, .. }
            | Self::PermissionDenied { message, .. }
            | Self::ResourceExhausted { message, .. }
            | Self::FailedPrecondition { message, .. }
            | Self::Aborted { message, .. }
            | Self::OutOfRange { message, .. }
            | Self::Unimplemented { message, .. }
            | Self::Internal { message, .. }
            | Self::Unavailable { message, .. }
            | Self::DataLoss { message, .. }
            | Self::Unauthenticated { message, .. } => message.as_str(),
        }
    }

    /// Returns a new [`Error`] of the same kind as this one, but carrying the provided `message` instead.
    /// The backtrace of this [`Error`] is preserved, as it still points to where the failure originated.
    pub fn with_message<M: Into<String>>(self, message: M) -> Self {
        let new_message = message.into();
        match self {
            Self::Interrupted { backtrace, .. } => Self::Interrupted { message: new_message, backtrace },
            Self::Cancelled { backtrace, .. } => Self::Cancelled { message: new_message, backtrace },
            Self::Unknown { backtrace, .. } => Self::Unknown { message: new_message, backtrace },
            Self::InvalidArgument { backtrace, .. } => Self::InvalidArgument { message: new_message, backtrace },
            Self::DeadlineExceeded { backtrace, .. } => Self::DeadlineExceeded { message: new_message, backtrace },
            Self::NotFound { backtrace, .. } => Self::NotFound { message: new_message, backtrace },
            Self::AlreadyExists { backtrace, .. } => Self::AlreadyExists { message: new_message, backtrace },
            Self::PermissionDenied { backtrace, .. } => Self::PermissionDenied { message: new_message, backtrace },
            Self::ResourceExhausted { backtrace, .. } => Self::ResourceExhausted { message: new_message, backtrace },
            Self::FailedPrecondition { backtrace, .. } => {
                Self::FailedPrecondition { message: new_message, backtrace }
            }
            Self::Aborted { backtrace, .. } => Self::Aborted { message: new_message, backtrace },
            Self::OutOfRange { backtrace, .. } => Self::OutOfRange { message: new_message, backtrace },
            Self::Unimplemented { backtrace, .. } => Self::Unimplemented { message: new_message, backtrace },
            Self::Internal { backtrace, .. } => Self::Internal { message: new_message, backtrace },
            Self::Unavailable { backtrace, .. } => Self::Unavailable { message: new_message, backtrace },
            Self::DataLoss { backtrace, .. } => Self::DataLoss { message: new_message, backtrace },
            Self::Unauthenticated { backtrace, .. } => Self::Unauthenticated { message: new_message, backtrace },
        }
    }

    /// Returns `true` if this [`Error`] was produced because a blocking wait was interrupted, as opposed to being an
    /// error that was carried by an awaited value.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted { .. })
    }
}

/// Kind of an [`Error`], mirroring the Abseil status codes with the addition of [`ErrorCode::Interrupted`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorCode {
    Interrupted,
    Cancelled,
    Unknown,
    InvalidArgument,
    DeadlineExceeded,
    NotFound,
    AlreadyExists,
    PermissionDenied,
    ResourceExhausted,
    FailedPrecondition,
    Aborted,
    OutOfRange,
    Unimplemented,
    Internal,
    Unavailable,
    DataLoss,
    Unauthenticated,
}

impl Display for ErrorCode {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Interrupted => write!(formatter, "INTERRUPTED"),
            Self::Cancelled => write!(formatter, "CANCELLED"),
            Self::Unknown => write!(formatter, "UNKNOWN"),
            Self::InvalidArgument => write!(formatter, "INVALID_ARGUMENT"),
            Self::DeadlineExceeded => write!(formatter, "DEADLINE_EXCEEDED"),
            Self::NotFound => write!(formatter, "NOT_FOUND"),
            Self::AlreadyExists => write!(formatter, "ALREADY_EXISTS"),
            Self::PermissionDenied => write!(formatter, "PERMISSION_DENIED"),
            Self::ResourceExhausted => write!(formatter, "RESOURCE_EXHAUSTED"),
            Self::FailedPrecondition => write!(formatter, "FAILED_PRECONDITION"),
            Self::Aborted => write!(formatter, "ABORTED"),
            Self::OutOfRange => write!(formatter, "OUT_OF_RANGE"),
            Self::Unimplemented => write!(formatter, "UNIMPLEMENTED"),
            Self::Internal => write!(formatter, "INTERNAL"),
            Self::Unavailable => write!(formatter, "UNAVAILABLE"),
            Self::DataLoss => write!(formatter, "DATA_LOSS"),
            Self::Unauthenticated => write!(formatter, "UNAUTHENTICATED"),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::{Error, ErrorCode};

    #[test]
    fn test_error() {
        let errors = [
            Error::interrupted("interrupted"),
            Error::cancelled("cancelled"),
            Error::unknown("unknown"),
            Error::invalid_argument("invalid argument"),
            Error::deadline_exceeded("deadline exceeded"),
            Error::not_found("not found"),
            Error::already_exists("already exists"),
            Error::permission_denied("permission denied"),
            Error::resource_exhausted("resource exhausted"),
            Error::failed_precondition("failed precondition"),
            Error::aborted("aborted"),
            Error::out_of_range("out of range"),
            Error::unimplemented("unimplemented"),
            Error::internal("internal"),
            Error::unavailable("unavailable"),
            Error::data_loss("data loss"),
            Error::unauthenticated("unauthenticated"),
        ];

        for (i, error_i) in errors.iter().enumerate() {
            for (j, error_j) in errors.iter().enumerate() {
                if i == j {
                    assert_eq!(error_i, error_j);
                    assert_eq!(error_i.clone(), error_j.clone());
                } else {
                    assert_ne!(error_i, error_j);
                }
            }
        }

        assert_eq!(errors[0].code(), ErrorCode::Interrupted);
        assert_eq!(errors[1].code(), ErrorCode::Cancelled);
        assert_eq!(errors[2].code(), ErrorCode::Unknown);
        assert_eq!(errors[3].code(), ErrorCode::InvalidArgument);
        assert_eq!(errors[4].code(), ErrorCode::DeadlineExceeded);
        assert_eq!(errors[5].code(), ErrorCode::NotFound);
        assert_eq!(errors[6].code(), ErrorCode::AlreadyExists);
        assert_eq!(errors[7].code(), ErrorCode::PermissionDenied);
        assert_eq!(errors[8].code(), ErrorCode::ResourceExhausted);
        assert_eq!(errors[9].code(), ErrorCode::FailedPrecondition);
        assert_eq!(errors[10].code(), ErrorCode::Aborted);
        assert_eq!(errors[11].code(), ErrorCode::OutOfRange);
        assert_eq!(errors[12].code(), ErrorCode::Unimplemented);
        assert_eq!(errors[13].code(), ErrorCode::Internal);
        assert_eq!(errors[14].code(), ErrorCode::Unavailable);
        assert_eq!(errors[15].code(), ErrorCode::DataLoss);
        assert_eq!(errors[16].code(), ErrorCode::Unauthenticated);

        for error in &errors {
            let rebuilt = Error::new(error.code(), error.message());
            assert_eq!(rebuilt.code(), error.code());
            assert_eq!(rebuilt.message(), error.message());
            assert_eq!(error.is_interrupted(), error.code() == ErrorCode::Interrupted);
        }
    }

    #[test]
    fn test_error_with_message() {
        let error = Error::failed_precondition("old message");
        let rewritten = error.clone().with_message("new message");
        assert_eq!(rewritten.code(), ErrorCode::FailedPrecondition);
        assert_eq!(rewritten.message(), "new message");
        assert_eq!(error.message(), "old message");

        let rewritten = Error::interrupted("old").with_message("new");
        assert!(rewritten.is_interrupted());
        assert_eq!(rewritten.message(), "new");
    }

    #[test]
    fn test_error_display_and_debug() {
        let error = Error::invalid_argument("bad input");
        assert_eq!(format!("{error}"), "bad input");
        let debug = format!("{error:?}");
        assert!(debug.starts_with("InvalidArgument { message: \"bad input\", backtrace: \""));

        let error = Error::interrupted("wait interrupted");
        assert_eq!(format!("{error}"), "wait interrupted");
        let debug = format!("{error:?}");
        assert!(debug.starts_with("Interrupted { message: \"wait interrupted\", backtrace: \""));

        assert_eq!(ErrorCode::InvalidArgument.to_string(), "INVALID_ARGUMENT");
        assert_eq!(ErrorCode::Interrupted.to_string(), "INTERRUPTED");
        assert_eq!(ErrorCode::DataLoss.to_string(), "DATA_LOSS");
    }
}
