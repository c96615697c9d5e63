use plinth_core::error::{ErrorClass, ErrorOrigin as CoreErrorOrigin, InternalError};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error as ThisError;

///
/// Error
/// Public error type with a stable kind + origin taxonomy.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize, ThisError)]
#[error("{message}")]
pub struct Error {
    pub kind: ErrorKind,
    pub origin: ErrorOrigin,
    pub message: String,
}

impl Error {
    pub fn new(kind: ErrorKind, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            kind,
            origin,
            message: message.into(),
        }
    }

    /// A revision guard did not match: re-read and retry.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self.kind, ErrorKind::Conflict)
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self.kind, ErrorKind::NotFound)
    }
}

impl From<InternalError> for Error {
    fn from(err: InternalError) -> Self {
        Self::new(err.class.into(), err.origin.into(), err.message)
    }
}

///
/// ErrorKind
/// What the caller can do about a failure.
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum ErrorKind {
    /// An API contract was broken: bad argument, call order, configuration.
    Usage,

    /// The query model could not be compiled for the selected engine.
    InvalidQuery,

    /// The engine cannot express the request (joins on a document store).
    Unsupported,

    /// Nothing matched a lookup or write.
    NotFound,

    /// Stale revision on update or delete.
    Conflict,

    /// The storage engine or its transport failed.
    Store,

    /// The caller cannot remediate this.
    Internal,
}

impl From<ErrorClass> for ErrorKind {
    fn from(class: ErrorClass) -> Self {
        match class {
            ErrorClass::InvariantViolation => Self::Usage,
            ErrorClass::Compile => Self::InvalidQuery,
            ErrorClass::Unsupported => Self::Unsupported,
            ErrorClass::NotFound => Self::NotFound,
            ErrorClass::Conflict => Self::Conflict,
            ErrorClass::Engine => Self::Store,
            ErrorClass::Internal => Self::Internal,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Usage => "usage",
            Self::InvalidQuery => "invalid_query",
            Self::Unsupported => "unsupported",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::Store => "store",
            Self::Internal => "internal",
        };
        write!(f, "{label}")
    }
}

///
/// ErrorOrigin
/// Layer that raised the error.
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum ErrorOrigin {
    Pool,
    Value,
    Schema,
    Query,
    Config,
    Backend,
    Engine,
    Cursor,
}

impl From<CoreErrorOrigin> for ErrorOrigin {
    fn from(origin: CoreErrorOrigin) -> Self {
        match origin {
            CoreErrorOrigin::Pool => Self::Pool,
            CoreErrorOrigin::Value => Self::Value,
            CoreErrorOrigin::Schema => Self::Schema,
            CoreErrorOrigin::Query => Self::Query,
            CoreErrorOrigin::Config => Self::Config,
            CoreErrorOrigin::Backend => Self::Backend,
            CoreErrorOrigin::Engine => Self::Engine,
            CoreErrorOrigin::Cursor => Self::Cursor,
        }
    }
}
