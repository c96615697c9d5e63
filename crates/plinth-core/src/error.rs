use std::fmt;
use thiserror::Error as ThisError;

///
/// InternalError
///
/// Structured runtime error with a stable internal classification.
/// Every layer reports failure through this one type; the class separates
/// contract violations, compile failures, engine failures and conflicts.
///

#[derive(Debug, ThisError)]
#[error("{message}")]
pub struct InternalError {
    pub class: ErrorClass,
    pub origin: ErrorOrigin,
    pub message: String,
}

impl InternalError {
    pub fn new(class: ErrorClass, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            class,
            origin,
            message: message.into(),
        }
    }

    /// Construct a contract violation (bad argument, lifecycle order, double set).
    pub fn invariant(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::InvariantViolation, origin, message)
    }

    /// Construct a query-compilation failure.
    pub(crate) fn compile(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Compile, ErrorOrigin::Query, message)
    }

    /// Construct an engine-origin failure (driver, network, HTTP status).
    pub(crate) fn engine(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Engine, ErrorOrigin::Engine, message)
    }

    /// Construct an optimistic-concurrency conflict.
    pub(crate) fn conflict(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Conflict, origin, message)
    }

    /// Construct an unsupported-operation error.
    pub(crate) fn unsupported(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Unsupported, origin, message)
    }

    pub(crate) fn not_found(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::NotFound, origin, message)
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::InvariantViolation, ErrorOrigin::Config, message)
    }

    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self.class, ErrorClass::Conflict)
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self.class, ErrorClass::NotFound)
    }

    #[must_use]
    pub const fn is_unsupported(&self) -> bool {
        matches!(self.class, ErrorClass::Unsupported)
    }

    #[must_use]
    pub fn display_with_class(&self) -> String {
        format!("{}:{}: {}", self.origin, self.class, self.message)
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for InternalError {
    fn from(err: rusqlite::Error) -> Self {
        Self::engine(format!("sqlite: {err}"))
    }
}

#[cfg(feature = "mysql")]
impl From<mysql::Error> for InternalError {
    fn from(err: mysql::Error) -> Self {
        Self::engine(format!("mysql: {err}"))
    }
}

#[cfg(feature = "couchdb")]
impl From<reqwest::Error> for InternalError {
    fn from(err: reqwest::Error) -> Self {
        Self::engine(format!("http: {err}"))
    }
}

impl From<serde_json::Error> for InternalError {
    fn from(err: serde_json::Error) -> Self {
        Self::engine(format!("json: {err}"))
    }
}

///
/// ErrorClass
/// Internal error taxonomy for runtime classification.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    /// Null/empty argument, out-of-order lifecycle call, double assignment.
    InvariantViolation,
    /// Statement/expression could not be built.
    Compile,
    /// The storage engine or transport reported failure.
    Engine,
    /// Revision mismatch: zero rows or documents affected.
    Conflict,
    NotFound,
    Unsupported,
    Internal,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::InvariantViolation => "invariant_violation",
            Self::Compile => "compile",
            Self::Engine => "engine",
            Self::Conflict => "conflict",
            Self::NotFound => "not_found",
            Self::Unsupported => "unsupported",
            Self::Internal => "internal",
        };
        write!(f, "{label}")
    }
}

///
/// ErrorOrigin
/// Internal origin taxonomy for runtime classification.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
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

impl fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pool => "pool",
            Self::Value => "value",
            Self::Schema => "schema",
            Self::Query => "query",
            Self::Config => "config",
            Self::Backend => "backend",
            Self::Engine => "engine",
            Self::Cursor => "cursor",
        };
        write!(f, "{label}")
    }
}
