use backtrace::Backtrace;
use parking_lot::Mutex;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::result::Result;
use std::sync::Arc;

/// Error kinds for docdb operations.
///
/// Every fallible operation reports one of these categories so callers can
/// react to a specific failure without parsing messages.
///
/// # Examples
///
/// ```rust,ignore
/// use docdb::errors::{DocDbError, ErrorKind, DocDbResult};
///
/// fn example() -> DocDbResult<()> {
///     Err(DocDbError::new("Unknown comparison operator $foo", ErrorKind::UnknownOperator))
/// }
/// ```
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ErrorKind {
    // Validation family
    /// Malformed document, query or update payload
    ValidationError,
    /// An operator key that the matcher or update engine does not know
    UnknownOperator,
    /// An update mixes modifiers and plain fields
    MixedUpdateMode,

    /// A `$where` predicate returned something other than a boolean
    InvalidPredicateResult,

    /// A unique index (including the implicit `_id` index) would be violated
    UniqueConstraintViolation,

    /// The `_id` of a document is not a string or is otherwise unusable
    InvalidId,
    /// The requested resource was not found
    NotFound,

    // Persistence collaborator errors
    /// Opaque failure from the persistence layer
    IOError,
    /// Error encoding or decoding a persisted record
    EncodingError,
    /// Too many unreadable records in a persisted log
    CorruptData,

    /// Internal error (usually indicates a bug)
    InternalError,
}

impl ErrorKind {
    /// Returns `true` for the kinds that signal a malformed payload.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ErrorKind::ValidationError | ErrorKind::UnknownOperator | ErrorKind::MixedUpdateMode
        )
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::ValidationError => write!(f, "Validation error"),
            ErrorKind::UnknownOperator => write!(f, "Unknown operator"),
            ErrorKind::MixedUpdateMode => write!(f, "Mixed update mode"),
            ErrorKind::InvalidPredicateResult => write!(f, "Invalid predicate result"),
            ErrorKind::UniqueConstraintViolation => write!(f, "Unique constraint violation"),
            ErrorKind::InvalidId => write!(f, "Invalid ID"),
            ErrorKind::NotFound => write!(f, "Not found"),
            ErrorKind::IOError => write!(f, "IO error"),
            ErrorKind::EncodingError => write!(f, "Encoding error"),
            ErrorKind::CorruptData => write!(f, "Corrupt data"),
            ErrorKind::InternalError => write!(f, "Internal error"),
        }
    }
}

/// Custom docdb error type.
///
/// `DocDbError` carries a message, an [ErrorKind], an optional cause and a
/// backtrace captured at construction. The backtrace is resolved lazily, the
/// first time the error is printed with `{:?}`.
///
/// # Examples
///
/// ```rust,ignore
/// use docdb::errors::{DocDbError, ErrorKind};
///
/// let cause = DocDbError::new("disk full", ErrorKind::IOError);
/// let err = DocDbError::new_with_cause("Failed to append record", ErrorKind::IOError, cause);
/// assert!(err.cause().is_some());
/// ```
#[derive(Clone)]
pub struct DocDbError {
    message: String,
    error_kind: ErrorKind,
    cause: Option<Box<DocDbError>>,
    backtrace: Arc<Mutex<Backtrace>>,
}

impl DocDbError {
    /// Creates a new `DocDbError` with the specified message and error kind.
    pub fn new(message: &str, error_kind: ErrorKind) -> Self {
        DocDbError {
            message: message.to_string(),
            error_kind,
            cause: None,
            backtrace: Arc::new(Mutex::new(Backtrace::new_unresolved())),
        }
    }

    /// Creates a new `DocDbError` wrapping an underlying cause.
    pub fn new_with_cause(message: &str, error_kind: ErrorKind, cause: DocDbError) -> Self {
        DocDbError {
            message: message.to_string(),
            error_kind,
            cause: Some(Box::new(cause)),
            backtrace: Arc::new(Mutex::new(Backtrace::new_unresolved())),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.error_kind
    }

    pub fn cause(&self) -> Option<&DocDbError> {
        self.cause.as_deref()
    }
}

impl Display for DocDbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Debug for DocDbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "{}: {}\nCaused by: {:?}", self.error_kind, self.message, cause),
            None => {
                let mut backtrace = self.backtrace.lock();
                backtrace.resolve();
                write!(f, "{}: {}\n{:?}", self.error_kind, self.message, *backtrace)
            }
        }
    }
}

impl Error for DocDbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.cause {
            Some(cause) => Some(cause.as_ref()),
            None => None,
        }
    }
}

/// A result type alias for docdb operations.
pub type DocDbResult<T> = Result<T, DocDbError>;

impl From<std::io::Error> for DocDbError {
    fn from(err: std::io::Error) -> Self {
        DocDbError::new(&format!("IO error: {}", err), ErrorKind::IOError)
    }
}

impl From<serde_json::Error> for DocDbError {
    fn from(err: serde_json::Error) -> Self {
        DocDbError::new(&format!("JSON encoding error: {}", err), ErrorKind::EncodingError)
    }
}

impl From<regex::Error> for DocDbError {
    fn from(err: regex::Error) -> Self {
        DocDbError::new(&format!("Invalid regular expression: {}", err), ErrorKind::ValidationError)
    }
}
