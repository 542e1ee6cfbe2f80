//! Error types and result definitions for the tracker.
//!
//! [`IssError`] carries a classified [`ErrorKind`], a static description, optional dynamic
//! detail, the originating error, the caller location and a backtrace. Several errors can be
//! aggregated into one, which happens when a run fails and releasing its stores fails too.
//!
//! Every [`ErrorKind`] maps to an [`ErrorCategory`], which is what callers use to pick a
//! policy: retry, count and continue, or abort the run.

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

/// Convenient result type using [`IssError`] as the error type.
pub type IssResult<T> = Result<T, IssError>;

/// Detailed payload stored for single [`IssError`] instances.
#[derive(Debug, Clone)]
struct ErrorPayload {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
    backtrace: Arc<Backtrace>,
}

/// Main error type of the tracker.
///
/// Cloning is cheap since the source and backtrace are reference counted, which lets
/// replication reports keep per-record errors around after they were logged.
#[derive(Debug, Clone)]
pub struct IssError {
    repr: ErrorRepr,
}

#[derive(Debug, Clone)]
enum ErrorRepr {
    /// Single error payload holding rich metadata.
    Single(ErrorPayload),
    /// Multiple aggregated errors.
    Many {
        errors: Vec<IssError>,
        location: &'static Location<'static>,
    },
}

/// Specific kinds of errors that can occur while polling and replicating.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Configuration
    ConfigError,

    // Upstream API
    ApiRequestFailed,
    ApiTimeout,
    ApiResponseInvalid,

    // Document store
    SourceConnectionFailed,
    SourceQueryFailed,

    // Relational store
    DestinationConnectionFailed,
    DestinationQueryFailed,
    DestinationWriteFailed,
    UniqueViolation,

    // Data
    ConversionError,
    InvalidData,

    // IO & serialization
    IoError,
    SerializationError,
    DeserializationError,

    Unknown,
}

/// Coarse classification of an [`ErrorKind`] deciding how callers react to it.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
pub enum ErrorCategory {
    /// Missing or invalid configuration. Fatal and never retried.
    Configuration,
    /// A flaky upstream call. Retried with backoff, fatal once attempts run out.
    Transient,
    /// A single record could not be written or converted. Counted and skipped.
    Record,
    /// A store became unreachable or a run-level query failed. Aborts the run.
    Connection,
    /// Anything else.
    Internal,
}

impl ErrorKind {
    /// Returns the [`ErrorCategory`] of this kind.
    pub fn category(&self) -> ErrorCategory {
        match self {
            ErrorKind::ConfigError => ErrorCategory::Configuration,
            ErrorKind::ApiRequestFailed | ErrorKind::ApiTimeout | ErrorKind::ApiResponseInvalid => {
                ErrorCategory::Transient
            }
            ErrorKind::DestinationWriteFailed
            | ErrorKind::UniqueViolation
            | ErrorKind::ConversionError
            | ErrorKind::InvalidData => ErrorCategory::Record,
            ErrorKind::SourceConnectionFailed
            | ErrorKind::SourceQueryFailed
            | ErrorKind::DestinationConnectionFailed
            | ErrorKind::DestinationQueryFailed => ErrorCategory::Connection,
            ErrorKind::IoError
            | ErrorKind::SerializationError
            | ErrorKind::DeserializationError
            | ErrorKind::Unknown => ErrorCategory::Internal,
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCategory::Configuration => "configuration",
            ErrorCategory::Transient => "transient",
            ErrorCategory::Record => "record",
            ErrorCategory::Connection => "connection",
            ErrorCategory::Internal => "internal",
        };

        f.write_str(name)
    }
}

impl IssError {
    /// Returns the [`ErrorKind`] of this error.
    ///
    /// For multiple errors, returns the kind of the first error or [`ErrorKind::Unknown`]
    /// if the error list is empty.
    pub fn kind(&self) -> ErrorKind {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.kind,
            ErrorRepr::Many { ref errors, .. } => errors
                .first()
                .map(|err| err.kind())
                .unwrap_or(ErrorKind::Unknown),
        }
    }

    /// Returns all [`ErrorKind`]s present in this error.
    pub fn kinds(&self) -> Vec<ErrorKind> {
        match self.repr {
            ErrorRepr::Single(ref payload) => vec![payload.kind],
            ErrorRepr::Many { ref errors, .. } => {
                errors.iter().flat_map(|err| err.kinds()).collect()
            }
        }
    }

    /// Returns the [`ErrorCategory`] of this error's kind.
    pub fn category(&self) -> ErrorCategory {
        self.kind().category()
    }

    /// Returns the static description of this error.
    ///
    /// For multiple errors, returns the description of the first one.
    pub fn description(&self) -> &str {
        match self.repr {
            ErrorRepr::Single(ref payload) => &payload.description,
            ErrorRepr::Many { ref errors, .. } => errors
                .first()
                .map(|err| err.description())
                .unwrap_or("multiple errors"),
        }
    }

    /// Returns the detailed error information if available.
    pub fn detail(&self) -> Option<&str> {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.detail.as_deref(),
            ErrorRepr::Many { ref errors, .. } => errors.iter().find_map(|e| e.detail()),
        }
    }

    /// Returns the captured backtrace for this error.
    pub fn backtrace(&self) -> Option<&Backtrace> {
        match self.repr {
            ErrorRepr::Single(ref payload) => Some(payload.backtrace.as_ref()),
            ErrorRepr::Many { .. } => None,
        }
    }

    /// Returns the captured callsite location for this error.
    pub fn location(&self) -> &'static Location<'static> {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.location,
            ErrorRepr::Many { location, .. } => location,
        }
    }

    /// Attaches an originating [`error::Error`] to this error and returns it.
    ///
    /// Has no effect on aggregated errors, which forward their first error as source.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        if let ErrorRepr::Single(ref mut payload) = self.repr {
            payload.source = Some(Arc::new(source));
        }

        self
    }

    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    ) -> Self {
        IssError {
            repr: ErrorRepr::Single(ErrorPayload {
                kind,
                description,
                detail,
                source,
                location: Location::caller(),
                backtrace: Arc::new(Backtrace::capture()),
            }),
        }
    }

    #[track_caller]
    fn from_source<E>(kind: ErrorKind, description: &'static str, err: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        let detail = err.to_string();
        IssError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

impl PartialEq for IssError {
    fn eq(&self, other: &IssError) -> bool {
        match (&self.repr, &other.repr) {
            (ErrorRepr::Single(a), ErrorRepr::Single(b)) => a.kind == b.kind,
            (ErrorRepr::Many { errors: a, .. }, ErrorRepr::Many { errors: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for IssError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match &self.repr {
            ErrorRepr::Single(payload) => {
                let location = payload.location;
                write!(
                    f,
                    "[{:?}] {} @ {}:{}:{}",
                    payload.kind,
                    payload.description,
                    location.file(),
                    location.line(),
                    location.column()
                )?;

                write_block("Detail", payload.detail.as_deref(), f)?;

                let backtrace = payload.backtrace.to_string();
                if !backtrace.trim().is_empty() {
                    write_block("Backtrace", Some(&backtrace), f)?;
                }

                Ok(())
            }
            ErrorRepr::Many { errors, location } => {
                let count = errors.len();
                write!(
                    f,
                    "[Many] {} error{} aggregated @ {}:{}:{}",
                    count,
                    if count == 1 { "" } else { "s" },
                    location.file(),
                    location.line(),
                    location.column()
                )?;

                for (index, error) in errors.iter().enumerate() {
                    let rendered = error.to_string();
                    let mut lines = rendered.lines();
                    write!(f, "\n  {}. {}", index + 1, lines.next().unwrap_or_default())?;
                    for line in lines {
                        write!(f, "\n     {line}")?;
                    }
                }

                Ok(())
            }
        }
    }
}

impl error::Error for IssError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match &self.repr {
            ErrorRepr::Single(payload) => payload
                .source
                .as_ref()
                .map(|source| source as &(dyn error::Error + 'static)),
            ErrorRepr::Many { errors, .. } => errors
                .first()
                .map(|error| error as &(dyn error::Error + 'static)),
        }
    }
}

/// Writes an indented, titled block of lines.
fn write_block(title: &str, content: Option<&str>, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let Some(content) = content else {
        return Ok(());
    };

    if content.trim().is_empty() {
        return write!(f, "\n  {title}: <empty>");
    }

    write!(f, "\n  {title}:")?;
    for line in content.lines() {
        if line.trim().is_empty() {
            write!(f, "\n    ")?;
        } else {
            write!(f, "\n    {line}")?;
        }
    }

    Ok(())
}

/// Creates an [`IssError`] from an error kind and static description.
impl From<(ErrorKind, &'static str)> for IssError {
    #[track_caller]
    fn from((kind, desc): (ErrorKind, &'static str)) -> IssError {
        IssError::from_components(kind, Cow::Borrowed(desc), None, None)
    }
}

/// Creates an [`IssError`] from an error kind, static description, and dynamic detail.
impl<D> From<(ErrorKind, &'static str, D)> for IssError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, desc, detail): (ErrorKind, &'static str, D)) -> IssError {
        IssError::from_components(kind, Cow::Borrowed(desc), Some(detail.into()), None)
    }
}

/// Aggregates several errors into one.
///
/// A single error is returned as is, without wrapping.
impl<E> From<Vec<E>> for IssError
where
    E: Into<IssError>,
{
    #[track_caller]
    fn from(errors: Vec<E>) -> IssError {
        let location = Location::caller();

        let mut errors: Vec<IssError> = errors.into_iter().map(Into::into).collect();
        if errors.len() == 1
            && let Some(error) = errors.pop()
        {
            return error;
        }

        IssError {
            repr: ErrorRepr::Many { errors, location },
        }
    }
}

impl From<std::io::Error> for IssError {
    #[track_caller]
    fn from(err: std::io::Error) -> IssError {
        IssError::from_source(ErrorKind::IoError, "I/O operation failed", err)
    }
}

/// Maps syntax and data errors to [`ErrorKind::DeserializationError`].
impl From<serde_json::Error> for IssError {
    #[track_caller]
    fn from(err: serde_json::Error) -> IssError {
        let (kind, description) = match err.classify() {
            serde_json::error::Category::Io => (ErrorKind::IoError, "JSON I/O operation failed"),
            serde_json::error::Category::Syntax
            | serde_json::error::Category::Data
            | serde_json::error::Category::Eof => (
                ErrorKind::DeserializationError,
                "JSON deserialization failed",
            ),
        };

        IssError::from_source(kind, description, err)
    }
}

impl From<std::num::ParseFloatError> for IssError {
    #[track_caller]
    fn from(err: std::num::ParseFloatError) -> IssError {
        IssError::from_source(ErrorKind::ConversionError, "Float parsing failed", err)
    }
}

/// Maps HTTP client errors to the transient API kinds.
impl From<reqwest::Error> for IssError {
    #[track_caller]
    fn from(err: reqwest::Error) -> IssError {
        let (kind, description) = if err.is_timeout() {
            (ErrorKind::ApiTimeout, "Position API request timed out")
        } else if err.is_decode() {
            (
                ErrorKind::ApiResponseInvalid,
                "Position API response could not be decoded",
            )
        } else if err.is_builder() {
            (ErrorKind::ConfigError, "Position API client is misconfigured")
        } else {
            (ErrorKind::ApiRequestFailed, "Position API request failed")
        };

        IssError::from_source(kind, description, err)
    }
}

/// Maps relational store errors.
///
/// Constraint rejections of the unique source identifier become
/// [`ErrorKind::UniqueViolation`]. Transport and pool failures become
/// [`ErrorKind::DestinationConnectionFailed`] so that they abort the run.
impl From<sqlx::Error> for IssError {
    #[track_caller]
    fn from(err: sqlx::Error) -> IssError {
        let (kind, description) = match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => (
                ErrorKind::UniqueViolation,
                "Relational store rejected a duplicate value",
            ),
            sqlx::Error::Database(_) => (
                ErrorKind::DestinationQueryFailed,
                "Relational store query failed",
            ),
            sqlx::Error::Configuration(_) => (
                ErrorKind::ConfigError,
                "Relational store connection settings are invalid",
            ),
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => (
                ErrorKind::DestinationConnectionFailed,
                "Relational store connection failed",
            ),
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => (
                ErrorKind::ConversionError,
                "Relational store value could not be decoded",
            ),
            _ => (
                ErrorKind::DestinationQueryFailed,
                "Relational store operation failed",
            ),
        };

        IssError::from_source(kind, description, err)
    }
}

/// Maps document store errors.
///
/// Server selection, network and authentication failures mean the store is unreachable.
impl From<mongodb::error::Error> for IssError {
    #[track_caller]
    fn from(err: mongodb::error::Error) -> IssError {
        use mongodb::error::ErrorKind as MongoErrorKind;

        let (kind, description) = match err.kind.as_ref() {
            MongoErrorKind::ServerSelection { .. }
            | MongoErrorKind::Io(_)
            | MongoErrorKind::Authentication { .. }
            | MongoErrorKind::DnsResolve { .. }
            | MongoErrorKind::ConnectionPoolCleared { .. } => (
                ErrorKind::SourceConnectionFailed,
                "Document store connection failed",
            ),
            MongoErrorKind::InvalidArgument { .. } => (
                ErrorKind::ConfigError,
                "Document store connection settings are invalid",
            ),
            MongoErrorKind::BsonDeserialization(_) => (
                ErrorKind::ConversionError,
                "Document store value could not be decoded",
            ),
            MongoErrorKind::BsonSerialization(_) => (
                ErrorKind::SerializationError,
                "Document store value could not be encoded",
            ),
            _ => (
                ErrorKind::SourceQueryFailed,
                "Document store operation failed",
            ),
        };

        IssError::from_source(kind, description, err)
    }
}

/// Maps typed document field access errors to [`ErrorKind::InvalidData`].
impl From<mongodb::bson::document::ValueAccessError> for IssError {
    #[track_caller]
    fn from(err: mongodb::bson::document::ValueAccessError) -> IssError {
        IssError::from_source(
            ErrorKind::InvalidData,
            "Stored document has an unexpected shape",
            err,
        )
    }
}
