use iss::error::{ErrorCategory, IssError};
use std::backtrace::Backtrace;
use std::error::Error;
use std::fmt;

/// Returns whether terminal output should include backtraces.
fn should_render_backtrace() -> bool {
    matches!(
        std::env::var("RUST_BACKTRACE").as_deref(),
        Ok("1") | Ok("full")
    )
}

/// Result type for the binary's commands.
pub type ReplicatorResult<T> = Result<T, ReplicatorError>;

/// Captured backtrace wrapper to avoid thiserror's unstable feature detection.
pub struct CapturedBacktrace(Backtrace);

impl CapturedBacktrace {
    /// Captures a new backtrace for an error variant.
    fn capture() -> Self {
        Self(Backtrace::capture())
    }
}

impl fmt::Debug for CapturedBacktrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error type for the `iss-replicator` binary.
///
/// Wraps [`IssError`] for polling, replication and benchmark failures and adds variants
/// for the startup steps that happen before any store is touched.
#[derive(Debug)]
pub enum ReplicatorError {
    /// Polling, replication or benchmark error.
    Iss(IssError),
    /// Configuration error.
    Config(Box<dyn Error + Send + Sync>, CapturedBacktrace),
    /// I/O error.
    Io(std::io::Error, CapturedBacktrace),
}

impl ReplicatorError {
    /// Returns a short category label for this error.
    pub fn category(&self) -> &'static str {
        match self {
            ReplicatorError::Iss(err) => match err.category() {
                ErrorCategory::Configuration => "configuration error",
                ErrorCategory::Transient => "position api error",
                ErrorCategory::Record => "record error",
                ErrorCategory::Connection => "store connection error",
                ErrorCategory::Internal => "internal error",
            },
            ReplicatorError::Config(_, _) => "configuration error",
            ReplicatorError::Io(_, _) => "i/o error",
        }
    }

    /// Returns the backtrace for this error.
    pub fn backtrace(&self) -> Option<&Backtrace> {
        match self {
            ReplicatorError::Iss(err) => err.backtrace(),
            ReplicatorError::Config(_, cb) => Some(&cb.0),
            ReplicatorError::Io(_, cb) => Some(&cb.0),
        }
    }

    /// Creates a configuration error from any boxed source.
    pub fn config<E: Error + Send + Sync + 'static>(err: E) -> Self {
        ReplicatorError::Config(Box::new(err), CapturedBacktrace::capture())
    }

    /// Returns a user-oriented report for terminal output.
    pub fn render_report(&self) -> String {
        let mut out = String::new();
        out.push_str("iss-replicator failed\n");
        out.push_str(&format!("category: {}\n", self.category()));
        out.push_str(&format!("error: {}\n", self));

        // Aggregated errors already list every member in their display form.
        if !matches!(self, ReplicatorError::Iss(err) if err.kinds().len() > 1) {
            let mut source = Error::source(self);
            let mut idx = 1usize;
            while let Some(err) = source {
                out.push_str(&format!("cause {idx}: {err}\n"));
                source = err.source();
                idx += 1;
            }
        }

        if should_render_backtrace()
            && let Some(backtrace) = self.backtrace()
        {
            out.push_str("backtrace:\n");
            out.push_str(&backtrace.to_string());
            if !out.ends_with('\n') {
                out.push('\n');
            }
        }

        out
    }
}

impl fmt::Display for ReplicatorError {
    /// Renders a user-focused one-line description for terminal and log output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplicatorError::Iss(err) => write!(f, "{err}"),
            ReplicatorError::Config(source, _) => write!(f, "configuration error: {source}"),
            ReplicatorError::Io(source, _) => write!(f, "i/o error: {source}"),
        }
    }
}

impl Error for ReplicatorError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ReplicatorError::Iss(err) => err.source(),
            ReplicatorError::Config(source, _) => Some(source.as_ref()),
            ReplicatorError::Io(source, _) => Some(source),
        }
    }
}

impl From<std::io::Error> for ReplicatorError {
    fn from(err: std::io::Error) -> Self {
        ReplicatorError::Io(err, CapturedBacktrace::capture())
    }
}

impl From<IssError> for ReplicatorError {
    fn from(err: IssError) -> Self {
        ReplicatorError::Iss(err)
    }
}

#[cfg(test)]
mod tests {
    use iss::error::ErrorKind;
    use iss::iss_error;
    use iss_config::shared::ValidationError;

    use super::*;

    #[test]
    fn configuration_errors_are_labelled() {
        let err = ReplicatorError::config(ValidationError::PollIterationsZero);

        assert_eq!(err.category(), "configuration error");
        assert_eq!(
            err.to_string(),
            "configuration error: `iterations` cannot be zero"
        );
    }

    #[test]
    fn tracker_errors_are_labelled_by_category() {
        let unreachable: ReplicatorError = iss_error!(
            ErrorKind::DestinationConnectionFailed,
            "Relational store is unreachable"
        )
        .into();
        let exhausted: ReplicatorError =
            iss_error!(ErrorKind::ApiTimeout, "Position API timed out").into();

        assert_eq!(unreachable.category(), "store connection error");
        assert_eq!(exhausted.category(), "position api error");
    }

    #[test]
    fn report_lists_the_cause_chain() {
        let io = std::io::Error::other("disk full");
        let err: ReplicatorError = iss_error!(
            ErrorKind::IoError,
            "Failed to write log file",
            source: io
        )
        .into();

        let report = err.render_report();

        assert!(report.starts_with("iss-replicator failed\ncategory: internal error\n"));
        assert!(report.contains("cause 1: disk full"));
    }

    #[test]
    fn report_does_not_repeat_aggregated_errors_as_causes() {
        let err: ReplicatorError = IssError::from(vec![
            iss_error!(ErrorKind::SourceQueryFailed, "Query failed"),
            iss_error!(ErrorKind::DestinationConnectionFailed, "Shutdown failed"),
        ])
        .into();

        let report = err.render_report();

        assert!(report.contains("2 errors aggregated"));
        assert!(!report.contains("cause 1:"));
    }
}
