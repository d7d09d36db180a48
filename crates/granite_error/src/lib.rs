//! Error type shared by every granite crate.

use std::fmt;

pub type Result<T, E = GraniteError> = std::result::Result<T, E>;

/// Which stage of the engine an error originated from.
///
/// Drivers branch on this to pick exit codes; everything else should treat
/// errors as opaque.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// SQL text could not be parsed.
    Parse,
    /// The parsed statement could not be turned into a logical plan.
    Translation(TranslationErrorKind),
    /// An optimizer rule violated one of its invariants. Always a bug.
    Optimizer,
    /// A physical operator failed at runtime.
    Operator(OperatorErrorKind),
    /// A write conflicted with a concurrent transaction.
    TransactionConflict,
    /// The transaction was aborted; operators short-circuit with this.
    TransactionAborted,
    /// The scheduler no longer accepts tasks.
    SchedulerShutdown,
    /// Anything else.
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslationErrorKind {
    UnknownIdentifier,
    AmbiguousIdentifier,
    TypeMismatch,
    AggregateMisuse,
    ColumnCountMismatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorErrorKind {
    TypeMismatch,
    ColumnNotFound,
    Overflow,
}

#[derive(Debug)]
pub struct GraniteError {
    inner: Box<ErrorInner>,
}

#[derive(Debug)]
struct ErrorInner {
    kind: ErrorKind,
    message: String,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl GraniteError {
    pub fn new(message: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Internal, message)
    }

    pub fn with_kind(kind: ErrorKind, message: impl Into<String>) -> Self {
        GraniteError {
            inner: Box::new(ErrorInner {
                kind,
                message: message.into(),
                source: None,
            }),
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        GraniteError {
            inner: Box::new(ErrorInner {
                kind: ErrorKind::Internal,
                message: message.into(),
                source: Some(source),
            }),
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Parse, message)
    }

    pub fn translation(kind: TranslationErrorKind, message: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Translation(kind), message)
    }

    pub fn optimizer(message: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Optimizer, message)
    }

    pub fn operator(kind: OperatorErrorKind, message: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Operator(kind), message)
    }

    pub fn transaction_conflict(message: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::TransactionConflict, message)
    }

    pub fn transaction_aborted() -> Self {
        Self::with_kind(ErrorKind::TransactionAborted, "Transaction aborted")
    }

    pub fn scheduler_shutdown() -> Self {
        Self::with_kind(
            ErrorKind::SchedulerShutdown,
            "Scheduler was shut down and no longer accepts tasks",
        )
    }

    pub fn kind(&self) -> ErrorKind {
        self.inner.kind
    }

    pub fn message(&self) -> &str {
        &self.inner.message
    }
}

impl fmt::Display for GraniteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner.message)?;
        if let Some(source) = &self.inner.source {
            write!(f, ": {source}")?;
        }
        Ok(())
    }
}

impl std::error::Error for GraniteError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.inner
            .source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl From<std::io::Error> for GraniteError {
    fn from(value: std::io::Error) -> Self {
        Self::with_source("IO error", Box::new(value))
    }
}

impl From<std::fmt::Error> for GraniteError {
    fn from(value: std::fmt::Error) -> Self {
        Self::with_source("Format error", Box::new(value))
    }
}

/// Attach context to errors from other libraries.
pub trait ResultExt<T, E> {
    fn context(self, message: &'static str) -> Result<T>;
    fn context_fn<F: Fn() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: std::error::Error + Send + Sync + 'static> ResultExt<T, E> for Result<T, E> {
    fn context(self, message: &'static str) -> Result<T> {
        self.map_err(|e| GraniteError::with_source(message, Box::new(e)))
    }

    fn context_fn<F: Fn() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| GraniteError::with_source(f(), Box::new(e)))
    }
}

pub trait OptionExt<T> {
    fn required(self, message: &'static str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn required(self, message: &'static str) -> Result<T> {
        self.ok_or_else(|| GraniteError::new(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_survives_helpers() {
        assert_eq!(ErrorKind::Parse, GraniteError::parse("nope").kind());
        assert_eq!(
            ErrorKind::Translation(TranslationErrorKind::UnknownIdentifier),
            GraniteError::translation(TranslationErrorKind::UnknownIdentifier, "who?").kind()
        );
        assert_eq!(
            ErrorKind::TransactionAborted,
            GraniteError::transaction_aborted().kind()
        );
    }

    #[test]
    fn display_includes_source() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire");
        let err = GraniteError::with_source("could not read", Box::new(io));
        assert_eq!("could not read: disk on fire", err.to_string());
    }

    #[test]
    fn context_wraps_foreign_errors() {
        let result: Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::Other, "nope"));
        let err = result.context("reading the catalog").unwrap_err();
        assert_eq!("reading the catalog: nope", err.to_string());

        let missing: Option<u32> = None;
        assert!(missing.required("value must be present").is_err());
    }
}
