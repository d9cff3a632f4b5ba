use crate::sync::{Arc, Mutex};
use thiserror::Error;

/// The category of a posted [`Diagnostic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Tasks are mutually blocked, directly or transitively, on each
    /// other's results and can never complete.
    DataDependencyCycle,
}

/// A structured runtime diagnostic: a typed kind plus a human-readable
/// message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct Diagnostic {
    /// The typed kind of the condition.
    pub kind: ErrorKind,
    /// Human-readable description of the condition.
    pub message: String,
}

impl Diagnostic {
    /// Creates a diagnostic of the given kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// A clonable channel collecting [`Diagnostic`]s posted by concurrent
/// producers.
///
/// Consumers detect whether an error occurred across a unit of work with a
/// scoped [`ErrorMark`], or drain everything posted so far with [`take`].
///
/// [`take`]: DiagnosticSink::take
#[derive(Debug, Clone)]
pub struct DiagnosticSink {
    errors: Arc<Mutex<Vec<Diagnostic>>>,
}

impl DiagnosticSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self {
            errors: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Appends a diagnostic to the sink.
    pub fn post(&self, diagnostic: Diagnostic) {
        self.errors
            .lock()
            .expect("DiagnosticSink::post")
            .push(diagnostic);
    }

    /// Returns a marker scoping the diagnostics posted from now on.
    pub fn mark(&self) -> ErrorMark<'_> {
        ErrorMark {
            sink: self,
            mark: self.len(),
        }
    }

    /// Removes and returns every diagnostic posted so far.
    pub fn take(&self) -> Vec<Diagnostic> {
        core::mem::take(&mut *self.errors.lock().expect("DiagnosticSink::take"))
    }

    fn len(&self) -> usize {
        self.errors.lock().expect("DiagnosticSink::len").len()
    }
}

impl Default for DiagnosticSink {
    fn default() -> Self {
        Self::new()
    }
}

/// A scoped marker over a [`DiagnosticSink`].
///
/// Reports whether any diagnostic was posted since the marker was taken.
#[derive(Debug)]
pub struct ErrorMark<'a> {
    sink: &'a DiagnosticSink,
    mark: usize,
}

impl ErrorMark<'_> {
    /// Returns `true` if no diagnostic has been posted since this marker
    /// was taken.
    pub fn is_clean(&self) -> bool {
        self.sink.len() == self.mark
    }
}
