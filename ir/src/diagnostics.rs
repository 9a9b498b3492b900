//! Per-context diagnostic sink.
//!
//! Verification failures are recoverable: they mark the offending operation
//! invalid and are collected here (mirrored to `tracing`) instead of
//! aborting the compilation.

use parking_lot::Mutex;

use crate::op::OpName;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    /// Operation the diagnostic is attached to, if any.
    pub op: Option<OpName>,
}

/// Append-only diagnostic channel owned by a [`Context`].
///
/// [`Context`]: crate::context::Context
#[derive(Default)]
pub struct Diagnostics {
    entries: Mutex<Vec<Diagnostic>>,
}

impl Diagnostics {
    pub fn error(&self, op: Option<&OpName>, message: impl Into<String>) {
        let message = message.into();
        tracing::error!(op = op.map(|n| n.as_str()), %message, "verification diagnostic");
        self.entries.lock().push(Diagnostic { severity: Severity::Error, message, op: op.cloned() });
    }

    pub fn warning(&self, op: Option<&OpName>, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(op = op.map(|n| n.as_str()), %message, "verification diagnostic");
        self.entries.lock().push(Diagnostic { severity: Severity::Warning, message, op: op.cloned() });
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Drain all collected diagnostics.
    pub fn take(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.entries.lock())
    }
}
