//! Diagnostics for the scan/parse/type-check pipeline.
//!
//! `spec.md` §4.4 and §7: type-checking emits errors through an
//! `ErrorHandler` that accumulates diagnostics with code-fragment context;
//! any error aborts emission of *that* fragment but the generator
//! continues with other groups, then fails the overall pass at the end.

use thiserror::Error;

use crate::scan::Span;

/// Result alias for transpiler operations.
pub type Result<T> = std::result::Result<T, TranspileError>;

/// A single diagnostic raised while scanning, parsing, or type-checking
/// one code fragment.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TranspileError {
    /// Malformed lexeme (scanner stage).
    #[error("{context}: syntax error at {span}: {reason}")]
    Syntax {
        /// Fragment identity, e.g. `"synapse group 'S' weight update model sim code"`.
        context: String,
        /// Location inside the fragment.
        span: Span,
        /// Human-readable reason.
        reason: String,
    },
    /// Malformed expression/statement grammar (parser stage).
    #[error("{context}: parse error at {span}: {reason}")]
    Parse {
        /// Fragment identity.
        context: String,
        /// Location inside the fragment.
        span: Span,
        /// Human-readable reason.
        reason: String,
    },
    /// An identifier did not resolve against the active environment.
    #[error("{context}: unknown identifier '{name}' at {span}")]
    UnknownIdentifier {
        /// Fragment identity.
        context: String,
        /// Location inside the fragment.
        span: Span,
        /// The identifier that failed to resolve.
        name: String,
    },
    /// An expression's type was incompatible with how it was used.
    #[error("{context}: type error at {span}: {reason}")]
    TypeError {
        /// Fragment identity.
        context: String,
        /// Location inside the fragment.
        span: Span,
        /// Human-readable reason.
        reason: String,
    },
    /// A write target was not writable (e.g. a read-only captured field).
    #[error("{context}: write to read-only identifier '{name}' at {span}")]
    WriteToReadOnly {
        /// Fragment identity.
        context: String,
        /// Location inside the fragment.
        span: Span,
        /// The identifier that was written to.
        name: String,
    },
    /// A called function substitution does not exist, or was called with
    /// the wrong number of arguments.
    #[error("{context}: {reason} at {span}")]
    FunctionCall {
        /// Fragment identity.
        context: String,
        /// Location inside the fragment.
        span: Span,
        /// Human-readable reason.
        reason: String,
    },
}

impl TranspileError {
    /// Build a `Syntax` diagnostic.
    pub fn syntax(context: impl Into<String>, span: Span, reason: impl Into<String>) -> Self {
        TranspileError::Syntax { context: context.into(), span, reason: reason.into() }
    }

    /// Build a `Parse` diagnostic.
    pub fn parse(context: impl Into<String>, span: Span, reason: impl Into<String>) -> Self {
        TranspileError::Parse { context: context.into(), span, reason: reason.into() }
    }

    /// The fragment-identity context string this diagnostic is attached to.
    pub fn context(&self) -> &str {
        match self {
            TranspileError::Syntax { context, .. }
            | TranspileError::Parse { context, .. }
            | TranspileError::UnknownIdentifier { context, .. }
            | TranspileError::TypeError { context, .. }
            | TranspileError::WriteToReadOnly { context, .. }
            | TranspileError::FunctionCall { context, .. } => context,
        }
    }
}

/// Accumulates diagnostics across an entire emission pass.
///
/// Per `spec.md` §4.4: any error aborts emission of *that* fragment, but
/// the pipeline keeps going so every other group's diagnostics surface in
/// the same run rather than one-at-a-time.
#[derive(Debug, Default)]
pub struct ErrorHandler {
    diagnostics: Vec<TranspileError>,
}

impl ErrorHandler {
    /// A fresh, empty handler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic.
    pub fn push(&mut self, error: TranspileError) {
        log::debug!("transpile diagnostic recorded: {error}");
        self.diagnostics.push(error);
    }

    /// True if any diagnostics have been recorded.
    pub fn has_errors(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    /// All recorded diagnostics, in the order they were pushed.
    pub fn diagnostics(&self) -> &[TranspileError] {
        &self.diagnostics
    }

    /// Consume the handler, failing with the first diagnostic if any were
    /// recorded (callers that need the full list should use
    /// `diagnostics()` before calling this).
    pub fn into_result(self) -> Result<()> {
        match self.diagnostics.into_iter().next() {
            Some(first) => Err(first),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handler_accumulates_across_multiple_pushes() {
        let mut handler = ErrorHandler::new();
        handler.push(TranspileError::syntax("a", Span::default(), "bad"));
        handler.push(TranspileError::syntax("b", Span::default(), "bad"));
        assert_eq!(handler.diagnostics().len(), 2);
        assert!(handler.has_errors());
    }

    #[test]
    fn empty_handler_converts_to_ok() {
        assert!(ErrorHandler::new().into_result().is_ok());
    }
}
