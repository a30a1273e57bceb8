//! Non-fatal engine error reporting.
//!
//! Grammar failures never abort the engine; they are delivered to an
//! [`ErrorSink`] and tokenization continues with a fallback. Hosts install
//! whatever sink fits their diagnostics pipeline; [`LogErrorSink`] forwards
//! to `tracing`.

use crate::tokenizer::GrammarError;
use thiserror::Error;

/// Failures surfaced by the engine through its [`ErrorSink`].
#[derive(Debug, Error)]
pub enum EngineError {
    /// Resolving a grammar's initial state failed. The engine becomes a
    /// no-op for the language until the registry changes.
    #[error("initial state for language '{language_id}' failed: {source}")]
    InitialState {
        /// The language whose grammar failed.
        language_id: String,
        /// The underlying grammar error.
        source: GrammarError,
    },
    /// A grammar failed on one line. A single covering fallback token was
    /// substituted and the entry state flowed through unchanged.
    #[error("tokenizing line {line_number} failed: {source}")]
    Tokenize {
        /// 1-based number of the line that failed.
        line_number: usize,
        /// The underlying grammar error.
        source: GrammarError,
    },
}

/// Receiver for non-fatal engine errors.
pub trait ErrorSink {
    /// Report one error. Implementations must not panic.
    fn report(&self, error: &EngineError);
}

/// [`ErrorSink`] that emits a `tracing` warning per error.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogErrorSink;

impl ErrorSink for LogErrorSink {
    fn report(&self, error: &EngineError) {
        tracing::warn!(error = %error, "tokenization error");
    }
}
