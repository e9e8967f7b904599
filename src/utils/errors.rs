//! Error types for the code generator.
//!
//! Code generation failures fall into three groups: configuration errors and
//! broken preconditions abort the run, while an unavailable annotation sink is
//! recoverable and only costs the concurrency annotations.

use thiserror::Error;
use std::fmt;

/// Top-level error type.
#[derive(Error, Debug)]
pub enum PolyEmitError {
    /// Error during code generation
    #[error("Code generation error: {0}")]
    Codegen(#[from] CodegenError),

    /// Malformed program description
    #[error("Invalid program description: {0}")]
    Program(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error during code generation.
#[derive(Error, Debug, Clone)]
pub struct CodegenError {
    /// The error message
    pub message: String,
    /// The kind of codegen error
    pub kind: CodegenErrorKind,
}

impl fmt::Display for CodegenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodegenErrorKind {
    /// Induction variable width is neither 32 nor 64
    InvalidIndvarType,
    /// A statement needs a macro but has no iterator names
    MissingIterators,
    /// The parallel annotation file could not be created or written
    SinkUnavailable,
    /// A schedule cannot be inverted onto its statement's iterators
    NonInvertibleSchedule,
    /// A generated loop has no lower or no upper bound
    UnboundedDimension,
    /// Any other failure reported by the AST generator
    Generator,
}

impl CodegenError {
    /// Create a new error of the given kind.
    pub fn new(kind: CodegenErrorKind, message: impl Into<String>) -> Self {
        Self { message: message.into(), kind }
    }

    pub fn invalid_indvar_type(width: u32) -> Self {
        Self::new(
            CodegenErrorKind::InvalidIndvarType,
            format!("Cannot recognize indvar_type: {}, which should be 32 or 64", width),
        )
    }

    pub fn missing_iterators(stmt: impl fmt::Display) -> Self {
        Self::new(
            CodegenErrorKind::MissingIterators,
            format!("Iterator name not set for {}; required for generating declarations", stmt),
        )
    }

    pub fn sink_unavailable(path: impl fmt::Debug, cause: &std::io::Error) -> Self {
        Self::new(
            CodegenErrorKind::SinkUnavailable,
            format!("Cannot write parallel annotations to {:?}: {}", path, cause),
        )
    }

    /// Whether the whole code generation run must stop.
    pub fn is_fatal(&self) -> bool {
        self.kind != CodegenErrorKind::SinkUnavailable
    }
}

/// Result type used by the code generator.
pub type CodegenResult<T> = Result<T, CodegenError>;

/// Result type using PolyEmitError.
pub type PolyResult<T> = Result<T, PolyEmitError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CodegenError::invalid_indvar_type(17);
        let s = format!("{}", err);
        assert!(s.contains("17"));
        assert!(s.contains("32 or 64"));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_sink_unavailable_is_recoverable() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = CodegenError::sink_unavailable(".pragmas", &io);
        assert_eq!(err.kind, CodegenErrorKind::SinkUnavailable);
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_wraps_into_top_level() {
        let err: PolyEmitError = CodegenError::missing_iterators("S1").into();
        assert!(err.to_string().starts_with("Code generation error: Iterator name not set for S1"));
    }
}
