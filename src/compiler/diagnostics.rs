//! Source positions, compile errors, and the human-readable diagnostic
//! format shared by every pipeline stage.

use std::fmt;

use thiserror::Error;

/// A position in template source. Lines and columns are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub line: u32,
    pub column: u32,
}

impl Span {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A fatal error from compiling one template. The pipeline never recovers
/// locally; the error is turned into a [`Diagnostic`] by the driver and the
/// model's compilation is abandoned.
#[derive(Debug, Clone, Error)]
pub enum CompileError {
    /// Malformed tag, unclosed tag, mismatched close, illegal identifier.
    #[error("{message}")]
    Syntax { message: String, span: Span },

    /// Block outside a parent, duplicate block, partial depth exceeded.
    #[error("{message}")]
    Structure { message: String, span: Span },

    /// Unknown name, non-formattable variable, bad lambda shape.
    #[error("{message}")]
    Resolve { message: String, span: Span },

    /// Resource not found or undecodable in the declared charset.
    #[error("{message}")]
    Io { message: String },

    /// Unreachable state; always a compiler bug.
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl CompileError {
    pub fn syntax(span: Span, message: impl Into<String>) -> Self {
        Self::Syntax { message: message.into(), span }
    }

    pub fn structure(span: Span, message: impl Into<String>) -> Self {
        Self::Structure { message: message.into(), span }
    }

    pub fn resolve(span: Span, message: impl Into<String>) -> Self {
        Self::Resolve { message: message.into(), span }
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::Io { message: message.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }

    pub fn span(&self) -> Option<Span> {
        match self {
            Self::Syntax { span, .. } | Self::Structure { span, .. } | Self::Resolve { span, .. } => {
                Some(*span)
            }
            Self::Io { .. } | Self::Internal { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => f.write_str("error"),
            Severity::Warning => f.write_str("warning"),
        }
    }
}

/// One reported line. Displays as `<severity>: <file>:<line>:<col>: <message>`,
/// dropping the position segment when no span is available.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub file: String,
    pub span: Option<Span>,
    pub message: String,
}

impl Diagnostic {
    pub fn error(file: impl Into<String>, span: Option<Span>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            file: file.into(),
            span,
            message: message.into(),
        }
    }

    pub fn warning(file: impl Into<String>, span: Option<Span>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            file: file.into(),
            span,
            message: message.into(),
        }
    }

    pub fn from_compile_error(file: &str, error: &CompileError) -> Self {
        Self::error(file, error.span(), error.to_string())
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.span {
            Some(span) => write!(f, "{}: {}:{}: {}", self.severity, self.file, span, self.message),
            None => write!(f, "{}: {}: {}", self.severity, self.file, self.message),
        }
    }
}

/// Accumulates diagnostics for one batch. The driver wraps this in a mutex
/// when compiling models on multiple threads.
#[derive(Debug, Default)]
pub struct DiagnosticSink {
    entries: Vec<Diagnostic>,
}

impl DiagnosticSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.entries.push(diagnostic);
    }

    pub fn has_errors(&self) -> bool {
        self.entries.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<Diagnostic> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_line_format() {
        let d = Diagnostic::error("hello.mustache", Some(Span::new(3, 7)), "unclosed tag");
        assert_eq!(d.to_string(), "error: hello.mustache:3:7: unclosed tag");

        let w = Diagnostic::warning("hello.mustache", None, "nothing generated");
        assert_eq!(w.to_string(), "warning: hello.mustache: nothing generated");
    }

    #[test]
    fn sink_reports_errors_only_for_error_severity() {
        let mut sink = DiagnosticSink::new();
        sink.push(Diagnostic::warning("a", None, "w"));
        assert!(!sink.has_errors());
        sink.push(Diagnostic::error("a", None, "e"));
        assert!(sink.has_errors());
    }
}
