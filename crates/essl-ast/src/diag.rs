//! Diagnostics shared by the frontend, validator and linker.

use std::fmt;

/// How bad a diagnostic is.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Warning => "warning",
            Self::Error => "error",
        })
    }
}

/// The closed taxonomy of rejection causes.
///
/// Every diagnostic the pipeline can produce carries one of these kinds;
/// they are accumulated in order and never raised as panics.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum DiagnosticKind {
    LexError,
    SyntaxError,
    UndeclaredIdentifier,
    TypeMismatch,
    DuplicateName,
    DuplicateOverload,
    MismatchedOverload,
    BuiltinOverloadConflict,
    IllegalReferenceArgument,
    RecursionError,
    ArraySizeError,
    PrecisionError,
    ExtensionNotEnabled,
    UniformArrayIndexError,
    InternalError,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::LexError => "lex error",
            Self::SyntaxError => "syntax error",
            Self::UndeclaredIdentifier => "undeclared identifier",
            Self::TypeMismatch => "type mismatch",
            Self::DuplicateName => "duplicate name",
            Self::DuplicateOverload => "duplicate overload",
            Self::MismatchedOverload => "mismatched overload",
            Self::BuiltinOverloadConflict => "builtin overload conflict",
            Self::IllegalReferenceArgument => "illegal reference argument",
            Self::RecursionError => "recursion",
            Self::ArraySizeError => "array size error",
            Self::PrecisionError => "precision error",
            Self::ExtensionNotEnabled => "extension not enabled",
            Self::UniformArrayIndexError => "uniform array index error",
            Self::InternalError => "internal error",
        })
    }
}

/// A single diagnostic: kind, severity, source line, message.
#[derive(Clone, Debug)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub severity: Severity,
    pub line: u32,
    pub message: String,
}

impl Diagnostic {
    pub fn error(kind: DiagnosticKind, line: u32, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: Severity::Error,
            line,
            message: message.into(),
        }
    }

    pub fn warning(kind: DiagnosticKind, line: u32, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: Severity::Warning,
            line,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}: {} ({})",
            self.severity, self.line, self.message, self.kind
        )
    }
}
