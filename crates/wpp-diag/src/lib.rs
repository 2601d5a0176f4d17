//! Error reporting and diagnostics for Wot++.
//!
//! This crate provides structured diagnostics with source location tracking.
//! Diagnostics are created by the lexer, parser, and evaluator and rendered
//! here for display; the driver prepends the file name.

use std::fmt;

// ---------------------------------------------------------------------------
// Diagnostic severity and categories
// ---------------------------------------------------------------------------

/// How severe a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// Which stage a diagnostic belongs to. Every error is fatal to the current
/// evaluation; the stage determines the code and wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Tokenisation error: bad character, unterminated comment or string,
    /// invalid hex/binary digit.
    Lex,
    /// Source tokenised but does not form a valid program.
    Parse,
    /// The program is well formed but failed while evaluating.
    Eval,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Lex, Category::Parse, Category::Eval];

    pub fn all() -> &'static [Category] {
        &Self::ALL
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Lex => "lex",
            Category::Parse => "parse",
            Category::Eval => "eval",
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Category::Lex => "E0001",
            Category::Parse => "E0002",
            Category::Eval => "E0003",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Category::Lex => "Source text could not be split into tokens.",
            Category::Parse => "Token stream does not form a valid document.",
            Category::Eval => "A runtime error occurred while evaluating the document.",
        }
    }

    pub fn example_fix(self) -> &'static str {
        match self {
            Category::Lex => "Check string and comment terminators near the reported position.",
            Category::Parse => "Fix the syntax near the highlighted position.",
            Category::Eval => {
                "Check that the named definition exists at the expected arity and prefix."
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Source locations
// ---------------------------------------------------------------------------

/// A source location for diagnostics.
///
/// Carries one-based line and column plus the byte offset. Callers convert
/// from `wpp-ast` positions to this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    pub file_id: u32,
    pub line: u32,
    pub column: u32,
    pub offset: u32,
}

// ---------------------------------------------------------------------------
// Diagnostic
// ---------------------------------------------------------------------------

/// A structured diagnostic message.
///
/// Every diagnostic carries enough context to produce an actionable error
/// message without exposing interpreter internals.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Stable diagnostic code (e.g. E0002).
    pub code: Option<String>,
    pub severity: Severity,
    pub category: Category,
    /// Primary message: what went wrong.
    pub message: String,
    /// Where it went wrong.
    pub location: Option<SourceLocation>,
    /// Suggested fix, if any.
    pub help: Option<String>,
}

impl Diagnostic {
    pub fn error(category: Category, message: impl Into<String>) -> Self {
        Self {
            code: Some(category.code().to_string()),
            severity: Severity::Error,
            category,
            message: message.into(),
            location: None,
            help: None,
        }
    }

    pub fn warning(category: Category, message: impl Into<String>) -> Self {
        Self {
            code: Some(category.code().to_string()),
            severity: Severity::Warning,
            category,
            message: message.into(),
            location: None,
            help: None,
        }
    }

    pub fn at(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        };
        if let Some(code) = &self.code {
            write!(f, "{prefix}[{code}]: {}", self.message)?;
        } else {
            write!(f, "{prefix}: {}", self.message)?;
        }
        if let Some(help) = &self.help {
            write!(f, "\n  help: {help}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Error type for crates that produce diagnostics
// ---------------------------------------------------------------------------

/// Error type wrapping a diagnostic for callers that want `std::error::Error`.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct DiagnosticError(pub Diagnostic);

impl From<Diagnostic> for DiagnosticError {
    fn from(diag: Diagnostic) -> Self {
        Self(diag)
    }
}

impl DiagnosticError {
    pub fn diagnostic(&self) -> &Diagnostic {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_builder() {
        let loc = SourceLocation {
            file_id: 0,
            line: 3,
            column: 9,
            offset: 41,
        };
        let diag = Diagnostic::error(Category::Eval, "function `greet` of arity 2 is not defined")
            .at(loc)
            .with_help("define it with `let greet(a, b) ...`");

        assert_eq!(diag.severity, Severity::Error);
        assert_eq!(diag.code.as_deref(), Some("E0003"));
        assert_eq!(diag.category, Category::Eval);
        assert!(diag.message.contains("greet"));
        assert!(diag.help.unwrap().contains("let greet"));
        assert_eq!(diag.location, Some(loc));
    }

    #[test]
    fn diagnostic_display() {
        let diag = Diagnostic::error(Category::Parse, "expected ')' to close the argument list");
        let s = format!("{diag}");
        assert!(s.starts_with("error[E0002]: expected ')'"));
    }

    #[test]
    fn category_metadata_is_stable_and_unique() {
        let mut codes = std::collections::BTreeSet::new();
        for cat in Category::all() {
            assert!(!cat.as_str().is_empty());
            assert!(!cat.description().is_empty());
            assert!(!cat.example_fix().is_empty());
            assert!(
                codes.insert(cat.code()),
                "duplicate diagnostic code detected: {}",
                cat.code()
            );
        }
    }
}
