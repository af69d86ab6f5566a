use std::fmt;

use crate::source::{Location, Source};
use crate::ExprId;

/// Default cap on the number of stored diagnostics.
pub const DEFAULT_MAX_ERRORS: usize = 100;

const MAX_SNIPPET_LENGTH: usize = 16384;

/// Category of a reported problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Syntax,
    MalformedLiteral,
    UnterminatedOrUnescapedQuote,
    ReservedIdentifier,
    UnsupportedSyntax,
    MacroArgumentShape,
    UndeclaredReference,
    UndefinedField,
    FieldSelectionNotSupported,
    TypeMismatch,
    FieldTypeMismatch,
    NotAType,
    NotAMessageType,
    NoMatchingOverload,
    NotAComprehensionRange,
    RecursionLimitExceeded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub id: ExprId,
    pub location: Location,
    pub kind: ErrorKind,
    pub message: String,
}

impl Diagnostic {
    /// Render as `ERROR: <source>:line:col: message` followed by the source
    /// line and a caret under the column when the location is known.
    pub fn render(&self, source: &Source) -> String {
        let mut out = format!(
            "ERROR: {}:{}:{}: {}",
            source.description(),
            self.location.line,
            self.location.column + 1,
            self.message
        );
        let Some(snippet) = source.snippet(self.location.line) else {
            return out;
        };
        if snippet.len() > MAX_SNIPPET_LENGTH {
            return out;
        }
        let snippet = snippet.replace('\t', " ");
        out.push_str("\n | ");
        out.push_str(&snippet);
        out.push_str("\n | ");
        let mut chars = snippet.chars();
        for _ in 0..self.location.column.max(0) {
            match chars.next() {
                Some(c) if c.len_utf8() > 1 => out.push('\u{ff0e}'),
                _ => out.push('.'),
            }
        }
        match chars.next() {
            Some(c) if c.len_utf8() > 1 => out.push('\u{ff3e}'),
            _ => out.push('^'),
        }
        out
    }
}

/// Accumulates diagnostics for one parse or one check.
///
/// Past `max_errors` further reports are counted but not stored.
#[derive(Debug, Clone)]
pub struct Errors {
    source: Source,
    diagnostics: Vec<Diagnostic>,
    max_errors: usize,
    total: usize,
}

impl Errors {
    pub fn new(source: Source) -> Self {
        Self::with_max_errors(source, DEFAULT_MAX_ERRORS)
    }

    pub fn with_max_errors(source: Source, max_errors: usize) -> Self {
        Self {
            source,
            diagnostics: Vec::new(),
            max_errors,
            total: 0,
        }
    }

    pub fn report(
        &mut self,
        id: ExprId,
        location: Location,
        kind: ErrorKind,
        message: impl Into<String>,
    ) {
        self.total += 1;
        if self.diagnostics.len() >= self.max_errors {
            return;
        }
        self.diagnostics.push(Diagnostic {
            id,
            location,
            kind,
            message: message.into(),
        });
    }

    /// Report at a byte offset into the source.
    pub fn report_at(&mut self, id: ExprId, offset: u32, kind: ErrorKind, message: impl Into<String>) {
        let location = self.source.location(offset);
        self.report(id, location, kind, message);
    }

    pub fn report_syntax(&mut self, offset: u32, message: impl fmt::Display) {
        self.report_at(0, offset, ErrorKind::Syntax, format!("Syntax error: {message}"));
    }

    /// Report a problem that has no meaningful source location.
    pub fn report_internal(&mut self, kind: ErrorKind, message: impl Into<String>) {
        self.report(0, Location::NONE, kind, message);
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Number of stored diagnostics.
    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    /// Number of reports, including those dropped past the cap.
    pub fn total(&self) -> usize {
        self.total
    }
}

impl fmt::Display for Errors {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut seen_recursion = false;
        let mut first = true;
        for diagnostic in &self.diagnostics {
            if diagnostic.kind == ErrorKind::RecursionLimitExceeded {
                if seen_recursion {
                    continue;
                }
                seen_recursion = true;
            }
            if !first {
                f.write_str("\n ")?;
            }
            first = false;
            f.write_str(&diagnostic.render(&self.source))?;
        }
        Ok(())
    }
}
