//! Recoverable compile error store.
//!
//! The frontend bails out on the first malformed token or production, but
//! everything after parsing (type checks, IR lowering, assembling) records
//! errors here and keeps going so a single run reports as many problems as
//! possible. A unit with recorded errors produces no artifacts.

use colored::Colorize;

use crate::frontend::SourceFileOrigin;

#[derive(Debug, Default)]
pub struct Diagnostics {
    errors: Vec<Diagnostic>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// 1-based source line
    pub line: usize,
    pub message: String,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, line: usize, message: impl Into<String>) {
        self.errors.push(Diagnostic {
            line,
            message: message.into(),
        });
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Errors ordered by source line. Reports from different pipeline stages
    /// interleave, so the sort is stable to keep same-line errors in the
    /// order they were recorded.
    pub fn sorted(&self) -> Vec<&Diagnostic> {
        let mut errors: Vec<&Diagnostic> = self.errors.iter().collect();
        errors.sort_by_key(|diagnostic| diagnostic.line);
        errors
    }

    pub fn print_all(&self, origin: &SourceFileOrigin) {
        for diagnostic in self.sorted() {
            eprintln!(
                "{}: {} {}",
                "error".red(),
                diagnostic.message,
                format!("(at {}:{})", origin, diagnostic.line).white()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_sort_by_line() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.report(9, "third");
        diagnostics.report(2, "first");
        diagnostics.report(4, "second");

        let lines: Vec<usize> = diagnostics.sorted().iter().map(|d| d.line).collect();
        assert_eq!(lines, vec![2, 4, 9]);
    }

    #[test]
    fn same_line_errors_keep_report_order() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.report(3, "recorded first");
        diagnostics.report(1, "other line");
        diagnostics.report(3, "recorded second");

        let messages: Vec<&str> = diagnostics
            .sorted()
            .iter()
            .map(|d| d.message.as_str())
            .collect();
        assert_eq!(
            messages,
            vec!["other line", "recorded first", "recorded second"]
        );
    }

    #[test]
    fn a_fresh_store_is_clean() {
        let diagnostics = Diagnostics::new();
        assert!(!diagnostics.has_errors());
        assert_eq!(diagnostics.error_count(), 0);
    }
}
