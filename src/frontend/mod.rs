use std::path::PathBuf;

use colored::Colorize;

use self::lexer::Span;

pub mod ast;
pub mod intern;
pub mod lexer;
pub mod parser;

#[derive(Debug)]
pub struct SourceFile {
    pub contents: String,
    pub origin: SourceFileOrigin,
}

impl SourceFile {
    pub fn value_of_span(&self, span: Span) -> &str {
        &self.contents[span.start..span.end]
    }

    /// 1-based line number of a byte position.
    pub fn row_for_position(&self, position: usize) -> usize {
        self.contents[..position.min(self.contents.len())]
            .bytes()
            .filter(|b| *b == b'\n')
            .count()
            + 1
    }

    /// 1-based column of a byte position within its line.
    pub fn column_for_position(&self, position: usize) -> usize {
        let position = position.min(self.contents.len());

        let line_start = self.contents[..position]
            .rfind('\n')
            .map(|i| i + 1)
            .unwrap_or(0);

        position - line_start + 1
    }

    /// Prints the line containing the span with the spanned region underlined.
    pub fn highlight_span(&self, span: Span) {
        let row = self.row_for_position(span.start);
        let column = self.column_for_position(span.start);

        let Some(line) = self.contents.lines().nth(row - 1) else {
            return;
        };

        let gutter = format!("{row} | ");
        let width = (span.end - span.start).max(1).min(line.len() + 1 - column);

        eprintln!("{}{}", gutter.white(), line);
        eprintln!(
            "{}{}{}",
            " ".repeat(gutter.len()),
            " ".repeat(column - 1),
            "^".repeat(width).red().bold()
        );
    }
}

#[derive(Debug)]
pub enum SourceFileOrigin {
    Memory,
    File(PathBuf),
}

impl core::fmt::Display for SourceFileOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceFileOrigin::Memory => f.write_str("<memory>"),
            SourceFileOrigin::File(path) => f.write_fmt(format_args!("{}", path.display())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(contents: &str) -> SourceFile {
        SourceFile {
            contents: contents.to_string(),
            origin: SourceFileOrigin::Memory,
        }
    }

    #[test]
    fn rows_and_columns_are_one_based() {
        let file = source("ab\ncd\nef");

        assert_eq!(file.row_for_position(0), 1);
        assert_eq!(file.column_for_position(0), 1);
        assert_eq!(file.row_for_position(3), 2);
        assert_eq!(file.column_for_position(4), 2);
        assert_eq!(file.row_for_position(6), 3);
    }

    #[test]
    fn span_values_slice_the_source() {
        let file = source("x: int = 5");

        assert_eq!(file.value_of_span(Span::new(3, 6)), "int");
    }
}
