//! Source positions and line lookup for diagnostics.

use std::fmt;

/// A 1-based line/column pair in the source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self { line: 1, column: 1 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub fn from_range(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    pub fn point(line: usize, column: usize) -> Self {
        let pos = Position::new(line, column);
        Self::from_range(pos, pos)
    }

    pub fn merge(&self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}:{}", self.start.line, self.start.column)
        } else if self.start.line == self.end.line {
            write!(
                f,
                "{}:{}-{}",
                self.start.line, self.start.column, self.end.column
            )
        } else {
            write!(
                f,
                "{}:{}-{}:{}",
                self.start.line, self.start.column, self.end.line, self.end.column
            )
        }
    }
}

/// A named source buffer with precomputed line starts, so diagnostics can
/// quote the offending line.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub source: String,
    line_starts: Vec<usize>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        let source = source.into();
        let line_starts = compute_line_starts(&source);
        Self {
            name: name.into(),
            source,
            line_starts,
        }
    }

    /// The text of the given 1-based line, without its terminator.
    pub fn line_text(&self, line: usize) -> Option<&str> {
        let start = *self.line_starts.get(line.checked_sub(1)?)?;
        let end = self
            .line_starts
            .get(line)
            .map(|next| next - 1)
            .unwrap_or(self.source.len());
        self.source.get(start..end).map(|text| text.trim_end_matches('\r'))
    }
}

fn compute_line_starts(source: &str) -> Vec<usize> {
    let mut starts = vec![0];
    for (idx, ch) in source.char_indices() {
        if ch == '\n' {
            starts.push(idx + ch.len_utf8());
        }
    }
    starts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_display_formats() {
        assert_eq!(Span::point(3, 7).to_string(), "3:7");
        let same_line = Span::from_range(Position::new(3, 7), Position::new(3, 12));
        assert_eq!(same_line.to_string(), "3:7-12");
        let multi_line = Span::from_range(Position::new(3, 7), Position::new(4, 2));
        assert_eq!(multi_line.to_string(), "3:7-4:2");
    }

    #[test]
    fn merge_takes_outermost_bounds() {
        let a = Span::from_range(Position::new(2, 5), Position::new(2, 9));
        let b = Span::from_range(Position::new(1, 1), Position::new(2, 7));
        let merged = a.merge(b);
        assert_eq!(merged.start, Position::new(1, 1));
        assert_eq!(merged.end, Position::new(2, 9));
    }

    #[test]
    fn line_text_lookup() {
        let file = SourceFile::new("demo.aur", "fn main() -> i64 {\n  return 0;\n}\n");
        assert_eq!(file.line_text(1), Some("fn main() -> i64 {"));
        assert_eq!(file.line_text(2), Some("  return 0;"));
        assert_eq!(file.line_text(3), Some("}"));
        assert_eq!(file.line_text(9), None);
    }
}
