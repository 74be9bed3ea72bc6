//! Shared diagnostic data structures and rendering.
//!
//! The pipeline is fail-fast: the first error aborts the invocation, so a
//! run renders at most one diagnostic. The renderer prints a single headline
//! plus, when a source file is attached, the location and offending line.

use crate::span::{SourceFile, Span};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub span: Span,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub label: Option<Label>,
    pub notes: Vec<String>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    pub fn with_label(mut self, span: Span, message: impl Into<String>) -> Self {
        self.label = Some(Label {
            span,
            message: Some(message.into()),
        });
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.label = Some(Label {
            span,
            message: None,
        });
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            label: None,
            notes: Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
pub struct Renderer<'a> {
    source: Option<&'a SourceFile>,
}

impl<'a> Renderer<'a> {
    pub fn new() -> Self {
        Self { source: None }
    }

    pub fn with_source(source: &'a SourceFile) -> Self {
        Self {
            source: Some(source),
        }
    }

    pub fn render(&self, diagnostic: &Diagnostic) -> String {
        let mut lines = Vec::new();
        lines.push(match diagnostic.severity {
            Severity::Error => format!("error: {}", diagnostic.message),
            Severity::Warning => format!("warning: {}", diagnostic.message),
        });

        if let Some(label) = &diagnostic.label {
            if let Some(source) = self.source {
                lines.push(format!("  --> {}:{}", source.name, label.span));
                if let Some(text) = source.line_text(label.span.start.line) {
                    lines.push(format!("   | {}", text));
                }
            } else if let Some(message) = &label.message {
                lines.push(format!("  = {} at {}", message, label.span));
            }
        }

        for note in &diagnostic.notes {
            lines.push(format!("  note: {}", note));
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::SourceFile;

    #[test]
    fn renders_headline_without_source() {
        let diagnostic = Diagnostic::error("unknown variable: y");
        assert_eq!(
            Renderer::new().render(&diagnostic),
            "error: unknown variable: y"
        );
    }

    #[test]
    fn renders_location_and_line_with_source() {
        let source = SourceFile::new("demo.aur", "fn main() -> i64 {\n  return y;\n}\n");
        let diagnostic =
            Diagnostic::error("unknown variable: y").with_label(Span::point(2, 10), "used here");
        let rendered = Renderer::with_source(&source).render(&diagnostic);
        assert_eq!(
            rendered,
            "error: unknown variable: y\n  --> demo.aur:2:10\n   |   return y;"
        );
    }

    #[test]
    fn renders_notes_last() {
        let diagnostic = Diagnostic::warning("shadowed binding").with_note("first bound at 1:5");
        let rendered = Renderer::new().render(&diagnostic);
        assert!(rendered.ends_with("note: first bound at 1:5"));
    }
}
