//! The staged compilation pipeline.
//!
//! Each stage consumes the previous stage's output and produces the next;
//! the first failure aborts the run. No stage reaches back.

use crate::diagnostics::{Diagnostic, Renderer};
use crate::emit::{self, EmitError};
use crate::ir;
use crate::lexer::{self, LexError};
use crate::parser::{self, ParseError};
use crate::sema::{self, SemaError};
use crate::span::SourceFile;

#[derive(Debug)]
pub struct CompiledModule {
    pub program: crate::ast::Program,
    pub module: ir::Module,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompileError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Sema(#[from] SemaError),
    #[error(transparent)]
    Emit(#[from] EmitError),
}

impl CompileError {
    pub fn into_diagnostic(self) -> Diagnostic {
        match self {
            CompileError::Lex(error) => error.into_diagnostic(),
            CompileError::Parse(error) => error.into_diagnostic(),
            CompileError::Sema(error) => error.into_diagnostic(),
            CompileError::Emit(error) => error.into_diagnostic(),
        }
    }
}

/// Runs the whole pipeline over one source buffer. On success the returned
/// module has passed per-function structural verification.
pub fn compile(name: &str, source: &str) -> Result<CompiledModule, CompileError> {
    tracing::debug!(file = name, "lexing");
    let tokens = lexer::tokenize(source)?;
    tracing::debug!(tokens = tokens.len(), "parsing");
    let program = parser::parse_program(tokens)?;
    tracing::debug!(functions = program.functions.len(), "analyzing");
    sema::analyze(&program)?;
    tracing::debug!("emitting");
    let module = emit::emit_program(&program)?;
    tracing::debug!(functions = module.functions.len(), "module verified");
    Ok(CompiledModule { program, module })
}

/// Renders a pipeline failure against its source, for the process's single
/// stderr diagnostic.
pub fn render_error(name: &str, source: &str, error: CompileError) -> String {
    let file = SourceFile::new(name, source);
    Renderer::with_source(&file).render(&error.into_diagnostic())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_a_complete_program() {
        let compiled = compile(
            "factorial.aur",
            "fn factorial(n: i64) -> i64 {\n\
             let r: i64 = 1;\n\
             while (n > 1) { r = r * n; n = n - 1; }\n\
             return r;\n\
             }\n\
             fn main() -> i64 {\n\
             let x = factorial(5);\n\
             print_i64(x);\n\
             return 0;\n\
             }",
        )
        .expect("pipeline");
        assert_eq!(compiled.module.functions.len(), 2);
        compiled.module.verify().expect("verified output");
    }

    #[test]
    fn propagates_lex_errors() {
        let err = compile("bad.aur", "fn main() -> i64 { return 0 ยง; }").unwrap_err();
        assert!(matches!(err, CompileError::Lex(_)));
    }

    #[test]
    fn propagates_parse_errors() {
        let err = compile("bad.aur", "fn main() -> i64 { return 0 }").unwrap_err();
        assert!(matches!(err, CompileError::Parse(_)));
        assert!(err.to_string().contains("expected"));
    }

    #[test]
    fn propagates_sema_errors() {
        let err = compile("bad.aur", "fn main() -> i64 { let x: bool = 1; return 0; }")
            .unwrap_err();
        assert!(matches!(err, CompileError::Sema(_)));
    }

    #[test]
    fn render_error_quotes_the_offending_line() {
        let source = "fn main() -> i64 {\n  return y;\n}\n";
        let err = compile("demo.aur", source).unwrap_err();
        let rendered = render_error("demo.aur", source, err);
        assert!(rendered.starts_with("error: unknown variable: y"));
        assert!(rendered.contains("demo.aur:2:"));
        assert!(rendered.contains("return y;"));
    }
}
