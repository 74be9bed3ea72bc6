//! Abstract syntax tree for Aurora programs.
//!
//! The tree is strictly owned top-down: a [`Program`] owns its functions,
//! functions own their statements, statements own their expressions. The
//! `Display` impls form a canonical printer whose output re-parses to a
//! structurally identical tree.

use std::fmt;

use crate::span::Span;
use crate::types::Ty;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Assign,
    Or,
    And,
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl BinOp {
    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Rem
        )
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::NotEq | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinOp::And | BinOp::Or)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Assign => "=",
            BinOp::Or => "||",
            BinOp::And => "&&",
            BinOp::Eq => "==",
            BinOp::NotEq => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Int(i64),
    Bool(bool),
    Var(String),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call {
        callee: String,
        args: Vec<Expr>,
    },
    ArrayLit(Vec<Expr>),
    Index {
        base: Box<Expr>,
        index: Box<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

impl Stmt {
    pub fn new(kind: StmtKind, span: Span) -> Self {
        Self { kind, span }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Let {
        name: String,
        annotation: Option<Ty>,
        init: Expr,
        unique: bool,
    },
    Expr(Expr),
    Return(Option<Expr>),
    If {
        condition: Expr,
        then_body: Vec<Stmt>,
        else_body: Vec<Stmt>,
    },
    While {
        condition: Expr,
        body: Vec<Stmt>,
    },
    Defer(Expr),
    Break,
    Continue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: Ty,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub params: Vec<Param>,
    pub return_type: Ty,
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub functions: Vec<Function>,
}

// Canonical printer. Operator applications are always parenthesized, so the
// printed form carries no precedence ambiguity and round-trips through the
// parser unchanged.

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Int(value) => write!(f, "{value}"),
            ExprKind::Bool(value) => write!(f, "{value}"),
            ExprKind::Var(name) => f.write_str(name),
            ExprKind::Unary { op, operand } => {
                let symbol = match op {
                    UnaryOp::Neg => "-",
                    UnaryOp::Not => "!",
                };
                write!(f, "({symbol}{operand})")
            }
            ExprKind::Binary { op, lhs, rhs } => {
                write!(f, "({lhs} {} {rhs})", op.symbol())
            }
            ExprKind::Call { callee, args } => {
                write!(f, "{callee}(")?;
                for (idx, arg) in args.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(")")
            }
            ExprKind::ArrayLit(elements) => {
                f.write_str("[")?;
                for (idx, element) in elements.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{element}")?;
                }
                f.write_str("]")
            }
            ExprKind::Index { base, index } => write!(f, "{base}[{index}]"),
        }
    }
}

impl Stmt {
    fn write_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let pad = "  ".repeat(depth);
        match &self.kind {
            StmtKind::Let {
                name,
                annotation,
                init,
                unique,
            } => {
                write!(f, "{pad}let ")?;
                if *unique {
                    // The angle-bracketed type on `unique` is syntactic only;
                    // the binding's type comes from the annotation/initializer.
                    let printed = annotation.clone().unwrap_or(Ty::I64);
                    write!(f, "unique<{printed}> ")?;
                }
                f.write_str(name)?;
                if let Some(annotation) = annotation {
                    write!(f, ": {annotation}")?;
                }
                writeln!(f, " = {init};")
            }
            StmtKind::Expr(expr) => writeln!(f, "{pad}{expr};"),
            StmtKind::Return(None) => writeln!(f, "{pad}return;"),
            StmtKind::Return(Some(expr)) => writeln!(f, "{pad}return {expr};"),
            StmtKind::If {
                condition,
                then_body,
                else_body,
            } => {
                writeln!(f, "{pad}if ({condition}) {{")?;
                for stmt in then_body {
                    stmt.write_indented(f, depth + 1)?;
                }
                if else_body.is_empty() {
                    writeln!(f, "{pad}}}")
                } else {
                    writeln!(f, "{pad}}} else {{")?;
                    for stmt in else_body {
                        stmt.write_indented(f, depth + 1)?;
                    }
                    writeln!(f, "{pad}}}")
                }
            }
            StmtKind::While { condition, body } => {
                writeln!(f, "{pad}while ({condition}) {{")?;
                for stmt in body {
                    stmt.write_indented(f, depth + 1)?;
                }
                writeln!(f, "{pad}}}")
            }
            StmtKind::Defer(expr) => writeln!(f, "{pad}defer {expr};"),
            StmtKind::Break => writeln!(f, "{pad}break;"),
            StmtKind::Continue => writeln!(f, "{pad}continue;"),
        }
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_indented(f, 0)
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn {}(", self.name)?;
        for (idx, param) in self.params.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {}", param.name, param.ty)?;
        }
        writeln!(f, ") -> {} {{", self.return_type)?;
        for stmt in &self.body {
            stmt.write_indented(f, 1)?;
        }
        writeln!(f, "}}")
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, function) in self.functions.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{function}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expr(kind: ExprKind) -> Expr {
        Expr::new(kind, Span::default())
    }

    #[test]
    fn printer_parenthesizes_operators() {
        let tree = expr(ExprKind::Binary {
            op: BinOp::Add,
            lhs: Box::new(expr(ExprKind::Int(1))),
            rhs: Box::new(expr(ExprKind::Binary {
                op: BinOp::Mul,
                lhs: Box::new(expr(ExprKind::Int(2))),
                rhs: Box::new(expr(ExprKind::Int(3))),
            })),
        });
        assert_eq!(tree.to_string(), "(1 + (2 * 3))");
    }

    #[test]
    fn printer_renders_calls_and_indexing() {
        let tree = expr(ExprKind::Index {
            base: Box::new(expr(ExprKind::Var("a".into()))),
            index: Box::new(expr(ExprKind::Call {
                callee: "f".into(),
                args: vec![expr(ExprKind::Int(1)), expr(ExprKind::Bool(true))],
            })),
        });
        assert_eq!(tree.to_string(), "a[f(1, true)]");
    }

    #[test]
    fn printer_renders_let_forms() {
        let plain = Stmt::new(
            StmtKind::Let {
                name: "x".into(),
                annotation: Some(Ty::array(Ty::I64, 3)),
                init: expr(ExprKind::ArrayLit(vec![
                    expr(ExprKind::Int(1)),
                    expr(ExprKind::Int(2)),
                    expr(ExprKind::Int(3)),
                ])),
                unique: false,
            },
            Span::default(),
        );
        assert_eq!(plain.to_string(), "let x: i64[3] = [1, 2, 3];\n");

        let unique = Stmt::new(
            StmtKind::Let {
                name: "p".into(),
                annotation: None,
                init: expr(ExprKind::Call {
                    callee: "malloc".into(),
                    args: vec![expr(ExprKind::Int(8))],
                }),
                unique: true,
            },
            Span::default(),
        );
        assert_eq!(unique.to_string(), "let unique<i64> p = malloc(8);\n");
    }
}
