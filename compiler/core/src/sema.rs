//! Semantic analysis: name resolution, type checking, and the lowering of
//! `unique` bindings into deferred cleanup obligations.
//!
//! Two passes over the program. The signature pass registers every function
//! (builtins first) so bodies may reference functions defined later; the body
//! pass walks each function with a fresh scope stack.

use std::collections::HashMap;

use crate::ast::{BinOp, Expr, ExprKind, Function, Program, Stmt, StmtKind};
use crate::diagnostics::Diagnostic;
use crate::span::Span;
use crate::types::{Binding, ScopeStack, Ty};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SemaError {
    // Name errors.
    #[error("unknown variable: {name} at {span}")]
    UnknownVariable { name: String, span: Span },
    #[error("unknown function: {name} at {span}")]
    UnknownFunction { name: String, span: Span },
    #[error("redeclaration: {name} at {span}")]
    Redeclaration { name: String, span: Span },

    // Type errors.
    #[error("void value not allowed in {context} at {span}")]
    VoidValue { context: &'static str, span: Span },
    #[error("cannot assign a void value at {span}")]
    AssignVoid { span: Span },
    #[error("type mismatch in assignment: {lhs} vs {rhs} at {span}")]
    AssignMismatch { lhs: Ty, rhs: Ty, span: Span },
    #[error("type mismatch in let '{name}': {annotated} vs {inferred} at {span}")]
    LetMismatch {
        name: String,
        annotated: Ty,
        inferred: Ty,
        span: Span,
    },
    #[error("variable '{name}' cannot have type void at {span}")]
    VoidVariable { name: String, span: Span },
    #[error("parameter '{name}' cannot have type void at {span}")]
    VoidParameter { name: String, span: Span },
    #[error("wrong number of arguments to {callee}: expected {expected}, got {found} at {span}")]
    WrongArity {
        callee: String,
        expected: usize,
        found: usize,
        span: Span,
    },
    #[error("argument {index} type mismatch in {callee}: expected {expected}, got {found} at {span}")]
    ArgumentMismatch {
        callee: String,
        index: usize,
        expected: Ty,
        found: Ty,
        span: Span,
    },
    #[error("return type mismatch, expected {expected} got {found} at {span}")]
    ReturnMismatch { expected: Ty, found: Ty, span: Span },
    #[error("void function cannot return a value at {span}")]
    ReturnValueInVoid { span: Span },
    #[error("non-void function must return a value at {span}")]
    MissingReturnValue { span: Span },
    #[error("indexing requires array or pointer type, got: {found} at {span}")]
    IndexNonAggregate { found: Ty, span: Span },
    #[error("array index must be an integer, got: {found} at {span}")]
    NonIntegerIndex { found: Ty, span: Span },
    #[error("array literal has mixed types: {first} vs {other} at {span}")]
    MixedArrayLiteral { first: Ty, other: Ty, span: Span },

    // Structural errors.
    #[error("cannot infer type of empty array literal at {span}")]
    EmptyArrayLiteral { span: Span },
    #[error("break statement outside of loop at {span}")]
    BreakOutsideLoop { span: Span },
    #[error("continue statement outside of loop at {span}")]
    ContinueOutsideLoop { span: Span },
}

impl SemaError {
    pub fn span(&self) -> Span {
        match self {
            SemaError::UnknownVariable { span, .. }
            | SemaError::UnknownFunction { span, .. }
            | SemaError::Redeclaration { span, .. }
            | SemaError::VoidValue { span, .. }
            | SemaError::AssignVoid { span }
            | SemaError::AssignMismatch { span, .. }
            | SemaError::LetMismatch { span, .. }
            | SemaError::VoidVariable { span, .. }
            | SemaError::VoidParameter { span, .. }
            | SemaError::WrongArity { span, .. }
            | SemaError::ArgumentMismatch { span, .. }
            | SemaError::ReturnMismatch { span, .. }
            | SemaError::ReturnValueInVoid { span }
            | SemaError::MissingReturnValue { span }
            | SemaError::IndexNonAggregate { span, .. }
            | SemaError::NonIntegerIndex { span, .. }
            | SemaError::MixedArrayLiteral { span, .. }
            | SemaError::EmptyArrayLiteral { span }
            | SemaError::BreakOutsideLoop { span }
            | SemaError::ContinueOutsideLoop { span } => *span,
        }
    }

    pub fn into_diagnostic(self) -> Diagnostic {
        let span = self.span();
        Diagnostic::error(self.to_string()).with_label(span, "checked here")
    }
}

/// A function signature as seen by callers.
#[derive(Debug, Clone, PartialEq)]
pub struct FnSig {
    pub params: Vec<Ty>,
    pub ret: Ty,
}

/// The builtin functions linked from the runtime library. `malloc`/`free`
/// traffic in `ptr<i64>` uniformly; the type system has no pointer
/// polymorphism.
pub fn builtin_signatures() -> Vec<(&'static str, FnSig)> {
    vec![
        (
            "print_i64",
            FnSig {
                params: vec![Ty::I64],
                ret: Ty::I64,
            },
        ),
        (
            "read_i64",
            FnSig {
                params: vec![],
                ret: Ty::I64,
            },
        ),
        (
            "malloc",
            FnSig {
                params: vec![Ty::I64],
                ret: Ty::ptr(Ty::I64),
            },
        ),
        (
            "free",
            FnSig {
                params: vec![Ty::ptr(Ty::I64)],
                ret: Ty::Void,
            },
        ),
    ]
}

/// Collects the global function table: builtins, then every user-defined
/// function. Rejects `void`-typed parameters.
pub fn collect_signatures(program: &Program) -> Result<HashMap<String, FnSig>, SemaError> {
    let mut functions = HashMap::new();
    for (name, sig) in builtin_signatures() {
        functions.insert(name.to_string(), sig);
    }
    for function in &program.functions {
        let mut params = Vec::with_capacity(function.params.len());
        for param in &function.params {
            if param.ty.is_void() {
                return Err(SemaError::VoidParameter {
                    name: param.name.clone(),
                    span: param.span,
                });
            }
            params.push(param.ty.clone());
        }
        functions.insert(
            function.name.clone(),
            FnSig {
                params,
                ret: function.return_type.clone(),
            },
        );
    }
    Ok(functions)
}

/// Type-checks the whole program. On success the emitter may assume every
/// name resolves, every call matches its signature, and no `void` value is
/// ever stored or passed.
pub fn analyze(program: &Program) -> Result<(), SemaError> {
    let functions = collect_signatures(program)?;
    let mut analyzer = Analyzer {
        scope: ScopeStack::new(),
        functions,
        loop_depth: 0,
    };
    for function in &program.functions {
        analyzer.check_function(function)?;
    }
    Ok(())
}

struct Analyzer {
    scope: ScopeStack,
    functions: HashMap<String, FnSig>,
    loop_depth: usize,
}

impl Analyzer {
    fn check_function(&mut self, function: &Function) -> Result<(), SemaError> {
        self.scope.push_scope();
        for param in &function.params {
            self.scope.declare(
                param.name.clone(),
                Binding {
                    ty: param.ty.clone(),
                    is_unique: false,
                },
            );
        }
        let result = self.check_block(&function.body, &function.return_type);
        self.scope.pop_scope();
        result
    }

    fn check_block(&mut self, body: &[Stmt], return_type: &Ty) -> Result<(), SemaError> {
        for stmt in body {
            self.check_stmt(stmt, return_type)?;
        }
        Ok(())
    }

    fn check_stmt(&mut self, stmt: &Stmt, return_type: &Ty) -> Result<(), SemaError> {
        match &stmt.kind {
            StmtKind::Let {
                name,
                annotation,
                init,
                unique,
            } => {
                let init_ty = self.infer(init)?;
                let ty = match annotation {
                    Some(annotated) => {
                        if *annotated != init_ty {
                            return Err(SemaError::LetMismatch {
                                name: name.clone(),
                                annotated: annotated.clone(),
                                inferred: init_ty,
                                span: stmt.span,
                            });
                        }
                        annotated.clone()
                    }
                    None => init_ty,
                };
                if ty.is_void() {
                    return Err(SemaError::VoidVariable {
                        name: name.clone(),
                        span: stmt.span,
                    });
                }
                let declared = self.scope.declare(
                    name.clone(),
                    Binding {
                        ty,
                        is_unique: *unique,
                    },
                );
                if !declared {
                    return Err(SemaError::Redeclaration {
                        name: name.clone(),
                        span: stmt.span,
                    });
                }
                if *unique {
                    // The implicit cleanup is an ordinary `free(name)` call;
                    // checking it here surfaces `unique` misuse (a non
                    // `ptr<i64>` binding) as a plain argument type error.
                    let cleanup = synthesized_free(name, stmt.span);
                    self.infer(&cleanup)?;
                }
                Ok(())
            }
            StmtKind::Expr(expr) => {
                // A void result is fine in statement position.
                self.infer(expr)?;
                Ok(())
            }
            StmtKind::Return(value) => match (return_type.is_void(), value) {
                (true, Some(_)) => Err(SemaError::ReturnValueInVoid { span: stmt.span }),
                (true, None) => Ok(()),
                (false, None) => Err(SemaError::MissingReturnValue { span: stmt.span }),
                (false, Some(expr)) => {
                    let found = self.infer(expr)?;
                    if found != *return_type {
                        return Err(SemaError::ReturnMismatch {
                            expected: return_type.clone(),
                            found,
                            span: stmt.span,
                        });
                    }
                    Ok(())
                }
            },
            StmtKind::If {
                condition,
                then_body,
                else_body,
            } => {
                let cond_ty = self.infer(condition)?;
                if cond_ty.is_void() {
                    return Err(SemaError::VoidValue {
                        context: "if condition",
                        span: condition.span,
                    });
                }
                self.scope.push_scope();
                let then_result = self.check_block(then_body, return_type);
                self.scope.pop_scope();
                then_result?;
                self.scope.push_scope();
                let else_result = self.check_block(else_body, return_type);
                self.scope.pop_scope();
                else_result
            }
            StmtKind::While { condition, body } => {
                let cond_ty = self.infer(condition)?;
                if cond_ty.is_void() {
                    return Err(SemaError::VoidValue {
                        context: "while condition",
                        span: condition.span,
                    });
                }
                self.scope.push_scope();
                self.loop_depth += 1;
                let result = self.check_block(body, return_type);
                self.loop_depth -= 1;
                self.scope.pop_scope();
                result
            }
            StmtKind::Defer(expr) => {
                // Replayed at scope exit by the emitter; void results are
                // allowed, the value is discarded.
                self.infer(expr)?;
                Ok(())
            }
            StmtKind::Break => {
                if self.loop_depth == 0 {
                    return Err(SemaError::BreakOutsideLoop { span: stmt.span });
                }
                Ok(())
            }
            StmtKind::Continue => {
                if self.loop_depth == 0 {
                    return Err(SemaError::ContinueOutsideLoop { span: stmt.span });
                }
                Ok(())
            }
        }
    }

    fn infer(&mut self, expr: &Expr) -> Result<Ty, SemaError> {
        match &expr.kind {
            ExprKind::Int(_) => Ok(Ty::I64),
            ExprKind::Bool(_) => Ok(Ty::Bool),
            ExprKind::Var(name) => match self.scope.lookup(name) {
                Some(binding) => Ok(binding.ty.clone()),
                None => Err(SemaError::UnknownVariable {
                    name: name.clone(),
                    span: expr.span,
                }),
            },
            ExprKind::Unary { operand, .. } => {
                let ty = self.infer(operand)?;
                if ty.is_void() {
                    return Err(SemaError::VoidValue {
                        context: "unary operator",
                        span: operand.span,
                    });
                }
                Ok(ty)
            }
            ExprKind::Binary { op, lhs, rhs } => self.infer_binary(*op, lhs, rhs, expr.span),
            ExprKind::Call { callee, args } => self.infer_call(callee, args, expr.span),
            ExprKind::ArrayLit(elements) => {
                let Some(first) = elements.first() else {
                    return Err(SemaError::EmptyArrayLiteral { span: expr.span });
                };
                let elem_ty = self.infer(first)?;
                if elem_ty.is_void() {
                    return Err(SemaError::VoidValue {
                        context: "array literal",
                        span: first.span,
                    });
                }
                for element in &elements[1..] {
                    let other = self.infer(element)?;
                    if other != elem_ty {
                        return Err(SemaError::MixedArrayLiteral {
                            first: elem_ty,
                            other,
                            span: element.span,
                        });
                    }
                }
                Ok(Ty::array(elem_ty, elements.len() as i64))
            }
            ExprKind::Index { base, index } => {
                let base_ty = self.infer(base)?;
                let elem_ty = match &base_ty {
                    Ty::Array { elem, .. } | Ty::Ptr(elem) => elem.as_ref().clone(),
                    _ => {
                        return Err(SemaError::IndexNonAggregate {
                            found: base_ty,
                            span: base.span,
                        })
                    }
                };
                let index_ty = self.infer(index)?;
                if !index_ty.is_integer() {
                    return Err(SemaError::NonIntegerIndex {
                        found: index_ty,
                        span: index.span,
                    });
                }
                Ok(elem_ty)
            }
        }
    }

    fn infer_binary(
        &mut self,
        op: BinOp,
        lhs: &Expr,
        rhs: &Expr,
        span: Span,
    ) -> Result<Ty, SemaError> {
        if op == BinOp::Assign {
            let lhs_ty = self.infer(lhs)?;
            let rhs_ty = self.infer(rhs)?;
            if rhs_ty.is_void() {
                return Err(SemaError::AssignVoid { span });
            }
            if lhs_ty != rhs_ty {
                return Err(SemaError::AssignMismatch {
                    lhs: lhs_ty,
                    rhs: rhs_ty,
                    span,
                });
            }
            return Ok(lhs_ty);
        }

        let context = if op.is_arithmetic() {
            "arithmetic operator"
        } else if op.is_comparison() {
            "comparison"
        } else {
            "logical operator"
        };
        let lhs_ty = self.infer(lhs)?;
        if lhs_ty.is_void() {
            return Err(SemaError::VoidValue {
                context,
                span: lhs.span,
            });
        }
        let rhs_ty = self.infer(rhs)?;
        if rhs_ty.is_void() {
            return Err(SemaError::VoidValue {
                context,
                span: rhs.span,
            });
        }

        if op.is_arithmetic() {
            Ok(Ty::I64)
        } else {
            Ok(Ty::Bool)
        }
    }

    fn infer_call(&mut self, callee: &str, args: &[Expr], span: Span) -> Result<Ty, SemaError> {
        let sig = match self.functions.get(callee) {
            Some(sig) => sig.clone(),
            None => {
                return Err(SemaError::UnknownFunction {
                    name: callee.to_string(),
                    span,
                })
            }
        };
        if args.len() != sig.params.len() {
            return Err(SemaError::WrongArity {
                callee: callee.to_string(),
                expected: sig.params.len(),
                found: args.len(),
                span,
            });
        }
        for (index, (arg, expected)) in args.iter().zip(&sig.params).enumerate() {
            let found = self.infer(arg)?;
            if found.is_void() {
                return Err(SemaError::VoidValue {
                    context: "call argument",
                    span: arg.span,
                });
            }
            if found != *expected {
                return Err(SemaError::ArgumentMismatch {
                    callee: callee.to_string(),
                    index: index + 1,
                    expected: expected.clone(),
                    found,
                    span: arg.span,
                });
            }
        }
        Ok(sig.ret)
    }
}

/// The implicit cleanup call a `unique` binding stands for.
pub fn synthesized_free(name: &str, span: Span) -> Expr {
    Expr::new(
        ExprKind::Call {
            callee: "free".to_string(),
            args: vec![Expr::new(ExprKind::Var(name.to_string()), span)],
        },
        span,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer;
    use crate::parser;

    fn check(source: &str) -> Result<(), SemaError> {
        let tokens = lexer::tokenize(source).expect("lex");
        let program = parser::parse_program(tokens).expect("parse");
        analyze(&program)
    }

    #[test]
    fn accepts_well_typed_program() {
        check(
            "fn factorial(n: i64) -> i64 {\n\
             let r: i64 = 1;\n\
             while (n > 1) { r = r * n; n = n - 1; }\n\
             return r;\n\
             }\n\
             fn main() -> i64 { let x = factorial(5); print_i64(x); return 0; }",
        )
        .expect("analysis");
    }

    #[test]
    fn infers_literal_and_array_types() {
        check(
            "fn main() -> i64 {\n\
             let flag = true;\n\
             let a: i64[3] = [1, 2, 3];\n\
             let first = a[0];\n\
             if (flag) { return first; }\n\
             return 0;\n\
             }",
        )
        .expect("analysis");
    }

    #[test]
    fn rejects_unknown_variable() {
        let err = check("fn main() -> i64 { return y; }").unwrap_err();
        assert!(matches!(err, SemaError::UnknownVariable { name, .. } if name == "y"));
    }

    #[test]
    fn rejects_unknown_function() {
        let err = check("fn main() -> i64 { return g(); }").unwrap_err();
        assert!(matches!(err, SemaError::UnknownFunction { name, .. } if name == "g"));
    }

    #[test]
    fn allows_forward_reference() {
        check("fn main() -> i64 { return later(); }\nfn later() -> i64 { return 1; }")
            .expect("analysis");
    }

    #[test]
    fn rejects_annotated_let_mismatch() {
        let err = check("fn main() -> i64 { let x: bool = 1; return 0; }").unwrap_err();
        assert!(err.to_string().contains("type mismatch"));
        assert!(matches!(err, SemaError::LetMismatch { .. }));
    }

    #[test]
    fn rejects_redeclaration_in_same_frame_but_allows_shadowing() {
        let err = check("fn main() -> i64 { let x = 1; let x = 2; return x; }").unwrap_err();
        assert!(matches!(err, SemaError::Redeclaration { .. }));

        check("fn main() -> i64 { let x = 1; if (true) { let x = false; } return x; }")
            .expect("shadowing in an inner frame is allowed");
    }

    #[test]
    fn rejects_assignment_type_mismatch() {
        let err = check("fn main() -> i64 { let x = 1; x = true; return x; }").unwrap_err();
        assert!(matches!(err, SemaError::AssignMismatch { .. }));
    }

    #[test]
    fn rejects_void_misuse() {
        let err = check("fn main() -> i64 { let x = free(malloc(8)); return 0; }").unwrap_err();
        assert!(matches!(err, SemaError::VoidVariable { .. }));

        let err = check("fn v() -> void { return; }\nfn main() -> i64 { return 1 + v(); }")
            .unwrap_err();
        assert!(matches!(err, SemaError::VoidValue { .. }));

        let err = check("fn f(x: void) -> i64 { return 0; }").unwrap_err();
        assert!(matches!(err, SemaError::VoidParameter { .. }));
    }

    #[test]
    fn checks_call_arity_and_argument_types() {
        let err = check("fn main() -> i64 { return print_i64(); }").unwrap_err();
        assert!(matches!(err, SemaError::WrongArity { .. }));

        let err = check("fn main() -> i64 { return print_i64(true); }").unwrap_err();
        assert!(matches!(err, SemaError::ArgumentMismatch { .. }));
    }

    #[test]
    fn checks_return_types() {
        let err = check("fn main() -> i64 { return true; }").unwrap_err();
        assert!(matches!(err, SemaError::ReturnMismatch { .. }));

        let err = check("fn v() -> void { return 1; }").unwrap_err();
        assert!(matches!(err, SemaError::ReturnValueInVoid { .. }));

        let err = check("fn main() -> i64 { return; }").unwrap_err();
        assert!(matches!(err, SemaError::MissingReturnValue { .. }));
    }

    #[test]
    fn rejects_empty_and_mixed_array_literals() {
        let err = check("fn main() -> i64 { let a = []; return 0; }").unwrap_err();
        assert!(matches!(err, SemaError::EmptyArrayLiteral { .. }));

        let err = check("fn main() -> i64 { let a = [1, true]; return 0; }").unwrap_err();
        assert!(matches!(err, SemaError::MixedArrayLiteral { .. }));
    }

    #[test]
    fn checks_indexing() {
        let err = check("fn main() -> i64 { let x = 1; return x[0]; }").unwrap_err();
        assert!(matches!(err, SemaError::IndexNonAggregate { .. }));

        let err =
            check("fn main() -> i64 { let a = [1, 2]; return a[true]; }").unwrap_err();
        assert!(matches!(err, SemaError::NonIntegerIndex { .. }));

        check("fn main() -> i64 { let p = malloc(16); return p[1]; }").expect("pointer indexing");
    }

    #[test]
    fn rejects_break_and_continue_outside_loops() {
        let err = check("fn main() -> i64 { break; return 0; }").unwrap_err();
        assert_eq!(
            err.to_string().split(" at ").next().unwrap(),
            "break statement outside of loop"
        );

        let err = check("fn main() -> i64 { continue; return 0; }").unwrap_err();
        assert!(matches!(err, SemaError::ContinueOutsideLoop { .. }));

        check("fn main() -> i64 { while (true) { if (true) { break; } continue; } return 0; }")
            .expect("break/continue inside loop bodies");
    }

    #[test]
    fn unique_binding_requires_freeable_pointer() {
        check("fn main() -> i64 { let unique<i64> p = malloc(8); return 0; }")
            .expect("unique pointer binding");

        // The synthesized free(q) call fails the argument check.
        let err = check("fn main() -> i64 { let unique<i64> q = 5; return 0; }").unwrap_err();
        assert!(
            matches!(err, SemaError::ArgumentMismatch { ref callee, .. } if callee == "free")
        );
    }
}
