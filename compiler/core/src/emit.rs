//! Code emission: checked AST → typed SSA module.
//!
//! The emitter rebuilds its own view of the symbol information (a map of
//! name → stack slot plus stored type, and the function signature table);
//! nothing is shared with the analyzer's transient scope stack. Locals live
//! in stack slots allocated in the entry block. References to scalars load
//! from their slot; references to array-typed names yield the slot pointer,
//! which is the only safe handle on an aggregate under opaque pointers.

use std::collections::HashMap;

use crate::ast::{BinOp, Expr, ExprKind, Function, Program, Stmt, StmtKind, UnaryOp};
use crate::diagnostics::Diagnostic;
use crate::ir::{self, BlockId, InstKind, IrType, Terminator, Value, ENTRY_BLOCK};
use crate::sema::{self, FnSig};
use crate::types::Ty;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EmitError {
    #[error("unknown variable in codegen: {name}")]
    UnknownVariable { name: String },
    #[error("unknown callee in codegen: {name}")]
    UnknownCallee { name: String },
    #[error("break statement outside of loop reached codegen")]
    BreakOutsideLoop,
    #[error("continue statement outside of loop reached codegen")]
    ContinueOutsideLoop,
    #[error("assignment target must be a variable or an indexed element")]
    UnsupportedAssignTarget,
    #[error("{context} escaped the checker")]
    Unchecked { context: &'static str },
    #[error("invalid function IR: {0}")]
    InvalidIr(#[from] ir::VerifyError),
}

impl EmitError {
    pub fn into_diagnostic(self) -> Diagnostic {
        Diagnostic::error(self.to_string())
            .with_note("this is a compiler bug; the checker accepted the offending input")
    }
}

/// Lowers the IR type of a source type. Pointers become opaque; the pointee
/// travels alongside in the emitter's environment instead.
pub fn ir_type_of(ty: &Ty) -> IrType {
    match ty {
        Ty::I32 => IrType::I32,
        Ty::I64 => IrType::I64,
        Ty::Bool => IrType::I1,
        Ty::Void => IrType::Void,
        Ty::Ptr(_) => IrType::Ptr,
        Ty::Array { elem, len } => IrType::array(ir_type_of(elem), (*len).max(0) as u64),
    }
}

/// Emits the whole program: builtin declarations first, then one definition
/// per function, each verified structurally before it is accepted.
pub fn emit_program(program: &Program) -> Result<ir::Module, EmitError> {
    let mut module = ir::Module::new("aurora_module");

    let mut signatures: HashMap<String, FnSig> = HashMap::new();
    for (name, sig) in sema::builtin_signatures() {
        module.declare(
            name,
            sig.params.iter().map(ir_type_of).collect(),
            ir_type_of(&sig.ret),
        );
        signatures.insert(name.to_string(), sig);
    }
    for function in &program.functions {
        signatures.insert(
            function.name.clone(),
            FnSig {
                params: function.params.iter().map(|p| p.ty.clone()).collect(),
                ret: function.return_type.clone(),
            },
        );
    }

    for function in &program.functions {
        let emitted = FunctionEmitter::emit(function, &signatures)?;
        emitted.verify()?;
        module.functions.push(emitted);
    }
    Ok(module)
}

/// A local variable as the emitter sees it: the slot pointer plus the stored
/// source type. Both halves are required under opaque pointers; the pointer
/// alone cannot tell a scalar slot from an aggregate one.
#[derive(Debug, Clone)]
struct Slot {
    ptr: Value,
    ty: Ty,
}

struct FunctionEmitter<'a> {
    signatures: &'a HashMap<String, FnSig>,
    function: ir::Function,
    current: BlockId,
    env: Vec<HashMap<String, Slot>>,
    /// Cleanup expressions per lexical scope, in declaration order; replayed
    /// in reverse before every terminator that leaves the scope.
    defer_scopes: Vec<Vec<Expr>>,
    loop_exits: Vec<BlockId>,
    loop_continues: Vec<BlockId>,
    /// Defer-scope depth at loop entry, so break/continue know how many
    /// scopes they are leaving.
    loop_scope_bases: Vec<usize>,
    /// False while emitting statements that follow a `return`/`break`/
    /// `continue`; cleanup replay is suppressed on such dead paths so a
    /// unique binding frees exactly once per live exit path.
    reachable: bool,
    return_type: Ty,
}

/// An emitted expression: its SSA value (absent for void calls) and source
/// type.
struct Emitted {
    value: Option<Value>,
    ty: Ty,
}

impl<'a> FunctionEmitter<'a> {
    fn emit(
        source: &Function,
        signatures: &'a HashMap<String, FnSig>,
    ) -> Result<ir::Function, EmitError> {
        let params = source
            .params
            .iter()
            .map(|param| (param.name.clone(), ir_type_of(&param.ty)))
            .collect();
        let function = ir::Function::new(&source.name, params, ir_type_of(&source.return_type));

        let mut emitter = FunctionEmitter {
            signatures,
            function,
            current: ENTRY_BLOCK,
            env: Vec::new(),
            defer_scopes: Vec::new(),
            loop_exits: Vec::new(),
            loop_continues: Vec::new(),
            loop_scope_bases: Vec::new(),
            reachable: true,
            return_type: source.return_type.clone(),
        };

        emitter.push_scope();
        for (index, param) in source.params.iter().enumerate() {
            let slot = emitter.alloca_in_entry(ir_type_of(&param.ty));
            let incoming = emitter.function.param_value(index);
            emitter.push_inst(InstKind::Store {
                ty: ir_type_of(&param.ty),
                value: incoming,
                ptr: slot.clone(),
                align: None,
            });
            emitter.bind(&param.name, slot, param.ty.clone());
        }

        emitter.emit_block(&source.body)?;

        if !emitter.function.is_terminated(emitter.current) {
            if emitter.reachable {
                emitter.replay_defers_from(0)?;
            }
            emitter.emit_implicit_return();
        }
        emitter.pop_scope();

        Ok(emitter.function)
    }

    // Scope and environment plumbing.

    fn push_scope(&mut self) {
        self.env.push(HashMap::new());
        self.defer_scopes.push(Vec::new());
    }

    fn pop_scope(&mut self) {
        self.env.pop();
        self.defer_scopes.pop();
    }

    fn bind(&mut self, name: &str, ptr: Value, ty: Ty) {
        self.env
            .last_mut()
            .expect("a scope is always open during emission")
            .insert(name.to_string(), Slot { ptr, ty });
    }

    fn lookup(&self, name: &str) -> Result<Slot, EmitError> {
        for frame in self.env.iter().rev() {
            if let Some(slot) = frame.get(name) {
                return Ok(slot.clone());
            }
        }
        Err(EmitError::UnknownVariable {
            name: name.to_string(),
        })
    }

    fn record_cleanup(&mut self, expr: Expr) {
        self.defer_scopes
            .last_mut()
            .expect("a scope is always open during emission")
            .push(expr);
    }

    /// Replays the cleanup actions of the innermost scope, LIFO. Used when a
    /// block falls off its end into the surrounding control flow.
    fn replay_innermost_defers(&mut self) -> Result<(), EmitError> {
        self.replay_defers_from(self.defer_scopes.len().saturating_sub(1))
    }

    /// Replays cleanups of every scope at depth >= `base`, innermost scope
    /// first, each scope's actions in reverse declaration order. The scopes
    /// stay recorded: other exit paths replay their own copies.
    fn replay_defers_from(&mut self, base: usize) -> Result<(), EmitError> {
        let pending: Vec<Expr> = self.defer_scopes[base..]
            .iter()
            .rev()
            .flat_map(|scope| scope.iter().rev().cloned())
            .collect();
        for expr in pending {
            self.emit_expr(&expr)?;
        }
        Ok(())
    }

    // Block plumbing.

    fn push_inst(&mut self, kind: InstKind) -> Option<Value> {
        self.function.push(self.current, kind)
    }

    fn alloca_in_entry(&mut self, ty: IrType) -> Value {
        self.function
            .push(ENTRY_BLOCK, InstKind::Alloca { ty })
            .expect("alloca defines a value")
    }

    fn switch_to(&mut self, block: BlockId) {
        self.current = block;
    }

    fn terminate(&mut self, terminator: Terminator) {
        self.function.terminate(self.current, terminator);
    }

    fn is_terminated(&self) -> bool {
        self.function.is_terminated(self.current)
    }

    // Statement lowering.

    fn emit_block(&mut self, stmts: &[Stmt]) -> Result<(), EmitError> {
        for stmt in stmts {
            self.emit_stmt(stmt)?;
        }
        Ok(())
    }

    fn emit_stmt(&mut self, stmt: &Stmt) -> Result<(), EmitError> {
        match &stmt.kind {
            StmtKind::Let {
                name,
                annotation,
                init,
                unique,
            } => {
                if let ExprKind::ArrayLit(elements) = &init.kind {
                    let ty = match annotation {
                        Some(ty) => ty.clone(),
                        None => self.array_literal_type(elements)?,
                    };
                    let slot = self.alloca_in_entry(ir_type_of(&ty));
                    self.store_array_literal(&ty, &slot, elements)?;
                    self.bind(name, slot, ty);
                } else {
                    let (value, value_ty) = self.emit_value(init)?;
                    let ty = annotation.clone().unwrap_or(value_ty);
                    let slot = self.alloca_in_entry(ir_type_of(&ty));
                    self.push_inst(InstKind::Store {
                        ty: ir_type_of(&ty),
                        value,
                        ptr: slot.clone(),
                        align: None,
                    });
                    self.bind(name, slot, ty);
                }
                if *unique {
                    self.record_cleanup(sema::synthesized_free(name, stmt.span));
                }
                Ok(())
            }
            StmtKind::Expr(expr) => {
                self.emit_expr(expr)?;
                Ok(())
            }
            StmtKind::Return(value) => {
                let emitted = match value {
                    Some(expr) => Some(self.emit_value(expr)?.0),
                    None => None,
                };
                // The return value is computed before the cleanups run, so a
                // freed pointer can still be read on the way out.
                if self.reachable {
                    self.replay_defers_from(0)?;
                }
                let ret_ty = ir_type_of(&self.return_type);
                self.terminate(Terminator::Ret {
                    ty: ret_ty,
                    value: emitted,
                });
                let resume = self.function.add_block("after.ret");
                self.switch_to(resume);
                self.reachable = false;
                Ok(())
            }
            StmtKind::If {
                condition,
                then_body,
                else_body,
            } => {
                let entry_reachable = self.reachable;
                let cond = self.emit_condition(condition)?;
                let then_block = self.function.add_block("then");
                let else_block = self.function.add_block("else");
                let merge_block = self.function.add_block("ifend");
                self.terminate(Terminator::CondBr {
                    cond,
                    then_target: then_block,
                    else_target: else_block,
                });

                self.switch_to(then_block);
                self.reachable = entry_reachable;
                self.push_scope();
                let result = self.emit_block(then_body);
                if result.is_ok() && !self.is_terminated() && self.reachable {
                    self.replay_innermost_defers()?;
                }
                self.pop_scope();
                result?;
                self.terminate(Terminator::Br {
                    target: merge_block,
                });

                self.switch_to(else_block);
                self.reachable = entry_reachable;
                self.push_scope();
                let result = self.emit_block(else_body);
                if result.is_ok() && !self.is_terminated() && self.reachable {
                    self.replay_innermost_defers()?;
                }
                self.pop_scope();
                result?;
                self.terminate(Terminator::Br {
                    target: merge_block,
                });

                self.switch_to(merge_block);
                self.reachable = entry_reachable;
                Ok(())
            }
            StmtKind::While { condition, body } => {
                let entry_reachable = self.reachable;
                let cond_block = self.function.add_block("while.cond");
                let body_block = self.function.add_block("while.body");
                let end_block = self.function.add_block("while.end");

                self.terminate(Terminator::Br { target: cond_block });
                self.switch_to(cond_block);
                self.reachable = entry_reachable;
                let cond = self.emit_condition(condition)?;
                self.terminate(Terminator::CondBr {
                    cond,
                    then_target: body_block,
                    else_target: end_block,
                });

                self.loop_exits.push(end_block);
                self.loop_continues.push(cond_block);
                self.loop_scope_bases.push(self.defer_scopes.len());

                self.switch_to(body_block);
                self.reachable = entry_reachable;
                self.push_scope();
                let result = self.emit_block(body);
                if result.is_ok() && !self.is_terminated() && self.reachable {
                    self.replay_innermost_defers()?;
                }
                self.pop_scope();

                self.loop_exits.pop();
                self.loop_continues.pop();
                self.loop_scope_bases.pop();
                result?;

                self.terminate(Terminator::Br { target: cond_block });
                self.switch_to(end_block);
                self.reachable = entry_reachable;
                Ok(())
            }
            StmtKind::Defer(expr) => {
                self.record_cleanup(expr.clone());
                Ok(())
            }
            StmtKind::Break => {
                let target = *self.loop_exits.last().ok_or(EmitError::BreakOutsideLoop)?;
                let base = *self
                    .loop_scope_bases
                    .last()
                    .ok_or(EmitError::BreakOutsideLoop)?;
                if self.reachable {
                    self.replay_defers_from(base)?;
                }
                self.terminate(Terminator::Br { target });
                let resume = self.function.add_block("after.break");
                self.switch_to(resume);
                self.reachable = false;
                Ok(())
            }
            StmtKind::Continue => {
                let target = *self
                    .loop_continues
                    .last()
                    .ok_or(EmitError::ContinueOutsideLoop)?;
                let base = *self
                    .loop_scope_bases
                    .last()
                    .ok_or(EmitError::ContinueOutsideLoop)?;
                if self.reachable {
                    self.replay_defers_from(base)?;
                }
                self.terminate(Terminator::Br { target });
                let resume = self.function.add_block("after.continue");
                self.switch_to(resume);
                self.reachable = false;
                Ok(())
            }
        }
    }

    fn emit_implicit_return(&mut self) {
        let terminator = match self.return_type {
            Ty::I64 => Terminator::Ret {
                ty: IrType::I64,
                value: Some(Value::const_int(IrType::I64, 0)),
            },
            Ty::I32 => Terminator::Ret {
                ty: IrType::I32,
                value: Some(Value::const_int(IrType::I32, 0)),
            },
            Ty::Bool => Terminator::Ret {
                ty: IrType::I1,
                value: Some(Value::const_int(IrType::I1, 0)),
            },
            _ => Terminator::Ret {
                ty: IrType::Void,
                value: None,
            },
        };
        self.terminate(terminator);
    }

    // Expression lowering.

    fn emit_expr(&mut self, expr: &Expr) -> Result<Emitted, EmitError> {
        match &expr.kind {
            ExprKind::Int(value) => Ok(Emitted {
                value: Some(Value::const_int(IrType::I64, *value)),
                ty: Ty::I64,
            }),
            ExprKind::Bool(value) => Ok(Emitted {
                value: Some(Value::const_int(IrType::I1, i64::from(*value))),
                ty: Ty::Bool,
            }),
            ExprKind::Var(name) => {
                let slot = self.lookup(name)?;
                if matches!(slot.ty, Ty::Array { .. }) {
                    // Aggregates are addresses: hand out the slot pointer.
                    Ok(Emitted {
                        value: Some(slot.ptr),
                        ty: slot.ty,
                    })
                } else {
                    let value = self.push_inst(InstKind::Load {
                        ty: ir_type_of(&slot.ty),
                        ptr: slot.ptr,
                        align: None,
                    });
                    Ok(Emitted {
                        value,
                        ty: slot.ty,
                    })
                }
            }
            ExprKind::Unary { op, operand } => {
                let (value, ty) = self.emit_value(operand)?;
                let ir_ty = ir_type_of(&ty);
                let result = match op {
                    UnaryOp::Neg => self.push_inst(InstKind::Bin {
                        op: ir::BinOp::Sub,
                        ty: ir_ty.clone(),
                        lhs: Value::const_int(ir_ty, 0),
                        rhs: value,
                    }),
                    UnaryOp::Not => self.push_inst(InstKind::Bin {
                        op: ir::BinOp::Xor,
                        ty: ir_ty.clone(),
                        lhs: value,
                        rhs: Value::const_int(ir_ty, -1),
                    }),
                };
                Ok(Emitted { value: result, ty })
            }
            ExprKind::Binary { op, lhs, rhs } => self.emit_binary(*op, lhs, rhs),
            ExprKind::Call { callee, args } => self.emit_call(callee, args),
            ExprKind::ArrayLit(elements) => {
                let ty = self.array_literal_type(elements)?;
                let slot = self.alloca_in_entry(ir_type_of(&ty));
                self.store_array_literal(&ty, &slot, elements)?;
                Ok(Emitted {
                    value: Some(slot),
                    ty,
                })
            }
            ExprKind::Index { base, index } => {
                let (addr, elem_ty) = self.element_address(base, index)?;
                let value = self.push_inst(InstKind::Load {
                    ty: ir_type_of(&elem_ty),
                    ptr: addr,
                    align: Some(8),
                });
                Ok(Emitted {
                    value,
                    ty: elem_ty,
                })
            }
        }
    }

    /// Emits an expression that must produce a value; void escapes the
    /// checker only through a compiler bug.
    fn emit_value(&mut self, expr: &Expr) -> Result<(Value, Ty), EmitError> {
        let emitted = self.emit_expr(expr)?;
        match emitted.value {
            Some(value) => Ok((value, emitted.ty)),
            None => Err(EmitError::Unchecked {
                context: "a void value used as an operand",
            }),
        }
    }

    /// Emits a condition and normalizes it to `i1`: boolean values pass
    /// through, anything else compares `!= 0` at its own width.
    fn emit_condition(&mut self, condition: &Expr) -> Result<Value, EmitError> {
        let (value, ty) = self.emit_value(condition)?;
        if ty == Ty::Bool {
            return Ok(value);
        }
        let ir_ty = self.function.value_type(&value);
        let normalized = self.push_inst(InstKind::Icmp {
            cond: ir::IcmpCond::Ne,
            ty: ir_ty.clone(),
            lhs: value,
            rhs: Value::const_int(ir_ty, 0),
        });
        normalized.ok_or(EmitError::Unchecked {
            context: "a condition without a value",
        })
    }

    fn emit_binary(&mut self, op: BinOp, lhs: &Expr, rhs: &Expr) -> Result<Emitted, EmitError> {
        if op == BinOp::Assign {
            return self.emit_assignment(lhs, rhs);
        }

        let (lhs_value, lhs_ty) = self.emit_value(lhs)?;
        let (rhs_value, _) = self.emit_value(rhs)?;

        if op.is_arithmetic() {
            let ir_op = match op {
                BinOp::Add => ir::BinOp::Add,
                BinOp::Sub => ir::BinOp::Sub,
                BinOp::Mul => ir::BinOp::Mul,
                BinOp::Div => ir::BinOp::Sdiv,
                _ => ir::BinOp::Srem,
            };
            let value = self.push_inst(InstKind::Bin {
                op: ir_op,
                ty: IrType::I64,
                lhs: lhs_value,
                rhs: rhs_value,
            });
            return Ok(Emitted {
                value,
                ty: Ty::I64,
            });
        }

        if op.is_comparison() {
            let cond = match op {
                BinOp::Eq => ir::IcmpCond::Eq,
                BinOp::NotEq => ir::IcmpCond::Ne,
                BinOp::Lt => ir::IcmpCond::Slt,
                BinOp::Le => ir::IcmpCond::Sle,
                BinOp::Gt => ir::IcmpCond::Sgt,
                _ => ir::IcmpCond::Sge,
            };
            let value = self.push_inst(InstKind::Icmp {
                cond,
                ty: ir_type_of(&lhs_ty),
                lhs: lhs_value,
                rhs: rhs_value,
            });
            return Ok(Emitted {
                value,
                ty: Ty::Bool,
            });
        }

        // Logical and/or: the checker guarantees boolean operands, so the
        // eager bitwise form preserves values exactly.
        let ir_op = if op == BinOp::And {
            ir::BinOp::And
        } else {
            ir::BinOp::Or
        };
        let value = self.push_inst(InstKind::Bin {
            op: ir_op,
            ty: IrType::I1,
            lhs: lhs_value,
            rhs: rhs_value,
        });
        Ok(Emitted {
            value,
            ty: Ty::Bool,
        })
    }

    fn emit_assignment(&mut self, lhs: &Expr, rhs: &Expr) -> Result<Emitted, EmitError> {
        match &lhs.kind {
            ExprKind::Var(name) => {
                let (value, _) = self.emit_value(rhs)?;
                let slot = self.lookup(name)?;
                self.push_inst(InstKind::Store {
                    ty: ir_type_of(&slot.ty),
                    value: value.clone(),
                    ptr: slot.ptr,
                    align: None,
                });
                Ok(Emitted {
                    value: Some(value),
                    ty: slot.ty,
                })
            }
            ExprKind::Index { base, index } => {
                let (addr, elem_ty) = self.element_address(base, index)?;
                let (value, _) = self.emit_value(rhs)?;
                self.push_inst(InstKind::Store {
                    ty: ir_type_of(&elem_ty),
                    value: value.clone(),
                    ptr: addr,
                    align: Some(8),
                });
                Ok(Emitted {
                    value: Some(value),
                    ty: elem_ty,
                })
            }
            _ => Err(EmitError::UnsupportedAssignTarget),
        }
    }

    fn emit_call(&mut self, callee: &str, args: &[Expr]) -> Result<Emitted, EmitError> {
        let sig = self
            .signatures
            .get(callee)
            .cloned()
            .ok_or_else(|| EmitError::UnknownCallee {
                name: callee.to_string(),
            })?;
        let mut lowered = Vec::with_capacity(args.len());
        for arg in args {
            let (value, ty) = self.emit_value(arg)?;
            lowered.push((ir_type_of(&ty), value));
        }
        let value = self.push_inst(InstKind::Call {
            callee: callee.to_string(),
            ret: ir_type_of(&sig.ret),
            args: lowered,
        });
        Ok(Emitted {
            value,
            ty: sig.ret,
        })
    }

    /// Computes the address of `base[index]`. Array-typed bases are slot
    /// pointers and take the two-index `[0, i]` form with the array type;
    /// pointer-typed bases are loaded pointer values and take the one-index
    /// form with the element type. Indices are 32-bit; 64-bit index values
    /// are truncated.
    fn element_address(&mut self, base: &Expr, index: &Expr) -> Result<(Value, Ty), EmitError> {
        let (base_value, base_ty) = self.emit_value(base)?;
        let (index_value, index_ty) = self.emit_value(index)?;
        let index32 = if index_ty == Ty::I32 {
            index_value
        } else {
            self.push_inst(InstKind::Trunc {
                value: index_value,
                from: IrType::I64,
                to: IrType::I32,
            })
            .ok_or(EmitError::Unchecked {
                context: "an index without a value",
            })?
        };

        match base_ty {
            Ty::Array { ref elem, .. } => {
                let addr = self.push_inst(InstKind::Gep {
                    base_ty: ir_type_of(&base_ty),
                    ptr: base_value,
                    indices: vec![Value::const_int(IrType::I32, 0), index32],
                });
                let addr = addr.ok_or(EmitError::Unchecked {
                    context: "an address without a value",
                })?;
                Ok((addr, elem.as_ref().clone()))
            }
            Ty::Ptr(elem) => {
                let addr = self.push_inst(InstKind::Gep {
                    base_ty: ir_type_of(&elem),
                    ptr: base_value,
                    indices: vec![index32],
                });
                let addr = addr.ok_or(EmitError::Unchecked {
                    context: "an address without a value",
                })?;
                Ok((addr, *elem))
            }
            _ => Err(EmitError::Unchecked {
                context: "indexing into a non-aggregate",
            }),
        }
    }

    fn array_literal_type(&mut self, elements: &[Expr]) -> Result<Ty, EmitError> {
        let first = elements.first().ok_or(EmitError::Unchecked {
            context: "an empty array literal",
        })?;
        let elem_ty = self.type_of(first)?;
        Ok(Ty::array(elem_ty, elements.len() as i64))
    }

    /// Initializes an array slot element by element through two-index GEPs.
    fn store_array_literal(
        &mut self,
        array_ty: &Ty,
        slot: &Value,
        elements: &[Expr],
    ) -> Result<(), EmitError> {
        let elem_ty = array_ty
            .element()
            .cloned()
            .ok_or(EmitError::Unchecked {
                context: "an array binding without an array type",
            })?;
        for (index, element) in elements.iter().enumerate() {
            let (value, _) = self.emit_value(element)?;
            let addr = self
                .push_inst(InstKind::Gep {
                    base_ty: ir_type_of(array_ty),
                    ptr: slot.clone(),
                    indices: vec![
                        Value::const_int(IrType::I32, 0),
                        Value::const_int(IrType::I32, index as i64),
                    ],
                })
                .ok_or(EmitError::Unchecked {
                    context: "an address without a value",
                })?;
            self.push_inst(InstKind::Store {
                ty: ir_type_of(&elem_ty),
                value,
                ptr: addr,
                align: Some(8),
            });
        }
        Ok(())
    }

    /// Source-level type of an already-checked expression, against the
    /// emitter's own environment. Only the cases that can appear after a
    /// successful analysis need answers.
    fn type_of(&self, expr: &Expr) -> Result<Ty, EmitError> {
        match &expr.kind {
            ExprKind::Int(_) => Ok(Ty::I64),
            ExprKind::Bool(_) => Ok(Ty::Bool),
            ExprKind::Var(name) => Ok(self.lookup(name)?.ty),
            ExprKind::Unary { operand, .. } => self.type_of(operand),
            ExprKind::Binary { op, lhs, .. } => {
                if op.is_arithmetic() {
                    Ok(Ty::I64)
                } else if *op == BinOp::Assign {
                    self.type_of(lhs)
                } else {
                    Ok(Ty::Bool)
                }
            }
            ExprKind::Call { callee, .. } => self
                .signatures
                .get(callee)
                .map(|sig| sig.ret.clone())
                .ok_or_else(|| EmitError::UnknownCallee {
                    name: callee.clone(),
                }),
            ExprKind::ArrayLit(elements) => {
                let first = elements.first().ok_or(EmitError::Unchecked {
                    context: "an empty array literal",
                })?;
                Ok(Ty::array(self.type_of(first)?, elements.len() as i64))
            }
            ExprKind::Index { base, .. } => {
                let base_ty = self.type_of(base)?;
                base_ty.element().cloned().ok_or(EmitError::Unchecked {
                    context: "indexing into a non-aggregate",
                })
            }
        }
    }
}
