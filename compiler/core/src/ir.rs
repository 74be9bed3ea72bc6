//! Typed SSA intermediate representation.
//!
//! The emitter's output: a module of function declarations (builtins) and
//! definitions made of basic blocks. Pointers are opaque, so `load`, `store`,
//! and `getelementptr` carry the pointee/aggregate type explicitly, and
//! every block ends in exactly one terminator, which [`Function::verify`]
//! enforces together with operand/result type consistency. The `Display`
//! impls render the module in an LLVM-flavored textual form.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IrType {
    I1,
    I32,
    I64,
    Ptr,
    Void,
    Array { elem: Box<IrType>, len: u64 },
}

impl IrType {
    pub fn array(elem: IrType, len: u64) -> IrType {
        IrType::Array {
            elem: Box::new(elem),
            len,
        }
    }
}

impl fmt::Display for IrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrType::I1 => f.write_str("i1"),
            IrType::I32 => f.write_str("i32"),
            IrType::I64 => f.write_str("i64"),
            IrType::Ptr => f.write_str("ptr"),
            IrType::Void => f.write_str("void"),
            IrType::Array { elem, len } => write!(f, "[{len} x {elem}]"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValueId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(pub usize);

/// An SSA operand: a previously defined value or an integer constant carrying
/// its own type.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Local(ValueId),
    ConstInt { ty: IrType, value: i64 },
}

impl Value {
    pub fn const_int(ty: IrType, value: i64) -> Value {
        Value::ConstInt { ty, value }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Local(id) => write!(f, "%v{}", id.0),
            Value::ConstInt {
                ty: IrType::I1,
                value,
            } => f.write_str(if *value != 0 { "true" } else { "false" }),
            Value::ConstInt { value, .. } => write!(f, "{value}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Sdiv,
    Srem,
    And,
    Or,
    Xor,
}

impl BinOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            BinOp::Add => "add",
            BinOp::Sub => "sub",
            BinOp::Mul => "mul",
            BinOp::Sdiv => "sdiv",
            BinOp::Srem => "srem",
            BinOp::And => "and",
            BinOp::Or => "or",
            BinOp::Xor => "xor",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IcmpCond {
    Eq,
    Ne,
    Slt,
    Sle,
    Sgt,
    Sge,
}

impl IcmpCond {
    pub fn mnemonic(self) -> &'static str {
        match self {
            IcmpCond::Eq => "eq",
            IcmpCond::Ne => "ne",
            IcmpCond::Slt => "slt",
            IcmpCond::Sle => "sle",
            IcmpCond::Sgt => "sgt",
            IcmpCond::Sge => "sge",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InstKind {
    /// Stack slot of the given type; the result is an opaque pointer.
    Alloca { ty: IrType },
    Load {
        ty: IrType,
        ptr: Value,
        align: Option<u64>,
    },
    Store {
        ty: IrType,
        value: Value,
        ptr: Value,
        align: Option<u64>,
    },
    /// Element address computation. Two indices (`0, i`) address into an
    /// array slot, one index addresses through a raw pointer.
    Gep {
        base_ty: IrType,
        ptr: Value,
        indices: Vec<Value>,
    },
    Bin {
        op: BinOp,
        ty: IrType,
        lhs: Value,
        rhs: Value,
    },
    Icmp {
        cond: IcmpCond,
        ty: IrType,
        lhs: Value,
        rhs: Value,
    },
    Trunc {
        value: Value,
        from: IrType,
        to: IrType,
    },
    Call {
        callee: String,
        ret: IrType,
        args: Vec<(IrType, Value)>,
    },
}

impl InstKind {
    /// The type of the value this instruction defines, if it defines one.
    pub fn result_type(&self) -> Option<IrType> {
        match self {
            InstKind::Alloca { .. } | InstKind::Gep { .. } => Some(IrType::Ptr),
            InstKind::Load { ty, .. } | InstKind::Bin { ty, .. } => Some(ty.clone()),
            InstKind::Icmp { .. } => Some(IrType::I1),
            InstKind::Trunc { to, .. } => Some(to.clone()),
            InstKind::Call { ret, .. } => {
                if *ret == IrType::Void {
                    None
                } else {
                    Some(ret.clone())
                }
            }
            InstKind::Store { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Inst {
    pub result: Option<ValueId>,
    pub kind: InstKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Terminator {
    Ret { ty: IrType, value: Option<Value> },
    Br { target: BlockId },
    CondBr {
        cond: Value,
        then_target: BlockId,
        else_target: BlockId,
    },
}

impl Terminator {
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            Terminator::Ret { .. } => Vec::new(),
            Terminator::Br { target } => vec![*target],
            Terminator::CondBr {
                then_target,
                else_target,
                ..
            } => vec![*then_target, *else_target],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub id: BlockId,
    pub label: String,
    pub insts: Vec<Inst>,
    pub terminator: Option<Terminator>,
}

/// An external function made visible to calls, rendered as a `declare` line.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: String,
    pub params: Vec<IrType>,
    pub ret: IrType,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VerifyError {
    #[error("function '{function}': block '{block}' has no terminator")]
    MissingTerminator { function: String, block: String },
    #[error("function '{function}': block '{block}' branches to an unknown block")]
    UnknownBranchTarget { function: String, block: String },
    #[error("function '{function}': branch condition in '{block}' is {found}, expected i1")]
    BadConditionType {
        function: String,
        block: String,
        found: IrType,
    },
    #[error("function '{function}': ret in '{block}' carries {found}, function returns {expected}")]
    ReturnTypeMismatch {
        function: String,
        block: String,
        expected: IrType,
        found: IrType,
    },
    #[error("function '{function}': {context} in '{block}' has type {found}, expected {expected}")]
    OperandTypeMismatch {
        function: String,
        block: String,
        context: &'static str,
        expected: IrType,
        found: IrType,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub params: Vec<(String, IrType)>,
    pub ret: IrType,
    pub blocks: Vec<Block>,
    value_types: Vec<IrType>,
}

pub const ENTRY_BLOCK: BlockId = BlockId(0);

impl Function {
    /// Creates the function with its entry block; parameters become the first
    /// SSA values.
    pub fn new(name: impl Into<String>, params: Vec<(String, IrType)>, ret: IrType) -> Self {
        let value_types = params.iter().map(|(_, ty)| ty.clone()).collect();
        Self {
            name: name.into(),
            params,
            ret,
            blocks: vec![Block {
                id: ENTRY_BLOCK,
                label: "entry".to_string(),
                insts: Vec::new(),
                terminator: None,
            }],
            value_types,
        }
    }

    pub fn param_value(&self, index: usize) -> Value {
        debug_assert!(index < self.params.len());
        Value::Local(ValueId(index))
    }

    pub fn add_block(&mut self, hint: &str) -> BlockId {
        let id = BlockId(self.blocks.len());
        self.blocks.push(Block {
            id,
            label: format!("{hint}{}", id.0),
            insts: Vec::new(),
            terminator: None,
        });
        id
    }

    /// Appends an instruction, allocating a fresh value id when the
    /// instruction defines one.
    pub fn push(&mut self, block: BlockId, kind: InstKind) -> Option<Value> {
        let result = kind.result_type().map(|ty| {
            let id = ValueId(self.value_types.len());
            self.value_types.push(ty);
            id
        });
        self.blocks[block.0].insts.push(Inst { result, kind });
        result.map(Value::Local)
    }

    pub fn is_terminated(&self, block: BlockId) -> bool {
        self.blocks[block.0].terminator.is_some()
    }

    /// Installs a terminator; a block that already has one is left alone.
    pub fn terminate(&mut self, block: BlockId, terminator: Terminator) {
        let block = &mut self.blocks[block.0];
        if block.terminator.is_none() {
            block.terminator = Some(terminator);
        }
    }

    pub fn value_type(&self, value: &Value) -> IrType {
        match value {
            Value::Local(id) => self.value_types[id.0].clone(),
            Value::ConstInt { ty, .. } => ty.clone(),
        }
    }

    /// Structural verification: every block terminated, branch targets in
    /// range, and operand/result types consistent. The emitter runs this on
    /// every function it produces; a failure is a compiler bug surfacing.
    pub fn verify(&self) -> Result<(), VerifyError> {
        for block in &self.blocks {
            for inst in &block.insts {
                self.verify_inst(block, inst)?;
            }

            let terminator = block.terminator.as_ref().ok_or(VerifyError::MissingTerminator {
                function: self.name.clone(),
                block: block.label.clone(),
            })?;
            for successor in terminator.successors() {
                if successor.0 >= self.blocks.len() {
                    return Err(VerifyError::UnknownBranchTarget {
                        function: self.name.clone(),
                        block: block.label.clone(),
                    });
                }
            }
            match terminator {
                Terminator::Ret { ty, value } => {
                    if *ty != self.ret {
                        return Err(VerifyError::ReturnTypeMismatch {
                            function: self.name.clone(),
                            block: block.label.clone(),
                            expected: self.ret.clone(),
                            found: ty.clone(),
                        });
                    }
                    match value {
                        None if *ty == IrType::Void => {}
                        Some(value) if *ty != IrType::Void => {
                            let found = self.value_type(value);
                            if found != *ty {
                                return Err(VerifyError::ReturnTypeMismatch {
                                    function: self.name.clone(),
                                    block: block.label.clone(),
                                    expected: ty.clone(),
                                    found,
                                });
                            }
                        }
                        _ => {
                            return Err(VerifyError::ReturnTypeMismatch {
                                function: self.name.clone(),
                                block: block.label.clone(),
                                expected: self.ret.clone(),
                                found: IrType::Void,
                            })
                        }
                    }
                }
                Terminator::CondBr { cond, .. } => {
                    let found = self.value_type(cond);
                    if found != IrType::I1 {
                        return Err(VerifyError::BadConditionType {
                            function: self.name.clone(),
                            block: block.label.clone(),
                            found,
                        });
                    }
                }
                Terminator::Br { .. } => {}
            }
        }
        Ok(())
    }

    fn verify_inst(&self, block: &Block, inst: &Inst) -> Result<(), VerifyError> {
        let mismatch = |context, expected: &IrType, found: IrType| {
            Err(VerifyError::OperandTypeMismatch {
                function: self.name.clone(),
                block: block.label.clone(),
                context,
                expected: expected.clone(),
                found,
            })
        };
        match &inst.kind {
            InstKind::Alloca { .. } => Ok(()),
            InstKind::Load { ptr, .. } => {
                let found = self.value_type(ptr);
                if found != IrType::Ptr {
                    return mismatch("load address", &IrType::Ptr, found);
                }
                Ok(())
            }
            InstKind::Store { ty, value, ptr, .. } => {
                let found = self.value_type(ptr);
                if found != IrType::Ptr {
                    return mismatch("store address", &IrType::Ptr, found);
                }
                let found = self.value_type(value);
                if found != *ty {
                    return mismatch("stored value", ty, found);
                }
                Ok(())
            }
            InstKind::Gep { ptr, indices, .. } => {
                let found = self.value_type(ptr);
                if found != IrType::Ptr {
                    return mismatch("gep base", &IrType::Ptr, found);
                }
                for index in indices {
                    let found = self.value_type(index);
                    if found != IrType::I32 {
                        return mismatch("gep index", &IrType::I32, found);
                    }
                }
                Ok(())
            }
            InstKind::Bin { ty, lhs, rhs, .. } | InstKind::Icmp { ty, lhs, rhs, .. } => {
                let found = self.value_type(lhs);
                if found != *ty {
                    return mismatch("left operand", ty, found);
                }
                let found = self.value_type(rhs);
                if found != *ty {
                    return mismatch("right operand", ty, found);
                }
                Ok(())
            }
            InstKind::Trunc { value, from, .. } => {
                let found = self.value_type(value);
                if found != *from {
                    return mismatch("trunc operand", from, found);
                }
                Ok(())
            }
            InstKind::Call { args, .. } => {
                for (ty, value) in args {
                    let found = self.value_type(value);
                    if found != *ty {
                        return mismatch("call argument", ty, found);
                    }
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub name: String,
    pub declarations: Vec<FunctionDecl>,
    pub functions: Vec<Function>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declarations: Vec::new(),
            functions: Vec::new(),
        }
    }

    pub fn declare(&mut self, name: impl Into<String>, params: Vec<IrType>, ret: IrType) {
        self.declarations.push(FunctionDecl {
            name: name.into(),
            params,
            ret,
        });
    }

    pub fn verify(&self) -> Result<(), VerifyError> {
        for function in &self.functions {
            function.verify()?;
        }
        Ok(())
    }
}

// Textual rendering.

impl fmt::Display for Inst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(result) = self.result {
            write!(f, "%v{} = ", result.0)?;
        }
        match &self.kind {
            InstKind::Alloca { ty } => write!(f, "alloca {ty}"),
            InstKind::Load { ty, ptr, align } => {
                write!(f, "load {ty}, ptr {ptr}")?;
                if let Some(align) = align {
                    write!(f, ", align {align}")?;
                }
                Ok(())
            }
            InstKind::Store {
                ty,
                value,
                ptr,
                align,
            } => {
                write!(f, "store {ty} {value}, ptr {ptr}")?;
                if let Some(align) = align {
                    write!(f, ", align {align}")?;
                }
                Ok(())
            }
            InstKind::Gep {
                base_ty,
                ptr,
                indices,
            } => {
                write!(f, "getelementptr inbounds {base_ty}, ptr {ptr}")?;
                for index in indices {
                    write!(f, ", i32 {index}")?;
                }
                Ok(())
            }
            InstKind::Bin { op, ty, lhs, rhs } => {
                write!(f, "{} {ty} {lhs}, {rhs}", op.mnemonic())
            }
            InstKind::Icmp { cond, ty, lhs, rhs } => {
                write!(f, "icmp {} {ty} {lhs}, {rhs}", cond.mnemonic())
            }
            InstKind::Trunc { value, from, to } => write!(f, "trunc {from} {value} to {to}"),
            InstKind::Call { callee, ret, args } => {
                write!(f, "call {ret} @{callee}(")?;
                for (idx, (ty, value)) in args.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{ty} {value}")?;
                }
                f.write_str(")")
            }
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "define {} @{}(", self.ret, self.name)?;
        for (idx, (_, ty)) in self.params.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{ty} %v{idx}")?;
        }
        writeln!(f, ") {{")?;
        for (idx, block) in self.blocks.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            writeln!(f, "{}:", block.label)?;
            for inst in &block.insts {
                writeln!(f, "  {inst}")?;
            }
            match &block.terminator {
                Some(Terminator::Ret { ty, value }) => match value {
                    Some(value) => writeln!(f, "  ret {ty} {value}")?,
                    None => writeln!(f, "  ret void")?,
                },
                Some(Terminator::Br { target }) => {
                    writeln!(f, "  br label %{}", self.blocks[target.0].label)?
                }
                Some(Terminator::CondBr {
                    cond,
                    then_target,
                    else_target,
                }) => writeln!(
                    f,
                    "  br i1 {cond}, label %{}, label %{}",
                    self.blocks[then_target.0].label, self.blocks[else_target.0].label
                )?,
                None => writeln!(f, "  ; <no terminator>")?,
            }
        }
        writeln!(f, "}}")
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "; ModuleID = '{}'", self.name)?;
        writeln!(f)?;
        for decl in &self.declarations {
            write!(f, "declare {} @{}(", decl.ret, decl.name)?;
            for (idx, ty) in decl.params.iter().enumerate() {
                if idx > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{ty}")?;
            }
            writeln!(f, ")")?;
        }
        for function in &self.functions {
            writeln!(f)?;
            write!(f, "{function}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant(value: i64) -> Value {
        Value::const_int(IrType::I64, value)
    }

    #[test]
    fn builds_and_verifies_a_straight_line_function() {
        let mut function = Function::new("answer", vec![("n".into(), IrType::I64)], IrType::I64);
        let slot = function
            .push(ENTRY_BLOCK, InstKind::Alloca { ty: IrType::I64 })
            .unwrap();
        function.push(
            ENTRY_BLOCK,
            InstKind::Store {
                ty: IrType::I64,
                value: function.param_value(0),
                ptr: slot.clone(),
                align: None,
            },
        );
        let loaded = function
            .push(
                ENTRY_BLOCK,
                InstKind::Load {
                    ty: IrType::I64,
                    ptr: slot,
                    align: None,
                },
            )
            .unwrap();
        let doubled = function
            .push(
                ENTRY_BLOCK,
                InstKind::Bin {
                    op: BinOp::Mul,
                    ty: IrType::I64,
                    lhs: loaded,
                    rhs: constant(2),
                },
            )
            .unwrap();
        function.terminate(
            ENTRY_BLOCK,
            Terminator::Ret {
                ty: IrType::I64,
                value: Some(doubled),
            },
        );

        function.verify().expect("verifier accepts");
        let text = function.to_string();
        assert!(text.contains("define i64 @answer(i64 %v0)"));
        assert!(text.contains("%v1 = alloca i64"));
        assert!(text.contains("store i64 %v0, ptr %v1"));
        assert!(text.contains("mul i64 %v2, 2"));
        assert!(text.contains("ret i64 %v3"));
    }

    #[test]
    fn verifier_rejects_missing_terminator() {
        let function = Function::new("f", vec![], IrType::Void);
        let err = function.verify().unwrap_err();
        assert!(matches!(err, VerifyError::MissingTerminator { .. }));
    }

    #[test]
    fn verifier_rejects_return_type_mismatch() {
        let mut function = Function::new("f", vec![], IrType::I64);
        function.terminate(
            ENTRY_BLOCK,
            Terminator::Ret {
                ty: IrType::I64,
                value: Some(Value::const_int(IrType::I1, 1)),
            },
        );
        let err = function.verify().unwrap_err();
        assert!(matches!(err, VerifyError::ReturnTypeMismatch { .. }));
    }

    #[test]
    fn verifier_rejects_non_boolean_branch_condition() {
        let mut function = Function::new("f", vec![], IrType::Void);
        let exit = function.add_block("exit");
        function.terminate(
            ENTRY_BLOCK,
            Terminator::CondBr {
                cond: constant(1),
                then_target: exit,
                else_target: exit,
            },
        );
        function.terminate(
            exit,
            Terminator::Ret {
                ty: IrType::Void,
                value: None,
            },
        );
        let err = function.verify().unwrap_err();
        assert!(matches!(err, VerifyError::BadConditionType { .. }));
    }

    #[test]
    fn verifier_rejects_ill_typed_store() {
        let mut function = Function::new("f", vec![], IrType::Void);
        let slot = function
            .push(ENTRY_BLOCK, InstKind::Alloca { ty: IrType::I64 })
            .unwrap();
        function.push(
            ENTRY_BLOCK,
            InstKind::Store {
                ty: IrType::I64,
                value: Value::const_int(IrType::I1, 0),
                ptr: slot,
                align: None,
            },
        );
        function.terminate(
            ENTRY_BLOCK,
            Terminator::Ret {
                ty: IrType::Void,
                value: None,
            },
        );
        let err = function.verify().unwrap_err();
        assert!(matches!(
            err,
            VerifyError::OperandTypeMismatch {
                context: "stored value",
                ..
            }
        ));
    }

    #[test]
    fn terminate_leaves_existing_terminator_alone() {
        let mut function = Function::new("f", vec![], IrType::Void);
        function.terminate(
            ENTRY_BLOCK,
            Terminator::Ret {
                ty: IrType::Void,
                value: None,
            },
        );
        let other = function.add_block("exit");
        function.terminate(ENTRY_BLOCK, Terminator::Br { target: other });
        assert!(matches!(
            function.blocks[0].terminator,
            Some(Terminator::Ret { .. })
        ));
    }

    #[test]
    fn renders_module_declarations() {
        let mut module = Module::new("aurora");
        module.declare("print_i64", vec![IrType::I64], IrType::I64);
        module.declare("free", vec![IrType::Ptr], IrType::Void);
        let text = module.to_string();
        assert!(text.starts_with("; ModuleID = 'aurora'"));
        assert!(text.contains("declare i64 @print_i64(i64)"));
        assert!(text.contains("declare void @free(ptr)"));
    }

    #[test]
    fn renders_array_types_and_geps() {
        let mut function = Function::new("f", vec![], IrType::I64);
        let array_ty = IrType::array(IrType::I64, 3);
        let slot = function
            .push(ENTRY_BLOCK, InstKind::Alloca { ty: array_ty.clone() })
            .unwrap();
        let addr = function
            .push(
                ENTRY_BLOCK,
                InstKind::Gep {
                    base_ty: array_ty,
                    ptr: slot,
                    indices: vec![
                        Value::const_int(IrType::I32, 0),
                        Value::const_int(IrType::I32, 1),
                    ],
                },
            )
            .unwrap();
        let value = function
            .push(
                ENTRY_BLOCK,
                InstKind::Load {
                    ty: IrType::I64,
                    ptr: addr,
                    align: Some(8),
                },
            )
            .unwrap();
        function.terminate(
            ENTRY_BLOCK,
            Terminator::Ret {
                ty: IrType::I64,
                value: Some(value),
            },
        );
        function.verify().expect("verifier accepts");
        let text = function.to_string();
        assert!(text.contains("%v0 = alloca [3 x i64]"));
        assert!(text.contains("getelementptr inbounds [3 x i64], ptr %v0, i32 0, i32 1"));
        assert!(text.contains("load i64, ptr %v1, align 8"));
    }
}
