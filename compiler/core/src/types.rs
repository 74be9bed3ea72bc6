//! The Aurora type lattice and the lexical scope stack.
//!
//! Types are value-like: structural equality via `PartialEq`, deep copies via
//! `Clone`, and they are freely duplicated between the AST, the analyzer's
//! scope stack, and the emitter's environment.

use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ty {
    I32,
    I64,
    Bool,
    Void,
    Ptr(Box<Ty>),
    Array { elem: Box<Ty>, len: i64 },
}

impl Ty {
    pub fn ptr(elem: Ty) -> Ty {
        Ty::Ptr(Box::new(elem))
    }

    pub fn array(elem: Ty, len: i64) -> Ty {
        Ty::Array {
            elem: Box::new(elem),
            len,
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Ty::Void)
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Ty::I32 | Ty::I64)
    }

    /// The element type of a pointer or array, if any.
    pub fn element(&self) -> Option<&Ty> {
        match self {
            Ty::Ptr(elem) => Some(elem),
            Ty::Array { elem, .. } => Some(elem),
            _ => None,
        }
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::I32 => f.write_str("i32"),
            Ty::I64 => f.write_str("i64"),
            Ty::Bool => f.write_str("bool"),
            Ty::Void => f.write_str("void"),
            Ty::Ptr(elem) => write!(f, "ptr<{elem}>"),
            Ty::Array { elem, len } => write!(f, "{elem}[{len}]"),
        }
    }
}

/// A variable binding: its type plus whether it owns a heap resource that
/// must be released when its scope exits.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub ty: Ty,
    pub is_unique: bool,
}

/// A stack of name → binding maps. Entering a block pushes a frame, leaving
/// pops it; lookup walks from the innermost frame outward, so inner frames
/// shadow outer ones. Redeclaration inside a single frame is refused.
#[derive(Debug, Default)]
pub struct ScopeStack {
    frames: Vec<HashMap<String, Binding>>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self { frames: Vec::new() }
    }

    pub fn push_scope(&mut self) {
        self.frames.push(HashMap::new());
    }

    pub fn pop_scope(&mut self) {
        self.frames.pop();
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Declares `name` in the innermost frame. Returns `false` when the name
    /// is already bound in that frame.
    pub fn declare(&mut self, name: impl Into<String>, binding: Binding) -> bool {
        if self.frames.is_empty() {
            self.frames.push(HashMap::new());
        }
        let frame = self.frames.last_mut().unwrap();
        let name = name.into();
        if frame.contains_key(&name) {
            return false;
        }
        frame.insert(name, binding);
        true
    }

    pub fn lookup(&self, name: &str) -> Option<&Binding> {
        for frame in self.frames.iter().rev() {
            if let Some(binding) = frame.get(name) {
                return Some(binding);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_nested_types() {
        assert_eq!(Ty::ptr(Ty::I64).to_string(), "ptr<i64>");
        assert_eq!(Ty::array(Ty::I32, 4).to_string(), "i32[4]");
        assert_eq!(Ty::ptr(Ty::array(Ty::Bool, 0)).to_string(), "ptr<bool[0]>");
    }

    #[test]
    fn structural_equality_includes_array_length() {
        assert_eq!(Ty::array(Ty::I64, 3), Ty::array(Ty::I64, 3));
        assert_ne!(Ty::array(Ty::I64, 3), Ty::array(Ty::I64, 4));
        assert_ne!(Ty::ptr(Ty::I64), Ty::ptr(Ty::I32));
        assert_ne!(Ty::I32, Ty::I64);
    }

    #[test]
    fn clone_is_deep() {
        let original = Ty::ptr(Ty::array(Ty::I64, 2));
        let copy = original.clone();
        assert_eq!(original, copy);
    }

    #[test]
    fn scope_shadowing_and_redeclaration() {
        let mut scope = ScopeStack::new();
        scope.push_scope();
        assert!(scope.declare(
            "x",
            Binding {
                ty: Ty::I64,
                is_unique: false
            }
        ));
        // Same frame: refused.
        assert!(!scope.declare(
            "x",
            Binding {
                ty: Ty::Bool,
                is_unique: false
            }
        ));

        scope.push_scope();
        // Inner frame: shadowing allowed.
        assert!(scope.declare(
            "x",
            Binding {
                ty: Ty::Bool,
                is_unique: false
            }
        ));
        assert_eq!(scope.lookup("x").unwrap().ty, Ty::Bool);

        scope.pop_scope();
        assert_eq!(scope.lookup("x").unwrap().ty, Ty::I64);
        scope.pop_scope();
        assert!(scope.lookup("x").is_none());
    }
}
