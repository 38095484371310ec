//! Type identities and the operator table.
//!
//! Builtin value kinds occupy fixed type indices. Extensions register further
//! types by name, and register operators against operand type signatures.

use crate::constant::{Constant, Special};
use crate::error::{EngineError, EvalResult};
use rustc_hash::FxHashMap;
use std::fmt;
use std::rc::Rc;

/// Identity of a value type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeIndex(pub u16);

impl TypeIndex {
    pub const STRING: TypeIndex = TypeIndex(0);
    pub const INT: TypeIndex = TypeIndex(1);
    pub const BOOL: TypeIndex = TypeIndex(2);
    pub const SPECIAL: TypeIndex = TypeIndex(3);
    pub const CHAR: TypeIndex = TypeIndex(4);
    pub const FLOAT: TypeIndex = TypeIndex(5);
    pub const RANGE: TypeIndex = TypeIndex(6);
    pub const SET: TypeIndex = TypeIndex(7);
    pub const TYPE: TypeIndex = TypeIndex(8);
    pub const DIMENSION: TypeIndex = TypeIndex(9);
}

/// Builtin type names, indexed by `TypeIndex`.
pub const BUILTIN_TYPES: [&str; 10] = [
    "ustring", "intmp", "bool", "special", "uchar", "float", "range", "set", "type", "dimension",
];

impl fmt::Display for TypeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match BUILTIN_TYPES.get(usize::from(self.0)) {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "#{}", self.0),
        }
    }
}

/// Native operator implementation.
pub type OpFn = Rc<dyn Fn(&[Constant]) -> Constant>;

/// Registry of type names and operators.
pub struct TypeRegistry {
    by_name: FxHashMap<Box<str>, TypeIndex>,
    names: Vec<Box<str>>,
    ops: FxHashMap<Box<str>, FxHashMap<Vec<TypeIndex>, OpFn>>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("types", &self.names)
            .field("ops", &self.ops.len())
            .finish()
    }
}

impl TypeRegistry {
    /// Create a registry holding the builtin types.
    pub fn new() -> Self {
        let names: Vec<Box<str>> = BUILTIN_TYPES.iter().map(|name| (*name).into()).collect();
        let by_name = names
            .iter()
            .zip(0..)
            .map(|(name, i)| (name.clone(), TypeIndex(i)))
            .collect();
        TypeRegistry {
            by_name,
            names,
            ops: FxHashMap::default(),
        }
    }

    /// Register a type name, returning its index. Idempotent.
    pub fn register_type(&mut self, name: &str) -> EvalResult<TypeIndex> {
        if let Some(&index) = self.by_name.get(name) {
            return Ok(index);
        }

        let len = self.names.len();
        let index = u16::try_from(len)
            .map(TypeIndex)
            .map_err(|_| EngineError::CapacityExceeded { table: "type", len })?;
        let boxed: Box<str> = name.into();
        self.by_name.insert(boxed.clone(), index);
        self.names.push(boxed);
        Ok(index)
    }

    pub fn type_index(&self, name: &str) -> Option<TypeIndex> {
        self.by_name.get(name).copied()
    }

    pub fn type_name(&self, index: TypeIndex) -> Option<&str> {
        self.names.get(usize::from(index.0)).map(|n| &**n)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Register an operator for one operand signature, replacing any previous one.
    pub fn register_op(&mut self, name: &str, operands: &[TypeIndex], op: OpFn) {
        self.ops
            .entry(name.into())
            .or_default()
            .insert(operands.to_vec(), op);
    }

    pub fn find_op(&self, name: &str, operands: &[TypeIndex]) -> Option<&OpFn> {
        self.ops.get(name).and_then(|sigs| sigs.get(operands))
    }

    /// Apply an operator to evaluated operands.
    ///
    /// With no matching signature, the first Special operand passes through;
    /// otherwise the result is `special<typeerror>`.
    pub fn apply_op(&self, name: &str, args: &[Constant]) -> Constant {
        let signature: Vec<TypeIndex> = args.iter().map(|a| a.type_index()).collect();
        if let Some(op) = self.find_op(name, &signature) {
            return op(args);
        }
        args.iter()
            .find(|a| a.is_special())
            .cloned()
            .unwrap_or(Constant::Special(Special::TypeError))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_indices_match_names() {
        let registry = TypeRegistry::new();
        assert_eq!(registry.type_index("intmp"), Some(TypeIndex::INT));
        assert_eq!(registry.type_index("special"), Some(TypeIndex::SPECIAL));
        assert_eq!(registry.type_index("dimension"), Some(TypeIndex::DIMENSION));
        assert_eq!(registry.type_name(TypeIndex::BOOL), Some("bool"));
    }

    #[test]
    fn test_register_type_is_idempotent() {
        let mut registry = TypeRegistry::new();
        let a = registry.register_type("point").unwrap();
        let b = registry.register_type("point").unwrap();
        assert_eq!(a, b);
        assert_eq!(a, TypeIndex(10));
        assert_eq!(format!("{}", a), format!("#{}", BUILTIN_TYPES.len()));
    }

    #[test]
    fn test_full_registry_is_fault() {
        let mut registry = TypeRegistry::new();
        for i in BUILTIN_TYPES.len()..=usize::from(u16::MAX) {
            registry.register_type(&format!("t{}", i)).unwrap();
        }
        assert_eq!(registry.len(), usize::from(u16::MAX) + 1);

        let err = registry.register_type("one_more").unwrap_err();
        assert_eq!(
            err,
            EngineError::CapacityExceeded {
                table: "type",
                len: usize::from(u16::MAX) + 1
            }
        );
        assert_eq!(registry.type_index("one_more"), None);
        // Known names still resolve.
        assert_eq!(registry.register_type("t10").unwrap(), TypeIndex(10));
    }

    #[test]
    fn test_apply_op_fallbacks() {
        let mut registry = TypeRegistry::new();
        registry.register_op(
            "+",
            &[TypeIndex::INT, TypeIndex::INT],
            Rc::new(|args: &[Constant]| match (&args[0], &args[1]) {
                (Constant::Int(a), Constant::Int(b)) => Constant::Int(a + b),
                _ => Constant::Special(Special::TypeError),
            }),
        );

        assert_eq!(
            registry.apply_op("+", &[Constant::Int(2), Constant::Int(3)]),
            Constant::Int(5)
        );
        assert_eq!(
            registry.apply_op("+", &[Constant::Int(2), Constant::Bool(true)]),
            Constant::Special(Special::TypeError)
        );
        assert_eq!(
            registry.apply_op("+", &[Constant::Int(2), Constant::Special(Special::Undef)]),
            Constant::Special(Special::Undef)
        );
        assert_eq!(
            registry.apply_op("nope", &[]),
            Constant::Special(Special::TypeError)
        );
    }
}
