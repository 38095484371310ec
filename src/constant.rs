//! The value model.
//!
//! A [`Constant`] is a closed tagged union of builtin value kinds plus one
//! pointer-boxed kind, [`Constant::Opaque`], whose equality, ordering,
//! hashing and printing are supplied by the registering extension.
//! Constants of different type indices never compare equal.

use crate::dimension::DimensionIndex;
use crate::types::TypeIndex;
use ordered_float::OrderedFloat;
use std::any::Any;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

/// In-band error and sentinel values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Special {
    /// Internal error value; never produced by correct operation.
    Error,
    /// Something requested could not be accessed.
    Access,
    TypeError,
    /// A dimension was missing or misused.
    Dimension,
    Arith,
    /// No equation matched.
    Undef,
    Const,
    /// Several incomparable equations matched.
    MultiDef,
    /// Cyclic self-reference.
    Loop,
}

impl Special {
    pub fn name(self) -> &'static str {
        match self {
            Special::Error => "error",
            Special::Access => "access",
            Special::TypeError => "typeerror",
            Special::Dimension => "dimension",
            Special::Arith => "arith",
            Special::Undef => "undef",
            Special::Const => "const",
            Special::MultiDef => "multidef",
            Special::Loop => "loop",
        }
    }
}

impl fmt::Display for Special {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "special<{}>", self.name())
    }
}

/// Inclusive integer range; a missing bound is unbounded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Range {
    pub lower: Option<i64>,
    pub upper: Option<i64>,
}

impl Range {
    pub fn new(lower: Option<i64>, upper: Option<i64>) -> Self {
        Range { lower, upper }
    }

    pub fn bounded(lower: i64, upper: i64) -> Self {
        Range::new(Some(lower), Some(upper))
    }

    pub fn contains(&self, n: i64) -> bool {
        self.lower.map_or(true, |lo| lo <= n) && self.upper.map_or(true, |hi| n <= hi)
    }

    /// Check if every point of `self` lies in `other`.
    pub fn within(&self, other: &Range) -> bool {
        if self.is_empty() {
            return true;
        }
        let lower_ok = match (other.lower, self.lower) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(o), Some(s)) => o <= s,
        };
        let upper_ok = match (other.upper, self.upper) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(o), Some(s)) => s <= o,
        };
        lower_ok && upper_ok
    }

    pub fn is_empty(&self) -> bool {
        matches!((self.lower, self.upper), (Some(lo), Some(hi)) if lo > hi)
    }

    /// Number of points. `None` if unbounded or wider than `u64`.
    pub fn len(&self) -> Option<u64> {
        match (self.lower, self.upper) {
            (Some(lo), Some(hi)) if lo > hi => Some(0),
            (Some(lo), Some(hi)) => hi.abs_diff(lo).checked_add(1),
            _ => None,
        }
    }

    /// The single point of a one-element range.
    pub fn singleton(&self) -> Option<i64> {
        match (self.lower, self.upper) {
            (Some(lo), Some(hi)) if lo == hi => Some(lo),
            _ => None,
        }
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        if let Some(lo) = self.lower {
            write!(f, "{}", lo)?;
        }
        write!(f, "..")?;
        if let Some(hi) = self.upper {
            write!(f, "{}", hi)?;
        }
        write!(f, "]")
    }
}

/// A type used as a set of values: the union of its member types.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeSet(Rc<[TypeIndex]>);

impl TypeSet {
    pub fn new(types: impl IntoIterator<Item = TypeIndex>) -> Self {
        let mut types: Vec<TypeIndex> = types.into_iter().collect();
        types.sort();
        types.dedup();
        TypeSet(types.into())
    }

    pub fn single(t: TypeIndex) -> Self {
        TypeSet(Rc::from([t]))
    }

    pub fn contains(&self, t: TypeIndex) -> bool {
        self.0.binary_search(&t).is_ok()
    }

    pub fn is_subset(&self, other: &TypeSet) -> bool {
        self.0.iter().all(|t| other.contains(*t))
    }

    pub fn iter(&self) -> impl Iterator<Item = TypeIndex> + '_ {
        self.0.iter().copied()
    }
}

impl fmt::Display for TypeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "type<")?;
        for (i, t) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "|")?;
            }
            write!(f, "{}", t)?;
        }
        write!(f, ">")
    }
}

/// Behavior of an extension-defined value kind.
///
/// All values registered under one `TypeIndex` are expected to share a
/// concrete type, so `eq_value`/`cmp_value` may downcast `other`.
pub trait OpaqueValue: fmt::Debug + fmt::Display {
    fn type_index(&self) -> TypeIndex;

    fn as_any(&self) -> &dyn Any;

    fn eq_value(&self, other: &dyn OpaqueValue) -> bool;

    fn cmp_value(&self, other: &dyn OpaqueValue) -> Ordering;

    fn hash_value(&self) -> u64;
}

/// A typed value.
#[derive(Clone, Debug)]
pub enum Constant {
    Special(Special),
    Bool(bool),
    Int(i64),
    Float(OrderedFloat<f64>),
    Char(char),
    Str(Rc<str>),
    Range(Range),
    /// Finite set of values, used on the right of `IN`.
    Set(Rc<BTreeSet<Constant>>),
    /// Type-as-set, used on the right of `IMP`.
    Type(TypeSet),
    Dimension(DimensionIndex),
    Opaque(Rc<dyn OpaqueValue>),
}

impl Constant {
    pub fn float(f: f64) -> Self {
        Constant::Float(OrderedFloat(f))
    }

    pub fn str(s: impl Into<Rc<str>>) -> Self {
        Constant::Str(s.into())
    }

    pub fn set(values: impl IntoIterator<Item = Constant>) -> Self {
        Constant::Set(Rc::new(values.into_iter().collect()))
    }

    pub fn range(lower: i64, upper: i64) -> Self {
        Constant::Range(Range::bounded(lower, upper))
    }

    pub fn of_type(t: TypeIndex) -> Self {
        Constant::Type(TypeSet::single(t))
    }

    pub fn type_index(&self) -> TypeIndex {
        match self {
            Constant::Special(_) => TypeIndex::SPECIAL,
            Constant::Bool(_) => TypeIndex::BOOL,
            Constant::Int(_) => TypeIndex::INT,
            Constant::Float(_) => TypeIndex::FLOAT,
            Constant::Char(_) => TypeIndex::CHAR,
            Constant::Str(_) => TypeIndex::STRING,
            Constant::Range(_) => TypeIndex::RANGE,
            Constant::Set(_) => TypeIndex::SET,
            Constant::Type(_) => TypeIndex::TYPE,
            Constant::Dimension(_) => TypeIndex::DIMENSION,
            Constant::Opaque(v) => v.type_index(),
        }
    }

    pub fn is_special(&self) -> bool {
        matches!(self, Constant::Special(_))
    }

    pub fn as_special(&self) -> Option<Special> {
        match self {
            Constant::Special(s) => Some(*s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Constant::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Constant::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_true(&self) -> bool {
        matches!(self, Constant::Bool(true))
    }

    /// Position of the variant, used to order values that share a type index.
    fn variant_rank(&self) -> u8 {
        match self {
            Constant::Special(_) => 0,
            Constant::Bool(_) => 1,
            Constant::Int(_) => 2,
            Constant::Float(_) => 3,
            Constant::Char(_) => 4,
            Constant::Str(_) => 5,
            Constant::Range(_) => 6,
            Constant::Set(_) => 7,
            Constant::Type(_) => 8,
            Constant::Dimension(_) => 9,
            Constant::Opaque(_) => 10,
        }
    }
}

impl From<Special> for Constant {
    fn from(s: Special) -> Self {
        Constant::Special(s)
    }
}

impl From<i64> for Constant {
    fn from(n: i64) -> Self {
        Constant::Int(n)
    }
}

impl From<bool> for Constant {
    fn from(b: bool) -> Self {
        Constant::Bool(b)
    }
}

impl From<&str> for Constant {
    fn from(s: &str) -> Self {
        Constant::str(s)
    }
}

impl PartialEq for Constant {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Constant::Special(a), Constant::Special(b)) => a == b,
            (Constant::Bool(a), Constant::Bool(b)) => a == b,
            (Constant::Int(a), Constant::Int(b)) => a == b,
            (Constant::Float(a), Constant::Float(b)) => a == b,
            (Constant::Char(a), Constant::Char(b)) => a == b,
            (Constant::Str(a), Constant::Str(b)) => a == b,
            (Constant::Range(a), Constant::Range(b)) => a == b,
            (Constant::Set(a), Constant::Set(b)) => a == b,
            (Constant::Type(a), Constant::Type(b)) => a == b,
            (Constant::Dimension(a), Constant::Dimension(b)) => a == b,
            (Constant::Opaque(a), Constant::Opaque(b)) => {
                a.type_index() == b.type_index() && a.eq_value(b.as_ref())
            }
            _ => false,
        }
    }
}

impl Eq for Constant {}

impl PartialOrd for Constant {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Constant {
    fn cmp(&self, other: &Self) -> Ordering {
        let by_type = self.type_index().cmp(&other.type_index());
        if by_type != Ordering::Equal {
            return by_type;
        }
        match (self, other) {
            (Constant::Special(a), Constant::Special(b)) => a.cmp(b),
            (Constant::Bool(a), Constant::Bool(b)) => a.cmp(b),
            (Constant::Int(a), Constant::Int(b)) => a.cmp(b),
            (Constant::Float(a), Constant::Float(b)) => a.cmp(b),
            (Constant::Char(a), Constant::Char(b)) => a.cmp(b),
            (Constant::Str(a), Constant::Str(b)) => a.cmp(b),
            (Constant::Range(a), Constant::Range(b)) => a.cmp(b),
            (Constant::Set(a), Constant::Set(b)) => a.cmp(b),
            (Constant::Type(a), Constant::Type(b)) => a.cmp(b),
            (Constant::Dimension(a), Constant::Dimension(b)) => a.cmp(b),
            (Constant::Opaque(a), Constant::Opaque(b)) => a.cmp_value(b.as_ref()),
            // A builtin and an opaque value sharing a type index.
            _ => self.variant_rank().cmp(&other.variant_rank()),
        }
    }
}

impl Hash for Constant {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_index().hash(state);
        match self {
            Constant::Special(s) => s.hash(state),
            Constant::Bool(b) => b.hash(state),
            Constant::Int(n) => n.hash(state),
            Constant::Float(x) => x.hash(state),
            Constant::Char(c) => c.hash(state),
            Constant::Str(s) => s.hash(state),
            Constant::Range(r) => r.hash(state),
            Constant::Set(s) => {
                s.len().hash(state);
                for v in s.iter() {
                    v.hash(state);
                }
            }
            Constant::Type(t) => t.hash(state),
            Constant::Dimension(d) => d.hash(state),
            Constant::Opaque(v) => v.hash_value().hash(state),
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Special(s) => write!(f, "{}", s),
            Constant::Bool(b) => write!(f, "{}", b),
            Constant::Int(n) => write!(f, "{}", n),
            Constant::Float(x) => write!(f, "{}", x),
            Constant::Char(c) => write!(f, "'{}'", c),
            Constant::Str(s) => write!(f, "\"{}\"", s),
            Constant::Range(r) => write!(f, "{}", r),
            Constant::Set(s) => {
                write!(f, "{{")?;
                for (i, v) in s.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "}}")
            }
            Constant::Type(t) => write!(f, "{}", t),
            Constant::Dimension(d) => write!(f, "dimension<{}>", d),
            Constant::Opaque(v) => write!(f, "{}", v),
        }
    }
}
