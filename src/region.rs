//! Guards: conjunctions of per-dimension containment constraints.
//!
//! A [`Region`] restricts when an equation applies. Regions are partially
//! ordered by entailment; best fit uses that order to pick the most specific
//! of several satisfied equations.

use crate::constant::{Constant, Range, TypeSet};
use crate::context::Context;
use crate::dimension::DimensionIndex;
use crate::error::{EngineError, EvalResult};
use crate::types::TypeIndex;
use std::collections::BTreeSet;
use std::fmt;

/// How a context value must relate to the guard value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Containment {
    /// Exact equality.
    Is,
    /// Membership in a range or set.
    In,
    /// The value's type is one of the types in a type-set.
    Imp,
}

impl fmt::Display for Containment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Containment::Is => write!(f, ":"),
            Containment::In => write!(f, " in "),
            Containment::Imp => write!(f, " imp "),
        }
    }
}

/// One constraint of a guard.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegionEntry {
    pub dim: DimensionIndex,
    pub containment: Containment,
    pub value: Constant,
}

impl RegionEntry {
    /// Check a context value against this constraint.
    pub fn admits(&self, value: &Constant) -> bool {
        match self.containment {
            Containment::Is => *value == self.value,
            Containment::In => is_member(value, &self.value),
            Containment::Imp => match &self.value {
                Constant::Type(types) => types.contains(value.type_index()),
                _ => false,
            },
        }
    }

    /// Whether satisfying `self` guarantees satisfying `other`.
    fn entails(&self, other: &RegionEntry) -> bool {
        if self.dim != other.dim {
            return false;
        }
        match (self.containment, other.containment) {
            (Containment::Is, _) => other.admits(&self.value),
            (Containment::In, Containment::Is) => singleton(&self.value).as_ref() == Some(&other.value),
            (Containment::In, Containment::In) => is_subset(&self.value, &other.value),
            (Containment::In, Containment::Imp) => match &other.value {
                Constant::Type(types) => member_types_within(&self.value, types),
                _ => false,
            },
            (Containment::Imp, Containment::Imp) => match (&self.value, &other.value) {
                (Constant::Type(a), Constant::Type(b)) => a.is_subset(b),
                _ => false,
            },
            (Containment::Imp, _) => false,
        }
    }
}

impl fmt::Display for RegionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.dim, self.containment, self.value)
    }
}

/// A guard. The empty region matches every context.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Region {
    entries: Vec<RegionEntry>,
}

impl Region {
    /// The unconstrained region.
    pub fn any() -> Self {
        Self::default()
    }

    /// Build a region, rejecting constraints whose value cannot serve the
    /// requested containment.
    pub fn new(
        entries: impl IntoIterator<Item = (DimensionIndex, Containment, Constant)>,
    ) -> EvalResult<Self> {
        let mut region = Region::any();
        for (dim, containment, value) in entries {
            region = region.with(dim, containment, value)?;
        }
        Ok(region)
    }

    /// Add one constraint.
    pub fn with(
        mut self,
        dim: DimensionIndex,
        containment: Containment,
        value: Constant,
    ) -> EvalResult<Self> {
        let valid = match containment {
            Containment::Is => true,
            Containment::In => matches!(value, Constant::Range(_) | Constant::Set(_)),
            Containment::Imp => matches!(value, Constant::Type(_)),
        };
        if !valid {
            return Err(EngineError::MalformedGuard {
                dim,
                reason: format!("`{}` cannot be used with `{:?}`", value, containment),
            });
        }
        self.entries.push(RegionEntry {
            dim,
            containment,
            value,
        });
        Ok(self)
    }

    /// Shorthand for a region of `IS` constraints.
    pub fn is(pairs: impl IntoIterator<Item = (DimensionIndex, Constant)>) -> Self {
        Region {
            entries: pairs
                .into_iter()
                .map(|(dim, value)| RegionEntry {
                    dim,
                    containment: Containment::Is,
                    value,
                })
                .collect(),
        }
    }

    pub fn entries(&self) -> &[RegionEntry] {
        &self.entries
    }

    /// Dimensions this guard inspects, ascending and without repeats.
    pub fn dims(&self) -> Vec<DimensionIndex> {
        let set: BTreeSet<DimensionIndex> = self.entries.iter().map(|e| e.dim).collect();
        set.into_iter().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check every constraint against `context`. An absent dimension fails.
    pub fn satisfied_by(&self, context: &Context) -> bool {
        self.entries
            .iter()
            .all(|e| context.lookup(e.dim).map_or(false, |v| e.admits(v)))
    }

    /// Every context satisfying `self` also satisfies `other`.
    pub fn refines(&self, other: &Region) -> bool {
        other
            .entries
            .iter()
            .all(|theirs| self.entries.iter().any(|ours| ours.entails(theirs)))
    }

    /// Strictly narrower than `other`.
    pub fn more_specific_than(&self, other: &Region) -> bool {
        self.refines(other) && !other.refines(self)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, e) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", e)?;
        }
        write!(f, "]")
    }
}

fn is_member(value: &Constant, collection: &Constant) -> bool {
    match (value, collection) {
        (Constant::Int(n), Constant::Range(r)) => r.contains(*n),
        (Constant::Range(inner), Constant::Range(r)) => inner.within(r),
        (_, Constant::Set(s)) => s.contains(value),
        _ => false,
    }
}

fn singleton(collection: &Constant) -> Option<Constant> {
    match collection {
        Constant::Range(r) => r.singleton().map(Constant::Int),
        Constant::Set(s) if s.len() == 1 => s.iter().next().cloned(),
        _ => None,
    }
}

fn is_subset(inner: &Constant, outer: &Constant) -> bool {
    match (inner, outer) {
        (Constant::Range(a), Constant::Range(b)) => a.within(b),
        (Constant::Set(a), _) => a.iter().all(|v| is_member(v, outer)),
        (Constant::Range(a), Constant::Set(b)) => range_within_set(a, b),
        _ => false,
    }
}

fn range_within_set(range: &Range, set: &BTreeSet<Constant>) -> bool {
    if range.is_empty() {
        return true;
    }
    // An unbounded or full-width range has no `len` and outgrows any finite set.
    match (range.lower, range.len()) {
        (Some(lo), Some(len)) if len <= set.len() as u64 => {
            (0..len).all(|i| set.contains(&Constant::Int(lo + i as i64)))
        }
        _ => false,
    }
}

fn member_types_within(collection: &Constant, types: &TypeSet) -> bool {
    match collection {
        Constant::Range(_) => types.contains(TypeIndex::INT),
        Constant::Set(s) => s.iter().all(|v| types.contains(v.type_index())),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dimension::DimensionTranslator;

    fn xy() -> (DimensionIndex, DimensionIndex) {
        let mut t = DimensionTranslator::new();
        (t.lookup("x").unwrap(), t.lookup("y").unwrap())
    }

    #[test]
    fn test_empty_region_matches_everything() {
        let (x, _) = xy();
        assert!(Region::any().satisfied_by(&Context::new()));
        assert!(Region::any().satisfied_by(&Context::from_pairs([(x, Constant::Int(9))])));
    }

    #[test]
    fn test_satisfaction() {
        let (x, y) = xy();
        let ctx = Context::from_pairs([(x, Constant::Int(1))]);

        assert!(Region::is([(x, Constant::Int(1))]).satisfied_by(&ctx));
        assert!(!Region::is([(x, Constant::Int(2))]).satisfied_by(&ctx));
        assert!(!Region::is([(y, Constant::Int(1))]).satisfied_by(&ctx));

        let within = Region::new([(x, Containment::In, Constant::range(0, 10))]).unwrap();
        assert!(within.satisfied_by(&ctx));

        let in_set = Region::new([(x, Containment::In, Constant::set([Constant::Int(3)]))]).unwrap();
        assert!(!in_set.satisfied_by(&ctx));

        let ints = Region::new([(x, Containment::Imp, Constant::of_type(TypeIndex::INT))]).unwrap();
        assert!(ints.satisfied_by(&ctx));
        assert!(!ints.satisfied_by(&Context::from_pairs([(x, Constant::str("a"))])));
    }

    #[test]
    fn test_malformed_guard_is_rejected() {
        let (x, _) = xy();
        let err = Region::new([(x, Containment::In, Constant::Int(3))]).unwrap_err();
        assert!(matches!(err, EngineError::MalformedGuard { dim, .. } if dim == x));
        assert!(Region::new([(x, Containment::Imp, Constant::range(0, 1))]).is_err());
    }

    #[test]
    fn test_is_more_specific_than_in() {
        let (x, _) = xy();
        let exact = Region::is([(x, Constant::Int(1))]);
        let ranged = Region::new([(x, Containment::In, Constant::range(0, 10))]).unwrap();

        assert!(exact.more_specific_than(&ranged));
        assert!(!ranged.more_specific_than(&exact));
        assert!(exact.more_specific_than(&Region::any()));
    }

    #[test]
    fn test_nested_ranges_and_sets() {
        let (x, _) = xy();
        let narrow = Region::new([(x, Containment::In, Constant::range(2, 4))]).unwrap();
        let wide = Region::new([(x, Containment::In, Constant::range(0, 10))]).unwrap();
        let set = Region::new([(
            x,
            Containment::In,
            Constant::set([Constant::Int(2), Constant::Int(3), Constant::Int(4)]),
        )])
        .unwrap();

        assert!(narrow.more_specific_than(&wide));
        assert!(set.more_specific_than(&wide));
        // Same points, different representation.
        assert!(set.refines(&narrow) && narrow.refines(&set));
        assert!(!set.more_specific_than(&narrow));

        let in_range = |r: Range| Region::new([(x, Containment::In, Constant::Range(r))]).unwrap();
        let one = Region::new([(x, Containment::In, Constant::set([Constant::Int(1)]))]).unwrap();
        let full = in_range(Range::bounded(i64::MIN, i64::MAX));
        let below = in_range(Range::new(None, Some(10)));
        let above = in_range(Range::new(Some(0), None));
        let everything = in_range(Range::new(None, None));

        assert!(one.more_specific_than(&full));
        assert!(!full.refines(&one));
        assert!(one.more_specific_than(&below));
        assert!(!below.refines(&one));
        assert!(!above.refines(&one));
        assert!(full.refines(&everything));
        assert!(narrow.more_specific_than(&below));
        assert!(!below.refines(&above) && !above.refines(&below));

        let edge = in_range(Range::bounded(i64::MAX - 1, i64::MAX));
        let edge_set = Region::new([(
            x,
            Containment::In,
            Constant::set([Constant::Int(i64::MAX - 1), Constant::Int(i64::MAX)]),
        )])
        .unwrap();
        assert!(edge.refines(&edge_set) && edge_set.refines(&edge));
    }

    #[test]
    fn test_types_order() {
        let (x, _) = xy();
        let ints = Region::new([(x, Containment::Imp, Constant::of_type(TypeIndex::INT))]).unwrap();
        let numbers = Region::new([(
            x,
            Containment::Imp,
            Constant::Type(TypeSet::new([TypeIndex::INT, TypeIndex::FLOAT])),
        )])
        .unwrap();
        let ranged = Region::new([(x, Containment::In, Constant::range(0, 10))]).unwrap();

        assert!(ints.more_specific_than(&numbers));
        assert!(ranged.more_specific_than(&ints));
        assert!(!ints.refines(&ranged));
    }

    #[test]
    fn test_disjoint_and_identical_guards_are_incomparable() {
        let (x, y) = xy();
        let gx = Region::is([(x, Constant::Int(1))]);
        let gy = Region::is([(y, Constant::Int(1))]);
        assert!(!gx.more_specific_than(&gy));
        assert!(!gy.more_specific_than(&gx));
        assert!(!gx.more_specific_than(&gx.clone()));
    }

    #[test]
    fn test_conjunction_is_more_specific() {
        let (x, y) = xy();
        let both = Region::is([(x, Constant::Int(1)), (y, Constant::Int(2))]);
        let one = Region::is([(x, Constant::Int(1))]);
        assert!(both.more_specific_than(&one));
        assert_eq!(both.dims(), vec![x, y]);
    }
}
