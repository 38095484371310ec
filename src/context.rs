//! Contexts: immutable mappings from dimensions to values.
//!
//! A [`Context`] is the universal evaluation key. Entries are kept sorted by
//! dimension index with no duplicates, so equality, ordering and hashing are
//! lexicographic over `(dimension, value)` pairs.

use crate::constant::Constant;
use crate::dimension::DimensionIndex;
use std::fmt;
use std::rc::Rc;

/// An immutable, dimension-ordered tuple.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Context {
    entries: Rc<[(DimensionIndex, Constant)]>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    /// The empty context.
    pub fn new() -> Self {
        Context::from_sorted(Vec::new())
    }

    /// Build a context from unordered pairs.
    ///
    /// A repeated dimension keeps the value that appears last.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (DimensionIndex, Constant)>) -> Self {
        let mut entries: Vec<(DimensionIndex, Constant)> = Vec::new();
        for (dim, value) in pairs {
            match entries.binary_search_by_key(&dim, |(d, _)| *d) {
                Ok(i) => entries[i].1 = value,
                Err(i) => entries.insert(i, (dim, value)),
            }
        }
        Context {
            entries: entries.into(),
        }
    }

    fn from_sorted(entries: Vec<(DimensionIndex, Constant)>) -> Self {
        Context {
            entries: entries.into(),
        }
    }

    /// Value at a dimension, or `None` if the dimension is not present.
    pub fn lookup(&self, dim: DimensionIndex) -> Option<&Constant> {
        self.entries
            .binary_search_by_key(&dim, |(d, _)| *d)
            .ok()
            .map(|i| &self.entries[i].1)
    }

    pub fn contains(&self, dim: DimensionIndex) -> bool {
        self.lookup(dim).is_some()
    }

    /// Restrict to the given dimensions. Dimensions not present are skipped.
    pub fn project(&self, dims: &[DimensionIndex]) -> Context {
        let entries = self
            .entries
            .iter()
            .filter(|(d, _)| dims.contains(d))
            .cloned()
            .collect();
        Context::from_sorted(entries)
    }

    /// Override or extend with the entries of `delta`.
    pub fn perturb(&self, delta: &Context) -> Context {
        if delta.is_empty() {
            return self.clone();
        }
        if self.is_empty() {
            return delta.clone();
        }

        let (left, right) = (&self.entries, &delta.entries);
        let mut merged = Vec::with_capacity(left.len() + right.len());
        let (mut i, mut j) = (0, 0);
        while i < left.len() && j < right.len() {
            if left[i].0 < right[j].0 {
                merged.push(left[i].clone());
                i += 1;
            } else {
                if left[i].0 == right[j].0 {
                    i += 1;
                }
                merged.push(right[j].clone());
                j += 1;
            }
        }
        merged.extend_from_slice(&left[i..]);
        merged.extend_from_slice(&right[j..]);
        Context::from_sorted(merged)
    }

    /// Bind a single dimension.
    pub fn bind(&self, dim: DimensionIndex, value: Constant) -> Context {
        self.perturb(&Context::from_pairs([(dim, value)]))
    }

    pub fn iter(&self) -> impl Iterator<Item = &(DimensionIndex, Constant)> {
        self.entries.iter()
    }

    pub fn dims(&self) -> impl Iterator<Item = DimensionIndex> + '_ {
        self.entries.iter().map(|(d, _)| *d)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(DimensionIndex, Constant)> for Context {
    fn from_iter<I: IntoIterator<Item = (DimensionIndex, Constant)>>(iter: I) -> Self {
        Context::from_pairs(iter)
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, (d, v)) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}:{}", d, v)?;
        }
        write!(f, "]")
    }
}

/// Aggregate changes applied on top of a base context.
///
/// Perturbations are applied in order, so a later one overrides an earlier
/// one on the same dimension.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Delta {
    changes: Vec<Context>,
}

impl Delta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, change: Context) {
        if !change.is_empty() {
            self.changes.push(change);
        }
    }

    /// Collapse all perturbations into one context.
    pub fn flatten(&self) -> Context {
        self.changes
            .iter()
            .fold(Context::new(), |acc, c| acc.perturb(c))
    }

    /// The effective context: `base` perturbed by every change.
    pub fn apply(&self, base: &Context) -> Context {
        self.changes.iter().fold(base.clone(), |acc, c| acc.perturb(c))
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

impl From<Context> for Delta {
    fn from(change: Context) -> Self {
        let mut delta = Delta::new();
        delta.push(change);
        delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dimension::DimensionTranslator;
    use proptest::prelude::*;

    fn dims() -> (DimensionIndex, DimensionIndex, DimensionIndex) {
        let mut t = DimensionTranslator::new();
        (t.lookup("x").unwrap(), t.lookup("y").unwrap(), t.lookup("z").unwrap())
    }

    #[test]
    fn test_canonical_order() {
        let (x, y, z) = dims();
        let a = Context::from_pairs([(z, Constant::Int(3)), (x, Constant::Int(1)), (y, Constant::Int(2))]);
        let b = Context::from_pairs([(y, Constant::Int(2)), (z, Constant::Int(3)), (x, Constant::Int(1))]);
        assert_eq!(a, b);
        assert_eq!(a.dims().collect::<Vec<_>>(), vec![x, y, z]);
    }

    #[test]
    fn test_last_write_wins() {
        let (x, _, _) = dims();
        let c = Context::from_pairs([(x, Constant::Int(1)), (x, Constant::Int(2))]);
        assert_eq!(c.len(), 1);
        assert_eq!(c.lookup(x), Some(&Constant::Int(2)));
    }

    #[test]
    fn test_absent_lookup_is_none() {
        let (x, y, _) = dims();
        let c = Context::from_pairs([(x, Constant::Int(1))]);
        assert!(c.lookup(y).is_none());
        assert!(!c.contains(y));
    }

    #[test]
    fn test_project() {
        let (x, y, z) = dims();
        let c = Context::from_pairs([(x, Constant::Int(1)), (y, Constant::Int(2)), (z, Constant::Int(3))]);
        let p = c.project(&[z, x]);
        assert_eq!(p, Context::from_pairs([(x, Constant::Int(1)), (z, Constant::Int(3))]));
    }

    #[test]
    fn test_perturb_does_not_touch_original() {
        let (x, y, _) = dims();
        let base = Context::from_pairs([(x, Constant::Int(1))]);
        let changed = base.perturb(&Context::from_pairs([(x, Constant::Int(5)), (y, Constant::Int(6))]));

        assert_eq!(base.lookup(x), Some(&Constant::Int(1)));
        assert_eq!(changed.lookup(x), Some(&Constant::Int(5)));
        assert_eq!(changed.lookup(y), Some(&Constant::Int(6)));
        assert_eq!(base.bind(y, Constant::Int(6)).len(), 2);
    }

    #[test]
    fn test_ordering_by_dimension_then_value() {
        let (x, y, _) = dims();
        let a = Context::from_pairs([(x, Constant::Int(1))]);
        let b = Context::from_pairs([(x, Constant::Int(2))]);
        let c = Context::from_pairs([(y, Constant::Int(0))]);
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn test_delta_applies_in_order() {
        let (x, y, _) = dims();
        let mut delta = Delta::new();
        delta.push(Context::from_pairs([(x, Constant::Int(1))]));
        delta.push(Context::from_pairs([(x, Constant::Int(2)), (y, Constant::Int(3))]));

        let base = Context::from_pairs([(y, Constant::Int(0))]);
        let applied = delta.apply(&base);
        assert_eq!(applied.lookup(x), Some(&Constant::Int(2)));
        assert_eq!(applied.lookup(y), Some(&Constant::Int(3)));
        assert_eq!(base.perturb(&delta.flatten()), applied);
    }

    proptest! {
        #[test]
        fn construction_is_order_independent(
            pairs in proptest::collection::btree_map(0i32..12, -50i64..50, 0..10)
        ) {
            let mut t = DimensionTranslator::new();
            let entries: Vec<(DimensionIndex, Constant)> = pairs
                .iter()
                .map(|(d, v)| (t.lookup(&format!("d{}", d)).unwrap(), Constant::Int(*v)))
                .collect();

            let forward = Context::from_pairs(entries.clone());
            let backward = Context::from_pairs(entries.iter().rev().cloned());
            prop_assert_eq!(&forward, &backward);
            prop_assert_eq!(forward.len(), pairs.len());

            let sorted: Vec<_> = forward.dims().collect();
            prop_assert!(sorted.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
