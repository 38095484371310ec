//! Dimension interning.
//!
//! Every dimension is identified at run time by a small dense integer:
//! 1. Named dimensions (`n`, `time`, ...) are interned by name
//! 2. Typed constant dimensions are interned by value
//! 3. Anonymous dimensions come from [`DimensionTranslator::unique`]
//!
//! All three draw from one counter, so an index never denotes two keys.

use crate::constant::Constant;
use crate::error::{EngineError, EvalResult};
use rustc_hash::FxHashMap;
use std::fmt;

/// Interned dimension identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DimensionIndex(i32);

impl DimensionIndex {
    pub const TYPE: DimensionIndex = DimensionIndex(0);
    pub const TEXT: DimensionIndex = DimensionIndex(1);
    pub const NAME: DimensionIndex = DimensionIndex(2);
    pub const ID: DimensionIndex = DimensionIndex(3);
    pub const VALUE: DimensionIndex = DimensionIndex(4);
    pub const TIME: DimensionIndex = DimensionIndex(5);
    pub const ALL: DimensionIndex = DimensionIndex(6);

    pub fn as_i32(self) -> i32 {
        self.0
    }
}

impl fmt::Display for DimensionIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Names registered at fixed indices by every translator, in index order.
pub const RESERVED_DIMENSIONS: [&str; 7] = ["type", "text", "name", "id", "value", "time", "all"];

/// What a dimension index was allocated for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DimensionKey {
    Named(Box<str>),
    Constant(Constant),
    Unique,
}

impl fmt::Display for DimensionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DimensionKey::Named(name) => write!(f, "{}", name),
            DimensionKey::Constant(c) => write!(f, "{}", c),
            DimensionKey::Unique => write!(f, "<unique>"),
        }
    }
}

/// Grow-only table from dimension keys to indices.
///
/// There is no removal: an index stays bound to its key for the lifetime of
/// the translator.
#[derive(Debug)]
pub struct DimensionTranslator {
    named: FxHashMap<Box<str>, DimensionIndex>,
    constants: FxHashMap<Constant, DimensionIndex>,
    keys: Vec<DimensionKey>,
    limit: usize,
}

impl Default for DimensionTranslator {
    fn default() -> Self {
        Self::new()
    }
}

impl DimensionTranslator {
    /// Create a translator holding only the reserved dimensions.
    pub fn new() -> Self {
        Self::with_limit(usize::MAX)
    }

    /// A translator that allocates at most `limit` dimensions.
    ///
    /// The reserved dimensions are always present, even past `limit`.
    pub fn with_limit(limit: usize) -> Self {
        let keys = RESERVED_DIMENSIONS
            .iter()
            .map(|name| DimensionKey::Named((*name).into()))
            .collect();
        let named = RESERVED_DIMENSIONS
            .iter()
            .zip(0..)
            .map(|(name, i)| ((*name).into(), DimensionIndex(i)))
            .collect();
        DimensionTranslator {
            named,
            constants: FxHashMap::default(),
            keys,
            limit,
        }
    }

    fn allocate(&mut self, key: DimensionKey) -> EvalResult<DimensionIndex> {
        let len = self.keys.len();
        let index = i32::try_from(len)
            .ok()
            .filter(|_| len < self.limit)
            .ok_or(EngineError::CapacityExceeded {
                table: "dimension",
                len,
            })?;
        self.keys.push(key);
        Ok(DimensionIndex(index))
    }

    /// Intern a dimension name.
    pub fn lookup(&mut self, name: &str) -> EvalResult<DimensionIndex> {
        if let Some(&index) = self.named.get(name) {
            return Ok(index);
        }

        let boxed: Box<str> = name.into();
        let index = self.allocate(DimensionKey::Named(boxed.clone()))?;
        self.named.insert(boxed, index);
        Ok(index)
    }

    /// Intern a typed constant as a dimension.
    ///
    /// A `Constant::Dimension` already names a dimension and is returned as is.
    pub fn lookup_constant(&mut self, value: &Constant) -> EvalResult<DimensionIndex> {
        if let Constant::Dimension(index) = value {
            return Ok(*index);
        }
        if let Some(&index) = self.constants.get(value) {
            return Ok(index);
        }

        let index = self.allocate(DimensionKey::Constant(value.clone()))?;
        self.constants.insert(value.clone(), index);
        Ok(index)
    }

    /// Allocate a dimension that no name or constant can ever reach.
    pub fn unique(&mut self) -> EvalResult<DimensionIndex> {
        self.allocate(DimensionKey::Unique)
    }

    /// Find a named dimension without interning it.
    pub fn find(&self, name: &str) -> Option<DimensionIndex> {
        self.named.get(name).copied()
    }

    /// Reverse lookup from an index to the key it was allocated for.
    pub fn resolve(&self, index: DimensionIndex) -> Option<&DimensionKey> {
        usize::try_from(index.0).ok().and_then(|i| self.keys.get(i))
    }

    /// Number of allocated dimensions, reserved ones included.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
