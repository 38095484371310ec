//! External value sources.
//!
//! A hyperdaton supplies a value for a context and declares which dimensions
//! can affect it. The declared variance is taken as given: the evaluator
//! records exactly those dimensions as read.

use crate::constant::{Constant, Special};
use crate::context::Context;
use crate::dimension::DimensionIndex;
use rustc_hash::FxHashMap;

/// A context-varying data source.
pub trait Hyperdaton {
    fn get(&self, context: &Context) -> Constant;

    /// Dimensions whose value can affect `get`.
    fn variance(&self) -> Vec<DimensionIndex>;
}

/// A source with one value everywhere.
#[derive(Debug, Clone)]
pub struct ConstantHd {
    value: Constant,
}

impl ConstantHd {
    pub fn new(value: Constant) -> Self {
        ConstantHd { value }
    }
}

impl Hyperdaton for ConstantHd {
    fn get(&self, _context: &Context) -> Constant {
        self.value.clone()
    }

    fn variance(&self) -> Vec<DimensionIndex> {
        Vec::new()
    }
}

/// Rows keyed by the projection of the context onto a fixed set of dimensions.
///
/// A context with no matching row yields `special<access>`.
#[derive(Debug, Clone)]
pub struct TableHd {
    dims: Vec<DimensionIndex>,
    rows: FxHashMap<Context, Constant>,
}

impl TableHd {
    pub fn new(dims: impl IntoIterator<Item = DimensionIndex>) -> Self {
        let mut dims: Vec<DimensionIndex> = dims.into_iter().collect();
        dims.sort();
        dims.dedup();
        TableHd {
            dims,
            rows: FxHashMap::default(),
        }
    }

    /// Insert a row. The key is projected onto the table's dimensions.
    pub fn insert(&mut self, key: &Context, value: Constant) {
        self.rows.insert(key.project(&self.dims), value);
    }

    pub fn with_row(mut self, key: &Context, value: Constant) -> Self {
        self.insert(key, value);
        self
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl Hyperdaton for TableHd {
    fn get(&self, context: &Context) -> Constant {
        self.rows
            .get(&context.project(&self.dims))
            .cloned()
            .unwrap_or(Constant::Special(Special::Access))
    }

    fn variance(&self) -> Vec<DimensionIndex> {
        self.dims.clone()
    }
}
