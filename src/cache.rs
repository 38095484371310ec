//! Demand cache for evaluated names.
//!
//! Each name owns a trie. An interior node branches on one dimension, keyed
//! by the context's value there (absence is a key of its own); a leaf holds
//! the computed value. A value is stored under the dimensions that were read
//! to compute it, so contexts that differ only in unread dimensions share a
//! leaf. Branch dimensions are taken in ascending order along a path.
//!
//! In-progress markers are kept per exact context beside the tries and are
//! consulted first.

use crate::constant::Constant;
use crate::context::Context;
use crate::dimension::DimensionIndex;
use crate::error::{EngineError, EvalResult};
use rustc_hash::{FxHashMap, FxHashSet};
use std::rc::Rc;

/// Result of a cache probe.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Lookup {
    Hit(Constant),
    /// The (name, context) pair is currently being evaluated.
    InProgress,
    Miss,
}

#[derive(Debug)]
enum CacheNode {
    Empty,
    Value(Constant),
    Branch {
        dim: DimensionIndex,
        children: FxHashMap<Option<Constant>, CacheNode>,
    },
}

impl CacheNode {
    fn count_values(&self) -> usize {
        match self {
            CacheNode::Empty => 0,
            CacheNode::Value(_) => 1,
            CacheNode::Branch { children, .. } => children.values().map(|c| c.count_values()).sum(),
        }
    }
}

/// Per-name memo tries plus in-progress markers.
#[derive(Debug, Default)]
pub struct Warehouse {
    tries: FxHashMap<Rc<str>, CacheNode>,
    in_progress: FxHashSet<(Rc<str>, Context)>,
}

impl Warehouse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Probe the cache. Creates nothing.
    pub fn get(&self, name: &Rc<str>, context: &Context) -> Lookup {
        self.probe(name, context).0
    }

    /// Probe the cache, also returning the dimensions branched on along the
    /// path taken. A hit depends on exactly those dimensions.
    pub fn probe(&self, name: &Rc<str>, context: &Context) -> (Lookup, Vec<DimensionIndex>) {
        if self.in_progress.contains(&(name.clone(), context.clone())) {
            return (Lookup::InProgress, Vec::new());
        }

        let mut path = Vec::new();
        let mut node = match self.tries.get(name) {
            Some(root) => root,
            None => return (Lookup::Miss, path),
        };
        loop {
            match node {
                CacheNode::Empty => return (Lookup::Miss, path),
                CacheNode::Value(v) => return (Lookup::Hit(v.clone()), path),
                CacheNode::Branch { dim, children } => {
                    path.push(*dim);
                    match children.get(&context.lookup(*dim).cloned()) {
                        Some(child) => node = child,
                        None => return (Lookup::Miss, path),
                    }
                }
            }
        }
    }

    /// Store `value` for `name`, valid for every context that agrees with
    /// `context` on `variance`.
    pub fn set(
        &mut self,
        name: &Rc<str>,
        context: &Context,
        variance: &[DimensionIndex],
        value: Constant,
    ) -> EvalResult<()> {
        let mut remaining: Vec<DimensionIndex> = variance.to_vec();
        remaining.sort();
        remaining.dedup();

        let mut node = self.tries.entry(name.clone()).or_insert(CacheNode::Empty);
        loop {
            match node {
                CacheNode::Branch { dim, children } => {
                    let dim = *dim;
                    remaining.retain(|d| *d != dim);
                    node = children
                        .entry(context.lookup(dim).cloned())
                        .or_insert(CacheNode::Empty);
                }
                CacheNode::Empty | CacheNode::Value(_) if remaining.is_empty() => {
                    *node = CacheNode::Value(value);
                    return Ok(());
                }
                CacheNode::Empty => {
                    *node = CacheNode::Branch {
                        dim: remaining[0],
                        children: FxHashMap::default(),
                    };
                }
                CacheNode::Value(_) => {
                    return Err(EngineError::CacheInconsistency {
                        name: name.to_string(),
                        reason: format!(
                            "leaf reached with unkeyed dimensions {:?}",
                            remaining.iter().map(|d| d.as_i32()).collect::<Vec<_>>()
                        ),
                    });
                }
            }
        }
    }

    /// Mark (name, context) as being evaluated. Returns false if it already was.
    pub fn mark_in_progress(&mut self, name: &Rc<str>, context: &Context) -> bool {
        self.in_progress.insert((name.clone(), context.clone()))
    }

    pub fn clear_in_progress(&mut self, name: &Rc<str>, context: &Context) {
        self.in_progress.remove(&(name.clone(), context.clone()));
    }

    pub fn is_in_progress(&self, name: &Rc<str>, context: &Context) -> bool {
        self.in_progress.contains(&(name.clone(), context.clone()))
    }

    /// Discard every cached value of `name`. Returns whether anything was held.
    pub fn invalidate(&mut self, name: &str) -> bool {
        self.tries.remove(name).is_some()
    }

    /// Drop all tries and in-progress markers.
    pub fn clear(&mut self) {
        self.tries.clear();
        self.in_progress.clear();
    }

    /// Number of stored values for `name`.
    pub fn value_count(&self, name: &str) -> usize {
        self.tries.get(name).map_or(0, |root| root.count_values())
    }

    /// Number of names with a trie.
    pub fn len(&self) -> usize {
        self.tries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tries.is_empty()
    }
}
