//! tlcore: context-indexed evaluation for an intensional dataflow language.
//!
//! Every quantity is a function from a context (values bound to named
//! dimensions) to a value. Several guarded equations may define one name;
//! the most specific satisfied one wins at evaluation time.
//!
//! This crate provides:
//! - Dimension interning and the value model
//! - Contexts, guards and equation groups
//! - Best-fit dispatch by guard specificity
//! - A demand cache keyed by the dimensions a computation reads
//! - The evaluator protocol with its concrete nodes
//! - Hyperdatons and a builtin operator library

pub mod bestfit;
pub mod builtins;
pub mod cache;
pub mod constant;
pub mod context;
pub mod dimension;
pub mod equation;
pub mod error;
pub mod expr;
pub mod hyperdaton;
pub mod region;
pub mod system;
pub mod types;
pub mod workshops;
pub mod ws;

// Re-exports for convenience
pub use bestfit::Selection;
pub use builtins::Builtins;
pub use cache::{Lookup, Warehouse};
pub use constant::{Constant, OpaqueValue, Range, Special, TypeSet};
pub use context::{Context, Delta};
pub use dimension::{DimensionIndex, DimensionKey, DimensionTranslator};
pub use equation::{Definition, Equation, EquationGroup, EquationId};
pub use error::{EngineError, EvalResult};
pub use expr::{compile, Expr};
pub use hyperdaton::{ConstantHd, Hyperdaton, TableHd};
pub use region::{Containment, Region};
pub use system::{EngineConfig, EvalStats, Library, System, SystemBuilder};
pub use types::{TypeIndex, TypeRegistry};
pub use ws::{Instant, Thread, Ws};
