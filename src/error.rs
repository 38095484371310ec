//! Internal faults of the evaluation engine.
//!
//! Domain errors (undefined, ambiguous, cyclic, type errors) are ordinary
//! [`Constant`](crate::constant::Constant) values carrying a
//! [`Special`](crate::constant::Special). The variants here are reserved for
//! broken engine invariants and exhausted resource limits, and abort only the
//! evaluation request in flight.

use crate::dimension::DimensionIndex;
use crate::equation::EquationId;
use thiserror::Error;

/// Internal-fault channel, distinct from in-band `Special` values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("malformed guard on dimension {dim}: {reason}")]
    MalformedGuard { dim: DimensionIndex, reason: String },

    #[error("equation {0} is already defined")]
    DuplicateEquation(EquationId),

    #[error("cache for `{name}` is structurally inconsistent: {reason}")]
    CacheInconsistency { name: String, reason: String },

    #[error("dimension index {0} is not known to the translator")]
    UnknownDimension(DimensionIndex),

    /// Resource limit, not an invariant fault: recursion went deeper than
    /// `EngineConfig::max_depth`.
    #[error("evaluation of `{name}` exceeded the maximum depth of {limit}")]
    DepthExceeded { name: String, limit: usize },

    /// Resource limit: an interning table cannot hand out another index.
    #[error("the {table} table is full at {len} entries")]
    CapacityExceeded { table: &'static str, len: usize },

    #[error("value `{0}` cannot be used as a dimension")]
    InvalidDimension(String),

    #[error("library `{library}` failed to register: {reason}")]
    Registration { library: String, reason: String },
}

/// Result type for every evaluation form.
pub type EvalResult<T> = Result<T, EngineError>;
