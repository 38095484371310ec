//! The evaluator protocol.
//!
//! Every compiled expression node and equation body is a [`Ws`]. The three
//! evaluation forms are views of one deterministic function: at the same
//! effective context they return the same value.

use crate::constant::Constant;
use crate::context::{Context, Delta};
use crate::error::EvalResult;
use crate::system::System;
use std::fmt;

/// Logical instant of the streamed execution model.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Instant(pub u64);

impl fmt::Display for Instant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// Identity of the logical thread a timed evaluation runs on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Thread(pub u32);

/// An evaluatable unit.
pub trait Ws {
    /// Evaluate at `context`.
    fn eval(&self, sys: &System, context: &Context) -> EvalResult<Constant>;

    /// Evaluate as if `kappa` were perturbed by `delta`.
    fn eval_delta(&self, sys: &System, kappa: &Context, delta: &Context) -> EvalResult<Constant> {
        self.eval(sys, &kappa.perturb(delta))
    }

    /// Evaluate at `kappa` with aggregate changes `delta`, at instant `t`.
    ///
    /// Returns the instant the value is valid for. No scheduler advances
    /// instants here, so the requested one is returned.
    fn eval_timed(
        &self,
        sys: &System,
        kappa: &Context,
        delta: &Delta,
        _thread: Thread,
        t: Instant,
    ) -> EvalResult<(Instant, Constant)> {
        let value = self.eval_delta(sys, kappa, &delta.flatten())?;
        Ok((t, value))
    }

    /// Short label for tracing.
    fn describe(&self) -> String {
        "ws".to_string()
    }
}
