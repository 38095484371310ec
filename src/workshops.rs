//! Concrete evaluator nodes.

use crate::constant::{Constant, Special};
use crate::context::{Context, Delta};
use crate::dimension::DimensionIndex;
use crate::error::EvalResult;
use crate::hyperdaton::Hyperdaton;
use crate::system::System;
use crate::ws::{Instant, Thread, Ws};
use std::rc::Rc;

/// A literal.
#[derive(Debug, Clone)]
pub struct ConstWs {
    value: Constant,
}

impl ConstWs {
    pub fn new(value: Constant) -> Self {
        ConstWs { value }
    }
}

impl Ws for ConstWs {
    fn eval(&self, _sys: &System, _context: &Context) -> EvalResult<Constant> {
        Ok(self.value.clone())
    }

    fn eval_delta(&self, _sys: &System, _kappa: &Context, _delta: &Context) -> EvalResult<Constant> {
        Ok(self.value.clone())
    }

    fn eval_timed(
        &self,
        _sys: &System,
        _kappa: &Context,
        _delta: &Delta,
        _thread: Thread,
        t: Instant,
    ) -> EvalResult<(Instant, Constant)> {
        Ok((t, self.value.clone()))
    }

    fn describe(&self) -> String {
        self.value.to_string()
    }
}

/// `#d` for a dimension known at compile time.
#[derive(Debug, Clone)]
pub struct HashWs {
    dim: DimensionIndex,
}

impl HashWs {
    pub fn new(dim: DimensionIndex) -> Self {
        HashWs { dim }
    }
}

fn read_or_missing(value: Option<&Constant>) -> Constant {
    value
        .cloned()
        .unwrap_or(Constant::Special(Special::Dimension))
}

impl Ws for HashWs {
    fn eval(&self, sys: &System, context: &Context) -> EvalResult<Constant> {
        sys.record_read(self.dim);
        Ok(read_or_missing(context.lookup(self.dim)))
    }

    fn eval_delta(&self, sys: &System, kappa: &Context, delta: &Context) -> EvalResult<Constant> {
        sys.record_read(self.dim);
        Ok(read_or_missing(
            delta.lookup(self.dim).or_else(|| kappa.lookup(self.dim)),
        ))
    }

    fn describe(&self) -> String {
        format!("#{}", self.dim)
    }
}

/// `#E`: evaluate `E`, then read the dimension it denotes.
pub struct DynamicHashWs {
    expr: Rc<dyn Ws>,
}

impl DynamicHashWs {
    pub fn new(expr: Rc<dyn Ws>) -> Self {
        DynamicHashWs { expr }
    }
}

impl Ws for DynamicHashWs {
    fn eval(&self, sys: &System, context: &Context) -> EvalResult<Constant> {
        let key = self.expr.eval(sys, context)?;
        if key.is_special() {
            return Ok(key);
        }
        let dim = sys.constant_dimension_index(&key)?;
        sys.record_read(dim);
        Ok(read_or_missing(context.lookup(dim)))
    }

    fn describe(&self) -> String {
        format!("#({})", self.expr.describe())
    }
}

/// A reference to a name, evaluated at the current context.
#[derive(Debug, Clone)]
pub struct IdentWs {
    name: Rc<str>,
}

impl IdentWs {
    pub fn new(name: impl Into<Rc<str>>) -> Self {
        IdentWs { name: name.into() }
    }
}

impl Ws for IdentWs {
    fn eval(&self, sys: &System, context: &Context) -> EvalResult<Constant> {
        sys.evaluate_name(&self.name, context)
    }

    fn describe(&self) -> String {
        self.name.to_string()
    }
}

/// An operator application, dispatched on operand types.
pub struct OpWs {
    op: Rc<str>,
    args: Vec<Rc<dyn Ws>>,
}

impl OpWs {
    pub fn new(op: impl Into<Rc<str>>, args: Vec<Rc<dyn Ws>>) -> Self {
        OpWs { op: op.into(), args }
    }
}

impl Ws for OpWs {
    fn eval(&self, sys: &System, context: &Context) -> EvalResult<Constant> {
        let values = self
            .args
            .iter()
            .map(|a| a.eval(sys, context))
            .collect::<EvalResult<Vec<_>>>()?;
        Ok(sys.types().apply_op(&self.op, &values))
    }

    fn describe(&self) -> String {
        let args: Vec<String> = self.args.iter().map(|a| a.describe()).collect();
        format!("{}({})", self.op, args.join(", "))
    }
}

/// `if c then a else b`. Only the chosen branch is evaluated.
pub struct IfWs {
    cond: Rc<dyn Ws>,
    then: Rc<dyn Ws>,
    otherwise: Rc<dyn Ws>,
}

impl IfWs {
    pub fn new(cond: Rc<dyn Ws>, then: Rc<dyn Ws>, otherwise: Rc<dyn Ws>) -> Self {
        IfWs {
            cond,
            then,
            otherwise,
        }
    }
}

impl Ws for IfWs {
    fn eval(&self, sys: &System, context: &Context) -> EvalResult<Constant> {
        match self.cond.eval(sys, context)? {
            Constant::Bool(true) => self.then.eval(sys, context),
            Constant::Bool(false) => self.otherwise.eval(sys, context),
            special @ Constant::Special(_) => Ok(special),
            _ => Ok(Constant::Special(Special::TypeError)),
        }
    }

    fn describe(&self) -> String {
        format!(
            "if {} then {} else {}",
            self.cond.describe(),
            self.then.describe(),
            self.otherwise.describe()
        )
    }
}

/// `E @ [k1: v1, ...]`: evaluate `E` in a perturbed context.
///
/// Keys and values are evaluated in the outer context. Reads the body makes
/// of overridden dimensions are not reads of the outer context.
pub struct AtWs {
    body: Rc<dyn Ws>,
    bindings: Vec<(Rc<dyn Ws>, Rc<dyn Ws>)>,
}

impl AtWs {
    pub fn new(body: Rc<dyn Ws>, bindings: Vec<(Rc<dyn Ws>, Rc<dyn Ws>)>) -> Self {
        AtWs { body, bindings }
    }

    fn perturbation(&self, sys: &System, context: &Context) -> EvalResult<Result<Context, Constant>> {
        let mut pairs = Vec::with_capacity(self.bindings.len());
        for (key, value) in &self.bindings {
            let key = key.eval(sys, context)?;
            if key.is_special() {
                return Ok(Err(key));
            }
            let dim = sys.constant_dimension_index(&key)?;
            pairs.push((dim, value.eval(sys, context)?));
        }
        Ok(Ok(Context::from_pairs(pairs)))
    }
}

impl Ws for AtWs {
    fn eval(&self, sys: &System, context: &Context) -> EvalResult<Constant> {
        let delta = match self.perturbation(sys, context)? {
            Ok(delta) => delta,
            Err(special) => return Ok(special),
        };
        let inner = context.perturb(&delta);
        let (result, reads) = sys.scoped(|| self.body.eval(sys, &inner));
        sys.record_reads(reads.into_iter().filter(|d| !delta.contains(*d)));
        result
    }

    fn describe(&self) -> String {
        format!("{} @ [..{}]", self.body.describe(), self.bindings.len())
    }
}

/// Adapter exposing a hyperdaton as an equation body.
pub struct HyperdatonWs {
    source: Rc<dyn Hyperdaton>,
}

impl HyperdatonWs {
    pub fn new(source: Rc<dyn Hyperdaton>) -> Self {
        HyperdatonWs { source }
    }
}

impl Ws for HyperdatonWs {
    fn eval(&self, sys: &System, context: &Context) -> EvalResult<Constant> {
        sys.record_reads(self.source.variance());
        Ok(self.source.get(context))
    }

    fn describe(&self) -> String {
        "hyperdaton".to_string()
    }
}
