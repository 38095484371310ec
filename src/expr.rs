//! Expression trees and their compilation to evaluator nodes.
//!
//! Parsing is not done here: hosts build [`Expr`] values directly and call
//! [`compile`], which interns every dimension the tree names.

use crate::constant::Constant;
use crate::dimension::DimensionIndex;
use crate::error::{EngineError, EvalResult};
use crate::system::System;
use crate::workshops::{AtWs, ConstWs, DynamicHashWs, HashWs, IdentWs, IfWs, OpWs};
use crate::ws::Ws;
use std::rc::Rc;

/// An expression tree.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Const(Constant),
    /// A dimension used as a value, e.g. the key `n` in `E @ [n: 1]`.
    DimensionName(String),
    /// `#E`: the context's value at the dimension `E` denotes.
    Hash(Box<Expr>),
    /// A reference to a name.
    Ident(String),
    Op(String, Vec<Expr>),
    If(Box<Expr>, Box<Expr>, Box<Expr>),
    At(Box<Expr>, Vec<(Expr, Expr)>),
}

impl Expr {
    pub fn int(n: i64) -> Expr {
        Expr::Const(Constant::Int(n))
    }

    pub fn ident(name: &str) -> Expr {
        Expr::Ident(name.to_string())
    }

    /// `#name`.
    pub fn dim(name: &str) -> Expr {
        Expr::Hash(Box::new(Expr::DimensionName(name.to_string())))
    }

    pub fn op(name: &str, args: Vec<Expr>) -> Expr {
        Expr::Op(name.to_string(), args)
    }

    pub fn binary(name: &str, lhs: Expr, rhs: Expr) -> Expr {
        Expr::op(name, vec![lhs, rhs])
    }

    pub fn if_then_else(cond: Expr, then: Expr, otherwise: Expr) -> Expr {
        Expr::If(Box::new(cond), Box::new(then), Box::new(otherwise))
    }

    /// `body @ [d1: e1, ...]` with named dimension keys.
    pub fn at<'a>(body: Expr, bindings: impl IntoIterator<Item = (&'a str, Expr)>) -> Expr {
        Expr::At(
            Box::new(body),
            bindings
                .into_iter()
                .map(|(d, e)| (Expr::DimensionName(d.to_string()), e))
                .collect(),
        )
    }
}

/// Compile an expression tree against `sys`.
pub fn compile(expr: &Expr, sys: &System) -> EvalResult<Rc<dyn Ws>> {
    let ws: Rc<dyn Ws> = match expr {
        Expr::Const(c) => Rc::new(ConstWs::new(c.clone())),
        Expr::DimensionName(name) => {
            let dim = named_dimension(name, sys)?;
            Rc::new(ConstWs::new(Constant::Dimension(dim)))
        }
        Expr::Hash(inner) => match inner.as_ref() {
            Expr::DimensionName(name) => Rc::new(HashWs::new(named_dimension(name, sys)?)),
            Expr::Const(c) if c.is_special() => {
                return Err(EngineError::InvalidDimension(c.to_string()));
            }
            Expr::Const(c) => Rc::new(HashWs::new(sys.constant_dimension_index(c)?)),
            other => Rc::new(DynamicHashWs::new(compile(other, sys)?)),
        },
        Expr::Ident(name) => Rc::new(IdentWs::new(name.as_str())),
        Expr::Op(name, args) => {
            let args = args
                .iter()
                .map(|a| compile(a, sys))
                .collect::<EvalResult<Vec<_>>>()?;
            Rc::new(OpWs::new(name.as_str(), args))
        }
        Expr::If(cond, then, otherwise) => Rc::new(IfWs::new(
            compile(cond, sys)?,
            compile(then, sys)?,
            compile(otherwise, sys)?,
        )),
        Expr::At(body, bindings) => {
            let bindings = bindings
                .iter()
                .map(|(k, v)| -> EvalResult<(Rc<dyn Ws>, Rc<dyn Ws>)> {
                    Ok((compile(k, sys)?, compile(v, sys)?))
                })
                .collect::<EvalResult<Vec<_>>>()?;
            Rc::new(AtWs::new(compile(body, sys)?, bindings))
        }
    };
    Ok(ws)
}

fn named_dimension(name: &str, sys: &System) -> EvalResult<DimensionIndex> {
    if name.is_empty() {
        return Err(EngineError::InvalidDimension(String::new()));
    }
    sys.dimension_index(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::Builtins;
    use crate::constant::Special;
    use crate::context::Context;
    use crate::system::SystemBuilder;

    fn system() -> System {
        SystemBuilder::new().library(Builtins).build().unwrap()
    }

    #[test]
    fn test_compile_arithmetic() {
        let sys = system();
        let n = sys.dimension_index("n").unwrap();
        let expr = Expr::binary("+", Expr::dim("n"), Expr::int(1));
        let ws = compile(&expr, &sys).unwrap();

        let k = Context::from_pairs([(n, Constant::Int(41))]);
        assert_eq!(ws.eval(&sys, &k).unwrap(), Constant::Int(42));
    }

    #[test]
    fn test_compile_at_with_computed_value() {
        let sys = system();
        let n = sys.dimension_index("n").unwrap();
        let expr = Expr::at(Expr::dim("n"), [("n", Expr::binary("*", Expr::dim("n"), Expr::int(10)))]);
        let ws = compile(&expr, &sys).unwrap();

        let k = Context::from_pairs([(n, Constant::Int(3))]);
        assert_eq!(ws.eval(&sys, &k).unwrap(), Constant::Int(30));
    }

    #[test]
    fn test_compile_dynamic_hash() {
        let sys = system();
        let m = sys.dimension_index("m").unwrap();
        // #(if true then m else 0) reads dimension m.
        let expr = Expr::Hash(Box::new(Expr::if_then_else(
            Expr::Const(Constant::Bool(true)),
            Expr::DimensionName("m".into()),
            Expr::int(0),
        )));
        let ws = compile(&expr, &sys).unwrap();
        let k = Context::from_pairs([(m, Constant::str("hi"))]);
        assert_eq!(ws.eval(&sys, &k).unwrap(), Constant::str("hi"));
    }

    #[test]
    fn test_invalid_dimensions_are_rejected() {
        let sys = system();
        let special = Expr::Hash(Box::new(Expr::Const(Special::Undef.into())));
        assert!(matches!(compile(&special, &sys), Err(EngineError::InvalidDimension(_))));
        assert!(matches!(
            compile(&Expr::dim(""), &sys),
            Err(EngineError::InvalidDimension(_))
        ));
    }
}
