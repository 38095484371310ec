//! Builtin operators.
//!
//! Operators are registered per operand type signature:
//! - Integers: checked `+ - * / %`, comparisons, `neg`, and `..` building a range
//! - Floats: `+ - * /`, comparisons, `neg`
//! - Booleans: `&& || !`
//! - Strings: `+` concatenation and comparisons
//!
//! Integer overflow and division by zero give `special<arith>`.

use crate::constant::{Constant, Range, Special};
use crate::error::EvalResult;
use crate::system::{Library, System};
use crate::types::{OpFn, TypeIndex, TypeRegistry};
use ordered_float::OrderedFloat;
use std::cmp::Ordering;
use std::rc::Rc;

/// The builtin operator library.
#[derive(Debug, Clone, Copy, Default)]
pub struct Builtins;

const COMPARISONS: [(&str, fn(Ordering) -> bool); 6] = [
    ("==", Ordering::is_eq),
    ("!=", Ordering::is_ne),
    ("<", Ordering::is_lt),
    ("<=", Ordering::is_le),
    (">", Ordering::is_gt),
    (">=", Ordering::is_ge),
];

fn int_op(f: fn(i64, i64) -> Option<i64>) -> OpFn {
    Rc::new(move |args: &[Constant]| match args {
        [Constant::Int(a), Constant::Int(b)] => f(*a, *b)
            .map(Constant::Int)
            .unwrap_or(Constant::Special(Special::Arith)),
        _ => Constant::Special(Special::TypeError),
    })
}

fn float_op(f: fn(f64, f64) -> f64) -> OpFn {
    Rc::new(move |args: &[Constant]| match args {
        [Constant::Float(a), Constant::Float(b)] => Constant::Float(OrderedFloat(f(a.0, b.0))),
        _ => Constant::Special(Special::TypeError),
    })
}

fn compare_op(test: fn(Ordering) -> bool) -> OpFn {
    Rc::new(move |args: &[Constant]| match args {
        [a, b] => Constant::Bool(test(a.cmp(b))),
        _ => Constant::Special(Special::TypeError),
    })
}

fn register_arithmetic(types: &mut TypeRegistry) {
    let ints = [TypeIndex::INT, TypeIndex::INT];
    types.register_op("+", &ints, int_op(i64::checked_add));
    types.register_op("-", &ints, int_op(i64::checked_sub));
    types.register_op("*", &ints, int_op(i64::checked_mul));
    types.register_op("/", &ints, int_op(i64::checked_div));
    types.register_op("%", &ints, int_op(i64::checked_rem));
    types.register_op(
        "neg",
        &[TypeIndex::INT],
        Rc::new(|args: &[Constant]| match args {
            [Constant::Int(a)] => a
                .checked_neg()
                .map(Constant::Int)
                .unwrap_or(Constant::Special(Special::Arith)),
            _ => Constant::Special(Special::TypeError),
        }),
    );
    types.register_op(
        "..",
        &ints,
        Rc::new(|args: &[Constant]| match args {
            [Constant::Int(a), Constant::Int(b)] => Constant::Range(Range::bounded(*a, *b)),
            _ => Constant::Special(Special::TypeError),
        }),
    );

    let floats = [TypeIndex::FLOAT, TypeIndex::FLOAT];
    types.register_op("+", &floats, float_op(|a, b| a + b));
    types.register_op("-", &floats, float_op(|a, b| a - b));
    types.register_op("*", &floats, float_op(|a, b| a * b));
    types.register_op("/", &floats, float_op(|a, b| a / b));
    types.register_op(
        "neg",
        &[TypeIndex::FLOAT],
        Rc::new(|args: &[Constant]| match args {
            [Constant::Float(a)] => Constant::Float(-*a),
            _ => Constant::Special(Special::TypeError),
        }),
    );
}

fn register_logic(types: &mut TypeRegistry) {
    let bools = [TypeIndex::BOOL, TypeIndex::BOOL];
    types.register_op(
        "&&",
        &bools,
        Rc::new(|args: &[Constant]| match args {
            [Constant::Bool(a), Constant::Bool(b)] => Constant::Bool(*a && *b),
            _ => Constant::Special(Special::TypeError),
        }),
    );
    types.register_op(
        "||",
        &bools,
        Rc::new(|args: &[Constant]| match args {
            [Constant::Bool(a), Constant::Bool(b)] => Constant::Bool(*a || *b),
            _ => Constant::Special(Special::TypeError),
        }),
    );
    types.register_op(
        "!",
        &[TypeIndex::BOOL],
        Rc::new(|args: &[Constant]| match args {
            [Constant::Bool(a)] => Constant::Bool(!*a),
            _ => Constant::Special(Special::TypeError),
        }),
    );
}

fn register_text(types: &mut TypeRegistry) {
    types.register_op(
        "+",
        &[TypeIndex::STRING, TypeIndex::STRING],
        Rc::new(|args: &[Constant]| match args {
            [Constant::Str(a), Constant::Str(b)] => Constant::str(format!("{}{}", a, b)),
            _ => Constant::Special(Special::TypeError),
        }),
    );
}

fn register_comparisons(types: &mut TypeRegistry) {
    let ordered = [
        TypeIndex::INT,
        TypeIndex::FLOAT,
        TypeIndex::STRING,
        TypeIndex::CHAR,
    ];
    for t in ordered {
        for (name, test) in COMPARISONS {
            types.register_op(name, &[t, t], compare_op(test));
        }
    }

    let equatable = [
        TypeIndex::BOOL,
        TypeIndex::RANGE,
        TypeIndex::SET,
        TypeIndex::TYPE,
        TypeIndex::DIMENSION,
    ];
    for t in equatable {
        for (name, test) in &COMPARISONS[..2] {
            types.register_op(name, &[t, t], compare_op(*test));
        }
    }
}

impl Library for Builtins {
    fn name(&self) -> &str {
        "builtins"
    }

    fn register(&self, sys: &mut System) -> EvalResult<()> {
        let types = sys.types_mut();
        register_arithmetic(types);
        register_logic(types);
        register_text(types);
        register_comparisons(types);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> TypeRegistry {
        let mut types = TypeRegistry::new();
        register_arithmetic(&mut types);
        register_logic(&mut types);
        register_text(&mut types);
        register_comparisons(&mut types);
        types
    }

    fn apply(types: &TypeRegistry, op: &str, args: &[Constant]) -> Constant {
        types.apply_op(op, args)
    }

    #[test]
    fn test_checked_integer_arithmetic() {
        let types = registry();
        assert_eq!(apply(&types, "*", &[Constant::Int(6), Constant::Int(7)]), Constant::Int(42));
        assert_eq!(apply(&types, "-", &[Constant::Int(1), Constant::Int(3)]), Constant::Int(-2));
        assert_eq!(
            apply(&types, "/", &[Constant::Int(1), Constant::Int(0)]),
            Special::Arith.into()
        );
        assert_eq!(
            apply(&types, "*", &[Constant::Int(i64::MAX), Constant::Int(2)]),
            Special::Arith.into()
        );
        assert_eq!(apply(&types, "neg", &[Constant::Int(i64::MIN)]), Special::Arith.into());
    }

    #[test]
    fn test_mixed_operands_are_type_errors() {
        let types = registry();
        assert_eq!(
            apply(&types, "+", &[Constant::Int(1), Constant::float(1.0)]),
            Special::TypeError.into()
        );
        assert_eq!(
            apply(&types, "&&", &[Constant::Bool(true), Constant::Int(1)]),
            Special::TypeError.into()
        );
    }

    #[test]
    fn test_specials_pass_through() {
        let types = registry();
        assert_eq!(
            apply(&types, "*", &[Constant::Int(2), Special::Loop.into()]),
            Special::Loop.into()
        );
    }

    #[test]
    fn test_comparisons_and_logic() {
        let types = registry();
        assert_eq!(apply(&types, "<", &[Constant::Int(1), Constant::Int(2)]), Constant::Bool(true));
        assert_eq!(apply(&types, ">=", &[Constant::str("a"), Constant::str("b")]), Constant::Bool(false));
        assert_eq!(apply(&types, "==", &[Constant::Bool(true), Constant::Bool(true)]), Constant::Bool(true));
        assert_eq!(apply(&types, "!", &[Constant::Bool(true)]), Constant::Bool(false));
        assert_eq!(
            apply(&types, "<", &[Constant::Bool(false), Constant::Bool(true)]),
            Special::TypeError.into()
        );
    }

    #[test]
    fn test_range_and_concat() {
        let types = registry();
        assert_eq!(apply(&types, "..", &[Constant::Int(1), Constant::Int(3)]), Constant::range(1, 3));
        assert_eq!(apply(&types, "+", &[Constant::str("ab"), Constant::str("c")]), Constant::str("abc"));
        assert_eq!(
            apply(&types, "/", &[Constant::float(1.0), Constant::float(4.0)]),
            Constant::float(0.25)
        );
    }
}
