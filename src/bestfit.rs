//! Best-fit selection among a name's equations.
//!
//! An equation applies when its guard is satisfied and its condition, if
//! any, evaluates to `true`. Among the applicable equations the maximal ones
//! under guard specificity are kept; exactly one maximal equation wins.

use crate::constant::Constant;
use crate::context::Context;
use crate::equation::{Equation, EquationGroup, EquationId};
use crate::error::EvalResult;
use crate::system::System;
use std::rc::Rc;

/// Outcome of best-fit selection.
#[derive(Debug)]
pub enum Selection {
    /// No equation applies.
    Undefined,
    /// Several incomparable equations apply, in group order.
    Ambiguous(Vec<EquationId>),
    Unique(Rc<Equation>),
}

/// Select the equation of `group` that defines its name at `context`.
///
/// Every guard dimension inspected is recorded as read, whether or not the
/// guard is satisfied.
pub fn select(sys: &System, group: &EquationGroup, context: &Context) -> EvalResult<Selection> {
    let mut applicable: Vec<&Rc<Equation>> = Vec::new();

    for equation in group.iter() {
        sys.record_reads(equation.guard.entries().iter().map(|e| e.dim));
        if !equation.guard.satisfied_by(context) {
            continue;
        }
        if let Some(condition) = &equation.condition {
            let verdict: Constant = condition.eval(sys, context)?;
            if !verdict.is_true() {
                continue;
            }
        }
        applicable.push(equation);
    }

    if applicable.len() <= 1 {
        return Ok(match applicable.pop() {
            Some(only) => Selection::Unique(only.clone()),
            None => Selection::Undefined,
        });
    }

    let maximal: Vec<&Rc<Equation>> = applicable
        .iter()
        .filter(|candidate| {
            !applicable
                .iter()
                .any(|other| other.guard.more_specific_than(&candidate.guard))
        })
        .copied()
        .collect();

    Ok(match maximal.as_slice() {
        [winner] => Selection::Unique((*winner).clone()),
        _ => Selection::Ambiguous(maximal.iter().map(|e| e.id).collect()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constant::Special;
    use crate::equation::Definition;
    use crate::region::{Containment, Region};
    use crate::workshops::ConstWs;

    fn body(n: i64) -> Rc<ConstWs> {
        Rc::new(ConstWs::new(Constant::Int(n)))
    }

    #[test]
    fn test_empty_group_is_undefined() {
        let sys = System::new();
        let group = EquationGroup::new("f");
        assert!(matches!(select(&sys, &group, &Context::new()).unwrap(), Selection::Undefined));
    }

    #[test]
    fn test_chain_of_refinements_picks_narrowest() {
        let sys = System::new();
        let x = sys.dimension_index("x").unwrap();
        let mut group = EquationGroup::new("f");
        let wide = EquationId::new();
        let mid = EquationId::new();
        let narrow = EquationId::new();

        group.add(wide, Definition::unguarded(body(0)), 0).unwrap();
        group
            .add(
                mid,
                Definition::new(Region::new([(x, Containment::In, Constant::range(0, 9))]).unwrap(), body(1)),
                0,
            )
            .unwrap();
        group
            .add(narrow, Definition::new(Region::is([(x, Constant::Int(3))]), body(2)), 0)
            .unwrap();

        let k = Context::from_pairs([(x, Constant::Int(3))]);
        match select(&sys, &group, &k).unwrap() {
            Selection::Unique(e) => assert_eq!(e.id, narrow),
            other => panic!("expected a unique winner, got {:?}", other),
        }

        let k = Context::from_pairs([(x, Constant::Int(4))]);
        match select(&sys, &group, &k).unwrap() {
            Selection::Unique(e) => assert_eq!(e.id, mid),
            other => panic!("expected a unique winner, got {:?}", other),
        }
    }

    #[test]
    fn test_ambiguous_candidates_in_group_order() {
        let sys = System::new();
        let mut group = EquationGroup::new("f");
        let (late, early) = (EquationId::new(), EquationId::new());
        group.add(late, Definition::unguarded(body(1)), 2).unwrap();
        group.add(early, Definition::unguarded(body(2)), 1).unwrap();

        match select(&sys, &group, &Context::new()).unwrap() {
            Selection::Ambiguous(ids) => assert_eq!(ids, vec![early, late]),
            other => panic!("expected ambiguity, got {:?}", other),
        }
    }

    #[test]
    fn test_false_condition_removes_candidate() {
        let sys = System::new();
        let mut group = EquationGroup::new("f");
        let kept = EquationId::new();
        group.add(kept, Definition::unguarded(body(1)), 0).unwrap();
        group
            .add(
                EquationId::new(),
                Definition::unguarded(body(2)).with_condition(Rc::new(ConstWs::new(Special::Undef.into()))),
                0,
            )
            .unwrap();

        match select(&sys, &group, &Context::new()).unwrap() {
            Selection::Unique(e) => assert_eq!(e.id, kept),
            other => panic!("expected a unique winner, got {:?}", other),
        }
    }
}
