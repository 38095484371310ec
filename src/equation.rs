//! Equations and per-name equation groups.

use crate::error::{EngineError, EvalResult};
use crate::region::Region;
use crate::ws::Ws;
use std::fmt;
use std::rc::Rc;
use ulid::Ulid;

/// Stable external identity of one equation.
///
/// Identities are minted by the editing layer, never by the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EquationId(Ulid);

impl EquationId {
    pub fn new() -> Self {
        EquationId(Ulid::new())
    }

    pub fn ulid(&self) -> Ulid {
        self.0
    }
}

impl Default for EquationId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Ulid> for EquationId {
    fn from(ulid: Ulid) -> Self {
        EquationId(ulid)
    }
}

impl fmt::Display for EquationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The replaceable part of an equation.
#[derive(Clone)]
pub struct Definition {
    pub guard: Region,
    /// Must evaluate to `true` for the equation to apply.
    pub condition: Option<Rc<dyn Ws>>,
    pub rhs: Rc<dyn Ws>,
}

impl Definition {
    pub fn new(guard: Region, rhs: Rc<dyn Ws>) -> Self {
        Definition {
            guard,
            condition: None,
            rhs,
        }
    }

    /// An unguarded definition.
    pub fn unguarded(rhs: Rc<dyn Ws>) -> Self {
        Definition::new(Region::any(), rhs)
    }

    pub fn with_condition(mut self, condition: Rc<dyn Ws>) -> Self {
        self.condition = Some(condition);
        self
    }
}

impl fmt::Debug for Definition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Definition")
            .field("guard", &self.guard)
            .field("conditional", &self.condition.is_some())
            .finish()
    }
}

/// One guarded definition of a name.
pub struct Equation {
    pub id: EquationId,
    pub guard: Region,
    pub condition: Option<Rc<dyn Ws>>,
    pub rhs: Rc<dyn Ws>,
    /// Logical time of the edit that installed this equation.
    pub time: u64,
    seq: u64,
}

impl Equation {
    /// Position of this equation among equal time stamps.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    fn order_key(&self) -> (u64, u64) {
        (self.time, self.seq)
    }
}

impl fmt::Debug for Equation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Equation")
            .field("id", &self.id)
            .field("guard", &self.guard)
            .field("conditional", &self.condition.is_some())
            .field("time", &self.time)
            .field("seq", &self.seq)
            .finish()
    }
}

/// All equations defining one name, ordered by (time, insertion).
#[derive(Debug)]
pub struct EquationGroup {
    name: Rc<str>,
    equations: Vec<Rc<Equation>>,
    next_seq: u64,
}

impl EquationGroup {
    pub fn new(name: impl Into<Rc<str>>) -> Self {
        EquationGroup {
            name: name.into(),
            equations: Vec::new(),
            next_seq: 0,
        }
    }

    pub fn name(&self) -> &Rc<str> {
        &self.name
    }

    fn make(&mut self, id: EquationId, def: Definition, time: u64) -> Rc<Equation> {
        let seq = self.next_seq;
        self.next_seq += 1;
        Rc::new(Equation {
            id,
            guard: def.guard,
            condition: def.condition,
            rhs: def.rhs,
            time,
            seq,
        })
    }

    fn insert_ordered(&mut self, equation: Rc<Equation>) {
        let key = equation.order_key();
        let at = self.equations.partition_point(|e| e.order_key() <= key);
        self.equations.insert(at, equation);
    }

    /// Add an equation. An id already in the group is a fault.
    pub fn add(&mut self, id: EquationId, def: Definition, time: u64) -> EvalResult<()> {
        if self.contains(id) {
            return Err(EngineError::DuplicateEquation(id));
        }
        let equation = self.make(id, def, time);
        self.insert_ordered(equation);
        Ok(())
    }

    /// Remove an equation, returning it if it was present.
    pub fn remove(&mut self, id: EquationId) -> Option<Rc<Equation>> {
        let at = self.equations.iter().position(|e| e.id == id)?;
        Some(self.equations.remove(at))
    }

    /// Replace an equation's definition under the same id.
    pub fn replace(&mut self, id: EquationId, def: Definition, time: u64) -> bool {
        if self.remove(id).is_none() {
            return false;
        }
        let equation = self.make(id, def, time);
        self.insert_ordered(equation);
        true
    }

    pub fn get(&self, id: EquationId) -> Option<&Rc<Equation>> {
        self.equations.iter().find(|e| e.id == id)
    }

    pub fn contains(&self, id: EquationId) -> bool {
        self.get(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rc<Equation>> {
        self.equations.iter()
    }

    pub fn len(&self) -> usize {
        self.equations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.equations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constant::Constant;
    use crate::workshops::ConstWs;

    fn def(n: i64) -> Definition {
        Definition::unguarded(Rc::new(ConstWs::new(Constant::Int(n))))
    }

    fn ids(group: &EquationGroup) -> Vec<EquationId> {
        group.iter().map(|e| e.id).collect()
    }

    #[test]
    fn test_order_by_time_then_insertion() {
        let mut group = EquationGroup::new("f");
        let (a, b, c) = (EquationId::new(), EquationId::new(), EquationId::new());

        group.add(a, def(1), 5).unwrap();
        group.add(b, def(2), 1).unwrap();
        group.add(c, def(3), 5).unwrap();

        assert_eq!(ids(&group), vec![b, a, c]);
    }

    #[test]
    fn test_duplicate_add_is_fault() {
        let mut group = EquationGroup::new("f");
        let id = EquationId::new();
        group.add(id, def(1), 0).unwrap();
        assert_eq!(group.add(id, def(2), 1), Err(EngineError::DuplicateEquation(id)));
        assert_eq!(group.len(), 1);
    }

    #[test]
    fn test_remove_and_replace() {
        let mut group = EquationGroup::new("f");
        let (a, b) = (EquationId::new(), EquationId::new());
        group.add(a, def(1), 0).unwrap();
        group.add(b, def(2), 1).unwrap();

        assert!(group.replace(a, def(10), 2));
        assert_eq!(ids(&group), vec![b, a]);
        assert_eq!(group.get(a).map(|e| e.time), Some(2));

        assert!(group.remove(b).is_some());
        assert!(group.remove(b).is_none());
        assert!(!group.replace(b, def(3), 3));
        assert_eq!(ids(&group), vec![a]);
    }

    #[test]
    fn test_id_display_is_ulid() {
        let ulid = Ulid::new();
        let id = EquationId::from(ulid);
        assert_eq!(id.to_string(), ulid.to_string());
        assert_eq!(id.ulid(), ulid);
    }
}
