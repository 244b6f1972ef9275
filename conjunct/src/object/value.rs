use super::combined::Combined;
use super::sentinel::{self, Sentinel};
use super::{AbstractObject, AnyObject, AsAny, ObjectKind};
use crate::composer::QueryContext;
use conjunct_ir::{Literal, TermId};
use itertools::Itertools;
use std::fmt::{Debug, Display, Formatter};
use std::rc::Rc;

/// A value object defined by an analysis.
///
/// Implementations only ever see peers that are themselves analysis-defined: full,
/// empty and combined objects are handled before delegation. A peer may still come
/// from a different analysis, in which case the answer must be conservative
/// (`true` for `may_equal`, `false` for the other predicates, no change for
/// `meet_update`).
pub trait ValueLattice: AsAny + CloneValueLattice + Debug + Display {
    fn may_equal(&self, other: &dyn ValueLattice, q: QueryContext<'_>) -> bool;

    fn must_equal(&self, other: &dyn ValueLattice, q: QueryContext<'_>) -> bool;

    fn equal_set(&self, other: &dyn ValueLattice, q: QueryContext<'_>) -> bool;

    fn sub_set(&self, other: &dyn ValueLattice, q: QueryContext<'_>) -> bool;

    fn meet_update(&mut self, other: &dyn ValueLattice, q: QueryContext<'_>) -> bool;

    fn is_full(&self, q: QueryContext<'_>) -> bool;

    fn is_empty(&self, q: QueryContext<'_>) -> bool;

    /// Whether this value denotes a finite set of known literals.
    fn is_concrete(&self) -> bool {
        false
    }

    fn concrete_values(&self) -> Vec<Literal> {
        Vec::new()
    }

    fn syntactic_base(&self) -> Option<TermId> {
        None
    }
}

pub trait CloneValueLattice {
    fn clone_box(&self) -> Box<dyn ValueLattice>;
}

impl<T> CloneValueLattice for T
where
    T: 'static + ValueLattice + Clone,
{
    fn clone_box(&self) -> Box<dyn ValueLattice> {
        Box::new(self.clone())
    }
}

impl Clone for Box<dyn ValueLattice> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

pub type ValueObjectPtr = Rc<ValueObject>;
pub type CombinedValueObject = Combined<ValueObject>;

/// A set of runtime values an expression may evaluate to.
#[derive(Debug, Clone)]
pub enum ValueObject {
    Full,
    Empty,
    Combined(CombinedValueObject),
    Analysis(Box<dyn ValueLattice>),
}

fn push_unique(values: &mut Vec<Literal>, value: Literal) {
    if !values.iter().any(|v| v.structurally_equal(&value)) {
        values.push(value);
    }
}

impl ValueObject {
    pub fn from_lattice<T: ValueLattice>(value: T) -> Self {
        ValueObject::Analysis(Box::new(value))
    }

    pub fn lattice(&self) -> Option<&dyn ValueLattice> {
        match self {
            ValueObject::Analysis(v) => Some(&**v),
            _ => None,
        }
    }

    pub fn downcast_ref<T: ValueLattice>(&self) -> Option<&T> {
        self.lattice()?.as_any().downcast_ref::<T>()
    }

    pub fn is_concrete(&self) -> bool {
        match self {
            ValueObject::Full | ValueObject::Empty => false,
            ValueObject::Combined(c) => c.is_concrete(),
            ValueObject::Analysis(v) => v.is_concrete(),
        }
    }

    /// The literals this value may be, without duplicates. Empty unless
    /// [`is_concrete`](ValueObject::is_concrete).
    pub fn concrete_values(&self) -> Vec<Literal> {
        match self {
            ValueObject::Full | ValueObject::Empty => Vec::new(),
            ValueObject::Combined(c) => c.concrete_values(),
            ValueObject::Analysis(v) => {
                let mut out = Vec::new();
                for value in v.concrete_values() {
                    push_unique(&mut out, value);
                }
                out
            }
        }
    }

    /// The truth value of a concrete value used as a condition, when every literal
    /// it may be agrees on one.
    pub fn concrete_truth(&self) -> Option<bool> {
        if !self.is_concrete() {
            return None;
        }
        self.concrete_values()
            .iter()
            .map(Literal::as_bool)
            .all_equal_value()
            .ok()
            .flatten()
    }
}

impl CombinedValueObject {
    /// An intersection is concrete as soon as one child is; a union only when all are.
    pub fn is_concrete(&self) -> bool {
        if self.is_union() {
            self.children().iter().all(|c| c.is_concrete())
        } else {
            self.children().iter().any(|c| c.is_concrete())
        }
    }

    /// For a union, every literal any child may be. For an intersection, the
    /// literals every concrete child agrees on.
    pub fn concrete_values(&self) -> Vec<Literal> {
        let mut out = Vec::new();
        if self.is_union() {
            for value in self.children().iter().flat_map(|c| c.concrete_values()) {
                push_unique(&mut out, value);
            }
            return out;
        }
        let mut sets = self
            .children()
            .iter()
            .filter(|c| c.is_concrete())
            .map(|c| c.concrete_values());
        let Some(first) = sets.next() else {
            return out;
        };
        let rest: Vec<Vec<Literal>> = sets.collect();
        for value in first {
            if rest
                .iter()
                .all(|set| set.iter().any(|v| v.structurally_equal(&value)))
            {
                push_unique(&mut out, value);
            }
        }
        out
    }
}

impl Display for ValueObject {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueObject::Full => write!(f, "FullValue"),
            ValueObject::Empty => write!(f, "EmptyValue"),
            ValueObject::Combined(c) => write!(f, "{c}"),
            ValueObject::Analysis(v) => write!(f, "{v}"),
        }
    }
}

impl AbstractObject for ValueObject {
    const KIND: ObjectKind = ObjectKind::Value;

    fn full() -> Self {
        ValueObject::Full
    }

    fn empty() -> Self {
        ValueObject::Empty
    }

    fn sentinel(&self) -> Option<Sentinel> {
        match self {
            ValueObject::Full => Some(Sentinel::Full),
            ValueObject::Empty => Some(Sentinel::Empty),
            _ => None,
        }
    }

    fn as_combined(&self) -> Option<&Combined<Self>> {
        match self {
            ValueObject::Combined(c) => Some(c),
            _ => None,
        }
    }

    fn from_combined(combined: Combined<Self>) -> Self {
        ValueObject::Combined(combined)
    }

    fn into_any(this: Rc<Self>) -> AnyObject {
        AnyObject::Value(this)
    }

    fn from_any(object: &AnyObject) -> Option<Rc<Self>> {
        match object {
            AnyObject::Value(v) => Some(Rc::clone(v)),
            _ => None,
        }
    }

    fn syntactic_base(&self) -> Option<TermId> {
        match self {
            ValueObject::Full | ValueObject::Empty => None,
            ValueObject::Combined(c) => c.common_base(),
            ValueObject::Analysis(v) => v.syntactic_base(),
        }
    }

    fn may_equal(&self, other: &Self, q: QueryContext<'_>) -> bool {
        if let Some(answer) = sentinel::may_equal(self, other) {
            return answer;
        }
        match (self, other) {
            (ValueObject::Combined(a), ValueObject::Combined(b)) => a.may_equal(b, q),
            (ValueObject::Combined(c), x) | (x, ValueObject::Combined(c)) => {
                c.may_equal_each(x, q)
            }
            (ValueObject::Analysis(a), ValueObject::Analysis(b)) => a.may_equal(&**b, q),
            // sentinels were settled above
            _ => true,
        }
    }

    fn must_equal(&self, other: &Self, q: QueryContext<'_>) -> bool {
        if let Some(answer) = sentinel::must_equal(self, other) {
            return answer;
        }
        match (self, other) {
            (ValueObject::Combined(a), ValueObject::Combined(b)) => a.must_equal(b, q),
            (ValueObject::Combined(c), x) | (x, ValueObject::Combined(c)) => {
                c.must_equal_each(x, q)
            }
            (ValueObject::Analysis(a), ValueObject::Analysis(b)) => a.must_equal(&**b, q),
            _ => false,
        }
    }

    fn equal_set(&self, other: &Self, q: QueryContext<'_>) -> bool {
        if let Some(answer) = sentinel::equal_set(self, other, q) {
            return answer;
        }
        match (self, other) {
            (ValueObject::Combined(a), ValueObject::Combined(b)) => a.equal_set(b, q),
            (ValueObject::Combined(c), x) | (x, ValueObject::Combined(c)) => {
                c.equal_set_each(x, q)
            }
            (ValueObject::Analysis(a), ValueObject::Analysis(b)) => a.equal_set(&**b, q),
            _ => false,
        }
    }

    fn sub_set(&self, other: &Self, q: QueryContext<'_>) -> bool {
        if let Some(answer) = sentinel::sub_set(self, other, q) {
            return answer;
        }
        match (self, other) {
            (ValueObject::Combined(a), ValueObject::Combined(b)) => a.sub_set(b, q),
            (ValueObject::Combined(c), x) => c.sub_set_of(x, q),
            (x, ValueObject::Combined(c)) => c.super_set_of(x, q),
            (ValueObject::Analysis(a), ValueObject::Analysis(b)) => a.sub_set(&**b, q),
            _ => false,
        }
    }

    fn meet_update(&mut self, other: &Self, q: QueryContext<'_>) -> bool {
        if let Some(modified) = sentinel::meet_update(self, other, q) {
            return modified;
        }
        if let ValueObject::Combined(c) = other {
            if matches!(self, ValueObject::Analysis(_)) {
                *self = ValueObject::Combined(c.met_with(self, q));
                return true;
            }
        }
        match (self, other) {
            (ValueObject::Combined(a), ValueObject::Combined(b)) => a.meet_update(b, q),
            (ValueObject::Combined(a), x) => a.meet_each(x, q),
            (ValueObject::Analysis(a), ValueObject::Analysis(b)) => a.meet_update(&**b, q),
            _ => false,
        }
    }

    fn is_full(&self, q: QueryContext<'_>) -> bool {
        match self {
            ValueObject::Full => true,
            ValueObject::Empty => false,
            ValueObject::Combined(c) => c.is_full(q),
            ValueObject::Analysis(v) => v.is_full(q),
        }
    }

    fn is_empty(&self, q: QueryContext<'_>) -> bool {
        match self {
            ValueObject::Full => false,
            ValueObject::Empty => true,
            ValueObject::Combined(c) => c.is_empty(q),
            ValueObject::Analysis(v) => v.is_empty(q),
        }
    }

    /// Values are live wherever they exist.
    fn is_live(&self, q: QueryContext<'_>) -> bool {
        match self {
            ValueObject::Empty => false,
            ValueObject::Combined(c) => c.is_live(q),
            _ => true,
        }
    }
}
