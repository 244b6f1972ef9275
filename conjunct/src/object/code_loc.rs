use super::combined::Combined;
use super::sentinel::{self, Sentinel};
use super::{AbstractObject, AnyObject, ObjectKind};
use crate::composer::QueryContext;
use conjunct_ir::{PartId, TermId};
use std::fmt::{Display, Formatter};
use std::rc::Rc;

/// A program location: an abstract program point and the term executing there.
/// A missing field matches any part or term.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct CodeLoc {
    pub part: Option<PartId>,
    pub term: Option<TermId>,
}

fn compatible<T: PartialEq>(a: Option<T>, b: Option<T>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a == b,
        _ => true,
    }
}

fn covers<T: PartialEq>(wide: Option<T>, narrow: Option<T>) -> bool {
    match (wide, narrow) {
        (None, _) => true,
        (Some(w), Some(n)) => w == n,
        (Some(_), None) => false,
    }
}

/// Fill a missing field from `theirs`. Whether it changed, or `None` when both are
/// present and differ.
fn narrow<T: PartialEq + Copy>(mine: &mut Option<T>, theirs: Option<T>) -> Option<bool> {
    match (*mine, theirs) {
        (_, None) => Some(false),
        (None, Some(t)) => {
            *mine = Some(t);
            Some(true)
        }
        (Some(m), Some(t)) => (m == t).then_some(false),
    }
}

impl CodeLoc {
    pub fn new(part: Option<PartId>, term: Option<TermId>) -> Self {
        Self { part, term }
    }

    pub fn at_term(term: TermId) -> Self {
        Self::new(None, Some(term))
    }

    fn may_equal(&self, other: &CodeLoc) -> bool {
        compatible(self.part, other.part) && compatible(self.term, other.term)
    }

    fn must_equal(&self, other: &CodeLoc) -> bool {
        self.part.is_some() && self.term.is_some() && self == other
    }

    fn sub_set(&self, other: &CodeLoc) -> bool {
        covers(other.part, self.part) && covers(other.term, self.term)
    }

    fn is_full(&self) -> bool {
        self.part.is_none() && self.term.is_none()
    }
}

impl Display for CodeLoc {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match (self.part, self.term) {
            (Some(p), Some(t)) => write!(f, "{p}@{t}"),
            (Some(p), None) => write!(f, "{p}@*"),
            (None, Some(t)) => write!(f, "*@{t}"),
            (None, None) => write!(f, "*@*"),
        }
    }
}

pub type CodeLocObjectPtr = Rc<CodeLocObject>;
pub type CombinedCodeLocObject = Combined<CodeLocObject>;

/// A set of program locations.
#[derive(Debug, Clone)]
pub enum CodeLocObject {
    Full,
    Empty,
    At(CodeLoc),
    Combined(CombinedCodeLocObject),
}

impl Display for CodeLocObject {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CodeLocObject::Full => write!(f, "FullCodeLoc"),
            CodeLocObject::Empty => write!(f, "EmptyCodeLoc"),
            CodeLocObject::At(loc) => write!(f, "{loc}"),
            CodeLocObject::Combined(c) => write!(f, "{c}"),
        }
    }
}

impl AbstractObject for CodeLocObject {
    const KIND: ObjectKind = ObjectKind::CodeLoc;

    fn full() -> Self {
        CodeLocObject::Full
    }

    fn empty() -> Self {
        CodeLocObject::Empty
    }

    fn sentinel(&self) -> Option<Sentinel> {
        match self {
            CodeLocObject::Full => Some(Sentinel::Full),
            CodeLocObject::Empty => Some(Sentinel::Empty),
            _ => None,
        }
    }

    fn as_combined(&self) -> Option<&Combined<Self>> {
        match self {
            CodeLocObject::Combined(c) => Some(c),
            _ => None,
        }
    }

    fn from_combined(combined: Combined<Self>) -> Self {
        CodeLocObject::Combined(combined)
    }

    fn into_any(this: Rc<Self>) -> AnyObject {
        AnyObject::CodeLoc(this)
    }

    fn from_any(object: &AnyObject) -> Option<Rc<Self>> {
        match object {
            AnyObject::CodeLoc(c) => Some(Rc::clone(c)),
            _ => None,
        }
    }

    /// A code location names where a term runs, not a value built from it, so two
    /// locations at the same term can still sit in different parts.
    fn syntactic_base(&self) -> Option<TermId> {
        None
    }

    fn may_equal(&self, other: &Self, q: QueryContext<'_>) -> bool {
        if let Some(answer) = sentinel::may_equal(self, other) {
            return answer;
        }
        match (self, other) {
            (CodeLocObject::At(a), CodeLocObject::At(b)) => a.may_equal(b),
            (CodeLocObject::Combined(a), CodeLocObject::Combined(b)) => a.may_equal(b, q),
            (CodeLocObject::Combined(c), x) | (x, CodeLocObject::Combined(c)) => {
                c.may_equal_each(x, q)
            }
            _ => true,
        }
    }

    fn must_equal(&self, other: &Self, q: QueryContext<'_>) -> bool {
        if let Some(answer) = sentinel::must_equal(self, other) {
            return answer;
        }
        match (self, other) {
            (CodeLocObject::At(a), CodeLocObject::At(b)) => a.must_equal(b),
            (CodeLocObject::Combined(a), CodeLocObject::Combined(b)) => a.must_equal(b, q),
            (CodeLocObject::Combined(c), x) | (x, CodeLocObject::Combined(c)) => {
                c.must_equal_each(x, q)
            }
            _ => false,
        }
    }

    fn equal_set(&self, other: &Self, q: QueryContext<'_>) -> bool {
        if let Some(answer) = sentinel::equal_set(self, other, q) {
            return answer;
        }
        match (self, other) {
            (CodeLocObject::At(a), CodeLocObject::At(b)) => a == b,
            (CodeLocObject::Combined(a), CodeLocObject::Combined(b)) => a.equal_set(b, q),
            (CodeLocObject::Combined(c), x) | (x, CodeLocObject::Combined(c)) => {
                c.equal_set_each(x, q)
            }
            _ => false,
        }
    }

    fn sub_set(&self, other: &Self, q: QueryContext<'_>) -> bool {
        if let Some(answer) = sentinel::sub_set(self, other, q) {
            return answer;
        }
        match (self, other) {
            (CodeLocObject::At(a), CodeLocObject::At(b)) => a.sub_set(b),
            (CodeLocObject::Combined(a), CodeLocObject::Combined(b)) => a.sub_set(b, q),
            (CodeLocObject::Combined(c), x) => c.sub_set_of(x, q),
            (x, CodeLocObject::Combined(c)) => c.super_set_of(x, q),
            _ => false,
        }
    }

    fn meet_update(&mut self, other: &Self, q: QueryContext<'_>) -> bool {
        if let Some(modified) = sentinel::meet_update(self, other, q) {
            return modified;
        }
        if let CodeLocObject::Combined(c) = other {
            if !matches!(self, CodeLocObject::Combined(_)) {
                *self = CodeLocObject::Combined(c.met_with(self, q));
                return true;
            }
        }
        if let (CodeLocObject::At(mine), CodeLocObject::At(theirs)) = (&*self, other) {
            let mut met = *mine;
            let part = narrow(&mut met.part, theirs.part);
            let term = narrow(&mut met.term, theirs.term);
            return match (part, term) {
                (Some(part), Some(term)) => {
                    *self = CodeLocObject::At(met);
                    part || term
                }
                _ => {
                    *self = CodeLocObject::Empty;
                    true
                }
            };
        }
        match (self, other) {
            (CodeLocObject::Combined(a), CodeLocObject::Combined(b)) => a.meet_update(b, q),
            (CodeLocObject::Combined(a), x) => a.meet_each(x, q),
            _ => false,
        }
    }

    fn is_full(&self, q: QueryContext<'_>) -> bool {
        match self {
            CodeLocObject::Full => true,
            CodeLocObject::Empty => false,
            CodeLocObject::At(loc) => loc.is_full(),
            CodeLocObject::Combined(c) => c.is_full(q),
        }
    }

    fn is_empty(&self, q: QueryContext<'_>) -> bool {
        match self {
            CodeLocObject::Empty => true,
            CodeLocObject::Combined(c) => c.is_empty(q),
            _ => false,
        }
    }

    fn is_live(&self, q: QueryContext<'_>) -> bool {
        match self {
            CodeLocObject::Empty => false,
            CodeLocObject::Combined(c) => c.is_live(q),
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CodeLoc, CodeLocObject};
    use crate::object::{AbstractObject, AnyObject};
    use crate::testing::with_context;
    use conjunct_ir::{PartId, TermId};
    use std::rc::Rc;

    fn at(part: Option<u32>, term: Option<u32>) -> CodeLocObject {
        CodeLocObject::At(CodeLoc::new(part.map(PartId::new), term.map(TermId::new)))
    }

    #[test]
    fn partial_locations_may_match_anything_compatible() {
        with_context(|q| {
            let exact = at(Some(1), Some(2));
            assert!(exact.may_equal(&at(None, Some(2)), q));
            assert!(exact.may_equal(&at(Some(1), None), q));
            assert!(!exact.may_equal(&at(Some(3), Some(2)), q));
            assert!(at(None, None).may_equal(&exact, q));
        });
    }

    #[test]
    fn must_equal_needs_both_fields() {
        with_context(|q| {
            let exact = at(Some(1), Some(2));
            assert!(exact.must_equal(&at(Some(1), Some(2)), q));
            assert!(!at(None, Some(2)).must_equal(&at(None, Some(2)), q));
            assert!(at(None, Some(2)).equal_set(&at(None, Some(2)), q));
        });
    }

    #[test]
    fn sub_set_and_fullness() {
        with_context(|q| {
            let exact = at(Some(1), Some(2));
            let term_only = at(None, Some(2));
            assert!(exact.sub_set(&term_only, q));
            assert!(!term_only.sub_set(&exact, q));
            assert!(at(None, None).is_full(q));
            assert!(exact.sub_set(&at(None, None), q));
            assert!(at(None, None).equal_set(&CodeLocObject::Full, q));
        });
    }

    #[test]
    fn meet_fills_and_conflicts() {
        with_context(|q| {
            let mut loc = at(None, Some(2));
            assert!(loc.meet_update(&at(Some(1), None), q));
            assert!(loc.equal_set(&at(Some(1), Some(2)), q));
            assert!(!loc.meet_update(&at(Some(1), None), q));
            assert!(loc.meet_update(&at(Some(5), Some(2)), q));
            assert!(loc.is_empty(q));
        });
    }

    #[test]
    fn sharing_a_term_is_not_must_equal() {
        with_context(|q| {
            let here = at(Some(1), Some(2));
            let there = at(Some(3), Some(2));
            assert_eq!(here.syntactic_base(), None);
            let (a, b) = (AnyObject::from(Rc::new(here)), AnyObject::from(Rc::new(there)));
            assert!(!a.must_equal_expr(&b));
            assert!(!a.must_equal(&b, q));
            assert!(!a.may_equal(&b, q));
            assert_eq!(at(Some(1), None).to_string(), "p1@*");
        });
    }
}
