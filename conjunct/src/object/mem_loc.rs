use super::combined::Combined;
use super::region::{self, MemRegionObject, MemRegionObjectPtr};
use super::sentinel::{self, Sentinel};
use super::value::{ValueObject, ValueObjectPtr};
use super::{AbstractObject, AnyObject, ObjectKind};
use crate::composer::QueryContext;
use conjunct_ir::{FunctionId, TermId};
use std::fmt::{Display, Formatter};
use std::rc::Rc;

fn any<F: AbstractObject>(object: &Rc<F>) -> AnyObject {
    F::into_any(Rc::clone(object))
}

/// A memory location: a region, optionally narrowed by an index into it.
///
/// Comparisons of the parts are asked through the composer in the query context, so
/// the analyses that produced the region and index get to answer them.
#[derive(Debug, Clone)]
pub struct MemLoc {
    region: MemRegionObjectPtr,
    index: Option<ValueObjectPtr>,
}

impl MemLoc {
    pub fn new(region: MemRegionObjectPtr, index: Option<ValueObjectPtr>) -> Self {
        Self { region, index }
    }

    pub fn region(&self) -> &MemRegionObjectPtr {
        &self.region
    }

    pub fn index(&self) -> Option<&ValueObjectPtr> {
        self.index.as_ref()
    }

    fn may_equal(&self, other: &MemLoc, q: QueryContext<'_>) -> bool {
        if !any(&self.region).may_equal(&any(&other.region), q) {
            return false;
        }
        match (&self.index, &other.index) {
            (Some(a), Some(b)) => any(a).may_equal(&any(b), q),
            _ => true,
        }
    }

    fn must_equal(&self, other: &MemLoc, q: QueryContext<'_>) -> bool {
        if !any(&self.region).must_equal(&any(&other.region), q) {
            return false;
        }
        match (&self.index, &other.index) {
            (None, None) => true,
            (Some(a), Some(b)) => any(a).must_equal(&any(b), q),
            _ => false,
        }
    }

    fn equal_set(&self, other: &MemLoc, q: QueryContext<'_>) -> bool {
        if !any(&self.region).equal_set(&any(&other.region), q) {
            return false;
        }
        match (&self.index, &other.index) {
            (None, None) => true,
            (Some(a), Some(b)) => any(a).equal_set(&any(b), q),
            _ => false,
        }
    }

    fn sub_set(&self, other: &MemLoc, q: QueryContext<'_>) -> bool {
        if !any(&self.region).sub_set(&any(&other.region), q) {
            return false;
        }
        match (&self.index, &other.index) {
            (_, None) => true,
            (Some(a), Some(b)) => any(a).sub_set(&any(b), q),
            // a whole region fits inside an index only if the index covers everything
            (None, Some(b)) => any(b).is_full(q),
        }
    }

    fn meet_update(&mut self, other: &MemLoc, q: QueryContext<'_>) -> bool {
        let mut region = any(&self.region);
        let mut modified = region.meet_update(&any(&other.region), q);
        self.region = region.expect::<MemRegionObject>();
        if let Some(theirs) = &other.index {
            match self.index.as_mut() {
                Some(mine) => {
                    let mut index = any(mine);
                    modified |= index.meet_update(&any(theirs), q);
                    *mine = index.expect::<ValueObject>();
                }
                None => {
                    self.index = Some(Rc::clone(theirs));
                    modified = true;
                }
            }
        }
        modified
    }

    fn is_full(&self, q: QueryContext<'_>) -> bool {
        any(&self.region).is_full(q) && self.index.as_ref().is_none_or(|i| any(i).is_full(q))
    }

    fn is_empty(&self, q: QueryContext<'_>) -> bool {
        any(&self.region).is_empty(q) || self.index.as_ref().is_some_and(|i| any(i).is_empty(q))
    }

    fn is_live(&self, q: QueryContext<'_>) -> bool {
        any(&self.region).is_live(q)
    }
}

impl Display for MemLoc {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.index {
            Some(index) => write!(f, "{}[{}]", self.region, index),
            None => write!(f, "{}", self.region),
        }
    }
}

pub type MemLocObjectPtr = Rc<MemLocObject>;
pub type CombinedMemLocObject = Combined<MemLocObject>;

/// A set of memory locations.
#[derive(Debug, Clone)]
pub enum MemLocObject {
    Full,
    Empty,
    Located(MemLoc),
    /// The location holding the return value of a function: the whole
    /// [`MemRegionObject::FuncResult`] region of that function.
    FuncResult(FunctionId),
    Combined(CombinedMemLocObject),
}

/// See [`region::func_result_relation`]. A function result is disjoint from any
/// location inside an analysis-defined region.
pub fn func_result_relation(
    a: &MemLocObject,
    b: &MemLocObject,
    q: QueryContext<'_>,
) -> Option<bool> {
    match (a, b) {
        (MemLocObject::FuncResult(f), MemLocObject::FuncResult(g)) => Some(f == g),
        (MemLocObject::FuncResult(f), MemLocObject::Located(loc))
        | (MemLocObject::Located(loc), MemLocObject::FuncResult(f)) => {
            let region = MemRegionObject::FuncResult(*f);
            match region::func_result_relation(&region, &loc.region, q) {
                Some(false) => Some(false),
                _ => None,
            }
        }
        _ => None,
    }
}

impl MemLocObject {
    pub fn at(region: MemRegionObjectPtr, index: Option<ValueObjectPtr>) -> Self {
        MemLocObject::Located(MemLoc::new(region, index))
    }

    /// The location as a region and index, for the variants that have one.
    pub fn location(&self) -> Option<MemLoc> {
        match self {
            MemLocObject::Located(loc) => Some(loc.clone()),
            MemLocObject::FuncResult(f) => Some(MemLoc::new(
                Rc::new(MemRegionObject::FuncResult(*f)),
                None,
            )),
            _ => None,
        }
    }
}

impl Display for MemLocObject {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            MemLocObject::Full => write!(f, "FullMemLoc"),
            MemLocObject::Empty => write!(f, "EmptyMemLoc"),
            MemLocObject::Located(loc) => write!(f, "{loc}"),
            MemLocObject::FuncResult(func) => write!(f, "result({func})"),
            MemLocObject::Combined(c) => write!(f, "{c}"),
        }
    }
}

impl AbstractObject for MemLocObject {
    const KIND: ObjectKind = ObjectKind::MemLoc;

    fn full() -> Self {
        MemLocObject::Full
    }

    fn empty() -> Self {
        MemLocObject::Empty
    }

    fn sentinel(&self) -> Option<Sentinel> {
        match self {
            MemLocObject::Full => Some(Sentinel::Full),
            MemLocObject::Empty => Some(Sentinel::Empty),
            _ => None,
        }
    }

    fn as_combined(&self) -> Option<&Combined<Self>> {
        match self {
            MemLocObject::Combined(c) => Some(c),
            _ => None,
        }
    }

    fn from_combined(combined: Combined<Self>) -> Self {
        MemLocObject::Combined(combined)
    }

    fn into_any(this: Rc<Self>) -> AnyObject {
        AnyObject::MemLoc(this)
    }

    fn from_any(object: &AnyObject) -> Option<Rc<Self>> {
        match object {
            AnyObject::MemLoc(l) => Some(Rc::clone(l)),
            _ => None,
        }
    }

    /// A location without an index is named by whatever names its region.
    fn syntactic_base(&self) -> Option<TermId> {
        match self {
            MemLocObject::Located(loc) if loc.index.is_none() => loc.region.syntactic_base(),
            MemLocObject::Combined(c) => c.common_base(),
            _ => None,
        }
    }

    fn may_equal(&self, other: &Self, q: QueryContext<'_>) -> bool {
        if let Some(answer) = sentinel::may_equal(self, other) {
            return answer;
        }
        if let Some(answer) = func_result_relation(self, other, q) {
            return answer;
        }
        match (self, other) {
            (MemLocObject::Combined(a), MemLocObject::Combined(b)) => a.may_equal(b, q),
            (MemLocObject::Combined(c), x) | (x, MemLocObject::Combined(c)) => {
                c.may_equal_each(x, q)
            }
            _ => match (self.location(), other.location()) {
                (Some(a), Some(b)) => a.may_equal(&b, q),
                _ => true,
            },
        }
    }

    fn must_equal(&self, other: &Self, q: QueryContext<'_>) -> bool {
        if let Some(answer) = sentinel::must_equal(self, other) {
            return answer;
        }
        if let Some(answer) = func_result_relation(self, other, q) {
            return answer;
        }
        match (self, other) {
            (MemLocObject::Combined(a), MemLocObject::Combined(b)) => a.must_equal(b, q),
            (MemLocObject::Combined(c), x) | (x, MemLocObject::Combined(c)) => {
                c.must_equal_each(x, q)
            }
            _ => match (self.location(), other.location()) {
                (Some(a), Some(b)) => a.must_equal(&b, q),
                _ => false,
            },
        }
    }

    fn equal_set(&self, other: &Self, q: QueryContext<'_>) -> bool {
        if let Some(answer) = sentinel::equal_set(self, other, q) {
            return answer;
        }
        if let Some(answer) = func_result_relation(self, other, q) {
            return answer;
        }
        match (self, other) {
            (MemLocObject::Combined(a), MemLocObject::Combined(b)) => a.equal_set(b, q),
            (MemLocObject::Combined(c), x) | (x, MemLocObject::Combined(c)) => {
                c.equal_set_each(x, q)
            }
            _ => match (self.location(), other.location()) {
                (Some(a), Some(b)) => a.equal_set(&b, q),
                _ => false,
            },
        }
    }

    fn sub_set(&self, other: &Self, q: QueryContext<'_>) -> bool {
        if let Some(answer) = sentinel::sub_set(self, other, q) {
            return answer;
        }
        if let Some(answer) = func_result_relation(self, other, q) {
            return answer;
        }
        match (self, other) {
            (MemLocObject::Combined(a), MemLocObject::Combined(b)) => a.sub_set(b, q),
            (MemLocObject::Combined(c), x) => c.sub_set_of(x, q),
            (x, MemLocObject::Combined(c)) => c.super_set_of(x, q),
            _ => match (self.location(), other.location()) {
                (Some(a), Some(b)) => a.sub_set(&b, q),
                _ => false,
            },
        }
    }

    fn meet_update(&mut self, other: &Self, q: QueryContext<'_>) -> bool {
        if let Some(modified) = sentinel::meet_update(self, other, q) {
            return modified;
        }
        match func_result_relation(self, other, q) {
            Some(true) => return false,
            Some(false) => {
                *self = MemLocObject::Empty;
                return true;
            }
            None => {}
        }
        if let MemLocObject::Combined(c) = other {
            if !matches!(self, MemLocObject::Combined(_)) {
                *self = MemLocObject::Combined(c.met_with(self, q));
                return true;
            }
        }
        match self {
            MemLocObject::Combined(c) => c.meet_each(other, q),
            MemLocObject::Located(mine) => match other.location() {
                Some(theirs) => mine.meet_update(&theirs, q),
                None => false,
            },
            _ => match (self.location(), other.location()) {
                (Some(mut mine), Some(theirs)) => {
                    let modified = mine.meet_update(&theirs, q);
                    if modified {
                        *self = MemLocObject::Located(mine);
                    }
                    modified
                }
                _ => false,
            },
        }
    }

    fn is_full(&self, q: QueryContext<'_>) -> bool {
        match self {
            MemLocObject::Full => true,
            MemLocObject::Empty | MemLocObject::FuncResult(_) => false,
            MemLocObject::Located(loc) => loc.is_full(q),
            MemLocObject::Combined(c) => c.is_full(q),
        }
    }

    fn is_empty(&self, q: QueryContext<'_>) -> bool {
        match self {
            MemLocObject::Empty => true,
            MemLocObject::Full | MemLocObject::FuncResult(_) => false,
            MemLocObject::Located(loc) => loc.is_empty(q),
            MemLocObject::Combined(c) => c.is_empty(q),
        }
    }

    fn is_live(&self, q: QueryContext<'_>) -> bool {
        match self {
            MemLocObject::Full | MemLocObject::FuncResult(_) => true,
            MemLocObject::Empty => false,
            MemLocObject::Located(loc) => loc.is_live(q),
            MemLocObject::Combined(c) => c.is_live(q),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::MemLocObject;
    use crate::object::{AbstractObject, Combined, MemRegionObject, MemRegionObjectPtr};
    use crate::testing::{StubRegion, bottom, konst, unknown, with_context};
    use conjunct_ir::{FunctionId, TermId};
    use std::rc::Rc;

    fn region(name: &'static str) -> MemRegionObjectPtr {
        Rc::new(MemRegionObject::from_lattice(StubRegion::named(name)))
    }

    fn anywhere() -> MemRegionObjectPtr {
        Rc::new(MemRegionObject::from_lattice(StubRegion::anywhere()))
    }

    #[test]
    fn indexes_compare_only_when_both_present() {
        with_context(|q| {
            let a1 = MemLocObject::at(region("a"), Some(konst(1)));
            let a2 = MemLocObject::at(region("a"), Some(konst(2)));
            let whole = MemLocObject::at(region("a"), None);
            assert!(!a1.may_equal(&a2, q));
            assert!(a1.may_equal(&whole, q));
            assert!(!a1.must_equal(&whole, q));
            assert!(whole.must_equal(&MemLocObject::at(region("a"), None), q));
            assert!(a1.must_equal(&MemLocObject::at(region("a"), Some(konst(1))), q));
            assert!(!a1.may_equal(&MemLocObject::at(region("b"), Some(konst(1))), q));
        });
    }

    #[test]
    fn sub_set_of_indexed_locations() {
        with_context(|q| {
            let a1 = MemLocObject::at(region("a"), Some(konst(1)));
            let whole = MemLocObject::at(region("a"), None);
            let any_index = MemLocObject::at(region("a"), Some(unknown()));
            assert!(a1.sub_set(&whole, q));
            assert!(!whole.sub_set(&a1, q));
            assert!(whole.sub_set(&any_index, q));
            assert!(a1.sub_set(&any_index, q));
            assert!(a1.sub_set(&MemLocObject::at(anywhere(), None), q));
        });
    }

    #[test]
    fn meet_narrows_region_and_fills_index() {
        with_context(|q| {
            let mut loc = MemLocObject::at(anywhere(), None);
            assert!(loc.is_full(q));
            let target = MemLocObject::at(region("a"), Some(konst(1)));
            assert!(loc.meet_update(&target, q));
            assert!(loc.equal_set(&target, q));
            assert!(!loc.meet_update(&target, q));
            assert!(!loc.is_full(q));
        });
    }

    #[test]
    fn empty_index_empties_the_location() {
        with_context(|q| {
            let loc = MemLocObject::at(region("a"), Some(bottom()));
            assert!(loc.is_empty(q));
            let dead = Rc::new(MemRegionObject::from_lattice(StubRegion::named("f").dead()));
            assert!(!MemLocObject::at(dead, None).is_live(q));
        });
    }

    #[test]
    fn function_results() {
        with_context(|q| {
            let f = FunctionId::new("f");
            let lf = MemLocObject::FuncResult(f);
            let heap = MemLocObject::at(region("heap"), None);
            assert!(!lf.may_equal(&heap, q));
            assert!(!heap.may_equal(&lf, q));
            assert!(lf.must_equal(&MemLocObject::FuncResult(f), q));
            let as_located = MemLocObject::at(Rc::new(MemRegionObject::FuncResult(f)), None);
            assert!(lf.equal_set(&as_located, q));
            let mut met = lf.clone();
            assert!(!met.meet_update(&lf, q));
            assert!(met.meet_update(&heap, q));
            assert!(met.is_empty(q));
        });
    }

    #[test]
    fn syntactic_base_comes_from_the_region() {
        let x = TermId::new(2);
        let based = Rc::new(MemRegionObject::from_lattice(
            StubRegion::named("x").with_base(x),
        ));
        assert_eq!(MemLocObject::at(Rc::clone(&based), None).syntactic_base(), Some(x));
        assert_eq!(MemLocObject::at(based, Some(konst(0))).syntactic_base(), None);
    }

    #[test]
    fn combined_locations() {
        with_context(|q| {
            let either = MemLocObject::from_combined(Combined::union(vec![
                Rc::new(MemLocObject::at(region("a"), None)),
                Rc::new(MemLocObject::at(region("b"), None)),
            ]));
            let a = MemLocObject::at(region("a"), None);
            assert!(either.may_equal(&a, q));
            assert!(!either.must_equal(&a, q));
            assert!(a.sub_set(&either, q));
        });
    }
}
