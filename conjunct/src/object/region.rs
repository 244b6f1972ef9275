use super::combined::Combined;
use super::sentinel::{self, Sentinel};
use super::value::{ValueObject, ValueObjectPtr};
use super::{AbstractObject, AnyObject, AsAny, ObjectKind};
use crate::composer::QueryContext;
use conjunct_ir::{FunctionId, TermId};
use std::fmt::{Debug, Display, Formatter};
use std::rc::Rc;

/// A memory-region object defined by an analysis.
///
/// The same delegation rules as [`ValueLattice`](super::ValueLattice) apply.
pub trait RegionLattice: AsAny + CloneRegionLattice + Debug + Display {
    fn may_equal(&self, other: &dyn RegionLattice, q: QueryContext<'_>) -> bool;

    fn must_equal(&self, other: &dyn RegionLattice, q: QueryContext<'_>) -> bool;

    fn equal_set(&self, other: &dyn RegionLattice, q: QueryContext<'_>) -> bool;

    fn sub_set(&self, other: &dyn RegionLattice, q: QueryContext<'_>) -> bool;

    fn meet_update(&mut self, other: &dyn RegionLattice, q: QueryContext<'_>) -> bool;

    fn is_full(&self, q: QueryContext<'_>) -> bool;

    fn is_empty(&self, q: QueryContext<'_>) -> bool;

    /// Whether the region may still be allocated at the query edge.
    fn is_live(&self, _q: QueryContext<'_>) -> bool {
        true
    }

    /// The size of the region, as a value.
    fn region_size(&self, _q: QueryContext<'_>) -> ValueObjectPtr {
        Rc::new(ValueObject::Full)
    }

    fn syntactic_base(&self) -> Option<TermId> {
        None
    }
}

pub trait CloneRegionLattice {
    fn clone_box(&self) -> Box<dyn RegionLattice>;
}

impl<T> CloneRegionLattice for T
where
    T: 'static + RegionLattice + Clone,
{
    fn clone_box(&self) -> Box<dyn RegionLattice> {
        Box::new(self.clone())
    }
}

impl Clone for Box<dyn RegionLattice> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

pub type MemRegionObjectPtr = Rc<MemRegionObject>;
pub type CombinedMemRegionObject = Combined<MemRegionObject>;

/// A set of memory regions, such as allocations or the storage of variables.
#[derive(Debug, Clone)]
pub enum MemRegionObject {
    Full,
    Empty,
    /// The storage holding the return value of a function. Disjoint from every other
    /// region, and equal only to the result of the same function.
    FuncResult(FunctionId),
    Combined(CombinedMemRegionObject),
    Analysis(Box<dyn RegionLattice>),
}

/// How two function-result regions, or a function-result region and an
/// analysis-defined region, relate. `None` when neither side is a function result,
/// the other side is a sentinel or combinator, or the analysis region is itself full
/// or empty and so behaves like the matching sentinel.
pub fn func_result_relation(
    a: &MemRegionObject,
    b: &MemRegionObject,
    q: QueryContext<'_>,
) -> Option<bool> {
    match (a, b) {
        (MemRegionObject::FuncResult(f), MemRegionObject::FuncResult(g)) => Some(f == g),
        (MemRegionObject::FuncResult(_), MemRegionObject::Analysis(r))
        | (MemRegionObject::Analysis(r), MemRegionObject::FuncResult(_)) => {
            if r.is_full(q) || r.is_empty(q) {
                None
            } else {
                Some(false)
            }
        }
        _ => None,
    }
}

impl MemRegionObject {
    pub fn from_lattice<T: RegionLattice>(region: T) -> Self {
        MemRegionObject::Analysis(Box::new(region))
    }

    pub fn lattice(&self) -> Option<&dyn RegionLattice> {
        match self {
            MemRegionObject::Analysis(r) => Some(&**r),
            _ => None,
        }
    }

    pub fn downcast_ref<T: RegionLattice>(&self) -> Option<&T> {
        self.lattice()?.as_any().downcast_ref::<T>()
    }

    /// The size of the region. Unknown for sentinels and function results; for a
    /// combinator, the sizes of its children combined the same way.
    pub fn region_size(&self, q: QueryContext<'_>) -> ValueObjectPtr {
        match self {
            MemRegionObject::Empty => Rc::new(ValueObject::Empty),
            MemRegionObject::Full | MemRegionObject::FuncResult(_) => Rc::new(ValueObject::Full),
            MemRegionObject::Combined(c) => {
                let sizes = c.children().iter().map(|r| r.region_size(q)).collect();
                Rc::new(ValueObject::Combined(Combined::new(c.mode(), sizes)))
            }
            MemRegionObject::Analysis(r) => r.region_size(q),
        }
    }
}

impl Display for MemRegionObject {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            MemRegionObject::Full => write!(f, "FullRegion"),
            MemRegionObject::Empty => write!(f, "EmptyRegion"),
            MemRegionObject::FuncResult(func) => write!(f, "result({func})"),
            MemRegionObject::Combined(c) => write!(f, "{c}"),
            MemRegionObject::Analysis(r) => write!(f, "{r}"),
        }
    }
}

impl AbstractObject for MemRegionObject {
    const KIND: ObjectKind = ObjectKind::MemRegion;

    fn full() -> Self {
        MemRegionObject::Full
    }

    fn empty() -> Self {
        MemRegionObject::Empty
    }

    fn sentinel(&self) -> Option<Sentinel> {
        match self {
            MemRegionObject::Full => Some(Sentinel::Full),
            MemRegionObject::Empty => Some(Sentinel::Empty),
            _ => None,
        }
    }

    fn as_combined(&self) -> Option<&Combined<Self>> {
        match self {
            MemRegionObject::Combined(c) => Some(c),
            _ => None,
        }
    }

    fn from_combined(combined: Combined<Self>) -> Self {
        MemRegionObject::Combined(combined)
    }

    fn into_any(this: Rc<Self>) -> AnyObject {
        AnyObject::MemRegion(this)
    }

    fn from_any(object: &AnyObject) -> Option<Rc<Self>> {
        match object {
            AnyObject::MemRegion(r) => Some(Rc::clone(r)),
            _ => None,
        }
    }

    fn syntactic_base(&self) -> Option<TermId> {
        match self {
            MemRegionObject::Combined(c) => c.common_base(),
            MemRegionObject::Analysis(r) => r.syntactic_base(),
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
            (MemRegionObject::Combined(a), MemRegionObject::Combined(b)) => a.may_equal(b, q),
            (MemRegionObject::Combined(c), x) | (x, MemRegionObject::Combined(c)) => {
                c.may_equal_each(x, q)
            }
            (MemRegionObject::Analysis(a), MemRegionObject::Analysis(b)) => {
                a.may_equal(&**b, q)
            }
            (MemRegionObject::FuncResult(_), MemRegionObject::Analysis(r))
            | (MemRegionObject::Analysis(r), MemRegionObject::FuncResult(_)) => !r.is_empty(q),
            _ => true,
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
            (MemRegionObject::Combined(a), MemRegionObject::Combined(b)) => a.must_equal(b, q),
            (MemRegionObject::Combined(c), x) | (x, MemRegionObject::Combined(c)) => {
                c.must_equal_each(x, q)
            }
            (MemRegionObject::Analysis(a), MemRegionObject::Analysis(b)) => {
                a.must_equal(&**b, q)
            }
            _ => false,
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
            (MemRegionObject::Combined(a), MemRegionObject::Combined(b)) => a.equal_set(b, q),
            (MemRegionObject::Combined(c), x) | (x, MemRegionObject::Combined(c)) => {
                c.equal_set_each(x, q)
            }
            (MemRegionObject::Analysis(a), MemRegionObject::Analysis(b)) => {
                a.equal_set(&**b, q)
            }
            _ => false,
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
            (MemRegionObject::Combined(a), MemRegionObject::Combined(b)) => a.sub_set(b, q),
            (MemRegionObject::Combined(c), x) => c.sub_set_of(x, q),
            (x, MemRegionObject::Combined(c)) => c.super_set_of(x, q),
            (MemRegionObject::Analysis(a), MemRegionObject::Analysis(b)) => a.sub_set(&**b, q),
            (MemRegionObject::FuncResult(_), MemRegionObject::Analysis(b)) => b.is_full(q),
            (MemRegionObject::Analysis(a), MemRegionObject::FuncResult(_)) => a.is_empty(q),
            _ => false,
        }
    }

    fn meet_update(&mut self, other: &Self, q: QueryContext<'_>) -> bool {
        if let Some(modified) = sentinel::meet_update(self, other, q) {
            return modified;
        }
        match func_result_relation(self, other, q) {
            Some(true) => return false,
            Some(false) => {
                *self = MemRegionObject::Empty;
                return true;
            }
            None => {}
        }
        let narrowed = match (&*self, other) {
            (MemRegionObject::FuncResult(_), MemRegionObject::Analysis(r)) if r.is_empty(q) => {
                Some(MemRegionObject::Empty)
            }
            (MemRegionObject::Analysis(r), MemRegionObject::FuncResult(f)) if r.is_full(q) => {
                Some(MemRegionObject::FuncResult(*f))
            }
            _ => None,
        };
        if let Some(narrowed) = narrowed {
            *self = narrowed;
            return true;
        }
        if let MemRegionObject::Combined(c) = other {
            if !matches!(self, MemRegionObject::Combined(_)) {
                *self = MemRegionObject::Combined(c.met_with(self, q));
                return true;
            }
        }
        match (self, other) {
            (MemRegionObject::Combined(a), MemRegionObject::Combined(b)) => a.meet_update(b, q),
            (MemRegionObject::Combined(a), x) => a.meet_each(x, q),
            (MemRegionObject::Analysis(a), MemRegionObject::Analysis(b)) => {
                a.meet_update(&**b, q)
            }
            _ => false,
        }
    }

    fn is_full(&self, q: QueryContext<'_>) -> bool {
        match self {
            MemRegionObject::Full => true,
            MemRegionObject::Empty | MemRegionObject::FuncResult(_) => false,
            MemRegionObject::Combined(c) => c.is_full(q),
            MemRegionObject::Analysis(r) => r.is_full(q),
        }
    }

    fn is_empty(&self, q: QueryContext<'_>) -> bool {
        match self {
            MemRegionObject::Empty => true,
            MemRegionObject::Full | MemRegionObject::FuncResult(_) => false,
            MemRegionObject::Combined(c) => c.is_empty(q),
            MemRegionObject::Analysis(r) => r.is_empty(q),
        }
    }

    fn is_live(&self, q: QueryContext<'_>) -> bool {
        match self {
            MemRegionObject::Full | MemRegionObject::FuncResult(_) => true,
            MemRegionObject::Empty => false,
            MemRegionObject::Combined(c) => c.is_live(q),
            MemRegionObject::Analysis(r) => r.is_live(q),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{MemRegionObject, func_result_relation};
    use crate::object::{AbstractObject, Combined, ValueObject};
    use crate::testing::{Label, StubRegion, with_context};
    use conjunct_ir::{FunctionId, Literal};
    use std::rc::Rc;

    fn named(name: &'static str) -> MemRegionObject {
        MemRegionObject::from_lattice(StubRegion::named(name))
    }

    #[test]
    fn function_results_are_disjoint_from_analysis_regions() {
        with_context(|q| {
            let f = MemRegionObject::FuncResult(FunctionId::new("f"));
            assert_eq!(func_result_relation(&f, &f.clone(), q), Some(true));
            assert_eq!(func_result_relation(&f, &named("heap"), q), Some(false));
            assert_eq!(func_result_relation(&f, &MemRegionObject::Full, q), None);
            assert_eq!(func_result_relation(&named("a"), &named("b"), q), None);
        });
    }

    #[test]
    fn full_analysis_regions_contain_function_results() {
        with_context(|q| {
            let f = MemRegionObject::FuncResult(FunctionId::new("f"));
            let anywhere = MemRegionObject::from_lattice(StubRegion::anywhere());
            assert_eq!(func_result_relation(&f, &anywhere, q), None);
            assert!(f.may_equal(&anywhere, q));
            assert!(anywhere.may_equal(&f, q));
            assert!(!f.must_equal(&anywhere, q));
            assert!(f.sub_set(&anywhere, q));
            assert!(!anywhere.sub_set(&f, q));
            assert!(!f.equal_set(&anywhere, q));

            let mut met = anywhere.clone();
            assert!(met.meet_update(&f, q));
            assert!(met.equal_set(&f, q));
            let mut unchanged = f.clone();
            assert!(!unchanged.meet_update(&anywhere, q));
        });
    }

    #[test]
    fn empty_analysis_regions_are_inside_function_results() {
        with_context(|q| {
            let f = MemRegionObject::FuncResult(FunctionId::new("f"));
            let nowhere = MemRegionObject::from_lattice(StubRegion {
                label: Label::Nowhere,
                live: true,
                base: None,
            });
            assert_eq!(func_result_relation(&f, &nowhere, q), None);
            assert!(!f.may_equal(&nowhere, q));
            assert!(nowhere.sub_set(&f, q));
            assert!(!f.sub_set(&nowhere, q));
            let mut met = f.clone();
            assert!(met.meet_update(&nowhere, q));
            assert!(met.is_empty(q));
        });
    }

    #[test]
    fn function_results_through_the_object() {
        with_context(|q| {
            let f = MemRegionObject::FuncResult(FunctionId::new("f"));
            let g = MemRegionObject::FuncResult(FunctionId::new("g"));
            assert!(f.must_equal(&f.clone(), q));
            assert!(!f.may_equal(&g, q));
            assert!(f.sub_set(&MemRegionObject::Full, q));
            assert!(!f.sub_set(&named("heap"), q));
            assert!(!f.is_full(q));
            assert!(f.is_live(q));

            let mut met = f.clone();
            assert!(!met.meet_update(&f, q));
            assert!(met.meet_update(&g, q));
            assert!(met.is_empty(q));
        });
    }

    #[test]
    fn analysis_regions_delegate() {
        with_context(|q| {
            let heap = named("heap");
            let stack = named("stack");
            let anywhere = MemRegionObject::from_lattice(StubRegion::anywhere());
            assert!(heap.must_equal(&named("heap"), q));
            assert!(!heap.may_equal(&stack, q));
            assert!(heap.sub_set(&anywhere, q));
            assert!(anywhere.is_full(q));

            let mut narrowed = anywhere.clone();
            assert!(narrowed.meet_update(&heap, q));
            assert!(narrowed.equal_set(&heap, q));
            let mut conflict = heap.clone();
            assert!(conflict.meet_update(&stack, q));
            assert!(conflict.is_empty(q));
        });
    }

    #[test]
    fn dead_regions_are_not_live() {
        with_context(|q| {
            let dead = MemRegionObject::from_lattice(StubRegion::named("frame").dead());
            assert!(!dead.is_live(q));
            let either = MemRegionObject::from_combined(Combined::union(vec![
                Rc::new(dead.clone()),
                Rc::new(named("heap")),
            ]));
            assert!(either.is_live(q));
            let both = MemRegionObject::from_combined(Combined::intersect(vec![
                Rc::new(dead),
                Rc::new(named("heap")),
            ]));
            assert!(!both.is_live(q));
        });
    }

    #[test]
    fn sizes_follow_the_region() {
        with_context(|q| {
            assert!(MemRegionObject::Full.region_size(q).is_full(q));
            assert!(MemRegionObject::Empty.region_size(q).is_empty(q));
            let heap = named("heap");
            assert_eq!(heap.region_size(q).concrete_values(), vec![Literal::Int(8)]);
            let union = MemRegionObject::from_combined(Combined::union(vec![
                Rc::new(named("a")),
                Rc::new(MemRegionObject::Full),
            ]));
            let size = union.region_size(q);
            assert!(matches!(&*size, ValueObject::Combined(c) if c.child_count() == 2));
            assert!(size.is_full(q));
        });
    }
}
