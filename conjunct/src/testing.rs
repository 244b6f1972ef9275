//! Stub objects and analyses shared by the unit tests.

use crate::composer::chain::ChainComposer;
use crate::composer::{AnalysisId, ComposedAnalysis, Direction, QueryContext};
use crate::object::{
    AsAny, MemLocObject, MemLocObjectPtr, MemRegionObject, MemRegionObjectPtr, RegionLattice,
    ValueLattice, ValueObject, ValueObjectPtr,
};
use conjunct_ir::{Literal, PartEdge, TermId};
use std::cell::Cell;
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::rc::Rc;
use tracing_subscriber::EnvFilter;

pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Run `f` with a context whose composer has no analyses.
pub(crate) fn with_context<R>(f: impl FnOnce(QueryContext<'_>) -> R) -> R {
    init_tracing();
    let root = ChainComposer::new(Vec::new()).unwrap();
    f(QueryContext::new(PartEdge::new(0), &root, AnalysisId::fresh()))
}

/// The flat constant lattice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Flat {
    Bottom,
    Const(i64),
    Top,
}

#[derive(Debug, Clone)]
pub(crate) struct StubValue {
    pub(crate) flat: Flat,
    pub(crate) base: Option<TermId>,
}

impl StubValue {
    pub(crate) fn constant(value: i64) -> Self {
        Self {
            flat: Flat::Const(value),
            base: None,
        }
    }

    pub(crate) fn top() -> Self {
        Self {
            flat: Flat::Top,
            base: None,
        }
    }

    pub(crate) fn bottom() -> Self {
        Self {
            flat: Flat::Bottom,
            base: None,
        }
    }

    pub(crate) fn with_base(mut self, base: TermId) -> Self {
        self.base = Some(base);
        self
    }

    fn peer<'a>(&self, other: &'a dyn ValueLattice) -> Option<&'a StubValue> {
        other.as_any().downcast_ref::<StubValue>()
    }
}

impl Display for StubValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.flat {
            Flat::Bottom => write!(f, "bottom"),
            Flat::Const(c) => write!(f, "{c}"),
            Flat::Top => write!(f, "top"),
        }
    }
}

impl ValueLattice for StubValue {
    fn may_equal(&self, other: &dyn ValueLattice, _q: QueryContext<'_>) -> bool {
        let Some(other) = self.peer(other) else {
            return true;
        };
        match (&self.flat, &other.flat) {
            (Flat::Bottom, _) | (_, Flat::Bottom) => false,
            (Flat::Const(a), Flat::Const(b)) => a == b,
            _ => true,
        }
    }

    fn must_equal(&self, other: &dyn ValueLattice, _q: QueryContext<'_>) -> bool {
        match self.peer(other).map(|o| (&self.flat, &o.flat)) {
            Some((Flat::Const(a), Flat::Const(b))) => a == b,
            _ => false,
        }
    }

    fn equal_set(&self, other: &dyn ValueLattice, _q: QueryContext<'_>) -> bool {
        self.peer(other).is_some_and(|o| o.flat == self.flat)
    }

    fn sub_set(&self, other: &dyn ValueLattice, _q: QueryContext<'_>) -> bool {
        let Some(other) = self.peer(other) else {
            return false;
        };
        match (&self.flat, &other.flat) {
            (Flat::Bottom, _) | (_, Flat::Top) => true,
            (Flat::Const(a), Flat::Const(b)) => a == b,
            _ => false,
        }
    }

    fn meet_update(&mut self, other: &dyn ValueLattice, _q: QueryContext<'_>) -> bool {
        let Some(other) = self.peer(other) else {
            return false;
        };
        let met = match (&self.flat, &other.flat) {
            (Flat::Bottom, _) | (_, Flat::Top) => return false,
            (Flat::Const(a), Flat::Const(b)) if a == b => return false,
            (Flat::Top, theirs) => theirs.clone(),
            _ => Flat::Bottom,
        };
        self.flat = met;
        true
    }

    fn is_full(&self, _q: QueryContext<'_>) -> bool {
        self.flat == Flat::Top
    }

    fn is_empty(&self, _q: QueryContext<'_>) -> bool {
        self.flat == Flat::Bottom
    }

    fn is_concrete(&self) -> bool {
        matches!(self.flat, Flat::Const(_))
    }

    fn concrete_values(&self) -> Vec<Literal> {
        match self.flat {
            Flat::Const(c) => vec![Literal::Int(c)],
            _ => Vec::new(),
        }
    }

    fn syntactic_base(&self) -> Option<TermId> {
        self.base
    }
}

pub(crate) fn konst(value: i64) -> ValueObjectPtr {
    Rc::new(ValueObject::from_lattice(StubValue::constant(value)))
}

pub(crate) fn unknown() -> ValueObjectPtr {
    Rc::new(ValueObject::from_lattice(StubValue::top()))
}

pub(crate) fn bottom() -> ValueObjectPtr {
    Rc::new(ValueObject::from_lattice(StubValue::bottom()))
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Label {
    Nowhere,
    Named(&'static str),
    Anywhere,
}

/// Regions named by a label, with an 8-byte size when named.
#[derive(Debug, Clone)]
pub(crate) struct StubRegion {
    pub(crate) label: Label,
    pub(crate) live: bool,
    pub(crate) base: Option<TermId>,
}

impl StubRegion {
    pub(crate) fn named(name: &'static str) -> Self {
        Self {
            label: Label::Named(name),
            live: true,
            base: None,
        }
    }

    pub(crate) fn anywhere() -> Self {
        Self {
            label: Label::Anywhere,
            live: true,
            base: None,
        }
    }

    pub(crate) fn dead(mut self) -> Self {
        self.live = false;
        self
    }

    pub(crate) fn with_base(mut self, base: TermId) -> Self {
        self.base = Some(base);
        self
    }

    fn peer<'a>(&self, other: &'a dyn RegionLattice) -> Option<&'a StubRegion> {
        other.as_any().downcast_ref::<StubRegion>()
    }
}

impl Display for StubRegion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.label {
            Label::Nowhere => write!(f, "nowhere"),
            Label::Named(name) => write!(f, "{name}"),
            Label::Anywhere => write!(f, "anywhere"),
        }
    }
}

impl RegionLattice for StubRegion {
    fn may_equal(&self, other: &dyn RegionLattice, _q: QueryContext<'_>) -> bool {
        match self.peer(other).map(|o| (self.label, o.label)) {
            Some((Label::Nowhere, _) | (_, Label::Nowhere)) => false,
            Some((Label::Named(a), Label::Named(b))) => a == b,
            _ => true,
        }
    }

    fn must_equal(&self, other: &dyn RegionLattice, _q: QueryContext<'_>) -> bool {
        match self.peer(other).map(|o| (self.label, o.label)) {
            Some((Label::Named(a), Label::Named(b))) => a == b,
            _ => false,
        }
    }

    fn equal_set(&self, other: &dyn RegionLattice, _q: QueryContext<'_>) -> bool {
        self.peer(other).is_some_and(|o| o.label == self.label)
    }

    fn sub_set(&self, other: &dyn RegionLattice, _q: QueryContext<'_>) -> bool {
        match self.peer(other).map(|o| (self.label, o.label)) {
            Some((Label::Nowhere, _) | (_, Label::Anywhere)) => true,
            Some((Label::Named(a), Label::Named(b))) => a == b,
            _ => false,
        }
    }

    fn meet_update(&mut self, other: &dyn RegionLattice, _q: QueryContext<'_>) -> bool {
        let Some(other) = self.peer(other) else {
            return false;
        };
        let met = match (self.label, other.label) {
            (Label::Nowhere, _) | (_, Label::Anywhere) => return false,
            (Label::Named(a), Label::Named(b)) if a == b => return false,
            (Label::Anywhere, theirs) => theirs,
            _ => Label::Nowhere,
        };
        self.label = met;
        true
    }

    fn is_full(&self, _q: QueryContext<'_>) -> bool {
        self.label == Label::Anywhere
    }

    fn is_empty(&self, _q: QueryContext<'_>) -> bool {
        self.label == Label::Nowhere
    }

    fn is_live(&self, _q: QueryContext<'_>) -> bool {
        self.live
    }

    fn region_size(&self, _q: QueryContext<'_>) -> ValueObjectPtr {
        match self.label {
            Label::Named(_) => konst(8),
            Label::Nowhere => bottom(),
            Label::Anywhere => unknown(),
        }
    }

    fn syntactic_base(&self) -> Option<TermId> {
        self.base
    }
}

/// Answers value queries with fixed constants, and unknown for other terms.
#[derive(Debug)]
pub(crate) struct ConstAnalysis {
    name: &'static str,
    answers: HashMap<TermId, i64>,
    direction: Direction,
    dispatches: Cell<usize>,
}

impl ConstAnalysis {
    pub(crate) fn new(name: &'static str) -> Self {
        Self {
            name,
            answers: HashMap::new(),
            direction: Direction::Forward,
            dispatches: Cell::new(0),
        }
    }

    pub(crate) fn with(mut self, term: TermId, value: i64) -> Self {
        self.answers.insert(term, value);
        self
    }

    pub(crate) fn backward(mut self) -> Self {
        self.direction = Direction::Backward;
        self
    }

    pub(crate) fn dispatches(&self) -> usize {
        self.dispatches.get()
    }
}

impl ComposedAnalysis for ConstAnalysis {
    fn name(&self) -> &str {
        self.name
    }

    fn direction(&self) -> Direction {
        self.direction
    }

    fn implements_expr_to_value(&self) -> bool {
        true
    }

    fn expr_to_value(&self, term: TermId, _q: QueryContext<'_>) -> ValueObjectPtr {
        self.dispatches.set(self.dispatches.get() + 1);
        match self.answers.get(&term) {
            Some(value) => konst(*value),
            None => unknown(),
        }
    }
}

/// Answers a value query by asking the composer about another term (or the same one).
#[derive(Debug)]
pub(crate) struct EchoAnalysis {
    name: &'static str,
    redirects: HashMap<TermId, TermId>,
    dispatches: Cell<usize>,
}

impl EchoAnalysis {
    pub(crate) fn new(name: &'static str) -> Self {
        Self {
            name,
            redirects: HashMap::new(),
            dispatches: Cell::new(0),
        }
    }

    pub(crate) fn redirect(mut self, from: TermId, to: TermId) -> Self {
        self.redirects.insert(from, to);
        self
    }

    pub(crate) fn dispatches(&self) -> usize {
        self.dispatches.get()
    }
}

impl ComposedAnalysis for EchoAnalysis {
    fn name(&self) -> &str {
        self.name
    }

    fn implements_expr_to_value(&self) -> bool {
        true
    }

    fn expr_to_value(&self, term: TermId, q: QueryContext<'_>) -> ValueObjectPtr {
        self.dispatches.set(self.dispatches.get() + 1);
        let target = self.redirects.get(&term).copied().unwrap_or(term);
        q.value(target)
    }
}

/// Places every term in a named region.
#[derive(Debug)]
pub(crate) struct RegionAnalysis {
    name: &'static str,
    regions: HashMap<TermId, &'static str>,
}

impl RegionAnalysis {
    pub(crate) fn new(name: &'static str) -> Self {
        Self {
            name,
            regions: HashMap::new(),
        }
    }

    pub(crate) fn with(mut self, term: TermId, region: &'static str) -> Self {
        self.regions.insert(term, region);
        self
    }
}

impl ComposedAnalysis for RegionAnalysis {
    fn name(&self) -> &str {
        self.name
    }

    fn implements_expr_to_mem_region(&self) -> bool {
        true
    }

    fn implements_expr_to_mem_loc(&self) -> bool {
        true
    }

    fn expr_to_mem_region(&self, term: TermId, _q: QueryContext<'_>) -> MemRegionObjectPtr {
        let region = match self.regions.get(&term) {
            Some(name) => StubRegion::named(*name),
            None => StubRegion::anywhere(),
        };
        Rc::new(MemRegionObject::from_lattice(region))
    }

    fn expr_to_mem_loc(&self, term: TermId, q: QueryContext<'_>) -> MemLocObjectPtr {
        Rc::new(MemLocObject::at(self.expr_to_mem_region(term, q), None))
    }
}

/// Claims memory-location queries without answering them.
#[derive(Debug)]
pub(crate) struct Unanswering;

impl ComposedAnalysis for Unanswering {
    fn name(&self) -> &str {
        "unanswering"
    }

    fn implements_expr_to_mem_loc(&self) -> bool {
        true
    }
}
