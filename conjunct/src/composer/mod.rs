//! Routing abstract-object queries between analyses.
//!
//! An analysis never asks another analysis directly. It asks the [`Composer`] named in
//! its [`QueryContext`], which decides which analyses answer and how their answers are
//! combined. Composers nest: a [`TightComposer`](tight::TightComposer) can sit below a
//! parent composer and forward every query to it as well.

pub mod cache;
pub mod chain;
pub mod tight;


use crate::error::{CompositionError, fatal};
use crate::object::{
    AbstractObject, AnyObject, CodeLocObject, CodeLocObjectPtr, MemLocObject, MemLocObjectPtr,
    MemRegionObject, MemRegionObjectPtr, ValueObject, ValueObjectPtr, match_family, match_pair,
};
use conjunct_ir::{EdgeGraph, PartEdge, Program, TermId};
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display, Formatter};
use std::rc::Rc;
use std::sync::atomic::{AtomicU32, Ordering};

/// Identity of an analysis or composer taking part in a composition.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AnalysisId(u32);

static NEXT_ANALYSIS_ID: AtomicU32 = AtomicU32::new(0);

impl AnalysisId {
    /// A process-wide unique id.
    pub fn fresh() -> Self {
        Self(NEXT_ANALYSIS_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl Display for AnalysisId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "a{}", self.0)
    }
}

/// The direction in which an analysis propagates facts over the program.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    Forward,
    Backward,
}

/// The kind of question asked about a term.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum QueryKind {
    Any,
    CodeLoc,
    Value,
    MemLoc,
    MemRegion,
    AtsGraph,
}

/// What every object operation and analysis query is asked with respect to.
#[derive(Debug, Copy, Clone)]
pub struct QueryContext<'a> {
    pub edge: PartEdge,
    /// The composer further questions must be routed through.
    pub composer: &'a dyn Composer,
    /// The analysis on whose behalf the question is asked.
    pub analysis: AnalysisId,
}

impl<'a> QueryContext<'a> {
    pub fn new(edge: PartEdge, composer: &'a dyn Composer, analysis: AnalysisId) -> Self {
        Self {
            edge,
            composer,
            analysis,
        }
    }

    /// The same question, asked at another edge.
    pub fn at(self, edge: PartEdge) -> Self {
        Self { edge, ..self }
    }

    pub fn value(&self, term: TermId) -> ValueObjectPtr {
        self.composer.expr_to_value(term, self.edge, self.analysis)
    }

    pub fn code_loc(&self, term: TermId) -> CodeLocObjectPtr {
        self.composer.expr_to_code_loc(term, self.edge, self.analysis)
    }

    pub fn mem_region(&self, term: TermId) -> MemRegionObjectPtr {
        self.composer
            .expr_to_mem_region(term, self.edge, self.analysis)
    }

    pub fn mem_loc(&self, term: TermId) -> MemLocObjectPtr {
        self.composer.expr_to_mem_loc(term, self.edge, self.analysis)
    }
}

#[track_caller]
fn unsupported(analysis: &str, kind: QueryKind) -> ! {
    fatal(CompositionError::UnsupportedQuery {
        analysis: analysis.to_string(),
        kind,
    })
}

/// An analysis that answers abstract-object queries as part of a composition.
///
/// An analysis claims a query kind through the matching `implements_*` method and
/// must then override the query method. Composers never ask an analysis a kind it did
/// not claim; doing so anyway is fatal.
pub trait ComposedAnalysis: Debug {
    fn name(&self) -> &str;

    fn direction(&self) -> Direction {
        Direction::Forward
    }

    fn implements_expr_to_value(&self) -> bool {
        false
    }

    fn implements_expr_to_code_loc(&self) -> bool {
        false
    }

    fn implements_expr_to_mem_region(&self) -> bool {
        false
    }

    fn implements_expr_to_mem_loc(&self) -> bool {
        false
    }

    fn expr_to_value(&self, _term: TermId, _q: QueryContext<'_>) -> ValueObjectPtr {
        unsupported(self.name(), QueryKind::Value)
    }

    fn expr_to_code_loc(&self, _term: TermId, _q: QueryContext<'_>) -> CodeLocObjectPtr {
        unsupported(self.name(), QueryKind::CodeLoc)
    }

    fn expr_to_mem_region(&self, _term: TermId, _q: QueryContext<'_>) -> MemRegionObjectPtr {
        unsupported(self.name(), QueryKind::MemRegion)
    }

    fn expr_to_mem_loc(&self, _term: TermId, _q: QueryContext<'_>) -> MemLocObjectPtr {
        unsupported(self.name(), QueryKind::MemLoc)
    }
}

/// Answers abstract-object queries on behalf of the analyses composed under it.
///
/// `client` is the analysis (or nested composer) asking. The relational predicates
/// are the hook through which a composer can override how objects compare; by default
/// they ask the objects themselves.
pub trait Composer: Debug {
    fn id(&self) -> AnalysisId;

    fn expr_to_value(&self, term: TermId, edge: PartEdge, client: AnalysisId) -> ValueObjectPtr;

    fn expr_to_code_loc(
        &self,
        term: TermId,
        edge: PartEdge,
        client: AnalysisId,
    ) -> CodeLocObjectPtr;

    fn expr_to_mem_region(
        &self,
        term: TermId,
        edge: PartEdge,
        client: AnalysisId,
    ) -> MemRegionObjectPtr;

    fn expr_to_mem_loc(&self, term: TermId, edge: PartEdge, client: AnalysisId)
    -> MemLocObjectPtr;

    /// The value of `operand` as it was computed for evaluating `term`.
    fn operand_expr_to_value(
        &self,
        _term: TermId,
        operand: TermId,
        edge: PartEdge,
        client: AnalysisId,
    ) -> ValueObjectPtr {
        self.expr_to_value(operand, edge, client)
    }

    fn operand_expr_to_code_loc(
        &self,
        _term: TermId,
        operand: TermId,
        edge: PartEdge,
        client: AnalysisId,
    ) -> CodeLocObjectPtr {
        self.expr_to_code_loc(operand, edge, client)
    }

    fn operand_expr_to_mem_region(
        &self,
        _term: TermId,
        operand: TermId,
        edge: PartEdge,
        client: AnalysisId,
    ) -> MemRegionObjectPtr {
        self.expr_to_mem_region(operand, edge, client)
    }

    fn operand_expr_to_mem_loc(
        &self,
        _term: TermId,
        operand: TermId,
        edge: PartEdge,
        client: AnalysisId,
    ) -> MemLocObjectPtr {
        self.expr_to_mem_loc(operand, edge, client)
    }

    /// The abstract transition system the composition runs over, when one is attached.
    fn edge_graph(&self) -> Option<Rc<dyn EdgeGraph>> {
        None
    }

    /// The syntax tree operand queries are checked against, when one is attached.
    fn program(&self) -> Option<Rc<Program>> {
        None
    }

    fn may_equal(&self, a: &AnyObject, b: &AnyObject, q: QueryContext<'_>) -> bool {
        match_pair!(a, b, |x, y| x.may_equal(y, q), false)
    }

    fn must_equal(&self, a: &AnyObject, b: &AnyObject, q: QueryContext<'_>) -> bool {
        match_pair!(a, b, |x, y| x.must_equal(y, q), false)
    }

    fn equal_set(&self, a: &AnyObject, b: &AnyObject, q: QueryContext<'_>) -> bool {
        match_pair!(a, b, |x, y| x.equal_set(y, q), false)
    }

    fn sub_set(&self, a: &AnyObject, b: &AnyObject, q: QueryContext<'_>) -> bool {
        match_pair!(a, b, |x, y| x.sub_set(y, q), false)
    }

    /// Meet `b` into `a`, copying `a`'s object first if it is shared.
    fn meet_update(&self, a: &mut AnyObject, b: &AnyObject, q: QueryContext<'_>) -> bool {
        let (expected, found) = (a.kind(), b.kind());
        match_pair!(
            a,
            b,
            |x, y| Rc::make_mut(x).meet_update(y, q),
            fatal(CompositionError::VariantMismatch { expected, found })
        )
    }

    fn is_full(&self, a: &AnyObject, q: QueryContext<'_>) -> bool {
        match_family!(a, |x| x.is_full(q))
    }

    fn is_empty(&self, a: &AnyObject, q: QueryContext<'_>) -> bool {
        match_family!(a, |x| x.is_empty(q))
    }

    fn is_live(&self, a: &AnyObject, q: QueryContext<'_>) -> bool {
        match_family!(a, |x| x.is_live(q))
    }
}

/// A family of objects that composers can be asked for.
pub(crate) trait Queryable: AbstractObject {
    const QUERY: QueryKind;

    fn implemented_by(analysis: &dyn ComposedAnalysis) -> bool;

    fn ask_analysis(analysis: &dyn ComposedAnalysis, term: TermId, q: QueryContext<'_>)
    -> Rc<Self>;

    fn ask_composer(
        composer: &dyn Composer,
        term: TermId,
        edge: PartEdge,
        client: AnalysisId,
    ) -> Rc<Self>;
}

macro_rules! impl_queryable {
    ($family:ty, $kind:ident, $implements:ident, $query:ident) => {
        impl Queryable for $family {
            const QUERY: QueryKind = QueryKind::$kind;

            fn implemented_by(analysis: &dyn ComposedAnalysis) -> bool {
                analysis.$implements()
            }

            fn ask_analysis(
                analysis: &dyn ComposedAnalysis,
                term: TermId,
                q: QueryContext<'_>,
            ) -> Rc<Self> {
                analysis.$query(term, q)
            }

            fn ask_composer(
                composer: &dyn Composer,
                term: TermId,
                edge: PartEdge,
                client: AnalysisId,
            ) -> Rc<Self> {
                composer.$query(term, edge, client)
            }
        }
    };
}

impl_queryable!(ValueObject, Value, implements_expr_to_value, expr_to_value);
impl_queryable!(
    CodeLocObject,
    CodeLoc,
    implements_expr_to_code_loc,
    expr_to_code_loc
);
impl_queryable!(
    MemRegionObject,
    MemRegion,
    implements_expr_to_mem_region,
    expr_to_mem_region
);
impl_queryable!(
    MemLocObject,
    MemLoc,
    implements_expr_to_mem_loc,
    expr_to_mem_loc
);

/// An analysis registered with a composer, under the id the composer knows it by.
#[derive(Debug, Clone)]
pub(crate) struct Member {
    pub(crate) id: AnalysisId,
    pub(crate) analysis: Rc<dyn ComposedAnalysis>,
}

/// Assign ids to `analyses`, checking they all run in `direction`.
pub(crate) fn register<I>(analyses: I, direction: Direction) -> Result<Vec<Member>, CompositionError>
where
    I: IntoIterator<Item = Rc<dyn ComposedAnalysis>>,
{
    analyses
        .into_iter()
        .map(|analysis| {
            if analysis.direction() != direction {
                return Err(CompositionError::DirectionMismatch {
                    analysis: analysis.name().to_string(),
                    expected: direction,
                    found: analysis.direction(),
                });
            }
            Ok(Member {
                id: AnalysisId::fresh(),
                analysis,
            })
        })
        .collect()
}
