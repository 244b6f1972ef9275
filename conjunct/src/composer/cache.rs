use crate::composer::{AnalysisId, QueryKind};
use crate::error::{CompositionError, fatal};
use crate::object::AnyObject;
use conjunct_ir::{PartEdge, TermId};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// Identifies one query: a question of some kind about a term at an edge.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Expr2AnyKey {
    pub term: TermId,
    pub edge: PartEdge,
    pub kind: QueryKind,
}

impl Expr2AnyKey {
    pub fn new(term: TermId, edge: PartEdge, kind: QueryKind) -> Self {
        Self { term, edge, kind }
    }
}

impl Display for Expr2AnyKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}({} @ {})", self.kind, self.term, self.edge)
    }
}

/// Progress of a query. States only ever move forward.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum QueryState {
    Init,
    /// The query has been dispatched to this analysis, which has not answered yet.
    InAnalysis(AnalysisId),
    Finished,
}

impl QueryState {
    fn name(&self) -> &'static str {
        match self {
            QueryState::Init => "Init",
            QueryState::InAnalysis(_) => "InAnalysis",
            QueryState::Finished => "Finished",
        }
    }
}

#[derive(Debug, Clone)]
struct QueryInfo {
    state: QueryState,
    result: Option<AnyObject>,
    /// Resolutions of this query currently on the stack.
    active: usize,
}

impl QueryInfo {
    fn new() -> Self {
        Self {
            state: QueryState::Init,
            result: None,
            active: 0,
        }
    }
}

/// Memoized answers and in-flight state for the queries of one composer.
///
/// The in-flight state doubles as the recursion guard: a query asked again by the
/// analysis it is currently dispatched to is a cycle.
#[derive(Debug, Default)]
pub struct TightCompositionCache {
    entries: BTreeMap<Expr2AnyKey, QueryInfo>,
}

impl TightCompositionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn state(&self, key: &Expr2AnyKey) -> Option<QueryState> {
        self.entries.get(key).map(|info| info.state)
    }

    /// The stored answer, once the query has finished.
    pub fn finished(&self, key: &Expr2AnyKey) -> Option<AnyObject> {
        self.entries
            .get(key)
            .filter(|info| info.state == QueryState::Finished)
            .and_then(|info| info.result.clone())
    }

    pub fn is_cycle(&self, key: &Expr2AnyKey, client: AnalysisId) -> bool {
        self.state(key) == Some(QueryState::InAnalysis(client))
    }

    /// Start a resolution of `key`, creating its entry if needed. Returns how many
    /// resolutions of it were already running.
    pub fn enter(&mut self, key: Expr2AnyKey) -> usize {
        let info = self.entries.entry(key).or_insert_with(QueryInfo::new);
        info.active += 1;
        info.active - 1
    }

    pub fn leave(&mut self, key: &Expr2AnyKey) {
        if let Some(info) = self.entries.get_mut(key) {
            info.active = info.active.saturating_sub(1);
        }
    }

    #[track_caller]
    pub fn mark_in_analysis(&mut self, key: &Expr2AnyKey, analysis: AnalysisId) {
        let info = self.entries.entry(*key).or_insert_with(QueryInfo::new);
        if info.state == QueryState::Finished {
            fatal(CompositionError::BackwardTransition {
                kind: key.kind,
                from: info.state.name(),
                to: "InAnalysis",
            })
        }
        info.state = QueryState::InAnalysis(analysis);
    }

    #[track_caller]
    pub fn finish(&mut self, key: &Expr2AnyKey, result: AnyObject) {
        let info = self.entries.entry(*key).or_insert_with(QueryInfo::new);
        if info.state == QueryState::Finished {
            fatal(CompositionError::BackwardTransition {
                kind: key.kind,
                from: info.state.name(),
                to: "Finished",
            })
        }
        info.state = QueryState::Finished;
        info.result = Some(result);
    }
}
