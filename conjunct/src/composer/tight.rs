use crate::composer::cache::{Expr2AnyKey, QueryState, TightCompositionCache};
use crate::composer::{
    AnalysisId, ComposedAnalysis, Composer, Direction, Member, QueryContext, QueryKind,
    Queryable, register,
};
use crate::config::{CachePolicy, ComposerConfig};
use crate::error::{CompositionError, fatal};
use crate::object::{
    CodeLocObjectPtr, Combined, MemLocObjectPtr, MemRegionObjectPtr, ValueObjectPtr,
};
use conjunct_ir::{EdgeGraph, PartEdge, Program, TermId};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tracing::{Level, event, instrument};

/// Composes analyses that all answer every query together.
///
/// Each query is dispatched to every member analysis that implements its kind, and
/// to the parent composer if there is one. The answers are combined into an
/// intersection: each analysis contributes what it knows, and the result is as
/// precise as the most precise of them.
///
/// Answers are memoized per (term, edge, kind). While a query is dispatched to a
/// member, that member asking the same query again gets a full object instead of
/// recursing.
#[derive(Debug)]
pub struct TightComposer {
    id: AnalysisId,
    direction: Direction,
    members: Vec<Member>,
    parent: Option<Rc<dyn Composer>>,
    edges: Option<Rc<dyn EdgeGraph>>,
    program: Option<Rc<Program>>,
    config: ComposerConfig,
    cache: RefCell<TightCompositionCache>,
    depth: Cell<usize>,
}

#[derive(Debug, Default)]
pub struct TightComposerBuilder {
    config: ComposerConfig,
    direction: Option<Direction>,
    parent: Option<Rc<dyn Composer>>,
    edges: Option<Rc<dyn EdgeGraph>>,
    program: Option<Rc<Program>>,
    analyses: Vec<Rc<dyn ComposedAnalysis>>,
}

impl TightComposerBuilder {
    pub fn config(mut self, config: ComposerConfig) -> Self {
        self.config = config;
        self
    }

    /// The direction every analysis must run in. Defaults to the direction of the
    /// first analysis.
    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = Some(direction);
        self
    }

    pub fn parent(mut self, parent: Rc<dyn Composer>) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn edge_graph(mut self, edges: Rc<dyn EdgeGraph>) -> Self {
        self.edges = Some(edges);
        self
    }

    /// Operand queries naming a term that is not an operand of the queried term are
    /// answered with a full object.
    pub fn program(mut self, program: Rc<Program>) -> Self {
        self.program = Some(program);
        self
    }

    pub fn analysis(mut self, analysis: Rc<dyn ComposedAnalysis>) -> Self {
        self.analyses.push(analysis);
        self
    }

    pub fn analyses<I: IntoIterator<Item = Rc<dyn ComposedAnalysis>>>(mut self, analyses: I) -> Self {
        self.analyses.extend(analyses);
        self
    }

    #[instrument(skip_all, fields(analyses = self.analyses.len()))]
    pub fn build(self) -> Result<TightComposer, CompositionError> {
        let direction = self
            .direction
            .or_else(|| self.analyses.first().map(|a| a.direction()))
            .unwrap_or_default();
        let members = register(self.analyses, direction)?;
        let composer = TightComposer {
            id: AnalysisId::fresh(),
            direction,
            members,
            parent: self.parent,
            edges: self.edges,
            program: self.program,
            config: self.config,
            cache: RefCell::new(TightCompositionCache::new()),
            depth: Cell::new(0),
        };
        event!(Level::DEBUG, id = %composer.id, "built tight composer");
        Ok(composer)
    }
}

impl TightComposer {
    pub fn builder() -> TightComposerBuilder {
        TightComposerBuilder::default()
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn config(&self) -> &ComposerConfig {
        &self.config
    }

    /// The ids member analyses were registered under, in dispatch order.
    pub fn member_ids(&self) -> Vec<AnalysisId> {
        self.members.iter().map(|m| m.id).collect()
    }

    /// Forget every memoized answer. Dataflow engines call this when analysis state
    /// changes between queries.
    pub fn clear_cache(&self) {
        self.cache.borrow_mut().clear();
    }

    pub fn cached_queries(&self) -> usize {
        self.cache.borrow().len()
    }

    pub fn query_state(&self, term: TermId, edge: PartEdge, kind: QueryKind) -> Option<QueryState> {
        self.cache
            .borrow()
            .state(&Expr2AnyKey::new(term, edge, kind))
    }

    /// A finished answer for `key`. Finished answers are always intersections built by
    /// [`dispatch`](Self::dispatch).
    fn cached<F: Queryable>(&self, key: &Expr2AnyKey) -> Option<Rc<F>> {
        let object = self.cache.borrow().finished(key)?;
        match F::from_any(&object) {
            Some(answer) if answer.as_combined().is_some_and(|c| !c.is_union()) => Some(answer),
            _ => fatal(CompositionError::CorruptCacheEntry { kind: key.kind }),
        }
    }

    #[instrument(level = "debug", skip(self), fields(composer = %self.id, kind = ?F::QUERY))]
    fn expr_to_any<F: Queryable>(&self, term: TermId, edge: PartEdge, client: AnalysisId) -> Rc<F> {
        self.depth.set(self.depth.get() + 1);
        let answer = self.resolve::<F>(term, edge, client);
        self.depth.set(self.depth.get() - 1);
        if self.depth.get() == 0 && self.config.cache_policy == CachePolicy::PerTopLevelQuery {
            self.cache.borrow_mut().clear();
        }
        answer
    }

    fn resolve<F: Queryable>(&self, term: TermId, edge: PartEdge, client: AnalysisId) -> Rc<F> {
        let key = Expr2AnyKey::new(term, edge, F::QUERY);
        if let Some(answer) = self.cached::<F>(&key) {
            tracing::trace!(%key, "cache hit");
            return answer;
        }
        if self.cache.borrow().is_cycle(&key, client) {
            tracing::debug!(%key, %client, "cycle detected, answering full");
            return Rc::new(F::full());
        }
        let running = self.cache.borrow_mut().enter(key);
        let answer = if running > self.config.reentrant_resolutions {
            tracing::debug!(%key, running, "re-entry bound reached, answering full");
            Rc::new(F::full())
        } else {
            self.dispatch::<F>(&key, client)
        };
        self.cache.borrow_mut().leave(&key);
        answer
    }

    /// Ask every implementing member and the parent, then store their intersection.
    fn dispatch<F: Queryable>(&self, key: &Expr2AnyKey, client: AnalysisId) -> Rc<F> {
        let mut answers = Vec::new();
        for member in &self.members {
            if !F::implemented_by(member.analysis.as_ref()) {
                continue;
            }
            // a nested resolution may have finished this query while we were busy
            if let Some(answer) = self.cached::<F>(key) {
                tracing::debug!(%key, "resolved by a nested query");
                return answer;
            }
            self.cache.borrow_mut().mark_in_analysis(key, member.id);
            tracing::debug!(%key, %client, analysis = member.analysis.name(), "dispatching");
            let q = QueryContext::new(key.edge, self, member.id);
            answers.push(F::ask_analysis(member.analysis.as_ref(), key.term, q));
        }
        if let Some(parent) = &self.parent {
            answers.insert(0, F::ask_composer(parent.as_ref(), key.term, key.edge, self.id));
        }
        if let Some(answer) = self.cached::<F>(key) {
            return answer;
        }
        let combined = Rc::new(F::from_combined(Combined::intersect(answers)));
        self.cache
            .borrow_mut()
            .finish(key, F::into_any(Rc::clone(&combined)));
        combined
    }

    /// Query `operand` along every edge on which it was evaluated for `term`.
    fn operand_expr_to_any<F: Queryable>(
        &self,
        term: TermId,
        operand: TermId,
        edge: PartEdge,
        client: AnalysisId,
    ) -> Rc<F> {
        if let Some(program) = self.program() {
            match program.is_operand_of(operand, term) {
                Ok(true) => {}
                Ok(false) => {
                    tracing::debug!(%term, %operand, "not an operand, answering full");
                    return Rc::new(F::full());
                }
                Err(error) => {
                    tracing::warn!(%term, %operand, %error, "operand check failed, answering full");
                    return Rc::new(F::full());
                }
            }
        }
        let Some(graph) = self.edge_graph() else {
            return self.expr_to_any::<F>(operand, edge, client);
        };
        match graph.operand_edges(term, operand, edge).as_slice() {
            [] => {
                tracing::debug!(%term, %operand, %edge, "operand unreachable, answering full");
                Rc::new(F::full())
            }
            [single] => self.expr_to_any::<F>(operand, *single, client),
            many => {
                let answers = many
                    .iter()
                    .map(|e| self.expr_to_any::<F>(operand, *e, client))
                    .collect();
                Rc::new(F::from_combined(Combined::new(
                    self.config.operand_combination,
                    answers,
                )))
            }
        }
    }
}

impl Composer for TightComposer {
    fn id(&self) -> AnalysisId {
        self.id
    }

    fn expr_to_value(&self, term: TermId, edge: PartEdge, client: AnalysisId) -> ValueObjectPtr {
        self.expr_to_any(term, edge, client)
    }

    fn expr_to_code_loc(
        &self,
        term: TermId,
        edge: PartEdge,
        client: AnalysisId,
    ) -> CodeLocObjectPtr {
        self.expr_to_any(term, edge, client)
    }

    fn expr_to_mem_region(
        &self,
        term: TermId,
        edge: PartEdge,
        client: AnalysisId,
    ) -> MemRegionObjectPtr {
        self.expr_to_any(term, edge, client)
    }

    fn expr_to_mem_loc(
        &self,
        term: TermId,
        edge: PartEdge,
        client: AnalysisId,
    ) -> MemLocObjectPtr {
        self.expr_to_any(term, edge, client)
    }

    fn operand_expr_to_value(
        &self,
        term: TermId,
        operand: TermId,
        edge: PartEdge,
        client: AnalysisId,
    ) -> ValueObjectPtr {
        self.operand_expr_to_any(term, operand, edge, client)
    }

    fn operand_expr_to_code_loc(
        &self,
        term: TermId,
        operand: TermId,
        edge: PartEdge,
        client: AnalysisId,
    ) -> CodeLocObjectPtr {
        self.operand_expr_to_any(term, operand, edge, client)
    }

    fn operand_expr_to_mem_region(
        &self,
        term: TermId,
        operand: TermId,
        edge: PartEdge,
        client: AnalysisId,
    ) -> MemRegionObjectPtr {
        self.operand_expr_to_any(term, operand, edge, client)
    }

    fn operand_expr_to_mem_loc(
        &self,
        term: TermId,
        operand: TermId,
        edge: PartEdge,
        client: AnalysisId,
    ) -> MemLocObjectPtr {
        self.operand_expr_to_any(term, operand, edge, client)
    }

    fn edge_graph(&self) -> Option<Rc<dyn EdgeGraph>> {
        self.edges
            .clone()
            .or_else(|| self.parent.as_ref().and_then(|p| p.edge_graph()))
    }

    fn program(&self) -> Option<Rc<Program>> {
        self.program
            .clone()
            .or_else(|| self.parent.as_ref().and_then(|p| p.program()))
    }
}
