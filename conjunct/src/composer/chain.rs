use crate::composer::{
    AnalysisId, ComposedAnalysis, Composer, Direction, Member, QueryContext, Queryable, register,
};
use crate::error::CompositionError;
use crate::object::{CodeLocObjectPtr, MemLocObjectPtr, MemRegionObjectPtr, ValueObjectPtr};
use conjunct_ir::{EdgeGraph, PartEdge, Program, TermId};
use std::rc::Rc;

/// The root composer of an analysis pipeline.
///
/// Analyses run in order, and each may ask about what the analyses before it
/// computed. A query from a member is answered by the closest earlier member that
/// implements the query kind. A query from anyone else, such as a nested
/// [`TightComposer`](super::tight::TightComposer), is answered by the last member that
/// implements it. When no member can answer, the answer is a full object.
#[derive(Debug)]
pub struct ChainComposer {
    id: AnalysisId,
    direction: Direction,
    members: Vec<Member>,
    edges: Option<Rc<dyn EdgeGraph>>,
    program: Option<Rc<Program>>,
}

impl ChainComposer {
    pub fn new<I>(analyses: I) -> Result<Self, CompositionError>
    where
        I: IntoIterator<Item = Rc<dyn ComposedAnalysis>>,
    {
        let analyses: Vec<_> = analyses.into_iter().collect();
        let direction = analyses.first().map(|a| a.direction()).unwrap_or_default();
        Ok(Self {
            id: AnalysisId::fresh(),
            direction,
            members: register(analyses, direction)?,
            edges: None,
            program: None,
        })
    }

    pub fn with_edge_graph(mut self, edges: Rc<dyn EdgeGraph>) -> Self {
        self.edges = Some(edges);
        self
    }

    pub fn with_program(mut self, program: Rc<Program>) -> Self {
        self.program = Some(program);
        self
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn member_ids(&self) -> Vec<AnalysisId> {
        self.members.iter().map(|m| m.id).collect()
    }

    fn responder<F: Queryable>(&self, client: AnalysisId) -> Option<&Member> {
        let before = self
            .members
            .iter()
            .position(|m| m.id == client)
            .unwrap_or(self.members.len());
        self.members[..before]
            .iter()
            .rev()
            .find(|m| F::implemented_by(m.analysis.as_ref()))
    }

    fn expr_to_any<F: Queryable>(&self, term: TermId, edge: PartEdge, client: AnalysisId) -> Rc<F> {
        match self.responder::<F>(client) {
            Some(member) => {
                tracing::trace!(%term, %client, analysis = member.analysis.name(), "chain dispatch");
                let q = QueryContext::new(edge, self, member.id);
                F::ask_analysis(member.analysis.as_ref(), term, q)
            }
            None => Rc::new(F::full()),
        }
    }
}

impl Composer for ChainComposer {
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

    fn edge_graph(&self) -> Option<Rc<dyn EdgeGraph>> {
        self.edges.clone()
    }

    fn program(&self) -> Option<Rc<Program>> {
        self.program.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::ChainComposer;
    use crate::composer::{AnalysisId, ComposedAnalysis, Composer, Direction};
    use crate::error::CompositionError;
    use crate::object::AbstractObject;
    use crate::testing::{ConstAnalysis, EchoAnalysis, init_tracing};
    use conjunct_ir::{Literal, PartEdge, TermId};
    use std::rc::Rc;

    #[test]
    fn members_see_earlier_members() {
        init_tracing();
        let x = TermId::new(0);
        let first = Rc::new(ConstAnalysis::new("first").with(x, 1));
        let second = Rc::new(ConstAnalysis::new("second").with(x, 2));
        let chain = ChainComposer::new([
            first.clone() as Rc<dyn ComposedAnalysis>,
            second.clone() as Rc<dyn ComposedAnalysis>,
        ])
        .unwrap();
        let [first_id, second_id] = chain.member_ids()[..] else {
            panic!("two members")
        };
        let edge = PartEdge::new(0);

        let outside = chain.expr_to_value(x, edge, AnalysisId::fresh());
        assert_eq!(outside.concrete_values(), vec![Literal::Int(2)]);
        let from_second = chain.expr_to_value(x, edge, second_id);
        assert_eq!(from_second.concrete_values(), vec![Literal::Int(1)]);
        let from_first = chain.expr_to_value(x, edge, first_id);
        assert!(from_first.is_full(crate::QueryContext::new(edge, &chain, first_id)));
        assert_eq!(first.dispatches(), 1);
        assert_eq!(second.dispatches(), 1);
    }

    #[test]
    fn self_queries_fall_back_to_earlier_members() {
        init_tracing();
        let x = TermId::new(4);
        let base = Rc::new(ConstAnalysis::new("base").with(x, 9));
        let echo = Rc::new(EchoAnalysis::new("echo"));
        let chain = ChainComposer::new([
            base as Rc<dyn ComposedAnalysis>,
            echo.clone() as Rc<dyn ComposedAnalysis>,
        ])
        .unwrap();
        let answer = chain.expr_to_value(x, PartEdge::new(0), AnalysisId::fresh());
        assert_eq!(answer.concrete_values(), vec![Literal::Int(9)]);
        assert_eq!(echo.dispatches(), 1);
    }

    #[test]
    fn directions_must_agree() {
        let forward = Rc::new(ConstAnalysis::new("fwd")) as Rc<dyn ComposedAnalysis>;
        let backward = Rc::new(ConstAnalysis::new("bwd").backward()) as Rc<dyn ComposedAnalysis>;
        let err = ChainComposer::new([forward, backward]).unwrap_err();
        assert_eq!(
            err,
            CompositionError::DirectionMismatch {
                analysis: "bwd".to_string(),
                expected: Direction::Forward,
                found: Direction::Backward,
            }
        );
    }
}
