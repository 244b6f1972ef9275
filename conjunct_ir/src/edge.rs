use crate::error::IrError;
use crate::term::TermId;
use petgraph::Direction;
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::{Dfs, EdgeRef, Reversed};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::{Debug, Display, Formatter};
use tracing::instrument;

/// A node of the abstract transition system: one abstract program point.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PartId(u32);

impl PartId {
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u32 {
        self.0
    }
}

impl Display for PartId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "p{}", self.0)
    }
}

/// A partial-execution edge: an opaque token naming the point between two steps of
/// execution. Every abstract-object query is asked with respect to one of these.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PartEdge(u32);

impl PartEdge {
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u32 {
        self.0
    }
}

impl Display for PartEdge {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// The slice of the dataflow engine's edge graph that composers rely on.
pub trait EdgeGraph: Debug {
    /// The edges whose execution prefixes end at `operand`, evaluated as part of
    /// `term`, and which can lead to `edge`.
    fn operand_edges(&self, term: TermId, operand: TermId, edge: PartEdge) -> Vec<PartEdge>;
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
struct Part {
    term: TermId,
}

/// An abstract transition system: parts located at program terms, connected by
/// partial-execution edges.
#[derive(Debug, Default, Clone)]
pub struct AtsGraph {
    graph: DiGraph<Part, ()>,
}

impl AtsGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_part(&mut self, term: TermId) -> PartId {
        PartId(self.graph.add_node(Part { term }).index() as u32)
    }

    pub fn add_edge(&mut self, from: PartId, to: PartId) -> Result<PartEdge, IrError> {
        self.part(from)?;
        self.part(to)?;
        let idx = self
            .graph
            .add_edge(NodeIndex::new(from.0 as usize), NodeIndex::new(to.0 as usize), ());
        Ok(PartEdge(idx.index() as u32))
    }

    pub fn endpoints(&self, edge: PartEdge) -> Result<(PartId, PartId), IrError> {
        self.graph
            .edge_endpoints(EdgeIndex::new(edge.0 as usize))
            .map(|(s, t)| (PartId(s.index() as u32), PartId(t.index() as u32)))
            .ok_or(IrError::UnknownEdge(edge))
    }

    fn part(&self, id: PartId) -> Result<&Part, IrError> {
        self.graph
            .node_weight(NodeIndex::new(id.0 as usize))
            .ok_or(IrError::UnknownPart(id))
    }
}

impl EdgeGraph for AtsGraph {
    /// Edges entering a part at `operand` whose target can still reach the source
    /// of `edge`, in edge order.
    #[instrument(level = "trace", skip(self))]
    fn operand_edges(&self, term: TermId, operand: TermId, edge: PartEdge) -> Vec<PartEdge> {
        let (source, _) = match self.endpoints(edge) {
            Ok(ends) => ends,
            Err(e) => {
                tracing::warn!(%e, "operand query against an edge outside this graph");
                return Vec::new();
            }
        };
        let reversed = Reversed(&self.graph);
        let mut dfs = Dfs::new(reversed, NodeIndex::new(source.0 as usize));
        let mut reaching = HashSet::new();
        while let Some(idx) = dfs.next(reversed) {
            reaching.insert(idx);
        }
        let mut found: Vec<PartEdge> = reaching
            .iter()
            .filter(|idx| self.graph[**idx].term == operand)
            .flat_map(|idx| self.graph.edges_directed(*idx, Direction::Incoming))
            .map(|e| PartEdge(e.id().index() as u32))
            .collect();
        found.sort();
        found.dedup();
        found
    }
}
