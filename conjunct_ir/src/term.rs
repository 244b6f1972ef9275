use crate::error::IrError;
use crate::literal::Literal;
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Identity of a program term. Only meaningful together with the [`Program`] that
/// allocated it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TermId(u32);

impl TermId {
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u32 {
        self.0
    }

    fn node(&self) -> NodeIndex {
        NodeIndex::new(self.0 as usize)
    }
}

impl Display for TermId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "t{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TermKind {
    Expression,
    Statement,
    Declaration,
    Literal(Literal),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Term {
    pub kind: TermKind,
    /// Human-readable rendering of the term, used only for display
    pub label: String,
}

/// The syntax tree of a program, as far as composers need it.
///
/// Terms are nodes and each edge attaches an operand to the term that contains it,
/// weighted by the operand position. Composers use it to check that an operand query
/// names an actual operand of the term being evaluated.
#[derive(Debug, Default, Clone)]
pub struct Program {
    graph: DiGraph<Term, usize>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn add_term<S: Into<String>>(&mut self, kind: TermKind, label: S) -> TermId {
        let idx = self.graph.add_node(Term {
            kind,
            label: label.into(),
        });
        TermId(idx.index() as u32)
    }

    pub fn add_literal(&mut self, literal: Literal) -> TermId {
        let label = literal.to_string();
        self.add_term(TermKind::Literal(literal), label)
    }

    pub fn term(&self, id: TermId) -> Result<&Term, IrError> {
        self.graph
            .node_weight(id.node())
            .ok_or(IrError::UnknownTerm(id))
    }

    /// Attach `child` as the next operand of `parent`.
    pub fn add_child(&mut self, parent: TermId, child: TermId) -> Result<(), IrError> {
        self.term(child)?;
        if let Some(existing) = self.parent(child)? {
            return Err(IrError::AlreadyParented {
                child,
                parent: existing,
            });
        }
        let mut cursor = Some(parent);
        while let Some(ancestor) = cursor {
            if ancestor == child {
                return Err(IrError::CyclicTerm { child, parent });
            }
            cursor = self.parent(ancestor)?;
        }
        let position = self.children(parent)?.len();
        self.graph.add_edge(parent.node(), child.node(), position);
        Ok(())
    }

    pub fn parent(&self, id: TermId) -> Result<Option<TermId>, IrError> {
        self.term(id)?;
        Ok(self
            .graph
            .edges_directed(id.node(), Direction::Incoming)
            .next()
            .map(|e| TermId(e.source().index() as u32)))
    }

    /// Operands of `id`, in operand order.
    pub fn children(&self, id: TermId) -> Result<Vec<TermId>, IrError> {
        self.term(id)?;
        let mut children: Vec<(usize, TermId)> = self
            .graph
            .edges_directed(id.node(), Direction::Outgoing)
            .map(|e| (*e.weight(), TermId(e.target().index() as u32)))
            .collect();
        children.sort_by_key(|(pos, _)| *pos);
        Ok(children.into_iter().map(|(_, t)| t).collect())
    }

    pub fn is_operand_of(&self, operand: TermId, term: TermId) -> Result<bool, IrError> {
        Ok(self.parent(operand)? == Some(term))
    }
}
