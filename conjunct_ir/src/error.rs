use crate::edge::{PartEdge, PartId};
use crate::term::TermId;
use thiserror::Error;

/// An error raised while building or reading the program representation
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IrError {
    /// A [`TermId`] was used with a [`Program`](crate::Program) that never allocated it
    #[error("term {0} does not exist in this program")]
    UnknownTerm(TermId),
    /// A [`PartId`] was used with an [`AtsGraph`](crate::AtsGraph) that never allocated it
    #[error("part {0} does not exist in this transition system")]
    UnknownPart(PartId),
    /// A [`PartEdge`] was used with an [`AtsGraph`](crate::AtsGraph) that never allocated it
    #[error("edge {0} does not exist in this transition system")]
    UnknownEdge(PartEdge),
    /// Terms form a tree; a term can only be attached to one parent
    #[error("term {child} already has parent {parent}")]
    AlreadyParented { child: TermId, parent: TermId },
    /// Attaching the child would make a term its own ancestor
    #[error("attaching {child} under {parent} would create a cycle")]
    CyclicTerm { child: TermId, parent: TermId },
}
