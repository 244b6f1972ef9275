use crate::composer::{Direction, QueryKind};
use crate::object::ObjectKind;
use thiserror::Error;

/// Ways a composition can be wired incorrectly.
///
/// None of these describe the analyzed program; they mean an analysis or a client
/// broke the composition protocol. Construction-time problems are returned to the
/// caller, everything detected while answering a query is fatal (see [`fatal`]).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompositionError {
    /// Two combinators were combined pairwise but hold different numbers of children
    #[error("`{operation}` on combined objects needs equal child counts, got {left} and {right}")]
    MismatchedArity {
        operation: &'static str,
        left: usize,
        right: usize,
    },
    /// An object of one family was used where another family was required
    #[error("expected a {expected:?} object but found a {found:?} object")]
    VariantMismatch {
        expected: ObjectKind,
        found: ObjectKind,
    },
    /// A finished cache entry did not hold an intersection of the query's family
    #[error("cached {kind:?} answer is not an intersection of analysis answers")]
    CorruptCacheEntry { kind: QueryKind },
    /// A query state moved backwards, e.g. a finished query was dispatched again
    #[error("{kind:?} query cannot move from {from} back to {to}")]
    BackwardTransition {
        kind: QueryKind,
        from: &'static str,
        to: &'static str,
    },
    /// An analysis was asked a query it never claimed to implement
    #[error("analysis `{analysis}` does not implement {kind:?} queries")]
    UnsupportedQuery { analysis: String, kind: QueryKind },
    /// Analyses composed together must iterate in the same direction
    #[error("analysis `{analysis}` runs {found:?} but the composition runs {expected:?}")]
    DirectionMismatch {
        analysis: String,
        expected: Direction,
        found: Direction,
    },
}

/// Report a violated composition invariant and abort the current query.
///
/// These conditions mean the composition itself is wired wrong, so there is nothing a
/// caller could do to recover.
#[track_caller]
pub(crate) fn fatal(err: CompositionError) -> ! {
    tracing::error!(%err, "composition invariant violated");
    panic!("{err}")
}
