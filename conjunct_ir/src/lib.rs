pub(crate) mod edge;
pub(crate) mod error;
pub(crate) mod function;
pub(crate) mod literal;
pub(crate) mod term;

pub use edge::{AtsGraph, EdgeGraph, PartEdge, PartId};
pub use error::IrError;
pub use function::FunctionId;
pub use literal::Literal;
pub use term::{Program, Term, TermId, TermKind};
