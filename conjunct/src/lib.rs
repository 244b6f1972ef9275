pub mod composer;
mod config;
mod error;
pub mod object;
#[cfg(test)]
pub(crate) mod testing;

pub use conjunct_ir as ir;

pub use composer::chain::ChainComposer;
pub use composer::tight::{TightComposer, TightComposerBuilder};
pub use composer::{AnalysisId, ComposedAnalysis, Composer, Direction, QueryContext, QueryKind};
pub use config::{CachePolicy, ComposerConfig};
pub use error::CompositionError;
pub use object::{AbstractObject, AnyObject, CombinationMode, Combined, ObjectKind};
