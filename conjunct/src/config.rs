use crate::object::CombinationMode;
use serde::{Deserialize, Serialize};

/// How long a [`TightComposer`](crate::TightComposer) keeps finished query results.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CachePolicy {
    /// Keep every finished result for the lifetime of the composer, or until
    /// [`TightComposer::clear_cache`](crate::TightComposer::clear_cache) is called.
    #[default]
    Retain,
    /// Forget every result once the outermost query returns. Suited to dataflow
    /// engines that update analysis state between queries.
    PerTopLevelQuery,
}

/// Tunables for composers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComposerConfig {
    pub cache_policy: CachePolicy,
    /// How answers for an operand reached along several edges are combined.
    pub operand_combination: CombinationMode,
    /// How many extra nested resolutions of a query that is already being resolved
    /// are allowed before the composer answers with a full object instead.
    pub reentrant_resolutions: usize,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            cache_policy: CachePolicy::Retain,
            operand_combination: CombinationMode::Union,
            reentrant_resolutions: 1,
        }
    }
}
