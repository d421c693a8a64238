use thiserror::Error;

use crate::cache::CacheError;

/// Engine-level error type returned from the public fetch entry point.
///
/// Provider failures never appear here: they are recovered per provider and
/// surfaced in the fetch report. Cache failures appear here only from the
/// standalone cache operations; inside a fetch they degrade to warnings.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("cache error: {0}")]
    Cache(#[from] CacheError),
}
