// ABOUTME: Domain error taxonomy for dispatch operations.
// ABOUTME: Domain variants map to distinct HTTP outcomes; everything else collapses to Other.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("agent {0} not found")]
    AgentNotFound(String),

    #[error("agent {0} is outside their declared shift window")]
    AgentShiftConflict(String),

    /// A concurrent writer updated the record between our read and write.
    #[error("stale revision writing {entity} {id}")]
    StaleRevision { entity: &'static str, id: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type DispatchResult<T> = Result<T, DispatchError>;
