//! Error types for the HetProc substrate abstraction.

use crate::types::{ModelId, TimelineIndex};
use thiserror::Error;

/// Errors reported by a simulation substrate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubstrateError {
    /// The model reference is not known to the substrate
    #[error("Unknown model: {0}")]
    UnknownModel(ModelId),

    /// An outgoing model is not currently executing
    #[error("Model {0} is not running")]
    NotRunning(ModelId),

    /// An incoming model is already executing
    #[error("Model {0} is already running")]
    AlreadyRunning(ModelId),

    /// A model appears more than once in a single swap
    #[error("Model {0} appears more than once in the swap")]
    DuplicateModel(ModelId),

    /// An isolated timeline is already bound to another model
    #[error("{timeline} is already bound to {owner}")]
    TimelineInUse {
        timeline: TimelineIndex,
        owner: ModelId,
    },

    /// The machine has not been started yet
    #[error("Machine has not been booted")]
    NotBooted,

    /// The machine was already started
    #[error("Machine has already been booted")]
    AlreadyBooted,

    /// The swap primitive itself failed
    #[error("Swap failed: {0}")]
    SwapFailed(String),
}

impl SubstrateError {
    /// Creates a swap failure.
    pub fn swap_failed(msg: impl Into<String>) -> Self {
        Self::SwapFailed(msg.into())
    }
}
