//! Error types for switchable processors.
//!
//! Every variant except `Substrate` is a usage or configuration error: the
//! experiment is mis-assembled and must not run. Substrate failures are
//! passed through untouched.

use hetproc_env::{Isa, ModelId, SubstrateError};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProcessorError {
    #[error("Key {0} cannot be found in the switchable configurations")]
    UnknownStartingConfiguration(String),

    #[error("Configuration '{0}' is defined more than once")]
    DuplicateConfiguration(String),

    #[error("Configuration '{0}' has no cores")]
    EmptyConfiguration(String),

    #[error("Configuration '{configuration}' has {found} cores, expected {expected}")]
    SlotCountMismatch {
        configuration: String,
        expected: usize,
        found: usize,
    },

    #[error("Configuration '{configuration}' uses slot {slot} more than once")]
    DuplicateSlot { configuration: String, slot: usize },

    #[error("Configuration '{configuration}' does not use the same slot ids as '{reference}'")]
    SlotLayoutMismatch {
        configuration: String,
        reference: String,
    },

    #[error("A processor must target a single ISA, found {isas:?}")]
    HeterogeneousIsa { isas: Vec<Isa> },

    #[error("{0} is referenced by more than one core")]
    DuplicateModel(ModelId),

    #[error("Number of cores must be a positive integer")]
    InvalidCoreCount,

    #[error("Ran out of isolated timelines after {0} accelerated cores")]
    TimelinesExhausted(usize),

    #[error("The processor has not been incorporated")]
    NotIncorporated,

    #[error("The processor has already been incorporated")]
    AlreadyIncorporated,

    #[error("Key {0} is not a key in the switchable configurations")]
    UnknownConfiguration(String),

    #[error("Cannot swap current cores ('{0}') with the current cores")]
    AlreadyActive(String),

    #[error(transparent)]
    Substrate(#[from] SubstrateError),
}
