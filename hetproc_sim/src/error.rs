//! Error types for simulation runs.

use hetproc_core::ProcessorError;
use hetproc_env::SubstrateError;
use thiserror::Error;

/// Errors that can end a simulation run.
#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Processor(#[from] ProcessorError),

    #[error(transparent)]
    Substrate(#[from] SubstrateError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SimError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
