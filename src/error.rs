//! Error hierarchy for the optic-flow pipeline.
//!
//! Mirrors the split seen in this codebase's other device-facing crates:
//! configuration failures are surfaced from construction and stop the
//! pipeline before it starts; I/O failures opening a sink degrade that sink
//! rather than stopping the pipeline; a failure to spawn the writer thread
//! is fatal to construction since the pipeline has nowhere to hand off
//! output.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("thread error: {0}")]
    Thread(String),
}

impl From<serialport::Error> for PipelineError {
    fn from(e: serialport::Error) -> Self {
        PipelineError::Io(std::io::Error::other(e))
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
