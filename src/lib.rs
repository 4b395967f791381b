//! Online optic-flow estimation for event-based vision sensors.
//!
//! Polarity events stream in through [`pipeline::Pipeline::process`]; each
//! is checked against its spatial neighborhood by the adaptive
//! background-activity filter, fit to a local plane by the Benosman 2014
//! estimator, and optionally cross-checked against nearby flow vectors by
//! the regularization filter. Events that end up carrying a flow vector
//! are handed off to a dedicated writer thread that serializes them to a
//! serial port, a CSV file, or both.

pub mod adaptive;
pub mod buffer;
pub mod config;
pub mod error;
pub mod estimator;
pub mod event;
pub mod output;
pub mod pipeline;
pub mod regularization;
pub mod telemetry;

pub use config::{Config, OutputMode};
pub use error::{PipelineError, Result};
pub use event::{Event, Packet};
pub use pipeline::Pipeline;
