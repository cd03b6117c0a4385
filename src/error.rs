//! Error type for simulator construction and host-facing lookups.
//!
//! Clocked evaluation itself never fails: every input combination has a
//! defined output, and arithmetic overflow is a registered flag.

use thiserror::Error;

/// Errors that the simulator can return.
#[derive(Error, Debug)]
pub enum SimError {
    /// The requested operand width is outside `1..=MAX_WIDTH`.
    #[error("operand width {0} is out of range (expected 1..=8)")]
    InvalidWidth(u32),

    /// A poke or peek named a signal that does not exist (or is not writable).
    #[error("unknown signal: {0}")]
    UnknownSignal(String),

    /// The configuration JSON could not be parsed.
    #[error("failed to parse config JSON: {0}")]
    Config(#[from] serde_json::Error),

    /// A VCD file could not be created or written.
    #[error("VCD I/O error: {0}")]
    Io(#[from] std::io::Error),
}
