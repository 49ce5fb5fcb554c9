//! Error taxonomy for the simulator.
//!
//! Two families of errors exist:
//!
//! - Fatal: `Configuration`, `InvariantViolation`, `ComponentFaulty`, `Io`.
//!   These abort the simulation with a final diagnostic.
//! - Soft: `BufferFull`, `ChannelBusy`. These are expected backpressure
//!   signals; callers recover by retrying on the next clock boundary, and
//!   they never reach user-visible statistics.

use std::io::Error as IoError;

#[derive(Debug)]
pub enum NocError {
    /// Invalid parameter combination detected before the first event fires.
    Configuration(String),
    /// Logic bug: corrupted header, negative offset, mismatched head/tail.
    InvariantViolation(String),
    /// An operation targeted a component whose faulty flag is set.
    ComponentFaulty(String),
    /// The target input buffer has no free slot.
    BufferFull,
    /// `begin_transmit` was refused because the channel is not idle.
    ChannelBusy,
    /// Trace sink or task-record loader I/O failure.
    Io(IoError),
}

pub type Result<T> = std::result::Result<T, NocError>;

impl NocError {
    /// Soft errors are recovered at the call site by rescheduling on the
    /// next global clock boundary.
    pub fn is_soft(&self) -> bool {
        matches!(self, NocError::BufferFull | NocError::ChannelBusy)
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        NocError::InvariantViolation(message.into())
    }

    pub fn faulty(component: impl Into<String>) -> Self {
        NocError::ComponentFaulty(component.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        NocError::Configuration(message.into())
    }
}

impl std::fmt::Display for NocError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NocError::Configuration(msg) => write!(f, "configuration error: {}", msg),
            NocError::InvariantViolation(msg) => write!(f, "invariant violation: {}", msg),
            NocError::ComponentFaulty(c) => write!(f, "component is faulty: {}", c),
            NocError::BufferFull => write!(f, "input buffer full"),
            NocError::ChannelBusy => write!(f, "channel busy"),
            NocError::Io(e) => write!(f, "i/o error: {}", e),
        }
    }
}

impl std::error::Error for NocError {}

impl From<IoError> for NocError {
    fn from(e: IoError) -> Self {
        NocError::Io(e)
    }
}

impl From<serde_json::Error> for NocError {
    fn from(e: serde_json::Error) -> Self {
        NocError::Configuration(format!("task record parse error: {}", e))
    }
}

impl From<toml::de::Error> for NocError {
    fn from(e: toml::de::Error) -> Self {
        NocError::Configuration(format!("config parse error: {}", e))
    }
}
