use std::time::Duration;
use thiserror::Error;

/// Why an inbound buffer could not be read as a telemetry frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Malformed {
    #[error("expected at least {expected} bytes, got {actual}")]
    TooShort { expected: usize, actual: usize },
    #[error("port {actual:#04x} where {expected:#04x} was expected")]
    WrongPort { expected: u8, actual: u8 },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("malformed frame: {0}")]
    MalformedFrame(Malformed),
}

/// Socket level failure while talking to the drone.
#[derive(Debug, Error)]
#[error("transport failure: {0}")]
pub struct TransportFailure(#[from] pub std::io::Error);

/// A telemetry poll that produced no usable frame.
#[derive(Debug, Error)]
pub enum PollFailure {
    #[error("no telemetry received within {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Transport(#[from] TransportFailure),
}

impl From<std::io::Error> for PollFailure {
    fn from(e: std::io::Error) -> Self {
        PollFailure::Transport(TransportFailure(e))
    }
}

/// Rejected mission content, reported back to the author.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid {field}: {reason}")]
pub struct ValidationFailure {
    pub field: &'static str,
    pub reason: String,
}

impl ValidationFailure {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}
