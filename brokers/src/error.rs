use lapin::{
    protocol::{AMQPErrorKind, AMQPSoftError},
    Error as LapinError,
};
use std::{io::Error as IoError, result::Result as StdResult};
use thiserror::Error;

pub type Result<T, E = Error> = StdResult<T, E>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Lapin error: {0}")]
    Lapin(#[from] LapinError),

    #[error("IO error: {0}")]
    Io(#[from] IoError),

    #[error("Invalid value for {var}: {reason}")]
    Config { var: &'static str, reason: String },

    #[error("Failed to declare {object} {name:?}: {source}")]
    Topology {
        object: &'static str,
        name: String,
        #[source]
        source: LapinError,
    },

    #[error("Handler error: {0}")]
    Handler(String),

    #[error("Consumer closed by the broker")]
    ConsumerClosed,
}

impl Error {
    /// Whether the broker refused a declaration because an object with the same name already
    /// exists with different parameters (406 PRECONDITION_FAILED).
    pub fn is_conflict(&self) -> bool {
        match self {
            Error::Topology {
                source: LapinError::ProtocolError(err),
                ..
            } => matches!(
                err.kind(),
                AMQPErrorKind::Soft(AMQPSoftError::PRECONDITIONFAILED)
            ),
            _ => false,
        }
    }
}
