use thiserror::Error;

#[derive(Error, Debug)]
pub enum OffboardError {
    #[error("I/O error - {0}")]
    Io(#[from] std::io::Error),

    #[error("connection to {address} failed - {msg}")]
    Connection { address: String, msg: String },

    #[error("vehicle link is disconnected")]
    Disconnected,

    #[error("{action} rejected - {reason}")]
    Rejected { action: String, reason: String },

    #[error("no setpoint sent before starting offboard mode")]
    NoSetpoint,

    #[error("timed out waiting for {what}")]
    Timeout { what: String },

    #[error("invalid motion parameters - {msg}")]
    InvalidParams { msg: String },
}

impl OffboardError {
    pub(crate) fn rejected(action: &str, reason: impl Into<String>) -> Self {
        OffboardError::Rejected { action: action.to_string(), reason: reason.into() }
    }

    pub(crate) fn timeout(what: impl Into<String>) -> Self {
        OffboardError::Timeout { what: what.into() }
    }
}

pub type Result<T> = std::result::Result<T, OffboardError>;
