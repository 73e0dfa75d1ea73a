use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MeetError {
    #[error("session creation failed: {0}")]
    SessionCreation(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("native sdk error: {0}")]
    Native(String),
    #[error("invalid command: {0}")]
    InvalidCommand(String),
    #[error("no active meeting session")]
    NotStarted,
    #[error("invalid join info: {0}")]
    JoinInfo(String),
    #[error("network request failed: {0}")]
    NetworkRequest(String),
    #[error("configuration error: {0}")]
    Config(String),
}

impl MeetError {
    /// Text carried by the `Error` event for this failure.
    pub fn bridge_message(&self) -> String {
        match self {
            MeetError::SessionCreation(msg)
            | MeetError::PermissionDenied(msg)
            | MeetError::Native(msg)
            | MeetError::InvalidCommand(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}

/// Distinguished failures carried by an `Error` event instead of a raw message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    #[serde(rename = "OnMaximumConcurrentVideoReached")]
    MaximumConcurrentVideoReached,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::MaximumConcurrentVideoReached => "OnMaximumConcurrentVideoReached",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
