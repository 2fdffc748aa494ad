use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbUpdatesError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Lock error: {0}")]
    Lock(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Processor '{0}' already registered")]
    AlreadyRegistered(String),

    #[error("Unrecognized event key '{0}'")]
    UnknownKey(String),

    #[error("Payload '{payload}' does not match event key '{key}'")]
    PayloadMismatch { key: String, payload: &'static str },

    #[error("Malformed batch: {0}")]
    MalformedBatch(String),

    #[error("Processor '{0}' has not been started")]
    NotStarted(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<serde_json::Error> for DbUpdatesError {
    fn from(err: serde_json::Error) -> Self {
        DbUpdatesError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DbUpdatesError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_carry_context() {
        let err = DbUpdatesError::PayloadMismatch {
            key: "room-state-update".into(),
            payload: "device_delete",
        };
        assert_eq!(
            err.to_string(),
            "Payload 'device_delete' does not match event key 'room-state-update'"
        );
        assert_eq!(
            DbUpdatesError::AlreadyRegistered("syncapi_current_room_state".into()).to_string(),
            "Processor 'syncapi_current_room_state' already registered"
        );
    }

    #[test]
    fn test_json_errors_convert() {
        let err: DbUpdatesError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, DbUpdatesError::Serialization(_)));
    }
}
