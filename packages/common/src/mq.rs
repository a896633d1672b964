use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::fmt::Debug;
use thiserror::Error;
use tracing::{debug, error};

/// Core trait for all MQ messages
pub trait Message: Serialize + DeserializeOwned + Debug + Send + Sync + Clone {
    fn message_type() -> &'static str
    where
        Self: Sized;

    fn message_id(&self) -> &str;
}

/// Message envelope for transport
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEnvelope {
    pub message_type: String,
    pub message_id: String,
    pub payload: serde_json::Value,
}

impl MessageEnvelope {
    /// Create envelope from typed message
    pub fn from_message<M: Message>(message: M) -> Result<Self, MqError> {
        let message_type = M::message_type().to_string();
        let message_id = message.message_id().to_string();

        debug!(
            message_type = %message_type,
            message_id = %message_id,
            "Creating message envelope"
        );

        Ok(Self {
            message_type,
            message_id,
            payload: serde_json::to_value(&message)?,
        })
    }

    /// Deserialize into typed message
    pub fn into_message<M: Message>(self) -> Result<M, MqError> {
        if self.message_type != M::message_type() {
            error!(
                expected = M::message_type(),
                actual = %self.message_type,
                message_id = %self.message_id,
                "Message type mismatch"
            );
            return Err(MqError::TypeMismatch {
                expected: M::message_type().to_string(),
                actual: self.message_type,
            });
        }

        serde_json::from_value(self.payload).map_err(|e| {
            error!(error = %e, message_id = %self.message_id, "Deserialization failed");
            MqError::Serialization(e)
        })
    }
}

#[derive(Debug, Error)]
pub enum MqError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Queue not found: {0}")]
    QueueNotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Message type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("Internal error: {0}")]
    Internal(String),
}
