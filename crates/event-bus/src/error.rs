use thiserror::Error;

/// Errors raised while publishing or decoding integration events.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("Failed to publish to {topic}: {reason}")]
    PublishFailed { topic: String, reason: String },

    #[error("Malformed message on {topic}: {source}")]
    Malformed {
        topic: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
