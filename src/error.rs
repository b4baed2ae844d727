use thiserror::Error;

/// Errors surfaced by the Pod storage adapter
#[derive(Debug, Error)]
pub enum PodError {
    /// Resource or container is absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Resource exists but belongs to someone else. Stores convert this to
    /// `NotFound` before it reaches callers.
    #[error("Ownership mismatch: {0}")]
    OwnershipMismatch(String),

    /// Unexpected HTTP status
    #[error("{method} {url} failed ({status}): {body}")]
    Transport {
        method: String,
        url: String,
        status: u16,
        body: String,
    },

    /// The request never produced a response
    #[error("Network error: {0}")]
    Network(String),

    /// A resource body could not be decoded
    #[error("Failed to decode {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// A message update could not be attributed to a conversation
    #[error("Conversation id required to update message {0}")]
    ConversationIdRequired(String),

    /// The identity cannot be mapped to a storage root
    #[error("Storage location unresolvable: {0}")]
    StorageUnresolvable(String),

    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl PodError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, PodError::NotFound(_))
    }

    /// Hide the existence of another owner's resource
    pub fn conceal_ownership(self) -> Self {
        match self {
            PodError::OwnershipMismatch(url) => PodError::NotFound(url),
            other => other,
        }
    }
}

impl From<reqwest::Error> for PodError {
    fn from(err: reqwest::Error) -> Self {
        PodError::Network(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PodError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conceal_ownership() {
        let err = PodError::OwnershipMismatch("https://pod.example/a.json".into());
        assert!(err.conceal_ownership().is_not_found());

        let err = PodError::Network("reset".into());
        assert!(!err.conceal_ownership().is_not_found());
    }
}
