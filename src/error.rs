//! Error types reported by the suggestion engine
//!
//! Nothing here is fatal. Callers log these and carry on.

use thiserror::Error;

use crate::instance::InstanceId;

#[derive(Debug, Error)]
pub enum SuggestError {
    /// Operation referenced an id that was never registered or is already gone.
    #[error("unknown suggestion instance {0}")]
    UnknownInstance(InstanceId),

    /// A provider errored or panicked while handling a pretext change.
    #[error("provider {provider} failed: {message}")]
    ProviderFailure { provider: String, message: String },
}

pub type Result<T, E = SuggestError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_culprit() {
        let err = SuggestError::ProviderFailure {
            provider: "mentions".to_string(),
            message: "timed out".to_string(),
        };
        assert_eq!(err.to_string(), "provider mentions failed: timed out");

        let id = InstanceId::new();
        let err = SuggestError::UnknownInstance(id);
        assert!(err.to_string().contains(&id.to_string()));
    }
}
