//! Pipeline error types
//!
//! Steady-state degradations (skipped events, failed deliveries, evicted
//! queue items) are expressed in return types, not errors. The variants here
//! cover startup wiring and outbound provider calls only.

use thiserror::Error;

/// Result type alias for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors that can occur during pipeline setup or provider calls
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Invalid or missing configuration at startup
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Contacts file could not be read
    #[error("failed to read contacts file {path}: {source}")]
    ContactsIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Contacts file could not be parsed
    #[error("failed to parse contacts file {path}: {message}")]
    ContactsParse { path: String, message: String },

    /// An outbound provider call (value resolution, delivery channel) failed
    #[error("provider call failed: {0}")]
    Provider(#[from] reqwest::Error),

    /// A provider answered with a non-success status
    #[error("provider {provider} returned status {status}")]
    ProviderStatus { provider: String, status: u16 },

    /// Wire payload could not be serialized
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = PipelineError::Config("missing listen address".into());
        assert_eq!(err.to_string(), "invalid configuration: missing listen address");
    }

    #[test]
    fn test_provider_status_display() {
        let err = PipelineError::ProviderStatus {
            provider: "sms".into(),
            status: 502,
        };
        assert!(err.to_string().contains("sms"));
        assert!(err.to_string().contains("502"));
    }
}
