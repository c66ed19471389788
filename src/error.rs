//! Error types shared by the gateways and the credential store.

use thiserror::Error;

/// Failures surfaced by the LLM gateway.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Gemini API key is not provided. Please add your API key to use this feature.")]
    MissingCredential,
    #[error("The API key does not look like a valid Gemini key.")]
    InvalidCredentialFormat,
    #[error("API key was rejected: {0}")]
    Unauthorized(String),
    #[error("Rate limit or quota exceeded: {0}")]
    RateLimited(String),
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("{0}")]
    Unknown(String),
}

impl GatewayError {
    /// Credential problems are reported to the user without recording an
    /// assistant turn.
    pub fn is_credential_problem(&self) -> bool {
        matches!(
            self,
            GatewayError::MissingCredential | GatewayError::InvalidCredentialFormat
        )
    }
}

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("keyring error: {0}")]
    Keyring(String),
    #[error("environment error: {0}")]
    Environment(String),
    #[error("credential store is read-only: {0}")]
    ReadOnly(&'static str),
}

impl From<keyring::Error> for CredentialError {
    fn from(err: keyring::Error) -> Self {
        CredentialError::Keyring(err.to_string())
    }
}
