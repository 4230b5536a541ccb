//! Platform authenticator capability
//!
//! The authenticator is provided by the host (browser, OS, or a security key
//! bridge). The ceremony only sees it through [`PlatformAuthenticator`].

mod software;

use async_trait::async_trait;
use thiserror::Error;

use crate::ceremony::{CeremonyOptions, CredentialResult};

pub use software::SoftwareAuthenticator;

/// Rejections a platform authenticator can return from credential creation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthenticatorError {
    /// The user dismissed the prompt, or the platform timed it out
    #[error("Not allowed: {0}")]
    NotAllowed(String),

    /// None of the requested algorithms or options can be satisfied
    #[error("Not supported: {0}")]
    NotSupported(String),

    /// The calling origin or transport is not acceptable
    #[error("Security error: {0}")]
    Security(String),

    /// The authenticator already holds an excluded credential
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Anything the platform reports that is not one of the above
    #[error("{0}")]
    Other(String),
}

impl AuthenticatorError {
    /// Maps a WebAuthn `DOMException` name onto a rejection.
    ///
    /// `AbortError` is what the platform raises when the prompt is torn down, so it
    /// is treated like a dismissal.
    pub fn from_dom_exception(name: &str, message: &str) -> Self {
        let message = message.to_string();
        match name {
            "NotAllowedError" | "AbortError" => Self::NotAllowed(message),
            "NotSupportedError" => Self::NotSupported(message),
            "SecurityError" => Self::Security(message),
            "InvalidStateError" => Self::InvalidState(message),
            other => Self::Other(format!("{other}: {message}")),
        }
    }
}

/// The single "create public-key credential" capability of the host.
#[async_trait]
pub trait PlatformAuthenticator: Send + Sync {
    /// Whether the host exposes an authenticator at all.
    ///
    /// Checked before any network traffic so an incapable device never sees a prompt.
    fn is_available(&self) -> bool;

    /// Prompts the user and creates a credential for `options`.
    ///
    /// May suspend for as long as the user leaves the prompt open.
    async fn create_credential(
        &self,
        options: &CeremonyOptions,
    ) -> Result<CredentialResult, AuthenticatorError>;
}
