//! Error types surfaced by a registration ceremony

use serde::Serialize;
use thiserror::Error;

use crate::authenticator::AuthenticatorError;
use crate::codec::CodecError;
use crate::config::ConfigError;

/// Stable tag for each [`CeremonyError`] variant.
///
/// UI layers choose their messaging from this tag instead of matching on
/// error strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CeremonyErrorKind {
    UnsupportedPlatform,
    MalformedChallenge,
    UserCancelled,
    SecurityViolation,
    InvalidAuthenticatorState,
    ServerRejected,
    CodecError,
    CeremonyInProgress,
    Transport,
    MalformedResponse,
    Authenticator,
    Config,
    Internal,
}

impl CeremonyErrorKind {
    /// Returns the tag as it appears in serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnsupportedPlatform => "unsupported_platform",
            Self::MalformedChallenge => "malformed_challenge",
            Self::UserCancelled => "user_cancelled",
            Self::SecurityViolation => "security_violation",
            Self::InvalidAuthenticatorState => "invalid_authenticator_state",
            Self::ServerRejected => "server_rejected",
            Self::CodecError => "codec_error",
            Self::CeremonyInProgress => "ceremony_in_progress",
            Self::Transport => "transport",
            Self::MalformedResponse => "malformed_response",
            Self::Authenticator => "authenticator",
            Self::Config => "config",
            Self::Internal => "internal",
        }
    }
}

impl std::fmt::Display for CeremonyErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can end a passkey registration ceremony.
///
/// Every failure inside [`crate::PasskeyRegistrar::begin_registration`] is
/// returned as one of these variants; nothing panics past that call.
#[derive(Debug, Error)]
pub enum CeremonyError {
    /// The device or browser has no usable platform authenticator
    #[error("Platform authenticator is not available")]
    UnsupportedPlatform,

    /// The challenge document could not be decoded
    #[error("Malformed challenge: {0}")]
    MalformedChallenge(String),

    /// The user dismissed the authenticator prompt or it timed out
    #[error("Registration was cancelled")]
    UserCancelled,

    /// The origin or transport does not meet the authenticator's requirements
    #[error("Security violation: {0}")]
    SecurityViolation(String),

    /// The authenticator refused, e.g. it already holds a credential for this account
    #[error("Invalid authenticator state: {0}")]
    InvalidAuthenticatorState(String),

    /// The server answered with a non-zero application code; the message is verbatim
    #[error("{message}")]
    ServerRejected { code: i64, message: String },

    /// A binary field of the authenticator result could not be encoded
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Another ceremony is still waiting on the authenticator
    #[error("A passkey registration is already in progress")]
    CeremonyInProgress,

    /// The request never produced a usable server envelope
    #[error("Transport error: {0}")]
    Transport(String),

    /// The finish endpoint accepted the request but returned no usable record
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// The authenticator failed for a reason outside the known rejections
    #[error("Authenticator error: {0}")]
    Authenticator(String),

    /// Client configuration is missing or invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// The ceremony was driven out of order
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CeremonyError {
    /// Returns the stable kind tag for this error.
    pub fn kind(&self) -> CeremonyErrorKind {
        match self {
            Self::UnsupportedPlatform => CeremonyErrorKind::UnsupportedPlatform,
            Self::MalformedChallenge(_) => CeremonyErrorKind::MalformedChallenge,
            Self::UserCancelled => CeremonyErrorKind::UserCancelled,
            Self::SecurityViolation(_) => CeremonyErrorKind::SecurityViolation,
            Self::InvalidAuthenticatorState(_) => CeremonyErrorKind::InvalidAuthenticatorState,
            Self::ServerRejected { .. } => CeremonyErrorKind::ServerRejected,
            Self::Codec(_) => CeremonyErrorKind::CodecError,
            Self::CeremonyInProgress => CeremonyErrorKind::CeremonyInProgress,
            Self::Transport(_) => CeremonyErrorKind::Transport,
            Self::MalformedResponse(_) => CeremonyErrorKind::MalformedResponse,
            Self::Authenticator(_) => CeremonyErrorKind::Authenticator,
            Self::Config(_) => CeremonyErrorKind::Config,
            Self::Internal(_) => CeremonyErrorKind::Internal,
        }
    }

    /// Whether starting a fresh ceremony can reasonably succeed.
    ///
    /// A retry always fetches a new challenge; a stale challenge is never reused.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::UnsupportedPlatform
            | Self::SecurityViolation(_)
            | Self::Codec(_)
            | Self::MalformedResponse(_)
            | Self::Config(_)
            | Self::Internal(_) => false,
            Self::MalformedChallenge(_)
            | Self::UserCancelled
            | Self::InvalidAuthenticatorState(_)
            | Self::ServerRejected { .. }
            | Self::CeremonyInProgress
            | Self::Transport(_)
            | Self::Authenticator(_) => true,
        }
    }

    /// Log the error and return self
    ///
    /// User-caused soft failures go to `info` and server rejections to `warn`.
    pub fn log(self) -> Self {
        match &self {
            Self::UserCancelled | Self::CeremonyInProgress => {
                tracing::info!(kind = %self.kind(), "{}", self)
            }
            Self::ServerRejected { code, message } => {
                tracing::warn!(code, "Server rejected passkey registration: {}", message)
            }
            _ => tracing::error!(kind = %self.kind(), "{}", self),
        }
        self
    }
}

impl From<AuthenticatorError> for CeremonyError {
    fn from(err: AuthenticatorError) -> Self {
        match err {
            AuthenticatorError::NotAllowed(_) => Self::UserCancelled,
            AuthenticatorError::NotSupported(_) => Self::UnsupportedPlatform,
            AuthenticatorError::Security(msg) => Self::SecurityViolation(msg),
            AuthenticatorError::InvalidState(msg) => Self::InvalidAuthenticatorState(msg),
            AuthenticatorError::Other(msg) => Self::Authenticator(msg),
        }
    }
}

impl From<ConfigError> for CeremonyError {
    fn from(err: ConfigError) -> Self {
        let error = Self::Config(err.to_string());
        tracing::error!("{}", error);
        error
    }
}

impl From<reqwest::Error> for CeremonyError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
