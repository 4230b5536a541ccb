//! sso-passkey - Passkey registration client for the SSO admin console
//!
//! Runs the WebAuthn registration ceremony between an SSO server and a platform
//! authenticator: fetch a challenge, decode its base64url fields, prompt the
//! authenticator once, and submit the encoded attestation for verification.
//! Attestation verification itself stays on the server.

mod authenticator;
mod ceremony;
mod codec;
mod config;
mod errors;
mod server;


pub use authenticator::{AuthenticatorError, PlatformAuthenticator, SoftwareAuthenticator};

pub use ceremony::{
    AttestationResponse, AuthenticatorSelection, BeginRegistrationRequest, CeremonyOptions,
    CeremonyUser, ChallengeDocument, CredentialDescriptor, CredentialResult,
    ExcludedCredential, FinishRequest, PasskeyRecord, PasskeyRegistrar, PreparedRegistration,
    PubKeyCredParam, RelyingParty, ServerEnvelope, UserEntity,
};

pub use codec::{CodecError, base64url_decode, base64url_encode};

pub use config::{ConfigError, ServerConfig, origin_from_env};

pub use errors::{CeremonyError, CeremonyErrorKind};

pub use server::{HttpRegistrationServer, RegistrationServer};
