//! Passkey registration ceremony
//!
//! Begin request, challenge decoding, one authenticator prompt, finish submission.

mod options;
mod registrar;
mod state;
mod types;

pub use registrar::{PasskeyRegistrar, PreparedRegistration};
pub use types::{
    AttestationResponse, AuthenticatorSelection, BeginRegistrationRequest, CeremonyOptions,
    CeremonyUser, ChallengeDocument, CredentialDescriptor, CredentialResult, ExcludedCredential,
    FinishRequest, PasskeyRecord, PubKeyCredParam, RelyingParty, ServerEnvelope, UserEntity,
};
