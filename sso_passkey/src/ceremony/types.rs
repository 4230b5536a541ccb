use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `{ code, message, data }` wrapper used by every SSO endpoint.
///
/// A non-zero `code` is an application-level rejection regardless of the HTTP status.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ServerEnvelope<T> {
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Option<T>,
}

impl<T> ServerEnvelope<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: 0,
            message: "success".to_string(),
            data: Some(data),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == 0
    }
}

/// Body of the begin endpoint request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BeginRegistrationRequest {
    pub user_id: String,
    pub username: String,
    pub display_name: String,
}

/// Registration challenge issued by the server, binary fields still base64url text.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeDocument {
    pub challenge_id: String,
    pub challenge: String,
    pub rp: RelyingParty,
    pub user: UserEntity,
    #[serde(default)]
    pub pub_key_cred_params: Vec<PubKeyCredParam>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u32>,
    #[serde(default)]
    pub exclude_credentials: Vec<CredentialDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authenticator_selection: Option<AuthenticatorSelection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attestation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelyingParty {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserEntity {
    /// base64url user handle
    pub id: String,
    pub name: String,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PubKeyCredParam {
    #[serde(rename = "type")]
    pub type_: String,
    pub alg: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialDescriptor {
    #[serde(rename = "type", default = "public_key_type")]
    pub type_: String,
    /// base64url credential id
    pub id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transports: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatorSelection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authenticator_attachment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resident_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_resident_key: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_verification: Option<String>,
}

pub(crate) fn public_key_type() -> String {
    "public-key".to_string()
}

/// Challenge document with every binary field decoded.
///
/// Lives only for the duration of one authenticator call. `Debug` output
/// redacts the challenge.
#[derive(Clone, PartialEq, Eq)]
pub struct CeremonyOptions {
    pub challenge: Vec<u8>,
    pub rp: RelyingParty,
    pub user: CeremonyUser,
    pub pub_key_cred_params: Vec<PubKeyCredParam>,
    pub timeout: Option<u32>,
    pub exclude_credentials: Vec<ExcludedCredential>,
    pub authenticator_selection: Option<AuthenticatorSelection>,
    pub attestation: Option<String>,
}

impl std::fmt::Debug for CeremonyOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CeremonyOptions")
            .field("challenge", &format_args!("<{} bytes>", self.challenge.len()))
            .field("rp", &self.rp)
            .field("user", &self.user)
            .field("pub_key_cred_params", &self.pub_key_cred_params)
            .field("timeout", &self.timeout)
            .field("exclude_credentials", &self.exclude_credentials)
            .field("authenticator_selection", &self.authenticator_selection)
            .field("attestation", &self.attestation)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CeremonyUser {
    pub id: Vec<u8>,
    pub name: String,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExcludedCredential {
    pub type_: String,
    pub id: Vec<u8>,
    pub transports: Vec<String>,
}

/// Credential returned by the platform authenticator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialResult {
    /// Credential id as reported by the platform (base64url of `raw_id` on compliant platforms)
    pub id: String,
    pub raw_id: Option<Vec<u8>>,
    pub response: AttestationResponse,
    pub authenticator_attachment: Option<String>,
    pub transports: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestationResponse {
    pub attestation_object: Vec<u8>,
    pub client_data_json: Vec<u8>,
}

/// Body of the finish endpoint request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinishRequest {
    pub challenge_id: String,
    pub user_id: String,
    pub credential_id: String,
    pub attestation_object: String,
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authenticator_attachment: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transports: Vec<String>,
}

/// Passkey stored by the server after a successful registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasskeyRecord {
    pub id: String,
    pub user_id: String,
    pub credential_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aaguid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}
