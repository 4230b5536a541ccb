use std::collections::HashSet;

use async_trait::async_trait;
use ciborium::value::{Integer, Value as CborValue};
use ring::{
    digest,
    rand::{SecureRandom, SystemRandom},
    signature::{self, EcdsaKeyPair, KeyPair},
};
use tokio::sync::Mutex;
use url::Url;

use super::{AuthenticatorError, PlatformAuthenticator};
use crate::ceremony::{AttestationResponse, CeremonyOptions, CredentialResult};
use crate::codec::base64url_encode;

const ES256: i64 = -7;
const CREDENTIAL_ID_LEN: usize = 16;

/// Flags for authenticator data
mod flags {
    pub(super) const UP: u8 = 1 << 0;
    pub(super) const UV: u8 = 1 << 2;
    pub(super) const AT: u8 = 1 << 6;
}

/// In-process authenticator producing ES256 credentials with `"none"` attestation.
///
/// Private keys are dropped as soon as the attestation is built; only the issued
/// credential ids are remembered, so `excludeCredentials` behaves as it would on
/// a real device.
pub struct SoftwareAuthenticator {
    origin: String,
    available: bool,
    rng: SystemRandom,
    issued: Mutex<HashSet<Vec<u8>>>,
}

impl SoftwareAuthenticator {
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into().trim_end_matches('/').to_string(),
            available: true,
            rng: SystemRandom::new(),
            issued: Mutex::new(HashSet::new()),
        }
    }

    /// Makes the authenticator report itself as missing, like a device without one.
    pub fn with_availability(mut self, available: bool) -> Self {
        self.available = available;
        self
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Credential ids created so far.
    pub async fn issued_credential_ids(&self) -> Vec<Vec<u8>> {
        self.issued.lock().await.iter().cloned().collect()
    }

    fn check_origin(&self, rp_id: Option<&str>) -> Result<String, AuthenticatorError> {
        let origin = Url::parse(&self.origin)
            .map_err(|e| AuthenticatorError::Security(format!("Invalid origin: {e}")))?;
        let host = origin
            .host_str()
            .ok_or_else(|| AuthenticatorError::Security("Origin has no host".to_string()))?
            .to_string();

        let is_local = host == "localhost" || host == "127.0.0.1";
        if origin.scheme() != "https" && !(origin.scheme() == "http" && is_local) {
            return Err(AuthenticatorError::Security(format!(
                "Origin {} is not a secure context",
                self.origin
            )));
        }

        let rp_id = rp_id.unwrap_or(host.as_str()).to_string();
        if host != rp_id && !host.ends_with(&format!(".{rp_id}")) {
            return Err(AuthenticatorError::Security(format!(
                "RP ID {rp_id} is not a registrable suffix of {host}"
            )));
        }

        Ok(rp_id)
    }

    fn build_client_data(&self, challenge: &[u8]) -> Vec<u8> {
        serde_json::json!({
            "type": "webauthn.create",
            "challenge": base64url_encode(challenge),
            "origin": self.origin,
            "crossOrigin": false,
        })
        .to_string()
        .into_bytes()
    }

    fn build_auth_data(
        &self,
        rp_id: &str,
        credential_id: &[u8],
        public_key: &[u8],
    ) -> Result<Vec<u8>, AuthenticatorError> {
        // Uncompressed SEC1 point: 0x04 || x || y
        if public_key.len() != 65 || public_key[0] != 0x04 {
            return Err(AuthenticatorError::Other(
                "Unexpected public key format".to_string(),
            ));
        }

        let cose_key = CborValue::Map(vec![
            (
                CborValue::Integer(Integer::from(1)),
                CborValue::Integer(Integer::from(2)),
            ),
            (
                CborValue::Integer(Integer::from(3)),
                CborValue::Integer(Integer::from(ES256)),
            ),
            (
                CborValue::Integer(Integer::from(-1)),
                CborValue::Integer(Integer::from(1)),
            ),
            (
                CborValue::Integer(Integer::from(-2)),
                CborValue::Bytes(public_key[1..33].to_vec()),
            ),
            (
                CborValue::Integer(Integer::from(-3)),
                CborValue::Bytes(public_key[33..65].to_vec()),
            ),
        ]);
        let mut cose_key_bytes = Vec::new();
        ciborium::ser::into_writer(&cose_key, &mut cose_key_bytes)
            .map_err(|e| AuthenticatorError::Other(format!("COSE key encoding: {e}")))?;

        let rp_id_hash = digest::digest(&digest::SHA256, rp_id.as_bytes());

        let mut auth_data = Vec::with_capacity(55 + credential_id.len() + cose_key_bytes.len());
        auth_data.extend_from_slice(rp_id_hash.as_ref());
        auth_data.push(flags::UP | flags::UV | flags::AT);
        auth_data.extend_from_slice(&0u32.to_be_bytes());
        auth_data.extend_from_slice(&[0u8; 16]);
        auth_data.extend_from_slice(&(credential_id.len() as u16).to_be_bytes());
        auth_data.extend_from_slice(credential_id);
        auth_data.extend_from_slice(&cose_key_bytes);
        Ok(auth_data)
    }

    fn generate_public_key(&self) -> Result<Vec<u8>, AuthenticatorError> {
        let pkcs8 = EcdsaKeyPair::generate_pkcs8(
            &signature::ECDSA_P256_SHA256_ASN1_SIGNING,
            &self.rng,
        )
        .map_err(|_| AuthenticatorError::Other("Failed to generate key pair".to_string()))?;
        let key_pair = EcdsaKeyPair::from_pkcs8(
            &signature::ECDSA_P256_SHA256_ASN1_SIGNING,
            pkcs8.as_ref(),
            &self.rng,
        )
        .map_err(|_| AuthenticatorError::Other("Failed to load key pair".to_string()))?;

        Ok(key_pair.public_key().as_ref().to_vec())
    }
}

#[async_trait]
impl PlatformAuthenticator for SoftwareAuthenticator {
    fn is_available(&self) -> bool {
        self.available
    }

    async fn create_credential(
        &self,
        options: &CeremonyOptions,
    ) -> Result<CredentialResult, AuthenticatorError> {
        let rp_id = self.check_origin(options.rp.id.as_deref())?;

        let supports_es256 = options.pub_key_cred_params.is_empty()
            || options
                .pub_key_cred_params
                .iter()
                .any(|p| p.type_ == "public-key" && p.alg == ES256);
        if !supports_es256 {
            return Err(AuthenticatorError::NotSupported(
                "Only ES256 credentials can be created".to_string(),
            ));
        }

        let mut issued = self.issued.lock().await;
        if options
            .exclude_credentials
            .iter()
            .any(|cred| issued.contains(&cred.id))
        {
            return Err(AuthenticatorError::InvalidState(
                "A credential for this account already exists on this authenticator".to_string(),
            ));
        }

        let mut credential_id = vec![0u8; CREDENTIAL_ID_LEN];
        self.rng
            .fill(&mut credential_id)
            .map_err(|_| AuthenticatorError::Other("Failed to generate credential id".into()))?;

        let public_key = self.generate_public_key()?;
        let auth_data = self.build_auth_data(&rp_id, &credential_id, &public_key)?;

        let attestation = CborValue::Map(vec![
            (
                CborValue::Text("fmt".to_string()),
                CborValue::Text("none".to_string()),
            ),
            (
                CborValue::Text("attStmt".to_string()),
                CborValue::Map(vec![]),
            ),
            (
                CborValue::Text("authData".to_string()),
                CborValue::Bytes(auth_data),
            ),
        ]);
        let mut attestation_object = Vec::new();
        ciborium::ser::into_writer(&attestation, &mut attestation_object)
            .map_err(|e| AuthenticatorError::Other(format!("Attestation encoding: {e}")))?;

        issued.insert(credential_id.clone());
        tracing::debug!(
            "Software authenticator created credential for {} on {}",
            options.user.name,
            rp_id
        );

        Ok(CredentialResult {
            id: base64url_encode(&credential_id),
            raw_id: Some(credential_id),
            response: AttestationResponse {
                attestation_object,
                client_data_json: self.build_client_data(&options.challenge),
            },
            authenticator_attachment: Some("platform".to_string()),
            transports: vec!["internal".to_string()],
        })
    }
}
