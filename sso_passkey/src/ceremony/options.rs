use crate::codec::{base64url_decode, base64url_encode};
use crate::errors::CeremonyError;

use super::types::{
    CeremonyOptions, CeremonyUser, ChallengeDocument, CredentialResult, ExcludedCredential,
    FinishRequest,
};

/// WebAuthn caps the user handle at 64 bytes.
const MAX_USER_HANDLE_LEN: usize = 64;

fn decode_field(field: &str, value: &str) -> Result<Vec<u8>, CeremonyError> {
    base64url_decode(value)
        .map_err(|e| CeremonyError::MalformedChallenge(format!("{field}: {e}")))
}

impl ChallengeDocument {
    /// Decodes every binary field into a [`CeremonyOptions`].
    ///
    /// Either the whole document decodes or nothing is returned; the error names
    /// the first offending field.
    pub fn decode(&self) -> Result<CeremonyOptions, CeremonyError> {
        if self.challenge_id.trim().is_empty() {
            return Err(CeremonyError::MalformedChallenge(
                "challengeId is empty".to_string(),
            ));
        }

        let challenge = decode_field("challenge", &self.challenge)?;
        if challenge.is_empty() {
            return Err(CeremonyError::MalformedChallenge(
                "challenge is empty".to_string(),
            ));
        }

        let user_id = decode_field("user.id", &self.user.id)?;
        if user_id.is_empty() || user_id.len() > MAX_USER_HANDLE_LEN {
            return Err(CeremonyError::MalformedChallenge(format!(
                "user.id must be 1..={MAX_USER_HANDLE_LEN} bytes, got {}",
                user_id.len()
            )));
        }

        let exclude_credentials = self
            .exclude_credentials
            .iter()
            .enumerate()
            .map(|(i, cred)| {
                Ok(ExcludedCredential {
                    type_: cred.type_.clone(),
                    id: decode_field(&format!("excludeCredentials[{i}].id"), &cred.id)?,
                    transports: cred.transports.clone(),
                })
            })
            .collect::<Result<Vec<_>, CeremonyError>>()?;

        tracing::trace!(
            "Decoded challenge {}: {} excluded credentials",
            self.challenge_id,
            exclude_credentials.len()
        );

        Ok(CeremonyOptions {
            challenge,
            rp: self.rp.clone(),
            user: CeremonyUser {
                id: user_id,
                name: self.user.name.clone(),
                display_name: self.user.display_name.clone(),
            },
            pub_key_cred_params: self.pub_key_cred_params.clone(),
            timeout: self.timeout,
            exclude_credentials,
            authenticator_selection: self.authenticator_selection.clone(),
            attestation: self.attestation.clone(),
        })
    }
}

impl FinishRequest {
    /// Encodes an authenticator result for submission.
    ///
    /// Fails with a codec error when a response buffer is empty or when the
    /// reported id disagrees with the raw id.
    pub fn from_credential(
        challenge_id: &str,
        user_id: &str,
        credential: &CredentialResult,
    ) -> Result<Self, CeremonyError> {
        use crate::codec::CodecError;

        if credential.id.is_empty() {
            return Err(CodecError::Encode("credential id is empty".to_string()).into());
        }

        if let Some(raw_id) = &credential.raw_id {
            let encoded = base64url_encode(raw_id);
            if encoded != credential.id {
                return Err(CodecError::Encode(format!(
                    "credential id {} does not match rawId {}",
                    credential.id, encoded
                ))
                .into());
            }
        }

        if credential.response.attestation_object.is_empty() {
            return Err(CodecError::Encode("attestationObject is empty".to_string()).into());
        }

        if credential.response.client_data_json.is_empty() {
            return Err(CodecError::Encode("clientDataJSON is empty".to_string()).into());
        }

        Ok(Self {
            challenge_id: challenge_id.to_string(),
            user_id: user_id.to_string(),
            credential_id: credential.id.clone(),
            attestation_object: base64url_encode(&credential.response.attestation_object),
            client_data_json: base64url_encode(&credential.response.client_data_json),
            authenticator_attachment: credential.authenticator_attachment.clone(),
            transports: credential.transports.clone(),
        })
    }
}
