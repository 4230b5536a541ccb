use async_trait::async_trait;
use reqwest::{Client, Response, header::AUTHORIZATION};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use super::RegistrationServer;
use crate::ceremony::{BeginRegistrationRequest, FinishRequest, PasskeyRecord, ServerEnvelope};
use crate::config::ServerConfig;
use crate::errors::CeremonyError;

/// [`RegistrationServer`] over HTTP with JSON bodies.
pub struct HttpRegistrationServer {
    client: Client,
    config: ServerConfig,
}

impl HttpRegistrationServer {
    pub fn new(config: ServerConfig) -> Result<Self, CeremonyError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| CeremonyError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    /// Builds a client from `PASSKEY_API_BASE_URL` and friends.
    pub fn from_env() -> Result<Self, CeremonyError> {
        Self::new(ServerConfig::from_env()?)
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    async fn post_json<B, T>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<ServerEnvelope<T>, CeremonyError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        tracing::debug!("POST {}", url);

        let mut request = self.client.post(url).json(body);
        if let Some(token) = &self.config.bearer_token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }

        let response = request.send().await?;
        read_envelope(response).await
    }
}

/// Parses the envelope whatever the HTTP status.
///
/// Servers in this deployment report application errors as `{ code, message }`
/// with either 200 or 4xx; only a body that is not an envelope is a transport failure.
async fn read_envelope<T: DeserializeOwned>(
    response: Response,
) -> Result<ServerEnvelope<T>, CeremonyError> {
    let status = response.status();
    let body = response.bytes().await?;

    match serde_json::from_slice::<ServerEnvelope<T>>(&body) {
        Ok(envelope) => {
            tracing::trace!("HTTP {} envelope code {}", status, envelope.code);
            Ok(envelope)
        }
        Err(e) if status.is_success() => Err(CeremonyError::MalformedResponse(format!(
            "Response is not a valid envelope: {e}"
        ))),
        Err(_) => Err(CeremonyError::Transport(format!(
            "HTTP {}: {}",
            status,
            String::from_utf8_lossy(&body).chars().take(200).collect::<String>()
        ))),
    }
}

#[async_trait]
impl RegistrationServer for HttpRegistrationServer {
    async fn begin(
        &self,
        request: &BeginRegistrationRequest,
    ) -> Result<ServerEnvelope<Value>, CeremonyError> {
        self.post_json(&self.config.begin_url(), request).await
    }

    async fn finish(
        &self,
        request: &FinishRequest,
    ) -> Result<ServerEnvelope<PasskeyRecord>, CeremonyError> {
        self.post_json(&self.config.finish_url(), request).await
    }
}
