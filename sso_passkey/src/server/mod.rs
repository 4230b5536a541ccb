mod http;

use async_trait::async_trait;
use serde_json::Value;

use crate::ceremony::{BeginRegistrationRequest, FinishRequest, PasskeyRecord, ServerEnvelope};
use crate::errors::CeremonyError;

pub use http::HttpRegistrationServer;

/// Begin and finish endpoints of the SSO server.
///
/// Implementations return the envelope as received; interpreting `code` is the
/// ceremony's job. The begin payload stays untyped so a document that fails to
/// parse can be reported as a malformed challenge rather than a transport error.
#[async_trait]
pub trait RegistrationServer: Send + Sync {
    async fn begin(
        &self,
        request: &BeginRegistrationRequest,
    ) -> Result<ServerEnvelope<Value>, CeremonyError>;

    async fn finish(
        &self,
        request: &FinishRequest,
    ) -> Result<ServerEnvelope<PasskeyRecord>, CeremonyError>;
}
