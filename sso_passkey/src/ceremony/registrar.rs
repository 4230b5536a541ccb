use std::sync::atomic::{AtomicBool, Ordering};

use crate::authenticator::PlatformAuthenticator;
use crate::errors::CeremonyError;
use crate::server::RegistrationServer;

use super::state::{CeremonyState, CeremonyTracker};
use super::types::{
    BeginRegistrationRequest, CeremonyOptions, ChallengeDocument, FinishRequest, PasskeyRecord,
};

/// A decoded challenge, ready to be handed to the authenticator.
#[derive(Debug)]
pub struct PreparedRegistration {
    pub challenge_id: String,
    pub user_id: String,
    pub options: CeremonyOptions,
}

/// Releases the in-flight flag on every exit path, including a dropped future.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Drives passkey registration ceremonies against one server and one authenticator.
///
/// At most one ceremony runs at a time; platform authenticators cannot service
/// two prompts at once.
pub struct PasskeyRegistrar<S, A> {
    server: S,
    authenticator: A,
    in_flight: AtomicBool,
}

impl<S, A> PasskeyRegistrar<S, A>
where
    S: RegistrationServer,
    A: PlatformAuthenticator,
{
    pub fn new(server: S, authenticator: A) -> Self {
        Self {
            server,
            authenticator,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn server(&self) -> &S {
        &self.server
    }

    pub fn authenticator(&self) -> &A {
        &self.authenticator
    }

    /// Whether a ceremony is currently waiting on the server or the authenticator.
    pub fn is_in_progress(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Registers a new passkey for `user_id`.
    ///
    /// Fetches a fresh challenge, prompts the authenticator exactly once, and
    /// submits the attestation. A call made while another is pending fails with
    /// [`CeremonyError::CeremonyInProgress`] without prompting.
    pub async fn begin_registration(
        &self,
        user_id: &str,
        username: &str,
        display_name: &str,
    ) -> Result<PasskeyRecord, CeremonyError> {
        let _guard = self.try_acquire().map_err(CeremonyError::log)?;

        let mut tracker = CeremonyTracker::new();
        let result = self
            .run(&mut tracker, user_id, username, display_name)
            .await;

        result.map_err(|e| tracker.fail(e).log())
    }

    async fn run(
        &self,
        tracker: &mut CeremonyTracker,
        user_id: &str,
        username: &str,
        display_name: &str,
    ) -> Result<PasskeyRecord, CeremonyError> {
        tracker.advance(CeremonyState::Preparing)?;
        if !self.authenticator.is_available() {
            return Err(CeremonyError::UnsupportedPlatform);
        }

        let PreparedRegistration {
            challenge_id,
            user_id,
            options,
        } = self
            .prepare_registration(user_id, username, display_name)
            .await?;

        tracker.advance(CeremonyState::AwaitingAuthenticator)?;
        let credential = self.authenticator.create_credential(&options).await?;
        drop(options);

        tracker.advance(CeremonyState::Finishing)?;
        let request = FinishRequest::from_credential(&challenge_id, &user_id, &credential)?;
        let record = self.finish_registration(&request).await?;

        tracker.advance(CeremonyState::Idle)?;
        tracing::info!(
            "Registered passkey {} for user {}",
            record.credential_id,
            record.user_id
        );
        Ok(record)
    }

    /// Fetches a challenge from the begin endpoint and decodes it.
    ///
    /// For hosts that drive the authenticator themselves; pair it with
    /// [`FinishRequest::from_credential`] and [`Self::finish_registration`].
    pub async fn prepare_registration(
        &self,
        user_id: &str,
        username: &str,
        display_name: &str,
    ) -> Result<PreparedRegistration, CeremonyError> {
        let request = BeginRegistrationRequest {
            user_id: user_id.to_string(),
            username: username.to_string(),
            display_name: display_name.to_string(),
        };

        let envelope = self.server.begin(&request).await.map_err(|e| match e {
            CeremonyError::MalformedResponse(msg) => CeremonyError::MalformedChallenge(msg),
            other => other,
        })?;

        if !envelope.is_success() {
            return Err(CeremonyError::ServerRejected {
                code: envelope.code,
                message: envelope.message,
            });
        }

        let data = envelope.data.ok_or_else(|| {
            CeremonyError::MalformedChallenge("begin response carries no data".to_string())
        })?;
        let document: ChallengeDocument = serde_json::from_value(data)
            .map_err(|e| CeremonyError::MalformedChallenge(e.to_string()))?;

        let options = document.decode()?;

        Ok(PreparedRegistration {
            challenge_id: document.challenge_id,
            user_id: request.user_id,
            options,
        })
    }

    /// Submits an encoded attestation to the finish endpoint.
    pub async fn finish_registration(
        &self,
        request: &FinishRequest,
    ) -> Result<PasskeyRecord, CeremonyError> {
        let envelope = self.server.finish(request).await?;

        if !envelope.is_success() {
            return Err(CeremonyError::ServerRejected {
                code: envelope.code,
                message: envelope.message,
            });
        }

        envelope.data.ok_or_else(|| {
            CeremonyError::MalformedResponse("finish response carries no passkey".to_string())
        })
    }

    fn try_acquire(&self) -> Result<InFlightGuard<'_>, CeremonyError> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| CeremonyError::CeremonyInProgress)?;
        Ok(InFlightGuard(&self.in_flight))
    }
}
