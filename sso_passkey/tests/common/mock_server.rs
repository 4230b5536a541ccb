//! Axum-based mock of the SSO passkey registration endpoints
//!
//! Each test starts its own server on an ephemeral port, so tests never share
//! issued challenges or stored credentials.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::{IntoResponse, Response},
    routing::post,
};
use ciborium::value::Value as CborValue;
use serde_json::{Value, json};
use sso_passkey::{BeginRegistrationRequest, FinishRequest, base64url_decode, base64url_encode};
use tokio::task::JoinHandle;
use uuid::Uuid;

pub const BEGIN_PATH: &str = "/api/passkey/register/begin";
pub const FINISH_PATH: &str = "/api/passkey/register/finish";

/// How the begin endpoint misbehaves, if at all
#[derive(Debug, Clone, Default)]
pub enum BeginMode {
    #[default]
    Normal,
    Reject {
        code: i64,
        message: String,
    },
    /// Plain-text body with the given status
    HttpFailure(StatusCode),
    /// 200 with a body that is not an envelope
    Garbage,
    /// Normal answer after a delay
    Slow(Duration),
}

#[derive(Debug, Clone)]
struct PendingChallenge {
    challenge: String,
    user_id: String,
}

#[derive(Debug, Default)]
struct Inner {
    begin_mode: BeginMode,
    finish_rejection: Option<(i64, String)>,
    challenges: HashMap<String, PendingChallenge>,
    credentials: HashMap<String, Vec<String>>,
    begin_calls: usize,
    finish_requests: Vec<FinishRequest>,
    authorization: Vec<String>,
}

/// Shared state of one mock server
#[derive(Clone)]
pub struct MockServerState {
    origin: String,
    rp_id: String,
    inner: Arc<Mutex<Inner>>,
}

impl MockServerState {
    pub fn set_begin_mode(&self, mode: BeginMode) {
        self.inner.lock().unwrap().begin_mode = mode;
    }

    pub fn reject_finish(&self, code: i64, message: &str) {
        self.inner.lock().unwrap().finish_rejection = Some((code, message.to_string()));
    }

    pub fn begin_calls(&self) -> usize {
        self.inner.lock().unwrap().begin_calls
    }

    pub fn finish_requests(&self) -> Vec<FinishRequest> {
        self.inner.lock().unwrap().finish_requests.clone()
    }

    pub fn credentials_for(&self, user_id: &str) -> Vec<String> {
        self.inner
            .lock()
            .unwrap()
            .credentials
            .get(user_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn authorization_headers(&self) -> Vec<String> {
        self.inner.lock().unwrap().authorization.clone()
    }
}

pub struct MockSsoServer {
    pub base_url: String,
    pub state: MockServerState,
    _handle: JoinHandle<()>,
}

impl MockSsoServer {
    /// Starts a server that expects attestations made for `origin`.
    pub async fn start(origin: &str, rp_id: &str) -> Self {
        let state = MockServerState {
            origin: origin.to_string(),
            rp_id: rp_id.to_string(),
            inner: Arc::new(Mutex::new(Inner::default())),
        };

        let app = Router::new()
            .route(BEGIN_PATH, post(begin))
            .route(FINISH_PATH, post(finish))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock server");
        let addr = listener.local_addr().expect("Mock server has no address");

        let handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .await
                .expect("Mock server stopped unexpectedly");
        });

        Self {
            base_url: format!("http://{addr}"),
            state,
            _handle: handle,
        }
    }
}

fn rejection(code: i64, message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "code": code, "message": message })),
    )
        .into_response()
}

async fn begin(
    State(state): State<MockServerState>,
    headers: HeaderMap,
    Json(request): Json<BeginRegistrationRequest>,
) -> Response {
    let delay = match state.inner.lock().unwrap().begin_mode {
        BeginMode::Slow(delay) => Some(delay),
        _ => None,
    };
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }

    let mut inner = state.inner.lock().unwrap();
    inner.begin_calls += 1;
    if let Some(auth) = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        inner.authorization.push(auth.to_string());
    }

    match inner.begin_mode.clone() {
        BeginMode::Normal | BeginMode::Slow(_) => {}
        BeginMode::Reject { code, message } => {
            return (StatusCode::OK, Json(json!({ "code": code, "message": message })))
                .into_response();
        }
        BeginMode::HttpFailure(status) => {
            return (status, "upstream unavailable").into_response();
        }
        BeginMode::Garbage => {
            return (StatusCode::OK, "<html>maintenance</html>").into_response();
        }
    }

    let challenge_id = Uuid::new_v4().to_string();
    let challenge = base64url_encode(Uuid::new_v4().as_bytes());
    inner.challenges.insert(
        challenge_id.clone(),
        PendingChallenge {
            challenge: challenge.clone(),
            user_id: request.user_id.clone(),
        },
    );

    let exclude: Vec<Value> = inner
        .credentials
        .get(&request.user_id)
        .map(|ids| {
            ids.iter()
                .map(|id| json!({ "type": "public-key", "id": id, "transports": ["internal"] }))
                .collect()
        })
        .unwrap_or_default();

    Json(json!({
        "code": 0,
        "message": "success",
        "data": {
            "challengeId": challenge_id,
            "challenge": challenge,
            "rp": { "id": state.rp_id, "name": "SSO Console" },
            "user": {
                "id": base64url_encode(request.user_id.as_bytes()),
                "name": request.username,
                "displayName": request.display_name,
            },
            "pubKeyCredParams": [
                { "type": "public-key", "alg": -7 },
                { "type": "public-key", "alg": -257 }
            ],
            "timeout": 60000,
            "excludeCredentials": exclude,
            "authenticatorSelection": { "residentKey": "preferred", "userVerification": "preferred" },
            "attestation": "none"
        }
    }))
    .into_response()
}

async fn finish(
    State(state): State<MockServerState>,
    Json(request): Json<FinishRequest>,
) -> Response {
    let mut inner = state.inner.lock().unwrap();
    inner.finish_requests.push(request.clone());

    if let Some((code, message)) = inner.finish_rejection.clone() {
        return rejection(code, &message);
    }

    let Some(pending) = inner.challenges.remove(&request.challenge_id) else {
        return rejection(40001, "unknown or expired challenge");
    };
    if pending.user_id != request.user_id {
        return rejection(40001, "challenge was issued to another user");
    }

    if let Err(reason) = verify_attestation(&state, &pending, &request) {
        return rejection(40002, &format!("attestation verification failed: {reason}"));
    }

    inner
        .credentials
        .entry(request.user_id.clone())
        .or_default()
        .push(request.credential_id.clone());

    Json(json!({
        "code": 0,
        "message": "success",
        "data": {
            "id": Uuid::new_v4().to_string(),
            "userId": request.user_id,
            "credentialId": request.credential_id,
            "name": "Passkey",
            "aaguid": "00000000-0000-0000-0000-000000000000",
            "createdAt": chrono::Utc::now().to_rfc3339(),
        }
    }))
    .into_response()
}

fn verify_attestation(
    state: &MockServerState,
    pending: &PendingChallenge,
    request: &FinishRequest,
) -> Result<(), String> {
    let client_data = base64url_decode(&request.client_data_json).map_err(|e| e.to_string())?;
    let client_data: Value = serde_json::from_slice(&client_data).map_err(|e| e.to_string())?;

    if client_data["type"] != "webauthn.create" {
        return Err(format!("unexpected type {}", client_data["type"]));
    }
    if client_data["challenge"] != pending.challenge.as_str() {
        return Err("challenge mismatch".to_string());
    }
    if client_data["origin"] != state.origin.as_str() {
        return Err(format!("unexpected origin {}", client_data["origin"]));
    }

    let attestation = base64url_decode(&request.attestation_object).map_err(|e| e.to_string())?;
    let CborValue::Map(map) =
        ciborium::de::from_reader::<CborValue, _>(attestation.as_slice()).map_err(|e| format!("{e}"))?
    else {
        return Err("attestation object is not a map".to_string());
    };

    let field = |name: &str| {
        map.iter()
            .find(|(k, _)| matches!(k, CborValue::Text(t) if t == name))
            .map(|(_, v)| v.clone())
    };

    if field("fmt") != Some(CborValue::Text("none".to_string())) {
        return Err("unsupported attestation format".to_string());
    }
    let Some(CborValue::Bytes(auth_data)) = field("authData") else {
        return Err("authData missing".to_string());
    };

    if auth_data.len() < 55 {
        return Err("authData too short".to_string());
    }
    let id_len = u16::from_be_bytes([auth_data[53], auth_data[54]]) as usize;
    let credential_id = auth_data
        .get(55..55 + id_len)
        .ok_or_else(|| "credential id truncated".to_string())?;
    if base64url_encode(credential_id) != request.credential_id {
        return Err("credential id mismatch".to_string());
    }

    Ok(())
}
