use crate::errors::GatewayError;
use crate::metrics_defs::{BULK_SEND_DURATION, LOGIN_ATTEMPTS, MESSAGES_SENT};
use crate::protocol::{CallError, ProtocolClient};
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use kvpool::SessionStore;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sessionfile::Decoders;
use shared::listener::Listener;
use shared::{counter, histogram};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

const SESSION_FIELD: &str = "session";
const SESSION_FILE_SUFFIX: &str = ".session";

#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionStore,
    pub protocol: ProtocolClient,
    pub decoders: Arc<Decoders>,
    pub send_interval: Duration,
    pub max_upload_bytes: usize,
}

pub fn router(state: AppState, static_dir: &Path) -> Router {
    let upload_limit = DefaultBodyLimit::max(state.max_upload_bytes);

    Router::new()
        .route("/api/login", post(login).layer(upload_limit))
        .route("/api/send-bulk-message", post(send_bulk_message))
        .route("/health", get(health))
        .fallback_service(ServeDir::new(static_dir))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(listener: &Listener, app: Router) -> Result<(), std::io::Error> {
    let addr = listener.addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "gateway listening");
    axum::serve(listener, app).await
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// `user:<unix millis>-<8 hex chars>`
fn new_session_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    format!("user:{millis}-{}", hex::encode(rand::random::<[u8; 4]>()))
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct LoginStats {
    dc_id: i32,
    user_id: Option<i64>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    success: bool,
    stats: LoginStats,
    session_id: String,
}

fn invalid_upload() -> GatewayError {
    GatewayError::Validation("Invalid .session file".into())
}

fn upload_error(err: MultipartError) -> GatewayError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        GatewayError::UploadTooLarge
    } else {
        invalid_upload()
    }
}

/// Pulls the bytes of the `session` file field out of the form.
async fn read_session_upload(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Vec<u8>, GatewayError> {
    let mut multipart = multipart.map_err(|_| invalid_upload())?;

    while let Some(field) = multipart.next_field().await.map_err(upload_error)? {
        if field.name() != Some(SESSION_FIELD) {
            continue;
        }

        let has_suffix = field
            .file_name()
            .is_some_and(|name| name.ends_with(SESSION_FILE_SUFFIX));
        if !has_suffix {
            return Err(invalid_upload());
        }

        let data = field.bytes().await.map_err(upload_error)?;
        return Ok(data.to_vec());
    }

    Err(invalid_upload())
}

async fn login(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<LoginResponse>, GatewayError> {
    let result = do_login(&state, multipart).await;
    let outcome = match &result {
        Ok(_) => "success",
        Err(e) if e.status().is_client_error() => "rejected",
        Err(_) => "error",
    };
    counter!(LOGIN_ATTEMPTS, "outcome" => outcome).increment(1);
    result.map(Json)
}

async fn do_login(
    state: &AppState,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<LoginResponse, GatewayError> {
    let data = read_session_upload(multipart).await?;

    let decoders = state.decoders.clone();
    let record = tokio::task::spawn_blocking(move || decoders.decode(&data))
        .await
        .map_err(|e| GatewayError::Internal(format!("session decoder panicked: {e}")))??;

    let session_id = new_session_id();
    state.sessions.put(&session_id, &record).await?;

    let identity = match state.protocol.load_session(&record).await {
        Ok(remote) => {
            let identity = remote.verify_identity().await;
            remote.close().await;
            identity
        }
        Err(e) => Err(e),
    }
    .map_err(|e| match e {
        CallError::Unauthorized(_) | CallError::Rejected { .. } => {
            tracing::info!(%session_id, error = %e, "session authentication failed");
            GatewayError::Authentication("Invalid session file".into())
        }
        transient => GatewayError::Remote(transient),
    })?;

    tracing::info!(
        %session_id,
        dc_id = record.dc_id,
        user_id = ?identity.user_id,
        "authenticated session"
    );

    state.sessions.pool().maybe_rotate().await;

    Ok(LoginResponse {
        success: true,
        stats: LoginStats {
            dc_id: record.dc_id,
            user_id: identity.user_id,
        },
        session_id,
    })
}

/// A recipient user id, given either as a JSON number or a numeric string.
#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
enum Recipient {
    Id(i64),
    Text(String),
}

impl Recipient {
    fn user_id(&self) -> Option<i64> {
        match self {
            Recipient::Id(id) => Some(*id),
            Recipient::Text(text) => text.trim().parse().ok(),
        }
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct BulkSendRequest {
    message: String,
    recipients: Vec<Recipient>,
    session_id: String,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct BulkSendResponse {
    success: bool,
    sent_count: usize,
}

async fn send_bulk_message(
    State(state): State<AppState>,
    payload: Result<Json<BulkSendRequest>, JsonRejection>,
) -> Result<Json<BulkSendResponse>, GatewayError> {
    let start = Instant::now();
    let result = do_send_bulk_message(&state, payload).await;

    let outcome = if result.is_ok() { "success" } else { "error" };
    histogram!(BULK_SEND_DURATION, "outcome" => outcome).record(start.elapsed().as_secs_f64());

    result.map(Json)
}

async fn do_send_bulk_message(
    state: &AppState,
    payload: Result<Json<BulkSendRequest>, JsonRejection>,
) -> Result<BulkSendResponse, GatewayError> {
    let invalid_input = || GatewayError::Validation("Invalid input".into());

    let Json(request) = payload.map_err(|_| invalid_input())?;
    if request.message.is_empty() || request.session_id.is_empty() {
        return Err(invalid_input());
    }

    // All recipients are checked before anything is sent.
    let user_ids = request
        .recipients
        .iter()
        .map(|r| {
            r.user_id().ok_or_else(|| {
                GatewayError::Validation(format!("Invalid recipient: {}", describe(r)))
            })
        })
        .collect::<Result<Vec<i64>, _>>()?;

    let expired = || GatewayError::Authentication("Session expired or invalid".into());

    let record = state
        .sessions
        .get(&request.session_id)
        .await?
        .ok_or_else(expired)?;

    let mut sent_count = 0;
    if !user_ids.is_empty() {
        let remote = state
            .protocol
            .load_session(&record)
            .await
            .map_err(|e| match e {
                CallError::Unauthorized(_) => expired(),
                other => GatewayError::Remote(other),
            })?;

        for (i, user_id) in user_ids.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(state.send_interval).await;
            }

            if let Err(e) = remote.send_text(*user_id, &request.message).await {
                tracing::warn!(
                    session_id = %request.session_id,
                    user_id,
                    sent_count,
                    error = %e,
                    "bulk send aborted"
                );
                counter!(MESSAGES_SENT).increment(sent_count as u64);
                remote.close().await;
                return Err(GatewayError::Remote(e));
            }
            sent_count += 1;
        }

        remote.close().await;
        counter!(MESSAGES_SENT).increment(sent_count as u64);
    }

    tracing::info!(session_id = %request.session_id, sent_count, "bulk send complete");

    state.sessions.pool().maybe_rotate().await;

    Ok(BulkSendResponse {
        success: true,
        sent_count,
    })
}

fn describe(recipient: &Recipient) -> String {
    match recipient {
        Recipient::Id(id) => id.to_string(),
        Recipient::Text(text) => text.clone(),
    }
}
