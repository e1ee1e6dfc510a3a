//! HTTP surface for the mix engine.
//!
//! Three POST endpoints consumed by the presentation layer, all answering
//! cross-origin preflight. Possession of the session id is the only
//! credential; ids are non-enumerable UUIDs and sessions are short-lived.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

use sol_wallet::LAMPORTS_PER_SOL;

use crate::config::MixConfig;
use crate::db::SessionDb;
use crate::driver::{self, ChainClient, DetectOutcome, MixError, PayoutReceipt};
use crate::metrics::SessionMetrics;
use crate::state::{now_unix, MixStatus};

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn SessionDb>,
    pub chain: Arc<dyn ChainClient>,
    pub metrics: Arc<dyn SessionMetrics>,
    pub config: Arc<MixConfig>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/generate-mix-wallet", post(generate_mix_wallet))
        .route("/detect-mix-transaction", post(detect_mix_transaction))
        .route("/process-mix", post(process_mix))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    #[serde(default)]
    user_wallet: String,
    #[serde(default)]
    amount_sol: f64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    success: bool,
    session_id: String,
    deposit_address: String,
    amount_sol: f64,
    expires_at: i64,
}

async fn generate_mix_wallet(
    State(app): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> Response {
    match driver::create_session(
        &*app.db,
        &app.config,
        &request.user_wallet,
        request.amount_sol,
        now_unix(),
    ) {
        Ok(session) => Json(GenerateResponse {
            success: true,
            session_id: session.id,
            deposit_address: session.deposit_address,
            amount_sol: session.amount_sol,
            expires_at: session.expires_at,
        })
        .into_response(),
        Err(MixError::Store(_)) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to create mix session",
            None,
        ),
        Err(err) => mix_error_response(err),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionRequest {
    #[serde(default)]
    session_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DetectResponse {
    success: bool,
    found: bool,
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    tx_signature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    amount_received: Option<f64>,
}

async fn detect_mix_transaction(
    State(app): State<AppState>,
    Json(request): Json<SessionRequest>,
) -> Response {
    if request.session_id.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Session ID required", None);
    }

    let outcome = driver::detect_deposit(
        &*app.db,
        &*app.chain,
        &*app.metrics,
        &app.config,
        &request.session_id,
        now_unix(),
    )
    .await;

    match outcome {
        Ok(DetectOutcome::Pending) => Json(DetectResponse {
            success: true,
            found: false,
            status: MixStatus::AwaitingDeposit.as_str().to_string(),
            tx_signature: None,
            amount_received: None,
        })
        .into_response(),
        Ok(DetectOutcome::Detected {
            signature,
            lamports_received,
        }) => Json(DetectResponse {
            success: true,
            found: true,
            status: MixStatus::DepositDetected.as_str().to_string(),
            tx_signature: Some(signature),
            amount_received: Some(lamports_to_sol(lamports_received)),
        })
        .into_response(),
        Ok(DetectOutcome::Already { status, signature }) => Json(DetectResponse {
            success: true,
            found: true,
            status: status.as_str().to_string(),
            tx_signature: signature,
            amount_received: None,
        })
        .into_response(),
        Ok(DetectOutcome::Expired) => expired_response(),
        Err(err) => mix_error_response(err),
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProcessResponse {
    success: bool,
    status: String,
    output_address: String,
    /// The raw 64-byte output secret. Returning it in cleartext mirrors the
    /// consumer contract; see DESIGN.md for the production caveat.
    output_private_key: Vec<u8>,
    tx_signature_out: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    amount_transferred: Option<f64>,
}

async fn process_mix(
    State(app): State<AppState>,
    Json(request): Json<SessionRequest>,
) -> Response {
    if request.session_id.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Session ID required", None);
    }

    let result = driver::process_payout(
        &*app.db,
        &*app.chain,
        &*app.metrics,
        &app.config,
        &request.session_id,
        now_unix(),
    )
    .await;

    match result {
        Ok(receipt) => {
            let PayoutReceipt {
                output_address,
                output_secret,
                tx_signature_out,
                lamports_transferred,
            } = receipt;
            Json(ProcessResponse {
                success: true,
                status: MixStatus::Completed.as_str().to_string(),
                output_address,
                output_private_key: output_secret,
                tx_signature_out,
                amount_transferred: lamports_transferred.map(lamports_to_sol),
            })
            .into_response()
        }
        Err(err) => mix_error_response(err),
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorResponse {
    success: bool,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<String>,
}

fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / LAMPORTS_PER_SOL as f64
}

fn expired_response() -> Response {
    error_response(
        StatusCode::BAD_REQUEST,
        "Session expired",
        Some(MixStatus::Expired.as_str()),
    )
}

fn mix_error_response(err: MixError) -> Response {
    let code = match &err {
        MixError::InvalidInput(_)
        | MixError::InvalidStatus(_)
        | MixError::InsufficientBalance => StatusCode::BAD_REQUEST,
        MixError::SessionNotFound => StatusCode::NOT_FOUND,
        MixError::SessionExpired => return expired_response(),
        MixError::ChainRpc(_) => StatusCode::BAD_GATEWAY,
        MixError::SubmissionFailed(_) | MixError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(code, &err.to_string(), None)
}

fn error_response(code: StatusCode, message: &str, status: Option<&str>) -> Response {
    (
        code,
        Json(ErrorResponse {
            success: false,
            error: message.to_string(),
            status: status.map(str::to_string),
        }),
    )
        .into_response()
}
