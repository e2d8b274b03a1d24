//! # HTTP Emulator API
//!
//! Builds the axum router that exposes the hosted manager. All endpoints
//! share application state through axum's `State` extractor.
//!
//! ## Endpoints
//!
//! | Method | Path                  | Description                              |
//! |--------|-----------------------|------------------------------------------|
//! | GET    | `/health`             | Liveness probe                           |
//! | GET    | `/storage`            | Stored configuration                     |
//! | GET    | `/account`            | Addresses, native balance, last lt       |
//! | POST   | `/messages`           | Deliver an inbound message               |
//! | GET    | `/transactions`       | Most recent transactions                 |
//! | GET    | `/transactions/:lt`   | Transaction by logical time              |
//!
//! Deliveries are serialized through the host mutex, so the manager sees
//! one message at a time no matter how many requests arrive concurrently.

use axum::{
    extract::{Path, Query, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use custody_protocol::config::format_coins;
use custody_protocol::{Address, Cell, ContractDb, InboundMessage, OutboundMessage};

use crate::host::{describe_exit_code, HostedManager};
use crate::metrics::SharedMetrics;

/// Upper bound for `GET /transactions?limit=`.
const MAX_TRANSACTION_PAGE: usize = 100;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers.
///
/// Cheap to clone; everything sits behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The node's reported version string.
    pub version: String,
    pub metrics: SharedMetrics,
    pub db: Arc<ContractDb>,
    /// The manager instance. Held for the whole of a delivery.
    pub host: Arc<Mutex<HostedManager>>,
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all API routes, CORS, and tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/storage", get(storage_handler))
        .route("/account", get(account_handler))
        .route("/messages", post(message_handler))
        .route("/transactions", get(recent_transactions_handler))
        .route("/transactions/:lt", get(transaction_by_lt_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request / Response Types
// ---------------------------------------------------------------------------

/// Body of `POST /messages`.
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageRequest {
    pub sender: Address,
    /// Attached value in nanotons.
    #[serde(default)]
    pub value: u128,
    /// Message body as BoC hex. Omit for a plain top-up.
    #[serde(default)]
    pub body: Cell,
    #[serde(default)]
    pub bounced: bool,
}

/// Outcome of one delivery, as returned by `POST /messages` and the
/// transaction endpoints.
#[derive(Debug, Serialize, Deserialize)]
pub struct TransactionResponse {
    pub lt: u64,
    pub success: bool,
    pub exit_code: u32,
    pub description: String,
    pub outbound: Vec<OutboundMessage>,
    pub balance_after: u128,
    /// RFC 3339 timestamp.
    pub timestamp: String,
}

impl From<custody_protocol::TransactionRecord> for TransactionResponse {
    fn from(tx: custody_protocol::TransactionRecord) -> Self {
        Self {
            lt: tx.lt,
            success: tx.success(),
            exit_code: tx.exit_code,
            description: describe_exit_code(tx.exit_code),
            outbound: tx.outbound,
            balance_after: tx.balance_after,
            timestamp: tx.timestamp.to_rfc3339(),
        }
    }
}

/// Response payload for `GET /account`.
#[derive(Debug, Serialize, Deserialize)]
pub struct AccountResponse {
    pub address: Address,
    /// The manager's holder account for its delegate asset.
    pub holder_address: Address,
    /// Native balance in nanotons.
    pub balance: u128,
    /// Native balance as decimal coins.
    pub balance_coins: String,
    pub last_lt: u64,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub limit: Option<usize>,
}

/// Generic error body returned by REST endpoints on failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, error: impl ToString) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health`: liveness only.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({ "status": "ok", "version": state.version })),
    )
}

/// `GET /storage`: `get_storage_data`, read-only.
async fn storage_handler(State(state): State<AppState>) -> Response {
    let storage = state.host.lock().manager().get_storage_data();
    match storage {
        Ok(storage) => Json(storage).into_response(),
        Err(code) => error_response(StatusCode::INTERNAL_SERVER_ERROR, code),
    }
}

/// `GET /account`
async fn account_handler(State(state): State<AppState>) -> Response {
    let host = state.host.lock();
    let record = host.record();
    match host.manager().holder_address() {
        Ok(holder_address) => Json(AccountResponse {
            address: record.address,
            holder_address,
            balance: record.balance,
            balance_coins: format_coins(record.balance),
            last_lt: record.last_lt,
        })
        .into_response(),
        Err(code) => error_response(StatusCode::INTERNAL_SERVER_ERROR, code),
    }
}

/// `POST /messages`: delivers one inbound message to the manager.
///
/// A rejected message is still a processed transaction and returns 200 with
/// its exit code; only storage failures produce a 5xx.
async fn message_handler(
    State(state): State<AppState>,
    Json(req): Json<MessageRequest>,
) -> Response {
    let msg = InboundMessage {
        sender: req.sender,
        value: req.value,
        bounced: req.bounced,
        body: req.body,
    };

    let started = Instant::now();
    // Delivery commits and flushes sled while holding the host lock.
    let host = Arc::clone(&state.host);
    let db = Arc::clone(&state.db);
    let result = tokio::task::spawn_blocking(move || host.lock().deliver(&db, msg)).await;
    state
        .metrics
        .processing_latency_seconds
        .observe(started.elapsed().as_secs_f64());

    match result {
        Ok(Ok(tx)) => {
            state
                .metrics
                .observe_transaction(tx.exit_code, tx.outbound.len(), tx.balance_after);
            if !tx.success() {
                tracing::info!(lt = tx.lt, exit_code = tx.exit_code, "message rejected");
            }
            Json(TransactionResponse::from(tx)).into_response()
        }
        Ok(Err(e)) => {
            tracing::error!(error = %e, "failed to commit transaction");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e)
        }
        Err(e) => {
            tracing::error!(error = %e, "delivery task failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e)
        }
    }
}

/// `GET /transactions?limit=N`: newest first.
async fn recent_transactions_handler(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
) -> Response {
    let limit = page.limit.unwrap_or(20).min(MAX_TRANSACTION_PAGE);
    match state.db.recent_transactions(limit) {
        Ok(txs) => Json(
            txs.into_iter()
                .map(TransactionResponse::from)
                .collect::<Vec<_>>(),
        )
        .into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

/// `GET /transactions/:lt`
async fn transaction_by_lt_handler(
    Path(lt): Path<u64>,
    State(state): State<AppState>,
) -> Response {
    match state.db.get_transaction(lt) {
        Ok(Some(tx)) => Json(TransactionResponse::from(tx)).into_response(),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            format!("transaction at lt {} not found", lt),
        ),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
