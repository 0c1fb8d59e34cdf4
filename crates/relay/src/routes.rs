//! HTTP surface of the relay.
//!
//! Every endpoint takes a POST with a JSON body and answers HTTP 200; the
//! verdict travels in the `status` field so that transport errors and
//! protocol rejections stay distinguishable for the clients.

use crate::state::{CheckOutcome, RelaySettings, RelayState, Target};
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use minibit_core::{now_millis, Block, Transaction};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    state: Arc<Mutex<RelayState>>,
}

impl AppState {
    pub fn new(settings: RelaySettings) -> Self {
        Self {
            state: Arc::new(Mutex::new(RelayState::new(settings))),
        }
    }
}

#[derive(Deserialize)]
struct TokenBody {
    #[serde(default)]
    token: String,
}

#[derive(Deserialize)]
struct UpdateBody {
    #[serde(default)]
    token: String,
    target: String,
}

#[derive(Deserialize)]
struct AnswerBody {
    #[serde(default)]
    #[allow(dead_code)]
    token: String,
    uuid: String,
    body: Value,
}

#[derive(Deserialize)]
struct CheckBody {
    #[serde(default)]
    #[allow(dead_code)]
    token: String,
    uuid: String,
}

#[derive(Deserialize)]
struct BlockBody {
    #[serde(default)]
    #[allow(dead_code)]
    token: String,
    block: Block,
}

#[derive(Deserialize)]
struct TransactionBody {
    #[serde(default)]
    #[allow(dead_code)]
    token: String,
    transaction: Transaction,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/regtoken", post(regtoken))
        .route("/update", post(update))
        .route("/jupdate", post(jupdate))
        .route("/answer", post(answer))
        .route("/check", post(check))
        .route("/prp_block", post(prp_block))
        .route("/prp_transaction", post(prp_transaction))
        .route("/nodesnum", post(nodesnum))
        .with_state(state)
}

async fn regtoken(State(app): State<AppState>) -> Json<Value> {
    let token = app.state.lock().await.register();
    info!(%token, "registered node");
    Json(json!({ "status": "ok", "token": token }))
}

async fn update(State(app): State<AppState>, Json(body): Json<UpdateBody>) -> Json<Value> {
    let target = match Target::parse(&body.target) {
        Some(target) => target,
        None => {
            warn!(target = %body.target, "unknown update target");
            return Json(json!({
                "status": "error",
                "reason": format!("unknown target `{}`", body.target),
            }));
        }
    };

    let (uuid, timestamp) = app
        .state
        .lock()
        .await
        .open_request(&body.token, target, now_millis());
    debug!(%uuid, target = %body.target, "opened request");
    Json(json!({ "status": "ok", "uuid": uuid, "timestamp": timestamp }))
}

async fn jupdate(State(app): State<AppState>, Json(body): Json<TokenBody>) -> Json<Value> {
    let state = app.state.lock().await;
    match state.next_pending(&body.token) {
        Some(request) => Json(json!({
            "status": "ok",
            "uuid": request.uuid,
            "target": request.target.as_str(),
            "timestamp": request.created_millis,
        })),
        None => Json(json!({ "status": "warning", "reason": "no pending requests" })),
    }
}

async fn answer(State(app): State<AppState>, Json(body): Json<AnswerBody>) -> Json<Value> {
    if app.state.lock().await.add_answer(&body.uuid, body.body) {
        debug!(uuid = %body.uuid, "answer recorded");
        Json(json!({ "status": "ok" }))
    } else {
        Json(json!({ "status": "error", "reason": "unknown uuid" }))
    }
}

async fn check(State(app): State<AppState>, Json(body): Json<CheckBody>) -> Json<Value> {
    let outcome = app.state.lock().await.take_answers(&body.uuid, now_millis());
    match outcome {
        CheckOutcome::Unknown => Json(json!({ "status": "error", "reason": "unknown uuid" })),
        CheckOutcome::Settling => {
            Json(json!({ "status": "warning", "reason": "still settling" }))
        }
        CheckOutcome::Ready(answers) => Json(json!({ "status": "ok", "answers": answers })),
    }
}

async fn prp_block(State(app): State<AppState>, Json(body): Json<BlockBody>) -> Json<Value> {
    let hash = body.block.hash.clone();
    match app.state.lock().await.buffer_block(body.block, now_millis()) {
        Ok(()) => {
            info!(%hash, "buffered broadcast block");
            Json(json!({ "status": "ok" }))
        }
        Err(err) => {
            warn!(%hash, error = %err, "refused broadcast block");
            Json(json!({ "status": "fatal-error", "reason": err.to_string() }))
        }
    }
}

async fn prp_transaction(
    State(app): State<AppState>,
    Json(body): Json<TransactionBody>,
) -> Json<Value> {
    let hash = body.transaction.hash.clone();
    app.state
        .lock()
        .await
        .buffer_transaction(body.transaction, now_millis());
    debug!(%hash, "buffered broadcast transaction");
    Json(json!({ "status": "ok" }))
}

async fn nodesnum(State(app): State<AppState>, Json(_body): Json<TokenBody>) -> Json<Value> {
    let num = app.state.lock().await.token_count();
    Json(json!({ "status": "ok", "num": num }))
}
