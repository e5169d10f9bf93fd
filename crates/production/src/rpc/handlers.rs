//! HTTP request handlers for the RPC API.

use super::state::RpcState;
use super::types::*;
use crate::fatal::{CallbackPanicked, PANIC_KIND};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use kvstore_app::AppError;
use kvstore_storage::KvStore;
use kvstore_types::{Request, RequestCheckTx, RequestInfo, RequestQuery};
use serde::Serialize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use tracing::{debug, error};

// ═══════════════════════════════════════════════════════════════════════════
// Health & Readiness Handlers
// ═══════════════════════════════════════════════════════════════════════════

/// Handler for `GET /health` - liveness probe.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

/// Handler for `GET /ready` - readiness probe.
pub async fn ready_handler<S: KvStore + 'static>(
    State(state): State<RpcState<S>>,
) -> impl IntoResponse {
    if state.ready.load(Ordering::SeqCst) {
        (
            StatusCode::OK,
            Json(ReadyResponse {
                status: "ready".to_string(),
                ready: true,
            }),
        )
    } else {
        let status = if state.is_halted() { "halted" } else { "not_ready" };
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadyResponse {
                status: status.to_string(),
                ready: false,
            }),
        )
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Metrics Handler
// ═══════════════════════════════════════════════════════════════════════════

/// Handler for `GET /metrics` - Prometheus metrics.
pub async fn metrics_handler<S: KvStore + 'static>(
    State(state): State<RpcState<S>>,
) -> impl IntoResponse {
    if !state.metrics_enabled {
        return (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("metrics disabled")),
        )
            .into_response();
    }
    match kvstore_metrics_prometheus::encode_metrics() {
        Ok((content_type, buffer)) => {
            ([(axum::http::header::CONTENT_TYPE, content_type)], buffer).into_response()
        }
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to encode metrics".to_string(),
            )
                .into_response()
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Callback Handlers
// ═══════════════════════════════════════════════════════════════════════════

/// Handler for `POST /abci` - run one callback through the session.
///
/// Callbacks are applied one at a time in arrival order. A fatal error halts
/// the node: the fatal handler is invoked and every later request gets 503.
pub async fn abci_handler<S: KvStore + 'static>(
    State(state): State<RpcState<S>>,
    Json(request): Json<Request>,
) -> Response {
    let method = request.method();
    let session = state.session.clone().lock_owned().await;
    if state.is_halted() {
        return halted_response();
    }
    debug!(method, "ABCI callback");

    run_blocking(&state, method, session, move |session| session.handle(request)).await
}

/// Handler for `GET /api/v1/query/{key_hex}` - read committed state.
///
/// Never waits on the callback session, so reads proceed while a block is
/// open and see only what was committed before it.
pub async fn query_handler<S: KvStore + 'static>(
    State(state): State<RpcState<S>>,
    Path(key_hex): Path<String>,
) -> Response {
    let key = match hex::decode(&key_hex) {
        Ok(key) => key,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new(format!("Invalid hex key: {e}"))),
            )
                .into_response();
        }
    };
    read_key(&state, key).await
}

/// Handler for `GET /api/v1/query` - read the empty key.
///
/// An empty path segment does not match `/query/{key_hex}`.
pub async fn query_empty_key_handler<S: KvStore + 'static>(
    State(state): State<RpcState<S>>,
) -> Response {
    read_key(&state, Vec::new()).await
}

async fn read_key<S: KvStore + 'static>(state: &RpcState<S>, key: Vec<u8>) -> Response {
    if state.is_halted() {
        return halted_response();
    }
    let app = state.app.clone();
    run_blocking(state, "query", (), move |_| {
        app.query(&RequestQuery {
            data: key,
            ..Default::default()
        })
    })
    .await
}

/// Handler for `POST /api/v1/check_tx` - admission check.
///
/// Stateless, so it bypasses the session.
pub async fn check_tx_handler<S: KvStore + 'static>(
    State(state): State<RpcState<S>>,
    Json(request): Json<RequestCheckTx>,
) -> Response {
    if state.is_halted() {
        return halted_response();
    }
    Json(state.app.check_tx(&request)).into_response()
}

// ═══════════════════════════════════════════════════════════════════════════
// Status Handler
// ═══════════════════════════════════════════════════════════════════════════

/// Handler for `GET /api/v1/status` - node status.
pub async fn status_handler<S: KvStore + 'static>(State(state): State<RpcState<S>>) -> Response {
    let open_block_height = state.session.lock().await.open_height();
    let info = match state.app.info(&RequestInfo::default()) {
        Ok(info) => info,
        Err(err) => {
            state.halt(err.fatal().kind(), &err);
            return fatal_response(err.to_string(), err.fatal().kind());
        }
    };

    Json(NodeStatusResponse {
        app: info.data,
        version: info.version,
        app_version: info.app_version,
        last_block_height: info.last_block_height.0,
        open_block_height,
        uptime_secs: state.start_time.elapsed().as_secs(),
        halted: state.is_halted(),
    })
    .into_response()
}

// ═══════════════════════════════════════════════════════════════════════════
// Helpers
// ═══════════════════════════════════════════════════════════════════════════

/// Run `callback` on the blocking pool, halting on any fatal outcome.
///
/// `hold` (the session guard for block callbacks) is released only after the
/// halt flag is set, so a request queued behind a failed callback always
/// sees the node halted.
async fn run_blocking<S, G, T, F>(
    state: &RpcState<S>,
    method: &'static str,
    hold: G,
    callback: F,
) -> Response
where
    S: KvStore + 'static,
    G: Send + 'static,
    T: Serialize + Send + 'static,
    F: FnOnce(&mut G) -> Result<T, AppError> + Send + 'static,
{
    let task_state = state.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        let mut hold = hold;
        let result = panic::catch_unwind(AssertUnwindSafe(|| callback(&mut hold)));
        match &result {
            Ok(Ok(_)) => {}
            Ok(Err(err)) => task_state.halt(err.fatal().kind(), err),
            Err(_) => task_state.halt(PANIC_KIND, &CallbackPanicked { method }),
        }
        drop(hold);
        result
    })
    .await;

    match outcome {
        Ok(Ok(Ok(response))) => Json(response).into_response(),
        Ok(Ok(Err(err))) => fatal_response(err.to_string(), err.fatal().kind()),
        Ok(Err(_)) => fatal_response(CallbackPanicked { method }.to_string(), PANIC_KIND),
        Err(e) => {
            error!(method, error = %e, "Callback task failed");
            state.halt(PANIC_KIND, &e);
            fatal_response(format!("{method} failed: {e}"), PANIC_KIND)
        }
    }
}

fn fatal_response(error: String, kind: &str) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error,
            fatal: Some(kind.to_string()),
        }),
    )
        .into_response()
}

fn halted_response() -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ErrorResponse::new("node halted after a fatal error")),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fatal::RecordingFatalHandler;
    use kvstore_app::KvStoreApp;
    use kvstore_storage_memory::MemStorage;
    use kvstore_types::ResponseCommit;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_panicking_callback_is_fatal() {
        let fatal = Arc::new(RecordingFatalHandler::new());
        let app = KvStoreApp::new(Arc::new(MemStorage::new()));
        let state = RpcState::new(app, fatal.clone(), false);
        state.ready.store(true, Ordering::SeqCst);

        let commit = |_: &mut ()| -> Result<ResponseCommit, AppError> { panic!("callback blew up") };
        let response = run_blocking(&state, "commit", (), commit).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(state.is_halted());
        assert!(!state.ready.load(Ordering::SeqCst));
        assert_eq!(
            fatal.faults(),
            vec![(
                PANIC_KIND.to_string(),
                "commit callback panicked".to_string()
            )]
        );
    }
}
