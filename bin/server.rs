// Raid Ledger - Web Server
// Two read endpoints over the rewards engine; all writes happen in the CLI.

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::Serialize;
use std::env;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use raid_ledger::{compute_debug, compute_effective, Db, EngineError};

/// Shared application state
#[derive(Clone)]
struct AppState {
    db: Db,
    /// Admin token; unset runs the server open (dev mode)
    token: Option<String>,
    /// Wall-clock bound for one whole request
    request_timeout: Duration,
}

/// Error body (success responses are the engine's own shapes)
#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
}

fn error_response(err: EngineError) -> Response {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    if err.is_transient() {
        warn!(status = status.as_u16(), "request degraded: {}", err);
    } else if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!("computation failed: {:#}", err);
    }

    (
        status,
        Json(ErrorResponse {
            success: false,
            error: err.to_string(),
        }),
    )
        .into_response()
}

/// Bearer-token check; fails before any connection is acquired.
fn check_auth(state: &AppState, headers: &HeaderMap) -> Result<(), EngineError> {
    let expected = match &state.token {
        Some(token) => token,
        None => return Ok(()),
    };

    let provided = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    if provided == Some(expected.as_str()) {
        Ok(())
    } else {
        Err(EngineError::AuthRequired)
    }
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({ "success": true, "version": raid_ledger::VERSION }))
}

/// GET /api/rewards/:event_id/effective - The effective EngineResult
async fn get_effective(
    State(state): State<AppState>,
    Path(event_id): Path<i64>,
    headers: HeaderMap,
) -> Response {
    if let Err(err) = check_auth(&state, &headers) {
        return error_response(err);
    }

    let limit = state.request_timeout;
    match tokio::time::timeout(limit, compute_effective(&state.db, event_id)).await {
        // Timeout boundary: in-flight fetches finish detached and their
        // pool guards release on drop
        Err(_) => error_response(EngineError::Timeout {
            limit_ms: limit.as_millis() as u64,
        }),
        Ok(Err(err)) => error_response(err),
        Ok(Ok(result)) => {
            info!(
                event_id,
                mode = result.mode.as_str(),
                digest = %result.calc_digest,
                "effective rewards computed"
            );
            (StatusCode::OK, Json(result)).into_response()
        }
    }
}

/// GET /api/rewards/:event_id/debug - Auto-vs-manual comparison
async fn get_debug(
    State(state): State<AppState>,
    Path(event_id): Path<i64>,
    headers: HeaderMap,
) -> Response {
    if let Err(err) = check_auth(&state, &headers) {
        return error_response(err);
    }

    let limit = state.request_timeout;
    match tokio::time::timeout(limit, compute_debug(&state.db, event_id)).await {
        Err(_) => error_response(EngineError::Timeout {
            limit_ms: limit.as_millis() as u64,
        }),
        Ok(Err(err)) => error_response(err),
        Ok(Ok(report)) => (StatusCode::OK, Json(report)).into_response(),
    }
}

// ============================================================================
// Main Server
// ============================================================================

fn env_or<T: std::str::FromStr>(key: &str, fallback: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(fallback)
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let db_path = env::var("RAID_LEDGER_DB").unwrap_or_else(|_| "raid_ledger.db".to_string());
    let bind = env::var("RAID_LEDGER_BIND").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let token = env::var("RAID_LEDGER_TOKEN").ok().filter(|t| !t.is_empty());
    let pool_size: usize = env_or("RAID_LEDGER_POOL_SIZE", 4);
    let acquire_timeout = Duration::from_millis(env_or("RAID_LEDGER_ACQUIRE_TIMEOUT_MS", 1_000));
    let request_timeout = Duration::from_millis(env_or("RAID_LEDGER_REQUEST_TIMEOUT_MS", 10_000));

    let db = match Db::open(&db_path, pool_size, acquire_timeout) {
        Ok(db) => db,
        Err(err) => {
            error!("failed to open database {}: {:#}", db_path, err);
            std::process::exit(1);
        }
    };

    if token.is_none() {
        warn!("RAID_LEDGER_TOKEN unset - running open (dev mode)");
    }

    let state = AppState {
        db,
        token,
        request_timeout,
    };

    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/rewards/:event_id/effective", get(get_effective))
        .route("/rewards/:event_id/debug", get(get_debug))
        .with_state(state);

    let app = Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive());

    let listener = match tokio::net::TcpListener::bind(&bind).await {
        Ok(listener) => listener,
        Err(err) => {
            error!("failed to bind {}: {}", bind, err);
            std::process::exit(1);
        }
    };

    info!(db = %db_path, bind = %bind, pool_size, "raid-ledger server ready");

    if let Err(err) = axum::serve(listener, app).await {
        error!("server exited: {}", err);
        std::process::exit(1);
    }
}
