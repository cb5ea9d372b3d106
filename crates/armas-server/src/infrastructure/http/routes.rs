//! Route table and handlers.
//!
//! Handlers are thin: they pull identifiers and bodies out of the request,
//! call one [`AccessController`] or [`DeviceInventory`] operation, and wrap
//! the result in the [`ApiResponse`] envelope.  All validation of identifiers
//! and durations happens below this layer.
//!
//! [`AccessController`]: crate::application::access_control::AccessController
//! [`DeviceInventory`]: crate::application::device_inventory::DeviceInventory

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderValue, StatusCode};
use axum::routing::{get, post, put};
use axum::{middleware, Json, Router};
use serde_json::Value;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use armas_core::AccessError;

use super::auth::require_api_key;
use super::dto::{
    ApiError, ApiResponse, BlockedListData, DeviceData, DeviceListData, HealthData, MacRequest,
    RenameData, RenameRequest, TimerData, TimerListData, TimerRequest,
};
use super::ApiState;
use crate::application::access_control::{BlockStatus, TimerCancellation};
use crate::application::policy_store::AccessPolicyStore;

type ApiResult<T> = Result<ApiResponse<T>, ApiError>;

/// Builds the full `/api` router with authentication, CORS, and request
/// tracing applied.
pub fn router(state: ApiState, cors_origins: &[String]) -> Router {
    let protected = Router::new()
        .route("/devices", get(list_devices))
        .route("/scan", get(list_devices))
        .route("/devices/{mac}", get(get_device))
        .route("/devices/{mac}/name", put(rename_device))
        .route("/control/block", post(block))
        .route("/control/unblock", post(unblock))
        .route("/control/status/{mac}", get(block_status))
        .route("/control/blocked", get(list_blocked))
        .route("/timers", post(set_timer).get(list_timers))
        .route("/timers/{mac}", get(get_timer).delete(cancel_timer))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_key,
        ));

    let api = Router::new().route("/health", get(health)).merge(protected);

    Router::new()
        .nest("/api", api)
        .layer(cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!("ignoring invalid CORS origin {o:?}");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}

// ── Health ────────────────────────────────────────────────────────────────────

async fn health() -> ApiResponse<HealthData> {
    ApiResponse::ok(HealthData { status: "ok" })
}

// ── Devices ───────────────────────────────────────────────────────────────────

async fn list_devices(State(state): State<ApiState>) -> ApiResult<DeviceListData> {
    let blocked = state.controller.list_blocked().await?;
    let devices = state.inventory.list(&blocked).await?;
    Ok(ApiResponse::ok(DeviceListData {
        count: devices.len(),
        devices,
    }))
}

async fn get_device(
    State(state): State<ApiState>,
    Path(mac): Path<String>,
) -> ApiResult<DeviceData> {
    let status = state.controller.query_blocked(&mac).await?;
    let device = state
        .inventory
        .get(status.mac, status.blocked)
        .await?
        .ok_or_else(|| ApiError::device_not_found(status.mac))?;
    Ok(ApiResponse::ok(DeviceData { device }))
}

async fn rename_device(
    State(state): State<ApiState>,
    Path(mac): Path<String>,
    body: Result<Json<RenameRequest>, JsonRejection>,
) -> ApiResult<RenameData> {
    let Json(req) = body?;
    let name = req
        .name
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(ApiError::missing_name)?;
    let mac = AccessPolicyStore::validate_identifier(&mac)?;

    state.inventory.rename(mac, &name).map_err(|e| {
        ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "STORAGE_FAILED",
            e.to_string(),
        )
    })?;

    Ok(ApiResponse::ok(RenameData {
        mac: mac.to_string(),
        name,
    }))
}

// ── Control ───────────────────────────────────────────────────────────────────

async fn block(
    State(state): State<ApiState>,
    body: Result<Json<MacRequest>, JsonRejection>,
) -> ApiResult<BlockStatus> {
    let Json(req) = body?;
    let status = state
        .controller
        .block_now(req.mac.as_deref().unwrap_or_default())
        .await?;
    Ok(ApiResponse::ok(status))
}

async fn unblock(
    State(state): State<ApiState>,
    body: Result<Json<MacRequest>, JsonRejection>,
) -> ApiResult<BlockStatus> {
    let Json(req) = body?;
    let status = state
        .controller
        .unblock_now(req.mac.as_deref().unwrap_or_default())
        .await?;
    Ok(ApiResponse::ok(status))
}

async fn block_status(
    State(state): State<ApiState>,
    Path(mac): Path<String>,
) -> ApiResult<BlockStatus> {
    Ok(ApiResponse::ok(state.controller.query_blocked(&mac).await?))
}

async fn list_blocked(State(state): State<ApiState>) -> ApiResult<BlockedListData> {
    let blocked: Vec<String> = state
        .controller
        .list_blocked()
        .await?
        .iter()
        .map(ToString::to_string)
        .collect();
    Ok(ApiResponse::ok(BlockedListData {
        count: blocked.len(),
        blocked,
    }))
}

// ── Timers ────────────────────────────────────────────────────────────────────

async fn set_timer(
    State(state): State<ApiState>,
    body: Result<Json<TimerRequest>, JsonRejection>,
) -> ApiResult<TimerData> {
    let Json(req) = body?;
    let mac = req.mac.unwrap_or_default();
    if mac.trim().is_empty() {
        return Err(AccessError::MissingIdentifier.into());
    }
    let minutes = match &req.minutes {
        Some(Value::Number(n)) => n.as_f64(),
        _ => None,
    }
    .ok_or_else(|| {
        AccessError::InvalidDuration(
            req.minutes
                .as_ref()
                .map_or_else(|| "nothing".to_string(), Value::to_string),
        )
    })?;

    let record = state.controller.schedule_block(&mac, minutes).await?;
    Ok(ApiResponse::ok(TimerData {
        timer: Some(record),
    }))
}

async fn list_timers(State(state): State<ApiState>) -> ApiResponse<TimerListData> {
    let timers = state.controller.list_timers();
    ApiResponse::ok(TimerListData {
        count: timers.len(),
        timers,
    })
}

async fn get_timer(State(state): State<ApiState>, Path(mac): Path<String>) -> ApiResult<TimerData> {
    let timer = state.controller.query_timer(&mac)?;
    Ok(ApiResponse::ok(TimerData { timer }))
}

async fn cancel_timer(
    State(state): State<ApiState>,
    Path(mac): Path<String>,
) -> ApiResult<TimerCancellation> {
    Ok(ApiResponse::ok(state.controller.cancel_timer(&mac)?))
}
