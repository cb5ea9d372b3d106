//! Request and response shapes of the HTTP API.
//!
//! # `ApiResponse<T>` envelope
//!
//! Every response, success or failure, has the same outer shape so clients
//! can branch on `success` before looking at anything else:
//!
//! ```json
//! { "success": true,  "data":  { "mac": "AA:BB:CC:DD:EE:FF", "blocked": true } }
//! { "success": false, "error": { "code": "INVALID_MAC", "message": "Invalid MAC address: NOPE" } }
//! ```
//!
//! # Error mapping
//!
//! [`ApiError`] carries the HTTP status and the stable `code`.  Conversions
//! from the library error types decide the status: validation failures of
//! [`AccessError`] are `400`, everything the packet filter or discovery
//! could not do is `500`.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::error;

use armas_core::{AccessError, ScheduleRecord};

use crate::application::device_inventory::{DeviceView, DiscoveryError};

// ── Envelope ──────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

// ── Errors ────────────────────────────────────────────────────────────────────

/// A failed request: status, stable code, and a human-readable message.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn device_not_found(mac: impl std::fmt::Display) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            "DEVICE_NOT_FOUND",
            format!("Device with MAC {mac} not found"),
        )
    }

    pub fn missing_name() -> Self {
        Self::new(StatusCode::BAD_REQUEST, "MISSING_NAME", "Device name is required")
    }

    pub fn missing_api_key() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            "MISSING_API_KEY",
            "API key required. Include X-API-Key header.",
        )
    }

    pub fn invalid_api_key() -> Self {
        Self::new(StatusCode::FORBIDDEN, "INVALID_API_KEY", "Invalid API key.")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(ErrorBody {
                code: self.code,
                message: self.message,
            }),
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<AccessError> for ApiError {
    fn from(e: AccessError) -> Self {
        let status = if e.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            error!("access-control operation failed: {e}");
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self::new(status, e.code(), e.to_string())
    }
}

impl From<DiscoveryError> for ApiError {
    fn from(e: DiscoveryError) -> Self {
        error!("device discovery failed: {e}");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "SCAN_FAILED", e.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "INVALID_BODY", rejection.body_text())
    }
}

// ── Request bodies ────────────────────────────────────────────────────────────

/// Body of `POST /api/control/block` and `/unblock`.
#[derive(Debug, Default, Deserialize)]
pub struct MacRequest {
    #[serde(default)]
    pub mac: Option<String>,
}

/// Body of `POST /api/timers`.
///
/// `minutes` is kept as raw JSON so a string or `null` can be reported as
/// `INVALID_MINUTES` rather than a generic body error.
#[derive(Debug, Default, Deserialize)]
pub struct TimerRequest {
    #[serde(default)]
    pub mac: Option<String>,
    #[serde(default)]
    pub minutes: Option<serde_json::Value>,
}

/// Body of `PUT /api/devices/{mac}/name`.
#[derive(Debug, Default, Deserialize)]
pub struct RenameRequest {
    #[serde(default)]
    pub name: Option<String>,
}

// ── Response payloads ─────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct HealthData {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct DeviceListData {
    pub devices: Vec<DeviceView>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct DeviceData {
    pub device: DeviceView,
}

#[derive(Debug, Serialize)]
pub struct RenameData {
    pub mac: String,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct BlockedListData {
    pub blocked: Vec<String>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct TimerData {
    pub timer: Option<ScheduleRecord>,
}

#[derive(Debug, Serialize)]
pub struct TimerListData {
    pub timers: Vec<ScheduleRecord>,
    pub count: usize,
}
