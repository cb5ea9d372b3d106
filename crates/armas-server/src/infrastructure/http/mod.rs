//! HTTP API built on `axum`.
//!
//! # Sub-modules
//!
//! - **`routes`** – The route table under `/api` and one handler per
//!   operation.
//! - **`auth`** – `X-API-Key` middleware guarding every route except
//!   `/api/health`.
//! - **`dto`** – The `{success, data, error}` envelope, error-to-status
//!   mapping, and request/response bodies.

use std::sync::Arc;

use crate::application::access_control::AccessController;
use crate::application::device_inventory::DeviceInventory;

pub mod auth;
pub mod dto;
pub mod routes;

pub use routes::router;

/// State shared by every handler.  Cheap to clone.
#[derive(Clone)]
pub struct ApiState {
    pub controller: Arc<AccessController>,
    pub inventory: Arc<DeviceInventory>,
    pub api_key: Arc<str>,
}

impl ApiState {
    pub fn new(
        controller: Arc<AccessController>,
        inventory: Arc<DeviceInventory>,
        api_key: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            controller,
            inventory,
            api_key: api_key.into(),
        }
    }
}
