//! Request handlers: thin bindings from the HTTP surface to the auth
//! service.

pub mod auth;
pub mod user;

use axum::Json;
use serde_json::{json, Value};

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
