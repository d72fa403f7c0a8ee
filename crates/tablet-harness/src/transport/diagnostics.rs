//! Routes served by the diagnostic listener.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Map, Value};

use crate::vars::VarsRegistry;

/// Path of the exported variables endpoint.
pub const VARS_PATH: &str = "/debug/vars";

/// Builds the diagnostic router over `vars`.
pub fn router(vars: Arc<VarsRegistry>) -> Router {
    Router::new()
        .route(VARS_PATH, get(serve_vars))
        .with_state(vars)
}

async fn serve_vars(State(vars): State<Arc<VarsRegistry>>) -> Json<Map<String, Value>> {
    Json(vars.snapshot())
}
