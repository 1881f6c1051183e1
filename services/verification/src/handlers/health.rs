use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;

use stepup_core::health::{Probe, readiness};

use crate::state::AppState;

/// `GET /readyz`: ready once the database answers a ping.
pub async fn readyz(State(state): State<AppState>) -> (StatusCode, Json<Probe>) {
    readiness(state.db.ping().await)
}
