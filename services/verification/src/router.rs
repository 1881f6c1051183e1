use axum::{
    Router,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use stepup_core::health::healthz;
use stepup_core::middleware::{propagate_request_id_layer, request_id_layer};

use crate::handlers::health::readyz;
use crate::handlers::verification::{check_token, request_code, verify_code};
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // Step-up verification
        .route("/verifications/request-code", post(request_code))
        .route("/verifications/verify-code", post(verify_code))
        .route("/verifications/token", get(check_token))
        .layer(
            ServiceBuilder::new()
                .layer(request_id_layer())
                .layer(TraceLayer::new_for_http())
                .layer(propagate_request_id_layer()),
        )
        .with_state(state)
}
