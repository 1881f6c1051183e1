use axum::Json;
use axum::http::StatusCode;
use ::serde::Serialize;

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct Probe {
    pub status: &'static str,
}

/// `GET /healthz`: the process is up and serving.
pub async fn healthz() -> Json<Probe> {
    Json(Probe { status: "ok" })
}

/// Map a dependency check to a `/readyz` answer. Failures are logged and
/// reported as 503 so the orchestrator stops routing traffic here.
pub fn readiness<E: std::fmt::Debug>(check: Result<(), E>) -> (StatusCode, Json<Probe>) {
    match check {
        Ok(()) => (StatusCode::OK, Json(Probe { status: "ready" })),
        Err(e) => {
            ::tracing::warn!(error = ?e, "readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(Probe {
                    status: "unavailable",
                }),
            )
        }
    }
}
