use std::time::Duration;

use sea_orm::Database;
use tracing::{info, warn};

use stepup_core::tracing::init_tracing;
use stepup_domain::clock::SystemClock;
use stepup_verification::config::VerificationConfig;
use stepup_verification::router::build_router;
use stepup_verification::state::AppState;
use stepup_verification::usecase::cleanup::CleanupUseCase;
use stepup_verification_migration::{Migrator, MigratorTrait};

#[tokio::main]
async fn main() {
    init_tracing();

    let config = VerificationConfig::from_env();

    let db = Database::connect(&config.database_url)
        .await
        .expect("failed to connect to database");

    if config.run_migrations {
        Migrator::up(&db, None)
            .await
            .expect("failed to run migrations");
    }

    let state = AppState {
        db,
        jwt_secret: config.jwt_secret.clone(),
        policy: config.policy(),
        delivery_mode: config.code_delivery,
        clock: SystemClock::shared(),
    };

    let sweeper = state.clone();
    let period = Duration::from_secs(config.cleanup_interval_secs.max(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            let cleanup = CleanupUseCase {
                codes: sweeper.code_repo(),
                limiter: sweeper.rate_limiter(),
                code_purge_grace: sweeper.policy.code_purge_grace,
                clock: sweeper.clock.clone(),
            };
            match cleanup.execute().await {
                Ok(report) => info!(
                    codes = report.codes,
                    rate_limits = report.rate_limits,
                    "purged expired verification state"
                ),
                Err(e) => warn!(error = ?e, "periodic cleanup failed"),
            }
        }
    });

    let router = build_router(state);
    let addr = format!("0.0.0.0:{}", config.verification_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind");

    info!("verification service listening on {addr}");
    axum::serve(listener, router).await.expect("server error");
}
