use member_service::{
    AppState,
    config::{AppConfig, Env},
    create_router,
    database::{MongoGateway, MongoSettings},
    repository::{MongoMemberRepository, RepositoryState},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Loads configuration, sets up logging, prepares the MongoDB gateway and
/// serves the HTTP API until Ctrl+C / SIGTERM, then closes the connection.
#[tokio::main]
async fn main() {
    // 1. Configuration (.env first, then the process environment)
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging: RUST_LOG wins, otherwise sensible defaults.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "member_service=debug,tower_http=info,mongodb=warn".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);
    if config.api_key.is_none() {
        match config.env {
            Env::Production => {
                tracing::error!("API_KEY is not set: every request will be refused")
            }
            Env::Local => tracing::warn!("API_KEY is not set: authentication disabled"),
        }
    }

    // 3. Persistence gateway. The connection is opened lazily; warming it up
    // here only surfaces problems early, a failure is retried on first use.
    let gateway = Arc::new(MongoGateway::new(MongoSettings::from_config(&config)));
    if let Err(e) = gateway.collection().await {
        tracing::warn!(error = %e, "MongoDB not reachable at startup, will retry on demand");
    }

    let repo = Arc::new(MongoMemberRepository::new(gateway.clone())) as RepositoryState;

    // 4. Router and server
    let addr = format!("0.0.0.0:{}", config.port);
    let app = create_router(AppState { repo, config });

    let listener = TcpListener::bind(&addr)
        .await
        .expect("FATAL: failed to bind the HTTP listener");
    tracing::info!("Listening on {}", addr);
    tracing::info!("API Documentation (Swagger UI) available at /swagger-ui");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("FATAL: HTTP server error");

    // 5. Teardown
    gateway.release().await;
    tracing::info!("Shutdown complete");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
