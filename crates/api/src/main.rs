use std::net::SocketAddr;
use std::sync::Arc;

use adreel_db::{GenerationStore, MemoryGenerationStore, PgGenerationStore};
use adreel_events::EventBus;
use adreel_workflow::{ReqwestTransport, WorkflowProxy};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use adreel_api::config::ServerConfig;
use adreel_api::engine::GenerationLifecycle;
use adreel_api::notifications::StatusNotifier;
use adreel_api::router::build_app_router;
use adreel_api::state::AppState;
use adreel_api::ws;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "adreel_api=debug,adreel_workflow=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = %config.port,
        workflow = %config.workflow_webhook_url,
        "Loaded server configuration",
    );
    if config.request_timeout_secs <= config.workflow_timeout_secs {
        tracing::warn!(
            request_timeout_secs = config.request_timeout_secs,
            workflow_timeout_secs = config.workflow_timeout_secs,
            "Request timeout does not exceed the workflow timeout; slow job calls will be cut off with 408",
        );
    }

    // --- Event bus ---
    let event_bus = Arc::new(EventBus::default());

    // --- Record store ---
    let store: Arc<dyn GenerationStore> = match &config.database_url {
        Some(database_url) => {
            let pool = adreel_db::create_pool(database_url)
                .await
                .expect("Failed to connect to database");
            tracing::info!("Database connection pool created");

            adreel_db::health_check(&pool)
                .await
                .expect("Database health check failed");
            tracing::info!("Database health check passed");

            adreel_db::run_migrations(&pool)
                .await
                .expect("Failed to run database migrations");
            tracing::info!("Database migrations applied");

            Arc::new(PgGenerationStore::new(pool, Arc::clone(&event_bus)))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, generations are kept in memory only");
            Arc::new(MemoryGenerationStore::new(Arc::clone(&event_bus)))
        }
    };

    // --- Workflow proxy ---
    let transport = Arc::new(ReqwestTransport::new(config.workflow_timeout()));
    let proxy = Arc::new(WorkflowProxy::new(
        transport,
        config.workflow_webhook_url.clone(),
    ));

    // --- Generation engine ---
    let lifecycle = Arc::new(GenerationLifecycle::new(
        Arc::clone(&store),
        config.length_bounds,
    ));
    let notifier = Arc::new(StatusNotifier::new(Arc::clone(&store)));

    // --- WebSocket manager ---
    let ws_manager = Arc::new(ws::WsManager::new());
    let heartbeat_handle = ws::start_heartbeat(Arc::clone(&ws_manager));

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        lifecycle,
        notifier: Arc::clone(&notifier),
        proxy,
        ws_manager: Arc::clone(&ws_manager),
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    let ws_count = ws_manager.connection_count().await;
    tracing::info!(ws_count, "Closing remaining WebSocket connections");
    ws_manager.shutdown_all().await;

    notifier.shutdown().await;

    heartbeat_handle.abort();
    tracing::info!("Heartbeat task stopped");

    drop(event_bus);
    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT (Ctrl-C) or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
