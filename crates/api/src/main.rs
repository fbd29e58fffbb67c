use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, Method, StatusCode};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use meridian_api::config::{EngineConfig, ServerConfig};
use meridian_api::{background, routes, state};
use meridian_notify::context::ContextBuilder;
use meridian_notify::dispatch::CampaignEngine;
use meridian_notify::queue::{DispatchQueue, QueueWorker, TokioDispatchQueue};
use meridian_notify::reconciler::StatusReconciler;
use meridian_notify::sender::NotificationSender;
use meridian_notify::source::{EntitySource, PgEntitySource};
use meridian_notify::store::pg::PgStore;
use meridian_notify::store::NotificationStore;
use meridian_notify::transport::email::{EmailConfig, EmailTransport};
use meridian_notify::transport::whatsapp::{WhatsAppConfig, WhatsAppTransport};
use meridian_notify::transport::{ChannelRouter, DisabledTransport, Transport};

use state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "meridian_api=debug,meridian_notify=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    let engine_config = EngineConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = meridian_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    meridian_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    meridian_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- CORS ---
    let cors = build_cors_layer(&config);

    // --- Notification engine wiring ---
    let store: Arc<dyn NotificationStore> = Arc::new(PgStore::new(pool.clone()));
    let source: Arc<dyn EntitySource> = Arc::new(PgEntitySource::new(pool.clone()));
    let transport: Arc<dyn Transport> = Arc::new(ChannelRouter::new(
        build_whatsapp_transport(),
        build_email_transport(),
    ));

    let sender = Arc::new(NotificationSender::new(
        Arc::clone(&store),
        transport,
        engine_config.sender_config(),
    ));
    let (queue, queue_rx) = TokioDispatchQueue::new();
    let queue: Arc<dyn DispatchQueue> = Arc::new(queue);
    let engine = Arc::new(CampaignEngine::new(
        Arc::clone(&store),
        Arc::clone(&source),
        Arc::clone(&sender),
        queue,
        engine_config.dispatch_policy(),
    ));
    let reconciler = Arc::new(StatusReconciler::new(Arc::clone(&store)));
    let contexts = ContextBuilder::new(Arc::clone(&source));

    // --- Background tasks ---
    let cancel = tokio_util::sync::CancellationToken::new();

    let worker_handle = tokio::spawn(QueueWorker::run(
        Arc::clone(&engine),
        queue_rx,
        cancel.child_token(),
    ));

    let scheduler_handle = tokio::spawn(background::campaign_scheduler::run(
        Arc::clone(&store),
        Arc::clone(&engine),
        Duration::from_secs(engine_config.scheduler_poll_secs),
        cancel.child_token(),
    ));

    let retention_handle = tokio::spawn(background::log_retention::run(
        Arc::clone(&store),
        Duration::from_secs(engine_config.retention_sweep_secs),
        engine_config.log_retention_days,
        cancel.child_token(),
    ));

    tracing::info!("Background tasks started (queue worker, scheduler, log retention)");

    // --- App state ---
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        engine,
        sender,
        reconciler,
        contexts,
    };

    // --- Request ID header name ---
    let request_id_header = HeaderName::from_static("x-request-id");

    // --- Router ---
    let app = Router::new()
        // Health check at root level (not under /api/v1).
        .merge(routes::health::router())
        // API v1 routes.
        .nest("/api/v1", routes::api_routes())
        // -- Middleware stack (applied bottom-up) --
        // Panic recovery: catch panics and return 500 JSON.
        .layer(CatchPanicLayer::new())
        // Request timeout.
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.request_timeout_secs),
        ))
        // Propagate request ID to response.
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        // Structured request/response tracing.
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Set request ID on incoming requests.
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        // CORS.
        .layer(cors)
        // Shared state.
        .with_state(state);

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

    cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), worker_handle).await;
    let _ = tokio::time::timeout(Duration::from_secs(5), scheduler_handle).await;
    let _ = tokio::time::timeout(Duration::from_secs(5), retention_handle).await;
    tracing::info!("Background tasks stopped");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager (e.g. systemd, Docker, Kubernetes).
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

/// Construct the WhatsApp transport, or a disabled stand-in when the
/// gateway is not configured.
fn build_whatsapp_transport() -> Arc<dyn Transport> {
    match WhatsAppConfig::from_env() {
        Some(config) => {
            tracing::info!("WhatsApp transport configured");
            Arc::new(WhatsAppTransport::new(config))
        }
        None => {
            tracing::warn!("WHATSAPP_API_URL not set, WhatsApp delivery disabled");
            Arc::new(DisabledTransport::new("whatsapp"))
        }
    }
}

/// Construct the email transport, or a disabled stand-in when SMTP is
/// not configured.
fn build_email_transport() -> Arc<dyn Transport> {
    match EmailConfig::from_env() {
        Some(config) => {
            tracing::info!("Email transport configured");
            Arc::new(EmailTransport::new(config))
        }
        None => {
            tracing::warn!("SMTP_HOST not set, email delivery disabled");
            Arc::new(DisabledTransport::new("email"))
        }
    }
}

/// Build the CORS middleware layer from server configuration.
///
/// Panics at startup if any configured origin is invalid, which is the
/// desired behaviour -- we want misconfiguration to fail fast.
fn build_cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins: Vec<_> = config
        .cors_origins
        .iter()
        .map(|o| {
            o.parse()
                .unwrap_or_else(|e| panic!("Invalid CORS origin '{o}': {e}"))
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600))
}
