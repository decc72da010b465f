use diesel::Connection;
use diesel::sqlite::SqliteConnection;
use std::sync::{Arc, Mutex};
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{error, info, warn};
use varta_service::{
    DefaultAppState,
    config::ServiceConfig,
    routes::create_router,
    run_migrations,
    shutdown::{GracefulShutdownLayer, ShutdownState},
};

#[tokio::main]
async fn main() {
    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "varta_service=debug".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = ServiceConfig::from_env().unwrap_or_else(|err| {
        error!(error = %err, "Invalid configuration");
        std::process::exit(1);
    });

    let mut connection = SqliteConnection::establish(&config.database_url).unwrap_or_else(|err| {
        error!(database_url = %config.database_url, error = %err, "Failed to connect to database");
        std::process::exit(1);
    });

    if let Err(err) = run_migrations(&mut connection) {
        error!(error = %err, "Failed to run database migrations");
        std::process::exit(1);
    }

    info!(database_url = %config.database_url, "Connected to database");

    let bind_address = config.bind_address;
    let request_timeout = config.request_timeout;
    let app_state = DefaultAppState::new(Arc::new(Mutex::new(connection)), config);
    let shutdown_state = ShutdownState::new();

    let app = create_router()
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(GracefulShutdownLayer::new(shutdown_state.clone()))
                .layer(TimeoutLayer::new(request_timeout)),
        )
        .with_state(app_state);

    let listener = tokio::net::TcpListener::bind(bind_address)
        .await
        .unwrap_or_else(|err| {
            error!(bind_address = %bind_address, error = %err, "Failed to bind to address");
            std::process::exit(1);
        });

    info!(bind_address = %bind_address, "Server running");

    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal(shutdown_state));

    if let Err(err) = server.await {
        error!(error = %err, "Server error");
        std::process::exit(1);
    }
}

async fn shutdown_signal(shutdown_state: ShutdownState) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = %err, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
    shutdown_state.start_shutdown();
    shutdown_state.drained().await;
    info!("Graceful shutdown completed - all requests finished");
}
