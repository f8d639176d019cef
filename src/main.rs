use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use forum_server::config::{Cli, Config};
use forum_server::events::{EventPublisher, LogPublisher, NatsPublisher};
use forum_server::feed::{PostService, SqlitePostStore};
use forum_server::recommend::{DisabledRecommender, HttpRecommender, Recommender};
use forum_server::state::AppState;
use forum_server::{db, routes};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli);
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;

    // Initialize database
    let pool = db::create_pool(&config.db_path())?;
    db::run_migrations(&pool)?;

    let events = build_publisher(&config).await;
    let recommender = build_recommender(&config)?;

    let posts = PostService::new(Arc::new(SqlitePostStore::new(pool.clone())), events);

    let state = AppState {
        db: pool,
        config: config.clone(),
        posts: Arc::new(posts),
        recommender,
        started_at: Instant::now(),
    };

    let app = routes::app(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Broker events are best effort, so an unreachable broker downgrades to
/// logging instead of blocking startup.
async fn build_publisher(config: &Config) -> Arc<dyn EventPublisher> {
    let Some(url) = config.broker.url.as_deref() else {
        tracing::info!("No broker configured, post events will only be logged");
        return Arc::new(LogPublisher);
    };

    match NatsPublisher::connect(url).await {
        Ok(publisher) => {
            tracing::info!("Publishing post events to {}", url);
            Arc::new(publisher)
        }
        Err(e) => {
            tracing::warn!("Broker unavailable ({}), post events will only be logged", e);
            Arc::new(LogPublisher)
        }
    }
}

fn build_recommender(config: &Config) -> anyhow::Result<Arc<dyn Recommender>> {
    match config.recommender.url.as_deref() {
        Some(url) => {
            let timeout = Duration::from_secs(config.recommender.timeout_secs);
            tracing::info!("Recommendation service at {}", url);
            Ok(Arc::new(HttpRecommender::new(url, timeout)?))
        }
        None => {
            tracing::info!("No recommendation service configured");
            Ok(Arc::new(DisabledRecommender))
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
        tracing::info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                tracing::info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
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
}
