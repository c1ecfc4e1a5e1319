use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{Level, debug, info, warn};
use tracing_subscriber::fmt::format::FmtSpan;

use letsmeet_core::{
    DatabasePool, MeetupConfig, MeetupCore, MeetupStore, MemoryStore,
    api::{ApiState, SecurityMiddlewareConfig, SecurityState, StaticTokenResolver, create_app},
};

#[tokio::main]
async fn main() -> Result<()> {
    let config = MeetupConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {:#}", e);
        eprintln!("Please check the LETSMEET_* environment variables.");
        e
    })?;

    init_logging(&config)?;

    info!("Starting letsmeet server");
    info!(
        host_min_score = config.trust.host_min_score,
        apply_min_score = config.trust.apply_min_score,
        initial_score = config.trust.initial_score,
        "Trust thresholds"
    );

    if config.database.postgres_enabled {
        let db = DatabasePool::new(
            &config.database.postgres_url,
            config.database.max_connections,
        )
        .await
        .context("Failed to connect to PostgreSQL")?;
        db.init_schema()
            .await
            .context("Failed to initialize database schema")?;
        serve(&config, Arc::new(db)).await
    } else {
        warn!("PostgreSQL disabled; using the in-memory store (data is lost on restart)");
        serve(&config, Arc::new(MemoryStore::new())).await
    }
}

async fn serve<S: MeetupStore>(config: &MeetupConfig, store: Arc<S>) -> Result<()> {
    let core = Arc::new(MeetupCore::new(store, config.trust.clone()));

    let security = SecurityState::new(
        SecurityMiddlewareConfig {
            rate_limit_per_minute: config.security.rate_limit_per_minute,
            max_request_size: config.security.max_request_size,
            log_requests: config.logging.log_requests,
            sanitize_logs: config.logging.sanitize_logs,
        },
        Arc::new(StaticTokenResolver::new(config.auth.tokens.clone())),
    );

    let limiter = Arc::clone(&security.rate_limiter);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(300));
        loop {
            interval.tick().await;
            limiter.cleanup();
            debug!(clients = limiter.tracked(), "Rate limiter pruned");
        }
    });

    let app = create_app(ApiState::new(core), security).layer(TraceLayer::new_for_http());

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;

    info!("letsmeet server listening on {}", bind_addr);
    info!(
        "Security middleware: Rate limit={}/min, Max body={}KB",
        config.security.rate_limit_per_minute,
        config.security.max_request_size / 1024
    );

    // Serve with connect info for client IP extraction
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

fn init_logging(config: &MeetupConfig) -> Result<()> {
    let log_level = match config.logging.level.to_lowercase().as_str() {
        "error" => Level::ERROR,
        "warn" => Level::WARN,
        "info" => Level::INFO,
        "debug" => Level::DEBUG,
        "trace" => Level::TRACE,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_span_events(if config.logging.log_requests {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        })
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))?;

    Ok(())
}
