//! Goods service entry point: HTTP API plus the outbox and analytics relays.

use std::error::Error;
use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use goods_api::config::Config;
use goods_api::error::AppError;
use goods_api::state::AppState;
use goods_cache::redis_cache::RedisGoodsListCache;
use goods_catalog::application::service::GoodsService;
use goods_relay::backoff::Backoff;
use goods_relay::clickhouse_sink::ClickHouseLogSink;
use goods_relay::jetstream::{self, NatsBatchSource, NatsEventPublisher};
use goods_relay::outbox_relay::OutboxRelay;
use goods_relay::sync_loop::{RelayConfig, RelaySyncLoop};
use goods_store::pg_good_repository::PgGoodRepository;

const OUTBOX_POLL_INTERVAL: Duration = Duration::from_millis(500);
const PULL_TIMEOUT: Duration = Duration::from_secs(5);

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(std::env::var("LOG_LEVEL").unwrap_or_default()))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .json()
        .init();

    info!("Starting goods service");

    let config = Config::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.pool.max_connections)
        .min_connections(config.pool.min_connections)
        .idle_timeout(config.pool.idle_timeout)
        .max_lifetime(config.pool.max_lifetime)
        .connect(&config.database_url)
        .await
        .map_err(AppError::Database)?;
    sqlx::migrate!("../../migrations")
        .run(&pool)
        .await
        .map_err(AppError::Migration)?;

    let connection = RedisGoodsListCache::connect(&config.redis_url)
        .await
        .map_err(AppError::Cache)?;
    let cache = Arc::new(RedisGoodsListCache::new(connection));

    let bus = jetstream::connect(&config.nats_url)
        .await
        .map_err(AppError::Bus)?;
    let consumer = jetstream::durable_consumer(&bus)
        .await
        .map_err(AppError::Bus)?;

    let sink = ClickHouseLogSink::new(&config.clickhouse_url);
    sink.ensure_table().await.map_err(AppError::Sink)?;

    let repository = Arc::new(PgGoodRepository::new(pool.clone()));
    let shutdown = CancellationToken::new();

    let outbox_relay = OutboxRelay::new(
        repository.clone(),
        Arc::new(NatsEventPublisher::new(bus)),
        i64::try_from(config.relay_batch_size.get()).unwrap_or(i64::MAX),
        OUTBOX_POLL_INTERVAL,
        Backoff::default(),
    );
    let outbox_task = tokio::spawn(outbox_relay.run(shutdown.clone()));

    let sync_loop = RelaySyncLoop::new(
        Arc::new(NatsBatchSource::new(consumer, PULL_TIMEOUT)),
        Arc::new(sink),
        RelayConfig {
            batch_size: config.relay_batch_size.get(),
            ..RelayConfig::default()
        },
    );
    let sync_task = tokio::spawn(sync_loop.run(shutdown.clone()));

    let app_state = AppState::new(GoodsService::new(repository, cache));
    let app = goods_api::build_router(app_state).layer(TraceLayer::new_for_http());

    let addr = config.bind_addr()?;
    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(AppError::Server)?;

    tokio::spawn(shutdown_signal(shutdown.clone()));

    let drained = shutdown.clone();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move { drained.cancelled().await })
        .into_future();
    let grace = config.shutdown_grace;

    tokio::select! {
        result = server => result.map_err(AppError::Server)?,
        () = async {
            shutdown.cancelled().await;
            tokio::time::sleep(grace).await;
        } => warn!(?grace, "grace period elapsed, dropping in-flight requests"),
    }
    // The server may also stop on its own; the relays must follow it.
    shutdown.cancel();

    let (outbox_result, sync_result) = tokio::join!(outbox_task, sync_task);
    if let Err(err) = outbox_result {
        warn!(error = %err, "outbox relay task failed");
    }
    match sync_result {
        Ok(stats) => info!(?stats, "relay sync loop finished"),
        Err(err) => warn!(error = %err, "relay sync loop task failed"),
    }

    pool.close().await;
    info!("Goods service stopped");

    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = %err, "failed to install Ctrl+C handler");
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
                warn!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C signal, shutting down gracefully"),
        () = terminate => info!("Received SIGTERM signal, shutting down gracefully"),
    }

    shutdown.cancel();
}
