//! 백테스트 오케스트레이터 API 서버.
//!
//! Axum 기반 REST API 서버를 시작합니다. 제출/스윕/조회 엔드포인트와
//! 백그라운드 워커 풀, 헬스 체크, Prometheus 메트릭을 제공합니다.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use quantbt_api::metrics::setup_metrics_recorder;
use quantbt_api::routes::create_api_router;
use quantbt_api::state::AppState;
use quantbt_core::{init_logging, AppConfig};
use quantbt_data::MarketDataGateway;
use quantbt_orchestrator::{Executor, SubmissionService, SweepService, WorkerPool};
use quantbt_queue::{JobQueue, MemoryJobQueue, RedisJobQueue};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load_default().unwrap_or_else(|e| {
        eprintln!("Failed to load config, using defaults: {}", e);
        AppConfig::default()
    });

    init_logging(&config.logging)?;

    let prometheus = setup_metrics_recorder();

    // 데이터베이스
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .acquire_timeout(Duration::from_secs(config.database.connect_timeout_secs))
        .connect(&config.database.url)
        .await?;
    quantbt_store::schema::init(&pool).await?;
    info!("Database connection established");

    // 디스패치 큐: Redis 우선, 실패 시 인메모리로 대체
    let (queue, redis_queue): (Arc<dyn JobQueue>, Option<RedisJobQueue>) =
        match RedisJobQueue::connect(&config.redis.url, config.redis.queue_key.clone()).await {
            Ok(redis) => (Arc::new(redis.clone()), Some(redis)),
            Err(e) => {
                warn!(
                    "Redis unavailable ({}), falling back to in-process queue. \
                     Jobs will not survive a restart.",
                    e
                );
                (Arc::new(MemoryJobQueue::new()), None)
            }
        };

    // 서비스 구성
    let gateway = Arc::new(MarketDataGateway::new(pool.clone(), &config.market_data));
    let sweeps = Arc::new(SweepService::new(pool.clone(), Arc::clone(&queue)));
    let executor = Arc::new(Executor::new(
        pool.clone(),
        Arc::clone(&queue),
        gateway,
        Arc::clone(&sweeps),
        config.retry.clone(),
    ));
    let submissions = Arc::new(SubmissionService::new(pool.clone(), Arc::clone(&queue)));

    // 워커 풀
    let worker_pool = if config.worker.enabled {
        Some(WorkerPool::start(
            Arc::clone(&queue),
            executor,
            &config.worker,
            config.retry.clone(),
        ))
    } else {
        info!("Background workers are disabled");
        None
    };

    // HTTP 서버
    let state = Arc::new(AppState::new(
        submissions,
        sweeps,
        pool.clone(),
        redis_queue,
    ));

    let app = create_api_router(state, prometheus)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(TimeoutLayer::new(Duration::from_secs(30)));

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("API server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // 워커가 진행 중인 잡을 마치도록 협력적으로 종료
    if let Some(worker_pool) = worker_pool {
        worker_pool.shutdown().await;
    }

    pool.close().await;
    info!("Server stopped");

    Ok(())
}

/// Ctrl-C 또는 SIGTERM에서 종료를 시작합니다.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl-C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => error!("Failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
