use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use session_store::{
    AppState, PgSessionStore, SessionOperation, SessionStore, config::Config, routes, spawn_sweeper,
};
use sqlx::Executor;
use sqlx::postgres::PgPoolOptions;
#[cfg(debug_assertions)]
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 加载配置
    let config = Config::from_env().expect("Failed to load configuration");

    // 设置数据库连接池
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                conn.execute("SET application_name = 'session_store';")
                    .await?;
                Ok(())
            })
        })
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to Postgres");

    // 会话存储，表结构在第一次访问时创建
    let table = Arc::new(SessionOperation::new(Arc::new(pool)));
    let store = Arc::new(PgSessionStore::new(
        table,
        config.store.clone(),
        config.cookie.clone(),
    ));

    match store.length().await {
        Some(count) => tracing::info!(count, "Session store ready"),
        None => tracing::warn!("Session store not ready yet, will retry on next access"),
    }

    // 定期清理过期会话
    let sweeper = spawn_sweeper(Arc::clone(&store), config.store.check_expiration_interval);

    let state = AppState { store };
    let router = routes::create_router(state, &config.api_base_uri);

    // 根据编译模式决定是否添加CORS
    #[cfg(debug_assertions)]
    let router = {
        tracing::debug!("Adding CORS layer for development mode");
        router.layer(CorsLayer::permissive())
    };

    let addr = SocketAddr::new(
        config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        config.server_port,
    );
    tracing::info!("Server listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        router,
    )
    .with_graceful_shutdown(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
        }
    })
    .await
    .expect("Failed to start server");

    sweeper.stop();
    tracing::info!("Session store stopped");
}
