//! 主应用程序入口
//!
//! 启动 Axum Web API 服务。

use std::sync::Arc;

use application::{ChatService, ChatServiceDependencies, SystemClock};
use infrastructure::{
    create_pg_pool, PgChatRepository, PgMessageRepository, PgParticipantRepository,
    PgUserDirectory,
};
use tracing_subscriber::EnvFilter;
use web_api::{router, AppState, ChatHub, JwtService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let app_config = config::AppConfig::from_env();

    let pg_pool = create_pg_pool(
        &app_config.database.url,
        app_config.database.max_connections,
    )
    .await?;

    // 运行迁移
    sqlx::migrate!("../../migrations").run(&pg_pool).await?;

    let chat_service = ChatService::new(ChatServiceDependencies {
        chat_repository: Arc::new(PgChatRepository::new(pg_pool.clone())),
        participant_repository: Arc::new(PgParticipantRepository::new(pg_pool.clone())),
        message_repository: Arc::new(PgMessageRepository::new(pg_pool.clone())),
        user_directory: Arc::new(PgUserDirectory::new(pg_pool)),
        clock: Arc::new(SystemClock),
    });

    let jwt_service = Arc::new(JwtService::new(app_config.jwt.clone()));
    let hub = Arc::new(ChatHub::new());

    let state = AppState::new(Arc::new(chat_service), hub, jwt_service);

    let app = router(state);
    let listener = tokio::net::TcpListener::bind(app_config.server_addr()).await?;

    tracing::info!("聊天服务器启动在 http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// 停机信号：停止接受新连接，已有连接随流关闭而结束。
async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        return;
    }
    tracing::info!("收到停机信号，开始优雅退出");
}
