use std::net::SocketAddr;

use placeholder_api::features::image;
use placeholder_api::{AppState, ShutdownManager, build_router, config::AppConfig};

fn init_tracing(config: &AppConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "placeholder_api={},tower_http=info",
            config.logging.level
        )
        .into()
    });
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match config.logging.format.as_str() {
        "json" => builder.json().init(),
        "compact" => builder.compact().init(),
        _ => builder.init(),
    }
}

fn log_banner(config: &AppConfig) {
    let base = format!("http://{}{}", config.server_addr(), config.api.prefix);
    tracing::info!("占位图服务已启动: http://{}", config.server_addr());
    tracing::info!("Docs: http://{}/docs", config.server_addr());
    tracing::info!("Health: http://{}/health", config.server_addr());
    tracing::info!("示例:");
    for example in [
        "/placeholder/300x200",
        "/placeholder/400x300.png",
        "/placeholder/300x200.jpg",
        "/placeholder/250x150.gif",
        "/placeholder/500x300.webp",
        "/placeholder/400x200?bg=ff0000&fg=ffffff",
        "/placeholder/300x300?bg=1e1e1e&fg=00ff00",
        "/placeholder/400x250?text=Logo",
        "/placeholder/600x400.jpg?bg=2c3e50&fg=ecf0f1&text=Hello+World",
    ] {
        tracing::info!("  • {}{}", base, example);
    }
}

#[tokio::main]
async fn main() {
    // 配置先于日志加载，日志级别与格式取自配置
    let config_result = AppConfig::init_global();
    let config = AppConfig::global();
    init_tracing(config);
    if let Err(e) = config_result {
        tracing::error!("配置加载失败: {}", e);
        std::process::exit(1);
    }

    let shutdown_manager = ShutdownManager::new();
    if let Err(e) = shutdown_manager.start_signal_handler() {
        tracing::error!("信号处理器启动失败: {}", e);
        std::process::exit(1);
    }

    // 字体不可用时任何请求都无法成功，直接拒绝启动
    match tokio::task::spawn_blocking(image::prewarm_font).await {
        Ok(Ok(name)) => tracing::info!("内嵌字体 {} 已加载", name),
        Ok(Err(e)) => {
            tracing::error!("内嵌字体加载失败: {}", e);
            std::process::exit(1);
        }
        Err(e) => {
            tracing::error!("字体预热任务异常: {}", e);
            std::process::exit(1);
        }
    }

    let state = AppState::from_config(&config.image);
    tracing::info!(
        cache_enabled = config.image.cache_enabled,
        cache_capacity = config.image.cache_capacity,
        cache_ttl_secs = config.image.cache_ttl_secs,
        font_pool_size = config.image.font_pool_size,
        max_parallel = config.image.effective_parallelism(),
        "图片生成服务已初始化"
    );
    let app = build_router(config, state);

    let addr = config.server_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("绑定地址失败 {}: {}", addr, e);
            std::process::exit(1);
        });

    log_banner(config);

    let shutdown_timeout = config.shutdown.timeout_duration();
    let manager = shutdown_manager.clone();
    let shutdown_signal = async move {
        let reason = manager.wait_for_shutdown().await;
        tracing::info!("接收到退出信号: {:?}，开始优雅关闭HTTP服务器...", reason);
    };

    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal);

    // 收到退出信号后，给在途请求最多 timeout_secs 完成
    let drained = async {
        shutdown_manager.wait_for_shutdown().await;
        tokio::time::sleep(shutdown_timeout).await;
    };

    tokio::select! {
        res = server => {
            if let Err(e) = res {
                tracing::error!("服务器运行错误: {}", e);
                std::process::exit(1);
            }
            tracing::info!("服务器已优雅关闭");
        }
        _ = drained => {
            tracing::warn!("优雅退出超时（{}秒），强制退出", config.shutdown.timeout_secs);
        }
    }
}
