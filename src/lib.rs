/// 统一错误处理模块
pub mod error;

/// 配置模块
pub mod config;

/// 功能聚合模块
pub mod features;

/// 应用状态聚合模块
pub mod state;

/// 路由与中间件装配
pub mod app;

/// 访问日志中间件
pub mod access_log;

/// CORS 中间件构建
pub mod cors;

/// OpenAPI 文档
pub mod openapi;

/// 按路径限流
pub mod rate_limit;

/// request_id 中间件
pub mod request_id;

/// 优雅退出管理模块
pub mod shutdown;

// 导出常用类型供外部使用
pub use app::build_router;
pub use config::AppConfig;
pub use error::{AppError, PlaceholderError};
pub use shutdown::{ShutdownManager, ShutdownReason};
pub use state::AppState;
