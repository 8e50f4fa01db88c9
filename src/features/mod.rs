/// 健康检查
pub mod health;

/// 占位图生成（校验、字体、排版、渲染、编码、缓存与 HTTP 入口）
pub mod image;
