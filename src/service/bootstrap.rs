//! 应用启动辅助

use tracing_subscriber::EnvFilter;

/// 初始化结构化日志（重复调用是空操作）
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
