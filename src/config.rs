//! 核心运行时配置
//!
//! 与路由服务一致，配置项通过环境变量读取并带默认值；
//! 不依赖全局配置单例，由调用方构建后显式传入 wire。

use std::env;
use std::path::PathBuf;

/// 消息核心配置
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// 输入状态（typing）过期时间，毫秒（默认 3000）
    pub typing_ttl_ms: u64,
    /// 事件总线 tap 广播缓冲区大小（默认 256）
    pub event_buffer: usize,
    /// 持久化目录；为 None 时使用纯内存 KV 存储
    pub storage_dir: Option<PathBuf>,
    /// 预约发送 webhook 端点；为 None 时使用模拟发送器
    pub send_endpoint: Option<String>,
    /// 模拟发送延迟，毫秒（默认 100）
    pub simulated_send_delay_ms: u64,
}

impl CoreConfig {
    /// 从环境变量加载
    pub fn from_env() -> Self {
        Self {
            typing_ttl_ms: env::var("KURUMA_TYPING_TTL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            event_buffer: env::var("KURUMA_EVENT_BUFFER")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(256),
            storage_dir: env::var("KURUMA_STORAGE_DIR").ok().map(PathBuf::from),
            send_endpoint: env::var("KURUMA_SEND_ENDPOINT")
                .ok()
                .filter(|v| !v.is_empty()),
            simulated_send_delay_ms: env::var("KURUMA_SEND_DELAY_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(100),
        }
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            typing_ttl_ms: 3000,
            event_buffer: 256,
            storage_dir: None,
            send_endpoint: None,
            simulated_send_delay_ms: 100,
        }
    }
}
