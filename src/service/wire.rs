//! Wire 风格的依赖注入模块
//!
//! 按依赖顺序构建全部服务并返回应用上下文。各存储是显式构造、
//! 按引用传递的服务对象，不存在环境全局量。

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::CoreConfig;
use crate::domain::repository::{
    AlertPermissionGateway, KeyValueStore, ListingDirectory, TestDriveSender,
};
use crate::domain::service::{
    MessageStore, NotificationCenter, NotificationFanout, RealtimeHub, TestDriveService,
    TypingTracker,
};
use crate::infrastructure::permission::StaticPermissionGateway;
use crate::infrastructure::persistence::{JsonFileStore, MemoryKeyValueStore};
use crate::infrastructure::sender::{SimulatedSender, WebhookSender};

/// 应用上下文 - 包含所有已初始化的服务
pub struct ApplicationContext {
    pub config: CoreConfig,
    pub hub: Arc<RealtimeHub>,
    pub messages: Arc<MessageStore>,
    pub typing: Arc<TypingTracker>,
    pub test_drives: Arc<TestDriveService>,
    pub notifications: Arc<NotificationCenter>,
    /// 通知扇出消费任务
    pub fanout_task: JoinHandle<()>,
}

impl ApplicationContext {
    /// 注册一个用户连接并同步在线状态
    pub async fn connect_user(&self, user_id: &str, thread_id: Option<&str>) -> String {
        let connection_id = self.hub.connect(user_id, thread_id);
        self.typing.mark_online(user_id).await;
        connection_id
    }

    /// 注销连接；该用户的最后一个连接断开时标记下线
    pub async fn disconnect_user(&self, connection_id: &str, user_id: &str) {
        self.hub.disconnect(connection_id);
        if self.hub.connections_for_user(user_id) == 0 {
            self.typing.mark_offline(user_id).await;
        }
    }
}

/// 构建应用上下文（按配置选择持久化与发送实现）
pub async fn initialize(
    config: CoreConfig,
    listings: Arc<dyn ListingDirectory>,
) -> Result<ApplicationContext> {
    let store: Arc<dyn KeyValueStore> = match &config.storage_dir {
        Some(dir) => Arc::new(JsonFileStore::new(dir)?),
        None => Arc::new(MemoryKeyValueStore::new()),
    };

    let sender: Arc<dyn TestDriveSender> = match &config.send_endpoint {
        Some(endpoint) => Arc::new(WebhookSender::new(endpoint.clone())),
        None => Arc::new(SimulatedSender::new(config.simulated_send_delay_ms, 0.0)),
    };

    let permissions: Arc<dyn AlertPermissionGateway> = Arc::new(StaticPermissionGateway::granted());

    initialize_with(config, listings, sender, store, permissions).await
}

/// 构建应用上下文（协作者由调用方显式注入）
pub async fn initialize_with(
    config: CoreConfig,
    listings: Arc<dyn ListingDirectory>,
    sender: Arc<dyn TestDriveSender>,
    store: Arc<dyn KeyValueStore>,
    permissions: Arc<dyn AlertPermissionGateway>,
) -> Result<ApplicationContext> {
    // 1. 事件总线
    let hub = Arc::new(RealtimeHub::new(config.event_buffer));

    // 2. 通知中心 + 扇出消费者（订阅总线旁路）
    let notifications = Arc::new(NotificationCenter::new(permissions));
    let fanout = NotificationFanout::new(Arc::clone(&notifications));
    let fanout_task = fanout.spawn(hub.tap());

    // 3. 消息存储
    let messages = Arc::new(MessageStore::new(listings, Arc::clone(&hub)));

    // 4. 输入/在线状态跟踪
    let typing = TypingTracker::new(
        Duration::from_millis(config.typing_ttl_ms),
        Arc::clone(&hub),
    );

    // 5. 试驾预约服务，并恢复上一会话的数据
    let test_drives = Arc::new(TestDriveService::new(sender, store, Arc::clone(&hub)));
    test_drives.load().await;

    info!("messaging core initialized");
    Ok(ApplicationContext {
        config,
        hub,
        messages,
        typing,
        test_drives,
        notifications,
        fanout_task,
    })
}
