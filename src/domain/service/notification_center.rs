//! 通知中心
//!
//! 保存通知记录并以快照模型对外订阅：每次变更（新增/删除/标记已读/清空）
//! 向订阅者推送完整通知列表（watch 通道），而不是增量 diff。

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use tokio::sync::{RwLock, watch};
use tracing::{debug, warn};

use crate::domain::model::{
    Notification, NotificationCategory, NotificationKind, NotificationPriority, NotifyOptions,
};
use crate::domain::repository::AlertPermissionGateway;
use crate::error::{CoreError, Result};

/// 通知中心
pub struct NotificationCenter {
    notifications: RwLock<Vec<Notification>>,
    /// 单调递增 id 源
    seq: AtomicU64,
    snapshot_tx: watch::Sender<Vec<Notification>>,
    permissions: Arc<dyn AlertPermissionGateway>,
}

impl NotificationCenter {
    pub fn new(permissions: Arc<dyn AlertPermissionGateway>) -> Self {
        let (snapshot_tx, _) = watch::channel(Vec::new());
        Self {
            notifications: RwLock::new(Vec::new()),
            seq: AtomicU64::new(1),
            snapshot_tx,
            permissions,
        }
    }

    /// 创建并存储一条通知
    pub async fn notify(
        &self,
        category: NotificationCategory,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
        options: NotifyOptions,
    ) -> Notification {
        let notification = Notification {
            id: self.seq.fetch_add(1, Ordering::SeqCst),
            category,
            kind,
            title: title.into(),
            message: message.into(),
            timestamp: Utc::now(),
            read: false,
            priority: options.priority.unwrap_or(NotificationPriority::Normal),
            action_url: options.action_url,
            action_text: options.action_text,
            vehicle_title: options.vehicle_title,
        };
        {
            let mut notifications = self.notifications.write().await;
            notifications.push(notification.clone());
            self.snapshot_tx.send_replace(notifications.clone());
        }
        debug!(id = notification.id, category = %category.as_str(), "notification created");
        notification
    }

    /// 订阅通知列表快照；每次变更都会收到完整列表
    pub fn subscribe(&self) -> watch::Receiver<Vec<Notification>> {
        self.snapshot_tx.subscribe()
    }

    /// 标记单条已读；幂等，绝不回退为未读
    pub async fn mark_as_read(&self, id: u64) -> Result<()> {
        let mut notifications = self.notifications.write().await;
        let notification = notifications
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| CoreError::not_found("notification", id.to_string()))?;
        notification.read = true;
        self.snapshot_tx.send_replace(notifications.clone());
        Ok(())
    }

    /// 全部标记已读；幂等
    pub async fn mark_all_read(&self) {
        let mut notifications = self.notifications.write().await;
        for notification in notifications.iter_mut() {
            notification.read = true;
        }
        self.snapshot_tx.send_replace(notifications.clone());
    }

    /// 删除单条通知
    pub async fn remove(&self, id: u64) -> Result<()> {
        let mut notifications = self.notifications.write().await;
        let len_before = notifications.len();
        notifications.retain(|n| n.id != id);
        if notifications.len() == len_before {
            return Err(CoreError::not_found("notification", id.to_string()));
        }
        self.snapshot_tx.send_replace(notifications.clone());
        Ok(())
    }

    /// 清空全部通知
    pub async fn clear(&self) {
        let mut notifications = self.notifications.write().await;
        notifications.clear();
        self.snapshot_tx.send_replace(Vec::new());
    }

    /// 当前通知列表（新到旧为插入顺序）
    pub async fn list(&self) -> Vec<Notification> {
        self.notifications.read().await.clone()
    }

    /// 未读条数；恒等于列表中 read == false 的条数
    pub async fn unread_count(&self) -> usize {
        self.notifications
            .read()
            .await
            .iter()
            .filter(|n| !n.read)
            .count()
    }

    /// 请求平台弹窗权限；网关错误按未授权处理
    pub async fn request_permission(&self) -> bool {
        match self.permissions.request_permission().await {
            Ok(granted) => granted,
            Err(err) => {
                warn!(error = %err, "permission request failed, treating as denied");
                false
            }
        }
    }
}
