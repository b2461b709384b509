//! 通知扇出
//!
//! 消费事件总线的全量旁路，把消息/试驾事件物化为用户可见的通知记录。
//! typing、在线状态、已读回执不产生通知。

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::domain::model::{
    NotificationCategory, NotificationKind, NotificationPriority, NotifyOptions, RealtimeEvent,
    RealtimePayload,
};
use crate::domain::service::notification_center::NotificationCenter;

const PREVIEW_MAX_CHARS: usize = 80;

/// 通知扇出服务
pub struct NotificationFanout {
    center: Arc<NotificationCenter>,
}

impl NotificationFanout {
    pub fn new(center: Arc<NotificationCenter>) -> Arc<Self> {
        Arc::new(Self { center })
    }

    /// 把单个事件物化为通知（无需通知的事件是空操作）
    pub async fn handle_event(&self, event: &RealtimeEvent) {
        match &event.payload {
            RealtimePayload::Message { message } => {
                let preview: String = message.content.chars().take(PREVIEW_MAX_CHARS).collect();
                self.center
                    .notify(
                        NotificationCategory::Message,
                        NotificationKind::Info,
                        "New message",
                        format!("{}: {}", message.sender_name, preview),
                        NotifyOptions {
                            action_url: Some(format!("/messages/{}", message.thread_id)),
                            action_text: Some("Open conversation".to_string()),
                            ..NotifyOptions::default()
                        },
                    )
                    .await;
            }
            RealtimePayload::TestDrive {
                request_id,
                phase,
                vehicle_title,
                detail,
            } => {
                let Some((kind, priority, title)) = test_drive_mapping(phase) else {
                    return;
                };
                self.center
                    .notify(
                        NotificationCategory::TestDrive,
                        kind,
                        title,
                        detail
                            .clone()
                            .unwrap_or_else(|| format!("Test drive request for {vehicle_title}")),
                        NotifyOptions {
                            priority: Some(priority),
                            action_url: Some(format!("/test-drives/{request_id}")),
                            action_text: Some("View request".to_string()),
                            vehicle_title: Some(vehicle_title.clone()),
                        },
                    )
                    .await;
            }
            // 瞬态事件不物化
            RealtimePayload::Typing { .. }
            | RealtimePayload::Presence { .. }
            | RealtimePayload::Read { .. } => {}
        }
    }

    /// 启动消费任务，从总线旁路持续物化通知
    pub fn spawn(self: &Arc<Self>, mut tap: broadcast::Receiver<RealtimeEvent>) -> JoinHandle<()> {
        let fanout = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match tap.recv().await {
                    Ok(event) => fanout.handle_event(&event).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "notification fanout lagged, events skipped");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("event tap closed, fanout stopping");
                        break;
                    }
                }
            }
        })
    }
}

/// 试驾状态 -> 通知(级别, 优先级, 标题)；发送中不产生通知
fn test_drive_mapping(
    phase: &str,
) -> Option<(NotificationKind, NotificationPriority, &'static str)> {
    match phase {
        "draft" => Some((
            NotificationKind::Info,
            NotificationPriority::Low,
            "Test drive request queued",
        )),
        "sent" => Some((
            NotificationKind::Success,
            NotificationPriority::Normal,
            "Test drive request sent",
        )),
        "failed" => Some((
            NotificationKind::Error,
            NotificationPriority::High,
            "Test drive request failed",
        )),
        "confirmed" => Some((
            NotificationKind::Success,
            NotificationPriority::High,
            "Test drive confirmed",
        )),
        "cancelled" => Some((
            NotificationKind::Warning,
            NotificationPriority::Normal,
            "Test drive declined",
        )),
        "completed" => Some((
            NotificationKind::Info,
            NotificationPriority::Low,
            "Test drive completed",
        )),
        _ => None,
    }
}
