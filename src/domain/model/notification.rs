//! 用户通知领域模型
//!
//! 通知由事件扇出物化而来，read 标记单调（false -> true，不可回退）。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 通知业务分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationCategory {
    Message,
    TestDrive,
    Listing,
    Payment,
    System,
}

impl NotificationCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationCategory::Message => "message",
            NotificationCategory::TestDrive => "test_drive",
            NotificationCategory::Listing => "listing",
            NotificationCategory::Payment => "payment",
            NotificationCategory::System => "system",
        }
    }
}

/// 通知展示级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Success,
    Warning,
    Error,
    Info,
}

/// 通知优先级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPriority {
    Low,
    Normal,
    High,
}

/// 通知记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    /// 单调递增的唯一 id
    pub id: u64,
    pub category: NotificationCategory,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub read: bool,
    pub priority: NotificationPriority,
    pub action_url: Option<String>,
    pub action_text: Option<String>,
    pub vehicle_title: Option<String>,
}

/// notify 调用的可选字段
#[derive(Debug, Clone, Default)]
pub struct NotifyOptions {
    pub priority: Option<NotificationPriority>,
    pub action_url: Option<String>,
    pub action_text: Option<String>,
    pub vehicle_title: Option<String>,
}
