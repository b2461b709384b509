//! 实时事件信封
//!
//! 总线上投递的事件统一为 kind + 可选线程范围 + 用户 + 类型化载荷 + 时间戳。
//! 无线程范围的事件（在线状态等）对所有连接可见。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::thread::ThreadMessage;

/// 事件种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RealtimeEventKind {
    NewMessage,
    MessageRead,
    UserTyping,
    PresenceChanged,
    TestDriveUpdated,
}

impl RealtimeEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RealtimeEventKind::NewMessage => "new_message",
            RealtimeEventKind::MessageRead => "message_read",
            RealtimeEventKind::UserTyping => "user_typing",
            RealtimeEventKind::PresenceChanged => "presence_changed",
            RealtimeEventKind::TestDriveUpdated => "test_drive_updated",
        }
    }
}

/// 类型化事件载荷
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "payload", rename_all = "snake_case")]
pub enum RealtimePayload {
    Message { message: ThreadMessage },
    Read { reader_id: String },
    Typing { is_typing: bool },
    Presence { online: bool },
    TestDrive {
        request_id: String,
        phase: String,
        vehicle_title: String,
        detail: Option<String>,
    },
}

/// 实时事件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeEvent {
    pub kind: RealtimeEventKind,
    /// 事件所属线程；None 表示全局事件
    pub thread_id: Option<String>,
    /// 触发事件的用户
    pub user_id: String,
    pub payload: RealtimePayload,
    pub timestamp: DateTime<Utc>,
}

impl RealtimeEvent {
    pub fn new_message(message: ThreadMessage) -> Self {
        Self {
            kind: RealtimeEventKind::NewMessage,
            thread_id: Some(message.thread_id.clone()),
            user_id: message.sender_id.clone(),
            timestamp: Utc::now(),
            payload: RealtimePayload::Message { message },
        }
    }

    pub fn message_read(thread_id: &str, reader_id: &str) -> Self {
        Self {
            kind: RealtimeEventKind::MessageRead,
            thread_id: Some(thread_id.to_string()),
            user_id: reader_id.to_string(),
            timestamp: Utc::now(),
            payload: RealtimePayload::Read {
                reader_id: reader_id.to_string(),
            },
        }
    }

    pub fn user_typing(thread_id: &str, user_id: &str, is_typing: bool) -> Self {
        Self {
            kind: RealtimeEventKind::UserTyping,
            thread_id: Some(thread_id.to_string()),
            user_id: user_id.to_string(),
            timestamp: Utc::now(),
            payload: RealtimePayload::Typing { is_typing },
        }
    }

    pub fn presence_changed(user_id: &str, online: bool) -> Self {
        Self {
            kind: RealtimeEventKind::PresenceChanged,
            thread_id: None,
            user_id: user_id.to_string(),
            timestamp: Utc::now(),
            payload: RealtimePayload::Presence { online },
        }
    }

    pub fn test_drive_updated(
        request_id: &str,
        buyer_email: &str,
        phase: &str,
        vehicle_title: &str,
        detail: Option<String>,
    ) -> Self {
        Self {
            kind: RealtimeEventKind::TestDriveUpdated,
            thread_id: None,
            user_id: buyer_email.to_string(),
            timestamp: Utc::now(),
            payload: RealtimePayload::TestDrive {
                request_id: request_id.to_string(),
                phase: phase.to_string(),
                vehicle_title: vehicle_title.to_string(),
                detail,
            },
        }
    }
}
