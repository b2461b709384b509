//! 会话线程与消息领域模型
//!
//! 线程是 买家-卖家-车辆 三元组上的一次对话。消息按插入顺序追加，
//! 插入顺序是唯一的排序权威（时间戳仅作展示，不参与排序）。

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 参与者角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantRole {
    Buyer,
    Seller,
    Support,
}

impl ParticipantRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipantRole::Buyer => "buyer",
            ParticipantRole::Seller => "seller",
            ParticipantRole::Support => "support",
        }
    }
}

/// 线程参与者
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    pub name: String,
    pub role: ParticipantRole,
    pub avatar_url: Option<String>,
}

/// 调用方身份（UI 会话中的当前用户）
#[derive(Debug, Clone)]
pub struct SenderContext {
    pub user_id: String,
    pub name: String,
    pub role: ParticipantRole,
}

impl SenderContext {
    pub fn new(user_id: impl Into<String>, name: impl Into<String>, role: ParticipantRole) -> Self {
        Self {
            user_id: user_id.into(),
            name: name.into(),
            role,
        }
    }

    fn as_participant(&self) -> Participant {
        Participant {
            id: self.user_id.clone(),
            name: self.name.clone(),
            role: self.role,
            avatar_url: None,
        }
    }
}

/// 消息类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    System,
}

/// 消息投递状态
///
/// 状态只能沿 Sending -> Sent -> Delivered -> Read 单调推进；
/// Failed 是发送失败的旁路状态，不参与推进链。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Sending,
    Sent,
    Delivered,
    Read,
    Failed,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Sending => "sending",
            MessageStatus::Sent => "sent",
            MessageStatus::Delivered => "delivered",
            MessageStatus::Read => "read",
            MessageStatus::Failed => "failed",
        }
    }

    /// 推进链中的序号；Failed 不在链上
    fn rank(&self) -> Option<u8> {
        match self {
            MessageStatus::Sending => Some(0),
            MessageStatus::Sent => Some(1),
            MessageStatus::Delivered => Some(2),
            MessageStatus::Read => Some(3),
            MessageStatus::Failed => None,
        }
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 消息附件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub file_name: String,
    pub mime_type: String,
    pub url: String,
}

/// 线程内的一条消息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadMessage {
    pub id: String,
    /// 所属线程（仅反向引用，不构成所有权）
    pub thread_id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub sender_role: ParticipantRole,
    pub content: String,
    pub kind: MessageKind,
    pub attachments: Vec<Attachment>,
    pub timestamp: DateTime<Utc>,
    pub status: MessageStatus,
    /// 已读用户集合，恒包含发送者本人
    pub read_by: BTreeSet<String>,
}

impl ThreadMessage {
    pub fn new_text(
        thread_id: &str,
        sender: &SenderContext,
        content: impl Into<String>,
    ) -> Self {
        let mut read_by = BTreeSet::new();
        read_by.insert(sender.user_id.clone());
        Self {
            id: ulid::Ulid::new().to_string(),
            thread_id: thread_id.to_string(),
            sender_id: sender.user_id.clone(),
            sender_name: sender.name.clone(),
            sender_role: sender.role,
            content: content.into(),
            kind: MessageKind::Text,
            attachments: Vec::new(),
            timestamp: Utc::now(),
            status: MessageStatus::Sent,
            read_by,
        }
    }

    /// 系统消息（发送方固定为 "system"，已读集合预置该占位发送者）
    pub fn new_system(thread_id: &str, content: impl Into<String>) -> Self {
        let mut read_by = BTreeSet::new();
        read_by.insert("system".to_string());
        Self {
            id: ulid::Ulid::new().to_string(),
            thread_id: thread_id.to_string(),
            sender_id: "system".to_string(),
            sender_name: "system".to_string(),
            sender_role: ParticipantRole::Support,
            content: content.into(),
            kind: MessageKind::System,
            attachments: Vec::new(),
            timestamp: Utc::now(),
            status: MessageStatus::Sent,
            read_by,
        }
    }

    /// 单调推进投递状态；逆向或下链（Failed）推进被忽略
    pub fn promote(&mut self, next: MessageStatus) {
        if let (Some(current), Some(candidate)) = (self.status.rank(), next.rank()) {
            if candidate > current {
                self.status = next;
            }
        }
    }
}

/// 线程生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadStatus {
    Active,
    Archived,
}

impl ThreadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThreadStatus::Active => "active",
            ThreadStatus::Archived => "archived",
        }
    }
}

/// 线程优先级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadPriority {
    Low,
    Normal,
    High,
    Urgent,
}

impl ThreadPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThreadPriority::Low => "low",
            ThreadPriority::Normal => "normal",
            ThreadPriority::High => "high",
            ThreadPriority::Urgent => "urgent",
        }
    }
}

/// 线程查询过滤器（提供的字段以 AND 组合）
#[derive(Debug, Clone, Default)]
pub struct ThreadFilter {
    pub status: Option<ThreadStatus>,
    pub priority: Option<ThreadPriority>,
}

impl ThreadFilter {
    pub fn matches(&self, thread: &MessageThread) -> bool {
        if let Some(status) = self.status {
            if thread.status != status {
                return false;
            }
        }
        if let Some(priority) = self.priority {
            if thread.priority != priority {
                return false;
            }
        }
        true
    }
}

/// 会话线程聚合根
///
/// 不变式：
/// - `last_activity` 等于最后一条消息的时间戳
/// - 每个参与者的未读计数非负（u32），发送者自己的未读不随自己发送增长
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageThread {
    pub id: String,
    pub vehicle_id: String,
    pub vehicle_title: String,
    pub subject: String,
    /// 参与者，有序（创建者在前）
    pub participants: Vec<Participant>,
    /// 消息，追加顺序即时间顺序
    pub messages: Vec<ThreadMessage>,
    /// 每参与者未读游标（user_id -> 未读条数）
    pub unread: HashMap<String, u32>,
    pub status: ThreadStatus,
    pub priority: ThreadPriority,
    pub tags: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl MessageThread {
    pub fn new(
        vehicle_id: impl Into<String>,
        vehicle_title: impl Into<String>,
        subject: impl Into<String>,
        creator: &SenderContext,
        seller: Participant,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: ulid::Ulid::new().to_string(),
            vehicle_id: vehicle_id.into(),
            vehicle_title: vehicle_title.into(),
            subject: subject.into(),
            participants: vec![creator.as_participant(), seller],
            messages: Vec::new(),
            unread: HashMap::new(),
            status: ThreadStatus::Active,
            priority: ThreadPriority::Normal,
            tags: BTreeSet::new(),
            created_at: now,
            last_activity: now,
        }
    }

    pub fn is_participant(&self, user_id: &str) -> bool {
        self.participants.iter().any(|p| p.id == user_id)
    }

    /// 指定用户视角的未读条数
    pub fn unread_count_for(&self, user_id: &str) -> u32 {
        self.unread.get(user_id).copied().unwrap_or(0)
    }

    /// 追加消息并维护 last_activity / 未读游标（单次调用内全部完成）
    pub fn append(&mut self, message: ThreadMessage) {
        self.last_activity = message.timestamp;
        if message.kind == MessageKind::Text {
            for participant in &self.participants {
                if participant.id != message.sender_id {
                    *self.unread.entry(participant.id.clone()).or_insert(0) += 1;
                }
            }
        }
        self.messages.push(message);
    }

    /// 将线程对 reader 标记为已读
    ///
    /// 未读游标清零，并把 reader 写入每条消息的 read_by；
    /// 一旦 read_by 超过发送者本人，消息状态推进为 Read（不可回退）。
    pub fn mark_read_by(&mut self, reader_id: &str) {
        self.unread.insert(reader_id.to_string(), 0);
        for message in &mut self.messages {
            message.read_by.insert(reader_id.to_string());
            if message.read_by.len() > 1 {
                message.promote(MessageStatus::Read);
            }
        }
    }

    /// 大小写不敏感的子串匹配：车辆标题、主题、参与者姓名
    pub fn matches_query(&self, needle_lower: &str) -> bool {
        if needle_lower.is_empty() {
            return true;
        }
        self.vehicle_title.to_lowercase().contains(needle_lower)
            || self.subject.to_lowercase().contains(needle_lower)
            || self
                .participants
                .iter()
                .any(|p| p.name.to_lowercase().contains(needle_lower))
    }
}
