//! 实时事件总线
//!
//! 进程内模拟推送通道：逻辑连接 + 按线程兴趣路由 + 每连接 FIFO 投递。
//! 连接订阅以 mpsc 通道呈现（丢弃接收端即退订），真实传输层
//! （WebSocket/SSE）可在不改动各存储逻辑的情况下替换这里。
//!
//! 投递语义：at-most-once；连接不存在期间的事件对该连接直接丢失。

use dashmap::DashMap;
use tokio::sync::{broadcast, mpsc};
use tracing::debug;

use crate::domain::model::RealtimeEvent;
use crate::error::{CoreError, Result};

struct Connection {
    user_id: String,
    /// 当前关注的线程；None 表示全局监听
    thread_id: Option<String>,
    sender: Option<mpsc::UnboundedSender<RealtimeEvent>>,
}

impl Connection {
    /// 连接是否对事件感兴趣：同线程事件，或全局事件
    fn interested_in(&self, event: &RealtimeEvent) -> bool {
        match (&event.thread_id, &self.thread_id) {
            (None, _) => true,
            (Some(_), None) => true,
            (Some(event_thread), Some(own_thread)) => event_thread == own_thread,
        }
    }
}

/// 实时事件总线
pub struct RealtimeHub {
    connections: DashMap<String, Connection>,
    /// 全量事件旁路（通知扇出等进程内消费者使用）
    tap: broadcast::Sender<RealtimeEvent>,
}

impl RealtimeHub {
    pub fn new(event_buffer: usize) -> Self {
        let (tap, _) = broadcast::channel(event_buffer.max(1));
        Self {
            connections: DashMap::new(),
            tap,
        }
    }

    /// 注册逻辑连接，返回不透明连接 id
    pub fn connect(&self, user_id: &str, thread_id: Option<&str>) -> String {
        let connection_id = uuid::Uuid::new_v4().to_string();
        self.connections.insert(
            connection_id.clone(),
            Connection {
                user_id: user_id.to_string(),
                thread_id: thread_id.map(str::to_string),
                sender: None,
            },
        );
        debug!(connection_id = %connection_id, user_id = %user_id, "connection registered");
        connection_id
    }

    /// 订阅连接的事件流；重复订阅会重绑通道（旧接收端随即失效）
    pub fn subscribe(&self, connection_id: &str) -> Result<mpsc::UnboundedReceiver<RealtimeEvent>> {
        let mut connection = self
            .connections
            .get_mut(connection_id)
            .ok_or_else(|| CoreError::not_found("connection", connection_id))?;
        let (sender, receiver) = mpsc::unbounded_channel();
        connection.sender = Some(sender);
        Ok(receiver)
    }

    /// 注销连接；重复调用是无害的空操作
    pub fn disconnect(&self, connection_id: &str) {
        if self.connections.remove(connection_id).is_some() {
            debug!(connection_id = %connection_id, "connection removed");
        }
    }

    /// 向所有感兴趣的活跃连接投递事件（每连接按发布顺序 FIFO）
    pub fn publish(&self, event: RealtimeEvent) {
        for mut entry in self.connections.iter_mut() {
            let connection = entry.value_mut();
            if !connection.interested_in(&event) {
                continue;
            }
            if let Some(sender) = &connection.sender {
                if sender.send(event.clone()).is_err() {
                    // 接收端已丢弃，视为退订
                    connection.sender = None;
                }
            }
        }
        // 无消费者时 send 返回错误，直接忽略
        let _ = self.tap.send(event);
    }

    /// 订阅全量事件旁路
    pub fn tap(&self) -> broadcast::Receiver<RealtimeEvent> {
        self.tap.subscribe()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// 某用户当前的活跃连接数
    pub fn connections_for_user(&self, user_id: &str) -> usize {
        self.connections
            .iter()
            .filter(|entry| entry.value().user_id == user_id)
            .count()
    }
}
