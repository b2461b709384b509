//! 输入状态与在线状态跟踪
//!
//! typing 条目是纯瞬态数据：带 TTL（默认 3 秒），超时或显式 stop 时清除。
//! 刷新（窗口内重复 start）不重复发事件；每次 start 都安排一个到期任务，
//! 任务仅在自己的 generation 仍是当前值时生效，过期任务自然失效。

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

use crate::domain::model::RealtimeEvent;
use crate::domain::service::realtime_hub::RealtimeHub;

#[derive(Debug, Clone, Copy)]
struct TypingEntry {
    expires_at: Instant,
    generation: u64,
}

/// 输入/在线状态跟踪器
pub struct TypingTracker {
    /// (thread_id, user_id) -> 条目
    entries: RwLock<HashMap<(String, String), TypingEntry>>,
    /// 当前在线用户集合
    online: RwLock<HashSet<String>>,
    /// 到期任务的 generation 源（全局单调，stop 后重建不会复用旧值）
    generations: AtomicU64,
    ttl: Duration,
    hub: Arc<RealtimeHub>,
}

impl TypingTracker {
    pub fn new(ttl: Duration, hub: Arc<RealtimeHub>) -> Arc<Self> {
        Arc::new(Self {
            entries: RwLock::new(HashMap::new()),
            online: RwLock::new(HashSet::new()),
            generations: AtomicU64::new(0),
            ttl,
            hub,
        })
    }

    /// 记录/刷新输入状态
    ///
    /// 仅首次进入窗口时发布 `user_typing{true}`；窗口内刷新只顺延到期时间。
    pub async fn start_typing(self: &Arc<Self>, thread_id: &str, user_id: &str) {
        let key = (thread_id.to_string(), user_id.to_string());
        let generation = self.generations.fetch_add(1, Ordering::Relaxed) + 1;
        let fresh;
        {
            let mut entries = self.entries.write().await;
            let entry = entries.get(&key).copied();
            fresh = entry.is_none_or(|e| e.expires_at <= Instant::now());
            entries.insert(
                key.clone(),
                TypingEntry {
                    expires_at: Instant::now() + self.ttl,
                    generation,
                },
            );
        }

        if fresh {
            self.hub
                .publish(RealtimeEvent::user_typing(thread_id, user_id, true));
        }

        // 到期任务：generation 不再匹配（被刷新或已 stop）则什么都不做
        let tracker = Arc::clone(self);
        let (thread_id, user_id) = (thread_id.to_string(), user_id.to_string());
        tokio::spawn(async move {
            tokio::time::sleep(tracker.ttl).await;
            tracker
                .expire_if_current(&thread_id, &user_id, generation)
                .await;
        });
    }

    async fn expire_if_current(&self, thread_id: &str, user_id: &str, generation: u64) {
        let key = (thread_id.to_string(), user_id.to_string());
        let expired = {
            let mut entries = self.entries.write().await;
            match entries.get(&key) {
                Some(entry) if entry.generation == generation => {
                    entries.remove(&key);
                    true
                }
                _ => false,
            }
        };
        if expired {
            debug!(thread_id = %thread_id, user_id = %user_id, "typing expired");
            self.hub
                .publish(RealtimeEvent::user_typing(thread_id, user_id, false));
        }
    }

    /// 显式停止输入；不存在条目时为空操作
    pub async fn stop_typing(&self, thread_id: &str, user_id: &str) {
        let key = (thread_id.to_string(), user_id.to_string());
        let removed = self.entries.write().await.remove(&key).is_some();
        if removed {
            self.hub
                .publish(RealtimeEvent::user_typing(thread_id, user_id, false));
        }
    }

    /// 当前正在输入的用户
    ///
    /// 已过期条目仅被过滤，不在读取路径上删除：删除与 `UserTyping{false}`
    /// 事件由到期任务负责，保证每个过期条目恰好发布一次停止事件。
    pub async fn typing_users(&self, thread_id: &str) -> Vec<String> {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .iter()
            .filter(|(key, entry)| key.0 == thread_id && entry.expires_at > now)
            .map(|(key, _)| key.1.clone())
            .collect()
    }

    /// 标记用户上线；重复标记不重复发事件
    pub async fn mark_online(&self, user_id: &str) {
        let fresh = self.online.write().await.insert(user_id.to_string());
        if fresh {
            self.hub
                .publish(RealtimeEvent::presence_changed(user_id, true));
        }
    }

    /// 标记用户下线
    pub async fn mark_offline(&self, user_id: &str) {
        let removed = self.online.write().await.remove(user_id);
        if removed {
            self.hub
                .publish(RealtimeEvent::presence_changed(user_id, false));
        }
    }

    pub async fn is_online(&self, user_id: &str) -> bool {
        self.online.read().await.contains(user_id)
    }

    pub async fn online_users(&self) -> Vec<String> {
        self.online.read().await.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> Arc<TypingTracker> {
        TypingTracker::new(Duration::from_secs(3), Arc::new(RealtimeHub::new(16)))
    }

    #[tokio::test(start_paused = true)]
    async fn test_typing_expires_after_ttl() {
        let tracker = tracker();
        tracker.start_typing("thread-1", "user-a").await;
        assert_eq!(tracker.typing_users("thread-1").await, vec!["user-a"]);

        tokio::time::sleep(Duration::from_millis(3100)).await;
        assert!(tracker.typing_users("thread-1").await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_extends_window() {
        let tracker = tracker();
        tracker.start_typing("thread-1", "user-a").await;

        tokio::time::sleep(Duration::from_millis(2000)).await;
        tracker.start_typing("thread-1", "user-a").await;

        // 距首次 start 已超 3 秒，但刷新顺延了窗口
        tokio::time::sleep(Duration::from_millis(2000)).await;
        assert_eq!(tracker.typing_users("thread-1").await, vec!["user-a"]);

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(tracker.typing_users("thread-1").await.is_empty());
    }

    #[tokio::test]
    async fn test_stop_typing_removes_entry() {
        let tracker = tracker();
        tracker.start_typing("thread-1", "user-a").await;
        tracker.stop_typing("thread-1", "user-a").await;
        assert!(tracker.typing_users("thread-1").await.is_empty());
        // 再次 stop 是空操作
        tracker.stop_typing("thread-1", "user-a").await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_does_not_reemit_typing_event() {
        let hub = Arc::new(RealtimeHub::new(16));
        let conn = hub.connect("watcher", Some("thread-1"));
        let mut rx = hub.subscribe(&conn).unwrap();

        let tracker = TypingTracker::new(Duration::from_secs(3), Arc::clone(&hub));
        tracker.start_typing("thread-1", "user-a").await;
        tracker.start_typing("thread-1", "user-a").await;
        tracker.start_typing("thread-1", "user-a").await;

        // 只应收到一条 typing=true
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_after_expiry_still_emits_stop_event() {
        let hub = Arc::new(RealtimeHub::new(16));
        let conn = hub.connect("watcher", Some("thread-1"));
        let mut rx = hub.subscribe(&conn).unwrap();

        let tracker = TypingTracker::new(Duration::from_secs(3), Arc::clone(&hub));
        tracker.start_typing("thread-1", "user-a").await;
        assert!(rx.try_recv().is_ok());

        // 窗口刚过、到期任务尚未运行时读取：条目已不可见，但不能吞掉停止事件
        tokio::time::advance(Duration::from_millis(3001)).await;
        assert!(tracker.typing_users("thread-1").await.is_empty());

        // 让到期任务运行（其计时器在 advance 之后才注册，需等满一个完整 TTL）
        tokio::time::sleep(Duration::from_millis(7000)).await;
        match rx.try_recv().unwrap().payload {
            crate::domain::model::RealtimePayload::Typing { is_typing } => assert!(!is_typing),
            other => panic!("unexpected payload: {other:?}"),
        }
        // 停止事件恰好一次
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_presence_toggle_is_idempotent() {
        let hub = Arc::new(RealtimeHub::new(16));
        let conn = hub.connect("watcher", None);
        let mut rx = hub.subscribe(&conn).unwrap();

        let tracker = TypingTracker::new(Duration::from_secs(3), Arc::clone(&hub));
        tracker.mark_online("user-a").await;
        tracker.mark_online("user-a").await;
        assert!(tracker.is_online("user-a").await);

        tracker.mark_offline("user-a").await;
        assert!(!tracker.is_online("user-a").await);

        // online + offline 各一条
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }
}
