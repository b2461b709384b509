//! 消息存储领域服务
//!
//! 持有全部会话线程；每个变更操作在单个写锁作用域内完成
//! （追加消息 + 刷新 last_activity + 未读游标 要么全部发生要么全不发生），
//! 变更提交后再向事件总线发布。

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use crate::domain::model::{
    MessageThread, Participant, RealtimeEvent, SenderContext, ThreadFilter, ThreadMessage,
    ThreadPriority, ThreadStatus,
};
use crate::domain::repository::ListingDirectory;
use crate::domain::service::realtime_hub::RealtimeHub;
use crate::error::{CoreError, Result};

/// 消息存储
pub struct MessageStore {
    threads: RwLock<HashMap<String, MessageThread>>,
    listings: Arc<dyn ListingDirectory>,
    hub: Arc<RealtimeHub>,
}

impl MessageStore {
    pub fn new(listings: Arc<dyn ListingDirectory>, hub: Arc<RealtimeHub>) -> Self {
        Self {
            threads: RwLock::new(HashMap::new()),
            listings,
            hub,
        }
    }

    /// 围绕某个挂牌创建线程：参与者 = 调用方 + 挂牌卖家，并附带首条消息
    #[instrument(skip(self, ctx, first_message), fields(vehicle_id = %vehicle_id))]
    pub async fn create_thread(
        &self,
        ctx: &SenderContext,
        vehicle_id: &str,
        subject: &str,
        first_message: &str,
    ) -> Result<MessageThread> {
        let listing = self
            .listings
            .get_listing_by_id(vehicle_id)
            .await?
            .ok_or_else(|| CoreError::not_found("listing", vehicle_id))?;

        let seller = Participant {
            id: listing.seller_id,
            name: listing.seller_name,
            role: crate::domain::model::ParticipantRole::Seller,
            avatar_url: None,
        };
        let mut thread = MessageThread::new(vehicle_id, listing.title, subject, ctx, seller);
        let message = ThreadMessage::new_text(&thread.id, ctx, first_message);
        thread.append(message.clone());

        let snapshot = thread.clone();
        self.threads
            .write()
            .await
            .insert(thread.id.clone(), thread);

        info!(thread_id = %snapshot.id, "thread created");
        self.hub.publish(RealtimeEvent::new_message(message));
        Ok(snapshot)
    }

    /// 向已有线程追加一条文本消息
    #[instrument(skip(self, ctx, content), fields(thread_id = %thread_id))]
    pub async fn add_message(
        &self,
        thread_id: &str,
        ctx: &SenderContext,
        content: &str,
    ) -> Result<ThreadMessage> {
        let message = {
            let mut threads = self.threads.write().await;
            let thread = threads
                .get_mut(thread_id)
                .ok_or_else(|| CoreError::not_found("thread", thread_id))?;
            let message = ThreadMessage::new_text(thread_id, ctx, content);
            thread.append(message.clone());
            message
        };

        debug!(message_id = %message.id, "message appended");
        self.hub.publish(RealtimeEvent::new_message(message.clone()));
        Ok(message)
    }

    /// 追加系统消息（不计入任何参与者的未读）
    #[instrument(skip(self, content), fields(thread_id = %thread_id))]
    pub async fn add_system_message(
        &self,
        thread_id: &str,
        content: &str,
    ) -> Result<ThreadMessage> {
        let message = {
            let mut threads = self.threads.write().await;
            let thread = threads
                .get_mut(thread_id)
                .ok_or_else(|| CoreError::not_found("thread", thread_id))?;
            let message = ThreadMessage::new_system(thread_id, content);
            thread.append(message.clone());
            message
        };
        self.hub.publish(RealtimeEvent::new_message(message.clone()));
        Ok(message)
    }

    /// 将线程对 reader 标记为已读
    #[instrument(skip(self), fields(thread_id = %thread_id, reader_id = %reader_id))]
    pub async fn mark_thread_read(&self, thread_id: &str, reader_id: &str) -> Result<()> {
        {
            let mut threads = self.threads.write().await;
            let thread = threads
                .get_mut(thread_id)
                .ok_or_else(|| CoreError::not_found("thread", thread_id))?;
            thread.mark_read_by(reader_id);
        }
        self.hub
            .publish(RealtimeEvent::message_read(thread_id, reader_id));
        Ok(())
    }

    /// 归档线程
    pub async fn archive_thread(&self, thread_id: &str) -> Result<()> {
        let mut threads = self.threads.write().await;
        let thread = threads
            .get_mut(thread_id)
            .ok_or_else(|| CoreError::not_found("thread", thread_id))?;
        thread.status = ThreadStatus::Archived;
        Ok(())
    }

    /// 调整线程优先级
    pub async fn set_priority(&self, thread_id: &str, priority: ThreadPriority) -> Result<()> {
        let mut threads = self.threads.write().await;
        let thread = threads
            .get_mut(thread_id)
            .ok_or_else(|| CoreError::not_found("thread", thread_id))?;
        thread.priority = priority;
        Ok(())
    }

    pub async fn get_thread(&self, thread_id: &str) -> Option<MessageThread> {
        self.threads.read().await.get(thread_id).cloned()
    }

    /// 全部线程，按 last_activity 降序
    pub async fn list_threads(&self) -> Vec<MessageThread> {
        let threads = self.threads.read().await;
        let mut all: Vec<MessageThread> = threads.values().cloned().collect();
        all.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
        all
    }

    /// 大小写不敏感的子串搜索（车辆标题 / 主题 / 参与者姓名），last_activity 降序
    pub async fn search_threads(&self, query: &str) -> Vec<MessageThread> {
        let needle = query.to_lowercase();
        let threads = self.threads.read().await;
        let mut matches: Vec<MessageThread> = threads
            .values()
            .filter(|t| t.matches_query(&needle))
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
        matches
    }

    /// 精确匹配过滤，提供的字段以 AND 组合
    pub async fn filter_threads(&self, filter: &ThreadFilter) -> Vec<MessageThread> {
        let threads = self.threads.read().await;
        let mut matches: Vec<MessageThread> = threads
            .values()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
        matches
    }

    /// 某用户在全部线程上的未读总数（仪表盘角标）
    pub async fn unread_total(&self, user_id: &str) -> u32 {
        self.threads
            .read()
            .await
            .values()
            .map(|t| t.unread_count_for(user_id))
            .sum()
    }
}
