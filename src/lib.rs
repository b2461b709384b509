//! Kuruma IM Core
//!
//! 二手车交易平台的进程内消息核心：会话线程与消息存储、输入/在线状态、
//! 实时事件总线、试驾预约状态机（含离线队列与手动重试）、通知扇出。
//! 页面层只消费这里暴露的服务对象；持久化与发送副作用通过
//! `domain::repository` 中的协作者接口注入。

pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod service;

pub use config::CoreConfig;
pub use domain::model::*;
pub use domain::repository::{
    AlertPermissionGateway, KeyValueStore, ListingDirectory, ListingSnapshot, TestDriveSender,
};
pub use domain::service::{
    MessageStore, NotificationCenter, NotificationFanout, RealtimeHub, SyncResult,
    TestDriveService, TypingTracker,
};
pub use error::{CoreError, Result};
pub use service::{ApplicationContext, init_tracing, initialize, initialize_with};
