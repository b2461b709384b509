//! 外部协作者接口
//!
//! 核心只依赖这些 trait；具体实现见 `infrastructure`。
//! 基础设施边界统一使用 `anyhow::Result`，由领域服务映射为业务错误。

use anyhow::Result;
use async_trait::async_trait;

use crate::domain::model::{SendOutcome, TestDriveRequest};

/// 车辆列表快照（线程参与者与预约快照的数据来源）
#[derive(Debug, Clone)]
pub struct ListingSnapshot {
    pub id: String,
    pub title: String,
    pub price: i64,
    pub seller_id: String,
    pub seller_name: String,
    pub seller_email: String,
}

/// 车辆/挂牌查询
#[async_trait]
pub trait ListingDirectory: Send + Sync {
    /// 按 id 查询挂牌；不存在返回 None
    async fn get_listing_by_id(&self, id: &str) -> Result<Option<ListingSnapshot>>;
}

/// 预约发送副作用（邮件/短信等），核心只依赖 success + message 契约
#[async_trait]
pub trait TestDriveSender: Send + Sync {
    async fn send(&self, request: &TestDriveRequest) -> Result<SendOutcome>;
}

/// 持久化 KV 存储（浏览器 localStorage 的等价物）
///
/// 读取到损坏/缺失数据时返回 None 而不是报错，调用方以内存状态为权威。
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn put(&self, key: &str, value: &str) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<()>;
}

/// 平台弹窗通知权限 API
#[async_trait]
pub trait AlertPermissionGateway: Send + Sync {
    /// 请求权限，返回是否授予
    async fn request_permission(&self) -> Result<bool>;
}
