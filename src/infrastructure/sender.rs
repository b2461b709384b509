//! 预约发送副作用实现
//!
//! - `WebhookSender`：POST 到配置的端点（真实部署把它接到邮件/短信服务）
//! - `SimulatedSender`：人为延迟 + 可配失败率，等价于原型里的定时器模拟
//! - `ScriptedSender`：按脚本逐次返回结果，测试专用

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use rand::Rng;
use tokio::sync::Mutex;
use tracing::debug;

use crate::domain::model::{SendOutcome, TestDriveRequest};
use crate::domain::repository::TestDriveSender;

/// Webhook 发送器
pub struct WebhookSender {
    endpoint: String,
    client: reqwest::Client,
}

impl WebhookSender {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl TestDriveSender for WebhookSender {
    async fn send(&self, request: &TestDriveRequest) -> Result<SendOutcome> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .with_context(|| format!("webhook POST {} failed", self.endpoint))?;

        let status = response.status();
        if status.is_success() {
            // 端点可以返回自己的 {success, message}，否则按成功处理
            let outcome = response
                .json::<SendOutcome>()
                .await
                .unwrap_or_else(|_| SendOutcome::ok("accepted by webhook"));
            Ok(outcome)
        } else {
            Ok(SendOutcome::failure(format!(
                "webhook returned status {status}"
            )))
        }
    }
}

/// 模拟发送器（开发/演示环境）
pub struct SimulatedSender {
    delay: Duration,
    /// 0.0 - 1.0；达到该概率时返回失败结果
    failure_rate: f64,
}

impl SimulatedSender {
    pub fn new(delay_ms: u64, failure_rate: f64) -> Self {
        Self {
            delay: Duration::from_millis(delay_ms),
            failure_rate: failure_rate.clamp(0.0, 1.0),
        }
    }
}

#[async_trait]
impl TestDriveSender for SimulatedSender {
    async fn send(&self, request: &TestDriveRequest) -> Result<SendOutcome> {
        // 抽样在 await 之前完成，避免把 RNG 带过挂起点
        let failed = rand::thread_rng().gen_bool(self.failure_rate);
        tokio::time::sleep(self.delay).await;
        debug!(request_id = %request.id, failed, "simulated send");
        if failed {
            Ok(SendOutcome::failure("simulated delivery failure"))
        } else {
            Ok(SendOutcome::ok(format!(
                "request delivered to {}",
                request.vehicle.seller_email
            )))
        }
    }
}

/// 脚本化发送器：按顺序吐出预置结果，脚本耗尽后返回默认成功
pub struct ScriptedSender {
    script: Mutex<VecDeque<SendOutcome>>,
}

impl ScriptedSender {
    pub fn always_ok() -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::new()),
        })
    }

    pub fn with_script(outcomes: Vec<SendOutcome>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(outcomes.into()),
        })
    }
}

#[async_trait]
impl TestDriveSender for ScriptedSender {
    async fn send(&self, request: &TestDriveRequest) -> Result<SendOutcome> {
        let next = self.script.lock().await.pop_front();
        Ok(next.unwrap_or_else(|| {
            SendOutcome::ok(format!(
                "request delivered to {}",
                request.vehicle.seller_email
            ))
        }))
    }
}
