//! 试驾预约领域模型
//!
//! 预约生命周期由 `TestDrivePhase` 状态机管理：
//! Draft -> Sending -> {Sent, Failed}；Failed -> Sending（手动重试）；
//! Sent -> {Confirmed, Cancelled}，Sent 上的 reschedule 仅附加改期提议；
//! Confirmed -> Completed。Completed / Cancelled 为终态。

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// 车辆快照（预约创建时固化，之后不随列表变化）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleSnapshot {
    pub vehicle_id: String,
    pub title: String,
    pub price: i64,
    pub seller_id: String,
    pub seller_name: String,
    pub seller_email: String,
}

/// 买家预约表单
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestDriveForm {
    pub name: String,
    pub email: String,
    pub phone: String,
    /// YYYY-MM-DD
    pub preferred_date: String,
    /// HH:MM
    pub preferred_time: String,
    pub message: Option<String>,
}

impl TestDriveForm {
    /// 字段级校验；任何失败都在状态变更之前返回
    pub fn validate(&self) -> Result<()> {
        let mut fields: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut push = |field: &str, message: &str| {
            fields
                .entry(field.to_string())
                .or_default()
                .push(message.to_string());
        };

        if self.name.trim().is_empty() {
            push("name", "name is required");
        }
        if self.email.trim().is_empty() {
            push("email", "email is required");
        } else if !self.email.contains('@') || !self.email.contains('.') {
            push("email", "email address is not valid");
        }
        if self.phone.trim().is_empty() {
            push("phone", "phone is required");
        } else if self.phone.chars().filter(|c| c.is_ascii_digit()).count() < 7 {
            push("phone", "phone number must contain at least 7 digits");
        }
        if NaiveDate::parse_from_str(&self.preferred_date, "%Y-%m-%d").is_err() {
            push("preferred_date", "date must be in YYYY-MM-DD format");
        }
        if NaiveTime::parse_from_str(&self.preferred_time, "%H:%M").is_err() {
            push("preferred_time", "time must be in HH:MM format");
        }

        if fields.is_empty() {
            Ok(())
        } else {
            Err(CoreError::Validation { fields })
        }
    }
}

/// 外部发送副作用的结果契约
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendOutcome {
    pub success: bool,
    pub message: String,
}

impl SendOutcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// 卖家改期提议
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleProposal {
    pub date: String,
    pub time: String,
}

/// 卖家对 Sent 状态预约的响应动作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SellerAction {
    Confirm,
    Reschedule,
    Decline,
}

/// 预约生命周期状态（按状态携带各自的数据，非法迁移不可表达）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum TestDrivePhase {
    /// 草稿 / 离线排队，尚未尝试发送
    Draft,
    /// 发送中（attempt 从 1 起计）
    Sending { attempt: u32 },
    /// 已送达卖家，等待响应
    Sent {
        reschedule: Option<RescheduleProposal>,
        seller_message: Option<String>,
    },
    /// 发送失败，可手动重试
    Failed { reason: String },
    /// 卖家已确认
    Confirmed { seller_message: Option<String> },
    /// 已取消（终态）
    Cancelled { seller_message: Option<String> },
    /// 已完成（终态）
    Completed,
}

impl TestDrivePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestDrivePhase::Draft => "draft",
            TestDrivePhase::Sending { .. } => "sending",
            TestDrivePhase::Sent { .. } => "sent",
            TestDrivePhase::Failed { .. } => "failed",
            TestDrivePhase::Confirmed { .. } => "confirmed",
            TestDrivePhase::Cancelled { .. } => "cancelled",
            TestDrivePhase::Completed => "completed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TestDrivePhase::Completed | TestDrivePhase::Cancelled { .. })
    }

    pub fn can_retry(&self) -> bool {
        matches!(self, TestDrivePhase::Failed { .. })
    }
}

impl fmt::Display for TestDrivePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 试驾预约聚合根
///
/// 归属发起预约的买家会话；卖家只读并通过 `respond` 响应。
/// 每次状态迁移 version 递增、last_updated 刷新。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestDriveRequest {
    pub id: String,
    pub vehicle: VehicleSnapshot,
    pub buyer: TestDriveForm,
    pub phase: TestDrivePhase,
    /// 最近一次发送副作用的结果
    pub response: Option<SendOutcome>,
    /// 累计发送尝试次数（手动重试不设上限）
    pub send_attempts: u32,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub version: u32,
}

impl TestDriveRequest {
    pub fn new(form: TestDriveForm, vehicle: VehicleSnapshot) -> Self {
        let now = Utc::now();
        Self {
            id: ulid::Ulid::new().to_string(),
            vehicle,
            buyer: form,
            phase: TestDrivePhase::Draft,
            response: None,
            send_attempts: 0,
            created_at: now,
            last_updated: now,
            version: 0,
        }
    }

    fn touch(&mut self) {
        self.version += 1;
        self.last_updated = Utc::now();
    }

    /// 进入发送中（Draft/Failed -> Sending）
    pub fn begin_send(&mut self) -> Result<()> {
        if !matches!(
            self.phase,
            TestDrivePhase::Draft | TestDrivePhase::Failed { .. }
        ) {
            return Err(CoreError::InvalidState {
                operation: "begin_send",
                current: self.phase.as_str().to_string(),
            });
        }
        self.send_attempts += 1;
        self.phase = TestDrivePhase::Sending {
            attempt: self.send_attempts,
        };
        self.touch();
        Ok(())
    }

    /// 记录发送结果（Sending -> Sent/Failed）
    pub fn record_outcome(&mut self, outcome: SendOutcome) -> Result<()> {
        if !matches!(self.phase, TestDrivePhase::Sending { .. }) {
            return Err(CoreError::InvalidState {
                operation: "record_outcome",
                current: self.phase.as_str().to_string(),
            });
        }
        self.phase = if outcome.success {
            TestDrivePhase::Sent {
                reschedule: None,
                seller_message: None,
            }
        } else {
            TestDrivePhase::Failed {
                reason: outcome.message.clone(),
            }
        };
        self.response = Some(outcome);
        self.touch();
        Ok(())
    }

    /// 卖家响应（仅 Sent 状态合法）
    pub fn respond(
        &mut self,
        action: SellerAction,
        message: Option<String>,
        reschedule: Option<RescheduleProposal>,
    ) -> Result<()> {
        let TestDrivePhase::Sent { .. } = &self.phase else {
            return Err(CoreError::InvalidState {
                operation: "respond",
                current: self.phase.as_str().to_string(),
            });
        };
        match action {
            SellerAction::Confirm => {
                self.phase = TestDrivePhase::Confirmed {
                    seller_message: message,
                };
            }
            SellerAction::Decline => {
                self.phase = TestDrivePhase::Cancelled {
                    seller_message: message,
                };
            }
            SellerAction::Reschedule => {
                // 仍停留在 Sent，仅附加改期提议供买家查看
                self.phase = TestDrivePhase::Sent {
                    reschedule,
                    seller_message: message,
                };
            }
        }
        self.touch();
        Ok(())
    }

    /// 完成试驾（Confirmed -> Completed）
    pub fn complete(&mut self) -> Result<()> {
        if !matches!(self.phase, TestDrivePhase::Confirmed { .. }) {
            return Err(CoreError::InvalidState {
                operation: "complete",
                current: self.phase.as_str().to_string(),
            });
        }
        self.phase = TestDrivePhase::Completed;
        self.touch();
        Ok(())
    }
}
