//! 统一异常处理模块
//!
//! 领域层错误全部收敛到 `CoreError`；基础设施协作者（存储、发送、目录）
//! 在 trait 边界使用 `anyhow::Result`，由服务层映射为业务错误。

use std::collections::BTreeMap;

use thiserror::Error;

/// 领域层统一 Result 别名
pub type Result<T> = std::result::Result<T, CoreError>;

/// 消息/预约/通知核心错误类型
#[derive(Debug, Error)]
pub enum CoreError {
    /// 表单字段校验失败（field -> 该字段的全部错误信息）
    #[error("validation failed: {}", format_field_errors(.fields))]
    Validation { fields: BTreeMap<String, Vec<String>> },

    /// 引用的实体不存在
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// 当前状态不允许该操作
    #[error("operation '{operation}' not allowed from state '{current}'")]
    InvalidState {
        operation: &'static str,
        current: String,
    },

    /// 外部发送副作用报告失败（请求状态已先行落为 Failed）
    #[error("test drive request {request_id} failed to send: {message}")]
    SendFailed { request_id: String, message: String },

    /// 持久化协作者失败（内存状态仍为当前会话的权威数据）
    #[error("storage error: {0}")]
    Storage(String),
}

impl CoreError {
    /// 构造单字段校验错误
    pub fn validation_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(field.into(), vec![message.into()]);
        CoreError::Validation { fields }
    }

    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            kind,
            id: id.into(),
        }
    }
}

impl From<anyhow::Error> for CoreError {
    fn from(err: anyhow::Error) -> Self {
        CoreError::Storage(err.to_string())
    }
}

fn format_field_errors(fields: &BTreeMap<String, Vec<String>>) -> String {
    fields
        .iter()
        .map(|(field, messages)| format!("{}: [{}]", field, messages.join("; ")))
        .collect::<Vec<_>>()
        .join(", ")
}
