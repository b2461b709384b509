//! 平台通知权限网关实现

use anyhow::Result;
use async_trait::async_trait;

use crate::domain::repository::AlertPermissionGateway;

/// 固定返回授予/拒绝的权限网关（进程内没有真实的平台权限 API）
pub struct StaticPermissionGateway {
    granted: bool,
}

impl StaticPermissionGateway {
    pub fn granted() -> Self {
        Self { granted: true }
    }

    pub fn denied() -> Self {
        Self { granted: false }
    }
}

#[async_trait]
impl AlertPermissionGateway for StaticPermissionGateway {
    async fn request_permission(&self) -> Result<bool> {
        Ok(self.granted)
    }
}
