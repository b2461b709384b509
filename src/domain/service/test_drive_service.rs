//! 试驾预约领域服务
//!
//! 驱动 `TestDriveRequest` 状态机：校验 -> Sending -> 发送副作用 ->
//! Sent/Failed（失败先落状态再向调用方冒错）；失败可手动重试（无退避、
//! 无次数上限）；断网期间创建的预约进入离线队列，`sync_offline_requests`
//! 逐条独立重放。每次变更都尝试经 KV 存储持久化，存储失败降级为告警，
//! 内存状态始终是当前会话的权威数据。

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::RwLock;
use tracing::{info, instrument, warn};

use crate::domain::model::{
    RealtimeEvent, RescheduleProposal, SellerAction, SendOutcome, TestDriveForm, TestDrivePhase,
    TestDriveRequest, VehicleSnapshot,
};
use crate::domain::repository::{KeyValueStore, TestDriveSender};
use crate::domain::service::realtime_hub::RealtimeHub;
use crate::error::{CoreError, Result};

const KEY_REQUESTS: &str = "test_drive.requests";
const KEY_OFFLINE: &str = "test_drive.offline_queue";
const KEY_DRAFTS: &str = "test_drive.drafts";

/// 离线同步的单项结果（逐项独立，互不影响）
pub struct SyncResult {
    pub request_id: String,
    pub result: Result<TestDriveRequest>,
}

/// 试驾预约服务
pub struct TestDriveService {
    /// 全部预约，插入顺序保留
    requests: RwLock<Vec<TestDriveRequest>>,
    /// 离线排队的预约 id
    offline_queue: RwLock<Vec<String>>,
    /// 未提交的表单草稿（vehicle_id -> 表单）
    drafts: RwLock<HashMap<String, TestDriveForm>>,
    connected: AtomicBool,
    sender: Arc<dyn TestDriveSender>,
    store: Arc<dyn KeyValueStore>,
    hub: Arc<RealtimeHub>,
}

impl TestDriveService {
    pub fn new(
        sender: Arc<dyn TestDriveSender>,
        store: Arc<dyn KeyValueStore>,
        hub: Arc<RealtimeHub>,
    ) -> Self {
        Self {
            requests: RwLock::new(Vec::new()),
            offline_queue: RwLock::new(Vec::new()),
            drafts: RwLock::new(HashMap::new()),
            connected: AtomicBool::new(true),
            sender,
            store,
            hub,
        }
    }

    /// 从 KV 存储恢复上一会话的预约/离线队列/草稿
    ///
    /// 缺失或损坏的数据降级为空集合，绝不让恢复失败阻塞启动。
    pub async fn load(&self) {
        *self.requests.write().await =
            self.load_collection::<Vec<TestDriveRequest>>(KEY_REQUESTS).await;
        *self.offline_queue.write().await =
            self.load_collection::<Vec<String>>(KEY_OFFLINE).await;
        *self.drafts.write().await = self
            .load_collection::<HashMap<String, TestDriveForm>>(KEY_DRAFTS)
            .await;
    }

    async fn load_collection<T: Default + serde::de::DeserializeOwned>(&self, key: &str) -> T {
        match self.store.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => value,
                Err(err) => {
                    warn!(key = %key, error = %err, "stored payload is corrupt, starting empty");
                    T::default()
                }
            },
            Ok(None) => T::default(),
            Err(err) => {
                warn!(key = %key, error = %err, "storage read failed, starting empty");
                T::default()
            }
        }
    }

    /// 持久化当前状态；失败降级为告警（本次会话内存数据仍然有效）
    async fn persist(&self) {
        let requests = self.requests.read().await.clone();
        let queue = self.offline_queue.read().await.clone();
        let drafts = self.drafts.read().await.clone();
        self.persist_value(KEY_REQUESTS, &requests).await;
        self.persist_value(KEY_OFFLINE, &queue).await;
        self.persist_value(KEY_DRAFTS, &drafts).await;
    }

    async fn persist_value<T: serde::Serialize>(&self, key: &str, value: &T) {
        match serde_json::to_string(value) {
            Ok(json) => {
                if let Err(err) = self.store.put(key, &json).await {
                    warn!(key = %key, error = %err, "persist failed, changes may not survive a refresh");
                }
            }
            Err(err) => warn!(key = %key, error = %err, "serialize failed"),
        }
    }

    /// 切换连接状态（离线时新预约进入队列而不是发送）
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// 提交试驾预约
    ///
    /// 校验失败在任何状态变更之前返回。在线时立即发送：成功 -> Sent，
    /// 失败 -> Failed 且持久化后以 `SendFailed` 冒错。离线时创建为 Draft
    /// 并进入离线队列，等待 `sync_offline_requests` 重放。
    #[instrument(skip(self, form, vehicle), fields(vehicle_id = %vehicle.vehicle_id))]
    pub async fn schedule_test_drive(
        &self,
        form: TestDriveForm,
        vehicle: VehicleSnapshot,
    ) -> Result<TestDriveRequest> {
        form.validate()?;

        let mut request = TestDriveRequest::new(form, vehicle);
        let request_id = request.id.clone();

        if !self.is_connected() {
            self.requests.write().await.push(request.clone());
            self.offline_queue.write().await.push(request_id.clone());
            self.persist().await;
            self.publish_update(&request, None);
            info!(request_id = %request_id, "offline, request queued");
            return Ok(request);
        }

        request.begin_send()?;
        self.requests.write().await.push(request.clone());

        let outcome = self.invoke_sender(&request).await;
        self.finish_send(&request_id, outcome).await
    }

    /// 手动重试失败的预约；仅 Failed 状态合法，非法调用不产生任何变更
    #[instrument(skip(self), fields(request_id = %request_id))]
    pub async fn retry_failed_request(&self, request_id: &str) -> Result<TestDriveRequest> {
        let snapshot = {
            let mut requests = self.requests.write().await;
            let request = requests
                .iter_mut()
                .find(|r| r.id == request_id)
                .ok_or_else(|| CoreError::not_found("test drive request", request_id))?;
            if !request.phase.can_retry() {
                return Err(CoreError::InvalidState {
                    operation: "retry",
                    current: request.phase.as_str().to_string(),
                });
            }
            request.begin_send()?;
            request.clone()
        };

        let outcome = self.invoke_sender(&snapshot).await;
        self.finish_send(request_id, outcome).await
    }

    /// 调用发送副作用；传输层错误同样按失败结果处理（不吞掉）
    async fn invoke_sender(&self, request: &TestDriveRequest) -> SendOutcome {
        match self.sender.send(request).await {
            Ok(outcome) => outcome,
            Err(err) => SendOutcome::failure(err.to_string()),
        }
    }

    /// 记录发送结果并持久化；失败时状态已落盘后再冒错
    async fn finish_send(&self, request_id: &str, outcome: SendOutcome) -> Result<TestDriveRequest> {
        let snapshot = {
            let mut requests = self.requests.write().await;
            let request = requests
                .iter_mut()
                .find(|r| r.id == request_id)
                .ok_or_else(|| CoreError::not_found("test drive request", request_id))?;
            request.record_outcome(outcome)?;
            request.clone()
        };

        self.persist().await;
        self.publish_update(&snapshot, snapshot.response.as_ref().map(|o| o.message.clone()));

        match &snapshot.phase {
            TestDrivePhase::Failed { reason } => Err(CoreError::SendFailed {
                request_id: snapshot.id.clone(),
                message: reason.clone(),
            }),
            _ => {
                info!(request_id = %snapshot.id, phase = %snapshot.phase, "request sent");
                Ok(snapshot)
            }
        }
    }

    /// 卖家响应：confirm -> Confirmed，decline -> Cancelled，
    /// reschedule -> 仍为 Sent 并附加改期提议
    #[instrument(skip(self, message, reschedule), fields(request_id = %request_id))]
    pub async fn respond_to_test_drive(
        &self,
        request_id: &str,
        action: SellerAction,
        message: Option<String>,
        reschedule: Option<RescheduleProposal>,
    ) -> Result<TestDriveRequest> {
        let snapshot = {
            let mut requests = self.requests.write().await;
            let request = requests
                .iter_mut()
                .find(|r| r.id == request_id)
                .ok_or_else(|| CoreError::not_found("test drive request", request_id))?;
            request.respond(action, message.clone(), reschedule)?;
            request.clone()
        };

        self.persist().await;
        self.publish_update(&snapshot, message);
        Ok(snapshot)
    }

    /// 完成试驾（Confirmed -> Completed）
    pub async fn complete_request(&self, request_id: &str) -> Result<TestDriveRequest> {
        let snapshot = {
            let mut requests = self.requests.write().await;
            let request = requests
                .iter_mut()
                .find(|r| r.id == request_id)
                .ok_or_else(|| CoreError::not_found("test drive request", request_id))?;
            request.complete()?;
            request.clone()
        };

        self.persist().await;
        self.publish_update(&snapshot, None);
        Ok(snapshot)
    }

    /// 重放离线队列；逐项独立，单项失败不中断批次
    #[instrument(skip(self))]
    pub async fn sync_offline_requests(&self) -> Vec<SyncResult> {
        let queued: Vec<String> = self.offline_queue.write().await.drain(..).collect();
        if queued.is_empty() {
            return Vec::new();
        }
        info!(count = queued.len(), "replaying offline queue");

        let mut results = Vec::with_capacity(queued.len());
        for request_id in queued {
            let begun = {
                let mut requests = self.requests.write().await;
                match requests.iter_mut().find(|r| r.id == request_id) {
                    Some(request) => request.begin_send().map(|_| request.clone()),
                    None => Err(CoreError::not_found("test drive request", &request_id)),
                }
            };
            let result = match begun {
                Ok(snapshot) => {
                    let outcome = self.invoke_sender(&snapshot).await;
                    self.finish_send(&request_id, outcome).await
                }
                Err(err) => Err(err),
            };
            results.push(SyncResult { request_id, result });
        }

        self.persist().await;
        results
    }

    /// 暂存表单草稿（刷新后可恢复）
    pub async fn save_draft(&self, vehicle_id: &str, form: TestDriveForm) {
        self.drafts
            .write()
            .await
            .insert(vehicle_id.to_string(), form);
        self.persist().await;
    }

    /// 取走草稿
    pub async fn take_draft(&self, vehicle_id: &str) -> Option<TestDriveForm> {
        let draft = self.drafts.write().await.remove(vehicle_id);
        if draft.is_some() {
            self.persist().await;
        }
        draft
    }

    // ---- 查询（纯过滤，空集合时返回空结果，绝不报错）----

    pub async fn get_request(&self, request_id: &str) -> Option<TestDriveRequest> {
        self.requests
            .read()
            .await
            .iter()
            .find(|r| r.id == request_id)
            .cloned()
    }

    pub async fn requests_by_vehicle(&self, vehicle_id: &str) -> Vec<TestDriveRequest> {
        self.requests
            .read()
            .await
            .iter()
            .filter(|r| r.vehicle.vehicle_id == vehicle_id)
            .cloned()
            .collect()
    }

    pub async fn requests_for_buyer(&self, buyer_email: &str) -> Vec<TestDriveRequest> {
        self.requests
            .read()
            .await
            .iter()
            .filter(|r| r.buyer.email.eq_ignore_ascii_case(buyer_email))
            .cloned()
            .collect()
    }

    pub async fn requests_for_seller(&self, seller_email: &str) -> Vec<TestDriveRequest> {
        self.requests
            .read()
            .await
            .iter()
            .filter(|r| r.vehicle.seller_email.eq_ignore_ascii_case(seller_email))
            .cloned()
            .collect()
    }

    /// 按状态名过滤（"draft" / "sending" / "sent" / "failed" / ...）
    pub async fn requests_by_status(&self, status: &str) -> Vec<TestDriveRequest> {
        self.requests
            .read()
            .await
            .iter()
            .filter(|r| r.phase.as_str() == status)
            .cloned()
            .collect()
    }

    pub async fn pending_offline_count(&self) -> usize {
        self.offline_queue.read().await.len()
    }

    fn publish_update(&self, request: &TestDriveRequest, detail: Option<String>) {
        self.hub.publish(RealtimeEvent::test_drive_updated(
            &request.id,
            &request.buyer.email,
            request.phase.as_str(),
            &request.vehicle.title,
            detail,
        ));
    }
}
