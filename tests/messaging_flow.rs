// 集成测试套件 - 覆盖消息线程、实时投递、试驾预约与通知扇出的端到端流程

use std::sync::Arc;
use std::time::Duration;

use kuruma_im_core::{
    ApplicationContext, CoreConfig, CoreError, ListingSnapshot, Notification,
    NotificationCategory, NotificationCenter, NotificationKind, ParticipantRole,
    RealtimeEventKind, SellerAction, SendOutcome, SenderContext, TestDriveForm, VehicleSnapshot,
    initialize_with,
};
use kuruma_im_core::infrastructure::permission::StaticPermissionGateway;
use kuruma_im_core::infrastructure::persistence::{JsonFileStore, MemoryKeyValueStore, MemoryListingDirectory};
use kuruma_im_core::infrastructure::sender::ScriptedSender;
use kuruma_im_core::KeyValueStore;

fn listing() -> ListingSnapshot {
    ListingSnapshot {
        id: "veh-1".to_string(),
        title: "2019 Mazda CX-5".to_string(),
        price: 1_980_000,
        seller_id: "seller-1".to_string(),
        seller_name: "Tanaka Motors".to_string(),
        seller_email: "sales@tanaka-motors.example".to_string(),
    }
}

fn buyer_ctx() -> SenderContext {
    SenderContext::new("buyer-1", "Aoki Ren", ParticipantRole::Buyer)
}

fn seller_ctx() -> SenderContext {
    SenderContext::new("seller-1", "Tanaka Motors", ParticipantRole::Seller)
}

fn form() -> TestDriveForm {
    TestDriveForm {
        name: "Aoki Ren".to_string(),
        email: "aoki@example.com".to_string(),
        phone: "080-1234-5678".to_string(),
        preferred_date: "2026-09-01".to_string(),
        preferred_time: "10:00".to_string(),
        message: None,
    }
}

fn vehicle() -> VehicleSnapshot {
    VehicleSnapshot {
        vehicle_id: "veh-1".to_string(),
        title: "2019 Mazda CX-5".to_string(),
        price: 1_980_000,
        seller_id: "seller-1".to_string(),
        seller_name: "Tanaka Motors".to_string(),
        seller_email: "sales@tanaka-motors.example".to_string(),
    }
}

async fn context_with(
    sender: Arc<ScriptedSender>,
    store: Arc<dyn KeyValueStore>,
) -> ApplicationContext {
    let listings = Arc::new(MemoryListingDirectory::with_listings(vec![listing()]));
    initialize_with(
        CoreConfig::default(),
        listings,
        sender,
        store,
        Arc::new(StaticPermissionGateway::granted()),
    )
    .await
    .expect("context should initialize")
}

async fn context() -> ApplicationContext {
    context_with(ScriptedSender::always_ok(), Arc::new(MemoryKeyValueStore::new())).await
}

/// 扇出消费者是异步任务，轮询等待通知物化
async fn wait_for_notifications(center: &NotificationCenter, min: usize) -> Vec<Notification> {
    for _ in 0..200 {
        let list = center.list().await;
        if list.len() >= min {
            return list;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    center.list().await
}

#[tokio::test]
async fn test_thread_unread_tracking_end_to_end() {
    let ctx = context().await;

    let thread = ctx
        .messages
        .create_thread(&buyer_ctx(), "veh-1", "Is this available?", "Hello!")
        .await
        .unwrap();
    // 创建者视角未读为 0
    assert_eq!(thread.unread_count_for("buyer-1"), 0);
    assert_eq!(thread.unread_count_for("seller-1"), 1);

    // 卖家回复，买家未读 +1
    ctx.messages
        .add_message(&thread.id, &seller_ctx(), "Yes, still available")
        .await
        .unwrap();
    let after_reply = ctx.messages.get_thread(&thread.id).await.unwrap();
    assert_eq!(after_reply.unread_count_for("buyer-1"), 1);

    // 买家读线程后归零，且消息状态推进为 read
    ctx.messages
        .mark_thread_read(&thread.id, "buyer-1")
        .await
        .unwrap();
    let after_read = ctx.messages.get_thread(&thread.id).await.unwrap();
    assert_eq!(after_read.unread_count_for("buyer-1"), 0);
    // 卖家发的那条消息在买家读过之后推进为 read
    assert!(
        after_read
            .messages
            .iter()
            .filter(|m| m.sender_id == "seller-1")
            .all(|m| m.status.as_str() == "read")
    );
    assert_eq!(after_read.messages.len(), 2);
}

#[tokio::test]
async fn test_realtime_delivery_to_interested_connections() {
    let ctx = context().await;

    let thread = ctx
        .messages
        .create_thread(&buyer_ctx(), "veh-1", "subject", "first")
        .await
        .unwrap();

    // 卖家打开该线程，另一个用户关注别的线程
    let seller_conn = ctx.connect_user("seller-1", Some(&thread.id)).await;
    let other_conn = ctx.connect_user("user-x", Some("unrelated-thread")).await;
    let mut seller_rx = ctx.hub.subscribe(&seller_conn).unwrap();
    let mut other_rx = ctx.hub.subscribe(&other_conn).unwrap();

    ctx.messages
        .add_message(&thread.id, &buyer_ctx(), "are you there?")
        .await
        .unwrap();

    let event = seller_rx.try_recv().expect("seller should receive the message event");
    assert_eq!(event.kind, RealtimeEventKind::NewMessage);
    assert_eq!(event.thread_id.as_deref(), Some(thread.id.as_str()));
    assert!(other_rx.try_recv().is_err());

    // 断开是幂等的，且最后一个连接断开后用户下线
    assert!(ctx.typing.is_online("seller-1").await);
    ctx.disconnect_user(&seller_conn, "seller-1").await;
    ctx.disconnect_user(&seller_conn, "seller-1").await;
    assert!(!ctx.typing.is_online("seller-1").await);
}

#[tokio::test]
async fn test_typing_events_reach_thread_watchers() {
    let ctx = context().await;
    let conn = ctx.connect_user("seller-1", Some("thread-1")).await;
    let mut rx = ctx.hub.subscribe(&conn).unwrap();

    ctx.typing.start_typing("thread-1", "buyer-1").await;
    ctx.typing.stop_typing("thread-1", "buyer-1").await;

    let started = rx.try_recv().unwrap();
    let stopped = rx.try_recv().unwrap();
    assert_eq!(started.kind, RealtimeEventKind::UserTyping);
    assert_eq!(stopped.kind, RealtimeEventKind::UserTyping);
    assert!(ctx.typing.typing_users("thread-1").await.is_empty());
}

#[tokio::test]
async fn test_test_drive_flow_with_notifications() {
    let sender = ScriptedSender::with_script(vec![
        SendOutcome::failure("seller unreachable"),
        SendOutcome::ok("delivered"),
    ]);
    let ctx = context_with(sender, Arc::new(MemoryKeyValueStore::new())).await;

    // 失败的首次发送
    let err = ctx
        .test_drives
        .schedule_test_drive(form(), vehicle())
        .await
        .unwrap_err();
    let CoreError::SendFailed { request_id, .. } = err else {
        panic!("expected SendFailed");
    };

    let list = wait_for_notifications(&ctx.notifications, 1).await;
    assert!(
        list.iter().any(|n| n.category == NotificationCategory::TestDrive
            && n.kind == NotificationKind::Error)
    );

    // 重试成功后出现 success 通知
    let retried = ctx
        .test_drives
        .retry_failed_request(&request_id)
        .await
        .unwrap();
    assert_eq!(retried.phase.as_str(), "sent");

    let list = wait_for_notifications(&ctx.notifications, 2).await;
    assert!(
        list.iter().any(|n| n.category == NotificationCategory::TestDrive
            && n.kind == NotificationKind::Success)
    );

    // 卖家确认并完成
    ctx.test_drives
        .respond_to_test_drive(&request_id, SellerAction::Confirm, None, None)
        .await
        .unwrap();
    ctx.test_drives.complete_request(&request_id).await.unwrap();
    assert_eq!(
        ctx.test_drives
            .get_request(&request_id)
            .await
            .unwrap()
            .phase
            .as_str(),
        "completed"
    );
}

#[tokio::test]
async fn test_message_events_fan_out_to_notifications() {
    let ctx = context().await;
    ctx.messages
        .create_thread(&buyer_ctx(), "veh-1", "subject", "Hello there")
        .await
        .unwrap();

    let list = wait_for_notifications(&ctx.notifications, 1).await;
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].category, NotificationCategory::Message);
    assert!(list[0].message.contains("Hello there"));

    // 未读计数与标记已读
    assert_eq!(ctx.notifications.unread_count().await, 1);
    ctx.notifications.mark_all_read().await;
    assert_eq!(ctx.notifications.unread_count().await, 0);
    ctx.notifications.mark_all_read().await;
    assert_eq!(ctx.notifications.unread_count().await, 0);
}

#[tokio::test]
async fn test_requests_survive_restart_via_file_store() {
    let dir = tempfile::tempdir().unwrap();

    {
        let store = Arc::new(JsonFileStore::new(dir.path()).unwrap());
        let ctx = context_with(ScriptedSender::always_ok(), store).await;
        let request = ctx
            .test_drives
            .schedule_test_drive(form(), vehicle())
            .await
            .unwrap();
        assert_eq!(request.phase.as_str(), "sent");
    }

    // 新上下文从同一目录恢复
    let store = Arc::new(JsonFileStore::new(dir.path()).unwrap());
    let ctx = context_with(ScriptedSender::always_ok(), store).await;
    let restored = ctx.test_drives.requests_for_buyer("aoki@example.com").await;
    assert_eq!(restored.len(), 1);
    assert_eq!(restored[0].phase.as_str(), "sent");
}

#[tokio::test]
async fn test_corrupted_storage_degrades_to_empty() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("test_drive.requests.json"), "{not json!").unwrap();

    let store = Arc::new(JsonFileStore::new(dir.path()).unwrap());
    let ctx = context_with(ScriptedSender::always_ok(), store).await;

    // 损坏数据按空集合处理，服务可以继续工作
    assert!(ctx.test_drives.requests_for_buyer("aoki@example.com").await.is_empty());
    let request = ctx
        .test_drives
        .schedule_test_drive(form(), vehicle())
        .await
        .unwrap();
    assert_eq!(request.phase.as_str(), "sent");
}

#[tokio::test]
async fn test_offline_queue_end_to_end() {
    let sender = ScriptedSender::always_ok();
    let ctx = context_with(sender, Arc::new(MemoryKeyValueStore::new())).await;

    ctx.test_drives.set_connected(false);
    let queued = ctx
        .test_drives
        .schedule_test_drive(form(), vehicle())
        .await
        .unwrap();
    assert_eq!(queued.phase.as_str(), "draft");
    assert_eq!(ctx.test_drives.pending_offline_count().await, 1);

    // 离线入队同样产生一条通知
    let list = wait_for_notifications(&ctx.notifications, 1).await;
    assert!(
        list.iter().any(|n| n.category == NotificationCategory::TestDrive
            && n.kind == NotificationKind::Info)
    );

    ctx.test_drives.set_connected(true);
    let results = ctx.test_drives.sync_offline_requests().await;
    assert_eq!(results.len(), 1);
    assert!(results[0].result.is_ok());
    assert_eq!(
        ctx.test_drives
            .get_request(&queued.id)
            .await
            .unwrap()
            .phase
            .as_str(),
        "sent"
    );
}
