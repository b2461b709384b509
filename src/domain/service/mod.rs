pub mod message_store;
pub mod notification_center;
pub mod notification_fanout;
pub mod realtime_hub;
pub mod test_drive_service;
pub mod typing_tracker;

pub use message_store::MessageStore;
pub use notification_center::NotificationCenter;
pub use notification_fanout::NotificationFanout;
pub use realtime_hub::RealtimeHub;
pub use test_drive_service::{SyncResult, TestDriveService};
pub use typing_tracker::TypingTracker;
