pub mod event;
pub mod notification;
pub mod test_drive;
pub mod thread;

pub use event::{RealtimeEvent, RealtimeEventKind, RealtimePayload};
pub use notification::{
    Notification, NotificationCategory, NotificationKind, NotificationPriority, NotifyOptions,
};
pub use test_drive::{
    RescheduleProposal, SellerAction, SendOutcome, TestDriveForm, TestDrivePhase,
    TestDriveRequest, VehicleSnapshot,
};
pub use thread::{
    Attachment, MessageKind, MessageStatus, MessageThread, Participant, ParticipantRole,
    SenderContext, ThreadFilter, ThreadMessage, ThreadPriority, ThreadStatus,
};
