// Infrastructure: store implementations, push delivery, notification fan-out.

pub mod notifications;
pub mod pg_store;
pub mod push_client;
pub mod test_dependencies;
pub mod traits;

pub use notifications::{NotificationDispatcher, ShiftEvent};
pub use pg_store::{PgMemberDirectory, PgShiftStore, PgSubscriptionStore};
pub use push_client::HttpPushSender;
pub use test_dependencies::{
    DirectoryMember, InMemoryDirectory, InMemoryShiftStore, InMemorySubscriptionStore,
    RecordingPushSender,
};
pub use traits::{
    BaseMemberDirectory, BasePushSender, BaseShiftStore, BaseSubscriptionStore,
    NotificationPayload, PushError, StoreError, UpdateOutcome,
};
