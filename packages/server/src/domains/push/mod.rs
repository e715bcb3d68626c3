pub mod models;

pub use models::subscription::PushSubscription;
