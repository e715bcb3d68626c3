pub mod models;

pub use models::member::{Member, MemberRole};
