pub mod models;

pub use models::org_role::OrgRole;
pub use models::organisation::Organisation;
