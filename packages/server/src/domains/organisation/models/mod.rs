pub mod org_role;
pub mod organisation;
