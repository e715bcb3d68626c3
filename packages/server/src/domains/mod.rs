// Domain modules. Each domain owns its models (and all SQL for them);
// HTTP edges live in server::routes.

pub mod auth;
pub mod member;
pub mod organisation;
pub mod push;
pub mod shifts;
