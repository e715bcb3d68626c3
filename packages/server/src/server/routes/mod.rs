pub mod auth;
pub mod export;
pub mod health;
pub mod history;
pub mod members;
pub mod org;
pub mod push;
pub mod roles;
pub mod shifts;
