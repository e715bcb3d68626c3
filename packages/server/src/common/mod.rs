// Common types and utilities shared across the application

pub mod pagination;
pub mod response;

pub use pagination::PageParams;
