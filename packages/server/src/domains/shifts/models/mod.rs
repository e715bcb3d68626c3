pub mod shift;
pub mod swap_log;
