// ShiftSwap - API Core
//
// Backend for the shift-swap scheduler: staff post shifts they cannot work,
// other staff claim them, managers approve or decline. Every shift mutation
// goes through the versioned conditional update behind kernel::BaseShiftStore,
// which is what keeps concurrent claims safe.

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::*;
