pub mod lifecycle;
pub mod models;

pub use lifecycle::{Actor, PostShift, ShiftAction, ShiftError, ShiftLifecycle};
pub use models::shift::{
    visible_to, ExportFilter, NewShift, Shift, ShiftChange, ShiftExportRow, ShiftListFilter,
    ShiftStatus, ShiftViewer,
};
pub use models::swap_log::{AuditEntry, HistoryEntry, ShiftSwapLog, SwapAction};
