use axum::extract::{Extension, Query};
use axum::response::Response;
use serde::Deserialize;
use serde_json::json;

use crate::common::response::{forbidden, internal_error, success, unauthorized};
use crate::domains::shifts::ShiftSwapLog;
use crate::server::app::AppState;
use crate::server::middleware::AuthUser;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 100;

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

/// GET /api/history - the audit trail, decorated with actor and shift
/// context. Manager only.
pub async fn get_history(
    Extension(state): Extension<AppState>,
    auth: Option<Extension<AuthUser>>,
    Query(query): Query<HistoryQuery>,
) -> Response {
    let Some(Extension(user)) = auth else {
        return unauthorized();
    };
    if !user.is_manager() {
        return forbidden("Only managers can view swap history");
    }

    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    match ShiftSwapLog::history_for_org(user.organisation_id, limit, &state.db_pool).await {
        Ok(entries) => success(json!({ "history": entries })),
        Err(e) => internal_error(&e),
    }
}
