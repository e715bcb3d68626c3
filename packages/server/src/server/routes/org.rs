use axum::extract::Extension;
use axum::response::Response;
use serde_json::json;

use crate::common::response::{forbidden, internal_error, not_found, success, unauthorized};
use crate::domains::organisation::Organisation;
use crate::server::app::AppState;
use crate::server::middleware::AuthUser;

/// GET /api/org - current organisation details. The join code is only shown
/// to managers.
pub async fn get_org(
    Extension(state): Extension<AppState>,
    auth: Option<Extension<AuthUser>>,
) -> Response {
    let Some(Extension(user)) = auth else {
        return unauthorized();
    };

    let org = match Organisation::find_by_id(user.organisation_id, &state.db_pool).await {
        Ok(Some(org)) => org,
        Ok(None) => return not_found("Organisation not found"),
        Err(e) => return internal_error(&e),
    };
    let (member_count, shift_count) = match Organisation::counts(org.id, &state.db_pool).await {
        Ok(counts) => counts,
        Err(e) => return internal_error(&e),
    };

    if !user.is_manager() {
        return success(json!({
            "org": {
                "id": org.id,
                "name": org.name,
                "memberCount": member_count,
                "shiftCount": shift_count,
            }
        }));
    }

    success(json!({
        "org": {
            "id": org.id,
            "name": org.name,
            "joinCode": org.join_code,
            "memberCount": member_count,
            "shiftCount": shift_count,
            "createdAt": org.created_at,
        }
    }))
}

/// POST /api/org - regenerate the join code (manager only). The old code
/// stops working as soon as the update commits.
pub async fn regenerate_join_code(
    Extension(state): Extension<AppState>,
    auth: Option<Extension<AuthUser>>,
) -> Response {
    let Some(Extension(user)) = auth else {
        return unauthorized();
    };
    if !user.is_manager() {
        return forbidden("Forbidden");
    }

    let join_code = match Organisation::unused_join_code(&state.db_pool).await {
        Ok(code) => code,
        Err(e) => return internal_error(&e),
    };
    let org =
        match Organisation::set_join_code(user.organisation_id, &join_code, &state.db_pool).await {
            Ok(org) => org,
            Err(e) => return internal_error(&e),
        };

    success(json!({ "joinCode": org.join_code }))
}
