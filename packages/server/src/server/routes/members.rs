use axum::extract::Extension;
use axum::response::Response;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use uuid::Uuid;

use crate::common::response::{
    bad_request, conflict, forbidden, internal_error, not_found, success, unauthorized,
};
use crate::domains::member::Member;
use crate::domains::organisation::OrgRole;
use crate::server::app::AppState;
use crate::server::middleware::AuthUser;

/// GET /api/members - all members of the caller's organisation with their
/// org-role assignments
pub async fn list_members(
    Extension(state): Extension<AppState>,
    auth: Option<Extension<AuthUser>>,
) -> Response {
    let Some(Extension(user)) = auth else {
        return unauthorized();
    };

    let members = match Member::list_for_org(user.organisation_id, &state.db_pool).await {
        Ok(members) => members,
        Err(e) => return internal_error(&e),
    };
    let assignments = match OrgRole::assignments_for_org(user.organisation_id, &state.db_pool).await
    {
        Ok(assignments) => assignments,
        Err(e) => return internal_error(&e),
    };

    let mut roles_by_member: HashMap<Uuid, Vec<serde_json::Value>> = HashMap::new();
    for (member_id, role_id, role_name) in assignments {
        roles_by_member
            .entry(member_id)
            .or_default()
            .push(json!({ "id": role_id, "name": role_name }));
    }

    let members: Vec<serde_json::Value> = members
        .iter()
        .map(|m| {
            json!({
                "id": m.id,
                "name": m.name,
                "email": m.email,
                "role": m.role,
                "staffTitle": m.staff_title,
                "createdAt": m.created_at,
                "orgRoles": roles_by_member.remove(&m.id).unwrap_or_default(),
            })
        })
        .collect();

    success(json!({ "members": members }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteMemberRequest {
    pub member_id: Option<Uuid>,
}

/// DELETE /api/members - remove a member (manager only, not yourself)
pub async fn delete_member(
    Extension(state): Extension<AppState>,
    auth: Option<Extension<AuthUser>>,
    axum::Json(body): axum::Json<DeleteMemberRequest>,
) -> Response {
    let Some(Extension(user)) = auth else {
        return unauthorized();
    };
    if !user.is_manager() {
        return forbidden("Forbidden");
    }
    let Some(member_id) = body.member_id else {
        return bad_request("memberId is required");
    };
    if member_id == user.member_id {
        return bad_request("You can't remove yourself");
    }

    match Member::find_in_org(member_id, user.organisation_id, &state.db_pool).await {
        Ok(Some(_)) => {}
        Ok(None) => return not_found("Member not found"),
        Err(e) => return internal_error(&e),
    }

    // Shift rows and the audit trail outlive membership; a member who appears
    // in either cannot be removed.
    match Member::shift_history_exists(member_id, &state.db_pool).await {
        Ok(false) => {}
        Ok(true) => {
            return conflict("This member has shift history and can't be removed")
        }
        Err(e) => return internal_error(&e),
    }

    if let Err(e) = Member::delete(member_id, &state.db_pool).await {
        return internal_error(&e);
    }

    success(json!({ "deleted": true }))
}
