use axum::extract::{Extension, Query};
use axum::response::Response;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::common::response::{
    bad_request, forbidden, internal_error, not_found, success, success_with, unauthorized,
};
use crate::domains::organisation::{OrgRole, Organisation};
use crate::server::app::AppState;
use crate::server::middleware::AuthUser;

/// GET /api/roles - org roles with member counts
pub async fn list_roles(
    Extension(state): Extension<AppState>,
    auth: Option<Extension<AuthUser>>,
) -> Response {
    let Some(Extension(user)) = auth else {
        return unauthorized();
    };

    match OrgRole::list_with_counts(user.organisation_id, &state.db_pool).await {
        Ok(roles) => success(json!({ "roles": roles })),
        Err(e) => internal_error(&e),
    }
}

#[derive(Deserialize)]
pub struct CreateRoleRequest {
    pub name: Option<String>,
}

/// POST /api/roles - create a role (manager only)
pub async fn create_role(
    Extension(state): Extension<AppState>,
    auth: Option<Extension<AuthUser>>,
    axum::Json(body): axum::Json<CreateRoleRequest>,
) -> Response {
    let Some(Extension(user)) = auth else {
        return unauthorized();
    };
    if !user.is_manager() {
        return forbidden("Forbidden");
    }
    let name = body.name.unwrap_or_default();
    let name = name.trim();
    if name.is_empty() {
        return bad_request("Role name is required");
    }

    match OrgRole::find_by_name(name, user.organisation_id, &state.db_pool).await {
        Ok(Some(_)) => return bad_request("A role with this name already exists"),
        Ok(None) => {}
        Err(e) => return internal_error(&e),
    }

    match OrgRole::insert(name, user.organisation_id, &state.db_pool).await {
        Ok(role) => success_with(axum::http::StatusCode::CREATED, json!({ "role": role })),
        Err(e) => internal_error(&e),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRoleRequest {
    pub role_id: Option<Uuid>,
}

/// DELETE /api/roles - delete a role (manager only). Shifts tagged with it
/// keep their historic reference.
pub async fn delete_role(
    Extension(state): Extension<AppState>,
    auth: Option<Extension<AuthUser>>,
    axum::Json(body): axum::Json<DeleteRoleRequest>,
) -> Response {
    let Some(Extension(user)) = auth else {
        return unauthorized();
    };
    if !user.is_manager() {
        return forbidden("Forbidden");
    }
    let Some(role_id) = body.role_id else {
        return bad_request("roleId is required");
    };

    match OrgRole::find_in_org(role_id, user.organisation_id, &state.db_pool).await {
        Ok(Some(_)) => {}
        Ok(None) => return not_found("Role not found"),
        Err(e) => return internal_error(&e),
    }

    match OrgRole::delete(role_id, &state.db_pool).await {
        Ok(()) => success(json!({ "deleted": true })),
        Err(e) => internal_error(&e),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAssignmentsRequest {
    pub role_ids: Option<Vec<Uuid>>,
}

/// PATCH /api/roles - replace the caller's own role assignments
pub async fn update_assignments(
    Extension(state): Extension<AppState>,
    auth: Option<Extension<AuthUser>>,
    axum::Json(body): axum::Json<UpdateAssignmentsRequest>,
) -> Response {
    let Some(Extension(user)) = auth else {
        return unauthorized();
    };
    let Some(role_ids) = body.role_ids else {
        return bad_request("roleIds must be an array");
    };

    match OrgRole::replace_assignments(
        user.member_id,
        user.organisation_id,
        &role_ids,
        &state.db_pool,
    )
    .await
    {
        Ok(()) => success(json!({ "updated": true })),
        Err(e) => internal_error(&e),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicRolesQuery {
    pub join_code: Option<String>,
}

/// GET /api/roles/public?joinCode=XXXXXXXX - roles offered on the join form.
/// Unauthenticated by design: the join code is the credential.
pub async fn public_roles(
    Extension(state): Extension<AppState>,
    Query(query): Query<PublicRolesQuery>,
) -> Response {
    let Some(join_code) = query.join_code else {
        return bad_request("joinCode is required");
    };

    let org = match Organisation::find_by_join_code(&join_code, &state.db_pool).await {
        Ok(Some(org)) => org,
        Ok(None) => return not_found("Invalid join code"),
        Err(e) => return internal_error(&e),
    };

    match OrgRole::list_for_org(org.id, &state.db_pool).await {
        Ok(roles) => {
            let roles: Vec<serde_json::Value> = roles
                .iter()
                .map(|r| json!({ "id": r.id, "name": r.name }))
                .collect();
            success(json!({ "roles": roles }))
        }
        Err(e) => internal_error(&e),
    }
}
