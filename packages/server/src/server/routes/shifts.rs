use axum::extract::{Extension, Query};
use axum::http::StatusCode;
use axum::response::Response;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::common::pagination::PageParams;
use crate::common::response::{
    bad_request, conflict, forbidden, internal_error, not_found, success, success_with,
    unauthorized,
};
use crate::domains::member::Member;
use crate::domains::organisation::OrgRole;
use crate::domains::shifts::{
    PostShift, Shift, ShiftAction, ShiftError, ShiftListFilter, ShiftStatus, ShiftViewer,
};
use crate::kernel::ShiftEvent;
use crate::server::app::AppState;
use crate::server::middleware::AuthUser;

#[derive(Deserialize)]
pub struct ListShiftsQuery {
    pub status: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// GET /api/shifts - paginated listing. Managers see everything and may
/// filter by status; staff always see the open pool plus their own shifts.
pub async fn list_shifts(
    Extension(state): Extension<AppState>,
    auth: Option<Extension<AuthUser>>,
    Query(query): Query<ListShiftsQuery>,
) -> Response {
    let Some(Extension(user)) = auth else {
        return unauthorized();
    };

    let status = match query.status.as_deref() {
        None | Some("") | Some("ALL") => None,
        Some(s) => match ShiftStatus::parse(s) {
            Some(status) => Some(status),
            None => return bad_request("Invalid status filter"),
        },
    };

    let page = PageParams {
        page: query.page.unwrap_or(1),
        limit: query.limit.unwrap_or(PageParams::default().limit),
    };
    let filter = ShiftListFilter {
        status,
        limit: page.limit(),
        offset: page.offset(),
    };
    let viewer = ShiftViewer {
        member_id: user.member_id,
        role: user.role,
    };

    match state
        .lifecycle
        .store()
        .list(user.organisation_id, &filter, &viewer)
        .await
    {
        Ok((shifts, total)) => success(json!({
            "shifts": shifts,
            "total": total,
            "page": page.page(),
            "limit": page.limit(),
        })),
        Err(e) => internal_error(&e.0),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateShiftRequest {
    pub title: Option<String>,
    pub date: Option<NaiveDate>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub original_owner_id: Option<Uuid>,
    pub required_role_id: Option<Uuid>,
    pub reason: Option<String>,
}

/// POST /api/shifts - post a shift for swap. Staff post their own; managers
/// may post on behalf of any member of the organisation.
pub async fn create_shift(
    Extension(state): Extension<AppState>,
    auth: Option<Extension<AuthUser>>,
    axum::Json(body): axum::Json<CreateShiftRequest>,
) -> Response {
    let Some(Extension(user)) = auth else {
        return unauthorized();
    };

    let title = body.title.unwrap_or_default().trim().to_string();
    let start_time = body.start_time.unwrap_or_default().trim().to_string();
    let end_time = body.end_time.unwrap_or_default().trim().to_string();
    if title.is_empty() || start_time.is_empty() || end_time.is_empty() {
        return bad_request("title, date, startTime and endTime are required");
    }
    let Some(date) = body.date else {
        return bad_request("title, date, startTime and endTime are required");
    };

    let owner_id = body.original_owner_id.unwrap_or(user.member_id);
    let owner = match Member::find_in_org(owner_id, user.organisation_id, &state.db_pool).await {
        Ok(Some(owner)) => owner,
        Ok(None) => return bad_request("Shift owner is not a member of this organisation"),
        Err(e) => return internal_error(&e),
    };

    if let Some(role_id) = body.required_role_id {
        match OrgRole::find_in_org(role_id, user.organisation_id, &state.db_pool).await {
            Ok(Some(_)) => {}
            Ok(None) => return bad_request("Required role does not exist"),
            Err(e) => return internal_error(&e),
        }
    }

    let owner_name = owner.name.clone();
    let input = PostShift {
        title,
        date,
        start_time,
        end_time,
        original_owner_id: owner.id,
        owner_name: owner_name.clone(),
        required_role_id: body.required_role_id,
        reason: body.reason.filter(|r| !r.trim().is_empty()),
    };

    let shift = match state.lifecycle.post_shift(&user.actor(), input).await {
        Ok(shift) => shift,
        Err(e) => return shift_error_response(e),
    };

    spawn_dispatch(&state, shift.clone(), ShiftEvent::Posted { owner_name });
    success_with(StatusCode::CREATED, json!({ "shift": shift }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionRequest {
    pub shift_id: Option<Uuid>,
    pub action: Option<String>,
    pub version: Option<i64>,
}

/// PATCH /api/shifts - apply a lifecycle transition with the version the
/// client last saw. Stale versions are rejected with 409; the client
/// refetches and retries.
pub async fn transition_shift(
    Extension(state): Extension<AppState>,
    auth: Option<Extension<AuthUser>>,
    axum::Json(body): axum::Json<TransitionRequest>,
) -> Response {
    let Some(Extension(user)) = auth else {
        return unauthorized();
    };

    let Some(shift_id) = body.shift_id else {
        return bad_request("shiftId is required");
    };
    let Some(action) = body.action.as_deref().and_then(ShiftAction::parse) else {
        return bad_request("action must be one of CLAIM, APPROVE, DECLINE, CANCEL");
    };
    let Some(version) = body.version else {
        return bad_request("version is required");
    };

    let actor = user.actor();
    let shift = match state.lifecycle.apply(&actor, shift_id, action, version).await {
        Ok(shift) => shift,
        Err(e) => return shift_error_response(e),
    };

    if let Some(event) = event_for(&state, &shift, action, &user).await {
        spawn_dispatch(&state, shift.clone(), event);
    }
    success(json!({ "shift": shift }))
}

/// Which notification (if any) a committed transition produces. Cancellation
/// is silent.
async fn event_for(
    state: &AppState,
    shift: &Shift,
    action: ShiftAction,
    user: &AuthUser,
) -> Option<ShiftEvent> {
    match action {
        ShiftAction::Claim => {
            let owner_name = match Member::find_in_org(
                shift.original_owner_id,
                shift.organisation_id,
                &state.db_pool,
            )
            .await
            {
                Ok(Some(owner)) => owner.name,
                Ok(None) => "A colleague".to_string(),
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to resolve shift owner for notification");
                    "A colleague".to_string()
                }
            };
            Some(ShiftEvent::Claimed {
                claimant_name: user.name.clone(),
                owner_name,
            })
        }
        ShiftAction::Approve => Some(ShiftEvent::Approved),
        ShiftAction::Decline => Some(ShiftEvent::Declined),
        ShiftAction::Cancel => None,
    }
}

/// Fire-and-forget fan-out after the transition has committed. Delivery never
/// affects the response.
fn spawn_dispatch(state: &AppState, shift: Shift, event: ShiftEvent) {
    let dispatcher = state.dispatcher.clone();
    tokio::spawn(async move {
        dispatcher.dispatch(&shift, event).await;
    });
}

fn shift_error_response(err: ShiftError) -> Response {
    let message = err.to_string();
    match err {
        ShiftError::NotFound => not_found(&message),
        ShiftError::AlreadyClaimed
        | ShiftError::VersionConflict
        | ShiftError::InvalidTransition => conflict(&message),
        ShiftError::SelfClaimForbidden => bad_request(&message),
        ShiftError::Forbidden(_) => forbidden(&message),
        ShiftError::Store(e) => internal_error(&e.0),
    }
}
