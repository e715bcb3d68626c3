use axum::extract::Extension;
use axum::response::Response;
use serde::Deserialize;
use serde_json::json;

use crate::common::response::{bad_request, internal_error, success, unauthorized};
use crate::domains::push::PushSubscription;
use crate::server::app::AppState;
use crate::server::middleware::AuthUser;

#[derive(Deserialize)]
pub struct SubscriptionKeys {
    pub p256dh: String,
    pub auth: String,
}

#[derive(Deserialize)]
pub struct SubscriptionPayload {
    pub endpoint: String,
    pub keys: SubscriptionKeys,
}

#[derive(Deserialize)]
pub struct SubscribeRequest {
    pub subscription: Option<SubscriptionPayload>,
}

/// POST /api/push - register (or refresh) a push subscription for the caller
pub async fn subscribe(
    Extension(state): Extension<AppState>,
    auth: Option<Extension<AuthUser>>,
    axum::Json(body): axum::Json<SubscribeRequest>,
) -> Response {
    let Some(Extension(user)) = auth else {
        return unauthorized();
    };
    let Some(sub) = body.subscription else {
        return bad_request("subscription is required");
    };
    if sub.endpoint.trim().is_empty() {
        return bad_request("subscription endpoint is required");
    }

    match PushSubscription::upsert(
        user.member_id,
        &sub.endpoint,
        &sub.keys.p256dh,
        &sub.keys.auth,
        &state.db_pool,
    )
    .await
    {
        Ok(_) => success(json!({ "subscribed": true })),
        Err(e) => internal_error(&e),
    }
}

#[derive(Deserialize)]
pub struct UnsubscribeRequest {
    pub endpoint: Option<String>,
}

/// DELETE /api/push - drop the caller's subscription for an endpoint
pub async fn unsubscribe(
    Extension(state): Extension<AppState>,
    auth: Option<Extension<AuthUser>>,
    axum::Json(body): axum::Json<UnsubscribeRequest>,
) -> Response {
    let Some(Extension(user)) = auth else {
        return unauthorized();
    };
    let Some(endpoint) = body.endpoint else {
        return bad_request("endpoint is required");
    };

    match PushSubscription::delete_for_member(&endpoint, user.member_id, &state.db_pool).await {
        Ok(()) => success(json!({ "unsubscribed": true })),
        Err(e) => internal_error(&e),
    }
}
