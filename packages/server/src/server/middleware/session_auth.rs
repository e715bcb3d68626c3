use axum::{middleware::Next, response::Response};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::domains::auth::JwtService;
use crate::domains::member::MemberRole;
use crate::domains::shifts::Actor;

/// Authenticated principal resolved from the session token
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub member_id: Uuid,
    pub organisation_id: Uuid,
    pub role: MemberRole,
    pub name: String,
    pub email: String,
}

impl AuthUser {
    pub fn is_manager(&self) -> bool {
        self.role == MemberRole::Manager
    }

    /// The lifecycle engine's view of this principal
    pub fn actor(&self) -> Actor {
        Actor {
            member_id: self.member_id,
            organisation_id: self.organisation_id,
            role: self.role,
            name: self.name.clone(),
        }
    }
}

/// Session authentication middleware
///
/// Extracts the session token from the Authorization header, verifies it, and
/// adds AuthUser to request extensions. If no token or an invalid token,
/// the request continues without AuthUser (handlers decide whether to 401).
pub async fn session_auth_middleware(
    jwt_service: Arc<JwtService>,
    mut request: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let auth_user = extract_auth_user(&request, &jwt_service);

    if let Some(user) = auth_user {
        debug!(member_id = %user.member_id, org = %user.organisation_id, "Authenticated");
        request.extensions_mut().insert(user);
    } else {
        debug!("No valid session token");
    }

    next.run(request).await
}

/// Extract and verify the session token from a request
fn extract_auth_user(
    request: &axum::http::Request<axum::body::Body>,
    jwt_service: &JwtService,
) -> Option<AuthUser> {
    // Get Authorization header
    let auth_header = request.headers().get("authorization")?;
    let auth_str = auth_header.to_str().ok()?;

    // Extract token (handle both "Bearer <token>" and raw token)
    let token = auth_str.strip_prefix("Bearer ").unwrap_or(auth_str);

    // Verify token
    let claims = jwt_service.verify_token(token).ok()?;

    Some(AuthUser {
        member_id: claims.member_id,
        organisation_id: claims.organisation_id,
        role: claims.role,
        name: claims.name,
        email: claims.email,
    })
}
