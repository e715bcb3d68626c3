//! Registration and login.
//!
//! One endpoint, three actions (as the original client expects):
//! `create-org` registers the first manager and their organisation,
//! `join-org` registers a staff member via join code, `login` signs in.

use axum::extract::Extension;
use axum::response::Response;
use serde::Deserialize;
use serde_json::json;

use crate::common::response::{bad_request, internal_error, success, unauthorized};
use crate::domains::auth::password::{hash_password, verify_password};
use crate::domains::member::{Member, MemberRole};
use crate::domains::organisation::Organisation;
use crate::server::app::AppState;
use crate::server::middleware::AuthUser;

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthRequest {
    pub action: String,
    #[serde(default)]
    pub org_name: Option<String>,
    #[serde(default)]
    pub join_code: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub staff_title: Option<String>,
}

/// POST /api/auth
pub async fn auth_handler(
    Extension(state): Extension<AppState>,
    axum::Json(body): axum::Json<AuthRequest>,
) -> Response {
    match body.action.as_str() {
        "create-org" => create_organisation(&state, body).await,
        "join-org" => join_organisation(&state, body).await,
        "login" => login(&state, body).await,
        _ => bad_request("Invalid action"),
    }
}

/// GET /api/auth/session - current member and organisation for a valid token.
/// Reads from the database rather than echoing claims, so a member removed
/// since the token was issued gets a 401.
pub async fn get_session(
    Extension(state): Extension<AppState>,
    auth: Option<Extension<AuthUser>>,
) -> Response {
    let Some(Extension(user)) = auth else {
        return unauthorized();
    };

    let member = match Member::find_in_org(user.member_id, user.organisation_id, &state.db_pool)
        .await
    {
        Ok(Some(member)) => member,
        Ok(None) => return unauthorized(),
        Err(e) => return internal_error(&e),
    };
    let org = match Organisation::find_by_id(user.organisation_id, &state.db_pool).await {
        Ok(Some(org)) => org,
        Ok(None) => return unauthorized(),
        Err(e) => return internal_error(&e),
    };

    success(json!({
        "member": member_json(&member),
        "organisation": { "id": org.id, "name": org.name },
    }))
}

fn member_json(member: &Member) -> serde_json::Value {
    json!({
        "id": member.id,
        "name": member.name,
        "email": member.email,
        "role": member.role,
        "staffTitle": member.staff_title,
    })
}

async fn create_organisation(state: &AppState, body: AuthRequest) -> Response {
    let (Some(org_name), Some(name), Some(email), Some(password)) =
        (body.org_name, body.name, body.email, body.password)
    else {
        return bad_request("All fields are required");
    };
    if org_name.is_empty() || name.is_empty() || email.is_empty() {
        return bad_request("All fields are required");
    }
    if password.len() < MIN_PASSWORD_LEN {
        return bad_request("Password must be at least 6 characters");
    }

    let join_code = match Organisation::unused_join_code(&state.db_pool).await {
        Ok(code) => code,
        Err(e) => return internal_error(&e),
    };
    let password_hash = match hash_password(&password) {
        Ok(hash) => hash,
        Err(e) => return internal_error(&anyhow::anyhow!("password hashing failed: {}", e)),
    };

    // Organisation and its first manager are created atomically.
    let result: anyhow::Result<(Organisation, Member)> = async {
        let mut tx = state.db_pool.begin().await?;
        let org = Organisation::insert(&mut *tx, &org_name, &join_code).await?;
        let member = Member::insert(
            &mut *tx,
            org.id,
            &name,
            &email,
            &password_hash,
            MemberRole::Manager,
            None,
        )
        .await?;
        tx.commit().await?;
        Ok((org, member))
    }
    .await;

    let (org, member) = match result {
        Ok(pair) => pair,
        Err(e) => return internal_error(&e),
    };

    issue_session(state, &member, &org, true)
}

async fn join_organisation(state: &AppState, body: AuthRequest) -> Response {
    let (Some(join_code), Some(name), Some(email), Some(password)) =
        (body.join_code, body.name, body.email, body.password)
    else {
        return bad_request("All fields are required");
    };
    if password.len() < MIN_PASSWORD_LEN {
        return bad_request("Password must be at least 6 characters");
    }

    let org = match Organisation::find_by_join_code(&join_code, &state.db_pool).await {
        Ok(Some(org)) => org,
        Ok(None) => return bad_request("Invalid join code"),
        Err(e) => return internal_error(&e),
    };

    match Member::find_by_email_in_org(&email, org.id, &state.db_pool).await {
        Ok(Some(_)) => {
            return bad_request("This email is already registered in this organisation")
        }
        Ok(None) => {}
        Err(e) => return internal_error(&e),
    }

    let password_hash = match hash_password(&password) {
        Ok(hash) => hash,
        Err(e) => return internal_error(&anyhow::anyhow!("password hashing failed: {}", e)),
    };

    let member = match Member::insert(
        &state.db_pool,
        org.id,
        &name,
        &email,
        &password_hash,
        MemberRole::Staff,
        body.staff_title.as_deref(),
    )
    .await
    {
        Ok(member) => member,
        Err(e) => return internal_error(&e),
    };

    issue_session(state, &member, &org, false)
}

async fn login(state: &AppState, body: AuthRequest) -> Response {
    let (Some(email), Some(password)) = (body.email, body.password) else {
        return bad_request("Email and password are required");
    };

    // The same email can exist in more than one organisation; try each.
    let members = match Member::find_all_by_email(&email, &state.db_pool).await {
        Ok(members) => members,
        Err(e) => return internal_error(&e),
    };

    for member in &members {
        match verify_password(&password, &member.password_hash) {
            Ok(true) => {
                let org =
                    match Organisation::find_by_id(member.organisation_id, &state.db_pool).await {
                        Ok(Some(org)) => org,
                        Ok(None) => continue,
                        Err(e) => return internal_error(&e),
                    };
                return issue_session(state, member, &org, false);
            }
            Ok(false) => {}
            Err(e) => {
                return internal_error(&anyhow::anyhow!("password verification failed: {}", e))
            }
        }
    }

    bad_request("Invalid email or password")
}

fn issue_session(
    state: &AppState,
    member: &Member,
    org: &Organisation,
    include_join_code: bool,
) -> Response {
    let Some(role) = MemberRole::parse(&member.role) else {
        return internal_error(&anyhow::anyhow!("member {} has unknown role", member.id));
    };

    let token = match state.jwt.create_token(
        member.id,
        org.id,
        role,
        member.name.clone(),
        member.email.clone(),
    ) {
        Ok(token) => token,
        Err(e) => return internal_error(&e),
    };

    let organisation = if include_join_code {
        json!({ "id": org.id, "name": org.name, "joinCode": org.join_code })
    } else {
        json!({ "id": org.id, "name": org.name })
    };

    success(json!({
        "member": member_json(member),
        "organisation": organisation,
        "token": token,
    }))
}
