use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use chrono::{Duration, Utc};

use axum::extract::Path;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::{generate_access_token, hash_access_token, hash_password, verify_password},
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::*,
};

// Session types stored on session_token rows
const SESSION_TYPE_UNDEFINED: i16 = 0;
const SESSION_TYPE_USER_PORTAL: i16 = 1;
const SESSION_TYPE_SUPPLIER_PORTAL: i16 = 2;

fn is_known_session_type(st: i16) -> bool {
    matches!(
        st,
        SESSION_TYPE_UNDEFINED | SESSION_TYPE_USER_PORTAL | SESSION_TYPE_SUPPLIER_PORTAL
    )
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        // Supplier portal login: same credential shape, enforces role=supplier
        .route("/supplier/login", post(supplier_login))
        .route("/me", get(me))
        .route("/logout", post(logout))
        // Rotate access token for the current session (invalidates old token immediately)
        .route("/refresh", post(refresh))
        .route("/sessions", get(list_sessions))
        .route("/sessions/revoke_all", post(revoke_all_sessions))
        .route("/sessions/{session_token_id}/revoke", post(revoke_session))
        .route("/change_password", post(change_password))
        .route("/reset_password", post(reset_password))
}

async fn load_organization(
    state: &AppState,
    organization_id: Uuid,
) -> Result<OrganizationProfile, ApiError> {
    let organization_name: Option<String> = sqlx::query_scalar(
        r#"
        SELECT organization_name
        FROM organization
        WHERE organization_id = $1
        "#,
    )
    .bind(organization_id)
    .fetch_optional(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    Ok(OrganizationProfile {
        organization_id,
        organization_name: organization_name.unwrap_or_else(|| "Organization".to_string()),
    })
}

async fn login_with_type(
    state: &AppState,
    req: &LoginRequest,
    session_type: i16,
    required_role: Option<Role>,
) -> Result<LoginResponse, ApiError> {
    let username = req.username.trim();
    if username.is_empty() || req.password.is_empty() {
        return Err(ApiError::BadRequest(
            "username and password are required".into(),
        ));
    }
    if !is_known_session_type(session_type) {
        return Err(ApiError::BadRequest(format!(
            "unknown session_type: {session_type}"
        )));
    }

    // 1) Load account
    let account: UserRow = sqlx::query_as::<_, UserRow>(
        r#"
        SELECT user_id, organization_id, username, display_name, password_hash, role, is_active
        FROM app_user
        WHERE username = $1
        "#,
    )
    .bind(username)
    .fetch_optional(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?
    .ok_or_else(ApiError::invalid_credentials)?;

    if !account.is_active {
        return Err(ApiError::Forbidden("Account is disabled".into()));
    }

    if let Some(rr) = required_role {
        if account.role != rr {
            return Err(ApiError::Forbidden(
                "Account type not allowed for this login".into(),
            ));
        }
    }

    // 2) Verify password
    if !verify_password(&req.password, &account.password_hash) {
        return Err(ApiError::invalid_credentials());
    }

    // 3) Load the account's organization
    let organization = load_organization(state, account.organization_id).await?;

    // 4) Create session_token
    let access_token = generate_access_token();
    let token_hash = hash_access_token(&access_token);

    let ttl_hours = if req.remember_me.unwrap_or(false) {
        24 * 7
    } else {
        state.session_ttl_hours
    };

    let expires_at = Utc::now() + Duration::hours(ttl_hours);

    let session: SessionTokenRow = sqlx::query_as::<_, SessionTokenRow>(
        r#"
        INSERT INTO session_token
            (user_id, session_token_hash, session_type, device_name, expires_at)
        VALUES
            ($1, $2, $3, $4, $5)
        RETURNING session_token_id, expires_at
        "#,
    )
    .bind(account.user_id)
    .bind(&token_hash)
    .bind(session_type)
    .bind(req.device_name.as_deref())
    .bind(expires_at)
    .fetch_one(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    Ok(LoginResponse {
        data: LoginResponseData {
            access_token,
            expires_at: session.expires_at,
            user: UserProfile {
                user_id: account.user_id,
                username: account.username,
                display_name: account.display_name,
                role: account.role,
            },
            organization,
        },
    })
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let resp = login_with_type(&state, &req, SESSION_TYPE_USER_PORTAL, None).await?;
    Ok(Json(resp))
}

pub async fn supplier_login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let resp =
        login_with_type(&state, &req, SESSION_TYPE_SUPPLIER_PORTAL, Some(Role::Supplier)).await?;
    Ok(Json(resp))
}

pub async fn me(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<MeResponse>, ApiError> {
    let account: UserRow = sqlx::query_as::<_, UserRow>(
        r#"
        SELECT user_id, organization_id, username, display_name, password_hash, role, is_active
        FROM app_user
        WHERE user_id = $1
        "#,
    )
    .bind(auth.user_id)
    .fetch_optional(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?
    .ok_or_else(ApiError::session_expired)?;

    if !account.is_active {
        return Err(ApiError::session_expired());
    }

    let organization = load_organization(&state, account.organization_id).await?;

    // Load session token (ensure still active)
    let session: SessionTokenRow = sqlx::query_as::<_, SessionTokenRow>(
        r#"
        SELECT session_token_id, expires_at
        FROM session_token
        WHERE session_token_id = $1
          AND user_id = $2
          AND revoked_at IS NULL
          AND expires_at > now()
        "#,
    )
    .bind(auth.session_token_id)
    .bind(auth.user_id)
    .fetch_optional(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?
    .ok_or_else(ApiError::session_expired)?;

    Ok(Json(MeResponse {
        data: MeResponseData {
            user: UserProfile {
                user_id: account.user_id,
                username: account.username,
                display_name: account.display_name,
                role: account.role,
            },
            organization,
            session: SessionInfo {
                session_token_id: session.session_token_id,
                expires_at: session.expires_at,
            },
        },
    }))
}

pub async fn logout(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<OkResponse>, ApiError> {
    let rows = sqlx::query(
        r#"
        UPDATE session_token
        SET revoked_at = now()
        WHERE session_token_id = $1
          AND user_id = $2
          AND revoked_at IS NULL
        "#,
    )
    .bind(auth.session_token_id)
    .bind(auth.user_id)
    .execute(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    if rows.rows_affected() == 0 {
        return Err(ApiError::session_expired());
    }

    Ok(Json(OkResponse {
        data: OkData { ok: true },
    }))
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub data: RefreshData,
}

#[derive(Debug, Serialize)]
pub struct RefreshData {
    pub ok: bool,
    pub access_token: String,
    pub expires_at: chrono::DateTime<chrono::Utc>,
    pub session_token_id: Uuid,
}

/// POST /api/v1/auth/refresh
/// Rotates the access token for the *current* session. The old token stops
/// working immediately, the session_token_id stays the same.
pub async fn refresh(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<RefreshResponse>, ApiError> {
    let new_token = generate_access_token();
    let new_hash = hash_access_token(&new_token);

    let row: Option<(chrono::DateTime<chrono::Utc>,)> = sqlx::query_as(
        r#"
        UPDATE session_token
        SET session_token_hash = $1,
            last_seen_at = now()
        WHERE session_token_id = $2
          AND user_id = $3
          AND revoked_at IS NULL
          AND expires_at > now()
        RETURNING expires_at
        "#,
    )
    .bind(new_hash)
    .bind(auth.session_token_id)
    .bind(auth.user_id)
    .fetch_optional(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    let expires_at = row.ok_or_else(ApiError::session_expired)?.0;

    Ok(Json(RefreshResponse {
        data: RefreshData {
            ok: true,
            access_token: new_token,
            expires_at,
            session_token_id: auth.session_token_id,
        },
    }))
}

/* =========================
   Session management
   ========================= */

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct SessionListItem {
    pub session_token_id: Uuid,
    pub session_type: i16,
    pub device_name: Option<String>,
    pub expires_at: chrono::DateTime<chrono::Utc>,
    pub last_seen_at: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize)]
pub struct ListSessionsResponse {
    pub data: ListSessionsData,
}

#[derive(Debug, Serialize)]
pub struct ListSessionsData {
    pub sessions: Vec<SessionListItem>,
    pub current_session_token_id: Uuid,
}

pub async fn list_sessions(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ListSessionsResponse>, ApiError> {
    // active sessions only: not revoked, not expired
    let rows: Vec<SessionListItem> = sqlx::query_as::<_, SessionListItem>(
        r#"
        SELECT
            session_token_id,
            session_type,
            device_name,
            expires_at,
            last_seen_at,
            created_at
        FROM session_token
        WHERE user_id = $1
          AND revoked_at IS NULL
          AND expires_at > now()
        ORDER BY last_seen_at DESC NULLS LAST, created_at DESC
        "#,
    )
    .bind(auth.user_id)
    .fetch_all(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    Ok(Json(ListSessionsResponse {
        data: ListSessionsData {
            sessions: rows,
            current_session_token_id: auth.session_token_id,
        },
    }))
}

#[derive(Debug, Serialize)]
pub struct RevokeOneResponse {
    pub data: RevokeOneData,
}

#[derive(Debug, Serialize)]
pub struct RevokeOneData {
    pub ok: bool,
    pub revoked_session_token_id: Uuid,
}

pub async fn revoke_session(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(session_token_id): Path<Uuid>,
) -> Result<Json<RevokeOneResponse>, ApiError> {
    // Revoke only your own session
    let res = sqlx::query(
        r#"
        UPDATE session_token
        SET revoked_at = now()
        WHERE session_token_id = $1
          AND user_id = $2
          AND revoked_at IS NULL
        "#,
    )
    .bind(session_token_id)
    .bind(auth.user_id)
    .execute(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    if res.rows_affected() == 0 {
        return Err(ApiError::NotFound(
            "session not found, already revoked, or not yours".into(),
        ));
    }

    Ok(Json(RevokeOneResponse {
        data: RevokeOneData {
            ok: true,
            revoked_session_token_id: session_token_id,
        },
    }))
}

#[derive(Debug, Serialize)]
pub struct RevokeAllResponse {
    pub data: RevokeAllData,
}

#[derive(Debug, Serialize)]
pub struct RevokeAllData {
    pub ok: bool,
    pub revoked_count: i64,
}

pub async fn revoke_all_sessions(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<RevokeAllResponse>, ApiError> {
    // Revoke everything except the current session (and only active ones)
    let res = sqlx::query(
        r#"
        UPDATE session_token
        SET revoked_at = now()
        WHERE user_id = $1
          AND revoked_at IS NULL
          AND expires_at > now()
          AND session_token_id <> $2
        "#,
    )
    .bind(auth.user_id)
    .bind(auth.session_token_id)
    .execute(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    Ok(Json(RevokeAllResponse {
        data: RevokeAllData {
            ok: true,
            revoked_count: res.rows_affected() as i64,
        },
    }))
}

/* =========================
   Password management
   ========================= */

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct ChangePasswordResponse {
    pub data: OkData,
}

fn validate_new_password(pw: &str) -> Result<(), ApiError> {
    let pw = pw.trim();
    if pw.len() < 8 {
        return Err(ApiError::BadRequest(
            "new_password must be at least 8 characters".into(),
        ));
    }
    Ok(())
}

pub async fn change_password(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<Json<ChangePasswordResponse>, ApiError> {
    if req.old_password.is_empty() || req.new_password.is_empty() {
        return Err(ApiError::BadRequest(
            "old_password and new_password are required".into(),
        ));
    }
    validate_new_password(&req.new_password)?;

    // Load current hash
    let row: (String,) = sqlx::query_as(
        r#"
        SELECT password_hash
        FROM app_user
        WHERE user_id = $1
          AND is_active = true
        "#,
    )
    .bind(auth.user_id)
    .fetch_optional(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?
    .ok_or_else(ApiError::session_expired)?;

    // Verify old password; invalid_credentials avoids leaking which part failed
    if !verify_password(&req.old_password, &row.0) {
        return Err(ApiError::invalid_credentials());
    }

    let new_hash = hash_password(&req.new_password).map_err(ApiError::Internal)?;

    // Transaction so the password change and session revocation land together
    let mut tx = state
        .db
        .begin()
        .await
        .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    sqlx::query(
        r#"
        UPDATE app_user
        SET password_hash = $1
        WHERE user_id = $2
        "#,
    )
    .bind(new_hash)
    .bind(auth.user_id)
    .execute(&mut *tx)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    // Revoke all OTHER active sessions (keep current)
    sqlx::query(
        r#"
        UPDATE session_token
        SET revoked_at = now()
        WHERE user_id = $1
          AND revoked_at IS NULL
          AND expires_at > now()
          AND session_token_id <> $2
        "#,
    )
    .bind(auth.user_id)
    .bind(auth.session_token_id)
    .execute(&mut *tx)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    tx.commit()
        .await
        .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    Ok(Json(ChangePasswordResponse {
        data: OkData { ok: true },
    }))
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub username: String,
    /// If omitted, backend generates a temporary password and returns it.
    pub new_password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ResetPasswordResponse {
    pub data: ResetPasswordData,
}

#[derive(Debug, Serialize)]
pub struct ResetPasswordData {
    pub ok: bool,
    pub user_id: Uuid,
    pub username: String,
    pub temporary_password: Option<String>,
}

fn ensure_org_admin(auth: &AuthContext) -> Result<(), ApiError> {
    if auth.role.is_reviewer() {
        Ok(())
    } else {
        Err(ApiError::Forbidden(
            "Only organization admins can reset passwords".into(),
        ))
    }
}

fn generate_temp_password() -> String {
    // Secure RNG + URL-safe encoding, trimmed to something copyable.
    crate::auth::generate_access_token().chars().take(20).collect()
}

pub async fn reset_password(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<Json<ResetPasswordResponse>, ApiError> {
    ensure_org_admin(&auth)?;

    let username = req.username.trim();
    if username.is_empty() {
        return Err(ApiError::BadRequest("username is required".into()));
    }

    let (new_pw, return_pw) = match req
        .new_password
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        Some(pw) => {
            validate_new_password(pw)?;
            (pw.to_string(), None)
        }
        None => {
            let temp = generate_temp_password();
            validate_new_password(&temp)?;
            (temp.clone(), Some(temp))
        }
    };

    let new_hash = hash_password(&new_pw).map_err(ApiError::Internal)?;

    let mut tx = state
        .db
        .begin()
        .await
        .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    // Find target user inside the caller's organization
    let target: (Uuid, String) = sqlx::query_as(
        r#"
        SELECT user_id, username
        FROM app_user
        WHERE username = $1
          AND organization_id = $2
        "#,
    )
    .bind(username)
    .bind(auth.organization_id)
    .fetch_optional(&mut *tx)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?
    .ok_or_else(|| ApiError::NotFound("user not found".into()))?;

    sqlx::query(
        r#"
        UPDATE app_user
        SET password_hash = $1
        WHERE user_id = $2
        "#,
    )
    .bind(new_hash)
    .bind(target.0)
    .execute(&mut *tx)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    // Revoke ALL active sessions for that user
    sqlx::query(
        r#"
        UPDATE session_token
        SET revoked_at = now()
        WHERE user_id = $1
          AND revoked_at IS NULL
        "#,
    )
    .bind(target.0)
    .execute(&mut *tx)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    tx.commit()
        .await
        .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    Ok(Json(ResetPasswordResponse {
        data: ResetPasswordData {
            ok: true,
            user_id: target.0,
            username: target.1,
            temporary_password: return_pw,
        },
    }))
}
