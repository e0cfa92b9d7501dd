// src/routes/user_routes.rs
//
// Organization member management. All queries are scoped to the caller's
// organization.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::hash_password,
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{AppState, Role},
};

fn ensure_org_admin(auth: &AuthContext) -> Result<(), ApiError> {
    if auth.role.is_reviewer() {
        Ok(())
    } else {
        Err(ApiError::Forbidden(
            "Only organization admins can manage members".into(),
        ))
    }
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct UserPublicRow {
    pub user_id: Uuid,
    pub username: String,
    pub display_name: String,
    pub role: Role,
    pub is_active: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize)]
pub struct UsersListResponse {
    pub data: UsersListData,
}

#[derive(Debug, Serialize)]
pub struct UsersListData {
    pub users: Vec<UserPublicRow>,
}

#[derive(Debug, Serialize)]
pub struct UserGetResponse {
    pub data: UserPublicRow,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub display_name: String,
    pub password: String,
    pub role: Role,
    pub is_active: Option<bool>, // default true
}

#[derive(Debug, Serialize)]
pub struct CreateUserResponse {
    pub data: UserPublicRow,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub display_name: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct UpdateUserResponse {
    pub data: UserPublicRow,
}

#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub data: OkData,
}

#[derive(Debug, Serialize)]
pub struct OkData {
    pub ok: bool,
}

pub fn router() -> Router<AppState> {
    Router::new()
        // /api/v1/users
        .route("/", get(list_users).post(create_user))
        // /api/v1/users/{user_id}
        .route("/{user_id}", get(get_user).patch(update_user))
        .route("/{user_id}/disable", post(disable_user))
        .route("/{user_id}/enable", post(enable_user))
}

pub async fn list_users(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<UsersListResponse>, ApiError> {
    ensure_org_admin(&auth)?;

    let users: Vec<UserPublicRow> = sqlx::query_as::<_, UserPublicRow>(
        r#"
        SELECT user_id, username, display_name, role, is_active, created_at
        FROM app_user
        WHERE organization_id = $1
        ORDER BY created_at DESC
        LIMIT 200
        "#,
    )
    .bind(auth.organization_id)
    .fetch_all(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    Ok(Json(UsersListResponse {
        data: UsersListData { users },
    }))
}

pub async fn get_user(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserGetResponse>, ApiError> {
    ensure_org_admin(&auth)?;

    let user: UserPublicRow = sqlx::query_as::<_, UserPublicRow>(
        r#"
        SELECT user_id, username, display_name, role, is_active, created_at
        FROM app_user
        WHERE user_id = $1
          AND organization_id = $2
        "#,
    )
    .bind(user_id)
    .bind(auth.organization_id)
    .fetch_optional(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?
    .ok_or_else(|| ApiError::NotFound("user not found".into()))?;

    Ok(Json(UserGetResponse { data: user }))
}

fn validate_username(username: &str) -> Result<(), ApiError> {
    let u = username.trim();
    if u.is_empty() {
        return Err(ApiError::BadRequest("username is required".into()));
    }
    if u.len() < 3 {
        return Err(ApiError::BadRequest(
            "username must be at least 3 characters".into(),
        ));
    }
    Ok(())
}

fn validate_display_name(display_name: &str) -> Result<(), ApiError> {
    let d = display_name.trim();
    if d.is_empty() {
        return Err(ApiError::BadRequest("display_name is required".into()));
    }
    Ok(())
}

fn validate_password(pw: &str) -> Result<(), ApiError> {
    let p = pw.trim();
    if p.len() < 8 {
        return Err(ApiError::BadRequest(
            "password must be at least 8 characters".into(),
        ));
    }
    Ok(())
}

pub async fn create_user(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateUserRequest>,
) -> Result<Json<CreateUserResponse>, ApiError> {
    ensure_org_admin(&auth)?;

    validate_username(&req.username)?;
    validate_display_name(&req.display_name)?;
    validate_password(&req.password)?;

    // Only a super admin may mint another super admin.
    if req.role == Role::SuperAdmin && auth.role != Role::SuperAdmin {
        return Err(ApiError::Forbidden(
            "Only a super admin can create super admins".into(),
        ));
    }

    let username = req.username.trim().to_string();
    let display_name = req.display_name.trim().to_string();
    let is_active = req.is_active.unwrap_or(true);

    let pw_hash = hash_password(req.password.trim()).map_err(ApiError::Internal)?;

    let user: UserPublicRow = sqlx::query_as::<_, UserPublicRow>(
        r#"
        INSERT INTO app_user (organization_id, username, display_name, password_hash, role, is_active)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING user_id, username, display_name, role, is_active, created_at
        "#,
    )
    .bind(auth.organization_id)
    .bind(&username)
    .bind(&display_name)
    .bind(&pw_hash)
    .bind(req.role)
    .bind(is_active)
    .fetch_one(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    Ok(Json(CreateUserResponse { data: user }))
}

pub async fn update_user(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(user_id): Path<Uuid>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<UpdateUserResponse>, ApiError> {
    ensure_org_admin(&auth)?;

    // Load existing
    let existing: UserPublicRow = sqlx::query_as::<_, UserPublicRow>(
        r#"
        SELECT user_id, username, display_name, role, is_active, created_at
        FROM app_user
        WHERE user_id = $1
          AND organization_id = $2
        "#,
    )
    .bind(user_id)
    .bind(auth.organization_id)
    .fetch_optional(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?
    .ok_or_else(|| ApiError::NotFound("user not found".into()))?;

    let display_name = match req.display_name.as_deref().map(str::trim) {
        Some(s) if !s.is_empty() => {
            validate_display_name(s)?;
            s.to_string()
        }
        _ => existing.display_name.clone(),
    };

    let role = match req.role {
        Some(r) => {
            if r == Role::SuperAdmin && auth.role != Role::SuperAdmin {
                return Err(ApiError::Forbidden(
                    "Only a super admin can grant super admin".into(),
                ));
            }
            r
        }
        None => existing.role,
    };

    let is_active = req.is_active.unwrap_or(existing.is_active);

    let updated: UserPublicRow = sqlx::query_as::<_, UserPublicRow>(
        r#"
        UPDATE app_user
        SET display_name = $1,
            role = $2,
            is_active = $3
        WHERE user_id = $4
          AND organization_id = $5
        RETURNING user_id, username, display_name, role, is_active, created_at
        "#,
    )
    .bind(&display_name)
    .bind(role)
    .bind(is_active)
    .bind(user_id)
    .bind(auth.organization_id)
    .fetch_one(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    Ok(Json(UpdateUserResponse { data: updated }))
}

pub async fn disable_user(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(user_id): Path<Uuid>,
) -> Result<Json<OkResponse>, ApiError> {
    ensure_org_admin(&auth)?;

    let res = sqlx::query(
        r#"
        UPDATE app_user
        SET is_active = false
        WHERE user_id = $1
          AND organization_id = $2
        "#,
    )
    .bind(user_id)
    .bind(auth.organization_id)
    .execute(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    if res.rows_affected() == 0 {
        return Err(ApiError::NotFound("user not found".into()));
    }

    Ok(Json(OkResponse {
        data: OkData { ok: true },
    }))
}

pub async fn enable_user(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(user_id): Path<Uuid>,
) -> Result<Json<OkResponse>, ApiError> {
    ensure_org_admin(&auth)?;

    let res = sqlx::query(
        r#"
        UPDATE app_user
        SET is_active = true
        WHERE user_id = $1
          AND organization_id = $2
        "#,
    )
    .bind(user_id)
    .bind(auth.organization_id)
    .execute(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    if res.rows_affected() == 0 {
        return Err(ApiError::NotFound("user not found".into()));
    }

    Ok(Json(OkResponse {
        data: OkData { ok: true },
    }))
}
