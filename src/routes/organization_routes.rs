// src/routes/organization_routes.rs

use axum::{
    extract::State,
    routing::{get, patch},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/organization", get(get_organization))
        .route("/organization", patch(update_organization))
}

#[derive(Debug, Serialize)]
pub struct OrganizationResponse {
    pub data: OrganizationData,
}

#[derive(Debug, Serialize)]
pub struct OrganizationData {
    pub organization_name: String,
}

pub async fn get_organization(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<OrganizationResponse>, ApiError> {
    let organization_name: Option<String> = sqlx::query_scalar(
        r#"
        SELECT organization_name
        FROM organization
        WHERE organization_id = $1
        "#,
    )
    .bind(auth.organization_id)
    .fetch_optional(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    Ok(Json(OrganizationResponse {
        data: OrganizationData {
            organization_name: organization_name.unwrap_or_else(|| "Organization".to_string()),
        },
    }))
}

#[derive(Debug, Deserialize)]
pub struct UpdateOrganizationRequest {
    pub organization_name: String,
}

fn ensure_org_admin(auth: &AuthContext) -> Result<(), ApiError> {
    if auth.role.is_reviewer() {
        Ok(())
    } else {
        Err(ApiError::Forbidden(
            "Only organization admins can update the organization".into(),
        ))
    }
}

pub async fn update_organization(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<UpdateOrganizationRequest>,
) -> Result<Json<OrganizationResponse>, ApiError> {
    ensure_org_admin(&auth)?;

    let name = req.organization_name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("organization_name is required".into()));
    }

    sqlx::query(
        r#"
        UPDATE organization
        SET organization_name = $1
        WHERE organization_id = $2
        "#,
    )
    .bind(name)
    .bind(auth.organization_id)
    .execute(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    Ok(Json(OrganizationResponse {
        data: OrganizationData {
            organization_name: name.to_string(),
        },
    }))
}
