// src/routes/delivery_type_routes.rs

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::{
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{AppState, DeliveryTypeRow},
};

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list_delivery_types).post(create_delivery_type))
}

pub async fn list_delivery_types(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<Vec<DeliveryTypeRow>>, ApiError> {
    let rows: Vec<DeliveryTypeRow> = sqlx::query_as::<_, DeliveryTypeRow>(
        r#"
        SELECT
          delivery_type_id,
          organization_id,
          display_name,
          default_duration_min,
          is_active,
          created_at,
          updated_at
        FROM delivery_type
        WHERE organization_id = $1
          AND is_active = true
        ORDER BY display_name ASC
        "#,
    )
    .bind(auth.organization_id)
    .fetch_all(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    Ok(Json(rows))
}

#[derive(Debug, Deserialize)]
pub struct CreateDeliveryTypeRequest {
    pub display_name: String,
    pub default_duration_min: Option<i32>,
}

pub async fn create_delivery_type(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateDeliveryTypeRequest>,
) -> Result<Json<DeliveryTypeRow>, ApiError> {
    if !auth.role.is_reviewer() {
        return Err(ApiError::Forbidden(
            "Only organization admins can manage delivery types".into(),
        ));
    }

    let name = req.display_name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("display_name is required".into()));
    }
    if let Some(min) = req.default_duration_min {
        if min <= 0 {
            return Err(ApiError::BadRequest(
                "default_duration_min must be positive".into(),
            ));
        }
    }

    let row: DeliveryTypeRow = sqlx::query_as::<_, DeliveryTypeRow>(
        r#"
        INSERT INTO delivery_type (organization_id, display_name, default_duration_min, is_active)
        VALUES ($1, $2, $3, true)
        RETURNING
          delivery_type_id,
          organization_id,
          display_name,
          default_duration_min,
          is_active,
          created_at,
          updated_at
        "#,
    )
    .bind(auth.organization_id)
    .bind(name)
    .bind(req.default_duration_min)
    .fetch_one(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    Ok(Json(row))
}
