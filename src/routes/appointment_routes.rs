// src/routes/appointment_routes.rs

use axum::{
    extract::{Path, Query, State},
    routing::{get, patch, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    engine::authorizer::{allowed_actions, AllowedActions, AppointmentAction},
    engine::executor::ActionPayload,
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{AppState, AppointmentRow, Role},
    notify::event::{EventType, NotificationEvent},
    store::{AppointmentStore as _, NewAppointment},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/appointments", get(list_appointments).post(create_appointment))
        .route(
            "/appointments/{appointment_id}",
            get(get_appointment).delete(delete_appointment),
        )
        .route("/appointments/{appointment_id}/action", patch(appointment_action))
        .route(
            "/appointments/{appointment_id}/allowed_actions",
            get(get_allowed_actions),
        )
}

/* ============================================================
   Response DTOs
   ============================================================ */

#[derive(Debug, Serialize)]
pub struct ApiOk<T> {
    pub data: T,
}

/* ============================================================
   GET /appointments
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

pub async fn list_appointments(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(q): Query<ListQuery>,
) -> Result<Json<ApiOk<Vec<AppointmentRow>>>, ApiError> {
    // Suppliers see their own bookings; organization members see the whole
    // organization.
    let supplier_scope = if auth.role == Role::Supplier {
        Some(auth.user_id)
    } else {
        None
    };

    let rows: Vec<AppointmentRow> = sqlx::query_as::<_, AppointmentRow>(
        r#"
        SELECT
          appointment_id,
          organization_id,
          user_id,
          supplier_id,
          delivery_type_id,
          date,
          status,
          previous_status,
          requested_date,
          note,
          created_by_user_id,
          updated_by_user_id,
          created_at,
          updated_at
        FROM appointment
        WHERE organization_id = $1
          AND deleted_at IS NULL
          AND ($2::uuid IS NULL OR supplier_id = $2)
          AND ($3::timestamptz IS NULL OR date >= $3)
          AND ($4::timestamptz IS NULL OR date < $4)
        ORDER BY date ASC
        LIMIT 500
        "#,
    )
    .bind(auth.organization_id)
    .bind(supplier_scope)
    .bind(q.from)
    .bind(q.to)
    .fetch_all(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    Ok(Json(ApiOk { data: rows }))
}

/* ============================================================
   GET /appointments/{id}
   ============================================================ */

async fn load_scoped_appointment(
    state: &AppState,
    auth: &AuthContext,
    appointment_id: Uuid,
) -> Result<AppointmentRow, ApiError> {
    let row = state
        .appointments
        .find_by_id(appointment_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("appointment not found".into()))?;

    let in_scope = auth.role == Role::SuperAdmin || row.organization_id == auth.organization_id;
    if !in_scope {
        // foreign tenant: indistinguishable from missing
        return Err(ApiError::NotFound("appointment not found".into()));
    }
    if auth.role == Role::Supplier && row.supplier_id != Some(auth.user_id) {
        return Err(ApiError::NotFound("appointment not found".into()));
    }
    Ok(row)
}

pub async fn get_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<ApiOk<AppointmentRow>>, ApiError> {
    let row = load_scoped_appointment(&state, &auth, appointment_id).await?;
    Ok(Json(ApiOk { data: row }))
}

/* ============================================================
   POST /appointments (create)
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct CreateAppointmentRequest {
    pub delivery_type_id: Uuid,
    pub date: DateTime<Utc>,
    pub note: Option<String>,
}

pub async fn create_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateAppointmentRequest>,
) -> Result<Json<ApiOk<AppointmentRow>>, ApiError> {
    // The creator side is derived from the session: suppliers own their
    // bookings through supplier_id, everyone else through user_id.
    let (user_id, supplier_id) = if auth.role == Role::Supplier {
        (None, Some(auth.user_id))
    } else {
        (Some(auth.user_id), None)
    };

    let row = state
        .appointments
        .create(&NewAppointment {
            organization_id: auth.organization_id,
            user_id,
            supplier_id,
            delivery_type_id: req.delivery_type_id,
            date: req.date,
            note: req.note,
            created_by_user_id: auth.user_id,
        })
        .await?;

    let outcome = state
        .dispatcher
        .dispatch(&NotificationEvent {
            event_type: EventType::AppointmentCreated,
            appointment_id: row.appointment_id,
            organization_id: row.organization_id,
            triggered_by_user_id: auth.user_id,
            metadata: None,
        })
        .await;
    if !outcome.success {
        tracing::warn!(
            appointment_id = %row.appointment_id,
            errors = ?outcome.errors,
            "creation notifications failed"
        );
    }

    Ok(Json(ApiOk { data: row }))
}

/* ============================================================
   PATCH /appointments/{id}/action
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct ActionRequest {
    pub action: String,
    pub payload: Option<ActionPayload>,
}

pub async fn appointment_action(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(appointment_id): Path<Uuid>,
    Json(req): Json<ActionRequest>,
) -> Result<Json<ApiOk<AppointmentRow>>, ApiError> {
    let action = AppointmentAction::parse(&req.action)
        .ok_or_else(|| ApiError::BadRequest(format!("unknown action: {}", req.action)))?;
    let payload = req.payload.unwrap_or_default();

    let updated = state
        .executor
        .execute(appointment_id, &auth.actor(), action, &payload)
        .await?;

    Ok(Json(ApiOk { data: updated }))
}

/* ============================================================
   GET /appointments/{id}/allowed_actions
   ============================================================ */

pub async fn get_allowed_actions(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<ApiOk<AllowedActions>>, ApiError> {
    let row = load_scoped_appointment(&state, &auth, appointment_id).await?;
    let allowed = allowed_actions(auth.role, row.status, row.date, Utc::now());
    Ok(Json(ApiOk { data: allowed }))
}

/* ============================================================
   DELETE /appointments/{id} (soft delete)
   ============================================================ */

pub async fn delete_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<ApiOk<bool>>, ApiError> {
    if !auth.role.is_reviewer() {
        return Err(ApiError::Forbidden(
            "Only organization admins can delete appointments".into(),
        ));
    }

    let res = sqlx::query(
        r#"
        UPDATE appointment
        SET deleted_at = now(),
            updated_by_user_id = $3,
            updated_at = now()
        WHERE appointment_id = $1
          AND organization_id = $2
          AND deleted_at IS NULL
        "#,
    )
    .bind(appointment_id)
    .bind(auth.organization_id)
    .bind(auth.user_id)
    .execute(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    if res.rows_affected() == 0 {
        return Err(ApiError::NotFound("appointment not found".into()));
    }

    Ok(Json(ApiOk { data: true }))
}
