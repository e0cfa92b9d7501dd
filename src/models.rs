use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::engine::executor::AppointmentActionExecutor;
use crate::notify::dispatcher::NotificationDispatcher;
use crate::store::{AppointmentStore, NotificationStore};

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub session_ttl_hours: i64,
    pub appointments: Arc<dyn AppointmentStore>,
    pub notifications: Arc<dyn NotificationStore>,
    pub dispatcher: Arc<NotificationDispatcher>,
    pub executor: Arc<AppointmentActionExecutor>,
}

/* -------------------------
   Domain enums
--------------------------*/

/// Stored as smallint: 0 user, 1 admin, 2 super_admin, 3 supplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "smallint")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(i16)]
pub enum Role {
    User = 0,
    Admin = 1,
    SuperAdmin = 2,
    Supplier = 3,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Admin => "ADMIN",
            Role::SuperAdmin => "SUPER_ADMIN",
            Role::Supplier => "SUPPLIER",
        }
    }

    /// Organization admins review requests; users and suppliers open them.
    pub fn is_reviewer(&self) -> bool {
        matches!(self, Role::Admin | Role::SuperAdmin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Appointment lifecycle status, stored as smallint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "smallint")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(i16)]
pub enum AppointmentStatus {
    PendingConfirmation = 0,
    Confirmed = 1,
    CancellationRequested = 2,
    RescheduleRequested = 3,
    Cancelled = 4,
    Rejected = 5,
    Rescheduled = 6,
    RescheduleConfirmed = 7,
    RescheduleRejected = 8,
    CancellationRejected = 9,
    Completed = 10,
    SupplierNoShow = 11,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::PendingConfirmation => "PENDING_CONFIRMATION",
            AppointmentStatus::Confirmed => "CONFIRMED",
            AppointmentStatus::CancellationRequested => "CANCELLATION_REQUESTED",
            AppointmentStatus::RescheduleRequested => "RESCHEDULE_REQUESTED",
            AppointmentStatus::Cancelled => "CANCELLED",
            AppointmentStatus::Rejected => "REJECTED",
            AppointmentStatus::Rescheduled => "RESCHEDULED",
            AppointmentStatus::RescheduleConfirmed => "RESCHEDULE_CONFIRMED",
            AppointmentStatus::RescheduleRejected => "RESCHEDULE_REJECTED",
            AppointmentStatus::CancellationRejected => "CANCELLATION_REJECTED",
            AppointmentStatus::Completed => "COMPLETED",
            AppointmentStatus::SupplierNoShow => "SUPPLIER_NO_SHOW",
        }
    }

    /// No action-driven transition is defined out of a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Cancelled
                | AppointmentStatus::Rejected
                | AppointmentStatus::Completed
                | AppointmentStatus::SupplierNoShow
        )
    }
}

impl std::fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored as smallint: 0 unread, 1 read, 2 archived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "smallint")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(i16)]
pub enum NotificationStatus {
    Unread = 0,
    Read = 1,
    Archived = 2,
}

/* -------------------------
   DB Row Models
--------------------------*/

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AppointmentRow {
    pub appointment_id: Uuid,
    pub organization_id: Uuid,
    pub user_id: Option<Uuid>,
    pub supplier_id: Option<Uuid>,
    pub delivery_type_id: Uuid,
    pub date: DateTime<Utc>,
    pub status: AppointmentStatus,
    /// Status the appointment held before the currently open
    /// cancellation/reschedule request, if any.
    pub previous_status: Option<AppointmentStatus>,
    /// Proposed date of an open reschedule request.
    pub requested_date: Option<DateTime<Utc>>,
    pub note: Option<String>,
    pub created_by_user_id: Uuid,
    pub updated_by_user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AppointmentRow {
    /// Creator account id. Exactly one of user_id/supplier_id is set for a
    /// persisted appointment.
    pub fn creator_id(&self) -> Option<Uuid> {
        self.user_id.or(self.supplier_id)
    }

    pub fn is_creator(&self, principal_id: Uuid) -> bool {
        self.creator_id() == Some(principal_id)
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct NotificationRow {
    pub notification_id: Uuid,
    pub organization_id: Uuid,
    pub user_id: Option<Uuid>,
    pub supplier_id: Option<Uuid>,
    pub appointment_id: Option<Uuid>,
    pub event_type: String,
    pub title: String,
    pub content: String,
    pub payload: Option<serde_json::Value>,
    pub status: NotificationStatus,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct UserRow {
    pub user_id: Uuid,
    pub organization_id: Uuid,
    pub username: String,
    pub display_name: String,
    pub password_hash: String,
    pub role: Role,
    pub is_active: bool,
}

/// Minimal member projection used by recipient resolution.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OrgMember {
    pub user_id: Uuid,
    pub role: Role,
}

#[derive(Debug, sqlx::FromRow)]
pub struct SessionTokenRow {
    pub session_token_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DeliveryTypeRow {
    pub delivery_type_id: Uuid,
    pub organization_id: Uuid,
    pub display_name: String,
    pub default_duration_min: Option<i32>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/* -------------------------
   API DTOs
--------------------------*/

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    pub device_name: Option<String>,
    pub remember_me: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub data: LoginResponseData,
}

#[derive(Debug, Serialize)]
pub struct LoginResponseData {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserProfile,
    pub organization: OrganizationProfile,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub data: MeResponseData,
}

#[derive(Debug, Serialize)]
pub struct MeResponseData {
    pub user: UserProfile,
    pub organization: OrganizationProfile,
    pub session: SessionInfo,
}

#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub data: OkData,
}

#[derive(Debug, Serialize)]
pub struct OkData {
    pub ok: bool,
}

#[derive(Debug, Serialize)]
pub struct UserProfile {
    pub user_id: Uuid,
    pub username: String,
    pub display_name: String,
    pub role: Role,
}

#[derive(Debug, Serialize)]
pub struct OrganizationProfile {
    pub organization_id: Uuid,
    pub organization_name: String,
}

#[derive(Debug, Serialize)]
pub struct SessionInfo {
    pub session_token_id: Uuid,
    pub expires_at: DateTime<Utc>,
}
