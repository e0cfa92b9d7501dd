// src/store/mod.rs
//
// Persistence seams for the lifecycle engine and the notification system.
// Services take these as `Arc<dyn Trait>` so unit tests can run against the
// in-memory implementation instead of Postgres.

pub mod pg;

#[cfg(test)]
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    AppointmentRow, AppointmentStatus, NotificationRow, NotificationStatus, OrgMember, Role,
};
use crate::notify::event::NotificationData;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    Database(#[from] sqlx::Error),
    #[error("{0}")]
    Other(String),
}

/// Field values for a new appointment row. Exactly one of user_id/supplier_id
/// must be set; the route layer derives that from the session role.
#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub organization_id: Uuid,
    pub user_id: Option<Uuid>,
    pub supplier_id: Option<Uuid>,
    pub delivery_type_id: Uuid,
    pub date: DateTime<Utc>,
    pub note: Option<String>,
    pub created_by_user_id: Uuid,
}

/// Absolute target values for one status transition. The executor computes
/// these from the row it authorized against; the store applies them only if
/// the status it read is still current (compare-and-swap).
#[derive(Debug, Clone)]
pub struct StatusChange {
    pub status: AppointmentStatus,
    pub date: DateTime<Utc>,
    pub previous_status: Option<AppointmentStatus>,
    pub requested_date: Option<DateTime<Utc>>,
    pub note: Option<String>,
    pub delivery_type_id: Uuid,
    pub updated_by_user_id: Uuid,
}

#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn create(&self, new: &NewAppointment) -> Result<AppointmentRow, StoreError>;

    /// Soft-deleted rows are not returned.
    async fn find_by_id(&self, appointment_id: Uuid) -> Result<Option<AppointmentRow>, StoreError>;

    /// Conditional write: applies `change` only while the row's status still
    /// equals `expected`. `None` means no row matched: either the status
    /// moved concurrently or the appointment is gone; the caller re-reads to
    /// tell the two apart.
    async fn apply_transition(
        &self,
        appointment_id: Uuid,
        expected: AppointmentStatus,
        change: &StatusChange,
    ) -> Result<Option<AppointmentRow>, StoreError>;
}

/// Outcome of a batched notification insert. `errors` holds per-row failures
/// that were isolated and skipped.
#[derive(Debug, Default)]
pub struct BatchInsertReport {
    pub created: u32,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct NotificationQuery {
    pub page: i64,
    pub limit: i64,
    pub status: Option<NotificationStatus>,
    pub event_type: Option<String>,
}

#[derive(Debug)]
pub struct NotificationPageResult {
    pub notifications: Vec<NotificationRow>,
    pub total: i64,
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Persists all rows inside one transaction; a single row's failure is
    /// recorded in the report and must not suppress its siblings.
    async fn insert_batch(&self, items: &[NotificationData]) -> Result<BatchInsertReport, StoreError>;

    /// Rows targeted at the principal, newest first.
    async fn find_for_principal(
        &self,
        principal_id: Uuid,
        query: &NotificationQuery,
    ) -> Result<NotificationPageResult, StoreError>;

    /// Returns false when no row belongs to the principal.
    async fn mark_read(&self, notification_id: Uuid, principal_id: Uuid) -> Result<bool, StoreError>;

    async fn mark_archived(
        &self,
        notification_id: Uuid,
        principal_id: Uuid,
    ) -> Result<bool, StoreError>;

    /// Returns the number of rows flipped to read.
    async fn mark_all_read(&self, principal_id: Uuid) -> Result<u64, StoreError>;

    async fn count_unread(&self, principal_id: Uuid) -> Result<i64, StoreError>;
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Active members of an organization, optionally filtered to a role set.
    async fn active_members(
        &self,
        organization_id: Uuid,
        roles: Option<&[Role]>,
    ) -> Result<Vec<OrgMember>, StoreError>;
}
