// src/store/pg.rs

use async_trait::async_trait;
use sqlx::{Acquire, PgPool};
use uuid::Uuid;

use crate::models::{AppointmentRow, AppointmentStatus, NotificationRow, OrgMember, Role};
use crate::notify::event::NotificationData;

use super::{
    AppointmentStore, BatchInsertReport, NewAppointment, NotificationPageResult,
    NotificationQuery, NotificationStore, StatusChange, StoreError, UserDirectory,
};

const APPOINTMENT_COLS: &str = r#"
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
"#;

/// Postgres-backed implementation of all three store seams.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AppointmentStore for PgStore {
    async fn create(&self, new: &NewAppointment) -> Result<AppointmentRow, StoreError> {
        let row = sqlx::query_as::<_, AppointmentRow>(&format!(
            r#"
            INSERT INTO appointment (
              organization_id,
              user_id,
              supplier_id,
              delivery_type_id,
              date,
              status,
              note,
              created_by_user_id,
              updated_by_user_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            RETURNING {APPOINTMENT_COLS}
            "#
        ))
        .bind(new.organization_id)
        .bind(new.user_id)
        .bind(new.supplier_id)
        .bind(new.delivery_type_id)
        .bind(new.date)
        .bind(AppointmentStatus::PendingConfirmation)
        .bind(new.note.as_deref())
        .bind(new.created_by_user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn find_by_id(&self, appointment_id: Uuid) -> Result<Option<AppointmentRow>, StoreError> {
        let row = sqlx::query_as::<_, AppointmentRow>(&format!(
            r#"
            SELECT {APPOINTMENT_COLS}
            FROM appointment
            WHERE appointment_id = $1
              AND deleted_at IS NULL
            "#
        ))
        .bind(appointment_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn apply_transition(
        &self,
        appointment_id: Uuid,
        expected: AppointmentStatus,
        change: &StatusChange,
    ) -> Result<Option<AppointmentRow>, StoreError> {
        // The status guard in the WHERE clause is the lost-update check: a
        // concurrent transition moves the status and this UPDATE matches
        // nothing.
        let row = sqlx::query_as::<_, AppointmentRow>(&format!(
            r#"
            UPDATE appointment
            SET status = $3,
                date = $4,
                previous_status = $5,
                requested_date = $6,
                note = $7,
                delivery_type_id = $8,
                updated_by_user_id = $9,
                updated_at = now()
            WHERE appointment_id = $1
              AND status = $2
              AND deleted_at IS NULL
            RETURNING {APPOINTMENT_COLS}
            "#
        ))
        .bind(appointment_id)
        .bind(expected)
        .bind(change.status)
        .bind(change.date)
        .bind(change.previous_status)
        .bind(change.requested_date)
        .bind(change.note.as_deref())
        .bind(change.delivery_type_id)
        .bind(change.updated_by_user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}

#[async_trait]
impl NotificationStore for PgStore {
    async fn insert_batch(
        &self,
        items: &[NotificationData],
    ) -> Result<BatchInsertReport, StoreError> {
        let mut tx = self.pool.begin().await?;
        let mut report = BatchInsertReport::default();

        for item in items {
            // Savepoint per row: one failed insert rolls back to here and the
            // loop keeps going for the remaining recipients.
            let inserted = async {
                let mut sp = tx.begin().await?;
                sqlx::query(
                    r#"
                    INSERT INTO notification (
                      organization_id,
                      user_id,
                      supplier_id,
                      appointment_id,
                      event_type,
                      title,
                      content,
                      payload,
                      status
                    )
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 0)
                    "#,
                )
                .bind(item.organization_id)
                .bind(item.target_user_id())
                .bind(item.target_supplier_id())
                .bind(item.appointment_id)
                .bind(item.event_type.as_str())
                .bind(&item.title)
                .bind(&item.content)
                .bind(item.payload.as_ref())
                .execute(&mut *sp)
                .await?;
                sp.commit().await
            }
            .await;

            match inserted {
                Ok(()) => report.created += 1,
                Err(e) => {
                    tracing::warn!(
                        event_type = %item.event_type,
                        error = %e,
                        "failed to persist notification row, skipping recipient"
                    );
                    report.errors.push(format!(
                        "failed to persist {} notification: {e}",
                        item.event_type
                    ));
                }
            }
        }

        tx.commit().await?;
        Ok(report)
    }

    async fn find_for_principal(
        &self,
        principal_id: Uuid,
        query: &NotificationQuery,
    ) -> Result<NotificationPageResult, StoreError> {
        let offset = (query.page - 1) * query.limit;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM notification
            WHERE (user_id = $1 OR supplier_id = $1)
              AND ($2::smallint IS NULL OR status = $2)
              AND ($3::text IS NULL OR event_type = $3)
            "#,
        )
        .bind(principal_id)
        .bind(query.status)
        .bind(query.event_type.as_deref())
        .fetch_one(&self.pool)
        .await?;

        let notifications = sqlx::query_as::<_, NotificationRow>(
            r#"
            SELECT
              notification_id,
              organization_id,
              user_id,
              supplier_id,
              appointment_id,
              event_type,
              title,
              content,
              payload,
              status,
              read_at,
              created_at
            FROM notification
            WHERE (user_id = $1 OR supplier_id = $1)
              AND ($2::smallint IS NULL OR status = $2)
              AND ($3::text IS NULL OR event_type = $3)
            ORDER BY created_at DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(principal_id)
        .bind(query.status)
        .bind(query.event_type.as_deref())
        .bind(query.limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(NotificationPageResult {
            notifications,
            total,
        })
    }

    async fn mark_read(
        &self,
        notification_id: Uuid,
        principal_id: Uuid,
    ) -> Result<bool, StoreError> {
        let res = sqlx::query(
            r#"
            UPDATE notification
            SET status = 1,
                read_at = now()
            WHERE notification_id = $1
              AND (user_id = $2 OR supplier_id = $2)
            "#,
        )
        .bind(notification_id)
        .bind(principal_id)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn mark_archived(
        &self,
        notification_id: Uuid,
        principal_id: Uuid,
    ) -> Result<bool, StoreError> {
        let res = sqlx::query(
            r#"
            UPDATE notification
            SET status = 2
            WHERE notification_id = $1
              AND (user_id = $2 OR supplier_id = $2)
            "#,
        )
        .bind(notification_id)
        .bind(principal_id)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn mark_all_read(&self, principal_id: Uuid) -> Result<u64, StoreError> {
        let res = sqlx::query(
            r#"
            UPDATE notification
            SET status = 1,
                read_at = now()
            WHERE (user_id = $1 OR supplier_id = $1)
              AND status = 0
            "#,
        )
        .bind(principal_id)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected())
    }

    async fn count_unread(&self, principal_id: Uuid) -> Result<i64, StoreError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM notification
            WHERE (user_id = $1 OR supplier_id = $1)
              AND status = 0
            "#,
        )
        .bind(principal_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}

#[async_trait]
impl UserDirectory for PgStore {
    async fn active_members(
        &self,
        organization_id: Uuid,
        roles: Option<&[Role]>,
    ) -> Result<Vec<OrgMember>, StoreError> {
        let members = match roles {
            Some(roles) => {
                let codes: Vec<i16> = roles.iter().map(|r| *r as i16).collect();
                sqlx::query_as::<_, OrgMember>(
                    r#"
                    SELECT user_id, role
                    FROM app_user
                    WHERE organization_id = $1
                      AND is_active = true
                      AND role = ANY($2)
                    "#,
                )
                .bind(organization_id)
                .bind(codes)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, OrgMember>(
                    r#"
                    SELECT user_id, role
                    FROM app_user
                    WHERE organization_id = $1
                      AND is_active = true
                    "#,
                )
                .bind(organization_id)
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(members)
    }
}
