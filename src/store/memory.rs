// src/store/memory.rs
//
// In-memory store used by unit tests. Mirrors the Postgres semantics the
// engine depends on: soft-delete visibility, the status compare-and-swap,
// and per-row failure isolation in batched notification inserts.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::models::{
    AppointmentRow, AppointmentStatus, NotificationRow, NotificationStatus, OrgMember, Role,
};
use crate::notify::event::NotificationData;

use super::{
    AppointmentStore, BatchInsertReport, NewAppointment, NotificationPageResult,
    NotificationQuery, NotificationStore, StatusChange, StoreError, UserDirectory,
};

#[derive(Default)]
pub struct MemoryStore {
    appointments: Mutex<HashMap<Uuid, AppointmentRow>>,
    notifications: Mutex<Vec<NotificationRow>>,
    members: Mutex<Vec<(Uuid, OrgMember)>>,
    /// Target ids whose notification inserts fail (failure injection).
    poisoned_targets: Mutex<HashSet<Uuid>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_appointment(&self, row: AppointmentRow) {
        self.appointments
            .lock()
            .unwrap()
            .insert(row.appointment_id, row);
    }

    pub fn seed_member(&self, organization_id: Uuid, user_id: Uuid, role: Role) {
        self.members
            .lock()
            .unwrap()
            .push((organization_id, OrgMember { user_id, role }));
    }

    pub fn poison_target(&self, principal_id: Uuid) {
        self.poisoned_targets.lock().unwrap().insert(principal_id);
    }

    pub fn notification_rows(&self) -> Vec<NotificationRow> {
        self.notifications.lock().unwrap().clone()
    }
}

fn target_principal(item: &NotificationData) -> Uuid {
    item.target_user_id()
        .or(item.target_supplier_id())
        .expect("notification target")
}

#[async_trait]
impl AppointmentStore for MemoryStore {
    async fn create(&self, new: &NewAppointment) -> Result<AppointmentRow, StoreError> {
        let now = Utc::now();
        let row = AppointmentRow {
            appointment_id: Uuid::new_v4(),
            organization_id: new.organization_id,
            user_id: new.user_id,
            supplier_id: new.supplier_id,
            delivery_type_id: new.delivery_type_id,
            date: new.date,
            status: AppointmentStatus::PendingConfirmation,
            previous_status: None,
            requested_date: None,
            note: new.note.clone(),
            created_by_user_id: new.created_by_user_id,
            updated_by_user_id: new.created_by_user_id,
            created_at: now,
            updated_at: now,
        };
        self.seed_appointment(row.clone());
        Ok(row)
    }

    async fn find_by_id(&self, appointment_id: Uuid) -> Result<Option<AppointmentRow>, StoreError> {
        Ok(self
            .appointments
            .lock()
            .unwrap()
            .get(&appointment_id)
            .cloned())
    }

    async fn apply_transition(
        &self,
        appointment_id: Uuid,
        expected: AppointmentStatus,
        change: &StatusChange,
    ) -> Result<Option<AppointmentRow>, StoreError> {
        let mut map = self.appointments.lock().unwrap();
        let Some(row) = map.get_mut(&appointment_id) else {
            return Ok(None);
        };
        if row.status != expected {
            return Ok(None);
        }
        row.status = change.status;
        row.date = change.date;
        row.previous_status = change.previous_status;
        row.requested_date = change.requested_date;
        row.note = change.note.clone();
        row.delivery_type_id = change.delivery_type_id;
        row.updated_by_user_id = change.updated_by_user_id;
        row.updated_at = Utc::now();
        Ok(Some(row.clone()))
    }
}

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn insert_batch(
        &self,
        items: &[NotificationData],
    ) -> Result<BatchInsertReport, StoreError> {
        let mut report = BatchInsertReport::default();
        for item in items {
            if self
                .poisoned_targets
                .lock()
                .unwrap()
                .contains(&target_principal(item))
            {
                report
                    .errors
                    .push(format!("failed to persist {} notification", item.event_type));
                continue;
            }
            self.notifications.lock().unwrap().push(NotificationRow {
                notification_id: Uuid::new_v4(),
                organization_id: item.organization_id,
                user_id: item.target_user_id(),
                supplier_id: item.target_supplier_id(),
                appointment_id: item.appointment_id,
                event_type: item.event_type.as_str().to_string(),
                title: item.title.clone(),
                content: item.content.clone(),
                payload: item.payload.clone(),
                status: NotificationStatus::Unread,
                read_at: None,
                created_at: Utc::now(),
            });
            report.created += 1;
        }
        Ok(report)
    }

    async fn find_for_principal(
        &self,
        principal_id: Uuid,
        query: &NotificationQuery,
    ) -> Result<NotificationPageResult, StoreError> {
        let rows = self.notifications.lock().unwrap();
        let mut matched: Vec<NotificationRow> = rows
            .iter()
            .filter(|n| n.user_id == Some(principal_id) || n.supplier_id == Some(principal_id))
            .filter(|n| query.status.map(|s| n.status == s).unwrap_or(true))
            .filter(|n| {
                query
                    .event_type
                    .as_deref()
                    .map(|t| n.event_type == t)
                    .unwrap_or(true)
            })
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = matched.len() as i64;
        let offset = ((query.page - 1) * query.limit).max(0) as usize;
        let notifications = matched
            .into_iter()
            .skip(offset)
            .take(query.limit.max(0) as usize)
            .collect();
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
        let mut rows = self.notifications.lock().unwrap();
        for row in rows.iter_mut() {
            if row.notification_id == notification_id
                && (row.user_id == Some(principal_id) || row.supplier_id == Some(principal_id))
            {
                row.status = NotificationStatus::Read;
                row.read_at = Some(Utc::now());
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn mark_archived(
        &self,
        notification_id: Uuid,
        principal_id: Uuid,
    ) -> Result<bool, StoreError> {
        let mut rows = self.notifications.lock().unwrap();
        for row in rows.iter_mut() {
            if row.notification_id == notification_id
                && (row.user_id == Some(principal_id) || row.supplier_id == Some(principal_id))
            {
                row.status = NotificationStatus::Archived;
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn mark_all_read(&self, principal_id: Uuid) -> Result<u64, StoreError> {
        let mut rows = self.notifications.lock().unwrap();
        let mut flipped = 0;
        for row in rows.iter_mut() {
            if (row.user_id == Some(principal_id) || row.supplier_id == Some(principal_id))
                && row.status == NotificationStatus::Unread
            {
                row.status = NotificationStatus::Read;
                row.read_at = Some(Utc::now());
                flipped += 1;
            }
        }
        Ok(flipped)
    }

    async fn count_unread(&self, principal_id: Uuid) -> Result<i64, StoreError> {
        let rows = self.notifications.lock().unwrap();
        Ok(rows
            .iter()
            .filter(|n| {
                (n.user_id == Some(principal_id) || n.supplier_id == Some(principal_id))
                    && n.status == NotificationStatus::Unread
            })
            .count() as i64)
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn active_members(
        &self,
        organization_id: Uuid,
        roles: Option<&[Role]>,
    ) -> Result<Vec<OrgMember>, StoreError> {
        let members = self.members.lock().unwrap();
        Ok(members
            .iter()
            .filter(|(org, _)| *org == organization_id)
            .filter(|(_, m)| roles.map(|rs| rs.contains(&m.role)).unwrap_or(true))
            .map(|(_, m)| m.clone())
            .collect())
    }
}
