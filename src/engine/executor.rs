// src/engine/executor.rs

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::engine::authorizer::{allowed_actions, AppointmentAction};
use crate::models::{AppointmentRow, AppointmentStatus, Role};
use crate::notify::dispatcher::NotificationDispatcher;
use crate::notify::event::{EventType, NotificationEvent};
use crate::store::{AppointmentStore, StatusChange, StoreError};

/// The authenticated principal attempting an action. Supplied per request by
/// the session layer, never persisted by the engine.
#[derive(Debug, Clone, Copy)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
    pub organization_id: Uuid,
}

/// Action-specific input. Unused fields are ignored by actions that do not
/// read them.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionPayload {
    pub reason: Option<String>,
    pub new_date: Option<DateTime<Utc>>,
    pub note: Option<String>,
    pub delivery_type_id: Option<Uuid>,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("appointment not found")]
    NotFound,
    #[error("action '{action}' is not allowed while the appointment is {status}")]
    Forbidden {
        action: AppointmentAction,
        status: AppointmentStatus,
    },
    #[error("appointment status changed concurrently, retry with fresh state")]
    Conflict,
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

struct TransitionPlan {
    change: StatusChange,
    event_type: EventType,
    metadata: Option<Map<String, Value>>,
}

/// Runs the read-authorize-write-dispatch sequence for one requested action.
/// Explicitly constructed with its collaborators; no global state.
pub struct AppointmentActionExecutor {
    appointments: Arc<dyn AppointmentStore>,
    dispatcher: Arc<NotificationDispatcher>,
}

impl AppointmentActionExecutor {
    pub fn new(
        appointments: Arc<dyn AppointmentStore>,
        dispatcher: Arc<NotificationDispatcher>,
    ) -> Self {
        Self {
            appointments,
            dispatcher,
        }
    }

    pub async fn execute(
        &self,
        appointment_id: Uuid,
        actor: &Actor,
        action: AppointmentAction,
        payload: &ActionPayload,
    ) -> Result<AppointmentRow, EngineError> {
        let appointment = self
            .appointments
            .find_by_id(appointment_id)
            .await?
            .ok_or(EngineError::NotFound)?;

        // Tenant isolation: a foreign appointment is indistinguishable from a
        // missing one.
        if actor.role != Role::SuperAdmin && appointment.organization_id != actor.organization_id {
            return Err(EngineError::NotFound);
        }

        let now = Utc::now();
        let allowed = allowed_actions(actor.role, appointment.status, appointment.date, now);
        if !allowed.allows(action) {
            return Err(EngineError::Forbidden {
                action,
                status: appointment.status,
            });
        }

        let plan = plan_transition(&appointment, actor, action, payload)?;

        let updated = match self
            .appointments
            .apply_transition(appointment_id, appointment.status, &plan.change)
            .await?
        {
            Some(row) => row,
            // The guarded write matched nothing: either a concurrent action
            // moved the status, or the row is gone. Re-read to tell which.
            None => match self.appointments.find_by_id(appointment_id).await? {
                Some(_) => return Err(EngineError::Conflict),
                None => return Err(EngineError::NotFound),
            },
        };

        let event = NotificationEvent {
            event_type: plan.event_type,
            appointment_id,
            organization_id: updated.organization_id,
            triggered_by_user_id: actor.id,
            metadata: plan.metadata,
        };

        // The transition is committed; notification problems are warnings,
        // never request failures.
        let outcome = self.dispatcher.dispatch(&event).await;
        if !outcome.success {
            tracing::warn!(
                appointment_id = %appointment_id,
                event_type = %event.event_type,
                errors = ?outcome.errors,
                "notification dispatch failed after committed transition"
            );
        }

        Ok(updated)
    }
}

fn plan_transition(
    appointment: &AppointmentRow,
    actor: &Actor,
    action: AppointmentAction,
    payload: &ActionPayload,
) -> Result<TransitionPlan, EngineError> {
    // Start from the row as authorized and overwrite per action.
    let mut change = StatusChange {
        status: appointment.status,
        date: appointment.date,
        previous_status: appointment.previous_status,
        requested_date: appointment.requested_date,
        note: appointment.note.clone(),
        delivery_type_id: appointment.delivery_type_id,
        updated_by_user_id: actor.id,
    };
    let mut metadata = Map::new();

    let event_type = match action {
        AppointmentAction::Approve => {
            change.status = AppointmentStatus::Confirmed;
            EventType::AppointmentConfirmed
        }
        AppointmentAction::Reject => {
            change.status = AppointmentStatus::Rejected;
            EventType::AppointmentRejected
        }
        AppointmentAction::Cancel => {
            change.status = AppointmentStatus::Cancelled;
            clear_request(&mut change);
            push_reason(&mut metadata, payload);
            EventType::AppointmentCancelled
        }
        AppointmentAction::Reschedule => {
            let new_date = require_new_date(payload)?;
            metadata.insert("newDate".into(), json_date(new_date));
            metadata.insert("previousDate".into(), json_date(appointment.date));
            change.date = new_date;
            EventType::AppointmentRescheduled
        }
        AppointmentAction::RequestCancellation => {
            change.status = AppointmentStatus::CancellationRequested;
            change.previous_status = Some(appointment.status);
            push_reason(&mut metadata, payload);
            EventType::AppointmentCancellationRequested
        }
        AppointmentAction::RequestReschedule => {
            let new_date = require_new_date(payload)?;
            change.status = AppointmentStatus::RescheduleRequested;
            change.previous_status = Some(appointment.status);
            change.requested_date = Some(new_date);
            metadata.insert("newDate".into(), json_date(new_date));
            push_reason(&mut metadata, payload);
            EventType::AppointmentRescheduleRequested
        }
        AppointmentAction::ApproveCancellation => {
            change.status = AppointmentStatus::Cancelled;
            push_previous_status(&mut metadata, appointment);
            clear_request(&mut change);
            EventType::AppointmentCancelled
        }
        AppointmentAction::RejectCancellation => {
            change.status = AppointmentStatus::CancellationRejected;
            push_previous_status(&mut metadata, appointment);
            clear_request(&mut change);
            metadata.insert(
                "changes".into(),
                Value::Array(vec![Value::String("cancellation_request_rejected".into())]),
            );
            EventType::AppointmentUpdated
        }
        AppointmentAction::ApproveReschedule => {
            let new_date = appointment.requested_date.ok_or_else(|| {
                EngineError::Validation("no proposed date is on file for this request".into())
            })?;
            change.status = AppointmentStatus::RescheduleConfirmed;
            change.date = new_date;
            clear_request(&mut change);
            metadata.insert("newDate".into(), json_date(new_date));
            metadata.insert("previousDate".into(), json_date(appointment.date));
            EventType::AppointmentRescheduled
        }
        AppointmentAction::RejectReschedule => {
            change.status = AppointmentStatus::RescheduleRejected;
            push_previous_status(&mut metadata, appointment);
            clear_request(&mut change);
            metadata.insert(
                "changes".into(),
                Value::Array(vec![Value::String("reschedule_request_rejected".into())]),
            );
            EventType::AppointmentUpdated
        }
        AppointmentAction::Edit => {
            let mut changed: Vec<Value> = Vec::new();
            if let Some(note) = &payload.note {
                change.note = Some(note.clone());
                changed.push(Value::String("note".into()));
            }
            if let Some(delivery_type_id) = payload.delivery_type_id {
                change.delivery_type_id = delivery_type_id;
                changed.push(Value::String("deliveryTypeId".into()));
            }
            if changed.is_empty() {
                return Err(EngineError::Validation(
                    "edit requires at least one editable field".into(),
                ));
            }
            metadata.insert("changes".into(), Value::Array(changed));
            EventType::AppointmentUpdated
        }
        AppointmentAction::MarkAsNoShow => {
            change.status = AppointmentStatus::SupplierNoShow;
            EventType::AppointmentSupplierNoShow
        }
        AppointmentAction::MarkAsCompleted => {
            change.status = AppointmentStatus::Completed;
            EventType::AppointmentCompleted
        }
    };

    Ok(TransitionPlan {
        change,
        event_type,
        metadata: if metadata.is_empty() {
            None
        } else {
            Some(metadata)
        },
    })
}

fn clear_request(change: &mut StatusChange) {
    change.previous_status = None;
    change.requested_date = None;
}

fn require_new_date(payload: &ActionPayload) -> Result<DateTime<Utc>, EngineError> {
    payload
        .new_date
        .ok_or_else(|| EngineError::Validation("newDate is required for this action".into()))
}

fn push_reason(metadata: &mut Map<String, Value>, payload: &ActionPayload) {
    if let Some(reason) = &payload.reason {
        metadata.insert("reason".into(), Value::String(reason.clone()));
    }
}

fn push_previous_status(metadata: &mut Map<String, Value>, appointment: &AppointmentRow) {
    if let Some(prev) = appointment.previous_status {
        metadata.insert("previousStatus".into(), Value::String(prev.as_str().into()));
    }
}

fn json_date(date: DateTime<Utc>) -> Value {
    Value::String(date.to_rfc3339())
}
