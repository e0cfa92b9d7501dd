// src/notify/event.rs

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Appointment lifecycle events the notification system fans out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    AppointmentCreated,
    AppointmentConfirmed,
    AppointmentRejected,
    AppointmentCancelled,
    AppointmentRescheduled,
    AppointmentCancellationRequested,
    AppointmentRescheduleRequested,
    AppointmentUpdated,
    AppointmentCompleted,
    AppointmentSupplierNoShow,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::AppointmentCreated => "APPOINTMENT_CREATED",
            EventType::AppointmentConfirmed => "APPOINTMENT_CONFIRMED",
            EventType::AppointmentRejected => "APPOINTMENT_REJECTED",
            EventType::AppointmentCancelled => "APPOINTMENT_CANCELLED",
            EventType::AppointmentRescheduled => "APPOINTMENT_RESCHEDULED",
            EventType::AppointmentCancellationRequested => "APPOINTMENT_CANCELLATION_REQUESTED",
            EventType::AppointmentRescheduleRequested => "APPOINTMENT_RESCHEDULE_REQUESTED",
            EventType::AppointmentUpdated => "APPOINTMENT_UPDATED",
            EventType::AppointmentCompleted => "APPOINTMENT_COMPLETED",
            EventType::AppointmentSupplierNoShow => "APPOINTMENT_SUPPLIER_NO_SHOW",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One lifecycle occurrence, constructed per action and never persisted.
/// Metadata keys follow the client contract: `reason`, `newDate`,
/// `previousDate`, `previousStatus`, `changes`.
#[derive(Debug, Clone)]
pub struct NotificationEvent {
    pub event_type: EventType,
    pub appointment_id: Uuid,
    pub organization_id: Uuid,
    pub triggered_by_user_id: Uuid,
    pub metadata: Option<Map<String, Value>>,
}

/// Recipient of a single notification row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationTarget {
    User(Uuid),
    Supplier(Uuid),
}

/// A notification as computed by a handler, before persistence.
#[derive(Debug, Clone)]
pub struct NotificationData {
    pub organization_id: Uuid,
    pub target: NotificationTarget,
    pub appointment_id: Option<Uuid>,
    pub event_type: EventType,
    pub title: String,
    pub content: String,
    pub payload: Option<Value>,
}

impl NotificationData {
    pub fn target_user_id(&self) -> Option<Uuid> {
        match self.target {
            NotificationTarget::User(id) => Some(id),
            NotificationTarget::Supplier(_) => None,
        }
    }

    pub fn target_supplier_id(&self) -> Option<Uuid> {
        match self.target {
            NotificationTarget::User(_) => None,
            NotificationTarget::Supplier(id) => Some(id),
        }
    }
}
