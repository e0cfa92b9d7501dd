// src/notify/handlers.rs

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::models::{AppointmentRow, Role};
use crate::notify::event::{EventType, NotificationData, NotificationEvent, NotificationTarget};
use crate::notify::recipients::RecipientResolver;
use crate::store::StoreError;

/// Everything a handler may consult: the post-transition appointment
/// snapshot (pre-fetched by the dispatcher) and the recipient resolver.
pub struct HandlerContext<'a> {
    pub appointment: Option<&'a AppointmentRow>,
    pub resolver: &'a RecipientResolver,
}

/// One handler per lifecycle event. A closed set: adding an event type means
/// adding a variant here and registering it, without touching dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventHandler {
    Created,
    Confirmed,
    Rejected,
    Completed,
    SupplierNoShow,
    Rescheduled,
    Cancelled,
    CancellationRequested,
    RescheduleRequested,
    Updated,
}

impl EventHandler {
    /// Computes the notifications for one event. Missing appointment or an
    /// unresolvable target is a no-op, not an error.
    pub async fn handle(
        &self,
        event: &NotificationEvent,
        ctx: &HandlerContext<'_>,
    ) -> Result<Vec<NotificationData>, StoreError> {
        let Some(appointment) = ctx.appointment else {
            return Ok(Vec::new());
        };
        let when = appointment.date.format("%Y-%m-%d %H:%M");

        match self {
            EventHandler::Created => {
                member_fan_out(
                    event,
                    appointment,
                    ctx,
                    None,
                    "New appointment",
                    format!("A new appointment for {when} is awaiting review."),
                )
                .await
            }
            EventHandler::Confirmed => Ok(creator_notice(
                event,
                appointment,
                "Appointment confirmed",
                format!("Your appointment on {when} has been confirmed."),
            )),
            EventHandler::Rejected => Ok(creator_notice(
                event,
                appointment,
                "Appointment rejected",
                format!("Your appointment request for {when} was rejected."),
            )),
            EventHandler::Completed => Ok(creator_notice(
                event,
                appointment,
                "Appointment completed",
                format!("Your appointment on {when} was marked as completed."),
            )),
            EventHandler::SupplierNoShow => Ok(creator_notice(
                event,
                appointment,
                "Appointment marked as no-show",
                format!("Your appointment on {when} was marked as a supplier no-show."),
            )),
            EventHandler::Rescheduled => Ok(creator_notice(
                event,
                appointment,
                "Appointment rescheduled",
                format!("Your appointment has been moved to {when}."),
            )),
            EventHandler::Cancelled => {
                // Bidirectional: the side that did not cancel gets told.
                if appointment.is_creator(event.triggered_by_user_id) {
                    member_fan_out(
                        event,
                        appointment,
                        ctx,
                        None,
                        "Appointment cancelled",
                        format!("The appointment on {when} was cancelled by its creator."),
                    )
                    .await
                } else {
                    Ok(creator_notice(
                        event,
                        appointment,
                        "Appointment cancelled",
                        format!("Your appointment on {when} has been cancelled."),
                    ))
                }
            }
            EventHandler::CancellationRequested => {
                member_fan_out(
                    event,
                    appointment,
                    ctx,
                    Some(&[Role::Admin, Role::User]),
                    "Cancellation requested",
                    format!("Cancellation of the appointment on {when} was requested."),
                )
                .await
            }
            EventHandler::RescheduleRequested => {
                member_fan_out(
                    event,
                    appointment,
                    ctx,
                    Some(&[Role::Admin, Role::User]),
                    "Reschedule requested",
                    format!("A new date was proposed for the appointment on {when}."),
                )
                .await
            }
            EventHandler::Updated => {
                // Creators do not need to hear about their own edits.
                if appointment.is_creator(event.triggered_by_user_id) {
                    return Ok(Vec::new());
                }
                Ok(creator_notice(
                    event,
                    appointment,
                    "Appointment updated",
                    format!("Your appointment on {when} was updated."),
                ))
            }
        }
    }
}

/// Event type -> handler. Absence of a registration is a configuration
/// error the dispatcher reports without panicking.
pub struct HandlerRegistry {
    handlers: HashMap<EventType, EventHandler>,
}

impl HandlerRegistry {
    /// Registry with every lifecycle event wired to its handler.
    pub fn standard() -> Self {
        let mut registry = Self {
            handlers: HashMap::new(),
        };
        registry.register(EventType::AppointmentCreated, EventHandler::Created);
        registry.register(EventType::AppointmentConfirmed, EventHandler::Confirmed);
        registry.register(EventType::AppointmentRejected, EventHandler::Rejected);
        registry.register(EventType::AppointmentCompleted, EventHandler::Completed);
        registry.register(
            EventType::AppointmentSupplierNoShow,
            EventHandler::SupplierNoShow,
        );
        registry.register(EventType::AppointmentRescheduled, EventHandler::Rescheduled);
        registry.register(EventType::AppointmentCancelled, EventHandler::Cancelled);
        registry.register(
            EventType::AppointmentCancellationRequested,
            EventHandler::CancellationRequested,
        );
        registry.register(
            EventType::AppointmentRescheduleRequested,
            EventHandler::RescheduleRequested,
        );
        registry.register(EventType::AppointmentUpdated, EventHandler::Updated);
        registry
    }

    #[cfg(test)]
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn register(&mut self, event_type: EventType, handler: EventHandler) {
        self.handlers.insert(event_type, handler);
    }

    pub fn get(&self, event_type: EventType) -> Option<EventHandler> {
        self.handlers.get(&event_type).copied()
    }
}

/* ------------------------------------------------------------
   Shared handler helpers
   ------------------------------------------------------------ */

/// Structured context stored with each row for client rendering: the
/// appointment essentials plus the event metadata.
fn event_payload(event: &NotificationEvent, appointment: &AppointmentRow) -> Value {
    let mut map = Map::new();
    map.insert(
        "appointmentId".into(),
        Value::String(appointment.appointment_id.to_string()),
    );
    map.insert("date".into(), Value::String(appointment.date.to_rfc3339()));
    map.insert(
        "status".into(),
        Value::String(appointment.status.as_str().into()),
    );
    map.insert(
        "deliveryTypeId".into(),
        Value::String(appointment.delivery_type_id.to_string()),
    );
    if let Some(metadata) = &event.metadata {
        for (key, value) in metadata {
            map.insert(key.clone(), value.clone());
        }
    }
    Value::Object(map)
}

/// Single notification aimed at the appointment's creator. Empty when no
/// target resolves.
fn creator_notice(
    event: &NotificationEvent,
    appointment: &AppointmentRow,
    title: &str,
    content: String,
) -> Vec<NotificationData> {
    let target = if let Some(user_id) = appointment.user_id {
        NotificationTarget::User(user_id)
    } else if let Some(supplier_id) = appointment.supplier_id {
        NotificationTarget::Supplier(supplier_id)
    } else {
        return Vec::new();
    };

    vec![NotificationData {
        organization_id: event.organization_id,
        target,
        appointment_id: Some(appointment.appointment_id),
        event_type: event.event_type,
        title: title.to_string(),
        content,
        payload: Some(event_payload(event, appointment)),
    }]
}

/// One notification per eligible organization member, excluding the actor
/// who triggered the event.
async fn member_fan_out(
    event: &NotificationEvent,
    appointment: &AppointmentRow,
    ctx: &HandlerContext<'_>,
    roles: Option<&[Role]>,
    title: &str,
    content: String,
) -> Result<Vec<NotificationData>, StoreError> {
    let members = ctx
        .resolver
        .organization_members(event.organization_id, roles, Some(event.triggered_by_user_id))
        .await?;

    Ok(members
        .into_iter()
        .map(|member| NotificationData {
            organization_id: event.organization_id,
            target: NotificationTarget::User(member.user_id),
            appointment_id: Some(appointment.appointment_id),
            event_type: event.event_type,
            title: title.to_string(),
            content: content.clone(),
            payload: Some(event_payload(event, appointment)),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::{Duration, Utc};
    use uuid::Uuid;

    use crate::models::AppointmentStatus;
    use crate::store::memory::MemoryStore;

    fn appointment(organization_id: Uuid, creator: Uuid) -> AppointmentRow {
        let now = Utc::now();
        AppointmentRow {
            appointment_id: Uuid::new_v4(),
            organization_id,
            user_id: Some(creator),
            supplier_id: None,
            delivery_type_id: Uuid::new_v4(),
            date: now + Duration::days(1),
            status: AppointmentStatus::Confirmed,
            previous_status: None,
            requested_date: None,
            note: None,
            created_by_user_id: creator,
            updated_by_user_id: creator,
            created_at: now,
            updated_at: now,
        }
    }

    fn event(
        event_type: EventType,
        appointment: &AppointmentRow,
        triggered_by: Uuid,
    ) -> NotificationEvent {
        NotificationEvent {
            event_type,
            appointment_id: appointment.appointment_id,
            organization_id: appointment.organization_id,
            triggered_by_user_id: triggered_by,
            metadata: None,
        }
    }

    #[tokio::test]
    async fn cancelled_by_admin_notifies_the_creator() {
        let org = Uuid::new_v4();
        let creator = Uuid::new_v4();
        let admin = Uuid::new_v4();
        let store = Arc::new(MemoryStore::new());
        store.seed_member(org, admin, Role::Admin);
        store.seed_member(org, creator, Role::User);

        let appt = appointment(org, creator);
        let resolver = RecipientResolver::new(store);
        let ctx = HandlerContext {
            appointment: Some(&appt),
            resolver: &resolver,
        };

        let out = EventHandler::Cancelled
            .handle(&event(EventType::AppointmentCancelled, &appt, admin), &ctx)
            .await
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].target, NotificationTarget::User(creator));
    }

    #[tokio::test]
    async fn cancelled_by_creator_notifies_the_rest_of_the_organization() {
        let org = Uuid::new_v4();
        let creator = Uuid::new_v4();
        let admin = Uuid::new_v4();
        let other = Uuid::new_v4();
        let store = Arc::new(MemoryStore::new());
        store.seed_member(org, creator, Role::User);
        store.seed_member(org, admin, Role::Admin);
        store.seed_member(org, other, Role::User);

        let appt = appointment(org, creator);
        let resolver = RecipientResolver::new(store);
        let ctx = HandlerContext {
            appointment: Some(&appt),
            resolver: &resolver,
        };

        let out = EventHandler::Cancelled
            .handle(&event(EventType::AppointmentCancelled, &appt, creator), &ctx)
            .await
            .unwrap();
        let mut ids: Vec<Uuid> = out
            .iter()
            .filter_map(|n| match n.target {
                NotificationTarget::User(id) => Some(id),
                NotificationTarget::Supplier(_) => None,
            })
            .collect();
        ids.sort();
        let mut expected = vec![admin, other];
        expected.sort();
        assert_eq!(ids, expected, "everyone but the cancelling creator");
    }

    #[tokio::test]
    async fn reschedule_request_goes_to_reviewers_only() {
        let org = Uuid::new_v4();
        let creator = Uuid::new_v4();
        let admin = Uuid::new_v4();
        let reviewer = Uuid::new_v4();
        let supplier = Uuid::new_v4();
        let store = Arc::new(MemoryStore::new());
        store.seed_member(org, creator, Role::User);
        store.seed_member(org, admin, Role::Admin);
        store.seed_member(org, reviewer, Role::User);
        store.seed_member(org, supplier, Role::Supplier);

        let appt = appointment(org, creator);
        let resolver = RecipientResolver::new(store);
        let ctx = HandlerContext {
            appointment: Some(&appt),
            resolver: &resolver,
        };

        let out = EventHandler::RescheduleRequested
            .handle(
                &event(EventType::AppointmentRescheduleRequested, &appt, creator),
                &ctx,
            )
            .await
            .unwrap();
        let ids: Vec<Uuid> = out
            .iter()
            .filter_map(|n| match n.target {
                NotificationTarget::User(id) => Some(id),
                NotificationTarget::Supplier(_) => None,
            })
            .collect();
        assert!(ids.contains(&admin));
        assert!(ids.contains(&reviewer));
        assert!(!ids.contains(&supplier), "suppliers do not review requests");
        assert!(!ids.contains(&creator), "the requester is excluded");
    }

    #[tokio::test]
    async fn self_update_is_a_noop() {
        let org = Uuid::new_v4();
        let creator = Uuid::new_v4();
        let store = Arc::new(MemoryStore::new());
        let appt = appointment(org, creator);
        let resolver = RecipientResolver::new(store);
        let ctx = HandlerContext {
            appointment: Some(&appt),
            resolver: &resolver,
        };

        let out = EventHandler::Updated
            .handle(&event(EventType::AppointmentUpdated, &appt, creator), &ctx)
            .await
            .unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn missing_appointment_is_an_empty_result() {
        let store = Arc::new(MemoryStore::new());
        let resolver = RecipientResolver::new(store);
        let ctx = HandlerContext {
            appointment: None,
            resolver: &resolver,
        };
        let ev = NotificationEvent {
            event_type: EventType::AppointmentConfirmed,
            appointment_id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            triggered_by_user_id: Uuid::new_v4(),
            metadata: None,
        };
        let out = EventHandler::Confirmed.handle(&ev, &ctx).await.unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn supplier_created_appointment_notices_target_the_supplier() {
        let org = Uuid::new_v4();
        let supplier = Uuid::new_v4();
        let store = Arc::new(MemoryStore::new());
        let mut appt = appointment(org, Uuid::new_v4());
        appt.user_id = None;
        appt.supplier_id = Some(supplier);
        let resolver = RecipientResolver::new(store);
        let ctx = HandlerContext {
            appointment: Some(&appt),
            resolver: &resolver,
        };

        let out = EventHandler::Confirmed
            .handle(
                &event(EventType::AppointmentConfirmed, &appt, Uuid::new_v4()),
                &ctx,
            )
            .await
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].target, NotificationTarget::Supplier(supplier));
    }

    #[test]
    fn standard_registry_covers_every_event_type() {
        let registry = HandlerRegistry::standard();
        for event_type in [
            EventType::AppointmentCreated,
            EventType::AppointmentConfirmed,
            EventType::AppointmentRejected,
            EventType::AppointmentCancelled,
            EventType::AppointmentRescheduled,
            EventType::AppointmentCancellationRequested,
            EventType::AppointmentRescheduleRequested,
            EventType::AppointmentUpdated,
            EventType::AppointmentCompleted,
            EventType::AppointmentSupplierNoShow,
        ] {
            assert!(registry.get(event_type).is_some(), "{event_type}");
        }
    }
}
