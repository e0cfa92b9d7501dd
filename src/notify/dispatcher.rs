// src/notify/dispatcher.rs

use std::sync::Arc;

use crate::notify::event::NotificationEvent;
use crate::notify::handlers::{HandlerContext, HandlerRegistry};
use crate::notify::recipients::RecipientResolver;
use crate::store::{AppointmentStore, NotificationStore};

/// Structured outcome of one dispatch. `errors` carries validation,
/// configuration, and isolated per-row persistence failures.
#[derive(Debug)]
pub struct DispatchResult {
    pub success: bool,
    pub notifications_created: u32,
    pub errors: Vec<String>,
}

impl DispatchResult {
    fn ok(notifications_created: u32) -> Self {
        Self {
            success: true,
            notifications_created,
            errors: Vec::new(),
        }
    }

    fn failed(error: String) -> Self {
        Self {
            success: false,
            notifications_created: 0,
            errors: vec![error],
        }
    }
}

/// Turns one lifecycle event into persisted notification rows. Explicitly
/// constructed with its registry and store handles.
pub struct NotificationDispatcher {
    registry: HandlerRegistry,
    appointments: Arc<dyn AppointmentStore>,
    notifications: Arc<dyn NotificationStore>,
    resolver: RecipientResolver,
}

impl NotificationDispatcher {
    pub fn new(
        registry: HandlerRegistry,
        appointments: Arc<dyn AppointmentStore>,
        notifications: Arc<dyn NotificationStore>,
        resolver: RecipientResolver,
    ) -> Self {
        Self {
            registry,
            appointments,
            notifications,
            resolver,
        }
    }

    /// Never panics and never throws: every failure mode is folded into the
    /// returned result so the caller can decide how loud to be.
    pub async fn dispatch(&self, event: &NotificationEvent) -> DispatchResult {
        if let Err(msg) = validate_event(event) {
            return DispatchResult::failed(msg);
        }

        let Some(handler) = self.registry.get(event.event_type) else {
            // Registry gap is a deployment/configuration problem, not a
            // user-facing failure.
            tracing::error!(
                event_type = %event.event_type,
                "no handler registered for event type"
            );
            return DispatchResult::failed(format!(
                "no handler registered for event type {}",
                event.event_type
            ));
        };

        let appointment = match self.appointments.find_by_id(event.appointment_id).await {
            Ok(row) => row,
            Err(e) => {
                return DispatchResult::failed(format!("failed to load appointment snapshot: {e}"))
            }
        };

        let ctx = HandlerContext {
            appointment: appointment.as_ref(),
            resolver: &self.resolver,
        };
        let items = match handler.handle(event, &ctx).await {
            Ok(items) => items,
            Err(e) => return DispatchResult::failed(format!("handler failed: {e}")),
        };

        if items.is_empty() {
            return DispatchResult::ok(0);
        }

        match self.notifications.insert_batch(&items).await {
            Ok(report) => DispatchResult {
                success: report.errors.is_empty(),
                notifications_created: report.created,
                errors: report.errors,
            },
            Err(e) => DispatchResult::failed(format!("notification persistence failed: {e}")),
        }
    }
}

fn validate_event(event: &NotificationEvent) -> Result<(), String> {
    if event.appointment_id.is_nil() {
        return Err("event is missing an appointment id".into());
    }
    if event.organization_id.is_nil() {
        return Err("event is missing an organization id".into());
    }
    if event.triggered_by_user_id.is_nil() {
        return Err("event is missing the triggering principal".into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    use crate::models::{AppointmentRow, AppointmentStatus, NotificationStatus, Role};
    use crate::notify::event::EventType;
    use crate::store::memory::MemoryStore;
    use crate::store::NotificationQuery;

    fn seeded_appointment(store: &MemoryStore, organization_id: Uuid, creator: Uuid) -> AppointmentRow {
        let now = Utc::now();
        let row = AppointmentRow {
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
        };
        store.seed_appointment(row.clone());
        row
    }

    fn dispatcher(store: Arc<MemoryStore>, registry: HandlerRegistry) -> NotificationDispatcher {
        NotificationDispatcher::new(
            registry,
            store.clone(),
            store.clone(),
            RecipientResolver::new(store),
        )
    }

    fn event_for(row: &AppointmentRow, event_type: EventType, triggered_by: Uuid) -> NotificationEvent {
        NotificationEvent {
            event_type,
            appointment_id: row.appointment_id,
            organization_id: row.organization_id,
            triggered_by_user_id: triggered_by,
            metadata: None,
        }
    }

    #[tokio::test]
    async fn unregistered_event_type_creates_nothing() {
        let store = Arc::new(MemoryStore::new());
        let org = Uuid::new_v4();
        let creator = Uuid::new_v4();
        let row = seeded_appointment(&store, org, creator);

        let dispatcher = dispatcher(store.clone(), HandlerRegistry::empty());
        let result = dispatcher
            .dispatch(&event_for(&row, EventType::AppointmentConfirmed, Uuid::new_v4()))
            .await;

        assert!(!result.success);
        assert_eq!(result.notifications_created, 0);
        assert!(result.errors[0].contains("no handler registered"));
        assert!(store.notification_rows().is_empty());
    }

    #[tokio::test]
    async fn nil_ids_fail_validation_without_side_effects() {
        let store = Arc::new(MemoryStore::new());
        let dispatcher = dispatcher(store.clone(), HandlerRegistry::standard());

        let result = dispatcher
            .dispatch(&NotificationEvent {
                event_type: EventType::AppointmentConfirmed,
                appointment_id: Uuid::nil(),
                organization_id: Uuid::new_v4(),
                triggered_by_user_id: Uuid::new_v4(),
                metadata: None,
            })
            .await;

        assert!(!result.success);
        assert_eq!(result.notifications_created, 0);
        assert!(store.notification_rows().is_empty());
    }

    #[tokio::test]
    async fn missing_appointment_is_a_successful_noop() {
        let store = Arc::new(MemoryStore::new());
        let dispatcher = dispatcher(store.clone(), HandlerRegistry::standard());

        let result = dispatcher
            .dispatch(&NotificationEvent {
                event_type: EventType::AppointmentConfirmed,
                appointment_id: Uuid::new_v4(),
                organization_id: Uuid::new_v4(),
                triggered_by_user_id: Uuid::new_v4(),
                metadata: None,
            })
            .await;

        assert!(result.success);
        assert_eq!(result.notifications_created, 0);
        assert!(result.errors.is_empty());
    }

    #[tokio::test]
    async fn one_failing_recipient_does_not_suppress_the_others() {
        let store = Arc::new(MemoryStore::new());
        let org = Uuid::new_v4();
        let creator = Uuid::new_v4();
        let good_a = Uuid::new_v4();
        let bad = Uuid::new_v4();
        let good_b = Uuid::new_v4();
        store.seed_member(org, good_a, Role::Admin);
        store.seed_member(org, bad, Role::User);
        store.seed_member(org, good_b, Role::User);
        store.poison_target(bad);

        let row = seeded_appointment(&store, org, creator);
        let dispatcher = dispatcher(store.clone(), HandlerRegistry::standard());

        // created-by-creator fans out to all three seeded members
        let result = dispatcher
            .dispatch(&event_for(&row, EventType::AppointmentCreated, creator))
            .await;

        assert!(!result.success);
        assert_eq!(result.notifications_created, 2);
        assert_eq!(result.errors.len(), 1);

        // the two surviving rows are queryable afterwards
        for survivor in [good_a, good_b] {
            let page = store
                .find_for_principal(
                    survivor,
                    &NotificationQuery {
                        page: 1,
                        limit: 10,
                        status: None,
                        event_type: None,
                    },
                )
                .await
                .unwrap();
            assert_eq!(page.total, 1);
            assert_eq!(page.notifications[0].status, NotificationStatus::Unread);
        }
    }

    #[tokio::test]
    async fn empty_handler_output_is_success() {
        let store = Arc::new(MemoryStore::new());
        let org = Uuid::new_v4();
        let creator = Uuid::new_v4();
        let row = seeded_appointment(&store, org, creator);

        let dispatcher = dispatcher(store.clone(), HandlerRegistry::standard());
        // updated-by-creator resolves to zero recipients
        let result = dispatcher
            .dispatch(&event_for(&row, EventType::AppointmentUpdated, creator))
            .await;

        assert!(result.success);
        assert_eq!(result.notifications_created, 0);
        assert!(store.notification_rows().is_empty());
    }
}
