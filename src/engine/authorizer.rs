// src/engine/authorizer.rs

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{AppointmentStatus, Role};

/*
Authorization is table-driven: each rule grants a set of actions to one
(role class, status class) pair. Capabilities are recomputed from
(role, status, date, now) on every check and never stored.
*/

/// Lifecycle actions an actor can request on an appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppointmentAction {
    Approve,
    Reject,
    Cancel,
    Reschedule,
    RequestCancellation,
    RequestReschedule,
    ApproveCancellation,
    RejectCancellation,
    ApproveReschedule,
    RejectReschedule,
    Edit,
    MarkAsNoShow,
    MarkAsCompleted,
}

impl AppointmentAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentAction::Approve => "approve",
            AppointmentAction::Reject => "reject",
            AppointmentAction::Cancel => "cancel",
            AppointmentAction::Reschedule => "reschedule",
            AppointmentAction::RequestCancellation => "request_cancellation",
            AppointmentAction::RequestReschedule => "request_reschedule",
            AppointmentAction::ApproveCancellation => "approve_cancellation",
            AppointmentAction::RejectCancellation => "reject_cancellation",
            AppointmentAction::ApproveReschedule => "approve_reschedule",
            AppointmentAction::RejectReschedule => "reject_reschedule",
            AppointmentAction::Edit => "edit",
            AppointmentAction::MarkAsNoShow => "mark_as_no_show",
            AppointmentAction::MarkAsCompleted => "mark_as_completed",
        }
    }

    /// Wire-name parse for the action endpoint body.
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "approve" => AppointmentAction::Approve,
            "reject" => AppointmentAction::Reject,
            "cancel" => AppointmentAction::Cancel,
            "reschedule" => AppointmentAction::Reschedule,
            "request_cancellation" => AppointmentAction::RequestCancellation,
            "request_reschedule" => AppointmentAction::RequestReschedule,
            "approve_cancellation" => AppointmentAction::ApproveCancellation,
            "reject_cancellation" => AppointmentAction::RejectCancellation,
            "approve_reschedule" => AppointmentAction::ApproveReschedule,
            "reject_reschedule" => AppointmentAction::RejectReschedule,
            "edit" => AppointmentAction::Edit,
            "mark_as_no_show" => AppointmentAction::MarkAsNoShow,
            "mark_as_completed" => AppointmentAction::MarkAsCompleted,
            _ => return None,
        })
    }
}

impl std::fmt::Display for AppointmentAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Flat capability record, serialized with the client contract's camelCase
/// field names. Derived per check, never persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllowedActions {
    pub can_approve: bool,
    pub can_reject: bool,
    pub can_cancel: bool,
    pub can_reschedule: bool,
    pub can_request_cancellation: bool,
    pub can_request_reschedule: bool,
    pub can_edit: bool,
    pub can_mark_as_no_show: bool,
    pub can_mark_as_completed: bool,
    pub can_approve_or_reject_cancellation: bool,
    pub can_approve_or_reject_reschedule: bool,
}

impl AllowedActions {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn allows(&self, action: AppointmentAction) -> bool {
        match action {
            AppointmentAction::Approve => self.can_approve,
            AppointmentAction::Reject => self.can_reject,
            AppointmentAction::Cancel => self.can_cancel,
            AppointmentAction::Reschedule => self.can_reschedule,
            AppointmentAction::RequestCancellation => self.can_request_cancellation,
            AppointmentAction::RequestReschedule => self.can_request_reschedule,
            AppointmentAction::Edit => self.can_edit,
            AppointmentAction::MarkAsNoShow => self.can_mark_as_no_show,
            AppointmentAction::MarkAsCompleted => self.can_mark_as_completed,
            AppointmentAction::ApproveCancellation | AppointmentAction::RejectCancellation => {
                self.can_approve_or_reject_cancellation
            }
            AppointmentAction::ApproveReschedule | AppointmentAction::RejectReschedule => {
                self.can_approve_or_reject_reschedule
            }
        }
    }

    fn grant(&mut self, action: AppointmentAction) {
        match action {
            AppointmentAction::Approve => self.can_approve = true,
            AppointmentAction::Reject => self.can_reject = true,
            AppointmentAction::Cancel => self.can_cancel = true,
            AppointmentAction::Reschedule => self.can_reschedule = true,
            AppointmentAction::RequestCancellation => self.can_request_cancellation = true,
            AppointmentAction::RequestReschedule => self.can_request_reschedule = true,
            AppointmentAction::Edit => self.can_edit = true,
            AppointmentAction::MarkAsNoShow => self.can_mark_as_no_show = true,
            AppointmentAction::MarkAsCompleted => self.can_mark_as_completed = true,
            AppointmentAction::ApproveCancellation | AppointmentAction::RejectCancellation => {
                self.can_approve_or_reject_cancellation = true
            }
            AppointmentAction::ApproveReschedule | AppointmentAction::RejectReschedule => {
                self.can_approve_or_reject_reschedule = true
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RoleClass {
    /// Organization admins (ADMIN, SUPER_ADMIN): review and settle requests.
    Reviewer,
    /// Creator side (USER, SUPPLIER): open requests on their bookings.
    Creator,
}

fn role_class(role: Role) -> RoleClass {
    if role.is_reviewer() {
        RoleClass::Reviewer
    } else {
        RoleClass::Creator
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StatusClass {
    /// Awaiting the initial approve/reject decision.
    PendingReview,
    /// Live booking: CONFIRMED and the statuses that return to the active
    /// flow after a request was settled.
    Active,
    CancellationReview,
    RescheduleReview,
    /// Terminal: nothing is allowed.
    Closed,
}

fn status_class(status: AppointmentStatus) -> StatusClass {
    match status {
        AppointmentStatus::PendingConfirmation => StatusClass::PendingReview,
        AppointmentStatus::Confirmed
        | AppointmentStatus::Rescheduled
        | AppointmentStatus::RescheduleConfirmed
        | AppointmentStatus::RescheduleRejected
        | AppointmentStatus::CancellationRejected => StatusClass::Active,
        AppointmentStatus::CancellationRequested => StatusClass::CancellationReview,
        AppointmentStatus::RescheduleRequested => StatusClass::RescheduleReview,
        AppointmentStatus::Cancelled
        | AppointmentStatus::Rejected
        | AppointmentStatus::Completed
        | AppointmentStatus::SupplierNoShow => StatusClass::Closed,
    }
}

#[derive(Debug, Clone, Copy)]
enum Grant {
    Always(AppointmentAction),
    /// Granted only once the scheduled date has passed.
    PastDateOnly(AppointmentAction),
}

struct Rule {
    role: RoleClass,
    class: StatusClass,
    grants: &'static [Grant],
}

const RULES: &[Rule] = &[
    Rule {
        role: RoleClass::Reviewer,
        class: StatusClass::PendingReview,
        grants: &[
            Grant::Always(AppointmentAction::Approve),
            Grant::Always(AppointmentAction::Reject),
            Grant::Always(AppointmentAction::Cancel),
            Grant::Always(AppointmentAction::Reschedule),
        ],
    },
    Rule {
        role: RoleClass::Reviewer,
        class: StatusClass::Active,
        grants: &[
            Grant::Always(AppointmentAction::Cancel),
            Grant::Always(AppointmentAction::Reschedule),
            Grant::PastDateOnly(AppointmentAction::MarkAsNoShow),
            Grant::PastDateOnly(AppointmentAction::MarkAsCompleted),
        ],
    },
    Rule {
        role: RoleClass::Reviewer,
        class: StatusClass::CancellationReview,
        grants: &[
            Grant::Always(AppointmentAction::ApproveCancellation),
            Grant::Always(AppointmentAction::RejectCancellation),
        ],
    },
    Rule {
        role: RoleClass::Reviewer,
        class: StatusClass::RescheduleReview,
        grants: &[
            Grant::Always(AppointmentAction::ApproveReschedule),
            Grant::Always(AppointmentAction::RejectReschedule),
        ],
    },
    Rule {
        role: RoleClass::Creator,
        class: StatusClass::PendingReview,
        grants: &[
            Grant::Always(AppointmentAction::Edit),
            Grant::Always(AppointmentAction::RequestCancellation),
            Grant::Always(AppointmentAction::RequestReschedule),
        ],
    },
    Rule {
        role: RoleClass::Creator,
        class: StatusClass::Active,
        grants: &[
            Grant::Always(AppointmentAction::RequestCancellation),
            Grant::Always(AppointmentAction::RequestReschedule),
        ],
    },
];

/// Pure capability check: `(role, status, date, now) -> AllowedActions`.
pub fn allowed_actions(
    role: Role,
    status: AppointmentStatus,
    date: DateTime<Utc>,
    now: DateTime<Utc>,
) -> AllowedActions {
    let rc = role_class(role);
    let sc = status_class(status);
    let mut out = AllowedActions::none();
    for rule in RULES {
        if rule.role != rc || rule.class != sc {
            continue;
        }
        for grant in rule.grants {
            match grant {
                Grant::Always(action) => out.grant(*action),
                Grant::PastDateOnly(action) => {
                    if date < now {
                        out.grant(*action);
                    }
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    const ALL_ROLES: [Role; 4] = [Role::User, Role::Admin, Role::SuperAdmin, Role::Supplier];
    const ALL_STATUSES: [AppointmentStatus; 12] = [
        AppointmentStatus::PendingConfirmation,
        AppointmentStatus::Confirmed,
        AppointmentStatus::CancellationRequested,
        AppointmentStatus::RescheduleRequested,
        AppointmentStatus::Cancelled,
        AppointmentStatus::Rejected,
        AppointmentStatus::Rescheduled,
        AppointmentStatus::RescheduleConfirmed,
        AppointmentStatus::RescheduleRejected,
        AppointmentStatus::CancellationRejected,
        AppointmentStatus::Completed,
        AppointmentStatus::SupplierNoShow,
    ];

    fn future() -> (DateTime<Utc>, DateTime<Utc>) {
        let now = Utc::now();
        (now + Duration::hours(2), now)
    }

    #[test]
    fn terminal_statuses_allow_nothing_for_any_role() {
        let (date, now) = future();
        for role in ALL_ROLES {
            for status in ALL_STATUSES.iter().filter(|s| s.is_terminal()) {
                assert_eq!(
                    allowed_actions(role, *status, date, now),
                    AllowedActions::none(),
                    "{role} x {status} should be all-false"
                );
            }
        }
    }

    #[test]
    fn review_statuses_allow_nothing_for_creator_roles() {
        let (date, now) = future();
        for role in [Role::User, Role::Supplier] {
            for status in [
                AppointmentStatus::CancellationRequested,
                AppointmentStatus::RescheduleRequested,
            ] {
                assert_eq!(allowed_actions(role, status, date, now), AllowedActions::none());
            }
        }
    }

    #[test]
    fn admin_pending_confirmation() {
        let (date, now) = future();
        let allowed = allowed_actions(Role::Admin, AppointmentStatus::PendingConfirmation, date, now);
        assert!(allowed.can_approve);
        assert!(allowed.can_reject);
        assert!(allowed.can_cancel);
        assert!(allowed.can_reschedule);
        assert!(!allowed.can_edit);
        assert!(!allowed.can_request_cancellation);
        assert!(!allowed.can_mark_as_completed);
    }

    #[test]
    fn admin_confirmed_temporal_gate() {
        let now = Utc::now();

        let upcoming = allowed_actions(
            Role::Admin,
            AppointmentStatus::Confirmed,
            now + Duration::minutes(1),
            now,
        );
        assert!(!upcoming.can_mark_as_no_show);
        assert!(!upcoming.can_mark_as_completed);
        assert!(upcoming.can_cancel);
        assert!(upcoming.can_reschedule);

        let past = allowed_actions(
            Role::Admin,
            AppointmentStatus::Confirmed,
            now - Duration::minutes(1),
            now,
        );
        assert!(past.can_mark_as_no_show);
        assert!(past.can_mark_as_completed);
    }

    #[test]
    fn admin_settles_open_requests() {
        let (date, now) = future();
        let cancellation = allowed_actions(
            Role::Admin,
            AppointmentStatus::CancellationRequested,
            date,
            now,
        );
        assert!(cancellation.can_approve_or_reject_cancellation);
        assert!(!cancellation.can_approve_or_reject_reschedule);
        assert!(!cancellation.can_cancel);

        let reschedule = allowed_actions(
            Role::SuperAdmin,
            AppointmentStatus::RescheduleRequested,
            date,
            now,
        );
        assert!(reschedule.can_approve_or_reject_reschedule);
        assert!(!reschedule.can_approve_or_reject_cancellation);
    }

    #[test]
    fn creator_rules() {
        let (date, now) = future();

        let pending = allowed_actions(
            Role::Supplier,
            AppointmentStatus::PendingConfirmation,
            date,
            now,
        );
        assert!(pending.can_edit);
        assert!(pending.can_request_cancellation);
        assert!(pending.can_request_reschedule);
        assert!(!pending.can_approve);

        let confirmed = allowed_actions(Role::User, AppointmentStatus::Confirmed, date, now);
        assert!(!confirmed.can_edit, "edit is limited to pending appointments");
        assert!(confirmed.can_request_cancellation);
        assert!(confirmed.can_request_reschedule);
    }

    #[test]
    fn settled_request_statuses_return_to_active_flow() {
        let (date, now) = future();
        for status in [
            AppointmentStatus::CancellationRejected,
            AppointmentStatus::RescheduleRejected,
            AppointmentStatus::RescheduleConfirmed,
        ] {
            let admin = allowed_actions(Role::Admin, status, date, now);
            assert!(admin.can_cancel && admin.can_reschedule, "{status}");
            let creator = allowed_actions(Role::User, status, date, now);
            assert!(creator.can_request_cancellation && creator.can_request_reschedule, "{status}");
        }
    }

    #[test]
    fn allows_matches_flag_fields() {
        let (date, now) = future();
        let allowed = allowed_actions(Role::Admin, AppointmentStatus::PendingConfirmation, date, now);
        assert!(allowed.allows(AppointmentAction::Approve));
        assert!(allowed.allows(AppointmentAction::Reject));
        assert!(!allowed.allows(AppointmentAction::MarkAsCompleted));
        assert!(!allowed.allows(AppointmentAction::ApproveCancellation));
    }

    #[test]
    fn action_wire_names_round_trip() {
        for action in [
            AppointmentAction::Approve,
            AppointmentAction::RequestCancellation,
            AppointmentAction::ApproveReschedule,
            AppointmentAction::MarkAsNoShow,
        ] {
            assert_eq!(AppointmentAction::parse(action.as_str()), Some(action));
        }
        assert_eq!(AppointmentAction::parse("explode"), None);
    }
}
