//! Ticket lifecycle: creation invariants and the status state machine.
//!
//! open, in_progress and waiting swap freely; any of them may resolve.
//! resolved goes one-way to closed, and `resolved_at` is stamped exactly
//! once, on first entry to resolved. `closed` is terminal.

use chrono::{DateTime, Utc};
use helios_schema::{EntityKind, Ticket, TicketStatus};

use crate::context::RefContext;
use crate::error::DomainError;
use crate::fields;

/// Whether `from -> to` is an edge of the ticket state machine.
pub fn is_legal_ticket_transition(from: TicketStatus, to: TicketStatus) -> bool {
    use TicketStatus::*;
    match (from, to) {
        (Open, InProgress) | (InProgress, Open) => true,
        (Open, Waiting) | (Waiting, Open) => true,
        (InProgress, Waiting) | (Waiting, InProgress) => true,
        (Open, Resolved) | (InProgress, Resolved) | (Waiting, Resolved) => true,
        (Resolved, Closed) => true,
        _ => false,
    }
}

/// Validate a candidate ticket and return the normalized entity.
pub fn validate_ticket_create(
    candidate: &Ticket,
    refs: &dyn RefContext,
) -> Result<Ticket, DomainError> {
    let mut ticket = candidate.clone();
    ticket.id = fields::required("id", &candidate.id)?;
    ticket.session_id = fields::required("session_id", &candidate.session_id)?;
    ticket.customer_id = fields::required("customer_id", &candidate.customer_id)?;
    ticket.title = fields::required("title", &candidate.title)?;
    ticket.description = fields::required("description", &candidate.description)?;
    ticket.tags = fields::tags(&candidate.tags);

    if !refs.session_exists(&ticket.session_id)? {
        return Err(DomainError::missing_ref(
            EntityKind::Session,
            &ticket.session_id,
        ));
    }
    if !refs.customer_exists(&ticket.customer_id)? {
        return Err(DomainError::missing_ref(
            EntityKind::Customer,
            &ticket.customer_id,
        ));
    }
    if let Some(agent_id) = &ticket.assigned_agent_id {
        if !refs.user_exists(agent_id)? {
            return Err(DomainError::missing_ref(EntityKind::User, agent_id));
        }
    }

    if ticket.updated_at < ticket.created_at {
        return Err(DomainError::validation("updated_at", "precedes created_at"));
    }

    let resolved_status = matches!(ticket.status, TicketStatus::Resolved | TicketStatus::Closed);
    match (resolved_status, ticket.resolved_at) {
        (true, None) => {
            return Err(DomainError::validation(
                "resolved_at",
                "required once status is resolved or closed",
            ));
        }
        (false, Some(_)) => {
            return Err(DomainError::validation(
                "resolved_at",
                "only set once status is resolved or closed",
            ));
        }
        (true, Some(resolved_at)) if resolved_at < ticket.created_at => {
            return Err(DomainError::validation(
                "resolved_at",
                "precedes created_at",
            ));
        }
        _ => {}
    }

    Ok(ticket)
}

/// Check the requested status change and produce the updated ticket.
///
/// `now` stamps `updated_at` on every accepted transition and `resolved_at`
/// on the first entry to resolved. A resolved_at already set is never
/// rewritten.
pub fn apply_ticket_transition(
    ticket: &Ticket,
    to: TicketStatus,
    now: DateTime<Utc>,
) -> Result<Ticket, DomainError> {
    if !is_legal_ticket_transition(ticket.status, to) {
        return Err(DomainError::IllegalTransition {
            entity: EntityKind::Ticket,
            from: ticket.status.as_str().to_owned(),
            to: to.as_str().to_owned(),
        });
    }

    let mut updated = ticket.clone();
    updated.status = to;
    updated.updated_at = now;
    if to == TicketStatus::Resolved && updated.resolved_at.is_none() {
        updated.resolved_at = Some(now);
    }
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::StaticRefs;
    use helios_schema::{Metadata, TicketCategory, TicketPriority};

    fn refs() -> StaticRefs {
        StaticRefs::new()
            .with_session("session_1")
            .with_customer("customer_1")
            .with_user("user_2")
    }

    fn ticket(status: TicketStatus) -> Ticket {
        let now = Utc::now();
        Ticket {
            id: "ticket_1".to_owned(),
            session_id: "session_1".to_owned(),
            customer_id: "customer_1".to_owned(),
            title: "Unable to access trading account".to_owned(),
            description: "Customer locked out after password reset".to_owned(),
            priority: TicketPriority::High,
            category: TicketCategory::AccountInquiry,
            status,
            assigned_agent_id: None,
            created_at: now,
            updated_at: now,
            resolved_at: None,
            tags: vec!["account".to_owned(), "lockout".to_owned()],
            metadata: Metadata::new(),
        }
    }

    #[test]
    fn closed_is_terminal() {
        for to in [
            TicketStatus::Open,
            TicketStatus::InProgress,
            TicketStatus::Waiting,
            TicketStatus::Resolved,
            TicketStatus::Closed,
        ] {
            assert!(!is_legal_ticket_transition(TicketStatus::Closed, to));
        }
    }

    #[test]
    fn no_reopen_from_resolved() {
        assert!(!is_legal_ticket_transition(
            TicketStatus::Resolved,
            TicketStatus::Open
        ));
        assert!(!is_legal_ticket_transition(
            TicketStatus::Resolved,
            TicketStatus::InProgress
        ));
        assert!(is_legal_ticket_transition(
            TicketStatus::Resolved,
            TicketStatus::Closed
        ));
    }

    #[test]
    fn open_cycles_through_working_states() {
        let now = Utc::now();
        let t = ticket(TicketStatus::Open);
        let t = apply_ticket_transition(&t, TicketStatus::InProgress, now).unwrap();
        let t = apply_ticket_transition(&t, TicketStatus::Waiting, now).unwrap();
        let t = apply_ticket_transition(&t, TicketStatus::InProgress, now).unwrap();
        let t = apply_ticket_transition(&t, TicketStatus::Open, now).unwrap();
        assert_eq!(t.status, TicketStatus::Open);
        assert_eq!(t.resolved_at, None);
    }

    #[test]
    fn resolved_at_stamped_once_and_frozen() {
        // Scenario: open -> resolved stamps resolved_at, resolved -> closed keeps it.
        let t = ticket(TicketStatus::Open);
        let t1 = Utc::now();
        let resolved = apply_ticket_transition(&t, TicketStatus::Resolved, t1).unwrap();
        assert_eq!(resolved.resolved_at, Some(t1));

        let t2 = t1 + chrono::TimeDelta::try_seconds(90).unwrap();
        let closed = apply_ticket_transition(&resolved, TicketStatus::Closed, t2).unwrap();
        assert_eq!(closed.resolved_at, Some(t1));
        assert_eq!(closed.updated_at, t2);
        assert_eq!(closed.status, TicketStatus::Closed);
    }

    #[test]
    fn create_resolved_requires_resolved_at() {
        let candidate = ticket(TicketStatus::Resolved);
        let err = validate_ticket_create(&candidate, &refs()).unwrap_err();
        assert!(matches!(
            err,
            DomainError::Validation {
                field: "resolved_at",
                ..
            }
        ));
    }

    #[test]
    fn create_open_with_resolved_at_rejected() {
        let mut candidate = ticket(TicketStatus::Open);
        candidate.resolved_at = Some(Utc::now());
        let err = validate_ticket_create(&candidate, &refs()).unwrap_err();
        assert!(matches!(
            err,
            DomainError::Validation {
                field: "resolved_at",
                ..
            }
        ));
    }

    #[test]
    fn create_checks_all_references() {
        let mut candidate = ticket(TicketStatus::Open);
        candidate.session_id = "session_404".to_owned();
        assert_eq!(
            validate_ticket_create(&candidate, &refs()).unwrap_err(),
            DomainError::missing_ref(EntityKind::Session, "session_404")
        );

        let mut candidate = ticket(TicketStatus::Open);
        candidate.assigned_agent_id = Some("user_404".to_owned());
        assert_eq!(
            validate_ticket_create(&candidate, &refs()).unwrap_err(),
            DomainError::missing_ref(EntityKind::User, "user_404")
        );
    }

    #[test]
    fn tags_normalized_on_create() {
        let mut candidate = ticket(TicketStatus::Open);
        candidate.tags = vec![
            " lockout".to_owned(),
            "account".to_owned(),
            "lockout".to_owned(),
        ];
        let accepted = validate_ticket_create(&candidate, &refs()).unwrap();
        assert_eq!(accepted.tags, vec!["account", "lockout"]);
    }
}
