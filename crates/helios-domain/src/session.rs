//! Session lifecycle: creation invariants and the status state machine.
//!
//! Legal edges: active and waiting swap freely; either may escalate (which
//! must set agent and reason atomically) or end directly; escalated may only
//! end. `ended` is terminal.

use chrono::{DateTime, Utc};
use helios_schema::{EntityKind, Session, SessionStatus};

use crate::context::RefContext;
use crate::error::DomainError;
use crate::fields;

/// Whether `from -> to` is an edge of the session state machine.
pub fn is_legal_session_transition(from: SessionStatus, to: SessionStatus) -> bool {
    use SessionStatus::*;
    match (from, to) {
        (Active, Waiting) | (Waiting, Active) => true,
        (Active, Escalated) | (Waiting, Escalated) => true,
        (Active, Ended) | (Waiting, Ended) | (Escalated, Ended) => true,
        _ => false,
    }
}

/// Validate a candidate session and return the normalized entity.
pub fn validate_session_create(
    candidate: &Session,
    refs: &dyn RefContext,
) -> Result<Session, DomainError> {
    let mut session = candidate.clone();
    session.id = fields::required("id", &candidate.id)?;
    session.customer_id = fields::required("customer_id", &candidate.customer_id)?;

    if !refs.customer_exists(&session.customer_id)? {
        return Err(DomainError::missing_ref(
            EntityKind::Customer,
            &session.customer_id,
        ));
    }
    if let Some(agent_id) = &session.agent_id {
        if !refs.user_exists(agent_id)? {
            return Err(DomainError::missing_ref(EntityKind::User, agent_id));
        }
    }

    match session.status {
        SessionStatus::Escalated => {
            if session.agent_id.is_none() {
                return Err(DomainError::validation(
                    "agent_id",
                    "required when status is escalated",
                ));
            }
            if session.escalation_reason.is_none() {
                return Err(DomainError::validation(
                    "escalation_reason",
                    "required when status is escalated",
                ));
            }
        }
        // A session escalated before ending keeps its escalation context.
        SessionStatus::Ended => {
            if session.escalation_reason.is_some() && session.agent_id.is_none() {
                return Err(DomainError::validation(
                    "agent_id",
                    "required when escalation_reason is set",
                ));
            }
        }
        SessionStatus::Active | SessionStatus::Waiting => {
            if session.escalation_reason.is_some() {
                return Err(DomainError::validation(
                    "escalation_reason",
                    "only set when status is escalated or ended",
                ));
            }
        }
    }

    match (session.status, session.ended_at) {
        (SessionStatus::Ended, None) => {
            return Err(DomainError::validation(
                "ended_at",
                "required when status is ended",
            ));
        }
        (SessionStatus::Ended, Some(ended_at)) if ended_at < session.created_at => {
            return Err(DomainError::validation("ended_at", "precedes created_at"));
        }
        (SessionStatus::Ended, Some(_)) => {}
        (_, Some(_)) => {
            return Err(DomainError::validation(
                "ended_at",
                "only set when status is ended",
            ));
        }
        (_, None) => {}
    }

    Ok(session)
}

/// Field changes carried by a transition request. Escalation must supply
/// agent and reason; ending may supply an explicit end time.
#[derive(Debug, Clone, Default)]
pub struct SessionChange {
    pub agent_id: Option<String>,
    pub escalation_reason: Option<String>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl SessionChange {
    pub fn escalate(agent_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            agent_id: Some(agent_id.into()),
            escalation_reason: Some(reason.into()),
            ended_at: None,
        }
    }

    pub fn end_at(ended_at: DateTime<Utc>) -> Self {
        Self {
            ended_at: Some(ended_at),
            ..Self::default()
        }
    }
}

/// Check the requested transition and produce the updated session.
///
/// Edge legality is checked first; field requirements for entering the target
/// state come second, so an illegal edge always surfaces as
/// [`DomainError::IllegalTransition`] regardless of supplied fields.
pub fn apply_session_transition(
    session: &Session,
    to: SessionStatus,
    change: SessionChange,
    refs: &dyn RefContext,
) -> Result<Session, DomainError> {
    if !is_legal_session_transition(session.status, to) {
        return Err(DomainError::IllegalTransition {
            entity: EntityKind::Session,
            from: session.status.as_str().to_owned(),
            to: to.as_str().to_owned(),
        });
    }

    let mut updated = session.clone();
    match to {
        SessionStatus::Escalated => {
            let Some(agent_id) = change.agent_id else {
                return Err(DomainError::validation(
                    "agent_id",
                    "required when status is escalated",
                ));
            };
            let Some(reason) = change.escalation_reason else {
                return Err(DomainError::validation(
                    "escalation_reason",
                    "required when status is escalated",
                ));
            };
            if !refs.user_exists(&agent_id)? {
                return Err(DomainError::missing_ref(EntityKind::User, &agent_id));
            }
            updated.agent_id = Some(agent_id);
            updated.escalation_reason = Some(reason);
        }
        SessionStatus::Ended => {
            let ended_at = change.ended_at.unwrap_or_else(Utc::now);
            if ended_at < session.created_at {
                return Err(DomainError::validation("ended_at", "precedes created_at"));
            }
            updated.ended_at = Some(ended_at);
        }
        SessionStatus::Active | SessionStatus::Waiting => {}
    }
    updated.status = to;
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::StaticRefs;
    use helios_schema::{ChannelType, Metadata};

    fn refs() -> StaticRefs {
        StaticRefs::new()
            .with_customer("customer_1")
            .with_user("user_2")
    }

    fn session(status: SessionStatus) -> Session {
        Session {
            id: "session_1".to_owned(),
            customer_id: "customer_1".to_owned(),
            status,
            channel: ChannelType::Web,
            created_at: Utc::now(),
            ended_at: None,
            agent_id: None,
            escalation_reason: None,
            metadata: Metadata::new(),
        }
    }

    #[test]
    fn terminal_state_has_no_outgoing_edges() {
        for to in [
            SessionStatus::Active,
            SessionStatus::Waiting,
            SessionStatus::Escalated,
            SessionStatus::Ended,
        ] {
            assert!(!is_legal_session_transition(SessionStatus::Ended, to));
        }
    }

    #[test]
    fn create_active_without_agent_accepted() {
        let accepted = validate_session_create(&session(SessionStatus::Active), &refs()).unwrap();
        assert_eq!(accepted.status, SessionStatus::Active);
        assert_eq!(accepted.agent_id, None);
    }

    #[test]
    fn create_with_unknown_customer_rejected() {
        let mut candidate = session(SessionStatus::Active);
        candidate.customer_id = "customer_404".to_owned();
        let err = validate_session_create(&candidate, &refs()).unwrap_err();
        assert_eq!(
            err,
            DomainError::missing_ref(EntityKind::Customer, "customer_404")
        );
    }

    #[test]
    fn create_escalated_requires_agent_and_reason() {
        let mut candidate = session(SessionStatus::Escalated);
        let err = validate_session_create(&candidate, &refs()).unwrap_err();
        assert!(matches!(
            err,
            DomainError::Validation {
                field: "agent_id",
                ..
            }
        ));

        candidate.agent_id = Some("user_2".to_owned());
        let err = validate_session_create(&candidate, &refs()).unwrap_err();
        assert!(matches!(
            err,
            DomainError::Validation {
                field: "escalation_reason",
                ..
            }
        ));

        candidate.escalation_reason = Some("complex_account_issue".to_owned());
        let accepted = validate_session_create(&candidate, &refs()).unwrap();
        assert_eq!(accepted.status, SessionStatus::Escalated);
    }

    #[test]
    fn create_non_escalated_with_reason_rejected() {
        let mut candidate = session(SessionStatus::Waiting);
        candidate.escalation_reason = Some("stale".to_owned());
        let err = validate_session_create(&candidate, &refs()).unwrap_err();
        assert!(matches!(
            err,
            DomainError::Validation {
                field: "escalation_reason",
                ..
            }
        ));
    }

    #[test]
    fn escalate_without_agent_is_validation_error() {
        // Scenario: active session, transition to escalated without an agent.
        let current = session(SessionStatus::Active);
        let err = apply_session_transition(
            &current,
            SessionStatus::Escalated,
            SessionChange::default(),
            &refs(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            DomainError::Validation {
                field: "agent_id",
                ..
            }
        ));
    }

    #[test]
    fn escalate_then_end_then_no_reopen() {
        let current = session(SessionStatus::Active);
        let escalated = apply_session_transition(
            &current,
            SessionStatus::Escalated,
            SessionChange::escalate("user_2", "complex_account_issue"),
            &refs(),
        )
        .unwrap();
        assert_eq!(escalated.agent_id.as_deref(), Some("user_2"));
        assert_eq!(
            escalated.escalation_reason.as_deref(),
            Some("complex_account_issue")
        );

        let ended = apply_session_transition(
            &escalated,
            SessionStatus::Ended,
            SessionChange::end_at(Utc::now()),
            &refs(),
        )
        .unwrap();
        assert!(ended.ended_at.is_some());

        let err = apply_session_transition(
            &ended,
            SessionStatus::Active,
            SessionChange::default(),
            &refs(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            DomainError::IllegalTransition {
                entity: EntityKind::Session,
                from: "ended".to_owned(),
                to: "active".to_owned(),
            }
        );
    }

    #[test]
    fn active_and_waiting_swap_freely() {
        let waiting = apply_session_transition(
            &session(SessionStatus::Active),
            SessionStatus::Waiting,
            SessionChange::default(),
            &refs(),
        )
        .unwrap();
        let active = apply_session_transition(
            &waiting,
            SessionStatus::Active,
            SessionChange::default(),
            &refs(),
        )
        .unwrap();
        assert_eq!(active.status, SessionStatus::Active);
    }

    #[test]
    fn end_before_created_rejected() {
        let current = session(SessionStatus::Active);
        let before = current.created_at - chrono::TimeDelta::try_seconds(30).unwrap();
        let err = apply_session_transition(
            &current,
            SessionStatus::Ended,
            SessionChange::end_at(before),
            &refs(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            DomainError::Validation {
                field: "ended_at",
                ..
            }
        ));
    }

    #[test]
    fn escalation_with_unknown_agent_rejected() {
        let err = apply_session_transition(
            &session(SessionStatus::Waiting),
            SessionStatus::Escalated,
            SessionChange::escalate("user_404", "needs a human"),
            &refs(),
        )
        .unwrap_err();
        assert_eq!(err, DomainError::missing_ref(EntityKind::User, "user_404"));
    }

    #[test]
    fn create_ended_session_keeps_escalation_context() {
        let mut candidate = session(SessionStatus::Ended);
        candidate.agent_id = Some("user_2".to_owned());
        candidate.escalation_reason = Some("complex_account_issue".to_owned());
        candidate.ended_at = Some(candidate.created_at);
        let accepted = validate_session_create(&candidate, &refs()).unwrap();
        assert_eq!(
            accepted.escalation_reason.as_deref(),
            Some("complex_account_issue")
        );

        // Reason without the agent that earned it is inconsistent.
        candidate.agent_id = None;
        let err = validate_session_create(&candidate, &refs()).unwrap_err();
        assert!(matches!(
            err,
            DomainError::Validation {
                field: "agent_id",
                ..
            }
        ));
    }

    #[test]
    fn transition_output_passes_create_validation() {
        let escalated = apply_session_transition(
            &session(SessionStatus::Active),
            SessionStatus::Escalated,
            SessionChange::escalate("user_2", "complex_account_issue"),
            &refs(),
        )
        .unwrap();
        let ended = apply_session_transition(
            &escalated,
            SessionStatus::Ended,
            SessionChange::end_at(escalated.created_at),
            &refs(),
        )
        .unwrap();
        // The machine never produces a session its own validator refuses.
        assert!(validate_session_create(&ended, &refs()).is_ok());
    }

    #[test]
    fn lookup_failure_is_not_a_missing_reference() {
        struct BrokenRefs;
        impl crate::context::RefContext for BrokenRefs {
            fn customer_exists(&self, _: &str) -> Result<bool, DomainError> {
                Err(DomainError::lookup_failed("disk I/O error"))
            }
            fn session_exists(&self, _: &str) -> Result<bool, DomainError> {
                Err(DomainError::lookup_failed("disk I/O error"))
            }
            fn user_exists(&self, _: &str) -> Result<bool, DomainError> {
                Err(DomainError::lookup_failed("disk I/O error"))
            }
        }

        let err = validate_session_create(&session(SessionStatus::Active), &BrokenRefs).unwrap_err();
        assert_eq!(err, DomainError::lookup_failed("disk I/O error"));
    }

    #[test]
    fn create_is_idempotent_on_accepted_input() {
        let mut candidate = session(SessionStatus::Escalated);
        candidate.agent_id = Some("user_2".to_owned());
        candidate.escalation_reason = Some("complex_account_issue".to_owned());
        let accepted = validate_session_create(&candidate, &refs()).unwrap();
        let again = validate_session_create(&accepted, &refs()).unwrap();
        assert_eq!(
            serde_json::to_value(&accepted).unwrap(),
            serde_json::to_value(&again).unwrap()
        );
    }
}
