use helios_schema::{EntityKind, Span};
use thiserror::Error;

/// Validation failures surfaced to the caller. All variants are synchronous
/// and recoverable; none leaves a partially applied write behind.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DomainError {
    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("illegal {entity} transition: {from} -> {to}")]
    IllegalTransition {
        entity: EntityKind,
        from: String,
        to: String,
    },

    #[error("{entity} reference does not resolve: {missing_id}")]
    ReferentialIntegrity {
        entity: EntityKind,
        missing_id: String,
    },

    #[error("overlapping redaction spans: {}", render_spans(.positions))]
    OverlappingRedaction { positions: Vec<Span> },

    #[error("reference lookup failed: {reason}")]
    LookupFailed { reason: String },
}

impl DomainError {
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        DomainError::Validation {
            field,
            reason: reason.into(),
        }
    }

    pub fn missing_ref(entity: EntityKind, id: impl Into<String>) -> Self {
        DomainError::ReferentialIntegrity {
            entity,
            missing_id: id.into(),
        }
    }

    pub fn lookup_failed(reason: impl Into<String>) -> Self {
        DomainError::LookupFailed {
            reason: reason.into(),
        }
    }
}

fn render_spans(positions: &[Span]) -> String {
    positions
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
