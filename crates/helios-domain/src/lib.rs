//! Validation layer for the Helios support domain.
//!
//! Accepts candidate entity records, returns them normalized or rejects them
//! with a precise [`DomainError`]. Pure and synchronous: no I/O, no
//! suspension; the embedding store decides transaction and serialization
//! boundaries.

pub mod context;
pub mod error;
mod fields;
pub mod identity;
pub mod knowledge;
pub mod message;
pub mod redaction;
pub mod session;
pub mod ticket;

pub use context::{RefContext, StaticRefs};
pub use error::DomainError;
pub use identity::{validate_customer_create, validate_user_create};
pub use knowledge::{is_retrievable, revise_knowledge_source, validate_knowledge_create};
pub use message::{check_redaction_spans, sanitize_for_external_read, validate_message_create};
pub use redaction::{apply_redaction_rules, mask, validate_redaction_rule};
pub use session::{
    apply_session_transition, is_legal_session_transition, validate_session_create, SessionChange,
};
pub use ticket::{apply_ticket_transition, is_legal_ticket_transition, validate_ticket_create};
