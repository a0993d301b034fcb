use std::collections::HashSet;

use crate::error::DomainError;

/// Read context validators use to resolve references against the current
/// store snapshot. The store provides lookups that are synchronous within
/// its transaction boundary; this layer only asks whether an id resolves.
///
/// A lookup that cannot be answered (storage failure, poisoned connection)
/// returns [`DomainError::LookupFailed`] rather than `false`, so an I/O
/// problem never masquerades as a missing reference.
pub trait RefContext {
    fn customer_exists(&self, id: &str) -> Result<bool, DomainError>;
    fn session_exists(&self, id: &str) -> Result<bool, DomainError>;
    fn user_exists(&self, id: &str) -> Result<bool, DomainError>;
}

/// Fixed id sets, for callers validating against an in-memory snapshot
/// (and for tests).
#[derive(Debug, Default, Clone)]
pub struct StaticRefs {
    customers: HashSet<String>,
    sessions: HashSet<String>,
    users: HashSet<String>,
}

impl StaticRefs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_customer(mut self, id: impl Into<String>) -> Self {
        self.customers.insert(id.into());
        self
    }

    pub fn with_session(mut self, id: impl Into<String>) -> Self {
        self.sessions.insert(id.into());
        self
    }

    pub fn with_user(mut self, id: impl Into<String>) -> Self {
        self.users.insert(id.into());
        self
    }
}

impl RefContext for StaticRefs {
    fn customer_exists(&self, id: &str) -> Result<bool, DomainError> {
        Ok(self.customers.contains(id))
    }

    fn session_exists(&self, id: &str) -> Result<bool, DomainError> {
        Ok(self.sessions.contains(id))
    }

    fn user_exists(&self, id: &str) -> Result<bool, DomainError> {
        Ok(self.users.contains(id))
    }
}
