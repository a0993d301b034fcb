//! Shared field normalization and checks used by the per-entity validators.
//!
//! Normalization is idempotent: feeding an already-accepted entity back in
//! produces an identical result.

use crate::error::DomainError;

pub(crate) fn required(field: &'static str, value: &str) -> Result<String, DomainError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(field, "must not be empty"));
    }
    Ok(trimmed.to_owned())
}

pub(crate) fn email(field: &'static str, value: &str) -> Result<String, DomainError> {
    let normalized = required(field, value)?.to_lowercase();
    // Deliverability is the mail collaborator's problem; only the shape is checked.
    let Some((local, domain)) = normalized.split_once('@') else {
        return Err(DomainError::validation(field, "not an email address"));
    };
    if local.is_empty() || domain.is_empty() || !domain.contains('.') {
        return Err(DomainError::validation(field, "not an email address"));
    }
    Ok(normalized)
}

pub(crate) fn unit_interval(field: &'static str, value: f64) -> Result<(), DomainError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(DomainError::validation(
            field,
            format!("{value} is outside [0.0, 1.0]"),
        ));
    }
    Ok(())
}

pub(crate) fn tags(values: &[String]) -> Vec<String> {
    let mut normalized: Vec<String> = values
        .iter()
        .map(|t| t.trim().to_owned())
        .filter(|t| !t.is_empty())
        .collect();
    normalized.sort();
    normalized.dedup();
    normalized
}
