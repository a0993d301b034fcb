//! Knowledge-source validation, versioned revision, and retrieval gating.

use chrono::{DateTime, Utc};
use helios_schema::KnowledgeSource;

use crate::error::DomainError;
use crate::fields;

/// Validate a candidate knowledge source and return the normalized entity.
pub fn validate_knowledge_create(candidate: &KnowledgeSource) -> Result<KnowledgeSource, DomainError> {
    let mut source = candidate.clone();
    source.id = fields::required("id", &candidate.id)?;
    source.name = fields::required("name", &candidate.name)?;
    source.category = fields::required("category", &candidate.category)?;
    source.author = fields::required("author", &candidate.author)?;
    source.tenant_id = fields::required("tenant_id", &candidate.tenant_id)?;
    source.tags = fields::tags(&candidate.tags);

    if candidate.content.is_empty() {
        return Err(DomainError::validation("content", "must not be empty"));
    }
    if candidate.version < 1 {
        return Err(DomainError::validation("version", "starts at 1"));
    }
    if let (Some(effective), Some(expiry)) = (candidate.effective_date, candidate.expiry_date) {
        if expiry <= effective {
            return Err(DomainError::validation(
                "expiry_date",
                "must follow effective_date",
            ));
        }
    }
    if source.updated_at < source.created_at {
        return Err(DomainError::validation("updated_at", "precedes created_at"));
    }

    Ok(source)
}

/// Apply a content edit: bump the version by one and stamp `updated_at`.
pub fn revise_knowledge_source(
    source: &KnowledgeSource,
    new_content: impl Into<String>,
    now: DateTime<Utc>,
) -> KnowledgeSource {
    let mut revised = source.clone();
    revised.content = new_content.into();
    revised.version = source.version + 1;
    revised.updated_at = now;
    revised
}

/// Whether a source may feed retrieval-for-response at `now`.
///
/// Inactive sources are excluded unconditionally; the effective/expiry window
/// is half-open, so a source expires exactly at its expiry date.
pub fn is_retrievable(source: &KnowledgeSource, now: DateTime<Utc>) -> bool {
    if !source.is_active {
        return false;
    }
    if let Some(effective) = source.effective_date {
        if now < effective {
            return false;
        }
    }
    if let Some(expiry) = source.expiry_date {
        if now >= expiry {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use helios_schema::{KnowledgeType, Metadata};

    fn source() -> KnowledgeSource {
        let now = Utc::now();
        KnowledgeSource {
            id: "kb_1".to_owned(),
            name: "Wire transfer limits".to_owned(),
            kind: KnowledgeType::Policy,
            content: "Daily wire limit is $50,000 for premium accounts.".to_owned(),
            category: "payments".to_owned(),
            tags: vec!["wire".to_owned(), "limits".to_owned()],
            tenant_id: "tenant_1".to_owned(),
            author: "compliance".to_owned(),
            version: 1,
            is_active: true,
            effective_date: None,
            expiry_date: None,
            metadata: Metadata::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn revision_bumps_version_and_updated_at() {
        let v1 = validate_knowledge_create(&source()).unwrap();
        let later = v1.updated_at + TimeDelta::try_seconds(300).unwrap();
        let v2 = revise_knowledge_source(&v1, "Daily wire limit is $75,000.", later);
        assert_eq!(v2.version, 2);
        assert_eq!(v2.updated_at, later);
        assert_eq!(v2.created_at, v1.created_at);

        let v3 = revise_knowledge_source(&v2, "Daily wire limit is $100,000.", later);
        assert_eq!(v3.version, 3);
    }

    #[test]
    fn version_zero_rejected() {
        let mut candidate = source();
        candidate.version = 0;
        let err = validate_knowledge_create(&candidate).unwrap_err();
        assert!(matches!(
            err,
            DomainError::Validation {
                field: "version",
                ..
            }
        ));
    }

    #[test]
    fn inactive_sources_never_retrievable() {
        let mut s = source();
        s.is_active = false;
        assert!(!is_retrievable(&s, Utc::now()));
    }

    #[test]
    fn date_window_is_half_open() {
        let now = Utc::now();
        let mut s = source();
        s.effective_date = Some(now);
        s.expiry_date = Some(now + TimeDelta::try_days(30).unwrap());

        assert!(is_retrievable(&s, now));
        assert!(is_retrievable(
            &s,
            now + TimeDelta::try_days(29).unwrap()
        ));
        assert!(!is_retrievable(&s, now + TimeDelta::try_days(30).unwrap()));
        assert!(!is_retrievable(&s, now - TimeDelta::try_seconds(1).unwrap()));
    }

    #[test]
    fn expiry_before_effective_rejected() {
        let now = Utc::now();
        let mut candidate = source();
        candidate.effective_date = Some(now);
        candidate.expiry_date = Some(now - TimeDelta::try_days(1).unwrap());
        assert!(validate_knowledge_create(&candidate).is_err());
    }
}
