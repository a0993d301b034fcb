//! Pattern-driven PII detection: applies active [`RedactionRule`]s to
//! message content and produces a non-overlapping set of [`Redaction`]s.
//!
//! Rules run in the order given; when matches collide, the earlier rule's
//! span wins. Spans are emitted in character coordinates to match the wire
//! contract, regardless of byte layout.

use helios_schema::{Redaction, RedactionKind, RedactionRule, Span};
use regex::Regex;
use tracing::debug;

use crate::error::DomainError;
use crate::fields;

/// Validate a candidate rule and return the normalized entity. The pattern
/// must compile; a rule that cannot run never reaches the store.
pub fn validate_redaction_rule(candidate: &RedactionRule) -> Result<RedactionRule, DomainError> {
    let mut rule = candidate.clone();
    rule.id = fields::required("id", &candidate.id)?;
    rule.name = fields::required("name", &candidate.name)?;
    Regex::new(&rule.pattern)
        .map_err(|e| DomainError::validation("pattern", format!("rule {}: {e}", rule.id)))?;
    Ok(rule)
}

/// Scan `content` with every active rule and return the detected redactions,
/// sorted by span start.
pub fn apply_redaction_rules(
    content: &str,
    rules: &[RedactionRule],
) -> Result<Vec<Redaction>, DomainError> {
    let mut taken: Vec<Span> = Vec::new();
    let mut redactions: Vec<Redaction> = Vec::new();

    for rule in rules.iter().filter(|r| r.is_active) {
        let regex = Regex::new(&rule.pattern).map_err(|e| {
            DomainError::validation("pattern", format!("rule {}: {e}", rule.id))
        })?;

        for found in regex.find_iter(content) {
            let span = char_span(content, found.start(), found.end());
            if taken.iter().any(|t| t.overlaps(&span)) {
                debug!(rule = %rule.id, span = %span, "skipping match overlapping an earlier rule");
                continue;
            }
            taken.push(span);
            redactions.push(Redaction {
                kind: rule.kind,
                original: found.as_str().to_owned(),
                masked: mask(rule.kind, found.as_str()),
                position: span,
                confidence: 1.0,
            });
        }
    }

    redactions.sort_by_key(|r| r.position.start());
    Ok(redactions)
}

/// Kind-appropriate replacement text. Account-like values keep their last
/// four characters (plus a leading separator when present) so agents can
/// still confirm identity; everything else is fully masked.
pub fn mask(kind: RedactionKind, original: &str) -> String {
    match kind {
        RedactionKind::AccountNumber | RedactionKind::CreditCard | RedactionKind::Phone => {
            keep_last_four(original)
        }
        RedactionKind::Ssn => "***-**-****".to_owned(),
        RedactionKind::Email => "***@***".to_owned(),
        RedactionKind::Address => "*".repeat(original.chars().count()),
    }
}

fn keep_last_four(original: &str) -> String {
    let chars: Vec<char> = original.chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let mut tail_start = chars.len() - 4;
    // Keep a separator in front of the tail: "-4567" reads better than "4567".
    if tail_start > 0 && (chars[tail_start - 1] == '-' || chars[tail_start - 1] == ' ') {
        tail_start -= 1;
    }
    let tail: String = chars[tail_start..].iter().collect();
    format!("****{tail}")
}

/// Convert regex byte offsets into character offsets.
fn char_span(content: &str, byte_start: usize, byte_end: usize) -> Span {
    let start = content[..byte_start].chars().count();
    let len = content[byte_start..byte_end].chars().count();
    Span(start, start + len)
}
