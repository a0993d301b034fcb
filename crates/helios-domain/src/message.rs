//! Message validation, redaction span checks, and the external-read
//! sanitizer.

use helios_schema::{EntityKind, ExternalMessage, Message, MessageType};

use crate::context::RefContext;
use crate::error::DomainError;
use crate::fields;

/// Validate a candidate message and return the normalized entity.
pub fn validate_message_create(
    candidate: &Message,
    refs: &dyn RefContext,
) -> Result<Message, DomainError> {
    let mut message = candidate.clone();
    message.id = fields::required("id", &candidate.id)?;
    message.session_id = fields::required("session_id", &candidate.session_id)?;

    if candidate.content.is_empty() {
        return Err(DomainError::validation("content", "must not be empty"));
    }
    if !refs.session_exists(&message.session_id)? {
        return Err(DomainError::missing_ref(
            EntityKind::Session,
            &message.session_id,
        ));
    }

    // Classifier outputs are only meaningful on bot turns.
    if message.message_type != MessageType::Bot {
        if message.confidence.is_some() {
            return Err(DomainError::validation(
                "confidence",
                "only set for bot messages",
            ));
        }
        if message.intent.is_some() {
            return Err(DomainError::validation(
                "intent",
                "only set for bot messages",
            ));
        }
        if !message.citations.is_empty() {
            return Err(DomainError::validation(
                "citations",
                "only set for bot messages",
            ));
        }
    }
    if let Some(confidence) = message.confidence {
        fields::unit_interval("confidence", confidence)?;
    }
    for citation in &message.citations {
        fields::unit_interval("citations", citation.confidence)?;
    }

    check_redaction_spans(&message)?;

    Ok(message)
}

/// Check every redaction span is ordered, within the content's character
/// bounds, and pairwise non-overlapping.
///
/// Spans index characters, not bytes: the wire contract counts positions the
/// way the frontend does.
pub fn check_redaction_spans(message: &Message) -> Result<(), DomainError> {
    let content_chars = message.content.chars().count();

    for redaction in &message.redactions {
        let span = redaction.position;
        if !span.is_ordered() {
            return Err(DomainError::validation(
                "redactions",
                format!("span {span} is empty or inverted"),
            ));
        }
        if span.end() > content_chars {
            return Err(DomainError::validation(
                "redactions",
                format!("span {span} exceeds content length {content_chars}"),
            ));
        }
        fields::unit_interval("redactions", redaction.confidence)?;
    }

    for (i, a) in message.redactions.iter().enumerate() {
        for b in &message.redactions[i + 1..] {
            if a.position.overlaps(&b.position) {
                return Err(DomainError::OverlappingRedaction {
                    positions: vec![a.position, b.position],
                });
            }
        }
    }

    Ok(())
}

/// Produce the only message shape allowed across the presentation boundary.
///
/// Two things happen here. Every redacted span in `content` is replaced by
/// its masked text, so no pre-redaction substring survives in the copy. And
/// the redaction entries are rebuilt as [`ExternalRedaction`], which has no
/// `original` field at the type level; a consumer outside the trust boundary
/// cannot obtain the sensitive text from the result. Returned spans index
/// into the masked content.
///
/// Expects a message whose spans passed [`check_redaction_spans`]; a span
/// that no longer fits the content is dropped rather than applied partially.
///
/// [`ExternalRedaction`]: helios_schema::ExternalRedaction
pub fn sanitize_for_external_read(message: &Message) -> ExternalMessage {
    let chars: Vec<char> = message.content.chars().collect();

    let mut ordered: Vec<&helios_schema::Redaction> = message.redactions.iter().collect();
    ordered.sort_by_key(|r| r.position.start());

    let mut content = String::new();
    let mut redactions = Vec::with_capacity(ordered.len());
    let mut cursor = 0usize; // char index into the source content
    let mut out_chars = 0usize; // char index into the masked content

    for redaction in ordered {
        let span = redaction.position;
        if !span.is_ordered() || span.start() < cursor || span.end() > chars.len() {
            tracing::warn!(span = %span, message_id = %message.id, "dropping unusable redaction span during sanitize");
            continue;
        }

        let prefix: String = chars[cursor..span.start()].iter().collect();
        out_chars += span.start() - cursor;
        content.push_str(&prefix);

        let masked_chars = redaction.masked.chars().count();
        content.push_str(&redaction.masked);

        let mut external = helios_schema::ExternalRedaction::from(redaction);
        external.position = helios_schema::Span(out_chars, out_chars + masked_chars);
        redactions.push(external);

        out_chars += masked_chars;
        cursor = span.end();
    }
    let tail: String = chars[cursor..].iter().collect();
    content.push_str(&tail);

    ExternalMessage {
        id: message.id.clone(),
        session_id: message.session_id.clone(),
        content,
        message_type: message.message_type,
        timestamp: message.timestamp,
        status: message.status,
        confidence: message.confidence,
        intent: message.intent.clone(),
        citations: message.citations.clone(),
        redactions,
        entities: message.entities.clone(),
        metadata: message.metadata.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::StaticRefs;
    use chrono::Utc;
    use helios_schema::{Metadata, MessageStatus, Redaction, RedactionKind, Span};

    fn refs() -> StaticRefs {
        StaticRefs::new().with_session("session_1")
    }

    fn message(content: &str) -> Message {
        Message {
            id: "msg_1".to_owned(),
            session_id: "session_1".to_owned(),
            content: content.to_owned(),
            message_type: MessageType::User,
            timestamp: Utc::now(),
            status: MessageStatus::Delivered,
            confidence: None,
            intent: None,
            citations: vec![],
            redactions: vec![],
            entities: Metadata::new(),
            metadata: Metadata::new(),
        }
    }

    fn redaction(span: Span, original: &str) -> Redaction {
        Redaction {
            kind: RedactionKind::AccountNumber,
            original: original.to_owned(),
            masked: "****".to_owned(),
            position: span,
            confidence: 0.9,
        }
    }

    #[test]
    fn empty_content_rejected() {
        let err = validate_message_create(&message(""), &refs()).unwrap_err();
        assert!(matches!(
            err,
            DomainError::Validation {
                field: "content",
                ..
            }
        ));
    }

    #[test]
    fn unknown_session_rejected() {
        let mut candidate = message("hello");
        candidate.session_id = "session_404".to_owned();
        let err = validate_message_create(&candidate, &refs()).unwrap_err();
        assert_eq!(
            err,
            DomainError::missing_ref(EntityKind::Session, "session_404")
        );
    }

    #[test]
    fn confidence_on_user_message_rejected() {
        let mut candidate = message("hello");
        candidate.confidence = Some(0.9);
        let err = validate_message_create(&candidate, &refs()).unwrap_err();
        assert!(matches!(
            err,
            DomainError::Validation {
                field: "confidence",
                ..
            }
        ));
    }

    #[test]
    fn bot_message_with_classifier_fields_accepted() {
        let mut candidate = message("Your balance is available in the app.");
        candidate.message_type = MessageType::Bot;
        candidate.confidence = Some(0.92);
        candidate.intent = Some("account_balance".to_owned());
        let accepted = validate_message_create(&candidate, &refs()).unwrap();
        assert_eq!(accepted.confidence, Some(0.92));
    }

    #[test]
    fn bot_confidence_out_of_range_rejected() {
        let mut candidate = message("hi");
        candidate.message_type = MessageType::Bot;
        candidate.confidence = Some(1.2);
        assert!(validate_message_create(&candidate, &refs()).is_err());
    }

    #[test]
    fn overlapping_spans_rejected() {
        // Scenario: two redactions at [0,5) and [3,8).
        let mut candidate = message("ABCDEFGH");
        candidate.redactions = vec![
            redaction(Span(0, 5), "ABCDE"),
            redaction(Span(3, 8), "DEFGH"),
        ];
        let err = validate_message_create(&candidate, &refs()).unwrap_err();
        assert_eq!(
            err,
            DomainError::OverlappingRedaction {
                positions: vec![Span(0, 5), Span(3, 8)],
            }
        );
    }

    #[test]
    fn adjacent_spans_accepted() {
        let mut candidate = message("ABCDEFGH");
        candidate.redactions = vec![redaction(Span(0, 4), "ABCD"), redaction(Span(4, 8), "EFGH")];
        assert!(validate_message_create(&candidate, &refs()).is_ok());
    }

    #[test]
    fn span_past_content_end_rejected() {
        let mut candidate = message("short");
        candidate.redactions = vec![redaction(Span(0, 11), "short......")];
        let err = check_redaction_spans(&candidate).unwrap_err();
        assert!(matches!(
            err,
            DomainError::Validation {
                field: "redactions",
                ..
            }
        ));
    }

    #[test]
    fn spans_count_characters_not_bytes() {
        // "é" is two bytes but one character; a span to 4 must be in bounds.
        let mut candidate = message("éééé");
        candidate.redactions = vec![redaction(Span(0, 4), "éééé")];
        assert!(check_redaction_spans(&candidate).is_ok());

        candidate.redactions = vec![redaction(Span(0, 5), "éééé?")];
        assert!(check_redaction_spans(&candidate).is_err());
    }

    #[test]
    fn inverted_span_rejected() {
        let mut candidate = message("ABCDEFGH");
        candidate.redactions = vec![redaction(Span(5, 5), "")];
        assert!(check_redaction_spans(&candidate).is_err());
    }

    #[test]
    fn sanitize_strips_original_everywhere() {
        // Scenario: account number redaction on full content.
        let mut candidate = message("ABC123-4567");
        candidate.redactions = vec![Redaction {
            kind: RedactionKind::AccountNumber,
            original: "ABC123-4567".to_owned(),
            masked: "****-4567".to_owned(),
            position: Span(0, 11),
            confidence: 0.9,
        }];
        let accepted = validate_message_create(&candidate, &refs()).unwrap();

        let external = sanitize_for_external_read(&accepted);
        assert_eq!(external.content, "****-4567");
        assert_eq!(external.redactions.len(), 1);
        assert_eq!(external.redactions[0].masked, "****-4567");
        assert_eq!(external.redactions[0].position, Span(0, 9));

        let serialized = serde_json::to_string(&external).unwrap();
        assert!(!serialized.contains("ABC123-4567"));
        let value: serde_json::Value = serde_json::from_str(&serialized).unwrap();
        assert!(value["redactions"][0].get("original").is_none());
    }

    #[test]
    fn sanitize_splices_multiple_spans_in_order() {
        let mut candidate = message("ssn 123-45-6789 card 4111-1111");
        candidate.redactions = vec![
            Redaction {
                kind: RedactionKind::CreditCard,
                original: "4111-1111".to_owned(),
                masked: "****-1111".to_owned(),
                position: Span(21, 30),
                confidence: 0.8,
            },
            Redaction {
                kind: RedactionKind::Ssn,
                original: "123-45-6789".to_owned(),
                masked: "***-**-****".to_owned(),
                position: Span(4, 15),
                confidence: 0.95,
            },
        ];
        check_redaction_spans(&candidate).unwrap();

        let external = sanitize_for_external_read(&candidate);
        assert_eq!(external.content, "ssn ***-**-**** card ****-1111");
        for original in ["123-45-6789", "4111-1111"] {
            assert!(!external.content.contains(original));
        }
        // Rebuilt spans index into the masked content.
        assert_eq!(external.redactions[0].position, Span(4, 15));
        assert_eq!(external.redactions[1].position, Span(21, 30));
    }

    #[test]
    fn sanitize_preserves_untouched_fields() {
        let mut candidate = message("no pii here");
        candidate.message_type = MessageType::Bot;
        candidate.confidence = Some(0.7);
        candidate.intent = Some("greeting".to_owned());
        let external = sanitize_for_external_read(&candidate);
        assert_eq!(external.content, "no pii here");
        assert_eq!(external.confidence, Some(0.7));
        assert_eq!(external.intent.as_deref(), Some("greeting"));
        assert!(external.redactions.is_empty());
    }
}
