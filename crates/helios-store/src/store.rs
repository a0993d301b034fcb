use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use helios_domain::{
    apply_redaction_rules, apply_session_transition, apply_ticket_transition, is_retrievable,
    revise_knowledge_source, sanitize_for_external_read, validate_customer_create,
    validate_knowledge_create, validate_message_create, validate_redaction_rule,
    validate_session_create, validate_ticket_create, validate_user_create, DomainError,
    RefContext, SessionChange,
};
use helios_schema::{
    AccountType, AuditEvent, ChannelType, Customer, CustomerTier, EntityKind, ExternalMessage,
    KnowledgeSource, KnowledgeType, Message, MessageStatus, MessageType, Metadata, MetadataValue,
    Redaction, RedactionKind, RedactionRule, Session, SessionStatus, Ticket, TicketCategory,
    TicketPriority, TicketStatus, User, UserRole,
};
use rusqlite::{params, Connection, OptionalExtension, Row};
use thiserror::Error;
use tokio::task;
use tracing::debug;
use uuid::Uuid;

use crate::config::StoreConfig;
use crate::migrations::run_migrations;

/// Tenant-scoped store for the support domain.
///
/// Every mutation validates against the committed snapshot and writes inside
/// a single transaction, so a rejected record leaves no partial state. The
/// one connection behind a mutex serializes writers; per-entity mutual
/// exclusion follows from that.
#[derive(Clone)]
pub struct SupportStore {
    db: Arc<Mutex<Connection>>,
    tenant_id: String,
}

impl SupportStore {
    pub fn open(path: &str, tenant_id: impl Into<String>) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open support store at {path}"))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        run_migrations(&conn)?;
        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
            tenant_id: tenant_id.into(),
        })
    }

    pub fn open_with_config(config: &StoreConfig) -> Result<Self> {
        Self::open(&config.database_path, config.tenant_id.clone())
    }

    pub fn open_in_memory(tenant_id: impl Into<String>) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        run_migrations(&conn)?;
        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
            tenant_id: tenant_id.into(),
        })
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    fn check_tenant(&self, tenant_id: &str) -> Result<(), DomainError> {
        if tenant_id != self.tenant_id {
            return Err(DomainError::validation(
                "tenant_id",
                format!("store is scoped to tenant {}", self.tenant_id),
            ));
        }
        Ok(())
    }

    // ---- users ----

    pub async fn create_user(&self, candidate: User) -> Result<User> {
        let db = Arc::clone(&self.db);
        let tenant = self.tenant_id.clone();
        let store = self.clone();
        task::spawn_blocking(move || {
            let user = validate_user_create(&candidate)?;
            store.check_tenant(&user.tenant_id)?;
            let conn = lock(&db)?;
            if row_exists(&conn, "SELECT 1 FROM users WHERE email = ?1", &user.email)? {
                return Err(
                    DomainError::validation("email", "already registered for tenant").into(),
                );
            }
            let tx = conn.unchecked_transaction()?;
            tx.execute(
                r#"
                INSERT INTO users (id, email, name, role, tenant_id, is_active, last_login, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
                params![
                    user.id,
                    user.email,
                    user.name,
                    user.role.as_str(),
                    user.tenant_id,
                    user.is_active,
                    user.last_login.map(|t| t.to_rfc3339()),
                    user.created_at.to_rfc3339(),
                    user.updated_at.to_rfc3339(),
                ],
            )?;
            append_audit(&tx, "user_created", Some(&user.id), None, &user.id)?;
            tx.commit()?;
            debug!(user_id = %user.id, tenant = %tenant, "user created");
            Ok::<User, anyhow::Error>(user)
        })
        .await?
    }

    pub async fn get_user(&self, id: &str) -> Result<Option<User>> {
        let db = Arc::clone(&self.db);
        let id = id.to_owned();
        task::spawn_blocking(move || {
            let conn = lock(&db)?;
            let user = conn
                .query_row(
                    "SELECT id, email, name, role, tenant_id, is_active, last_login, created_at, updated_at FROM users WHERE id = ?1",
                    [&id],
                    row_to_user,
                )
                .optional()?;
            Ok::<Option<User>, anyhow::Error>(user)
        })
        .await?
    }

    // ---- customers ----

    pub async fn create_customer(&self, candidate: Customer) -> Result<Customer> {
        let db = Arc::clone(&self.db);
        let store = self.clone();
        task::spawn_blocking(move || {
            let customer = validate_customer_create(&candidate)?;
            store.check_tenant(&customer.tenant_id)?;
            let conn = lock(&db)?;
            if row_exists(
                &conn,
                "SELECT 1 FROM customers WHERE email = ?1",
                &customer.email,
            )? {
                return Err(
                    DomainError::validation("email", "already registered for tenant").into(),
                );
            }
            let tx = conn.unchecked_transaction()?;
            tx.execute(
                r#"
                INSERT INTO customers (id, email, name, phone, tier, account_type, tenant_id, metadata, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                "#,
                params![
                    customer.id,
                    customer.email,
                    customer.name,
                    customer.phone,
                    customer.tier.as_str(),
                    customer.account_type.as_str(),
                    customer.tenant_id,
                    serde_json::to_string(&customer.metadata)?,
                    customer.created_at.to_rfc3339(),
                    customer.updated_at.to_rfc3339(),
                ],
            )?;
            append_audit(&tx, "customer_created", None, None, &customer.id)?;
            tx.commit()?;
            Ok::<Customer, anyhow::Error>(customer)
        })
        .await?
    }

    pub async fn get_customer(&self, id: &str) -> Result<Option<Customer>> {
        let db = Arc::clone(&self.db);
        let id = id.to_owned();
        task::spawn_blocking(move || {
            let conn = lock(&db)?;
            let customer = conn
                .query_row(
                    "SELECT id, email, name, phone, tier, account_type, tenant_id, metadata, created_at, updated_at FROM customers WHERE id = ?1",
                    [&id],
                    row_to_customer,
                )
                .optional()?;
            Ok::<Option<Customer>, anyhow::Error>(customer)
        })
        .await?
    }

    // ---- sessions ----

    pub async fn create_session(&self, candidate: Session) -> Result<Session> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || {
            let conn = lock(&db)?;
            let session = validate_session_create(&candidate, &ConnRefs(&conn))?;
            let tx = conn.unchecked_transaction()?;
            tx.execute(
                r#"
                INSERT INTO sessions (id, customer_id, status, channel, agent_id, escalation_reason, metadata, created_at, ended_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
                params![
                    session.id,
                    session.customer_id,
                    session.status.as_str(),
                    session.channel.as_str(),
                    session.agent_id,
                    session.escalation_reason,
                    serde_json::to_string(&session.metadata)?,
                    session.created_at.to_rfc3339(),
                    session.ended_at.map(|t| t.to_rfc3339()),
                ],
            )?;
            append_audit(
                &tx,
                "session_created",
                session.agent_id.as_deref(),
                Some(&session.id),
                &session.id,
            )?;
            tx.commit()?;
            Ok::<Session, anyhow::Error>(session)
        })
        .await?
    }

    pub async fn get_session(&self, id: &str) -> Result<Option<Session>> {
        let db = Arc::clone(&self.db);
        let id = id.to_owned();
        task::spawn_blocking(move || {
            let conn = lock(&db)?;
            Ok::<Option<Session>, anyhow::Error>(load_session(&conn, &id)?)
        })
        .await?
    }

    /// Apply a status transition to a stored session.
    ///
    /// Validation and the row update run under one lock acquisition, so two
    /// agents racing to escalate the same session serialize: the loser sees
    /// status already `escalated` and gets the illegal-edge error.
    pub async fn transition_session(
        &self,
        id: &str,
        to: SessionStatus,
        change: SessionChange,
    ) -> Result<Session> {
        let db = Arc::clone(&self.db);
        let id = id.to_owned();
        task::spawn_blocking(move || {
            let conn = lock(&db)?;
            let current = load_session(&conn, &id)?
                .ok_or_else(|| DomainError::missing_ref(EntityKind::Session, &id))?;
            let updated = apply_session_transition(&current, to, change, &ConnRefs(&conn))?;
            let tx = conn.unchecked_transaction()?;
            tx.execute(
                r#"
                UPDATE sessions
                SET status = ?2, agent_id = ?3, escalation_reason = ?4, ended_at = ?5
                WHERE id = ?1
                "#,
                params![
                    updated.id,
                    updated.status.as_str(),
                    updated.agent_id,
                    updated.escalation_reason,
                    updated.ended_at.map(|t| t.to_rfc3339()),
                ],
            )?;
            let event = format!("session_{}", to.as_str());
            append_audit(
                &tx,
                &event,
                updated.agent_id.as_deref(),
                Some(&updated.id),
                &updated.id,
            )?;
            tx.commit()?;
            debug!(session_id = %updated.id, from = current.status.as_str(), to = to.as_str(), "session transitioned");
            Ok::<Session, anyhow::Error>(updated)
        })
        .await?
    }

    // ---- messages ----

    pub async fn append_message(&self, candidate: Message) -> Result<Message> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || {
            let conn = lock(&db)?;
            let message = validate_message_create(&candidate, &ConnRefs(&conn))?;
            let tx = conn.unchecked_transaction()?;
            tx.execute(
                r#"
                INSERT INTO messages (id, session_id, content, message_type, status, ts, confidence, intent, citations, redactions, entities, metadata)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                "#,
                params![
                    message.id,
                    message.session_id,
                    message.content,
                    message.message_type.as_str(),
                    message.status.as_str(),
                    message.timestamp.to_rfc3339(),
                    message.confidence,
                    message.intent,
                    serde_json::to_string(&message.citations)?,
                    serde_json::to_string(&message.redactions)?,
                    serde_json::to_string(&message.entities)?,
                    serde_json::to_string(&message.metadata)?,
                ],
            )?;
            append_audit(&tx, "message_appended", None, Some(&message.session_id), &message.id)?;
            tx.commit()?;
            Ok::<Message, anyhow::Error>(message)
        })
        .await?
    }

    /// Raw messages for a session, ordered by timestamp. Trusted-boundary
    /// use only: redactions still carry original text.
    pub async fn session_messages(&self, session_id: &str) -> Result<Vec<Message>> {
        let db = Arc::clone(&self.db);
        let session_id = session_id.to_owned();
        task::spawn_blocking(move || {
            let conn = lock(&db)?;
            let mut stmt = conn.prepare(
                r#"
                SELECT id, session_id, content, message_type, status, ts, confidence, intent, citations, redactions, entities, metadata
                FROM messages
                WHERE session_id = ?1
                ORDER BY ts
                "#,
            )?;
            let rows = stmt.query_map([&session_id], row_to_message)?;
            let mut messages = Vec::new();
            for row in rows {
                messages.push(row?);
            }
            Ok::<Vec<Message>, anyhow::Error>(messages)
        })
        .await?
    }

    /// Sanitized conversation history, the only message shape handed toward
    /// presentation.
    pub async fn session_messages_external(
        &self,
        session_id: &str,
    ) -> Result<Vec<ExternalMessage>> {
        let messages = self.session_messages(session_id).await?;
        Ok(messages.iter().map(sanitize_for_external_read).collect())
    }

    pub async fn get_message_external(&self, id: &str) -> Result<Option<ExternalMessage>> {
        let db = Arc::clone(&self.db);
        let id = id.to_owned();
        task::spawn_blocking(move || {
            let conn = lock(&db)?;
            let message = conn
                .query_row(
                    r#"
                    SELECT id, session_id, content, message_type, status, ts, confidence, intent, citations, redactions, entities, metadata
                    FROM messages WHERE id = ?1
                    "#,
                    [&id],
                    row_to_message,
                )
                .optional()?;
            Ok::<Option<ExternalMessage>, anyhow::Error>(
                message.as_ref().map(sanitize_for_external_read),
            )
        })
        .await?
    }

    // ---- tickets ----

    pub async fn create_ticket(&self, candidate: Ticket) -> Result<Ticket> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || {
            let conn = lock(&db)?;
            let ticket = validate_ticket_create(&candidate, &ConnRefs(&conn))?;
            let tx = conn.unchecked_transaction()?;
            tx.execute(
                r#"
                INSERT INTO tickets (id, session_id, customer_id, title, description, priority, category, status, assigned_agent_id, tags, metadata, created_at, updated_at, resolved_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
                "#,
                params![
                    ticket.id,
                    ticket.session_id,
                    ticket.customer_id,
                    ticket.title,
                    ticket.description,
                    ticket.priority.as_str(),
                    ticket.category.as_str(),
                    ticket.status.as_str(),
                    ticket.assigned_agent_id,
                    serde_json::to_string(&ticket.tags)?,
                    serde_json::to_string(&ticket.metadata)?,
                    ticket.created_at.to_rfc3339(),
                    ticket.updated_at.to_rfc3339(),
                    ticket.resolved_at.map(|t| t.to_rfc3339()),
                ],
            )?;
            append_audit(
                &tx,
                "ticket_created",
                ticket.assigned_agent_id.as_deref(),
                Some(&ticket.session_id),
                &ticket.id,
            )?;
            tx.commit()?;
            Ok::<Ticket, anyhow::Error>(ticket)
        })
        .await?
    }

    pub async fn get_ticket(&self, id: &str) -> Result<Option<Ticket>> {
        let db = Arc::clone(&self.db);
        let id = id.to_owned();
        task::spawn_blocking(move || {
            let conn = lock(&db)?;
            Ok::<Option<Ticket>, anyhow::Error>(load_ticket(&conn, &id)?)
        })
        .await?
    }

    pub async fn transition_ticket(&self, id: &str, to: TicketStatus) -> Result<Ticket> {
        let db = Arc::clone(&self.db);
        let id = id.to_owned();
        task::spawn_blocking(move || {
            let conn = lock(&db)?;
            let current = load_ticket(&conn, &id)?
                .ok_or_else(|| DomainError::missing_ref(EntityKind::Ticket, &id))?;
            let updated = apply_ticket_transition(&current, to, Utc::now())?;
            let tx = conn.unchecked_transaction()?;
            tx.execute(
                "UPDATE tickets SET status = ?2, updated_at = ?3, resolved_at = ?4 WHERE id = ?1",
                params![
                    updated.id,
                    updated.status.as_str(),
                    updated.updated_at.to_rfc3339(),
                    updated.resolved_at.map(|t| t.to_rfc3339()),
                ],
            )?;
            let event = format!("ticket_{}", to.as_str());
            append_audit(
                &tx,
                &event,
                updated.assigned_agent_id.as_deref(),
                Some(&updated.session_id),
                &updated.id,
            )?;
            tx.commit()?;
            Ok::<Ticket, anyhow::Error>(updated)
        })
        .await?
    }

    // ---- knowledge sources ----

    pub async fn create_knowledge_source(
        &self,
        candidate: KnowledgeSource,
    ) -> Result<KnowledgeSource> {
        let db = Arc::clone(&self.db);
        let store = self.clone();
        task::spawn_blocking(move || {
            let source = validate_knowledge_create(&candidate)?;
            store.check_tenant(&source.tenant_id)?;
            let conn = lock(&db)?;
            let tx = conn.unchecked_transaction()?;
            tx.execute(
                r#"
                INSERT INTO knowledge_sources (id, name, kind, content, category, tags, tenant_id, author, version, is_active, effective_date, expiry_date, metadata, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
                "#,
                params![
                    source.id,
                    source.name,
                    source.kind.as_str(),
                    source.content,
                    source.category,
                    serde_json::to_string(&source.tags)?,
                    source.tenant_id,
                    source.author,
                    source.version,
                    source.is_active,
                    source.effective_date.map(|t| t.to_rfc3339()),
                    source.expiry_date.map(|t| t.to_rfc3339()),
                    serde_json::to_string(&source.metadata)?,
                    source.created_at.to_rfc3339(),
                    source.updated_at.to_rfc3339(),
                ],
            )?;
            append_audit(&tx, "knowledge_created", None, None, &source.id)?;
            tx.commit()?;
            Ok::<KnowledgeSource, anyhow::Error>(source)
        })
        .await?
    }

    pub async fn get_knowledge_source(&self, id: &str) -> Result<Option<KnowledgeSource>> {
        let db = Arc::clone(&self.db);
        let id = id.to_owned();
        task::spawn_blocking(move || {
            let conn = lock(&db)?;
            Ok::<Option<KnowledgeSource>, anyhow::Error>(load_knowledge(&conn, &id)?)
        })
        .await?
    }

    /// Replace a source's content: version bumps by one, updated_at moves.
    pub async fn revise_knowledge_source(
        &self,
        id: &str,
        new_content: &str,
    ) -> Result<KnowledgeSource> {
        let db = Arc::clone(&self.db);
        let id = id.to_owned();
        let new_content = new_content.to_owned();
        task::spawn_blocking(move || {
            let conn = lock(&db)?;
            let current = load_knowledge(&conn, &id)?
                .ok_or_else(|| DomainError::missing_ref(EntityKind::KnowledgeSource, &id))?;
            if new_content.is_empty() {
                return Err(DomainError::validation("content", "must not be empty").into());
            }
            let revised = revise_knowledge_source(&current, new_content, Utc::now());
            let tx = conn.unchecked_transaction()?;
            tx.execute(
                "UPDATE knowledge_sources SET content = ?2, version = ?3, updated_at = ?4 WHERE id = ?1",
                params![
                    revised.id,
                    revised.content,
                    revised.version,
                    revised.updated_at.to_rfc3339(),
                ],
            )?;
            append_audit(&tx, "knowledge_revised", None, None, &revised.id)?;
            tx.commit()?;
            Ok::<KnowledgeSource, anyhow::Error>(revised)
        })
        .await?
    }

    pub async fn set_knowledge_active(&self, id: &str, is_active: bool) -> Result<()> {
        let db = Arc::clone(&self.db);
        let id = id.to_owned();
        task::spawn_blocking(move || {
            let conn = lock(&db)?;
            let tx = conn.unchecked_transaction()?;
            let changed = tx.execute(
                "UPDATE knowledge_sources SET is_active = ?2 WHERE id = ?1",
                params![id, is_active],
            )?;
            if changed == 0 {
                return Err(DomainError::missing_ref(EntityKind::KnowledgeSource, &id).into());
            }
            let event = if is_active {
                "knowledge_activated"
            } else {
                "knowledge_deactivated"
            };
            append_audit(&tx, event, None, None, &id)?;
            tx.commit()?;
            Ok::<(), anyhow::Error>(())
        })
        .await?
    }

    /// Sources eligible to feed retrieval-for-response right now. Inactive
    /// or out-of-window sources never appear.
    pub async fn retrievable_sources(&self) -> Result<Vec<KnowledgeSource>> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || {
            let conn = lock(&db)?;
            let mut stmt = conn.prepare(
                "SELECT id, name, kind, content, category, tags, tenant_id, author, version, is_active, effective_date, expiry_date, metadata, created_at, updated_at
                 FROM knowledge_sources WHERE is_active = 1",
            )?;
            let rows = stmt.query_map([], row_to_knowledge)?;
            let now = Utc::now();
            let mut sources = Vec::new();
            for row in rows {
                let source = row?;
                if is_retrievable(&source, now) {
                    sources.push(source);
                }
            }
            Ok::<Vec<KnowledgeSource>, anyhow::Error>(sources)
        })
        .await?
    }

    // ---- redaction rules ----

    pub async fn upsert_redaction_rule(&self, rule: RedactionRule) -> Result<()> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || {
            let rule = validate_redaction_rule(&rule)?;
            let conn = lock(&db)?;
            let tx = conn.unchecked_transaction()?;
            tx.execute(
                r#"
                INSERT INTO redaction_rules (id, name, pattern, kind, is_active, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    pattern = excluded.pattern,
                    kind = excluded.kind,
                    is_active = excluded.is_active,
                    updated_at = excluded.updated_at
                "#,
                params![
                    rule.id,
                    rule.name,
                    rule.pattern,
                    rule.kind.as_str(),
                    rule.is_active,
                    rule.created_at.to_rfc3339(),
                    rule.updated_at.to_rfc3339(),
                ],
            )?;
            append_audit(&tx, "redaction_rule_upserted", None, None, &rule.id)?;
            tx.commit()?;
            Ok::<(), anyhow::Error>(())
        })
        .await?
    }

    pub async fn active_redaction_rules(&self) -> Result<Vec<RedactionRule>> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || {
            let conn = lock(&db)?;
            let mut stmt = conn.prepare(
                "SELECT id, name, pattern, kind, is_active, created_at, updated_at
                 FROM redaction_rules WHERE is_active = 1 ORDER BY created_at",
            )?;
            let rows = stmt.query_map([], row_to_rule)?;
            let mut rules = Vec::new();
            for row in rows {
                rules.push(row?);
            }
            Ok::<Vec<RedactionRule>, anyhow::Error>(rules)
        })
        .await?
    }

    /// Run the active rule set over a piece of content.
    pub async fn redact(&self, content: &str) -> Result<Vec<Redaction>> {
        let rules = self.active_redaction_rules().await?;
        Ok(apply_redaction_rules(content, &rules)?)
    }

    // ---- audit trail ----

    pub async fn recent_audit_events(&self, limit: usize) -> Result<Vec<AuditEvent>> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || {
            let conn = lock(&db)?;
            let mut stmt = conn.prepare(
                "SELECT id, event_type, user_id, session_id, details, created_at
                 FROM audits ORDER BY created_at DESC LIMIT ?1",
            )?;
            let rows = stmt.query_map([limit as i64], row_to_audit)?;
            let mut events = Vec::new();
            for row in rows {
                events.push(row?);
            }
            Ok::<Vec<AuditEvent>, anyhow::Error>(events)
        })
        .await?
    }
}

fn lock(db: &Arc<Mutex<Connection>>) -> Result<std::sync::MutexGuard<'_, Connection>> {
    db.lock()
        .map_err(|_| anyhow!("failed to lock sqlite connection"))
}

fn row_exists(conn: &Connection, sql: &str, key: &str) -> rusqlite::Result<bool> {
    conn.query_row(sql, [key], |_| Ok(()))
        .optional()
        .map(|row| row.is_some())
}

/// Referential lookups against the committed snapshot, handed to the
/// validators while the connection lock is held. A failing lookup surfaces
/// as `LookupFailed`, never as a missing reference.
struct ConnRefs<'a>(&'a Connection);

impl ConnRefs<'_> {
    fn exists(&self, sql: &str, id: &str) -> Result<bool, DomainError> {
        row_exists(self.0, sql, id).map_err(|e| DomainError::lookup_failed(e.to_string()))
    }
}

impl RefContext for ConnRefs<'_> {
    fn customer_exists(&self, id: &str) -> Result<bool, DomainError> {
        self.exists("SELECT 1 FROM customers WHERE id = ?1", id)
    }

    fn session_exists(&self, id: &str) -> Result<bool, DomainError> {
        self.exists("SELECT 1 FROM sessions WHERE id = ?1", id)
    }

    fn user_exists(&self, id: &str) -> Result<bool, DomainError> {
        self.exists("SELECT 1 FROM users WHERE id = ?1", id)
    }
}

fn append_audit(
    conn: &Connection,
    event_type: &str,
    user_id: Option<&str>,
    session_id: Option<&str>,
    entity_id: &str,
) -> Result<()> {
    let mut details = Metadata::new();
    details.insert("entity_id".to_owned(), MetadataValue::from(entity_id));
    conn.execute(
        "INSERT INTO audits (id, event_type, user_id, session_id, details, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            Uuid::new_v4().to_string(),
            event_type,
            user_id,
            session_id,
            serde_json::to_string(&details)?,
            Utc::now().to_rfc3339(),
        ],
    )?;
    Ok(())
}

fn load_session(conn: &Connection, id: &str) -> Result<Option<Session>> {
    Ok(conn
        .query_row(
            "SELECT id, customer_id, status, channel, agent_id, escalation_reason, metadata, created_at, ended_at FROM sessions WHERE id = ?1",
            [id],
            row_to_session,
        )
        .optional()?)
}

fn load_ticket(conn: &Connection, id: &str) -> Result<Option<Ticket>> {
    Ok(conn
        .query_row(
            "SELECT id, session_id, customer_id, title, description, priority, category, status, assigned_agent_id, tags, metadata, created_at, updated_at, resolved_at FROM tickets WHERE id = ?1",
            [id],
            row_to_ticket,
        )
        .optional()?)
}

fn load_knowledge(conn: &Connection, id: &str) -> Result<Option<KnowledgeSource>> {
    Ok(conn
        .query_row(
            "SELECT id, name, kind, content, category, tags, tenant_id, author, version, is_active, effective_date, expiry_date, metadata, created_at, updated_at FROM knowledge_sources WHERE id = ?1",
            [id],
            row_to_knowledge,
        )
        .optional()?)
}

// ---- row decoding ----

#[derive(Debug, Error)]
#[error("unknown {column} value: {value}")]
struct ColumnDecodeError {
    column: &'static str,
    value: String,
}

fn decode_err(err: impl std::error::Error + Send + Sync + 'static) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(err))
}

fn parse_col<T>(
    column: &'static str,
    value: String,
    parse: fn(&str) -> Option<T>,
) -> rusqlite::Result<T> {
    parse(&value).ok_or_else(|| decode_err(ColumnDecodeError { column, value }))
}

fn json_col<T: serde::de::DeserializeOwned>(value: String) -> rusqlite::Result<T> {
    serde_json::from_str(&value).map_err(decode_err)
}

fn ts_col(column: &'static str, value: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| decode_err(ColumnDecodeError { column, value }))
}

fn opt_ts_col(column: &'static str, value: Option<String>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    value.map(|v| ts_col(column, v)).transpose()
}

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        role: parse_col("role", row.get(3)?, UserRole::parse)?,
        tenant_id: row.get(4)?,
        is_active: row.get(5)?,
        last_login: opt_ts_col("last_login", row.get(6)?)?,
        created_at: ts_col("created_at", row.get(7)?)?,
        updated_at: ts_col("updated_at", row.get(8)?)?,
    })
}

fn row_to_customer(row: &Row<'_>) -> rusqlite::Result<Customer> {
    Ok(Customer {
        id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        phone: row.get(3)?,
        tier: parse_col("tier", row.get(4)?, CustomerTier::parse)?,
        account_type: parse_col("account_type", row.get(5)?, AccountType::parse)?,
        tenant_id: row.get(6)?,
        metadata: json_col(row.get(7)?)?,
        created_at: ts_col("created_at", row.get(8)?)?,
        updated_at: ts_col("updated_at", row.get(9)?)?,
    })
}

fn row_to_session(row: &Row<'_>) -> rusqlite::Result<Session> {
    Ok(Session {
        id: row.get(0)?,
        customer_id: row.get(1)?,
        status: parse_col("status", row.get(2)?, SessionStatus::parse)?,
        channel: parse_col("channel", row.get(3)?, ChannelType::parse)?,
        agent_id: row.get(4)?,
        escalation_reason: row.get(5)?,
        metadata: json_col(row.get(6)?)?,
        created_at: ts_col("created_at", row.get(7)?)?,
        ended_at: opt_ts_col("ended_at", row.get(8)?)?,
    })
}

fn row_to_message(row: &Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: row.get(0)?,
        session_id: row.get(1)?,
        content: row.get(2)?,
        message_type: parse_col("message_type", row.get(3)?, MessageType::parse)?,
        status: parse_col("status", row.get(4)?, MessageStatus::parse)?,
        timestamp: ts_col("ts", row.get(5)?)?,
        confidence: row.get(6)?,
        intent: row.get(7)?,
        citations: json_col(row.get(8)?)?,
        redactions: json_col(row.get(9)?)?,
        entities: json_col(row.get(10)?)?,
        metadata: json_col(row.get(11)?)?,
    })
}

fn row_to_ticket(row: &Row<'_>) -> rusqlite::Result<Ticket> {
    Ok(Ticket {
        id: row.get(0)?,
        session_id: row.get(1)?,
        customer_id: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        priority: parse_col("priority", row.get(5)?, TicketPriority::parse)?,
        category: parse_col("category", row.get(6)?, TicketCategory::parse)?,
        status: parse_col("status", row.get(7)?, TicketStatus::parse)?,
        assigned_agent_id: row.get(8)?,
        tags: json_col(row.get(9)?)?,
        metadata: json_col(row.get(10)?)?,
        created_at: ts_col("created_at", row.get(11)?)?,
        updated_at: ts_col("updated_at", row.get(12)?)?,
        resolved_at: opt_ts_col("resolved_at", row.get(13)?)?,
    })
}

fn row_to_knowledge(row: &Row<'_>) -> rusqlite::Result<KnowledgeSource> {
    Ok(KnowledgeSource {
        id: row.get(0)?,
        name: row.get(1)?,
        kind: parse_col("kind", row.get(2)?, KnowledgeType::parse)?,
        content: row.get(3)?,
        category: row.get(4)?,
        tags: json_col(row.get(5)?)?,
        tenant_id: row.get(6)?,
        author: row.get(7)?,
        version: row.get(8)?,
        is_active: row.get(9)?,
        effective_date: opt_ts_col("effective_date", row.get(10)?)?,
        expiry_date: opt_ts_col("expiry_date", row.get(11)?)?,
        metadata: json_col(row.get(12)?)?,
        created_at: ts_col("created_at", row.get(13)?)?,
        updated_at: ts_col("updated_at", row.get(14)?)?,
    })
}

fn row_to_rule(row: &Row<'_>) -> rusqlite::Result<RedactionRule> {
    Ok(RedactionRule {
        id: row.get(0)?,
        name: row.get(1)?,
        pattern: row.get(2)?,
        kind: parse_col("kind", row.get(3)?, RedactionKind::parse)?,
        is_active: row.get(4)?,
        created_at: ts_col("created_at", row.get(5)?)?,
        updated_at: ts_col("updated_at", row.get(6)?)?,
    })
}

fn row_to_audit(row: &Row<'_>) -> rusqlite::Result<AuditEvent> {
    Ok(AuditEvent {
        id: row.get(0)?,
        event_type: row.get(1)?,
        user_id: row.get(2)?,
        session_id: row.get(3)?,
        details: json_col(row.get(4)?)?,
        created_at: ts_col("created_at", row.get(5)?)?,
    })
}
