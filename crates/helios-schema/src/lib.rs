use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod metadata;

pub use metadata::{Metadata, MetadataValue};

/// Entity kinds with store-level identity, used in error reporting and audit rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    User,
    Customer,
    Session,
    Message,
    Ticket,
    KnowledgeSource,
    RedactionRule,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::User => "user",
            EntityKind::Customer => "customer",
            EntityKind::Session => "session",
            EntityKind::Message => "message",
            EntityKind::Ticket => "ticket",
            EntityKind::KnowledgeSource => "knowledge_source",
            EntityKind::RedactionRule => "redaction_rule",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    Agent,
    Supervisor,
    Viewer,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Agent => "agent",
            UserRole::Supervisor => "supervisor",
            UserRole::Viewer => "viewer",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(UserRole::Admin),
            "agent" => Some(UserRole::Agent),
            "supervisor" => Some(UserRole::Supervisor),
            "viewer" => Some(UserRole::Viewer),
            _ => None,
        }
    }
}

/// Internal operator identity. Password hashes and token issuance live with
/// the auth collaborator; only the directory shape is kept here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: UserRole,
    pub tenant_id: String,
    pub is_active: bool,
    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerTier {
    Basic,
    Premium,
    Enterprise,
}

impl CustomerTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            CustomerTier::Basic => "basic",
            CustomerTier::Premium => "premium",
            CustomerTier::Enterprise => "enterprise",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "basic" => Some(CustomerTier::Basic),
            "premium" => Some(CustomerTier::Premium),
            "enterprise" => Some(CustomerTier::Enterprise),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    Trading,
    Savings,
    Checking,
    Investment,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Trading => "trading",
            AccountType::Savings => "savings",
            AccountType::Checking => "checking",
            AccountType::Investment => "investment",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "trading" => Some(AccountType::Trading),
            "savings" => Some(AccountType::Savings),
            "checking" => Some(AccountType::Checking),
            "investment" => Some(AccountType::Investment),
            _ => None,
        }
    }
}

/// External party being supported. Tier and account type are independent
/// axes; neither implies the other.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub tier: CustomerTier,
    pub account_type: AccountType,
    pub tenant_id: String,
    #[serde(default)]
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Waiting,
    Escalated,
    Ended,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Waiting => "waiting",
            SessionStatus::Escalated => "escalated",
            SessionStatus::Ended => "ended",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(SessionStatus::Active),
            "waiting" => Some(SessionStatus::Waiting),
            "escalated" => Some(SessionStatus::Escalated),
            "ended" => Some(SessionStatus::Ended),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Ended)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelType {
    Web,
    Mobile,
    Email,
    Chat,
    Phone,
}

impl ChannelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelType::Web => "web",
            ChannelType::Mobile => "mobile",
            ChannelType::Email => "email",
            ChannelType::Chat => "chat",
            ChannelType::Phone => "phone",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "web" => Some(ChannelType::Web),
            "mobile" => Some(ChannelType::Mobile),
            "email" => Some(ChannelType::Email),
            "chat" => Some(ChannelType::Chat),
            "phone" => Some(ChannelType::Phone),
            _ => None,
        }
    }
}

/// One customer-support interaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub customer_id: String,
    pub status: SessionStatus,
    pub channel: ChannelType,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub escalation_reason: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    User,
    Bot,
    System,
    Agent,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::User => "user",
            MessageType::Bot => "bot",
            MessageType::System => "system",
            MessageType::Agent => "agent",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(MessageType::User),
            "bot" => Some(MessageType::Bot),
            "system" => Some(MessageType::System),
            "agent" => Some(MessageType::Agent),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Sent,
    Delivered,
    Read,
    Failed,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Sent => "sent",
            MessageStatus::Delivered => "delivered",
            MessageStatus::Read => "read",
            MessageStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sent" => Some(MessageStatus::Sent),
            "delivered" => Some(MessageStatus::Delivered),
            "read" => Some(MessageStatus::Read),
            "failed" => Some(MessageStatus::Failed),
            _ => None,
        }
    }
}

/// Evidence backing a bot message. Immutable once attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub source: String,
    pub title: String,
    pub url: String,
    pub excerpt: String,
    pub confidence: f64,
    #[serde(default)]
    pub page_number: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedactionKind {
    Ssn,
    AccountNumber,
    Email,
    Phone,
    Address,
    CreditCard,
}

impl RedactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RedactionKind::Ssn => "ssn",
            RedactionKind::AccountNumber => "account_number",
            RedactionKind::Email => "email",
            RedactionKind::Phone => "phone",
            RedactionKind::Address => "address",
            RedactionKind::CreditCard => "credit_card",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ssn" => Some(RedactionKind::Ssn),
            "account_number" => Some(RedactionKind::AccountNumber),
            "email" => Some(RedactionKind::Email),
            "phone" => Some(RedactionKind::Phone),
            "address" => Some(RedactionKind::Address),
            "credit_card" => Some(RedactionKind::CreditCard),
            _ => None,
        }
    }
}

/// Half-open character span `[start, end)` into message content.
/// Serialized as a two-element array to match the wire contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span(pub usize, pub usize);

impl Span {
    pub fn start(&self) -> usize {
        self.0
    }

    pub fn end(&self) -> usize {
        self.1
    }

    pub fn is_ordered(&self) -> bool {
        self.0 < self.1
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.0 < other.1 && other.0 < self.1
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.0, self.1)
    }
}

/// PII-masking annotation over message content.
///
/// `original` is trusted-boundary data. It never appears in
/// [`ExternalRedaction`], which is the only redaction shape that leaves the
/// backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Redaction {
    #[serde(rename = "type")]
    pub kind: RedactionKind,
    pub original: String,
    pub masked: String,
    pub position: Span,
    pub confidence: f64,
}

/// Externally-readable redaction: same annotation minus the original text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalRedaction {
    #[serde(rename = "type")]
    pub kind: RedactionKind,
    pub masked: String,
    pub position: Span,
    pub confidence: f64,
}

impl From<&Redaction> for ExternalRedaction {
    fn from(r: &Redaction) -> Self {
        Self {
            kind: r.kind,
            masked: r.masked.clone(),
            position: r.position,
            confidence: r.confidence,
        }
    }
}

/// One turn within a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub session_id: String,
    pub content: String,
    pub message_type: MessageType,
    pub timestamp: DateTime<Utc>,
    pub status: MessageStatus,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub intent: Option<String>,
    #[serde(default)]
    pub citations: Vec<Citation>,
    #[serde(default)]
    pub redactions: Vec<Redaction>,
    #[serde(default)]
    pub entities: Metadata,
    #[serde(default)]
    pub metadata: Metadata,
}

/// Message shape served across the presentation boundary. Identical to
/// [`Message`] except redactions carry no original text, so a response built
/// from this type cannot leak it. Constructed only by the domain sanitizer,
/// which also splices masked text into `content`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalMessage {
    pub id: String,
    pub session_id: String,
    pub content: String,
    pub message_type: MessageType,
    pub timestamp: DateTime<Utc>,
    pub status: MessageStatus,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub intent: Option<String>,
    #[serde(default)]
    pub citations: Vec<Citation>,
    #[serde(default)]
    pub redactions: Vec<ExternalRedaction>,
    #[serde(default)]
    pub entities: Metadata,
    #[serde(default)]
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketPriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl TicketPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketPriority::Low => "low",
            TicketPriority::Medium => "medium",
            TicketPriority::High => "high",
            TicketPriority::Urgent => "urgent",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(TicketPriority::Low),
            "medium" => Some(TicketPriority::Medium),
            "high" => Some(TicketPriority::High),
            "urgent" => Some(TicketPriority::Urgent),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketCategory {
    TechnicalSupport,
    AccountInquiry,
    Billing,
    Trading,
    Security,
    General,
}

impl TicketCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketCategory::TechnicalSupport => "technical_support",
            TicketCategory::AccountInquiry => "account_inquiry",
            TicketCategory::Billing => "billing",
            TicketCategory::Trading => "trading",
            TicketCategory::Security => "security",
            TicketCategory::General => "general",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "technical_support" => Some(TicketCategory::TechnicalSupport),
            "account_inquiry" => Some(TicketCategory::AccountInquiry),
            "billing" => Some(TicketCategory::Billing),
            "trading" => Some(TicketCategory::Trading),
            "security" => Some(TicketCategory::Security),
            "general" => Some(TicketCategory::General),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    InProgress,
    Waiting,
    Resolved,
    Closed,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Open => "open",
            TicketStatus::InProgress => "in_progress",
            TicketStatus::Waiting => "waiting",
            TicketStatus::Resolved => "resolved",
            TicketStatus::Closed => "closed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(TicketStatus::Open),
            "in_progress" => Some(TicketStatus::InProgress),
            "waiting" => Some(TicketStatus::Waiting),
            "resolved" => Some(TicketStatus::Resolved),
            "closed" => Some(TicketStatus::Closed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TicketStatus::Closed)
    }
}

/// Escalation artifact tracked to resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub id: String,
    pub session_id: String,
    pub customer_id: String,
    pub title: String,
    pub description: String,
    pub priority: TicketPriority,
    pub category: TicketCategory,
    pub status: TicketStatus,
    #[serde(default)]
    pub assigned_agent_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KnowledgeType {
    Document,
    Faq,
    Policy,
    Procedure,
    Article,
}

impl KnowledgeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            KnowledgeType::Document => "document",
            KnowledgeType::Faq => "faq",
            KnowledgeType::Policy => "policy",
            KnowledgeType::Procedure => "procedure",
            KnowledgeType::Article => "article",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "document" => Some(KnowledgeType::Document),
            "faq" => Some(KnowledgeType::Faq),
            "policy" => Some(KnowledgeType::Policy),
            "procedure" => Some(KnowledgeType::Procedure),
            "article" => Some(KnowledgeType::Article),
            _ => None,
        }
    }
}

/// Versioned knowledge-base unit feeding response generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeSource {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: KnowledgeType,
    pub content: String,
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub tenant_id: String,
    pub author: String,
    pub version: u32,
    pub is_active: bool,
    #[serde(default)]
    pub effective_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expiry_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Pattern rule the redaction engine scans content with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedactionRule {
    pub id: String,
    pub name: String,
    pub pattern: String,
    #[serde(rename = "type")]
    pub kind: RedactionKind,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One audit-trail row, appended per successful store mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: String,
    pub event_type: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub details: Metadata,
    pub created_at: DateTime<Utc>,
}

/// Token bundle produced by the auth collaborator. Consumed opaquely;
/// issuance and refresh are not modeled here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentMetric {
    pub intent: String,
    pub count: u64,
    pub percentage: f64,
    pub avg_satisfaction: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentPerformance {
    pub agent_id: String,
    pub agent_name: String,
    pub conversations_handled: u64,
    pub avg_response_time: f64,
    pub customer_satisfaction: f64,
    pub escalation_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    pub label: String,
}

/// Read-only aggregate produced by the analytics collaborator on a schedule.
/// This layer defines the shape only; computation is external.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsMetrics {
    pub deflection_rate: f64,
    pub average_response_time: f64,
    pub customer_satisfaction: f64,
    pub total_conversations: u64,
    pub escalation_rate: f64,
    #[serde(default)]
    pub top_intents: Vec<IntentMetric>,
    #[serde(default)]
    pub agent_performance: Vec<AgentPerformance>,
    #[serde(default)]
    pub conversation_volume: Vec<TimeSeriesPoint>,
}
