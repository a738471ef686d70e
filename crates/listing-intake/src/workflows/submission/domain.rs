use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::schema::{SchemaVersion, StepKey};

/// Identifier wrapper for submission records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubmissionId(pub String);

impl SubmissionId {
    pub fn generate() -> Self {
        Self(format!("sub-{}", uuid::Uuid::new_v4().simple()))
    }
}

impl fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// End user owning a submission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OwnerId(pub String);

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Moderator acting on submitted records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AdminId(pub String);

impl fmt::Display for AdminId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Normalized field names under which answers are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerKey {
    Title,
    Description,
    Category,
    ProjectAge,
    ProductUrl,
    DemoUrl,
    HasRevenue,
    MonthlyRevenue,
    MonthlyUsers,
    TechStack,
    IncludesDomain,
    DomainName,
    Screenshots,
    Price,
    Negotiable,
    SaleReason,
    ContactEmail,
    ContactHandle,
}

impl AnswerKey {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Description => "description",
            Self::Category => "category",
            Self::ProjectAge => "project_age",
            Self::ProductUrl => "product_url",
            Self::DemoUrl => "demo_url",
            Self::HasRevenue => "has_revenue",
            Self::MonthlyRevenue => "monthly_revenue",
            Self::MonthlyUsers => "monthly_users",
            Self::TechStack => "tech_stack",
            Self::IncludesDomain => "includes_domain",
            Self::DomainName => "domain_name",
            Self::Screenshots => "screenshots",
            Self::Price => "price",
            Self::Negotiable => "negotiable",
            Self::SaleReason => "sale_reason",
            Self::ContactEmail => "contact_email",
            Self::ContactHandle => "contact_handle",
        }
    }
}

impl fmt::Display for AnswerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Eur,
    Rub,
}

impl Currency {
    pub const fn code(self) -> &'static str {
        match self {
            Self::Usd => "USD",
            Self::Eur => "EUR",
            Self::Rub => "RUB",
        }
    }

    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Usd => "$",
            Self::Eur => "€",
            Self::Rub => "₽",
        }
    }
}

/// Asking price, always stored with `min <= max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRange {
    pub currency: Currency,
    pub min: u64,
    pub max: u64,
}

impl PriceRange {
    pub fn new(currency: Currency, first: u64, second: u64) -> Self {
        Self {
            currency,
            min: first.min(second),
            max: first.max(second),
        }
    }
}

impl fmt::Display for PriceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.min == self.max {
            write!(f, "{}{}", self.currency.symbol(), self.min)
        } else {
            write!(f, "{}{}–{}", self.currency.symbol(), self.min, self.max)
        }
    }
}

/// A normalized answer. `Skipped` is the neutral value written by an explicit skip and is
/// distinct from a key that was never written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AnswerValue {
    Text(String),
    Url(String),
    Flag(bool),
    Number(u64),
    PriceRange(PriceRange),
    List(Vec<String>),
    Skipped,
}

impl AnswerValue {
    /// True for values that do not satisfy a required field.
    pub fn is_neutral(&self) -> bool {
        match self {
            AnswerValue::Skipped => true,
            AnswerValue::Text(text) => text.trim().is_empty(),
            AnswerValue::List(items) => items.is_empty(),
            AnswerValue::Url(_)
            | AnswerValue::Flag(_)
            | AnswerValue::Number(_)
            | AnswerValue::PriceRange(_) => false,
        }
    }

    pub fn display(&self) -> String {
        match self {
            AnswerValue::Text(text) | AnswerValue::Url(text) => text.clone(),
            AnswerValue::Flag(true) => "yes".to_string(),
            AnswerValue::Flag(false) => "no".to_string(),
            AnswerValue::Number(value) => value.to_string(),
            AnswerValue::PriceRange(range) => range.to_string(),
            AnswerValue::List(items) => items.join(", "),
            AnswerValue::Skipped => "—".to_string(),
        }
    }
}

pub type Answers = BTreeMap<AnswerKey, AnswerValue>;

/// Lifecycle states of a submission record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Draft,
    Submitted,
    NeedsFix,
    Rejected,
    Published,
}

impl SubmissionStatus {
    pub const fn label(self) -> &'static str {
        match self {
            SubmissionStatus::Draft => "draft",
            SubmissionStatus::Submitted => "submitted",
            SubmissionStatus::NeedsFix => "needs_fix",
            SubmissionStatus::Rejected => "rejected",
            SubmissionStatus::Published => "published",
        }
    }

    /// Draft and NeedsFix records are owned by the wizard; at most one per owner.
    pub const fn is_active(self) -> bool {
        matches!(self, SubmissionStatus::Draft | SubmissionStatus::NeedsFix)
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Frozen rendering of the answers taken at submit time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedSnapshot {
    pub revision: u32,
    pub title: String,
    pub body: String,
    pub rendered_at: DateTime<Utc>,
}

/// Reference to the post created on the distribution channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelPostRef {
    pub channel: String,
    pub post_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Publication {
    pub post: ChannelPostRef,
    pub revision: u32,
    pub published_at: DateTime<Utc>,
}

/// Durable state of one submission, sufficient to reconstruct the wizard session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub id: SubmissionId,
    pub owner_id: OwnerId,
    pub schema: SchemaVersion,
    pub status: SubmissionStatus,
    pub revision: u32,
    /// Incremented by the repository on every persisted write.
    pub version: u64,
    #[serde(default)]
    pub answers: Answers,
    #[serde(default)]
    pub current_step: Option<StepKey>,
    #[serde(default)]
    pub rendered_snapshot: Option<RenderedSnapshot>,
    #[serde(default)]
    pub rejection_reason: Option<String>,
    #[serde(default)]
    pub publication: Option<Publication>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reviewed_at: Option<DateTime<Utc>>,
}

impl SubmissionRecord {
    pub fn new_draft(owner_id: OwnerId, schema: SchemaVersion, now: DateTime<Utc>) -> Self {
        Self {
            id: SubmissionId::generate(),
            owner_id,
            schema,
            status: SubmissionStatus::Draft,
            revision: 0,
            version: 0,
            answers: Answers::new(),
            current_step: None,
            rendered_snapshot: None,
            rejection_reason: None,
            publication: None,
            created_at: now,
            updated_at: now,
            submitted_at: None,
            reviewed_at: None,
        }
    }

    pub fn answer(&self, key: AnswerKey) -> Option<&AnswerValue> {
        self.answers.get(&key)
    }

    pub fn status_view(&self) -> SubmissionStatusView {
        SubmissionStatusView {
            submission_id: self.id.clone(),
            owner_id: self.owner_id.clone(),
            schema: self.schema,
            status: self.status.label(),
            revision: self.revision,
            current_step: self.current_step,
            rejection_reason: self.rejection_reason.clone(),
            post: self
                .publication
                .as_ref()
                .map(|publication| publication.post.clone()),
            submitted_at: self.submitted_at,
            reviewed_at: self.reviewed_at,
        }
    }
}

/// Sanitized status projection exposed through the API.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionStatusView {
    pub submission_id: SubmissionId,
    pub owner_id: OwnerId,
    pub schema: SchemaVersion,
    pub status: &'static str,
    pub revision: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_step: Option<StepKey>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post: Option<ChannelPostRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<DateTime<Utc>>,
}

/// Admin decisions recorded in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminAction {
    Approve,
    NeedsFix,
    Reject,
}

impl AdminAction {
    pub const fn label(self) -> &'static str {
        match self {
            AdminAction::Approve => "approve",
            AdminAction::NeedsFix => "needs_fix",
            AdminAction::Reject => "reject",
        }
    }

    pub const fn target_status(self) -> SubmissionStatus {
        match self {
            AdminAction::Approve => SubmissionStatus::Published,
            AdminAction::NeedsFix => SubmissionStatus::NeedsFix,
            AdminAction::Reject => SubmissionStatus::Rejected,
        }
    }
}

impl fmt::Display for AdminAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Append-only audit entry; never mutated or deleted once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminActionRecord {
    pub id: String,
    pub admin_id: AdminId,
    pub target_submission_id: SubmissionId,
    pub action: AdminAction,
    pub comment: Option<String>,
    pub revision: u32,
    pub created_at: DateTime<Utc>,
}

impl AdminActionRecord {
    pub fn new(
        admin_id: AdminId,
        target: &SubmissionRecord,
        action: AdminAction,
        comment: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: format!("act-{}", uuid::Uuid::new_v4().simple()),
            admin_id,
            target_submission_id: target.id.clone(),
            action,
            comment,
            revision: target.revision,
            created_at,
        }
    }
}
