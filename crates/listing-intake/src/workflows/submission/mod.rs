//! Listing intake: a schema-driven wizard that collects answers step by step, the moderation
//! lifecycle that decides each submission's fate, and the service facade shared by the HTTP
//! router and the CLI.

pub mod audit;
pub mod domain;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod lifecycle;
pub mod prompts;
pub mod render;
pub mod repository;
pub mod router;
pub mod schema;
pub mod service;
pub mod store;
pub mod validators;

#[cfg(test)]
mod tests;

pub use audit::{write_audit_csv, AuditExportError};
pub use domain::{
    AdminAction, AdminActionRecord, AdminId, AnswerKey, AnswerValue, Answers, ChannelPostRef,
    Currency, OwnerId, PriceRange, Publication, RenderedSnapshot, SubmissionId,
    SubmissionRecord, SubmissionStatus, SubmissionStatusView,
};
pub use engine::{ApplyOutcome, SubmissionEngine, WizardAction};
pub use error::{ConflictReason, IntakeError};
pub use gateway::{ChannelPublisher, NotifyError, Notifier, PublishError};
pub use lifecycle::{
    LifecycleEvent, LifecycleStateMachine, ModerationOutcome, ModerationRequest,
    NotificationStatus,
};
pub use prompts::OwnerNotice;
pub use render::{ContentRenderer, PlainTextRenderer, StepView};
pub use repository::{RepositoryError, SubmissionPatch, SubmissionRepository, WriteGuard};
pub use router::intake_router;
pub use schema::{
    BranchPredicate, IntegrityError, SchemaCatalog, SchemaVersion, StepDefinition, StepKey,
    StepSchema, StepTarget,
};
pub use service::{IntakeService, SessionView};
pub use store::InMemorySubmissionRepository;
pub use validators::{ValidationError, ValidationErrorKind, ValidatorKind};
