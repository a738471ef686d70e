use std::fmt;

use serde::Serialize;

use super::domain::{AdminAction, AdminId, AnswerKey, ChannelPostRef, SubmissionId};
use super::gateway::PublishError;
use super::repository::RepositoryError;
use super::schema::{SchemaVersion, StepKey};
use super::validators::ValidationError;

/// Why a write lost against the record's current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictReason {
    AlreadyModerated,
    StaleStatus,
    ActiveSubmissionExists,
    AwaitingModeration,
    ConcurrentModification,
}

impl ConflictReason {
    pub const fn label(self) -> &'static str {
        match self {
            ConflictReason::AlreadyModerated => "already_moderated",
            ConflictReason::StaleStatus => "stale_status",
            ConflictReason::ActiveSubmissionExists => "active_submission_exists",
            ConflictReason::AwaitingModeration => "awaiting_moderation",
            ConflictReason::ConcurrentModification => "concurrent_modification",
        }
    }
}

impl fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Error raised by the intake engine, lifecycle, and service facade.
#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("submission is incomplete, missing: {}", join_keys(.missing))]
    MissingFields { missing: Vec<AnswerKey> },
    #[error("step {step} is not optional and cannot be skipped")]
    NotSkippable { step: StepKey },
    #[error("action '{action}' is not available on step {step}")]
    UnsupportedAction { step: StepKey, action: &'static str },
    #[error("a reason is required to {action}")]
    ReasonRequired { action: AdminAction },
    #[error("conflict: {reason}")]
    Conflict { reason: ConflictReason },
    #[error("submission {0} not found")]
    NotFound(SubmissionId),
    #[error("admin {0} is not allowed to moderate")]
    Forbidden(AdminId),
    #[error("{schema} submission {id} holds answer '{answer}' from another schema version")]
    SchemaMismatch {
        id: SubmissionId,
        schema: SchemaVersion,
        answer: AnswerKey,
    },
    #[error("publishing failed, status unchanged: {0}")]
    Publish(#[source] PublishError),
    #[error("post {} in {} is live but the approval was not recorded: {source}", .post.post_id, .post.channel)]
    PublishedNotCommitted {
        post: ChannelPostRef,
        #[source]
        source: Box<IntakeError>,
    },
    #[error("post {} in {} was not created by a pending approval of submission {id}", .post.post_id, .post.channel)]
    UnconfirmedPost {
        id: SubmissionId,
        post: ChannelPostRef,
    },
    #[error(transparent)]
    Repository(RepositoryError),
}

impl IntakeError {
    pub fn conflict(reason: ConflictReason) -> Self {
        Self::Conflict { reason }
    }

    pub fn conflict_reason(&self) -> Option<ConflictReason> {
        match self {
            IntakeError::Conflict { reason } => Some(*reason),
            IntakeError::PublishedNotCommitted { source, .. } => source.conflict_reason(),
            _ => None,
        }
    }
}

impl From<RepositoryError> for IntakeError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::ActiveExists { .. } => {
                Self::conflict(ConflictReason::ActiveSubmissionExists)
            }
            RepositoryError::StatusMismatch { .. } => Self::conflict(ConflictReason::StaleStatus),
            RepositoryError::VersionMismatch { .. } => {
                Self::conflict(ConflictReason::ConcurrentModification)
            }
            other => Self::Repository(other),
        }
    }
}

fn join_keys(keys: &[AnswerKey]) -> String {
    keys.iter()
        .map(|key| key.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
