//! Moderation lifecycle: the status graph and the admin-side transitions.
//!
//! Approval is two-phase. The channel post is made first and the local commit only follows
//! a confirmed publish; a publish failure leaves the record `Submitted`. When the post went
//! out but the commit was refused, the caller gets the post reference back and may retry
//! with `existing_post` to commit without posting twice. Only a post this machine recorded
//! for that exact revision is accepted on retry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::domain::{
    AdminAction, AdminActionRecord, AdminId, ChannelPostRef, Publication, SubmissionId,
    SubmissionRecord, SubmissionStatus, SubmissionStatusView,
};
use super::error::{ConflictReason, IntakeError};
use super::gateway::{ChannelPublisher, Notifier};
use super::prompts::OwnerNotice;
use super::render::{post_content, ContentRenderer};
use super::repository::{RepositoryError, SubmissionPatch, SubmissionRepository, WriteGuard};
use super::schema::SchemaCatalog;
use crate::config::IntakeConfig;

/// Events that move a record between statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    Submit,
    Approve,
    RequestFix,
    Reject,
    Reopen,
}

impl LifecycleEvent {
    pub const fn label(self) -> &'static str {
        match self {
            LifecycleEvent::Submit => "submit",
            LifecycleEvent::Approve => "approve",
            LifecycleEvent::RequestFix => "needs_fix",
            LifecycleEvent::Reject => "reject",
            LifecycleEvent::Reopen => "reopen",
        }
    }
}

impl From<AdminAction> for LifecycleEvent {
    fn from(action: AdminAction) -> Self {
        match action {
            AdminAction::Approve => LifecycleEvent::Approve,
            AdminAction::NeedsFix => LifecycleEvent::RequestFix,
            AdminAction::Reject => LifecycleEvent::Reject,
        }
    }
}

/// The only legal edges of the status graph.
pub fn transition(from: SubmissionStatus, event: LifecycleEvent) -> Option<SubmissionStatus> {
    use LifecycleEvent as E;
    use SubmissionStatus as S;

    match (from, event) {
        (S::Draft | S::NeedsFix, E::Submit) => Some(S::Submitted),
        (S::Submitted, E::Approve) => Some(S::Published),
        (S::Submitted, E::RequestFix) => Some(S::NeedsFix),
        (S::Submitted, E::Reject) => Some(S::Rejected),
        (S::Rejected, E::Reopen) => Some(S::Draft),
        _ => None,
    }
}

/// Admin decision as received from the HTTP surface or CLI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModerationRequest {
    pub admin_id: AdminId,
    pub action: AdminAction,
    #[serde(default)]
    pub reason: Option<String>,
    /// Post created by an earlier approval whose commit failed.
    #[serde(default)]
    pub existing_post: Option<ChannelPostRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum NotificationStatus {
    Delivered,
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct ModerationOutcome {
    pub submission: SubmissionStatusView,
    pub audit: AdminActionRecord,
    pub notification: NotificationStatus,
}

/// Post that went live while its approval commit failed.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingPost {
    post: ChannelPostRef,
    revision: u32,
}

pub struct LifecycleStateMachine<R, N, P> {
    repository: Arc<R>,
    notifier: Arc<N>,
    publisher: Arc<P>,
    renderer: Arc<dyn ContentRenderer>,
    catalog: Arc<SchemaCatalog>,
    config: IntakeConfig,
    pending_posts: Mutex<HashMap<SubmissionId, PendingPost>>,
}

impl<R, N, P> LifecycleStateMachine<R, N, P>
where
    R: SubmissionRepository + 'static,
    N: Notifier + 'static,
    P: ChannelPublisher + 'static,
{
    pub fn new(
        repository: Arc<R>,
        notifier: Arc<N>,
        publisher: Arc<P>,
        renderer: Arc<dyn ContentRenderer>,
        catalog: Arc<SchemaCatalog>,
        config: IntakeConfig,
    ) -> Self {
        Self {
            repository,
            notifier,
            publisher,
            renderer,
            catalog,
            config,
            pending_posts: Mutex::new(HashMap::new()),
        }
    }

    /// Applies an admin decision to a `Submitted` record, writing exactly one audit entry in
    /// the same guarded write as the status change.
    pub fn moderate(
        &self,
        id: &SubmissionId,
        request: ModerationRequest,
    ) -> Result<ModerationOutcome, IntakeError> {
        let ModerationRequest {
            admin_id,
            action,
            reason,
            existing_post,
        } = request;

        if !self.config.is_admin(&admin_id.0) {
            warn!(
                admin_id = %admin_id,
                submission_id = %id,
                "moderation refused for unknown admin"
            );
            return Err(IntakeError::Forbidden(admin_id));
        }

        let reason = reason
            .map(|reason| reason.trim().to_string())
            .filter(|reason| !reason.is_empty());
        if action != AdminAction::Approve && reason.is_none() {
            return Err(IntakeError::ReasonRequired { action });
        }

        let record = self
            .repository
            .fetch(id)?
            .ok_or_else(|| IntakeError::NotFound(id.clone()))?;
        let target = transition(record.status, action.into())
            .ok_or_else(|| IntakeError::conflict(moderation_conflict(record.status)))?;

        let now = Utc::now();
        let title = self.snapshot_title(&record);
        let audit = AdminActionRecord::new(admin_id.clone(), &record, action, reason.clone(), now);
        let guard = WriteGuard::status(SubmissionStatus::Submitted);

        let (updated, notice) = match action {
            AdminAction::Approve => {
                let post = match (existing_post, self.pending_post(&record)) {
                    (Some(post), Some(pending)) if post == pending => post,
                    (Some(post), _) => {
                        warn!(
                            submission_id = %id,
                            post_id = %post.post_id,
                            "approval retry named a post with no pending commit"
                        );
                        return Err(IntakeError::UnconfirmedPost {
                            id: id.clone(),
                            post,
                        });
                    }
                    (None, Some(pending)) => pending,
                    (None, None) => self.publish(&record)?,
                };
                let patch = SubmissionPatch {
                    status: Some(target),
                    publication: Some(Some(Publication {
                        post: post.clone(),
                        revision: record.revision,
                        published_at: now,
                    })),
                    reviewed_at: Some(now),
                    ..SubmissionPatch::default()
                };
                let updated = self
                    .repository
                    .update_with_audit(id, patch, &guard, audit.clone())
                    .map_err(|err| {
                        warn!(
                            submission_id = %id,
                            post_id = %post.post_id,
                            error = %err,
                            "post published but approval commit failed"
                        );
                        self.pending().insert(
                            id.clone(),
                            PendingPost {
                                post: post.clone(),
                                revision: record.revision,
                            },
                        );
                        IntakeError::PublishedNotCommitted {
                            post: post.clone(),
                            source: Box::new(commit_error(err)),
                        }
                    })?;
                (updated, OwnerNotice::Published { title, post })
            }
            AdminAction::NeedsFix | AdminAction::Reject => {
                let reason = reason.unwrap_or_default();
                let patch = SubmissionPatch {
                    status: Some(target),
                    rejection_reason: Some(Some(reason.clone())),
                    reviewed_at: Some(now),
                    ..SubmissionPatch::default()
                };
                let updated = self
                    .repository
                    .update_with_audit(id, patch, &guard, audit.clone())
                    .map_err(commit_error)?;
                let notice = if action == AdminAction::NeedsFix {
                    OwnerNotice::NeedsFix { title, reason }
                } else {
                    OwnerNotice::Rejected { title, reason }
                };
                (updated, notice)
            }
        };

        self.pending().remove(id);
        info!(
            submission_id = %id,
            admin_id = %admin_id,
            action = action.label(),
            status = updated.status.label(),
            revision = updated.revision,
            "moderation committed"
        );

        let notification = self.notify(&updated, &notice);
        Ok(ModerationOutcome {
            submission: updated.status_view(),
            audit,
            notification,
        })
    }

    fn pending(&self) -> MutexGuard<'_, HashMap<SubmissionId, PendingPost>> {
        self.pending_posts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Post left live by a failed commit of this record's current revision.
    fn pending_post(&self, record: &SubmissionRecord) -> Option<ChannelPostRef> {
        self.pending()
            .get(&record.id)
            .filter(|pending| pending.revision == record.revision)
            .map(|pending| pending.post.clone())
    }

    fn publish(&self, record: &SubmissionRecord) -> Result<ChannelPostRef, IntakeError> {
        let content = match &record.rendered_snapshot {
            Some(snapshot) => post_content(snapshot),
            None => {
                let schema = self.catalog.get(record.schema);
                let snapshot =
                    self.renderer
                        .render_snapshot(schema, record, record.revision, Utc::now());
                post_content(&snapshot)
            }
        };

        self.publisher
            .publish(&self.config.channel, &content)
            .map_err(|err| {
                warn!(submission_id = %record.id, error = %err, "channel publish failed");
                IntakeError::Publish(err)
            })
    }

    fn notify(&self, record: &SubmissionRecord, notice: &OwnerNotice) -> NotificationStatus {
        let content = self.renderer.render_notice(notice);
        match self.notifier.send(&record.owner_id, &content) {
            Ok(()) => NotificationStatus::Delivered,
            Err(err) => {
                warn!(
                    submission_id = %record.id,
                    owner_id = %record.owner_id,
                    error = %err,
                    "owner notification failed after commit"
                );
                NotificationStatus::Failed {
                    error: err.to_string(),
                }
            }
        }
    }

    fn snapshot_title(&self, record: &SubmissionRecord) -> String {
        match &record.rendered_snapshot {
            Some(snapshot) => snapshot.title.clone(),
            None => {
                let schema = self.catalog.get(record.schema);
                self.renderer
                    .render_snapshot(schema, record, record.revision, Utc::now())
                    .title
            }
        }
    }
}

fn moderation_conflict(status: SubmissionStatus) -> ConflictReason {
    match status {
        SubmissionStatus::NeedsFix | SubmissionStatus::Rejected | SubmissionStatus::Published => {
            ConflictReason::AlreadyModerated
        }
        SubmissionStatus::Draft | SubmissionStatus::Submitted => ConflictReason::StaleStatus,
    }
}

fn commit_error(err: RepositoryError) -> IntakeError {
    match err {
        RepositoryError::StatusMismatch { .. } | RepositoryError::VersionMismatch { .. } => {
            IntakeError::conflict(ConflictReason::AlreadyModerated)
        }
        other => other.into(),
    }
}
