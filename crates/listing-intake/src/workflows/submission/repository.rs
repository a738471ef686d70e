use chrono::{DateTime, Utc};

use super::domain::{
    AdminActionRecord, Answers, OwnerId, Publication, RenderedSnapshot, SubmissionId,
    SubmissionRecord, SubmissionStatus,
};
use super::schema::StepKey;

/// Partial update applied in one guarded write. `None` leaves a field untouched; the
/// nested options on clearable fields distinguish "keep" from "clear".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubmissionPatch {
    pub status: Option<SubmissionStatus>,
    pub revision: Option<u32>,
    pub answers: Option<Answers>,
    pub current_step: Option<Option<StepKey>>,
    pub rendered_snapshot: Option<Option<RenderedSnapshot>>,
    pub rejection_reason: Option<Option<String>>,
    pub publication: Option<Option<Publication>>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

impl SubmissionPatch {
    /// Applies the patch and stamps the write: bumps `version` and `updated_at`.
    pub fn apply_to(self, record: &mut SubmissionRecord, now: DateTime<Utc>) {
        if let Some(status) = self.status {
            record.status = status;
        }
        if let Some(revision) = self.revision {
            record.revision = revision;
        }
        if let Some(answers) = self.answers {
            record.answers = answers;
        }
        if let Some(current_step) = self.current_step {
            record.current_step = current_step;
        }
        if let Some(snapshot) = self.rendered_snapshot {
            record.rendered_snapshot = snapshot;
        }
        if let Some(reason) = self.rejection_reason {
            record.rejection_reason = reason;
        }
        if let Some(publication) = self.publication {
            record.publication = publication;
        }
        if let Some(submitted_at) = self.submitted_at {
            record.submitted_at = Some(submitted_at);
        }
        if let Some(reviewed_at) = self.reviewed_at {
            record.reviewed_at = Some(reviewed_at);
        }
        record.version += 1;
        record.updated_at = now;
    }
}

/// Compare-and-set preconditions checked under the repository lock.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteGuard {
    /// Statuses the record may currently be in. Empty accepts any status.
    pub expected_status: Vec<SubmissionStatus>,
    pub expected_version: Option<u64>,
}

impl WriteGuard {
    pub fn status(status: SubmissionStatus) -> Self {
        Self::status_in(&[status])
    }

    pub fn status_in(statuses: &[SubmissionStatus]) -> Self {
        Self {
            expected_status: statuses.to_vec(),
            expected_version: None,
        }
    }

    pub fn at_version(mut self, version: u64) -> Self {
        self.expected_version = Some(version);
        self
    }

    pub fn check(&self, record: &SubmissionRecord) -> Result<(), RepositoryError> {
        if !self.expected_status.is_empty() && !self.expected_status.contains(&record.status) {
            return Err(RepositoryError::StatusMismatch {
                id: record.id.clone(),
                expected: self.expected_status.clone(),
                actual: record.status,
            });
        }
        if let Some(expected) = self.expected_version {
            if expected != record.version {
                return Err(RepositoryError::VersionMismatch {
                    id: record.id.clone(),
                    expected,
                    actual: record.version,
                });
            }
        }
        Ok(())
    }
}

/// Storage abstraction so the engine and lifecycle can be exercised in isolation.
///
/// Implementations must keep at most one active (draft or needs-fix) record per owner and
/// must apply `update_with_audit` as a single atomic write.
pub trait SubmissionRepository: Send + Sync {
    fn create(&self, record: SubmissionRecord) -> Result<SubmissionRecord, RepositoryError>;
    fn fetch(&self, id: &SubmissionId) -> Result<Option<SubmissionRecord>, RepositoryError>;
    fn active_for_owner(
        &self,
        owner: &OwnerId,
    ) -> Result<Option<SubmissionRecord>, RepositoryError>;
    fn update(
        &self,
        id: &SubmissionId,
        patch: SubmissionPatch,
        guard: &WriteGuard,
    ) -> Result<SubmissionRecord, RepositoryError>;
    fn update_with_audit(
        &self,
        id: &SubmissionId,
        patch: SubmissionPatch,
        guard: &WriteGuard,
        action: AdminActionRecord,
    ) -> Result<SubmissionRecord, RepositoryError>;
    fn audit_trail(&self, id: &SubmissionId) -> Result<Vec<AdminActionRecord>, RepositoryError>;
    fn audit_log(&self) -> Result<Vec<AdminActionRecord>, RepositoryError>;
    fn list_by_status(
        &self,
        status: SubmissionStatus,
        limit: usize,
    ) -> Result<Vec<SubmissionRecord>, RepositoryError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("owner {owner} already has active submission {existing}")]
    ActiveExists {
        owner: OwnerId,
        existing: SubmissionId,
    },
    #[error("submission {id} is {actual}, expected one of {expected:?}")]
    StatusMismatch {
        id: SubmissionId,
        expected: Vec<SubmissionStatus>,
        actual: SubmissionStatus,
    },
    #[error("submission {id} changed concurrently (expected version {expected}, found {actual})")]
    VersionMismatch {
        id: SubmissionId,
        expected: u64,
        actual: u64,
    },
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::submission::schema::SchemaVersion;

    fn draft() -> SubmissionRecord {
        SubmissionRecord::new_draft(
            OwnerId("owner-1".into()),
            SchemaVersion::Legacy,
            Utc::now(),
        )
    }

    #[test]
    fn guard_rejects_unexpected_status_and_version() {
        let record = draft();

        let status_guard = WriteGuard::status(SubmissionStatus::Submitted);
        assert!(matches!(
            status_guard.check(&record),
            Err(RepositoryError::StatusMismatch {
                actual: SubmissionStatus::Draft,
                ..
            })
        ));

        let version_guard = WriteGuard::status(SubmissionStatus::Draft).at_version(3);
        assert!(matches!(
            version_guard.check(&record),
            Err(RepositoryError::VersionMismatch {
                expected: 3,
                actual: 0,
                ..
            })
        ));

        assert!(WriteGuard::default().check(&record).is_ok());
    }

    #[test]
    fn patch_only_touches_named_fields_and_bumps_version() {
        let mut record = draft();
        record.rejection_reason = Some("blurry".into());

        SubmissionPatch {
            current_step: Some(Some(StepKey::Title)),
            ..SubmissionPatch::default()
        }
        .apply_to(&mut record, Utc::now());
        assert_eq!(record.current_step, Some(StepKey::Title));
        assert_eq!(record.rejection_reason.as_deref(), Some("blurry"));
        assert_eq!(record.version, 1);

        SubmissionPatch {
            rejection_reason: Some(None),
            ..SubmissionPatch::default()
        }
        .apply_to(&mut record, Utc::now());
        assert_eq!(record.rejection_reason, None);
        assert_eq!(record.version, 2);
    }
}
