use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::domain::{AdminActionRecord, OwnerId, SubmissionId, SubmissionRecord, SubmissionStatus};
use super::repository::{RepositoryError, SubmissionPatch, SubmissionRepository, WriteGuard};

#[derive(Debug, Default, Clone)]
struct StoreState {
    records: HashMap<SubmissionId, SubmissionRecord>,
    audit: Vec<AdminActionRecord>,
}

impl StoreState {
    fn active_for(&self, owner: &OwnerId) -> Option<&SubmissionRecord> {
        self.records
            .values()
            .find(|record| &record.owner_id == owner && record.status.is_active())
    }
}

/// On-disk layout of the optional JSON snapshot.
#[derive(Debug, Default, Serialize, Deserialize)]
struct SnapshotFile {
    records: Vec<SubmissionRecord>,
    audit: Vec<AdminActionRecord>,
}

/// Repository keeping records and the audit log behind one mutex, so a record change and
/// its audit entry always land together. With a snapshot path, every successful write is
/// mirrored to disk before it becomes visible.
#[derive(Debug, Default)]
pub struct InMemorySubmissionRepository {
    state: Mutex<StoreState>,
    snapshot_path: Option<PathBuf>,
}

impl InMemorySubmissionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a snapshot-backed store, loading prior state when the file exists.
    pub fn with_snapshot(path: impl Into<PathBuf>) -> Result<Self, RepositoryError> {
        let path = path.into();
        let state = if path.exists() {
            let bytes = fs::read(&path).map_err(|err| unavailable(&path, err))?;
            let snapshot: SnapshotFile =
                serde_json::from_slice(&bytes).map_err(|err| unavailable(&path, err))?;
            info!(
                path = %path.display(),
                records = snapshot.records.len(),
                audit_entries = snapshot.audit.len(),
                "loaded submission snapshot"
            );
            StoreState {
                records: snapshot
                    .records
                    .into_iter()
                    .map(|record| (record.id.clone(), record))
                    .collect(),
                audit: snapshot.audit,
            }
        } else {
            StoreState::default()
        };

        Ok(Self {
            state: Mutex::new(state),
            snapshot_path: Some(path),
        })
    }

    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot_path.as_deref()
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreState>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("submission store lock poisoned".into()))
    }

    fn write<T>(
        &self,
        mutate: impl FnOnce(&mut StoreState) -> Result<T, RepositoryError>,
    ) -> Result<T, RepositoryError> {
        let mut state = self.lock()?;
        match &self.snapshot_path {
            None => mutate(&mut state),
            Some(path) => {
                let mut staged = state.clone();
                let value = mutate(&mut staged)?;
                write_snapshot(path, &staged)?;
                *state = staged;
                Ok(value)
            }
        }
    }
}

impl SubmissionRepository for InMemorySubmissionRepository {
    fn create(&self, record: SubmissionRecord) -> Result<SubmissionRecord, RepositoryError> {
        self.write(|state| {
            if record.status.is_active() {
                if let Some(existing) = state.active_for(&record.owner_id) {
                    return Err(RepositoryError::ActiveExists {
                        owner: record.owner_id.clone(),
                        existing: existing.id.clone(),
                    });
                }
            }
            if state.records.contains_key(&record.id) {
                return Err(RepositoryError::Unavailable(format!(
                    "submission id {} already allocated",
                    record.id
                )));
            }
            state.records.insert(record.id.clone(), record.clone());
            Ok(record)
        })
    }

    fn fetch(&self, id: &SubmissionId) -> Result<Option<SubmissionRecord>, RepositoryError> {
        Ok(self.lock()?.records.get(id).cloned())
    }

    fn active_for_owner(
        &self,
        owner: &OwnerId,
    ) -> Result<Option<SubmissionRecord>, RepositoryError> {
        Ok(self.lock()?.active_for(owner).cloned())
    }

    fn update(
        &self,
        id: &SubmissionId,
        patch: SubmissionPatch,
        guard: &WriteGuard,
    ) -> Result<SubmissionRecord, RepositoryError> {
        self.write(|state| apply_patch(state, id, patch, guard))
    }

    fn update_with_audit(
        &self,
        id: &SubmissionId,
        patch: SubmissionPatch,
        guard: &WriteGuard,
        action: AdminActionRecord,
    ) -> Result<SubmissionRecord, RepositoryError> {
        self.write(|state| {
            let updated = apply_patch(state, id, patch, guard)?;
            state.audit.push(action);
            Ok(updated)
        })
    }

    fn audit_trail(&self, id: &SubmissionId) -> Result<Vec<AdminActionRecord>, RepositoryError> {
        Ok(self
            .lock()?
            .audit
            .iter()
            .filter(|entry| &entry.target_submission_id == id)
            .cloned()
            .collect())
    }

    fn audit_log(&self) -> Result<Vec<AdminActionRecord>, RepositoryError> {
        Ok(self.lock()?.audit.clone())
    }

    fn list_by_status(
        &self,
        status: SubmissionStatus,
        limit: usize,
    ) -> Result<Vec<SubmissionRecord>, RepositoryError> {
        let state = self.lock()?;
        let mut records: Vec<SubmissionRecord> = state
            .records
            .values()
            .filter(|record| record.status == status)
            .cloned()
            .collect();
        records.sort_by(|a, b| {
            a.submitted_at
                .cmp(&b.submitted_at)
                .then_with(|| a.created_at.cmp(&b.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        records.truncate(limit);
        Ok(records)
    }
}

fn apply_patch(
    state: &mut StoreState,
    id: &SubmissionId,
    patch: SubmissionPatch,
    guard: &WriteGuard,
) -> Result<SubmissionRecord, RepositoryError> {
    let current = state.records.get(id).ok_or(RepositoryError::NotFound)?;
    guard.check(current)?;

    let activates = patch.status.map_or(false, SubmissionStatus::is_active);
    if activates && !current.status.is_active() {
        if let Some(existing) = state.active_for(&current.owner_id) {
            return Err(RepositoryError::ActiveExists {
                owner: current.owner_id.clone(),
                existing: existing.id.clone(),
            });
        }
    }

    let record = state.records.get_mut(id).ok_or(RepositoryError::NotFound)?;
    patch.apply_to(record, Utc::now());
    debug!(
        submission_id = %record.id,
        status = record.status.label(),
        version = record.version,
        "submission updated"
    );
    Ok(record.clone())
}

fn write_snapshot(path: &Path, state: &StoreState) -> Result<(), RepositoryError> {
    let mut records: Vec<SubmissionRecord> = state.records.values().cloned().collect();
    records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
    let snapshot = SnapshotFile {
        records,
        audit: state.audit.clone(),
    };

    let bytes = serde_json::to_vec_pretty(&snapshot).map_err(|err| unavailable(path, err))?;
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|err| unavailable(path, err))?;
    }
    let staging = path.with_extension("tmp");
    fs::write(&staging, bytes).map_err(|err| unavailable(&staging, err))?;
    fs::rename(&staging, path).map_err(|err| unavailable(path, err))
}

fn unavailable(path: &Path, err: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Unavailable(format!("snapshot {}: {err}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::submission::domain::{AdminAction, AdminId, AnswerKey, AnswerValue};
    use crate::workflows::submission::schema::SchemaVersion;

    fn draft(owner: &str) -> SubmissionRecord {
        SubmissionRecord::new_draft(OwnerId(owner.into()), SchemaVersion::Extended, Utc::now())
    }

    #[test]
    fn create_refuses_second_active_record_for_owner() {
        let store = InMemorySubmissionRepository::new();
        let first = store.create(draft("owner-1")).expect("first draft");

        match store.create(draft("owner-1")) {
            Err(RepositoryError::ActiveExists { existing, .. }) => assert_eq!(existing, first.id),
            other => panic!("expected active conflict, got {other:?}"),
        }
        store.create(draft("owner-2")).expect("other owner unaffected");
    }

    #[test]
    fn reactivation_is_refused_while_another_record_is_active() {
        let store = InMemorySubmissionRepository::new();
        let rejected = store.create(draft("owner-1")).expect("draft");
        store
            .update(
                &rejected.id,
                SubmissionPatch {
                    status: Some(SubmissionStatus::Rejected),
                    ..SubmissionPatch::default()
                },
                &WriteGuard::default(),
            )
            .expect("reject");
        store.create(draft("owner-1")).expect("new draft after rejection");

        let reopen = store.update(
            &rejected.id,
            SubmissionPatch {
                status: Some(SubmissionStatus::Draft),
                ..SubmissionPatch::default()
            },
            &WriteGuard::status(SubmissionStatus::Rejected),
        );
        assert!(matches!(reopen, Err(RepositoryError::ActiveExists { .. })));
    }

    #[test]
    fn failed_guard_leaves_record_and_audit_untouched() {
        let store = InMemorySubmissionRepository::new();
        let record = store.create(draft("owner-1")).expect("draft");
        let action = AdminActionRecord::new(
            AdminId("admin".into()),
            &record,
            AdminAction::Reject,
            Some("spam".into()),
            Utc::now(),
        );

        let result = store.update_with_audit(
            &record.id,
            SubmissionPatch {
                status: Some(SubmissionStatus::Rejected),
                ..SubmissionPatch::default()
            },
            &WriteGuard::status(SubmissionStatus::Submitted),
            action,
        );

        assert!(matches!(result, Err(RepositoryError::StatusMismatch { .. })));
        assert!(store.audit_log().expect("audit").is_empty());
        let stored = store.fetch(&record.id).expect("fetch").expect("present");
        assert_eq!(stored.status, SubmissionStatus::Draft);
        assert_eq!(stored.version, 0);
    }

    #[test]
    fn snapshot_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("data").join("submissions.json");

        let id = {
            let store = InMemorySubmissionRepository::with_snapshot(&path).expect("open");
            let record = store.create(draft("owner-1")).expect("draft");
            let mut answers = record.answers.clone();
            answers.insert(AnswerKey::Title, AnswerValue::Text("Notion CRM".into()));
            store
                .update(
                    &record.id,
                    SubmissionPatch {
                        answers: Some(answers),
                        ..SubmissionPatch::default()
                    },
                    &WriteGuard::status(SubmissionStatus::Draft),
                )
                .expect("answer write");
            record.id
        };

        let reopened = InMemorySubmissionRepository::with_snapshot(&path).expect("reopen");
        let record = reopened.fetch(&id).expect("fetch").expect("present");
        assert_eq!(
            record.answer(AnswerKey::Title),
            Some(&AnswerValue::Text("Notion CRM".into()))
        );
        assert_eq!(record.version, 1);
        assert!(reopened
            .active_for_owner(&OwnerId("owner-1".into()))
            .expect("lookup")
            .is_some());
    }
}
