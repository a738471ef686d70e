use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use serde_json::Value;

use crate::config::IntakeConfig;
use crate::workflows::submission::domain::{
    AdminActionRecord, ChannelPostRef, OwnerId, SubmissionId, SubmissionRecord, SubmissionStatus,
};
use crate::workflows::submission::engine::{ApplyOutcome, WizardAction};
use crate::workflows::submission::gateway::{
    ChannelPublisher, NotifyError, Notifier, PublishError,
};
use crate::workflows::submission::render::PlainTextRenderer;
use crate::workflows::submission::repository::{
    RepositoryError, SubmissionPatch, SubmissionRepository, WriteGuard,
};
use crate::workflows::submission::schema::{
    SchemaCatalog, SchemaVersion, StepDefinition, StepKey, StepSchema,
};
use crate::workflows::submission::service::IntakeService;
use crate::workflows::submission::store::InMemorySubmissionRepository;
use crate::workflows::submission::validators::ValidatorKind;
use crate::workflows::submission::{intake_router, AnswerKey};

pub(super) type TestService<R = InMemorySubmissionRepository> =
    IntakeService<R, RecordingNotifier, ScriptedPublisher>;

pub(super) struct Harness<R = InMemorySubmissionRepository> {
    pub(super) service: Arc<TestService<R>>,
    pub(super) repository: Arc<R>,
    pub(super) notifier: Arc<RecordingNotifier>,
    pub(super) publisher: Arc<ScriptedPublisher>,
}

pub(super) fn intake_config() -> IntakeConfig {
    IntakeConfig {
        max_links: 3,
        ..IntakeConfig::default()
    }
}

pub(super) fn harness() -> Harness {
    harness_with(InMemorySubmissionRepository::new(), intake_config())
}

pub(super) fn harness_with<R>(repository: R, config: IntakeConfig) -> Harness<R>
where
    R: SubmissionRepository + 'static,
{
    let repository = Arc::new(repository);
    let notifier = Arc::new(RecordingNotifier::default());
    let publisher = Arc::new(ScriptedPublisher::default());
    let service = IntakeService::new(
        repository.clone(),
        notifier.clone(),
        publisher.clone(),
        config,
    )
    .expect("shipped schemas are valid");

    Harness {
        service: Arc::new(service),
        repository,
        notifier,
        publisher,
    }
}

/// Three-question form: welcome -> title -> price -> confirm.
pub(super) fn short_form_catalog() -> SchemaCatalog {
    let steps = vec![
        StepDefinition::navigation(StepKey::Welcome).then(StepKey::Title),
        StepDefinition::question(
            StepKey::Title,
            AnswerKey::Title,
            ValidatorKind::BoundedText { max: 200 },
        )
        .back(StepKey::Welcome)
        .then(StepKey::Price),
        StepDefinition::question(StepKey::Price, AnswerKey::Price, ValidatorKind::PriceRange)
            .back(StepKey::Title)
            .then(StepKey::Confirm),
        StepDefinition::navigation(StepKey::Confirm)
            .back(StepKey::Price)
            .finishes(),
    ];
    let short = StepSchema::from_steps(SchemaVersion::Legacy, StepKey::Welcome, steps)
        .expect("short form is valid");
    SchemaCatalog::new(short, StepSchema::extended().expect("extended is valid"))
        .expect("catalog slots match")
}

pub(super) fn short_form_harness() -> Harness {
    let repository = Arc::new(InMemorySubmissionRepository::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let publisher = Arc::new(ScriptedPublisher::default());
    let service = IntakeService::with_catalog(
        repository.clone(),
        notifier.clone(),
        publisher.clone(),
        intake_config(),
        short_form_catalog(),
        Arc::new(PlainTextRenderer),
    );

    Harness {
        service: Arc::new(service),
        repository,
        notifier,
        publisher,
    }
}

pub(super) fn owner(id: &str) -> OwnerId {
    OwnerId(id.to_string())
}

pub(super) fn advance(input: &str) -> WizardAction {
    WizardAction::Advance {
        input: input.to_string(),
    }
}

pub(super) fn expect_step(outcome: ApplyOutcome) -> StepKey {
    match outcome {
        ApplyOutcome::Step(view) => view.step,
        other => panic!("expected a step view, got {other:?}"),
    }
}

pub(super) fn start<R: SubmissionRepository + 'static>(
    harness: &Harness<R>,
    owner_id: &str,
    schema: SchemaVersion,
) -> SubmissionId {
    harness
        .service
        .start_or_resume(&owner(owner_id), Some(schema))
        .expect("session starts")
        .submission
        .submission_id
}

/// Answers every legacy step with valid input and returns the record, still a draft on the
/// confirm step.
pub(super) fn fill_legacy<R: SubmissionRepository + 'static>(
    harness: &Harness<R>,
    owner_id: &str,
) -> SubmissionId {
    let id = start(harness, owner_id, SchemaVersion::Legacy);
    for input in [
        "start",
        "Notion CRM",
        "CRM template for small agencies",
        "https://notion.so/crm",
        "$500-900",
        "seller@example.com",
    ] {
        harness
            .service
            .apply(&id, advance(input))
            .expect("valid legacy answer");
    }
    id
}

/// Fills and submits a legacy record.
pub(super) fn submitted_legacy<R: SubmissionRepository + 'static>(
    harness: &Harness<R>,
    owner_id: &str,
) -> SubmissionId {
    let id = fill_legacy(harness, owner_id);
    match harness.service.apply(&id, advance("confirm")) {
        Ok(ApplyOutcome::Submitted(view)) => assert_eq!(view.status, "submitted"),
        other => panic!("expected submission, got {other:?}"),
    }
    id
}

pub(super) fn stored<R: SubmissionRepository>(
    repository: &R,
    id: &SubmissionId,
) -> SubmissionRecord {
    repository
        .fetch(id)
        .expect("fetch succeeds")
        .expect("record present")
}

pub(super) fn router_for(harness: &Harness) -> axum::Router {
    intake_router(harness.service.clone())
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

#[derive(Default)]
pub(super) struct RecordingNotifier {
    sent: Mutex<Vec<(OwnerId, String)>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub(super) fn sent(&self) -> Vec<(OwnerId, String)> {
        self.sent.lock().expect("notifier mutex poisoned").clone()
    }

    pub(super) fn fail_deliveries(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }
}

impl Notifier for RecordingNotifier {
    fn send(&self, recipient: &OwnerId, content: &str) -> Result<(), NotifyError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError::Unreachable(recipient.clone()));
        }
        self.sent
            .lock()
            .expect("notifier mutex poisoned")
            .push((recipient.clone(), content.to_string()));
        Ok(())
    }
}

/// Publisher that succeeds with sequential post ids unless a failure is queued.
#[derive(Default)]
pub(super) struct ScriptedPublisher {
    failures: Mutex<VecDeque<PublishError>>,
    posts: Mutex<Vec<(String, String)>>,
    sequence: AtomicU64,
}

impl ScriptedPublisher {
    pub(super) fn fail_next(&self, reason: &str) {
        self.failures
            .lock()
            .expect("publisher mutex poisoned")
            .push_back(PublishError::Unreachable {
                channel: "@listings".to_string(),
                reason: reason.to_string(),
            });
    }

    pub(super) fn posts(&self) -> Vec<(String, String)> {
        self.posts.lock().expect("publisher mutex poisoned").clone()
    }
}

impl ChannelPublisher for ScriptedPublisher {
    fn publish(&self, channel: &str, content: &str) -> Result<ChannelPostRef, PublishError> {
        if let Some(failure) = self
            .failures
            .lock()
            .expect("publisher mutex poisoned")
            .pop_front()
        {
            return Err(failure);
        }
        self.posts
            .lock()
            .expect("publisher mutex poisoned")
            .push((channel.to_string(), content.to_string()));
        let id = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(ChannelPostRef {
            channel: channel.to_string(),
            post_id: id.to_string(),
        })
    }
}

/// In-memory store whose next `update_with_audit` calls fail with a transient error.
#[derive(Default)]
pub(super) struct FlakyCommitRepository {
    inner: InMemorySubmissionRepository,
    failing_commits: AtomicUsize,
}

impl FlakyCommitRepository {
    pub(super) fn fail_commits(&self, count: usize) {
        self.failing_commits.store(count, Ordering::SeqCst);
    }
}

impl SubmissionRepository for FlakyCommitRepository {
    fn create(&self, record: SubmissionRecord) -> Result<SubmissionRecord, RepositoryError> {
        self.inner.create(record)
    }

    fn fetch(&self, id: &SubmissionId) -> Result<Option<SubmissionRecord>, RepositoryError> {
        self.inner.fetch(id)
    }

    fn active_for_owner(
        &self,
        owner: &OwnerId,
    ) -> Result<Option<SubmissionRecord>, RepositoryError> {
        self.inner.active_for_owner(owner)
    }

    fn update(
        &self,
        id: &SubmissionId,
        patch: SubmissionPatch,
        guard: &WriteGuard,
    ) -> Result<SubmissionRecord, RepositoryError> {
        self.inner.update(id, patch, guard)
    }

    fn update_with_audit(
        &self,
        id: &SubmissionId,
        patch: SubmissionPatch,
        guard: &WriteGuard,
        action: AdminActionRecord,
    ) -> Result<SubmissionRecord, RepositoryError> {
        let remaining = self.failing_commits.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_commits.store(remaining - 1, Ordering::SeqCst);
            return Err(RepositoryError::Unavailable("write timed out".to_string()));
        }
        self.inner.update_with_audit(id, patch, guard, action)
    }

    fn audit_trail(&self, id: &SubmissionId) -> Result<Vec<AdminActionRecord>, RepositoryError> {
        self.inner.audit_trail(id)
    }

    fn audit_log(&self) -> Result<Vec<AdminActionRecord>, RepositoryError> {
        self.inner.audit_log()
    }

    fn list_by_status(
        &self,
        status: SubmissionStatus,
        limit: usize,
    ) -> Result<Vec<SubmissionRecord>, RepositoryError> {
        self.inner.list_by_status(status, limit)
    }
}

pub(super) struct UnavailableRepository;

impl SubmissionRepository for UnavailableRepository {
    fn create(&self, _record: SubmissionRecord) -> Result<SubmissionRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: &SubmissionId) -> Result<Option<SubmissionRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn active_for_owner(
        &self,
        _owner: &OwnerId,
    ) -> Result<Option<SubmissionRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update(
        &self,
        _id: &SubmissionId,
        _patch: SubmissionPatch,
        _guard: &WriteGuard,
    ) -> Result<SubmissionRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update_with_audit(
        &self,
        _id: &SubmissionId,
        _patch: SubmissionPatch,
        _guard: &WriteGuard,
        _action: AdminActionRecord,
    ) -> Result<SubmissionRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn audit_trail(&self, _id: &SubmissionId) -> Result<Vec<AdminActionRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn audit_log(&self) -> Result<Vec<AdminActionRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn list_by_status(
        &self,
        _status: SubmissionStatus,
        _limit: usize,
    ) -> Result<Vec<SubmissionRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}
