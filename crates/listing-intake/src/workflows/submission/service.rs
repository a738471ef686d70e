use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde::Serialize;
use tracing::info;

use super::domain::{
    AdminActionRecord, AnswerKey, AnswerValue, OwnerId, SubmissionId, SubmissionRecord,
    SubmissionStatus, SubmissionStatusView,
};
use super::engine::{ApplyOutcome, SubmissionEngine, WizardAction};
use super::error::IntakeError;
use super::gateway::{ChannelPublisher, Notifier};
use super::lifecycle::{LifecycleStateMachine, ModerationOutcome, ModerationRequest};
use super::render::{ContentRenderer, PlainTextRenderer, StepView};
use super::repository::{RepositoryError, SubmissionRepository};
use super::schema::{IntegrityError, SchemaCatalog, SchemaVersion};
use crate::config::IntakeConfig;
use crate::workflows::matching::{self, BuyerRequest, Lead, ListedItem};

const MATCH_TEXT_KEYS: [AnswerKey; 4] = [
    AnswerKey::Title,
    AnswerKey::Description,
    AnswerKey::Category,
    AnswerKey::TechStack,
];

/// Record plus the step the owner should see.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub submission: SubmissionStatusView,
    pub step: StepView,
    pub resumed: bool,
}

/// Serializes calls that touch the same key. Different keys never contend.
#[derive(Debug, Default)]
struct KeyedLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    fn handle(&self, key: String) -> Result<Arc<Mutex<()>>, IntakeError> {
        let mut locks = self.locks.lock().map_err(|_| poisoned())?;
        Ok(locks.entry(key).or_default().clone())
    }
}

fn poisoned() -> IntakeError {
    IntakeError::Repository(RepositoryError::Unavailable(
        "submission lock table poisoned".to_string(),
    ))
}

/// Facade composing the wizard engine, the moderation lifecycle, and the repository.
pub struct IntakeService<R, N, P> {
    repository: Arc<R>,
    engine: SubmissionEngine<R>,
    lifecycle: LifecycleStateMachine<R, N, P>,
    locks: KeyedLocks,
    config: IntakeConfig,
}

impl<R, N, P> IntakeService<R, N, P>
where
    R: SubmissionRepository + 'static,
    N: Notifier + 'static,
    P: ChannelPublisher + 'static,
{
    /// Builds the service over the shipped schemas. Fails when a step table is malformed.
    pub fn new(
        repository: Arc<R>,
        notifier: Arc<N>,
        publisher: Arc<P>,
        config: IntakeConfig,
    ) -> Result<Self, IntegrityError> {
        let catalog = SchemaCatalog::load()?;
        Ok(Self::with_catalog(
            repository,
            notifier,
            publisher,
            config,
            catalog,
            Arc::new(PlainTextRenderer),
        ))
    }

    pub fn with_catalog(
        repository: Arc<R>,
        notifier: Arc<N>,
        publisher: Arc<P>,
        config: IntakeConfig,
        catalog: SchemaCatalog,
        renderer: Arc<dyn ContentRenderer>,
    ) -> Self {
        let catalog = Arc::new(catalog);
        let engine = SubmissionEngine::new(
            repository.clone(),
            catalog.clone(),
            renderer.clone(),
            config.max_links,
        );
        let lifecycle = LifecycleStateMachine::new(
            repository.clone(),
            notifier,
            publisher,
            renderer,
            catalog,
            config.clone(),
        );

        Self {
            repository,
            engine,
            lifecycle,
            locks: KeyedLocks::default(),
            config,
        }
    }

    pub fn config(&self) -> &IntakeConfig {
        &self.config
    }

    pub fn catalog(&self) -> &SchemaCatalog {
        self.engine.catalog()
    }

    pub fn get_active_submission(
        &self,
        owner: &OwnerId,
    ) -> Result<Option<SubmissionRecord>, IntakeError> {
        Ok(self.repository.active_for_owner(owner)?)
    }

    /// Resumes the owner's active record or opens a new draft under `schema` (the configured
    /// default when `None`).
    pub fn start_or_resume(
        &self,
        owner: &OwnerId,
        schema: Option<SchemaVersion>,
    ) -> Result<SessionView, IntakeError> {
        let lock = self.locks.handle(format!("owner:{owner}"))?;
        let _guard = lock.lock().map_err(|_| poisoned())?;

        let schema = schema.unwrap_or(self.config.default_schema);
        let (record, resumed) = self.engine.start_or_resume(owner, schema)?;
        let step = self.engine.current_step(&record)?;
        Ok(SessionView {
            submission: record.status_view(),
            step,
            resumed,
        })
    }

    pub fn get(&self, id: &SubmissionId) -> Result<SubmissionRecord, IntakeError> {
        self.repository
            .fetch(id)?
            .ok_or_else(|| IntakeError::NotFound(id.clone()))
    }

    pub fn current_step(&self, id: &SubmissionId) -> Result<StepView, IntakeError> {
        let record = self.get(id)?;
        self.engine.current_step(&record)
    }

    pub fn apply(
        &self,
        id: &SubmissionId,
        action: WizardAction,
    ) -> Result<ApplyOutcome, IntakeError> {
        let lock = self.locks.handle(record_key(id))?;
        let _guard = lock.lock().map_err(|_| poisoned())?;

        let record = self.get(id)?;
        self.engine.apply(record, action)
    }

    pub fn submit(&self, id: &SubmissionId) -> Result<SubmissionStatusView, IntakeError> {
        let lock = self.locks.handle(record_key(id))?;
        let _guard = lock.lock().map_err(|_| poisoned())?;

        let record = self.get(id)?;
        Ok(self.engine.submit(record)?.status_view())
    }

    pub fn reopen(&self, id: &SubmissionId) -> Result<SessionView, IntakeError> {
        let lock = self.locks.handle(record_key(id))?;
        let _guard = lock.lock().map_err(|_| poisoned())?;

        let record = self.engine.reopen(self.get(id)?)?;
        let step = self.engine.current_step(&record)?;
        Ok(SessionView {
            submission: record.status_view(),
            step,
            resumed: true,
        })
    }

    pub fn moderate(
        &self,
        id: &SubmissionId,
        request: ModerationRequest,
    ) -> Result<ModerationOutcome, IntakeError> {
        let lock = self.locks.handle(record_key(id))?;
        let _guard = lock.lock().map_err(|_| poisoned())?;

        self.lifecycle.moderate(id, request)
    }

    pub fn audit_trail(&self, id: &SubmissionId) -> Result<Vec<AdminActionRecord>, IntakeError> {
        self.get(id)?;
        Ok(self.repository.audit_trail(id)?)
    }

    pub fn audit_log(&self) -> Result<Vec<AdminActionRecord>, IntakeError> {
        Ok(self.repository.audit_log()?)
    }

    /// Submitted records awaiting a decision, oldest submission first.
    pub fn moderation_queue(&self, limit: usize) -> Result<Vec<SubmissionStatusView>, IntakeError> {
        Ok(self
            .repository
            .list_by_status(SubmissionStatus::Submitted, limit)?
            .iter()
            .map(SubmissionRecord::status_view)
            .collect())
    }

    /// Scores published listings against a buyer request. Persisting leads is the caller's job.
    pub fn match_leads(&self, request: &BuyerRequest) -> Result<Vec<Lead>, IntakeError> {
        let items: Vec<ListedItem> = self
            .repository
            .list_by_status(SubmissionStatus::Published, usize::MAX)?
            .iter()
            .map(listed_item)
            .collect();

        let leads = matching::leads(request, &items, Utc::now());
        info!(
            request_id = %request.id,
            candidates = items.len(),
            leads = leads.len(),
            "lead matching completed"
        );
        Ok(leads)
    }
}

fn record_key(id: &SubmissionId) -> String {
    format!("submission:{id}")
}

fn listed_item(record: &SubmissionRecord) -> ListedItem {
    let text = MATCH_TEXT_KEYS
        .iter()
        .filter_map(|key| record.answer(*key))
        .filter(|value| !value.is_neutral())
        .map(AnswerValue::display)
        .collect::<Vec<_>>()
        .join(" ");

    let mut price = record
        .answer(AnswerKey::Price)
        .map(AnswerValue::display)
        .unwrap_or_default();
    if record.answer(AnswerKey::Negotiable) == Some(&AnswerValue::Flag(true)) {
        price.push_str(" negotiable");
    }

    ListedItem {
        id: record.id.to_string(),
        text,
        price,
    }
}
