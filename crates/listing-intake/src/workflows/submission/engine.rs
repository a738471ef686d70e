//! The wizard engine. One parametric implementation serves every schema version: it reads the
//! step graph, validates input, and persists `(current_step, answers)` through guarded
//! repository writes. Transition logic follows graph links only, never list positions.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::domain::{
    AnswerValue, Answers, OwnerId, SubmissionRecord, SubmissionStatus, SubmissionStatusView,
};
use super::error::{ConflictReason, IntakeError};
use super::lifecycle::{transition, LifecycleEvent};
use super::render::{ContentRenderer, StepView};
use super::repository::{RepositoryError, SubmissionPatch, SubmissionRepository, WriteGuard};
use super::schema::{SchemaCatalog, SchemaVersion, StepDefinition, StepSchema, StepTarget};
use super::validators::{ValidationError, ValidationErrorKind};

const EDITABLE: [SubmissionStatus; 2] = [SubmissionStatus::Draft, SubmissionStatus::NeedsFix];

/// User action against the record's current step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum WizardAction {
    /// Answer the current step; on a link collector this appends one item.
    Advance { input: String },
    Back,
    Skip,
    Save,
    /// Leave a link collector.
    Finish,
}

impl WizardAction {
    pub const fn label(&self) -> &'static str {
        match self {
            WizardAction::Advance { .. } => "advance",
            WizardAction::Back => "back",
            WizardAction::Skip => "skip",
            WizardAction::Save => "save",
            WizardAction::Finish => "finish",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ApplyOutcome {
    Step(StepView),
    Submitted(SubmissionStatusView),
}

pub struct SubmissionEngine<R> {
    repository: Arc<R>,
    catalog: Arc<SchemaCatalog>,
    renderer: Arc<dyn ContentRenderer>,
    max_links: usize,
}

impl<R> SubmissionEngine<R>
where
    R: SubmissionRepository + 'static,
{
    pub fn new(
        repository: Arc<R>,
        catalog: Arc<SchemaCatalog>,
        renderer: Arc<dyn ContentRenderer>,
        max_links: usize,
    ) -> Self {
        Self {
            repository,
            catalog,
            renderer,
            max_links,
        }
    }

    pub fn catalog(&self) -> &SchemaCatalog {
        &self.catalog
    }

    /// Returns the owner's active record, creating a draft when there is none. The flag is
    /// true when an existing record was resumed. No draft is opened while the owner has a
    /// record waiting for moderation.
    pub fn start_or_resume(
        &self,
        owner: &OwnerId,
        schema: SchemaVersion,
    ) -> Result<(SubmissionRecord, bool), IntakeError> {
        if let Some(active) = self.repository.active_for_owner(owner)? {
            self.ensure_schema(&active)?;
            debug!(submission_id = %active.id, owner_id = %owner, "resuming active submission");
            return Ok((active, true));
        }
        if let Some(pending) = self.awaiting_moderation(owner)? {
            debug!(
                submission_id = %pending.id,
                owner_id = %owner,
                "owner has a submission in review"
            );
            return Err(IntakeError::conflict(ConflictReason::AwaitingModeration));
        }

        let draft = SubmissionRecord::new_draft(owner.clone(), schema, Utc::now());
        match self.repository.create(draft) {
            Ok(created) => {
                info!(
                    submission_id = %created.id,
                    owner_id = %owner,
                    schema = schema.label(),
                    "draft submission created"
                );
                Ok((created, false))
            }
            Err(RepositoryError::ActiveExists { existing, .. }) => {
                let active = self
                    .repository
                    .fetch(&existing)?
                    .ok_or(IntakeError::NotFound(existing))?;
                self.ensure_schema(&active)?;
                Ok((active, true))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn awaiting_moderation(
        &self,
        owner: &OwnerId,
    ) -> Result<Option<SubmissionRecord>, IntakeError> {
        Ok(self
            .repository
            .list_by_status(SubmissionStatus::Submitted, usize::MAX)?
            .into_iter()
            .find(|record| &record.owner_id == owner))
    }

    /// Renders the step the record should resume at.
    pub fn current_step(&self, record: &SubmissionRecord) -> Result<StepView, IntakeError> {
        self.ensure_schema(record)?;
        let schema = self.catalog.get(record.schema);
        let step = resume_step(schema, record);
        Ok(self.renderer.render_step(schema, record, step))
    }

    pub fn apply(
        &self,
        record: SubmissionRecord,
        action: WizardAction,
    ) -> Result<ApplyOutcome, IntakeError> {
        if !record.status.is_active() {
            return Err(IntakeError::conflict(ConflictReason::StaleStatus));
        }
        self.ensure_schema(&record)?;

        let schema = self.catalog.get(record.schema);
        let step = resume_step(schema, &record);
        debug!(
            submission_id = %record.id,
            step = %step.key,
            action = action.label(),
            "applying wizard action"
        );

        match action {
            WizardAction::Advance { input } => {
                let value = step
                    .validator
                    .validate(&input)
                    .map_err(|kind| invalid(step, kind))?;
                if step.multi_value {
                    return self.append(schema, record, step, value);
                }
                let target = step.next_for(&value);
                let answers = step.answer_key.map(|key| {
                    let mut answers = record.answers.clone();
                    answers.insert(key, value);
                    answers
                });
                self.move_to(schema, record, step, answers, target)
            }
            WizardAction::Back => {
                let target = step.prev.unwrap_or(step.key);
                self.move_to(schema, record, step, None, StepTarget::Step(target))
            }
            WizardAction::Skip => {
                if !step.optional {
                    return Err(IntakeError::NotSkippable { step: step.key });
                }
                let answers = step.answer_key.map(|key| {
                    let mut answers = record.answers.clone();
                    answers.insert(key, AnswerValue::Skipped);
                    answers
                });
                self.move_to(schema, record, step, answers, step.skip_target())
            }
            WizardAction::Save => {
                self.move_to(schema, record, step, None, StepTarget::Step(step.key))
            }
            WizardAction::Finish => {
                let key = match step.answer_key {
                    Some(key) if step.multi_value => key,
                    _ => {
                        return Err(IntakeError::UnsupportedAction {
                            step: step.key,
                            action: "finish",
                        })
                    }
                };
                let value = match record.answer(key) {
                    Some(AnswerValue::List(items)) if !items.is_empty() => {
                        AnswerValue::List(items.clone())
                    }
                    _ if step.optional => AnswerValue::List(Vec::new()),
                    _ => return Err(invalid(step, ValidationErrorKind::Empty)),
                };
                let target = step.next_for(&value);
                let mut answers = record.answers.clone();
                answers.insert(key, value);
                self.move_to(schema, record, step, Some(answers), target)
            }
        }
    }

    /// Freezes the answers and flips the record to `Submitted` in one guarded write.
    pub fn submit(&self, record: SubmissionRecord) -> Result<SubmissionRecord, IntakeError> {
        self.ensure_schema(&record)?;
        let target = transition(record.status, LifecycleEvent::Submit)
            .ok_or_else(|| IntakeError::conflict(ConflictReason::StaleStatus))?;

        let schema = self.catalog.get(record.schema);
        let missing = schema.missing_answers(&record.answers);
        if !missing.is_empty() {
            debug!(
                submission_id = %record.id,
                missing = missing.len(),
                "submit refused, required answers missing"
            );
            return Err(IntakeError::MissingFields { missing });
        }

        let now = Utc::now();
        let revision = record.revision + 1;
        let snapshot = self.renderer.render_snapshot(schema, &record, revision, now);
        let patch = SubmissionPatch {
            status: Some(target),
            revision: Some(revision),
            rendered_snapshot: Some(Some(snapshot)),
            rejection_reason: Some(None),
            submitted_at: Some(now),
            ..SubmissionPatch::default()
        };
        let guard = WriteGuard::status(record.status).at_version(record.version);
        let updated = self.repository.update(&record.id, patch, &guard)?;

        info!(
            submission_id = %updated.id,
            owner_id = %updated.owner_id,
            revision = updated.revision,
            "submission sent for moderation"
        );
        Ok(updated)
    }

    /// Starts a fresh draft cycle on a rejected record, keeping its answers as pre-fill.
    pub fn reopen(&self, record: SubmissionRecord) -> Result<SubmissionRecord, IntakeError> {
        self.ensure_schema(&record)?;
        let target = transition(record.status, LifecycleEvent::Reopen)
            .ok_or_else(|| IntakeError::conflict(ConflictReason::StaleStatus))?;
        if self.awaiting_moderation(&record.owner_id)?.is_some() {
            return Err(IntakeError::conflict(ConflictReason::AwaitingModeration));
        }

        let entry = self.catalog.get(record.schema).first_step().key;
        let patch = SubmissionPatch {
            status: Some(target),
            current_step: Some(Some(entry)),
            ..SubmissionPatch::default()
        };
        let guard = WriteGuard::status(record.status).at_version(record.version);
        let updated = self.repository.update(&record.id, patch, &guard)?;

        info!(
            submission_id = %updated.id,
            owner_id = %updated.owner_id,
            "rejected submission reopened"
        );
        Ok(updated)
    }

    fn append(
        &self,
        schema: &StepSchema,
        record: SubmissionRecord,
        step: &StepDefinition,
        value: AnswerValue,
    ) -> Result<ApplyOutcome, IntakeError> {
        let Some(key) = step.answer_key else {
            return Err(IntakeError::UnsupportedAction {
                step: step.key,
                action: "append",
            });
        };

        let mut items = match record.answer(key) {
            Some(AnswerValue::List(items)) => items.clone(),
            _ => Vec::new(),
        };
        if items.len() >= self.max_links {
            return Err(invalid(
                step,
                ValidationErrorKind::TooManyItems {
                    max: self.max_links,
                },
            ));
        }
        items.push(value.display());

        let mut answers = record.answers.clone();
        answers.insert(key, AnswerValue::List(items));
        self.move_to(schema, record, step, Some(answers), StepTarget::Step(step.key))
    }

    fn move_to(
        &self,
        schema: &StepSchema,
        record: SubmissionRecord,
        from: &StepDefinition,
        answers: Option<Answers>,
        target: StepTarget,
    ) -> Result<ApplyOutcome, IntakeError> {
        let pointer = match target {
            StepTarget::Step(next) => next,
            StepTarget::End => from.key,
        };
        let unchanged = answers.is_none() && record.current_step == Some(pointer);
        let updated = if unchanged {
            record
        } else {
            let patch = SubmissionPatch {
                answers,
                current_step: Some(Some(pointer)),
                ..SubmissionPatch::default()
            };
            self.repository
                .update(&record.id, patch, &WriteGuard::status_in(&EDITABLE))?
        };

        match target {
            StepTarget::Step(next) => {
                let step = schema
                    .get_step(next)
                    .unwrap_or_else(|| schema.first_step());
                debug!(submission_id = %updated.id, step = %step.key, "wizard moved");
                Ok(ApplyOutcome::Step(
                    self.renderer.render_step(schema, &updated, step),
                ))
            }
            StepTarget::End => {
                let submitted = self.submit(updated)?;
                Ok(ApplyOutcome::Submitted(submitted.status_view()))
            }
        }
    }

    fn ensure_schema(&self, record: &SubmissionRecord) -> Result<(), IntakeError> {
        let schema = self.catalog.get(record.schema);
        match schema.foreign_answers(&record.answers).next() {
            Some(answer) => Err(IntakeError::SchemaMismatch {
                id: record.id.clone(),
                schema: record.schema,
                answer,
            }),
            None => Ok(()),
        }
    }
}

/// Where a record picks up: the stored pointer when it names a step of the record's schema,
/// otherwise the first required step without a usable answer (the terminal step once all
/// are answered).
pub fn resume_step<'a>(schema: &'a StepSchema, record: &SubmissionRecord) -> &'a StepDefinition {
    if let Some(step) = record.current_step.and_then(|key| schema.get_step(key)) {
        return step;
    }
    if record.answers.is_empty() {
        return schema.first_step();
    }

    schema
        .steps()
        .iter()
        .find(|step| {
            !step.optional
                && !step.multi_value
                && step.answer_key.map_or(false, |key| {
                    record.answer(key).map_or(true, AnswerValue::is_neutral)
                })
        })
        .or_else(|| {
            schema
                .steps()
                .iter()
                .find(|step| step.next == StepTarget::End)
        })
        .unwrap_or_else(|| schema.first_step())
}

fn invalid(step: &StepDefinition, kind: ValidationErrorKind) -> IntakeError {
    IntakeError::Validation(ValidationError {
        step: step.key,
        field: step.answer_key,
        kind,
    })
}
