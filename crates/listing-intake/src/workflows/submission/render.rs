use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::{AnswerKey, AnswerValue, RenderedSnapshot, SubmissionId, SubmissionRecord};
use super::prompts::{label_for, prompt_for, OwnerNotice};
use super::schema::{SchemaVersion, StepDefinition, StepKey, StepSchema};

const UNTITLED: &str = "Untitled listing";

/// Descriptor of the step a user should see next.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepView {
    pub submission_id: SubmissionId,
    pub schema: SchemaVersion,
    pub status: &'static str,
    pub step: StepKey,
    pub prompt: String,
    pub position: usize,
    pub total: usize,
    pub optional: bool,
    pub multi_value: bool,
    pub can_go_back: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_answer: Option<AnswerValue>,
}

/// Turns records into user-facing content. Transport and markup live elsewhere.
pub trait ContentRenderer: Send + Sync {
    fn render_step(
        &self,
        schema: &StepSchema,
        record: &SubmissionRecord,
        step: &StepDefinition,
    ) -> StepView;

    fn render_snapshot(
        &self,
        schema: &StepSchema,
        record: &SubmissionRecord,
        revision: u32,
        rendered_at: DateTime<Utc>,
    ) -> RenderedSnapshot;

    fn render_notice(&self, notice: &OwnerNotice) -> String {
        notice.text()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextRenderer;

impl ContentRenderer for PlainTextRenderer {
    fn render_step(
        &self,
        schema: &StepSchema,
        record: &SubmissionRecord,
        step: &StepDefinition,
    ) -> StepView {
        let current_answer = step
            .answer_key
            .and_then(|key| record.answer(key))
            .cloned();

        let mut prompt = prompt_for(step.key).to_string();
        if let Some(AnswerValue::List(items)) = &current_answer {
            prompt.push_str(&format!(" ({} collected)", items.len()));
        }
        if step.key == StepKey::Confirm {
            let summary = summary_lines(schema, record);
            if !summary.is_empty() {
                prompt = format!("{summary}\n\n{prompt}");
            }
        }

        StepView {
            submission_id: record.id.clone(),
            schema: schema.version(),
            status: record.status.label(),
            step: step.key,
            prompt,
            position: schema.position(step.key).unwrap_or(1),
            total: schema.len(),
            optional: step.optional,
            multi_value: step.multi_value,
            can_go_back: step.prev.is_some(),
            current_answer,
        }
    }

    fn render_snapshot(
        &self,
        schema: &StepSchema,
        record: &SubmissionRecord,
        revision: u32,
        rendered_at: DateTime<Utc>,
    ) -> RenderedSnapshot {
        let title = record
            .answer(AnswerKey::Title)
            .filter(|value| !value.is_neutral())
            .map(AnswerValue::display)
            .unwrap_or_else(|| UNTITLED.to_string());

        RenderedSnapshot {
            revision,
            title,
            body: summary_lines(schema, record),
            rendered_at,
        }
    }
}

/// Channel post text for a frozen snapshot.
pub fn post_content(snapshot: &RenderedSnapshot) -> String {
    format!("{}\n\n{}", snapshot.title, snapshot.body)
}

fn summary_lines(schema: &StepSchema, record: &SubmissionRecord) -> String {
    schema
        .steps()
        .iter()
        .filter_map(|step| step.answer_key)
        .filter(|key| *key != AnswerKey::Title)
        .filter_map(|key| {
            record
                .answer(key)
                .filter(|value| !value.is_neutral())
                .map(|value| format!("{}: {}", label_for(key), value.display()))
        })
        .collect::<Vec<_>>()
        .join("\n")
}
