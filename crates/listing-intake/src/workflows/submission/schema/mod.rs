//! Step graph definitions and their load-time integrity checks.

mod blueprint;

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use super::domain::{AnswerKey, AnswerValue, Answers};
use super::validators::ValidatorKind;

/// Every step known to any schema version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKey {
    Welcome,
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
    Confirm,
}

impl StepKey {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Welcome => "welcome",
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
            Self::Confirm => "confirm",
        }
    }
}

impl fmt::Display for StepKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coexisting form variants. Records never move between versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaVersion {
    Legacy,
    Extended,
}

impl SchemaVersion {
    pub const fn label(self) -> &'static str {
        match self {
            SchemaVersion::Legacy => "legacy",
            SchemaVersion::Extended => "extended",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "legacy" | "v1" | "flat" => Some(Self::Legacy),
            "extended" | "v2" => Some(Self::Extended),
            _ => None,
        }
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Forward link target: another step or the end of the wizard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepTarget {
    Step(StepKey),
    End,
}

/// Predicate over the value just written for a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchPredicate {
    Flag(bool),
    NumberAtLeast(u64),
    Skipped,
}

impl BranchPredicate {
    pub fn matches(&self, value: &AnswerValue) -> bool {
        match (self, value) {
            (BranchPredicate::Flag(expected), AnswerValue::Flag(actual)) => expected == actual,
            (BranchPredicate::NumberAtLeast(floor), AnswerValue::Number(actual)) => {
                actual >= floor
            }
            (BranchPredicate::Skipped, AnswerValue::Skipped) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BranchRule {
    pub when: BranchPredicate,
    pub target: StepTarget,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepDefinition {
    pub key: StepKey,
    pub answer_key: Option<AnswerKey>,
    pub validator: ValidatorKind,
    pub optional: bool,
    pub multi_value: bool,
    pub next: StepTarget,
    pub prev: Option<StepKey>,
    pub skip: Option<StepTarget>,
    pub branches: Vec<BranchRule>,
}

impl StepDefinition {
    /// Step that records an answer under `answer_key`.
    pub fn question(key: StepKey, answer_key: AnswerKey, validator: ValidatorKind) -> Self {
        Self {
            key,
            answer_key: Some(answer_key),
            validator,
            optional: false,
            multi_value: false,
            next: StepTarget::End,
            prev: None,
            skip: None,
            branches: Vec::new(),
        }
    }

    /// Pure navigation step (welcome screens, confirmation).
    pub fn navigation(key: StepKey) -> Self {
        Self {
            key,
            answer_key: None,
            validator: ValidatorKind::Passthrough,
            optional: false,
            multi_value: false,
            next: StepTarget::End,
            prev: None,
            skip: None,
            branches: Vec::new(),
        }
    }

    /// Link collector that stays on the step until finished.
    pub fn collector(key: StepKey, answer_key: AnswerKey) -> Self {
        Self {
            multi_value: true,
            ..Self::question(key, answer_key, ValidatorKind::Link)
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn then(mut self, next: StepKey) -> Self {
        self.next = StepTarget::Step(next);
        self
    }

    pub fn finishes(mut self) -> Self {
        self.next = StepTarget::End;
        self
    }

    pub fn back(mut self, prev: StepKey) -> Self {
        self.prev = Some(prev);
        self
    }

    pub fn skip_to(mut self, target: StepKey) -> Self {
        self.skip = Some(StepTarget::Step(target));
        self
    }

    pub fn branch(mut self, when: BranchPredicate, target: StepKey) -> Self {
        self.branches.push(BranchRule {
            when,
            target: StepTarget::Step(target),
        });
        self
    }

    pub fn skip_target(&self) -> StepTarget {
        self.skip.unwrap_or(self.next)
    }

    /// Resolves the forward link for a freshly written value.
    pub fn next_for(&self, value: &AnswerValue) -> StepTarget {
        self.branches
            .iter()
            .find(|rule| rule.when.matches(value))
            .map(|rule| rule.target)
            .unwrap_or(self.next)
    }

    fn targets(&self) -> impl Iterator<Item = (LinkKind, StepTarget)> + '_ {
        std::iter::once((LinkKind::Next, self.next))
            .chain(self.skip.map(|target| (LinkKind::Skip, target)))
            .chain(
                self.prev
                    .map(|prev| (LinkKind::Prev, StepTarget::Step(prev))),
            )
            .chain(
                self.branches
                    .iter()
                    .map(|rule| (LinkKind::Branch, rule.target)),
            )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    Next,
    Prev,
    Skip,
    Branch,
}

impl fmt::Display for LinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LinkKind::Next => "next",
            LinkKind::Prev => "prev",
            LinkKind::Skip => "skip",
            LinkKind::Branch => "branch",
        };
        f.write_str(label)
    }
}

/// Malformed step graph. Fatal at startup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntegrityError {
    #[error("{schema} schema has no steps")]
    Empty { schema: SchemaVersion },
    #[error("{schema} schema defines step '{step}' more than once")]
    DuplicateStep {
        schema: SchemaVersion,
        step: StepKey,
    },
    #[error("{schema} schema stores answer '{answer}' from more than one step")]
    DuplicateAnswerKey {
        schema: SchemaVersion,
        answer: AnswerKey,
    },
    #[error("{schema} schema entry step '{step}' is not defined")]
    MissingEntry {
        schema: SchemaVersion,
        step: StepKey,
    },
    #[error("{schema} schema entry step '{step}' has no forward link to an existing step")]
    BrokenEntryLink {
        schema: SchemaVersion,
        step: StepKey,
    },
    #[error("{schema} schema step '{step}' has a dangling {link} link to '{target}'")]
    DanglingReference {
        schema: SchemaVersion,
        step: StepKey,
        link: String,
        target: StepKey,
    },
    #[error("{schema} schema step '{step}' branches but stores no answer")]
    BranchWithoutAnswer {
        schema: SchemaVersion,
        step: StepKey,
    },
    #[error("{schema} schema multi-value step '{step}' must use the link validator")]
    MultiValueValidator {
        schema: SchemaVersion,
        step: StepKey,
    },
    #[error("{schema} schema forward path from the entry step never reaches the end")]
    Unterminated { schema: SchemaVersion },
    #[error("catalog slot for {expected} received a {found} schema")]
    MisplacedVersion {
        expected: SchemaVersion,
        found: SchemaVersion,
    },
}

/// Immutable, integrity-checked step table for one schema version.
#[derive(Debug, Clone)]
pub struct StepSchema {
    version: SchemaVersion,
    entry: StepKey,
    steps: Vec<StepDefinition>,
    index: HashMap<StepKey, usize>,
}

impl StepSchema {
    pub fn from_steps(
        version: SchemaVersion,
        entry: StepKey,
        steps: Vec<StepDefinition>,
    ) -> Result<Self, IntegrityError> {
        let mut index = HashMap::with_capacity(steps.len());
        for (position, step) in steps.iter().enumerate() {
            if index.insert(step.key, position).is_some() {
                return Err(IntegrityError::DuplicateStep {
                    schema: version,
                    step: step.key,
                });
            }
        }

        let schema = Self {
            version,
            entry,
            steps,
            index,
        };
        schema.validate_integrity()?;
        Ok(schema)
    }

    pub fn legacy() -> Result<Self, IntegrityError> {
        Self::from_steps(SchemaVersion::Legacy, StepKey::Welcome, blueprint::legacy_steps())
    }

    pub fn extended() -> Result<Self, IntegrityError> {
        Self::from_steps(
            SchemaVersion::Extended,
            StepKey::Welcome,
            blueprint::extended_steps(),
        )
    }

    pub fn validate_integrity(&self) -> Result<(), IntegrityError> {
        let schema = self.version;
        if self.steps.is_empty() {
            return Err(IntegrityError::Empty { schema });
        }

        let entry = self.get_step(self.entry).ok_or(IntegrityError::MissingEntry {
            schema,
            step: self.entry,
        })?;
        match entry.next {
            StepTarget::Step(next) if self.index.contains_key(&next) => {}
            _ => {
                return Err(IntegrityError::BrokenEntryLink {
                    schema,
                    step: self.entry,
                })
            }
        }

        let mut answers = HashSet::new();
        for step in &self.steps {
            for (link, target) in step.targets() {
                if let StepTarget::Step(target) = target {
                    if !self.index.contains_key(&target) {
                        return Err(IntegrityError::DanglingReference {
                            schema,
                            step: step.key,
                            link: link.to_string(),
                            target,
                        });
                    }
                }
            }

            if let Some(answer) = step.answer_key {
                if !answers.insert(answer) {
                    return Err(IntegrityError::DuplicateAnswerKey { schema, answer });
                }
            } else if !step.branches.is_empty() {
                return Err(IntegrityError::BranchWithoutAnswer {
                    schema,
                    step: step.key,
                });
            }

            if step.multi_value && step.validator != ValidatorKind::Link {
                return Err(IntegrityError::MultiValueValidator {
                    schema,
                    step: step.key,
                });
            }
        }

        let mut cursor = self.entry;
        for _ in 0..=self.steps.len() {
            match self.get_step(cursor).map(|step| step.next) {
                Some(StepTarget::Step(next)) => cursor = next,
                Some(StepTarget::End) => return Ok(()),
                None => break,
            }
        }

        Err(IntegrityError::Unterminated { schema })
    }

    pub fn version(&self) -> SchemaVersion {
        self.version
    }

    pub fn get_step(&self, key: StepKey) -> Option<&StepDefinition> {
        self.index.get(&key).map(|position| &self.steps[*position])
    }

    pub fn contains(&self, key: StepKey) -> bool {
        self.index.contains_key(&key)
    }

    pub fn first_step(&self) -> &StepDefinition {
        &self.steps[self.index[&self.entry]]
    }

    pub fn steps(&self) -> &[StepDefinition] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// One-based display position. Never used for transitions.
    pub fn position(&self, key: StepKey) -> Option<usize> {
        self.index.get(&key).map(|position| position + 1)
    }

    pub fn defines_answer(&self, answer: AnswerKey) -> bool {
        self.steps
            .iter()
            .any(|step| step.answer_key == Some(answer))
    }

    /// Answer keys submit insists on. Optional steps and link collectors never count.
    pub fn required_answer_keys(&self) -> impl Iterator<Item = AnswerKey> + '_ {
        self.steps
            .iter()
            .filter(|step| !step.optional && !step.multi_value)
            .filter_map(|step| step.answer_key)
    }

    /// Required answers that are absent or neutral, in schema order.
    pub fn missing_answers(&self, answers: &Answers) -> Vec<AnswerKey> {
        self.required_answer_keys()
            .filter(|key| answers.get(key).map_or(true, AnswerValue::is_neutral))
            .collect()
    }

    /// Answer keys present in `answers` that this version does not define.
    pub fn foreign_answers<'a>(
        &'a self,
        answers: &'a Answers,
    ) -> impl Iterator<Item = AnswerKey> + 'a {
        answers
            .keys()
            .copied()
            .filter(move |key| !self.defines_answer(*key))
    }
}

/// Every shipped schema version, validated together at startup.
#[derive(Debug, Clone)]
pub struct SchemaCatalog {
    legacy: StepSchema,
    extended: StepSchema,
}

impl SchemaCatalog {
    pub fn load() -> Result<Self, IntegrityError> {
        Self::new(StepSchema::legacy()?, StepSchema::extended()?)
    }

    pub fn new(legacy: StepSchema, extended: StepSchema) -> Result<Self, IntegrityError> {
        for (expected, schema) in [
            (SchemaVersion::Legacy, &legacy),
            (SchemaVersion::Extended, &extended),
        ] {
            if schema.version() != expected {
                return Err(IntegrityError::MisplacedVersion {
                    expected,
                    found: schema.version(),
                });
            }
        }
        Ok(Self { legacy, extended })
    }

    pub fn get(&self, version: SchemaVersion) -> &StepSchema {
        match version {
            SchemaVersion::Legacy => &self.legacy,
            SchemaVersion::Extended => &self.extended,
        }
    }

    pub fn versions(&self) -> [&StepSchema; 2] {
        [&self.legacy, &self.extended]
    }
}
