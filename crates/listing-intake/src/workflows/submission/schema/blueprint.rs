use super::super::domain::AnswerKey;
use super::super::validators::ValidatorKind;
use super::{BranchPredicate, StepDefinition, StepKey};

const TITLE_MAX: usize = 200;
const DESCRIPTION_MAX: usize = 1_500;
const CATEGORY_MAX: usize = 64;
const PROJECT_AGE_MAX: usize = 60;
const NOTES_MAX: usize = 500;
const HANDLE_MAX: usize = 64;
const DOMAIN_MAX: usize = 253;

/// Flat seven-step form used by early records.
pub(super) fn legacy_steps() -> Vec<StepDefinition> {
    vec![
        StepDefinition::navigation(StepKey::Welcome).then(StepKey::Title),
        StepDefinition::question(
            StepKey::Title,
            AnswerKey::Title,
            ValidatorKind::BoundedText { max: TITLE_MAX },
        )
        .back(StepKey::Welcome)
        .then(StepKey::Description),
        StepDefinition::question(
            StepKey::Description,
            AnswerKey::Description,
            ValidatorKind::BoundedText {
                max: DESCRIPTION_MAX,
            },
        )
        .back(StepKey::Title)
        .then(StepKey::ProductUrl),
        StepDefinition::question(
            StepKey::ProductUrl,
            AnswerKey::ProductUrl,
            ValidatorKind::AbsoluteUrl,
        )
        .back(StepKey::Description)
        .then(StepKey::Price),
        StepDefinition::question(StepKey::Price, AnswerKey::Price, ValidatorKind::PriceRange)
            .back(StepKey::ProductUrl)
            .then(StepKey::ContactEmail),
        StepDefinition::question(
            StepKey::ContactEmail,
            AnswerKey::ContactEmail,
            ValidatorKind::Email,
        )
        .back(StepKey::Price)
        .then(StepKey::Confirm),
        StepDefinition::navigation(StepKey::Confirm)
            .back(StepKey::ContactEmail)
            .finishes(),
    ]
}

/// Twenty-step branching form. Steps reachable only through a branch are optional so the
/// completeness check never depends on which branch was taken.
pub(super) fn extended_steps() -> Vec<StepDefinition> {
    vec![
        StepDefinition::navigation(StepKey::Welcome).then(StepKey::Title),
        StepDefinition::question(
            StepKey::Title,
            AnswerKey::Title,
            ValidatorKind::BoundedText { max: TITLE_MAX },
        )
        .back(StepKey::Welcome)
        .then(StepKey::Description),
        StepDefinition::question(
            StepKey::Description,
            AnswerKey::Description,
            ValidatorKind::BoundedText {
                max: DESCRIPTION_MAX,
            },
        )
        .back(StepKey::Title)
        .then(StepKey::Category),
        StepDefinition::question(
            StepKey::Category,
            AnswerKey::Category,
            ValidatorKind::BoundedText { max: CATEGORY_MAX },
        )
        .back(StepKey::Description)
        .then(StepKey::ProjectAge),
        StepDefinition::question(
            StepKey::ProjectAge,
            AnswerKey::ProjectAge,
            ValidatorKind::TextWithDigit {
                max: PROJECT_AGE_MAX,
            },
        )
        .back(StepKey::Category)
        .then(StepKey::ProductUrl),
        StepDefinition::question(
            StepKey::ProductUrl,
            AnswerKey::ProductUrl,
            ValidatorKind::AbsoluteUrl,
        )
        .back(StepKey::ProjectAge)
        .then(StepKey::DemoUrl),
        StepDefinition::question(StepKey::DemoUrl, AnswerKey::DemoUrl, ValidatorKind::OptionalUrl)
            .optional()
            .back(StepKey::ProductUrl)
            .then(StepKey::HasRevenue),
        StepDefinition::question(StepKey::HasRevenue, AnswerKey::HasRevenue, ValidatorKind::YesNo)
            .back(StepKey::DemoUrl)
            .then(StepKey::MonthlyRevenue)
            .branch(BranchPredicate::Flag(false), StepKey::MonthlyUsers),
        StepDefinition::question(
            StepKey::MonthlyRevenue,
            AnswerKey::MonthlyRevenue,
            ValidatorKind::OptionalCount,
        )
        .optional()
        .back(StepKey::HasRevenue)
        .then(StepKey::MonthlyUsers),
        StepDefinition::question(
            StepKey::MonthlyUsers,
            AnswerKey::MonthlyUsers,
            ValidatorKind::OptionalCount,
        )
        .optional()
        .back(StepKey::HasRevenue)
        .then(StepKey::TechStack),
        StepDefinition::question(
            StepKey::TechStack,
            AnswerKey::TechStack,
            ValidatorKind::FreeText { max: NOTES_MAX },
        )
        .optional()
        .back(StepKey::MonthlyUsers)
        .then(StepKey::IncludesDomain),
        StepDefinition::question(
            StepKey::IncludesDomain,
            AnswerKey::IncludesDomain,
            ValidatorKind::YesNo,
        )
        .back(StepKey::TechStack)
        .then(StepKey::DomainName)
        .branch(BranchPredicate::Flag(false), StepKey::Screenshots),
        StepDefinition::question(
            StepKey::DomainName,
            AnswerKey::DomainName,
            ValidatorKind::BoundedText { max: DOMAIN_MAX },
        )
        .optional()
        .back(StepKey::IncludesDomain)
        .then(StepKey::Screenshots),
        StepDefinition::collector(StepKey::Screenshots, AnswerKey::Screenshots)
            .optional()
            .back(StepKey::IncludesDomain)
            .then(StepKey::Price),
        StepDefinition::question(StepKey::Price, AnswerKey::Price, ValidatorKind::PriceRange)
            .back(StepKey::Screenshots)
            .then(StepKey::Negotiable),
        StepDefinition::question(StepKey::Negotiable, AnswerKey::Negotiable, ValidatorKind::YesNo)
            .back(StepKey::Price)
            .then(StepKey::SaleReason),
        StepDefinition::question(
            StepKey::SaleReason,
            AnswerKey::SaleReason,
            ValidatorKind::FreeText { max: NOTES_MAX },
        )
        .optional()
        .back(StepKey::Negotiable)
        .then(StepKey::ContactEmail),
        StepDefinition::question(
            StepKey::ContactEmail,
            AnswerKey::ContactEmail,
            ValidatorKind::Email,
        )
        .back(StepKey::SaleReason)
        .then(StepKey::ContactHandle),
        StepDefinition::question(
            StepKey::ContactHandle,
            AnswerKey::ContactHandle,
            ValidatorKind::BoundedText { max: HANDLE_MAX },
        )
        .optional()
        .back(StepKey::ContactEmail)
        .then(StepKey::Confirm),
        StepDefinition::navigation(StepKey::Confirm)
            .back(StepKey::ContactHandle)
            .finishes(),
    ]
}
