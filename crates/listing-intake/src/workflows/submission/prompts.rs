//! User-facing copy. Every table is an exhaustive `match`, so adding a step or answer key
//! without its text fails to compile.

use super::domain::{AnswerKey, ChannelPostRef};
use super::schema::StepKey;

pub fn prompt_for(step: StepKey) -> &'static str {
    match step {
        StepKey::Welcome => {
            "Let's describe the project you want to list. Send anything to begin."
        }
        StepKey::Title => "What is the project called? (up to 200 characters)",
        StepKey::Description => "Describe what the project does and who uses it.",
        StepKey::Category => "Which category fits best? (SaaS, bot, mobile app, store, ...)",
        StepKey::ProjectAge => "How old is the project? Include a number, e.g. '8 months'.",
        StepKey::ProductUrl => "Link to the live product (http or https).",
        StepKey::DemoUrl => "Link to a demo or video, or skip.",
        StepKey::HasRevenue => "Does the project earn revenue? (yes / no)",
        StepKey::MonthlyRevenue => "Average monthly revenue, or skip.",
        StepKey::MonthlyUsers => "Monthly active users, or skip.",
        StepKey::TechStack => "Main technologies used, or skip.",
        StepKey::IncludesDomain => "Is a domain included in the sale? (yes / no)",
        StepKey::DomainName => "Which domain is included?",
        StepKey::Screenshots => {
            "Send screenshot links one at a time, then finish when you are done."
        }
        StepKey::Price => "Asking price or range, e.g. '$500-900' or '€2k'.",
        StepKey::Negotiable => "Is the price negotiable? (yes / no)",
        StepKey::SaleReason => "Why are you selling? Optional, skip if you prefer.",
        StepKey::ContactEmail => "E-mail address buyers can reach you at.",
        StepKey::ContactHandle => "Messenger handle for buyers, or skip.",
        StepKey::Confirm => "Check the summary above and confirm to send it for review.",
    }
}

pub fn label_for(answer: AnswerKey) -> &'static str {
    match answer {
        AnswerKey::Title => "Title",
        AnswerKey::Description => "Description",
        AnswerKey::Category => "Category",
        AnswerKey::ProjectAge => "Project age",
        AnswerKey::ProductUrl => "Product",
        AnswerKey::DemoUrl => "Demo",
        AnswerKey::HasRevenue => "Revenue",
        AnswerKey::MonthlyRevenue => "Monthly revenue",
        AnswerKey::MonthlyUsers => "Monthly users",
        AnswerKey::TechStack => "Tech stack",
        AnswerKey::IncludesDomain => "Domain included",
        AnswerKey::DomainName => "Domain",
        AnswerKey::Screenshots => "Screenshots",
        AnswerKey::Price => "Price",
        AnswerKey::Negotiable => "Negotiable",
        AnswerKey::SaleReason => "Reason for sale",
        AnswerKey::ContactEmail => "E-mail",
        AnswerKey::ContactHandle => "Contact",
    }
}

/// Message sent to an owner after a moderation decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnerNotice {
    NeedsFix { title: String, reason: String },
    Rejected { title: String, reason: String },
    Published { title: String, post: ChannelPostRef },
}

impl OwnerNotice {
    pub fn text(&self) -> String {
        match self {
            OwnerNotice::NeedsFix { title, reason } => format!(
                "Your listing \"{title}\" needs changes before it can be published.\n\
                 Moderator comment: {reason}\n\
                 Open the form again to continue where you left off."
            ),
            OwnerNotice::Rejected { title, reason } => format!(
                "Your listing \"{title}\" was rejected.\nReason: {reason}\n\
                 You can reopen it and submit a new version."
            ),
            OwnerNotice::Published { title, post } => format!(
                "Your listing \"{title}\" is live in {} (post {}).",
                post.channel, post.post_id
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notices_mention_the_reason() {
        let notice = OwnerNotice::NeedsFix {
            title: "Notion CRM".to_string(),
            reason: "add screenshots".to_string(),
        };
        let text = notice.text();
        assert!(text.contains("Notion CRM"));
        assert!(text.contains("add screenshots"));
    }

    #[test]
    fn published_notice_names_the_post() {
        let notice = OwnerNotice::Published {
            title: "Notion CRM".to_string(),
            post: ChannelPostRef {
                channel: "@listings".to_string(),
                post_id: "42".to_string(),
            },
        };
        assert!(notice.text().contains("@listings"));
        assert!(notice.text().contains("42"));
    }
}
