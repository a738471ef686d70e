//! Keyword-overlap scorer linking buyer requests to published listings.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Candidates below this score are never returned.
pub const MIN_SCORE: u32 = 10;

const KEYWORD_WEIGHT: u32 = 10;
const KEYWORD_CAP: u32 = 50;
const FIGURE_BONUS: u32 = 20;
const NEGOTIABLE_BONUS: u32 = 10;
const MIN_TOKEN_CHARS: usize = 3;

const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "with", "that", "this", "from", "are", "you", "your", "want", "need",
    "looking", "buy", "any", "какой", "для", "что", "как", "или", "хочу", "нужен", "купить",
];

const NEGOTIABLE_MARKERS: &[&str] = &["negotiable", "договор", "торг"];

/// What a buyer is looking for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuyerRequest {
    pub id: String,
    pub want: String,
    #[serde(default)]
    pub budget: String,
}

/// Searchable projection of a published listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedItem {
    pub id: String,
    pub text: String,
    pub price: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Lead {
    pub request_id: String,
    pub submission_id: String,
    pub score: u32,
    pub created_at: DateTime<Utc>,
}

/// Lowercase alphanumeric tokens of at least three characters, minus stop words.
pub fn keywords(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
        .filter(|token| token.chars().count() >= MIN_TOKEN_CHARS)
        .filter(|token| !STOP_WORDS.contains(&token.as_str()))
        .collect()
}

pub fn score(request: &BuyerRequest, item: &ListedItem) -> u32 {
    let wanted = keywords(&request.want);
    let offered = keywords(&item.text);
    let overlap = wanted.intersection(&offered).count() as u32;
    let keyword_score = (overlap * KEYWORD_WEIGHT).min(KEYWORD_CAP);

    let budget_bonus = if has_figure(&request.budget) && has_figure(&item.price) {
        FIGURE_BONUS
    } else if is_negotiable(&request.budget) || is_negotiable(&item.price) {
        NEGOTIABLE_BONUS
    } else {
        0
    };

    keyword_score + budget_bonus
}

/// Items scoring at least [`MIN_SCORE`], best first. Ties keep a stable id order.
pub fn rank<'a>(request: &BuyerRequest, items: &'a [ListedItem]) -> Vec<(&'a ListedItem, u32)> {
    let mut scored: Vec<_> = items
        .iter()
        .map(|item| (item, score(request, item)))
        .filter(|(_, score)| *score >= MIN_SCORE)
        .collect();
    scored.sort_by(|(a, a_score), (b, b_score)| b_score.cmp(a_score).then_with(|| a.id.cmp(&b.id)));
    scored
}

pub fn leads(request: &BuyerRequest, items: &[ListedItem], now: DateTime<Utc>) -> Vec<Lead> {
    rank(request, items)
        .into_iter()
        .map(|(item, score)| Lead {
            request_id: request.id.clone(),
            submission_id: item.id.clone(),
            score,
            created_at: now,
        })
        .collect()
}

fn has_figure(text: &str) -> bool {
    text.chars().any(|c| c.is_ascii_digit())
}

fn is_negotiable(text: &str) -> bool {
    let lowered = text.to_lowercase();
    NEGOTIABLE_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(want: &str, budget: &str) -> BuyerRequest {
        BuyerRequest {
            id: "req-1".to_string(),
            want: want.to_string(),
            budget: budget.to_string(),
        }
    }

    fn item(id: &str, text: &str, price: &str) -> ListedItem {
        ListedItem {
            id: id.to_string(),
            text: text.to_string(),
            price: price.to_string(),
        }
    }

    #[test]
    fn shared_keywords_score_ten_each() {
        let items = vec![item("sub-1", "Notion database", "")];
        let ranked = rank(&request("notion database", ""), &items);

        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].1, 20);
    }

    #[test]
    fn zero_overlap_is_excluded() {
        let items = vec![item("sub-1", "Telegram bot for cafes", "$900")];
        assert!(rank(&request("notion database", ""), &items).is_empty());
    }

    #[test]
    fn keyword_score_is_capped() {
        let text = "alpha bravo charlie delta echo foxtrot golf";
        assert_eq!(score(&request(text, ""), &item("sub-1", text, "")), 50);
    }

    #[test]
    fn figures_on_both_sides_beat_negotiable() {
        let listing = item("sub-1", "notion template", "$500 negotiable");
        assert_eq!(score(&request("notion", "up to 600"), &listing), 30);
        assert_eq!(score(&request("notion", "flexible"), &listing), 20);
        assert_eq!(
            score(&request("notion", "negotiable"), &item("sub-2", "notion", "")),
            20
        );
    }

    #[test]
    fn short_tokens_and_stop_words_are_ignored() {
        let tokens = keywords("I want the AI app for CRM, Notion!");
        assert_eq!(
            tokens.into_iter().collect::<Vec<_>>(),
            vec!["app".to_string(), "crm".to_string(), "notion".to_string()]
        );
    }

    #[test]
    fn ranking_is_descending() {
        let items = vec![
            item("sub-1", "notion", ""),
            item("sub-2", "notion database crm", ""),
        ];
        let leads = leads(&request("notion database crm", ""), &items, Utc::now());
        assert_eq!(leads[0].submission_id, "sub-2");
        assert_eq!(leads[0].score, 30);
        assert_eq!(leads[1].score, 10);
    }
}
