//! Pure input normalization for wizard steps.
//!
//! Every validator is total: malformed input yields a [`ValidationErrorKind`], never a panic.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use url::Url;

use super::domain::{AnswerKey, AnswerValue, Currency, PriceRange};
use super::schema::StepKey;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}$").expect("email pattern")
});

static CURRENCY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)usd|eur|rub|руб\.?|\$|€|₽").expect("currency pattern"));

static PRICE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:from\s+|от\s+)?(?P<first>\d[\d ,_\x{a0}]*?)\s*(?P<first_k>[kк])?\s*(?:(?:-|–|—|to|до)\s*(?P<second>\d[\d ,_\x{a0}]*?)\s*(?P<second_k>[kк])?)?$",
    )
    .expect("price pattern")
});

const YES_TOKENS: &[&str] = &["yes", "y", "yep", "true", "1", "+", "да", "д", "ага"];
const NO_TOKENS: &[&str] = &["no", "n", "nope", "false", "0", "-", "нет", "н"];
const BLANK_TOKENS: &[&str] = &["", "-", "—", "skip", "пропустить"];

/// Validator reference attached to each step definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "validator", rename_all = "snake_case")]
pub enum ValidatorKind {
    /// Navigation steps accept any input.
    Passthrough,
    BoundedText { max: usize },
    AbsoluteUrl,
    OptionalUrl,
    FreeText { max: usize },
    YesNo,
    OptionalCount,
    PriceRange,
    TextWithDigit { max: usize },
    Email,
    /// One item of a multi-value link collector.
    Link,
}

/// Typed reason an input was refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationErrorKind {
    #[error("a value is required")]
    Empty,
    #[error("value is too long ({found} characters, limit {max})")]
    TooLong { max: usize, found: usize },
    #[error("not an absolute URL")]
    InvalidUrl,
    #[error("unsupported URL scheme '{scheme}' (http or https only)")]
    UnsupportedScheme { scheme: String },
    #[error("expected a yes or no answer")]
    UnrecognizedToken,
    #[error("expected a non-negative whole number")]
    InvalidNumber,
    #[error("expected a price or price range such as '$500-900'")]
    InvalidPriceRange,
    #[error("value must contain at least one digit")]
    MissingDigit,
    #[error("not a valid e-mail address")]
    InvalidEmail,
    #[error("no more than {max} items may be collected")]
    TooManyItems { max: usize },
}

/// Validation failure bound to the step and field it was raised for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("invalid input for {step}: {kind}")]
pub struct ValidationError {
    pub step: StepKey,
    pub field: Option<AnswerKey>,
    pub kind: ValidationErrorKind,
}

impl ValidatorKind {
    pub fn validate(self, raw: &str) -> Result<AnswerValue, ValidationErrorKind> {
        let trimmed = raw.trim();
        match self {
            ValidatorKind::Passthrough => Ok(AnswerValue::Text(trimmed.to_string())),
            ValidatorKind::BoundedText { max } => bounded_text(trimmed, max),
            ValidatorKind::AbsoluteUrl | ValidatorKind::Link => absolute_url(trimmed),
            ValidatorKind::OptionalUrl => {
                if is_blank(trimmed) {
                    Ok(AnswerValue::Skipped)
                } else {
                    absolute_url(trimmed)
                }
            }
            ValidatorKind::FreeText { max } => {
                check_length(trimmed, max)?;
                Ok(AnswerValue::Text(trimmed.to_string()))
            }
            ValidatorKind::YesNo => parse_yes_no(trimmed).map(AnswerValue::Flag),
            ValidatorKind::OptionalCount => {
                if is_blank(trimmed) {
                    Ok(AnswerValue::Skipped)
                } else {
                    parse_grouped_number(trimmed)
                        .map(AnswerValue::Number)
                        .ok_or(ValidationErrorKind::InvalidNumber)
                }
            }
            ValidatorKind::PriceRange => parse_price_range(trimmed).map(AnswerValue::PriceRange),
            ValidatorKind::TextWithDigit { max } => {
                let value = bounded_text(trimmed, max)?;
                if trimmed.chars().any(|c| c.is_ascii_digit()) {
                    Ok(value)
                } else {
                    Err(ValidationErrorKind::MissingDigit)
                }
            }
            ValidatorKind::Email => {
                if trimmed.is_empty() {
                    Err(ValidationErrorKind::Empty)
                } else if EMAIL_RE.is_match(trimmed) {
                    Ok(AnswerValue::Text(trimmed.to_lowercase()))
                } else {
                    Err(ValidationErrorKind::InvalidEmail)
                }
            }
        }
    }
}

fn is_blank(trimmed: &str) -> bool {
    BLANK_TOKENS
        .iter()
        .any(|token| trimmed.to_lowercase() == *token)
}

fn check_length(trimmed: &str, max: usize) -> Result<(), ValidationErrorKind> {
    let found = trimmed.chars().count();
    if found > max {
        return Err(ValidationErrorKind::TooLong { max, found });
    }
    Ok(())
}

fn bounded_text(trimmed: &str, max: usize) -> Result<AnswerValue, ValidationErrorKind> {
    if trimmed.is_empty() {
        return Err(ValidationErrorKind::Empty);
    }
    check_length(trimmed, max)?;
    Ok(AnswerValue::Text(trimmed.to_string()))
}

fn absolute_url(trimmed: &str) -> Result<AnswerValue, ValidationErrorKind> {
    if trimmed.is_empty() {
        return Err(ValidationErrorKind::Empty);
    }

    let parsed = Url::parse(trimmed).map_err(|_| ValidationErrorKind::InvalidUrl)?;
    match parsed.scheme() {
        "http" | "https" => {}
        other => {
            return Err(ValidationErrorKind::UnsupportedScheme {
                scheme: other.to_string(),
            })
        }
    }

    match parsed.host_str() {
        Some(host) if !host.is_empty() => Ok(AnswerValue::Url(parsed.to_string())),
        _ => Err(ValidationErrorKind::InvalidUrl),
    }
}

fn parse_yes_no(trimmed: &str) -> Result<bool, ValidationErrorKind> {
    let token = trimmed
        .trim_end_matches(|c| c == '.' || c == '!')
        .trim()
        .to_lowercase();

    if YES_TOKENS.contains(&token.as_str()) {
        Ok(true)
    } else if NO_TOKENS.contains(&token.as_str()) {
        Ok(false)
    } else {
        Err(ValidationErrorKind::UnrecognizedToken)
    }
}

fn parse_grouped_number(raw: &str) -> Option<u64> {
    let digits: String = raw
        .chars()
        .filter(|c| !matches!(c, ' ' | '_' | ',' | '\u{a0}'))
        .collect();

    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    digits.parse::<u64>().ok()
}

fn parse_price_range(trimmed: &str) -> Result<PriceRange, ValidationErrorKind> {
    if trimmed.is_empty() {
        return Err(ValidationErrorKind::Empty);
    }

    let mut currency: Option<Currency> = None;
    for found in CURRENCY_RE.find_iter(trimmed) {
        let detected = currency_for(found.as_str());
        match currency {
            Some(existing) if existing != detected => {
                return Err(ValidationErrorKind::InvalidPriceRange)
            }
            _ => currency = Some(detected),
        }
    }

    let stripped = CURRENCY_RE.replace_all(trimmed, " ").to_lowercase();
    let captures = PRICE_RE
        .captures(stripped.trim())
        .ok_or(ValidationErrorKind::InvalidPriceRange)?;

    let first = captures
        .name("first")
        .and_then(|m| scaled_amount(m.as_str(), captures.name("first_k").is_some()))
        .ok_or(ValidationErrorKind::InvalidPriceRange)?;

    let second = match captures.name("second") {
        Some(m) => scaled_amount(m.as_str(), captures.name("second_k").is_some())
            .ok_or(ValidationErrorKind::InvalidPriceRange)?,
        None => first,
    };

    Ok(PriceRange::new(
        currency.unwrap_or(Currency::Usd),
        first,
        second,
    ))
}

fn currency_for(token: &str) -> Currency {
    match token.to_lowercase().as_str() {
        "eur" | "€" => Currency::Eur,
        "rub" | "₽" | "руб" | "руб." => Currency::Rub,
        _ => Currency::Usd,
    }
}

fn scaled_amount(raw: &str, thousands: bool) -> Option<u64> {
    let amount = parse_grouped_number(raw.trim())?;
    if thousands {
        amount.checked_mul(1_000)
    } else {
        Some(amount)
    }
}
