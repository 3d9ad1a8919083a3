//! Individual field rules

use std::ops::RangeInclusive;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

/// Accepted ages, inclusive
pub const AGE_RANGE: RangeInclusive<u32> = 10..=100;

/// Digits a phone number carries once spaces and `+` are removed
pub const PHONE_DIGITS: usize = 13;

/// Hours (JKEM) a single logbook activity may claim
pub const LOG_HOURS_RANGE: RangeInclusive<u32> = 1..=24;

pub const GENDERS: &[&str] = &["Male", "Female"];

pub const EDUCATION_LEVELS: &[&str] = &[
    "Elementary School",
    "Junior High School",
    "Senior High School",
    "Diploma",
    "Bachelor's Degree",
    "Master's Degree",
    "Doctoral Degree",
];

pub const LOG_STATUSES: &[&str] = &["Rencana", "Berlangsung", "Selesai", "Dibatalkan"];

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[\w.-]+@[\w.-]+\.\w+$").expect("email pattern is a valid regex")
});

pub(crate) fn is_present(raw: &str) -> bool {
    !raw.trim().is_empty()
}

pub(crate) fn is_valid_email(raw: &str) -> bool {
    let email = raw.trim();
    EMAIL_PATTERN.is_match(email) && email.ends_with(".com")
}

/// Parse an all-digit age inside [`AGE_RANGE`]
pub fn parse_age(raw: &str) -> Option<u32> {
    parse_digits(raw).filter(|age| AGE_RANGE.contains(age))
}

/// Strip spaces and `+` signs from a phone number
pub fn clean_phone(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|c| *c != ' ' && *c != '+')
        .collect()
}

pub(crate) fn is_valid_phone(raw: &str) -> bool {
    let cleaned = clean_phone(raw);
    cleaned.len() == PHONE_DIGITS && cleaned.bytes().all(|b| b.is_ascii_digit())
}

pub fn is_known_gender(raw: &str) -> bool {
    GENDERS.contains(&raw.trim())
}

pub fn is_known_education(raw: &str) -> bool {
    EDUCATION_LEVELS.contains(&raw.trim())
}

pub fn is_known_log_status(raw: &str) -> bool {
    LOG_STATUSES.contains(&raw.trim())
}

/// Non-negative integer quantity; blank means the default of zero
pub fn parse_quantity(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Some(0);
    }
    raw.parse::<i64>().ok().filter(|q| *q >= 0)
}

/// Non-negative finite price; blank means the default of zero
pub fn parse_price(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Some(0.0);
    }
    raw.parse::<f64>()
        .ok()
        .filter(|p| p.is_finite() && *p >= 0.0)
}

pub fn parse_log_hours(raw: &str) -> Option<u32> {
    parse_digits(raw).filter(|h| LOG_HOURS_RANGE.contains(h))
}

/// Logbook dates travel as `YYYY-MM-DD`
pub fn parse_log_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

fn parse_digits(raw: &str) -> Option<u32> {
    let raw = raw.trim();
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse::<u32>().ok()
}
