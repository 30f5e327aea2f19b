//! Field validation shared by registration, family management and intake.
//!
//! Validators return the normalised value on success so callers store
//! exactly what was checked.

use chrono::{Datelike, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{CareError, CareResult};

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("Invalid regex pattern for email")
});

static POSTAL_CODE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9 \-]{1,8}[A-Za-z0-9]$")
        .expect("Invalid regex pattern for postal code")
});

pub const MIN_PASSWORD_LEN: usize = 8;

/// Trimmed text of 1..=`max` characters.
pub fn text(field: &str, value: &str, max: usize) -> CareResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CareError::validation(format!("{field} is required")));
    }
    if trimmed.chars().count() > max {
        return Err(CareError::validation(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(trimmed.to_string())
}

/// Optional text; blank input reads as absent.
pub fn optional_text(field: &str, value: Option<&str>, max: usize) -> CareResult<Option<String>> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) => text(field, v, max).map(Some),
    }
}

pub fn name(field: &str, value: &str) -> CareResult<String> {
    text(field, value, 100)
}

/// Lowercased email address.
pub fn email(value: &str) -> CareResult<String> {
    let trimmed = value.trim();
    if trimmed.len() > 254 || !EMAIL_PATTERN.is_match(trimmed) {
        return Err(CareError::validation("email is not a valid address"));
    }
    Ok(trimmed.to_lowercase())
}

pub fn password(value: &str) -> CareResult<()> {
    if value.chars().count() < MIN_PASSWORD_LEN {
        return Err(CareError::validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Phone number reduced to its digits (10 to 15 of them).
///
/// Separators and a leading `+` are accepted and dropped.
pub fn phone(value: &str) -> CareResult<String> {
    let trimmed = value.trim();
    let allowed = |c: char| c.is_ascii_digit() || " -().+".contains(c);
    if !trimmed.chars().all(allowed) {
        return Err(CareError::validation("phone contains invalid characters"));
    }
    let digits: String = trimmed.chars().filter(char::is_ascii_digit).collect();
    if !(10..=15).contains(&digits.len()) {
        return Err(CareError::validation("phone must have 10 to 15 digits"));
    }
    Ok(digits)
}

/// Calendar date `YYYY-MM-DD`, not in the future and not before 1900.
pub fn date_of_birth(value: &str) -> CareResult<String> {
    let date = NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| CareError::validation("date_of_birth must be YYYY-MM-DD"))?;
    if date > Utc::now().date_naive() {
        return Err(CareError::validation("date_of_birth is in the future"));
    }
    if date.year() < 1900 {
        return Err(CareError::validation("date_of_birth is before 1900"));
    }
    Ok(date.format("%Y-%m-%d").to_string())
}

/// Optional number within an inclusive range.
pub fn optional_range(field: &str, value: Option<f64>, min: f64, max: f64) -> CareResult<()> {
    match value {
        Some(v) if !v.is_finite() || v < min || v > max => Err(CareError::validation(format!(
            "{field} must be between {min} and {max}"
        ))),
        _ => Ok(()),
    }
}

/// Uppercased postal code.
pub fn postal_code(value: &str) -> CareResult<String> {
    let trimmed = value.trim();
    if !POSTAL_CODE_PATTERN.is_match(trimmed) {
        return Err(CareError::validation(
            "postal_code must be 3 to 10 letters, digits, spaces or dashes",
        ));
    }
    Ok(trimmed.to_uppercase())
}

/// List of at most `max_items` entries of 1..=`max_len` characters each.
/// Blank entries are dropped.
pub fn entries(
    field: &str,
    values: &[String],
    max_items: usize,
    max_len: usize,
) -> CareResult<Vec<String>> {
    let cleaned: Vec<String> = values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect();
    if cleaned.len() > max_items {
        return Err(CareError::validation(format!(
            "{field} accepts at most {max_items} entries"
        )));
    }
    if cleaned.iter().any(|v| v.chars().count() > max_len) {
        return Err(CareError::validation(format!(
            "{field} entries must be at most {max_len} characters"
        )));
    }
    Ok(cleaned)
}
