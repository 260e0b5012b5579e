// Birthdate parsing and age calculation

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use std::sync::OnceLock;

use crate::users::error::UserError;

const BIRTHDATE_FORMAT: &str = "%d.%m.%Y";

fn birthdate_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\d{2}\.\d{2}\.\d{4}$").expect("valid birthdate regex"))
}

/// Parse a strict `DD.MM.YYYY` birthdate
pub fn parse_birthdate(input: &str) -> Result<NaiveDate, UserError> {
    let input = input.trim();
    if !birthdate_pattern().is_match(input) {
        return Err(UserError::InvalidBirthdate);
    }
    NaiveDate::parse_from_str(input, BIRTHDATE_FORMAT).map_err(|_| UserError::InvalidBirthdate)
}

/// Whole years between `birthdate` and `today`, minus one if this year's
/// birthday has not happened yet
pub fn calculate_age(birthdate: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - birthdate.year();
    if (today.month(), today.day()) < (birthdate.month(), birthdate.day()) {
        age -= 1;
    }
    age
}

/// Parse a birthdate and derive the age, rejecting dates after `today`
pub fn age_from_birthdate(input: &str, today: NaiveDate) -> Result<i32, UserError> {
    let birthdate = parse_birthdate(input)?;
    if birthdate > today {
        return Err(UserError::FutureBirthdate);
    }
    Ok(calculate_age(birthdate, today))
}
