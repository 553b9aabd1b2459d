use atoll_core::{TravelerField, Violation, ViolationReason};
use atoll_domain::{Gender, TravelerDetail};
use chrono::NaiveDate;
use regex::Regex;
use std::str::FromStr;
use std::sync::OnceLock;

fn email_pattern() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").expect("email pattern")
    })
}

fn phone_pattern() -> &'static Regex {
    static PHONE: OnceLock<Regex> = OnceLock::new();
    // Digits and dashes, 8-20 chars, starting and ending on a digit.
    PHONE.get_or_init(|| Regex::new(r"^[0-9][0-9-]{6,18}[0-9]$").expect("phone pattern"))
}

/// Validates per-traveler records for a booking request.
///
/// Pure: the reference date is an explicit argument, and every record is
/// checked independently so one bad field never hides another. The caller is
/// responsible for the non-empty / count-matches constraint.
pub struct TravelerDetailValidator;

impl TravelerDetailValidator {
    pub fn validate(details: &[TravelerDetail], today: NaiveDate) -> Result<(), Vec<Violation>> {
        let mut violations = Vec::new();

        for (index, detail) in details.iter().enumerate() {
            if detail.name.trim().is_empty() {
                violations.push(Violation::new(index, TravelerField::Name, ViolationReason::Blank));
            }

            if detail.email.trim().is_empty() {
                violations.push(Violation::new(index, TravelerField::Email, ViolationReason::Blank));
            } else if !email_pattern().is_match(detail.email.trim()) {
                violations.push(Violation::new(
                    index,
                    TravelerField::Email,
                    ViolationReason::BadFormat,
                ));
            }

            if detail.phone.trim().is_empty() {
                violations.push(Violation::new(index, TravelerField::Phone, ViolationReason::Blank));
            } else if !phone_pattern().is_match(detail.phone.trim()) {
                violations.push(Violation::new(
                    index,
                    TravelerField::Phone,
                    ViolationReason::BadFormat,
                ));
            }

            if detail.passport_number.trim().is_empty() {
                violations.push(Violation::new(
                    index,
                    TravelerField::PassportNumber,
                    ViolationReason::Blank,
                ));
            }

            match NaiveDate::parse_from_str(detail.birth_date.trim(), "%Y-%m-%d") {
                Ok(date) if date < today => {}
                Ok(_) => violations.push(Violation::new(
                    index,
                    TravelerField::BirthDate,
                    ViolationReason::NotInPast,
                )),
                Err(_) => violations.push(Violation::new(
                    index,
                    TravelerField::BirthDate,
                    ViolationReason::NotADate,
                )),
            }

            if Gender::from_str(&detail.gender).is_err() {
                violations.push(Violation::new(
                    index,
                    TravelerField::Gender,
                    ViolationReason::UnknownValue,
                ));
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }
}
