//! Field constraints for the contact working copy.

use std::{fmt, sync::LazyLock};

use chrono::{DateTime, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{ContactDraft, ContactForm, DOB_FORMAT};

const EMAIL_MAX_LEN: usize = 254;
const EMAIL_LOCAL_PART_MAX_LEN: usize = 64;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9!#$%&'*+/=?^_`{|}~-]+(?:\.[a-zA-Z0-9!#$%&'*+/=?^_`{|}~-]+)*@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
    )
    .expect("valid email regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactField {
    Name,
    Phone,
    Dob,
    Address,
    Email,
}

impl fmt::Display for ContactField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Name => "name",
            Self::Phone => "phone",
            Self::Dob => "dob",
            Self::Address => "address",
            Self::Email => "email",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldErrorKind {
    Required,
    InvalidEmail,
    InvalidDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: ContactField,
    pub kind: FieldErrorKind,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            FieldErrorKind::Required => write!(f, "{} is required", self.field),
            FieldErrorKind::InvalidEmail => write!(f, "{} is not a valid email address", self.field),
            FieldErrorKind::InvalidDate => write!(f, "{} is not a valid date", self.field),
        }
    }
}

/// Every failing field of one validation pass.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{}", render_errors(.errors))]
pub struct ValidationErrors {
    pub errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn has(&self, field: ContactField, kind: FieldErrorKind) -> bool {
        self.errors
            .iter()
            .any(|err| err.field == field && err.kind == kind)
    }
}

fn render_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Parses a date of birth given as `YYYY-MM-DD` or as an RFC 3339 timestamp.
///
/// Timestamps keep the calendar date of their own offset, so
/// `1988-06-25T05:00:00.000Z` is 1988-06-25.
pub fn parse_dob(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, DOB_FORMAT) {
        return Some(date);
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|timestamp| timestamp.date_naive())
}

pub fn is_valid_email(raw: &str) -> bool {
    if raw.len() > EMAIL_MAX_LEN {
        return false;
    }
    let Some((local, _domain)) = raw.split_once('@') else {
        return false;
    };
    if local.is_empty() || local.len() > EMAIL_LOCAL_PART_MAX_LEN {
        return false;
    }
    EMAIL_RE.is_match(raw)
}

/// Checks the working copy and converts it into a draft.
///
/// Blank optional fields become `None`; non-blank values are kept verbatim.
pub fn validate_form(form: &ContactForm) -> Result<ContactDraft, ValidationErrors> {
    let mut errors = Vec::new();

    if form.name.trim().is_empty() {
        errors.push(FieldError {
            field: ContactField::Name,
            kind: FieldErrorKind::Required,
        });
    }

    let dob = if form.dob.trim().is_empty() {
        errors.push(FieldError {
            field: ContactField::Dob,
            kind: FieldErrorKind::Required,
        });
        None
    } else {
        let parsed = parse_dob(&form.dob);
        if parsed.is_none() {
            errors.push(FieldError {
                field: ContactField::Dob,
                kind: FieldErrorKind::InvalidDate,
            });
        }
        parsed
    };

    let email = optional(&form.email);
    if let Some(email) = email.as_deref() {
        if !is_valid_email(email) {
            errors.push(FieldError {
                field: ContactField::Email,
                kind: FieldErrorKind::InvalidEmail,
            });
        }
    }

    match dob {
        Some(dob) if errors.is_empty() => Ok(ContactDraft {
            name: form.name.clone(),
            phone: optional(&form.phone),
            dob,
            address: optional(&form.address),
            email,
        }),
        _ => Err(ValidationErrors { errors }),
    }
}

fn optional(raw: &str) -> Option<String> {
    if raw.trim().is_empty() {
        None
    } else {
        Some(raw.to_string())
    }
}

#[cfg(test)]
#[path = "tests/validation_tests.rs"]
mod tests;
