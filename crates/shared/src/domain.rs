use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(ContactId);

/// Date format used when a date of birth is rendered into a form field.
pub const DOB_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub id: ContactId,
    pub name: String,
    pub phone: Option<String>,
    pub dob: NaiveDate,
    pub address: Option<String>,
    pub email: Option<String>,
}

impl Contact {
    pub fn from_draft(id: ContactId, draft: ContactDraft) -> Self {
        Self {
            id,
            name: draft.name,
            phone: blank_to_none(draft.phone),
            dob: draft.dob,
            address: blank_to_none(draft.address),
            email: blank_to_none(draft.email),
        }
    }

    /// Replaces every mutable field; `id` is kept.
    pub fn apply_draft(&mut self, draft: ContactDraft) {
        *self = Self::from_draft(self.id, draft);
    }

    /// Blank optional fields become `None`, the only value a form can
    /// reproduce for them.
    pub fn normalized(self) -> Self {
        let id = self.id;
        Self::from_draft(id, self.to_draft())
    }

    pub fn to_draft(&self) -> ContactDraft {
        ContactDraft {
            name: self.name.clone(),
            phone: self.phone.clone(),
            dob: self.dob,
            address: self.address.clone(),
            email: self.email.clone(),
        }
    }

}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Contact fields without identity; input of store create/update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactDraft {
    pub name: String,
    pub phone: Option<String>,
    pub dob: NaiveDate,
    pub address: Option<String>,
    pub email: Option<String>,
}

/// Raw form values staged by the controller while viewing, editing or adding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactForm {
    pub name: String,
    pub phone: String,
    pub dob: String,
    pub address: String,
    pub email: String,
}

impl ContactForm {
    pub fn from_contact(contact: &Contact) -> Self {
        Self {
            name: contact.name.clone(),
            phone: contact.phone.clone().unwrap_or_default(),
            dob: contact.dob.format(DOB_FORMAT).to_string(),
            address: contact.address.clone().unwrap_or_default(),
            email: contact.email.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    None,
    Viewing,
    Editing,
    Adding,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::None => "none",
            Self::Viewing => "viewing",
            Self::Editing => "editing",
            Self::Adding => "adding",
        };
        f.write_str(label)
    }
}

/// Whole calendar years elapsed from `dob` to `today`.
///
/// A birthday not yet reached in `today`'s year does not count, so a date of
/// birth one day short of N years yields N-1. Dates in the future yield 0.
pub fn years_between(dob: NaiveDate, today: NaiveDate) -> u32 {
    if today <= dob {
        return 0;
    }
    let mut years = today.year() - dob.year();
    if (today.month(), today.day()) < (dob.month(), dob.day()) {
        years -= 1;
    }
    u32::try_from(years).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn years_between_counts_birthday_on_the_day() {
        assert_eq!(years_between(date(2000, 3, 15), date(2030, 3, 15)), 30);
    }

    #[test]
    fn years_between_is_calendar_aware_one_day_short() {
        assert_eq!(years_between(date(2000, 3, 15), date(2030, 3, 14)), 29);
    }

    #[test]
    fn years_between_handles_leap_day_birthdays() {
        assert_eq!(years_between(date(2000, 2, 29), date(2001, 2, 28)), 0);
        assert_eq!(years_between(date(2000, 2, 29), date(2001, 3, 1)), 1);
        assert_eq!(years_between(date(2000, 2, 29), date(2004, 2, 29)), 4);
    }

    #[test]
    fn years_between_future_dob_is_zero() {
        assert_eq!(years_between(date(2040, 1, 1), date(2030, 1, 1)), 0);
    }

    #[test]
    fn form_renders_absent_fields_as_empty_strings() {
        let contact = Contact {
            id: ContactId(7),
            name: "Margarita Rosas".into(),
            phone: None,
            dob: date(1967, 3, 9),
            address: Some("Carrera 98 127 60".into()),
            email: None,
        };
        let form = ContactForm::from_contact(&contact);
        assert_eq!(form.phone, "");
        assert_eq!(form.email, "");
        assert_eq!(form.dob, "1967-03-09");
    }

    #[test]
    fn blank_optional_fields_normalize_to_none() {
        let contact = Contact {
            id: ContactId(3),
            name: "Mariano Ospina".into(),
            phone: Some("3145698413".into()),
            dob: date(1961, 3, 16),
            address: Some("   ".into()),
            email: Some(String::new()),
        }
        .normalized();
        assert_eq!(contact.phone.as_deref(), Some("3145698413"));
        assert_eq!(contact.address, None);
        assert_eq!(contact.email, None);
    }

    #[test]
    fn apply_draft_keeps_identity() {
        let mut contact = Contact {
            id: ContactId(3),
            name: "old".into(),
            phone: None,
            dob: date(1990, 1, 1),
            address: None,
            email: None,
        };
        let mut draft = contact.to_draft();
        draft.name = "new".into();
        contact.apply_draft(draft);
        assert_eq!(contact.id, ContactId(3));
        assert_eq!(contact.name, "new");
    }
}
