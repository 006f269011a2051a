//! Linear contact filtering over name, phone and email.

use std::collections::HashSet;

use shared::domain::{Contact, ContactId};

/// Contacts whose name, phone or email contains `query`, ignoring case.
///
/// An empty query keeps the whole collection. Each contact appears at most
/// once and the collection order is preserved.
pub fn filter_contacts(contacts: &[Contact], query: &str) -> Vec<Contact> {
    if query.is_empty() {
        return contacts.to_vec();
    }

    let needle = query.to_lowercase();
    let mut seen: HashSet<ContactId> = HashSet::new();
    contacts
        .iter()
        .filter(|contact| matches_query(contact, &needle))
        .filter(|contact| seen.insert(contact.id))
        .cloned()
        .collect()
}

fn matches_query(contact: &Contact, needle: &str) -> bool {
    contains_ignore_case(&contact.name, needle)
        || contact
            .phone
            .as_deref()
            .is_some_and(|phone| contains_ignore_case(phone, needle))
        || contact
            .email
            .as_deref()
            .is_some_and(|email| contains_ignore_case(email, needle))
}

fn contains_ignore_case(haystack: &str, lowered_needle: &str) -> bool {
    haystack.to_lowercase().contains(lowered_needle)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use shared::domain::{Contact, ContactId};

    use super::filter_contacts;

    fn contact(id: i64, name: &str, phone: &str, email: &str) -> Contact {
        let non_empty = |value: &str| (!value.is_empty()).then(|| value.to_string());
        Contact {
            id: ContactId(id),
            name: name.to_string(),
            phone: non_empty(phone),
            dob: NaiveDate::from_ymd_opt(1990, 1, 1).expect("date"),
            address: None,
            email: non_empty(email),
        }
    }

    fn fixture() -> Vec<Contact> {
        vec![
            contact(1, "Juan Martinez", "3003124341", "jcmartinezcano@gmail.com"),
            contact(2, "Tatiana Jimenez", "3104568945", "tatiana@gmail.com"),
            contact(3, "Mariano Ospina", "3145698413", ""),
            contact(4, "Margarita Rosas", "", "marianita@gmail.com"),
        ]
    }

    fn ids(contacts: &[Contact]) -> Vec<i64> {
        contacts.iter().map(|c| c.id.0).collect()
    }

    #[test]
    fn empty_query_keeps_full_collection() {
        let contacts = fixture();
        assert_eq!(filter_contacts(&contacts, ""), contacts);
    }

    #[test]
    fn gmail_query_skips_contact_without_email() {
        let filtered = filter_contacts(&fixture(), "GMAIL");
        assert_eq!(ids(&filtered), vec![1, 2, 4]);
    }

    #[test]
    fn matches_phone_digits() {
        assert_eq!(ids(&filter_contacts(&fixture(), "3145")), vec![3]);
    }

    #[test]
    fn contact_matching_several_fields_appears_once() {
        let contacts = vec![contact(9, "tatiana", "555", "tatiana@gmail.com")];
        assert_eq!(ids(&filter_contacts(&contacts, "tatiana")), vec![9]);
    }

    #[test]
    fn filtering_is_idempotent() {
        let once = filter_contacts(&fixture(), "mari");
        let twice = filter_contacts(&once, "mari");
        assert_eq!(once, twice);
        assert_eq!(ids(&once), vec![3, 4]);
    }

    #[test]
    fn unmatched_query_yields_empty_view() {
        assert!(filter_contacts(&fixture(), "zzz").is_empty());
    }

    #[test]
    fn address_is_not_searched() {
        let mut contacts = fixture();
        contacts[0].address = Some("Carrera 7".into());
        assert!(filter_contacts(&contacts, "carrera").is_empty());
    }
}
