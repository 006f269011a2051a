use super::*;

fn draft(name: &str) -> ContactDraft {
    ContactDraft {
        name: name.to_string(),
        phone: None,
        dob: NaiveDate::from_ymd_opt(2000, 1, 1).expect("date"),
        address: None,
        email: None,
    }
}

fn seeded() -> InMemoryContactStore {
    InMemoryContactStore::with_contacts(Duration::ZERO, demo_contacts()).expect("seed")
}

#[tokio::test]
async fn fetch_all_returns_collection_in_insertion_order() {
    let store = seeded();
    let contacts = store.fetch_all().await.expect("fetch");
    let names: Vec<_> = contacts.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(
        names,
        ["Juan Martinez", "Tatiana Jimenez", "Mariano Ospina", "Margarita Rosas"]
    );
}

#[tokio::test(start_paused = true)]
async fn fetch_all_waits_for_simulated_latency() {
    let store = InMemoryContactStore::with_contacts(DEFAULT_LATENCY, demo_contacts()).expect("seed");
    let started = tokio::time::Instant::now();
    store.fetch_all().await.expect("fetch");
    assert!(started.elapsed() >= DEFAULT_LATENCY);
}

#[tokio::test]
async fn create_assigns_ids_greater_than_every_existing_id() {
    let store = seeded();
    let max_before = demo_contacts().iter().map(|c| c.id).max().expect("non-empty");

    let first = store.create(draft("first")).await.expect("first");
    let second = store.create(draft("second")).await.expect("second");

    assert!(first.id > max_before);
    assert!(second.id > first.id);
    assert_eq!(store.len(), 6);
}

#[tokio::test]
async fn ids_stay_unique_when_seed_ids_are_in_the_future() {
    let far_future = Contact::from_draft(ContactId(i64::MAX - 10), draft("future"));
    let store = InMemoryContactStore::with_contacts(Duration::ZERO, vec![far_future]).expect("seed");
    let created = store.create(draft("next")).await.expect("create");
    assert_eq!(created.id, ContactId(i64::MAX - 9));
}

#[tokio::test]
async fn injected_create_failure_writes_nothing() {
    let store = seeded();
    store.fail_next_creates(1);

    let err = store.create(draft("lost")).await.expect_err("transient");
    assert!(err.is_retryable());
    assert_eq!(store.len(), 4);

    store.create(draft("kept")).await.expect("second attempt succeeds");
    assert_eq!(store.len(), 5);
}

#[tokio::test]
async fn injected_fetch_failures_are_consumed_one_by_one() {
    let store = seeded();
    store.fail_next_fetches(2);
    assert!(store.fetch_all().await.is_err());
    assert!(store.fetch_all().await.is_err());
    assert_eq!(store.fetch_all().await.expect("third").len(), 4);
}

#[tokio::test(start_paused = true)]
async fn dropped_create_before_latency_elapses_writes_nothing() {
    let store = InMemoryContactStore::with_contacts(DEFAULT_LATENCY, demo_contacts()).expect("seed");
    let outcome = tokio::time::timeout(Duration::from_millis(10), store.create(draft("late"))).await;
    assert!(outcome.is_err());
    assert_eq!(store.len(), 4);
}

#[test]
fn update_replaces_every_mutable_field() {
    let store = seeded();
    let target = demo_contacts()[2].id;
    let mut replacement = draft("Mariano O.");
    replacement.email = Some("mariano@example.com".into());

    let updated = store.update(target, replacement.clone()).expect("update");
    assert_eq!(updated.id, target);
    assert_eq!(updated.to_draft(), replacement);
    assert_eq!(store.get(target), Some(updated));
}

#[test]
fn update_and_delete_report_missing_ids() {
    let store = seeded();
    assert_eq!(
        store.update(ContactId(99), draft("ghost")),
        Err(StoreError::NotFound(ContactId(99)))
    );
    assert_eq!(
        store.delete(ContactId(99)),
        Err(StoreError::NotFound(ContactId(99)))
    );
    assert!(!StoreError::NotFound(ContactId(99)).is_retryable());
}

#[test]
fn delete_removes_exactly_one_contact() {
    let store = seeded();
    let target = demo_contacts()[0].id;
    store.delete(target).expect("delete");
    assert_eq!(store.get(target), None);
    assert_eq!(store.len(), 3);
    assert_eq!(store.delete(target), Err(StoreError::NotFound(target)));
}

#[test]
fn seeding_rejects_duplicate_ids() {
    let duplicate = vec![
        Contact::from_draft(ContactId(1), draft("a")),
        Contact::from_draft(ContactId(1), draft("b")),
    ];
    assert!(matches!(
        InMemoryContactStore::with_contacts(Duration::ZERO, duplicate),
        Err(StoreError::DuplicateId(ContactId(1)))
    ));
}

#[test]
fn demo_contacts_have_one_missing_email_and_one_missing_phone() {
    let contacts = demo_contacts();
    assert_eq!(contacts.iter().filter(|c| c.email.is_none()).count(), 1);
    assert_eq!(contacts.iter().filter(|c| c.phone.is_none()).count(), 1);
}

#[test]
fn seeding_stores_blank_optional_fields_as_absent() {
    let mut seed = Contact::from_draft(ContactId(3), draft("Mariano Ospina"));
    seed.phone = Some("3145698413".into());
    seed.email = Some(String::new());
    seed.address = Some("  ".into());

    let store = InMemoryContactStore::with_contacts(Duration::ZERO, vec![seed]).expect("seed");
    let stored = store.get(ContactId(3)).expect("present");
    assert_eq!(stored.phone.as_deref(), Some("3145698413"));
    assert_eq!(stored.email, None);
    assert_eq!(stored.address, None);
}

#[test]
fn update_with_blank_optional_fields_stores_none() {
    let store = seeded();
    let target = demo_contacts()[0].id;
    let mut replacement = draft("Juan Martinez");
    replacement.phone = Some(" ".into());

    let updated = store.update(target, replacement).expect("update");
    assert_eq!(updated.phone, None);
}

#[test]
fn store_is_empty_after_every_contact_is_deleted() {
    let store = seeded();
    assert!(!store.is_empty());
    for contact in demo_contacts() {
        store.delete(contact.id).expect("delete");
    }
    assert!(store.is_empty());
}
