use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicU32, Ordering},
        PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use shared::domain::{Contact, ContactDraft, ContactId};
use thiserror::Error;
use tracing::{debug, warn};

/// Latency of the simulated remote fetch/create calls.
pub const DEFAULT_LATENCY: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("contact {0} not found")]
    NotFound(ContactId),
    #[error("{operation} failed: {message}")]
    Transient {
        operation: &'static str,
        message: String,
    },
    #[error("contact id {0} already present")]
    DuplicateId(ContactId),
}

impl StoreError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Authoritative owner of the contact collection.
///
/// `fetch_all` and `create` stand in for remote calls and may fail
/// transiently; `update` and `delete` apply immediately.
#[async_trait]
pub trait ContactStore: Send + Sync {
    async fn fetch_all(&self) -> StoreResult<Vec<Contact>>;
    async fn create(&self, draft: ContactDraft) -> StoreResult<Contact>;
    fn update(&self, id: ContactId, draft: ContactDraft) -> StoreResult<Contact>;
    fn delete(&self, id: ContactId) -> StoreResult<()>;
}

struct StoreState {
    contacts: Vec<Contact>,
    last_id: i64,
}

impl StoreState {
    /// Creation timestamp in milliseconds, bumped past the last issued id so
    /// that two creates within one millisecond still get distinct ids.
    fn next_id(&mut self) -> ContactId {
        let now_ms = Utc::now().timestamp_millis();
        let id = now_ms.max(self.last_id.saturating_add(1));
        self.last_id = id;
        ContactId(id)
    }

    fn position(&self, id: ContactId) -> Option<usize> {
        self.contacts.iter().position(|contact| contact.id == id)
    }
}

pub struct InMemoryContactStore {
    latency: Duration,
    state: RwLock<StoreState>,
    pending_fetch_failures: AtomicU32,
    pending_create_failures: AtomicU32,
}

impl InMemoryContactStore {
    pub fn new(latency: Duration) -> Self {
        Self {
            latency,
            state: RwLock::new(StoreState {
                contacts: Vec::new(),
                last_id: 0,
            }),
            pending_fetch_failures: AtomicU32::new(0),
            pending_create_failures: AtomicU32::new(0),
        }
    }

    /// Seeds the store. Blank optional fields are stored as `None`.
    pub fn with_contacts(latency: Duration, contacts: Vec<Contact>) -> StoreResult<Self> {
        let contacts: Vec<Contact> = contacts.into_iter().map(Contact::normalized).collect();
        let mut seen = HashSet::with_capacity(contacts.len());
        for contact in &contacts {
            if !seen.insert(contact.id) {
                return Err(StoreError::DuplicateId(contact.id));
            }
        }
        let last_id = contacts.iter().map(|contact| contact.id.0).max().unwrap_or(0);

        let store = Self::new(latency);
        {
            let mut state = store.write();
            state.contacts = contacts;
            state.last_id = last_id;
        }
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.read().contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().contacts.is_empty()
    }

    pub fn get(&self, id: ContactId) -> Option<Contact> {
        let state = self.read();
        state
            .position(id)
            .map(|index| state.contacts[index].clone())
    }

    /// Makes the next `count` fetches fail with a transient error.
    pub fn fail_next_fetches(&self, count: u32) {
        self.pending_fetch_failures.store(count, Ordering::SeqCst);
    }

    /// Makes the next `count` creates fail with a transient error.
    pub fn fail_next_creates(&self, count: u32) {
        self.pending_create_failures.store(count, Ordering::SeqCst);
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

fn take_injected_failure(counter: &AtomicU32, operation: &'static str) -> StoreResult<()> {
    let consumed = counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| {
            remaining.checked_sub(1)
        })
        .is_ok();
    if consumed {
        warn!(operation, "injected transient store failure");
        return Err(StoreError::Transient {
            operation,
            message: "simulated backend unavailable".to_string(),
        });
    }
    Ok(())
}

#[async_trait]
impl ContactStore for InMemoryContactStore {
    async fn fetch_all(&self) -> StoreResult<Vec<Contact>> {
        self.simulate_latency().await;
        take_injected_failure(&self.pending_fetch_failures, "fetch_all")?;

        let contacts = self.read().contacts.clone();
        debug!(count = contacts.len(), "fetched contacts");
        Ok(contacts)
    }

    async fn create(&self, draft: ContactDraft) -> StoreResult<Contact> {
        self.simulate_latency().await;
        take_injected_failure(&self.pending_create_failures, "create")?;

        let mut state = self.write();
        let id = state.next_id();
        let contact = Contact::from_draft(id, draft);
        state.contacts.push(contact.clone());
        debug!(contact_id = %id, "created contact");
        Ok(contact)
    }

    fn update(&self, id: ContactId, draft: ContactDraft) -> StoreResult<Contact> {
        let mut state = self.write();
        let Some(index) = state.position(id) else {
            warn!(contact_id = %id, "update target missing");
            return Err(StoreError::NotFound(id));
        };
        let contact = &mut state.contacts[index];
        contact.apply_draft(draft);
        debug!(contact_id = %id, "updated contact");
        Ok(contact.clone())
    }

    fn delete(&self, id: ContactId) -> StoreResult<()> {
        let mut state = self.write();
        let Some(index) = state.position(id) else {
            warn!(contact_id = %id, "delete target missing");
            return Err(StoreError::NotFound(id));
        };
        state.contacts.remove(index);
        debug!(contact_id = %id, "deleted contact");
        Ok(())
    }
}

/// The four reference contacts shipped with the demo application.
pub fn demo_contacts() -> Vec<Contact> {
    vec![
        demo_contact(
            1_693_702_309_047,
            "Juan Martinez",
            "3003124341",
            (1988, 6, 25),
            "Carrera 7 24 12",
            "jcmartinezcano@gmail.com",
        ),
        demo_contact(
            1_693_702_394_006,
            "Tatiana Jimenez",
            "3104568945",
            (2001, 7, 30),
            "Calle 1 13 24",
            "tatiana@gmail.com",
        ),
        demo_contact(
            1_693_702_454_128,
            "Mariano Ospina",
            "3145698413",
            (1961, 3, 16),
            "Calle 127 89 11",
            "",
        ),
        demo_contact(
            1_693_702_516_620,
            "Margarita Rosas",
            "",
            (1967, 3, 9),
            "Carrera 98 127 60",
            "marianita@gmail.com",
        ),
    ]
}

fn demo_contact(
    id: i64,
    name: &str,
    phone: &str,
    (year, month, day): (i32, u32, u32),
    address: &str,
    email: &str,
) -> Contact {
    Contact {
        id: ContactId(id),
        name: name.to_string(),
        phone: Some(phone.to_string()),
        dob: NaiveDate::from_ymd_opt(year, month, day).expect("valid demo date"),
        address: Some(address.to_string()),
        email: Some(email.to_string()),
    }
    .normalized()
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
