//! Contact list controller: selection, working copy, mode transitions and
//! the debounced filtered view.

use std::{
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
    time::Duration,
};

use chrono::{Local, NaiveDate};
use serde::Serialize;
use shared::{
    domain::{years_between, Contact, ContactForm, ContactId, Mode},
    validation::{parse_dob, validate_form},
};
use storage::ContactStore;
use tokio::{runtime::Handle, sync::broadcast};
use tracing::{debug, info, warn};

use crate::{
    debounce::FilterDebouncer,
    error::{ControllerError, ControllerResult},
    events::{ControllerEvent, UiError, UiErrorContext},
    filter::filter_contacts,
    retry::RetryPolicy,
};

pub const DEFAULT_FILTER_QUIESCENCE: Duration = Duration::from_millis(200);
pub const DEFAULT_FILTER_SETTLE: Duration = Duration::from_millis(500);
const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerSettings {
    pub filter_quiescence: Duration,
    pub filter_settle: Duration,
    pub retry: RetryPolicy,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            filter_quiescence: DEFAULT_FILTER_QUIESCENCE,
            filter_settle: DEFAULT_FILTER_SETTLE,
            retry: RetryPolicy::default(),
        }
    }
}

/// Read-only view of controller state for rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControllerSnapshot {
    pub mode: Mode,
    pub selected: Option<ContactId>,
    pub working_copy: Option<ContactForm>,
    pub filtered_view: Vec<Contact>,
    pub filter_query: String,
    pub filter_loading: bool,
    pub busy: u32,
    pub last_error: Option<UiError>,
}

enum Session {
    Idle,
    Viewing { contact: Contact, form: ContactForm },
    Editing { contact: Contact, form: ContactForm },
    Adding { form: ContactForm },
}

impl Session {
    fn mode(&self) -> Mode {
        match self {
            Self::Idle => Mode::None,
            Self::Viewing { .. } => Mode::Viewing,
            Self::Editing { .. } => Mode::Editing,
            Self::Adding { .. } => Mode::Adding,
        }
    }

    fn viewing(contact: Contact) -> Self {
        let form = ContactForm::from_contact(&contact);
        Self::Viewing { contact, form }
    }

    fn form(&self) -> Option<&ContactForm> {
        match self {
            Self::Idle => None,
            Self::Viewing { form, .. } | Self::Editing { form, .. } | Self::Adding { form } => {
                Some(form)
            }
        }
    }

    fn contact(&self) -> Option<&Contact> {
        match self {
            Self::Viewing { contact, .. } | Self::Editing { contact, .. } => Some(contact),
            Self::Idle | Self::Adding { .. } => None,
        }
    }
}

/// Counts in-flight store calls; released on drop so a cancelled call
/// cannot leave the indicator stuck.
struct BusyGuard(Arc<AtomicU32>);

impl BusyGuard {
    fn enter(counter: &Arc<AtomicU32>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct ContactListController {
    store: Arc<dyn ContactStore>,
    retry: RetryPolicy,
    contacts: Vec<Contact>,
    filtered: Vec<Contact>,
    applied_query: String,
    filter_loading: bool,
    busy: Arc<AtomicU32>,
    session: Session,
    last_error: Option<UiError>,
    debouncer: FilterDebouncer,
    events: broadcast::Sender<ControllerEvent>,
}

impl ContactListController {
    /// Builds a controller whose filter timers run on the current tokio
    /// runtime.
    pub fn new(
        store: Arc<dyn ContactStore>,
        settings: ControllerSettings,
    ) -> ControllerResult<Self> {
        let runtime = Handle::try_current().map_err(|_| ControllerError::NoRuntime)?;
        Ok(Self::with_runtime(store, settings, runtime))
    }

    /// Builds a controller that can be driven from threads outside `runtime`,
    /// such as a UI frame loop.
    pub fn with_runtime(
        store: Arc<dyn ContactStore>,
        settings: ControllerSettings,
        runtime: Handle,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            store,
            retry: settings.retry,
            contacts: Vec::new(),
            filtered: Vec::new(),
            applied_query: String::new(),
            filter_loading: false,
            busy: Arc::new(AtomicU32::new(0)),
            session: Session::Idle,
            last_error: None,
            debouncer: FilterDebouncer::new(
                runtime,
                settings.filter_quiescence,
                settings.filter_settle,
            ),
            events,
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ControllerEvent> {
        self.events.subscribe()
    }

    pub fn mode(&self) -> Mode {
        self.session.mode()
    }

    pub fn contacts(&self) -> &[Contact] {
        &self.contacts
    }

    pub fn filtered_view(&self) -> &[Contact] {
        &self.filtered
    }

    pub fn filter_query(&self) -> &str {
        &self.applied_query
    }

    pub fn is_filter_loading(&self) -> bool {
        self.filter_loading
    }

    pub fn busy(&self) -> u32 {
        self.busy.load(Ordering::SeqCst)
    }

    pub fn current_contact(&self) -> Option<&Contact> {
        self.session.contact()
    }

    pub fn working_copy(&self) -> Option<&ContactForm> {
        self.session.form()
    }

    pub fn last_error(&self) -> Option<&UiError> {
        self.last_error.as_ref()
    }

    pub fn snapshot(&self) -> ControllerSnapshot {
        ControllerSnapshot {
            mode: self.mode(),
            selected: self.current_contact().map(|contact| contact.id),
            working_copy: self.working_copy().cloned(),
            filtered_view: self.filtered.clone(),
            filter_query: self.applied_query.clone(),
            filter_loading: self.filter_loading,
            busy: self.busy(),
            last_error: self.last_error.clone(),
        }
    }

    /// Fetches the full collection and recomputes the filtered view.
    pub async fn load(&mut self) -> ControllerResult<usize> {
        let fetched = {
            let _busy = BusyGuard::enter(&self.busy);
            let store = self.store.as_ref();
            self.retry.run("fetch_all", move || store.fetch_all()).await
        };

        match fetched {
            Ok(contacts) => {
                let count = contacts.len();
                self.contacts = contacts;
                self.refresh_filtered();
                self.clear_error();
                info!(count, "contacts loaded");
                self.emit(ControllerEvent::ContactsLoaded { count });
                Ok(count)
            }
            Err(err) => Err(self.fail(UiErrorContext::Load, err.into())),
        }
    }

    /// Opens a contact from the loaded collection for viewing.
    pub fn select(&mut self, id: ContactId) -> ControllerResult<()> {
        self.ensure_mode("select", &[Mode::None, Mode::Viewing], UiErrorContext::Select)?;
        let Some(contact) = self.contacts.iter().find(|contact| contact.id == id).cloned() else {
            return Err(self.fail(UiErrorContext::Select, ControllerError::NotFound(id)));
        };
        debug!(contact_id = %id, "contact selected");
        self.transition(Session::viewing(contact));
        Ok(())
    }

    pub fn edit(&mut self) -> ControllerResult<()> {
        self.ensure_mode("edit", &[Mode::Viewing], UiErrorContext::Transition)?;
        self.map_session(|session| match session {
            Session::Viewing { contact, form } => Session::Editing { contact, form },
            other => other,
        });
        Ok(())
    }

    /// Discards edits and reloads the working copy from the selected contact.
    pub fn cancel(&mut self) -> ControllerResult<()> {
        self.ensure_mode("cancel", &[Mode::Editing], UiErrorContext::Transition)?;
        self.map_session(|session| match session {
            Session::Editing { contact, .. } => Session::viewing(contact),
            other => other,
        });
        Ok(())
    }

    pub fn add(&mut self) -> ControllerResult<()> {
        self.ensure_mode("add", &[Mode::None], UiErrorContext::Transition)?;
        self.transition(Session::Adding {
            form: ContactForm::default(),
        });
        Ok(())
    }

    /// Returns to `none` from any state without touching the store.
    pub fn close(&mut self) {
        self.transition(Session::Idle);
    }

    /// Mutable access to the working copy while editing or adding.
    pub fn form_mut(&mut self) -> ControllerResult<&mut ContactForm> {
        let from = self.mode();
        let Self {
            session,
            last_error,
            events,
            ..
        } = self;
        match session {
            Session::Editing { form, .. } | Session::Adding { form } => Ok(form),
            Session::Idle | Session::Viewing { .. } => Err(record_failure(
                last_error,
                events,
                UiErrorContext::Transition,
                ControllerError::IllegalTransition {
                    from,
                    action: "modify the form",
                },
            )),
        }
    }

    /// Commits the working copy.
    ///
    /// Editing lands in `viewing` on the updated record; adding lands in
    /// `none` once the delayed create resolves. On failure the mode and the
    /// working copy are left untouched.
    pub async fn save(&mut self) -> ControllerResult<Contact> {
        self.ensure_mode("save", &[Mode::Editing, Mode::Adding], UiErrorContext::Save)?;
        let Some(form) = self.session.form() else {
            return Err(self.illegal("save"));
        };
        let draft = match validate_form(form) {
            Ok(draft) => draft,
            Err(errors) => return Err(self.fail(UiErrorContext::Save, errors.into())),
        };

        if let Some(id) = self.session.contact().map(|contact| contact.id) {
            let updated = match self.store.update(id, draft) {
                Ok(updated) => updated,
                Err(err) => return Err(self.fail(UiErrorContext::Save, err.into())),
            };
            if let Some(slot) = self.contacts.iter_mut().find(|contact| contact.id == id) {
                *slot = updated.clone();
            }
            self.refresh_filtered();
            self.clear_error();
            info!(contact_id = %id, "contact updated");
            self.emit(ControllerEvent::ContactUpdated(id));
            self.transition(Session::viewing(updated.clone()));
            return Ok(updated);
        }

        let created = {
            let _busy = BusyGuard::enter(&self.busy);
            let store = self.store.as_ref();
            self.retry
                .run("create", move || store.create(draft.clone()))
                .await
        };
        let created = match created {
            Ok(created) => created,
            Err(err) => return Err(self.fail(UiErrorContext::Save, err.into())),
        };
        self.contacts.push(created.clone());
        self.refresh_filtered();
        self.clear_error();
        info!(contact_id = %created.id, "contact created");
        self.emit(ControllerEvent::ContactCreated(created.id));
        self.transition(Session::Idle);
        Ok(created)
    }

    /// `save` followed by `close`; both edit and add flows end in `none`.
    pub async fn save_and_close(&mut self) -> ControllerResult<Contact> {
        let saved = self.save().await?;
        self.close();
        Ok(saved)
    }

    /// Removes the selected contact and returns to `none`.
    pub fn delete(&mut self) -> ControllerResult<ContactId> {
        self.ensure_mode("delete", &[Mode::Viewing], UiErrorContext::Delete)?;
        let Some(id) = self.session.contact().map(|contact| contact.id) else {
            return Err(self.illegal("delete"));
        };
        if let Err(err) = self.store.delete(id) {
            return Err(self.fail(UiErrorContext::Delete, err.into()));
        }
        self.contacts.retain(|contact| contact.id != id);
        self.refresh_filtered();
        self.clear_error();
        info!(contact_id = %id, "contact deleted");
        self.emit(ControllerEvent::ContactDeleted(id));
        self.transition(Session::Idle);
        Ok(id)
    }

    /// Records a keystroke in the filter box.
    ///
    /// The loading flag is raised at once; filtering runs only after the
    /// input has been quiet for the quiescence window plus the settle delay.
    pub fn on_filter_text_changed(&mut self, text: impl Into<String>) {
        self.filter_loading = true;
        let generation = self.debouncer.submit(text);
        debug!(generation, "filter query scheduled");
    }

    /// Applies the current filter result if it is ready, without waiting.
    pub fn apply_ready_filters(&mut self) -> bool {
        match self.debouncer.try_take_current() {
            Some(ticket) => {
                self.apply_filter(ticket.query);
                true
            }
            None => false,
        }
    }

    /// Waits for the most recent filter query to settle and applies it.
    ///
    /// Returns `false` when no filter is pending.
    pub async fn wait_for_filter(&mut self) -> bool {
        match self.debouncer.take_current().await {
            Some(ticket) => {
                self.apply_filter(ticket.query);
                true
            }
            None => false,
        }
    }

    /// Whole years between the working copy's date of birth and today.
    pub fn working_copy_age(&self) -> Option<u32> {
        self.working_copy_age_on(Local::now().date_naive())
    }

    pub fn working_copy_age_on(&self, today: NaiveDate) -> Option<u32> {
        let dob = parse_dob(&self.working_copy()?.dob)?;
        Some(years_between(dob, today))
    }

    fn apply_filter(&mut self, query: String) {
        self.applied_query = query;
        self.refresh_filtered();
        self.filter_loading = false;
        debug!(query = %self.applied_query, matches = self.filtered.len(), "filter applied");
        self.emit(ControllerEvent::FilterApplied {
            query: self.applied_query.clone(),
            matches: self.filtered.len(),
        });
    }

    fn refresh_filtered(&mut self) {
        self.filtered = filter_contacts(&self.contacts, &self.applied_query);
    }

    fn transition(&mut self, next: Session) {
        self.map_session(|_| next);
    }

    fn map_session(&mut self, next: impl FnOnce(Session) -> Session) {
        let before = self.session.mode();
        let current = std::mem::replace(&mut self.session, Session::Idle);
        self.session = next(current);
        let after = self.session.mode();
        if before != after {
            debug!(from = %before, to = %after, "mode changed");
            self.emit(ControllerEvent::ModeChanged(after));
        }
    }

    fn ensure_mode(
        &mut self,
        action: &'static str,
        allowed: &[Mode],
        context: UiErrorContext,
    ) -> ControllerResult<()> {
        let from = self.mode();
        if allowed.contains(&from) {
            return Ok(());
        }
        Err(self.fail(context, ControllerError::IllegalTransition { from, action }))
    }

    fn illegal(&mut self, action: &'static str) -> ControllerError {
        let from = self.mode();
        self.fail(
            UiErrorContext::Transition,
            ControllerError::IllegalTransition { from, action },
        )
    }

    fn fail(&mut self, context: UiErrorContext, err: ControllerError) -> ControllerError {
        record_failure(&mut self.last_error, &self.events, context, err)
    }

    fn clear_error(&mut self) {
        self.last_error = None;
    }

    fn emit(&self, event: ControllerEvent) {
        let _ = self.events.send(event);
    }
}

fn record_failure(
    last_error: &mut Option<UiError>,
    events: &broadcast::Sender<ControllerEvent>,
    context: UiErrorContext,
    err: ControllerError,
) -> ControllerError {
    warn!(?context, error = %err, "controller operation failed");
    let ui_error = UiError::from_controller_error(context, &err);
    *last_error = Some(ui_error.clone());
    let _ = events.send(ControllerEvent::Error(ui_error));
    err
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
