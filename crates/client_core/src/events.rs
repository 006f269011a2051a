//! Controller events and error modeling for presentation layers.

use serde::Serialize;
use shared::domain::{ContactId, Mode};

use crate::error::ControllerError;

#[derive(Debug, Clone)]
pub enum ControllerEvent {
    ContactsLoaded { count: usize },
    FilterApplied { query: String, matches: usize },
    ContactCreated(ContactId),
    ContactUpdated(ContactId),
    ContactDeleted(ContactId),
    ModeChanged(Mode),
    Error(UiError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UiErrorCategory {
    NotFound,
    Validation,
    Transient,
    IllegalTransition,
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UiErrorContext {
    Load,
    Select,
    Save,
    Delete,
    Transition,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UiError {
    category: UiErrorCategory,
    context: UiErrorContext,
    message: String,
}

impl UiError {
    pub fn from_controller_error(context: UiErrorContext, err: &ControllerError) -> Self {
        let category = match err {
            ControllerError::IllegalTransition { .. } => UiErrorCategory::IllegalTransition,
            ControllerError::Validation(_) => UiErrorCategory::Validation,
            ControllerError::NotFound(_) => UiErrorCategory::NotFound,
            ControllerError::Store(store_err) if store_err.is_retryable() => {
                UiErrorCategory::Transient
            }
            ControllerError::Store(storage::StoreError::NotFound(_)) => UiErrorCategory::NotFound,
            ControllerError::Store(_) | ControllerError::NoRuntime => UiErrorCategory::Internal,
        };

        Self {
            category,
            context,
            message: display_message(context, err),
        }
    }

    /// Whether the operator can usefully retry the failed action.
    pub fn is_retryable(&self) -> bool {
        self.category == UiErrorCategory::Transient
    }

    pub fn category(&self) -> UiErrorCategory {
        self.category
    }

    pub fn context(&self) -> UiErrorContext {
        self.context
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

fn display_message(context: UiErrorContext, err: &ControllerError) -> String {
    match (context, err) {
        (UiErrorContext::Load, ControllerError::Store(store_err)) if store_err.is_retryable() => {
            "Contacts could not be loaded; retry in a moment.".to_string()
        }
        (UiErrorContext::Save, ControllerError::Store(store_err)) if store_err.is_retryable() => {
            "Contact could not be saved; your changes are kept, retry saving.".to_string()
        }
        (_, ControllerError::Validation(errors)) => format!("Please fix the form: {errors}"),
        (_, other) => other.to_string(),
    }
}
