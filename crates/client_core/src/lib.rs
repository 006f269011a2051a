//! Contact list controller layer: filtering, debounced search, mode state
//! machine and store orchestration.

mod controller;
pub mod debounce;
pub mod error;
pub mod events;
pub mod filter;
pub mod retry;

pub use controller::{
    ContactListController, ControllerSettings, ControllerSnapshot, DEFAULT_FILTER_QUIESCENCE,
    DEFAULT_FILTER_SETTLE,
};
pub use error::{ControllerError, ControllerResult};
pub use events::{ControllerEvent, UiError, UiErrorCategory, UiErrorContext};
pub use filter::filter_contacts;
pub use retry::RetryPolicy;
