//! Notifications
//!
//! The broker is the only way the core talks to a notification display.
//! Error summaries are published through it by [`SummaryWatch`].

mod broker;
mod summary;

pub use broker::{EventKind, Level, Message, NotificationBroker, NotificationHandle, Payload};
pub use summary::{DisplayedError, ErrorSummary, SummaryWatch};
