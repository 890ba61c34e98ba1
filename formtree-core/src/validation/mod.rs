//! Validation Messages
//!
//! Turns raw per-field failure sets into human readable messages and keeps
//! every form's aggregated error list in sync with its subtree.

mod aggregator;
mod messages;

pub use aggregator::{
    clear_errors, errors_to_display, purge_fields, recompute_field, refresh_field,
    render_messages, show_field_messages,
};
pub use messages::{label_from_model_path, string_format, ValidationMessages};
