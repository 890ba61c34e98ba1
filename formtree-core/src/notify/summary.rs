//! Error Summary Watch
//!
//! Root forms, and nested forms that name their own channel, publish a
//! summary of their aggregated errors. The watch keeps a fingerprint of the
//! inputs (the error list, the focus flags of the erroneous fields, the
//! invalid-attempt flag) and only acts when it moves.
//!
//! A summary is shown when the form had an invalid submit attempt while
//! invalid, or when any erroneous field has already lost focus.

use serde::Serialize;
use tracing::debug;

use super::broker::{EventKind, NotificationBroker, NotificationHandle, Payload};
use crate::graph::{FieldId, FormId, FormTree};
use crate::validation::errors_to_display;

/// One line of a summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayedError {
    pub field: FieldId,
    pub label: String,
    pub message: String,
}

/// What a summary renderer receives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorSummary {
    pub form: FormId,
    pub handle: NotificationHandle,
    pub invalid_attempt: bool,
    pub errors: Vec<DisplayedError>,
}

type Fingerprint = (Vec<(FieldId, String, bool)>, bool);

/// Publishes one form's error summary on one channel.
#[derive(Debug)]
pub struct SummaryWatch {
    form: FormId,
    channel: String,
    handle: Option<NotificationHandle>,
    last: Option<Fingerprint>,
}

impl SummaryWatch {
    pub fn new(form: FormId, channel: impl Into<String>) -> Self {
        Self {
            form,
            channel: channel.into(),
            handle: None,
            last: None,
        }
    }

    pub fn form(&self) -> FormId {
        self.form
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// The handle of the summary currently shown, if any.
    pub fn handle(&self) -> Option<NotificationHandle> {
        self.handle
    }

    /// Re-evaluate the form and publish if its summary inputs moved.
    ///
    /// Returns `true` when the inputs changed since the last call.
    pub fn refresh(&mut self, tree: &FormTree, broker: &NotificationBroker) -> bool {
        let Some(form) = tree.form(self.form) else {
            return false;
        };

        let fingerprint: Fingerprint = (
            form.errors()
                .iter()
                .map(|error| {
                    let had_focus = tree.field(error.field).is_some_and(|f| f.had_focus());
                    (error.field, error.message.clone(), had_focus)
                })
                .collect(),
            form.invalid_attempt(),
        );
        if self.last.as_ref() == Some(&fingerprint) {
            return false;
        }

        let should_display = (form.invalid_attempt() && tree.is_invalid(self.form))
            || fingerprint.0.iter().any(|(_, _, had_focus)| *had_focus);
        self.last = Some(fingerprint);

        match (self.handle, should_display) {
            (Some(handle), false) => {
                debug!(form = self.form.raw(), "hiding error summary");
                broker.publish(&self.channel, EventKind::Remove, &Payload::Removed(handle));
                self.handle = None;
            }
            (None, true) => {
                let handle = NotificationHandle::new();
                debug!(form = self.form.raw(), handle = handle.raw(), "showing error summary");
                self.handle = Some(handle);
                let summary = self.summary(tree, handle);
                broker.publish(&self.channel, EventKind::Add, &Payload::Summary(summary));
            }
            (Some(handle), true) => {
                let summary = self.summary(tree, handle);
                broker.publish(&self.channel, EventKind::ErrorsChanged, &Payload::Summary(summary));
            }
            (None, false) => {}
        }
        true
    }

    fn summary(&self, tree: &FormTree, handle: NotificationHandle) -> ErrorSummary {
        let errors = errors_to_display(tree, self.form)
            .into_iter()
            .map(|error| DisplayedError {
                field: error.field,
                label: tree
                    .field(error.field)
                    .map(|field| field.label().to_string())
                    .unwrap_or_default(),
                message: error.message,
            })
            .collect();

        ErrorSummary {
            form: self.form,
            handle,
            invalid_attempt: tree.form(self.form).is_some_and(|form| form.invalid_attempt()),
            errors,
        }
    }

    /// The user closed the summary. It comes back on the next change.
    pub fn dismiss(&mut self) {
        self.handle = None;
    }

    /// Take down a shown summary because the form is going away.
    pub fn teardown(&mut self, broker: &NotificationBroker) {
        if let Some(handle) = self.handle.take() {
            broker.publish(&self.channel, EventKind::Remove, &Payload::Removed(handle));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::FailureSet;
    use crate::validation::{recompute_field, ValidationMessages};
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn record(broker: &NotificationBroker) -> (Vec<crate::reactive::Subscription>, Arc<Mutex<Vec<EventKind>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let subscriptions = [EventKind::Add, EventKind::ErrorsChanged, EventKind::Remove]
            .into_iter()
            .map(|event| {
                let sink = seen.clone();
                broker.subscribe("default", event, move |_| sink.lock().push(event))
            })
            .collect();
        (subscriptions, seen)
    }

    fn required(active: bool) -> FailureSet {
        [("required".to_string(), active)].into_iter().collect()
    }

    #[test]
    fn summary_follows_focus_and_attempts() {
        let broker = NotificationBroker::default();
        let (_subs, seen) = record(&broker);
        let messages = ValidationMessages::default();

        let mut tree = FormTree::new();
        let form = tree.register_form("person", None).unwrap();
        let name = tree.ensure_field(form, "name", "Name").unwrap();
        let mut watch = SummaryWatch::new(form, "default");

        recompute_field(&mut tree, name, required(true), &messages).unwrap();
        watch.refresh(&tree, &broker);
        assert!(seen.lock().is_empty());

        tree.field_mut(name).unwrap().had_focus = true;
        watch.refresh(&tree, &broker);
        assert_eq!(*seen.lock(), vec![EventKind::Add]);
        assert!(watch.handle().is_some());

        tree.form_mut(form).unwrap().invalid_attempt = true;
        watch.refresh(&tree, &broker);
        assert_eq!(seen.lock().last(), Some(&EventKind::ErrorsChanged));

        assert!(!watch.refresh(&tree, &broker));

        recompute_field(&mut tree, name, required(false), &messages).unwrap();
        watch.refresh(&tree, &broker);
        assert_eq!(seen.lock().last(), Some(&EventKind::Remove));
        assert!(watch.handle().is_none());
    }

    #[test]
    fn dismissed_summary_returns_on_next_change() {
        let broker = NotificationBroker::default();
        let (_subs, seen) = record(&broker);
        let messages = ValidationMessages::default();

        let mut tree = FormTree::new();
        let form = tree.register_form("person", None).unwrap();
        let name = tree.ensure_field(form, "name", "Name").unwrap();
        let email = tree.ensure_field(form, "email", "Email").unwrap();
        let mut watch = SummaryWatch::new(form, "default");

        tree.form_mut(form).unwrap().invalid_attempt = true;
        recompute_field(&mut tree, name, required(true), &messages).unwrap();
        watch.refresh(&tree, &broker);
        watch.dismiss();

        recompute_field(&mut tree, email, required(true), &messages).unwrap();
        watch.refresh(&tree, &broker);

        assert_eq!(*seen.lock(), vec![EventKind::Add, EventKind::Add]);

        watch.teardown(&broker);
        assert_eq!(seen.lock().last(), Some(&EventKind::Remove));
    }

    #[test]
    fn summary_lists_only_displayable_errors() {
        let broker = NotificationBroker::default();
        let payloads = Arc::new(Mutex::new(Vec::new()));
        let sink = payloads.clone();
        let _sub = broker.subscribe("default", EventKind::Add, move |payload| {
            sink.lock().push(payload.clone())
        });
        let messages = ValidationMessages::default();

        let mut tree = FormTree::new();
        let form = tree.register_form("person", None).unwrap();
        let name = tree.ensure_field(form, "name", "Name").unwrap();
        let email = tree.ensure_field(form, "email", "Email").unwrap();
        recompute_field(&mut tree, name, required(true), &messages).unwrap();
        recompute_field(&mut tree, email, required(true), &messages).unwrap();
        tree.field_mut(email).unwrap().had_focus = true;

        let mut watch = SummaryWatch::new(form, "default");
        watch.refresh(&tree, &broker);

        let payloads = payloads.lock();
        let Payload::Summary(summary) = &payloads[0] else {
            panic!("expected a summary payload");
        };
        assert_eq!(summary.errors.len(), 1);
        assert_eq!(summary.errors[0].label, "Email");
        assert_eq!(summary.errors[0].message, "Email is required.");
    }
}
