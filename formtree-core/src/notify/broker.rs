//! Notification Broker
//!
//! A named-channel pub/sub bus. The form core publishes error summaries and
//! submit attempts here and never learns who, if anyone, renders them.
//!
//! Handlers run synchronously inside [`NotificationBroker::publish`], after
//! the channel table lock has been released. A handler that wants to mutate
//! the form tree should push a [`Command`](crate::reactive::Command) onto the
//! engine's task queue instead of calling back into the engine.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::summary::ErrorSummary;
use crate::graph::FormId;
use crate::reactive::{SubscriberId, Subscription};

/// Identifies one shown notification so it can be updated or removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationHandle(u64);

impl NotificationHandle {
    /// Generate a new unique handle.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw handle value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for NotificationHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// The kind of event published on a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// A new notification should be shown.
    Add,
    /// A shown notification should go away.
    Remove,
    /// A shown error summary has new content.
    ErrorsChanged,
    /// A form was submitted.
    SubmitAttempted,
}

/// Severity of a plain message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Success,
    Info,
    Warning,
    Danger,
}

/// A plain text notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub handle: NotificationHandle,
    pub level: Level,
    pub text: String,
}

/// What a handler receives.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Payload {
    /// An error summary, for `Add` and `ErrorsChanged`.
    Summary(ErrorSummary),
    /// A plain message, for `Add`.
    Message(Message),
    /// The notification to take down, for `Remove`.
    Removed(NotificationHandle),
    /// The outcome of a submit's validation gate, for `SubmitAttempted`.
    Attempt { form: FormId, valid: bool },
}

type Handler = Arc<dyn Fn(&Payload) + Send + Sync>;
type ChannelKey = (String, EventKind);

#[derive(Default)]
struct Channels {
    handlers: DashMap<ChannelKey, Vec<(SubscriberId, Handler)>>,
}

/// Shared notification bus.
///
/// Clones publish to and subscribe on the same channels.
#[derive(Clone)]
pub struct NotificationBroker {
    channels: Arc<Channels>,
    default_channel: Arc<str>,
}

impl NotificationBroker {
    /// Create a broker whose convenience publishers target `default_channel`.
    pub fn new(default_channel: &str) -> Self {
        Self {
            channels: Arc::new(Channels::default()),
            default_channel: Arc::from(default_channel),
        }
    }

    /// The channel used when none is named.
    pub fn default_channel(&self) -> &str {
        &self.default_channel
    }

    /// Register `handler` for `event` on `channel`.
    ///
    /// The handler stays registered until the returned subscription is
    /// dropped or cancelled.
    pub fn subscribe<F>(&self, channel: &str, event: EventKind, handler: F) -> Subscription
    where
        F: Fn(&Payload) + Send + Sync + 'static,
    {
        let id = SubscriberId::new();
        let key: ChannelKey = (channel.to_string(), event);

        self.channels
            .handlers
            .entry(key.clone())
            .or_default()
            .push((id, Arc::new(handler)));
        trace!(channel, ?event, "subscribed");

        let channels: Weak<Channels> = Arc::downgrade(&self.channels);
        Subscription::new(id, move |id| {
            let Some(channels) = channels.upgrade() else {
                return;
            };
            if let Some(mut list) = channels.handlers.get_mut(&key) {
                list.retain(|(subscriber, _)| *subscriber != id);
            }
            channels.handlers.remove_if(&key, |_, list| list.is_empty());
        })
    }

    /// Deliver `payload` to every handler of `event` on `channel`.
    ///
    /// Returns the number of handlers called.
    pub fn publish(&self, channel: &str, event: EventKind, payload: &Payload) -> usize {
        let handlers: Vec<Handler> = match self.channels.handlers.get(&(channel.to_string(), event)) {
            Some(list) => list.iter().map(|(_, handler)| handler.clone()).collect(),
            None => Vec::new(),
        };

        debug!(channel, ?event, handlers = handlers.len(), "publishing notification");
        for handler in &handlers {
            handler(payload);
        }
        handlers.len()
    }

    /// Number of handlers for `event` on `channel`.
    pub fn subscriber_count(&self, channel: &str, event: EventKind) -> usize {
        self.channels
            .handlers
            .get(&(channel.to_string(), event))
            .map_or(0, |list| list.len())
    }

    /// Show a plain message. `None` targets the default channel.
    pub fn notify(&self, channel: Option<&str>, level: Level, text: impl Into<String>) -> NotificationHandle {
        let handle = NotificationHandle::new();
        let channel = channel.unwrap_or(&self.default_channel);
        self.publish(
            channel,
            EventKind::Add,
            &Payload::Message(Message {
                handle,
                level,
                text: text.into(),
            }),
        );
        handle
    }

    pub fn success(&self, channel: Option<&str>, text: impl Into<String>) -> NotificationHandle {
        self.notify(channel, Level::Success, text)
    }

    pub fn info(&self, channel: Option<&str>, text: impl Into<String>) -> NotificationHandle {
        self.notify(channel, Level::Info, text)
    }

    pub fn warning(&self, channel: Option<&str>, text: impl Into<String>) -> NotificationHandle {
        self.notify(channel, Level::Warning, text)
    }

    pub fn danger(&self, channel: Option<&str>, text: impl Into<String>) -> NotificationHandle {
        self.notify(channel, Level::Danger, text)
    }

    /// Take down a shown notification.
    pub fn remove(&self, channel: Option<&str>, handle: NotificationHandle) {
        let channel = channel.unwrap_or(&self.default_channel);
        self.publish(channel, EventKind::Remove, &Payload::Removed(handle));
    }
}

impl Default for NotificationBroker {
    fn default() -> Self {
        Self::new("default")
    }
}

impl fmt::Debug for NotificationBroker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationBroker")
            .field("default_channel", &self.default_channel)
            .field("keys", &self.channels.handlers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn recorder(broker: &NotificationBroker, channel: &str, event: EventKind) -> (Subscription, Arc<Mutex<Vec<Payload>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let subscription = broker.subscribe(channel, event, move |payload| {
            sink.lock().push(payload.clone());
        });
        (subscription, seen)
    }

    #[test]
    fn publish_reaches_only_matching_channel_and_event() {
        let broker = NotificationBroker::default();
        let (_add, adds) = recorder(&broker, "default", EventKind::Add);
        let (_remove, removes) = recorder(&broker, "default", EventKind::Remove);
        let (_other, other) = recorder(&broker, "sidebar", EventKind::Add);

        let handle = broker.warning(None, "careful");
        broker.remove(None, handle);

        assert_eq!(adds.lock().len(), 1);
        assert!(matches!(
            &adds.lock()[0],
            Payload::Message(Message { level: Level::Warning, text, .. }) if text == "careful"
        ));
        assert_eq!(*removes.lock(), vec![Payload::Removed(handle)]);
        assert!(other.lock().is_empty());
    }

    #[test]
    fn dropping_the_subscription_unsubscribes() {
        let broker = NotificationBroker::default();
        let (subscription, seen) = recorder(&broker, "default", EventKind::Add);
        assert_eq!(broker.subscriber_count("default", EventKind::Add), 1);

        drop(subscription);
        broker.info(None, "hello");

        assert!(seen.lock().is_empty());
        assert_eq!(broker.subscriber_count("default", EventKind::Add), 0);
    }

    #[test]
    fn handlers_may_subscribe_while_publishing() {
        let broker = NotificationBroker::default();
        let inner = broker.clone();
        let late = Arc::new(Mutex::new(Vec::new()));
        let late_sink = late.clone();

        let _outer = broker.subscribe("default", EventKind::Add, move |_| {
            let sink = late_sink.clone();
            inner
                .subscribe("default", EventKind::Remove, move |payload| {
                    sink.lock().push(payload.clone());
                })
                .detach();
        });

        broker.success(None, "saved");
        broker.remove(None, NotificationHandle::new());

        assert_eq!(late.lock().len(), 1);
    }

    #[test]
    fn publish_counts_handlers() {
        let broker = NotificationBroker::new("main");
        let (_a, _) = recorder(&broker, "main", EventKind::SubmitAttempted);
        let (_b, _) = recorder(&broker, "main", EventKind::SubmitAttempted);

        let called = broker.publish(
            "main",
            EventKind::SubmitAttempted,
            &Payload::Attempt {
                form: FormId::new(),
                valid: true,
            },
        );
        assert_eq!(called, 2);
        assert_eq!(broker.publish("nobody", EventKind::Add, &Payload::Removed(NotificationHandle::new())), 0);
    }
}
