//! Strategy Registries
//!
//! Pluggable behaviors are looked up by name in a typed registry, one per
//! category. A registry has at most one default. Resolving with no name
//! yields the default, and both an unknown name and a missing default are
//! configuration errors.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::trace;

use crate::error::{FormError, Result};
use crate::graph::FormId;

/// Named implementations of one strategy category.
pub struct StrategyRegistry<S: ?Sized> {
    category: &'static str,
    entries: IndexMap<String, Arc<S>>,
    default: Option<String>,
}

impl<S: ?Sized> StrategyRegistry<S> {
    /// Create an empty registry for `category` (used in error messages).
    pub fn new(category: &'static str) -> Self {
        Self {
            category,
            entries: IndexMap::new(),
            default: None,
        }
    }

    /// Register or replace a strategy.
    pub fn register(&mut self, name: impl Into<String>, strategy: Arc<S>) {
        let name = name.into();
        trace!(category = self.category, name = %name, "registered strategy");
        self.entries.insert(name, strategy);
    }

    /// Choose the strategy used when none is named.
    ///
    /// The name is checked on resolution, so the default may be set before
    /// the strategy is registered.
    pub fn set_default(&mut self, name: Option<&str>) {
        self.default = name.map(str::to_string);
    }

    /// Name of the default strategy, if one is configured.
    pub fn default_name(&self) -> Option<&str> {
        self.default.as_deref()
    }

    /// Look up `name`, or the default when `name` is `None`.
    pub fn resolve(&self, name: Option<&str>) -> Result<Arc<S>> {
        let name = match name {
            Some(name) => name,
            None => self
                .default
                .as_deref()
                .ok_or(FormError::NoDefaultStrategy {
                    category: self.category,
                })?,
        };

        self.entries
            .get(name)
            .cloned()
            .ok_or_else(|| FormError::UnknownStrategy {
                category: self.category,
                name: name.to_string(),
            })
    }

    /// Check whether `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Iterate over registered names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl<S: ?Sized> fmt::Debug for StrategyRegistry<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategyRegistry")
            .field("category", &self.category)
            .field("entries", &self.entries.keys().collect::<Vec<_>>())
            .field("default", &self.default)
            .finish()
    }
}

/// Visual feedback around an action that may take a while.
///
/// `before` runs right before the action, `after` once it has settled.
pub trait BusyIndicator {
    fn before(&self);
    fn after(&self);
}

/// Does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoBusyIndicator;

impl BusyIndicator for NoBusyIndicator {
    fn before(&self) {}
    fn after(&self) {}
}

/// Holds a shared "disabled" flag for the trigger while the action runs.
#[derive(Debug, Default, Clone)]
pub struct DisableTrigger {
    disabled: Arc<AtomicBool>,
}

impl DisableTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while an action started through this indicator is running.
    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::SeqCst)
    }
}

impl BusyIndicator for DisableTrigger {
    fn before(&self) {
        self.disabled.store(true, Ordering::SeqCst);
    }

    fn after(&self) {
        self.disabled.store(false, Ordering::SeqCst);
    }
}

/// Decides whether the user may leave a root form with unsaved changes.
///
/// Only consulted while the form is changed.
pub trait NavigateAwayStrategy {
    fn allow_leave(&self, form: FormId) -> bool;
}

/// Always allows leaving.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowNavigation;

impl NavigateAwayStrategy for AllowNavigation {
    fn allow_leave(&self, _form: FormId) -> bool {
        true
    }
}

/// Asks the host, typically by showing a confirmation prompt.
pub struct ConfirmNavigation {
    prompt: Box<dyn Fn(FormId) -> bool>,
}

impl ConfirmNavigation {
    pub fn new<F>(prompt: F) -> Self
    where
        F: Fn(FormId) -> bool + 'static,
    {
        Self {
            prompt: Box::new(prompt),
        }
    }
}

impl NavigateAwayStrategy for ConfirmNavigation {
    fn allow_leave(&self, form: FormId) -> bool {
        (self.prompt)(form)
    }
}

impl fmt::Debug for ConfirmNavigation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfirmNavigation").finish_non_exhaustive()
    }
}

pub type BusyRegistry = StrategyRegistry<dyn BusyIndicator>;
pub type NavigateAwayRegistry = StrategyRegistry<dyn NavigateAwayStrategy>;

/// A busy registry holding the built-in `none` and `disable` strategies.
///
/// The built-in `disable` owns a trigger nobody else can see. Hosts that
/// render the disabled state register their own [`DisableTrigger`] under the
/// same name, which replaces it.
pub fn default_busy_registry(default: Option<&str>) -> BusyRegistry {
    let mut registry = BusyRegistry::new("busy indicator");
    registry.register("none", Arc::new(NoBusyIndicator) as Arc<dyn BusyIndicator>);
    registry.register(
        "disable",
        Arc::new(DisableTrigger::new()) as Arc<dyn BusyIndicator>,
    );
    registry.set_default(default);
    registry
}

/// A navigate-away registry holding the built-in `none` strategy.
///
/// `confirm` needs a host prompt and is registered with
/// [`ConfirmNavigation::new`].
pub fn default_navigate_away_registry(default: Option<&str>) -> NavigateAwayRegistry {
    let mut registry = NavigateAwayRegistry::new("navigate-away");
    registry.register(
        "none",
        Arc::new(AllowNavigation) as Arc<dyn NavigateAwayStrategy>,
    );
    registry.set_default(default);
    registry
}
