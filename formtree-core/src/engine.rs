//! Form Engine
//!
//! The engine owns the form tree and every service around it, and is the
//! single entry point the host drives.
//!
//! # Ticks
//!
//! The engine never runs anything on its own. Each [`FormEngine::tick`]:
//!
//! 1. drains the task queue, repeating while commands keep arriving, up to
//!    the configured pass limit;
//! 2. re-evaluates every expression dependency against the scope;
//! 3. refreshes every error summary, publishing through the broker.
//!
//! Direct mutations (`set_field_value`, `set_validity`, ...) apply at once.
//! Anything that cannot hold `&mut FormEngine` (broker handlers, loading gate
//! callbacks, other threads) goes through [`FormEngine::deferred`].
//!
//! # Baselines
//!
//! Binding a field or adding an expression dependency does not capture a
//! baseline right away. Capture is queued on the loading gate once every
//! in-flight load has finished. The queued capture is applied before the next
//! edit or tick, so the baseline is the value present when the gate drained.

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::error::{FormError, Result};
use crate::graph::{
    AggregatedError, ChangeGraph, DependencyId, DependencySource, FieldId, FieldState,
    FormId, FormNode, FormTree, RenderHandle, WatchMode,
};
use crate::notify::{EventKind, NotificationBroker, Payload, SummaryWatch};
use crate::reactive::{Command, LoadingGate, TaskQueue};
use crate::scope::{MapScope, Scope};
use crate::strategy::{
    default_busy_registry, default_navigate_away_registry, BusyRegistry, NavigateAwayRegistry,
};
use crate::submit::{self, ActionResult, SubmitController, SubmitOutcome};
use crate::validation::{self, ValidationMessages};
use crate::value::FieldValue;

/// Per-form settings given at registration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormOptions {
    /// Publish this form's error summary on its own channel. Root forms
    /// without one use the configured default channel.
    pub notify_target: Option<String>,
    /// Busy indicator for submits of this form.
    pub busy_strategy: Option<String>,
    /// Navigate-away strategy. Only used on root forms.
    pub navigate_away: Option<String>,
}

/// How a field is bound.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldOptions {
    label: Option<String>,
    numeric: bool,
    templates: IndexMap<String, String>,
    params: IndexMap<String, String>,
    handle: Option<RenderHandle>,
    initial: Option<FieldValue>,
    track_changes: bool,
}

impl Default for FieldOptions {
    fn default() -> Self {
        Self {
            label: None,
            numeric: false,
            templates: IndexMap::new(),
            params: IndexMap::new(),
            handle: None,
            initial: None,
            track_changes: true,
        }
    }
}

impl FieldOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Display label used in messages.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Mark the field as a numeric input.
    pub fn numeric(mut self) -> Self {
        self.numeric = true;
        self
    }

    /// Override the template of one failure kind for this field.
    pub fn template(mut self, kind: impl Into<String>, template: impl Into<String>) -> Self {
        self.templates.insert(kind.into(), template.into());
        self
    }

    /// Parameter substituted for `{1}` in the template of `kind`.
    pub fn param(mut self, kind: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(kind.into(), value.into());
        self
    }

    pub fn handle(mut self, handle: RenderHandle) -> Self {
        self.handle = Some(handle);
        self
    }

    /// Model value present at bind time.
    pub fn initial(mut self, value: impl Into<FieldValue>) -> Self {
        self.initial = Some(value.into());
        self
    }

    /// Bind without a change dependency.
    pub fn untracked(mut self) -> Self {
        self.track_changes = false;
        self
    }
}

/// Runtime for one host's forms.
pub struct FormEngine<S: Scope = MapScope> {
    tree: FormTree,
    changes: ChangeGraph,
    gate: LoadingGate,
    tasks: TaskQueue,
    broker: NotificationBroker,
    messages: ValidationMessages,
    busy: BusyRegistry,
    navigate_away: NavigateAwayRegistry,
    submits: SubmitController,
    summaries: IndexMap<FormId, SummaryWatch>,
    options: IndexMap<FormId, FormOptions>,
    default_label: String,
    default_notify_target: Option<String>,
    max_tick_passes: usize,
    scope: S,
}

impl<S: Scope> FormEngine<S> {
    /// Create an engine with the default configuration and the process-wide
    /// loading gate.
    pub fn new(scope: S) -> Self {
        Self::with_config(scope, EngineConfig::default())
    }

    pub fn with_config(scope: S, config: EngineConfig) -> Self {
        Self::with_gate(scope, config, LoadingGate::global().clone())
    }

    /// Create an engine that waits on `gate` instead of the process-wide one.
    pub fn with_gate(scope: S, config: EngineConfig, gate: LoadingGate) -> Self {
        let broker = NotificationBroker::new(
            config.default_notify_target.as_deref().unwrap_or("default"),
        );

        Self {
            tree: FormTree::new(),
            changes: ChangeGraph::new(),
            gate,
            tasks: TaskQueue::new(),
            broker,
            messages: config.validation_messages,
            busy: default_busy_registry(config.default_busy_strategy.as_deref()),
            navigate_away: default_navigate_away_registry(
                config.default_navigate_away_strategy.as_deref(),
            ),
            submits: SubmitController::new(),
            summaries: IndexMap::new(),
            options: IndexMap::new(),
            default_label: config.default_label,
            default_notify_target: config.default_notify_target,
            max_tick_passes: config.max_tick_passes.max(1),
            scope,
        }
    }

    pub fn tree(&self) -> &FormTree {
        &self.tree
    }

    pub fn changes(&self) -> &ChangeGraph {
        &self.changes
    }

    pub fn form(&self, form: FormId) -> Option<&FormNode> {
        self.tree.form(form)
    }

    pub fn field(&self, field: FieldId) -> Option<&FieldState> {
        self.tree.field(field)
    }

    pub fn scope(&self) -> &S {
        &self.scope
    }

    /// Mutable access to the host model. Changes are picked up on the next
    /// tick.
    pub fn scope_mut(&mut self) -> &mut S {
        self.settle_baselines();
        &mut self.scope
    }

    pub fn broker(&self) -> &NotificationBroker {
        &self.broker
    }

    pub fn gate(&self) -> &LoadingGate {
        &self.gate
    }

    /// A handle for queueing commands to the next tick.
    pub fn deferred(&self) -> TaskQueue {
        self.tasks.clone()
    }

    pub fn busy_strategies_mut(&mut self) -> &mut BusyRegistry {
        &mut self.busy
    }

    pub fn navigate_away_strategies_mut(&mut self) -> &mut NavigateAwayRegistry {
        &mut self.navigate_away
    }

    pub fn validation_messages(&self) -> &ValidationMessages {
        &self.messages
    }

    /// Set the global template of one failure kind and re-render every field.
    pub fn set_validation_message(&mut self, kind: &str, template: &str) -> Result<()> {
        self.messages.set(kind, template);
        self.rerender_all()
    }

    /// Replace the global template table and re-render every field.
    pub fn set_validation_messages(&mut self, messages: ValidationMessages) -> Result<()> {
        self.messages = messages;
        self.rerender_all()
    }

    fn rerender_all(&mut self) -> Result<()> {
        let roots: Vec<FormId> = self.tree.roots().collect();
        for root in roots {
            for field in self.tree.subtree_fields(root) {
                validation::refresh_field(&mut self.tree, field, &self.messages)?;
            }
        }
        self.refresh_summaries();
        Ok(())
    }

    // Forms

    pub fn register_form(&mut self, name: &str, parent: Option<FormId>) -> Result<FormId> {
        self.register_form_with(name, parent, FormOptions::default())
    }

    /// Register a form with explicit settings.
    ///
    /// Explicitly named strategies must already be registered.
    pub fn register_form_with(
        &mut self,
        name: &str,
        parent: Option<FormId>,
        options: FormOptions,
    ) -> Result<FormId> {
        if let Some(strategy) = options.busy_strategy.as_deref() {
            self.busy.resolve(Some(strategy))?;
        }
        if let Some(strategy) = options.navigate_away.as_deref() {
            self.navigate_away.resolve(Some(strategy))?;
        }

        let id = self.tree.register_form(name, parent)?;

        let channel = match (&options.notify_target, parent) {
            (Some(channel), _) => Some(channel.clone()),
            (None, None) => self.default_notify_target.clone(),
            (None, Some(_)) => None,
        };
        if let Some(channel) = channel {
            self.summaries.insert(id, SummaryWatch::new(id, channel));
        }
        self.options.insert(id, options);

        Ok(id)
    }

    /// Tear down a form and everything nested in it.
    ///
    /// The surviving ancestors lose the subtree's errors and recompute their
    /// changed flags. Shown summaries of removed forms are taken down.
    /// Returns `false` when the form was already gone.
    pub fn destroy_form(&mut self, form: FormId) -> bool {
        let Some(detached) = self.tree.deregister_form(form) else {
            return false;
        };

        self.changes.forget(&detached.dependencies);
        if let Some(parent) = detached.parent {
            validation::purge_fields(&mut self.tree, &detached.fields, parent);
            self.changes.recompute_ancestors(&mut self.tree, parent);
        }

        for id in &detached.forms {
            if let Some(mut watch) = self.summaries.shift_remove(id) {
                watch.teardown(&self.broker);
            }
            self.options.shift_remove(id);
        }
        self.submits.forget(&detached.forms);

        self.refresh_summaries();
        true
    }

    // Fields

    /// Bind a field to a form, creating it on first use.
    ///
    /// A tracked field gets a change dependency whose baseline is captured
    /// once loading has settled.
    pub fn bind_field(&mut self, form: FormId, name: &str, options: FieldOptions) -> Result<FieldId> {
        self.settle_baselines();
        let label = options
            .label
            .clone()
            .unwrap_or_else(|| self.default_label.clone());
        let id = self.tree.ensure_field(form, name, &label)?;

        let field = self.tree.field_mut(id).ok_or(FormError::UnknownField(id))?;
        if options.label.is_some() {
            field.label = label;
        }
        if options.numeric {
            field.numeric = true;
        }
        field.templates.extend(options.templates);
        field.params.extend(options.params);
        if options.handle.is_some() {
            field.handle = options.handle;
        }
        if let Some(initial) = options.initial {
            field.value = initial;
        }
        let tracked = field.dependency.is_some();

        if options.track_changes && !tracked {
            let dep = self.changes.add_field_dependency(&mut self.tree, form, id)?;
            self.schedule_baseline(dep);
        }

        validation::refresh_field(&mut self.tree, id, &self.messages)?;
        Ok(id)
    }

    pub fn field_id(&self, form: FormId, name: &str) -> Option<FieldId> {
        self.tree.form(form)?.field(name)
    }

    /// Resolve `formName.fieldName`, creating the field on first use.
    pub fn field_by_path(&mut self, path: &str) -> Result<FieldId> {
        self.tree.resolve_field_path(path, &self.default_label)
    }

    /// Tear down a single field. Returns `false` when it was already gone.
    pub fn destroy_field(&mut self, field: FieldId) -> bool {
        let Some(state) = self.tree.remove_field(field) else {
            return false;
        };

        if let Some(dep) = state.dependency() {
            self.changes.remove_dependency(&mut self.tree, dep);
        }
        validation::purge_fields(&mut self.tree, &[field], state.form());

        self.refresh_summaries();
        true
    }

    /// Replace a field's model value.
    pub fn set_field_value(&mut self, field: FieldId, value: impl Into<FieldValue>) -> Result<()> {
        self.settle_baselines();
        let state = self
            .tree
            .field_mut(field)
            .ok_or(FormError::UnknownField(field))?;
        state.value = value.into();
        let dependency = state.dependency;
        let current = state.value.clone();

        if let Some(dep) = dependency {
            self.changes.observe(&mut self.tree, dep, &current);
        }
        Ok(())
    }

    /// Replace a field's raw failure set.
    pub fn set_validity<I, K>(&mut self, field: FieldId, failures: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, bool)>,
        K: Into<String>,
    {
        let failures = failures
            .into_iter()
            .map(|(kind, active)| (kind.into(), active))
            .collect();
        validation::recompute_field(&mut self.tree, field, failures, &self.messages)?;
        self.refresh_summaries();
        Ok(())
    }

    /// Set or clear one failure kind, keeping the others.
    pub fn set_failure(&mut self, field: FieldId, kind: &str, active: bool) -> Result<()> {
        let mut failures = self
            .tree
            .field(field)
            .ok_or(FormError::UnknownField(field))?
            .failures()
            .clone();
        failures.insert(kind.to_string(), active);
        validation::recompute_field(&mut self.tree, field, failures, &self.messages)?;
        self.refresh_summaries();
        Ok(())
    }

    /// The field lost focus.
    pub fn blur_field(&mut self, field: FieldId) -> Result<()> {
        let state = self
            .tree
            .field_mut(field)
            .ok_or(FormError::UnknownField(field))?;
        state.had_focus = true;
        self.refresh_summaries();
        Ok(())
    }

    // Change dependencies

    /// Watch an expression of the scope on behalf of `form`.
    pub fn add_expression_dependency(
        &mut self,
        form: FormId,
        expr: &str,
        mode: WatchMode,
    ) -> Result<DependencyId> {
        let dep = self
            .changes
            .add_expression_dependency(&mut self.tree, form, expr, mode)?;
        self.schedule_baseline(dep);
        Ok(dep)
    }

    pub fn remove_dependency(&mut self, dep: DependencyId) -> bool {
        self.changes.remove_dependency(&mut self.tree, dep)
    }

    pub fn mark_changed(&mut self, dep: DependencyId, is_changed: bool) -> Result<()> {
        self.changes.mark_changed(&mut self.tree, dep, is_changed)
    }

    /// Capture a dependency's baseline from its current value now.
    pub fn reset_baseline(&mut self, dep: DependencyId) -> Result<()> {
        let current = self.current_value(dep)?;
        self.changes.reset_baseline(&mut self.tree, dep, current)
    }

    fn schedule_baseline(&self, dep: DependencyId) {
        let tasks = self.tasks.clone();
        self.gate
            .run_when_done_loading(move || tasks.push(Command::CaptureBaseline(dep)));
    }

    /// Apply queued baseline captures ahead of any edit.
    ///
    /// Values only change through `&mut self`, so the value read here is the
    /// one present when the loading gate drained.
    fn settle_baselines(&mut self) -> usize {
        let mut applied = 0;
        for dep in self.tasks.drain_captures() {
            match self.reset_baseline(dep) {
                Ok(()) => applied += 1,
                Err(error) => warn!(?dep, %error, "skipped baseline capture"),
            }
        }
        applied
    }

    fn current_value(&self, dep: DependencyId) -> Result<FieldValue> {
        let dependency = self
            .changes
            .dependency(dep)
            .ok_or(FormError::UnknownDependency(dep))?;

        match dependency.source() {
            DependencySource::Field(field) => self
                .tree
                .field(*field)
                .map(|state| state.value().clone())
                .ok_or(FormError::UnknownField(*field)),
            DependencySource::Expression { expr, .. } => {
                Ok(self.scope.evaluate(expr).unwrap_or_else(FieldValue::unset))
            }
        }
    }

    // Ticks

    /// Apply queued commands, re-evaluate expressions and refresh summaries.
    ///
    /// Returns the number of commands applied. A command that no longer
    /// applies (its form or field is gone) is logged and skipped.
    pub fn tick(&mut self) -> usize {
        let mut applied = self.settle_baselines();

        for _ in 0..self.max_tick_passes {
            let commands = self.tasks.drain();
            if commands.is_empty() {
                break;
            }
            for command in commands {
                match self.apply(command.clone()) {
                    Ok(()) => applied += 1,
                    Err(error) => warn!(?command, %error, "skipped deferred command"),
                }
            }
        }
        if !self.tasks.is_empty() {
            warn!(
                pending = self.tasks.len(),
                "tick pass limit reached, remaining commands wait for the next tick"
            );
        }

        self.digest();
        self.refresh_summaries();
        applied
    }

    fn apply(&mut self, command: Command) -> Result<()> {
        match command {
            Command::CaptureBaseline(dep) => self.reset_baseline(dep),
            Command::SetValue { field, value } => self.set_field_value(field, value),
            Command::SetValidity { field, failures } => self.set_validity(field, failures),
            Command::Blur(field) => self.blur_field(field),
            Command::DestroyForm(form) => {
                self.destroy_form(form);
                Ok(())
            }
            Command::DestroyField(field) => {
                self.destroy_field(field);
                Ok(())
            }
            Command::DismissSummary(form) => {
                self.dismiss_summary(form);
                Ok(())
            }
        }
    }

    /// Re-evaluate every expression dependency against the scope.
    pub fn digest(&mut self) {
        let watched: Vec<(DependencyId, String)> = self
            .changes
            .iter()
            .filter(|dep| dep.is_tracking())
            .filter_map(|dep| match dep.source() {
                DependencySource::Expression { expr, .. } => Some((dep.id(), expr.clone())),
                DependencySource::Field(_) => None,
            })
            .collect();

        for (dep, expr) in watched {
            let current = self.scope.evaluate(&expr).unwrap_or_else(FieldValue::unset);
            self.changes.observe(&mut self.tree, dep, &current);
        }
    }

    // Reset

    /// Restore every value in the form's scope to its baseline and forget
    /// submit attempts and visited fields.
    pub fn reset(&mut self, form: FormId) -> Result<()> {
        self.settle_baselines();
        let restored = self.changes.reset_all(&mut self.tree, form, &mut self.scope);
        if matches!(restored, Err(FormError::UnknownForm(_))) {
            return restored;
        }
        validation::clear_errors(&mut self.tree, form)?;
        self.refresh_summaries();
        restored
    }

    /// Accept the current values as the new baseline.
    pub fn reset_changed(&mut self, form: FormId) -> Result<()> {
        self.settle_baselines();
        self.changes.reset_changed(&mut self.tree, form, &self.scope)
    }

    pub fn clear_errors(&mut self, form: FormId) -> Result<()> {
        validation::clear_errors(&mut self.tree, form)?;
        self.refresh_summaries();
        Ok(())
    }

    // Submit and navigation

    /// Mark the form tree with the validity check and run `action` if valid.
    pub fn attempt_submit<T, F>(&mut self, form: FormId, action: F) -> Result<SubmitOutcome<T>>
    where
        T: 'static,
        F: FnOnce() -> ActionResult<T>,
    {
        let strategy = self
            .options
            .get(&form)
            .and_then(|options| options.busy_strategy.as_deref());
        let indicator = self.busy.resolve(strategy)?;

        let outcome = self
            .submits
            .attempt_submit(&mut self.tree, form, indicator, action)?;

        if !outcome.is_busy() {
            let channel = self.channel_for(form);
            self.broker.publish(
                &channel,
                EventKind::SubmitAttempted,
                &Payload::Attempt {
                    form,
                    valid: !outcome.is_blocked(),
                },
            );
        }
        self.refresh_summaries();
        Ok(outcome)
    }

    /// Run `action` inside a busy window of the named (or default) strategy.
    pub fn run_busy<T, F>(&self, strategy: Option<&str>, action: F) -> Result<SubmitOutcome<T>>
    where
        T: 'static,
        F: FnOnce() -> ActionResult<T>,
    {
        let indicator = self.busy.resolve(strategy)?;
        Ok(submit::run_busy(indicator, action))
    }

    pub fn is_submitting(&self, form: FormId) -> bool {
        self.submits.is_pending(form)
    }

    /// Whether the user may leave the tree containing `form`.
    ///
    /// An unchanged tree may always be left. A changed one asks the root
    /// form's navigate-away strategy.
    pub fn can_navigate_away(&self, form: FormId) -> Result<bool> {
        let root = self
            .tree
            .root_of(form)
            .ok_or(FormError::UnknownForm(form))?;
        if !self.tree.form(root).is_some_and(FormNode::is_changed) {
            return Ok(true);
        }

        let strategy = self
            .options
            .get(&root)
            .and_then(|options| options.navigate_away.as_deref());
        let allowed = self.navigate_away.resolve(strategy)?.allow_leave(root);
        debug!(form = root.raw(), allowed, "navigate away requested on changed form");
        Ok(allowed)
    }

    /// Removed in favour of [`FormEngine::attempt_submit`].
    #[deprecated(note = "use `attempt_submit`")]
    pub fn save_form(&mut self, _form: FormId) -> Result<()> {
        Err(FormError::Deprecated {
            operation: "save_form",
            replacement: "attempt_submit",
        })
    }

    // Queries

    pub fn is_changed(&self, form: FormId) -> bool {
        self.tree.form(form).is_some_and(FormNode::is_changed)
    }

    pub fn is_invalid(&self, form: FormId) -> bool {
        self.tree.is_invalid(form)
    }

    pub fn is_loading(&self) -> bool {
        self.gate.is_loading()
    }

    /// Every aggregated error of the form's subtree.
    pub fn errors(&self, form: FormId) -> &[AggregatedError] {
        self.tree.form(form).map(FormNode::errors).unwrap_or_default()
    }

    pub fn errors_to_display(&self, form: FormId) -> Vec<AggregatedError> {
        validation::errors_to_display(&self.tree, form)
    }

    pub fn show_field_messages(&self, field: FieldId) -> bool {
        validation::show_field_messages(&self.tree, field)
    }

    // Summaries

    /// The user closed the form's summary. It returns on the next change.
    pub fn dismiss_summary(&mut self, form: FormId) -> bool {
        match self.summaries.get_mut(&form) {
            Some(watch) => {
                watch.dismiss();
                true
            }
            None => false,
        }
    }

    pub fn summary(&self, form: FormId) -> Option<&SummaryWatch> {
        self.summaries.get(&form)
    }

    fn refresh_summaries(&mut self) {
        for watch in self.summaries.values_mut() {
            watch.refresh(&self.tree, &self.broker);
        }
    }

    /// The channel of the nearest form in the chain that publishes summaries.
    fn channel_for(&self, form: FormId) -> String {
        self.tree
            .chain(form)
            .iter()
            .find_map(|id| self.summaries.get(id))
            .map(|watch| watch.channel().to_string())
            .unwrap_or_else(|| self.broker.default_channel().to_string())
    }
}

impl Default for FormEngine<MapScope> {
    fn default() -> Self {
        Self::new(MapScope::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::{ConfirmNavigation, NavigateAwayStrategy};
    use std::sync::Arc;

    fn engine() -> FormEngine {
        FormEngine::with_gate(MapScope::new(), EngineConfig::default(), LoadingGate::new())
    }

    #[test]
    fn idle_gate_captures_the_bound_value() {
        let mut engine = engine();
        let form = engine.register_form("person", None).unwrap();
        let name = engine
            .bind_field(form, "name", FieldOptions::new().initial("Ada"))
            .unwrap();

        // The capture is applied ahead of the first edit, not at the tick
        engine.set_field_value(name, "Grace").unwrap();
        assert!(engine.is_changed(form));
        assert_eq!(engine.tick(), 0);

        engine.set_field_value(name, "Ada").unwrap();
        assert!(!engine.is_changed(form));
    }

    #[test]
    fn scope_edits_after_loading_are_not_taken_as_the_baseline() {
        let mut engine = engine();
        let form = engine.register_form("order", None).unwrap();
        engine.gate().increment();
        engine
            .add_expression_dependency(form, "order.note", WatchMode::Deep)
            .unwrap();
        engine.scope_mut().set("order.note", "loaded").unwrap();

        engine.gate().decrement();
        engine.scope_mut().set("order.note", "user-edit").unwrap();
        engine.tick();

        assert!(engine.is_changed(form));
        engine.reset(form).unwrap();
        assert_eq!(
            engine.scope().evaluate("order.note"),
            Some(FieldValue::from("loaded"))
        );
    }

    #[test]
    fn rebinding_without_numeric_keeps_the_flag() {
        let mut engine = engine();
        let form = engine.register_form("order", None).unwrap();
        let qty = engine
            .bind_field(form, "qty", FieldOptions::new().label("Quantity").numeric())
            .unwrap();
        engine
            .bind_field(form, "qty", FieldOptions::new().label("Quantity"))
            .unwrap();

        engine.set_validity(qty, [("required", true)]).unwrap();

        assert!(engine.field(qty).unwrap().is_numeric());
        assert_eq!(engine.errors(form)[0].message, "Quantity must be number.");
    }

    #[test]
    fn rebinding_keeps_one_dependency() {
        let mut engine = engine();
        let form = engine.register_form("person", None).unwrap();
        let first = engine.bind_field(form, "name", FieldOptions::new()).unwrap();
        let second = engine
            .bind_field(form, "name", FieldOptions::new().label("Name"))
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(engine.changes().len(), 1);
        assert_eq!(engine.field(first).unwrap().label(), "Name");
    }

    #[test]
    fn unlabeled_fields_use_the_default_label() {
        let mut engine = engine();
        let form = engine.register_form("person", None).unwrap();
        let name = engine.bind_field(form, "name", FieldOptions::new()).unwrap();

        engine.set_validity(name, [("required", true)]).unwrap();

        assert_eq!(engine.errors(form)[0].message, "This field is required.");
    }

    #[test]
    fn changing_templates_rerenders_messages() {
        let mut engine = engine();
        let form = engine.register_form("person", None).unwrap();
        let name = engine
            .bind_field(form, "name", FieldOptions::new().label("Name"))
            .unwrap();
        engine.set_validity(name, [("required", true)]).unwrap();

        engine
            .set_validation_message("required", "{0} cannot be blank.")
            .unwrap();

        assert_eq!(engine.errors(form)[0].message, "Name cannot be blank.");
    }

    #[test]
    fn expression_dependencies_follow_the_scope() {
        let mut engine = engine();
        engine.scope_mut().set("order.note", "draft").unwrap();
        let form = engine.register_form("order", None).unwrap();
        engine
            .add_expression_dependency(form, "order.note", WatchMode::Deep)
            .unwrap();
        engine.tick();

        engine.scope_mut().set("order.note", "final").unwrap();
        engine.tick();
        assert!(engine.is_changed(form));

        engine.reset(form).unwrap();
        assert!(!engine.is_changed(form));
        assert_eq!(
            engine.scope().evaluate("order.note"),
            Some(FieldValue::from("draft"))
        );

        engine.tick();
        assert!(!engine.is_changed(form));
    }

    #[test]
    fn disable_is_a_built_in_busy_strategy() {
        let config = EngineConfig::from_json_str(r#"{ "default_busy_strategy": "disable" }"#)
            .unwrap();
        let mut engine = FormEngine::with_gate(MapScope::new(), config, LoadingGate::new());
        let form = engine.register_form("person", None).unwrap();

        let outcome = engine.attempt_submit(form, || ActionResult::Ready(1)).unwrap();

        assert!(matches!(outcome, SubmitOutcome::Completed(1)));
    }

    #[test]
    fn unknown_strategies_are_rejected_at_registration() {
        let mut engine = engine();
        let options = FormOptions {
            busy_strategy: Some("spinner".into()),
            ..FormOptions::default()
        };

        assert!(matches!(
            engine.register_form_with("person", None, options),
            Err(FormError::UnknownStrategy { .. })
        ));
        assert_eq!(engine.tree().form_count(), 0);
    }

    #[test]
    fn navigate_away_asks_only_when_changed() {
        let mut engine = engine();
        engine.navigate_away_strategies_mut().register(
            "confirm",
            Arc::new(ConfirmNavigation::new(|_| false)) as Arc<dyn NavigateAwayStrategy>,
        );
        let form = engine
            .register_form_with(
                "person",
                None,
                FormOptions {
                    navigate_away: Some("confirm".into()),
                    ..FormOptions::default()
                },
            )
            .unwrap();
        let inner = engine.register_form("address", Some(form)).unwrap();
        let city = engine.bind_field(inner, "city", FieldOptions::new().initial("Oslo")).unwrap();
        engine.tick();

        assert!(engine.can_navigate_away(inner).unwrap());

        engine.set_field_value(city, "Bergen").unwrap();
        assert!(!engine.can_navigate_away(inner).unwrap());
    }

    #[test]
    #[allow(deprecated)]
    fn save_form_is_deprecated() {
        let mut engine = engine();
        let form = engine.register_form("person", None).unwrap();

        assert!(matches!(
            engine.save_form(form),
            Err(FormError::Deprecated { replacement: "attempt_submit", .. })
        ));
    }

    #[test]
    fn stale_commands_are_skipped() {
        let mut engine = engine();
        let form = engine.register_form("person", None).unwrap();
        let name = engine.bind_field(form, "name", FieldOptions::new()).unwrap();
        let queue = engine.deferred();

        engine.destroy_form(form);
        queue.push(Command::Blur(name));

        assert_eq!(engine.tick(), 0);
    }

    #[test]
    fn field_paths_resolve_lazily() {
        let mut engine = engine();
        let form = engine.register_form("person", None).unwrap();

        let email = engine.field_by_path("person.email").unwrap();
        assert_eq!(engine.field_id(form, "email"), Some(email));
        assert!(matches!(
            engine.field_by_path("person"),
            Err(FormError::MissingFieldName(_))
        ));
    }
}
