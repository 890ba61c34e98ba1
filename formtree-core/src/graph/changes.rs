//! Change Dependencies
//!
//! A change dependency is one value watched for "differs from its baseline".
//! It is bound either to a field's model value or to an expression evaluated
//! against the host's [`Scope`].
//!
//! # Algorithm
//!
//! 1. A dependency is owned by exactly one form and listed only there.
//! 2. Until its baseline is captured the dependency is inert; observing it
//!    does nothing. The engine captures baselines once loading settles.
//! 3. Observing a new value recomputes `is_changed` against the baseline and
//!    then walks root-ward from the owning form. Each form on the path sets
//!    `changed = any own dependency changed || any child form changed`.
//!
//! A baseline that is not equal to itself (NaN, the "never set" marker) is
//! replaced by the first value observed, and an unsettled current value is
//! never reported as a change.

use indexmap::IndexMap;
use tracing::{debug, trace, warn};

use super::node::{DependencyId, FieldId, FormId, FormNode};
use super::registry::FormTree;
use crate::error::{FormError, Result};
use crate::reactive::{PassKind, RecomputeContext};
use crate::scope::Scope;
use crate::value::FieldValue;

/// How an expression dependency decides that its value moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WatchMode {
    /// Structural equality.
    #[default]
    Deep,
    /// Scalars by value, containers by length and keys.
    Shallow,
}

impl WatchMode {
    fn same(self, a: &FieldValue, b: &FieldValue) -> bool {
        match self {
            WatchMode::Deep => a == b,
            WatchMode::Shallow => a.shallow_eq(b),
        }
    }
}

/// What a dependency watches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencySource {
    /// A field's model value.
    Field(FieldId),
    /// An expression evaluated against the scope.
    Expression { expr: String, mode: WatchMode },
}

/// A tracked (baseline, current) pair.
#[derive(Debug, Clone)]
pub struct ChangeDependency {
    id: DependencyId,
    form: FormId,
    source: DependencySource,
    baseline: Option<FieldValue>,
    last_seen: Option<FieldValue>,
    is_changed: bool,
}

impl ChangeDependency {
    /// Get the dependency's ID.
    pub fn id(&self) -> DependencyId {
        self.id
    }

    /// Get the owning form.
    pub fn form(&self) -> FormId {
        self.form
    }

    /// Get what this dependency watches.
    pub fn source(&self) -> &DependencySource {
        &self.source
    }

    /// Get the captured baseline, if any.
    pub fn baseline(&self) -> Option<&FieldValue> {
        self.baseline.as_ref()
    }

    /// True once a baseline has been captured.
    pub fn is_tracking(&self) -> bool {
        self.baseline.is_some()
    }

    /// True when the watched value differs from the baseline.
    pub fn is_changed(&self) -> bool {
        self.is_changed
    }
}

/// All change dependencies of all forms.
#[derive(Debug, Default)]
pub struct ChangeGraph {
    deps: IndexMap<DependencyId, ChangeDependency>,
}

impl ChangeGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Watch a field's model value on behalf of `form_id`.
    pub fn add_field_dependency(
        &mut self,
        tree: &mut FormTree,
        form_id: FormId,
        field_id: FieldId,
    ) -> Result<DependencyId> {
        if tree.field(field_id).is_none() {
            return Err(FormError::UnknownField(field_id));
        }
        let id = self.insert(tree, form_id, DependencySource::Field(field_id))?;
        if let Some(field) = tree.field_mut(field_id) {
            field.dependency = Some(id);
        }
        Ok(id)
    }

    /// Watch an expression on behalf of `form_id`.
    pub fn add_expression_dependency(
        &mut self,
        tree: &mut FormTree,
        form_id: FormId,
        expr: &str,
        mode: WatchMode,
    ) -> Result<DependencyId> {
        let expr = expr.trim();
        if expr.is_empty() {
            return Err(FormError::InvalidExpression);
        }
        self.insert(
            tree,
            form_id,
            DependencySource::Expression {
                expr: expr.to_string(),
                mode,
            },
        )
    }

    fn insert(
        &mut self,
        tree: &mut FormTree,
        form_id: FormId,
        source: DependencySource,
    ) -> Result<DependencyId> {
        let form = tree
            .form_mut(form_id)
            .ok_or(FormError::UnknownForm(form_id))?;

        let id = DependencyId::new();
        form.dependencies.push(id);
        trace!(form = form_id.raw(), ?source, "added change dependency");

        self.deps.insert(
            id,
            ChangeDependency {
                id,
                form: form_id,
                source,
                baseline: None,
                last_seen: None,
                is_changed: false,
            },
        );
        Ok(id)
    }

    /// Remove a dependency and recompute its form's ancestry.
    ///
    /// Returns `false` when it was already gone.
    pub fn remove_dependency(&mut self, tree: &mut FormTree, id: DependencyId) -> bool {
        let Some(dep) = self.deps.shift_remove(&id) else {
            return false;
        };

        if let Some(form) = tree.form_mut(dep.form) {
            form.dependencies.retain(|d| *d != id);
        }
        if let DependencySource::Field(field_id) = dep.source {
            if let Some(field) = tree.field_mut(field_id) {
                field.dependency = None;
            }
        }

        self.recompute_ancestors(tree, dep.form);
        true
    }

    /// Drop the records of dependencies whose forms were already removed.
    pub fn forget(&mut self, ids: &[DependencyId]) {
        for id in ids {
            self.deps.shift_remove(id);
        }
    }

    /// Get a dependency.
    pub fn dependency(&self, id: DependencyId) -> Option<&ChangeDependency> {
        self.deps.get(&id)
    }

    /// Iterate over all dependencies.
    pub fn iter(&self) -> impl Iterator<Item = &ChangeDependency> {
        self.deps.values()
    }

    /// Get the total number of dependencies.
    pub fn len(&self) -> usize {
        self.deps.len()
    }

    /// Check if there are no dependencies.
    pub fn is_empty(&self) -> bool {
        self.deps.is_empty()
    }

    /// Capture `current` as the new baseline and clear `is_changed`.
    pub fn reset_baseline(
        &mut self,
        tree: &mut FormTree,
        id: DependencyId,
        current: FieldValue,
    ) -> Result<()> {
        let dep = self
            .deps
            .get_mut(&id)
            .ok_or(FormError::UnknownDependency(id))?;

        dep.last_seen = Some(current.clone());
        dep.baseline = Some(current);
        dep.is_changed = false;
        let form = dep.form;

        self.recompute_ancestors(tree, form);
        Ok(())
    }

    /// Compare the watched value against the baseline.
    ///
    /// Returns the dependency's new `is_changed`, or `None` when it is unknown
    /// or has no baseline yet.
    pub fn observe(
        &mut self,
        tree: &mut FormTree,
        id: DependencyId,
        current: &FieldValue,
    ) -> Option<bool> {
        let dep = self.deps.get_mut(&id)?;
        let baseline = dep.baseline.as_mut()?;

        if let DependencySource::Expression { mode, .. } = &dep.source {
            if let Some(last) = &dep.last_seen {
                if mode.same(last, current) {
                    return Some(dep.is_changed);
                }
            }
        }
        dep.last_seen = Some(current.clone());

        if baseline.is_unsettled() {
            *baseline = current.clone();
        }
        let changed = !current.is_unsettled() && *baseline != *current;
        let flipped = dep.is_changed != changed;
        dep.is_changed = changed;
        let form = dep.form;

        if flipped {
            trace!(form = form.raw(), changed, "dependency changed state");
        }
        self.recompute_ancestors(tree, form);
        Some(changed)
    }

    /// Force a dependency's `is_changed` flag.
    pub fn mark_changed(
        &mut self,
        tree: &mut FormTree,
        id: DependencyId,
        is_changed: bool,
    ) -> Result<()> {
        let dep = self
            .deps
            .get_mut(&id)
            .ok_or(FormError::UnknownDependency(id))?;
        dep.is_changed = is_changed;
        let form = dep.form;

        self.recompute_ancestors(tree, form);
        Ok(())
    }

    /// Recompute `changed` for `form_id` and every ancestor, root-ward.
    pub fn recompute_ancestors(&self, tree: &mut FormTree, form_id: FormId) {
        let _pass = RecomputeContext::enter(PassKind::Changes, form_id);
        for id in tree.chain(form_id) {
            self.recompute_form(tree, id);
        }
    }

    /// Recompute every form below `form_id`, then its ancestry.
    pub fn recompute_subtree(&self, tree: &mut FormTree, form_id: FormId) {
        let _pass = RecomputeContext::enter(PassKind::Changes, form_id);
        for id in tree.descendants(form_id).into_iter().rev() {
            self.recompute_form(tree, id);
        }
        for id in tree.chain(form_id).into_iter().skip(1) {
            self.recompute_form(tree, id);
        }
    }

    fn recompute_form(&self, tree: &mut FormTree, form_id: FormId) {
        let Some(node) = tree.form(form_id) else {
            return;
        };
        let local = node
            .dependencies
            .iter()
            .any(|id| self.deps.get(id).is_some_and(ChangeDependency::is_changed));
        let nested = node
            .children
            .iter()
            .any(|child| tree.form(*child).is_some_and(FormNode::is_changed));

        if let Some(node) = tree.form_mut(form_id) {
            node.changed = local || nested;
        }
    }

    /// Every dependency owned by `form_id` or a nested form.
    pub fn scoped_dependencies(&self, tree: &FormTree, form_id: FormId) -> Vec<DependencyId> {
        tree.descendants(form_id)
            .into_iter()
            .filter_map(|id| tree.form(id))
            .flat_map(|node| node.dependencies.iter().copied())
            .filter(|id| self.deps.contains_key(id))
            .collect()
    }

    /// Restore every scoped value to its baseline.
    ///
    /// Field values are written back into the tree, expression values through
    /// `scope`. All flags are cleared, then the form's `invalid_attempt`.
    ///
    /// A failed assign does not stop the pass. The remaining dependencies are
    /// still restored and the subtree recomputed; the first error is returned
    /// afterwards and the failing dependency keeps its changed state.
    pub fn reset_all(
        &mut self,
        tree: &mut FormTree,
        form_id: FormId,
        scope: &mut dyn Scope,
    ) -> Result<()> {
        if tree.form(form_id).is_none() {
            return Err(FormError::UnknownForm(form_id));
        }

        let mut first_error = None;
        for id in self.scoped_dependencies(tree, form_id) {
            let Some(dep) = self.deps.get_mut(&id) else {
                continue;
            };
            let Some(baseline) = dep.baseline.clone() else {
                dep.is_changed = false;
                continue;
            };

            match &dep.source {
                DependencySource::Field(field_id) => {
                    if let Some(field) = tree.field_mut(*field_id) {
                        if field.value != baseline {
                            field.value = baseline.clone();
                        }
                    }
                }
                // Never write the unset sentinel into the host model
                DependencySource::Expression { .. } if baseline.is_unsettled() => {}
                DependencySource::Expression { expr, .. } => {
                    if let Err(err) = scope.assign(expr, baseline.clone()) {
                        warn!(dependency = ?id, %err, "could not restore baseline");
                        first_error.get_or_insert(err);
                        continue;
                    }
                }
            }
            dep.is_changed = false;
            dep.last_seen = Some(baseline);
        }

        self.recompute_subtree(tree, form_id);
        if let Some(form) = tree.form_mut(form_id) {
            form.invalid_attempt = false;
        }

        match first_error {
            Some(err) => Err(err),
            None => {
                debug!(form = form_id.raw(), "reset form to baseline");
                Ok(())
            }
        }
    }

    /// Adopt every scoped current value as the new baseline.
    pub fn reset_changed(
        &mut self,
        tree: &mut FormTree,
        form_id: FormId,
        scope: &dyn Scope,
    ) -> Result<()> {
        if tree.form(form_id).is_none() {
            return Err(FormError::UnknownForm(form_id));
        }

        for id in self.scoped_dependencies(tree, form_id) {
            let Some(dep) = self.deps.get_mut(&id) else {
                continue;
            };
            let current = match &dep.source {
                DependencySource::Field(field_id) => tree
                    .field(*field_id)
                    .map(|field| field.value.clone())
                    .unwrap_or_default(),
                DependencySource::Expression { expr, .. } => {
                    scope.evaluate(expr).unwrap_or_default()
                }
            };
            dep.last_seen = Some(current.clone());
            dep.baseline = Some(current);
            dep.is_changed = false;
        }

        self.recompute_subtree(tree, form_id);
        debug!(form = form_id.raw(), "adopted current values as baseline");
        Ok(())
    }
}
