//! Graph Nodes
//!
//! This module defines the records that live in the form arena: forms,
//! fields and the identifiers used to address them.

use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use serde::Serialize;
use smallvec::SmallVec;

use crate::value::FieldValue;

/// Unique identifier for a form in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct FormId(u64);

impl FormId {
    /// Generate a new unique form ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for FormId {
    fn default() -> Self {
        Self::new()
    }
}

/// Unique identifier for a field.
///
/// Field ids are never reused, so a stale id simply stops resolving once its
/// field is torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct FieldId(u64);

impl FieldId {
    /// Generate a new unique field ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for FieldId {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to a change dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DependencyId(u64);

impl DependencyId {
    /// Generate a new unique dependency ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for DependencyId {
    fn default() -> Self {
        Self::new()
    }
}

/// Opaque token the rendering layer attaches to a field (an element id,
/// a widget key). The core only stores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderHandle(pub u64);

/// Raw validation failures of a field, keyed by failure kind.
///
/// Iteration order is insertion order, which fixes the order in which
/// messages are produced.
pub type FailureSet = IndexMap<String, bool>;

/// One rendered message in a form's aggregated error list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatedError {
    /// The field the message belongs to.
    pub field: FieldId,
    /// The rendered message.
    pub message: String,
}

/// A form in the tree.
#[derive(Debug)]
pub struct FormNode {
    id: FormId,
    name: String,

    /// The enclosing form. `None` only for roots.
    pub(crate) parent: Option<FormId>,

    /// Nested forms, in registration order.
    pub(crate) children: Vec<FormId>,

    /// Fields registered directly on this form.
    pub(crate) fields: IndexMap<String, FieldId>,

    /// Change dependencies owned by this form (not its descendants).
    pub(crate) dependencies: Vec<DependencyId>,

    /// Errors of every field in this form's subtree.
    pub(crate) errors: Vec<AggregatedError>,

    pub(crate) changed: bool,
    pub(crate) invalid_attempt: bool,
}

impl FormNode {
    pub(crate) fn new(name: &str, parent: Option<FormId>) -> Self {
        Self {
            id: FormId::new(),
            name: name.to_string(),
            parent,
            children: Vec::new(),
            fields: IndexMap::new(),
            dependencies: Vec::new(),
            errors: Vec::new(),
            changed: false,
            invalid_attempt: false,
        }
    }

    /// Get the form's ID.
    pub fn id(&self) -> FormId {
        self.id
    }

    /// Get the form's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the enclosing form, if any.
    pub fn parent(&self) -> Option<FormId> {
        self.parent
    }

    /// Check whether this is a root form.
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Get the nested forms.
    pub fn children(&self) -> &[FormId] {
        &self.children
    }

    /// Look up a field registered directly on this form.
    pub fn field(&self, name: &str) -> Option<FieldId> {
        self.fields.get(name).copied()
    }

    /// Iterate over fields registered directly on this form.
    pub fn fields(&self) -> impl Iterator<Item = (&str, FieldId)> {
        self.fields.iter().map(|(name, id)| (name.as_str(), *id))
    }

    /// Get the change dependencies owned by this form.
    pub fn dependencies(&self) -> &[DependencyId] {
        &self.dependencies
    }

    /// Get the aggregated errors of this form's subtree.
    pub fn errors(&self) -> &[AggregatedError] {
        &self.errors
    }

    /// True when any dependency in this form's subtree differs from its baseline.
    pub fn is_changed(&self) -> bool {
        self.changed
    }

    /// True when the last submit attempt happened while the tree was invalid.
    pub fn invalid_attempt(&self) -> bool {
        self.invalid_attempt
    }
}

/// Per-field state within a form.
#[derive(Debug)]
pub struct FieldState {
    id: FieldId,
    name: String,
    form: FormId,

    pub(crate) label: String,
    pub(crate) had_focus: bool,
    pub(crate) failures: FailureSet,

    /// Rendered messages, rebuilt from `failures` on every change.
    pub(crate) messages: SmallVec<[String; 2]>,

    /// Per-kind template overrides.
    pub(crate) templates: IndexMap<String, String>,

    /// Per-kind template parameters (`minlength` -> `"2"`).
    pub(crate) params: IndexMap<String, String>,

    /// Numeric inputs report unparseable text as `required`.
    pub(crate) numeric: bool,

    pub(crate) value: FieldValue,
    pub(crate) dependency: Option<DependencyId>,
    pub(crate) handle: Option<RenderHandle>,
}

impl FieldState {
    pub(crate) fn new(name: &str, form: FormId, label: &str) -> Self {
        Self {
            id: FieldId::new(),
            name: name.to_string(),
            form,
            label: label.to_string(),
            had_focus: false,
            failures: FailureSet::new(),
            messages: SmallVec::new(),
            templates: IndexMap::new(),
            params: IndexMap::new(),
            numeric: false,
            value: FieldValue::unset(),
            dependency: None,
            handle: None,
        }
    }

    /// Get the field's ID.
    pub fn id(&self) -> FieldId {
        self.id
    }

    /// Get the field's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the owning form.
    pub fn form(&self) -> FormId {
        self.form
    }

    /// Get the display label used in messages.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// True once the field has lost focus at least once.
    pub fn had_focus(&self) -> bool {
        self.had_focus
    }

    /// Get the raw failure set.
    pub fn failures(&self) -> &FailureSet {
        &self.failures
    }

    /// True when any failure kind is active.
    pub fn is_invalid(&self) -> bool {
        self.failures.values().any(|active| *active)
    }

    /// Get the rendered messages.
    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// Check if `required` renders with the number template.
    pub fn is_numeric(&self) -> bool {
        self.numeric
    }

    /// Get the current model value.
    pub fn value(&self) -> &FieldValue {
        &self.value
    }

    /// Get the change dependency tracking this field, once bound.
    pub fn dependency(&self) -> Option<DependencyId> {
        self.dependency
    }

    /// Get the rendering layer's handle.
    pub fn handle(&self) -> Option<RenderHandle> {
        self.handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        assert_ne!(FormId::new(), FormId::new());
        assert_ne!(FieldId::new(), FieldId::new());
        assert_ne!(DependencyId::new(), DependencyId::new());
    }

    #[test]
    fn new_form_is_clean() {
        let form = FormNode::new("person", None);
        assert!(form.is_root());
        assert!(!form.is_changed());
        assert!(!form.invalid_attempt());
        assert!(form.errors().is_empty());
    }

    #[test]
    fn new_field_is_unset_and_valid() {
        let form = FormId::new();
        let field = FieldState::new("email", form, "This field");
        assert_eq!(field.form(), form);
        assert!(field.value().is_unsettled());
        assert!(!field.is_invalid());
        assert!(field.dependency().is_none());
    }

    #[test]
    fn inactive_failures_do_not_invalidate() {
        let mut field = FieldState::new("email", FormId::new(), "Email");
        field.failures.insert("required".into(), false);
        assert!(!field.is_invalid());

        field.failures.insert("email".into(), true);
        assert!(field.is_invalid());
    }
}
