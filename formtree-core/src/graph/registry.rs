//! Form Registry
//!
//! The registry is the arena that owns every form and field. Parent and child
//! links are stored as ids, so tearing down a subtree is a pure data
//! operation and stale ids simply stop resolving.
//!
//! # Naming
//!
//! Form names are unique among siblings. Root forms count as siblings of each
//! other, so two unrelated trees cannot both be called `person`, but
//! `person.address` and `company.address` can coexist.
//!
//! # Teardown
//!
//! [`FormTree::deregister_form`] removes a form together with its subtree and
//! reports what went away. It does not touch the surviving ancestors' error
//! lists or changed flags; the engine's teardown path does that with the
//! returned [`DetachedSubtree`].

use indexmap::IndexMap;
use smallvec::SmallVec;
use tracing::{debug, trace};

use super::node::{DependencyId, FieldId, FieldState, FormId, FormNode};
use crate::error::{FormError, Result};

/// Ancestor chains are short in practice.
pub type FormChain = SmallVec<[FormId; 8]>;

/// Everything removed by one call to [`FormTree::deregister_form`].
#[derive(Debug, Default)]
pub struct DetachedSubtree {
    /// The surviving parent, if the removed form was nested.
    pub parent: Option<FormId>,
    /// Removed forms, the detached root first.
    pub forms: Vec<FormId>,
    /// Fields owned by the removed forms.
    pub fields: Vec<FieldId>,
    /// Change dependencies owned by the removed forms.
    pub dependencies: Vec<DependencyId>,
}

/// Arena of forms and fields.
#[derive(Debug, Default)]
pub struct FormTree {
    forms: IndexMap<FormId, FormNode>,
    fields: IndexMap<FieldId, FieldState>,
}

impl FormTree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a form, attaching it to `parent` when given.
    pub fn register_form(&mut self, name: &str, parent: Option<FormId>) -> Result<FormId> {
        if name.is_empty() {
            return Err(FormError::MissingFormName);
        }

        let siblings: Vec<FormId> = match parent {
            Some(parent_id) => self
                .forms
                .get(&parent_id)
                .ok_or(FormError::UnknownForm(parent_id))?
                .children
                .clone(),
            None => self.roots().collect(),
        };
        if siblings
            .iter()
            .filter_map(|id| self.forms.get(id))
            .any(|sibling| sibling.name() == name)
        {
            return Err(FormError::DuplicateForm {
                name: name.to_string(),
            });
        }

        let node = FormNode::new(name, parent);
        let id = node.id();
        self.forms.insert(id, node);

        if let Some(parent_id) = parent {
            if let Some(parent_node) = self.forms.get_mut(&parent_id) {
                parent_node.children.push(id);
            }
        }

        debug!(form = id.raw(), name, parent = ?parent, "registered form");
        Ok(id)
    }

    /// Remove a form and its whole subtree.
    ///
    /// Returns `None` when the form is already gone, which makes repeated
    /// teardown harmless.
    pub fn deregister_form(&mut self, form_id: FormId) -> Option<DetachedSubtree> {
        let Some(parent) = self.forms.get(&form_id).map(|node| node.parent) else {
            trace!(form = form_id.raw(), "deregister of unknown form ignored");
            return None;
        };

        let mut detached = DetachedSubtree {
            parent,
            ..DetachedSubtree::default()
        };

        for id in self.descendants(form_id) {
            if let Some(node) = self.forms.shift_remove(&id) {
                for field_id in node.fields.values() {
                    self.fields.shift_remove(field_id);
                    detached.fields.push(*field_id);
                }
                detached.dependencies.extend(node.dependencies.iter().copied());
                detached.forms.push(id);
            }
        }

        if let Some(parent_id) = parent {
            if let Some(parent_node) = self.forms.get_mut(&parent_id) {
                parent_node.children.retain(|child| *child != form_id);
            }
        }

        debug!(
            form = form_id.raw(),
            forms = detached.forms.len(),
            fields = detached.fields.len(),
            "deregistered form subtree"
        );
        Some(detached)
    }

    /// Get a reference to a form.
    pub fn form(&self, form_id: FormId) -> Option<&FormNode> {
        self.forms.get(&form_id)
    }

    /// Get a mutable reference to a form.
    pub fn form_mut(&mut self, form_id: FormId) -> Option<&mut FormNode> {
        self.forms.get_mut(&form_id)
    }

    /// Get a reference to a field.
    pub fn field(&self, field_id: FieldId) -> Option<&FieldState> {
        self.fields.get(&field_id)
    }

    /// Get a mutable reference to a field.
    pub fn field_mut(&mut self, field_id: FieldId) -> Option<&mut FieldState> {
        self.fields.get_mut(&field_id)
    }

    /// Iterate over root forms in registration order.
    pub fn roots(&self) -> impl Iterator<Item = FormId> + '_ {
        self.forms
            .values()
            .filter(|node| node.is_root())
            .map(FormNode::id)
    }

    /// Get the field called `name` on `form_id`, creating it on first use.
    pub fn ensure_field(&mut self, form_id: FormId, name: &str, label: &str) -> Result<FieldId> {
        let form = self
            .forms
            .get_mut(&form_id)
            .ok_or(FormError::UnknownForm(form_id))?;

        if let Some(existing) = form.fields.get(name) {
            return Ok(*existing);
        }

        let field = FieldState::new(name, form_id, label);
        let id = field.id();
        form.fields.insert(name.to_string(), id);
        self.fields.insert(id, field);

        trace!(form = form_id.raw(), field = id.raw(), name, "registered field");
        Ok(id)
    }

    /// Remove a single field from its form.
    pub fn remove_field(&mut self, field_id: FieldId) -> Option<FieldState> {
        let field = self.fields.shift_remove(&field_id)?;
        if let Some(form) = self.forms.get_mut(&field.form()) {
            form.fields.shift_remove(field.name());
        }
        Some(field)
    }

    /// The form itself followed by every ancestor up to the root.
    pub fn chain(&self, form_id: FormId) -> FormChain {
        let mut chain = FormChain::new();
        let mut current = Some(form_id);

        while let Some(id) = current {
            let Some(node) = self.forms.get(&id) else {
                break;
            };
            chain.push(id);
            current = node.parent;
        }

        chain
    }

    /// The root of the tree containing `form_id`.
    pub fn root_of(&self, form_id: FormId) -> Option<FormId> {
        self.chain(form_id).last().copied()
    }

    /// The form and all nested forms, parents before children.
    pub fn descendants(&self, form_id: FormId) -> Vec<FormId> {
        let mut result = Vec::new();
        let mut stack = vec![form_id];

        while let Some(id) = stack.pop() {
            if let Some(node) = self.forms.get(&id) {
                result.push(id);
                stack.extend(node.children.iter().rev().copied());
            }
        }

        result
    }

    /// Every field in the subtree rooted at `form_id`.
    pub fn subtree_fields(&self, form_id: FormId) -> Vec<FieldId> {
        self.descendants(form_id)
            .into_iter()
            .filter_map(|id| self.forms.get(&id))
            .flat_map(|node| node.fields.values().copied())
            .collect()
    }

    /// True when any field in the subtree has an active failure.
    pub fn is_invalid(&self, form_id: FormId) -> bool {
        self.subtree_fields(form_id)
            .into_iter()
            .filter_map(|id| self.fields.get(&id))
            .any(FieldState::is_invalid)
    }

    /// Resolve `formName.fieldName`, creating the field on first use.
    ///
    /// A dotted form part (`outer.inner.field`) is walked from the roots, one
    /// child name per segment. A single form name may refer to a form at any
    /// depth, but only when no other form shares it.
    pub fn resolve_field_path(&mut self, path: &str, label: &str) -> Result<FieldId> {
        let Some((form_path, field_name)) = path.rsplit_once('.') else {
            return Err(FormError::MissingFieldName(path.to_string()));
        };
        if field_name.is_empty() || form_path.is_empty() {
            return Err(FormError::MissingFieldName(path.to_string()));
        }

        let form_id = if form_path.contains('.') {
            self.walk_form_path(form_path)?
        } else {
            self.find_unique_form(form_path)?
        };

        self.ensure_field(form_id, field_name, label)
    }

    fn walk_form_path(&self, form_path: &str) -> Result<FormId> {
        let mut candidates: Vec<FormId> = self.roots().collect();
        let mut found = None;

        for segment in form_path.split('.') {
            let next = candidates
                .iter()
                .filter_map(|id| self.forms.get(id))
                .find(|node| node.name() == segment)
                .ok_or_else(|| FormError::UnknownFormName(form_path.to_string()))?;
            candidates = next.children.clone();
            found = Some(next.id());
        }

        found.ok_or_else(|| FormError::UnknownFormName(form_path.to_string()))
    }

    fn find_unique_form(&self, name: &str) -> Result<FormId> {
        let mut matches = self
            .forms
            .values()
            .filter(|node| node.name() == name)
            .map(FormNode::id);

        match (matches.next(), matches.next()) {
            (Some(id), None) => Ok(id),
            (Some(_), Some(_)) => Err(FormError::AmbiguousFormName(name.to_string())),
            (None, _) => Err(FormError::UnknownFormName(name.to_string())),
        }
    }

    /// Get the total number of forms.
    pub fn form_count(&self) -> usize {
        self.forms.len()
    }

    /// Get the total number of fields.
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nested() -> (FormTree, FormId, FormId, FormId) {
        let mut tree = FormTree::new();
        let a = tree.register_form("a", None).unwrap();
        let b = tree.register_form("b", Some(a)).unwrap();
        let c = tree.register_form("c", Some(b)).unwrap();
        (tree, a, b, c)
    }

    #[test]
    fn register_links_parent_and_child() {
        let (tree, a, b, c) = nested();

        assert_eq!(tree.form(a).unwrap().children(), &[b]);
        assert_eq!(tree.form(c).unwrap().parent(), Some(b));
        assert_eq!(tree.chain(c).as_slice(), &[c, b, a]);
        assert_eq!(tree.root_of(c), Some(a));
    }

    #[test]
    fn register_rejects_unknown_parent() {
        let mut tree = FormTree::new();
        let ghost = FormId::new();
        assert!(matches!(
            tree.register_form("x", Some(ghost)),
            Err(FormError::UnknownForm(id)) if id == ghost
        ));
    }

    #[test]
    fn names_are_unique_among_siblings_only() {
        let (mut tree, a, b, _) = nested();

        assert!(matches!(
            tree.register_form("b", Some(a)),
            Err(FormError::DuplicateForm { .. })
        ));
        assert!(matches!(
            tree.register_form("a", None),
            Err(FormError::DuplicateForm { .. })
        ));
        assert!(tree.register_form("b", Some(b)).is_ok());
        assert!(matches!(
            tree.register_form("", None),
            Err(FormError::MissingFormName)
        ));
    }

    #[test]
    fn fields_are_created_lazily_once() {
        let (mut tree, _, _, c) = nested();

        let first = tree.ensure_field(c, "x", "X").unwrap();
        let second = tree.ensure_field(c, "x", "ignored").unwrap();

        assert_eq!(first, second);
        assert_eq!(tree.field(first).unwrap().label(), "X");
        assert_eq!(tree.field_count(), 1);
    }

    #[test]
    fn deregister_removes_subtree() {
        let (mut tree, a, b, c) = nested();
        let x = tree.ensure_field(c, "x", "X").unwrap();

        let detached = tree.deregister_form(b).unwrap();

        assert_eq!(detached.parent, Some(a));
        assert_eq!(detached.forms, vec![b, c]);
        assert_eq!(detached.fields, vec![x]);
        assert!(tree.form(a).unwrap().children().is_empty());
        assert!(tree.form(c).is_none());
        assert!(tree.field(x).is_none());
    }

    #[test]
    fn deregister_twice_is_a_no_op() {
        let (mut tree, a, b, _) = nested();

        assert!(tree.deregister_form(b).is_some());
        assert!(tree.deregister_form(b).is_none());
        assert_eq!(tree.form_count(), 1);
        assert!(tree.form(a).is_some());
    }

    #[test]
    fn invalidity_covers_the_subtree() {
        let (mut tree, a, b, c) = nested();
        let x = tree.ensure_field(c, "x", "X").unwrap();

        assert!(!tree.is_invalid(a));
        tree.field_mut(x).unwrap().failures.insert("required".into(), true);

        assert!(tree.is_invalid(a));
        assert!(tree.is_invalid(b));
        assert!(tree.is_invalid(c));
    }

    #[test]
    fn field_paths_need_a_field_name() {
        let (mut tree, _, b, _) = nested();

        let id = tree.resolve_field_path("b.email", "Email").unwrap();
        assert_eq!(tree.form(b).unwrap().field("email"), Some(id));

        assert!(matches!(
            tree.resolve_field_path("b", "x"),
            Err(FormError::MissingFieldName(_))
        ));
        assert!(matches!(
            tree.resolve_field_path("b.", "x"),
            Err(FormError::MissingFieldName(_))
        ));
        assert!(matches!(
            tree.resolve_field_path("nope.email", "x"),
            Err(FormError::UnknownFormName(_))
        ));
    }

    #[test]
    fn dotted_paths_walk_from_the_roots() {
        let mut tree = FormTree::new();
        let a = tree.register_form("a", None).unwrap();
        let b = tree.register_form("b", None).unwrap();
        let a_inner = tree.register_form("inner", Some(a)).unwrap();
        let b_inner = tree.register_form("inner", Some(b)).unwrap();

        let email = tree.resolve_field_path("b.inner.email", "Email").unwrap();
        assert_eq!(tree.form(b_inner).unwrap().field("email"), Some(email));
        assert_eq!(tree.form(a_inner).unwrap().field("email"), None);

        // A bare shared name does not pick one of them
        assert!(matches!(
            tree.resolve_field_path("inner.email", "Email"),
            Err(FormError::AmbiguousFormName(_))
        ));
        // Paths start at a root
        assert!(matches!(
            tree.resolve_field_path("inner.b.email", "Email"),
            Err(FormError::UnknownFormName(_))
        ));
        assert!(matches!(
            tree.resolve_field_path("a.missing.email", "Email"),
            Err(FormError::UnknownFormName(_))
        ));
    }
}
