//! Error Aggregation
//!
//! Every form keeps the rendered errors of every field in its subtree. When a
//! field's failure set changes, its messages are re-rendered and replicated
//! into the owning form and each ancestor: the field's old entries are
//! removed, then the new messages are appended in failure-set order. Each
//! list therefore holds a field's messages exactly once.

use smallvec::SmallVec;
use tracing::trace;

use super::messages::{string_format, ValidationMessages};
use crate::error::{FormError, Result};
use crate::graph::{AggregatedError, FailureSet, FieldId, FieldState, FormId, FormTree};
use crate::reactive::{PassKind, RecomputeContext};

/// Render the messages of a field's active failures.
///
/// Kinds without a template are skipped. A `required` failure on a numeric
/// field is reported with the `number` template, since numeric inputs flag
/// unparseable text as missing.
pub fn render_messages(field: &FieldState, messages: &ValidationMessages) -> SmallVec<[String; 2]> {
    let mut rendered = SmallVec::new();

    for (kind, active) in field.failures() {
        if !*active {
            continue;
        }
        let kind = if field.numeric && kind == "required" {
            "number"
        } else {
            kind.as_str()
        };

        let Some(template) = field
            .templates
            .get(kind)
            .map(String::as_str)
            .or_else(|| messages.get(kind))
        else {
            trace!(field = field.id().raw(), kind, "no template for failure kind");
            continue;
        };

        let message = match field.params.get(kind) {
            Some(param) => string_format(template, &[field.label(), param]),
            None => string_format(template, &[field.label()]),
        };
        rendered.push(message);
    }

    rendered
}

/// Replace a field's failure set and propagate the new messages.
pub fn recompute_field(
    tree: &mut FormTree,
    field_id: FieldId,
    failures: FailureSet,
    messages: &ValidationMessages,
) -> Result<()> {
    let field = tree
        .field_mut(field_id)
        .ok_or(FormError::UnknownField(field_id))?;
    field.failures = failures;
    refresh_field(tree, field_id, messages)
}

/// Re-render a field's messages from its current failures and propagate them.
pub fn refresh_field(
    tree: &mut FormTree,
    field_id: FieldId,
    messages: &ValidationMessages,
) -> Result<()> {
    let field = tree
        .field_mut(field_id)
        .ok_or(FormError::UnknownField(field_id))?;
    field.messages = render_messages(field, messages);
    let form_id = field.form();
    let rendered = field.messages.clone();

    let _pass = RecomputeContext::enter(PassKind::Errors, form_id);
    let chain = tree.chain(form_id);
    for id in &chain {
        if let Some(form) = tree.form_mut(*id) {
            form.errors.retain(|error| error.field != field_id);
            form.errors.extend(rendered.iter().map(|message| AggregatedError {
                field: field_id,
                message: message.clone(),
            }));
        }
    }

    trace!(
        field = field_id.raw(),
        messages = rendered.len(),
        forms = chain.len(),
        "replicated field errors"
    );
    Ok(())
}

/// Remove the entries of `fields` from `from` and every ancestor.
pub fn purge_fields(tree: &mut FormTree, fields: &[FieldId], from: FormId) {
    if fields.is_empty() {
        return;
    }

    let _pass = RecomputeContext::enter(PassKind::Errors, from);
    for id in tree.chain(from) {
        if let Some(form) = tree.form_mut(id) {
            form.errors.retain(|error| !fields.contains(&error.field));
        }
    }
}

/// The errors a summary should show right now.
///
/// After an invalid submit attempt that is every error; before it, only the
/// errors of fields the user has already left.
pub fn errors_to_display(tree: &FormTree, form_id: FormId) -> Vec<AggregatedError> {
    let Some(form) = tree.form(form_id) else {
        return Vec::new();
    };
    if form.invalid_attempt() {
        return form.errors().to_vec();
    }

    form.errors()
        .iter()
        .filter(|error| tree.field(error.field).is_some_and(FieldState::had_focus))
        .cloned()
        .collect()
}

/// Whether a field's own messages should be shown next to it.
pub fn show_field_messages(tree: &FormTree, field_id: FieldId) -> bool {
    let Some(field) = tree.field(field_id) else {
        return false;
    };
    field.had_focus()
        || tree
            .form(field.form())
            .is_some_and(|form| form.invalid_attempt())
}

/// Forget that a submit was attempted and that erroneous fields were visited.
pub fn clear_errors(tree: &mut FormTree, form_id: FormId) -> Result<()> {
    let form = tree
        .form_mut(form_id)
        .ok_or(FormError::UnknownForm(form_id))?;
    form.invalid_attempt = false;

    let erroneous: Vec<FieldId> = form.errors.iter().map(|error| error.field).collect();
    for field_id in erroneous {
        if let Some(field) = tree.field_mut(field_id) {
            field.had_focus = false;
        }
    }
    Ok(())
}
