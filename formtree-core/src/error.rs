//! Error types.
//!
//! Only configuration mistakes are errors. Validation failures are plain data
//! on [`FieldState`](crate::graph::FieldState) and never surface here.

use thiserror::Error;

use crate::graph::{DependencyId, FieldId, FormId};

/// Errors raised by the form engine.
///
/// All variants describe misuse by the integrating layer. They are returned
/// to the caller and never caught or retried internally.
#[derive(Debug, Error)]
pub enum FormError {
    /// The form id does not refer to a registered form.
    #[error("form {0:?} is not registered")]
    UnknownForm(FormId),

    /// The field id does not refer to a registered field.
    #[error("field {0:?} is not registered")]
    UnknownField(FieldId),

    /// The dependency id does not refer to a registered change dependency.
    #[error("change dependency {0:?} is not registered")]
    UnknownDependency(DependencyId),

    /// A form was registered without a name.
    #[error("forms must be registered with a non-empty name")]
    MissingFormName,

    /// A sibling with the same name already exists.
    #[error("a form named `{name}` is already registered under the same parent")]
    DuplicateForm { name: String },

    /// A field path did not contain a usable field name.
    #[error("`{0}` does not name a field; expected `formName.fieldName`")]
    MissingFieldName(String),

    /// No form with the given name exists.
    #[error("no form named `{0}` is registered")]
    UnknownFormName(String),

    /// More than one form carries the name; qualify it with its parents.
    #[error("more than one form is named `{0}`; use the dotted path from its root")]
    AmbiguousFormName(String),

    /// Expression dependencies need a non-empty expression so they can be reset.
    #[error("change dependency expressions must be non-empty")]
    InvalidExpression,

    /// The requested strategy is not registered.
    #[error("no {category} strategy named `{name}` is registered")]
    UnknownStrategy { category: &'static str, name: String },

    /// No name was given and no default is configured.
    #[error("no default {category} strategy is configured")]
    NoDefaultStrategy { category: &'static str },

    /// The operation was removed in favour of another one.
    #[error("`{operation}` has been deprecated in favour of `{replacement}`")]
    Deprecated {
        operation: &'static str,
        replacement: &'static str,
    },

    /// A scope refused to assign a value to an expression.
    #[error("cannot assign to `{expr}`: {reason}")]
    Assign { expr: String, reason: String },

    /// The configuration document could not be parsed.
    #[error("invalid engine configuration: {0}")]
    Config(#[from] serde_json::Error),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, FormError>;
