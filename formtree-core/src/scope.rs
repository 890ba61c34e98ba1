//! Expression Scope
//!
//! Expression dependencies watch values owned by the host, not by the form
//! tree. The host exposes them through [`Scope`]: the engine evaluates each
//! expression on every tick and assigns baselines back when a form is reset.

use crate::error::{FormError, Result};
use crate::value::FieldValue;

/// Evaluates and assigns expressions against the host's model.
pub trait Scope {
    /// Current value of `expr`, or `None` when it does not resolve.
    fn evaluate(&self, expr: &str) -> Option<FieldValue>;

    /// Write `value` to the location named by `expr`.
    fn assign(&mut self, expr: &str, value: FieldValue) -> Result<()>;
}

/// A scope backed by one nested map, addressed with dotted paths.
#[derive(Debug, Clone, PartialEq)]
pub struct MapScope {
    root: FieldValue,
}

impl MapScope {
    /// Create an empty scope.
    pub fn new() -> Self {
        Self {
            root: FieldValue::Map(Default::default()),
        }
    }

    /// Set a value at a dotted path.
    pub fn set(&mut self, path: &str, value: impl Into<FieldValue>) -> Result<()> {
        self.assign(path, value.into())
    }

    /// The whole model.
    pub fn root(&self) -> &FieldValue {
        &self.root
    }
}

impl Default for MapScope {
    fn default() -> Self {
        Self::new()
    }
}

impl From<FieldValue> for MapScope {
    fn from(root: FieldValue) -> Self {
        Self { root }
    }
}

impl Scope for MapScope {
    fn evaluate(&self, expr: &str) -> Option<FieldValue> {
        self.root.get_path(expr.trim()).cloned()
    }

    fn assign(&mut self, expr: &str, value: FieldValue) -> Result<()> {
        let expr = expr.trim();
        if expr.is_empty() {
            return Err(FormError::InvalidExpression);
        }
        if self.root.set_path(expr, value) {
            Ok(())
        } else {
            Err(FormError::Assign {
                expr: expr.to_string(),
                reason: "the path runs through a scalar or past the end of a list".to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_evaluate_nested_path() {
        let mut scope = MapScope::new();
        scope.set("person.address.city", "Oslo").unwrap();

        assert_eq!(
            scope.evaluate("person.address.city"),
            Some(FieldValue::from("Oslo"))
        );
        assert!(matches!(
            scope.evaluate("person.address"),
            Some(FieldValue::Map(_))
        ));
        assert_eq!(scope.evaluate("person.phone"), None);
    }

    #[test]
    fn assign_through_scalar_fails() {
        let mut scope = MapScope::new();
        scope.set("count", 3).unwrap();

        assert!(matches!(
            scope.set("count.inner", 1),
            Err(FormError::Assign { .. })
        ));
        assert!(matches!(
            scope.assign(" ", FieldValue::Null),
            Err(FormError::InvalidExpression)
        ));
    }
}
