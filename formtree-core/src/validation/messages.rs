//! Message Templates
//!
//! Templates use positional placeholders: `{0}` is the field label and `{1}`
//! the parameter of the failure kind (`2` for a `minlength` of two). A
//! placeholder with no matching argument is left in the output verbatim.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Global failure-kind → template table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationMessages {
    templates: IndexMap<String, String>,
}

impl ValidationMessages {
    /// An empty table. Every failure kind is dropped until a template is set.
    pub fn empty() -> Self {
        Self {
            templates: IndexMap::new(),
        }
    }

    /// Get the template for a failure kind.
    pub fn get(&self, kind: &str) -> Option<&str> {
        self.templates.get(kind).map(String::as_str)
    }

    /// Set or replace the template for one failure kind.
    pub fn set(&mut self, kind: impl Into<String>, template: impl Into<String>) {
        self.templates.insert(kind.into(), template.into());
    }

    /// Replace the whole table.
    pub fn replace_all<I, K, V>(&mut self, templates: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.templates = templates
            .into_iter()
            .map(|(kind, template)| (kind.into(), template.into()))
            .collect();
    }

    /// Iterate over `(kind, template)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.templates
            .iter()
            .map(|(kind, template)| (kind.as_str(), template.as_str()))
    }
}

impl Default for ValidationMessages {
    fn default() -> Self {
        let mut messages = Self::empty();
        messages.set("required", "{0} is required.");
        messages.set("email", "The field {0} must be an email.");
        messages.set("minlength", "{0} must be at least {1} character(s).");
        messages.set("maxlength", "{0} must be less than {1} characters.");
        messages.set("min", "{0} must be at least {1}.");
        messages.set("max", "{0} must be at most {1}.");
        messages.set("pattern", "{0} is invalid.");
        messages.set("url", "{0} must be a valid URL.");
        messages.set("number", "{0} must be number.");
        messages
    }
}

/// Substitute `{n}` placeholders with `args[n]`.
pub fn string_format(template: &str, args: &[&str]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open + 1..];
        let digits = tail.bytes().take_while(u8::is_ascii_digit).count();

        if digits > 0 && tail.as_bytes().get(digits) == Some(&b'}') {
            let arg = tail[..digits]
                .parse::<usize>()
                .ok()
                .and_then(|index| args.get(index));
            match arg {
                Some(arg) => out.push_str(arg),
                None => out.push_str(&rest[open..open + digits + 2]),
            }
            rest = &tail[digits + 1..];
        } else {
            out.push('{');
            rest = tail;
        }
    }

    out.push_str(rest);
    out
}

/// Derive a display label from a model path.
///
/// Takes the last segment, drops a trailing `Id`, splits camel case and title
/// cases each word: `person.firstName` → `First Name`, `order.customerId` →
/// `Customer`.
pub fn label_from_model_path(path: &str) -> String {
    let last = path.rsplit('.').next().unwrap_or(path);
    let last = match last.strip_suffix("Id") {
        Some(stripped) if !stripped.is_empty() => stripped,
        _ => last,
    };

    let mut split = String::with_capacity(last.len() + 4);
    let mut previous_lower = false;
    for c in last.chars() {
        if previous_lower && c.is_ascii_uppercase() {
            split.push(' ');
        }
        previous_lower = c.is_ascii_lowercase();
        split.push(c);
    }

    split
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_are_positional() {
        assert_eq!(
            string_format("{0} must be at least {1} character(s).", &["Name", "2"]),
            "Name must be at least 2 character(s)."
        );
        assert_eq!(string_format("{1}{0}{1}", &["a", "b"]), "bab");
    }

    #[test]
    fn unresolvable_placeholders_stay_verbatim() {
        assert_eq!(string_format("{0} and {3}", &["x"]), "x and {3}");
        assert_eq!(string_format("{name} {", &[]), "{name} {");
        assert_eq!(string_format("{12", &["x"]), "{12");
    }

    #[test]
    fn defaults_cover_the_standard_kinds() {
        let messages = ValidationMessages::default();
        for kind in [
            "required", "email", "minlength", "maxlength", "min", "max", "pattern", "url",
            "number",
        ] {
            assert!(messages.get(kind).is_some(), "missing {kind}");
        }
        assert_eq!(messages.get("required"), Some("{0} is required."));
    }

    #[test]
    fn labels_are_derived_from_paths() {
        assert_eq!(label_from_model_path("person.firstName"), "First Name");
        assert_eq!(label_from_model_path("order.customerId"), "Customer");
        assert_eq!(label_from_model_path("email"), "Email");
        assert_eq!(label_from_model_path("a.b.zipCODE"), "Zip Code");
        assert_eq!(label_from_model_path("Id"), "Id");
    }

    #[test]
    fn table_deserializes_from_a_plain_object() {
        let messages: ValidationMessages =
            serde_json::from_str(r#"{"required":"Fill in {0}"}"#).unwrap();
        assert_eq!(messages.get("required"), Some("Fill in {0}"));
        assert_eq!(messages.get("email"), None);
    }
}
