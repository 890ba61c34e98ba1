//! Engine Configuration
//!
//! Every field has a default, so a configuration document only needs to name
//! what it overrides:
//!
//! ```json
//! {
//!   "validation_messages": { "required": "Please fill in {0}." },
//!   "default_busy_strategy": "disable",
//!   "default_notify_target": null
//! }
//! ```
//!
//! Note that `validation_messages` replaces the whole template table.

use serde::Deserialize;

use crate::error::Result;
use crate::validation::ValidationMessages;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Global failure-kind templates.
    pub validation_messages: ValidationMessages,

    /// Label used for fields bound without one.
    pub default_label: String,

    /// Channel for error summaries. `None` disables summaries for forms that
    /// do not name their own channel.
    pub default_notify_target: Option<String>,

    pub default_busy_strategy: Option<String>,
    pub default_navigate_away_strategy: Option<String>,

    /// Upper bound on command-drain passes within one tick.
    pub max_tick_passes: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            validation_messages: ValidationMessages::default(),
            default_label: "This field".to_string(),
            default_notify_target: Some("default".to_string()),
            default_busy_strategy: Some("none".to_string()),
            default_navigate_away_strategy: Some("none".to_string()),
            max_tick_passes: 10,
        }
    }
}

impl EngineConfig {
    /// Parse a JSON configuration document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FormError;

    #[test]
    fn empty_document_gives_defaults() {
        let config = EngineConfig::from_json_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.default_label, "This field");
        assert_eq!(config.max_tick_passes, 10);
    }

    #[test]
    fn overrides_are_applied() {
        let config = EngineConfig::from_json_str(
            r#"{
                "validation_messages": { "required": "Please fill in {0}." },
                "default_notify_target": null,
                "default_busy_strategy": "disable"
            }"#,
        )
        .unwrap();

        assert_eq!(config.validation_messages.get("required"), Some("Please fill in {0}."));
        assert_eq!(config.validation_messages.get("email"), None);
        assert_eq!(config.default_notify_target, None);
        assert_eq!(config.default_busy_strategy.as_deref(), Some("disable"));
        assert_eq!(config.default_navigate_away_strategy.as_deref(), Some("none"));
    }

    #[test]
    fn malformed_document_is_a_config_error() {
        assert!(matches!(
            EngineConfig::from_json_str(r#"{"max_tick_passes": "many"}"#),
            Err(FormError::Config(_))
        ));
    }
}
