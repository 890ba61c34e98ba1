//! Formtree Core
//!
//! This crate tracks the runtime state of a tree of nested forms. It
//! implements:
//!
//! - Hierarchical change detection that rolls up from fields to every
//!   enclosing form
//! - Aggregation of per-field validation messages into form-level lists
//! - Submit gating with pluggable busy indicators
//! - Error summaries published through a rendering-agnostic broker
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `graph`: Form and field arena plus change dependencies
//! - `reactive`: Loading gate, task queue and recomputation guard
//! - `validation`: Message templates and error aggregation
//! - `notify`: Notification broker and error summary watch
//! - `engine`: The host-facing entry point tying everything together
//!
//! # Example
//!
//! ```rust,ignore
//! use formtree_core::{FieldOptions, FormEngine, MapScope};
//!
//! let mut engine = FormEngine::new(MapScope::new());
//! let person = engine.register_form("person", None)?;
//! let name = engine.bind_field(person, "name", FieldOptions::new().label("Name"))?;
//!
//! // The first real value becomes the baseline once nothing is loading
//! engine.set_field_value(name, "Ada")?;
//! engine.tick();
//!
//! engine.set_field_value(name, "Grace")?;
//! assert!(engine.is_changed(person));
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod graph;
pub mod notify;
pub mod reactive;
pub mod scope;
pub mod strategy;
pub mod submit;
pub mod validation;
pub mod value;

pub use config::EngineConfig;
pub use engine::{FieldOptions, FormEngine, FormOptions};
pub use error::{FormError, Result};
pub use graph::{DependencyId, FieldId, FormId, WatchMode};
pub use notify::{EventKind, NotificationBroker, Payload};
pub use reactive::{Command, LoadingGate, TaskQueue};
pub use scope::{MapScope, Scope};
pub use submit::{ActionResult, SubmitOutcome};
pub use value::FieldValue;
