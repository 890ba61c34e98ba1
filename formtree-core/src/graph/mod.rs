//! Form Graph
//!
//! The form graph is a tree of forms, each owning named fields, plus the
//! change dependencies used to decide whether a form differs from its
//! baseline.
//!
//! # Design Decisions
//!
//! 1. Forms and fields live in an arena addressed by ids. Parent and child
//!    links are ids too, so there are no ownership cycles and a torn-down
//!    subtree leaves nothing dangling.
//!
//! 2. A form stores only its own dependencies. Ancestors learn about a change
//!    through an explicit root-ward walk at mutation time, where every form on
//!    the path recomputes its flag from its own dependencies and its
//!    children's flags. Reading a flag never walks the tree.
//!
//! 3. Error lists are the exception: each form keeps the errors of its whole
//!    subtree, maintained by the same root-ward walk, so a summary can be read
//!    straight off any form.

mod changes;
mod node;
mod registry;

pub use changes::{ChangeDependency, ChangeGraph, DependencySource, WatchMode};
pub use node::{
    AggregatedError, DependencyId, FailureSet, FieldId, FieldState, FormId, FormNode,
    RenderHandle,
};
pub use registry::{DetachedSubtree, FormChain, FormTree};
