//! Scheduling Primitives
//!
//! The engine is single-threaded and tick driven. This module holds the
//! pieces that decide *when* work happens:
//!
//! - [`LoadingGate`]: process-wide counter of in-flight loads with a queue of
//!   callbacks that run once loading settles.
//! - [`TaskQueue`]: commands deferred to the next tick.
//! - [`RecomputeContext`]: guard that keeps recomputation passes from
//!   interleaving.
//! - [`Subscription`]: drop handle for broker subscribers.

mod context;
mod loading;
mod subscriber;
mod tasks;

pub use context::{PassKind, RecomputeContext};
pub use loading::{DoneLoading, LoadingGate, LoadingGuard};
pub use subscriber::{SubscriberId, Subscription};
pub use tasks::{Command, TaskQueue};
