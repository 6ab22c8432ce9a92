//! Tool registry and planner-step executor.
//!
//! Tools are declared as `{ name, handler, optional fallback tool name }`.
//! The executor runs a step under a timeout, and on failure consults the
//! tool's fallback edge subject to the aggregate (not per-call) failure
//! circuit in [`failure`].

mod executor;
mod failure;
mod registry;

pub use executor::{ExecutionOutcome, Executor, ExecutorConfig, StepOutcome};
pub use failure::{AggregateFailureTracker, ToolFailure, ToolFailureKind};
pub use registry::{ToolHandler, ToolRegistry, ToolSpec};
