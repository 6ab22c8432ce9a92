//! Core infrastructure shared across the orchestrator crates.
//!
//! This crate provides the pieces every decision-and-protection component needs
//! but none of them should reimplement:
//! - an event system for observability (breakers, cache, drivers all emit through it)
//! - the stable error taxonomy from the orchestrator's propagation policy
//! - trace id allocation for per-request correlation

pub mod error;
pub mod events;
pub mod trace;

pub use error::{ErrorClass, OrchestratorError};
pub use events::{EventListener, EventListeners, FnListener, ResilienceEvent};
pub use trace::TraceId;
