//! Circuit breakers protecting the orchestrator's downstream dependencies.
//!
//! Unlike a `tower::Layer`-based breaker sitting in front of a generic
//! `Service`, every dependency here (NLU, planner/deep tiers, individual
//! tools) is called directly with `.await`, so [`Breaker`] exposes a small
//! guard-call API instead: ask [`Breaker::try_acquire`], make the call
//! yourself, then report the outcome with [`Breaker::record_success`] or
//! [`Breaker::record_failure`]. [`Breaker::guard`] wraps that dance around an
//! arbitrary future for the common case.

mod circuit;
mod config;
mod error;
mod events;
mod registry;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex;

pub use circuit::{CircuitMetrics, CircuitState};
pub use config::{BreakerConfig, BreakerConfigBuilder, SlidingWindowType};
pub use error::BreakerError;
pub use events::BreakerEvent;
pub use registry::BreakerRegistry;

use circuit::Circuit;

/// A single named circuit breaker instance.
pub struct Breaker {
    circuit: Mutex<Circuit>,
    state_atomic: Arc<std::sync::atomic::AtomicU8>,
    config: BreakerConfig,
}

impl Breaker {
    pub fn new(config: BreakerConfig) -> Self {
        let state_atomic = Arc::new(std::sync::atomic::AtomicU8::new(CircuitState::Closed as u8));
        Self {
            circuit: Mutex::new(Circuit::new_with_atomic(Arc::clone(&state_atomic))),
            state_atomic,
            config,
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Returns `true` if a call may be attempted right now. Every caller that
    /// gets `true` back must eventually call `record_success`/`record_failure`.
    pub async fn try_acquire(&self) -> bool {
        let mut circuit = self.circuit.lock().await;
        circuit.try_acquire(&self.config)
    }

    pub async fn record_success(&self, elapsed: std::time::Duration) {
        let mut circuit = self.circuit.lock().await;
        circuit.record_success(&self.config, elapsed);
    }

    pub async fn record_failure(&self, elapsed: std::time::Duration) {
        let mut circuit = self.circuit.lock().await;
        circuit.record_failure(&self.config, elapsed);
    }

    /// Runs `f` if the circuit permits it, recording the outcome based on
    /// whether the future resolved to `Ok`. Returns [`BreakerError::Open`]
    /// without calling `f` if the circuit is open or half-open is saturated.
    pub async fn guard<F, Fut, T, E>(&self, f: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        if !self.try_acquire().await {
            return Err(BreakerError::Open);
        }

        let start = Instant::now();
        let result = f().await;
        let elapsed = start.elapsed();

        match &result {
            Ok(_) => self.record_success(elapsed).await,
            Err(_) => self.record_failure(elapsed).await,
        }

        result.map_err(BreakerError::Inner)
    }

    pub async fn force_open(&self) {
        let mut circuit = self.circuit.lock().await;
        circuit.force_open(&self.config);
    }

    pub async fn force_closed(&self) {
        let mut circuit = self.circuit.lock().await;
        circuit.force_closed(&self.config);
    }

    pub async fn reset(&self) {
        let mut circuit = self.circuit.lock().await;
        circuit.reset(&self.config);
    }

    pub async fn state(&self) -> CircuitState {
        let circuit = self.circuit.lock().await;
        circuit.state()
    }

    /// Reads the breaker's state without taking the lock. Safe to call from
    /// health/metrics endpoints on the request's hot path.
    pub fn state_sync(&self) -> CircuitState {
        CircuitState::from_u8(self.state_atomic.load(Ordering::Acquire))
    }

    pub async fn metrics(&self) -> CircuitMetrics {
        let circuit = self.circuit.lock().await;
        circuit.metrics()
    }
}
