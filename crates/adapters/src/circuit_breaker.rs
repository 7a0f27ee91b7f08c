// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-dependency circuit breaker.
//!
//! CLOSED → OPEN → HALF_OPEN → CLOSED. Breakers are in-process singletons
//! ("module-level mutable state"); their counters are mutex
//! protected and updated on every call.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Closed,
    Open,
    HalfOpen,
}

struct Inner {
    state: State,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub reset_timeout: Duration,
}

impl CircuitBreakerConfig {
    /// Default used for the memory service (30s reset).
    pub fn memory_service() -> Self {
        Self {
            failure_threshold: 3,
            reset_timeout: Duration::from_secs(30),
        }
    }

    /// Default used for model back-ends (60s reset).
    pub fn model_backend() -> Self {
        Self {
            failure_threshold: 3,
            reset_timeout: Duration::from_secs(60),
        }
    }
}

/// A single breaker guarding one dependency.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                state: State::Closed,
                consecutive_failures: 0,
                opened_at: None,
            }),
        }
    }

    /// True if a call is currently allowed through (closed, or open past
    /// its reset timeout — transitions to half-open as a side effect).
    fn admit(&self) -> bool {
        let mut inner = self.inner.lock();
        match inner.state {
            State::Closed | State::HalfOpen => true,
            State::Open => {
                let elapsed = inner.opened_at.map(|t| t.elapsed()).unwrap_or_default();
                if elapsed >= self.config.reset_timeout {
                    inner.state = State::HalfOpen;
                    true
                } else {
                    false
                }
            }
        }
    }

    fn record_success(&self) {
        let mut inner = self.inner.lock();
        inner.state = State::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
    }

    fn record_failure(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            State::HalfOpen => {
                inner.state = State::Open;
                inner.opened_at = Some(Instant::now());
            }
            State::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.config.failure_threshold {
                    inner.state = State::Open;
                    inner.opened_at = Some(Instant::now());
                }
            }
            State::Open => {
                inner.opened_at = Some(Instant::now());
            }
        }
    }

    /// Execute `fn`, falling back to `fallback` when the breaker is open or
    /// `fn` fails. Never propagates an error ("The breaker never
    /// throws").
    pub async fn execute<T, F, Fut>(&self, f: F, fallback: T) -> T
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, ()>>,
    {
        if !self.admit() {
            tracing::debug!("circuit breaker open, returning fallback");
            return fallback;
        }

        match f().await {
            Ok(value) => {
                self.record_success();
                value
            }
            Err(()) => {
                self.record_failure();
                fallback
            }
        }
    }
}

/// Registry of named breakers, one per dependency (module-level
/// singleton, init at startup, no hot-reload).
#[derive(Clone, Default)]
pub struct CircuitBreakerRegistry {
    breakers: Arc<Mutex<HashMap<String, Arc<CircuitBreaker>>>>,
}

impl CircuitBreakerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_insert(&self, name: &str, config_fn: impl FnOnce() -> CircuitBreakerConfig) -> Arc<CircuitBreaker> {
        let mut breakers = self.breakers.lock();
        breakers
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(config_fn())))
            .clone()
    }
}
